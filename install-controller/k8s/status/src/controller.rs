use crate::Reconciler;
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use chrono::Utc;
use kubert::lease::Claim;
use olm_install_controller_core::Identity;
use olm_install_controller_k8s_api::{ClusterServiceVersion, InstallStatus, Phase, ResourceExt, Selector};
use olm_install_controller_k8s_apply::ApplyClient;
use olm_install_controller_k8s_index::UnionLister;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use std::sync::Arc;
use tokio::{
    sync::watch,
    time::{self, Duration, Instant},
};

/// Reconciles every tracked ClusterServiceVersion, one at a time, and writes
/// changed statuses back to the cluster.
pub struct Controller {
    csvs: Arc<UnionLister<ClusterServiceVersion>>,
    reconciler: Reconciler,
    status: ApplyClient<ClusterServiceVersion>,
    lease: Option<Lease>,
    period: Duration,
    request_timeout: Duration,
    metrics: ControllerMetrics,

    // Statuses this controller wrote that the CSV cache may not reflect yet.
    written: HashMap<Identity, Written>,
}

#[derive(Clone, Debug)]
pub struct ControllerMetrics {
    reconciles: Family<PhaseLabels, Counter>,
    transitions: Family<TransitionLabels, Counter>,
    writes: Counter,
    write_errors: Counter,
}

struct Lease {
    claims: watch::Receiver<Arc<Claim>>,
    hostname: String,
}

/// Writes not yet observed through the cache, oldest first, and the cached
/// status they were written over.
struct Written {
    over: Option<InstallStatus>,
    statuses: Vec<InstallStatus>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct PhaseLabels {
    phase: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct TransitionLabels {
    from: &'static str,
    to: &'static str,
}

// === impl Controller ===

impl Controller {
    pub fn new(
        csvs: Arc<UnionLister<ClusterServiceVersion>>,
        reconciler: Reconciler,
        status: ApplyClient<ClusterServiceVersion>,
        period: Duration,
        request_timeout: Duration,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            csvs,
            reconciler,
            status,
            lease: None,
            period,
            request_timeout,
            metrics,
            written: HashMap::new(),
        }
    }

    /// Only reconciles while `hostname` holds the write lease.
    pub fn with_claims(self, claims: watch::Receiver<Arc<Claim>>, hostname: impl ToString) -> Self {
        Self {
            lease: Some(Lease {
                claims,
                hostname: hostname.to_string(),
            }),
            ..self
        }
    }

    pub async fn run(mut self) {
        loop {
            // Keep going while an install can progress on the next pass;
            // otherwise wait for the next period.
            if !self.reconcile_all().await {
                time::sleep(self.period).await;
            }
        }
    }

    /// Runs one round over every tracked CSV. Returns true if any CSV moved
    /// into a phase that the next pass advances, i.e. Pending or Installing.
    ///
    /// Moving into Succeeded does not count: the next pass checks the
    /// installed deployments, which the cache may not have observed yet.
    pub async fn reconcile_all(&mut self) -> bool {
        if !self.is_leader() {
            tracing::debug!("Lease not held; skipping round");
            return false;
        }

        let deadline = Instant::now() + self.request_timeout;
        let csvs = match self.csvs.list(&Selector::default(), deadline).await {
            Ok(csvs) => csvs,
            Err(error) => {
                tracing::warn!(%error, "Failed to list ClusterServiceVersions");
                return false;
            }
        };

        let ids = csvs.iter().map(|csv| Identity::of(&**csv)).collect::<HashSet<_>>();
        self.written.retain(|id, _| ids.contains(id));

        let mut requeue = false;
        for csv in csvs {
            requeue |= self.reconcile(&csv).await;
        }
        requeue
    }

    async fn reconcile(&mut self, csv: &ClusterServiceVersion) -> bool {
        let id = Identity::of(csv);
        let namespace = csv.namespace().unwrap_or_default();
        let name = csv.name_any();

        // While the cache shows the status we wrote over, or one of our own
        // writes older than the last, reconcile from the last write.
        let mut csv = csv.clone();
        let cached = csv.status.clone();
        let unobserved = match self.written.get_mut(&id) {
            Some(written) => written.observe(&cached),
            None => None,
        };
        match unobserved {
            Some(status) => csv.status = Some(status),
            None => {
                self.written.remove(&id);
            }
        }

        let prior = csv.status.clone();
        let prior_phase = prior.as_ref().map(|s| s.phase).unwrap_or_default();
        let status = self
            .reconciler
            .reconcile(&csv, Utc::now(), Instant::now() + self.request_timeout)
            .await;
        self.metrics.reconciled(status.phase);

        let moved = status.phase != prior_phase;
        let requeue = moved && matches!(status.phase, Phase::Pending | Phase::Installing);
        if moved {
            tracing::info!(
                %namespace,
                %name,
                from = %prior_phase,
                to = %status.phase,
                reason = %status.reason,
                message = %status.message,
                "Install phase changed",
            );
            self.metrics.transitioned(prior_phase, status.phase);
        }

        if prior.as_ref() == Some(&status) {
            return requeue;
        }

        csv.status = Some(status.clone());
        let deadline = Instant::now() + self.request_timeout;
        match self.status.replace(&csv, deadline).await {
            Ok(()) => {
                self.metrics.writes.inc();
                self.written
                    .entry(id)
                    .or_insert_with(|| Written {
                        over: cached,
                        statuses: Vec::new(),
                    })
                    .statuses
                    .push(status);
            }
            Err(error) => {
                self.metrics.write_errors.inc();
                tracing::warn!(%namespace, %name, %error, "Failed to write status");
            }
        }
        requeue
    }

    fn is_leader(&self) -> bool {
        match &self.lease {
            None => true,
            Some(Lease { claims, hostname }) => claims.borrow().is_current_for(hostname),
        }
    }
}

// === impl Written ===

impl Written {
    /// Returns the status to reconcile from, if the cache has not yet caught
    /// up with the last write.
    fn observe(&mut self, cached: &Option<InstallStatus>) -> Option<InstallStatus> {
        if *cached != self.over {
            let seen = self
                .statuses
                .iter()
                .position(|s| cached.as_ref() == Some(s))?;
            // Everything up to the observed write is now reflected in the
            // cache.
            let mut rest = self.statuses.split_off(seen);
            self.over = Some(rest.remove(0));
            self.statuses = rest;
        }
        self.statuses.last().cloned()
    }
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let reconciles = Family::default();
        prom.register(
            "reconciles",
            "Count of reconciliation passes by resulting phase",
            reconciles.clone(),
        );

        let transitions = Family::default();
        prom.register(
            "transitions",
            "Count of install phase transitions",
            transitions.clone(),
        );

        let writes = Counter::default();
        prom.register("writes", "Count of status writes", writes.clone());

        let write_errors = Counter::default();
        prom.register(
            "write_errors",
            "Count of status writes that failed",
            write_errors.clone(),
        );

        Self {
            reconciles,
            transitions,
            writes,
            write_errors,
        }
    }

    fn reconciled(&self, phase: Phase) {
        self.reconciles
            .get_or_create(&PhaseLabels {
                phase: phase.as_str(),
            })
            .inc();
    }

    fn transitioned(&self, from: Phase, to: Phase) {
        self.transitions
            .get_or_create(&TransitionLabels {
                from: from.as_str(),
                to: to.as_str(),
            })
            .inc();
    }
}
