use crate::{version, DeploymentStrategy};
use chrono::{DateTime, Utc};
use olm_install_controller_core::{Error, Result};
use olm_install_controller_k8s_api::{
    ClusterServiceVersion, Condition, Deployment, InstallSpec, InstallStatus, Phase, Reason,
    RequirementStatus, ResourceExt,
};
use olm_install_controller_k8s_apply::ApplyClient;
use olm_install_controller_k8s_index::{Owner, Requirements, UnionLister};
use std::sync::Arc;
use tokio::time::Instant;

/// Computes install passes for ClusterServiceVersions.
///
/// Passes for the same CSV must not run concurrently; passes for different
/// CSVs may.
#[derive(Clone, Debug)]
pub struct Reconciler {
    requirements: Arc<Requirements>,
    deployments: Arc<UnionLister<Deployment>>,
    apply: ApplyClient<Deployment>,
}

/// The outcome of a pass, before it is recorded onto the prior status.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Next {
    phase: Phase,
    reason: Reason,
    message: String,
}

// === impl Reconciler ===

impl Reconciler {
    pub fn new(
        requirements: Arc<Requirements>,
        deployments: Arc<UnionLister<Deployment>>,
        apply: ApplyClient<Deployment>,
    ) -> Self {
        Self {
            requirements,
            deployments,
            apply,
        }
    }

    /// Runs a single pass for `csv` and returns its next status.
    ///
    /// `now` stamps the status and any condition appended by this pass. Every
    /// read and write issued by the pass is bounded by `deadline`.
    pub async fn reconcile(
        &self,
        csv: &ClusterServiceVersion,
        now: DateTime<Utc>,
        deadline: Instant,
    ) -> InstallStatus {
        let prior = csv.status.clone().unwrap_or_default();
        let namespace = csv.namespace().unwrap_or_default();

        let (next, requirement_status) =
            match self.check_requirements(&namespace, &csv.spec, deadline).await {
                // What was last observed is kept, since nothing new could be.
                Err(error) => (Next::unknown(&error), prior.requirement_status.clone()),
                Ok(statuses) => {
                    let next = if statuses.iter().all(RequirementStatus::is_present) {
                        self.install(csv, &prior, &statuses, deadline).await
                    } else {
                        Next::requirements_not_met(&statuses)
                    };
                    (next, statuses)
                }
            };

        if next.phase != prior.phase {
            tracing::debug!(
                %namespace,
                name = %csv.name_any(),
                from = %prior.phase,
                to = %next.phase,
                reason = %next.reason,
                "Phase transition",
            );
        }
        let mut status = next.record(prior, requirement_status, now);
        status.observed_generation = csv.metadata.generation;
        status
    }

    async fn check_requirements(
        &self,
        namespace: &str,
        spec: &InstallSpec,
        deadline: Instant,
    ) -> Result<Vec<RequirementStatus>> {
        let mut statuses = Vec::new();
        for req in spec.requirements() {
            let found = self.requirements.resolve(namespace, req, deadline).await?;
            tracing::trace!(%req, ?found, "Resolved requirement");
            statuses.push(RequirementStatus::new(req, found.as_ref()));
        }
        Ok(statuses)
    }

    /// Advances a CSV whose requirements are all met.
    async fn install(
        &self,
        csv: &ClusterServiceVersion,
        prior: &InstallStatus,
        statuses: &[RequirementStatus],
        deadline: Instant,
    ) -> Next {
        let strategy = match version::validate(&csv.spec.version)
            .and_then(|()| DeploymentStrategy::parse(&csv.spec.install))
        {
            Ok(strategy) => strategy,
            Err(error) => return Next::failed(&error),
        };

        match prior.phase {
            Phase::None | Phase::Pending | Phase::Unknown => Next::new(
                Phase::Installing,
                Reason::AllRequirementsMet,
                "all requirements found, attempting install",
            ),

            Phase::Installing => match self.apply_all(csv, &strategy, deadline).await {
                Ok(()) => Next::new(
                    Phase::Succeeded,
                    Reason::InstallSucceeded,
                    "install strategy completed with no errors",
                ),
                Err(error) if error.is_terminal() => Next::failed(&error),
                // Retried on the next pass.
                Err(error) => Next {
                    message: format!("install strategy failed: {error}"),
                    ..Next::stay(prior)
                },
            },

            Phase::Succeeded => match self.check_installed(csv, &strategy, deadline).await {
                Ok(missing) if missing.is_empty() => Next::stay(prior),
                Ok(missing) => Next::new(
                    Phase::Installing,
                    Reason::InstallCheckFailed,
                    format!("installed deployments missing: {}", missing.join(", ")),
                ),
                Err(error) => Next::unknown(&error),
            },

            Phase::Failed if csv.metadata.generation != prior.observed_generation => Next::new(
                Phase::Pending,
                Reason::AllRequirementsMet,
                "spec changed; retrying install",
            ),
            Phase::Failed if statuses != prior.requirement_status.as_slice() => Next::new(
                Phase::Pending,
                Reason::AllRequirementsMet,
                "requirements changed; retrying install",
            ),
            Phase::Failed => Next::stay(prior),
        }
    }

    /// Applies every deployment in the strategy, stopping at the first
    /// failure.
    async fn apply_all(
        &self,
        csv: &ClusterServiceVersion,
        strategy: &DeploymentStrategy,
        deadline: Instant,
    ) -> Result<()> {
        for deployment in strategy.deployments(csv)? {
            self.apply.apply(&deployment, deadline).await?;
            tracing::debug!(name = %deployment.name_any(), "Applied deployment");
        }
        Ok(())
    }

    /// Returns the names of strategy deployments that are no longer
    /// installed.
    async fn check_installed(
        &self,
        csv: &ClusterServiceVersion,
        strategy: &DeploymentStrategy,
        deadline: Instant,
    ) -> Result<Vec<String>> {
        let installed = self
            .deployments
            .dependents(&Owner::of(csv), deadline)
            .await?;
        let missing = strategy.missing(&installed, csv.spec.selector.as_ref());
        Ok(missing.into_iter().map(str::to_string).collect())
    }
}

// === impl Next ===

impl Next {
    fn new(phase: Phase, reason: Reason, message: impl ToString) -> Self {
        Self {
            phase,
            reason,
            message: message.to_string(),
        }
    }

    fn stay(prior: &InstallStatus) -> Self {
        Self::new(prior.phase, prior.reason, &prior.message)
    }

    fn unknown(error: &Error) -> Self {
        let prefix = if error.is_transient() {
            "could not reach control plane"
        } else {
            "could not observe state"
        };
        Self::new(
            Phase::Unknown,
            Reason::RequirementsUnknown,
            format!("{prefix}: {error}"),
        )
    }

    fn failed(error: &Error) -> Self {
        Self::new(Phase::Failed, Reason::InstallComponentFailed, error)
    }

    fn requirements_not_met(statuses: &[RequirementStatus]) -> Self {
        let missing = statuses
            .iter()
            .filter(|s| !s.is_present())
            .map(|s| format!("{}/{}", s.kind, s.name))
            .collect::<Vec<_>>();
        Self::new(
            Phase::Pending,
            Reason::RequirementsNotMet,
            format!("requirements not met: {}", missing.join(", ")),
        )
    }

    /// Folds this outcome into `prior`.
    ///
    /// A phase change appends a condition and moves the transition time.
    /// The update time and requirement statuses are always replaced.
    fn record(
        self,
        mut status: InstallStatus,
        requirement_status: Vec<RequirementStatus>,
        now: DateTime<Utc>,
    ) -> InstallStatus {
        if self.phase != status.phase {
            status.conditions.push(Condition {
                phase: self.phase,
                reason: self.reason,
                message: self.message.clone(),
                last_update_time: now,
                last_transition_time: now,
            });
            status.last_transition_time = Some(now);
        }

        status.phase = self.phase;
        status.reason = self.reason;
        status.message = self.message;
        status.last_update_time = Some(now);
        status.requirement_status = requirement_status;
        status
    }
}
