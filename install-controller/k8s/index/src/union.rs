use crate::{Lister, Owner};
use ahash::AHashMap as HashMap;
use olm_install_controller_core::{within, Error, Identity, Result};
use olm_install_controller_k8s_api::{Resource, ResourceExt, Selector};
use parking_lot::RwLock;
use std::{fmt, sync::Arc};
use tokio::time::Instant;

/// The scope a delegate is responsible for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every namespace, and cluster-scoped objects.
    All,
    Namespace(String),
}

/// Presents a set of per-scope delegates as a single view.
///
/// Registration takes the write lock; reads take the read lock only long enough to snapshot the
/// delegates they need, so the lock is never held while a delegate is being queried.
pub struct UnionLister<K> {
    delegates: RwLock<HashMap<Scope, Arc<dyn Lister<K>>>>,
}

/// A view of a single namespace, resolved through the most specific
/// delegate.
pub struct Namespaced<K> {
    namespace: String,
    delegate: Arc<dyn Lister<K>>,
}

// === impl Scope ===

impl Scope {
    pub fn namespace(ns: impl ToString) -> Self {
        Self::Namespace(ns.to_string())
    }
}

/// The empty namespace denotes all namespaces.
impl From<&str> for Scope {
    fn from(ns: &str) -> Self {
        if ns.is_empty() {
            Self::All
        } else {
            Self::namespace(ns)
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Namespace(ns) => ns.fmt(f),
        }
    }
}

// === impl UnionLister ===

impl<K> Default for UnionLister<K> {
    fn default() -> Self {
        Self {
            delegates: RwLock::new(HashMap::new()),
        }
    }
}

impl<K> fmt::Debug for UnionLister<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnionLister")
            .field("scopes", &self.delegates.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<K> UnionLister<K>
where
    K: Resource + Send + Sync + 'static,
{
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Installs `delegate` for `scope`, replacing any prior delegate for the
    /// same scope.
    pub fn register(&self, scope: Scope, delegate: Arc<dyn Lister<K>>) {
        tracing::debug!(%scope, "Registering delegate");
        self.delegates.write().insert(scope, delegate);
    }

    /// Lists the distinct objects matching `selector` across all delegates.
    ///
    /// Fails if any delegate fails. Returns an empty list when no delegates
    /// are registered.
    pub async fn list(&self, selector: &Selector, deadline: Instant) -> Result<Vec<Arc<K>>> {
        let delegates = self.delegates.read().values().cloned().collect::<Vec<_>>();

        let mut set = HashMap::<Identity, Arc<K>>::new();
        for delegate in delegates {
            for obj in within(deadline, delegate.list(selector)).await? {
                set.insert(Identity::of(&*obj), obj);
            }
        }

        let mut objs = set.into_values().collect::<Vec<_>>();
        objs.sort_by(|a, b| {
            (a.namespace(), a.name_any()).cmp(&(b.namespace(), b.name_any()))
        });
        Ok(objs)
    }

    pub async fn get(
        &self,
        namespace: &str,
        name: &str,
        deadline: Instant,
    ) -> Result<Option<Arc<K>>> {
        let delegate = self.delegate(namespace)?;
        within(deadline, delegate.get(namespace, name)).await
    }

    /// Returns a view of `namespace`.
    pub fn namespaced(&self, namespace: &str) -> Result<Namespaced<K>> {
        let delegate = self.delegate(namespace)?;
        Ok(Namespaced {
            namespace: namespace.to_string(),
            delegate,
        })
    }

    /// Finds the objects that reference `owner`, e.g. the services that
    /// select a workload.
    pub async fn dependents(&self, owner: &Owner, deadline: Instant) -> Result<Vec<Arc<K>>> {
        let delegate = self.delegate(&owner.namespace)?;
        within(deadline, delegate.dependents(owner)).await
    }

    /// Resolves the delegate for a namespace, preferring an exact match over
    /// the all-namespaces delegate.
    fn delegate(&self, namespace: &str) -> Result<Arc<dyn Lister<K>>> {
        let delegates = self.delegates.read();
        delegates
            .get(&Scope::from(namespace))
            .or_else(|| delegates.get(&Scope::All))
            .cloned()
            .ok_or_else(|| Error::not_found(format_args!("delegate for namespace {namespace:?}")))
    }
}

// === impl Namespaced ===

impl<K: Send + Sync + 'static> Namespaced<K> {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn list(&self, selector: &Selector, deadline: Instant) -> Result<Vec<Arc<K>>> {
        within(
            deadline,
            self.delegate.list_namespace(&self.namespace, selector),
        )
        .await
    }

    pub async fn get(&self, name: &str, deadline: Instant) -> Result<Option<Arc<K>>> {
        within(deadline, self.delegate.get(&self.namespace, name)).await
    }
}
