use crate::UnionLister;
use ahash::AHashMap as HashMap;
use olm_install_controller_core::{Error, GroupKind, Identity, Result};
use olm_install_controller_k8s_api::{Resource, ResourceRef};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::Instant;

/// Routes requirement lookups to the index that holds objects of the
/// requirement's kind.
#[derive(Default)]
pub struct Requirements {
    kinds: RwLock<HashMap<GroupKind, Arc<dyn Resolve>>>,
}

/// A type-erased lookup by namespace and name.
#[async_trait::async_trait]
trait Resolve: Send + Sync {
    async fn resolve(&self, namespace: &str, name: &str, deadline: Instant)
        -> Result<Option<Identity>>;
}

// === impl Requirements ===

impl Requirements {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register<K>(&self, kind: GroupKind, index: Arc<UnionLister<K>>)
    where
        K: Resource + Send + Sync + 'static,
    {
        tracing::debug!(%kind, "Registering requirement index");
        self.kinds.write().insert(kind, index);
    }

    /// Registers the index for a statically typed kind.
    pub fn register_kind<K>(&self, index: Arc<UnionLister<K>>)
    where
        K: Resource<DynamicType = ()> + Send + Sync + 'static,
    {
        self.register(GroupKind::of::<K>(), index)
    }

    /// Finds the object satisfying `requirement` as seen from `namespace`,
    /// returning its identity.
    ///
    /// Cluster-scoped kinds resolve through their index's all-namespaces
    /// delegate.
    pub async fn resolve(
        &self,
        namespace: &str,
        requirement: &ResourceRef,
        deadline: Instant,
    ) -> Result<Option<Identity>> {
        let kind = requirement.group_kind();
        let index = self
            .kinds
            .read()
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::not_found(format_args!("index for {kind}")))?;
        index.resolve(namespace, &requirement.name, deadline).await
    }
}

impl std::fmt::Debug for Requirements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requirements")
            .field("kinds", &self.kinds.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait::async_trait]
impl<K> Resolve for UnionLister<K>
where
    K: Resource + Send + Sync + 'static,
{
    async fn resolve(
        &self,
        namespace: &str,
        name: &str,
        deadline: Instant,
    ) -> Result<Option<Identity>> {
        let obj = self.get(namespace, name, deadline).await?;
        Ok(obj.map(|o| Identity::of(&*o)))
    }
}
