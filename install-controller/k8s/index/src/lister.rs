use kube::core::DynamicObject;
use olm_install_controller_core::Result;
use olm_install_controller_k8s_api::{
    self as k8s, labels, ClusterServiceVersion, CustomResourceDefinition, Deployment, ObjectMeta,
    Resource, ResourceExt, Selector, Service,
};
use std::sync::Arc;

/// A scoped source of objects of kind `K`.
///
/// Delegates may be backed by an in-memory cache or by a remote transport, so every operation is
/// async. Callers bound each call with a deadline.
#[async_trait::async_trait]
pub trait Lister<K>: Send + Sync {
    /// Lists every object in the delegate's scope that matches `selector`.
    async fn list(&self, selector: &Selector) -> Result<Vec<Arc<K>>>;

    /// Lists objects in `namespace` that match `selector`.
    async fn list_namespace(&self, namespace: &str, selector: &Selector) -> Result<Vec<Arc<K>>>;

    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Arc<K>>>;

    /// Lists objects that reference `owner`.
    async fn dependents(&self, owner: &Owner) -> Result<Vec<Arc<K>>>;
}

/// Describes an object that others may depend on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Owner {
    pub namespace: String,
    pub name: String,
    pub uid: Option<String>,
    pub labels: k8s::Labels,
}

/// Determines whether an object references an [`Owner`].
pub trait Dependent {
    fn depends_on(&self, owner: &Owner) -> bool;
}

// === impl Owner ===

impl Owner {
    pub fn of<R: Resource>(resource: &R) -> Self {
        let meta = resource.meta();
        Self {
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
            uid: meta.uid.clone(),
            labels: meta.labels.clone().into(),
        }
    }
}

fn is_owned_by(meta: &ObjectMeta, owner: &Owner) -> bool {
    let Some(uid) = owner.uid.as_deref() else {
        return false;
    };
    meta.owner_references
        .iter()
        .flatten()
        .any(|oref| oref.uid == uid)
}

// === impl Dependent ===

/// A service depends on the workloads its selector matches in its own
/// namespace.
impl Dependent for Service {
    fn depends_on(&self, owner: &Owner) -> bool {
        if self.namespace().as_deref() != Some(owner.namespace.as_str()) {
            return false;
        }

        let selector = match self.spec.as_ref().and_then(|spec| spec.selector.clone()) {
            Some(selector) if !selector.is_empty() => labels::Selector::from_map(selector),
            _ => return false,
        };
        selector.matches(&owner.labels)
    }
}

impl Dependent for Deployment {
    fn depends_on(&self, owner: &Owner) -> bool {
        is_owned_by(self.meta(), owner)
    }
}

impl Dependent for ClusterServiceVersion {
    fn depends_on(&self, owner: &Owner) -> bool {
        is_owned_by(self.meta(), owner)
    }
}

impl Dependent for CustomResourceDefinition {
    fn depends_on(&self, owner: &Owner) -> bool {
        is_owned_by(self.meta(), owner)
    }
}

impl Dependent for DynamicObject {
    fn depends_on(&self, owner: &Owner) -> bool {
        is_owned_by(self.meta(), owner)
    }
}
