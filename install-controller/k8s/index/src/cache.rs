use crate::{Dependent, Lister, Owner};
use ahash::AHashMap as HashMap;
use kubert::index::{IndexClusterResource, IndexNamespacedResource};
use olm_install_controller_core::Result;
use olm_install_controller_k8s_api::{Labels, Resource, ResourceExt, Selector};
use parking_lot::RwLock;
use std::sync::Arc;

pub type SharedCache<K> = Arc<RwLock<Cache<K>>>;

/// An in-memory store of objects, updated by a single `kubert` index task.
///
/// Cluster-scoped objects are stored under the empty namespace.
#[derive(Debug)]
pub struct Cache<K> {
    objects: HashMap<(String, String), Arc<K>>,
}

// === impl Cache ===

impl<K> Default for Cache<K> {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
        }
    }
}

impl<K: Resource> Cache<K> {
    pub fn shared() -> SharedCache<K> {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn insert(&mut self, obj: K) {
        let key = (obj.namespace().unwrap_or_default(), obj.name_any());
        self.objects.insert(key, Arc::new(obj));
    }

    pub fn remove(&mut self, namespace: &str, name: &str) -> Option<Arc<K>> {
        self.objects
            .remove(&(namespace.to_string(), name.to_string()))
    }

    /// Gets an object by namespace and name. Cluster-scoped objects are
    /// found from any namespace.
    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        self.objects
            .get(&(namespace.to_string(), name.to_string()))
            .or_else(|| self.objects.get(&(String::new(), name.to_string())))
            .cloned()
    }

    fn select<'a>(
        &'a self,
        namespace: Option<&'a str>,
        selector: &'a Selector,
    ) -> impl Iterator<Item = Arc<K>> + 'a {
        self.objects
            .iter()
            .filter(move |((ns, _), _)| namespace.map_or(true, |n| n == ns.as_str()))
            .filter(move |(_, obj)| selector.matches(&Labels::from(obj.labels().clone())))
            .map(|(_, obj)| obj.clone())
    }
}

impl<K: Resource> IndexNamespacedResource<K> for Cache<K> {
    fn apply(&mut self, resource: K) {
        tracing::trace!(namespace = ?resource.namespace(), name = %resource.name_any(), "Caching");
        self.insert(resource);
    }

    fn delete(&mut self, namespace: String, name: String) {
        tracing::trace!(%namespace, %name, "Evicting");
        self.remove(&namespace, &name);
    }

    // The default reset applies every resource and deletes every removed
    // resource, which is all a flat cache needs.
}

impl<K: Resource> IndexClusterResource<K> for Cache<K> {
    fn apply(&mut self, resource: K) {
        tracing::trace!(name = %resource.name_any(), "Caching");
        self.insert(resource);
    }

    fn delete(&mut self, name: String) {
        tracing::trace!(%name, "Evicting");
        self.remove("", &name);
    }
}

#[async_trait::async_trait]
impl<K> Lister<K> for RwLock<Cache<K>>
where
    K: Resource + Dependent + Send + Sync + 'static,
{
    async fn list(&self, selector: &Selector) -> Result<Vec<Arc<K>>> {
        Ok(self.read().select(None, selector).collect())
    }

    async fn list_namespace(&self, namespace: &str, selector: &Selector) -> Result<Vec<Arc<K>>> {
        Ok(self.read().select(Some(namespace), selector).collect())
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Arc<K>>> {
        Ok(self.read().get(namespace, name))
    }

    async fn dependents(&self, owner: &Owner) -> Result<Vec<Arc<K>>> {
        Ok(self
            .read()
            .objects
            .values()
            .filter(|obj| obj.depends_on(owner))
            .cloned()
            .collect())
    }
}
