use crate::{
    index::{Cache, Dependent, Scope, UnionLister},
    k8s::{NamespaceResourceScope, Resource},
};
use kube::runtime::watcher;
use serde::de::DeserializeOwned;
use std::{fmt::Debug, sync::Arc};
use tracing::{info_span, Instrument};

/// Watches `K` in each of `namespaces`, or in all namespaces when none are
/// given, and returns an index over the resulting caches.
///
/// Each watch feeds its own cache from a spawned task.
pub(crate) fn namespaced<K, S: 'static>(
    runtime: &mut kubert::Runtime<S>,
    namespaces: &[String],
) -> Arc<UnionLister<K>>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    K: Clone + DeserializeOwned + Debug + Dependent + Send + Sync + 'static,
{
    let index = UnionLister::<K>::shared();
    let kind = K::kind(&());

    if namespaces.is_empty() {
        let cache = Cache::shared();
        let events = runtime.watch_all::<K>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(cache.clone(), events)
                .instrument(info_span!("watch", %kind, namespace = "*")),
        );
        index.register(Scope::All, cache);
        return index;
    }

    for ns in namespaces {
        let cache = Cache::shared();
        let events = runtime.watch_namespaced::<K>(ns.clone(), watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(cache.clone(), events)
                .instrument(info_span!("watch", %kind, namespace = %ns)),
        );
        index.register(Scope::namespace(ns), cache);
    }
    index
}

/// Watches a cluster-scoped `K` and returns an index with a single
/// all-namespaces delegate.
pub(crate) fn cluster<K, S: 'static>(runtime: &mut kubert::Runtime<S>) -> Arc<UnionLister<K>>
where
    K: Resource<DynamicType = ()>,
    K: Clone + DeserializeOwned + Debug + Dependent + Send + Sync + 'static,
{
    let index = UnionLister::<K>::shared();
    let kind = K::kind(&());

    let cache = Cache::shared();
    let events = runtime.watch_all::<K>(watcher::Config::default());
    tokio::spawn(
        kubert::index::cluster(cache.clone(), events).instrument(info_span!("watch", %kind)),
    );
    index.register(Scope::All, cache);
    index
}
