use crate::Reconciler;
use chrono::{DateTime, Utc};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use maplit::{btreemap, convert_args};
use olm_install_controller_core::{Error, GroupKind, Result};
use olm_install_controller_k8s_api::{
    ClusterServiceVersion, CustomResourceDefinition, Deployment, InstallSpec, NamedInstallStrategy,
    ObjectMeta, Resource, ResourceExt, ResourceRef,
};
use olm_install_controller_k8s_apply::{ApplyClient, Transport};
use olm_install_controller_k8s_index::{
    Cache, Lister, Owner, Requirements, Scope, SharedCache, UnionLister,
};
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::time::Instant;


const NS: &str = "olm";
const CSV_NAME: &str = "etcdoperator.v0.9.2";
const CSV_UID: &str = "5a8e2b3c-0f1d-4f52-9d6b-6a3b1a1c2d3e";

/// Indexes and a fake cluster wired into a [`Reconciler`].
struct Fixture {
    reconciler: Reconciler,
    requirements: Arc<Requirements>,
    crds: SharedCache<CustomResourceDefinition>,
    foos: SharedCache<DynamicObject>,
    deployments: SharedCache<Deployment>,
    cluster: Arc<Cluster>,
}

/// Stores applied deployments in the same cache the reconciler reads them
/// from.
struct Cluster {
    deployments: SharedCache<Deployment>,
    create_errors: Mutex<VecDeque<Error>>,
    creates: Mutex<Vec<String>>,
}

struct Hanging;

// === impl Fixture ===

impl Fixture {
    fn new() -> Self {
        let crds = Cache::shared();
        let crd_index = UnionLister::<CustomResourceDefinition>::shared();
        crd_index.register(Scope::All, crds.clone());

        let foos = Cache::shared();
        let foo_index = UnionLister::<DynamicObject>::shared();
        foo_index.register(Scope::namespace(NS), foos.clone());

        let requirements = Requirements::shared();
        requirements.register_kind(crd_index);
        requirements.register(GroupKind::new("example.com", "Foo"), foo_index);

        let deployments = Cache::shared();
        let deployment_index = UnionLister::<Deployment>::shared();
        deployment_index.register(Scope::namespace(NS), deployments.clone());

        let cluster = Arc::new(Cluster {
            deployments: deployments.clone(),
            create_errors: Default::default(),
            creates: Default::default(),
        });
        let reconciler = Reconciler::new(
            requirements.clone(),
            deployment_index,
            ApplyClient::<Deployment>::from_shared(cluster.clone()),
        );

        Self {
            reconciler,
            requirements,
            crds,
            foos,
            deployments,
            cluster,
        }
    }

    /// Runs a pass and stores the result on `csv`, as the controller would.
    async fn reconcile(&self, csv: &mut ClusterServiceVersion, now: DateTime<Utc>) {
        self.reconcile_within(csv, now, deadline()).await
    }

    async fn reconcile_within(
        &self,
        csv: &mut ClusterServiceVersion,
        now: DateTime<Utc>,
        deadline: Instant,
    ) {
        let status = self.reconciler.reconcile(csv, now, deadline).await;
        csv.status = Some(status);
    }

    fn add_foo(&self, name: &str, uid: &str) {
        let gvk = GroupVersionKind::gvk("example.com", "v1", "Foo");
        let mut foo = DynamicObject::new(name, &ApiResource::from_gvk(&gvk)).within(NS);
        foo.meta_mut().uid = Some(uid.to_string());
        self.foos.write().insert(foo);
    }

    fn add_crd(&self, name: &str, uid: &str) {
        self.crds.write().insert(CustomResourceDefinition {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                uid: Some(uid.to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
    }

    fn installed(&self, name: &str) -> Option<Deployment> {
        self.deployments.read().get(NS, name).map(|d| (*d).clone())
    }
}

// === impl Cluster ===

impl Cluster {
    fn fail_create(&self, error: Error) {
        self.create_errors.lock().push_back(error);
    }

    fn creates(&self) -> Vec<String> {
        self.creates.lock().clone()
    }
}

#[async_trait::async_trait]
impl Transport<Deployment> for Cluster {
    async fn create(&self, obj: &Deployment) -> Result<()> {
        let name = obj.name_any();
        self.creates.lock().push(name.clone());
        if let Some(error) = self.create_errors.lock().pop_front() {
            return Err(error);
        }
        if self.deployments.read().get(NS, &name).is_some() {
            return Err(Error::AlreadyExists(format!("Deployment {NS}/{name}")));
        }
        self.deployments.write().insert(obj.clone());
        Ok(())
    }

    async fn delete(&self, obj: &Deployment) -> Result<()> {
        let name = obj.name_any();
        self.deployments
            .write()
            .remove(NS, &name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format_args!("Deployment {NS}/{name}")))
    }

    async fn update(&self, obj: &Deployment) -> Result<()> {
        self.deployments.write().insert(obj.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl<K: Send + Sync + 'static> Lister<K> for Hanging {
    async fn list(&self, _: &olm_install_controller_k8s_api::Selector) -> Result<Vec<Arc<K>>> {
        std::future::pending().await
    }

    async fn list_namespace(
        &self,
        _: &str,
        _: &olm_install_controller_k8s_api::Selector,
    ) -> Result<Vec<Arc<K>>> {
        std::future::pending().await
    }

    async fn get(&self, _: &str, _: &str) -> Result<Option<Arc<K>>> {
        std::future::pending().await
    }

    async fn dependents(&self, _: &Owner) -> Result<Vec<Arc<K>>> {
        std::future::pending().await
    }
}

// === helpers ===

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

/// A pass time `secs` seconds after a fixed epoch.
fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("timestamp must be valid")
}

fn foo(name: &str) -> ResourceRef {
    ResourceRef {
        group: "example.com".to_string(),
        version: "v1".to_string(),
        kind: "Foo".to_string(),
        name: name.to_string(),
    }
}

fn crd(name: &str) -> ResourceRef {
    ResourceRef {
        group: "apiextensions.k8s.io".to_string(),
        version: "v1".to_string(),
        kind: "CustomResourceDefinition".to_string(),
        name: name.to_string(),
    }
}

fn etcd_operator_strategy() -> serde_json::Value {
    serde_json::json!({
        "deployments": [{
            "name": "etcd-operator",
            "spec": {
                "replicas": 1,
                "selector": { "matchLabels": { "name": "etcd-operator" } },
                "template": {
                    "metadata": { "labels": { "name": "etcd-operator" } },
                    "spec": {
                        "containers": [{
                            "name": "etcd-operator",
                            "image": "quay.io/coreos/etcd-operator:v0.9.2",
                        }],
                    },
                },
            },
        }],
    })
}

fn mk_csv(required: Vec<ResourceRef>, owned: Vec<ResourceRef>) -> ClusterServiceVersion {
    let spec = InstallSpec {
        install: NamedInstallStrategy {
            strategy: "deployment".to_string(),
            spec: etcd_operator_strategy(),
        },
        version: "0.9.2".to_string(),
        maturity: Some("alpha".to_string()),
        owned,
        required,
        display_name: "etcd".to_string(),
        description: "Creates and maintains highly-available etcd clusters".to_string(),
        keywords: vec!["etcd".to_string(), "key value".to_string()],
        maintainers: vec![],
        links: vec![],
        icon: None,
        labels: convert_args!(btreemap!("alm-owner-etcd" => "etcdoperator")),
        annotations: convert_args!(btreemap!("tectonic-visibility" => "ocs")),
        selector: None,
    };
    let mut csv = ClusterServiceVersion::new(CSV_NAME, spec);
    csv.metadata.namespace = Some(NS.to_string());
    csv.metadata.uid = Some(CSV_UID.to_string());
    csv
}
