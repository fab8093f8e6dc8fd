#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod csv;
pub mod labels;

pub use self::{
    csv::{
        ClusterServiceVersion, Condition, InstallSpec, InstallStatus, NamedInstallStrategy, Phase,
        Reason, RequirementStatus, ResourceRef,
    },
    labels::{Labels, Selector},
};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::Service,
    },
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
    apimachinery::pkg::apis::meta::v1::OwnerReference,
    NamespaceResourceScope,
};
pub use kube::{
    api::{Api, DeleteParams, ObjectMeta, Patch, PatchParams, PostParams, ResourceExt},
    core::ErrorResponse,
    Client, Error, Resource,
};

/// Labels every workload created for a ClusterServiceVersion with the
/// CSV's name.
pub const OWNER_LABEL: &str = "olm.owner";
