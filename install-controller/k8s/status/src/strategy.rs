use olm_install_controller_core::{Error, Result};
use olm_install_controller_k8s_api::{
    ClusterServiceVersion, Deployment, DeploymentSpec, Labels, NamedInstallStrategy, ObjectMeta,
    Resource, ResourceExt, Selector, OWNER_LABEL,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The name of the install strategy that runs an operator as a set of
/// deployments.
pub const DEPLOYMENT_STRATEGY: &str = "deployment";

/// The payload of the `deployment` install strategy.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct DeploymentStrategy {
    pub deployments: Vec<StrategyDeployment>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StrategyDeployment {
    pub name: String,
    pub spec: DeploymentSpec,
}

// === impl DeploymentStrategy ===

impl DeploymentStrategy {
    /// Parses a named install strategy. Unknown strategies and malformed
    /// payloads are terminal errors.
    pub fn parse(install: &NamedInstallStrategy) -> Result<Self> {
        if install.strategy != DEPLOYMENT_STRATEGY {
            return Err(Error::terminal(format_args!(
                "unsupported install strategy {:?}",
                install.strategy
            )));
        }

        serde_json::from_value(install.spec.clone()).map_err(|error| {
            Error::terminal(format_args!(
                "invalid {DEPLOYMENT_STRATEGY} strategy: {error}"
            ))
        })
    }

    /// Builds the deployments that install `csv`.
    ///
    /// Each deployment lives in the CSV's namespace and is controlled by the
    /// CSV. It carries the CSV's labels, the selector's match labels and the
    /// owner label, plus the CSV's annotations.
    pub fn deployments(&self, csv: &ClusterServiceVersion) -> Result<Vec<Deployment>> {
        let namespace = csv
            .namespace()
            .ok_or_else(|| Error::terminal("ClusterServiceVersion has no namespace"))?;
        let owner = csv.controller_owner_ref(&()).ok_or_else(|| {
            Error::terminal(format_args!(
                "ClusterServiceVersion {namespace}/{} has no uid",
                csv.name_any()
            ))
        })?;

        let mut labels = csv.spec.labels.clone();
        if let Some(match_labels) = csv.spec.selector.as_ref().and_then(Selector::match_labels) {
            labels.extend(match_labels.clone());
        }
        labels.insert(OWNER_LABEL.to_string(), csv.name_any());

        let annotations = (!csv.spec.annotations.is_empty()).then(|| csv.spec.annotations.clone());

        Ok(self
            .deployments
            .iter()
            .map(|StrategyDeployment { name, spec }| Deployment {
                metadata: ObjectMeta {
                    namespace: Some(namespace.clone()),
                    name: Some(name.clone()),
                    labels: Some(labels.clone()),
                    annotations: annotations.clone(),
                    owner_references: Some(vec![owner.clone()]),
                    ..Default::default()
                },
                spec: Some(spec.clone()),
                ..Default::default()
            })
            .collect())
    }

    /// Returns the names of strategy deployments that are not among
    /// `installed`, or that no longer match `selector`.
    pub fn missing<'s>(
        &'s self,
        installed: &[Arc<Deployment>],
        selector: Option<&Selector>,
    ) -> Vec<&'s str> {
        self.deployments
            .iter()
            .filter(|StrategyDeployment { name, .. }| {
                !installed.iter().any(|d| {
                    d.name_any() == *name
                        && selector.map_or(true, |s| s.matches(&Labels::from(d.labels().clone())))
                })
            })
            .map(|StrategyDeployment { name, .. }| name.as_str())
            .collect()
    }
}
