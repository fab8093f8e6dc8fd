use crate::labels;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use olm_install_controller_core::{GroupKind, Identity};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

pub const REQUIREMENT_PRESENT: &str = "Present";
pub const REQUIREMENT_NOT_PRESENT: &str = "NotPresent";

/// Declares how to install an operator and what it depends on.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "operators.coreos.com",
    version = "v1alpha1",
    kind = "ClusterServiceVersion",
    status = "InstallStatus",
    shortname = "csv",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct InstallSpec {
    pub install: NamedInstallStrategy,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity: Option<String>,

    /// Resources this operator manages. Owned resources are implicitly
    /// required.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owned: Vec<ResourceRef>,

    /// Resources that must exist before the operator is installed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<ResourceRef>,

    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<AppLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,

    /// Labels applied to every workload created by the install strategy.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations applied to every workload created by the install strategy.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Restricts which workloads this operator governs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<labels::Selector>,
}

/// A named install strategy and its strategy-specific payload.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct NamedInstallStrategy {
    pub strategy: String,
    #[serde(default)]
    pub spec: serde_json::Value,
}

/// References a resource by group, version, kind and name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub struct ResourceRef {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Maintainer {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct AppLink {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Icon {
    #[serde(rename = "base64data")]
    pub data: String,
    #[serde(rename = "mediatype")]
    pub media_type: String,
}

/// The lifecycle phase of an install.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum Phase {
    /// Not yet observed by the controller.
    #[default]
    #[serde(rename = "")]
    None,
    /// Accepted, but requirements are not yet met.
    Pending,
    /// Requirements are met and the strategy is being applied.
    Installing,
    /// Every resource in the install strategy was applied.
    Succeeded,
    /// The install strategy could not be completed.
    Failed,
    /// The state of the install could not be observed.
    Unknown,
}

/// A CamelCase code describing why an install is in its phase.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum Reason {
    #[default]
    #[serde(rename = "")]
    None,
    RequirementsUnknown,
    RequirementsNotMet,
    AllRequirementsMet,
    InstallComponentFailed,
    InstallSucceeded,
    InstallCheckFailed,
}

/// A record of a past phase transition.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub phase: Phase,
    #[serde(default)]
    pub reason: Reason,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub last_update_time: DateTime<Utc>,
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementStatus {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

/// The observed state of an install. Status may trail the actual state of
/// the cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallStatus {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub reason: Reason,
    // Always written, so that a merge patch clears a previous message.
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    /// A history of phase transitions, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub requirement_status: Vec<RequirementStatus>,

    /// The CSV generation this status was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

// === impl InstallSpec ===

impl InstallSpec {
    /// Returns the required resources followed by any owned resources that
    /// were not also listed as required.
    pub fn requirements(&self) -> Vec<&ResourceRef> {
        let mut reqs: Vec<&ResourceRef> = Vec::with_capacity(self.required.len() + self.owned.len());
        for r in self.required.iter().chain(self.owned.iter()) {
            if !reqs.contains(&r) {
                reqs.push(r);
            }
        }
        reqs
    }
}

// === impl ResourceRef ===

impl ResourceRef {
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(&self.group, &self.kind)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_kind(), self.name)
    }
}

// === impl Phase ===

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Pending => "Pending",
            Self::Installing => "Installing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Reason ===

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "",
            Self::RequirementsUnknown => "RequirementsUnknown",
            Self::RequirementsNotMet => "RequirementsNotMet",
            Self::AllRequirementsMet => "AllRequirementsMet",
            Self::InstallComponentFailed => "InstallComponentFailed",
            Self::InstallSucceeded => "InstallSucceeded",
            Self::InstallCheckFailed => "InstallCheckFailed",
        })
    }
}

// === impl RequirementStatus ===

impl RequirementStatus {
    /// Records whether `req` was found. Only a found object's UID is
    /// recorded; objects without one are present with no `uuid`.
    pub fn new(req: &ResourceRef, found: Option<&Identity>) -> Self {
        let status = if found.is_some() {
            REQUIREMENT_PRESENT
        } else {
            REQUIREMENT_NOT_PRESENT
        };
        Self {
            group: req.group.clone(),
            version: req.version.clone(),
            kind: req.kind.clone(),
            name: req.name.clone(),
            status: status.to_string(),
            uuid: found.and_then(Identity::uid).map(str::to_string),
        }
    }

    pub fn is_present(&self) -> bool {
        self.status == REQUIREMENT_PRESENT
    }
}
