//! Drives ClusterServiceVersions through their install lifecycle.
//!
//! A [`Reconciler`] computes one pass of the install state machine for a single CSV: it resolves
//! the CSV's requirements, applies its install strategy, and checks that what was installed is
//! still present. The [`Controller`] runs passes for every tracked CSV and writes the resulting
//! statuses back to the cluster.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod controller;
mod reconciler;
mod strategy;
mod version;

#[cfg(test)]
mod tests;

pub use self::{
    controller::{Controller, ControllerMetrics},
    reconciler::Reconciler,
    strategy::{DeploymentStrategy, StrategyDeployment, DEPLOYMENT_STRATEGY},
    version::validate as validate_version,
};
