#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod deadline;
mod error;
mod identity;

pub use self::{
    deadline::within,
    error::{Error, Result},
    identity::{GroupKind, Identity},
};

/// The field manager and controller name used for all writes.
pub const INSTALL_CONTROLLER_NAME: &str = "olm.operators.coreos.com/install-controller";
