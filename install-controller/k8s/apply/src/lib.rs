//! Writes objects to the control plane.
//!
//! [`ApplyClient::apply`] creates an object, replacing an existing object with the same identity
//! by deleting it and creating it again. [`ApplyClient::replace`] updates an object in place.
//! Neither retries: every failure is returned to the caller, who decides whether the next
//! reconciliation pass should try again.
//!
//! Writes go through a [`Transport`], so the client can be exercised without a cluster.
//! [`KubeTransport`] is the production transport.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod client;
mod transport;


pub use self::{
    client::ApplyClient,
    transport::{classify, KubeTransport, Transport},
};
