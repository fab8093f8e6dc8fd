#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use olm_install_controller_core as core;
pub use olm_install_controller_k8s_api as k8s;
pub use olm_install_controller_k8s_apply as apply;
pub use olm_install_controller_k8s_index as index;
pub use olm_install_controller_k8s_status as status;

mod args;
mod lease;
mod watch;

pub use self::args::Args;
