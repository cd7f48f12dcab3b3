pub mod cli;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

// Runtime and asset doubles, shared with the integration tests
pub mod test_support;

pub use domain::{
    AcFullName, AciManifest, ImageManifest, ImageRuntime, InsecureOptions, PodManifest,
    PullPolicy, Version,
};
pub use error::{Error, ExecError, Result};
pub use infra::{RuntimeClient, RuntimeConfig};
pub use services::{Aci, AciState, BuildContext, Pod};
