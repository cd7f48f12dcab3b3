pub mod aci;
mod context;
pub mod pod;
pub mod tooling;

pub use aci::{Aci, AciState};
pub use context::BuildContext;
pub use pod::Pod;
pub use tooling::Tooling;
