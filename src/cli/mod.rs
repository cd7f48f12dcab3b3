pub mod build;
pub mod context;
pub mod runtime;

pub use build::{Lifecycle, TargetArgs};
pub use context::{CliContext, RuntimeFlags};
pub use runtime::RuntimeAction;
