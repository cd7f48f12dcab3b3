pub mod manifest;
pub mod options;
pub mod traits;
mod version;

pub use manifest::{
    AcFullName, AciDefinition, AciManifest, Annotation, BuilderDefinition, ImageManifest,
    PodDefinition, PodManifest, RuntimeApp,
};
pub use options::{DiscoveryInsecure, InsecureOption, InsecureOptions, PullPolicy};
pub use traits::{CommandOutput, ImageRuntime};
pub use version::Version;
