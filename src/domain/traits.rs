use super::{ImageManifest, PullPolicy, Version};
use crate::error::{Error, Result};
use std::fmt::Debug;
use std::path::Path;

/// Captured streams of a runtime invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Trait for image runtime operations
pub trait ImageRuntime: Send + Sync + Debug {
    /// Version detected when the runtime was set up
    fn version(&self) -> &Version;

    /// Fetch an image into the store, returning its content hash
    fn fetch(&self, image: &str, pull_policy: PullPolicy) -> Result<String>;

    /// Fetch an image accepting unsigned content for this call only
    fn fetch_insecure(&self, image: &str) -> Result<String>;

    /// Raw manifest of a stored image
    fn cat_manifest(&self, image: &str) -> Result<String>;

    /// Remove images from the store
    fn image_rm(&self, images: &[String]) -> Result<()>;

    /// Remove pods by uuid
    fn rm(&self, uuids: &[String]) -> Result<CommandOutput>;

    /// Remove pods whose uuid is stored in `path`
    fn rm_from_file(&self, path: &Path) -> Result<CommandOutput>;

    /// Run a pod with the terminal attached
    fn run(&self, args: &[String]) -> Result<()>;

    /// Parsed manifest of a stored image
    fn get_manifest(&self, image: &str) -> Result<ImageManifest> {
        let content = self.cat_manifest(image)?;
        serde_json::from_str(&content).map_err(|cause| Error::ManifestUnmarshal { content, cause })
    }
}
