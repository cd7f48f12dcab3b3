use crate::domain::ImageRuntime;
use crate::infra::AssetStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a build step needs from the outside world.
///
/// Built once by the caller and handed to each `Pod`/`Aci`; cloning only
/// bumps the reference counts.
#[derive(Debug, Clone)]
pub struct BuildContext {
    runtime: Arc<dyn ImageRuntime>,
    assets: Arc<dyn AssetStore>,
    target_work_dir: Option<PathBuf>,
}

impl BuildContext {
    pub fn new(runtime: Arc<dyn ImageRuntime>, assets: Arc<dyn AssetStore>) -> Self {
        Self {
            runtime,
            assets,
            target_work_dir: None,
        }
    }

    pub fn with_target_work_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.target_work_dir = dir;
        self
    }

    pub fn runtime(&self) -> &Arc<dyn ImageRuntime> {
        &self.runtime
    }

    pub fn assets(&self) -> &Arc<dyn AssetStore> {
        &self.assets
    }

    pub fn target_work_dir(&self) -> Option<&Path> {
        self.target_work_dir.as_deref()
    }
}
