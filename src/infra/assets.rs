use anyhow::{Context, Result};
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of the bundled internal images.
pub trait AssetStore: Send + Sync + Debug {
    /// Payload stored under `name`
    fn asset(&self, name: &str) -> Result<Vec<u8>>;
}

/// Assets laid out as plain files in one directory.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetStore for DirAssetStore {
    fn asset(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        fs::read(&path).with_context(|| format!("Cannot find internal asset {:?}", path))
    }
}
