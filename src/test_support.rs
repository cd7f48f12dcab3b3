use crate::domain::{CommandOutput, ImageRuntime, PullPolicy, Version};
use crate::error::{Error, ExecError, Result};
use crate::infra::AssetStore;
use anyhow::anyhow;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

/// Runtime double recording every call as `operation:arguments`.
#[derive(Debug)]
pub struct MockRuntime {
    version: Version,
    store: RwLock<HashMap<String, String>>,
    commands: RwLock<Vec<String>>,
    fail_on: RwLock<HashSet<String>>,
    fail_matching: RwLock<Vec<String>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::with_version("1.30.0")
    }

    pub fn with_version(version: &str) -> Self {
        Self {
            version: Version::parse(version).unwrap(),
            store: RwLock::new(HashMap::new()),
            commands: RwLock::new(Vec::new()),
            fail_on: RwLock::new(HashSet::new()),
            fail_matching: RwLock::new(Vec::new()),
        }
    }

    /// Puts an image manifest in the store so `cat_manifest` finds it.
    pub fn add_image(&self, image: &str, manifest_json: &str) {
        self.store
            .write()
            .unwrap()
            .insert(image.to_string(), manifest_json.to_string());
    }

    pub fn has_image(&self, image: &str) -> bool {
        self.store.read().unwrap().contains_key(image)
    }

    /// Fails every call of `operation` (`fetch`, `run`, ...).
    pub fn set_fail_on(&self, operation: &str) {
        self.fail_on.write().unwrap().insert(operation.to_string());
    }

    /// Fails every call whose recorded command contains `pattern`.
    pub fn set_fail_matching(&self, pattern: &str) {
        self.fail_matching.write().unwrap().push(pattern.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_on.write().unwrap().clear();
        self.fail_matching.write().unwrap().clear();
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }

    pub fn commands_for(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{operation}:");
        self.get_commands()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }

    fn record(&self, operation: &str, args: &str) -> std::result::Result<(), ExecError> {
        let cmd = format!("{operation}:{args}");
        self.commands.write().unwrap().push(cmd.clone());

        let fails = self.fail_on.read().unwrap().contains(operation)
            || self
                .fail_matching
                .read()
                .unwrap()
                .iter()
                .any(|p| cmd.contains(p.as_str()));

        if fails {
            return Err(ExecError::Failed {
                command: cmd,
                status: "exit status: 1".to_string(),
                stdout: String::new(),
                stderr: format!("mock failure on {operation}"),
            });
        }
        Ok(())
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageRuntime for MockRuntime {
    fn version(&self) -> &Version {
        &self.version
    }

    fn fetch(&self, image: &str, pull_policy: PullPolicy) -> Result<String> {
        self.record("fetch", &format!("{image} {pull_policy}"))
            .map_err(|cause| Error::Fetch {
                image: image.to_string(),
                cause,
            })?;
        Ok(format!("sha512-{:016x}", image.len()))
    }

    fn fetch_insecure(&self, image: &str) -> Result<String> {
        self.record("fetch_insecure", image)
            .map_err(|cause| Error::Fetch {
                image: image.to_string(),
                cause,
            })?;
        Ok(format!("sha512-{:016x}", image.len()))
    }

    fn cat_manifest(&self, image: &str) -> Result<String> {
        self.record("cat_manifest", image)
            .map_err(|cause| Error::CatManifest {
                image: image.to_string(),
                cause,
            })?;

        self.store
            .read()
            .unwrap()
            .get(image)
            .cloned()
            .ok_or_else(|| Error::CatManifest {
                image: image.to_string(),
                cause: ExecError::Failed {
                    command: format!("cat_manifest:{image}"),
                    status: "exit status: 254".to_string(),
                    stdout: String::new(),
                    stderr: format!("image {image} not found"),
                },
            })
    }

    fn image_rm(&self, images: &[String]) -> Result<()> {
        self.record("image_rm", &images.join(" "))
            .map_err(|cause| Error::ImageRm {
                images: images.join(" "),
                cause,
            })?;
        let mut store = self.store.write().unwrap();
        for image in images {
            store.remove(image);
        }
        Ok(())
    }

    fn rm(&self, uuids: &[String]) -> Result<CommandOutput> {
        self.record("rm", &uuids.join(" ")).map_err(|cause| Error::Rm {
            uuids: uuids.join(" "),
            cause,
        })?;
        Ok(CommandOutput::default())
    }

    fn rm_from_file(&self, path: &Path) -> Result<CommandOutput> {
        self.record("rm_from_file", &path.to_string_lossy())
            .map_err(|cause| Error::RmFromFile {
                path: path.to_path_buf(),
                cause,
            })?;
        Ok(CommandOutput::default())
    }

    fn run(&self, args: &[String]) -> Result<()> {
        self.record("run", &args.join(" "))
            .map_err(|cause| Error::Run { cause })
    }
}

/// In-memory asset store.
#[derive(Debug, Default)]
pub struct MemoryAssets {
    assets: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_internal_images() -> Self {
        let assets = Self::new();
        assets.insert("aci-builder.aci", b"builder-image".to_vec());
        assets.insert("aci-tester.aci", b"tester-image".to_vec());
        assets
    }

    pub fn insert(&self, name: &str, payload: Vec<u8>) {
        self.assets
            .write()
            .unwrap()
            .insert(name.to_string(), payload);
    }
}

impl AssetStore for MemoryAssets {
    fn asset(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        self.assets
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("Cannot find internal asset {name}"))
    }
}

/// Minimal `image cat-manifest` output for `name:version`.
pub fn image_manifest_json(name: &str, version: &str) -> String {
    format!(
        r#"{{"acKind":"ImageManifest","acVersion":"0.8.11","name":"{name}","labels":[{{"name":"version","value":"{version}"}}]}}"#
    )
}
