use crate::domain::{AcFullName, AciManifest, PullPolicy, Version, manifest::annotation};
use crate::services::{BuildContext, Tooling};
use anyhow::{Context, Result, bail};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ACI_MANIFEST: &str = "acibox-manifest.yml";
pub const PATH_TARGET: &str = "target";
pub const PATH_TESTS: &str = "tests";
pub const PATH_IMAGE_ACI: &str = "image.aci";
pub const PATH_MANIFEST_JSON: &str = "manifest.json";
pub const PATH_TEST_RESULT: &str = "test-result";

/// Annotation carried by builder images: lowest tool version able to drive them.
pub const TOOL_VERSION_ANNOTATION: &str = "acibox-version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AciState {
    Unbuilt,
    Cleaned,
    Built,
    BuildFailed,
    Tested,
    TestFailed,
}

/// One application image and its build/test lifecycle.
#[derive(Debug)]
pub struct Aci {
    path: PathBuf,
    target: PathBuf,
    manifest: AciManifest,
    pod_name: Option<AcFullName>,
    ctx: BuildContext,
    state: AciState,
}

impl Aci {
    /// Loads `<path>/acibox-manifest.yml`.
    pub fn new(path: impl AsRef<Path>, ctx: BuildContext) -> Result<Self> {
        let path = path.as_ref();
        let manifest_path = path.join(ACI_MANIFEST);
        let content = fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read aci manifest {:?}", manifest_path))?;
        let manifest: AciManifest = serde_yml::from_str(&content)
            .with_context(|| format!("Failed to parse aci manifest {:?}", manifest_path))?;

        Self::with_manifest(path, ctx, manifest)
    }

    pub fn with_manifest(
        path: impl AsRef<Path>,
        ctx: BuildContext,
        manifest: AciManifest,
    ) -> Result<Self> {
        let path = std::path::absolute(path.as_ref())
            .with_context(|| format!("Cannot get fullpath of {:?}", path.as_ref()))?;

        let target = match ctx.target_work_dir() {
            Some(dir) => std::path::absolute(dir.join(manifest.name.short_name()))
                .with_context(|| format!("Invalid target path under {:?}", dir))?,
            None => path.join(PATH_TARGET),
        };

        Ok(Self {
            path,
            target,
            manifest,
            pod_name: None,
            ctx,
            state: AciState::Unbuilt,
        })
    }

    pub fn set_pod_name(&mut self, pod_name: AcFullName) {
        self.pod_name = Some(pod_name);
    }

    pub fn pod_name(&self) -> Option<&AcFullName> {
        self.pod_name.as_ref()
    }

    pub fn name(&self) -> &AcFullName {
        &self.manifest.name
    }

    pub fn manifest(&self) -> &AciManifest {
        &self.manifest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn state(&self) -> AciState {
        self.state
    }

    pub fn image_path(&self) -> PathBuf {
        self.target.join(PATH_IMAGE_ACI)
    }

    fn label(&self) -> String {
        match &self.pod_name {
            Some(pod) => format!("{} (pod {})", self.manifest.name, pod),
            None => self.manifest.name.to_string(),
        }
    }

    /// Removes the target directory. Never fails: problems are logged.
    pub fn clean(&mut self) {
        debug!("Cleaning {}", self.label());

        self.check_compatibility_versions();
        self.check_latest_versions();

        match fs::remove_dir_all(&self.target) {
            Ok(()) => debug!("Removed {:?}", self.target),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Cannot remove directory {:?}: {}", self.target, e),
        }

        self.state = AciState::Cleaned;
    }

    pub fn build(&mut self) -> Result<()> {
        info!("Building {}", self.label());
        self.clean();

        match self.build_in_target() {
            Ok(()) => {
                self.state = AciState::Built;
                info!("Built {}", self.label());
                Ok(())
            }
            Err(e) => {
                self.state = AciState::BuildFailed;
                Err(e)
            }
        }
    }

    fn build_in_target(&mut self) -> Result<()> {
        Tooling::new(&self.ctx).import_builder_if_needed(&mut self.manifest)?;

        fs::create_dir_all(&self.target)
            .with_context(|| format!("Cannot create target {:?}", self.target))?;

        let manifest_json = serde_json::to_string_pretty(&self.manifest)
            .context("Failed to serialize aci manifest")?;
        fs::write(self.target.join(PATH_MANIFEST_JSON), manifest_json)
            .with_context(|| format!("Cannot write manifest into {:?}", self.target))?;

        let args = vec![
            "--net=host".to_string(),
            format!("--set-env=ACI_NAME={}", self.manifest.name),
            format!("--volume=aci,kind=host,source={}", self.path.display()),
            format!("--volume=target,kind=host,source={}", self.target.display()),
            self.manifest.builder.image.to_string(),
            "--mount=volume=aci,target=/aci".to_string(),
            "--mount=volume=target,target=/target".to_string(),
        ];
        self.ctx
            .runtime()
            .run(&args)
            .with_context(|| format!("Builder failed for {}", self.manifest.name))?;

        let image = self.image_path();
        if !image.exists() {
            bail!("Builder did not produce {:?}", image);
        }
        Ok(())
    }

    /// Builds when needed and imports the image into the runtime store.
    pub fn install(&mut self) -> Result<String> {
        if !self.image_path().exists() {
            self.build()?;
        }

        let image = self.image_path();
        let hash = self
            .ctx
            .runtime()
            .fetch(&image.to_string_lossy(), PullPolicy::New)
            .with_context(|| format!("Failed to install {}", self.manifest.name))?;
        info!("Installed {} as {}", self.manifest.name, hash);
        Ok(hash)
    }

    pub fn test(&mut self) -> Result<()> {
        info!("Testing {}", self.label());

        if !self.image_path().exists() {
            self.build()?;
        }

        let tests_dir = self.path.join(PATH_TESTS);
        if !tests_dir.is_dir() {
            info!("No tests for {}", self.manifest.name);
            self.state = AciState::Tested;
            return Ok(());
        }

        match self.run_tests(&tests_dir) {
            Ok(()) => {
                self.state = AciState::Tested;
                info!("Tests passed for {}", self.manifest.name);
                Ok(())
            }
            Err(e) => {
                self.state = AciState::TestFailed;
                Err(e)
            }
        }
    }

    fn run_tests(&mut self, tests_dir: &Path) -> Result<()> {
        Tooling::new(&self.ctx).import_tester_if_needed(&mut self.manifest)?;

        let result_dir = self.target.join(PATH_TEST_RESULT);
        if result_dir.exists() {
            fs::remove_dir_all(&result_dir)
                .with_context(|| format!("Cannot reset {:?}", result_dir))?;
        }
        fs::create_dir_all(&result_dir)
            .with_context(|| format!("Cannot create {:?}", result_dir))?;

        let image = self.image_path();
        self.ctx
            .runtime()
            .fetch(&image.to_string_lossy(), PullPolicy::New)
            .with_context(|| format!("Failed to import {} for testing", self.manifest.name))?;

        let args = vec![
            "--net=host".to_string(),
            format!("--set-env=ACI_NAME={}", self.manifest.name),
            format!("--volume=tests,kind=host,source={}", tests_dir.display()),
            format!("--volume=result,kind=host,source={}", result_dir.display()),
            self.manifest.tester.image.to_string(),
            "--mount=volume=tests,target=/tests".to_string(),
            "--mount=volume=result,target=/result".to_string(),
            self.manifest.name.to_string(),
        ];
        self.ctx.runtime().run(&args)?;

        let failed = failed_tests(&result_dir)?;
        if !failed.is_empty() {
            bail!(
                "Tests failed for {}: {}",
                self.manifest.name,
                failed.join(", ")
            );
        }
        Ok(())
    }

    fn check_compatibility_versions(&self) {
        let builder = if self.manifest.builder.image.is_empty() {
            super::tooling::ACI_BUILDER.to_string()
        } else {
            self.manifest.builder.image.to_string()
        };

        let manifest = match self.ctx.runtime().get_manifest(&builder) {
            Ok(m) => m,
            Err(e) => {
                debug!("Skipping compatibility check of {}: {}", builder, e);
                return;
            }
        };

        let Some(required) = annotation(&manifest.annotations, TOOL_VERSION_ANNOTATION) else {
            return;
        };
        let (Ok(required), Ok(current)) = (
            Version::parse(required),
            Version::parse(env!("CARGO_PKG_VERSION")),
        ) else {
            return;
        };

        if current.less_than(&required) {
            warn!(
                "Builder {} expects acibox >= {}, running {}",
                builder, required, current
            );
        }
    }

    fn check_latest_versions(&self) {
        for dep in &self.manifest.aci.dependencies {
            if dep.version().is_empty() {
                continue;
            }
            let Ok(stored) = self.ctx.runtime().get_manifest(dep.name()) else {
                continue;
            };
            let (Some(Ok(latest)), Ok(pinned)) = (
                stored.version().map(Version::parse),
                Version::parse(dep.version()),
            ) else {
                continue;
            };

            if pinned.less_than(&latest) {
                warn!(
                    "Newer version of dependency {} available: {}",
                    dep.name(),
                    latest
                );
            }
        }
    }
}

/// Names of tests whose `.status` file holds anything but `0`.
fn failed_tests(result_dir: &Path) -> Result<Vec<String>> {
    let mut failed = Vec::new();

    for entry in fs::read_dir(result_dir).with_context(|| format!("reading {:?}", result_dir))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("status") {
            continue;
        }
        let status = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        if status.trim() != "0" {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            failed.push(name);
        }
    }

    failed.sort();
    Ok(failed)
}
