use crate::domain::{AcFullName, AciDefinition, AciManifest, PodManifest, RuntimeApp};
use crate::error::Error;
use crate::services::aci::PATH_TARGET;
use crate::services::{Aci, BuildContext};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const POD_MANIFEST: &str = "acibox-pod-manifest.yml";

/// A pod directory: a manifest listing apps, each built as its own ACI.
#[derive(Debug)]
pub struct Pod {
    path: PathBuf,
    target: PathBuf,
    manifest: PodManifest,
    ctx: BuildContext,
}

impl Pod {
    pub fn new(path: impl AsRef<Path>, ctx: BuildContext) -> Result<Self> {
        let path = path.as_ref();
        let full_path = std::path::absolute(path)
            .with_context(|| format!("Cannot get fullpath of {:?}", path))?;

        let manifest = read_pod_manifest(&full_path.join(POD_MANIFEST))
            .context("Failed to read pod manifest")?;

        let target = match ctx.target_work_dir() {
            Some(dir) => std::path::absolute(dir.join(manifest.name.short_name()))
                .with_context(|| format!("Invalid target path under {:?}", dir))?,
            None => full_path.join(PATH_TARGET),
        };

        debug!("Loaded pod {} from {:?}", manifest.name, full_path);

        Ok(Self {
            path: full_path,
            target,
            manifest,
            ctx,
        })
    }

    pub fn manifest(&self) -> &PodManifest {
        &self.manifest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Standalone ACI manifest for one app of the pod.
    pub fn to_aci_manifest(&self, app: &RuntimeApp) -> AciManifest {
        let name = AcFullName::from_parts(
            &format!("{}_{}", self.manifest.name.name(), app.name),
            self.manifest.name.version(),
        );

        AciManifest {
            name,
            aci: AciDefinition {
                annotations: app.annotations.clone(),
                app: app.app.clone(),
                dependencies: app.dependencies.clone(),
                path_whitelist: Vec::new(),
            },
            builder: self.manifest.builder.clone(),
            tester: self.manifest.tester.clone(),
        }
    }

    fn app_aci(&self, app: &RuntimeApp) -> Result<Aci> {
        let mut aci = Aci::with_manifest(
            self.path.join(&app.name),
            self.ctx.clone(),
            self.to_aci_manifest(app),
        )
        .with_context(|| format!("Cannot prepare aci {}", app.name))?;
        aci.set_pod_name(self.manifest.name.clone());
        Ok(aci)
    }

    /// Cleans every app then the pod target; problems are only logged.
    pub fn clean(&self) {
        info!("Cleaning pod {}", self.manifest.name);

        for app in &self.manifest.pod.apps {
            match self.app_aci(app) {
                Ok(mut aci) => aci.clean(),
                Err(e) => warn!("Skipping clean of {}: {:#}", app.name, e),
            }
        }

        match fs::remove_dir_all(&self.target) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Cannot remove directory {:?}: {}", self.target, e),
        }
    }

    /// Builds apps in manifest order, stopping at the first failure.
    pub fn build(&self) -> Result<()> {
        info!("Building pod {}", self.manifest.name);

        for app in &self.manifest.pod.apps {
            self.app_aci(app)?.build()?;
        }

        fs::create_dir_all(&self.target)
            .with_context(|| format!("Cannot create target {:?}", self.target))?;
        let manifest_json = serde_json::to_string_pretty(&self.manifest)
            .context("Failed to serialize pod manifest")?;
        fs::write(self.target.join("pod-manifest.json"), manifest_json)
            .with_context(|| format!("Cannot write pod manifest into {:?}", self.target))?;

        info!("Built pod {}", self.manifest.name);
        Ok(())
    }

    /// Installs every app image; returns their hashes in manifest order.
    pub fn install(&self) -> Result<Vec<String>> {
        info!("Installing pod {}", self.manifest.name);

        let mut hashes = Vec::with_capacity(self.manifest.pod.apps.len());
        for app in &self.manifest.pod.apps {
            hashes.push(self.app_aci(app)?.install()?);
        }
        Ok(hashes)
    }

    /// Tests apps in manifest order; the first failure ends the run and is
    /// returned as is.
    pub fn test(&self) -> Result<()> {
        info!("Testing pod {}", self.manifest.name);

        for app in &self.manifest.pod.apps {
            let mut aci = self.app_aci(app)?;
            aci.test()?;
        }
        Ok(())
    }
}

/// Reads a pod manifest, naming anonymous apps after their first dependency.
pub fn read_pod_manifest(manifest_path: &Path) -> Result<PodManifest> {
    let source = fs::read_to_string(manifest_path)
        .with_context(|| format!("reading {:?}", manifest_path))?;
    let mut manifest: PodManifest = serde_yml::from_str(&source)
        .with_context(|| format!("parsing {:?}", manifest_path))?;

    resolve_app_names(&mut manifest)?;
    Ok(manifest)
}

pub fn resolve_app_names(manifest: &mut PodManifest) -> Result<(), Error> {
    let pod = manifest.name.to_string();
    let mut names = HashSet::new();

    for (index, app) in manifest.pod.apps.iter_mut().enumerate() {
        if app.name.is_empty() {
            let first = app
                .dependencies
                .first()
                .ok_or_else(|| Error::UnnamedApp {
                    pod: pod.clone(),
                    index,
                })?;
            app.name = first.short_name().to_string();
        }

        if !names.insert(app.name.clone()) {
            return Err(Error::DuplicateApp {
                pod,
                name: app.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_manifest(name: &str, apps: Vec<RuntimeApp>) -> PodManifest {
        let mut manifest = PodManifest {
            name: AcFullName::new(name),
            ..Default::default()
        };
        manifest.pod.apps = apps;
        manifest
    }

    fn app(name: &str, deps: &[&str]) -> RuntimeApp {
        RuntimeApp {
            name: name.to_string(),
            dependencies: deps.iter().map(|d| AcFullName::new(*d)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn unnamed_app_takes_first_dependency_short_name() {
        let mut manifest = pod_manifest(
            "acme:1.0.0",
            vec![app("", &["example.com/foo", "example.com/bar"])],
        );

        resolve_app_names(&mut manifest).unwrap();

        assert_eq!(manifest.pod.apps[0].name, "foo");
    }

    #[test]
    fn versioned_dependency_name_drops_version() {
        let mut manifest = pod_manifest("acme:1.0.0", vec![app("", &["example.com/foo:2.1"])]);
        resolve_app_names(&mut manifest).unwrap();
        assert_eq!(manifest.pod.apps[0].name, "foo");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut manifest = pod_manifest(
            "acme:1.0.0",
            vec![app("foo", &[]), app("", &["example.com/foo"])],
        );

        let err = resolve_app_names(&mut manifest).unwrap_err();
        assert!(matches!(err, Error::DuplicateApp { ref name, .. } if name == "foo"));
    }

    #[test]
    fn nameless_app_without_dependency_is_rejected() {
        let mut manifest = pod_manifest("acme:1.0.0", vec![app("", &[])]);

        let err = resolve_app_names(&mut manifest).unwrap_err();
        assert!(matches!(err, Error::UnnamedApp { index: 0, .. }));
    }
}
