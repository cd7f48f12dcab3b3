use crate::domain::{AcFullName, AciManifest, PullPolicy};
use crate::services::BuildContext;
use anyhow::{Context, Result};
use std::io::Write;
use tracing::{debug, info};

pub const ACI_BUILDER: &str = "acibox.dev/aci-builder:1";
pub const ACI_TESTER: &str = "acibox.dev/aci-tester:1";
pub const BUILDER_ASSET: &str = "aci-builder.aci";
pub const TESTER_ASSET: &str = "aci-tester.aci";

/// Injects the internal builder/tester images into manifests that do not
/// declare their own.
pub struct Tooling<'a> {
    ctx: &'a BuildContext,
}

impl<'a> Tooling<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self { ctx }
    }

    pub fn import_builder_if_needed(&self, manifest: &mut AciManifest) -> Result<()> {
        if manifest.builder.image.is_empty() {
            self.ensure_internal_image(ACI_BUILDER, BUILDER_ASSET)?;
            manifest.builder.image = AcFullName::new(ACI_BUILDER);
        }
        Ok(())
    }

    pub fn import_tester_if_needed(&self, manifest: &mut AciManifest) -> Result<()> {
        if manifest.tester.image.is_empty() {
            self.ensure_internal_image(ACI_TESTER, TESTER_ASSET)?;
            manifest.tester.image = AcFullName::new(ACI_TESTER);
        }
        Ok(())
    }

    fn ensure_internal_image(&self, image: &str, asset: &str) -> Result<()> {
        if self.ctx.runtime().cat_manifest(image).is_ok() {
            debug!("Internal image {} already in store", image);
            return Ok(());
        }

        info!("Importing internal image {}", image);
        let hash = self.import_internal_aci(asset)?;
        debug!("Imported {} as {}", image, hash);
        Ok(())
    }

    /// Stages the asset in its own temp file; the file goes away when the
    /// handle drops, whatever the fetch outcome.
    fn import_internal_aci(&self, asset: &str) -> Result<String> {
        let content = self
            .ctx
            .assets()
            .asset(asset)
            .with_context(|| format!("Cannot find internal aci {asset}"))?;

        let mut staged = tempfile::Builder::new()
            .prefix("acibox-")
            .suffix(".aci")
            .tempfile()
            .with_context(|| format!("Failed to stage internal aci {asset}"))?;
        staged
            .write_all(&content)
            .and_then(|_| staged.flush())
            .with_context(|| format!("Failed to write internal aci {asset}"))?;

        let path = staged.path().to_string_lossy().into_owned();
        let hash = self
            .ctx
            .runtime()
            .fetch(&path, PullPolicy::New)
            .with_context(|| format!("Failed to import internal aci {asset}"))?;

        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryAssets, MockRuntime, image_manifest_json};
    use std::path::Path;
    use std::sync::Arc;

    fn setup() -> (BuildContext, Arc<MockRuntime>) {
        let mock = Arc::new(MockRuntime::new());
        let ctx = BuildContext::new(mock.clone(), Arc::new(MemoryAssets::with_internal_images()));
        (ctx, mock)
    }

    #[test]
    fn injects_and_imports_builder() {
        let (ctx, mock) = setup();
        let mut manifest = AciManifest::default();

        Tooling::new(&ctx)
            .import_builder_if_needed(&mut manifest)
            .unwrap();

        assert_eq!(manifest.builder.image.as_str(), ACI_BUILDER);
        let fetches = mock.commands_for("fetch");
        assert_eq!(fetches.len(), 1);
        assert!(fetches[0].contains("acibox-"));
        assert!(fetches[0].ends_with(".aci new"));
    }

    #[test]
    fn staged_file_is_removed_after_import() {
        let (ctx, mock) = setup();
        let mut manifest = AciManifest::default();

        Tooling::new(&ctx)
            .import_tester_if_needed(&mut manifest)
            .unwrap();

        let fetch = &mock.commands_for("fetch")[0];
        let staged = fetch
            .trim_start_matches("fetch:")
            .trim_end_matches(" new");
        assert!(!Path::new(staged).exists());
    }

    #[test]
    fn staged_file_is_removed_when_fetch_fails() {
        let (ctx, mock) = setup();
        mock.set_fail_on("fetch");
        let mut manifest = AciManifest::default();

        let err = Tooling::new(&ctx)
            .import_builder_if_needed(&mut manifest)
            .unwrap_err();
        assert!(format!("{err:#}").contains("mock failure on fetch"));

        let fetch = &mock.commands_for("fetch")[0];
        let staged = fetch
            .trim_start_matches("fetch:")
            .trim_end_matches(" new");
        assert!(!Path::new(staged).exists());
    }

    #[test]
    fn each_import_uses_its_own_file() {
        let (ctx, mock) = setup();
        let tooling = Tooling::new(&ctx);

        tooling
            .import_builder_if_needed(&mut AciManifest::default())
            .unwrap();
        tooling
            .import_tester_if_needed(&mut AciManifest::default())
            .unwrap();

        let fetches = mock.commands_for("fetch");
        assert_eq!(fetches.len(), 2);
        assert_ne!(fetches[0], fetches[1]);
    }

    #[test]
    fn failed_import_leaves_manifest_untouched() {
        let (ctx, mock) = setup();
        mock.set_fail_on("fetch");
        let mut manifest = AciManifest::default();

        assert!(
            Tooling::new(&ctx)
                .import_builder_if_needed(&mut manifest)
                .is_err()
        );
        assert!(manifest.builder.image.is_empty());
    }

    #[test]
    fn declared_builder_is_left_alone() {
        let (ctx, mock) = setup();
        let mut manifest = AciManifest::default();
        manifest.builder.image = AcFullName::new("example.com/my-builder:3");

        Tooling::new(&ctx)
            .import_builder_if_needed(&mut manifest)
            .unwrap();

        assert_eq!(manifest.builder.image.as_str(), "example.com/my-builder:3");
        assert!(mock.get_commands().is_empty());
    }

    #[test]
    fn skips_import_when_image_already_stored() {
        let (ctx, mock) = setup();
        mock.add_image(ACI_TESTER, &image_manifest_json("acibox.dev/aci-tester", "1"));
        let mut manifest = AciManifest::default();

        Tooling::new(&ctx)
            .import_tester_if_needed(&mut manifest)
            .unwrap();

        assert_eq!(manifest.tester.image.as_str(), ACI_TESTER);
        assert!(mock.commands_for("fetch").is_empty());
    }

    #[test]
    fn injection_is_idempotent() {
        let (ctx, mock) = setup();
        let mut manifest = AciManifest::default();
        let tooling = Tooling::new(&ctx);

        tooling.import_builder_if_needed(&mut manifest).unwrap();
        let after_first = mock.get_commands().len();
        tooling.import_builder_if_needed(&mut manifest).unwrap();

        assert_eq!(mock.get_commands().len(), after_first);
        assert_eq!(manifest.builder.image.as_str(), ACI_BUILDER);
    }

    #[test]
    fn missing_asset_is_an_error() {
        let mock = Arc::new(MockRuntime::new());
        let ctx = BuildContext::new(mock.clone(), Arc::new(MemoryAssets::new()));

        let err = Tooling::new(&ctx)
            .import_builder_if_needed(&mut AciManifest::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains(BUILDER_ASSET));
        assert!(mock.commands_for("fetch").is_empty());
    }
}
