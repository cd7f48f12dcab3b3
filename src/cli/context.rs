use crate::domain::{ImageRuntime, InsecureOptions, PullPolicy};
use crate::infra::config::{AppConfig, RuntimeSection, load_app_config};
use crate::infra::{DirAssetStore, RuntimeClient};
use crate::services::BuildContext;
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Runtime options accepted on the command line; they win over acibox.toml.
#[derive(Args, Debug, Default, Clone)]
pub struct RuntimeFlags {
    /// Path to the runtime binary
    #[arg(long = "rkt-path", env = "ACIBOX_RKT_PATH", global = true)]
    pub path: Option<PathBuf>,

    /// Comma separated insecure options (image,tls,ondisk,http,...)
    #[arg(long, global = true)]
    pub insecure_options: Option<InsecureOptions>,

    /// Runtime data directory
    #[arg(long = "rkt-dir", global = true)]
    pub dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub local_config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub system_config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub user_config: Option<PathBuf>,

    /// Pull policy for fetches (overrides the per-call policy)
    #[arg(long, value_enum, global = true)]
    pub pull_policy: Option<PullPolicy>,

    #[arg(long, global = true)]
    pub trust_keys_from_https: bool,

    #[arg(long, global = true)]
    pub no_store: bool,

    #[arg(long, global = true)]
    pub store_only: bool,

    /// Put build outputs under <dir>/<image short name>
    #[arg(long, env = "ACIBOX_TARGET_WORK_DIR", global = true)]
    pub target_work_dir: Option<PathBuf>,
}

impl RuntimeFlags {
    fn as_config(&self) -> AppConfig {
        let flag = |set: bool| set.then_some(true);
        AppConfig {
            target_work_dir: self.target_work_dir.clone(),
            assets_dir: None,
            runtime: RuntimeSection {
                path: self.path.clone(),
                insecure_options: self.insecure_options.clone(),
                dir: self.dir.clone(),
                local_config: self.local_config.clone(),
                system_config: self.system_config.clone(),
                user_config: self.user_config.clone(),
                pull_policy: self.pull_policy,
                trust_keys_from_https: flag(self.trust_keys_from_https),
                no_store: flag(self.no_store),
                store_only: flag(self.store_only),
            },
        }
    }
}

/// Config resolved from files and flags, plus the runtime built from it.
pub struct CliContext {
    pub config_dir: PathBuf,
    pub config: AppConfig,
    pub runtime: Arc<RuntimeClient>,
}

impl CliContext {
    pub fn load(config_dir: &Path, flags: &RuntimeFlags) -> Result<Self> {
        let mut config = load_app_config(config_dir)?;
        config.merge(flags.as_config());
        debug!("Effective config: {:?}", config);

        let runtime = RuntimeClient::new(config.runtime.to_runtime_config())
            .context("Cannot set up the container runtime")?;

        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            config,
            runtime: Arc::new(runtime),
        })
    }

    pub fn build_context(&self) -> BuildContext {
        let runtime: Arc<dyn ImageRuntime> = self.runtime.clone();
        let assets = Arc::new(DirAssetStore::new(self.config.assets_dir(&self.config_dir)));
        BuildContext::new(runtime, assets).with_target_work_dir(self.config.target_work_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_flags_do_not_override_files() {
        let mut config = AppConfig {
            runtime: RuntimeSection {
                no_store: Some(true),
                path: Some(PathBuf::from("/opt/rkt")),
                ..Default::default()
            },
            ..Default::default()
        };

        config.merge(RuntimeFlags::default().as_config());

        assert_eq!(config.runtime.no_store, Some(true));
        assert_eq!(config.runtime.path, Some(PathBuf::from("/opt/rkt")));
    }

    #[test]
    fn set_flags_override_files() {
        let mut config = AppConfig::default();
        let flags = RuntimeFlags {
            store_only: true,
            pull_policy: Some(PullPolicy::Never),
            insecure_options: Some("tls".parse().unwrap()),
            ..Default::default()
        };

        config.merge(flags.as_config());
        let runtime = config.runtime.to_runtime_config();

        assert!(runtime.store_only);
        assert_eq!(runtime.pull_policy, Some(PullPolicy::Never));
        assert_eq!(runtime.insecure_options.encode(), "tls");
    }
}
