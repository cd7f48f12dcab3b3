use crate::domain::{InsecureOptions, PullPolicy};
use crate::infra::runtime_client::RuntimeConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_TOML_NAME: &str = "acibox.toml";
pub const DEFAULT_ASSETS_DIR: &str = "bindata";

pub fn default_config_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/root"))
        .join(".config/acibox")
}

/// `[runtime]` table; every key is optional so layers can be merged.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct RuntimeSection {
    pub path: Option<PathBuf>,
    pub insecure_options: Option<InsecureOptions>,
    pub dir: Option<PathBuf>,
    pub local_config: Option<PathBuf>,
    pub system_config: Option<PathBuf>,
    pub user_config: Option<PathBuf>,
    pub pull_policy: Option<PullPolicy>,
    pub trust_keys_from_https: Option<bool>,
    pub no_store: Option<bool>,
    pub store_only: Option<bool>,
}

impl RuntimeSection {
    pub fn merge(&mut self, other: RuntimeSection) {
        if other.path.is_some() {
            self.path = other.path;
        }
        if other.insecure_options.is_some() {
            self.insecure_options = other.insecure_options;
        }
        if other.dir.is_some() {
            self.dir = other.dir;
        }
        if other.local_config.is_some() {
            self.local_config = other.local_config;
        }
        if other.system_config.is_some() {
            self.system_config = other.system_config;
        }
        if other.user_config.is_some() {
            self.user_config = other.user_config;
        }
        if other.pull_policy.is_some() {
            self.pull_policy = other.pull_policy;
        }
        if other.trust_keys_from_https.is_some() {
            self.trust_keys_from_https = other.trust_keys_from_https;
        }
        if other.no_store.is_some() {
            self.no_store = other.no_store;
        }
        if other.store_only.is_some() {
            self.store_only = other.store_only;
        }
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            path: self.path.as_deref().map(expand),
            insecure_options: self.insecure_options.clone().unwrap_or_default(),
            dir: self.dir.as_deref().map(expand),
            local_config: self.local_config.as_deref().map(expand),
            system_config: self.system_config.as_deref().map(expand),
            user_config: self.user_config.as_deref().map(expand),
            pull_policy: self.pull_policy,
            trust_keys_from_https: self.trust_keys_from_https.unwrap_or(false),
            no_store: self.no_store.unwrap_or(false),
            store_only: self.store_only.unwrap_or(false),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Relocates every build output under `<dir>/<short name>`
    pub target_work_dir: Option<PathBuf>,
    /// Directory holding the internal builder/tester images
    pub assets_dir: Option<PathBuf>,
    #[serde(default)]
    pub runtime: RuntimeSection,
}

impl AppConfig {
    /// Merges another AppConfig into self.
    /// Values from `other` overwrite values in `self` if present.
    pub fn merge(&mut self, other: AppConfig) {
        if let Some(dir) = other.target_work_dir {
            self.target_work_dir = Some(dir);
        }
        if let Some(dir) = other.assets_dir {
            self.assets_dir = Some(dir);
        }
        self.runtime.merge(other.runtime);
    }

    pub fn target_work_dir(&self) -> Option<PathBuf> {
        self.target_work_dir.as_deref().map(expand)
    }

    pub fn assets_dir(&self, config_dir: &Path) -> PathBuf {
        self.assets_dir
            .as_deref()
            .map(expand)
            .unwrap_or_else(|| config_dir.join(DEFAULT_ASSETS_DIR))
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path.to_string_lossy().as_ref()).into_owned())
}

fn read_config_file(path: &Path) -> Result<Option<AppConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("parsing {:?}", path))?;
    debug!("Loaded config {:?}", path);
    Ok(Some(config))
}

/// Global config from `config_dir`, overridden by `./acibox.toml`.
pub fn load_app_config(config_dir: &Path) -> Result<AppConfig> {
    load_app_config_from(config_dir, Path::new("."))
}

pub fn load_app_config_from(config_dir: &Path, local_dir: &Path) -> Result<AppConfig> {
    let mut app_config =
        read_config_file(&config_dir.join(DEFAULT_CONFIG_TOML_NAME))?.unwrap_or_default();

    if let Some(local) = read_config_file(&local_dir.join(DEFAULT_CONFIG_TOML_NAME))? {
        app_config.merge(local);
    }

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InsecureOption;

    #[test]
    fn parses_full_config() {
        let toml = r#"
target_work_dir = "/tmp/acibox"
assets_dir = "/opt/acibox/bindata"

[runtime]
path = "/usr/bin/rkt"
insecure_options = ["image", "TLS"]
pull_policy = "update"
no_store = true
"#;

        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.target_work_dir(), Some(PathBuf::from("/tmp/acibox")));

        let runtime = config.runtime.to_runtime_config();
        assert_eq!(runtime.path, Some(PathBuf::from("/usr/bin/rkt")));
        assert!(runtime.insecure_options.contains(InsecureOption::Tls));
        assert_eq!(runtime.pull_policy, Some(PullPolicy::Update));
        assert!(runtime.no_store);
        assert!(!runtime.store_only);
    }

    #[test]
    fn rejects_invalid_pull_policy() {
        let toml = r#"
[runtime]
pull_policy = "always"
"#;
        assert!(toml::from_str::<AppConfig>(toml).is_err());
    }

    #[test]
    fn rejects_unknown_insecure_option() {
        let toml = r#"
[runtime]
insecure_options = ["image", "yolo"]
"#;
        assert!(toml::from_str::<AppConfig>(toml).is_err());
    }

    #[test]
    fn local_config_overrides_global() {
        let global = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();

        fs::write(
            global.path().join(DEFAULT_CONFIG_TOML_NAME),
            r#"
target_work_dir = "/global/target"
[runtime]
path = "/global/rkt"
store_only = true
"#,
        )
        .unwrap();
        fs::write(
            local.path().join(DEFAULT_CONFIG_TOML_NAME),
            r#"
[runtime]
path = "/local/rkt"
"#,
        )
        .unwrap();

        let config = load_app_config_from(global.path(), local.path()).unwrap();
        assert_eq!(config.target_work_dir(), Some(PathBuf::from("/global/target")));
        assert_eq!(config.runtime.path, Some(PathBuf::from("/local/rkt")));
        assert_eq!(config.runtime.store_only, Some(true));
    }

    #[test]
    fn missing_files_give_defaults() {
        let empty = tempfile::tempdir().unwrap();
        let config = load_app_config_from(empty.path(), empty.path()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.assets_dir(Path::new("/etc/acibox")),
            PathBuf::from("/etc/acibox/bindata")
        );
    }
}
