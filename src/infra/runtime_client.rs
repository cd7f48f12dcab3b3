use crate::domain::{
    CommandOutput, ImageRuntime, InsecureOption, InsecureOptions, PullPolicy, Version,
};
use crate::error::{Error, ExecError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

pub const DEFAULT_BINARY: &str = "rkt";
pub const SUPPORTED_VERSION: &str = "1.4.0";
pub const VERSION_WITH_PULL_POLICY: &str = "1.24.0";
const VERSION_LINE_PREFIX: &str = "rkt Version:";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub path: Option<PathBuf>,
    pub insecure_options: InsecureOptions,
    pub dir: Option<PathBuf>,
    pub local_config: Option<PathBuf>,
    pub system_config: Option<PathBuf>,
    pub user_config: Option<PathBuf>,
    pub pull_policy: Option<PullPolicy>,
    pub trust_keys_from_https: bool,
    pub no_store: bool,
    pub store_only: bool,
}

impl RuntimeConfig {
    pub fn binary(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_BINARY.to_string())
    }

    /// Options passed to every invocation, binary excluded.
    fn global_args(&self, insecure_options: &InsecureOptions) -> Vec<String> {
        let mut args = Vec::new();

        if tracing::enabled!(tracing::Level::DEBUG) {
            args.push("--debug".to_string());
        }
        if self.trust_keys_from_https {
            args.push("--trust-keys-from-https".to_string());
        }
        if let Some(dir) = &self.user_config {
            args.push(format!("--user-config={}", dir.display()));
        }
        if let Some(dir) = &self.local_config {
            args.push(format!("--local-config={}", dir.display()));
        }
        if let Some(dir) = &self.system_config {
            args.push(format!("--system-config={}", dir.display()));
        }
        if let Some(dir) = &self.dir {
            args.push(format!("--dir={}", dir.display()));
        }
        args.push(format!("--insecure-options={}", insecure_options.encode()));
        args
    }
}

/// Client driving the runtime binary.
///
/// The version is probed once at construction; every other call is a single
/// blocking invocation of the binary.
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    version: Version,
    config: RuntimeConfig,
    binary: String,
    global_args: Vec<String>,
}

impl RuntimeClient {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let binary = config.binary();
        let version = probe_version(&binary)?;
        let required = Version::parse(SUPPORTED_VERSION)?;

        if version.less_than(&required) {
            return Err(Error::UnsupportedVersion {
                current: version,
                required,
            });
        }

        Ok(Self::with_version(config, version))
    }

    /// Builds a client for an already known runtime version.
    pub fn with_version(mut config: RuntimeConfig, version: Version) -> Self {
        if config.insecure_options.is_empty() {
            config.insecure_options = InsecureOptions::fallback();
        }

        let binary = config.binary();
        let global_args = config.global_args(&config.insecure_options);
        debug!(%version, args = ?global_args, "New runtime client");

        Self {
            version,
            config,
            binary,
            global_args,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn global_args(&self) -> &[String] {
        &self.global_args
    }

    /// Configured binary path, or the one found on `PATH`.
    pub fn path(&self) -> Result<String> {
        if let Some(path) = &self.config.path {
            return Ok(path.to_string_lossy().into_owned());
        }
        let script = format!("command -v {DEFAULT_BINARY}");
        capture("/bin/sh", ["-c", script.as_str()])
            .map(|out| out.stdout.trim().to_string())
            .map_err(|cause| Error::Locate { cause })
    }

    pub fn fetch_args(&self, image: &str, pull_policy: PullPolicy) -> Vec<String> {
        let pull_policy = self.config.pull_policy.unwrap_or(pull_policy);
        self.fetch_args_with(&self.global_args, image, pull_policy)
    }

    pub fn fetch_insecure_args(&self, image: &str) -> Vec<String> {
        if self.config.insecure_options.has_image() {
            return self.fetch_args_with(&self.global_args, image, PullPolicy::New);
        }

        let widened = self.config.insecure_options.with(InsecureOption::Image);
        let global_args = self.config.global_args(&widened);
        self.fetch_args_with(&global_args, image, PullPolicy::New)
    }

    fn fetch_args_with(
        &self,
        global_args: &[String],
        image: &str,
        pull_policy: PullPolicy,
    ) -> Vec<String> {
        let mut args = global_args.to_vec();
        args.push("fetch".to_string());
        self.push_store_args(&mut args);
        args.push("--full".to_string());
        if self.supports_pull_policy() {
            args.push(format!("--pull-policy={pull_policy}"));
        }
        args.push(image.to_string());
        args
    }

    fn push_store_args(&self, args: &mut Vec<String>) {
        if self.config.no_store {
            args.push("--no-store".to_string());
        }
        if self.config.store_only {
            args.push("--store-only".to_string());
        }
    }

    fn supports_pull_policy(&self) -> bool {
        Version::parse(VERSION_WITH_PULL_POLICY)
            .map(|threshold| self.version.greater_or_equal(&threshold))
            .unwrap_or(false)
    }

    fn command_args<'a>(&self, cmd: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut args = self.global_args.clone();
        args.extend(cmd.into_iter().map(str::to_string));
        args
    }
}

impl ImageRuntime for RuntimeClient {
    fn version(&self) -> &Version {
        &self.version
    }

    fn fetch(&self, image: &str, pull_policy: PullPolicy) -> Result<String> {
        let args = self.fetch_args(image, pull_policy);
        capture(&self.binary, &args)
            .map(|out| out.stdout.trim().to_string())
            .map_err(|cause| Error::Fetch {
                image: image.to_string(),
                cause,
            })
    }

    fn fetch_insecure(&self, image: &str) -> Result<String> {
        let args = self.fetch_insecure_args(image);
        capture(&self.binary, &args)
            .map(|out| out.stdout.trim().to_string())
            .map_err(|cause| Error::Fetch {
                image: image.to_string(),
                cause,
            })
    }

    fn cat_manifest(&self, image: &str) -> Result<String> {
        let args = self.command_args(["image", "cat-manifest", image]);
        capture(&self.binary, &args)
            .map(|out| out.stdout)
            .map_err(|cause| Error::CatManifest {
                image: image.to_string(),
                cause,
            })
    }

    fn image_rm(&self, images: &[String]) -> Result<()> {
        let mut args = self.command_args(["image", "rm"]);
        args.extend(images.iter().cloned());
        capture(&self.binary, &args)
            .map(|_| ())
            .map_err(|cause| Error::ImageRm {
                images: images.join(" "),
                cause,
            })
    }

    fn rm(&self, uuids: &[String]) -> Result<CommandOutput> {
        let mut args = self.command_args(["rm"]);
        args.extend(uuids.iter().cloned());
        capture(&self.binary, &args).map_err(|cause| Error::Rm {
            uuids: uuids.join(" "),
            cause,
        })
    }

    fn rm_from_file(&self, path: &Path) -> Result<CommandOutput> {
        let mut args = self.command_args(["rm", "--uuid-file"]);
        args.push(path.to_string_lossy().into_owned());
        capture(&self.binary, &args).map_err(|cause| Error::RmFromFile {
            path: path.to_path_buf(),
            cause,
        })
    }

    fn run(&self, args: &[String]) -> Result<()> {
        let mut full = self.command_args(["run"]);
        full.extend(args.iter().cloned());
        stream(&self.binary, &full).map_err(|cause| Error::Run { cause })
    }
}

/// Reads the version out of `<binary> version`.
pub fn probe_version(binary: &str) -> Result<Version> {
    let output = capture(binary, ["version"]).map_err(|cause| Error::VersionDetection {
        reason: format!("cannot run '{binary} version'"),
        output: String::new(),
        cause: Some(cause),
    })?;

    parse_version_output(&output.stdout)
}

pub fn parse_version_output(output: &str) -> Result<Version> {
    let line = output
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(VERSION_LINE_PREFIX))
        .ok_or_else(|| Error::VersionDetection {
            reason: format!("no '{VERSION_LINE_PREFIX}' line in output"),
            output: output.to_string(),
            cause: None,
        })?;

    let token = line
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::VersionDetection {
            reason: "empty version token".to_string(),
            output: output.to_string(),
            cause: None,
        })?;

    Version::parse(token).map_err(|e| Error::VersionDetection {
        reason: e.to_string(),
        output: output.to_string(),
        cause: None,
    })
}

fn capture<I, S>(binary: &str, args: I) -> std::result::Result<CommandOutput, ExecError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args
        .into_iter()
        .map(|item| item.as_ref().to_os_string())
        .collect();
    debug!("Running {} {:?}", binary, args);

    let output = Command::new(binary)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ExecError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

    let captured = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    ensure_success(output.status, binary, &args, captured)
}

fn stream<I, S>(binary: &str, args: I) -> std::result::Result<(), ExecError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args
        .into_iter()
        .map(|item| item.as_ref().to_os_string())
        .collect();
    debug!("Running {} {:?}", binary, args);

    let status = Command::new(binary)
        .args(&args)
        .status()
        .map_err(|source| ExecError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

    ensure_success(status, binary, &args, CommandOutput::default()).map(|_| ())
}

fn ensure_success(
    status: ExitStatus,
    binary: &str,
    args: &[std::ffi::OsString],
    output: CommandOutput,
) -> std::result::Result<CommandOutput, ExecError> {
    if status.success() {
        return Ok(output);
    }

    let command = std::iter::once(binary.to_string())
        .chain(args.iter().map(|a| a.to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ");

    Err(ExecError::Failed {
        command,
        status: status.to_string(),
        stdout: output.stdout,
        stderr: output.stderr,
    })
}
