use crate::domain::Version;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single external runtime invocation.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("cannot execute {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}{}", format_streams(.stdout, .stderr))]
    Failed {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },
}

fn format_streams(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    if !stdout.trim().is_empty() {
        out.push_str("\nstdout: ");
        out.push_str(stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        out.push_str("\nstderr: ");
        out.push_str(stderr.trim_end());
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Construction
    #[error("cannot detect runtime version: {reason}{}", format_streams(.output, ""))]
    VersionDetection {
        reason: String,
        output: String,
        #[source]
        cause: Option<ExecError>,
    },

    #[error("unsupported runtime version {current}, required >= {required}")]
    UnsupportedVersion { current: Version, required: Version },

    // Boundary validation
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("invalid pull policy '{0}' (expected never, new or update)")]
    InvalidPullPolicy(String),

    #[error("unknown insecure option '{0}'")]
    InvalidInsecureOption(String),

    // Runtime operations
    #[error("failed to fetch image '{image}': {cause}")]
    Fetch {
        image: String,
        #[source]
        cause: ExecError,
    },

    #[error("failed to cat manifest of '{image}': {cause}")]
    CatManifest {
        image: String,
        #[source]
        cause: ExecError,
    },

    #[error("failed to unmarshal manifest received from runtime: {cause}\ncontent: {content}")]
    ManifestUnmarshal {
        content: String,
        #[source]
        cause: serde_json::Error,
    },

    #[error("failed to remove images '{images}': {cause}")]
    ImageRm {
        images: String,
        #[source]
        cause: ExecError,
    },

    #[error("failed to remove pods '{uuids}': {cause}")]
    Rm {
        uuids: String,
        #[source]
        cause: ExecError,
    },

    #[error("failed to remove pods listed in {path:?}: {cause}")]
    RmFromFile {
        path: PathBuf,
        #[source]
        cause: ExecError,
    },

    #[error("run failed: {cause}")]
    Run {
        #[source]
        cause: ExecError,
    },

    #[error("cannot locate runtime binary: {cause}")]
    Locate {
        #[source]
        cause: ExecError,
    },

    // Manifest resolution
    #[error("pod {pod} declares app '{name}' more than once")]
    DuplicateApp { pod: String, name: String },

    #[error("pod {pod}: app #{index} has neither a name nor a dependency to name it after")]
    UnnamedApp { pod: String, index: usize },
}
