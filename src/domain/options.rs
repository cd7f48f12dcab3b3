use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trust relaxations understood by the runtime's `--insecure-options` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InsecureOption {
    None,
    Image,
    Tls,
    OnDisk,
    Http,
    Pubkey,
    Capabilities,
    Paths,
    Seccomp,
    AllFetch,
    AllRun,
    All,
}

impl InsecureOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Image => "image",
            Self::Tls => "tls",
            Self::OnDisk => "ondisk",
            Self::Http => "http",
            Self::Pubkey => "pubkey",
            Self::Capabilities => "capabilities",
            Self::Paths => "paths",
            Self::Seccomp => "seccomp",
            Self::AllFetch => "all-fetch",
            Self::AllRun => "all-run",
            Self::All => "all",
        }
    }
}

impl FromStr for InsecureOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "image" => Self::Image,
            "tls" => Self::Tls,
            "ondisk" => Self::OnDisk,
            "http" => Self::Http,
            "pubkey" => Self::Pubkey,
            "capabilities" => Self::Capabilities,
            "paths" => Self::Paths,
            "seccomp" => Self::Seccomp,
            "all-fetch" => Self::AllFetch,
            "all-run" => Self::AllRun,
            "all" => Self::All,
            _ => return Err(Error::InvalidInsecureOption(s.to_string())),
        })
    }
}

impl TryFrom<String> for InsecureOption {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InsecureOption> for String {
    fn from(value: InsecureOption) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for InsecureOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport relaxations used by image discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscoveryInsecure(u8);

impl DiscoveryInsecure {
    pub const NONE: Self = Self(0);
    pub const TLS: Self = Self(1);
    pub const HTTP: Self = Self(1 << 1);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for DiscoveryInsecure {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for DiscoveryInsecure {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<InsecureOption>", into = "Vec<InsecureOption>")]
pub struct InsecureOptions(Vec<InsecureOption>);

impl From<Vec<InsecureOption>> for InsecureOptions {
    fn from(value: Vec<InsecureOption>) -> Self {
        Self::new(value)
    }
}

impl From<InsecureOptions> for Vec<InsecureOption> {
    fn from(value: InsecureOptions) -> Self {
        value.0
    }
}

impl InsecureOptions {
    pub fn new(options: impl IntoIterator<Item = InsecureOption>) -> Self {
        let mut set = Self::default();
        for option in options {
            set.insert(option);
        }
        set
    }

    /// Set used when nothing is configured.
    pub fn fallback() -> Self {
        Self::new([InsecureOption::OnDisk, InsecureOption::Image])
    }

    pub fn insert(&mut self, option: InsecureOption) {
        if !self.0.contains(&option) {
            self.0.push(option);
        }
    }

    pub fn with(&self, option: InsecureOption) -> Self {
        let mut derived = self.clone();
        derived.insert(option);
        derived
    }

    pub fn contains(&self, option: InsecureOption) -> bool {
        self.0.contains(&option)
    }

    pub fn has_image(&self) -> bool {
        self.contains(InsecureOption::Image)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InsecureOption> {
        self.0.iter()
    }

    /// Comma-joined lowercase value for `--insecure-options`.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(InsecureOption::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn to_discovery(&self) -> DiscoveryInsecure {
        let mut val = DiscoveryInsecure::NONE;
        for option in &self.0 {
            match option {
                InsecureOption::Tls => val |= DiscoveryInsecure::TLS,
                InsecureOption::Http => val |= DiscoveryInsecure::HTTP,
                _ => {}
            }
        }
        val
    }
}

impl FromStr for InsecureOptions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let options = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<InsecureOption>, _>>()?;
        Ok(Self::new(options))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(try_from = "String", into = "String")]
pub enum PullPolicy {
    Never,
    New,
    Update,
}

impl PullPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::New => "new",
            Self::Update => "update",
        }
    }
}

impl FromStr for PullPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(Self::Never),
            "new" => Ok(Self::New),
            "update" => Ok(Self::Update),
            other => Err(Error::InvalidPullPolicy(other.to_string())),
        }
    }
}

impl TryFrom<String> for PullPolicy {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PullPolicy> for String {
    fn from(value: PullPolicy) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_options_case_insensitively() {
        let opts: InsecureOptions = "TLS,image".parse().unwrap();
        assert!(opts.has_image());
        assert!(opts.contains(InsecureOption::Tls));
        assert_eq!(opts.encode(), "tls,image");
    }

    #[test]
    fn rejects_unknown_option_at_parse() {
        let err = "tls,bogus".parse::<InsecureOptions>().unwrap_err();
        assert!(matches!(err, Error::InvalidInsecureOption(ref o) if o == "bogus"));
    }

    #[test]
    fn discovery_bitmask_only_keeps_transport_options() {
        let opts = InsecureOptions::new([
            InsecureOption::Tls,
            InsecureOption::Image,
            InsecureOption::OnDisk,
        ]);
        let discovery = opts.to_discovery();
        assert!(discovery.contains(DiscoveryInsecure::TLS));
        assert!(!discovery.contains(DiscoveryInsecure::HTTP));
        assert_eq!(discovery.bits(), DiscoveryInsecure::TLS.bits());

        let both: InsecureOptions = "http,tls".parse().unwrap();
        assert_eq!(
            both.to_discovery(),
            DiscoveryInsecure::TLS | DiscoveryInsecure::HTTP
        );
    }

    #[test]
    fn with_leaves_source_untouched() {
        let base = InsecureOptions::new([InsecureOption::OnDisk]);
        let widened = base.with(InsecureOption::Image);
        assert!(!base.has_image());
        assert!(widened.has_image());
        assert_eq!(widened.encode(), "ondisk,image");
    }

    #[test]
    fn insert_deduplicates() {
        let opts: InsecureOptions = "image,IMAGE,Image".parse().unwrap();
        assert_eq!(opts.encode(), "image");
    }

    #[test]
    fn fallback_is_ondisk_and_image() {
        assert_eq!(InsecureOptions::fallback().encode(), "ondisk,image");
    }

    #[test]
    fn pull_policy_is_a_closed_set() {
        assert_eq!("never".parse::<PullPolicy>().unwrap(), PullPolicy::Never);
        assert_eq!("update".parse::<PullPolicy>().unwrap(), PullPolicy::Update);
        assert!(matches!(
            "always".parse::<PullPolicy>(),
            Err(Error::InvalidPullPolicy(_))
        ));
        assert!("New".parse::<PullPolicy>().is_err());
    }

    #[test]
    fn deserializes_from_toml_and_rejects_garbage() {
        #[derive(Deserialize)]
        struct Doc {
            insecure_options: InsecureOptions,
            pull_policy: PullPolicy,
        }

        let doc: Doc = toml::from_str(
            r#"
insecure_options = ["Tls", "ondisk"]
pull_policy = "update"
"#,
        )
        .unwrap();
        assert_eq!(doc.insecure_options.encode(), "tls,ondisk");
        assert_eq!(doc.pull_policy, PullPolicy::Update);

        let bad = toml::from_str::<Doc>(
            r#"
insecure_options = ["tls"]
pull_policy = "sometimes"
"#,
        );
        assert!(bad.is_err());
    }
}
