use serde::{Deserialize, Serialize};
use std::fmt;

/// Image reference in `name[:version]` form, e.g. `example.com/foo:1.2.0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcFullName(String);

impl AcFullName {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self(full_name.into())
    }

    pub fn from_parts(name: &str, version: &str) -> Self {
        if version.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{name}:{version}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // A colon inside the last path segment separates the version; earlier ones
    // belong to a registry port.
    fn split(&self) -> (&str, &str) {
        let last_segment = self.0.rfind('/').map(|i| i + 1).unwrap_or(0);
        match self.0[last_segment..].find(':') {
            Some(idx) => {
                let at = last_segment + idx;
                (&self.0[..at], &self.0[at + 1..])
            }
            None => (&self.0, ""),
        }
    }

    pub fn name(&self) -> &str {
        self.split().0
    }

    pub fn version(&self) -> &str {
        self.split().1
    }

    /// Last path segment of the name, without version.
    pub fn short_name(&self) -> &str {
        let name = self.name();
        name.rsplit('/').next().unwrap_or(name)
    }
}

impl fmt::Display for AcFullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AcFullName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub value: String,
}

pub type Annotations = Vec<Annotation>;

pub fn annotation<'a>(annotations: &'a [Annotation], name: &str) -> Option<&'a str> {
    annotations
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_str())
}

/// Image section of an ACI manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AciDefinition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Annotations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<AcFullName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_whitelist: Vec<String>,
}

/// Builder or tester image used to produce/check an ACI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderDefinition {
    #[serde(default, skip_serializing_if = "AcFullName::is_empty")]
    pub image: AcFullName,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<AcFullName>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AciManifest {
    pub name: AcFullName,
    #[serde(default)]
    pub aci: AciDefinition,
    #[serde(default)]
    pub builder: BuilderDefinition,
    #[serde(default)]
    pub tester: BuilderDefinition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeApp {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dependencies: Vec<AcFullName>,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub app: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodDefinition {
    #[serde(default)]
    pub apps: Vec<RuntimeApp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodManifest {
    pub name: AcFullName,
    #[serde(default)]
    pub pod: PodDefinition,
    #[serde(default)]
    pub builder: BuilderDefinition,
    #[serde(default)]
    pub tester: BuilderDefinition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    ImageManifest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

/// Manifest of an image held by the runtime store (`image cat-manifest`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub ac_kind: ImageKind,
    pub ac_version: String,
    pub name: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub dependencies: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<serde_json::Value>,
}

impl ImageManifest {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }

    pub fn version(&self) -> Option<&str> {
        self.label("version")
    }

    pub fn full_name(&self) -> AcFullName {
        AcFullName::from_parts(&self.name, self.version().unwrap_or_default())
    }
}
