//! Manifest schema types shared by the crawlers and the engine.
//!
//! Hand-authored manifests and manifests generated by autodiscovery use the
//! same YAML schema. Every map is a `BTreeMap` so serialization and iteration
//! order are stable across runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PipelineConfig / Spec
// ---------------------------------------------------------------------------

/// Configuration envelope wrapping a manifest spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The decoded manifest.
    pub spec: Spec,
}

impl PipelineConfig {
    /// Wrap a spec in a configuration envelope.
    pub fn new(spec: Spec) -> Self {
        Self { spec }
    }
}

/// A single pipeline manifest, as written in YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Identity used to group runs (and their pull requests) together.
    #[serde(default, rename = "pipelineid", skip_serializing_if = "String::is_empty")]
    pub pipeline_id: String,

    /// Manifest format version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Autodiscovery block; only parent pipelines carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autodiscovery: Option<AutodiscoverySpec>,

    /// Source-control bindings keyed by SCM id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scms: BTreeMap<String, ScmConfig>,

    /// Action (pull request, notification) bindings keyed by action id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, ActionConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, ResourceConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, ResourceConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, ResourceConfig>,
}

// ---------------------------------------------------------------------------
// SCM / Action / Resource
// ---------------------------------------------------------------------------

/// `scms.<id>` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScmConfig {
    /// SCM kind: git, github, gitlab, gitea, bitbucket.
    pub kind: String,
    #[serde(default)]
    pub spec: ScmSpec,
}

/// Location of a source-control repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScmSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    /// Explicit working copy location. Derived from the repository when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// `actions.<id>` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scmid: String,
    /// Title of the delivered pull request or notification.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "serde_yaml::Value::is_null")]
    pub spec: serde_yaml::Value,
}

/// A source, condition, or target stage. The `spec` payload belongs to the
/// resource plugin and is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sourceid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scmid: String,
    #[serde(default, skip_serializing_if = "serde_yaml::Value::is_null")]
    pub spec: serde_yaml::Value,
}

// ---------------------------------------------------------------------------
// Autodiscovery
// ---------------------------------------------------------------------------

/// `autodiscovery` block of a parent pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutodiscoverySpec {
    /// Crawlers to run, keyed by crawler kind. `None` disables autodiscovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawlers: Option<BTreeMap<String, CrawlerSpec>>,

    /// SCM whose working copy is scanned instead of the current directory.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scmid: String,

    /// Action attached to every generated pipeline.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub actionid: String,

    /// Deprecated alias of `actionid`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pullrequestid: String,

    #[serde(default)]
    pub groupby: GroupBy,
}

/// Per-crawler settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlerSpec {
    /// Glob patterns (`*`, `**`, `?`) matched against paths relative to the
    /// scanned root. Matching directories are not descended into.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
}

/// How discovered manifests map onto pipeline identities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GroupBy {
    /// Every discovered manifest shares the parent's identity.
    #[default]
    All,
    /// Every discovered manifest gets its own identity.
    Individual,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Individual => "individual",
        }
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(Self::All),
            "individual" => Ok(Self::Individual),
            other => Err(format!(
                "unsupported autodiscovery groupby {other:?}, expected \"all\" or \"individual\""
            )),
        }
    }
}

impl TryFrom<String> for GroupBy {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupBy> for String {
    fn from(value: GroupBy) -> Self {
        value.as_str().to_string()
    }
}
