//! Source-control handles attached to a pipeline.
//!
//! Cloning and committing happen elsewhere; a handle only validates its
//! configuration and knows where its managed working copy lives.

use std::path::{Path, PathBuf};

use autobump_shared::{AutobumpError, Result, ScmConfig};

/// SCM kinds a pipeline may declare.
pub const SUPPORTED_SCM_KINDS: &[&str] = &["git", "github", "gitlab", "gitea", "bitbucket"];

/// A validated SCM binding and its working copy location.
#[derive(Debug, Clone, PartialEq)]
pub struct Scm {
    /// Configuration exactly as declared in the manifest.
    pub config: ScmConfig,
    directory: PathBuf,
}

impl Scm {
    /// Validate `config` (declared under `scms.<id>`) and resolve its working copy.
    pub fn new(id: &str, config: ScmConfig) -> Result<Self> {
        if !SUPPORTED_SCM_KINDS.contains(&config.kind.as_str()) {
            return Err(AutobumpError::validation(format!(
                "scm {id:?}: unsupported kind {:?}, expected one of {}",
                config.kind,
                SUPPORTED_SCM_KINDS.join(", ")
            )));
        }

        let spec = &config.spec;
        let has_repository = !spec.owner.is_empty() && !spec.repository.is_empty();
        if spec.directory.is_none() && spec.url.is_empty() && !has_repository {
            return Err(AutobumpError::validation(format!(
                "scm {id:?}: one of url, owner/repository, or directory is required"
            )));
        }

        let directory = match &spec.directory {
            Some(dir) => dir.clone(),
            None => default_directory(&config),
        };

        Ok(Self { config, directory })
    }

    /// Managed working copy path.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// `<tmp>/autobump/<kind>/<owner>/<repository>`, or a sanitized URL when no
/// owner/repository pair is declared.
fn default_directory(config: &ScmConfig) -> PathBuf {
    let base = std::env::temp_dir().join("autobump").join(&config.kind);
    let spec = &config.spec;

    if !spec.owner.is_empty() && !spec.repository.is_empty() {
        return base.join(&spec.owner).join(&spec.repository);
    }

    base.join(sanitize_url(&spec.url))
}

fn sanitize_url(url: &str) -> String {
    let trimmed = url
        .split_once("://")
        .map_or(url, |(_, rest)| rest)
        .trim_start_matches("git@")
        .trim_end_matches('/')
        .trim_end_matches(".git");

    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
