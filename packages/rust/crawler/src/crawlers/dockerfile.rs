//! Dockerfile crawler.
//!
//! Emits one manifest per pinned `FROM <image>:<tag>` instruction.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use autobump_shared::{AutobumpError, ResourceConfig, Result, Spec};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use super::{CrawlContext, Crawler, IgnoreSet, find_files};

/// Matches `FROM [--platform=...] <image> [AS <stage>]`.
static FROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*FROM\s+(?:--platform=\S+\s+)?(\S+)(?:\s+AS\s+(\S+))?\s*$")
        .expect("FROM regex")
});

/// Matches tags that can be compared as semantic versions (`1.22`, `v3.1.0`).
static SEMVER_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?\d+(\.\d+){0,2}$").expect("semver tag regex"));

/// Discovers container base images in Dockerfiles.
pub struct DockerfileCrawler;

impl Crawler for DockerfileCrawler {
    fn discover(&self, root: &Path, ctx: &CrawlContext) -> Result<Vec<Spec>> {
        let ignore = IgnoreSet::new(&ctx.ignore);
        let files = find_files(root, &ignore, is_dockerfile)?;
        let mut manifests = Vec::new();
        let mut seen = HashSet::new();

        for file in files {
            let path = root.join(&file);
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %file, error = %e, "unreadable Dockerfile, skipping");
                    continue;
                }
            };

            for image in parse_from_instructions(&content) {
                let manifest = image_manifest(&file, &image, ctx)?;
                // Unnamed stages repeating an image are one update.
                if !seen.insert(manifest.name.clone()) {
                    debug!(file = %file, image = %image.name, "duplicate base image, skipping");
                    continue;
                }
                debug!(file = %file, image = %image.name, tag = %image.tag, "base image found");
                manifests.push(manifest);
            }
        }

        Ok(manifests)
    }

    fn name(&self) -> &str {
        "dockerfile"
    }
}

fn is_dockerfile(name: &str) -> bool {
    name == "Dockerfile" || name.starts_with("Dockerfile.") || name.ends_with(".Dockerfile")
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// An image reference pinned to a tag.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImageRef {
    pub name: String,
    pub tag: String,
    /// Build stage alias from `AS <stage>`.
    pub stage: Option<String>,
}

/// Extract every pinned base image from a Dockerfile.
///
/// Skips `scratch`, digest references, untagged or `latest` images, and
/// references built from `ARG` interpolation.
pub(crate) fn parse_from_instructions(content: &str) -> Vec<ImageRef> {
    content
        .lines()
        .filter_map(|line| FROM_RE.captures(line))
        .filter_map(|caps| {
            let mut image = split_image(&caps[1])?;
            image.stage = caps.get(2).map(|m| m.as_str().to_string());
            Some(image)
        })
        .collect()
}

fn split_image(reference: &str) -> Option<ImageRef> {
    if reference == "scratch" || reference.contains('$') || reference.contains('@') {
        return None;
    }

    // The tag separator is the last ':' after the last '/', so registry ports survive.
    let name_start = reference.rfind('/').map_or(0, |i| i + 1);
    let colon = reference[name_start..].rfind(':')? + name_start;
    let (name, tag) = (&reference[..colon], &reference[colon + 1..]);

    if name.is_empty() || tag.is_empty() || tag == "latest" {
        return None;
    }

    Some(ImageRef {
        name: name.to_string(),
        tag: tag.to_string(),
        stage: None,
    })
}

// ---------------------------------------------------------------------------
// Manifest generation
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DockerImageSpec<'a> {
    image: &'a str,
    versionfilter: VersionFilter<'a>,
}

#[derive(Serialize)]
struct VersionFilter<'a> {
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pattern: Option<&'a str>,
}

#[derive(Serialize)]
struct DockerfileTargetSpec<'a> {
    file: &'a str,
    instruction: Instruction<'a>,
}

#[derive(Serialize)]
struct Instruction<'a> {
    keyword: &'a str,
    matcher: &'a str,
}

fn image_manifest(file: &str, image: &ImageRef, ctx: &CrawlContext) -> Result<Spec> {
    let versionfilter = if SEMVER_TAG_RE.is_match(&image.tag) {
        VersionFilter {
            kind: "semver",
            pattern: Some(">=0"),
        }
    } else {
        VersionFilter {
            kind: "latest",
            pattern: None,
        }
    };

    let source_spec = to_value(&DockerImageSpec {
        image: &image.name,
        versionfilter,
    })?;
    let target_spec = to_value(&DockerfileTargetSpec {
        file,
        instruction: Instruction {
            keyword: "FROM",
            matcher: &image.name,
        },
    })?;

    let mut name = format!("deps(dockerfile): bump image {:?} tag in {file}", image.name);
    if let Some(stage) = &image.stage {
        name.push_str(&format!(" (stage {stage})"));
    }

    let mut spec = Spec {
        name,
        ..Spec::default()
    };
    spec.sources.insert(
        "image".into(),
        ResourceConfig {
            kind: "dockerimage".into(),
            name: format!("get latest {:?} image tag", image.name),
            spec: source_spec,
            ..ResourceConfig::default()
        },
    );
    spec.targets.insert(
        "dockerfile".into(),
        ResourceConfig {
            kind: "dockerfile".into(),
            name: format!("update {:?} tag in {file}", image.name),
            sourceid: "image".into(),
            scmid: ctx.scmid.clone(),
            spec: target_spec,
        },
    );

    Ok(spec)
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_yaml::Value> {
    serde_yaml::to_value(value).map_err(|e| AutobumpError::crawler(e.to_string()))
}
