//! Cargo crawler.
//!
//! Emits one manifest per registry dependency declared with a plain version
//! requirement. Path, git, and workspace-inherited dependencies are skipped.

use std::path::Path;

use autobump_shared::{AutobumpError, ResourceConfig, Result, Spec};
use serde::Serialize;
use tracing::{debug, warn};

use super::{CrawlContext, Crawler, IgnoreSet, find_files};

/// Manifest tables holding dependency declarations.
const DEPENDENCY_SECTIONS: &[&str] = &["dependencies", "dev-dependencies", "build-dependencies"];

/// Discovers crate dependencies in `Cargo.toml` files.
pub struct CargoCrawler;

impl Crawler for CargoCrawler {
    fn discover(&self, root: &Path, ctx: &CrawlContext) -> Result<Vec<Spec>> {
        let ignore = IgnoreSet::new(&ctx.ignore);
        let files = find_files(root, &ignore, |name| name == "Cargo.toml")?;
        let mut manifests = Vec::new();

        for file in files {
            let path = root.join(&file);
            let content = std::fs::read_to_string(&path).map_err(|e| AutobumpError::io(&path, e))?;

            let dependencies = match parse_dependencies(&content) {
                Ok(deps) => deps,
                Err(e) => {
                    warn!(file = %file, error = %e, "invalid Cargo.toml, skipping");
                    continue;
                }
            };

            for dep in dependencies {
                debug!(file = %file, package = %dep.package, requirement = %dep.requirement, "dependency found");
                manifests.push(dependency_manifest(&file, &dep, ctx)?);
            }
        }

        Ok(manifests)
    }

    fn name(&self) -> &str {
        "cargo"
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// A registry dependency and the TOML key holding its requirement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CargoDependency {
    pub section: &'static str,
    pub package: String,
    pub requirement: String,
    pub key: String,
}

pub(crate) fn parse_dependencies(
    content: &str,
) -> std::result::Result<Vec<CargoDependency>, toml::de::Error> {
    let manifest: toml::Table = content.parse()?;
    let mut found = Vec::new();

    for &section in DEPENDENCY_SECTIONS {
        let Some(deps) = manifest.get(section).and_then(|v| v.as_table()) else {
            continue;
        };

        for (name, value) in deps {
            match value {
                toml::Value::String(requirement) => found.push(CargoDependency {
                    section,
                    package: name.clone(),
                    requirement: requirement.clone(),
                    key: format!("{section}.{name}"),
                }),
                toml::Value::Table(detail) => {
                    if ["path", "git", "workspace"].iter().any(|k| detail.contains_key(*k)) {
                        continue;
                    }
                    let Some(requirement) = detail.get("version").and_then(|v| v.as_str()) else {
                        continue;
                    };
                    let package = detail
                        .get("package")
                        .and_then(|v| v.as_str())
                        .unwrap_or(name);
                    found.push(CargoDependency {
                        section,
                        package: package.to_string(),
                        requirement: requirement.to_string(),
                        key: format!("{section}.{name}.version"),
                    });
                }
                _ => {}
            }
        }
    }

    Ok(found)
}

// ---------------------------------------------------------------------------
// Manifest generation
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CargoPackageSpec<'a> {
    package: &'a str,
}

#[derive(Serialize)]
struct TomlTargetSpec<'a> {
    file: &'a str,
    key: &'a str,
}

fn dependency_manifest(file: &str, dep: &CargoDependency, ctx: &CrawlContext) -> Result<Spec> {
    let source_spec = serde_yaml::to_value(CargoPackageSpec {
        package: &dep.package,
    })
    .map_err(|e| AutobumpError::crawler(e.to_string()))?;
    let target_spec = serde_yaml::to_value(TomlTargetSpec {
        file,
        key: &dep.key,
    })
    .map_err(|e| AutobumpError::crawler(e.to_string()))?;

    let mut spec = Spec {
        name: format!("deps(cargo): bump {:?} requirement {} in {file}", dep.package, dep.key),
        ..Spec::default()
    };
    spec.sources.insert(
        "crate".into(),
        ResourceConfig {
            kind: "cargopackage".into(),
            name: format!("get latest {:?} version", dep.package),
            spec: source_spec,
            ..ResourceConfig::default()
        },
    );
    spec.targets.insert(
        "cargo".into(),
        ResourceConfig {
            kind: "toml".into(),
            name: format!("update {} in {file}", dep.key),
            sourceid: "crate".into(),
            scmid: ctx.scmid.clone(),
            spec: target_spec,
        },
    );

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[package]
name = "demo"
version = "0.1.0"

[dependencies]
serde = { version = "1", features = ["derive"] }
regex = "1.10"
local = { path = "../local" }
upstream = { git = "https://example.com/upstream.git" }
shared = { workspace = true }
yaml = { package = "serde_yaml", version = "0.9" }

[dev-dependencies]
tempfile = "3"
"#;

    #[test]
    fn parses_registry_dependencies() {
        let deps = parse_dependencies(MANIFEST).unwrap();
        let keys: Vec<&str> = deps.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "dependencies.regex",
                "dependencies.serde.version",
                "dependencies.yaml.version",
                "dev-dependencies.tempfile",
            ]
        );
        assert_eq!(deps[2].package, "serde_yaml");
        assert_eq!(deps[2].requirement, "0.9");
    }

    #[test]
    fn renamed_dependencies_get_distinct_names() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("Cargo.toml"),
            "[dependencies]\nserde_yaml = \"0.9\"\nyaml = { package = \"serde_yaml\", version = \"0.8\" }\n",
        )
        .unwrap();

        let manifests = CargoCrawler.discover(tmp.path(), &CrawlContext::default()).unwrap();
        assert_eq!(manifests.len(), 2);
        assert_ne!(manifests[0].name, manifests[1].name);
        assert!(manifests.iter().all(|m| m.sources["crate"].spec["package"] == "serde_yaml"));
    }

    #[test]
    fn invalid_manifest_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Cargo.toml"), "[dependencies\nserde = ").unwrap();
        std::fs::create_dir_all(tmp.path().join("ok")).unwrap();
        std::fs::write(tmp.path().join("ok/Cargo.toml"), "[dependencies]\nanyhow = \"1\"\n").unwrap();

        let manifests = CargoCrawler.discover(tmp.path(), &CrawlContext::default()).unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(
            manifests[0].name,
            "deps(cargo): bump \"anyhow\" requirement dependencies.anyhow in ok/Cargo.toml"
        );
        assert_eq!(manifests[0].targets["cargo"].spec["key"], "dependencies.anyhow");
        assert!(manifests[0].targets["cargo"].scmid.is_empty());
    }
}
