//! Crawler runner: the boundary between autodiscovery and the crawlers.
//!
//! A runner is built from a parent pipeline's autodiscovery block and a
//! working directory, and produces one self-contained YAML manifest per
//! discovered update. A run is all-or-nothing.

use std::path::{Path, PathBuf};

use autobump_shared::{AutobumpError, AutodiscoverySpec, Result};
use tracing::{info, instrument};

use crate::crawlers::{CrawlContext, Crawler, CrawlerRegistry};

/// Anything that can produce raw manifests for a discovery pass.
pub trait ManifestRunner: Send {
    /// Run every configured crawler and return the serialized manifests in
    /// discovery order.
    fn run(&self) -> Result<Vec<Vec<u8>>>;
}

/// Runs the crawlers declared by an autodiscovery block over one directory.
pub struct CrawlerRunner {
    root: PathBuf,
    crawlers: Vec<(Box<dyn Crawler>, CrawlContext)>,
}

impl std::fmt::Debug for CrawlerRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlerRunner")
            .field("root", &self.root)
            .field(
                "crawlers",
                &self.crawlers.iter().map(|(c, _)| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CrawlerRunner {
    /// Build a runner for `spec` scanning `workdir`.
    ///
    /// Fails when `workdir` is not a directory or a crawler kind is unknown.
    pub fn new(spec: &AutodiscoverySpec, workdir: &Path) -> Result<Self> {
        if !workdir.is_dir() {
            return Err(AutobumpError::crawler(format!(
                "directory {} does not exist",
                workdir.display()
            )));
        }

        let registry = CrawlerRegistry::new();
        let mut crawlers = Vec::new();
        for (kind, crawler_spec) in spec.crawlers.iter().flatten() {
            let crawler = registry.create(kind).ok_or_else(|| {
                AutobumpError::crawler(format!(
                    "crawler {kind:?} not supported, available crawlers: {}",
                    registry.kinds().join(", ")
                ))
            })?;
            let ctx = CrawlContext {
                scmid: spec.scmid.clone(),
                ignore: crawler_spec.ignore.clone(),
            };
            crawlers.push((crawler, ctx));
        }

        Ok(Self {
            root: workdir.to_path_buf(),
            crawlers,
        })
    }
}

impl ManifestRunner for CrawlerRunner {
    #[instrument(skip_all, fields(root = %self.root.display()))]
    fn run(&self) -> Result<Vec<Vec<u8>>> {
        let mut manifests = Vec::new();

        for (crawler, ctx) in &self.crawlers {
            let specs = crawler
                .discover(&self.root, ctx)
                .map_err(|e| AutobumpError::crawler(format!("{}: {e}", crawler.name())))?;

            info!(crawler = crawler.name(), manifests = specs.len(), "crawler finished");

            for spec in specs {
                let yaml = serde_yaml::to_string(&spec).map_err(|e| {
                    AutobumpError::crawler(format!("{}: failed to render manifest: {e}", crawler.name()))
                })?;
                manifests.push(yaml.into_bytes());
            }
        }

        Ok(manifests)
    }
}
