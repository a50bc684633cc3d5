//! Crawler trait and built-in crawlers.
//!
//! A crawler inspects a directory tree for one ecosystem (Dockerfiles, Cargo
//! manifests, ...) and emits one pipeline manifest per update opportunity.

mod cargo;
mod dockerfile;
mod walk;

use std::path::Path;

use autobump_shared::{Result, Spec};

pub use cargo::CargoCrawler;
pub use dockerfile::DockerfileCrawler;
pub(crate) use walk::{IgnoreSet, find_files};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Per-run settings handed to every crawler.
#[derive(Debug, Clone, Default)]
pub struct CrawlContext {
    /// SCM id stamped onto generated targets, empty for local scans.
    pub scmid: String,
    /// Ignore globs relative to the scanned root.
    pub ignore: Vec<String>,
}

/// Trait for ecosystem-specific manifest discovery.
pub trait Crawler: Send + Sync {
    /// Scan `root` and return one manifest per discovered update.
    fn discover(&self, root: &Path, ctx: &CrawlContext) -> Result<Vec<Spec>>;

    /// Crawler kind, as written under `autodiscovery.crawlers`.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type CrawlerFactory = fn() -> Box<dyn Crawler>;

/// Maps crawler kinds to their implementations.
pub struct CrawlerRegistry {
    crawlers: Vec<(&'static str, CrawlerFactory)>,
}

impl CrawlerRegistry {
    /// Create a registry with all built-in crawlers.
    pub fn new() -> Self {
        Self {
            crawlers: vec![
                ("cargo", || Box::new(CargoCrawler)),
                ("dockerfile", || Box::new(DockerfileCrawler)),
            ],
        }
    }

    /// Instantiate the crawler registered under `kind`.
    pub fn create(&self, kind: &str) -> Option<Box<dyn Crawler>> {
        self.crawlers
            .iter()
            .find(|(name, _)| *name == kind)
            .map(|(_, factory)| factory())
    }

    /// Registered crawler kinds, in registration order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.crawlers.iter().map(|(name, _)| *name).collect()
    }
}

impl Default for CrawlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
