//! Workspace crawlers and the crawler runner used by autodiscovery.
//!
//! This crate provides:
//! - [`crawlers`]: ecosystem-specific detectors (Cargo, Dockerfile)
//! - [`CrawlerRegistry`]: resolves crawler kinds to implementations
//! - [`runner`]: turns an autodiscovery block into raw YAML manifests

pub mod crawlers;
pub mod runner;

pub use crawlers::{CargoCrawler, CrawlContext, Crawler, CrawlerRegistry, DockerfileCrawler};
pub use runner::{CrawlerRunner, ManifestRunner};
