//! Shared types, error model, and configuration for autobump.
//!
//! This crate is the foundation depended on by all other autobump crates.
//! It provides:
//! - [`AutobumpError`]: the unified error type
//! - Manifest schema types ([`PipelineConfig`], [`Spec`], [`AutodiscoverySpec`], ...)
//! - Configuration ([`AppConfig`], [`DiscoveryOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AutodiscoveryDefaults, DEFAULT_CRAWLERS, DefaultsConfig, DiscoveryOptions,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{AutobumpError, Result};
pub use types::{
    ActionConfig, AutodiscoverySpec, CrawlerSpec, GroupBy, PipelineConfig, ResourceConfig,
    ScmConfig, ScmSpec, Spec,
};
