//! Pipeline engine and autodiscovery for autobump.
//!
//! The [`Engine`] owns every loaded pipeline. [`Engine::load_autodiscovery`]
//! runs the crawlers declared by parent pipelines and turns each discovered
//! manifest into a new pipeline, sharing or deriving its identity according
//! to the parent's `groupby` mode.

pub mod autodiscovery;
pub mod engine;
pub mod identity;
pub mod merge;
pub mod pipeline;
pub mod scm;

/// Engine build version, stamped onto discovered manifests that declare one.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use autodiscovery::LOCAL_AUTODISCOVERY_NAME;
pub use engine::{CrawlerRunnerFactory, Engine, RunnerFactory};
pub use merge::{DEFAULT_ACTION_TITLE, ParentContext, merge_parent_config};
pub use pipeline::{Pipeline, Report, ReportResult};
pub use scm::Scm;
