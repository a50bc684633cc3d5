//! The engine owns every pipeline of a run and the configurations that
//! produced them.
//!
//! Pipelines are only ever appended. Later passes update them in place by
//! index, never through a copy.

use std::path::Path;

use autobump_crawler::{CrawlerRunner, ManifestRunner};
use autobump_shared::{AutobumpError, AutodiscoverySpec, PipelineConfig, Result, Spec};
use tracing::{debug, info};

use crate::pipeline::Pipeline;

/// Builds the crawler runner for one parent pipeline.
pub trait RunnerFactory: Send + Sync {
    fn build(&self, spec: &AutodiscoverySpec, workdir: &Path) -> Result<Box<dyn ManifestRunner>>;
}

/// Default factory backed by the built-in crawler registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlerRunnerFactory;

impl RunnerFactory for CrawlerRunnerFactory {
    fn build(&self, spec: &AutodiscoverySpec, workdir: &Path) -> Result<Box<dyn ManifestRunner>> {
        Ok(Box::new(CrawlerRunner::new(spec, workdir)?))
    }
}

/// Process-wide owner of the pipeline collection.
pub struct Engine {
    pub(crate) pipelines: Vec<Pipeline>,
    pub(crate) configurations: Vec<PipelineConfig>,
    pub(crate) runners: Box<dyn RunnerFactory>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pipelines", &self.pipelines.len())
            .field("configurations", &self.configurations.len())
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an empty engine using the built-in crawlers.
    pub fn new() -> Self {
        Self::with_runner_factory(CrawlerRunnerFactory)
    }

    /// Create an empty engine that builds crawler runners with `factory`.
    pub fn with_runner_factory(factory: impl RunnerFactory + 'static) -> Self {
        Self {
            pipelines: Vec::new(),
            configurations: Vec::new(),
            runners: Box::new(factory),
        }
    }

    /// Every pipeline, in the order it was added.
    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    /// The configuration each pipeline was built from, parallel to [`Self::pipelines`].
    pub fn configurations(&self) -> &[PipelineConfig] {
        &self.configurations
    }

    /// Load hand-authored YAML manifests. The first failing file aborts loading.
    pub fn load_manifests<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        for path in paths {
            let path = path.as_ref();
            let index = self.load_manifest(path)?;
            debug!(path = %path.display(), pipeline = %self.pipelines[index].id, "manifest loaded");
        }
        info!(count = paths.len(), "manifests loaded");
        Ok(())
    }

    fn load_manifest(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path).map_err(|e| AutobumpError::io(path, e))?;
        let spec: Spec = serde_yaml::from_str(&content)
            .map_err(|e| AutobumpError::parse(format!("{}: {e}", path.display())))?;

        self.push(PipelineConfig::new(spec)).map_err(|e| match e {
            AutobumpError::Validation { message } => {
                AutobumpError::validation(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Initialise `config` and append the pipeline and its configuration.
    ///
    /// Returns the index of the new pipeline. Nothing is appended on error.
    pub fn push(&mut self, config: PipelineConfig) -> Result<usize> {
        let pipeline = Pipeline::init(config)?;
        self.configurations.push(pipeline.config.clone());
        self.pipelines.push(pipeline);
        Ok(self.pipelines.len() - 1)
    }

    /// Turn a merged discovered manifest into a pipeline, attributing any
    /// failure to the manifest's name.
    pub(crate) fn instantiate(&mut self, spec: Spec) -> Result<usize> {
        let name = spec.name.clone();
        self.push(PipelineConfig::new(spec))
            .map_err(|e| AutobumpError::instantiate(name, e))
    }
}
