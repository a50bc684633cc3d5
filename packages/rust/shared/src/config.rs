//! Application configuration for autobump.
//!
//! User config lives at `~/.autobump/autobump.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AutobumpError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "autobump.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".autobump";

/// Crawlers run by the local autodiscovery pipeline unless configured otherwise.
pub const DEFAULT_CRAWLERS: &[&str] = &["cargo", "dockerfile"];

// ---------------------------------------------------------------------------
// Config structs (matching autobump.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Local autodiscovery settings.
    #[serde(default)]
    pub autodiscovery: AutodiscoveryDefaults,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Opt into experimental features (autodiscovery).
    #[serde(default)]
    pub experimental: bool,

    /// Add the implicit "Local AutoDiscovery" pipeline.
    #[serde(default)]
    pub local_autodiscovery: bool,

    /// Output format for `manifest show`: "text" or "json".
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            experimental: false,
            local_autodiscovery: false,
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "text".into()
}

/// `[autodiscovery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutodiscoveryDefaults {
    /// Crawler kinds used by the local autodiscovery pipeline.
    #[serde(default = "default_crawlers")]
    pub crawlers: Vec<String>,
}

impl Default for AutodiscoveryDefaults {
    fn default() -> Self {
        Self {
            crawlers: default_crawlers(),
        }
    }
}

fn default_crawlers() -> Vec<String> {
    DEFAULT_CRAWLERS.iter().map(|c| c.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Discovery options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime autodiscovery options, passed explicitly to the engine.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Experimental gate. Autodiscovery is a no-op when unset.
    pub experimental: bool,
    /// Whether to add the local autodiscovery pipeline before the pass.
    pub local_autodiscovery: bool,
    /// Crawler kinds for the local autodiscovery pipeline.
    pub local_crawlers: Vec<String>,
    /// Directory scanned when a parent has no SCM. Defaults to the process
    /// working directory.
    pub workdir: Option<PathBuf>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for DiscoveryOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            experimental: config.defaults.experimental,
            local_autodiscovery: config.defaults.local_autodiscovery,
            local_crawlers: config.autodiscovery.crawlers.clone(),
            workdir: None,
        }
    }
}

impl DiscoveryOptions {
    /// Resolve the default scan directory.
    pub fn resolve_workdir(&self) -> Result<PathBuf> {
        match &self.workdir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().map_err(|e| {
                AutobumpError::config(format!(
                    "failed getting current working directory due to {e}"
                ))
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.autobump/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AutobumpError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.autobump/autobump.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AutobumpError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| AutobumpError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AutobumpError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| AutobumpError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AutobumpError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
