//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use autobump_core::{Engine, Pipeline};
use autobump_shared::{AppConfig, DiscoveryOptions, init_config, load_config};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;
use tracing::{error, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// autobump: discover dependency updates and turn them into pipelines.
#[derive(Parser)]
#[command(
    name = "autobump",
    version,
    about = "Discover dependency updates in a workspace and turn them into update pipelines.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Pipeline manifest operations.
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Manifest subcommands.
#[derive(Subcommand)]
pub(crate) enum ManifestAction {
    /// Load manifests, run autodiscovery, and print the resulting pipelines.
    Show {
        /// Manifest file(s) to load (can be specified multiple times).
        #[arg(short, long = "config")]
        config: Vec<PathBuf>,

        /// Enable experimental features such as autodiscovery.
        #[arg(long, env = "AUTOBUMP_EXPERIMENTAL")]
        experimental: bool,

        /// Add the local autodiscovery pipeline scanning the working directory.
        #[arg(long)]
        local_autodiscovery: bool,

        /// Directory scanned by pipelines without an SCM (defaults to the current directory).
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Print pipelines as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "autobump=info,autobump_core=info,autobump_crawler=info",
        1 => "autobump=debug,autobump_core=debug,autobump_crawler=debug",
        _ => "autobump=trace,autobump_core=trace,autobump_crawler=trace,autobump_shared=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Manifest { action } => match action {
            ManifestAction::Show {
                config,
                experimental,
                local_autodiscovery,
                workdir,
                json,
            } => {
                let flags = ShowFlags {
                    experimental,
                    local_autodiscovery,
                    workdir,
                    json,
                };
                cmd_manifest_show(&config, flags).await
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// manifest show
// ---------------------------------------------------------------------------

struct ShowFlags {
    experimental: bool,
    local_autodiscovery: bool,
    workdir: Option<PathBuf>,
    json: bool,
}

/// CLI flags win over the config file; flags can only switch features on.
fn discovery_options(config: &AppConfig, flags: &ShowFlags) -> DiscoveryOptions {
    let mut options = DiscoveryOptions::from(config);
    options.experimental |= flags.experimental;
    options.local_autodiscovery |= flags.local_autodiscovery;
    if flags.workdir.is_some() {
        options.workdir = flags.workdir.clone();
    }
    options
}

async fn cmd_manifest_show(manifests: &[PathBuf], flags: ShowFlags) -> Result<()> {
    let config = load_config()?;
    let options = discovery_options(&config, &flags);
    let json = flags.json || config.defaults.output == "json";

    let mut engine = Engine::new();
    engine
        .load_manifests(manifests)
        .wrap_err("failed to load manifests")?;

    let discovery = engine.load_autodiscovery(&options).await;
    if let Err(e) = &discovery {
        error!(error = %e, "autodiscovery failed");
    }

    info!(pipelines = engine.pipelines().len(), "pipelines ready");
    if json {
        print_json(engine.pipelines())?;
    } else {
        print_text(engine.pipelines())?;
    }

    discovery.wrap_err("autodiscovery failed")
}

#[derive(Serialize)]
struct PipelineSummary<'a> {
    id: &'a str,
    name: &'a str,
    result: autobump_core::ReportResult,
    manifest: &'a autobump_shared::Spec,
}

impl<'a> From<&'a Pipeline> for PipelineSummary<'a> {
    fn from(pipeline: &'a Pipeline) -> Self {
        Self {
            id: &pipeline.id,
            name: &pipeline.name,
            result: pipeline.report.result,
            manifest: &pipeline.config.spec,
        }
    }
}

fn print_json(pipelines: &[Pipeline]) -> Result<()> {
    let summaries: Vec<PipelineSummary<'_>> = pipelines.iter().map(PipelineSummary::from).collect();
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

fn print_text(pipelines: &[Pipeline]) -> Result<()> {
    if pipelines.is_empty() {
        println!("No pipelines.");
        return Ok(());
    }

    for pipeline in pipelines {
        println!();
        println!("# {}", pipeline.name);
        println!("  id:     {}", pipeline.id);
        println!("  result: {}", pipeline.report.result);
        println!();
        let manifest = serde_yaml::to_string(&pipeline.config.spec)?;
        for line in manifest.lines() {
            println!("    {line}");
        }
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
