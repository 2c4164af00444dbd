//! tgdemo
//!
//! Declares the Twingate demo environment from a stack configuration file
//! and plans or previews it.
//!
//! # Usage
//! ```bash
//! # Show what would be created
//! tgdemo --config Pulumi.dev.yaml plan
//!
//! # Dependency graph in DOT format
//! tgdemo --config Pulumi.dev.yaml graph | dot -Tsvg > stack.svg
//!
//! # Resolve every declaration against the simulated provider
//! tgdemo --config Pulumi.dev.yaml preview --parallel 4
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tgdemo_infra::config::DEFAULT_PROJECT;
use tgdemo_infra::engine::{ResourceStatus, DEFAULT_PARALLELISM};
use tgdemo_infra::topology::build_stack;
use tgdemo_infra::{BootstrapTemplates, DependencyGraph, Engine, Plan, SimulatedProvider, StackConfig};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "tgdemo")]
#[command(about = "Twingate demo environment: VPC, smallstep CA and connector fleet", long_about = None)]
#[command(version)]
struct Cli {
    /// Stack configuration file (Pulumi.<stack>.yaml)
    #[arg(long, env = "TGDEMO_STACK_CONFIG")]
    config: PathBuf,

    /// Project namespace of the configuration keys
    #[arg(long, default_value = DEFAULT_PROJECT)]
    project: String,

    /// Directory with replacement bootstrap templates
    #[arg(long)]
    scripts_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every declaration with its known, computed and secret inputs
    Plan {
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Print the dependency graph in DOT format
    Graph,

    /// Resolve the stack against the simulated provider
    Preview {
        /// Print secret values instead of redacting them
        #[arg(long)]
        show_secrets: bool,

        /// Provider calls allowed in flight at once
        #[arg(long, default_value_t = DEFAULT_PARALLELISM)]
        parallel: usize,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn render<T: Serialize>(value: &T, format: Format) -> Result<String> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(value)?,
        Format::Yaml => serde_yaml::to_string(value)?,
    })
}

/// `Pulumi.dev.yaml` -> `dev`; any other file name -> its stem
fn stack_name(config: &Path) -> String {
    let file = config
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file
        .strip_suffix(".yaml")
        .or_else(|| file.strip_suffix(".yml"))
        .unwrap_or(&file);
    stem.strip_prefix("Pulumi.").unwrap_or(stem).to_string()
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs)?;

    info!("🚀 tgdemo starting...");

    let config = StackConfig::load(&cli.config, &cli.project)
        .with_context(|| format!("Failed to load stack config {}", cli.config.display()))?;

    let templates = match &cli.scripts_dir {
        Some(dir) => BootstrapTemplates::load(dir)
            .with_context(|| format!("Failed to load templates from {}", dir.display()))?,
        None => BootstrapTemplates::bundled().context("Bundled templates are invalid")?,
    };

    let stack_name = stack_name(&cli.config);
    let (stack, _) = build_stack(&config, Arc::new(templates), &stack_name)
        .context("Failed to declare topology")?;

    match cli.command {
        Commands::Plan { format } => {
            let plan = Plan::from_stack(&stack)?;
            println!("{}", render(&plan, format)?);
            info!("✅ Planned {} resources", plan.resources.len());
        }

        Commands::Graph => {
            let graph = DependencyGraph::from_declarations(stack.declarations())?;
            println!("{}", graph.to_dot());
        }

        Commands::Preview {
            show_secrets,
            parallel,
            format,
        } => {
            if show_secrets {
                warn!("🔓 Secret values will be printed");
            }
            let engine = Engine::new(SimulatedProvider::new())
                .with_parallelism(parallel)?
                .reveal_secrets(show_secrets);
            let summary = engine.apply(stack).await?;
            println!("{}", render(&summary, format)?);

            if !summary.is_success() {
                bail!(
                    "Preview failed: {} failed, {} skipped",
                    summary.count(ResourceStatus::Failed),
                    summary.count(ResourceStatus::Skipped)
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_name_from_config_path() {
        assert_eq!(stack_name(Path::new("Pulumi.dev.yaml")), "dev");
        assert_eq!(stack_name(Path::new("/stacks/Pulumi.prod.yml")), "prod");
        assert_eq!(stack_name(Path::new("demo.yaml")), "demo");
    }

    #[test]
    fn test_package_metadata() {
        assert_eq!(env!("CARGO_PKG_LICENSE"), "MIT");
        assert_eq!(env!("CARGO_PKG_REPOSITORY"), "https://github.com/lornu-ai/lornu.ai");
    }

    #[test]
    fn test_cli_parses_preview() {
        let cli = Cli::try_parse_from([
            "tgdemo",
            "--config",
            "Pulumi.dev.yaml",
            "preview",
            "--show-secrets",
            "--parallel",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.project, "tgdemo");
        assert!(matches!(
            cli.command,
            Commands::Preview {
                show_secrets: true,
                parallel: 4,
                ..
            }
        ));
    }
}
