//! Reltrack command line: runs one tracking pass over the configured
//! components and prints the consolidated status.
//!
//! Exit status reflects the run, not the pipelines: a blocked
//! component exits zero, because the run itself answered the question.
//! Only configuration and startup failures exit non-zero.

mod config_file;
mod render;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use reltrack::prelude::{HttpAdapterFactory, RunCoordinator, TrackingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "reltrack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tracks release propagation from merge to mirror", long_about = None)]
struct Cli {
    /// Path to the tracking configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Track only the named component; may be given multiple times
    #[arg(long = "component")]
    components: Vec<String>,

    /// Enable verbose logging (DEBUG level)
    #[arg(short, long)]
    verbose: bool,

    /// Skip the fetch cache for this run
    #[arg(long)]
    no_cache: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Markdown)]
    format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Human-readable markdown
    Markdown,
    /// The full run summary as JSON
    Json,
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Restricts the configuration to the named components, preserving
/// configuration order. An unknown name is a configuration error.
fn select_components(mut config: TrackingConfig, names: &[String]) -> Result<TrackingConfig> {
    if names.is_empty() {
        return Ok(config);
    }
    for name in names {
        if !config.components.iter().any(|c| &c.name == name) {
            bail!("unknown component '{name}'");
        }
    }
    config.components.retain(|c| names.contains(&c.name));
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let mut config = config_file::load(&cli.config)?;
    config = select_components(config, &cli.components)?;
    if cli.no_cache {
        config.options.cache = None;
    }

    let factory = Arc::new(HttpAdapterFactory::new(&config.options)?);
    let summary = RunCoordinator::new(config, factory).run().await?;

    match cli.format {
        Format::Markdown => print!("{}", render::render_markdown(&summary)),
        Format::Json => {
            let json =
                serde_json::to_string_pretty(&summary).context("failed to encode summary")?;
            println!("{json}");
        }
    }

    if summary.degraded {
        tracing::warn!("some stages could not be observed; results are partial");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reltrack::prelude::{IdentityRule, StageBinding, StageKind, TrackedComponent};

    fn config() -> TrackingConfig {
        let stage = |name: &str| {
            TrackedComponent::new(
                name,
                vec![IdentityRule::PackageName],
                vec![StageBinding::new(
                    "merged",
                    StageKind::SourceRepo,
                    "src-host",
                    "https://src.example.org/pool/",
                )],
            )
        };
        TrackingConfig::new(vec![stage("agama"), stage("cockpit")])
    }

    #[test]
    fn test_no_selection_keeps_all_components() {
        let selected = select_components(config(), &[]).unwrap();
        assert_eq!(selected.components.len(), 2);
    }

    #[test]
    fn test_selection_filters_by_name() {
        let selected = select_components(config(), &["cockpit".to_string()]).unwrap();
        assert_eq!(selected.components.len(), 1);
        assert_eq!(selected.components[0].name, "cockpit");
    }

    #[test]
    fn test_unknown_component_rejected() {
        assert!(select_components(config(), &["nope".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        use clap::Parser as _;
        let cli = Cli::parse_from([
            "reltrack",
            "--config",
            "other.yml",
            "--component",
            "agama",
            "--verbose",
            "--no-cache",
            "--format",
            "json",
        ]);
        assert_eq!(cli.config, PathBuf::from("other.yml"));
        assert_eq!(cli.components, vec!["agama".to_string()]);
        assert!(cli.verbose);
        assert!(cli.no_cache);
        assert_eq!(cli.format, Format::Json);
    }
}
