//! GitOps tree generator CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "gitops")]
#[command(about = "Generate GitOps resource trees from a pipelines manifest", long_about = None)]
struct Cli {
    /// Path to the manifest
    #[arg(long, global = true, env = "GITOPS_MANIFEST", default_value = "pipelines.kdl")]
    manifest: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the manifest and report every problem
    Validate,
    /// Build the resource tree and write it to disk
    Build(commands::build::BuildArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate => {
            commands::validate(&cli.manifest)?;
        }
        Commands::Build(args) => {
            commands::build::run(&cli.manifest, &args)?;
        }
    }

    Ok(())
}
