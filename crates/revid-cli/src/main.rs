//! `revid` binary: coordinator and worker entry points.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use revid_core::Settings;

#[derive(Parser)]
#[command(name = "revid", version, about = "Distributed video encoding pipeline")]
struct Cli {
    /// Path to the JSON config file; the environment overrides its values.
    #[arg(long, env = "REVID_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coordinator: HTTP surface, record store, queue publisher.
    Serve,
    /// Run a worker agent: consume tasks and transcode until stopped.
    Worker,
    /// Scan the input root and queue encode tasks for new files.
    Ingest {
        /// Name of the profile to encode with.
        #[arg(long)]
        profile: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Configuration problems are fatal here, before anything connects.
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading configuration from [{}]", cli.config.display()))?;

    match cli.command {
        Command::Serve => {
            let context = revid_axum::build_context(settings).await?;
            revid_axum::serve(context).await
        }
        Command::Worker => revid_worker::run(settings).await,
        Command::Ingest { profile } => {
            let context = revid_axum::build_context(settings).await?;
            let tasks = revid_axum::scan_and_queue(&context, &profile).await?;

            for task in &tasks {
                println!("queued encode task [{}]", task.id);
            }
            println!("{} task(s) queued with profile [{profile}]", tasks.len());
            Ok(())
        }
    }
}
