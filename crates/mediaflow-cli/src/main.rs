//! Mediaflow CLI: run one storage event through the media pipeline.
//!
//! Storage and engine settings come from the environment (see `mediaflow_core::Config`);
//! handler options come from a JSON profile file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use mediaflow_cli::{init_tracing, parse_meta, PathTemplate};
use mediaflow_core::Config;
use mediaflow_orchestrator::{Orchestrator, RunConfig};
use mediaflow_processing::{FfmpegTools, HandlerProfiles};
use mediaflow_storage::{create_storage, ObjectMetadata};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediaflow", about = "Media variant pipeline")]
struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one event and print the notification
    Run {
        /// Path to the event envelope JSON
        #[arg(long)]
        event: PathBuf,
        /// Path to the handler profile JSON
        #[arg(long)]
        profile: PathBuf,
        /// Destination key template for every variant
        #[arg(long, default_value = "{key_stem}/{name}")]
        path_template: String,
        /// Canned ACL for uploads (defaults to DEFAULT_ACL)
        #[arg(long)]
        acl: Option<String>,
        /// User metadata attached to every upload, as key=value
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run {
            event,
            profile,
            path_template,
            acl,
            meta,
        } => {
            let succeeded = run(event, profile, path_template, acl, meta).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn run(
    event: PathBuf,
    profile: PathBuf,
    path_template: String,
    acl: Option<String>,
    meta: Vec<(String, String)>,
) -> anyhow::Result<bool> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;

    let storage = create_storage(&config)
        .await
        .context("Failed to create storage backend")?;
    let profiles = HandlerProfiles::from_file(&profile).await?;
    let template = PathTemplate::parse(&path_template)?;
    let event = tokio::fs::read_to_string(&event)
        .await
        .with_context(|| format!("Failed to read event {}", event.display()))?;

    let acl = acl.unwrap_or_else(|| config.default_acl.clone());
    let metadata: ObjectMetadata = meta.into_iter().collect();

    tracing::info!(
        backend = %storage.backend_type(),
        tmp_dir_root = %config.tmp_dir_root.display(),
        acl = %acl,
        "Starting run"
    );

    let run_config = RunConfig::from_profiles(
        profiles,
        FfmpegTools::from_config(&config),
        move |descriptor, variant| template.render(descriptor, variant),
    )
    .with_tmp_dir_root(config.tmp_dir_root.clone())
    .with_acl(acl)
    .with_metadata_factory(move |_, _| metadata.clone());

    let outcome = Orchestrator::new(storage, run_config).run(&event).await;

    println!("{}", serde_json::to_string_pretty(&outcome.notification)?);
    Ok(outcome.is_success())
}
