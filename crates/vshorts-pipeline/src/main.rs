//! Vertical short generator CLI.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vshorts_models::ProcessingResult;
use vshorts_pipeline::{Orchestrator, Session};
use vshorts_storage::load_video_asset;

#[derive(Parser, Debug)]
#[command(
    name = "vshorts",
    version,
    about = "Turn videos and text into short vertical videos"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a video and convert it
    Video {
        /// Path to the source video
        path: PathBuf,

        /// Processing mode: simple (vertical reformat) or advanced (split screen with captions)
        #[arg(short, long, default_value = "advanced")]
        mode: String,
    },
    /// Render a video from text
    Text {
        /// Text to render
        #[arg(conflicts_with = "file")]
        text: Option<String>,

        /// Read the text from a file instead
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Check whether the transformation engine is reachable
    Health,
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vshorts=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let orchestrator = Orchestrator::from_env().context("Failed to configure pipeline")?;

    let result = match cli.command {
        Command::Health => {
            let healthy = orchestrator.engine_healthy().await;
            println!("engine: {}", if healthy { "online" } else { "offline" });
            if !healthy {
                std::process::exit(1);
            }
            return Ok(());
        }
        Command::Video { path, mode } => {
            let asset = load_video_asset(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let session = watched_session();
            orchestrator.process_video(&asset, &mode, &session).await
        }
        Command::Text { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?,
                (None, None) => bail!("Provide the text inline or with --file"),
            };
            let session = watched_session();
            orchestrator.process_text(&text, &session).await
        }
    };

    print_result(&result)?;
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Session whose status changes are logged and which Ctrl-C cancels.
fn watched_session() -> Session {
    let session = Session::new();

    let mut status = session.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let snapshot = status.borrow_and_update().clone();
            info!(status = snapshot.status.as_str(), "{}", snapshot.message);
        }
    });

    let cancel = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, abandoning run");
            cancel.cancel();
        }
    });

    session
}

fn print_result(result: &ProcessingResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
