//! Terminal tail for a running agent task: connects to the agent-updates
//! feed, folds updates into an activity snapshot, and streams each field to
//! stdout with the word-chunked reveal.

#![allow(clippy::print_stdout)]

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use spyglass_api::{ThreadApiClient, ThreadApiConfig};
use spyglass_client::{AgentFeed, FeedConfig, FeedTarget, ReconnectPolicy};
use spyglass_domain::{ActivityField, ActivitySnapshot, RevealState};
use spyglass_proto::AgentUpdate;
use tracing::{info, warn};

#[derive(Parser, Debug)]
struct Args {
    /// WebSocket base URL of the thread service.
    #[arg(long, env = "SPYGLASS_BASE_URL", default_value = "ws://127.0.0.1:8000")]
    base_url: String,

    /// Thread to follow.
    #[arg(long)]
    thread_id: String,

    /// Bearer credential for the feed (and cancellation, if enabled).
    #[arg(long, env = "SPYGLASS_ACCESS_TOKEN")]
    token: String,

    /// Reveal tick interval in milliseconds.
    #[arg(long, default_value_t = 28)]
    reveal_ms: u64,

    /// HTTP base URL of the thread service, required for --cancel-on-exit.
    #[arg(long, env = "SPYGLASS_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Cancel the running task when exiting on Ctrl-C.
    #[arg(long, default_value_t = false)]
    cancel_on_exit: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let target = FeedTarget::new(args.thread_id.clone(), args.token.clone())
        .context("--thread-id and --token must be non-empty")?;

    let feed = AgentFeed::new(FeedConfig {
        base_url: args.base_url.clone(),
        policy: ReconnectPolicy::default(),
    })?;
    let mut updates = feed.connect_channel(target).await;

    let mut snapshot = ActivitySnapshot::default();
    let mut reveals = [
        (ActivityField::Action, "action", RevealState::new()),
        (ActivityField::Thinking, "thinking", RevealState::new()),
        (ActivityField::Progress, "progress", RevealState::new()),
    ];
    let mut ticker = tokio::time::interval(Duration::from_millis(args.reveal_ms.max(1)));

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else {
                    // The driver is gone: either a normal stop or retries
                    // were exhausted.
                    break;
                };
                if let AgentUpdate::ConnectionEstablished { .. } = &update {
                    let outcome = snapshot.apply(&update);
                    if outcome.changed {
                        println!("== {} ==", snapshot.title);
                    }
                    continue;
                }
                let outcome = snapshot.apply(&update);
                if let Some(window) = outcome.overlay_hide {
                    // Desktop-integration side channel; this consumer only
                    // reports it.
                    info!(window_ms = window.as_millis() as u64, "overlay hide requested");
                }
            }
            _ = ticker.tick() => {
                for (field, label, reveal) in &mut reveals {
                    let (source, live) = match field {
                        ActivityField::Action => {
                            (snapshot.current_action.clone(), snapshot.action_live)
                        }
                        ActivityField::Thinking => (snapshot.thinking.clone(), snapshot.thinking_live),
                        ActivityField::Progress => (snapshot.progress.clone(), snapshot.progress_live),
                    };
                    if source.is_empty() {
                        continue;
                    }
                    let progress = reveal.advance(&source, live);
                    if progress.changed {
                        println!("[{label}] {}", reveal.revealed());
                    }
                    if progress.just_completed {
                        snapshot.settle(*field);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    info!(phase = feed.phase().await.as_str(), "feed stopped");
    feed.disconnect().await;

    if args.cancel_on_exit {
        match args.api_base_url {
            Some(api_base_url) => {
                let api = ThreadApiClient::new(ThreadApiConfig::new(api_base_url, args.token))?;
                match api.cancel_task(&args.thread_id).await {
                    Ok(()) => info!(thread_id = %args.thread_id, "task cancelled"),
                    Err(error) => warn!(%error, "task cancellation failed"),
                }
            }
            None => warn!("--cancel-on-exit requires --api-base-url"),
        }
    }

    Ok(())
}
