//! param-share
//!
//! Runs one invocation: reads a change notification for a vault parameter,
//! resolves the accounts its tags select and converges their replicas.
//!
//! Usage:
//!   param-share --event notification.json
//!   param-share --config share.yaml --region eu-west-2 < notification.json

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use param_share_aws::{ClientOptions, SsmParameterStore, StsCredentialBroker};
use param_share_core::{EventDispatcher, Outcome, ShareConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "param-share")]
#[command(about = "Replicate a tagged parameter into the accounts its tags select")]
struct Args {
    /// YAML configuration file; environment variables override its values
    #[arg(long, env = "PARAM_SHARE_CONFIG")]
    config: Option<PathBuf>,

    /// Notification document, `-` reads standard input
    #[arg(long, default_value = "-")]
    event: String,

    /// AWS region override
    #[arg(long)]
    region: Option<String>,

    /// AWS endpoint override (local emulators)
    #[arg(long)]
    endpoint_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!(error = %format!("{e:#}"), "invocation failed");
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => ShareConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ShareConfig::from_env().context("loading configuration from environment")?,
    };
    let notification = read_event(&args.event)?;

    let sdk_config = ClientOptions {
        region: args.region,
        endpoint_url: args.endpoint_url,
    }
    .load()
    .await;

    let dispatcher = EventDispatcher::new(
        Arc::new(SsmParameterStore::from_sdk_config(&sdk_config)),
        Arc::new(StsCredentialBroker::new(&sdk_config, &config.session_name)),
        config,
    );

    let outcome = dispatcher.handle_json(&notification).await?;
    log_outcome(&outcome);
    Ok(())
}

fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading notification from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(source).with_context(|| format!("reading notification from {source}"))
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Created(report) => info!(targets = report.len(), "replicas created"),
        Outcome::Deleted(report) => info!(targets = report.len(), "replicas deleted"),
        Outcome::Modified { updated, removed } => info!(
            updated = updated.as_ref().map_or(0, |r| r.len()),
            removed = removed.as_ref().map_or(0, |r| r.len()),
            "replicas updated"
        ),
        Outcome::Repropagated(report) => info!(targets = report.len(), "replicas refreshed"),
        Outcome::Skipped(reason) => info!(?reason, "event skipped"),
        Outcome::Unchanged => info!("nothing to do"),
    }
}
