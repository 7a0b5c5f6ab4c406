//! pulse-agent - command-line host for the activity monitor.
//!
//! Bridges a line-oriented signal feed (stdin) into a monitor: host
//! adapters write one signal word per line (`pointer`, `key`, `click`,
//! `scroll`, `touch`) and the agent forwards them as interaction
//! signals. EOF or Ctrl-C tears the session down, which triggers the
//! final best-effort flush.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_core::{TelemetryConfig, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::engine::SignalKind;
use crate::monitor::{ActivityMonitor, MonitorContext};
use crate::reporter::HttpReporter;

/// Pulse agent - reports user engagement to a pulsed server
#[derive(Parser, Debug)]
#[command(name = "pulse-agent")]
#[command(about = "Feed interaction signals from stdin into a Pulse session")]
#[command(version)]
struct Args {
    /// Base URL of the pulsed server
    #[arg(long, default_value = "http://127.0.0.1:7171")]
    server: String,

    /// Bearer token identifying the user (omit for anonymous reporting)
    #[arg(long)]
    token: Option<String>,

    /// User id attached to emitted samples
    #[arg(long)]
    user: Option<String>,

    /// Page or view identifier attached to emitted samples
    #[arg(long)]
    page: Option<String>,

    /// Device class attached to emitted samples
    #[arg(long)]
    device: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::from_default_env().add_directive(
        "pulse_monitor=info"
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::Directive::from(tracing::Level::INFO)),
    );

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
pub async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let reporter = HttpReporter::new(&args.server, args.token.clone())
        .context("Failed to build reporter")?;

    let monitor = ActivityMonitor::spawn(
        TelemetryConfig::default(),
        MonitorContext {
            user_id: args.user.map(UserId::new),
            page: args.page,
            device: args.device,
        },
        Arc::new(reporter),
    );
    let handle = monitor.handle();

    info!(
        session_id = %monitor.session_id().short(),
        server = %args.server,
        "Pulse agent started"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, tearing down");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let word = line.trim();
                        if word.is_empty() {
                            continue;
                        }
                        match SignalKind::parse(word) {
                            Some(kind) => handle.touch(kind),
                            None => warn!(word, "Unknown signal word, ignoring"),
                        }
                    }
                    Ok(None) => {
                        info!("Signal feed closed, tearing down");
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "Failed to read signal feed, tearing down");
                        break;
                    }
                }
            }
        }
    }

    // Stop flushes residual credit; give the detached delivery a
    // moment before the runtime drops it.
    monitor.stop().await;
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;

    info!("Pulse agent stopped");
    Ok(())
}
