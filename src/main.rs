//! scout: terminal client for a streaming research backend.

mod cli;
mod render;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, Level};

use scout_client::{Endpoint, HttpChannelOpener, Session, SessionConfig};
use scout_core::errors::SubmitRejected;
use scout_core::CheckpointStore;
use scout_settings::{load_settings, load_settings_from_path};
use scout_telemetry::{init_telemetry, parse_level, TelemetryConfig};

use crate::cli::Cli;
use crate::render::Renderer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => load_settings().context("loading settings")?,
    };
    cli.apply(&mut settings);

    let telemetry = init_telemetry(TelemetryConfig {
        log_level: parse_level(&settings.logging.level),
        json: settings.logging.json,
        ..TelemetryConfig::default()
    });

    let endpoint = Endpoint::parse(&settings.endpoint.base_url, &settings.endpoint.stream_path)
        .context("invalid endpoint")?;
    debug!(base_url = %endpoint.base(), "endpoint resolved");
    let opener = HttpChannelOpener::new(Duration::from_millis(settings.endpoint.connect_timeout_ms))
        .context("building http client")?;

    let checkpoints = Arc::new(CheckpointStore::new());
    let mut session = Session::new(
        SessionConfig {
            endpoint,
            greeting: settings.session.greeting().map(str::to_string),
        },
        checkpoints,
    );
    info!(session_id = %session.id(), "session started");

    let mut renderer = Renderer::new();
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", renderer.render(&session.snapshot()))?;
    write!(stdout, "{}", renderer.finish())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "/quit" => break,
            "/debug" => {
                telemetry.set_module_level("scout_client", Level::DEBUG);
                continue;
            }
            _ => {}
        }

        let mut updates = session.subscribe();
        updates.mark_unchanged();
        let outcome = {
            let turn = session.run_turn(&opener, &line);
            tokio::pin!(turn);
            loop {
                tokio::select! {
                    outcome = &mut turn => break outcome,
                    Ok(()) = updates.changed() => {
                        let snapshot = updates.borrow_and_update().clone();
                        write!(stdout, "{}", renderer.render(&snapshot))?;
                        stdout.flush()?;
                    }
                }
            }
        };

        match outcome {
            Ok(report) => {
                write!(stdout, "{}", renderer.render(&session.snapshot()))?;
                write!(stdout, "{}", renderer.finish())?;
                debug!(
                    turn = report.turn,
                    phase = ?report.phase,
                    discarded = report.discarded,
                    "turn complete"
                );
            }
            Err(SubmitRejected::EmptyInput) => {}
            Err(rejected) => eprintln!("{rejected}"),
        }
    }

    info!(session_id = %session.id(), "session ended");
    Ok(())
}
