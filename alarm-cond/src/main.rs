/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use alarm_cond::config::{ConfigFile, ScriptedAction};
use alarm_cond::engine::{AlarmEngine, EngineHandle};
use alarm_cond::event::TracingSink;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Alarm engine with periodic display workers.
///
/// Example:
///   alarm-cond --config demos/alarms.yaml --run-for 20
#[derive(Debug, Parser)]
#[command(
    name = "alarm-cond",
    about = "Concurrent alarm scheduling engine",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML engine configuration / scenario file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Seconds to keep the engine running (overrides scenario.run_for_secs).
    #[arg(short = 'r', long = "run-for")]
    run_for: Option<u64>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let cli = Cli::parse();
    info!(config = ?cli.config, run_for = ?cli.run_for, "alarm-cond starting up...");

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    // ── Load configuration ────────────────────────────────────────────────────
    let mut config = ConfigFile::new();
    match &cli.config {
        Some(path) => config
            .load_from_file(path)
            .context("Failed to load engine configuration")?,
        None => warn!("No configuration file provided, running an idle engine with defaults"),
    }

    let run_for = Duration::from_secs(cli.run_for.unwrap_or(config.scenario.run_for_secs));

    // ── Start engine ──────────────────────────────────────────────────────────
    let engine = AlarmEngine::start(config.engine.clone(), Arc::new(TracingSink))
        .context("Failed to start alarm engine")?;
    let producer = engine.handle();

    // ── Replay scenario ───────────────────────────────────────────────────────
    let started = Instant::now();
    for req in &config.scenario.requests {
        let offset = Duration::from_millis(req.at_ms);
        if offset >= run_for {
            warn!(at_ms = req.at_ms, "request scheduled past the run time, skipping the rest");
            break;
        }
        sleep_until(started + offset);
        submit(&producer, &req.action);
    }

    sleep_until(started + run_for);

    engine.shutdown().context("Failed to shut down alarm engine")?;
    info!("alarm-cond finished");
    Ok(())
}

/// Submit one scripted request.  Rejections are reported, not fatal.
fn submit(producer: &EngineHandle, action: &ScriptedAction) {
    let result = match action {
        ScriptedAction::Schedule(req) => producer.schedule(req.clone()).map(|_| ()),
        ScriptedAction::CreateWorker(req) => producer.create_worker(*req),
        ScriptedAction::Cancel(req) => producer.cancel(*req),
    };
    match result {
        Ok(()) => {}
        Err(e) if !e.is_fatal() => warn!(request = ?action, "{}", e),
        Err(e) => {
            error!(request = ?action, "{}", e);
            process::exit(1);
        }
    }
}

fn sleep_until(deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if !remaining.is_zero() {
        thread::sleep(remaining);
    }
}
