//! bitrule-swarm: run a swarm of rule-discovery workers until interrupted.
//!
//! Spawns the workers and (with `--config`) a watcher that hot-reloads the
//! worker settings. Stops on SIGINT/SIGTERM or after `--duration`, then
//! prints a summary and optionally dumps every discovered rule as JSON.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use bitrule_engine::{
    ConstantLoad, FitnessOracle, ParityOracle, Rule, Supervisor, SupervisorConfig, TargetOracle,
    WorkerConfig,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Concurrent bit-rule discovery swarm.
#[derive(Parser, Debug)]
#[command(name = "bitrule-swarm", version, about)]
struct Cli {
    /// Number of worker threads (clamped to 1..=16).
    #[arg(long, env = "BITRULE_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Master seed. Omit to seed from the clock.
    #[arg(long, env = "BITRULE_SEED")]
    seed: Option<u32>,

    /// Bits per rule.
    #[arg(long, env = "BITRULE_RULE_LENGTH", default_value_t = 6)]
    rule_length: usize,

    /// Maximum number of rules kept in the result pool.
    #[arg(long, env = "BITRULE_POOL_CAPACITY", default_value_t = 100)]
    pool_capacity: usize,

    /// Pause between worker sweeps, in milliseconds.
    #[arg(long, env = "BITRULE_TICK_MS", default_value_t = 100)]
    tick_ms: u64,

    /// Shutdown timeout in seconds.
    #[arg(long, env = "BITRULE_SHUTDOWN_TIMEOUT", default_value_t = 5)]
    shutdown_timeout: u64,

    /// Worker config TOML file, watched for changes.
    #[arg(long, env = "BITRULE_CONFIG")]
    config: Option<PathBuf>,

    /// Accept rules within `--max-distance` bits of this target (e.g. 101011)
    /// instead of rules with an even number of ones.
    #[arg(long)]
    target: Option<String>,

    /// Hamming distance accepted by `--target`.
    #[arg(long, default_value_t = 0)]
    max_distance: usize,

    /// Constant load factor fed to the rate controller (0-100).
    #[arg(long, default_value_t = 0.0)]
    load: f64,

    /// Stop after this many seconds instead of waiting for a signal.
    #[arg(long)]
    duration: Option<u64>,

    /// Write the run report, discovered rules included, to this JSON file on exit.
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Append logs to this file instead of stderr.
    #[arg(long, env = "BITRULE_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            workers: self.workers,
            seed: self.seed,
            rule_length: self.rule_length,
            pool_capacity: self.pool_capacity,
            tick: Duration::from_millis(self.tick_ms),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout),
            config_path: self.config.clone(),
        }
    }

    fn oracle(&self) -> anyhow::Result<Arc<dyn FitnessOracle>> {
        match &self.target {
            Some(raw) => {
                let target: Rule = raw.parse().context("invalid --target")?;
                anyhow::ensure!(
                    target.len() == self.rule_length,
                    "--target has {} bits but --rule-length is {}",
                    target.len(),
                    self.rule_length
                );
                Ok(Arc::new(TargetOracle::new(target, self.max_distance)))
            }
            None => Ok(Arc::new(ParityOracle)),
        }
    }

    fn worker_config(&self) -> anyhow::Result<WorkerConfig> {
        let Some(path) = &self.config else {
            let mut config = WorkerConfig::default();
            config.apply_env_overrides();
            return Ok(config);
        };
        WorkerConfig::from_file(path)
            .with_context(|| format!("failed to load worker config from {}", path.display()))
    }
}

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
async fn os_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT")?;
        let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM")?;
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl_c")?;
    }
    Ok(())
}

async fn wait_for_stop(duration: Option<Duration>) -> anyhow::Result<()> {
    match duration {
        Some(limit) => {
            tokio::select! {
                result = os_signal() => result,
                _ = tokio::time::sleep(limit) => {
                    info!(seconds = limit.as_secs(), "run duration elapsed");
                    Ok(())
                }
            }
        }
        None => os_signal().await,
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bitrule_core::config::load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_ref())?;

    let worker_config = cli.worker_config()?;
    let mut supervisor = Supervisor::new(cli.supervisor_config(), worker_config)
        .oracle(cli.oracle()?)
        .load_probe(Arc::new(ConstantLoad::new(cli.load)));
    supervisor.start().context("failed to start swarm")?;
    let run_id = supervisor.run_id();

    if let Err(e) = wait_for_stop(cli.duration.map(Duration::from_secs)).await {
        warn!(error = %e, "signal handling failed, shutting down");
    }

    let report = tokio::task::spawn_blocking(move || supervisor.shutdown())
        .await
        .context("shutdown task failed")?;

    if let Some(path) = &cli.dump {
        let file = File::create(path)
            .with_context(|| format!("cannot create dump file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &report)
            .with_context(|| format!("failed to write dump to {}", path.display()))?;
        writer.flush()?;
        info!(path = %path.display(), "wrote run report");
    }

    println!(
        "run {run_id}: {} discoveries, {} rejected, {} workers stopped, {} failed",
        report.discoveries.len(),
        report.rejected,
        report.workers.len(),
        report.failed.len()
    );
    for failure in &report.failed {
        println!("  {}: {}", failure.unit, failure.error);
    }

    if let Some(e) = report.timeout_error() {
        return Err(e.into());
    }
    info!(%run_id, "bitrule-swarm exited cleanly");
    Ok(())
}
