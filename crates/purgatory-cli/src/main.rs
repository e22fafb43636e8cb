//! purgatory - deferred deletion of external objects.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use purgatory_core::app::{SweepLoop, SweeperBuilder, status};
use purgatory_core::config::Config;
use purgatory_core::domain::{ContentHash, GracePeriod, SweepReport};
use purgatory_core::observability::init_tracing;
use purgatory_core::ports::{Clock, MetadataStore, SystemClock};

/// Purgatory - removes orphaned external objects once their grace period has passed
#[derive(Parser, Debug)]
#[command(name = "purgatory")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (missing file means built-in defaults)
    #[arg(
        short,
        long,
        env = "PURGATORY_CONFIG",
        default_value = "purgatory.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep periodically until interrupted
    Run,
    /// Sweep once and exit
    Sweep {
        /// Evaluate the cutoff against this instant instead of the clock (RFC 3339)
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        /// Override grace_period_secs from the config file
        #[arg(long, allow_negative_numbers = true)]
        grace_period_secs: Option<i64>,
        /// Print the run report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Mark an object as orphaned
    Orphan {
        /// 40-character hex content hash
        hash: ContentHash,
        /// When the object lost its last reference (RFC 3339, default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Cancel a pending deletion because the object is referenced again
    Restore {
        /// 40-character hex content hash
        hash: ContentHash,
    },
    /// Show pending and processed counts
    Status {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn load_config(path: &str) -> Result<Config> {
    let path = Path::new(path);
    if !path.exists() {
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("failed to load config from {}", path.display()))
}

fn print_report(report: &SweepReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    if report.is_disabled() {
        println!("{}: disabled (grace period not set)", report.run_id);
        return Ok(());
    }
    println!(
        "{}: deleted {} of {} scanned, {} skipped, {} failed{}",
        report.run_id,
        report.deleted,
        report.scanned,
        report.skipped,
        report.failed.len(),
        if report.batch_limit_reached {
            " (batch limit reached)"
        } else {
            ""
        }
    );
    for failure in &report.failed {
        println!("  {} {}: {}", failure.id, failure.content_hash, failure.reason);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_tracing(&config.logging).context("failed to initialize logging")?;

    tracing::debug!(config = %cli.config, "purgatory v{}", env!("CARGO_PKG_VERSION"));

    let sweeper = SweeperBuilder::from_config(&config)
        .context("failed to build sweeper")?
        .build()?;
    let clock = SystemClock;

    match cli.command {
        Commands::Run => {
            let handle = SweepLoop::new(
                Arc::new(sweeper),
                Arc::new(clock),
                config.grace_period_secs,
                config.interval(),
            )
            .spawn();

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            tracing::info!("shutdown requested, waiting for the current sweep");
            handle.shutdown_and_join().await;
        }
        Commands::Sweep {
            now,
            grace_period_secs,
            json,
        } => {
            let grace = grace_period_secs.or(config.grace_period_secs);
            if grace_period_secs.is_some() {
                Config {
                    grace_period_secs: grace,
                    ..config.clone()
                }
                .validate()
                .context("invalid --grace-period-secs for this configuration")?;
            }
            let report = sweeper
                .run(grace, now.unwrap_or_else(|| clock.now()))
                .await
                .context("sweep failed")?;
            print_report(&report, json)?;
        }
        Commands::Orphan { hash, at } => {
            let id = sweeper
                .store()
                .register_orphan(&hash, at.unwrap_or_else(|| clock.now()))
                .await
                .with_context(|| format!("failed to register {hash}"))?;
            println!("{id} {hash}");
        }
        Commands::Restore { hash } => {
            let restored = sweeper
                .store()
                .restore(&hash)
                .await
                .with_context(|| format!("failed to restore {hash}"))?;
            if restored {
                println!("restored {hash}");
            } else {
                println!("{hash} was not pending");
            }
        }
        Commands::Status { json } => {
            let grace = GracePeriod::from_config(config.grace_period_secs);
            let view = status(sweeper.store().as_ref(), grace, clock.now()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("enabled:   {}", view.enabled);
                if let Some(cutoff) = view.cutoff {
                    println!("cutoff:    {}", cutoff.to_rfc3339());
                }
                println!("pending:   {}", view.counts.pending);
                println!("processed: {}", view.counts.processed);
                if let Some(oldest) = view.counts.oldest_pending {
                    println!("oldest:    {}", oldest.to_rfc3339());
                }
                println!("backlog:   {}", view.backlog);
            }
        }
    }

    Ok(())
}
