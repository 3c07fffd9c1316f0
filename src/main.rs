//! # Media Dashboard Sync CLI (`mdsync`)
//!
//! Runs the preload and content-monitor core against a media server from
//! the command line.
//!
//! ## Usage
//!
//! ```bash
//! mdsync --config ./config/mdsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mdsync init` | Create the SQLite database and run schema migrations |
//! | `mdsync preload` | Run the preload once (fast or full path) |
//! | `mdsync run` | Preload, then watch for new media until Ctrl-C |
//! | `mdsync monitor` | Run a single content-monitor pass |
//! | `mdsync resync` | Force a full rebuild on the next preload |
//! | `mdsync status` | Show markers, poster count and cached sections |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mediadash_sync::config::{self, Config};
use mediadash_sync::context::SyncContext;
use mediadash_sync::http::HttpUpstream;
use mediadash_sync::markers::{MarkerStore, SqliteMarkerStore};
use mediadash_sync::monitor::ContentMonitor;
use mediadash_sync::orchestrator::{PreloadOrchestrator, PreloadOutcome};
use mediadash_sync::posters::SqlitePosterCache;
use mediadash_sync::progress::ProgressMode;
use mediadash_sync::scheduler::ScheduledTask;
use mediadash_sync::{db, migrate, status};

/// Preload and background sync for a personal media-server dashboard.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/mdsync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mdsync",
    about = "Preload and background sync for a personal media-server dashboard",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mdsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Bring the cache into a renderable state and exit.
    Preload {
        /// Progress output on stderr. Defaults to `human` on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Preload, then run the content monitor until interrupted.
    Run {
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Run one content-monitor pass against the cached sections.
    Monitor,

    /// Make the next preload rebuild everything.
    Resync,

    /// Show the local sync state.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Preload { progress } => {
            let (pool, ctx) = open(&cfg).await?;
            let orchestrator = PreloadOrchestrator::new(ctx);
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            if let Some(outcome) = orchestrator.run(reporter.as_ref()).await {
                print_outcome(&outcome);
            }
            pool.close().await;
        }
        Commands::Run { progress } => {
            let (pool, ctx) = open(&cfg).await?;
            let orchestrator = PreloadOrchestrator::new(ctx.clone());
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            if let Some(outcome) = orchestrator.run(reporter.as_ref()).await {
                print_outcome(&outcome);
            }

            let monitor = Arc::new(ContentMonitor::new(ctx));
            let handle = ScheduledTask::spawn(
                monitor,
                cfg.monitor.initial_delay(),
                cfg.monitor.interval(),
            );

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            tracing::info!("Shutting down");
            handle.cancel();
            pool.close().await;
        }
        Commands::Monitor => {
            let (pool, ctx) = open(&cfg).await?;
            let report = ContentMonitor::new(ctx).run_once().await;
            println!(
                "Checked {} section(s), {} failed, {} new item(s).",
                report.sections_checked, report.sections_failed, report.new_items
            );
            for (section_id, count) in &report.per_section {
                println!("  section {}: +{}", section_id, count);
            }
            pool.close().await;
        }
        Commands::Resync => {
            let pool = db::connect(&cfg).await?;
            migrate::apply(&pool).await?;
            SqliteMarkerStore::new(pool.clone())
                .request_full_resync()
                .await?;
            println!("Full resync scheduled for the next preload.");
            pool.close().await;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
    }

    Ok(())
}

/// Connect, migrate, wire the production collaborators and restore the last
/// cache snapshot.
async fn open(cfg: &Config) -> Result<(SqlitePool, SyncContext)> {
    let pool = db::connect(cfg).await?;
    migrate::apply(&pool).await?;

    let upstream = Arc::new(HttpUpstream::new(cfg.upstream.clone())?);
    let posters = Arc::new(SqlitePosterCache::new(pool.clone()));
    let markers = Arc::new(SqliteMarkerStore::new(pool.clone()));
    let ctx = SyncContext::new(cfg, upstream, posters, markers).with_snapshot_pool(pool.clone());

    match ctx.cache.load_snapshot(&pool).await {
        Ok(n) => tracing::debug!("Restored {} cache entries", n),
        Err(e) => tracing::warn!("Could not restore cache snapshot: {:#}", e),
    }
    Ok((pool, ctx))
}

fn print_outcome(outcome: &PreloadOutcome) {
    if let Some(message) = &outcome.message {
        println!("Ready (degraded): {}", message);
        return;
    }
    let Some(report) = &outcome.report else {
        return;
    };
    println!(
        "Ready via {} path ({}).",
        report.pipeline, outcome.decision.reason
    );
    println!("  Sections:  {} ({} skipped)", report.sections, report.sections_skipped);
    println!(
        "  Items:     {} enriched, {} stubs kept",
        report.items_enriched, report.stubs_kept
    );
    println!(
        "  Posters:   {} cached, {} failed",
        report.posters_cached, report.posters_failed
    );
}
