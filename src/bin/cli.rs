//! ZenFS CLI
//!
//! The process a system-service unit or timer invokes to run one cycle of
//! any of the three core components (§10.5).
//!
//! Usage:
//!   zenfs reconcile
//!   zenfs index --watch /home --identity <uuid>
//!   zenfs conduct

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use zenfs_core::conductor;
use zenfs_core::config::{default_data_dir, ZenConfig};
use zenfs_core::drive::DriveType;
use zenfs_core::indexer::{self, scan, shadow_db, watch, DriveContext};
use zenfs_core::notify::{DbusNotifier, NoopNotifier, Notifier};
use zenfs_core::reconciler::{self, GateTracker};

#[derive(Parser)]
#[command(name = "zenfs", about = "ZenFS overlay filesystem core", version)]
struct Cli {
    /// Emit machine-readable JSON instead of a human-readable summary.
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding zenfs.toml. Defaults to the platform config dir.
    #[arg(long, env = "ZENFS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Desktop session uid to notify, if any. Without it, notifications are
    /// logged but not delivered.
    #[arg(long)]
    notify_uid: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one Reconciler cycle: mount devices, open Gates, clean up stale ones.
    Reconcile,
    /// Run the Indexer against one root in the foreground.
    Index {
        /// Absolute path of the drive root to watch.
        #[arg(long)]
        watch: PathBuf,
        /// The drive's identity uuid.
        #[arg(long)]
        identity: String,
        /// Whether this is a roaming drive (system drive if omitted).
        #[arg(long)]
        roaming: bool,
    },
    /// Run one Conductor build: regenerate the music view trees.
    Conduct,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir.clone() {
        Some(dir) => dir,
        None => default_data_dir().context("resolving default data directory")?,
    };
    let config = ZenConfig::load_or_create(&data_dir).context("loading configuration")?;

    // The one documented fatal startup condition (§7): if the shadow-database
    // root can't be created with its required mode, refuse to start rather
    // than limp along until the first per-file write fails non-fatally deep
    // inside a sync path.
    shadow_db::ensure_db_root(&config.paths.shadow_db_root)
        .context("creating shadow database root")?;

    let notifier: Box<dyn Notifier> = match cli.notify_uid {
        Some(uid) => Box::new(DbusNotifier::new(uid)),
        None => Box::new(NoopNotifier),
    };

    match cli.command {
        Command::Reconcile => run_reconcile(&config, notifier.as_ref(), cli.json).await,
        Command::Index { watch, identity, roaming } => {
            run_index(&config, watch, identity, roaming).await
        }
        Command::Conduct => run_conduct(&config, notifier.as_ref(), cli.json).await,
    }
}

async fn run_reconcile(config: &ZenConfig, notifier: &dyn Notifier, json: bool) -> Result<()> {
    let mut tracker = GateTracker::default();
    let report = reconciler::reconcile(&config.paths, notifier, &mut tracker)
        .await
        .context("reconciliation cycle failed")?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "devices_seen": report.devices_seen,
                "devices_mounted": report.devices_mounted,
                "gates_opened": report.gates_opened,
                "gates_cleaned": report.gates_cleaned,
                "live_cleaned": report.live_cleaned,
            })
        );
        return Ok(());
    }

    println!("{}", "ZenFS Reconciler".bold());
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["metric", "value"]);
    table.add_row(vec!["devices seen".to_string(), report.devices_seen.to_string()]);
    table.add_row(vec!["devices mounted".to_string(), report.devices_mounted.to_string()]);
    table.add_row(vec!["gates opened".to_string(), report.gates_opened.len().to_string()]);
    table.add_row(vec!["gates cleaned".to_string(), report.gates_cleaned.to_string()]);
    table.add_row(vec!["live mounts cleaned".to_string(), report.live_cleaned.to_string()]);
    println!("{table}");
    Ok(())
}

async fn run_index(config: &ZenConfig, root: PathBuf, identity: String, roaming: bool) -> Result<()> {
    let kind = if roaming { DriveType::Roaming } else { DriveType::System };
    let ctx = DriveContext::new(root.clone(), identity, kind);

    println!("{} {}", "scanning".bold(), root.display());
    scan::initial_scan(&config.paths, &ctx, !roaming).context("initial scan failed")?;

    println!("{} {}", "watching".bold(), root.display());
    let mut root_watch = watch::watch_root(&root).context("failed to start watcher")?;
    while let Some(event) = root_watch.events.recv().await {
        if let Err(e) = indexer::dispatch(&config.paths, &ctx, event) {
            tracing::warn!("dispatch failed: {e}");
        }
    }
    Ok(())
}

async fn run_conduct(config: &ZenConfig, notifier: &dyn Notifier, json: bool) -> Result<()> {
    let report = conductor::run(&config.conductor, notifier)
        .await
        .context("conductor build failed")?;

    if json {
        println!("{}", serde_json::json!({ "tracks_planted": report.tracks_planted }));
        return Ok(());
    }

    println!("{}", "ZenFS Conductor".bold());
    println!("tracks planted: {}", report.tracks_planted.to_string().green());
    Ok(())
}
