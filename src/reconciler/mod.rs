//! The Nomad: discovers block devices, mounts them under identity-keyed
//! Gates, cleans up stale gates, and notifies on attach (§4.1).

pub mod block_device;
pub mod mount;

use crate::config::ZenPaths;
use crate::drive::DriveIdentity;
use crate::notify::{Notification, Notifier, Urgency};
use block_device::{enumerate, BlockDevice, EnumerationError};
use mount::{bind_mount, is_mount, mount_device};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to create {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
}

fn io_err(path: &Path, source: std::io::Error) -> ReconcileError {
    ReconcileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Summary of one reconciliation cycle, for CLI/log reporting.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub devices_seen: usize,
    pub devices_mounted: usize,
    pub gates_opened: Vec<String>,
    pub gates_cleaned: usize,
    pub live_cleaned: usize,
}

/// Tracks which Gate identities were mounted as of the last cycle, so
/// detachments can be noticed across calls and fed to
/// [`sweep_stale_projections`] (§9 Open Questions decision).
#[derive(Debug, Default)]
pub struct GateTracker {
    previously_mounted: HashSet<String>,
}

/// Runs one Reconciler cycle: mounts newly-seen devices, opens Gates for
/// identified ones, and cleans up anything stale. Every step is best-effort
/// per §7 — individual failures are logged, never propagated.
#[instrument(skip(paths, notifier, tracker))]
pub async fn reconcile(
    paths: &ZenPaths,
    notifier: &dyn Notifier,
    tracker: &mut GateTracker,
) -> Result<ReconcileReport, ReconcileError> {
    let mut report = ReconcileReport::default();

    let devices = match enumerate().await {
        Ok(devices) => devices,
        Err(e) => {
            warn!("block device enumeration failed, skipping this cycle: {e}");
            return Ok(report);
        }
    };
    report.devices_seen = devices.len();

    mount_physical_drives(paths, &devices, &mut report).await?;
    manage_roaming_gates(paths, notifier, &mut report).await?;
    cleanup_live_root(paths, &mut report).await?;
    let currently_mounted = cleanup_stale_gates(paths, &mut report).await?;

    let detached: Vec<String> = tracker
        .previously_mounted
        .difference(&currently_mounted)
        .cloned()
        .collect();
    for identity in &detached {
        info!("gate {identity} detached, sweeping stale projections");
        sweep_stale_projections(paths, identity);
    }
    tracker.previously_mounted = currently_mounted;

    Ok(report)
}

async fn mount_physical_drives(
    paths: &ZenPaths,
    devices: &[BlockDevice],
    report: &mut ReconcileReport,
) -> Result<(), ReconcileError> {
    for device in devices {
        if device.mountpoint.is_some() {
            continue;
        }
        let live_path = paths.live_path(&device.uuid);
        if !live_path.exists() {
            std::fs::create_dir_all(&live_path).map_err(|e| io_err(&live_path, e))?;
        }
        if !is_mount(&live_path) {
            info!("mounting physical {} -> {}", device.dev_path(), live_path.display());
            if mount_device(&device.dev_path(), &live_path).await {
                report.devices_mounted += 1;
            }
        }
    }
    Ok(())
}

async fn manage_roaming_gates(
    paths: &ZenPaths,
    notifier: &dyn Notifier,
    report: &mut ReconcileReport,
) -> Result<(), ReconcileError> {
    if !paths.live_root.exists() {
        return Ok(());
    }
    let entries = std::fs::read_dir(&paths.live_root).map_err(|e| io_err(&paths.live_root, e))?;

    for entry in entries.flatten() {
        let live_path = entry.path();
        if !live_path.is_dir() || !is_mount(&live_path) {
            continue;
        }

        let identity_path = paths.identity_file(&live_path);
        let identity = match DriveIdentity::read_from(&identity_path) {
            Ok(identity) => identity,
            Err(_) => continue, // unidentified drive: no Gate (§7)
        };

        let gate_path = paths.gate_path(&identity.uuid);
        if !gate_path.exists() {
            std::fs::create_dir_all(&gate_path).map_err(|e| io_err(&gate_path, e))?;
        }
        if !is_mount(&gate_path) {
            info!("identity found ({}), opening gate", identity.uuid);
            if bind_mount(&live_path, &gate_path).await {
                report.gates_opened.push(identity.uuid.clone());
                notifier
                    .notify(
                        Notification::new(
                            "ZenOS Nomad",
                            format!("Roaming drive connected: {}", identity.uuid),
                        )
                        .icon("drive-removable-media")
                        .urgency(Urgency::Normal),
                    )
                    .await;
            }
        }
    }
    Ok(())
}

async fn cleanup_live_root(paths: &ZenPaths, report: &mut ReconcileReport) -> Result<(), ReconcileError> {
    if !paths.live_root.exists() {
        return Ok(());
    }
    let entries = std::fs::read_dir(&paths.live_root).map_err(|e| io_err(&paths.live_root, e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && !is_mount(&path) {
            if let Ok(mut dir) = std::fs::read_dir(&path) {
                if dir.next().is_none() {
                    let _ = std::fs::remove_dir(&path);
                    report.live_cleaned += 1;
                }
            }
        }
    }
    Ok(())
}

/// Cleans up any Gate that is no longer a mount, returning the set of
/// identities that remain mounted afterward (§4.1 step 4).
async fn cleanup_stale_gates(
    paths: &ZenPaths,
    report: &mut ReconcileReport,
) -> Result<HashSet<String>, ReconcileError> {
    let mut mounted = HashSet::new();
    if !paths.roaming_root.exists() {
        return Ok(mounted);
    }
    let entries = std::fs::read_dir(&paths.roaming_root).map_err(|e| io_err(&paths.roaming_root, e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let identity = entry.file_name().to_string_lossy().into_owned();
        if is_mount(&path) {
            mounted.insert(identity);
        } else {
            let _ = std::fs::remove_dir(&path);
            report.gates_cleaned += 1;
        }
    }
    Ok(mounted)
}

/// Opt-in maintenance pass: removes any ProjectionLink in the user namespace
/// whose target is no longer reachable because `identity`'s Gate is gone.
/// The source scripts never did this (§9 Open Questions) — we sweep the
/// whole `users_root` tree for dangling links rather than tracking which
/// links came from which drive, since that index is not otherwise kept.
pub fn sweep_stale_projections(paths: &ZenPaths, identity: &str) {
    if !paths.users_root.exists() {
        return;
    }
    let gate_path = paths.gate_path(identity);
    let removed = sweep_dir(&paths.users_root, &gate_path);
    if removed > 0 {
        info!("swept {removed} stale projections for departed gate {identity}");
    }
}

fn sweep_dir(dir: &Path, departed_gate: &Path) -> usize {
    let mut removed = 0;
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_symlink() => {
                if let Ok(target) = std::fs::read_link(&path) {
                    if target.starts_with(departed_gate) && std::fs::remove_file(&path).is_ok() {
                        removed += 1;
                    }
                }
            }
            Ok(ft) if ft.is_dir() => removed += sweep_dir(&path, departed_gate),
            _ => {}
        }
    }
    removed
}
