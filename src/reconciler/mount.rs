//! Mount-point probing and the `mount`/`mount --bind` shellouts the
//! Reconciler drives (§4.1 steps 2–3), grounded on the teacher's device-id
//! comparison idiom in `operations/indexing/entry.rs`.

use std::path::Path;
use tokio::process::Command;
use tracing::warn;

/// Whether `path` is itself a mount point: its device id differs from its
/// parent's (mirrors `os.path.ismount`).
#[cfg(unix)]
pub fn is_mount(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    let Some(parent) = path.parent() else {
        return true;
    };
    let Ok(parent_meta) = std::fs::metadata(parent) else {
        return false;
    };
    meta.dev() != parent_meta.dev()
}

#[cfg(not(unix))]
pub fn is_mount(_path: &Path) -> bool {
    false
}

/// Mounts `dev_path` at `target`, with world-traversable permissions on
/// filesystems that lack native unix permission bits (§4.1 step 2). Mount
/// failures are non-fatal: the Reconciler logs and retries next cycle.
pub async fn mount_device(dev_path: &str, target: &Path) -> bool {
    run_mount(&[
        "-o",
        "X-mount.mkdir,chmod=0777",
        dev_path,
        &target.to_string_lossy(),
    ])
    .await
}

/// Bind-mounts `source` onto `target` (a Gate opening, §4.1 step 3).
pub async fn bind_mount(source: &Path, target: &Path) -> bool {
    run_mount(&[
        "--bind",
        &source.to_string_lossy(),
        &target.to_string_lossy(),
    ])
    .await
}

async fn run_mount(args: &[&str]) -> bool {
    match Command::new("mount").args(args).output().await {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            warn!(
                "mount {:?} failed: {}",
                args,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(e) => {
            warn!("failed to spawn mount: {e}");
            false
        }
    }
}
