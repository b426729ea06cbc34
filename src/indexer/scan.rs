//! Initial synchronous traversal of a watched root, applying the filters of
//! §4.2.1/§4.2.6 before handing each regular file to [`super::sync_file`]
//! (§4.2.8).

use super::{filter, sync_file, DriveContext, IndexError};
use crate::config::ZenPaths;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Walks `ctx.root`, skipping denylisted top-level directories (when
/// `is_system_root` is set), music pseudo-directories at any depth, the
/// ZenFS-internal database tree, and symlinks, and syncs every regular file
/// it finds.
///
/// Matches the reference indexer's `initial_scan`: errors reading individual
/// directories are logged and skipped rather than aborting the whole walk.
#[instrument(skip(paths, ctx), fields(root = %ctx.root.display()))]
pub fn initial_scan(paths: &ZenPaths, ctx: &DriveContext, is_system_root: bool) -> Result<(), IndexError> {
    info!("scanning {} ({})", ctx.root.display(), ctx.identity);
    walk_dir(paths, ctx, &ctx.root.clone(), is_system_root)
}

fn walk_dir(paths: &ZenPaths, ctx: &DriveContext, dir: &Path, is_system_root: bool) -> Result<(), IndexError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("could not read {}: {e}", dir.display());
            return Ok(());
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("could not read entry in {}: {e}", dir.display());
                continue;
            }
        };
        let path = entry.path();

        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                warn!("could not stat {}: {e}", path.display());
                continue;
            }
        };

        // Symlinks are never source files (§4.2.8).
        if file_type.is_symlink() {
            continue;
        }

        let rel = match path.strip_prefix(&ctx.root) {
            Ok(r) => r,
            Err(_) => continue,
        };

        if file_type.is_dir() {
            if filter::should_descend(rel, is_system_root) {
                walk_dir(paths, ctx, &path, is_system_root)?;
            }
            continue;
        }

        if filter::is_pseudo_directory_path(rel) || filter::is_zenfs_internal(rel) {
            continue;
        }

        sync_file(paths, ctx, &path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::DriveType;
    use tempfile::tempdir;

    fn paths_for(root: &Path) -> ZenPaths {
        ZenPaths {
            shadow_db_root: root.join("db"),
            live_root: root.join("live"),
            roaming_root: root.join("roaming"),
            users_root: root.join("Users"),
            identity_relpath: std::path::PathBuf::from("System/ZenFS/drive.json"),
            drive_local_db_relpath: std::path::PathBuf::from("System/ZenFS/Database"),
        }
    }

    #[test]
    fn scan_finds_nested_files_and_skips_denylist() {
        let dir = tempdir().unwrap();
        let paths = paths_for(dir.path());
        let drive_root = dir.path().join("sysroot");
        std::fs::create_dir_all(drive_root.join("home/alice/docs")).unwrap();
        std::fs::write(drive_root.join("home/alice/docs/todo.txt"), "x").unwrap();
        std::fs::create_dir_all(drive_root.join("proc")).unwrap();
        std::fs::write(drive_root.join("proc/fake"), "x").unwrap();

        let ctx = DriveContext::new(&drive_root, "sys-uuid", DriveType::System);
        initial_scan(&paths, &ctx, true).unwrap();

        assert!(paths.shadow_db_root.join("home/alice/docs/todo.txt").exists());
        assert!(!paths.shadow_db_root.join("proc").exists());
    }

    #[test]
    fn scan_skips_music_pseudo_dirs_and_symlinks() {
        let dir = tempdir().unwrap();
        let paths = paths_for(dir.path());
        let drive_root = dir.path().join("roaming/AAAA");
        std::fs::create_dir_all(drive_root.join("Users/bob/Music/Artists/Drake")).unwrap();
        std::fs::write(drive_root.join("Users/bob/Music/Artists/Drake/song.mp3"), "x").unwrap();
        std::fs::write(drive_root.join("Users/bob/real.txt"), "x").unwrap();

        #[cfg(unix)]
        std::os::unix::fs::symlink(
            drive_root.join("Users/bob/real.txt"),
            drive_root.join("Users/bob/link.txt"),
        )
        .unwrap();

        let ctx = DriveContext::new(&drive_root, "aaaa", DriveType::Roaming);
        initial_scan(&paths, &ctx, false).unwrap();

        assert!(paths.shadow_db_root.join("Users/bob/real.txt").exists());
        assert!(!paths.shadow_db_root.join("Users/bob/link.txt").exists());
        assert!(!paths
            .shadow_db_root
            .join("Users/bob/Music/Artists/Drake/song.mp3")
            .exists());
    }
}
