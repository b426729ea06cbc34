//! The Librarian: watches mounted drives and maintains the shadow database
//! and projection links as files appear, change, move, and disappear
//! (§4.2).

pub mod event;
pub mod filter;
pub mod projection;
pub mod scan;
pub mod shadow_db;
pub mod watch;

use crate::config::ZenPaths;
use crate::drive::DriveType;
use event::FsEvent;
use std::path::{Path, PathBuf};
use tracing::{instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    ShadowDb(#[from] shadow_db::ShadowDbError),
    #[error(transparent)]
    Projection(#[from] projection::ProjectionError),
    #[error("path {path} is not under drive root {root}")]
    NotUnderRoot { path: PathBuf, root: PathBuf },
}

/// Everything the dispatch logic needs to know about the drive a watch root
/// belongs to: its filesystem root, its identity, and whether it is the
/// system drive or a roaming participant (§4.2.2, §4.2.5).
#[derive(Debug, Clone)]
pub struct DriveContext {
    pub root: PathBuf,
    pub identity: String,
    pub kind: DriveType,
}

impl DriveContext {
    pub fn new(root: impl Into<PathBuf>, identity: impl Into<String>, kind: DriveType) -> Self {
        Self {
            root: root.into(),
            identity: identity.into(),
            kind,
        }
    }

    pub fn is_roaming(&self) -> bool {
        matches!(self.kind, DriveType::Roaming)
    }

    /// The database this drive writes its own copy of its entries into: the
    /// global shadow database for the system drive, or a drive-local
    /// database under the roaming drive's own root.
    fn local_db_root(&self, paths: &ZenPaths) -> PathBuf {
        if self.is_roaming() {
            paths.drive_local_db(&self.root)
        } else {
            paths.shadow_db_root.clone()
        }
    }

    fn relpath<'a>(&self, abs_path: &'a Path) -> Result<&'a Path, IndexError> {
        abs_path
            .strip_prefix(&self.root)
            .map_err(|_| IndexError::NotUnderRoot {
                path: abs_path.to_path_buf(),
                root: self.root.clone(),
            })
    }
}

/// Syncs one regular file: writes its shadow entries and, for roaming drives
/// under the user namespace, its projection link (§4.2.2).
///
/// Directories, symlinks, and paths inside music pseudo-directories are the
/// caller's responsibility to filter out before calling this — matching the
/// reference indexer's `_sync_file` contract.
#[instrument(skip(paths, ctx), fields(drive = %ctx.identity))]
pub fn sync_file(paths: &ZenPaths, ctx: &DriveContext, abs_path: &Path) -> Result<(), IndexError> {
    let rel = ctx.relpath(abs_path)?;
    let rel_dir = rel.parent().unwrap_or_else(|| Path::new(""));
    let filename = rel
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if filename.is_empty() {
        return Ok(());
    }

    // 1. Drive-local database (roaming drives only carry their own copy).
    if ctx.is_roaming() {
        if let Err(e) = shadow_db::write_entry(&ctx.local_db_root(paths), rel_dir, &filename, &ctx.identity) {
            warn!("drive-local db write failed for {}: {e}", abs_path.display());
        }
    }

    // 2. Global shadow database.
    shadow_db::write_entry(&paths.shadow_db_root, rel_dir, &filename, &ctx.identity)?;

    // 3. Projection link, for roaming files living under the user namespace.
    if ctx.is_roaming() {
        if let Ok(user_rel) = rel.strip_prefix("Users") {
            projection::project(&paths.users_root, user_rel, abs_path, &ctx.identity)?;
        }
    }

    Ok(())
}

/// Removes shadow entries (and, for roaming drives under the user namespace,
/// the projection link) for a file that has disappeared (§4.2.5).
///
/// A move is modeled as `remove_file(src)` followed by `sync_file(dst)`
/// (§5), so this is the single removal primitive both deletes and moves
/// share.
#[instrument(skip(paths, ctx), fields(drive = %ctx.identity))]
pub fn remove_file(paths: &ZenPaths, ctx: &DriveContext, abs_path: &Path) -> Result<(), IndexError> {
    let rel = ctx.relpath(abs_path)?;
    let rel_dir = rel.parent().unwrap_or_else(|| Path::new(""));
    let filename = rel
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if filename.is_empty() {
        return Ok(());
    }

    // The global database entry may be owned by another drive (P1): only
    // remove the slot this drive actually wrote.
    shadow_db::remove_entry_owned_by(&paths.shadow_db_root, rel_dir, &filename, &ctx.identity)?;

    if ctx.is_roaming() {
        shadow_db::remove_entry_unconditionally(&ctx.local_db_root(paths), rel_dir, &filename, &ctx.identity)?;
    }

    if ctx.is_roaming() {
        if let Ok(user_rel) = rel.strip_prefix("Users") {
            projection::unproject(&paths.users_root, user_rel, abs_path, &ctx.identity)?;
        }
    }

    Ok(())
}

/// Dispatches one abstracted filesystem event for a watch root, skipping
/// directories, symlinks, and anything inside a music pseudo-directory
/// (§4.2.1, §4.2.6).
pub fn dispatch(paths: &ZenPaths, ctx: &DriveContext, event: FsEvent) -> Result<(), IndexError> {
    match event {
        FsEvent::Created(path) | FsEvent::Modified(path) => sync_one(paths, ctx, &path),
        FsEvent::Deleted(path) => remove_one(paths, ctx, &path),
        FsEvent::Moved { from, to } => {
            remove_one(paths, ctx, &from)?;
            sync_one(paths, ctx, &to)
        }
    }
}

fn sync_one(paths: &ZenPaths, ctx: &DriveContext, path: &Path) -> Result<(), IndexError> {
    if should_skip(ctx, path) {
        return Ok(());
    }
    if path.is_dir() || path.symlink_metadata().map(|m| m.file_type().is_symlink()).unwrap_or(false) {
        return Ok(());
    }
    sync_file(paths, ctx, path)
}

fn remove_one(paths: &ZenPaths, ctx: &DriveContext, path: &Path) -> Result<(), IndexError> {
    if should_skip(ctx, path) {
        return Ok(());
    }
    remove_file(paths, ctx, path)
}

fn should_skip(ctx: &DriveContext, path: &Path) -> bool {
    match ctx.relpath(path) {
        Ok(rel) => filter::is_pseudo_directory_path(rel) || filter::is_zenfs_internal(rel),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn paths_for(root: &Path) -> ZenPaths {
        ZenPaths {
            shadow_db_root: root.join("db"),
            live_root: root.join("live"),
            roaming_root: root.join("roaming"),
            users_root: root.join("Users"),
            identity_relpath: PathBuf::from("System/ZenFS/drive.json"),
            drive_local_db_relpath: PathBuf::from("System/ZenFS/Database"),
        }
    }

    #[test]
    fn system_drive_sync_writes_global_db_only() {
        let dir = tempdir().unwrap();
        let paths = paths_for(dir.path());
        let drive_root = dir.path().join("home");
        std::fs::create_dir_all(drive_root.join("alice")).unwrap();
        let file = drive_root.join("alice/notes.txt");
        std::fs::write(&file, "hi").unwrap();

        let ctx = DriveContext::new(drive_root, "sys-uuid", DriveType::System);
        sync_file(&paths, &ctx, &file).unwrap();

        assert!(paths.shadow_db_root.join("alice/notes.txt").exists());
        assert!(!paths.users_root.exists());
    }

    #[test]
    fn roaming_drive_sync_writes_both_dbs_and_projects() {
        let dir = tempdir().unwrap();
        let paths = paths_for(dir.path());
        let drive_root = dir.path().join("roaming/AAAA");
        std::fs::create_dir_all(drive_root.join("Users/bob")).unwrap();
        let file = drive_root.join("Users/bob/song.mp3");
        std::fs::write(&file, "data").unwrap();

        let ctx = DriveContext::new(&drive_root, "aaaa", DriveType::Roaming);
        sync_file(&paths, &ctx, &file).unwrap();

        assert!(paths.shadow_db_root.join("Users/bob/song.mp3").exists());
        assert!(drive_root.join("System/ZenFS/Database/Users/bob/song.mp3").exists());
        let link = paths.users_root.join("bob/song.mp3");
        assert_eq!(std::fs::read_link(&link).unwrap(), file);
    }

    #[test]
    fn move_event_removes_then_resyncs() {
        let dir = tempdir().unwrap();
        let paths = paths_for(dir.path());
        let drive_root = dir.path().join("roaming/AAAA");
        std::fs::create_dir_all(drive_root.join("Users/bob")).unwrap();
        let old = drive_root.join("Users/bob/old.txt");
        let new = drive_root.join("Users/bob/new.txt");
        std::fs::write(&old, "x").unwrap();

        let ctx = DriveContext::new(&drive_root, "aaaa", DriveType::Roaming);
        sync_file(&paths, &ctx, &old).unwrap();
        std::fs::rename(&old, &new).unwrap();

        dispatch(&paths, &ctx, FsEvent::Moved { from: old.clone(), to: new.clone() }).unwrap();

        assert!(!paths.shadow_db_root.join("Users/bob/old.txt").exists());
        assert!(paths.shadow_db_root.join("Users/bob/new.txt").exists());
        assert!(std::fs::read_link(paths.users_root.join("bob/old.txt")).is_err());
        assert_eq!(
            std::fs::read_link(paths.users_root.join("bob/new.txt")).unwrap(),
            new
        );
    }

    #[test]
    fn pseudo_directory_paths_are_never_synced() {
        let dir = tempdir().unwrap();
        let paths = paths_for(dir.path());
        let drive_root = dir.path().join("roaming/AAAA");
        std::fs::create_dir_all(drive_root.join("Users/bob/Music/Artists/Drake")).unwrap();
        let file = drive_root.join("Users/bob/Music/Artists/Drake/song.mp3");
        std::fs::write(&file, "x").unwrap();

        let ctx = DriveContext::new(&drive_root, "aaaa", DriveType::Roaming);
        dispatch(&paths, &ctx, FsEvent::Created(file)).unwrap();

        assert!(!paths.shadow_db_root.exists());
    }
}
