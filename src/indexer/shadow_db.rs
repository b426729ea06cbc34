//! The shadow database: a mirror directory tree whose leaf files record, via
//! their body, which drive owns the path they mirror (§3.1 ShadowEntry, §4.2.3,
//! §6.2, §6.3).

use crate::config::{FOLDER_TAG_MODE, FOLDER_TAG_NAME, SHADOW_DB_ROOT_MODE, SHADOW_ENTRY_MODE};
use std::path::{Path, PathBuf};
use tracing::{instrument, trace, warn};

#[derive(Debug, thiserror::Error)]
pub enum ShadowDbError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> ShadowDbError {
    ShadowDbError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Ensures the shadow-database root exists with the chosen permission mode.
/// This is the only failure the core treats as globally fatal (§7).
pub fn ensure_db_root(root: &Path) -> Result<(), ShadowDbError> {
    std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;
    set_mode(root, SHADOW_DB_ROOT_MODE).map_err(|e| io_err(root, e))?;
    Ok(())
}

/// Computes the stem-plus-identity-plus-extension suffixed name used on
/// collision, e.g. `todo.txt` + `bbbb` -> `todo-bbbb.txt` (§4.2.3).
pub fn suffixed_name(filename: &str, drive_identity: &str) -> String {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.extension() {
        Some(ext) => format!("{stem}-{drive_identity}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{drive_identity}"),
    }
}

/// Creates the directory chain down to `dir`, writing (or refreshing) a
/// [`FOLDER_TAG_NAME`] FolderTag naming `drive_identity` in every directory
/// along the way, matching `_ensure_dir_structure` in the reference indexer.
fn ensure_dir_structure(dir: &Path, drive_identity: &str) -> Result<(), ShadowDbError> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let tag_path = dir.join(FOLDER_TAG_NAME);
    if let Err(e) = std::fs::write(&tag_path, drive_identity) {
        warn!("could not write folder tag at {}: {e}", tag_path.display());
        return Ok(());
    }
    let _ = set_mode(&tag_path, FOLDER_TAG_MODE);
    Ok(())
}

/// Writes a ShadowEntry at `db_root/rel_dir/filename` for `drive_identity`,
/// applying the collision rule of §4.2.3: the first writer keeps the plain
/// name; later writers with a different identity take the suffixed name.
/// Idempotent for repeat writes from the same drive (P3/P1).
#[instrument(skip(db_root), fields(rel_dir = %rel_dir.display(), filename))]
pub fn write_entry(
    db_root: &Path,
    rel_dir: &Path,
    filename: &str,
    drive_identity: &str,
) -> Result<PathBuf, ShadowDbError> {
    let dir = db_root.join(rel_dir);
    ensure_dir_structure(&dir, drive_identity)?;

    let primary = dir.join(filename);
    let target = match std::fs::read_to_string(&primary) {
        Ok(existing) if existing.trim() == drive_identity => primary,
        Ok(_) => dir.join(suffixed_name(filename, drive_identity)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => primary,
        Err(e) => return Err(io_err(&primary, e)),
    };

    std::fs::write(&target, drive_identity).map_err(|e| io_err(&target, e))?;
    let _ = set_mode(&target, SHADOW_ENTRY_MODE);
    trace!(target = %target.display(), "wrote shadow entry");
    Ok(target)
}

/// Removes the ShadowEntry for `filename` at `db_root/rel_dir`, but only if
/// its body still matches `drive_identity` — cross-drive deletes never touch
/// another drive's shadow entry (§4.2.5, P1).
///
/// Checks both the plain name and the identity-suffixed name, since a
/// deleting drive might hold either slot depending on write order.
#[instrument(skip(db_root), fields(rel_dir = %rel_dir.display(), filename))]
pub fn remove_entry_owned_by(
    db_root: &Path,
    rel_dir: &Path,
    filename: &str,
    drive_identity: &str,
) -> Result<(), ShadowDbError> {
    let dir = db_root.join(rel_dir);
    for candidate in [filename.to_string(), suffixed_name(filename, drive_identity)] {
        let path = dir.join(&candidate);
        match std::fs::read_to_string(&path) {
            Ok(body) if body.trim() == drive_identity => {
                std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
                trace!(path = %path.display(), "removed shadow entry");
            }
            Ok(_) => {} // owned by someone else, leave it (P1)
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&path, e)),
        }
    }
    Ok(())
}

/// Unconditionally removes a ShadowEntry if present, regardless of body.
/// Used only for the drive-local database, which belongs entirely to one
/// drive (§4.2.5 step 1, second bullet).
pub fn remove_entry_unconditionally(
    db_root: &Path,
    rel_dir: &Path,
    filename: &str,
    drive_identity: &str,
) -> Result<(), ShadowDbError> {
    let dir = db_root.join(rel_dir);
    for candidate in [filename.to_string(), suffixed_name(filename, drive_identity)] {
        let path = dir.join(&candidate);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&path, e)),
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
