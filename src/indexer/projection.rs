//! ProjectionLinks: symlinks in the host user namespace pointing at roaming
//! files (§3.1 ProjectionLink, §4.2.4).

use crate::indexer::shadow_db::suffixed_name;
use std::path::{Path, PathBuf};
use tracing::trace;

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> ProjectionError {
    ProjectionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Creates (or confirms) a ProjectionLink at `users_root/<relpath>` pointing
/// at the roaming absolute path `source`. `relpath` must already have been
/// confirmed to start with the user-namespace prefix by the caller.
///
/// Idempotent (P3): calling this twice for the same `(source, relpath, drive_identity)`
/// leaves exactly one link targeting `source`.
pub fn project(
    users_root: &Path,
    relpath: &Path,
    source: &Path,
    drive_identity: &str,
) -> Result<PathBuf, ProjectionError> {
    let desired = users_root.join(relpath);

    if let Ok(existing_target) = std::fs::read_link(&desired) {
        if existing_target == source {
            trace!(link = %desired.display(), "projection already correct");
            return Ok(desired);
        }
    }

    if desired.symlink_metadata().is_ok() {
        // occupied by something else: fall back to the suffixed name
        let parent = desired.parent().unwrap_or(users_root);
        let name = desired
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffixed = parent.join(suffixed_name(&name, drive_identity));

        if suffixed.symlink_metadata().is_ok() {
            return Ok(suffixed);
        }

        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        symlink(source, &suffixed)?;
        return Ok(suffixed);
    }

    if let Some(parent) = desired.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    symlink(source, &desired)?;
    Ok(desired)
}

/// Removes any ProjectionLink (plain or suffixed name) whose target equals
/// `source` (§4.2.5 step 2).
pub fn unproject(
    users_root: &Path,
    relpath: &Path,
    source: &Path,
    drive_identity: &str,
) -> Result<(), ProjectionError> {
    let desired = users_root.join(relpath);
    let parent = desired.parent().unwrap_or(users_root);
    let name = desired
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffixed = parent.join(suffixed_name(&name, drive_identity));

    for candidate in [desired, suffixed] {
        if let Ok(target) = std::fs::read_link(&candidate) {
            if target == source {
                std::fs::remove_file(&candidate).map_err(|e| io_err(&candidate, e))?;
                trace!(link = %candidate.display(), "removed projection link");
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(source: &Path, link: &Path) -> Result<(), ProjectionError> {
    std::os::unix::fs::symlink(source, link).map_err(|e| io_err(link, e))
}

#[cfg(not(unix))]
fn symlink(source: &Path, link: &Path) -> Result<(), ProjectionError> {
    std::os::windows::fs::symlink_file(source, link).map_err(|e| io_err(link, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn projects_new_link() {
        let dir = tempdir().unwrap();
        let users_root = dir.path().join("Users");
        let source = dir.path().join("gate/notes/todo.txt");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, "hi").unwrap();

        let link = project(&users_root, Path::new("alice/notes/todo.txt"), &source, "aaaa").unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), source);
    }

    #[test]
    fn repeat_project_is_idempotent() {
        let dir = tempdir().unwrap();
        let users_root = dir.path().join("Users");
        let source = dir.path().join("gate/f.txt");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, "hi").unwrap();

        let l1 = project(&users_root, Path::new("alice/f.txt"), &source, "aaaa").unwrap();
        let l2 = project(&users_root, Path::new("alice/f.txt"), &source, "aaaa").unwrap();
        assert_eq!(l1, l2);

        let mut entries = std::fs::read_dir(users_root.join("alice")).unwrap();
        assert!(entries.next().is_some());
        assert!(entries.next().is_none());
    }

    #[test]
    fn collision_uses_suffixed_name() {
        let dir = tempdir().unwrap();
        let users_root = dir.path().join("Users");
        let source_a = dir.path().join("gateA/notes/todo.txt");
        let source_b = dir.path().join("gateB/notes/todo.txt");
        std::fs::create_dir_all(source_a.parent().unwrap()).unwrap();
        std::fs::create_dir_all(source_b.parent().unwrap()).unwrap();
        std::fs::write(&source_a, "a").unwrap();
        std::fs::write(&source_b, "b").unwrap();

        let link_a = project(&users_root, Path::new("alice/notes/todo.txt"), &source_a, "aaaa").unwrap();
        let link_b = project(&users_root, Path::new("alice/notes/todo.txt"), &source_b, "bbbb").unwrap();

        assert_eq!(link_a, users_root.join("alice/notes/todo.txt"));
        assert_eq!(link_b, users_root.join("alice/notes/todo-bbbb.txt"));
    }

    #[test]
    fn unproject_removes_only_matching_target() {
        let dir = tempdir().unwrap();
        let users_root = dir.path().join("Users");
        let source = dir.path().join("gate/f.txt");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, "hi").unwrap();
        let link = project(&users_root, Path::new("alice/f.txt"), &source, "aaaa").unwrap();
        assert!(link.exists() || link.symlink_metadata().is_ok());

        unproject(&users_root, Path::new("alice/f.txt"), &source, "aaaa").unwrap();
        assert!(link.symlink_metadata().is_err());
    }
}
