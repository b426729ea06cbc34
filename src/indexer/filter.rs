//! Traversal filters: the system-root top-level denylist and music
//! pseudo-directory pruning, modeled as a single `should_descend` predicate
//! per §9's design note.

use crate::config::{MUSIC_PSEUDO_DIRS, SYSTEM_ROOT_DENYLIST};
use std::path::{Component, Path};

/// Whether `path` (relative to a drive root) contains a `Music` component
/// immediately followed by one of the Conductor's pseudo-directory names
/// (§4.2.6).
pub fn is_pseudo_directory_path(relpath: &Path) -> bool {
    let parts: Vec<_> = relpath
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect();

    if let Some(music_idx) = parts.iter().position(|p| p == "Music") {
        if let Some(next) = parts.get(music_idx + 1) {
            return MUSIC_PSEUDO_DIRS.contains(&next.as_ref());
        }
    }
    false
}

/// Whether `relpath` falls inside the drive's own `System/ZenFS` reserved area.
pub fn is_zenfs_internal(relpath: &Path) -> bool {
    let mut components = relpath.components();
    matches!(components.next(), Some(Component::Normal(s)) if s == "System")
        && matches!(components.next(), Some(Component::Normal(s)) if s == "ZenFS")
}

/// Whether a top-level directory name under the system root is in the fixed
/// OS denylist (§4.2.1).
pub fn is_denied_top_level(name: &str) -> bool {
    SYSTEM_ROOT_DENYLIST.contains(&name)
}

/// Single predicate deciding whether the initial scan should descend into
/// `relpath` (a directory, relative to the root being scanned). `is_top_level`
/// distinguishes the system-root denylist (applies only at depth 1) from the
/// pseudo-directory prune (applies at any depth, §4.2.6).
pub fn should_descend(relpath: &Path, is_system_root: bool) -> bool {
    if is_system_root {
        let mut components = relpath.components();
        if let Some(Component::Normal(top)) = components.next() {
            if components.next().is_none() && is_denied_top_level(&top.to_string_lossy()) {
                return false;
            }
        }
    }

    if is_pseudo_directory_path(relpath) {
        return false;
    }

    !is_zenfs_internal(relpath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn denies_top_level_system_dirs() {
        assert!(!should_descend(&PathBuf::from("proc"), true));
        assert!(!should_descend(&PathBuf::from("etc"), true));
        // not denied below the home area
        assert!(should_descend(&PathBuf::from("home"), true));
    }

    #[test]
    fn denylist_does_not_apply_below_top_level() {
        // a user directory named "tmp" two levels down is not the denied top-level "tmp"
        assert!(should_descend(&PathBuf::from("home/alice/tmp"), true));
    }

    #[test]
    fn prunes_music_pseudo_dirs_at_any_depth() {
        assert!(!should_descend(&PathBuf::from("Users/alice/Music/Artists"), false));
        assert!(!should_descend(
            &PathBuf::from("Users/alice/Music/.trash_Genres"),
            false
        ));
        assert!(should_descend(&PathBuf::from("Users/alice/Music/Playlists"), false));
    }

    #[test]
    fn prunes_zenfs_internal() {
        assert!(!should_descend(&PathBuf::from("System/ZenFS/Database"), false));
    }

    #[test]
    fn pseudo_dir_path_detection_requires_immediate_child() {
        assert!(is_pseudo_directory_path(Path::new("Music/Artists/Drake")));
        assert!(!is_pseudo_directory_path(Path::new("Music/Drake/Artists")));
    }
}
