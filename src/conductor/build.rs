//! The hot-swap symlink-forest build protocol (§4.3 steps 1–6), grounded on
//! `generate_forest` in `scripts/janitor/music.py`.

use super::sanitize::{resolve_artists, sanitize_name};
use super::tags::read_tags;
use crate::config::ConductorConfig;
use crate::notify::{Notification, Notifier, Urgency};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

const CATEGORIES: &[&str] = &["Artists", "Years", "Genres", "OSTs"];

#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> ConductorError {
    ConductorError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub tracks_planted: usize,
}

/// Runs one Conductor build: wipes and refills the `.building` staging
/// tree from `config.unsorted_dir`, then hot-swaps each category into
/// `config.music_dir` (§4.3).
#[instrument(skip(config, notifier))]
pub async fn run(config: &ConductorConfig, notifier: &dyn Notifier) -> Result<BuildReport, ConductorError> {
    let staging = config.music_dir.join(".building");
    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
    }
    std::fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;

    if !config.unsorted_dir.exists() {
        warn!("source directory {} does not exist", config.unsorted_dir.display());
        return Ok(BuildReport::default());
    }

    let mut report = BuildReport::default();
    plant_tree(config, &staging, &config.unsorted_dir, &mut report)?;

    for category in CATEGORIES {
        hot_swap_category(&config.music_dir, &staging, category);
    }

    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
    }

    if report.tracks_planted > 0 {
        info!("forest regenerated: {} tracks", report.tracks_planted);
        notifier
            .notify(
                Notification::new(
                    "ZenOS Conductor",
                    format!("Forest regenerated (hotswap). Planted {} tracks.", report.tracks_planted),
                )
                .urgency(Urgency::Low)
                .icon("audio-x-generic"),
            )
            .await;
    }

    Ok(report)
}

fn plant_tree(
    config: &ConductorConfig,
    staging: &Path,
    dir: &Path,
    report: &mut BuildReport,
) -> Result<(), ConductorError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("could not read {}: {e}", dir.display());
            return Ok(());
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            plant_tree(config, staging, &path, report)?;
            continue;
        }
        if plant_file(config, staging, &path) {
            report.tracks_planted += 1;
        }
    }
    Ok(())
}

/// Plants every ViewLink for one source file. Returns whether the file was
/// successfully tagged and planted (tag read failures are silently skipped,
/// §4.3 step 2).
fn plant_file(config: &ConductorConfig, staging: &Path, source: &Path) -> bool {
    let Some(tags) = read_tags(source) else {
        return false;
    };

    let ext = source.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();
    let title = tags.title.unwrap_or_else(|| {
        source.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
    });
    let album = tags.album.unwrap_or_else(|| "Unknown Album".to_string());
    let year = tags.year.map(|y| y.chars().take(4).collect::<String>()).unwrap_or_else(|| "0000".to_string());

    let s_title = sanitize_name(&title);
    let s_album = sanitize_name(&album);
    let s_year = sanitize_name(&year);
    let filename = if ext.is_empty() { s_title.clone() } else { format!("{s_title}.{ext}") };

    let artists = resolve_artists(&tags.artists, &tags.album_artists, &config.split_symbols);
    for artist in &artists {
        let s_artist = sanitize_name(artist);
        create_symlink(
            source,
            &staging.join("Artists").join(&s_artist).join(&s_album).join(&filename),
        );
    }

    create_symlink(
        source,
        &staging.join("Years").join(&s_year).join(&s_album).join(&filename),
    );

    for genre in &tags.genres {
        let s_genre = sanitize_name(genre);
        create_symlink(source, &staging.join("Genres").join(&s_genre).join(&filename));
    }

    let is_ost = tags.genres.iter().any(|g| g.to_lowercase().contains("soundtrack")) || album.to_lowercase().contains("ost");
    if is_ost {
        create_symlink(source, &staging.join("OSTs").join(&s_album).join(&filename));
    }

    true
}

/// Creates a symlink at `dest` pointing at `source`, overwriting any
/// existing entry there (last writer wins within the staging tree, §4.3
/// step 3). Individual failures are swallowed to keep the forest growing.
fn create_symlink(source: &Path, dest: &Path) {
    if let Some(parent) = dest.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    if dest.symlink_metadata().is_ok() {
        let _ = std::fs::remove_file(dest);
    }
    let _ = symlink(source, dest);
}

#[cfg(unix)]
fn symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(not(unix))]
fn symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(source, dest)
}

/// Hot-swaps one category from the staging tree into the live view tree
/// (§4.3 step 4). On rename failure, restores from the trash snapshot
/// (S5) so observers never see a missing or partial category.
fn hot_swap_category(view_dir: &Path, staging: &Path, category: &str) {
    let new_dir = staging.join(category);
    if !new_dir.exists() {
        return;
    }

    let target_dir = view_dir.join(category);
    let trash_dir = view_dir.join(format!(".trash_{category}"));

    if target_dir.exists() {
        if let Err(e) = std::fs::rename(&target_dir, &trash_dir) {
            warn!("hotswap fail (trash) for {category}: {e}");
            return;
        }
    }

    if let Err(e) = std::fs::rename(&new_dir, &target_dir) {
        warn!("hotswap fail (activate) for {category}: {e}");
        if trash_dir.exists() {
            let _ = std::fs::rename(&trash_dir, &target_dir);
        }
        return;
    }

    if trash_dir.exists() {
        let _ = std::fs::remove_dir_all(&trash_dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopNotifier;
    use tempfile::tempdir;

    fn config_for(root: &Path) -> ConductorConfig {
        ConductorConfig {
            unsorted_dir: root.join("source"),
            music_dir: root.join("view"),
            split_symbols: vec![";".to_string()],
        }
    }

    #[tokio::test]
    async fn skips_untagged_files_without_failing() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path());
        std::fs::create_dir_all(&config.unsorted_dir).unwrap();
        std::fs::write(config.unsorted_dir.join("not_audio.txt"), "hello").unwrap();

        let report = run(&config, &NoopNotifier).await.unwrap();
        assert_eq!(report.tracks_planted, 0);
        assert!(!config.music_dir.join(".building").exists());
    }

    #[test]
    fn hot_swap_noop_when_staging_category_absent() {
        let dir = tempdir().unwrap();
        let view_dir = dir.path().join("view");
        let staging = dir.path().join("staging");
        std::fs::create_dir_all(view_dir.join("Artists/OldBand")).unwrap();
        std::fs::write(view_dir.join("Artists/OldBand/track.mp3"), "old").unwrap();
        std::fs::create_dir_all(&staging).unwrap();

        hot_swap_category(&view_dir, &staging, "Artists");

        assert!(view_dir.join("Artists/OldBand/track.mp3").exists());
    }

    #[test]
    fn hot_swap_leaves_live_tree_intact_when_trash_rename_fails() {
        let dir = tempdir().unwrap();
        let view_dir = dir.path().join("view");
        let staging = dir.path().join("staging");
        std::fs::create_dir_all(view_dir.join("Artists/OldBand")).unwrap();
        std::fs::write(view_dir.join("Artists/OldBand/track.mp3"), "old").unwrap();
        std::fs::create_dir_all(staging.join("Artists/NewBand")).unwrap();
        std::fs::write(staging.join("Artists/NewBand/track.mp3"), "new").unwrap();

        // Pre-occupy the trash slot with a non-empty directory so the first
        // rename (target -> trash) fails with ENOTEMPTY irrespective of
        // caller privilege, exercising the "abort this category" path.
        std::fs::create_dir_all(view_dir.join(".trash_Artists/Occupant")).unwrap();

        hot_swap_category(&view_dir, &staging, "Artists");

        // The live tree is untouched: never a missing or partial category.
        assert!(view_dir.join("Artists/OldBand/track.mp3").exists());
        assert!(!view_dir.join("Artists/NewBand").exists());
    }
}
