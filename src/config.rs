//! Path-roots and runtime configuration for the ZenFS core.
//!
//! The source scripts reference `/System/ZenFS/Database`, `/Live/Drives`, and
//! `/Mount/Roaming` as hard-coded globals scattered across every module. Here
//! they live in one immutable [`ZenConfig`], loaded once at startup and
//! threaded into each component's constructor.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const ROAMING_ROOT_ENV: &str = "ZENFS_ROAMING_ROOT";
const CONFIG_FILE_NAME: &str = "zenfs.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// The filesystem roots the Reconciler and Indexer agree on.
///
/// Mirrors §6.4 of the specification. All fields have defaults matching the
/// reference deployment; `roaming_root` is additionally overridable via the
/// `ZENFS_ROAMING_ROOT` environment variable, exactly as the source scripts do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZenPaths {
    /// Root of the global shadow database, e.g. `/System/ZenFS/Database`.
    pub shadow_db_root: PathBuf,
    /// Root under which physical block devices are mounted, e.g. `/Live/Drives`.
    pub live_root: PathBuf,
    /// Root under which roaming drives are gated, e.g. `/Mount/Roaming`.
    pub roaming_root: PathBuf,
    /// Host user namespace that roaming files are projected into, e.g. `/Users`.
    pub users_root: PathBuf,
    /// Relative path (from any drive root) to that drive's identity file.
    pub identity_relpath: PathBuf,
    /// Relative path (from a roaming drive root) to its drive-local shadow database.
    pub drive_local_db_relpath: PathBuf,
}

impl Default for ZenPaths {
    fn default() -> Self {
        Self {
            shadow_db_root: PathBuf::from("/System/ZenFS/Database"),
            live_root: PathBuf::from("/Live/Drives"),
            roaming_root: PathBuf::from("/Mount/Roaming"),
            users_root: PathBuf::from("/Users"),
            identity_relpath: PathBuf::from("System/ZenFS/drive.json"),
            drive_local_db_relpath: PathBuf::from("System/ZenFS/Database"),
        }
    }
}

impl ZenPaths {
    /// Apply environment overrides, matching the source's `os.environ.get`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var(ROAMING_ROOT_ENV) {
            info!("{ROAMING_ROOT_ENV} override: {root}");
            self.roaming_root = PathBuf::from(root);
        }
        self
    }

    /// Gate path for a roaming drive identity.
    pub fn gate_path(&self, drive_identity: &str) -> PathBuf {
        self.roaming_root.join(drive_identity)
    }

    /// Live-mount path for a physical device identifier.
    pub fn live_path(&self, device_identifier: &str) -> PathBuf {
        self.live_root.join(device_identifier)
    }

    /// Identity file location for a given drive root (or the system absolute path
    /// when `drive_root` is `/`).
    pub fn identity_file(&self, drive_root: &Path) -> PathBuf {
        drive_root.join(&self.identity_relpath)
    }

    /// Drive-local shadow database root for a roaming drive.
    pub fn drive_local_db(&self, drive_root: &Path) -> PathBuf {
        drive_root.join(&self.drive_local_db_relpath)
    }
}

/// Mode bits for the shadow-database root. The source varies between 0o755 and
/// 0o700 across revisions; this build standardizes on 0o700 (§9 Open Questions).
pub const SHADOW_DB_ROOT_MODE: u32 = 0o700;
pub const SHADOW_ENTRY_MODE: u32 = 0o644;
pub const FOLDER_TAG_MODE: u32 = 0o644;
pub const FOLDER_TAG_NAME: &str = ".zenfs-folder-info";

/// Top-level directories excluded from the initial system-drive scan (§4.2.1).
pub const SYSTEM_ROOT_DENYLIST: &[&str] = &[
    "proc", "sys", "dev", "run", "boot", "etc", "var", "tmp", "usr", "bin", "sbin", "lib",
    "lib64", "mnt", "media", "srv", "opt", "nix", "System", "Live", "Mount",
];

/// Pseudo-directory names generated by the Conductor (§4.2.6).
pub const MUSIC_PSEUDO_DIRS: &[&str] = &[
    "Artists",
    "Albums",
    "Years",
    "Genres",
    "OSTs",
    ".building",
    ".trash_Artists",
    ".trash_Albums",
    ".trash_Years",
    ".trash_Genres",
    ".trash_OSTs",
];

/// Top-level application configuration, persisted as TOML under the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZenConfig {
    pub version: u32,
    pub log_level: String,
    pub paths: ZenPaths,
    pub conductor: ConductorConfig,
}

/// The Conductor's `music` configuration block (§6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorConfig {
    pub unsorted_dir: PathBuf,
    pub music_dir: PathBuf,
    pub split_symbols: Vec<String>,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            unsorted_dir: PathBuf::from("/Users/Admin/Music/.database"),
            music_dir: PathBuf::from("/Users/Admin/Music"),
            split_symbols: vec![";".to_string()],
        }
    }
}

impl Default for ZenConfig {
    fn default() -> Self {
        Self {
            version: Self::TARGET_VERSION,
            log_level: "info".to_string(),
            paths: ZenPaths::default().with_env_overrides(),
            conductor: ConductorConfig::default(),
        }
    }
}

impl ZenConfig {
    const TARGET_VERSION: u32 = 1;

    /// Load configuration from `<data_dir>/zenfs.toml`, creating a default one
    /// if absent. Environment overrides are re-applied on every load so that a
    /// changed `ZENFS_ROAMING_ROOT` always wins over a stale persisted value.
    pub fn load_or_create(data_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = data_dir.join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: config_path.clone(),
                source,
            })?
        } else {
            warn!("no config found, creating default at {}", config_path.display());
            let config = Self::default();
            config.save(data_dir)?;
            config
        };

        config.paths = config.paths.with_env_overrides();
        Ok(config)
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(data_dir)?;
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, raw)?;
        Ok(())
    }
}

/// Default data directory for ZenFS's own config/state (distinct from the
/// shadow database, which always lives under `paths.shadow_db_root`).
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    Ok(dirs::config_dir()
        .ok_or_else(|| ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no config directory for this platform",
        )))?
        .join("zenfs"))
}
