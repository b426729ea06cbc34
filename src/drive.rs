//! Drive identity: the self-describing record every ZenFS-minted drive carries
//! at `System/ZenFS/drive.json` (§6.1).
//!
//! The core never mints drives (§4.4 — that's the external minter's job) but
//! it reads, and occasionally the system drive writes, this record.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use whoami;

#[derive(Debug, thiserror::Error)]
pub enum DriveIdentityError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed identity record at {path}: {source}")]
    Malformed {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Whether a drive is the single boot drive or a removable participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveType {
    System,
    Roaming,
}

/// The on-disk `drive_identity` record (§6.1). Only `uuid` is load-bearing for
/// the core; the rest is informational, so we keep it optional/defaulted
/// rather than rejecting records a future minter revision might trim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveIdentity {
    pub uuid: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub kind: DriveType,
    pub created_at: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    drive_identity: DriveIdentity,
}

impl DriveIdentity {
    pub fn new(label: impl Into<String>, kind: DriveType) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            kind,
            created_at: Utc::now().timestamp() as f64,
            node: Some(whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string())),
        }
    }

    /// Read and parse the identity record at `path`. A corrupt or missing
    /// `uuid` makes the drive *unidentified* per §7 — callers treat `Err` as
    /// "skip this drive", never as a fatal error.
    pub fn read_from(path: &Path) -> Result<Self, DriveIdentityError> {
        let raw = std::fs::read_to_string(path).map_err(|source| DriveIdentityError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: IdentityFile =
            serde_json::from_str(&raw).map_err(|source| DriveIdentityError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        if file.drive_identity.uuid.trim().is_empty() {
            return Err(DriveIdentityError::Malformed {
                path: path.to_path_buf(),
                source: serde::de::Error::custom("empty uuid"),
            });
        }
        Ok(file.drive_identity)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), DriveIdentityError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| DriveIdentityError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let file = IdentityFile {
            drive_identity: self.clone(),
        };
        let raw = serde_json::to_string_pretty(&file).expect("DriveIdentity always serializes");
        std::fs::write(path, raw).map_err(|source| DriveIdentityError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("System/ZenFS/drive.json");
        let identity = DriveIdentity::new("Roamer", DriveType::Roaming);
        identity.write_to(&path).unwrap();

        let loaded = DriveIdentity::read_from(&path).unwrap();
        assert_eq!(loaded.uuid, identity.uuid);
        assert_eq!(loaded.kind, DriveType::Roaming);
    }

    #[test]
    fn missing_uuid_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drive.json");
        std::fs::write(&path, r#"{"drive_identity": {"uuid": "", "type": "roaming", "created_at": 0}}"#).unwrap();
        assert!(matches!(
            DriveIdentity::read_from(&path),
            Err(DriveIdentityError::Malformed { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(matches!(
            DriveIdentity::read_from(&path),
            Err(DriveIdentityError::Io { .. })
        ));
    }
}
