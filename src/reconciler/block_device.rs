//! Block-device enumeration via `lsblk`, mirroring the reference Nomad's
//! `get_block_devices` (§4.1 step 1).

use serde::Deserialize;
use tokio::process::Command;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum EnumerationError {
    #[error("failed to run lsblk: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("lsblk exited with {0}")]
    ExitStatus(std::process::ExitStatus),
    #[error("failed to parse lsblk output: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    blockdevices: Vec<LsblkNode>,
}

#[derive(Debug, Deserialize)]
struct LsblkNode {
    name: String,
    uuid: Option<String>,
    label: Option<String>,
    fstype: Option<String>,
    mountpoint: Option<String>,
    size: Option<String>,
    #[serde(default)]
    children: Vec<LsblkNode>,
}

/// A leaf block device with a filesystem and a stable UUID — the only kind
/// the Reconciler cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub name: String,
    pub uuid: String,
    pub label: Option<String>,
    pub fstype: String,
    pub mountpoint: Option<String>,
    pub size: Option<String>,
}

impl BlockDevice {
    pub fn dev_path(&self) -> String {
        format!("/dev/{}", self.name)
    }
}

/// Enumerates block devices via `lsblk -J`, recursing through `children` to
/// find leaf devices carrying both a UUID and a filesystem type. A missing or
/// failing `lsblk` degrades the cycle (§7) rather than failing it.
pub async fn enumerate() -> Result<Vec<BlockDevice>, EnumerationError> {
    let output = Command::new("lsblk")
        .args(["-J", "-o", "NAME,UUID,LABEL,FSTYPE,MOUNTPOINT,SIZE"])
        .output()
        .await
        .map_err(EnumerationError::Spawn)?;

    if !output.status.success() {
        return Err(EnumerationError::ExitStatus(output.status));
    }

    let parsed: LsblkOutput = serde_json::from_slice(&output.stdout)?;
    let mut devices = Vec::new();
    for node in parsed.blockdevices {
        collect_leaves(node, &mut devices);
    }
    Ok(devices)
}

fn collect_leaves(node: LsblkNode, out: &mut Vec<BlockDevice>) {
    if let (Some(uuid), Some(fstype)) = (node.uuid.clone(), node.fstype.clone()) {
        out.push(BlockDevice {
            name: node.name.clone(),
            uuid,
            label: node.label.clone(),
            fstype,
            mountpoint: node.mountpoint.clone(),
            size: node.size.clone(),
        });
    } else if node.fstype.is_some() {
        warn!("device {} has a filesystem but no uuid, skipping", node.name);
    }

    for child in node.children {
        collect_leaves(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_children() {
        let raw = r#"{
            "blockdevices": [
                {"name":"sda","uuid":null,"label":null,"fstype":null,"mountpoint":null,"size":"1T",
                 "children":[
                    {"name":"sda1","uuid":"abcd-1234","label":"Data","fstype":"ext4","mountpoint":null,"size":"1T"}
                 ]}
            ]
        }"#;
        let parsed: LsblkOutput = serde_json::from_str(raw).unwrap();
        let mut devices = Vec::new();
        for node in parsed.blockdevices {
            collect_leaves(node, &mut devices);
        }
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].uuid, "abcd-1234");
        assert_eq!(devices[0].dev_path(), "/dev/sda1");
    }

    #[test]
    fn skips_devices_without_uuid() {
        let raw = r#"{"blockdevices":[{"name":"sr0","uuid":null,"label":null,"fstype":"iso9660","mountpoint":null,"size":"1G"}]}"#;
        let parsed: LsblkOutput = serde_json::from_str(raw).unwrap();
        let mut devices = Vec::new();
        for node in parsed.blockdevices {
            collect_leaves(node, &mut devices);
        }
        assert!(devices.is_empty());
    }
}
