//! In-memory backend that records operations

use crate::backend::PartitionBackend;
use crate::disk::device::Device;
use crate::disk::partition::NewPartition;
use crate::disk::region::{Region, SectorRange};
use crate::disk::table::{FileSystemType, PartitionFlags, TableType};
use crate::utils::error::Result;
use serde::Serialize;
use tracing::info;

/// A recorded backend call. Passphrases are never recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    InitDefaultFilesystem {
        filesystem: FileSystemType,
    },
    CreateTable {
        device: String,
        table: TableType,
    },
    CreatePartition {
        device: String,
        partition: NewPartition,
        flags: PartitionFlags,
        encrypted: bool,
    },
    DeletePartition {
        device: String,
        region: Region,
    },
    ApplyRootLayout {
        device: String,
        range: SectorRange,
        filesystem: FileSystemType,
        encrypted: bool,
    },
}

impl Operation {
    /// One-line summary for logs and terminal output
    pub fn describe(&self) -> String {
        match self {
            Operation::InitDefaultFilesystem { filesystem } => {
                format!("default filesystem {}", filesystem)
            }
            Operation::CreateTable { device, table } => {
                format!("create {} partition table on {}", table, device)
            }
            Operation::CreatePartition {
                device,
                partition,
                flags,
                encrypted,
            } => {
                let mut s = format!(
                    "create {}{} partition on {} at sectors {}",
                    if *encrypted { "encrypted " } else { "" },
                    partition.filesystem,
                    device,
                    partition.range
                );
                if let Some(mp) = &partition.mount_point {
                    s.push_str(&format!(", mounted at {}", mp));
                }
                if !flags.is_empty() {
                    s.push_str(&format!(", flags {:?}", flags));
                }
                s
            }
            Operation::DeletePartition { device, region } => {
                format!("delete {} on {}", region.describe(), device)
            }
            Operation::ApplyRootLayout {
                device,
                range,
                filesystem,
                encrypted,
            } => format!(
                "{}{} root layout on {} at sectors {}",
                if *encrypted { "encrypted " } else { "" },
                filesystem,
                device,
                range
            ),
        }
    }
}

/// Records backend calls in order; commit only logs the queue.
#[derive(Debug, Default)]
pub struct OperationQueue {
    default_filesystem: Option<FileSystemType>,
    operations: Vec<Operation>,
    committed: bool,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    fn default_filesystem(&self) -> FileSystemType {
        self.default_filesystem.unwrap_or(FileSystemType::FALLBACK)
    }
}

impl PartitionBackend for OperationQueue {
    fn init_default_filesystem(&mut self, filesystem: FileSystemType) {
        self.default_filesystem = Some(filesystem);
        self.operations
            .push(Operation::InitDefaultFilesystem { filesystem });
    }

    fn create_table(&mut self, device: &Device, table: TableType) -> Result<()> {
        self.operations.push(Operation::CreateTable {
            device: device.path.clone(),
            table,
        });
        Ok(())
    }

    fn create_partition(
        &mut self,
        device: &Device,
        partition: NewPartition,
        flags: PartitionFlags,
    ) -> Result<()> {
        self.operations.push(Operation::CreatePartition {
            device: device.path.clone(),
            partition,
            flags,
            encrypted: false,
        });
        Ok(())
    }

    fn create_encrypted_partition(
        &mut self,
        device: &Device,
        partition: NewPartition,
        _passphrase: &str,
        flags: PartitionFlags,
    ) -> Result<()> {
        self.operations.push(Operation::CreatePartition {
            device: device.path.clone(),
            partition,
            flags,
            encrypted: true,
        });
        Ok(())
    }

    fn delete_partition(&mut self, device: &Device, region: &Region) -> Result<()> {
        self.operations.push(Operation::DeletePartition {
            device: device.path.clone(),
            region: region.clone(),
        });
        Ok(())
    }

    fn apply_root_layout(
        &mut self,
        device: &Device,
        range: SectorRange,
        passphrase: Option<&str>,
    ) -> Result<()> {
        let filesystem = self.default_filesystem();
        self.operations.push(Operation::ApplyRootLayout {
            device: device.path.clone(),
            range,
            filesystem,
            encrypted: passphrase.is_some(),
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        info!("{} pending operations:", self.operations.len());
        for (i, op) in self.operations.iter().enumerate() {
            info!("  {}. {}", i + 1, op.describe());
        }
        self.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_layout_uses_default_filesystem() {
        let dev = Device::new("/dev/sda", 512, 1_000_000).unwrap();
        let mut q = OperationQueue::new();
        q.init_default_filesystem(FileSystemType::Btrfs);
        q.apply_root_layout(&dev, SectorRange::new(2048, 999_999).unwrap(), Some("pw"))
            .unwrap();
        q.commit().unwrap();

        assert!(q.is_committed());
        assert_eq!(
            q.operations()[1],
            Operation::ApplyRootLayout {
                device: "/dev/sda".to_string(),
                range: SectorRange { first: 2048, last: 999_999 },
                filesystem: FileSystemType::Btrfs,
                encrypted: true,
            }
        );
    }

    #[test]
    fn serialized_queue_omits_passphrase() {
        let dev = Device::new("/dev/sda", 512, 1_000_000).unwrap();
        let mut q = OperationQueue::new();
        let part = NewPartition::swap(SectorRange::new(900_000, 999_999).unwrap());
        q.create_encrypted_partition(&dev, part, "correct horse", PartitionFlags::empty())
            .unwrap();

        let json = serde_json::to_string(q.operations()).unwrap();
        assert!(json.contains("\"op\":\"create_partition\""));
        assert!(json.contains("\"encrypted\":true"));
        assert!(!json.contains("correct horse"));
    }
}
