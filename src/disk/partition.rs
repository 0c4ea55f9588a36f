//! Partitions planned for creation

use crate::disk::region::{PartitionRole, SectorRange};
use crate::disk::table::FileSystemType;
use serde::{Deserialize, Serialize};

/// A partition the planner wants the backend to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPartition {
    pub role: PartitionRole,
    pub filesystem: FileSystemType,
    pub range: SectorRange,
    /// Filesystem label written when formatting
    pub fs_label: Option<String>,
    /// Partition name in the table (GPT name)
    pub name: Option<String>,
    pub mount_point: Option<String>,
    /// Format the partition when the plan is applied
    pub format: bool,
}

impl NewPartition {
    pub fn new(role: PartitionRole, filesystem: FileSystemType, range: SectorRange) -> Self {
        Self {
            role,
            filesystem,
            range,
            fs_label: None,
            name: None,
            mount_point: None,
            format: false,
        }
    }

    /// FAT32 EFI system partition mounted at `mount_point`
    pub fn efi_system(range: SectorRange, mount_point: &str) -> Self {
        Self {
            mount_point: Some(mount_point.to_string()),
            format: true,
            ..Self::new(PartitionRole::Primary, FileSystemType::Fat32, range)
        }
    }

    /// Swap partition labelled "swap"
    pub fn swap(range: SectorRange) -> Self {
        Self {
            fs_label: Some("swap".to_string()),
            format: true,
            ..Self::new(PartitionRole::Primary, FileSystemType::LinuxSwap, range)
        }
    }

    pub fn with_name(mut self, name: Option<&str>) -> Self {
        if let Some(n) = name {
            self.name = Some(n.to_string());
        }
        self
    }
}
