//! Planner options and global settings

use crate::disk::size::PartitionSize;
use crate::disk::units::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the user wants swap to be handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum SwapChoice {
    /// No swap at all
    #[serde(rename = "none")]
    #[value(name = "none")]
    NoSwap,
    /// Keep using an existing swap partition
    #[serde(rename = "reuse")]
    #[value(name = "reuse")]
    ReuseSwap,
    /// Modest swap, capped at 8 GiB and 10% of free space
    #[default]
    #[serde(rename = "small")]
    #[value(name = "small")]
    SmallSwap,
    /// Swap large enough for suspend-to-disk
    #[serde(rename = "suspend", alias = "full")]
    #[value(name = "suspend", alias = "full")]
    FullSwap,
    /// Swap file on the root filesystem instead of a partition
    #[serde(rename = "file")]
    #[value(name = "file")]
    SwapFile,
}

impl SwapChoice {
    /// Whether this choice asks for a swap partition to be sized and created
    pub fn creates_partition(&self) -> bool {
        matches!(self, SwapChoice::SmallSwap | SwapChoice::FullSwap)
    }

    pub fn ensures_suspend_to_disk(&self) -> bool {
        matches!(self, SwapChoice::FullSwap)
    }
}

impl fmt::Display for SwapChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSwap => write!(f, "no swap"),
            Self::ReuseSwap => write!(f, "reuse existing swap"),
            Self::SmallSwap => write!(f, "small swap"),
            Self::FullSwap => write!(f, "swap with hibernate"),
            Self::SwapFile => write!(f, "swap file"),
        }
    }
}

/// Options for laying out a whole device from scratch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoPartitionOptions {
    #[serde(default)]
    pub swap: SwapChoice,
    /// Default filesystem for new partitions; unknown names fall back to ext4
    #[serde(default = "default_filesystem")]
    pub filesystem: String,
    /// Partition table type; unknown or absent picks one from the firmware
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
    #[serde(default = "default_efi_mount_point")]
    pub efi_mount_point: String,
    /// Space the distribution needs on the root filesystem
    #[serde(default)]
    pub required_space: Bytes,
    /// Encryption passphrase; empty means unencrypted
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub passphrase: String,
}

impl AutoPartitionOptions {
    pub fn passphrase(&self) -> Option<&str> {
        non_empty(&self.passphrase)
    }
}

impl Default for AutoPartitionOptions {
    fn default() -> Self {
        Self {
            swap: SwapChoice::default(),
            filesystem: default_filesystem(),
            table_type: None,
            efi_mount_point: default_efi_mount_point(),
            required_space: Bytes::ZERO,
            passphrase: String::new(),
        }
    }
}

/// Options for replacing a single partition or free-space region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplacePartitionOptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub passphrase: String,
}

impl ReplacePartitionOptions {
    pub fn passphrase(&self) -> Option<&str> {
        non_empty(&self.passphrase)
    }
}

/// Installer-wide overrides consulted while planning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// ESP size, absolute or a percentage of the device
    #[serde(
        default,
        alias = "efiSystemPartitionSize",
        skip_serializing_if = "Option::is_none"
    )]
    pub efi_system_partition_size: Option<PartitionSize>,
    /// Partition name for the ESP
    #[serde(
        default,
        alias = "efiSystemPartitionName",
        skip_serializing_if = "Option::is_none"
    )]
    pub efi_system_partition_name: Option<String>,
    /// Partition name for swap
    #[serde(
        default,
        alias = "swapPartitionName",
        skip_serializing_if = "Option::is_none"
    )]
    pub swap_partition_name: Option<String>,
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn default_filesystem() -> String {
    "ext4".to_string()
}

fn default_efi_mount_point() -> String {
    "/boot/efi".to_string()
}
