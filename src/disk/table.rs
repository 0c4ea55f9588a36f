//! Partition-table types, filesystem types and partition flags

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// GPT partition type GUIDs
pub mod partition_types {
    pub const EFI: &str = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B";
    pub const LINUX_SWAP: &str = "0657FD6D-A4AB-43C4-84E5-0933C84B4F4F";
    pub const LINUX_ROOT_X86: &str = "44479540-F297-41B2-9AF7-D131D5F0458A";
    pub const LINUX_ROOT_X86_64: &str = "4F68BCE3-E8CD-4DB1-96E7-FBCAF984B709";
    pub const LINUX_ROOT_ARM: &str = "69DAD710-2CE4-4E3C-B16C-21A1D49ABED3";
    pub const LINUX_ROOT_AARCH64: &str = "B921B045-1DF0-41C3-AF44-4C6F280D3FAE";
    pub const LINUX_ROOT_RISCV64: &str = "72EC70A6-CF74-40E6-BD49-4BDA08E8F224";
    pub const LINUX_FILESYSTEM: &str = "0FC63DAF-8483-4772-8E79-3D69D8477DE4";

    /// Discoverable root partition type for `arch` (as in `std::env::consts::ARCH`);
    /// generic Linux filesystem for architectures without one
    pub fn root_for_arch(arch: &str) -> &'static str {
        match arch {
            "x86" => LINUX_ROOT_X86,
            "x86_64" => LINUX_ROOT_X86_64,
            "arm" => LINUX_ROOT_ARM,
            "aarch64" => LINUX_ROOT_AARCH64,
            "riscv64" => LINUX_ROOT_RISCV64,
            _ => LINUX_FILESYSTEM,
        }
    }
}

/// MBR partition type codes
pub mod mbr_types {
    pub const EFI: &str = "ef";
    pub const LINUX_SWAP: &str = "82";
    pub const LINUX: &str = "83";
    pub const EXTENDED: &[&str] = &["5", "f", "85"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    Msdos,
    Gpt,
    Loop,
    Mac,
    Sun,
    Bsd,
    Amiga,
    Dvh,
    Pc98,
}

impl TableType {
    /// Resolve a table name, case-insensitively. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "msdos" | "mbr" | "dos" => Some(Self::Msdos),
            "gpt" => Some(Self::Gpt),
            "loop" => Some(Self::Loop),
            "mac" => Some(Self::Mac),
            "sun" => Some(Self::Sun),
            "bsd" => Some(Self::Bsd),
            "amiga" => Some(Self::Amiga),
            "dvh" => Some(Self::Dvh),
            "pc98" => Some(Self::Pc98),
            _ => None,
        }
    }

    /// Label name understood by sfdisk, if sfdisk can write this table
    pub fn sfdisk_label(&self) -> Option<&'static str> {
        match self {
            Self::Msdos => Some("dos"),
            Self::Gpt => Some("gpt"),
            Self::Sun => Some("sun"),
            Self::Dvh => Some("sgi"),
            _ => None,
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Msdos => "msdos",
            Self::Gpt => "gpt",
            Self::Loop => "loop",
            Self::Mac => "mac",
            Self::Sun => "sun",
            Self::Bsd => "bsd",
            Self::Amiga => "amiga",
            Self::Dvh => "dvh",
            Self::Pc98 => "pc98",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSystemType {
    Ext2,
    Ext3,
    Ext4,
    Btrfs,
    Xfs,
    F2fs,
    Jfs,
    Reiserfs,
    Fat16,
    Fat32,
    Exfat,
    Ntfs,
    Zfs,
    LinuxSwap,
}

impl FileSystemType {
    /// Used when no (or no recognised) default filesystem is configured
    pub const FALLBACK: FileSystemType = FileSystemType::Ext4;

    /// Resolve a filesystem name, case-insensitively. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ext2" => Some(Self::Ext2),
            "ext3" => Some(Self::Ext3),
            "ext4" => Some(Self::Ext4),
            "btrfs" => Some(Self::Btrfs),
            "xfs" => Some(Self::Xfs),
            "f2fs" => Some(Self::F2fs),
            "jfs" => Some(Self::Jfs),
            "reiserfs" => Some(Self::Reiserfs),
            "fat16" => Some(Self::Fat16),
            "fat32" | "vfat" => Some(Self::Fat32),
            "exfat" => Some(Self::Exfat),
            "ntfs" => Some(Self::Ntfs),
            "zfs" => Some(Self::Zfs),
            "linuxswap" | "linux-swap" | "swap" => Some(Self::LinuxSwap),
            _ => None,
        }
    }
}

impl fmt::Display for FileSystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ext2 => "ext2",
            Self::Ext3 => "ext3",
            Self::Ext4 => "ext4",
            Self::Btrfs => "btrfs",
            Self::Xfs => "xfs",
            Self::F2fs => "f2fs",
            Self::Jfs => "jfs",
            Self::Reiserfs => "reiserfs",
            Self::Fat16 => "fat16",
            Self::Fat32 => "fat32",
            Self::Exfat => "exfat",
            Self::Ntfs => "ntfs",
            Self::Zfs => "zfs",
            Self::LinuxSwap => "linuxswap",
        };
        write!(f, "{}", name)
    }
}

bitflags! {
    /// Flags set on a partition when it is created
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PartitionFlags: u32 {
        /// EFI system partition
        const ESP = 1 << 0;
        /// MBR active flag
        const BOOT = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_resolve_case_insensitively() {
        assert_eq!(TableType::from_name("GPT"), Some(TableType::Gpt));
        assert_eq!(TableType::from_name("msdos"), Some(TableType::Msdos));
        assert_eq!(TableType::from_name("mbr"), Some(TableType::Msdos));
        assert_eq!(TableType::from_name(""), None);
        assert_eq!(TableType::from_name("zfs"), None);
    }

    #[test]
    fn filesystem_aliases() {
        assert_eq!(FileSystemType::from_name("vfat"), Some(FileSystemType::Fat32));
        assert_eq!(FileSystemType::from_name("Btrfs"), Some(FileSystemType::Btrfs));
        assert_eq!(FileSystemType::from_name("swap"), Some(FileSystemType::LinuxSwap));
        assert_eq!(FileSystemType::from_name("hammer2"), None);
    }

    #[test]
    fn root_type_follows_architecture() {
        assert_eq!(
            partition_types::root_for_arch("x86_64"),
            partition_types::LINUX_ROOT_X86_64
        );
        assert_eq!(
            partition_types::root_for_arch("aarch64"),
            partition_types::LINUX_ROOT_AARCH64
        );
        assert_eq!(
            partition_types::root_for_arch("powerpc64"),
            partition_types::LINUX_FILESYSTEM
        );
    }

    #[test]
    fn only_some_tables_are_scriptable() {
        assert_eq!(TableType::Gpt.sfdisk_label(), Some("gpt"));
        assert_eq!(TableType::Msdos.sfdisk_label(), Some("dos"));
        assert_eq!(TableType::Amiga.sfdisk_label(), None);
    }
}
