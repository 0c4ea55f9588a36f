//! Firmware mode detection

use crate::disk::table::TableType;
use crate::disk::units::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const EFI_SYSFS_DIR: &str = "/sys/firmware/efi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareMode {
    Efi,
    Bios,
}

impl FirmwareMode {
    /// Detect from the running kernel
    pub fn detect() -> Self {
        if Path::new(EFI_SYSFS_DIR).is_dir() {
            FirmwareMode::Efi
        } else {
            FirmwareMode::Bios
        }
    }

    pub fn is_efi(&self) -> bool {
        matches!(self, FirmwareMode::Efi)
    }

    /// Space left empty at the start of the device.
    ///
    /// BIOS layouts start at the 1 MiB boundary (sector 2048 on 512-byte
    /// disks); EFI layouts leave 2 MiB before the ESP.
    pub fn leading_gap(&self) -> Bytes {
        match self {
            FirmwareMode::Efi => Bytes::mib(2),
            FirmwareMode::Bios => Bytes::mib(1),
        }
    }

    /// Table type used when none (or none recognised) is configured
    pub fn default_table_type(&self) -> TableType {
        match self {
            FirmwareMode::Efi => TableType::Gpt,
            FirmwareMode::Bios => TableType::Msdos,
        }
    }
}

impl fmt::Display for FirmwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Efi => write!(f, "EFI"),
            Self::Bios => write!(f, "BIOS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_per_firmware() {
        assert_eq!(FirmwareMode::Efi.default_table_type(), TableType::Gpt);
        assert_eq!(FirmwareMode::Bios.default_table_type(), TableType::Msdos);
        assert_eq!(FirmwareMode::Efi.leading_gap(), Bytes::mib(2));
        assert_eq!(FirmwareMode::Bios.leading_gap(), Bytes::mib(1));
    }
}
