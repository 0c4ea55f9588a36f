//! Device geometry and block-device detection

use crate::disk::region::SectorRange;
use crate::disk::units::{Bytes, Sectors, GIB};
use crate::utils::error::{PartplanError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// sysfs reports `size` in 512-byte units regardless of the logical block size
const SYSFS_SECTOR: u64 = 512;

/// Geometry of the device being planned. Immutable during planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device path (e.g., /dev/sda)
    pub path: String,
    pub capacity: Bytes,
    pub logical_sector_size: Bytes,
    pub total_sectors: Sectors,
}

impl Device {
    pub fn new(path: &str, logical_sector_size: u64, total_sectors: u64) -> Result<Self> {
        if logical_sector_size == 0 || !logical_sector_size.is_power_of_two() {
            return Err(PartplanError::InvalidGeometry(format!(
                "{}: logical sector size {} is not a power of two",
                path, logical_sector_size
            )));
        }
        if total_sectors == 0 {
            return Err(PartplanError::InvalidGeometry(format!(
                "{}: device has no sectors",
                path
            )));
        }
        let capacity = logical_sector_size.checked_mul(total_sectors).ok_or_else(|| {
            PartplanError::InvalidGeometry(format!("{}: capacity overflows", path))
        })?;

        Ok(Self {
            path: path.to_string(),
            capacity: Bytes(capacity),
            logical_sector_size: Bytes(logical_sector_size),
            total_sectors: Sectors(total_sectors),
        })
    }

    /// Build a device from its capacity; trailing partial sectors are dropped.
    pub fn from_capacity(path: &str, capacity: Bytes, logical_sector_size: u64) -> Result<Self> {
        if logical_sector_size == 0 {
            return Err(PartplanError::InvalidGeometry(format!(
                "{}: logical sector size is zero",
                path
            )));
        }
        Self::new(path, logical_sector_size, capacity.0 / logical_sector_size)
    }

    /// Read geometry from sysfs
    pub fn probe(device_path: &str) -> Result<Self> {
        let info = get_device_info(device_path)?;
        info.geometry()
    }

    pub fn last_sector(&self) -> u64 {
        self.total_sectors.0 - 1
    }

    pub fn sectors_for(&self, bytes: Bytes) -> Sectors {
        bytes.to_sectors(self.logical_sector_size)
    }

    pub fn bytes_for(&self, sectors: Sectors) -> Bytes {
        sectors.to_bytes(self.logical_sector_size)
    }

    /// Bytes from `first_sector` to the end of the device
    pub fn bytes_from(&self, first_sector: u64) -> Bytes {
        self.bytes_for(Sectors(self.total_sectors.0.saturating_sub(first_sector)))
    }

    /// Check that `range` lies on the device
    pub fn check_range(&self, range: &SectorRange, region: &'static str) -> Result<()> {
        if range.first > range.last || range.last > self.last_sector() {
            return Err(PartplanError::RegionOutOfBounds {
                region,
                first: range.first,
                last: range.last,
                device_last: self.last_sector(),
            });
        }
        Ok(())
    }
}

/// Information about a block device
#[derive(Debug, Clone)]
pub struct BlockDevice {
    /// Device path (e.g., /dev/sda)
    pub path: String,
    /// Device name (e.g., sda)
    pub name: String,
    /// Size in bytes
    pub size_bytes: u64,
    pub logical_sector_size: u64,
    /// Device model (if available)
    pub model: Option<String>,
    /// Device type (disk, usb, nvme, etc.)
    pub device_type: String,
    pub removable: bool,
    pub read_only: bool,
}

impl BlockDevice {
    pub fn size_human(&self) -> String {
        Bytes(self.size_bytes).human()
    }

    pub fn geometry(&self) -> Result<Device> {
        Device::from_capacity(&self.path, Bytes(self.size_bytes), self.logical_sector_size)
    }
}

/// Read a sysfs attribute, returning None if not available
fn read_sysfs_attr(device: &str, attr: &str) -> Option<String> {
    let path = format!("/sys/block/{}/{}", device, attr);
    fs::read_to_string(&path).ok().map(|s| s.trim().to_string())
}

fn read_sysfs_u64(device: &str, attr: &str) -> Option<u64> {
    read_sysfs_attr(device, attr).and_then(|s| s.parse().ok())
}

/// Determine device type from sysfs
fn determine_device_type(device: &str) -> String {
    if device.starts_with("nvme") {
        return "nvme".to_string();
    }
    if device.starts_with("mmcblk") {
        return "mmc".to_string();
    }
    if device.starts_with("loop") {
        return "loop".to_string();
    }
    if read_sysfs_u64(device, "removable").unwrap_or(0) == 1 {
        return "usb".to_string();
    }
    match read_sysfs_u64(device, "queue/rotational") {
        Some(0) => "ssd".to_string(),
        Some(_) => "hdd".to_string(),
        None => "disk".to_string(),
    }
}

fn read_block_device(name: &str, path: String) -> BlockDevice {
    let size_bytes = read_sysfs_u64(name, "size").unwrap_or(0) * SYSFS_SECTOR;
    let logical_sector_size = read_sysfs_u64(name, "queue/logical_block_size").unwrap_or(512);
    let model =
        read_sysfs_attr(name, "device/model").or_else(|| read_sysfs_attr(name, "device/name"));

    BlockDevice {
        path,
        name: name.to_string(),
        size_bytes,
        logical_sector_size,
        model,
        device_type: determine_device_type(name),
        removable: read_sysfs_u64(name, "removable").unwrap_or(0) == 1,
        read_only: read_sysfs_u64(name, "ro").unwrap_or(0) == 1,
    }
}

/// List available block devices
///
/// If `all` is false, filters to suitable installation targets
/// (no loop or read-only devices, nothing under 1 GiB).
pub fn list_block_devices(all: bool) -> Result<Vec<BlockDevice>> {
    let mut devices = Vec::new();

    for entry in fs::read_dir("/sys/block")? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let dev = read_block_device(&name, format!("/dev/{}", name));

        if dev.size_bytes == 0 {
            continue;
        }
        if !all && (dev.device_type == "loop" || dev.read_only || dev.size_bytes < GIB) {
            continue;
        }

        devices.push(dev);
    }

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}

/// Get information about a specific device
pub fn get_device_info(device_path: &str) -> Result<BlockDevice> {
    let name = Path::new(device_path)
        .file_name()
        .ok_or_else(|| PartplanError::DeviceNotFound(device_path.to_string()))?
        .to_string_lossy()
        .to_string();

    if !Path::new("/sys/block").join(&name).exists() {
        return Err(PartplanError::DeviceNotFound(device_path.to_string()));
    }

    Ok(read_block_device(&name, device_path.to_string()))
}

/// Get the partition naming prefix for a device
/// e.g., /dev/sda -> /dev/sda, /dev/nvme0n1 -> /dev/nvme0n1p
pub fn partition_prefix(device: &str) -> String {
    if device.contains("nvme") || device.contains("mmcblk") || device.contains("loop") {
        format!("{}p", device)
    } else {
        device.to_string()
    }
}

/// Partition number from its device node (e.g., /dev/nvme0n1p3 -> 3)
pub fn partition_number(device: &str, node: &str) -> Option<u32> {
    node.strip_prefix(&partition_prefix(device))?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_follows_geometry() {
        let dev = Device::new("/dev/sda", 512, 2048).unwrap();
        assert_eq!(dev.capacity, Bytes::mib(1));
        assert_eq!(dev.last_sector(), 2047);
    }

    #[test]
    fn rejects_bad_sector_size() {
        assert!(Device::new("/dev/sda", 0, 100).is_err());
        assert!(Device::new("/dev/sda", 500, 100).is_err());
        assert!(Device::new("/dev/sda", 512, 0).is_err());
    }

    #[test]
    fn from_capacity_drops_partial_sector() {
        let dev = Device::from_capacity("/dev/sda", Bytes(4096 * 10 + 100), 4096).unwrap();
        assert_eq!(dev.total_sectors, Sectors(10));
    }

    #[test]
    fn range_checks() {
        let dev = Device::new("/dev/sda", 512, 1000).unwrap();
        assert!(dev.check_range(&SectorRange::new(0, 999).unwrap(), "root").is_ok());
        let err = dev
            .check_range(&SectorRange::new(10, 1000).unwrap(), "root")
            .unwrap_err();
        assert!(matches!(err, PartplanError::RegionOutOfBounds { device_last: 999, .. }));
    }

    #[test]
    fn partition_numbers_from_nodes() {
        assert_eq!(partition_number("/dev/sda", "/dev/sda2"), Some(2));
        assert_eq!(partition_number("/dev/nvme0n1", "/dev/nvme0n1p3"), Some(3));
        assert_eq!(partition_number("/dev/sda", "/dev/sdb1"), None);
    }
}
