//! Plan file: everything needed to plan one device

use crate::config::options::{AutoPartitionOptions, GlobalSettings, SwapChoice};
use crate::disk::device::Device;
use crate::disk::size::PartitionSize;
use crate::disk::units::Bytes;
use crate::plan::PlanContext;
use crate::system::{FirmwareMode, MemoryInfo};
use crate::utils::error::{PartplanError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Main plan configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Firmware mode to plan for
    #[serde(default)]
    pub firmware: FirmwareSetting,
    /// Target device; geometry is probed unless `capacity` is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceConfig>,
    /// Memory to size swap for; probed when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryConfig>,
    #[serde(default)]
    pub options: AutoPartitionOptions,
    #[serde(default)]
    pub settings: GlobalSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareSetting {
    /// Detect from the running system
    #[default]
    Auto,
    Efi,
    Bios,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device path (e.g., /dev/sda)
    pub path: String,
    /// Plan for this capacity instead of probing the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Bytes>,
    #[serde(default = "default_sector_size")]
    pub sector_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub total_ram: Bytes,
    #[serde(default = "default_overestimation_factor")]
    pub overestimation_factor: f64,
}

fn default_sector_size() -> u64 {
    512
}

fn default_overestimation_factor() -> f64 {
    1.0
}

impl PlanConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PlanConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Generate a sample configuration
    pub fn sample() -> Self {
        PlanConfig {
            firmware: FirmwareSetting::Auto,
            device: Some(DeviceConfig {
                path: "/dev/sda".to_string(),
                capacity: None,
                sector_size: default_sector_size(),
            }),
            memory: None,
            options: AutoPartitionOptions {
                swap: SwapChoice::SmallSwap,
                filesystem: "ext4".to_string(),
                table_type: None,
                efi_mount_point: "/boot/efi".to_string(),
                required_space: Bytes::gib(6),
                passphrase: String::new(),
            },
            settings: GlobalSettings {
                efi_system_partition_size: Some(PartitionSize::Absolute(Bytes::mib(300))),
                efi_system_partition_name: Some("EFI".to_string()),
                swap_partition_name: Some("swap".to_string()),
            },
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.options.efi_mount_point.starts_with('/') {
            return Err(PartplanError::ValidationError(format!(
                "EFI mount point must be an absolute path, got '{}'",
                self.options.efi_mount_point
            )));
        }

        if let Some(mem) = &self.memory {
            if !(mem.overestimation_factor.is_finite() && mem.overestimation_factor > 0.0) {
                return Err(PartplanError::ValidationError(format!(
                    "overestimation factor must be positive, got {}",
                    mem.overestimation_factor
                )));
            }
        }

        if let Some(dev) = &self.device {
            if dev.path.is_empty() {
                return Err(PartplanError::ValidationError(
                    "device path cannot be empty".to_string(),
                ));
            }
            if let Some(capacity) = dev.capacity {
                Device::from_capacity(&dev.path, capacity, dev.sector_size)?;
            }
        }

        Ok(())
    }

    /// Resolve the device to plan, preferring `override_path` when given
    pub fn resolve_device(&self, override_path: Option<&str>) -> Result<Device> {
        let configured = self.device.as_ref();
        let path = override_path
            .or(configured.map(|d| d.path.as_str()))
            .ok_or_else(|| PartplanError::ConfigError("no target device given".to_string()))?;

        match configured {
            Some(dev) if dev.path == path && dev.capacity.is_some() => {
                let capacity = dev.capacity.unwrap_or_default();
                info!("Using configured geometry for {}: {}", path, capacity);
                Device::from_capacity(path, capacity, dev.sector_size)
            }
            _ => Device::probe(path),
        }
    }

    /// Build the planning context, probing whatever is not configured
    pub fn context(&self) -> Result<PlanContext> {
        let firmware = match self.firmware {
            FirmwareSetting::Auto => FirmwareMode::detect(),
            FirmwareSetting::Efi => FirmwareMode::Efi,
            FirmwareSetting::Bios => FirmwareMode::Bios,
        };
        let memory = match &self.memory {
            Some(m) => MemoryInfo::new(m.total_ram, m.overestimation_factor),
            None => MemoryInfo::detect()?,
        };
        Ok(PlanContext::new(firmware, memory, self.settings.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PLAN: &str = r#"
firmware = "efi"

[device]
path = "/dev/vda"
capacity = "100GiB"

[memory]
total_ram = "16GiB"

[options]
swap = "suspend"
filesystem = "btrfs"
required_space = "6GiB"

[settings]
efi_system_partition_size = "1%"
"#;

    #[test]
    fn loads_plan_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PLAN.as_bytes()).unwrap();

        let config = PlanConfig::from_file(file.path().to_str().unwrap()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.firmware, FirmwareSetting::Efi);
        assert_eq!(config.options.swap, SwapChoice::FullSwap);
        assert_eq!(config.options.required_space, Bytes::gib(6));
        assert_eq!(config.options.efi_mount_point, "/boot/efi");
        assert_eq!(
            config.settings.efi_system_partition_size,
            Some(PartitionSize::Percent(1.0))
        );

        let dev = config.resolve_device(None).unwrap();
        assert_eq!(dev.path, "/dev/vda");
        assert_eq!(dev.capacity, Bytes::gib(100));

        let ctx = config.context().unwrap();
        assert_eq!(ctx.firmware, FirmwareMode::Efi);
        assert_eq!(ctx.memory.total_ram, Bytes::gib(16));
        assert_eq!(ctx.memory.overestimation_factor, 1.0);
    }

    #[test]
    fn sample_round_trips() {
        let text = toml::to_string_pretty(&PlanConfig::sample()).unwrap();
        let back: PlanConfig = toml::from_str(&text).unwrap();
        back.validate().unwrap();
        assert_eq!(back.options.required_space, Bytes::gib(6));
        assert_eq!(back.settings, PlanConfig::sample().settings);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: PlanConfig = toml::from_str("").unwrap();
        assert_eq!(config.firmware, FirmwareSetting::Auto);
        assert_eq!(config.options.swap, SwapChoice::SmallSwap);
        assert_eq!(config.options.filesystem, "ext4");
        assert!(config.resolve_device(None).is_err());
    }

    #[test]
    fn rejects_relative_mount_point() {
        let mut config = PlanConfig::sample();
        config.options.efi_mount_point = "boot/efi".to_string();
        assert!(matches!(
            config.validate(),
            Err(PartplanError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_bad_memory_factor() {
        let mut config = PlanConfig::sample();
        config.memory = Some(MemoryConfig {
            total_ram: Bytes::gib(8),
            overestimation_factor: 0.0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn required_space_accepts_plain_bytes() {
        let config: PlanConfig = toml::from_str("[options]\nrequired_space = 1048576\n").unwrap();
        assert_eq!(config.options.required_space, Bytes::mib(1));
    }
}
