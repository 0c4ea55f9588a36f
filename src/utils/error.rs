//! Error types for partplan

use crate::disk::units::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PartplanError {
    #[error("Must be run as root")]
    NotRoot,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Invalid device geometry: {0}")]
    InvalidGeometry(String),

    #[error("Device too small: {available} available after reserved space, nothing left for {region}")]
    DeviceTooSmall { available: Bytes, region: &'static str },

    #[error("Planned {region} region is empty ({sectors} sectors)")]
    EmptyRegion { region: &'static str, sectors: u64 },

    #[error("Planned {region} region {first}..={last} does not fit the device (last sector {device_last})")]
    RegionOutOfBounds {
        region: &'static str,
        first: u64,
        last: u64,
        device_last: u64,
    },

    #[error("Invalid sector range: first sector {first} is after last sector {last}")]
    InvalidRange { first: u64, last: u64 },

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Region not found: {0}")]
    RegionNotFound(String),

    #[error("Partition error: {0}")]
    PartitionError(String),

    #[error("Command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PartplanError>;
