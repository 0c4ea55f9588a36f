//! Installed memory

use crate::disk::units::{Bytes, KIB};
use crate::utils::error::{PartplanError, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// `MemTotal` excludes memory reserved by firmware and the kernel image,
/// so it reads slightly low against the installed amount.
pub const MEMTOTAL_OVERESTIMATION: f64 = 1.01;

/// Installed RAM and the factor correcting its reported size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_ram: Bytes,
    pub overestimation_factor: f64,
}

impl MemoryInfo {
    pub fn new(total_ram: Bytes, overestimation_factor: f64) -> Self {
        Self {
            total_ram,
            overestimation_factor,
        }
    }

    /// Read from /proc/meminfo
    pub fn detect() -> Result<Self> {
        let meminfo = fs::read_to_string("/proc/meminfo")?;
        let total_ram = parse_meminfo_total(&meminfo).ok_or_else(|| {
            PartplanError::ConfigError("MemTotal missing from /proc/meminfo".to_string())
        })?;
        Ok(Self::new(total_ram, MEMTOTAL_OVERESTIMATION))
    }
}

/// Extract `MemTotal` (reported in kB) from meminfo content
pub fn parse_meminfo_total(meminfo: &str) -> Option<Bytes> {
    meminfo
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| Bytes(kb * KIB))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_memtotal() {
        let content = "MemTotal:       16303428 kB\nMemFree:         1234567 kB\n";
        assert_eq!(parse_meminfo_total(content), Some(Bytes(16303428 * 1024)));
    }

    #[test]
    fn missing_memtotal() {
        assert_eq!(parse_meminfo_total("MemFree: 12 kB\n"), None);
        assert_eq!(parse_meminfo_total("MemTotal: lots kB\n"), None);
    }
}
