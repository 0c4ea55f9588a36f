//! Sector ranges, partition roles and on-disk regions

use crate::disk::units::Sectors;
use crate::utils::error::{PartplanError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive range of zero-based sectors.
///
/// A range of 2048 sectors starting at 0 covers sectors 0..=2047.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectorRange {
    pub first: u64,
    pub last: u64,
}

impl SectorRange {
    pub fn new(first: u64, last: u64) -> Result<Self> {
        if first > last {
            return Err(PartplanError::InvalidRange { first, last });
        }
        Ok(Self { first, last })
    }

    /// Range of `count` sectors starting at `first`; `None` when empty.
    pub fn with_length(first: u64, count: Sectors) -> Option<Self> {
        if count.is_zero() {
            return None;
        }
        let last = first.checked_add(count.0 - 1)?;
        Some(Self { first, last })
    }

    pub fn len(&self) -> Sectors {
        Sectors(self.last - self.first + 1)
    }

    pub fn contains(&self, other: &SectorRange) -> bool {
        self.first <= other.first && other.last <= self.last
    }

    pub fn overlaps(&self, other: &SectorRange) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

impl fmt::Display for SectorRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.first, self.last)
    }
}

/// What contains a free-space region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionParent {
    /// Free space directly in the partition table
    Device,
    /// Free space inside an extended (MBR) partition
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "role")]
pub enum PartitionRole {
    Primary,
    Extended,
    Logical,
    /// Free space, modelled as a pseudo-partition
    Unallocated { parent: RegionParent },
}

impl PartitionRole {
    pub fn is_unallocated(&self) -> bool {
        matches!(self, PartitionRole::Unallocated { .. })
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, PartitionRole::Extended)
    }
}

impl fmt::Display for PartitionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Extended => write!(f, "extended"),
            Self::Logical => write!(f, "logical"),
            Self::Unallocated {
                parent: RegionParent::Device,
            } => write!(f, "free space"),
            Self::Unallocated {
                parent: RegionParent::Extended,
            } => write!(f, "free space (in extended)"),
        }
    }
}

/// An existing partition or free-space gap on a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Partition number (1-based); `None` for free space
    pub number: Option<u32>,
    /// Device node (e.g., /dev/sda2); `None` for free space
    pub node: Option<String>,
    pub range: SectorRange,
    pub role: PartitionRole,
    /// Partition type as reported by the table (GUID or MBR code)
    pub type_id: Option<String>,
}

impl Region {
    pub fn partition(number: u32, node: &str, range: SectorRange, role: PartitionRole) -> Self {
        Self {
            number: Some(number),
            node: Some(node.to_string()),
            range,
            role,
            type_id: None,
        }
    }

    pub fn free_space(range: SectorRange, parent: RegionParent) -> Self {
        Self {
            number: None,
            node: None,
            range,
            role: PartitionRole::Unallocated { parent },
            type_id: None,
        }
    }

    pub fn is_free_space(&self) -> bool {
        self.role.is_unallocated()
    }

    /// Short description for logs and prompts
    pub fn describe(&self) -> String {
        match &self.node {
            Some(node) => format!("{} ({}, sectors {})", node, self.role, self.range),
            None => format!("{} (sectors {})", self.role, self.range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_rejects_inverted_bounds() {
        assert!(SectorRange::new(10, 9).is_err());
        let r = SectorRange::new(10, 10).unwrap();
        assert_eq!(r.len(), Sectors(1));
    }

    #[test]
    fn with_length_is_inclusive() {
        let r = SectorRange::with_length(4096, Sectors(614400)).unwrap();
        assert_eq!(r.first, 4096);
        assert_eq!(r.last, 4096 + 614400 - 1);
        assert_eq!(r.len(), Sectors(614400));
        assert!(SectorRange::with_length(4096, Sectors(0)).is_none());
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        let a = SectorRange::new(0, 2047).unwrap();
        let b = SectorRange::new(2048, 4095).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&SectorRange::new(2047, 2047).unwrap()));
        assert!(SectorRange::new(0, 4095).unwrap().contains(&b));
    }

    #[test]
    fn free_space_has_no_node() {
        let r = Region::free_space(SectorRange::new(100, 200).unwrap(), RegionParent::Extended);
        assert!(r.is_free_space());
        assert!(r.number.is_none());
        assert_eq!(
            r.role,
            PartitionRole::Unallocated {
                parent: RegionParent::Extended
            }
        );
    }
}
