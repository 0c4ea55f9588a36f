//! Byte and sector quantities
//!
//! Sizes and sector counts are kept in distinct types so that every
//! byte-to-sector conversion goes through [`Bytes::to_sectors`], which
//! rounds up. Rounding up guarantees that a region sized from a byte
//! count never ends inside the space it was meant to reserve.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * 1024;
pub const GIB: u64 = MIB * 1024;
pub const TIB: u64 = GIB * 1024;

/// A size in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "crate::disk::size::SizeValue", into = "String")]
pub struct Bytes(pub u64);

impl Bytes {
    pub const ZERO: Bytes = Bytes(0);

    pub const fn kib(n: u64) -> Self {
        Bytes(n * KIB)
    }

    pub const fn mib(n: u64) -> Self {
        Bytes(n * MIB)
    }

    pub const fn gib(n: u64) -> Self {
        Bytes(n * GIB)
    }

    pub const fn tib(n: u64) -> Self {
        Bytes(n * TIB)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Number of sectors needed to hold this many bytes, rounded up.
    ///
    /// `sector_size` must be non-zero; [`crate::disk::device::Device`]
    /// enforces this at construction.
    pub fn to_sectors(self, sector_size: Bytes) -> Sectors {
        Sectors(self.0.div_ceil(sector_size.0))
    }

    pub fn as_gib_f64(self) -> f64 {
        self.0 as f64 / GIB as f64
    }

    /// Get human-readable size
    pub fn human(self) -> String {
        if self.0 >= TIB {
            format!("{:.1}T", self.0 as f64 / TIB as f64)
        } else if self.0 >= GIB {
            format!("{:.1}G", self.0 as f64 / GIB as f64)
        } else if self.0 >= MIB {
            format!("{:.1}M", self.0 as f64 / MIB as f64)
        } else if self.0 >= KIB {
            format!("{:.1}K", self.0 as f64 / KIB as f64)
        } else {
            format!("{}B", self.0)
        }
    }

    pub fn saturating_sub(self, rhs: Bytes) -> Bytes {
        Bytes(self.0.saturating_sub(rhs.0))
    }
}

/// Exact rendering: the largest binary unit that divides the value evenly.
impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        if n == 0 {
            write!(f, "0B")
        } else if n % TIB == 0 {
            write!(f, "{}TiB", n / TIB)
        } else if n % GIB == 0 {
            write!(f, "{}GiB", n / GIB)
        } else if n % MIB == 0 {
            write!(f, "{}MiB", n / MIB)
        } else if n % KIB == 0 {
            write!(f, "{}KiB", n / KIB)
        } else {
            write!(f, "{}B", n)
        }
    }
}

impl From<Bytes> for String {
    fn from(b: Bytes) -> Self {
        b.to_string()
    }
}

impl Add for Bytes {
    type Output = Bytes;

    fn add(self, rhs: Bytes) -> Bytes {
        Bytes(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Bytes {
    type Output = Bytes;

    fn sub(self, rhs: Bytes) -> Bytes {
        self.saturating_sub(rhs)
    }
}

/// A count of logical sectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sectors(pub u64);

impl Sectors {
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub fn to_bytes(self, sector_size: Bytes) -> Bytes {
        Bytes(self.0.saturating_mul(sector_size.0))
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Sectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sectors", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_gap_is_whole_sectors() {
        assert_eq!(Bytes::mib(2).to_sectors(Bytes(512)), Sectors(4096));
        assert_eq!(Bytes::mib(1).to_sectors(Bytes(512)), Sectors(2048));
        assert_eq!(Bytes::mib(1).to_sectors(Bytes(4096)), Sectors(256));
    }

    #[test]
    fn partial_sector_rounds_up() {
        assert_eq!(Bytes(1).to_sectors(Bytes(512)), Sectors(1));
        assert_eq!(Bytes(513).to_sectors(Bytes(512)), Sectors(2));
        assert_eq!(Bytes(0).to_sectors(Bytes(512)), Sectors(0));
    }

    #[test]
    fn display_picks_exact_unit() {
        assert_eq!(Bytes::mib(300).to_string(), "300MiB");
        assert_eq!(Bytes::gib(8).to_string(), "8GiB");
        assert_eq!(Bytes(1536).to_string(), "1536B");
        assert_eq!(Bytes(2048).to_string(), "2KiB");
        assert_eq!(Bytes(1000).to_string(), "1000B");
        assert_eq!(Bytes::ZERO.to_string(), "0B");
    }

    #[test]
    fn human_size_is_approximate() {
        assert_eq!(Bytes::gib(20).human(), "20.0G");
        assert_eq!(Bytes::mib(1536).human(), "1.5G");
    }
}
