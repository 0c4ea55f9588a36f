//! Size-string parsing
//!
//! Accepts absolute sizes ("300MiB", "8 GiB", "512", "1.5G", "2GB") and
//! percentages of a capacity ("10%"). Binary suffixes are the default for
//! single letters; two-letter `KB`/`MB`/`GB`/`TB` are decimal.

use crate::disk::units::{Bytes, GIB, KIB, MIB, TIB};
use crate::utils::error::{PartplanError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([A-Za-z%]*)\s*$").expect("size regex is valid")
});

/// A size as written in configuration: either absolute or relative to
/// the capacity of the device it is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PartitionSize {
    Absolute(Bytes),
    Percent(f64),
}

impl PartitionSize {
    /// Resolve against the capacity of the target device
    pub fn to_bytes(&self, capacity: Bytes) -> Bytes {
        match *self {
            PartitionSize::Absolute(b) => b,
            PartitionSize::Percent(p) if p.fract() == 0.0 => {
                Bytes((capacity.0 as u128 * p as u128 / 100) as u64)
            }
            PartitionSize::Percent(p) => Bytes((capacity.0 as f64 * p / 100.0) as u64),
        }
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit.to_ascii_lowercase().as_str() {
        "" | "b" => Some(1),
        "k" | "kib" => Some(KIB),
        "m" | "mib" => Some(MIB),
        "g" | "gib" => Some(GIB),
        "t" | "tib" => Some(TIB),
        "kb" => Some(1_000),
        "mb" => Some(1_000_000),
        "gb" => Some(1_000_000_000),
        "tb" => Some(1_000_000_000_000),
        _ => None,
    }
}

impl FromStr for PartitionSize {
    type Err = PartplanError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = SIZE_RE
            .captures(s)
            .ok_or_else(|| PartplanError::InvalidSize(format!("cannot parse '{}'", s)))?;
        let number: f64 = caps[1]
            .parse()
            .map_err(|_| PartplanError::InvalidSize(format!("bad number in '{}'", s)))?;
        let unit = &caps[2];

        if unit == "%" {
            if number > 100.0 {
                return Err(PartplanError::InvalidSize(format!(
                    "percentage over 100 in '{}'",
                    s
                )));
            }
            return Ok(PartitionSize::Percent(number));
        }

        let multiplier = unit_multiplier(unit)
            .ok_or_else(|| PartplanError::InvalidSize(format!("unknown unit '{}' in '{}'", unit, s)))?;

        let bytes = if number.fract() == 0.0 {
            (number as u64).checked_mul(multiplier)
        } else {
            let b = number * multiplier as f64;
            (b < u64::MAX as f64).then_some(b as u64)
        }
        .ok_or_else(|| PartplanError::InvalidSize(format!("'{}' is too large", s)))?;

        Ok(PartitionSize::Absolute(Bytes(bytes)))
    }
}

impl TryFrom<String> for PartitionSize {
    type Error = PartplanError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for PartitionSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionSize::Absolute(b) => write!(f, "{}", b),
            PartitionSize::Percent(p) => write!(f, "{}%", p),
        }
    }
}

impl From<PartitionSize> for String {
    fn from(s: PartitionSize) -> Self {
        s.to_string()
    }
}

/// Parse an absolute size; percentages are rejected.
pub fn parse_bytes(s: &str) -> Result<Bytes> {
    match s.parse::<PartitionSize>()? {
        PartitionSize::Absolute(b) => Ok(b),
        PartitionSize::Percent(_) => Err(PartplanError::InvalidSize(format!(
            "'{}' must be an absolute size",
            s
        ))),
    }
}

/// Raw size as it appears in TOML: a plain integer (bytes) or a size string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Int(u64),
    Text(String),
}

impl TryFrom<SizeValue> for Bytes {
    type Error = PartplanError;

    fn try_from(v: SizeValue) -> Result<Self> {
        match v {
            SizeValue::Int(n) => Ok(Bytes(n)),
            SizeValue::Text(s) => parse_bytes(&s),
        }
    }
}
