//! Partition and free-space discovery from `sfdisk --json`

use crate::disk::device::{partition_number, Device};
use crate::disk::region::{PartitionRole, Region, RegionParent, SectorRange};
use crate::disk::table::{mbr_types, TableType};
use crate::disk::units::Bytes;
use crate::utils::command::run_command_output;
use crate::utils::error::{PartplanError, Result};
use serde::Deserialize;
use tracing::debug;

/// Gaps smaller than this are alignment slack, not usable free space
const MIN_FREE_REGION: Bytes = Bytes::mib(1);

/// First logical partition number on an MBR table
const FIRST_LOGICAL: u32 = 5;

#[derive(Debug, Deserialize)]
struct SfdiskDump {
    partitiontable: SfdiskTable,
}

#[derive(Debug, Deserialize)]
struct SfdiskTable {
    label: String,
    firstlba: Option<u64>,
    lastlba: Option<u64>,
    #[serde(default)]
    partitions: Vec<SfdiskPartition>,
}

#[derive(Debug, Deserialize)]
struct SfdiskPartition {
    node: String,
    start: u64,
    size: u64,
    #[serde(rename = "type")]
    type_id: String,
}

fn is_extended_type(type_id: &str) -> bool {
    let t = type_id.trim_start_matches("0x").to_ascii_lowercase();
    mbr_types::EXTENDED.contains(&t.as_str())
}

/// Free-space gaps of at least [`MIN_FREE_REGION`] in `[start, end]` not
/// covered by `used` (which must be sorted by first sector).
fn gaps(
    device: &Device,
    start: u64,
    end: u64,
    used: &[SectorRange],
    parent: RegionParent,
) -> Vec<Region> {
    let min_sectors = device.sectors_for(MIN_FREE_REGION).0;
    let mut regions = Vec::new();
    let mut cursor = start;

    let mut push_gap = |first: u64, last: u64| {
        if last >= first && last - first + 1 >= min_sectors {
            regions.push(Region::free_space(SectorRange { first, last }, parent));
        }
    };

    for range in used {
        if range.first > cursor {
            push_gap(cursor, range.first - 1);
        }
        cursor = cursor.max(range.last.saturating_add(1));
    }
    if cursor <= end {
        push_gap(cursor, end);
    }
    regions
}

/// Existing partition table of a device
#[derive(Debug, Clone)]
pub struct ProbedTable {
    /// `None` when sfdisk reports a label this crate does not know
    pub table: Option<TableType>,
    /// Partitions and free-space regions, ordered by first sector
    pub regions: Vec<Region>,
}

/// Parse `sfdisk --json` output into partitions and free-space regions
pub fn parse_table(json: &str, device: &Device) -> Result<ProbedTable> {
    let dump: SfdiskDump = serde_json::from_str(json)?;
    let table = dump.partitiontable;
    let is_dos = table.label == "dos";

    let mut partitions = Vec::new();
    for p in &table.partitions {
        if p.size == 0 {
            continue;
        }
        let number = partition_number(&device.path, &p.node).ok_or_else(|| {
            PartplanError::PartitionError(format!(
                "cannot determine partition number of {}",
                p.node
            ))
        })?;
        let last = p.start.checked_add(p.size - 1).ok_or_else(|| {
            PartplanError::PartitionError(format!(
                "{} reports an impossible extent (start {}, size {})",
                p.node, p.start, p.size
            ))
        })?;
        let range = SectorRange::new(p.start, last)?;
        device.check_range(&range, "existing partition")?;

        let role = if is_dos && is_extended_type(&p.type_id) {
            PartitionRole::Extended
        } else if is_dos && number >= FIRST_LOGICAL {
            PartitionRole::Logical
        } else {
            PartitionRole::Primary
        };

        let mut region = Region::partition(number, &p.node, range, role);
        region.type_id = Some(p.type_id.clone());
        partitions.push(region);
    }
    partitions.sort_by_key(|r| r.range.first);

    let first_usable = table
        .firstlba
        .unwrap_or_else(|| device.sectors_for(Bytes::mib(1)).0);
    let last_usable = table
        .lastlba
        .unwrap_or_else(|| device.last_sector())
        .min(device.last_sector());

    let top_level: Vec<SectorRange> = partitions
        .iter()
        .filter(|r| r.role != PartitionRole::Logical)
        .map(|r| r.range)
        .collect();
    let mut regions = gaps(device, first_usable, last_usable, &top_level, RegionParent::Device);

    for ext in partitions.iter().filter(|r| r.role.is_extended()) {
        let logicals: Vec<SectorRange> = partitions
            .iter()
            .filter(|r| r.role == PartitionRole::Logical && ext.range.contains(&r.range))
            .map(|r| r.range)
            .collect();
        // the first sector of an extended partition holds its EBR
        regions.extend(gaps(
            device,
            ext.range.first + 1,
            ext.range.last,
            &logicals,
            RegionParent::Extended,
        ));
    }

    regions.extend(partitions);
    regions.sort_by_key(|r| (r.range.first, r.is_free_space()));
    debug!("Found {} regions on {}", regions.len(), device.path);
    Ok(ProbedTable {
        table: TableType::from_name(&table.label),
        regions,
    })
}

pub fn parse_regions(json: &str, device: &Device) -> Result<Vec<Region>> {
    parse_table(json, device).map(|t| t.regions)
}

/// Read the partition table of `device` with sfdisk
pub fn probe_table(device: &Device) -> Result<ProbedTable> {
    let json = run_command_output("sfdisk", &["--json", &device.path])?;
    parse_table(&json, device)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk() -> Device {
        // 10 GiB, 512-byte sectors
        Device::new("/dev/sda", 512, 20_971_520).unwrap()
    }

    const GPT_DUMP: &str = r#"{
        "partitiontable": {
            "label": "gpt",
            "id": "6D1A8C3E-3B8A-4C7E-9E7F-1F2B3C4D5E6F",
            "device": "/dev/sda",
            "unit": "sectors",
            "firstlba": 2048,
            "lastlba": 20971486,
            "sectorsize": 512,
            "partitions": [
                {"node": "/dev/sda1", "start": 2048, "size": 614400,
                 "type": "C12A7328-F81F-11D2-BA4B-00A0C93EC93B", "name": "EFI"},
                {"node": "/dev/sda2", "start": 4196352, "size": 8388608,
                 "type": "0FC63DAF-8483-4772-8E79-3D69D8477DE4"}
            ]
        }
    }"#;

    const DOS_DUMP: &str = r#"{
        "partitiontable": {
            "label": "dos",
            "id": "0x1234abcd",
            "device": "/dev/sda",
            "unit": "sectors",
            "sectorsize": 512,
            "partitions": [
                {"node": "/dev/sda1", "start": 2048, "size": 2097152, "type": "83", "bootable": true},
                {"node": "/dev/sda2", "start": 2099200, "size": 10485760, "type": "5"},
                {"node": "/dev/sda5", "start": 2101248, "size": 4194304, "type": "83"}
            ]
        }
    }"#;

    #[test]
    fn gpt_partitions_and_gaps() {
        let regions = parse_regions(GPT_DUMP, &disk()).unwrap();
        let kinds: Vec<_> = regions.iter().map(|r| (r.number, r.range.first, r.role)).collect();

        assert_eq!(kinds[0], (Some(1), 2048, PartitionRole::Primary));
        // gap between sda1 and sda2
        assert!(regions[1].is_free_space());
        assert_eq!(regions[1].range, SectorRange { first: 616448, last: 4196351 });
        assert_eq!(kinds[2], (Some(2), 4196352, PartitionRole::Primary));
        // tail gap up to lastlba
        let tail = regions.last().unwrap();
        assert!(tail.is_free_space());
        assert_eq!(tail.range.first, 4196352 + 8388608);
        assert_eq!(tail.range.last, 20971486);
    }

    #[test]
    fn dos_logical_and_extended_free_space() {
        let regions = parse_regions(DOS_DUMP, &disk()).unwrap();

        let ext = regions.iter().find(|r| r.number == Some(2)).unwrap();
        assert_eq!(ext.role, PartitionRole::Extended);
        let logical = regions.iter().find(|r| r.number == Some(5)).unwrap();
        assert_eq!(logical.role, PartitionRole::Logical);

        let inside: Vec<_> = regions
            .iter()
            .filter(|r| {
                r.role
                    == PartitionRole::Unallocated {
                        parent: RegionParent::Extended,
                    }
            })
            .collect();
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].range.first, 2101248 + 4194304);
        assert_eq!(inside[0].range.last, 2099200 + 10485760 - 1);

        let outside = regions
            .iter()
            .filter(|r| {
                r.role
                    == PartitionRole::Unallocated {
                        parent: RegionParent::Device,
                    }
            })
            .count();
        assert_eq!(outside, 1);
    }

    #[test]
    fn reports_table_label() {
        let probed = parse_table(DOS_DUMP, &disk()).unwrap();
        assert_eq!(probed.table, Some(TableType::Msdos));
        let probed = parse_table(GPT_DUMP, &disk()).unwrap();
        assert_eq!(probed.table, Some(TableType::Gpt));
    }

    #[test]
    fn tiny_gaps_are_ignored() {
        let json = r#"{"partitiontable": {"label": "gpt", "firstlba": 34, "lastlba": 20971486,
            "partitions": [{"node": "/dev/sda1", "start": 2048, "size": 20969439, "type": "x"}]}}"#;
        let regions = parse_regions(json, &disk()).unwrap();
        assert_eq!(regions.len(), 1);
        assert!(!regions[0].is_free_space());
    }

    #[test]
    fn empty_table_is_one_free_region() {
        let json = r#"{"partitiontable": {"label": "gpt", "firstlba": 2048, "lastlba": 20971486}}"#;
        let regions = parse_regions(json, &disk()).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].range, SectorRange { first: 2048, last: 20971486 });
    }

    #[test]
    fn overflowing_extent_is_an_error() {
        let json = r#"{"partitiontable": {"label": "gpt",
            "partitions": [{"node": "/dev/sda1", "start": 18446744073709551615, "size": 2, "type": "x"}]}}"#;
        assert!(matches!(
            parse_regions(json, &disk()),
            Err(PartplanError::PartitionError(_))
        ));
    }

    #[test]
    fn partition_past_device_end_is_rejected() {
        let json = r#"{"partitiontable": {"label": "gpt",
            "partitions": [{"node": "/dev/sda1", "start": 2048, "size": 99999999999, "type": "x"}]}}"#;
        assert!(parse_regions(json, &disk()).is_err());
    }
}
