//! Backend that writes the partition table with sfdisk

use crate::backend::PartitionBackend;
use crate::disk::device::Device;
use crate::disk::partition::NewPartition;
use crate::disk::region::{PartitionRole, Region, SectorRange};
use crate::disk::table::{mbr_types, partition_types, FileSystemType, PartitionFlags, TableType};
use crate::disk::units::Bytes;
use crate::utils::command::CommandRunner;
use crate::utils::error::{PartplanError, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Size of the GPT partition entry array
const GPT_ENTRIES: Bytes = Bytes::kib(16);

#[derive(Debug, Clone, PartialEq)]
struct ScriptEntry {
    range: SectorRange,
    type_id: String,
    name: Option<String>,
    bootable: bool,
    encrypted: bool,
    format: Option<FileSystemType>,
    /// Root layouts fill whatever range they get; other partitions keep their size
    fills: bool,
}

/// Queues table changes and writes them in one sfdisk invocation on commit.
///
/// Only the partition table is written. Formatting and encryption of the
/// new partitions are reported in the commit summary for the installer's
/// later stages.
pub struct SfdiskBackend<'a> {
    cmd: &'a CommandRunner,
    device: Option<Device>,
    default_filesystem: FileSystemType,
    /// Table being created from scratch, if any
    new_table: Option<TableType>,
    /// Table already on the device, used when appending
    existing_table: Option<TableType>,
    deletions: Vec<u32>,
    entries: Vec<ScriptEntry>,
}

impl<'a> SfdiskBackend<'a> {
    pub fn new(cmd: &'a CommandRunner) -> Self {
        Self {
            cmd,
            device: None,
            default_filesystem: FileSystemType::FALLBACK,
            new_table: None,
            existing_table: None,
            deletions: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Table type already present, needed to pick type codes when
    /// appending to an existing table
    pub fn with_existing_table(mut self, table: Option<TableType>) -> Self {
        self.existing_table = table;
        self
    }

    fn table(&self) -> TableType {
        self.new_table
            .or(self.existing_table)
            .unwrap_or(TableType::Gpt)
    }

    fn bind_device(&mut self, device: &Device) -> Result<()> {
        match &self.device {
            Some(d) if d.path != device.path => Err(PartplanError::PartitionError(format!(
                "sfdisk backend is bound to {}, cannot also modify {}",
                d.path, device.path
            ))),
            Some(_) => Ok(()),
            None => {
                self.device = Some(device.clone());
                Ok(())
            }
        }
    }

    /// Last sector a partition may use on this table
    fn last_usable(&self, device: &Device) -> u64 {
        match self.table() {
            TableType::Gpt => {
                let entries = device.sectors_for(GPT_ENTRIES).0;
                // backup entry array plus backup header
                device.last_sector().saturating_sub(entries + 1)
            }
            _ => device.last_sector(),
        }
    }

    fn type_id(&self, filesystem: FileSystemType, flags: PartitionFlags, root: bool) -> String {
        let gpt = self.table() == TableType::Gpt;
        let id = if flags.contains(PartitionFlags::ESP) {
            if gpt {
                partition_types::EFI
            } else {
                mbr_types::EFI
            }
        } else if filesystem == FileSystemType::LinuxSwap {
            if gpt {
                partition_types::LINUX_SWAP
            } else {
                mbr_types::LINUX_SWAP
            }
        } else if gpt && root {
            partition_types::root_for_arch(std::env::consts::ARCH)
        } else if gpt {
            partition_types::LINUX_FILESYSTEM
        } else {
            mbr_types::LINUX
        };
        id.to_string()
    }

    fn push_entry(
        &mut self,
        device: &Device,
        mut range: SectorRange,
        entry: ScriptEntry,
    ) -> Result<()> {
        self.bind_device(device)?;
        let last_usable = self.last_usable(device);
        if range.last > last_usable {
            let overhang = range.last - last_usable;
            let first = range.first;
            let shifted = first.checked_sub(overhang);
            // a sized tail partition moves back into the root layout in front of it
            let before = self
                .entries
                .iter_mut()
                .find(|e| e.fills && e.range.last.saturating_add(1) == first);

            match (entry.fills, before, shifted) {
                (false, Some(prev), Some(new_first)) if new_first > prev.range.first => {
                    debug!(
                        "Moving partition at {} back by {} sectors to end at last usable sector {}",
                        range, overhang, last_usable
                    );
                    prev.range.last = new_first - 1;
                    range = SectorRange {
                        first: new_first,
                        last: last_usable,
                    };
                }
                _ => {
                    debug!(
                        "Clamping partition end {} to last usable sector {}",
                        range.last, last_usable
                    );
                    range.last = last_usable;
                }
            }
        }
        if range.first > range.last {
            return Err(PartplanError::PartitionError(format!(
                "partition starting at sector {} does not fit before sector {}",
                range.first, last_usable
            )));
        }
        self.entries.push(ScriptEntry { range, ..entry });
        Ok(())
    }

    fn add_partition(
        &mut self,
        device: &Device,
        partition: NewPartition,
        flags: PartitionFlags,
        encrypted: bool,
    ) -> Result<()> {
        if partition.role == PartitionRole::Extended {
            return Err(PartplanError::PartitionError(
                "extended partitions cannot be created by the planner".to_string(),
            ));
        }
        let entry = ScriptEntry {
            range: partition.range,
            type_id: self.type_id(partition.filesystem, flags, false),
            name: partition.name.clone(),
            bootable: flags.contains(PartitionFlags::BOOT),
            encrypted,
            format: partition.format.then_some(partition.filesystem),
            fills: false,
        };
        self.push_entry(device, partition.range, entry)
    }

    /// Render the queued partitions as an sfdisk script
    pub fn render_script(&self) -> Result<String> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| PartplanError::PartitionError("no device queued".to_string()))?;
        let gpt = self.table() == TableType::Gpt;

        let mut script = String::new();
        if let Some(table) = self.new_table {
            let label = table.sfdisk_label().ok_or_else(|| {
                PartplanError::PartitionError(format!("sfdisk cannot create a {} table", table))
            })?;
            let label_id = Uuid::new_v4();
            script.push_str(&format!("label: {}\n", label));
            if gpt {
                script.push_str(&format!("label-id: {}\n", label_id));
            } else if table == TableType::Msdos {
                let bytes = label_id.as_bytes();
                let id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                script.push_str(&format!("label-id: 0x{:08x}\n", id));
            }
            script.push_str(&format!("device: {}\n", device.path));
            script.push_str("unit: sectors\n");
            script.push_str(&format!(
                "sector-size: {}\n",
                device.logical_sector_size.as_u64()
            ));
            script.push('\n');
        }

        for entry in &self.entries {
            let mut line = format!(
                "start={}, size={}, type={}",
                entry.range.first,
                entry.range.len().as_u64(),
                entry.type_id
            );
            if gpt {
                if let Some(name) = &entry.name {
                    line.push_str(&format!(", name=\"{}\"", name.replace('"', "")));
                }
            }
            if entry.bootable && !gpt {
                line.push_str(", bootable");
            }
            script.push_str(&line);
            script.push('\n');
        }

        Ok(script)
    }
}

impl PartitionBackend for SfdiskBackend<'_> {
    fn init_default_filesystem(&mut self, filesystem: FileSystemType) {
        self.default_filesystem = filesystem;
    }

    fn create_table(&mut self, device: &Device, table: TableType) -> Result<()> {
        self.bind_device(device)?;
        if table.sfdisk_label().is_none() {
            return Err(PartplanError::PartitionError(format!(
                "sfdisk cannot create a {} table",
                table
            )));
        }
        self.new_table = Some(table);
        self.deletions.clear();
        self.entries.clear();
        Ok(())
    }

    fn create_partition(
        &mut self,
        device: &Device,
        partition: NewPartition,
        flags: PartitionFlags,
    ) -> Result<()> {
        self.add_partition(device, partition, flags, false)
    }

    fn create_encrypted_partition(
        &mut self,
        device: &Device,
        partition: NewPartition,
        _passphrase: &str,
        flags: PartitionFlags,
    ) -> Result<()> {
        self.add_partition(device, partition, flags, true)
    }

    fn delete_partition(&mut self, device: &Device, region: &Region) -> Result<()> {
        self.bind_device(device)?;
        let number = region.number.ok_or_else(|| {
            PartplanError::PartitionError(format!("{} is not a partition", region.describe()))
        })?;
        self.deletions.push(number);
        Ok(())
    }

    fn apply_root_layout(
        &mut self,
        device: &Device,
        range: SectorRange,
        passphrase: Option<&str>,
    ) -> Result<()> {
        let entry = ScriptEntry {
            range,
            type_id: self.type_id(self.default_filesystem, PartitionFlags::empty(), true),
            name: Some("root".to_string()),
            bootable: false,
            encrypted: passphrase.is_some(),
            format: Some(self.default_filesystem),
            fills: true,
        };
        self.push_entry(device, range, entry)
    }

    fn commit(&mut self) -> Result<()> {
        let Some(device) = self.device.clone() else {
            info!("Nothing to write");
            return Ok(());
        };
        let path = device.path.as_str();

        if !self.deletions.is_empty() {
            let numbers: Vec<String> = self.deletions.iter().map(|n| n.to_string()).collect();
            let mut args = vec!["--delete", path];
            args.extend(numbers.iter().map(String::as_str));
            info!("Deleting partition(s) {} on {}", numbers.join(", "), path);
            self.cmd.run("sfdisk", &args)?;
        }

        if self.new_table.is_some() || !self.entries.is_empty() {
            let script = self.render_script()?;
            if self.new_table.is_some() {
                info!("Wiping existing partition table on {}...", path);
                self.cmd.run("wipefs", &["-a", path])?;
                info!("Writing new {} partition table to {}...", self.table(), path);
                self.cmd.run_with_input("sfdisk", &[path], &script)?;
            } else {
                info!("Appending {} partition(s) to {}...", self.entries.len(), path);
                self.cmd.run_with_input("sfdisk", &["--append", path], &script)?;
            }
        }

        info!("Notifying kernel of partition table changes on {}...", path);
        let _ = self.cmd.run("partprobe", &[path]);
        let _ = self.cmd.run("udevadm", &["settle"]);

        for entry in &self.entries {
            if let Some(fs) = entry.format {
                info!(
                    "Partition at sectors {} awaits {}formatting as {}",
                    entry.range,
                    if entry.encrypted { "encryption and " } else { "" },
                    fs
                );
            }
        }
        if self.entries.iter().any(|e| e.encrypted) {
            warn!("Encrypted partitions were written unencrypted; LUKS setup happens later");
        }

        info!(
            "Partitioning of {} complete ({} partitions written)",
            path,
            self.entries.len()
        );
        self.deletions.clear();
        self.entries.clear();
        self.new_table = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk() -> Device {
        Device::new("/dev/sda", 512, 20_971_520).unwrap()
    }

    #[test]
    fn fresh_gpt_script() {
        let cmd = CommandRunner::new(true);
        let dev = disk();
        let mut b = SfdiskBackend::new(&cmd);
        b.init_default_filesystem(FileSystemType::Ext4);
        b.create_table(&dev, TableType::Gpt).unwrap();
        let esp = NewPartition::efi_system(SectorRange::new(4096, 618495).unwrap(), "/boot/efi")
            .with_name(Some("EFI"));
        b.create_partition(&dev, esp, PartitionFlags::ESP).unwrap();
        b.apply_root_layout(&dev, SectorRange::new(618496, dev.last_sector()).unwrap(), None)
            .unwrap();

        let script = b.render_script().unwrap();
        assert!(script.starts_with("label: gpt\n"));
        assert!(script.contains("sector-size: 512\n"));
        assert!(script.contains(&format!(
            "start=4096, size=614400, type={}, name=\"EFI\"",
            partition_types::EFI
        )));
        // root is clamped in front of the backup GPT
        let root_size = 20_971_486 - 618_496 + 1;
        assert!(script.contains(&format!(
            "start=618496, size={}, type={}, name=\"root\"",
            root_size,
            partition_types::root_for_arch(std::env::consts::ARCH)
        )));
    }

    #[test]
    fn gpt_tail_swap_keeps_planned_size() {
        use crate::config::{AutoPartitionOptions, GlobalSettings, SwapChoice};
        use crate::disk::units::{Bytes, GIB};
        use crate::plan::{compute_auto_layout, PlanContext};
        use crate::system::{FirmwareMode, MemoryInfo};

        let dev = Device::new("/dev/sda", 512, 200 * GIB / 512).unwrap();
        let ctx = PlanContext::new(
            FirmwareMode::Efi,
            MemoryInfo::new(Bytes::gib(16), 1.0),
            GlobalSettings::default(),
        );
        let options = AutoPartitionOptions {
            swap: SwapChoice::FullSwap,
            ..AutoPartitionOptions::default()
        };
        let layout = compute_auto_layout(&ctx, &dev, &options).unwrap();
        let planned_swap = layout.swap_partition.clone().unwrap();

        let cmd = CommandRunner::new(true);
        let mut b = SfdiskBackend::new(&cmd);
        b.init_default_filesystem(layout.filesystem);
        b.create_table(&dev, layout.table_type).unwrap();
        b.create_partition(&dev, layout.efi.clone().unwrap(), PartitionFlags::ESP)
            .unwrap();
        b.apply_root_layout(&dev, layout.root, None).unwrap();
        b.create_partition(&dev, planned_swap.clone(), PartitionFlags::empty())
            .unwrap();

        let last_usable = dev.last_sector() - 33;
        let root = &b.entries[1];
        let swap = &b.entries[2];
        assert_eq!(swap.range.last, last_usable);
        assert_eq!(swap.range.len(), planned_swap.range.len());
        assert!(dev.bytes_for(swap.range.len()) >= layout.swap.suggested);
        assert!(dev.bytes_for(swap.range.len()) >= Bytes::gib(16));
        assert_eq!(root.range.first, layout.root.first);
        assert_eq!(root.range.last + 1, swap.range.first);
        assert_eq!(root.range.last, layout.root.last - 33);
    }

    #[test]
    fn root_alone_is_clamped_not_moved() {
        let cmd = CommandRunner::new(true);
        let dev = disk();
        let mut b = SfdiskBackend::new(&cmd);
        b.create_table(&dev, TableType::Gpt).unwrap();
        b.create_partition(
            &dev,
            NewPartition::efi_system(SectorRange::new(4096, 618495).unwrap(), "/boot/efi"),
            PartitionFlags::ESP,
        )
        .unwrap();
        b.apply_root_layout(&dev, SectorRange::new(618496, dev.last_sector()).unwrap(), None)
            .unwrap();

        assert_eq!(b.entries[0].range, SectorRange::new(4096, 618495).unwrap());
        assert_eq!(b.entries[1].range.first, 618496);
        assert_eq!(b.entries[1].range.last, 20_971_486);
    }

    #[test]
    fn msdos_script_uses_type_codes() {
        let cmd = CommandRunner::new(true);
        let dev = disk();
        let mut b = SfdiskBackend::new(&cmd);
        b.create_table(&dev, TableType::Msdos).unwrap();
        b.apply_root_layout(&dev, SectorRange::new(2048, 19_000_000).unwrap(), None)
            .unwrap();
        b.create_partition(
            &dev,
            NewPartition::swap(SectorRange::new(19_000_001, dev.last_sector()).unwrap()),
            PartitionFlags::empty(),
        )
        .unwrap();

        let script = b.render_script().unwrap();
        assert!(script.starts_with("label: dos\nlabel-id: 0x"));
        assert!(script.contains("start=2048, size=18997953, type=83\n"));
        assert!(script.contains(&format!(
            "start=19000001, size={}, type=82\n",
            20_971_520 - 19_000_001
        )));
    }

    #[test]
    fn replacement_appends_without_header() {
        let cmd = CommandRunner::new(true);
        let dev = disk();
        let mut b = SfdiskBackend::new(&cmd).with_existing_table(Some(TableType::Msdos));
        let old = Region::partition(
            2,
            "/dev/sda2",
            SectorRange::new(2_099_200, 12_584_959).unwrap(),
            PartitionRole::Primary,
        );
        b.delete_partition(&dev, &old).unwrap();
        b.apply_root_layout(&dev, old.range, Some("pw")).unwrap();

        let script = b.render_script().unwrap();
        assert_eq!(script, "start=2099200, size=10485760, type=83\n");
        b.commit().unwrap();
    }

    #[test]
    fn cannot_delete_free_space() {
        let cmd = CommandRunner::new(true);
        let dev = disk();
        let mut b = SfdiskBackend::new(&cmd);
        let free = Region::free_space(
            SectorRange::new(2048, 4095).unwrap(),
            crate::disk::region::RegionParent::Device,
        );
        assert!(b.delete_partition(&dev, &free).is_err());
    }

    #[test]
    fn refuses_unscriptable_tables_and_second_device() {
        let cmd = CommandRunner::new(true);
        let dev = disk();
        let mut b = SfdiskBackend::new(&cmd);
        assert!(b.create_table(&dev, TableType::Amiga).is_err());

        let other = Device::new("/dev/sdb", 512, 1_000_000).unwrap();
        assert!(b.create_table(&other, TableType::Gpt).is_err());
    }
}
