//! From-scratch layout: optional ESP, root, optional swap at the tail
//!
//! The whole layout is computed and validated before the first backend
//! call, so a sizing problem never leaves a half-written device behind.

use crate::backend::PartitionBackend;
use crate::config::AutoPartitionOptions;
use crate::disk::device::Device;
use crate::disk::partition::NewPartition;
use crate::disk::region::SectorRange;
use crate::disk::table::{FileSystemType, PartitionFlags, TableType};
use crate::disk::units::{Bytes, Sectors};
use crate::plan::context::PlanContext;
use crate::plan::swap::{decide_swap, SwapDecision};
use crate::system::FirmwareMode;
use crate::utils::error::{PartplanError, Result};
use tracing::{debug, info, warn};

/// ESP size when no override is configured
pub const DEFAULT_ESP_SIZE: Bytes = Bytes::mib(300);

/// A computed layout, ready to hand to a backend
#[derive(Debug, Clone, PartialEq)]
pub struct AutoLayout {
    pub firmware: FirmwareMode,
    pub table_type: TableType,
    pub filesystem: FileSystemType,
    pub efi: Option<NewPartition>,
    pub root: SectorRange,
    pub swap: SwapDecision,
    pub swap_partition: Option<NewPartition>,
}

fn resolve_table_type(options: &AutoPartitionOptions, firmware: FirmwareMode) -> TableType {
    match options.table_type.as_deref() {
        Some(name) => TableType::from_name(name).unwrap_or_else(|| {
            let fallback = firmware.default_table_type();
            warn!("Unknown partition table type '{}', using {}", name, fallback);
            fallback
        }),
        None => firmware.default_table_type(),
    }
}

fn resolve_filesystem(options: &AutoPartitionOptions) -> FileSystemType {
    FileSystemType::from_name(&options.filesystem).unwrap_or_else(|| {
        warn!(
            "Unknown filesystem type '{}', using {}",
            options.filesystem,
            FileSystemType::FALLBACK
        );
        FileSystemType::FALLBACK
    })
}

/// Plan the EFI system partition starting at `first_free`
fn plan_esp(
    ctx: &PlanContext,
    device: &Device,
    options: &AutoPartitionOptions,
    first_free: u64,
) -> Result<NewPartition> {
    let size = ctx
        .settings
        .efi_system_partition_size
        .map(|s| s.to_bytes(device.capacity))
        .unwrap_or(DEFAULT_ESP_SIZE);
    let count = device.sectors_for(size);

    let range = SectorRange::with_length(first_free, count).ok_or(PartplanError::EmptyRegion {
        region: "EFI system",
        sectors: count.as_u64(),
    })?;
    device.check_range(&range, "EFI system")?;

    debug!("ESP: {} ({} sectors) at {}", size, count.as_u64(), range);
    Ok(NewPartition::efi_system(range, &options.efi_mount_point)
        .with_name(ctx.settings.efi_system_partition_name.as_deref()))
}

/// Compute the layout without touching any backend
pub fn compute_auto_layout(
    ctx: &PlanContext,
    device: &Device,
    options: &AutoPartitionOptions,
) -> Result<AutoLayout> {
    let firmware = ctx.firmware;
    let sector_size = device.logical_sector_size;

    // Sectors count from 0: a 2048-sector gap leaves 2048 as the first free one
    let mut first_free = device.sectors_for(firmware.leading_gap()).as_u64();

    let table_type = resolve_table_type(options, firmware);
    let filesystem = resolve_filesystem(options);

    let efi = if firmware.is_efi() {
        let esp = plan_esp(ctx, device, options, first_free)?;
        first_free = esp.range.last + 1;
        Some(esp)
    } else {
        None
    };

    if first_free > device.last_sector() {
        return Err(PartplanError::DeviceTooSmall {
            available: Bytes::ZERO,
            region: "root",
        });
    }

    let available = device.bytes_from(first_free);
    let swap = decide_swap(available, options.swap, options.required_space, &ctx.memory);
    if options.swap.creates_partition() && !swap.create {
        info!(
            "Not enough room for {} of swap ({} available), skipping swap",
            swap.suggested.human(),
            available.human()
        );
    }

    let mut last_for_root = device.last_sector();
    if swap.create {
        // swap takes the tail plus one boundary sector
        let swap_sectors = Sectors(swap.suggested.as_u64() / sector_size.as_u64() + 1);
        last_for_root = last_for_root
            .checked_sub(swap_sectors.as_u64())
            .filter(|last| *last >= first_free)
            .ok_or(PartplanError::DeviceTooSmall {
                available,
                region: "root",
            })?;
    }

    let root = SectorRange::new(first_free, last_for_root)?;
    device.check_range(&root, "root")?;

    let swap_partition = if swap.create {
        let range = SectorRange::new(last_for_root + 1, device.last_sector())?;
        device.check_range(&range, "swap")?;
        Some(NewPartition::swap(range).with_name(ctx.settings.swap_partition_name.as_deref()))
    } else {
        None
    };

    Ok(AutoLayout {
        firmware,
        table_type,
        filesystem,
        efi,
        root,
        swap,
        swap_partition,
    })
}

/// Issue a computed layout to the backend and commit it
pub fn apply_auto_layout<B: PartitionBackend + ?Sized>(
    backend: &mut B,
    device: &Device,
    layout: &AutoLayout,
    passphrase: Option<&str>,
) -> Result<()> {
    backend.init_default_filesystem(layout.filesystem);
    backend.create_table(device, layout.table_type)?;

    if let Some(esp) = &layout.efi {
        backend.create_partition(device, esp.clone(), PartitionFlags::ESP)?;
    }

    backend.apply_root_layout(device, layout.root, passphrase)?;

    if let Some(swap) = &layout.swap_partition {
        match passphrase {
            Some(p) => backend.create_encrypted_partition(
                device,
                swap.clone(),
                p,
                PartitionFlags::empty(),
            )?,
            None => backend.create_partition(device, swap.clone(), PartitionFlags::empty())?,
        }
    }

    backend.commit()
}

/// Lay out `device` from scratch: compute, validate, then apply.
pub fn plan_and_apply<B: PartitionBackend + ?Sized>(
    ctx: &PlanContext,
    backend: &mut B,
    device: &Device,
    options: &AutoPartitionOptions,
) -> Result<AutoLayout> {
    info!(
        "Planning {} layout for {} ({})",
        ctx.firmware,
        device.path,
        device.capacity.human()
    );
    let layout = compute_auto_layout(ctx, device, options)?;
    apply_auto_layout(backend, device, &layout, options.passphrase())?;
    Ok(layout)
}
