//! Replace one partition or free-space region with a root layout

use crate::backend::PartitionBackend;
use crate::config::ReplacePartitionOptions;
use crate::disk::device::Device;
use crate::disk::region::{PartitionRole, Region, RegionParent};
use crate::utils::error::Result;
use tracing::{info, warn};

/// Role the replacement of a region with `role` would take.
///
/// Extended partitions and free space become primary partitions, except
/// free space inside an extended partition, which becomes logical.
pub fn infer_replacement_role(role: PartitionRole) -> PartitionRole {
    match role {
        PartitionRole::Extended => PartitionRole::Primary,
        PartitionRole::Unallocated {
            parent: RegionParent::Extended,
        } => PartitionRole::Logical,
        PartitionRole::Unallocated {
            parent: RegionParent::Device,
        } => PartitionRole::Primary,
        other => other,
    }
}

/// Replace `region` on `device` and commit.
///
/// The region is consumed: once deleted it no longer describes anything on
/// the device. Returns the role inferred for the replacement.
pub fn plan_replacement<B: PartitionBackend + ?Sized>(
    backend: &mut B,
    device: &Device,
    region: Region,
    options: &ReplacePartitionOptions,
) -> Result<PartitionRole> {
    info!("Replacing {} on {}", region.describe(), device.path);

    let role = infer_replacement_role(region.role);
    if region.is_free_space() {
        warn!("Selected region is free space");
    }
    info!("Replacement will be a {} partition", role);

    let range = region.range;
    device.check_range(&range, "replacement")?;

    if !region.is_free_space() {
        backend.delete_partition(device, &region)?;
    }

    backend.apply_root_layout(device, range, options.passphrase())?;
    backend.commit()?;
    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Operation, OperationQueue};
    use crate::disk::region::SectorRange;
    use crate::disk::table::FileSystemType;

    fn disk() -> Device {
        Device::new("/dev/sda", 512, 20_971_520).unwrap()
    }

    fn range() -> SectorRange {
        SectorRange::new(2_099_200, 12_584_959).unwrap()
    }

    #[test]
    fn role_inference() {
        assert_eq!(
            infer_replacement_role(PartitionRole::Extended),
            PartitionRole::Primary
        );
        assert_eq!(
            infer_replacement_role(PartitionRole::Unallocated {
                parent: RegionParent::Device
            }),
            PartitionRole::Primary
        );
        assert_eq!(
            infer_replacement_role(PartitionRole::Unallocated {
                parent: RegionParent::Extended
            }),
            PartitionRole::Logical
        );
        assert_eq!(
            infer_replacement_role(PartitionRole::Logical),
            PartitionRole::Logical
        );
        assert_eq!(
            infer_replacement_role(PartitionRole::Primary),
            PartitionRole::Primary
        );
    }

    #[test]
    fn role_inference_is_stable() {
        let region = Region::free_space(range(), RegionParent::Extended);
        let first = infer_replacement_role(region.role);
        let second = infer_replacement_role(region.role);
        assert_eq!(first, second);
    }

    #[test]
    fn partition_is_deleted_then_reused() {
        let dev = disk();
        let region = Region::partition(2, "/dev/sda2", range(), PartitionRole::Primary);
        let mut queue = OperationQueue::new();

        let role = plan_replacement(
            &mut queue,
            &dev,
            region.clone(),
            &ReplacePartitionOptions::default(),
        )
        .unwrap();

        assert_eq!(role, PartitionRole::Primary);
        assert!(queue.is_committed());
        assert_eq!(
            queue.operations(),
            &[
                Operation::DeletePartition {
                    device: "/dev/sda".to_string(),
                    region,
                },
                Operation::ApplyRootLayout {
                    device: "/dev/sda".to_string(),
                    range: range(),
                    filesystem: FileSystemType::Ext4,
                    encrypted: false,
                },
            ]
        );
    }

    #[test]
    fn free_space_is_not_deleted() {
        let dev = disk();
        let region = Region::free_space(range(), RegionParent::Extended);
        let mut queue = OperationQueue::new();
        let options = ReplacePartitionOptions {
            passphrase: "pw".to_string(),
        };

        let role = plan_replacement(&mut queue, &dev, region, &options).unwrap();

        assert_eq!(role, PartitionRole::Logical);
        assert_eq!(queue.operations().len(), 1);
        assert!(matches!(
            queue.operations()[0],
            Operation::ApplyRootLayout { encrypted: true, .. }
        ));
    }

    #[test]
    fn extended_partition_becomes_primary() {
        let dev = disk();
        let region = Region::partition(2, "/dev/sda2", range(), PartitionRole::Extended);
        let mut queue = OperationQueue::new();
        let role =
            plan_replacement(&mut queue, &dev, region, &ReplacePartitionOptions::default()).unwrap();
        assert_eq!(role, PartitionRole::Primary);
        assert_eq!(queue.operations().len(), 2);
    }

    #[test]
    fn region_beyond_device_is_rejected_before_deleting() {
        let dev = Device::new("/dev/sda", 512, 1_000_000).unwrap();
        let region = Region::partition(2, "/dev/sda2", range(), PartitionRole::Primary);
        let mut queue = OperationQueue::new();
        assert!(
            plan_replacement(&mut queue, &dev, region, &ReplacePartitionOptions::default()).is_err()
        );
        assert!(queue.operations().is_empty());
    }
}
