//! Partition-management backends
//!
//! The planner never touches a device directly; it issues typed calls to a
//! [`PartitionBackend`]. Errors a backend returns are passed to the caller
//! unchanged.

pub mod queue;
pub mod sfdisk;

use crate::disk::device::Device;
use crate::disk::partition::NewPartition;
use crate::disk::region::{Region, SectorRange};
use crate::disk::table::{FileSystemType, PartitionFlags, TableType};
use crate::utils::error::Result;

pub use queue::{Operation, OperationQueue};
pub use sfdisk::SfdiskBackend;

pub trait PartitionBackend {
    /// Filesystem used for partitions created by later root layouts
    fn init_default_filesystem(&mut self, filesystem: FileSystemType);

    /// Replace whatever is on `device` with an empty table
    fn create_table(&mut self, device: &Device, table: TableType) -> Result<()>;

    fn create_partition(
        &mut self,
        device: &Device,
        partition: NewPartition,
        flags: PartitionFlags,
    ) -> Result<()>;

    fn create_encrypted_partition(
        &mut self,
        device: &Device,
        partition: NewPartition,
        passphrase: &str,
        flags: PartitionFlags,
    ) -> Result<()>;

    fn delete_partition(&mut self, device: &Device, region: &Region) -> Result<()>;

    /// Lay out the root partition(s) over `range`, encrypted when a
    /// passphrase is given
    fn apply_root_layout(
        &mut self,
        device: &Device,
        range: SectorRange,
        passphrase: Option<&str>,
    ) -> Result<()>;

    /// Materialize everything queued so far
    fn commit(&mut self) -> Result<()>;
}
