//! Disk model: geometry, sizes, regions and table types

pub mod device;
pub mod partition;
pub mod probe;
pub mod region;
pub mod size;
pub mod table;
pub mod units;
