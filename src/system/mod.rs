//! Host probes: firmware mode and installed memory

pub mod firmware;
pub mod memory;

pub use firmware::FirmwareMode;
pub use memory::MemoryInfo;
