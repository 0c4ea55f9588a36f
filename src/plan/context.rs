//! Inputs shared by every planning call

use crate::config::GlobalSettings;
use crate::system::{FirmwareMode, MemoryInfo};

/// Everything the planner needs to know about the host, captured once
/// and passed explicitly into each planning call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanContext {
    pub firmware: FirmwareMode,
    pub memory: MemoryInfo,
    pub settings: GlobalSettings,
}

impl PlanContext {
    pub fn new(firmware: FirmwareMode, memory: MemoryInfo, settings: GlobalSettings) -> Self {
        Self {
            firmware,
            memory,
            settings,
        }
    }
}
