//! Configuration: planner options, global settings and plan files

pub mod options;
pub mod plan;

pub use options::{AutoPartitionOptions, GlobalSettings, ReplacePartitionOptions, SwapChoice};
pub use plan::PlanConfig;
