//! partplan library - automatic partition layout planning for OS installers

pub mod backend;
pub mod config;
pub mod disk;
pub mod plan;
pub mod system;
pub mod utils;

pub use config::PlanConfig;
pub use plan::{compute_auto_layout, plan_and_apply, plan_replacement, PlanContext};
pub use utils::error::PartplanError;
