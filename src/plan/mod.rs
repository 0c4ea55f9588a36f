//! Layout planning: swap sizing, from-scratch layouts and replacements

pub mod context;
pub mod layout;
pub mod replace;
pub mod swap;

pub use context::PlanContext;
pub use layout::{apply_auto_layout, compute_auto_layout, plan_and_apply, AutoLayout};
pub use replace::{infer_replacement_role, plan_replacement};
pub use swap::{decide_swap, suggest_swap_size, SwapDecision};
