//! Grid policy implementations (spec §4.4) for GRINDER's decision pipeline.

pub mod grid_policy;

pub use grid_policy::{GridPolicy, StaticGridPolicy, StaticGridPolicyConfig};
