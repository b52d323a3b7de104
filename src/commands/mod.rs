//! CLI command implementations.

pub mod check;
pub mod selected;
pub mod subnets;
pub mod update;
