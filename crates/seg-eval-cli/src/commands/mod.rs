//! Subcommand implementations.

pub mod evaluate;
pub mod predict;
pub mod stats;
