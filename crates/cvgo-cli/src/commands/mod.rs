//! CLI command implementations.

pub mod config;
pub mod offsets;
pub mod replay;
pub mod scan;
