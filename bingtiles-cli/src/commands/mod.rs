//! CLI command implementations.

pub mod cache;
pub mod common;
pub mod map;
pub mod providers;
pub mod tile;
