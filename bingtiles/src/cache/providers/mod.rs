//! Tile store implementations.
//!
//! # Available Stores
//!
//! - [`DirectoryStore`]: one file per tile in a directory
//! - [`ArchiveStore`]: all tiles in a single tar file
//!
//! Stores are usually opened through [`CacheLocation`](super::CacheLocation),
//! which picks the backend from the path.

mod archive;
mod disk;

pub use archive::ArchiveStore;
pub use disk::DirectoryStore;
