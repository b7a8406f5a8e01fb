//! Storage layer - disk I/O and page format.
//!
//! This module handles persistent storage:
//! - [`disk`] - Storage backends and the background disk scheduler
//! - [`page`] - The raw page type

pub mod disk;
pub mod page;

pub use disk::{DiskManager, DiskScheduler, FileDiskManager, MemoryDiskManager};
