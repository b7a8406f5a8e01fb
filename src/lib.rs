//! framepool - the page-caching core of a disk-backed storage engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           framepool                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │       Page consumers (indexes, heaps, catalogs)         │    │
//! │  │        PageReadGuard / PageWriteGuard (RAII pins)        │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                 Buffer Pool (buffer/)                   │    │
//! │  │   BufferPoolManager + Frame + LruKReplacer + Stats      │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                Storage Layer (storage/)                 │    │
//! │  │  DiskScheduler ─ Channel ─▶ worker ─▶ dyn DiskManager   │    │
//! │  │        (FileDiskManager | MemoryDiskManager)            │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Buffer pool management and LRU-K eviction
//! - [`storage`] - Pages, storage backends and the disk scheduler
//!
//! # Quick Start
//! ```no_run
//! use framepool::{BufferPoolManager, FileDiskManager};
//!
//! let dm = FileDiskManager::open_or_create("my_database.db").unwrap();
//! let bpm = BufferPoolManager::new(64, 2, dm).unwrap();
//!
//! let page_id = bpm.new_page().unwrap();
//! bpm.fetch_page_write(page_id).unwrap().as_mut_slice()[0] = 7;
//! bpm.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{BufferPoolConfig, Error, FrameId, PageId, Result};

pub use buffer::{
    BufferPoolManager, BufferPoolStats, Frame, PageReadGuard, PageWriteGuard, StatsSnapshot,
};
pub use storage::page::Page;
pub use storage::{DiskManager, DiskScheduler, FileDiskManager, MemoryDiskManager};
