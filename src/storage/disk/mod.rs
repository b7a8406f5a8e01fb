//! Disk I/O: storage backends and the background disk scheduler.
//!
//! - [`DiskManager`] - The synchronous storage backend interface
//! - [`FileDiskManager`] - Single-file backend
//! - [`MemoryDiskManager`] - In-memory backend for tests and simulation
//! - [`Channel`] - FIFO hand-off queue between callers and the worker
//! - [`DiskScheduler`] - One worker thread servicing [`DiskRequest`]s

mod channel;
mod file;
mod memory;
mod scheduler;

pub use channel::Channel;
pub use file::FileDiskManager;
pub use memory::MemoryDiskManager;
pub use scheduler::{DiskCompletion, DiskRequest, DiskRequestKind, DiskScheduler};

use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// Synchronous page storage consumed by the [`DiskScheduler`] worker.
///
/// Every call moves exactly one page's worth of bytes. Implementations are
/// owned by the worker thread, so they only need to be `Send`.
pub trait DiskManager: Send {
    /// Fill `page` with the persisted bytes of `page_id`.
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Persist `page` under `page_id`.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()>;

    /// Number of pages the backend currently holds.
    ///
    /// Page IDs `0..num_pages()` are considered allocated when a buffer pool
    /// is opened over this backend.
    fn num_pages(&self) -> u32;
}

impl<D: DiskManager + ?Sized> DiskManager for Box<D> {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        (**self).read_page(page_id, page)
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        (**self).write_page(page_id, page)
    }

    fn num_pages(&self) -> u32 {
        (**self).num_pages()
    }
}
