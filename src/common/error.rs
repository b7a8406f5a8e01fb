//! Error types for framepool.

use thiserror::Error;

use super::{FrameId, PageId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in framepool.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page was never allocated.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// The page ID is the invalid sentinel or otherwise out of range.
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// Every non-negative page ID has been handed out.
    #[error("Page IDs exhausted")]
    PageIdsExhausted,

    /// An unpin would have taken the pin count below zero.
    ///
    /// This indicates a bug - unpinning should match pinning.
    #[error("Pin count underflow on {0}")]
    PinCountUnderflow(FrameId),

    /// The disk scheduler is shut down and no longer accepts requests.
    #[error("Disk scheduler is shut down")]
    SchedulerShutdown,

    /// The storage backend panicked while servicing a request.
    #[error("Storage backend panicked while handling {0}")]
    BackendPanicked(PageId),
}
