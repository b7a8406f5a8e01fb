//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus metadata needed for buffer management:
//! - Which page is loaded (if any)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// Frames are the "slots" in the buffer pool. Each frame can hold one page.
/// The buffer pool has a fixed number of frames allocated at startup.
///
/// # Thread Safety
/// - `page`: one exclusive `Mutex`. A page guard holds it for its whole
///   lifetime, so readers of the same page serialize just like writers.
///   A reader-writer lock would allow shared reads; that is a known
///   limitation of this design.
/// - `page_id`: atomic, written only while the pool latch is held and the
///   frame is unpinned
/// - `pin_count`: atomic, checked for underflow
/// - `is_dirty`: atomic, so the pool can inspect it without the page lock
pub struct Frame {
    frame_id: FrameId,

    /// The page data, protected by an exclusive lock.
    page: Mutex<Page>,

    /// Which page is currently loaded, or `PageId::INVALID` if free.
    page_id: AtomicI32,

    /// Number of active pins on this frame.
    pin_count: AtomicU32,

    /// Whether the page has been modified since it was last written out.
    is_dirty: AtomicBool,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page: Mutex::new(Page::new()),
            page_id: AtomicI32::new(PageId::INVALID.0),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// This frame's position in the pool.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    // ========================================================================
    // Page access (Mutex)
    // ========================================================================

    /// Acquire the exclusive lock on the page data.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, Page> {
        self.page.lock()
    }

    // ========================================================================
    // Page ID
    // ========================================================================

    /// Get the page ID of the loaded page.
    #[inline]
    pub fn page_id(&self) -> PageId {
        PageId(self.page_id.load(Ordering::Acquire))
    }

    /// Set the page ID.
    #[inline]
    pub(crate) fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.0, Ordering::Release);
    }

    // ========================================================================
    // Pin count operations (Atomic)
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub(crate) fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Errors
    /// Returns `Error::PinCountUnderflow` and leaves the count at zero if
    /// the frame was not pinned.
    pub(crate) fn unpin(&self) -> Result<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .map(|old| old - 1)
            .map_err(|_| Error::PinCountUnderflow(self.frame_id))
    }

    /// Get the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Check if the frame is currently pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ========================================================================
    // Dirty flag operations (Atomic)
    // ========================================================================

    /// Mark the frame as dirty (modified).
    #[inline]
    pub(crate) fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
    }

    /// Clear the dirty flag.
    #[inline]
    pub(crate) fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Release);
    }

    /// Check if the frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    // ========================================================================
    // Frame state queries
    // ========================================================================

    /// Check if the frame is free (no page loaded).
    #[inline]
    pub fn is_free(&self) -> bool {
        !self.page_id().is_valid()
    }

    /// Reset the frame to the free state and zero its page.
    ///
    /// `page` must be this frame's locked page. Called when a frame is
    /// reclaimed for a new page.
    pub(crate) fn reset(&self, page: &mut Page) {
        page.reset();
        self.set_page_id(PageId::INVALID);
        self.pin_count.store(0, Ordering::Release);
        self.clear_dirty();
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id())
            .field("pin_count", &self.pin_count())
            .field("is_dirty", &self.is_dirty())
            .finish()
    }
}
