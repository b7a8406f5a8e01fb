//! RAII guards for page access.
//!
//! These guards provide safe access to pages in the buffer pool:
//! - [`PageReadGuard`] - Read-only access
//! - [`PageWriteGuard`] - Mutable access (marks the frame dirty)
//!
//! A guard owns exactly one pin on its frame and holds the frame's lock for
//! as long as it is bound. Dropping or [`release`](PageReadGuard::release)-ing
//! the guard unlocks the frame and gives the pin back, exactly once.
//!
//! # Frame lock
//! Each frame has a single exclusive lock, so two read guards on the same
//! page exclude each other just like writers do. A thread that already holds
//! a guard on a page must not fetch that page again.
//!
//! # Binding
//! Guards are move-only. [`Default`] builds an *unbound* guard, and
//! `take()` moves the binding out of a guard, leaving it unbound. Unbound
//! guards report [`PageId::INVALID`] and release as a no-op.

use std::ops::{Deref, DerefMut};

use parking_lot::MutexGuard;

use super::buffer_pool_manager::BufferPoolManager;
use super::frame::Frame;
use crate::common::{FrameId, PageId};
use crate::storage::page::Page;

const UNBOUND_ACCESS: &str = "page data accessed through an unbound guard";

/// The (pool, frame) pair a guard is bound to, plus the frame's lock.
struct Binding<'a> {
    bpm: &'a BufferPoolManager,
    frame: &'a Frame,
    page: MutexGuard<'a, Page>,
}

impl<'a> Binding<'a> {
    /// `frame` is pinned by the caller and `page` is its lock.
    fn new(bpm: &'a BufferPoolManager, frame: &'a Frame, page: MutexGuard<'a, Page>) -> Self {
        Self { bpm, frame, page }
    }

    fn release(self) {
        let Binding { bpm, frame, page } = self;
        // Unlock before unpinning: the pool latch only locks unpinned frames.
        drop(page);
        bpm.release_frame(frame.frame_id());
    }
}

/// Guard for read-only page access.
///
/// The page is automatically unpinned when the guard is dropped.
///
/// # Example
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let data = guard.as_slice();  // Deref to &Page
/// // guard drops here, page unpinned
/// ```
#[derive(Default)]
pub struct PageReadGuard<'a> {
    binding: Option<Binding<'a>>,
}

impl<'a> PageReadGuard<'a> {
    /// Create a new read guard over a pinned and locked frame.
    ///
    /// Called by `BufferPoolManager::fetch_page_read()`.
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame: &'a Frame,
        page: MutexGuard<'a, Page>,
    ) -> Self {
        Self {
            binding: Some(Binding::new(bpm, frame, page)),
        }
    }

    /// Get the page ID, or `PageId::INVALID` if unbound.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.binding
            .as_ref()
            .map_or(PageId::INVALID, |b| b.frame.page_id())
    }

    /// Get the frame ID, or `FrameId::INVALID` if unbound.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.binding
            .as_ref()
            .map_or(FrameId::INVALID, |b| b.frame.frame_id())
    }

    /// Whether this guard currently holds a pin.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Move the binding into a new guard, leaving this one unbound.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            binding: self.binding.take(),
        }
    }

    /// Unlock and unpin the page now. Further calls do nothing.
    pub fn release(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.release();
        }
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    /// # Panics
    /// Panics if the guard is unbound.
    #[inline]
    fn deref(&self) -> &Page {
        match &self.binding {
            Some(binding) => &*binding.page,
            None => panic!("{}", UNBOUND_ACCESS),
        }
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Guard for exclusive, mutable page access.
///
/// Requesting mutable access (`DerefMut`) marks the frame dirty, whether or
/// not any byte is actually changed. The page is unpinned when the guard is
/// dropped.
///
/// # Example
/// ```ignore
/// let mut guard = bpm.fetch_page_write(page_id)?;
/// guard.as_mut_slice()[0] = 0xFF;  // DerefMut to &mut Page, marks dirty
/// // guard drops here, page unpinned
/// ```
#[derive(Default)]
pub struct PageWriteGuard<'a> {
    binding: Option<Binding<'a>>,
}

impl<'a> PageWriteGuard<'a> {
    /// Create a new write guard over a pinned and locked frame.
    ///
    /// Called by `BufferPoolManager::fetch_page_write()`.
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame: &'a Frame,
        page: MutexGuard<'a, Page>,
    ) -> Self {
        Self {
            binding: Some(Binding::new(bpm, frame, page)),
        }
    }

    /// Get the page ID, or `PageId::INVALID` if unbound.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.binding
            .as_ref()
            .map_or(PageId::INVALID, |b| b.frame.page_id())
    }

    /// Get the frame ID, or `FrameId::INVALID` if unbound.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.binding
            .as_ref()
            .map_or(FrameId::INVALID, |b| b.frame.frame_id())
    }

    /// Whether this guard currently holds a pin.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Whether the underlying frame is dirty. `false` if unbound.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.binding.as_ref().is_some_and(|b| b.frame.is_dirty())
    }

    /// Move the binding into a new guard, leaving this one unbound.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            binding: self.binding.take(),
        }
    }

    /// Unlock and unpin the page now. Further calls do nothing.
    pub fn release(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.release();
        }
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    /// # Panics
    /// Panics if the guard is unbound.
    #[inline]
    fn deref(&self) -> &Page {
        match &self.binding {
            Some(binding) => &*binding.page,
            None => panic!("{}", UNBOUND_ACCESS),
        }
    }
}

impl DerefMut for PageWriteGuard<'_> {
    /// # Panics
    /// Panics if the guard is unbound.
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        match &mut self.binding {
            Some(binding) => {
                binding.frame.mark_dirty();
                &mut *binding.page
            }
            None => panic!("{}", UNBOUND_ACCESS),
        }
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
