//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting through page guards
//! - Dirty page write-back before a frame is reused
//! - LRU-K eviction
//! - Disk I/O through a background [`DiskScheduler`]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, trace, warn};

use crate::buffer::replacer::LruKReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{BufferPoolConfig, Error, FrameId, PageId, Result};
use crate::storage::disk::{DiskCompletion, DiskManager, DiskRequest, DiskScheduler};
use crate::storage::page::Page;

/// State guarded by the pool-wide latch.
struct PoolState {
    /// Maps resident page IDs to their frames.
    page_table: HashMap<PageId, FrameId>,

    /// Frames holding no page, handed out oldest first.
    free_list: VecDeque<FrameId>,

    /// Evicted pages whose write-back has not landed yet, and the frame
    /// that still holds their bytes.
    pending_writes: HashMap<PageId, FrameId>,
}

/// A frame taken off the free list or out of the replacer.
///
/// Locked, unpinned and not yet mapped to a page.
struct Claim<'a> {
    frame: &'a Frame,
    page: MutexGuard<'a, Page>,

    /// The dirty victim's page ID and its scheduled write-back.
    write_back: Option<(PageId, DiskCompletion)>,
}

/// Manages a pool of buffer frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────────────────┐  ┌────────────────────────┐   │
/// │  │ latch: Mutex<PoolState>  │  │   frames: Vec<Frame>   │   │
/// │  │  page_table PageId → Fid │─▶│ [Frame0] [Frame1] ...  │   │
/// │  │  free_list  FrameId FIFO │  └────────────────────────┘   │
/// │  │  pending_writes          │                               │
/// │  └──────────────────────────┘                               │
/// │  ┌──────────────┐  ┌────────────────────────────────────┐   │
/// │  │   replacer   │  │ scheduler ──▶ worker ──▶ DiskManager│  │
/// │  │ LruKReplacer │  │   (Channel of DiskRequests)        │   │
/// │  └──────────────┘  └────────────────────────────────────┘   │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `latch`: one `Mutex` over page table, free list and pending writes.
///   Every pin-count transition that changes evictability happens under it.
/// - `replacer`: internally locked, only called with the latch held
/// - `frames`: fixed size, each `Frame` has its own lock
/// - `scheduler`: owns the single disk worker thread
///
/// Lock order is latch → replacer and latch → frame lock, and the latch only
/// ever locks frames with no pins. A thread may take the latch while holding
/// the lock of a frame it has pinned.
///
/// # Misses
/// A miss claims and pins a frame and publishes the page table entry under
/// the latch, then releases the latch and does the I/O holding only the frame
/// lock. Other fetchers of the same page pin the frame and wait on its lock;
/// the rest of the pool keeps running. A dirty victim's write is queued
/// before the latch is released, and fetches of that victim wait until the
/// write has landed.
///
/// # Usage
/// ```
/// use framepool::{BufferPoolManager, MemoryDiskManager};
///
/// let bpm = BufferPoolManager::new(10, 2, MemoryDiskManager::new()).unwrap();
///
/// let page_id = bpm.new_page().unwrap();
/// {
///     let mut guard = bpm.fetch_page_write(page_id).unwrap();
///     guard.as_mut_slice()[0] = 0xAB;
/// }
///
/// let guard = bpm.fetch_page_read(page_id).unwrap();
/// assert_eq!(guard.as_slice()[0], 0xAB);
/// ```
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Page table, free list and pending writes.
    latch: Mutex<PoolState>,

    /// Signalled whenever an entry leaves `pending_writes`.
    write_landed: Condvar,

    /// Eviction policy for selecting victim frames.
    replacer: LruKReplacer,

    /// Background disk I/O.
    scheduler: DiskScheduler,

    /// Next page ID handed out by `new_page`. Only advanced under the latch.
    next_page_id: AtomicI32,

    /// Performance statistics.
    stats: BufferPoolStats,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager.
    ///
    /// # Arguments
    /// * `pool_size` - Number of frames in the pool
    /// * `replacer_k` - History depth of the LRU-K replacer
    /// * `disk_manager` - Storage backend, moved onto the disk worker thread
    ///
    /// # Panics
    /// Panics if `pool_size` or `replacer_k` is 0.
    pub fn new<D: DiskManager + 'static>(
        pool_size: usize,
        replacer_k: usize,
        disk_manager: D,
    ) -> Result<Self> {
        Self::with_config(
            BufferPoolConfig {
                pool_size,
                replacer_k,
            },
            disk_manager,
        )
    }

    /// Create a new buffer pool manager from a [`BufferPoolConfig`].
    ///
    /// Page IDs already held by `disk_manager` are treated as allocated.
    ///
    /// # Errors
    /// Returns an error if the disk worker thread cannot be started.
    ///
    /// # Panics
    /// Panics if `pool_size` or `replacer_k` is 0.
    pub fn with_config<D: DiskManager + 'static>(
        config: BufferPoolConfig,
        disk_manager: D,
    ) -> Result<Self> {
        let pool_size = config.pool_size;
        assert!(pool_size > 0, "pool_size must be > 0");
        assert!(pool_size <= i32::MAX as usize, "pool_size exceeds FrameId range");

        // A backend holding every ID leaves none to hand out.
        let next_page_id = i32::try_from(disk_manager.num_pages()).unwrap_or(i32::MAX);

        // Allocate all frames upfront
        let frames: Vec<Frame> = (0..pool_size).map(|i| Frame::new(FrameId::from(i))).collect();

        // All frames start on the free list
        let free_list: VecDeque<FrameId> = (0..pool_size).map(FrameId::from).collect();

        let scheduler = DiskScheduler::new(disk_manager)?;

        debug!(pool_size, replacer_k = config.replacer_k, "buffer pool created");
        Ok(Self {
            frames,
            latch: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
                pending_writes: HashMap::new(),
            }),
            write_landed: Condvar::new(),
            replacer: LruKReplacer::new(pool_size, config.replacer_k),
            scheduler,
            next_page_id: AtomicI32::new(next_page_id),
            stats: BufferPoolStats::new(),
        })
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading.
    ///
    /// If the page is already in the buffer pool, pins it and returns.
    /// Otherwise, loads the page from disk (possibly evicting another page).
    /// Blocks while another guard on the same page is alive.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for negative page IDs
    /// - `Error::PageNotFound` if the page was never allocated
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - Storage errors from the read or from a dirty victim's write-back
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let (frame, page) = self.pin_page(page_id)?;
        Ok(PageReadGuard::new(self, frame, page))
    }

    /// Fetch a page for writing.
    ///
    /// Same as `fetch_page_read`, but the guard grants mutable access.
    ///
    /// # Errors
    /// Same as [`fetch_page_read`](Self::fetch_page_read).
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let (frame, page) = self.pin_page(page_id)?;
        Ok(PageWriteGuard::new(self, frame, page))
    }

    // ========================================================================
    // Public API: Create and delete pages
    // ========================================================================

    /// Allocate a fresh page ID and give it a zeroed frame.
    ///
    /// The page is left unpinned; fetch it to access its data. It starts out
    /// dirty so that it reaches storage if evicted.
    ///
    /// # Errors
    /// - `Error::PageIdsExhausted` once every non-negative `i32` has been used
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - Storage errors from a dirty victim's write-back. The victim stays
    ///   resident and the page ID is not reused.
    pub fn new_page(&self) -> Result<PageId> {
        let mut state = self.latch.lock();

        let page_id = self.peek_next_page_id()?;
        let Claim {
            frame,
            mut page,
            write_back,
        } = self.claim_frame(&mut state)?;
        self.next_page_id.store(page_id.0 + 1, Ordering::Relaxed);

        let frame_id = frame.frame_id();
        self.map_frame(&mut state, frame, page_id);
        frame.mark_dirty();

        match write_back {
            None => {
                page.reset();
                self.replacer.set_evictable(frame_id, true);
            }
            Some((victim, completion)) => {
                // Pinned so the frame stays ours while the victim is written.
                frame.pin();
                drop(state);

                page = self.finish_write_back(frame, page, victim, completion)?;
                page.reset();
                drop(page);
                self.release_frame(frame_id);
            }
        }

        debug!(%page_id, %frame_id, "allocated new page");
        Ok(page_id)
    }

    /// Drop a page from the buffer pool.
    ///
    /// Returns `false` if the page is pinned. Otherwise the frame goes back
    /// to the free list (discarding unsaved changes) and `true` is returned,
    /// including when the page was not resident at all.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.latch.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };

        let frame = self.frame(frame_id);
        if frame.is_pinned() {
            debug!(%page_id, pin_count = frame.pin_count(), "refusing to delete pinned page");
            return false;
        }

        state.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        frame.reset(&mut frame.lock());
        state.free_list.push_back(frame_id);

        debug!(%page_id, %frame_id, "deleted page");
        true
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write a resident page to disk, dirty or not, and clear its dirty flag.
    ///
    /// Returns `Ok(false)` if the page is not in the buffer pool.
    ///
    /// Waits for every live guard on the page to be released, so calling it
    /// while the current thread holds a guard on `page_id` deadlocks.
    ///
    /// # Errors
    /// Storage errors from the write; the page stays dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let frame = {
            let state = self.latch.lock();
            let Some(&frame_id) = state.page_table.get(&page_id) else {
                return Ok(false);
            };

            // Pin so the frame can't be evicted once the latch is released.
            let frame = self.frame(frame_id);
            frame.pin();
            self.replacer.set_evictable(frame_id, false);
            frame
        };

        // The dirty flag is cleared under the frame lock before the copy is
        // taken, so writes racing with the flush leave the frame dirty.
        let data = {
            let page = frame.lock();
            if frame.page_id() == page_id {
                frame.clear_dirty();
                Some(page.boxed_copy())
            } else {
                // The load we found in the page table failed.
                None
            }
        };

        let result = match data {
            None => Ok(false),
            Some(data) => match self.scheduler.write_page(page_id, data) {
                Ok(()) => {
                    self.stats.record_write();
                    Ok(true)
                }
                Err(e) => {
                    frame.mark_dirty();
                    Err(e)
                }
            },
        };

        self.release_frame(frame.frame_id());
        result
    }

    /// Flush every resident page.
    ///
    /// Flushes one page at a time with [`flush_page`](Self::flush_page), so
    /// it waits on every page that has a live guard. Calling it while the
    /// current thread holds *any* guard from this pool deadlocks.
    ///
    /// # Errors
    /// Stops at the first storage error.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_ids: Vec<PageId> = self.latch.lock().page_table.keys().copied().collect();

        for page_id in page_ids {
            self.flush_page(page_id)?;
        }

        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Get the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.latch.lock().free_list.len()
    }

    /// Get the number of pages in the buffer pool.
    pub fn page_count(&self) -> usize {
        self.latch.lock().page_table.len()
    }

    /// Pin count of a resident page, or `None` if it is not in the pool.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.latch.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frame(frame_id).pin_count())
    }

    // ========================================================================
    // Internal: Called by page guards on release
    // ========================================================================

    /// Give back one pin. At zero pins the frame becomes evictable, or goes
    /// back to the free list if its load failed.
    ///
    /// The caller must not hold the frame's lock.
    pub(crate) fn release_frame(&self, frame_id: FrameId) {
        let mut state = self.latch.lock();
        self.unpin(&mut state, frame_id);
    }

    fn unpin(&self, state: &mut PoolState, frame_id: FrameId) {
        let frame = self.frame(frame_id);

        match frame.unpin() {
            Ok(0) if frame.is_free() => {
                self.replacer.remove(frame_id);
                state.free_list.push_back(frame_id);
            }
            Ok(0) => self.replacer.set_evictable(frame_id, true),
            Ok(_) => {}
            Err(e) => error!(%frame_id, error = %e, "unbalanced unpin"),
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    #[inline]
    fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.index()]
    }

    fn check_page_id(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }
        if page_id.0 >= self.next_page_id.load(Ordering::Relaxed) {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }

    /// The ID `new_page` hands out next. The caller holds the latch.
    fn peek_next_page_id(&self) -> Result<PageId> {
        let next = self.next_page_id.load(Ordering::Relaxed);
        // Advancing past i32::MAX would wrap into negative IDs.
        if next.checked_add(1).is_none() {
            return Err(Error::PageIdsExhausted);
        }
        Ok(PageId::new(next))
    }

    /// Make `page_id` resident, pin its frame and lock it.
    fn pin_page(&self, page_id: PageId) -> Result<(&Frame, MutexGuard<'_, Page>)> {
        self.check_page_id(page_id)?;

        loop {
            let mut state = self.latch.lock();

            // An evicted copy on its way to disk must land before it is read back.
            while state.pending_writes.contains_key(&page_id) {
                self.write_landed.wait(&mut state);
            }

            let resident = state.page_table.get(&page_id).copied();
            let Some(frame_id) = resident else {
                return self.load_page(state, page_id);
            };

            let frame = self.frame(frame_id);
            frame.pin();
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            drop(state);

            // Waits out other guards and any load still in flight.
            let page = frame.lock();
            if frame.page_id() == page_id {
                self.stats.record_hit();
                trace!(%page_id, %frame_id, "buffer pool hit");
                return Ok((frame, page));
            }

            trace!(%page_id, %frame_id, "load failed under us, retrying");
            drop(page);
            self.release_frame(frame_id);
        }
    }

    /// Miss path: claim a frame for `page_id` under the latch, then fill it
    /// with the latch released.
    fn load_page<'a>(
        &'a self,
        mut state: MutexGuard<'a, PoolState>,
        page_id: PageId,
    ) -> Result<(&'a Frame, MutexGuard<'a, Page>)> {
        self.stats.record_miss();
        debug!(%page_id, "buffer pool miss, loading from disk");

        let Claim {
            frame,
            page,
            write_back,
        } = self.claim_frame(&mut state)?;
        self.map_frame(&mut state, frame, page_id);
        frame.pin();
        drop(state);

        let mut page = match write_back {
            Some((victim, completion)) => {
                self.finish_write_back(frame, page, victim, completion)?
            }
            None => page,
        };

        match self.scheduler.read_page(page_id) {
            Ok(data) => {
                page.copy_from(&data);
                self.stats.record_read();
                Ok((frame, page))
            }
            Err(e) => {
                // Unpublish; fetchers waiting on the frame lock will retry.
                let mut state = self.latch.lock();
                state.page_table.remove(&page_id);
                frame.set_page_id(PageId::INVALID);
                drop(page);
                self.unpin(&mut state, frame.frame_id());
                Err(e)
            }
        }
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Take a frame from the free list, else evict one.
    ///
    /// A dirty victim's write-back is scheduled here, while the latch is
    /// still held, and recorded in `pending_writes`.
    fn claim_frame<'a>(&'a self, state: &mut PoolState) -> Result<Claim<'a>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            let frame = self.frame(frame_id);
            return Ok(Claim {
                frame,
                page: frame.lock(),
                write_back: None,
            });
        }

        let frame_id = self.replacer.evict().ok_or(Error::NoFreeFrames)?;
        let frame = self.frame(frame_id);
        debug_assert!(!frame.is_pinned(), "replacer chose a pinned frame");

        let page = frame.lock();
        let victim = frame.page_id();
        state.page_table.remove(&victim);

        let write_back = if frame.is_dirty() {
            frame.clear_dirty();
            let (request, completion) = DiskRequest::write(victim, page.boxed_copy());
            self.scheduler.schedule(request);
            state.pending_writes.insert(victim, frame_id);
            Some((victim, completion))
        } else {
            None
        };

        self.stats.record_eviction();
        debug!(page_id = %victim, %frame_id, dirty = write_back.is_some(), "evicted page");
        Ok(Claim {
            frame,
            page,
            write_back,
        })
    }

    /// Point a claimed frame at `page_id` and publish it in the page table.
    fn map_frame(&self, state: &mut PoolState, frame: &Frame, page_id: PageId) {
        let frame_id = frame.frame_id();
        frame.set_page_id(page_id);
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
    }

    /// Wait for a victim's write-back, without the latch.
    ///
    /// On failure the victim is put back into its frame, still dirty, and
    /// the caller's pin is dropped. The frame still holds the victim's bytes
    /// because nothing has been read into it yet.
    fn finish_write_back<'a>(
        &'a self,
        frame: &'a Frame,
        page: MutexGuard<'a, Page>,
        victim: PageId,
        completion: DiskCompletion,
    ) -> Result<MutexGuard<'a, Page>> {
        let result = completion.wait();

        let mut state = self.latch.lock();
        state.pending_writes.remove(&victim);
        self.write_landed.notify_all();

        match result {
            Ok(_) => {
                self.stats.record_write();
                Ok(page)
            }
            Err(e) => {
                warn!(page_id = %victim, error = %e, "write-back failed, keeping victim resident");
                let frame_id = frame.frame_id();
                state.page_table.remove(&frame.page_id());
                frame.set_page_id(victim);
                frame.mark_dirty();
                state.page_table.insert(victim, frame_id);
                drop(page);
                self.unpin(&mut state, frame_id);
                Err(e)
            }
        }
    }
}
