//! Disk Scheduler - moves pages to and from storage on a background thread.
//!
//! Callers build a [`DiskRequest`], hand it to [`DiskScheduler::schedule`],
//! and block on the matching [`DiskCompletion`] only when they need the
//! result. A single worker thread services requests strictly in the order
//! they were scheduled.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use super::{Channel, DiskManager};
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Direction of a disk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskRequestKind {
    /// Fill the request's buffer from storage.
    Read,
    /// Persist the request's buffer.
    Write,
}

/// One pending I/O operation.
///
/// Owns the page buffer it operates on; the buffer comes back through the
/// [`DiskCompletion`] once the worker is done with it.
pub struct DiskRequest {
    kind: DiskRequestKind,
    page_id: PageId,
    data: Box<Page>,
    callback: SyncSender<Result<Box<Page>>>,
}

impl DiskRequest {
    /// Build a read request for `page_id` into a fresh zeroed buffer.
    pub fn read(page_id: PageId) -> (Self, DiskCompletion) {
        Self::with_buffer(DiskRequestKind::Read, page_id, Page::boxed())
    }

    /// Build a write request persisting `data` under `page_id`.
    pub fn write(page_id: PageId, data: Box<Page>) -> (Self, DiskCompletion) {
        Self::with_buffer(DiskRequestKind::Write, page_id, data)
    }

    fn with_buffer(
        kind: DiskRequestKind,
        page_id: PageId,
        data: Box<Page>,
    ) -> (Self, DiskCompletion) {
        // One slot: the worker sends exactly once and never waits for the caller.
        let (callback, receiver) = mpsc::sync_channel(1);
        let request = Self {
            kind,
            page_id,
            data,
            callback,
        };
        (request, DiskCompletion { receiver })
    }

    /// Direction of this request.
    #[inline]
    pub fn kind(&self) -> DiskRequestKind {
        self.kind
    }

    /// Target page.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Run this request against `disk_manager` and resolve its completion.
    ///
    /// Backend errors and panics are both turned into a failed completion.
    fn execute(self, disk_manager: &mut dyn DiskManager) {
        let DiskRequest {
            kind,
            page_id,
            mut data,
            callback,
        } = self;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match kind {
            DiskRequestKind::Read => disk_manager.read_page(page_id, &mut data),
            DiskRequestKind::Write => disk_manager.write_page(page_id, &data),
        }));

        let result = match outcome {
            Ok(Ok(())) => {
                trace!(?kind, %page_id, "disk request complete");
                Ok(data)
            }
            Ok(Err(e)) => {
                warn!(?kind, %page_id, error = %e, "disk request failed");
                Err(e)
            }
            Err(_) => {
                warn!(?kind, %page_id, "storage backend panicked");
                Err(Error::BackendPanicked(page_id))
            }
        };

        Self::resolve(callback, result);
    }

    /// Fail this request without running it.
    fn reject(self, error: Error) {
        Self::resolve(self.callback, Err(error));
    }

    fn resolve(callback: SyncSender<Result<Box<Page>>>, result: Result<Box<Page>>) {
        if callback.send(result).is_err() {
            trace!("disk completion dropped before resolution");
        }
    }
}

/// Single-resolution completion signal for one [`DiskRequest`].
pub struct DiskCompletion {
    receiver: Receiver<Result<Box<Page>>>,
}

impl DiskCompletion {
    /// Block until the request has been serviced.
    ///
    /// Returns the request's buffer: for reads it holds the page's bytes.
    ///
    /// # Errors
    /// - Whatever the storage backend reported
    /// - `Error::BackendPanicked` if the backend panicked
    /// - `Error::SchedulerShutdown` if the request was never serviced
    pub fn wait(self) -> Result<Box<Page>> {
        match self.receiver.recv() {
            Ok(result) => result,
            Err(_) => Err(Error::SchedulerShutdown),
        }
    }
}

/// Owns the disk worker thread and the request queue feeding it.
///
/// # Shutdown
/// [`shutdown`](DiskScheduler::shutdown) (also run on drop) closes the queue,
/// lets the worker finish every request already scheduled, then joins it.
/// Requests scheduled afterwards fail immediately with
/// `Error::SchedulerShutdown`.
pub struct DiskScheduler {
    requests: Arc<Channel<DiskRequest>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DiskScheduler {
    /// Start the worker thread over `disk_manager`.
    ///
    /// # Errors
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn new<D: DiskManager + 'static>(disk_manager: D) -> Result<Self> {
        let requests = Arc::new(Channel::new());

        let worker = {
            let requests = Arc::clone(&requests);
            thread::Builder::new()
                .name("disk-scheduler".into())
                .spawn(move || Self::run_worker(disk_manager, &requests))?
        };

        debug!("disk scheduler started");
        Ok(Self {
            requests,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a request for the worker. Never blocks.
    pub fn schedule(&self, request: DiskRequest) {
        if let Err(rejected) = self.requests.put(request) {
            debug!(page_id = %rejected.page_id, "request scheduled after shutdown");
            rejected.reject(Error::SchedulerShutdown);
        }
    }

    /// Schedule a read of `page_id` and wait for its bytes.
    pub fn read_page(&self, page_id: PageId) -> Result<Box<Page>> {
        let (request, completion) = DiskRequest::read(page_id);
        self.schedule(request);
        completion.wait()
    }

    /// Schedule a write of `data` under `page_id` and wait for it to land.
    pub fn write_page(&self, page_id: PageId, data: Box<Page>) -> Result<()> {
        let (request, completion) = DiskRequest::write(page_id, data);
        self.schedule(request);
        completion.wait().map(drop)
    }

    /// Stop accepting requests, drain the queue and join the worker.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        self.requests.close();

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("disk worker thread panicked");
            }
            debug!("disk scheduler stopped");
        }
    }

    fn run_worker<D: DiskManager>(mut disk_manager: D, requests: &Channel<DiskRequest>) {
        while let Some(request) = requests.get() {
            request.execute(&mut disk_manager);
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::MemoryDiskManager;

    #[test]
    fn test_write_then_read() {
        let scheduler = DiskScheduler::new(MemoryDiskManager::new()).unwrap();

        let mut data = Page::boxed();
        data.as_mut_slice()[0] = 0xAB;
        scheduler.write_page(PageId::new(0), data).unwrap();

        let page = scheduler.read_page(PageId::new(0)).unwrap();
        assert_eq!(page.as_slice()[0], 0xAB);
    }

    #[test]
    fn test_request_accessors() {
        let (request, _completion) = DiskRequest::read(PageId::new(9));
        assert_eq!(request.kind(), DiskRequestKind::Read);
        assert_eq!(request.page_id(), PageId::new(9));
    }

    #[test]
    fn test_completion_waits_for_worker() {
        let scheduler = DiskScheduler::new(MemoryDiskManager::with_latency(
            std::time::Duration::from_millis(2),
        ))
        .unwrap();

        let completions: Vec<_> = (0..8)
            .map(|i| {
                let mut data = Page::boxed();
                data.as_mut_slice()[0] = i as u8;
                let (request, completion) = DiskRequest::write(PageId::new(i), data);
                scheduler.schedule(request);
                completion
            })
            .collect();

        for completion in completions {
            assert!(completion.wait().is_ok());
        }
    }

    #[test]
    fn test_backend_error_reported() {
        let scheduler = DiskScheduler::new(MemoryDiskManager::new()).unwrap();

        let result = scheduler.read_page(PageId::INVALID);
        assert!(matches!(result, Err(Error::InvalidPageId(_))));

        // Worker keeps going
        assert!(scheduler.read_page(PageId::new(1)).is_ok());
    }

    #[test]
    fn test_schedule_after_shutdown_fails_fast() {
        let scheduler = DiskScheduler::new(MemoryDiskManager::new()).unwrap();
        scheduler.shutdown();

        let result = scheduler.read_page(PageId::new(0));
        assert!(matches!(result, Err(Error::SchedulerShutdown)));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let scheduler = DiskScheduler::new(MemoryDiskManager::new()).unwrap();
        scheduler.shutdown();
        scheduler.shutdown();
    }
}
