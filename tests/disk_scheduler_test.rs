//! Disk scheduler tests against instrumented storage backends.

use framepool::storage::disk::DiskRequest;
use framepool::{DiskManager, DiskScheduler, Error, Page, PageId, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Kind and page of one serviced request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Read(PageId),
    Write(PageId),
}

/// In-memory backend that records every request it services.
#[derive(Default)]
struct RecordingDisk {
    pages: HashMap<PageId, Vec<u8>>,
    log: Arc<Mutex<Vec<Op>>>,
    latency: Option<Duration>,
}

impl RecordingDisk {
    fn new(log: Arc<Mutex<Vec<Op>>>) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    fn slow(log: Arc<Mutex<Vec<Op>>>, latency: Duration) -> Self {
        Self {
            log,
            latency: Some(latency),
            ..Default::default()
        }
    }

    fn pause(&self) {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
    }
}

impl DiskManager for RecordingDisk {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        self.pause();
        self.log.lock().unwrap().push(Op::Read(page_id));
        match self.pages.get(&page_id) {
            Some(bytes) => page.as_mut_slice().copy_from_slice(bytes),
            None => page.reset(),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.pause();
        self.log.lock().unwrap().push(Op::Write(page_id));
        self.pages.insert(page_id, page.as_slice().to_vec());
        Ok(())
    }

    fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }
}

/// Backend that panics on page 13 and fails writes to page 7.
struct FlakyDisk;

impl DiskManager for FlakyDisk {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        if page_id == PageId::new(13) {
            panic!("bad sector");
        }
        page.reset();
        page.as_mut_slice()[0] = page_id.0 as u8;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, _page: &Page) -> Result<()> {
        if page_id == PageId::new(7) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "write failed").into());
        }
        Ok(())
    }

    fn num_pages(&self) -> u32 {
        0
    }
}

fn page_with(byte: u8) -> Box<Page> {
    let mut page = Page::boxed();
    page.as_mut_slice().fill(byte);
    page
}

#[test]
fn test_requests_serviced_in_schedule_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = DiskScheduler::new(RecordingDisk::new(Arc::clone(&log))).unwrap();

    let mut expected = Vec::new();
    let mut completions = Vec::new();
    for i in 0..20 {
        let pid = PageId::new(i % 4);
        let (request, completion) = if i % 3 == 0 {
            expected.push(Op::Read(pid));
            DiskRequest::read(pid)
        } else {
            expected.push(Op::Write(pid));
            DiskRequest::write(pid, page_with(i as u8))
        };
        scheduler.schedule(request);
        completions.push(completion);
    }

    for completion in completions {
        completion.wait().unwrap();
    }

    assert_eq!(*log.lock().unwrap(), expected);
}

#[test]
fn test_read_sees_earlier_write() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = DiskScheduler::new(RecordingDisk::new(log)).unwrap();

    // Schedule both before waiting on either.
    let (write, write_done) = DiskRequest::write(PageId::new(2), page_with(0x5A));
    let (read, read_done) = DiskRequest::read(PageId::new(2));
    scheduler.schedule(write);
    scheduler.schedule(read);

    let page = read_done.wait().unwrap();
    write_done.wait().unwrap();
    assert!(page.as_slice().iter().all(|&b| b == 0x5A));
}

#[test]
fn test_concurrent_callers_each_serviced_once() {
    const THREADS: i32 = 8;
    const WRITES_PER_THREAD: i32 = 25;

    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = Arc::new(DiskScheduler::new(RecordingDisk::new(Arc::clone(&log))).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || {
                let mut issued = Vec::new();
                for i in 0..WRITES_PER_THREAD {
                    let pid = PageId::new(t * WRITES_PER_THREAD + i);
                    scheduler.write_page(pid, page_with(t as u8)).unwrap();
                    issued.push(pid);
                }
                issued
            })
        })
        .collect();

    let per_thread: Vec<Vec<PageId>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let serviced_log = log.lock().unwrap().clone();

    assert_eq!(serviced_log.len(), (THREADS * WRITES_PER_THREAD) as usize);

    // Every write serviced once, and each caller's writes in its own order.
    for issued in per_thread {
        let serviced: Vec<PageId> = serviced_log
            .iter()
            .filter_map(|op| match op {
                Op::Write(pid) if issued.contains(pid) => Some(*pid),
                _ => None,
            })
            .collect();
        assert_eq!(serviced, issued);
    }

    for pid in 0..THREADS * WRITES_PER_THREAD {
        let page = scheduler.read_page(PageId::new(pid)).unwrap();
        assert_eq!(page.as_slice()[0], (pid / WRITES_PER_THREAD) as u8);
    }
}

#[test]
fn test_backend_failures_do_not_stop_worker() {
    let scheduler = DiskScheduler::new(FlakyDisk).unwrap();

    let result = scheduler.write_page(PageId::new(7), Page::boxed());
    assert!(matches!(result, Err(Error::Io(_))));

    let result = scheduler.read_page(PageId::new(13));
    assert!(matches!(result, Err(Error::BackendPanicked(pid)) if pid == PageId::new(13)));

    // Still servicing requests
    let page = scheduler.read_page(PageId::new(5)).unwrap();
    assert_eq!(page.as_slice()[0], 5);
    assert!(scheduler.write_page(PageId::new(8), Page::boxed()).is_ok());
}

#[test]
fn test_shutdown_drains_queued_requests() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = DiskScheduler::new(RecordingDisk::slow(
        Arc::clone(&log),
        Duration::from_millis(5),
    ))
    .unwrap();

    let completions: Vec<_> = (0..10)
        .map(|i| {
            let (request, completion) = DiskRequest::write(PageId::new(i), page_with(1));
            scheduler.schedule(request);
            completion
        })
        .collect();

    // Returns only after the worker has handled everything queued so far.
    scheduler.shutdown();
    assert_eq!(log.lock().unwrap().len(), 10);

    for completion in completions {
        assert!(completion.wait().is_ok());
    }

    let (late, late_done) = DiskRequest::read(PageId::new(0));
    scheduler.schedule(late);
    assert!(matches!(late_done.wait(), Err(Error::SchedulerShutdown)));
}

#[test]
fn test_dropping_completion_does_not_block_worker() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = DiskScheduler::new(RecordingDisk::new(Arc::clone(&log))).unwrap();

    for i in 0..5 {
        let (request, completion) = DiskRequest::write(PageId::new(i), page_with(2));
        drop(completion);
        scheduler.schedule(request);
    }

    // Waiting on a later request implies the earlier ones were serviced.
    assert!(scheduler.read_page(PageId::new(0)).is_ok());
    assert_eq!(log.lock().unwrap().len(), 6);
}
