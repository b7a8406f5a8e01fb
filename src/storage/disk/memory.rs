//! In-memory storage backend.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use super::DiskManager;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Keeps every written page in a hash map.
///
/// Useful for tests and for simulating a slow device: with
/// [`MemoryDiskManager::with_latency`] every request sleeps before completing,
/// like a real disk would.
///
/// Pages that were never written read back as zeroes.
#[derive(Debug, Default)]
pub struct MemoryDiskManager {
    pages: HashMap<PageId, Box<Page>>,
    latency: Option<Duration>,
}

impl MemoryDiskManager {
    /// Create an empty backend with no simulated latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty backend that sleeps `latency` on every request.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            pages: HashMap::new(),
            latency: Some(latency),
        }
    }

    /// Number of distinct pages written so far.
    pub fn written_pages(&self) -> usize {
        self.pages.len()
    }

    fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }
        self.simulate_latency();

        match self.pages.get(&page_id) {
            Some(stored) => page.copy_from(stored),
            None => page.reset(),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }
        self.simulate_latency();

        self.pages.insert(page_id, page.boxed_copy());
        Ok(())
    }

    fn num_pages(&self) -> u32 {
        self.pages
            .keys()
            .map(|pid| pid.0 as u32 + 1)
            .max()
            .unwrap_or(0)
    }
}
