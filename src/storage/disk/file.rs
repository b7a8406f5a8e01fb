//! File-backed storage: one database file, pages laid out back to back.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::trace;

use super::DiskManager;
use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Stores pages in a single file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page IDs are handed out by the buffer pool, so a page may be read before
/// it was ever written. Such reads (past end-of-file) yield a zeroed page.
/// Writes past end-of-file extend the file.
///
/// # Durability
/// Every write is followed by `fsync()`.
pub struct FileDiskManager {
    file: File,
    /// Number of whole pages in the file.
    page_count: u32,
}

impl FileDiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
        })
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self { file, page_count })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    fn check_page_id(page_id: PageId) -> Result<()> {
        if page_id.is_valid() {
            Ok(())
        } else {
            Err(Error::InvalidPageId(page_id))
        }
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        Self::check_page_id(page_id)?;

        if page_id.0 as u32 >= self.page_count {
            trace!(%page_id, "read past end of file, returning zeroed page");
            page.reset();
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.read_exact(page.as_mut_slice())?;

        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        Self::check_page_id(page_id)?;

        self.file.seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?; // fsync for durability

        // Writing past the end leaves a zero-filled hole for skipped pages.
        self.page_count = self.page_count.max(page_id.0 as u32 + 1);
        Ok(())
    }

    #[inline]
    fn num_pages(&self) -> u32 {
        self.page_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let dm = FileDiskManager::create(&path).unwrap();
        assert_eq!(dm.num_pages(), 0);
        assert_eq!(dm.file_size(), 0);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        FileDiskManager::create(&path).unwrap();
        assert!(FileDiskManager::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.db");

        assert!(FileDiskManager::open(&path).is_err());
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0xAB;
        page.as_mut_slice()[100] = 0xCD;
        page.as_mut_slice()[4095] = 0xEF;

        dm.write_page(PageId::new(0), &page).unwrap();
        assert_eq!(dm.num_pages(), 1);

        let mut read_back = Page::new();
        dm.read_page(PageId::new(0), &mut read_back).unwrap();
        assert_eq!(read_back.as_slice()[0], 0xAB);
        assert_eq!(read_back.as_slice()[100], 0xCD);
        assert_eq!(read_back.as_slice()[4095], 0xEF);
    }

    #[test]
    fn test_read_past_end_is_zeroed() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0x99;
        dm.read_page(PageId::new(12), &mut page).unwrap();
        assert_eq!(page.as_slice()[0], 0);
    }

    #[test]
    fn test_write_past_end_extends_file() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0x07;
        dm.write_page(PageId::new(4), &page).unwrap();

        assert_eq!(dm.num_pages(), 5);
        assert_eq!(dm.file_size(), 5 * PAGE_SIZE as u64);

        // The hole reads back as zeroes.
        let mut hole = Page::new();
        dm.read_page(PageId::new(2), &mut hole).unwrap();
        assert!(hole.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_invalid_page_id_rejected() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();

        let mut page = Page::new();
        assert!(matches!(
            dm.read_page(PageId::INVALID, &mut page),
            Err(Error::InvalidPageId(_))
        ));
        assert!(matches!(
            dm.write_page(PageId::new(-5), &page),
            Err(Error::InvalidPageId(_))
        ));
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = FileDiskManager::create(&path).unwrap();
            let mut page = Page::new();
            page.as_mut_slice()[0] = 0x42;
            dm.write_page(PageId::new(0), &page).unwrap();
        }

        {
            let mut dm = FileDiskManager::open(&path).unwrap();
            assert_eq!(dm.num_pages(), 1);

            let mut page = Page::new();
            dm.read_page(PageId::new(0), &mut page).unwrap();
            assert_eq!(page.as_slice()[0], 0x42);
        }
    }

    #[test]
    fn test_open_or_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = FileDiskManager::open_or_create(&path).unwrap();
            assert_eq!(dm.num_pages(), 0);
            dm.write_page(PageId::new(0), &Page::new()).unwrap();
        }

        {
            let dm = FileDiskManager::open_or_create(&path).unwrap();
            assert_eq!(dm.num_pages(), 1);
        }
    }
}
