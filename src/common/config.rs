//! Configuration constants and buffer pool settings.

/// Size of a page in bytes (4KB).
///
/// This value is chosen to match:
/// - OS page size on most systems (4096 bytes)
/// - BusTub's page size
///
/// # Alignment
/// Pages are aligned to 4096 bytes for efficient Direct I/O (O_DIRECT).
pub const PAGE_SIZE: usize = 4096;

/// Number of frames used when no pool size is given.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// History depth of the LRU-K replacer when no K is given.
///
/// K = 2 is the classic LRU-2 setting from the O'Neil paper.
pub const DEFAULT_REPLACER_K: usize = 2;

/// Settings for constructing a [`BufferPoolManager`](crate::BufferPoolManager).
///
/// # Example
/// ```
/// use framepool::BufferPoolConfig;
///
/// let config = BufferPoolConfig::default().pool_size(16).replacer_k(3);
/// assert_eq!(config.pool_size, 16);
/// assert_eq!(config.replacer_k, 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool. Fixed for the pool's lifetime.
    pub pool_size: usize,

    /// How many past accesses the replacer remembers per frame.
    pub replacer_k: usize,
}

impl BufferPoolConfig {
    /// Set the number of frames.
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the LRU-K history depth.
    pub fn replacer_k(mut self, k: usize) -> Self {
        self.replacer_k = k;
        self
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            replacer_k: DEFAULT_REPLACER_K,
        }
    }
}
