//! Unbounded FIFO channel with explicit close.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct ChannelState<T> {
    queue: VecDeque<T>,
    closed: bool,
}

/// A thread-safe FIFO hand-off queue.
///
/// Producers [`put`](Channel::put) without blocking; consumers
/// [`get`](Channel::get) and sleep while the queue is empty. Once
/// [`close`](Channel::close)d, consumers still drain whatever is queued and
/// then see `None` on every call.
///
/// # Example
/// ```
/// use framepool::storage::disk::Channel;
///
/// let channel = Channel::new();
/// channel.put(1).unwrap();
/// channel.put(2).unwrap();
/// channel.close();
///
/// assert_eq!(channel.get(), Some(1));
/// assert_eq!(channel.get(), Some(2));
/// assert_eq!(channel.get(), None);
/// ```
pub struct Channel<T> {
    state: Mutex<ChannelState<T>>,
    not_empty: Condvar,
}

impl<T> Channel<T> {
    /// Create an empty, open channel.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                queue: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Enqueue an item and wake one waiting consumer.
    ///
    /// # Errors
    /// Hands the item back if the channel has been closed.
    pub fn put(&self, item: T) -> std::result::Result<(), T> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(item);
        }
        state.queue.push_back(item);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue the oldest item, blocking while the channel is empty and open.
    ///
    /// Returns `None` only once the channel is closed and fully drained.
    pub fn get(&self) -> Option<T> {
        let mut state = self.state.lock();
        while state.queue.is_empty() && !state.closed {
            self.not_empty.wait(&mut state);
        }
        state.queue.pop_front()
    }

    /// Close the channel and wake every waiting consumer. Idempotent.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
    }

    /// Whether [`close`](Channel::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}
