//! LRU-K replacement policy.
//!
//! Ranks frames by their *backward k-distance*: how long ago the K-th most
//! recent access happened. Frames seen fewer than K times have an infinite
//! distance and are evicted first, oldest first. See O'Neil, O'Neil & Weikum,
//! "The LRU-K Page Replacement Algorithm For Database Disk Buffering" (1993).

use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::FrameId;

/// Logical clock value; one tick per recorded access.
type Timestamp = u64;

struct LruKState {
    /// Global access counter shared by all frames.
    current_timestamp: Timestamp,

    /// Up to K most recent access timestamps per frame (front = oldest).
    history: HashMap<FrameId, VecDeque<Timestamp>>,

    /// Frames that may be chosen by `evict` (pin_count == 0).
    ///
    /// Ordered so ties resolve to the lowest frame id.
    evictable: BTreeSet<FrameId>,
}

/// Eviction candidate ranking, compared with `Ord`: the maximum is the victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Distance {
    /// K accesses recorded; larger is older.
    Finite(Timestamp),
    /// Fewer than K accesses. Wrapped earliest access is reversed so that an
    /// older first access ranks higher.
    Infinite(std::cmp::Reverse<Timestamp>),
}

/// A thread-safe LRU-K replacer.
///
/// Tracks access history only; it knows nothing about pages. The buffer pool
/// tells it which frames are accessed and which are evictable.
///
/// # Thread Safety
/// Every operation takes one internal `Mutex`, so calls are serialized.
/// `evict` is O(evictable frames).
///
/// # Example
/// ```
/// use framepool::buffer::replacer::LruKReplacer;
/// use framepool::FrameId;
///
/// let replacer = LruKReplacer::new(8, 2);
/// replacer.record_access(FrameId::new(0));
/// replacer.record_access(FrameId::new(1));
/// replacer.record_access(FrameId::new(1));
/// replacer.set_evictable(FrameId::new(0), true);
/// replacer.set_evictable(FrameId::new(1), true);
///
/// // Frame 0 has fewer than K accesses: infinite distance wins.
/// assert_eq!(replacer.evict(), Some(FrameId::new(0)));
/// ```
pub struct LruKReplacer {
    state: Mutex<LruKState>,
    num_frames: usize,
    k: usize,
}

impl LruKReplacer {
    /// Create a replacer for frames `0..num_frames` keeping `k` accesses each.
    ///
    /// # Panics
    /// Panics if `k` is 0.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "replacer k must be > 0");

        Self {
            state: Mutex::new(LruKState {
                current_timestamp: 0,
                history: HashMap::with_capacity(num_frames),
                evictable: BTreeSet::new(),
            }),
            num_frames,
            k,
        }
    }

    /// The K in LRU-K.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Record an access to `frame_id` at the next global timestamp.
    ///
    /// Only the K most recent timestamps are kept. Evictability is unchanged.
    pub fn record_access(&self, frame_id: FrameId) {
        self.check_frame(frame_id);
        let mut state = self.state.lock();

        state.current_timestamp += 1;
        let now = state.current_timestamp;

        let history = state.history.entry(frame_id).or_default();
        history.push_back(now);
        if history.len() > self.k {
            history.pop_front();
        }
    }

    /// Add `frame_id` to, or remove it from, the evictable set.
    ///
    /// Access history is untouched either way.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        self.check_frame(frame_id);
        let mut state = self.state.lock();

        if evictable {
            state.evictable.insert(frame_id);
        } else {
            state.evictable.remove(&frame_id);
        }
    }

    /// Choose, forget and return the frame with the largest backward
    /// k-distance among evictable frames.
    ///
    /// Returns `None` if no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        let victim = state
            .evictable
            .iter()
            .map(|&frame_id| (Self::distance(&state, self.k, frame_id), frame_id))
            // Equal distances keep the first (lowest) frame id.
            .fold(None, |best: Option<(Distance, FrameId)>, candidate| match best {
                Some(b) if b.0 >= candidate.0 => Some(b),
                _ => Some(candidate),
            })
            .map(|(_, frame_id)| frame_id)?;

        state.evictable.remove(&victim);
        state.history.remove(&victim);
        Some(victim)
    }

    /// Forget `frame_id` entirely: history and evictability.
    pub fn remove(&self, frame_id: FrameId) {
        self.check_frame(frame_id);
        let mut state = self.state.lock();

        state.history.remove(&frame_id);
        state.evictable.remove(&frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().evictable.len()
    }

    /// Recorded access timestamps of `frame_id`, oldest first.
    pub fn history(&self, frame_id: FrameId) -> Vec<u64> {
        self.state
            .lock()
            .history
            .get(&frame_id)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `frame_id` is currently in the evictable set.
    pub fn is_evictable(&self, frame_id: FrameId) -> bool {
        self.state.lock().evictable.contains(&frame_id)
    }

    fn distance(state: &LruKState, k: usize, frame_id: FrameId) -> Distance {
        match state.history.get(&frame_id) {
            Some(history) if history.len() >= k => {
                // History is capped at K, so the front is the K-th most recent.
                Distance::Finite(state.current_timestamp - history[0])
            }
            Some(history) if !history.is_empty() => {
                Distance::Infinite(std::cmp::Reverse(history[0]))
            }
            _ => Distance::Infinite(std::cmp::Reverse(state.current_timestamp)),
        }
    }

    fn check_frame(&self, frame_id: FrameId) {
        assert!(
            frame_id.is_valid() && frame_id.index() < self.num_frames,
            "{} out of range for replacer of {} frames",
            frame_id,
            self.num_frames
        );
    }
}
