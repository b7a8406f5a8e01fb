//! Frame identifier type.

use std::fmt;

/// Identifies a frame in the buffer pool.
///
/// A signed 32-bit index into the frame array, with `-1` reserved as the
/// "no frame" sentinel. Use [`FrameId::index`] to index `Vec<Frame>`.
///
/// # Example
/// ```
/// use framepool::FrameId;
///
/// let frame_id = FrameId::new(5);
/// assert_eq!(frame_id.index(), 5);
/// assert!(!FrameId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub i32);

impl FrameId {
    /// Invalid/sentinel frame ID.
    pub const INVALID: FrameId = FrameId(-1);

    /// Create a new FrameId.
    #[inline]
    pub fn new(id: i32) -> Self {
        FrameId(id)
    }

    /// Check if this frame ID is valid (not negative).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }

    /// Position of this frame in the frame array.
    ///
    /// # Panics
    /// Panics on the invalid sentinel.
    #[inline]
    pub fn index(&self) -> usize {
        assert!(self.is_valid(), "index of invalid frame id");
        self.0 as usize
    }
}

impl From<usize> for FrameId {
    fn from(index: usize) -> Self {
        FrameId(index as i32)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Frame({})", self.0)
        } else {
            write!(f, "Frame(INVALID)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_new() {
        let fid = FrameId::new(10);
        assert_eq!(fid.0, 10);
        assert_eq!(fid.index(), 10);
    }

    #[test]
    fn test_frame_id_equality() {
        assert_eq!(FrameId::new(5), FrameId::new(5));
        assert_ne!(FrameId::new(5), FrameId::new(6));
        assert_eq!(FrameId::from(7usize), FrameId::new(7));
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(format!("{}", FrameId::new(42)), "Frame(42)");
        assert_eq!(format!("{}", FrameId::INVALID), "Frame(INVALID)");
    }

    #[test]
    #[should_panic(expected = "index of invalid frame id")]
    fn test_invalid_frame_index_panics() {
        FrameId::INVALID.index();
    }
}
