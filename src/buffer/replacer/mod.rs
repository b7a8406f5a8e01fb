//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`LruKReplacer`] - LRU-K (backward k-distance based)

mod lru_k;

pub use lru_k::LruKReplacer;
