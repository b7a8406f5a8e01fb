//! Page type and layout.
//!
//! This module contains [`Page`], the raw 4KB data container.

#[allow(clippy::module_inception)]
mod page;

pub use page::Page;
