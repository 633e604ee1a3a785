//! Look-ahead decoding around the focused item.
//!
//! This module provides:
//! - `ImageCache` - Bounded LRU of decoded images shared by handle
//! - `PrefetchWorker` - Background thread that keeps the focus window decoded

pub mod cache;
pub mod worker;

pub use cache::ImageCache;
pub use worker::{PrefetchRequest, PrefetchResult, PrefetchWorker, DEFAULT_PREFETCH_RADIUS};
