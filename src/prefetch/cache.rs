//! Bounded in-memory cache of decoded images.
//!
//! LRU keyed by absolute path, limited both by entry count and by a byte
//! budget. Handles are cheap to clone and share the same storage, so the
//! coordinator and the prefetch worker see one cache.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::image_loader::DecodedImage;

/// Default memory budget in megabytes.
pub const DEFAULT_MAX_MEMORY_MB: usize = 256;

/// Default cap on the number of cached images.
pub const DEFAULT_MAX_ENTRIES: usize = 64;

/// Minimum memory budget in megabytes.
const MIN_MEMORY_MB: usize = 16;

/// Maximum memory budget in megabytes.
const MAX_MEMORY_MB: usize = 4096;

struct CacheInner {
    entries: LruCache<PathBuf, Arc<DecodedImage>>,
    bytes: usize,
    max_bytes: usize,
}

impl CacheInner {
    fn evict_to_budget(&mut self) {
        while self.bytes > self.max_bytes {
            match self.entries.pop_lru() {
                Some((path, evicted)) => {
                    self.bytes = self.bytes.saturating_sub(evicted.memory_bytes());
                    trace!(?path, current_bytes = self.bytes, "Evicted image from cache");
                }
                None => break,
            }
        }
    }
}

#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl ImageCache {
    /// Create a cache holding at most `max_entries` images and roughly
    /// `max_memory_mb` megabytes of pixels.
    pub fn new(max_entries: usize, max_memory_mb: usize) -> Self {
        let max_memory_mb = max_memory_mb.clamp(MIN_MEMORY_MB, MAX_MEMORY_MB);
        Self::with_byte_budget(max_entries, max_memory_mb * 1024 * 1024)
    }

    /// Create a cache with an exact byte budget (no clamping).
    pub fn with_byte_budget(max_entries: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        debug!(max_entries = capacity.get(), max_bytes, "Initialized image cache");
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                bytes: 0,
                max_bytes,
            })),
        }
    }

    /// Look up a decoded image, marking it recently used.
    pub fn lookup(&self, path: &Path) -> Option<Arc<DecodedImage>> {
        self.inner.lock().entries.get(path).cloned()
    }

    /// Insert a decoded image, evicting least recently used entries as
    /// needed. Returns the shared handle to the stored image.
    pub fn insert(&self, path: PathBuf, image: DecodedImage) -> Arc<DecodedImage> {
        let image = Arc::new(image);
        let mut inner = self.inner.lock();
        let new_bytes = image.memory_bytes();

        // `push` reports both a replaced value and a count-based eviction.
        if let Some((_, old)) = inner.entries.push(path, Arc::clone(&image)) {
            inner.bytes = inner.bytes.saturating_sub(old.memory_bytes());
        }
        inner.bytes = inner.bytes.saturating_add(new_bytes);
        inner.evict_to_budget();
        image
    }

    /// Move the entry for `from` to `to`, for files renamed on disk.
    /// Returns false if `from` was not cached.
    pub fn rekey(&self, from: &Path, to: PathBuf) -> bool {
        let mut inner = self.inner.lock();
        let Some(image) = inner.entries.pop(from) else {
            return false;
        };
        if let Some((_, old)) = inner.entries.push(to, image) {
            inner.bytes = inner.bytes.saturating_sub(old.memory_bytes());
        }
        true
    }

    /// Check presence without touching recency.
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().entries.contains(path)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current pixel memory held by the cache.
    pub fn memory_usage(&self) -> usize {
        self.inner.lock().bytes
    }

    pub fn max_memory(&self) -> usize {
        self.inner.lock().max_bytes
    }

    /// Snapshot of cached paths, most recently used first.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.bytes = 0;
        debug!("Cleared image cache");
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_MAX_MEMORY_MB)
    }
}
