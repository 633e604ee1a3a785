//! Look-ahead decode worker.
//!
//! - One background thread decodes the images around the focused item
//! - Requests go through a latest-value slot plus a bounded wake channel, so
//!   the coordinator never blocks and a backlog collapses to the newest focus
//! - Decoded images go straight into the shared `ImageCache`; dimensions are
//!   sent back to the coordinator as messages

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::cache::ImageCache;
use crate::image_loader::ImageDecoder;
use crate::models::ImageSize;

/// Default number of items decoded on each side of the focus.
pub const DEFAULT_PREFETCH_RADIUS: usize = 2;

/// How often an idle worker re-checks the shutdown flag.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Window of items to keep decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchRequest {
    pub focus: usize,
    /// `(store index, path)` pairs, nearest to the focus first.
    pub targets: Vec<(usize, PathBuf)>,
}

/// Dimensions learned while decoding, for the coordinator to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchResult {
    pub index: usize,
    pub path: PathBuf,
    pub size: ImageSize,
}

type LatestSlot = Arc<Mutex<Option<PrefetchRequest>>>;

pub struct PrefetchWorker {
    latest: LatestSlot,
    wake_tx: Sender<()>,
    result_rx: Receiver<PrefetchResult>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    cache: ImageCache,
}

impl PrefetchWorker {
    pub fn spawn(cache: ImageCache, decoder: Arc<dyn ImageDecoder>) -> std::io::Result<Self> {
        let latest: LatestSlot = Arc::new(Mutex::new(None));
        let (wake_tx, wake_rx) = flume::bounded(1);
        let (result_tx, result_rx) = flume::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let latest = Arc::clone(&latest);
            let shutdown = Arc::clone(&shutdown);
            let cache = cache.clone();
            thread::Builder::new()
                .name("prefetch-worker".into())
                .spawn(move || worker_loop(wake_rx, latest, result_tx, shutdown, cache, decoder))?
        };

        debug!("Started prefetch worker");

        Ok(Self {
            latest,
            wake_tx,
            result_rx,
            shutdown,
            handle: Some(handle),
            cache,
        })
    }

    /// Replace any queued request with `req` and wake the worker.
    pub fn request(&self, req: PrefetchRequest) {
        trace!(focus = req.focus, targets = req.targets.len(), "Prefetch requested");
        *self.latest.lock() = Some(req);
        match self.wake_tx.try_send(()) {
            // A full wake channel means the worker is already due to look.
            Ok(()) | Err(flume::TrySendError::Full(())) => {}
            Err(flume::TrySendError::Disconnected(())) => {
                warn!("Prefetch worker is gone, dropping request");
            }
        }
    }

    /// Drain completed decodes (non-blocking).
    pub fn poll_results(&self) -> Vec<PrefetchResult> {
        self.result_rx.try_iter().collect()
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// True while a request is queued but not yet picked up.
    pub fn has_queued_request(&self) -> bool {
        self.latest.lock().is_some()
    }

    /// Stop the worker and wait for its thread to exit.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.wake_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Prefetch worker panicked");
            }
            debug!("Prefetch worker stopped");
        }
    }
}

impl Drop for PrefetchWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    wake_rx: Receiver<()>,
    latest: LatestSlot,
    result_tx: Sender<PrefetchResult>,
    shutdown: Arc<AtomicBool>,
    cache: ImageCache,
    decoder: Arc<dyn ImageDecoder>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match wake_rx.recv_timeout(IDLE_POLL) {
            Ok(()) => {
                let Some(req) = latest.lock().take() else {
                    continue;
                };
                process_request(req, &latest, &result_tx, &shutdown, &cache, decoder.as_ref());
            }
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn process_request(
    req: PrefetchRequest,
    latest: &LatestSlot,
    result_tx: &Sender<PrefetchResult>,
    shutdown: &AtomicBool,
    cache: &ImageCache,
    decoder: &dyn ImageDecoder,
) {
    trace!(focus = req.focus, "Processing prefetch window");

    for (index, path) in req.targets {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        // A newer focus supersedes the rest of this window.
        if latest.lock().is_some() {
            trace!(focus = req.focus, "Prefetch window superseded");
            return;
        }
        if cache.contains(&path) {
            continue;
        }

        match decoder.decode(&path) {
            Ok(image) => {
                let size = image.size();
                cache.insert(path.clone(), image);
                if result_tx.send(PrefetchResult { index, path, size }).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(?path, error = %e, "Failed to prefetch image");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_loader::{DecodeError, DecodedImage};
    use std::collections::HashSet;
    use std::path::Path;
    use std::time::Instant;

    /// Decoder that makes a 2x1 image for anything except paths containing
    /// "broken", and records what it was asked to decode.
    #[derive(Default)]
    struct FakeDecoder {
        seen: Mutex<Vec<PathBuf>>,
    }

    impl ImageDecoder for FakeDecoder {
        fn decode(&self, path: &Path) -> Result<DecodedImage, DecodeError> {
            self.seen.lock().push(path.to_path_buf());
            if path.to_string_lossy().contains("broken") {
                return Err(DecodeError::Read {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, "broken"),
                });
            }
            Ok(DecodedImage::blank(2, 1))
        }
    }

    fn request(focus: usize, indices: &[usize]) -> PrefetchRequest {
        PrefetchRequest {
            focus,
            targets: indices
                .iter()
                .map(|i| (*i, PathBuf::from(format!("/photos/{}.jpg", i))))
                .collect(),
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_window_is_cached_and_sizes_reported() {
        let cache = ImageCache::default();
        let decoder = Arc::new(FakeDecoder::default());
        let worker = PrefetchWorker::spawn(cache.clone(), decoder).unwrap();

        worker.request(request(2, &[2, 1, 3, 0, 4]));
        assert!(wait_until(|| cache.len() == 5));

        let mut results = Vec::new();
        assert!(wait_until(|| {
            results.extend(worker.poll_results());
            results.len() == 5
        }));
        assert!(results.iter().all(|r| r.size == ImageSize::new(2, 1)));
        let indices: HashSet<_> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..5).collect());
    }

    #[test]
    fn test_cached_paths_are_not_decoded_again() {
        let cache = ImageCache::default();
        cache.insert("/photos/1.jpg".into(), DecodedImage::blank(1, 1));
        let decoder = Arc::new(FakeDecoder::default());
        let worker = PrefetchWorker::spawn(cache.clone(), decoder.clone()).unwrap();

        worker.request(request(0, &[0, 1]));
        assert!(wait_until(|| cache.len() == 2));
        assert!(wait_until(|| !worker.has_queued_request()));

        let seen = decoder.seen.lock().clone();
        assert_eq!(seen, vec![PathBuf::from("/photos/0.jpg")]);
    }

    #[test]
    fn test_decode_failure_leaves_no_entry() {
        let cache = ImageCache::default();
        let worker = PrefetchWorker::spawn(cache.clone(), Arc::new(FakeDecoder::default())).unwrap();

        worker.request(PrefetchRequest {
            focus: 0,
            targets: vec![
                (0, PathBuf::from("/photos/broken.jpg")),
                (1, PathBuf::from("/photos/fine.jpg")),
            ],
        });
        assert!(wait_until(|| cache.contains(Path::new("/photos/fine.jpg"))));
        assert!(!cache.contains(Path::new("/photos/broken.jpg")));

        let mut results = Vec::new();
        assert!(wait_until(|| {
            results.extend(worker.poll_results());
            !results.is_empty()
        }));
        assert!(results.iter().all(|r| r.index == 1));
    }

    #[test]
    fn test_burst_of_requests_converges_on_latest() {
        let cache = ImageCache::default();
        let worker = PrefetchWorker::spawn(cache.clone(), Arc::new(FakeDecoder::default())).unwrap();

        for focus in 0..50 {
            worker.request(request(focus, &[focus]));
        }
        assert!(wait_until(|| cache.contains(Path::new("/photos/49.jpg"))));
    }

    #[test]
    fn test_shutdown_joins_thread() {
        let mut worker =
            PrefetchWorker::spawn(ImageCache::default(), Arc::new(FakeDecoder::default())).unwrap();
        worker.shutdown();
        assert!(worker.handle.is_none());
        // Requests after shutdown are dropped quietly.
        worker.request(request(0, &[0]));
    }
}
