//! Single-threaded owner of the organizer state.
//!
//! The coordinator holds the item store, the focus index, the recent
//! directories and the crawl session. Background threads only ever talk to
//! it through channels: discovery events from the crawler, decoded sizes from
//! the prefetch worker. `pump` folds both into the store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::edits::{self, CommitError, CommitReport, EditMode, EditOutcome, FileOps, SystemFileOps};
use crate::image_loader::{DecodeError, DecodedImage, ImageCrateDecoder, ImageDecoder};
use crate::models::{EditState, ImageSize, Item, ItemStore};
use crate::prefetch::{ImageCache, PrefetchRequest, PrefetchWorker};
use crate::recent::RecentDirectories;
use crate::scanner::{CrawlEvent, Crawler};
use crate::viewer::{ItemOpener, SystemOpener};

/// Upper bound on crawl events folded in by a single `pump`.
const MAX_EVENTS_PER_PUMP: usize = 1024;

/// Sleep between pumps while waiting for a crawl.
const WAIT_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatus {
    /// No crawl has been started.
    Idle,
    Running,
    Finished { discovered: usize, skipped: usize },
    Cancelled,
}

/// What one call to [`Coordinator::pump`] folded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub discovered: usize,
    pub sizes: usize,
    pub finished: bool,
}

impl PumpSummary {
    pub fn is_empty(&self) -> bool {
        self.discovered == 0 && self.sizes == 0 && !self.finished
    }
}

/// Pending action shown for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemAction {
    None,
    Delete,
    /// Stem of the staged rename target.
    Rename(String),
    Deleted,
}

/// Everything the front end shows for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDisplay {
    pub index: usize,
    pub total: usize,
    pub loading: bool,
    pub path: PathBuf,
    pub size: Option<ImageSize>,
    pub action: ItemAction,
}

impl fmt::Display for ItemDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Photo {}/{}", self.index + 1, self.total)?;
        if self.loading {
            write!(f, " (loading)")?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.path.display())?;
        match self.size {
            Some(size) => write!(f, "Size: {}x{}", size.width, size.height)?,
            None => write!(f, "Size unknown")?,
        }
        match &self.action {
            ItemAction::None => Ok(()),
            ItemAction::Delete => write!(f, "\nTo be deleted"),
            ItemAction::Rename(stem) => write!(f, "\nNew name: {}", stem),
            ItemAction::Deleted => write!(f, "\nThis photo is deleted"),
        }
    }
}

pub struct Coordinator {
    root: PathBuf,
    store: ItemStore,
    focus: usize,
    recent: RecentDirectories,
    decoder: Arc<dyn ImageDecoder>,
    file_ops: Box<dyn FileOps>,
    opener: Box<dyn ItemOpener>,
    prefetch: PrefetchWorker,
    prefetch_radius: usize,
    crawler: Option<Crawler>,
    crawl_status: CrawlStatus,
    generation: u64,
    event_tx: Sender<CrawlEvent>,
    event_rx: Receiver<CrawlEvent>,
    shut_down: bool,
}

impl Coordinator {
    /// Build a coordinator with the production decoder and filesystem.
    pub fn new(config: &Config) -> std::io::Result<Self> {
        Self::with_collaborators(config, Arc::new(ImageCrateDecoder), Box::new(SystemFileOps))
    }

    pub fn with_collaborators(
        config: &Config,
        decoder: Arc<dyn ImageDecoder>,
        file_ops: Box<dyn FileOps>,
    ) -> std::io::Result<Self> {
        let cache = ImageCache::new(config.cache_entries, config.cache_mb);
        let prefetch = PrefetchWorker::spawn(cache, Arc::clone(&decoder))?;
        let (event_tx, event_rx) = flume::bounded(config.event_capacity.max(1));

        Ok(Self {
            root: config.start_root(),
            store: ItemStore::new(),
            focus: 0,
            recent: RecentDirectories::new(config.recent_capacity),
            decoder,
            file_ops,
            opener: Box::new(SystemOpener),
            prefetch,
            prefetch_radius: config.prefetch_radius,
            crawler: None,
            crawl_status: CrawlStatus::Idle,
            generation: 0,
            event_tx,
            event_rx,
            shut_down: false,
        })
    }

    /// Swap the external viewer used by [`Coordinator::view_current`].
    pub fn with_opener(mut self, opener: Box<dyn ItemOpener>) -> Self {
        self.opener = opener;
        self
    }

    /// Replace the current session with a fresh crawl of `root`.
    pub fn start_crawl(&mut self, root: PathBuf) -> std::io::Result<()> {
        self.stop_crawler();
        self.drain_events();

        self.generation += 1;
        self.store.clear();
        self.focus = 0;
        self.root = root.clone();

        let crawler = Crawler::spawn(root, self.generation, self.event_tx.clone())?;
        self.crawler = Some(crawler);
        self.crawl_status = CrawlStatus::Running;
        info!(root = ?self.root, generation = self.generation, "Crawl started");
        Ok(())
    }

    /// Stop the running crawl. Everything the crawler sent before it saw
    /// the flag is kept; if the walk had already finished, the crawl stays
    /// `Finished`.
    pub fn cancel_crawl(&mut self) {
        if self.crawl_status != CrawlStatus::Running {
            return;
        }
        // Joining first means the channel holds everything this crawl will
        // ever send.
        self.stop_crawler();

        let mut summary = PumpSummary::default();
        let old_len = self.store.len();
        self.fold_crawl_events(usize::MAX, &mut summary);
        self.prefetch_new_items(old_len, &summary);

        if self.crawl_status == CrawlStatus::Running {
            self.crawl_status = CrawlStatus::Cancelled;
            info!(generation = self.generation, items = self.store.len(), "Crawl cancelled");
        }
    }

    /// Fold pending crawl events and prefetch results into the store.
    pub fn pump(&mut self) -> PumpSummary {
        let mut summary = PumpSummary::default();
        let old_len = self.store.len();

        self.fold_crawl_events(MAX_EVENTS_PER_PUMP, &mut summary);
        if summary.finished {
            if let Some(mut crawler) = self.crawler.take() {
                crawler.join();
            }
        }
        self.prefetch_new_items(old_len, &summary);

        for result in self.prefetch.poll_results() {
            if self.store.set_known_size(result.index, &result.path, result.size) {
                summary.sizes += 1;
            }
        }

        summary
    }

    /// Pump until the crawl stops running or `timeout` elapses. Returns true
    /// if the crawl is no longer running.
    pub fn wait_for_crawl(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if self.crawl_status != CrawlStatus::Running {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(WAIT_POLL);
        }
    }

    pub fn focus_changed(&mut self, index: usize) {
        if self.store.is_empty() {
            self.focus = 0;
            return;
        }
        self.focus = index.min(self.store.len() - 1);
        self.request_prefetch();
    }

    pub fn next(&mut self) {
        if !self.store.is_empty() {
            self.focus_changed((self.focus + 1) % self.store.len());
        }
    }

    pub fn prev(&mut self) {
        if !self.store.is_empty() {
            let len = self.store.len();
            self.focus_changed((self.focus + len - 1) % len);
        }
    }

    pub fn request_edit(&mut self, index: usize, mode: EditMode, name: &str, directory: &str) -> EditOutcome {
        let Some(item) = self.store.get_mut(index) else {
            return EditOutcome::Ignored;
        };
        let outcome = edits::apply_edit(item, &self.root, mode, name, directory);
        debug!(index, ?mode, ?outcome, "Edit requested");
        outcome
    }

    pub fn toggle_delete(&mut self, index: usize) -> EditOutcome {
        match self.store.get_mut(index) {
            Some(item) => edits::toggle_delete(item),
            None => EditOutcome::Ignored,
        }
    }

    /// Apply all staged edits. Whatever was applied before a failure is
    /// still recorded: directories go to the recent list and focus moves
    /// past each trashed item.
    pub fn commit_all(&mut self) -> Result<CommitReport, CommitError> {
        let staged: Vec<(usize, PathBuf)> = self
            .store
            .iter()
            .enumerate()
            .filter(|(_, item)| item.edit.rename_target().is_some())
            .map(|(index, item)| (index, item.path.clone()))
            .collect();

        let result = edits::commit_all(&mut self.store, self.file_ops.as_ref());
        let report = match &result {
            Ok(report) => report,
            Err(err) => &err.completed,
        };

        // Decoded pixels follow the file to its new path.
        for (index, old_path) in staged {
            if !report.renamed.contains(&index) {
                continue;
            }
            if let Some(item) = self.store.get(index) {
                self.prefetch.cache().rekey(&old_path, item.path.clone());
            }
        }

        for dir in &report.directories {
            self.recent.add(dir);
        }
        if !self.store.is_empty() && !report.deleted.is_empty() {
            let len = self.store.len();
            self.focus = (self.focus + report.deleted.len() % len) % len;
        }
        if !report.is_empty() {
            self.request_prefetch();
        }

        result
    }

    /// Decoded pixels of the focused item, decoding on demand when the
    /// prefetch worker has not got to it yet.
    pub fn current_image(&mut self) -> Result<Option<Arc<DecodedImage>>, DecodeError> {
        let Some(item) = self.store.get(self.focus) else {
            return Ok(None);
        };
        if item.edit.is_deleted() {
            return Ok(None);
        }
        let path = item.path.clone();

        let image = match self.prefetch.cache().lookup(&path) {
            Some(image) => image,
            None => {
                let decoded = self.decoder.decode(&path).inspect_err(|e| {
                    warn!(?path, error = %e, "Failed to decode current image");
                })?;
                self.prefetch.cache().insert(path.clone(), decoded)
            }
        };
        self.store.set_known_size(self.focus, &path, image.size());
        Ok(Some(image))
    }

    /// Open the focused photo in the desktop's default viewer. Returns the
    /// opened path, or `None` when there is nothing to show.
    pub fn view_current(&self) -> std::io::Result<Option<PathBuf>> {
        let Some(item) = self.store.get(self.focus) else {
            return Ok(None);
        };
        if item.edit.is_deleted() {
            return Ok(None);
        }
        self.opener.open(&item.path)?;
        debug!(path = ?item.path, "Opened in external viewer");
        Ok(Some(item.path.clone()))
    }

    pub fn display(&self, index: usize) -> Option<ItemDisplay> {
        let item = self.store.get(index)?;
        let action = match &item.edit {
            EditState::Unmodified => ItemAction::None,
            EditState::DeletePending => ItemAction::Delete,
            EditState::Deleted => ItemAction::Deleted,
            EditState::RenamePending(rename) => ItemAction::Rename(
                rename
                    .target
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
        };
        Some(ItemDisplay {
            index,
            total: self.store.len(),
            loading: self.crawl_status == CrawlStatus::Running,
            path: item.path.clone(),
            size: item.known_size,
            action,
        })
    }

    pub fn current_display(&self) -> Option<ItemDisplay> {
        self.display(self.focus)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn item(&self, index: usize) -> Option<&Item> {
        self.store.get(index)
    }

    pub fn crawl_status(&self) -> CrawlStatus {
        self.crawl_status
    }

    pub fn recent(&self) -> &RecentDirectories {
        &self.recent
    }

    pub fn suggestions(&self, prefix: &str, n: usize) -> Vec<&str> {
        self.recent.suggestions(prefix, n)
    }

    pub fn cache(&self) -> &ImageCache {
        self.prefetch.cache()
    }

    /// Stop the crawler, then the prefetch worker.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.stop_crawler();
        self.prefetch.shutdown();
        self.shut_down = true;
        debug!("Coordinator shut down");
    }

    fn request_prefetch(&self) {
        let targets: Vec<(usize, PathBuf)> = self
            .store
            .window(self.focus, self.prefetch_radius)
            .into_iter()
            .filter_map(|i| {
                let item = self.store.get(i)?;
                (!item.edit.is_deleted()).then(|| (i, item.path.clone()))
            })
            .collect();
        if targets.is_empty() {
            return;
        }
        self.prefetch.request(PrefetchRequest {
            focus: self.focus,
            targets,
        });
    }

    /// Apply up to `limit` queued events of the current, running crawl.
    fn fold_crawl_events(&mut self, limit: usize, summary: &mut PumpSummary) {
        for event in self.event_rx.try_iter().take(limit) {
            if event.generation() != self.generation || self.crawl_status != CrawlStatus::Running {
                continue;
            }
            match event {
                CrawlEvent::Discovered { path, .. } => {
                    self.store.push(path);
                    summary.discovered += 1;
                }
                CrawlEvent::Finished {
                    discovered,
                    skipped,
                    ..
                } => {
                    self.crawl_status = CrawlStatus::Finished {
                        discovered,
                        skipped,
                    };
                    summary.finished = true;
                }
            }
        }
    }

    /// New items inside the focus window need decoding too.
    fn prefetch_new_items(&self, old_len: usize, summary: &PumpSummary) {
        if summary.discovered > 0 && old_len <= self.focus.saturating_add(self.prefetch_radius) {
            self.request_prefetch();
        }
    }

    fn stop_crawler(&mut self) {
        if let Some(mut crawler) = self.crawler.take() {
            crawler.cancel();
            crawler.join();
        }
    }

    fn drain_events(&self) {
        let dropped = self.event_rx.try_iter().count();
        if dropped > 0 {
            debug!(dropped, "Discarded queued crawl events");
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
