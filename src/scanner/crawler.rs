//! Background directory crawler.
//!
//! Walks a root directory with walkdir on its own thread and streams every
//! accepted image path to the coordinator over a bounded flume channel.
//! Cancellation is cooperative: the flag is checked around every emission, and
//! once it is observed set the crawler emits nothing further, not even
//! `Finished`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{SendTimeoutError, Sender};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use crate::models::has_accepted_extension;

/// How long a send may block on a full channel before re-checking the
/// cancellation flag.
const SEND_RETRY: Duration = Duration::from_millis(50);

/// Events delivered from the crawler thread to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    /// An accepted image file was found.
    Discovered { generation: u64, path: PathBuf },
    /// The walk ran to completion. Always the last event of a generation.
    Finished {
        generation: u64,
        discovered: usize,
        skipped: usize,
    },
}

impl CrawlEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Discovered { generation, .. } | Self::Finished { generation, .. } => *generation,
        }
    }
}

/// How a crawl ended, as seen from the crawler thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    Completed { discovered: usize, skipped: usize },
    Cancelled { discovered: usize },
    /// The coordinator dropped its receiver.
    Disconnected,
}

enum SendStatus {
    Sent,
    Cancelled,
    Disconnected,
}

/// Handle to a running crawl.
pub struct Crawler {
    generation: u64,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<CrawlOutcome>>,
}

impl Crawler {
    /// Start crawling `root` on a new thread.
    pub fn spawn(root: PathBuf, generation: u64, tx: Sender<CrawlEvent>) -> std::io::Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);

        let handle = thread::Builder::new()
            .name(format!("crawler-{}", generation))
            .spawn(move || crawl(&root, generation, &tx, &thread_cancel))?;

        debug!(generation, "Started crawler");

        Ok(Self {
            generation,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask the crawler to stop. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// True once the crawler thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the crawler thread to exit.
    pub fn join(&mut self) -> Option<CrawlOutcome> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(outcome) => {
                debug!(generation = self.generation, ?outcome, "Crawler exited");
                Some(outcome)
            }
            Err(_) => {
                warn!(generation = self.generation, "Crawler thread panicked");
                None
            }
        }
    }
}

impl Drop for Crawler {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel();
            self.join();
        }
    }
}

/// Walk `root` synchronously, sending events on `tx`.
///
/// Unreadable directories and entries are logged and skipped.
pub fn crawl(
    root: &Path,
    generation: u64,
    tx: &Sender<CrawlEvent>,
    cancel: &AtomicBool,
) -> CrawlOutcome {
    info!(?root, generation, "Starting crawl");

    let mut discovered = 0;
    let mut skipped = 0;

    for entry in WalkDir::new(root).follow_links(false) {
        if cancel.load(Ordering::SeqCst) {
            return cancelled(generation, discovered);
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = ?err.path(), error = %err, "Skipping unreadable entry");
                skipped += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_accepted_extension(entry.path()) {
            continue;
        }

        trace!(path = ?entry.path(), "Discovered image");
        let event = CrawlEvent::Discovered {
            generation,
            path: entry.into_path(),
        };
        match send_event(tx, event, cancel) {
            SendStatus::Sent => discovered += 1,
            SendStatus::Cancelled => return cancelled(generation, discovered),
            SendStatus::Disconnected => return CrawlOutcome::Disconnected,
        }

        if cancel.load(Ordering::SeqCst) {
            return cancelled(generation, discovered);
        }
    }

    let finished = CrawlEvent::Finished {
        generation,
        discovered,
        skipped,
    };
    match send_event(tx, finished, cancel) {
        SendStatus::Sent => {
            info!(generation, discovered, skipped, "Crawl complete");
            CrawlOutcome::Completed {
                discovered,
                skipped,
            }
        }
        SendStatus::Cancelled => cancelled(generation, discovered),
        SendStatus::Disconnected => CrawlOutcome::Disconnected,
    }
}

fn cancelled(generation: u64, discovered: usize) -> CrawlOutcome {
    info!(generation, discovered, "Crawl cancelled");
    CrawlOutcome::Cancelled { discovered }
}

/// Send on a bounded channel without ever outliving a cancellation request.
fn send_event(tx: &Sender<CrawlEvent>, mut event: CrawlEvent, cancel: &AtomicBool) -> SendStatus {
    loop {
        if cancel.load(Ordering::SeqCst) {
            return SendStatus::Cancelled;
        }
        match tx.send_timeout(event, SEND_RETRY) {
            Ok(()) => return SendStatus::Sent,
            Err(SendTimeoutError::Timeout(returned)) => event = returned,
            Err(SendTimeoutError::Disconnected(_)) => return SendStatus::Disconnected,
        }
    }
}
