pub mod crawler;

pub use crawler::{CrawlEvent, CrawlOutcome, Crawler};
