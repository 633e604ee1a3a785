use std::path::PathBuf;

use clap::Parser;
use directories::UserDirs;

use crate::prefetch::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_MAX_MEMORY_MB};
use crate::prefetch::DEFAULT_PREFETCH_RADIUS;
use crate::recent::DEFAULT_RECENT_CAPACITY;

/// Default bound of the crawl event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Largest accepted prefetch radius. Each step costs two full decodes.
const MAX_PREFETCH_RADIUS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory to crawl at startup. `None` falls back to [`default_root`].
    pub root: Option<PathBuf>,
    pub prefetch_radius: usize,
    pub cache_entries: usize,
    pub cache_mb: usize,
    pub recent_capacity: usize,
    pub event_capacity: usize,
}

impl Config {
    /// Root to crawl first: the configured one or the platform default.
    pub fn start_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(default_root)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            prefetch_radius: DEFAULT_PREFETCH_RADIUS,
            cache_entries: DEFAULT_MAX_ENTRIES,
            cache_mb: DEFAULT_MAX_MEMORY_MB,
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// The user's picture directory, else home, else the working directory.
pub fn default_root() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| {
            dirs.picture_dir()
                .map(PathBuf::from)
                .or_else(|| Some(dirs.home_dir().to_path_buf()))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Parser, Debug)]
#[command(
    name = "photo-organizer",
    version,
    about = "Walk a photo tree one image at a time and rename, move or trash each"
)]
/// Command-line arguments accepted by the `photo-organizer` binary.
pub struct Cli {
    #[arg(
        value_name = "ROOT",
        help = "Directory to crawl (default: pictures directory, then home)"
    )]
    pub root: Option<PathBuf>,
    #[arg(
        long,
        value_name = "N",
        env = "PHOTO_ORGANIZER_PREFETCH_RADIUS",
        default_value_t = DEFAULT_PREFETCH_RADIUS,
        help = "Images decoded ahead on each side of the current one"
    )]
    pub prefetch_radius: usize,
    #[arg(
        long,
        value_name = "MB",
        env = "PHOTO_ORGANIZER_CACHE_MB",
        default_value_t = DEFAULT_MAX_MEMORY_MB,
        help = "Memory budget for decoded images, clamped to 16..=4096"
    )]
    pub cache_mb: usize,
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_MAX_ENTRIES,
        help = "Maximum number of decoded images kept"
    )]
    pub cache_entries: usize,
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_RECENT_CAPACITY,
        help = "Number of recent destination directories remembered"
    )]
    pub recent_capacity: usize,
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_EVENT_CAPACITY,
        help = "Bound of the crawler event queue"
    )]
    pub event_capacity: usize,
}

impl Cli {
    pub fn into_config(self) -> Config {
        Config {
            root: self.root,
            prefetch_radius: self.prefetch_radius.min(MAX_PREFETCH_RADIUS),
            cache_entries: self.cache_entries.max(1),
            cache_mb: self.cache_mb,
            recent_capacity: self.recent_capacity.max(1),
            event_capacity: self.event_capacity.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config_default() {
        let config = Cli::parse_from(["photo-organizer"]).into_config();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_flags_and_root() {
        let config = Cli::parse_from([
            "photo-organizer",
            "--prefetch-radius",
            "3",
            "--cache-mb",
            "512",
            "--cache-entries",
            "10",
            "--recent-capacity",
            "5",
            "/tmp/pics",
        ])
        .into_config();
        assert_eq!(config.root, Some(PathBuf::from("/tmp/pics")));
        assert_eq!(config.prefetch_radius, 3);
        assert_eq!(config.cache_mb, 512);
        assert_eq!(config.cache_entries, 10);
        assert_eq!(config.recent_capacity, 5);
        assert_eq!(config.start_root(), PathBuf::from("/tmp/pics"));
    }

    #[test]
    fn test_values_are_clamped() {
        let config = Cli::parse_from([
            "photo-organizer",
            "--prefetch-radius",
            "1000",
            "--cache-entries",
            "0",
            "--event-capacity",
            "0",
        ])
        .into_config();
        assert_eq!(config.prefetch_radius, MAX_PREFETCH_RADIUS);
        assert_eq!(config.cache_entries, 1);
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn test_default_root_is_not_empty() {
        assert!(!default_root().as_os_str().is_empty());
    }
}
