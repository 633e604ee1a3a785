//! Hands a photo to the desktop's default image viewer.

use std::io;
use std::path::Path;

pub trait ItemOpener {
    fn open(&self, path: &Path) -> io::Result<()>;
}

/// Uses the platform opener (`xdg-open`, `open`, `start`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl ItemOpener for SystemOpener {
    fn open(&self, path: &Path) -> io::Result<()> {
        ::opener::open(path).map_err(|e| io::Error::other(e.to_string()))
    }
}
