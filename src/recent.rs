//! Most-recently-used destination directories.

use std::collections::VecDeque;

use thiserror::Error;

/// Default number of directories remembered.
pub const DEFAULT_RECENT_CAPACITY: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecentError {
    #[error("{0:?} is not in the recent list")]
    NotFound(String),
}

/// Bounded, duplicate-free list with the most recent entry at the tail.
#[derive(Debug, Clone)]
pub struct RecentDirectories {
    entries: VecDeque<String>,
    capacity: usize,
}

impl RecentDirectories {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a use of `dir`, moving it to the tail. Evicts the least recent
    /// entry when full.
    pub fn add(&mut self, dir: &str) {
        if let Some(pos) = self.entries.iter().position(|e| e == dir) {
            self.entries.remove(pos);
        }
        self.entries.push_back(dir.to_owned());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn remove(&mut self, dir: &str) -> Result<(), RecentError> {
        let pos = self
            .entries
            .iter()
            .position(|e| e == dir)
            .ok_or_else(|| RecentError::NotFound(dir.to_owned()))?;
        self.entries.remove(pos);
        Ok(())
    }

    /// The `n` most recent entries, least recent first.
    pub fn top(&self, n: usize) -> Vec<&str> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).map(String::as_str).collect()
    }

    /// Up to `n` entries starting with `prefix`, most recent first.
    pub fn suggestions(&self, prefix: &str, n: usize) -> Vec<&str> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.starts_with(prefix))
            .take(n)
            .map(String::as_str)
            .collect()
    }

    pub fn contains(&self, dir: &str) -> bool {
        self.entries.iter().any(|e| e == dir)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Least recent first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl Default for RecentDirectories {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_re_adding_moves_to_tail() {
        let mut recent = RecentDirectories::default();
        recent.add("a");
        recent.add("b");
        recent.add("a");
        assert_eq!(recent.top(2), vec!["b", "a"]);
        assert_eq!(recent.len(), 2);

        recent.add("b");
        assert_eq!(recent.top(2), vec!["a", "b"]);
    }

    #[test]
    fn test_top_larger_than_len() {
        let mut recent = RecentDirectories::default();
        recent.add("only");
        assert_eq!(recent.top(10), vec!["only"]);
        assert!(RecentDirectories::default().top(3).is_empty());
    }

    #[test]
    fn test_capacity_evicts_head() {
        let mut recent = RecentDirectories::new(3);
        for dir in ["a", "b", "c", "d"] {
            recent.add(dir);
        }
        assert_eq!(recent.iter().collect::<Vec<_>>(), vec!["b", "c", "d"]);
        assert!(!recent.contains("a"));
    }

    #[test]
    fn test_remove() {
        let mut recent = RecentDirectories::default();
        recent.add("a");
        recent.add("b");
        recent.add("c");
        recent.remove("b").unwrap();
        assert_eq!(recent.iter().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(
            recent.remove("zzz"),
            Err(RecentError::NotFound("zzz".into()))
        );
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_suggestions_filter_by_prefix_most_recent_first() {
        let mut recent = RecentDirectories::default();
        for dir in ["trips/alps", "pets", "trips/sea", "trash"] {
            recent.add(dir);
        }
        assert_eq!(recent.suggestions("tri", 5), vec!["trips/sea", "trips/alps"]);
        assert_eq!(recent.suggestions("tr", 2), vec!["trash", "trips/sea"]);
        assert_eq!(recent.suggestions("", 1), vec!["trash"]);
        assert!(recent.suggestions("x", 5).is_empty());
    }
}
