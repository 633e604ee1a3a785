//! Ordered, append-only collection of discovered items.
//!
//! Indices are stable from the moment an item is appended. Commit mutates
//! items in place and never reorders or removes them; deleted items keep their
//! slot with `EditState::Deleted`. The only way to shrink the store is
//! `clear`, used when a new crawl replaces the old one.

use std::path::{Path, PathBuf};

use crate::models::{ImageSize, Item};

#[derive(Debug, Default)]
pub struct ItemStore {
    items: Vec<Item>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a newly discovered file and returns its index.
    pub fn push(&mut self, path: PathBuf) -> usize {
        self.items.push(Item::new(path));
        self.items.len() - 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Item> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Item> {
        self.items.iter_mut()
    }

    /// Records decoded dimensions for the item at `index`.
    ///
    /// Ignored if the item has since been renamed away from `path`, so a late
    /// prefetch result can never land on the wrong file.
    pub fn set_known_size(&mut self, index: usize, path: &Path, size: ImageSize) -> bool {
        match self.items.get_mut(index) {
            Some(item) if item.path == path => {
                item.known_size = Some(size);
                true
            }
            _ => false,
        }
    }

    /// Indices in `[center - radius, center + radius]` that exist in the
    /// store, nearest to `center` first.
    pub fn window(&self, center: usize, radius: usize) -> Vec<usize> {
        if self.items.is_empty() || center >= self.items.len() {
            return Vec::new();
        }
        let start = center.saturating_sub(radius);
        let end = center.saturating_add(radius).min(self.items.len() - 1);
        let mut indices: Vec<usize> = (start..=end).collect();
        indices.sort_by_key(|i| i.abs_diff(center));
        indices
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: usize) -> ItemStore {
        let mut store = ItemStore::new();
        for i in 0..n {
            store.push(PathBuf::from(format!("/photos/{}.jpg", i)));
        }
        store
    }

    #[test]
    fn test_push_returns_stable_indices() {
        let mut store = ItemStore::new();
        assert_eq!(store.push(PathBuf::from("/a.jpg")), 0);
        assert_eq!(store.push(PathBuf::from("/b.jpg")), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).unwrap().path, PathBuf::from("/b.jpg"));
    }

    #[test]
    fn test_window_clamps_to_bounds() {
        let store = store_with(10);
        assert_eq!(store.window(0, 2), vec![0, 1, 2]);
        let mut mid = store.window(5, 2);
        mid.sort();
        assert_eq!(mid, vec![3, 4, 5, 6, 7]);
        let mut tail = store.window(9, 2);
        tail.sort();
        assert_eq!(tail, vec![7, 8, 9]);
        assert!(store.window(10, 2).is_empty());
        assert!(ItemStore::new().window(0, 2).is_empty());
    }

    #[test]
    fn test_window_orders_nearest_first() {
        let store = store_with(10);
        let window = store.window(5, 2);
        assert_eq!(window[0], 5);
        assert!(window[1..3].contains(&4) && window[1..3].contains(&6));
    }

    #[test]
    fn test_set_known_size_checks_path() {
        let mut store = store_with(2);
        let size = ImageSize::new(10, 20);
        assert!(store.set_known_size(0, Path::new("/photos/0.jpg"), size));
        assert_eq!(store.get(0).unwrap().known_size, Some(size));

        assert!(!store.set_known_size(1, Path::new("/photos/other.jpg"), size));
        assert_eq!(store.get(1).unwrap().known_size, None);
        assert!(!store.set_known_size(7, Path::new("/photos/7.jpg"), size));
    }
}
