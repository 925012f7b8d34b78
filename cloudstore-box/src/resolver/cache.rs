use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::models::ROOT_FOLDER_ID;

/// Canonical cache key: no leading or trailing `/`, segments joined by a single `/`.
///
/// Comparison is exact and case-sensitive. The empty key is the root folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathKey(String);

impl PathKey {
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Strips surrounding slashes and collapses empty segments (`"//a///b/"` becomes `"a/b"`).
    pub fn normalize(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        Self(segments.join("/"))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> Vec<&str> {
        if self.is_root() {
            Vec::new()
        } else {
            self.0.split('/').collect()
        }
    }

    /// `name` must be a single segment.
    pub fn child(&self, name: &str) -> Self {
        if self.is_root() {
            Self(name.to_string())
        } else {
            Self(format!("{}/{name}", self.0))
        }
    }

    /// The key made of the first `count` segments.
    pub fn prefix(&self, count: usize) -> Self {
        Self(self.segments().into_iter().take(count).collect::<Vec<_>>().join("/"))
    }

    /// Splits off the last segment; `None` for the root.
    pub fn split_last(&self) -> Option<(PathKey, &str)> {
        if self.is_root() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some((parent, name)) => Some((Self(parent.to_string()), name)),
            None => Some((Self::root(), self.0.as_str())),
        }
    }

    /// The absolute remote path, `/` for the root.
    pub fn to_remote_path(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub id: String,
    pub is_folder: bool,
}

impl CacheEntry {
    pub fn folder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_folder: true,
        }
    }

    pub fn file(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_folder: false,
        }
    }

    pub fn root() -> Self {
        Self::folder(ROOT_FOLDER_ID)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit(CacheEntry),
    KnownAbsent,
    Unknown,
}

#[derive(Debug, Clone)]
enum Slot {
    Present(CacheEntry),
    Absent,
}

/// Process-lifetime path to ID map.
///
/// Append-only: a concrete entry is never replaced. A tombstone may be promoted
/// once the item is created through this process.
#[derive(Debug, Default)]
pub struct PathCache {
    slots: Mutex<HashMap<PathKey, Slot>>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &PathKey) -> Lookup {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(key) {
            Some(Slot::Present(entry)) => Lookup::Hit(entry.clone()),
            Some(Slot::Absent) => Lookup::KnownAbsent,
            None => Lookup::Unknown,
        }
    }

    /// First writer wins. Returns whether the entry was stored.
    pub fn insert(&self, key: PathKey, entry: CacheEntry) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(&key) {
            Some(Slot::Present(_)) => false,
            Some(Slot::Absent) | None => {
                slots.insert(key, Slot::Present(entry));
                true
            }
        }
    }

    /// Records that nothing exists at `key`; ignored if the key is already known.
    pub fn mark_absent(&self, key: PathKey) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(&key) {
            return false;
        }
        slots.insert(key, Slot::Absent);
        true
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
