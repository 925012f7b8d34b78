use cloudstore_core::CloudStorageError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::{CacheEntry, Lookup, PathCache, PathKey};
use super::cancellable;
use crate::api::{RemoteItems, list_all_items};
use crate::models::{BoxItem, BoxItemType};

/// Outcome of walking a path from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkResult {
    /// Deepest item found on the path; `None` when not even the first segment exists.
    pub last_resolved: Option<CacheEntry>,
    pub fully_resolved: bool,
    /// Index of the first segment that could not be resolved, or the segment count.
    pub first_unresolved: usize,
}

impl WalkResult {
    fn partial(last_resolved: Option<CacheEntry>, first_unresolved: usize) -> Self {
        Self {
            last_resolved,
            fully_resolved: false,
            first_unresolved,
        }
    }

    /// The deepest resolved item, falling back to the root folder.
    pub fn ancestor(&self) -> CacheEntry {
        self.last_resolved.clone().unwrap_or_else(CacheEntry::root)
    }

    /// True when the walk ended because an intermediate segment is a file.
    pub fn stopped_at_file(&self) -> bool {
        !self.fully_resolved && self.last_resolved.as_ref().is_some_and(|entry| !entry.is_folder)
    }
}

/// Resolves `key` one level at a time, listing each uncached folder in full and
/// caching every child it returns.
///
/// Listings are only cached once every page has arrived, so a cancelled walk
/// leaves the cache exactly as the last completed level left it.
pub async fn walk<R>(
    remote: &R,
    cache: &PathCache,
    key: &PathKey,
    page_size: u32,
    cancel: &CancellationToken,
) -> Result<WalkResult, CloudStorageError>
where
    R: RemoteItems + ?Sized,
{
    let segments = key.segments();
    let mut parent = PathKey::root();
    let mut current = CacheEntry::root();
    let mut last_resolved = None;

    for (index, segment) in segments.iter().enumerate() {
        if !current.is_folder {
            return Ok(WalkResult::partial(last_resolved, index));
        }
        let path = parent.child(segment);
        let entry = match cache.lookup(&path) {
            Lookup::Hit(entry) => entry,
            Lookup::KnownAbsent => return Ok(WalkResult::partial(last_resolved, index)),
            Lookup::Unknown => {
                debug!(folder_id = %current.id, folder = %parent, "listing folder");
                let children =
                    cancellable(cancel, list_all_items(remote, &current.id, page_size, 0)).await?;
                cache_children(cache, &parent, children);
                match cache.lookup(&path) {
                    Lookup::Hit(entry) => entry,
                    Lookup::KnownAbsent | Lookup::Unknown => {
                        cache.mark_absent(path);
                        return Ok(WalkResult::partial(last_resolved, index));
                    }
                }
            }
        };
        parent = path;
        current = entry.clone();
        last_resolved = Some(entry);
    }

    Ok(WalkResult {
        last_resolved,
        fully_resolved: true,
        first_unresolved: segments.len(),
    })
}

fn cache_children(cache: &PathCache, parent: &PathKey, children: Vec<BoxItem>) {
    for child in children {
        let entry = match child.item_type {
            BoxItemType::Folder => CacheEntry::folder(child.id),
            BoxItemType::File => CacheEntry::file(child.id),
            BoxItemType::Other => {
                warn!(id = %child.id, name = %child.name, folder = %parent, "skipping listing entry of unsupported type");
                continue;
            }
        };
        cache.insert(parent.child(&child.name), entry);
    }
}
