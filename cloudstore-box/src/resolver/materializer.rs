use cloudstore_core::{CloudStorageError, ItemKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::ItemType;
use super::cache::{CacheEntry, PathCache, PathKey};
use crate::api::RemoteItems;
use crate::models::BoxItem;

/// Creates `key`'s segments from `first_missing` onwards under `ancestor`, left to
/// right, caching each folder before creating the next.
///
/// Cancellation is honoured between levels only: a creation request already in
/// flight completes so the cache never lags behind what exists remotely.
pub async fn materialize<R>(
    remote: &R,
    cache: &PathCache,
    ancestor: &CacheEntry,
    key: &PathKey,
    first_missing: usize,
    target: ItemType,
    cancel: &CancellationToken,
) -> Result<BoxItem, CloudStorageError>
where
    R: RemoteItems + ?Sized,
{
    if target != ItemType::Folder {
        return Err(CloudStorageError::Unsupported(format!(
            "cannot create {key}: only folders can be created along a path"
        )));
    }
    let segments = key.segments();
    if first_missing >= segments.len() {
        return Err(CloudStorageError::InvalidArgument(format!(
            "nothing to create for {key}"
        )));
    }
    if !ancestor.is_folder {
        return Err(CloudStorageError::WrongItemType {
            path: key.prefix(first_missing).to_remote_path(),
            expected: ItemKind::Folder,
        });
    }

    let mut path = key.prefix(first_missing);
    let mut parent_id = ancestor.id.clone();
    let mut created = None;
    for segment in &segments[first_missing..] {
        if cancel.is_cancelled() {
            return Err(CloudStorageError::Cancelled);
        }
        path = path.child(segment);
        let folder = remote.create_folder(&parent_id, segment).await?;
        info!(path = %path, id = %folder.id, "created folder");
        cache.insert(path.clone(), CacheEntry::folder(folder.id.clone()));
        parent_id = folder.id.clone();
        created = Some(folder);
    }

    created.ok_or_else(|| CloudStorageError::InvalidArgument(format!("nothing to create for {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::cache::Lookup;
    use crate::resolver::fake::FakeRemote;

    #[tokio::test]
    async fn creates_remaining_folders_in_order_and_caches_each() {
        let remote = FakeRemote::new();
        let x = remote.add_folder("0", "x");
        let cache = PathCache::new();
        let key = PathKey::normalize("x/y/z");

        let item = materialize(
            &remote,
            &cache,
            &CacheEntry::folder(x.clone()),
            &key,
            1,
            ItemType::Folder,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let created = remote.created();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0], (x, "y".to_string()));
        let y = match cache.lookup(&PathKey::normalize("x/y")) {
            Lookup::Hit(entry) => entry.id,
            other => panic!("expected cached folder, got {other:?}"),
        };
        assert_eq!(created[1], (y, "z".to_string()));
        assert_eq!(item.name, "z");
        assert_eq!(
            cache.lookup(&key),
            Lookup::Hit(CacheEntry::folder(item.id.clone()))
        );
    }

    #[tokio::test]
    async fn promotes_a_tombstone_for_the_created_folder() {
        let remote = FakeRemote::new();
        let cache = PathCache::new();
        cache.mark_absent(PathKey::normalize("new"));

        let item = materialize(
            &remote,
            &cache,
            &CacheEntry::root(),
            &PathKey::normalize("new"),
            0,
            ItemType::Folder,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            cache.lookup(&PathKey::normalize("new")),
            Lookup::Hit(CacheEntry::folder(item.id))
        );
    }

    #[tokio::test]
    async fn refuses_to_create_files() {
        let remote = FakeRemote::new();
        let cache = PathCache::new();

        let err = materialize(
            &remote,
            &cache,
            &CacheEntry::root(),
            &PathKey::normalize("a.txt"),
            0,
            ItemType::File,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CloudStorageError::Unsupported(_)));
        assert_eq!(remote.calls().create, 0);
    }

    #[tokio::test]
    async fn failure_partway_keeps_what_was_created() {
        let remote = FakeRemote::new();
        remote.fail_creation_of("b");
        let cache = PathCache::new();

        let err = materialize(
            &remote,
            &cache,
            &CacheEntry::root(),
            &PathKey::normalize("a/b/c"),
            0,
            ItemType::Folder,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CloudStorageError::RequestFailed { .. }));
        assert!(matches!(cache.lookup(&PathKey::normalize("a")), Lookup::Hit(_)));
        assert_eq!(cache.lookup(&PathKey::normalize("a/b")), Lookup::Unknown);
        assert_eq!(remote.calls().create, 2);
    }

    #[tokio::test]
    async fn stops_between_levels_once_cancelled() {
        let remote = FakeRemote::new();
        let cache = PathCache::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = materialize(
            &remote,
            &cache,
            &CacheEntry::root(),
            &PathKey::normalize("a/b"),
            0,
            ItemType::Folder,
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CloudStorageError::Cancelled));
        assert_eq!(remote.calls().create, 0);
    }
}
