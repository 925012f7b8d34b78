mod api;
mod client;
mod models;
pub mod resolver;

pub use api::{BoxApi, DEFAULT_API_BASE_URL, DEFAULT_UPLOAD_BASE_URL, RemoteItems, list_all_items};
pub use client::BoxClient;
pub use models::{
    BoxItem, BoxItemType, ItemCollection, PathCollection, PathEntry, ROOT_FOLDER_ID, child_path,
    thumbnail_pixels,
};
pub use resolver::{CacheEntry, ItemResolver, ItemType, Lookup, PathCache, PathKey, WalkResult};
