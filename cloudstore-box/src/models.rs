use cloudstore_core::{
    CloudStorageError, FileMetaData, FolderMetaData, ItemKind, MetaData, ThumbnailSize,
};
use serde::{Deserialize, Serialize};

pub const ROOT_FOLDER_ID: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxItemType {
    File,
    Folder,
    /// Web links and any type this client does not model.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoxItem {
    #[serde(rename = "type")]
    pub item_type: BoxItemType,
    pub id: String,
    #[serde(default)]
    pub sequence_id: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub modified_at: Option<String>,
    #[serde(default)]
    pub trashed_at: Option<String>,
    #[serde(default)]
    pub path_collection: Option<PathCollection>,
    #[serde(default)]
    pub parent: Option<PathEntry>,
    #[serde(default)]
    pub item_status: Option<String>,
    /// Present on folder responses; may hold only the first page of children.
    #[serde(default)]
    pub item_collection: Option<ItemCollection>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ItemCollection {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub entries: Vec<BoxItem>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl ItemCollection {
    pub fn is_complete(&self) -> bool {
        self.entries.len() as u64 >= self.total_count
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathCollection {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub entries: Vec<PathEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ParentRef<'a> {
    pub id: &'a str,
}

/// Body shared by folder creation, copy, update and upload attributes.
#[derive(Debug, Serialize)]
pub(crate) struct NameAndParent<'a> {
    pub name: &'a str,
    pub parent: ParentRef<'a>,
}

impl<'a> NameAndParent<'a> {
    pub fn new(name: &'a str, parent_id: &'a str) -> Self {
        Self {
            name,
            parent: ParentRef { id: parent_id },
        }
    }
}

impl BoxItem {
    /// The account root as a folder item, without any remote call.
    pub fn root() -> Self {
        Self {
            item_type: BoxItemType::Folder,
            id: ROOT_FOLDER_ID.to_string(),
            sequence_id: None,
            etag: None,
            sha1: None,
            name: String::new(),
            description: None,
            size: None,
            created_at: None,
            modified_at: None,
            trashed_at: None,
            path_collection: None,
            parent: None,
            item_status: None,
            item_collection: None,
        }
    }

    pub fn kind(&self) -> Option<ItemKind> {
        match self.item_type {
            BoxItemType::File => Some(ItemKind::File),
            BoxItemType::Folder => Some(ItemKind::Folder),
            BoxItemType::Other => None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.item_type == BoxItemType::Folder
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_FOLDER_ID
    }

    pub fn is_deleted(&self) -> bool {
        self.item_status
            .as_deref()
            .is_some_and(|status| matches!(status, "deleted" | "trashed"))
    }

    /// Absolute path built from `path_collection`, whose first entry is the root.
    pub fn remote_path(&self) -> Option<String> {
        if self.is_root() {
            return Some("/".to_string());
        }
        let collection = self.path_collection.as_ref()?;
        let mut path = String::from("/");
        for entry in collection.entries.iter().skip(1) {
            path.push_str(&entry.name);
            path.push('/');
        }
        path.push_str(&self.name);
        Some(path)
    }

    /// Converts into provider-neutral metadata; `fallback_path` is used when the
    /// payload carries no `path_collection` (listing entries, fresh uploads).
    pub fn into_metadata(self, fallback_path: &str) -> Result<MetaData, CloudStorageError> {
        let path = self
            .remote_path()
            .unwrap_or_else(|| fallback_path.to_string());
        let is_deleted = self.is_deleted();
        match self.item_type {
            BoxItemType::File => Ok(MetaData::File(FileMetaData {
                id: self.id,
                name: self.name,
                path,
                size: self.size.unwrap_or(0),
                modified: self.modified_at,
                version: self.etag,
                sha1: self.sha1,
                is_deleted,
            })),
            BoxItemType::Folder => {
                let name = if self.id == ROOT_FOLDER_ID {
                    String::new()
                } else {
                    self.name
                };
                let (folders, files) = match self.item_collection {
                    Some(collection) => {
                        let (folders, files) = split_children(collection.entries, &path);
                        (Some(folders), Some(files))
                    }
                    None => (None, None),
                };
                Ok(MetaData::Folder(FolderMetaData {
                    id: self.id,
                    name,
                    path,
                    size: self.size.unwrap_or(0),
                    modified: self.modified_at,
                    is_deleted,
                    folders,
                    files,
                }))
            }
            BoxItemType::Other => Err(CloudStorageError::Unsupported(format!(
                "item '{}' is neither a file nor a folder",
                self.name
            ))),
        }
    }
}

fn split_children(entries: Vec<BoxItem>, parent_path: &str) -> (Vec<FolderMetaData>, Vec<FileMetaData>) {
    let mut folders = Vec::new();
    let mut files = Vec::new();
    for entry in entries {
        let path = child_path(parent_path, &entry.name);
        // Children are reported with their own path, not the parent's path_collection.
        let entry = BoxItem {
            path_collection: None,
            ..entry
        };
        match entry.into_metadata(&path) {
            Ok(MetaData::Folder(folder)) => folders.push(folder),
            Ok(MetaData::File(file)) => files.push(file),
            Err(_) => {}
        }
    }
    (folders, files)
}

pub fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Box renders square thumbnails; the size is used for both max width and height.
pub fn thumbnail_pixels(size: ThumbnailSize) -> u32 {
    match size {
        ThumbnailSize::Small => 32,
        ThumbnailSize::MediumSmall => 64,
        ThumbnailSize::Medium => 128,
        ThumbnailSize::MediumLarge => 256,
        ThumbnailSize::Large => 640,
        ThumbnailSize::ExtraLarge => 1024,
    }
}
