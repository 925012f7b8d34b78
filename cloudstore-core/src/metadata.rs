use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::File => f.write_str("file"),
            ItemKind::Folder => f.write_str("folder"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileMetaData {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FolderMetaData {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    /// `None` when the listing was not requested.
    #[serde(default)]
    pub folders: Option<Vec<FolderMetaData>>,
    #[serde(default)]
    pub files: Option<Vec<FileMetaData>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetaData {
    File(FileMetaData),
    Folder(FolderMetaData),
}

impl MetaData {
    pub fn kind(&self) -> ItemKind {
        match self {
            MetaData::File(_) => ItemKind::File,
            MetaData::Folder(_) => ItemKind::Folder,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == ItemKind::Folder
    }

    pub fn id(&self) -> &str {
        match self {
            MetaData::File(file) => &file.id,
            MetaData::Folder(folder) => &folder.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MetaData::File(file) => &file.name,
            MetaData::Folder(folder) => &folder.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            MetaData::File(file) => &file.path,
            MetaData::Folder(folder) => &folder.path,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            MetaData::File(file) => file.size,
            MetaData::Folder(folder) => folder.size,
        }
    }

    pub fn mark_deleted(&mut self) {
        match self {
            MetaData::File(file) => file.is_deleted = true,
            MetaData::Folder(folder) => folder.is_deleted = true,
        }
    }
}

/// Square thumbnail buckets shared by all providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailSize {
    Small,
    MediumSmall,
    Medium,
    MediumLarge,
    Large,
    ExtraLarge,
}

impl ThumbnailSize {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "small" => Some(ThumbnailSize::Small),
            "medium-small" | "mediumsmall" => Some(ThumbnailSize::MediumSmall),
            "medium" => Some(ThumbnailSize::Medium),
            "medium-large" | "mediumlarge" => Some(ThumbnailSize::MediumLarge),
            "large" => Some(ThumbnailSize::Large),
            "extra-large" | "extralarge" => Some(ThumbnailSize::ExtraLarge),
            _ => None,
        }
    }
}

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Renders a byte count as e.g. `1.5KB`, keeping at most two decimals.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < SIZE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    let rendered = format!("{value:.2}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{rendered}{}", SIZE_UNITS[unit])
}
