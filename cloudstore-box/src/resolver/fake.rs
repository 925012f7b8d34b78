use std::sync::Mutex;

use cloudstore_core::CloudStorageError;
use reqwest::StatusCode;

use crate::api::RemoteItems;
use crate::models::{BoxItem, BoxItemType, ItemCollection, ROOT_FOLDER_ID};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub get_folder: usize,
    pub list: usize,
    pub get_file: usize,
    pub create: usize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.get_folder + self.list + self.get_file + self.create
    }
}

struct Node {
    id: String,
    parent_id: String,
    name: String,
    item_type: BoxItemType,
}

#[derive(Default)]
struct State {
    nodes: Vec<Node>,
    calls: Calls,
    created: Vec<(String, String)>,
    failing_name: Option<String>,
    stall_after_first_page: bool,
}

/// In-memory folder tree that counts every call made against it.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<State>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_folder(&self, parent_id: &str, name: &str) -> String {
        self.add(parent_id, name, BoxItemType::Folder)
    }

    pub fn add_file(&self, parent_id: &str, name: &str) -> String {
        self.add(parent_id, name, BoxItemType::File)
    }

    pub fn add_web_link(&self, parent_id: &str, name: &str) -> String {
        self.add(parent_id, name, BoxItemType::Other)
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls
    }

    /// `(parent_id, name)` of every folder created, in order.
    pub fn created(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn fail_creation_of(&self, name: &str) {
        self.state.lock().unwrap().failing_name = Some(name.to_string());
    }

    /// Listing requests past the first page never complete.
    pub fn stall_after_first_page(&self) {
        self.state.lock().unwrap().stall_after_first_page = true;
    }

    fn add(&self, parent_id: &str, name: &str, item_type: BoxItemType) -> String {
        let mut state = self.state.lock().unwrap();
        let id = (state.nodes.len() + 1).to_string();
        state.nodes.push(Node {
            id: id.clone(),
            parent_id: parent_id.to_string(),
            name: name.to_string(),
            item_type,
        });
        id
    }

    fn find(state: &State, id: &str, item_type: BoxItemType) -> Option<BoxItem> {
        if id == ROOT_FOLDER_ID {
            return (item_type == BoxItemType::Folder).then(BoxItem::root);
        }
        state
            .nodes
            .iter()
            .find(|node| node.id == id && node.item_type == item_type)
            .map(to_item)
    }
}

fn to_item(node: &Node) -> BoxItem {
    BoxItem {
        item_type: node.item_type,
        id: node.id.clone(),
        name: node.name.clone(),
        ..BoxItem::root()
    }
}

fn not_found(id: &str) -> CloudStorageError {
    CloudStorageError::ItemNotFound(format!("no item {id}"))
}

impl RemoteItems for FakeRemote {
    async fn get_folder(&self, id: &str) -> Result<BoxItem, CloudStorageError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.calls.get_folder += 1;
        Self::find(&state, id, BoxItemType::Folder).ok_or_else(|| not_found(id))
    }

    async fn list_folder_items(
        &self,
        id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<ItemCollection, CloudStorageError> {
        tokio::task::yield_now().await;
        let stall = {
            let mut state = self.state.lock().unwrap();
            state.calls.list += 1;
            state.stall_after_first_page && offset > 0
        };
        if stall {
            std::future::pending::<()>().await;
        }

        let state = self.state.lock().unwrap();
        if Self::find(&state, id, BoxItemType::Folder).is_none() {
            return Err(not_found(id));
        }
        let children: Vec<&Node> = state.nodes.iter().filter(|node| node.parent_id == id).collect();
        let entries = children
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|node| to_item(node))
            .collect();
        Ok(ItemCollection {
            total_count: children.len() as u64,
            entries,
            offset: Some(offset),
            limit: Some(limit.into()),
        })
    }

    async fn get_file(&self, id: &str) -> Result<BoxItem, CloudStorageError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.calls.get_file += 1;
        Self::find(&state, id, BoxItemType::File).ok_or_else(|| not_found(id))
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<BoxItem, CloudStorageError> {
        tokio::task::yield_now().await;
        {
            let mut state = self.state.lock().unwrap();
            state.calls.create += 1;
            if state.failing_name.as_deref() == Some(name) {
                return Err(CloudStorageError::RequestFailed {
                    status: Some(StatusCode::INTERNAL_SERVER_ERROR),
                    message: "injected failure".to_string(),
                });
            }
            let taken = state
                .nodes
                .iter()
                .any(|node| node.parent_id == parent_id && node.name == name);
            if taken {
                return Err(CloudStorageError::RequestFailed {
                    status: Some(StatusCode::CONFLICT),
                    message: format!("item_name_in_use: {name}"),
                });
            }
            state.created.push((parent_id.to_string(), name.to_string()));
        }
        let id = self.add_folder(parent_id, name);
        Ok(BoxItem {
            item_type: BoxItemType::Folder,
            id,
            name: name.to_string(),
            ..BoxItem::root()
        })
    }
}
