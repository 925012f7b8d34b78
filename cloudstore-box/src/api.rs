use std::future::Future;
use std::sync::Arc;

use cloudstore_core::{
    AuthorizedTransport, CloudStorageError, ItemKind, ensure_success, handle_response,
    with_trailing_slash,
};
use reqwest::multipart::{Form, Part};
use tracing::debug;
use url::Url;

use crate::models::{BoxItem, ItemCollection, NameAndParent};

pub const DEFAULT_API_BASE_URL: &str = "https://api.box.com/2.0/";
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://upload.box.com/api/2.0/";

/// ID-addressed item lookups the path resolver is built on.
pub trait RemoteItems: Send + Sync {
    fn get_folder(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<BoxItem, CloudStorageError>> + Send;

    fn list_folder_items(
        &self,
        id: &str,
        limit: u32,
        offset: u64,
    ) -> impl Future<Output = Result<ItemCollection, CloudStorageError>> + Send;

    fn get_file(&self, id: &str)
    -> impl Future<Output = Result<BoxItem, CloudStorageError>> + Send;

    /// Not idempotent: the remote rejects a second folder with the same name.
    fn create_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<BoxItem, CloudStorageError>> + Send;
}

/// Drains every page of a folder listing starting at `initial_offset`.
pub async fn list_all_items<R>(
    remote: &R,
    folder_id: &str,
    page_size: u32,
    initial_offset: u64,
) -> Result<Vec<BoxItem>, CloudStorageError>
where
    R: RemoteItems + ?Sized,
{
    let page_size = page_size.max(1);
    let mut offset = initial_offset;
    let mut items = Vec::new();
    loop {
        let page = remote
            .list_folder_items(folder_id, page_size, offset)
            .await?;
        let received = page.entries.len() as u64;
        offset = offset.saturating_add(received);
        let total = page.total_count;
        items.extend(page.entries);
        if received == 0 || offset >= total {
            break;
        }
    }
    Ok(items)
}

#[derive(Clone)]
pub struct BoxApi {
    transport: Arc<AuthorizedTransport>,
    api_base: Url,
    upload_base: Url,
}

impl BoxApi {
    pub fn new(transport: Arc<AuthorizedTransport>) -> Result<Self, CloudStorageError> {
        Self::with_base_urls(transport, DEFAULT_API_BASE_URL, DEFAULT_UPLOAD_BASE_URL)
    }

    pub fn with_base_urls(
        transport: Arc<AuthorizedTransport>,
        api_base: &str,
        upload_base: &str,
    ) -> Result<Self, CloudStorageError> {
        Ok(Self {
            transport,
            api_base: Url::parse(&with_trailing_slash(api_base))?,
            upload_base: Url::parse(&with_trailing_slash(upload_base))?,
        })
    }

    pub fn transport(&self) -> &Arc<AuthorizedTransport> {
        &self.transport
    }

    pub async fn delete_folder(&self, id: &str, recursive: bool) -> Result<(), CloudStorageError> {
        let mut url = self.endpoint(&format!("folders/{id}"))?;
        url.query_pairs_mut()
            .append_pair("recursive", if recursive { "true" } else { "false" });
        let response = self.transport.send(|http| http.delete(url.clone())).await?;
        ensure_success(response)
            .await
            .map_err(|err| describe_not_found(err, "folder", id))?;
        Ok(())
    }

    /// `etag` guards against deleting a file that changed since it was read.
    pub async fn delete_file(&self, id: &str, etag: Option<&str>) -> Result<(), CloudStorageError> {
        let url = self.endpoint(&format!("files/{id}"))?;
        let response = self
            .transport
            .send(|http| with_if_match(http.delete(url.clone()), etag))
            .await?;
        ensure_success(response)
            .await
            .map_err(|err| describe_not_found(err, "file", id))?;
        Ok(())
    }

    pub async fn copy_item(
        &self,
        kind: ItemKind,
        id: &str,
        name: &str,
        parent_id: &str,
    ) -> Result<BoxItem, CloudStorageError> {
        let url = self.endpoint(&format!("{}/{id}/copy", collection(kind)))?;
        let body = NameAndParent::new(name, parent_id);
        debug!(%kind, id, parent_id, name, "copying item");
        self.transport
            .send_json(|http| http.post(url.clone()).json(&body))
            .await
    }

    /// Re-parents and renames in a single update.
    pub async fn move_item(
        &self,
        kind: ItemKind,
        id: &str,
        name: &str,
        parent_id: &str,
    ) -> Result<BoxItem, CloudStorageError> {
        let url = self.endpoint(&format!("{}/{id}", collection(kind)))?;
        let body = NameAndParent::new(name, parent_id);
        debug!(%kind, id, parent_id, name, "moving item");
        self.transport
            .send_json(|http| http.put(url.clone()).json(&body))
            .await
    }

    pub async fn download(&self, id: &str) -> Result<Vec<u8>, CloudStorageError> {
        let url = self.endpoint(&format!("files/{id}/content"))?;
        let response = self.transport.send(|http| http.get(url.clone())).await?;
        let response = ensure_success(response)
            .await
            .map_err(|err| describe_not_found(err, "file", id))?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn upload_new(
        &self,
        parent_id: &str,
        name: &str,
        data: Vec<u8>,
    ) -> Result<BoxItem, CloudStorageError> {
        let url = self.upload_base.join("files/content")?;
        let attributes = serde_json::to_string(&NameAndParent::new(name, parent_id))
            .map_err(|err| CloudStorageError::InvalidArgument(err.to_string()))?;
        debug!(parent_id, name, bytes = data.len(), "uploading new file");
        let uploaded: ItemCollection = self
            .transport
            .send_json(|http| {
                let form = Form::new()
                    .text("attributes", attributes.clone())
                    .part("file", Part::bytes(data.clone()).file_name(name.to_string()));
                http.post(url.clone()).multipart(form)
            })
            .await?;
        first_entry(uploaded)
    }

    pub async fn upload_version(
        &self,
        id: &str,
        etag: Option<&str>,
        name: &str,
        data: Vec<u8>,
    ) -> Result<BoxItem, CloudStorageError> {
        let url = self.upload_base.join(&format!("files/{id}/content"))?;
        debug!(id, name, bytes = data.len(), "uploading new file version");
        let uploaded: ItemCollection = self
            .transport
            .send_json(|http| {
                let form = Form::new()
                    .part("file", Part::bytes(data.clone()).file_name(name.to_string()));
                with_if_match(http.post(url.clone()), etag).multipart(form)
            })
            .await?;
        first_entry(uploaded)
    }

    /// PNG thumbnail bounded by `max_px` in both dimensions, if given.
    pub async fn thumbnail(&self, id: &str, max_px: Option<u32>) -> Result<Vec<u8>, CloudStorageError> {
        let mut url = self.endpoint(&format!("files/{id}/thumbnail.png"))?;
        if let Some(px) = max_px {
            url.query_pairs_mut()
                .append_pair("max_height", &px.to_string())
                .append_pair("max_width", &px.to_string());
        }
        let response = self.transport.send(|http| http.get(url.clone())).await?;
        let response = ensure_success(response)
            .await
            .map_err(|err| describe_not_found(err, "file", id))?;
        Ok(response.bytes().await?.to_vec())
    }

    fn endpoint(&self, path: &str) -> Result<Url, CloudStorageError> {
        Ok(self.api_base.join(path)?)
    }
}

impl RemoteItems for BoxApi {
    async fn get_folder(&self, id: &str) -> Result<BoxItem, CloudStorageError> {
        let url = self.endpoint(&format!("folders/{id}"))?;
        debug!(id, "fetching folder");
        let response = self.transport.send(|http| http.get(url.clone())).await?;
        handle_response(response)
            .await
            .map_err(|err| describe_not_found(err, "folder", id))
    }

    async fn list_folder_items(
        &self,
        id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<ItemCollection, CloudStorageError> {
        let mut url = self.endpoint(&format!("folders/{id}/items"))?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        debug!(id, limit, offset, "listing folder");
        let response = self.transport.send(|http| http.get(url.clone())).await?;
        handle_response(response)
            .await
            .map_err(|err| describe_not_found(err, "folder", id))
    }

    async fn get_file(&self, id: &str) -> Result<BoxItem, CloudStorageError> {
        let url = self.endpoint(&format!("files/{id}"))?;
        debug!(id, "fetching file");
        let response = self.transport.send(|http| http.get(url.clone())).await?;
        handle_response(response)
            .await
            .map_err(|err| describe_not_found(err, "file", id))
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<BoxItem, CloudStorageError> {
        let url = self.endpoint("folders")?;
        let body = NameAndParent::new(name, parent_id);
        self.transport
            .send_json(|http| http.post(url.clone()).json(&body))
            .await
    }
}

fn collection(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::File => "files",
        ItemKind::Folder => "folders",
    }
}

fn with_if_match(request: reqwest::RequestBuilder, etag: Option<&str>) -> reqwest::RequestBuilder {
    match etag {
        Some(etag) => request.header("If-Match", etag),
        None => request,
    }
}

fn first_entry(collection: ItemCollection) -> Result<BoxItem, CloudStorageError> {
    collection
        .entries
        .into_iter()
        .next()
        .ok_or_else(|| CloudStorageError::RequestFailed {
            status: None,
            message: "upload response carried no file entry".to_string(),
        })
}

fn describe_not_found(err: CloudStorageError, what: &str, id: &str) -> CloudStorageError {
    match err {
        CloudStorageError::ItemNotFound(_) => {
            CloudStorageError::ItemNotFound(format!("could not find {what} {id}"))
        }
        other => other,
    }
}
