use std::future::Future;

use url::Url;

use crate::error::CloudStorageError;
use crate::metadata::{MetaData, ThumbnailSize};

/// Path-addressed operations every provider client exposes.
///
/// Paths are slash-separated and rooted at the account's top-level folder;
/// leading and trailing slashes are ignored.
pub trait CloudStorageClient {
    /// Returns `false` instead of an error when the stored credentials are rejected.
    fn validate_credentials(&self) -> impl Future<Output = bool> + Send;

    fn get_root_metadata(&self)
    -> impl Future<Output = Result<MetaData, CloudStorageError>> + Send;

    fn get_metadata(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<MetaData, CloudStorageError>> + Send;

    fn get_file(&self, path: &str)
    -> impl Future<Output = Result<Vec<u8>, CloudStorageError>> + Send;

    /// Creates missing parent folders; overwrites an existing file at `path`.
    fn upload_file(
        &self,
        path: &str,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<MetaData, CloudStorageError>> + Send;

    fn delete(&self, path: &str)
    -> impl Future<Output = Result<MetaData, CloudStorageError>> + Send;

    fn copy(
        &self,
        from_path: &str,
        to_path: &str,
    ) -> impl Future<Output = Result<MetaData, CloudStorageError>> + Send;

    fn move_item(
        &self,
        from_path: &str,
        to_path: &str,
    ) -> impl Future<Output = Result<MetaData, CloudStorageError>> + Send;

    fn create_folder(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<MetaData, CloudStorageError>> + Send;

    fn build_authorize_url(&self, redirect_uri: &str) -> Result<Url, CloudStorageError>;
}

pub trait ThumbnailProvider: CloudStorageClient {
    /// `None` asks for the provider's default thumbnail size.
    fn get_thumbnail(
        &self,
        path: &str,
        size: Option<ThumbnailSize>,
    ) -> impl Future<Output = Result<Vec<u8>, CloudStorageError>> + Send;
}
