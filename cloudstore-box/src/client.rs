use std::sync::Arc;

use cloudstore_core::{
    AuthorizedTransport, ClientConfig, CloudStorageClient, CloudStorageError, Credentials,
    ItemKind, MetaData, OAuthClient, OAuthError, RefreshHook, ThumbnailProvider, ThumbnailSize,
    TokenError, TokenProvider,
};
use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::{BoxApi, DEFAULT_API_BASE_URL, DEFAULT_UPLOAD_BASE_URL, RemoteItems, list_all_items};
use crate::models::{BoxItem, ItemCollection, ROOT_FOLDER_ID, thumbnail_pixels};
use crate::resolver::{ItemResolver, ItemType, PathKey};

/// Value passed as `state` on the authorization redirect.
const AUTHORIZE_STATE: &str = "authenticated";

/// Path-addressed Box client.
///
/// Every path goes through one [`ItemResolver`], so IDs learned by one operation
/// are reused by the next for the lifetime of the client.
pub struct BoxClient {
    resolver: ItemResolver<BoxApi>,
    oauth: Option<OAuthClient>,
}

impl BoxClient {
    pub fn new(config: &ClientConfig, credentials: Credentials) -> Result<Self, CloudStorageError> {
        Self::build(config, credentials, None)
    }

    /// `hook` receives the credentials after every refresh, e.g. to persist them.
    pub fn with_refresh_hook(
        config: &ClientConfig,
        credentials: Credentials,
        hook: RefreshHook,
    ) -> Result<Self, CloudStorageError> {
        Self::build(config, credentials, Some(hook))
    }

    /// A client without OAuth support, over an already configured accessor.
    pub fn with_api(api: BoxApi, page_size: u32) -> Self {
        Self {
            resolver: ItemResolver::with_page_size(api, page_size),
            oauth: None,
        }
    }

    fn build(
        config: &ClientConfig,
        credentials: Credentials,
        hook: Option<RefreshHook>,
    ) -> Result<Self, CloudStorageError> {
        let oauth = match config.oauth_base_url.as_deref() {
            Some(base) => OAuthClient::with_base_url(base, &config.client_id, &config.client_secret),
            None => OAuthClient::new(&config.client_id, &config.client_secret),
        }
        .map_err(oauth_failure)?;

        let mut tokens = TokenProvider::new(credentials, Some(oauth.clone()));
        if let Some(hook) = hook {
            tokens = tokens.with_refresh_hook(hook);
        }
        let transport = AuthorizedTransport::new(Arc::new(tokens), config.request_timeout)?;
        let api = BoxApi::with_base_urls(
            Arc::new(transport),
            config.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL),
            config.upload_base_url.as_deref().unwrap_or(DEFAULT_UPLOAD_BASE_URL),
        )?;

        Ok(Self {
            resolver: ItemResolver::with_page_size(api, config.page_size),
            oauth: Some(oauth),
        })
    }

    pub fn resolver(&self) -> &ItemResolver<BoxApi> {
        &self.resolver
    }

    fn api(&self) -> &BoxApi {
        self.resolver.remote()
    }

    /// Exchanges an authorization code and starts using the granted credentials.
    pub async fn authenticate_code(&self, code: &str) -> Result<Credentials, CloudStorageError> {
        let oauth = self
            .oauth
            .as_ref()
            .ok_or_else(|| CloudStorageError::from(TokenError::MissingOAuthClient))?;
        let token = oauth.exchange_code(code).await.map_err(oauth_failure)?;
        let credentials = Credentials::from_oauth_token(&token);
        self.api()
            .transport()
            .tokens()
            .replace(credentials.clone())
            .await;
        info!("authorization code exchanged");
        Ok(credentials)
    }

    /// Attaches the complete child listing, fetching pages the folder payload lacked.
    async fn with_full_listing(&self, mut folder: BoxItem) -> Result<BoxItem, CloudStorageError> {
        let mut entries = match folder.item_collection.take() {
            Some(collection) if collection.is_complete() => {
                folder.item_collection = Some(collection);
                return Ok(folder);
            }
            Some(collection) => collection.entries,
            None => Vec::new(),
        };
        debug!(id = %folder.id, have = entries.len(), "fetching remaining folder entries");
        let rest = list_all_items(
            self.api(),
            &folder.id,
            self.resolver.page_size(),
            entries.len() as u64,
        )
        .await?;
        entries.extend(rest);
        folder.item_collection = Some(ItemCollection {
            total_count: entries.len() as u64,
            entries,
            offset: Some(0),
            limit: None,
        });
        Ok(folder)
    }

    async fn copy_or_move(
        &self,
        from_path: &str,
        to_path: &str,
        moving: bool,
    ) -> Result<MetaData, CloudStorageError> {
        let target = PathKey::normalize(to_path);
        let (target_parent, target_name) = split_target(&target)?;

        let (source, parent) = tokio::try_join!(
            self.resolver.resolve(from_path, ItemType::Unknown, true),
            self.resolver.resolve_folder(target_parent.as_str(), false),
        )?;
        if source.is_root() {
            return Err(CloudStorageError::InvalidArgument(
                "the root folder cannot be copied or moved".to_string(),
            ));
        }
        let kind = item_kind(&source)?;

        let result = if moving {
            self.api()
                .move_item(kind, &source.id, target_name, &parent.id)
                .await?
        } else {
            self.api()
                .copy_item(kind, &source.id, target_name, &parent.id)
                .await?
        };
        info!(from = from_path, to = %target, moved = moving, "transferred item");
        self.resolver
            .remember(target.as_str(), &result.id, result.is_folder());
        result.into_metadata(&target.to_remote_path())
    }
}

impl CloudStorageClient for BoxClient {
    async fn validate_credentials(&self) -> bool {
        match self.api().get_folder(ROOT_FOLDER_ID).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "credential validation failed");
                false
            }
        }
    }

    async fn get_root_metadata(&self) -> Result<MetaData, CloudStorageError> {
        let root = self.api().get_folder(ROOT_FOLDER_ID).await?;
        self.with_full_listing(root).await?.into_metadata("/")
    }

    async fn get_metadata(&self, path: &str) -> Result<MetaData, CloudStorageError> {
        let key = PathKey::normalize(path);
        if key.is_root() {
            return self.get_root_metadata().await;
        }
        let mut item = self
            .resolver
            .resolve(key.as_str(), ItemType::Unknown, true)
            .await?;
        if item.is_folder() {
            item = self.with_full_listing(item).await?;
        }
        item.into_metadata(&key.to_remote_path())
    }

    async fn get_file(&self, path: &str) -> Result<Vec<u8>, CloudStorageError> {
        let file = self.resolver.resolve_file(path, true).await?;
        self.api().download(&file.id).await
    }

    async fn upload_file(&self, path: &str, data: Vec<u8>) -> Result<MetaData, CloudStorageError> {
        let key = PathKey::normalize(path);
        let (parent_key, name) = split_target(&key)?;
        let parent = self.resolver.resolve_folder(parent_key.as_str(), false).await?;

        let uploaded = match self.resolver.resolve_file(key.as_str(), true).await {
            Ok(existing) => {
                self.api()
                    .upload_version(&existing.id, existing.etag.as_deref(), name, data)
                    .await?
            }
            Err(err) if err.is_not_found() => self.api().upload_new(&parent.id, name, data).await?,
            Err(err) => return Err(err),
        };
        info!(path = %key, id = %uploaded.id, "uploaded file");
        self.resolver.remember(key.as_str(), &uploaded.id, false);
        uploaded.into_metadata(&key.to_remote_path())
    }

    async fn delete(&self, path: &str) -> Result<MetaData, CloudStorageError> {
        let key = PathKey::normalize(path);
        if key.is_root() {
            return Err(CloudStorageError::InvalidArgument(
                "the root folder cannot be deleted".to_string(),
            ));
        }
        let item = self
            .resolver
            .resolve(key.as_str(), ItemType::Unknown, true)
            .await?;
        match item_kind(&item)? {
            ItemKind::Folder => self.api().delete_folder(&item.id, true).await?,
            ItemKind::File => self.api().delete_file(&item.id, item.etag.as_deref()).await?,
        }
        info!(path = %key, id = %item.id, "deleted item");
        let mut metadata = item.into_metadata(&key.to_remote_path())?;
        metadata.mark_deleted();
        Ok(metadata)
    }

    async fn copy(&self, from_path: &str, to_path: &str) -> Result<MetaData, CloudStorageError> {
        self.copy_or_move(from_path, to_path, false).await
    }

    async fn move_item(&self, from_path: &str, to_path: &str) -> Result<MetaData, CloudStorageError> {
        self.copy_or_move(from_path, to_path, true).await
    }

    async fn create_folder(&self, path: &str) -> Result<MetaData, CloudStorageError> {
        let key = PathKey::normalize(path);
        match self.resolver.resolve(key.as_str(), ItemType::Unknown, true).await {
            Ok(existing) if existing.is_folder() => Err(CloudStorageError::RequestFailed {
                status: Some(StatusCode::CONFLICT),
                message: format!("folder {key} already exists"),
            }),
            Ok(_) => Err(CloudStorageError::WrongItemType {
                path: key.to_remote_path(),
                expected: ItemKind::Folder,
            }),
            Err(err) if err.is_not_found() => {
                let folder = self.resolver.resolve_folder(key.as_str(), false).await?;
                folder.into_metadata(&key.to_remote_path())
            }
            Err(err) => Err(err),
        }
    }

    fn build_authorize_url(&self, redirect_uri: &str) -> Result<Url, CloudStorageError> {
        let oauth = self
            .oauth
            .as_ref()
            .ok_or_else(|| CloudStorageError::from(TokenError::MissingOAuthClient))?;
        oauth
            .authorize_url(redirect_uri, Some(AUTHORIZE_STATE))
            .map_err(oauth_failure)
    }
}

impl ThumbnailProvider for BoxClient {
    async fn get_thumbnail(
        &self,
        path: &str,
        size: Option<ThumbnailSize>,
    ) -> Result<Vec<u8>, CloudStorageError> {
        let file = self.resolver.resolve_file(path, true).await?;
        self.api()
            .thumbnail(&file.id, size.map(thumbnail_pixels))
            .await
    }
}

fn split_target(key: &PathKey) -> Result<(PathKey, &str), CloudStorageError> {
    key.split_last().ok_or_else(|| {
        CloudStorageError::InvalidArgument("target path must name an item below the root".to_string())
    })
}

fn item_kind(item: &BoxItem) -> Result<ItemKind, CloudStorageError> {
    item.kind().ok_or_else(|| {
        CloudStorageError::Unsupported(format!("item '{}' is neither a file nor a folder", item.name))
    })
}

fn oauth_failure(err: OAuthError) -> CloudStorageError {
    match err {
        OAuthError::Url(err) => CloudStorageError::Url(err),
        other => TokenError::from(other).into(),
    }
}
