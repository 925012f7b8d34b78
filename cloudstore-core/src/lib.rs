mod config;
mod credentials;
mod error;
mod metadata;
mod oauth;
mod provider;
mod transport;

pub use config::{ClientConfig, ConfigError, with_trailing_slash};
pub use credentials::{Credentials, RefreshHook, TokenError, TokenProvider};
pub use error::{ApiErrorClass, CloudStorageError};
pub use metadata::{FileMetaData, FolderMetaData, ItemKind, MetaData, ThumbnailSize, format_size};
pub use oauth::{OAuthClient, OAuthError, OAuthToken};
pub use provider::{CloudStorageClient, ThumbnailProvider};
pub use transport::{AuthorizedTransport, ensure_success, handle_response};
