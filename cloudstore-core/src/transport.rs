use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::credentials::TokenProvider;
use crate::error::CloudStorageError;

/// HTTP client that attaches bearer credentials and re-sends once after a 401.
pub struct AuthorizedTransport {
    http: Client,
    tokens: Arc<TokenProvider>,
}

impl AuthorizedTransport {
    pub fn new(tokens: Arc<TokenProvider>, timeout: Duration) -> Result<Self, CloudStorageError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, tokens })
    }

    pub fn tokens(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    /// `build` runs once per attempt so non-cloneable bodies can be rebuilt.
    pub async fn send<F>(&self, build: F) -> Result<Response, CloudStorageError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.tokens.valid_access_token().await?;
        let response = build(&self.http).bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(url = %response.url(), "request unauthorized, refreshing credentials");
        let token = self.tokens.refresh_after_rejection(&token).await?;
        Ok(build(&self.http).bearer_auth(&token).send().await?)
    }

    /// Sends and decodes a JSON body, mapping non-success statuses onto the error taxonomy.
    pub async fn send_json<T, F>(&self, build: F) -> Result<T, CloudStorageError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.send(build).await?;
        handle_response(response).await
    }
}

pub async fn handle_response<T: DeserializeOwned>(
    response: Response,
) -> Result<T, CloudStorageError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

pub async fn ensure_success(response: Response) -> Result<Response, CloudStorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CloudStorageError::from_status(status, &body))
}
