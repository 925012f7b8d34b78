use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::CloudStorageError;
use crate::oauth::{OAuthClient, OAuthError, OAuthToken};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("oauth client is required to refresh the access token")]
    MissingOAuthClient,
    #[error("refresh token is missing")]
    MissingRefreshToken,
    #[error("unable to refresh token: {0}")]
    OAuth(#[from] OAuthError),
}

impl From<TokenError> for CloudStorageError {
    fn from(err: TokenError) -> Self {
        CloudStorageError::Unauthorized(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds; `None` means the expiry is unknown and only a 401 triggers a refresh.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: None,
            token_type: None,
        }
    }

    pub fn from_oauth_token(token: &OAuthToken) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|secs| now_unix().saturating_add(secs as i64)),
            token_type: token.token_type.clone(),
        }
    }
}

pub type RefreshHook = Arc<dyn Fn(&Credentials) + Send + Sync>;

pub struct TokenProvider {
    state: Mutex<Credentials>,
    oauth_client: Option<OAuthClient>,
    refresh_skew_secs: i64,
    on_refresh: Option<RefreshHook>,
}

impl TokenProvider {
    pub fn new(state: Credentials, oauth_client: Option<OAuthClient>) -> Self {
        Self {
            state: Mutex::new(state),
            oauth_client,
            refresh_skew_secs: 60,
            on_refresh: None,
        }
    }

    /// Called with the new credentials after every successful refresh.
    pub fn with_refresh_hook(mut self, hook: RefreshHook) -> Self {
        self.on_refresh = Some(hook);
        self
    }

    pub async fn valid_access_token(&self) -> Result<String, TokenError> {
        let mut state = self.state.lock().await;
        if self.should_refresh(&state) {
            self.refresh(&mut state).await?;
        }
        Ok(state.access_token.clone())
    }

    pub async fn state(&self) -> Credentials {
        self.state.lock().await.clone()
    }

    /// Installs credentials obtained out of band, e.g. from an authorization code.
    pub async fn replace(&self, credentials: Credentials) {
        let mut state = self.state.lock().await;
        *state = credentials;
        if let Some(hook) = &self.on_refresh {
            hook(&*state);
        }
    }

    #[cfg(test)]
    async fn refresh_now(&self) -> Result<String, TokenError> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await?;
        Ok(state.access_token.clone())
    }

    /// Refreshes unless another caller already replaced `rejected`.
    pub async fn refresh_after_rejection(&self, rejected: &str) -> Result<String, TokenError> {
        let mut state = self.state.lock().await;
        if state.access_token != rejected {
            debug!("access token already refreshed by a concurrent request");
            return Ok(state.access_token.clone());
        }
        self.refresh(&mut state).await?;
        Ok(state.access_token.clone())
    }

    fn should_refresh(&self, state: &Credentials) -> bool {
        let Some(expires_at) = state.expires_at else {
            return false;
        };
        expires_at <= now_unix().saturating_add(self.refresh_skew_secs)
    }

    async fn refresh(&self, state: &mut Credentials) -> Result<(), TokenError> {
        let refresh_token = state
            .refresh_token
            .clone()
            .ok_or(TokenError::MissingRefreshToken)?;
        let client = self
            .oauth_client
            .as_ref()
            .ok_or(TokenError::MissingOAuthClient)?;
        let token = client.refresh_token(&refresh_token).await?;
        let mut refreshed = Credentials::from_oauth_token(&token);
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token);
        }
        if refreshed.token_type.is_none() {
            refreshed.token_type = state.token_type.clone();
        }
        *state = refreshed;
        info!("access token refreshed");
        if let Some(hook) = &self.on_refresh {
            hook(&*state);
        }
        Ok(())
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
