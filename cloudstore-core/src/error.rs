use reqwest::StatusCode;
use thiserror::Error;

use crate::metadata::ItemKind;

const MAX_BODY_LEN: usize = 240;

#[derive(Debug, Error)]
pub enum CloudStorageError {
    #[error("no such file or directory: {0}")]
    ItemNotFound(String),
    #[error("item at '{path}' is not a {expected}")]
    WrongItemType { path: String, expected: ItemKind },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("authorization failed: {0}")]
    Unauthorized(String),
    #[error("request failed{}: {message}", status_suffix(.status))]
    RequestFailed {
        status: Option<StatusCode>,
        message: String,
    },
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("operation cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

impl CloudStorageError {
    /// Maps a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = truncate(body);
        match status {
            StatusCode::NOT_FOUND => CloudStorageError::ItemNotFound(body),
            StatusCode::UNAUTHORIZED => CloudStorageError::Unauthorized(body),
            _ => CloudStorageError::RequestFailed {
                status: Some(status),
                message: body,
            },
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CloudStorageError::ItemNotFound(_) => Some(StatusCode::NOT_FOUND),
            CloudStorageError::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            CloudStorageError::RequestFailed { status, .. } => *status,
            _ => None,
        }
    }

    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            CloudStorageError::Unauthorized(_) => Some(ApiErrorClass::Auth),
            CloudStorageError::RequestFailed {
                status: Some(status),
                ..
            } => Some(classify_api_status(*status)),
            CloudStorageError::RequestFailed { status: None, .. } => {
                Some(ApiErrorClass::Transient)
            }
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudStorageError::ItemNotFound(_))
    }
}

impl From<reqwest::Error> for CloudStorageError {
    fn from(err: reqwest::Error) -> Self {
        CloudStorageError::RequestFailed {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_EARLY
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

fn status_suffix(status: &Option<StatusCode>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_BODY_LEN {
        return body.to_string();
    }
    let mut end = MAX_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
