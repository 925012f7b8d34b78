use std::time::Duration;

use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(String),
}

/// Client settings read from `<PREFIX>_*` environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base_url: Option<String>,
    pub upload_base_url: Option<String>,
    pub oauth_base_url: Option<String>,
    pub request_timeout: Duration,
    pub page_size: u32,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base_url: None,
            upload_base_url: None,
            oauth_base_url: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(prefix, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            lookup(&format!("{prefix}_{suffix}")).filter(|value| !value.trim().is_empty())
        };
        let required = |suffix: &str| {
            var(suffix).ok_or_else(|| ConfigError::Missing(format!("{prefix}_{suffix}")))
        };

        let mut config = Self::new(required("CLIENT_ID")?, required("CLIENT_SECRET")?);
        config.api_base_url = var("API_BASE_URL");
        config.upload_base_url = var("UPLOAD_BASE_URL");
        config.oauth_base_url = var("OAUTH_BASE_URL");
        config.request_timeout = Duration::from_secs(parse_positive(
            var("HTTP_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        ));
        let page_size = parse_positive(var("PAGE_SIZE"), u64::from(DEFAULT_PAGE_SIZE));
        config.page_size = page_size.min(u64::from(MAX_PAGE_SIZE)) as u32;
        Ok(config)
    }
}

fn parse_positive(value: Option<String>, default: u64) -> u64 {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

/// `Url::join` replaces the last path segment unless the base ends with `/`.
pub fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn reads_prefixed_values_with_defaults() {
        let config = ClientConfig::from_lookup(
            "BOX",
            lookup_from(&[("BOX_CLIENT_ID", "id"), ("BOX_CLIENT_SECRET", "secret")]),
        )
        .unwrap();

        assert_eq!(config.client_id, "id");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.page_size, 100);
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn clamps_page_size_and_ignores_bad_numbers() {
        let config = ClientConfig::from_lookup(
            "BOX",
            lookup_from(&[
                ("BOX_CLIENT_ID", "id"),
                ("BOX_CLIENT_SECRET", "secret"),
                ("BOX_PAGE_SIZE", "5000"),
                ("BOX_HTTP_TIMEOUT_SECS", "0"),
                ("BOX_API_BASE_URL", "http://localhost:9000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.page_size, 1000);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(
            config.api_base_url.as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn missing_secret_names_variable() {
        let err = ClientConfig::from_lookup("BOX", lookup_from(&[("BOX_CLIENT_ID", "id")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "BOX_CLIENT_SECRET is not set");
    }

    #[test]
    fn trailing_slash_is_added_once() {
        assert_eq!(with_trailing_slash("http://h/api"), "http://h/api/");
        assert_eq!(with_trailing_slash("http://h/api/"), "http://h/api/");
    }
}
