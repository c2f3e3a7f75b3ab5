//! HTTP client shared by the auth and credential endpoints

use memoir_core::storage::TokenStore;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{ApiError, ApiResult};
use crate::single_flight::SingleFlight;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Backend REST client
///
/// Cheap to clone; clones share the connection pool, the token store and the
/// in-flight token refresh.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    base_url: Url,
    tokens: TokenStore,
    refresh: SingleFlight<ApiResult<String>>,
}

impl ApiClient {
    /// Create a client for `base_url` (path prefixes such as `/api` are kept)
    pub fn new(base_url: &str, timeout: Duration, tokens: TokenStore) -> ApiResult<Self> {
        let base_url = parse_base_url(base_url)?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::network)?;

        debug!("API client for {}", base_url);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                tokens,
                refresh: SingleFlight::new(),
            }),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub(crate) fn http(&self) -> &Client {
        &self.inner.http
    }

    pub(crate) fn refresh_slot(&self) -> &SingleFlight<ApiResult<String>> {
        &self.inner.refresh
    }

    /// Resolve an endpoint path against the base URL
    pub(crate) fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    /// The stored bearer token
    pub(crate) async fn current_token(&self) -> ApiResult<String> {
        self.inner
            .tokens
            .get_token()
            .await
            .map_err(ApiError::storage)?
            .ok_or(ApiError::NoToken)
    }

    /// Send an authenticated request, refreshing the token once on 401
    ///
    /// `build` is called again for the retry, with the new token.
    pub(crate) async fn send_authorized<F>(&self, build: F) -> ApiResult<Response>
    where
        F: Fn(&Client, &str) -> ApiResult<RequestBuilder>,
    {
        let token = self.current_token().await?;
        let response = build(&self.inner.http, &token)?
            .send()
            .await
            .map_err(ApiError::network)?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        // Another caller may have refreshed while this request was out
        let stored = self.current_token().await?;
        let token = if stored != token {
            stored
        } else {
            debug!("Request unauthorized, refreshing token");
            self.refresh_token().await?
        };

        let response = build(&self.inner.http, &token)?
            .send()
            .await
            .map_err(ApiError::network)?;
        check_status(response).await
    }
}

fn parse_base_url(base_url: &str) -> ApiResult<Url> {
    let mut url = Url::parse(base_url.trim()).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ApiError::InvalidUrl(format!(
            "Unsupported scheme: {}",
            url.scheme()
        )));
    }

    // `Url::join` replaces the last segment unless the path ends in a slash
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Map a non-2xx response to an error
pub(crate) async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = body_message(&body);

    Err(match status {
        StatusCode::UNAUTHORIZED => {
            ApiError::Unauthorized(message.unwrap_or_else(|| "Invalid username or password".to_string()))
        }
        StatusCode::FORBIDDEN => {
            ApiError::AccountLocked(message.unwrap_or_else(|| "Account temporarily locked".to_string()))
        }
        _ => ApiError::Status {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("Request failed").to_string()
            }),
        },
    })
}

/// Error text from a response body: a JSON string or plain text
fn body_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::String(message)) => Some(message),
        Ok(_) => None,
        Err(_) => Some(trimmed.to_string()),
    }
}
