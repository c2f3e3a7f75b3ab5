//! Login and token refresh

use async_trait::async_trait;
use memoir_core::backend::{AuthGrant, Authenticator};
use memoir_core::storage::TokenStore;
use tracing::{debug, info, warn};

use crate::client::{check_status, ApiClient};
use crate::error::{ApiError, ApiResult};
use crate::types::{AuthRequest, AuthResponse, RefreshTokenRequest};

impl ApiClient {
    /// Exchange username and password for a token (`POST /auth/entry`)
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<AuthResponse> {
        let response = self
            .http()
            .post(self.endpoint("auth/entry")?)
            .json(&AuthRequest { username, password })
            .send()
            .await
            .map_err(ApiError::network)?;

        let body: AuthResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(ApiError::decode)?;

        info!("Authenticated as {}", body.username.as_deref().unwrap_or(username));
        Ok(body)
    }

    /// Trade the stored token for a fresh one
    ///
    /// Concurrent callers share a single request. On failure the stored
    /// token is removed, which logs the device out.
    pub async fn refresh_token(&self) -> ApiResult<String> {
        let client = self.clone();
        self.refresh_slot()
            .run(move || async move { client.request_refresh().await })
            .await
    }

    async fn request_refresh(&self) -> ApiResult<String> {
        let current = self.current_token().await?;

        let outcome: ApiResult<AuthResponse> = async {
            let response = self
                .http()
                .post(self.endpoint("auth/refresh-token")?)
                .json(&RefreshTokenRequest {
                    refresh_token: &current,
                })
                .send()
                .await
                .map_err(ApiError::network)?;

            check_status(response)
                .await?
                .json()
                .await
                .map_err(ApiError::decode)
        }
        .await;

        match outcome {
            Ok(body) => {
                self.tokens()
                    .save_token(&body.token, body.salt.as_deref(), TokenStore::default_expiry())
                    .await
                    .map_err(ApiError::storage)?;

                debug!("Token refreshed");
                Ok(body.token)
            }
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                if let Err(remove_err) = self.tokens().remove_token().await {
                    warn!("Failed to clear token after refresh failure: {}", remove_err);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Authenticator for ApiClient {
    async fn login(&self, username: &str, password: &str) -> memoir_core::Result<AuthGrant> {
        let body = ApiClient::login(self, username, password).await?;

        Ok(AuthGrant {
            token: body.token,
            username: body.username,
            salt: body.salt,
        })
    }
}
