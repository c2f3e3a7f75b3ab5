//! Credential endpoints

use async_trait::async_trait;
use memoir_core::backend::CredentialBackend;
use memoir_core::credential::{CredentialPayload, Page, RemoteCredential};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::types::DeleteRequest;

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
    response.json().await.map_err(ApiError::decode)
}

#[async_trait]
impl CredentialBackend for ApiClient {
    async fn list(&self, page: u32, size: u32) -> memoir_core::Result<Page<RemoteCredential>> {
        let url = self.endpoint("credentials")?;
        let response = self
            .send_authorized(|http, token| {
                Ok(http
                    .get(url.clone())
                    .query(&[("page", page), ("size", size)])
                    .bearer_auth(token))
            })
            .await?;

        let page: Page<RemoteCredential> = decode(response).await?;
        debug!("Fetched page {} ({} records)", page.current_page, page.content.len());
        Ok(page)
    }

    async fn create(&self, payload: &CredentialPayload) -> memoir_core::Result<RemoteCredential> {
        let url = self.endpoint("credentials")?;
        let response = self
            .send_authorized(|http, token| Ok(http.post(url.clone()).json(payload).bearer_auth(token)))
            .await?;

        Ok(decode(response).await?)
    }

    async fn update(&self, payload: &CredentialPayload) -> memoir_core::Result<RemoteCredential> {
        let url = self.endpoint("credentials/update")?;
        let response = self
            .send_authorized(|http, token| Ok(http.post(url.clone()).json(payload).bearer_auth(token)))
            .await?;

        Ok(decode(response).await?)
    }

    async fn delete(&self, uuid: &str) -> memoir_core::Result<()> {
        let url = self.endpoint("credentials/minus")?;
        self.send_authorized(|http, token| {
            Ok(http
                .post(url.clone())
                .json(&DeleteRequest { uuid })
                .bearer_auth(token))
        })
        .await?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Memoir REST API"
    }
}
