//! HTTP Chat API Implementation
//!
//! [`ChatApi`] over the chat service's JSON endpoints.
//!
//! # Endpoints
//!
//! All paths are relative to the API prefix (`/chatv2/api` by default):
//! - `GET models`, `GET models/default`
//! - `GET conversations`, `POST conversation/generate-id`
//! - `GET|DELETE conversation/{id}`, `PUT conversation/{id}/title`
//! - `GET quota/my-quotas`, `GET quota/my-quota/{modelId}`, `GET quota/check`
//!
//! Every response is wrapped in the `{status, result}` envelope.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::traits::{ApiError, ApiResponse, ChatApi};
use crate::config::{ClientConfig, ConfigError};
use crate::conversation::{Conversation, ConversationDetail};
use crate::models::{ModelInfo, ModelQuota};

#[derive(Serialize)]
struct UpdateTitleBody<'a> {
    title: &'a str,
}

/// Chat API client over reqwest
#[derive(Clone, Debug)]
pub struct HttpChatApi {
    http_client: reqwest::Client,
    /// API root, e.g. `https://host/chatv2/api/`
    api_root: reqwest::Url,
    auth: Option<(String, String)>,
    request_timeout: Duration,
}

impl HttpChatApi {
    /// Client rooted at `api_root`
    #[must_use]
    pub fn new(http_client: reqwest::Client, api_root: reqwest::Url) -> Self {
        Self {
            http_client,
            api_root,
            auth: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Client configured from client settings
    ///
    /// # Errors
    ///
    /// Returns an error if the API root URL cannot be built.
    pub fn from_config(
        config: &ClientConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let mut api = Self::new(http_client, config.endpoint("")?)
            .with_request_timeout(config.request_timeout);
        if let Some((header, token)) = config.auth.header_pair() {
            api = api.with_auth(header, token);
        }
        Ok(api)
    }

    /// Attach an auth header to every request
    #[must_use]
    pub fn with_auth(mut self, header: impl Into<String>, token: impl Into<String>) -> Self {
        self.auth = Some((header.into(), token.into()));
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Endpoint URL from path segments; each segment is percent-encoded
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let mut url = self.api_root.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.api_root.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>, ApiError> {
        let mut builder = builder.timeout(self.request_timeout);
        if let Some((ref header, ref token)) = self.auth {
            builder = builder.header(header.as_str(), token.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Chat API request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<ApiResponse<T>>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<ApiResponse<T>, ApiError> {
        let url = self.url(segments)?;
        tracing::debug!(url = %url, "GET");
        self.call(self.http_client.get(url)).await
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError> {
        let models = self.get(&["models"]).await?.into_result()?.unwrap_or_default();
        Ok(models)
    }

    async fn default_model(&self) -> Result<String, ApiError> {
        self.get(&["models", "default"]).await?.into_required()
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let conversations = self
            .get(&["conversations"])
            .await?
            .into_result()?
            .unwrap_or_default();
        Ok(conversations)
    }

    async fn generate_conversation_id(&self) -> Result<String, ApiError> {
        let url = self.url(&["conversation", "generate-id"])?;
        tracing::debug!(url = %url, "POST");
        self.call(self.http_client.post(url).json(&serde_json::json!({})))
            .await?
            .into_required()
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<ConversationDetail, ApiError> {
        self.get(&["conversation", conversation_id])
            .await?
            .into_required()
    }

    async fn update_title(&self, conversation_id: &str, title: &str) -> Result<(), ApiError> {
        let url = self.url(&["conversation", conversation_id, "title"])?;
        tracing::debug!(url = %url, "PUT");
        self.call::<serde_json::Value>(self.http_client.put(url).json(&UpdateTitleBody { title }))
            .await?
            .into_result()?;
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError> {
        let url = self.url(&["conversation", conversation_id])?;
        tracing::debug!(url = %url, "DELETE");
        self.call::<serde_json::Value>(self.http_client.delete(url))
            .await?
            .into_result()?;
        Ok(())
    }

    async fn my_quotas(&self) -> Result<Vec<ModelQuota>, ApiError> {
        let quotas = self
            .get(&["quota", "my-quotas"])
            .await?
            .into_result()?
            .unwrap_or_default();
        Ok(quotas)
    }

    async fn my_quota(&self, model_id: &str) -> Result<ModelQuota, ApiError> {
        self.get(&["quota", "my-quota", model_id])
            .await?
            .into_required()
    }

    async fn check_quota(
        &self,
        model_id: &str,
        estimated_tokens: Option<u32>,
    ) -> Result<bool, ApiError> {
        let mut url = self.url(&["quota", "check"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("modelId", model_id);
            if let Some(tokens) = estimated_tokens {
                query.append_pair("estimatedTokens", &tokens.to_string());
            }
        }
        tracing::debug!(url = %url, "GET");
        self.call(self.http_client.get(url)).await?.into_required()
    }
}
