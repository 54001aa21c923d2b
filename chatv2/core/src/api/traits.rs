//! Chat API Traits
//!
//! Request/response operations of the chat service, behind a trait so the
//! session logic can run against the real backend or an in-memory fake.
//!
//! # Design Philosophy
//!
//! The `ChatApi` trait covers everything except the streaming send, which
//! lives in [`crate::streaming`]. Every method is one round trip; callers
//! decide what to do with the result (usually feed it into the store).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::{Conversation, ConversationDetail};
use crate::models::{ModelInfo, ModelQuota};

/// Errors from request/response calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, timeout, body decode)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if readable
        body: String,
    },

    /// The envelope carried a non-zero status code
    #[error("request rejected ({code}): {msg}")]
    Rejected {
        /// Backend status code
        code: i32,
        /// Backend status message
        msg: String,
    },

    /// Success envelope without the expected result
    #[error("response has no result")]
    MissingResult,

    /// Endpoint URL could not be built
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Status part of the response envelope
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiStatus {
    /// 0 on success
    pub code: i32,
    /// Human-readable message
    #[serde(default)]
    pub msg: String,
}

/// Response envelope wrapping every non-streaming result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Outcome
    pub status: ApiStatus,
    /// Payload (absent for void operations)
    pub result: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Payload of a successful response, if present
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] when the status code is non-zero.
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        if self.status.code == 0 {
            Ok(self.result)
        } else {
            Err(ApiError::Rejected {
                code: self.status.code,
                msg: self.status.msg,
            })
        }
    }

    /// Payload of a successful response
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] on a non-zero status code and
    /// [`ApiError::MissingResult`] when the payload is absent.
    pub fn into_required(self) -> Result<T, ApiError> {
        self.into_result()?.ok_or(ApiError::MissingResult)
    }
}

/// Chat service operations
///
/// Conversation ids are the canonical string form.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Models the user may pick from
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError>;

    /// Key of the backend's default model
    async fn default_model(&self) -> Result<String, ApiError>;

    /// Conversations of the current user, most recent first
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    /// Mint a fresh conversation id
    ///
    /// The backend creates the record on the first send to that id.
    async fn generate_conversation_id(&self) -> Result<String, ApiError>;

    /// Conversation summary plus message history
    async fn get_conversation(&self, conversation_id: &str) -> Result<ConversationDetail, ApiError>;

    /// Rename a conversation
    async fn update_title(&self, conversation_id: &str, title: &str) -> Result<(), ApiError>;

    /// Delete a conversation
    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError>;

    /// Quotas for every model
    async fn my_quotas(&self) -> Result<Vec<ModelQuota>, ApiError>;

    /// Quota for one model
    async fn my_quota(&self, model_id: &str) -> Result<ModelQuota, ApiError>;

    /// Whether `estimated_tokens` more tokens may be spent on `model_id`
    async fn check_quota(
        &self,
        model_id: &str,
        estimated_tokens: Option<u32>,
    ) -> Result<bool, ApiError>;

    /// Check if a model is offered and enabled
    async fn has_model(&self, model_id: &str) -> Result<bool, ApiError> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m.id == model_id && m.enabled))
    }
}
