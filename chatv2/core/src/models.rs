//! Model catalogue and per-model token quotas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::{self, timestamp};

/// A model the chat service can route to
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelInfo {
    /// Unique model key (sent as `modelId`)
    #[serde(deserialize_with = "wire::null_as_default")]
    pub id: String,
    /// Display name
    #[serde(deserialize_with = "wire::null_as_default")]
    pub name: String,
    /// Upstream provider
    #[serde(deserialize_with = "wire::null_as_default")]
    pub provider: String,
    /// Human-readable description
    #[serde(deserialize_with = "wire::null_as_default")]
    pub description: String,
    /// Whether the model is offered
    #[serde(deserialize_with = "wire::null_as_default")]
    pub enabled: bool,
    /// Response token ceiling
    #[serde(deserialize_with = "wire::null_as_default")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(deserialize_with = "wire::null_as_default")]
    pub temperature: f64,
}

/// Token quota for one user on one model
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelQuota {
    /// Quota row id
    pub id: Option<i64>,
    /// Owning user
    pub user_id: Option<i64>,
    /// Model key
    #[serde(deserialize_with = "wire::null_as_default")]
    pub model_id: String,
    /// Model display name
    pub model_name: Option<String>,
    /// Tokens granted
    #[serde(deserialize_with = "wire::null_as_default")]
    pub total_quota: i64,
    /// Tokens consumed in the current period
    #[serde(deserialize_with = "wire::null_as_default")]
    pub used_quota: i64,
    /// Tokens left
    #[serde(deserialize_with = "wire::null_as_default")]
    pub remaining_quota: i64,
    /// Lifetime tokens consumed
    #[serde(deserialize_with = "wire::null_as_default")]
    pub total_used: i64,
    /// `used / total`, as reported by the backend
    pub usage_rate: Option<f64>,
    /// Last time tokens were charged
    #[serde(with = "timestamp")]
    pub last_used_time: Option<DateTime<Utc>>,
    /// Row creation time
    #[serde(with = "timestamp")]
    pub create_time: Option<DateTime<Utc>>,
    /// Row update time
    #[serde(with = "timestamp")]
    pub update_time: Option<DateTime<Utc>>,
}

impl ModelQuota {
    /// Whether the quota is used up
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.total_quota > 0 && self.remaining_quota <= 0
    }
}
