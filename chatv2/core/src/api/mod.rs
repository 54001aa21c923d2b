//! Chat Service API
//!
//! Request/response access to the chat service through a common trait.
//!
//! # Usage
//!
//! ```ignore
//! use chatv2_core::api::{ChatApi, HttpChatApi};
//!
//! let api = HttpChatApi::from_config(&config, config.http_client()?)?;
//! let models = api.list_models().await?;
//! ```

mod http;
mod traits;

pub use http::HttpChatApi;
pub use traits::{ApiError, ApiResponse, ApiStatus, ChatApi};
