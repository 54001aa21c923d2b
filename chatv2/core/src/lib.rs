//! chatv2 Core - Headless Streaming Chat Client
//!
//! This crate holds the client side of the chatv2 chat service, independent of
//! any UI. It can drive a terminal client, a GUI, or run headless for tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Front ends                               │
//! │        ┌──────────┐   ┌──────────┐   ┌──────────────────┐        │
//! │        │   CLI    │   │   GUI    │   │ Headless / tests │        │
//! │        └────┬─────┘   └────┬─────┘   └────────┬─────────┘        │
//! │             └──────────────┼──────────────────┘                  │
//! │                  commands  │  ChatEvent / store reads            │
//! └────────────────────────────┼─────────────────────────────────────┘
//!                              │
//! ┌────────────────────────────┼─────────────────────────────────────┐
//! │                      CHATV2 CORE                                 │
//! │  ┌─────────────────────────┴──────────────────────────────────┐  │
//! │  │                      ChatSession                            │  │
//! │  │  ┌──────────────┐  ┌───────────────────┐  ┌──────────────┐ │  │
//! │  │  │   ChatApi    │  │ StreamingTransport │  │ Conversation │ │  │
//! │  │  │ (JSON calls) │  │  ([DONE]/[ERROR])  │  │    Store     │ │  │
//! │  │  └──────────────┘  └───────────────────┘  └──────────────┘ │  │
//! │  └─────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`StreamingTransport`]: Sends a message and streams the reply through the
//!   sentinel protocol
//! - [`ConversationStore`]: In-memory conversations, messages and models
//! - [`ChatApi`] / [`HttpChatApi`]: Request/response endpoints
//! - [`ChatSession`]: Commands that combine the three
//! - [`ClientConfig`]: Layered configuration (file, env, CLI)
//!
//! # Quick Start
//!
//! ```ignore
//! use chatv2_core::{config, ChatSession, HttpChatApi, StreamingTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = config::load_config()?;
//!     let http = config.http_client()?;
//!     let api = HttpChatApi::from_config(&config, http.clone())?;
//!     let transport = StreamingTransport::from_config(&config, http)?;
//!
//!     let session = ChatSession::new(api, transport);
//!     session.refresh_models().await?;
//!     let handle = session.send_message("Hello!").await?;
//!     handle.wait().await;
//!
//!     println!("{}", session.store().lock().last_message().unwrap().content);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`api`]: Chat service endpoints behind the [`ChatApi`] trait
//! - [`chat`]: Session commands and the store-writing stream observer
//! - [`config`]: TOML/env/CLI configuration
//! - [`conversation`]: Conversations and the dual-identifier resolver
//! - [`messages`]: Chat messages
//! - [`models`]: Model catalogue and token quotas
//! - [`store`]: The conversation store
//! - [`streaming`]: The streaming send transport and sentinel protocol
//! - [`wire`]: Tolerant deserialisation helpers for backend payloads

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod messages;
pub mod models;
pub mod store;
pub mod streaming;
pub mod wire;

// Re-exports for convenience
pub use api::{ApiError, ChatApi, HttpChatApi};
pub use chat::{ChatError, ChatEvent, ChatSession, SharedStore, StoreObserver};
pub use config::{ClientConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use conversation::{Conversation, ConversationDetail, ConversationPatch, ConversationSelector};
pub use messages::{Message, MessageRole};
pub use models::{ModelInfo, ModelQuota};
pub use store::ConversationStore;
pub use streaming::{
    callbacks, ExchangeState, SendRequest, StreamError, StreamHandle, StreamObserver,
    StreamingTransport,
};
