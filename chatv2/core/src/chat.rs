//! Chat Session
//!
//! Glue between the chat service and the [`ConversationStore`]. Commands do
//! their round trip first and only then touch the store, so a failed request
//! leaves local state as it was.
//!
//! # Streaming into the store
//!
//! The transport hands out the whole reply body on every chunk. The store's
//! `update_last_message` appends. [`StoreObserver`] bridges the two: it
//! strips markers from each snapshot and appends only the part not applied
//! yet. When a snapshot is not an extension of what was applied (a marker
//! finished arriving and got stripped), the content is replaced instead.
//!
//! If the user switches conversation mid-stream, the message list is swapped
//! and its epoch changes. The observer notices and stops writing messages; it
//! still clears the streaming flag when the exchange ends.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::api::{ApiError, ChatApi};
use crate::conversation::{ConversationPatch, ConversationSelector};
use crate::messages::Message;
use crate::store::ConversationStore;
use crate::streaming::{
    strip_markers, SendRequest, StreamError, StreamHandle, StreamObserver, StreamingTransport,
};

/// Errors from session commands
#[derive(Debug, Error)]
pub enum ChatError {
    /// A backend round trip failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A reply is still streaming
    #[error("a reply is already streaming")]
    AlreadyStreaming,

    /// Nothing to send
    #[error("message is empty")]
    EmptyMessage,
}

/// Progress of a streaming reply, for front ends
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    /// The reply changed
    Token {
        /// Newly appended text (empty when the content was replaced)
        delta: String,
        /// Full visible reply so far
        content: String,
    },
    /// The reply finished
    StreamEnd {
        /// Final visible reply
        content: String,
    },
    /// The reply failed
    StreamError(String),
}

/// Shared handle to the store
pub type SharedStore = Arc<Mutex<ConversationStore>>;

/// Applies one streaming reply to the last message of the store
pub struct StoreObserver<A: ChatApi + 'static> {
    store: SharedStore,
    epoch: u64,
    applied: String,
    finished: bool,
    events: Option<mpsc::UnboundedSender<ChatEvent>>,
    refresh: Option<Arc<A>>,
}

impl<A: ChatApi + 'static> StoreObserver<A> {
    /// Observer writing into the current last message of `store`
    ///
    /// The message list epoch is captured now; writes stop if it changes.
    pub fn new(store: SharedStore) -> Self {
        let epoch = store.lock().messages_epoch();
        Self::with_epoch(store, epoch)
    }

    /// Observer bound to message list generation `epoch`
    ///
    /// `epoch` must be read under the same lock that seeded the placeholder.
    pub fn with_epoch(store: SharedStore, epoch: u64) -> Self {
        Self {
            store,
            epoch,
            applied: String::new(),
            finished: false,
            events: None,
            refresh: None,
        }
    }

    /// Publish progress on `events`
    #[must_use]
    pub fn with_events(mut self, events: Option<mpsc::UnboundedSender<ChatEvent>>) -> Self {
        self.events = events;
        self
    }

    /// Reload the conversation list through `api` after a successful reply
    #[must_use]
    pub fn with_refresh(mut self, api: Arc<A>) -> Self {
        self.refresh = Some(api);
        self
    }

    fn emit(&self, event: ChatEvent) {
        if let Some(ref tx) = self.events {
            // Receiver gone means nobody is watching
            let _ = tx.send(event);
        }
    }

    /// Close out the placeholder; returns false if already closed
    fn finish(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;

        let mut store = self.store.lock();
        if store.messages_epoch() == self.epoch {
            store.finish_last_message();
        }
        store.set_streaming(false);
        true
    }
}

impl<A: ChatApi + 'static> StreamObserver for StoreObserver<A> {
    fn on_chunk(&mut self, cumulative: &str) {
        if self.finished {
            return;
        }
        let visible = strip_markers(cumulative);

        let delta = {
            let mut store = self.store.lock();
            if store.messages_epoch() != self.epoch {
                tracing::debug!("Conversation switched mid-stream, dropping chunk");
                return;
            }
            match visible.strip_prefix(self.applied.as_str()) {
                Some("") => return,
                Some(suffix) => {
                    store.update_last_message(suffix);
                    suffix.to_string()
                }
                None => {
                    store.replace_last_message(&visible);
                    String::new()
                }
            }
        };

        self.applied = visible;
        self.emit(ChatEvent::Token {
            delta,
            content: self.applied.clone(),
        });
    }

    fn on_complete(&mut self) {
        if !self.finish() {
            return;
        }
        self.emit(ChatEvent::StreamEnd {
            content: self.applied.clone(),
        });

        if let Some(api) = self.refresh.take() {
            let store = Arc::clone(&self.store);
            tokio::spawn(async move {
                match api.list_conversations().await {
                    Ok(conversations) => store.lock().set_conversations(conversations),
                    Err(e) => tracing::warn!(error = %e, "Failed to refresh conversations after reply"),
                }
            });
        }
    }

    fn on_error(&mut self, error: StreamError) {
        if !self.finish() {
            return;
        }
        tracing::warn!(error = %error, "Reply failed");
        self.emit(ChatEvent::StreamError(error.to_string()));
    }
}

/// A chat client session
pub struct ChatSession<A: ChatApi + 'static> {
    api: Arc<A>,
    transport: StreamingTransport,
    store: SharedStore,
    events: Option<mpsc::UnboundedSender<ChatEvent>>,
    fallback_model: Option<String>,
}

impl<A: ChatApi + 'static> ChatSession<A> {
    /// Session with an empty store
    pub fn new(api: A, transport: StreamingTransport) -> Self {
        Self {
            api: Arc::new(api),
            transport,
            store: Arc::new(Mutex::new(ConversationStore::new())),
            events: None,
            fallback_model: None,
        }
    }

    /// Publish streaming progress on `events`
    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ChatEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Model to select when the backend names no default
    #[must_use]
    pub fn with_fallback_model(mut self, model_id: Option<String>) -> Self {
        self.fallback_model = model_id;
        self
    }

    /// The session's store
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The API client
    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    async fn loading<T>(&self, call: impl Future<Output = Result<T, ApiError>>) -> Result<T, ApiError> {
        self.store.lock().set_loading(true);
        let result = call.await;
        self.store.lock().set_loading(false);
        result
    }

    /// Load the model catalogue and pick a model if none is selected
    ///
    /// # Errors
    ///
    /// Returns an error if the model list cannot be fetched. A failing
    /// default-model lookup falls back to the configured model.
    pub async fn refresh_models(&self) -> Result<(), ChatError> {
        let models = self.loading(self.api.list_models()).await?;
        let default = match self.api.default_model().await {
            Ok(id) if !id.is_empty() => Some(id),
            Ok(_) => self.fallback_model.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "No default model from server");
                self.fallback_model.clone()
            }
        };

        let mut store = self.store.lock();
        tracing::debug!(count = models.len(), default = ?default, "Loaded models");
        store.set_models(models);
        if store.selected_model_id().is_none() {
            store.set_selected_model(default);
        }
        Ok(())
    }

    /// Select a model by key
    pub fn select_model(&self, model_id: impl Into<String>) {
        self.store.lock().set_selected_model(Some(model_id.into()));
    }

    /// Reload the conversation list
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched.
    pub async fn refresh_conversations(&self) -> Result<(), ChatError> {
        let conversations = self.loading(self.api.list_conversations()).await?;
        self.store.lock().set_conversations(conversations);
        Ok(())
    }

    /// Start a fresh conversation and select it
    ///
    /// The backend only creates the record on the first send.
    ///
    /// # Errors
    ///
    /// Returns an error if no id can be generated.
    pub async fn new_conversation(&self) -> Result<String, ChatError> {
        let conversation_id = self.api.generate_conversation_id().await?;
        let mut store = self.store.lock();
        store.set_current_conversation_id(Some(ConversationSelector::canonical(
            conversation_id.clone(),
        )));
        store.clear_messages();
        tracing::info!(conversation_id = %conversation_id, "Started new conversation");
        Ok(conversation_id)
    }

    /// Load a conversation and make it current
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation cannot be fetched.
    pub async fn select_conversation(&self, conversation_id: &str) -> Result<(), ChatError> {
        let detail = self.loading(self.api.get_conversation(conversation_id)).await?;
        let key = if detail.conversation.conversation_id.is_empty() {
            conversation_id.to_string()
        } else {
            detail.conversation.conversation_id
        };

        let mut store = self.store.lock();
        tracing::debug!(conversation_id = %key, messages = detail.messages.len(), "Selected conversation");
        store.set_current_conversation_id(Some(ConversationSelector::canonical(key)));
        store.set_messages(detail.messages);
        Ok(())
    }

    /// Rename a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the rename.
    pub async fn rename_conversation(&self, conversation_id: &str, title: &str) -> Result<(), ChatError> {
        self.api.update_title(conversation_id, title).await?;
        self.store
            .lock()
            .update_conversation_by_key(conversation_id, &ConversationPatch::title(title));
        Ok(())
    }

    /// Delete a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the delete.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ChatError> {
        self.api.delete_conversation(conversation_id).await?;
        self.store.lock().remove_conversation(conversation_id);
        Ok(())
    }

    /// Send a user message and stream the reply into the store
    ///
    /// Starts a new conversation first when none is selected. Returns the
    /// exchange handle; progress lands in the store and on the event channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyMessage`] for blank text,
    /// [`ChatError::AlreadyStreaming`] while another reply is streaming, or an
    /// API error if a new conversation could not be started.
    pub async fn send_message(&self, text: &str) -> Result<StreamHandle, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let (streaming, needs_conversation) = {
            let store = self.store.lock();
            (store.is_streaming(), store.current_conversation_id().is_none())
        };
        if streaming {
            return Err(ChatError::AlreadyStreaming);
        }
        if needs_conversation {
            self.new_conversation().await?;
        }

        let (request, epoch) = {
            let mut store = self.store.lock();
            if store.is_streaming() {
                return Err(ChatError::AlreadyStreaming);
            }
            store.add_message(Message::user(text));
            store.add_message(Message::assistant_placeholder());
            store.set_streaming(true);
            let request = SendRequest::new(
                text,
                store.current_conversation_id(),
                store.selected_model_id().map(str::to_string),
            );
            (request, store.messages_epoch())
        };

        tracing::info!(
            conversation_id = %request.conversation_id,
            model_id = ?request.model_id,
            "Sending message"
        );

        let observer = StoreObserver::with_epoch(Arc::clone(&self.store), epoch)
            .with_events(self.events.clone())
            .with_refresh(Arc::clone(&self.api));
        Ok(self.transport.send(request, observer))
    }
}
