//! Conversation Store
//!
//! The canonical in-memory view of everything the chat client shows:
//! the conversation list, the messages of the loaded conversation, the model
//! catalogue, and the transient streaming/loading flags.
//!
//! # Design Philosophy
//!
//! The store is plain data plus synchronous mutators. It does no I/O and never
//! panics: every operation on a missing key is a no-op. Backend round trips
//! happen elsewhere (see [`crate::chat::ChatSession`]) and feed their results
//! in here. There is no global instance; whoever owns the UI lifecycle owns a
//! store and passes it around explicitly.
//!
//! Ordering of the conversation list is most-recent-first.

use crate::conversation::{self, Conversation, ConversationPatch, ConversationSelector};
use crate::messages::Message;
use crate::models::ModelInfo;

/// In-memory chat state
#[derive(Clone, Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    current_conversation: Option<ConversationSelector>,
    messages: Vec<Message>,
    models: Vec<ModelInfo>,
    selected_model_id: Option<String>,
    streaming: bool,
    loading: bool,
    /// Bumped whenever `messages` is replaced wholesale
    messages_epoch: u64,
}

impl ConversationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================
    // Read-only views
    // ============================================

    /// Conversations, most recent first
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Current selection, in whichever form it was made
    #[must_use]
    pub fn current_conversation_id(&self) -> Option<&ConversationSelector> {
        self.current_conversation.as_ref()
    }

    /// The selected conversation, if it is in the list
    #[must_use]
    pub fn current_conversation(&self) -> Option<&Conversation> {
        let selector = self.current_conversation.as_ref()?;
        conversation::resolve(&self.conversations, selector)
    }

    /// Messages of the loaded conversation
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Last message, usually the streaming assistant turn
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether any message is loaded
    #[must_use]
    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    /// Generation counter of the message list
    ///
    /// Changes every time the list is replaced wholesale (switching,
    /// clearing, deleting the selected conversation, reset). Appends and
    /// in-place edits keep it unchanged.
    #[must_use]
    pub fn messages_epoch(&self) -> u64 {
        self.messages_epoch
    }

    /// Available models
    #[must_use]
    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    /// Selected model key
    #[must_use]
    pub fn selected_model_id(&self) -> Option<&str> {
        self.selected_model_id.as_deref()
    }

    /// The selected model, if it is in the catalogue
    #[must_use]
    pub fn current_model(&self) -> Option<&ModelInfo> {
        let id = self.selected_model_id.as_deref()?;
        self.models.iter().find(|m| m.id == id)
    }

    /// Whether a reply is streaming
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Whether a round trip is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    // ============================================
    // Conversation list
    // ============================================

    /// Replace the conversation list
    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    /// Insert a conversation at the front
    pub fn add_conversation(&mut self, conversation: Conversation) {
        self.conversations.insert(0, conversation);
    }

    /// Merge `patch` into the conversation with legacy id `id`
    pub fn update_conversation(&mut self, id: i64, patch: &ConversationPatch) {
        self.update_matching(&ConversationSelector::Legacy(id), patch);
    }

    /// Merge `patch` into the conversation with canonical key `conversation_id`
    pub fn update_conversation_by_key(&mut self, conversation_id: &str, patch: &ConversationPatch) {
        self.update_matching(&ConversationSelector::canonical(conversation_id), patch);
    }

    /// Remove the conversation with legacy id `id`
    ///
    /// If it was the selected one, the selection and message list are
    /// cleared as well.
    pub fn delete_conversation(&mut self, id: i64) {
        self.remove_matching(&ConversationSelector::Legacy(id));
    }

    /// Remove the conversation with canonical key `conversation_id`
    ///
    /// Same selection handling as [`delete_conversation`](Self::delete_conversation).
    pub fn remove_conversation(&mut self, conversation_id: &str) {
        self.remove_matching(&ConversationSelector::canonical(conversation_id));
    }

    fn update_matching(&mut self, selector: &ConversationSelector, patch: &ConversationPatch) {
        match conversation::position(&self.conversations, selector) {
            Some(idx) => self.conversations[idx].apply(patch),
            None => tracing::debug!(conversation = %selector, "Update for unknown conversation ignored"),
        }
    }

    fn remove_matching(&mut self, selector: &ConversationSelector) {
        let mut removed = Vec::new();
        self.conversations.retain(|c| {
            if selector.matches(c) {
                removed.push(c.clone());
                false
            } else {
                true
            }
        });

        let was_selected = self
            .current_conversation
            .as_ref()
            .is_some_and(|current| removed.iter().any(|c| current.matches(c)));

        if was_selected {
            self.current_conversation = None;
            self.replace_messages(Vec::new());
        }

        tracing::debug!(
            conversation = %selector,
            removed = removed.len(),
            cleared_selection = was_selected,
            "Removed conversation"
        );
    }

    // ============================================
    // Selection
    // ============================================

    /// Select a conversation by either identifier form, or clear the selection
    pub fn set_current_conversation_id(&mut self, selector: Option<ConversationSelector>) {
        self.current_conversation = selector;
    }

    // ============================================
    // Messages
    // ============================================

    /// Replace the message list (used when switching conversations)
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.replace_messages(messages);
    }

    /// Append one message
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append `text` to the last message's content
    ///
    /// No-op when there are no messages; callers seed a placeholder before
    /// streaming begins.
    pub fn update_last_message(&mut self, text: &str) {
        if let Some(last) = self.messages.last_mut() {
            last.content.push_str(text);
        }
    }

    /// Overwrite the last message's content
    pub fn replace_last_message(&mut self, content: &str) {
        if let Some(last) = self.messages.last_mut() {
            last.content.clear();
            last.content.push_str(content);
        }
    }

    /// Mark the last message as no longer streaming
    pub fn finish_last_message(&mut self) {
        if let Some(last) = self.messages.last_mut() {
            last.is_streaming = false;
        }
    }

    /// Drop all messages
    pub fn clear_messages(&mut self) {
        self.replace_messages(Vec::new());
    }

    fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.messages_epoch = self.messages_epoch.wrapping_add(1);
    }

    // ============================================
    // Models and flags
    // ============================================

    /// Replace the model catalogue
    pub fn set_models(&mut self, models: Vec<ModelInfo>) {
        self.models = models;
    }

    /// Select a model by key
    pub fn set_selected_model(&mut self, model_id: Option<String>) {
        self.selected_model_id = model_id;
    }

    /// Set the streaming flag
    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    /// Set the loading flag
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Wipe everything back to initial values
    pub fn reset(&mut self) {
        self.conversations.clear();
        self.current_conversation = None;
        self.models.clear();
        self.selected_model_id = None;
        self.streaming = false;
        self.loading = false;
        self.replace_messages(Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageRole;
    use pretty_assertions::assert_eq;

    fn conv(id: i64, key: &str) -> Conversation {
        Conversation {
            id: Some(id),
            title: format!("title {key}"),
            ..Conversation::new(key)
        }
    }

    fn store_with(convs: Vec<Conversation>) -> ConversationStore {
        let mut store = ConversationStore::new();
        store.set_conversations(convs);
        store
    }

    #[test]
    fn test_add_conversation_prepends() {
        let mut store = store_with(vec![conv(1, "c1")]);
        store.add_conversation(conv(2, "c2"));

        let keys: Vec<_> = store.conversations().iter().map(|c| c.conversation_id.as_str()).collect();
        assert_eq!(keys, vec!["c2", "c1"]);
    }

    #[test]
    fn test_update_conversation_by_legacy_id() {
        let mut store = store_with(vec![conv(1, "c1"), conv(2, "c2")]);
        store.update_conversation(2, &ConversationPatch::title("Renamed"));

        assert_eq!(store.conversations()[1].title, "Renamed");
        assert_eq!(store.conversations()[0].title, "title c1");
    }

    #[test]
    fn test_update_unknown_conversation_is_noop() {
        let mut store = store_with(vec![conv(1, "c1")]);
        let before = store.conversations().to_vec();
        store.update_conversation(99, &ConversationPatch::title("nope"));
        store.update_conversation_by_key("missing", &ConversationPatch::title("nope"));
        assert_eq!(store.conversations(), before.as_slice());
    }

    #[test]
    fn test_delete_selected_conversation_clears_selection_and_messages() {
        let mut store = store_with(vec![conv(1, "c1"), conv(2, "c2")]);
        store.set_current_conversation_id(Some(ConversationSelector::canonical("c1")));
        store.add_message(Message::user("hi"));

        store.delete_conversation(1);

        assert!(store.current_conversation_id().is_none());
        assert!(store.messages().is_empty());
        assert_eq!(store.conversations().len(), 1);
    }

    #[test]
    fn test_delete_selected_by_legacy_selector_also_clears() {
        let mut store = store_with(vec![conv(1, "c1")]);
        store.set_current_conversation_id(Some(ConversationSelector::Legacy(1)));
        store.add_message(Message::user("hi"));

        store.delete_conversation(1);

        assert!(store.current_conversation_id().is_none());
        assert!(!store.has_messages());
    }

    #[test]
    fn test_delete_other_conversation_keeps_selection() {
        let mut store = store_with(vec![conv(1, "c1"), conv(2, "c2")]);
        store.set_current_conversation_id(Some(ConversationSelector::canonical("c1")));
        store.add_message(Message::user("hi"));
        let epoch = store.messages_epoch();

        store.delete_conversation(2);

        assert_eq!(
            store.current_conversation_id(),
            Some(&ConversationSelector::canonical("c1"))
        );
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages_epoch(), epoch);
    }

    #[test]
    fn test_remove_conversation_by_key() {
        let mut store = store_with(vec![conv(1, "c1"), Conversation::new("fresh")]);
        store.set_current_conversation_id(Some("fresh".into()));

        store.remove_conversation("fresh");

        assert_eq!(store.conversations().len(), 1);
        assert!(store.current_conversation().is_none());
        assert!(store.current_conversation_id().is_none());
    }

    #[test]
    fn test_current_conversation_resolution() {
        let mut store = store_with(vec![conv(1, "c1"), conv(2, "c2")]);
        assert!(store.current_conversation().is_none());

        store.set_current_conversation_id(Some("c2".into()));
        assert_eq!(store.current_conversation().unwrap().id, Some(2));

        store.set_current_conversation_id(Some(1.into()));
        assert_eq!(store.current_conversation().unwrap().conversation_id, "c1");

        // Selected but not listed yet (brand-new conversation)
        store.set_current_conversation_id(Some("c3".into()));
        assert!(store.current_conversation().is_none());
    }

    #[test]
    fn test_update_last_message_on_empty_is_noop() {
        let mut store = ConversationStore::new();
        store.update_last_message("ignored");
        store.replace_last_message("ignored");
        store.finish_last_message();
        assert_eq!(store.messages().len(), 0);
    }

    #[test]
    fn test_update_last_message_appends() {
        let mut store = ConversationStore::new();
        store.add_message(Message::user("hi"));
        store.add_message(Message::assistant_placeholder());

        store.update_last_message("Hel");
        store.update_last_message("lo");

        assert_eq!(store.messages()[0].content, "hi");
        assert_eq!(store.last_message().unwrap().content, "Hello");
        assert!(store.last_message().unwrap().is_streaming);

        store.replace_last_message("Bye");
        store.finish_last_message();
        let last = store.last_message().unwrap();
        assert_eq!(last.content, "Bye");
        assert_eq!(last.role, MessageRole::Assistant);
        assert!(!last.is_streaming);
    }

    #[test]
    fn test_messages_epoch_tracks_wholesale_replacement() {
        let mut store = ConversationStore::new();
        let start = store.messages_epoch();

        store.add_message(Message::user("a"));
        store.update_last_message("b");
        assert_eq!(store.messages_epoch(), start);

        store.set_messages(vec![Message::user("x")]);
        assert_eq!(store.messages_epoch(), start + 1);

        store.clear_messages();
        assert_eq!(store.messages_epoch(), start + 2);
    }

    #[test]
    fn test_current_model() {
        let mut store = ConversationStore::new();
        store.set_models(vec![
            ModelInfo { id: "a".into(), ..Default::default() },
            ModelInfo { id: "b".into(), ..Default::default() },
        ]);
        assert!(store.current_model().is_none());

        store.set_selected_model(Some("b".into()));
        assert_eq!(store.current_model().unwrap().id, "b");

        store.set_selected_model(Some("gone".into()));
        assert!(store.current_model().is_none());
    }

    #[test]
    fn test_reset_wipes_state() {
        let mut store = store_with(vec![conv(1, "c1")]);
        store.set_current_conversation_id(Some("c1".into()));
        store.add_message(Message::user("hi"));
        store.set_selected_model(Some("m".into()));
        store.set_streaming(true);
        store.set_loading(true);

        store.reset();

        assert!(store.conversations().is_empty());
        assert!(store.current_conversation_id().is_none());
        assert!(store.messages().is_empty());
        assert!(store.selected_model_id().is_none());
        assert!(!store.is_streaming());
        assert!(!store.is_loading());
    }
}
