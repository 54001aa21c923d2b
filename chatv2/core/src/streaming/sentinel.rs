//! In-band sentinel scanning
//!
//! The send endpoint streams plain text. Control signals travel in the same
//! text as bracketed markers:
//!
//! - `[DONE]` ends the reply successfully
//! - `[ERROR] <message>` ends it with a failure
//! - `[HEARTBEAT]` keeps the connection alive while the model is thinking
//!
//! Markers are searched for in the whole cumulative body on every
//! notification, so a marker split across two network chunks is still found.

/// Success marker
pub const DONE_MARKER: &str = "[DONE]";
/// Failure marker
pub const ERROR_MARKER: &str = "[ERROR]";
/// Keep-alive marker
pub const HEARTBEAT_MARKER: &str = "[HEARTBEAT]";

/// Reported when an `[ERROR]` marker carries no readable message
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Lifecycle of one send/stream exchange
///
/// Starts `Pending` and moves to exactly one terminal state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    /// No terminal event yet
    Pending,
    /// Finished successfully
    Completed,
    /// Finished with a failure
    Failed(String),
}

impl ExchangeState {
    /// Whether a terminal event has been delivered
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// What one notification means for the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Nothing to deliver
    Unchanged,
    /// The buffer grew; deliver it
    Chunk,
    /// `[DONE]` seen; deliver the buffer once more, then complete
    Done,
    /// `[ERROR]` seen, with the extracted message
    Error(String),
}

/// Tracks one exchange over its cumulative body
#[derive(Debug)]
pub struct SentinelScanner {
    last_observed_len: usize,
    state: ExchangeState,
}

impl Default for SentinelScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SentinelScanner {
    /// Fresh scanner for a new exchange
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_observed_len: 0,
            state: ExchangeState::Pending,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    /// Classify a notification carrying the whole body received so far
    ///
    /// `[DONE]` wins over `[ERROR]` when both are present. Once terminal,
    /// every further call returns [`Progress::Unchanged`].
    pub fn observe(&mut self, buffer: &str) -> Progress {
        if self.state.is_terminal() {
            return Progress::Unchanged;
        }

        if buffer.contains(DONE_MARKER) {
            self.state = ExchangeState::Completed;
            return Progress::Done;
        }

        if buffer.contains(ERROR_MARKER) {
            let message = extract_error_message(buffer).unwrap_or(UNKNOWN_ERROR).to_string();
            self.state = ExchangeState::Failed(message.clone());
            return Progress::Error(message);
        }

        if buffer.len() > self.last_observed_len {
            self.last_observed_len = buffer.len();
            Progress::Chunk
        } else {
            Progress::Unchanged
        }
    }

    /// Body ended cleanly; returns true if completion should be reported
    pub fn complete(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = ExchangeState::Completed;
        true
    }

    /// Exchange failed; returns true if the failure should be reported
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = ExchangeState::Failed(reason.into());
        true
    }
}

/// Message carried by the first `[ERROR] ` marker with text after it
///
/// The message runs to the end of its line. Returns `None` when no marker
/// has any text following it.
#[must_use]
pub fn extract_error_message(text: &str) -> Option<&str> {
    let prefix = "[ERROR] ";
    text.match_indices(prefix).find_map(|(idx, _)| {
        let rest = &text[idx + prefix.len()..];
        let end = rest.find(|c: char| c == '\n' || c == '\r').unwrap_or(rest.len());
        let message = &rest[..end];
        (!message.is_empty()).then_some(message)
    })
}

/// Remove `[DONE]` and `[HEARTBEAT]` markers for display
///
/// A trailing fragment that could still grow into a marker (`[HEART`,
/// `[ERR`) is held back too. It reappears once the next chunk shows it was
/// ordinary text.
#[must_use]
pub fn strip_markers(text: &str) -> String {
    let mut visible = text.replace(DONE_MARKER, "").replace(HEARTBEAT_MARKER, "");
    if let Some(idx) = visible.rfind('[') {
        let tail = &visible[idx..];
        let partial = [DONE_MARKER, ERROR_MARKER, HEARTBEAT_MARKER]
            .iter()
            .any(|marker| marker.len() > tail.len() && marker.starts_with(tail));
        if partial {
            visible.truncate(idx);
        }
    }
    visible.truncate(visible.trim_end().len());
    visible
}
