//! Streaming send transport
//!
//! One call to [`StreamingTransport::send`] posts a user message and streams
//! the assistant's reply back through a [`StreamObserver`]. The exchange runs
//! on its own tokio task; the caller keeps a [`StreamHandle`] to cancel it or
//! wait for its outcome.
//!
//! # Delivery rules
//!
//! - `on_chunk` always receives the whole body so far, never a delta, and
//!   only when it grew.
//! - `[DONE]` delivers the body once more, then `on_complete`.
//! - `[ERROR] msg` delivers `on_error(StreamError::Server(msg))`.
//! - Exactly one of `on_complete` / `on_error` fires per exchange. Anything
//!   that happens after it is dropped.
//! - The idle timeout bounds every wait on the server: response headers, an
//!   error body, and each body chunk.

use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::buffer::Utf8Accumulator;
use super::sentinel::{ExchangeState, Progress, SentinelScanner};
use crate::config::{ClientConfig, ConfigError};
use crate::conversation::ConversationSelector;

/// Path of the send endpoint under the API prefix
pub const SEND_PATH: &str = "send";

/// Why an exchange failed
#[derive(Debug, Error)]
pub enum StreamError {
    /// The server reported a failure in-band
    #[error("{0}")]
    Server(String),

    /// The server answered with a non-success status
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if readable
        body: String,
    },

    /// The request could not be sent
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The body stopped mid-way
    #[error("stream interrupted: {0}")]
    Interrupted(#[source] io::Error),

    /// Nothing arrived for too long
    #[error("no data from server for {0:?}")]
    IdleTimeout(Duration),

    /// The caller cancelled the exchange
    #[error("cancelled")]
    Cancelled,

    /// Nothing to send
    #[error("message is empty")]
    EmptyMessage,
}

/// Receives the progress of one exchange
///
/// Callbacks run on the exchange task, in arrival order.
pub trait StreamObserver: Send {
    /// The body grew; `cumulative` is everything received so far
    fn on_chunk(&mut self, cumulative: &str);

    /// The reply finished successfully
    fn on_complete(&mut self);

    /// The exchange failed
    fn on_error(&mut self, error: StreamError);
}

/// Observer assembled from three closures
pub struct Callbacks<C, D, E> {
    on_chunk: C,
    on_complete: D,
    on_error: E,
}

/// Build a [`StreamObserver`] from closures
pub fn callbacks<C, D, E>(on_chunk: C, on_complete: D, on_error: E) -> Callbacks<C, D, E>
where
    C: FnMut(&str) + Send,
    D: FnMut() + Send,
    E: FnMut(StreamError) + Send,
{
    Callbacks {
        on_chunk,
        on_complete,
        on_error,
    }
}

impl<C, D, E> StreamObserver for Callbacks<C, D, E>
where
    C: FnMut(&str) + Send,
    D: FnMut() + Send,
    E: FnMut(StreamError) + Send,
{
    fn on_chunk(&mut self, cumulative: &str) {
        (self.on_chunk)(cumulative);
    }

    fn on_complete(&mut self) {
        (self.on_complete)();
    }

    fn on_error(&mut self, error: StreamError) {
        (self.on_error)(error);
    }
}

/// Body of a send request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Target conversation in canonical string form (may be empty)
    pub conversation_id: String,
    /// Model key, or null for the server default
    pub model_id: Option<String>,
    /// User text
    pub message: String,
}

impl SendRequest {
    /// Build a request for the given selection
    ///
    /// No selection becomes an empty `conversationId`; the backend answers
    /// that with an in-band error.
    pub fn new(
        message: impl Into<String>,
        conversation: Option<&ConversationSelector>,
        model_id: Option<String>,
    ) -> Self {
        Self {
            conversation_id: conversation
                .map(ConversationSelector::to_wire)
                .unwrap_or_default(),
            model_id,
            message: message.into(),
        }
    }
}

/// Handle to a running exchange
#[derive(Debug)]
pub struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<ExchangeState>,
}

impl StreamHandle {
    /// Abort the exchange
    ///
    /// Before a terminal event this resolves the exchange with
    /// [`StreamError::Cancelled`]. Afterwards it does nothing.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the exchange task has finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the exchange to settle
    pub async fn wait(self) -> ExchangeState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "Exchange task aborted");
                ExchangeState::Failed(format!("exchange task aborted: {e}"))
            }
        }
    }
}

/// Opens streaming send requests
#[derive(Clone, Debug)]
pub struct StreamingTransport {
    http_client: reqwest::Client,
    send_url: reqwest::Url,
    auth: Option<(String, String)>,
    idle_timeout: Duration,
}

impl StreamingTransport {
    /// Transport posting to `send_url`
    #[must_use]
    pub fn new(http_client: reqwest::Client, send_url: reqwest::Url) -> Self {
        Self {
            http_client,
            send_url,
            auth: None,
            idle_timeout: Duration::from_secs(60),
        }
    }

    /// Transport configured from client settings
    ///
    /// # Errors
    ///
    /// Returns an error if the send endpoint URL cannot be built.
    pub fn from_config(
        config: &ClientConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let mut transport = Self::new(http_client, config.endpoint(SEND_PATH)?)
            .with_idle_timeout(config.idle_timeout);
        if let Some((header, token)) = config.auth.header_pair() {
            transport = transport.with_auth(header, token);
        }
        Ok(transport)
    }

    /// Attach an auth header to every request
    #[must_use]
    pub fn with_auth(mut self, header: impl Into<String>, token: impl Into<String>) -> Self {
        self.auth = Some((header.into(), token.into()));
        self
    }

    /// Set how long the server may stay silent
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Send endpoint
    #[must_use]
    pub fn send_url(&self) -> &reqwest::Url {
        &self.send_url
    }

    /// Start an exchange
    ///
    /// Returns immediately. Must be called from within a tokio runtime.
    pub fn send<O>(&self, request: SendRequest, observer: O) -> StreamHandle
    where
        O: StreamObserver + 'static,
    {
        let cancel = CancellationToken::new();
        let transport = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { transport.run(request, observer, token).await });
        StreamHandle { cancel, task }
    }

    async fn run<O: StreamObserver>(
        self,
        request: SendRequest,
        mut observer: O,
        cancel: CancellationToken,
    ) -> ExchangeState {
        let mut scanner = SentinelScanner::new();

        if request.message.trim().is_empty() {
            return settle_failure(&mut scanner, &mut observer, StreamError::EmptyMessage);
        }

        tracing::debug!(
            conversation_id = %request.conversation_id,
            model_id = ?request.model_id,
            chars = request.message.chars().count(),
            "Opening reply stream"
        );

        let mut builder = self.http_client.post(self.send_url.clone()).json(&request);
        if let Some((ref header, ref token)) = self.auth {
            builder = builder.header(header.as_str(), token.as_str());
        }

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return settle_failure(&mut scanner, &mut observer, StreamError::Cancelled);
            }
            result = tokio::time::timeout(self.idle_timeout, builder.send()) => match result {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return settle_failure(&mut scanner, &mut observer, StreamError::Request(e)),
                Err(_) => {
                    return settle_failure(
                        &mut scanner,
                        &mut observer,
                        StreamError::IdleTimeout(self.idle_timeout),
                    );
                }
            },
        };

        let status = response.status();
        if !status.is_success() {
            // Error bodies are informational; a silent one is dropped
            let body = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return settle_failure(&mut scanner, &mut observer, StreamError::Cancelled);
                }
                read = tokio::time::timeout(self.idle_timeout, response.text()) => {
                    read.ok().and_then(Result::ok).unwrap_or_default()
                }
            };
            return settle_failure(
                &mut scanner,
                &mut observer,
                StreamError::Status {
                    status: status.as_u16(),
                    body,
                },
            );
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::Interrupted(io::Error::other(e))));

        drive(body, scanner, &mut observer, &cancel, self.idle_timeout).await
    }
}

/// Feed a reply body through the sentinel protocol
///
/// This is the whole exchange after the response headers arrived. It is
/// public so other byte sources (tests, proxies) can reuse the protocol.
pub async fn consume_stream<S, O>(
    body: S,
    observer: &mut O,
    cancel: &CancellationToken,
    idle_timeout: Duration,
) -> ExchangeState
where
    S: Stream<Item = Result<Bytes, StreamError>>,
    O: StreamObserver + ?Sized,
{
    drive(body, SentinelScanner::new(), observer, cancel, idle_timeout).await
}

async fn drive<S, O>(
    body: S,
    mut scanner: SentinelScanner,
    observer: &mut O,
    cancel: &CancellationToken,
    idle_timeout: Duration,
) -> ExchangeState
where
    S: Stream<Item = Result<Bytes, StreamError>>,
    O: StreamObserver + ?Sized,
{
    tokio::pin!(body);
    let mut buffer = Utf8Accumulator::new();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return settle_failure(&mut scanner, observer, StreamError::Cancelled);
            }
            next = tokio::time::timeout(idle_timeout, body.next()) => next,
        };

        match next {
            Err(_) => {
                return settle_failure(&mut scanner, observer, StreamError::IdleTimeout(idle_timeout));
            }
            Ok(Some(Err(e))) => return settle_failure(&mut scanner, observer, e),
            Ok(Some(Ok(bytes))) => {
                buffer.push(&bytes);
                if let Some(state) = deliver(&mut scanner, observer, buffer.text(), cancel) {
                    return state;
                }
            }
            Ok(None) => {
                if buffer.finish() {
                    if let Some(state) = deliver(&mut scanner, observer, buffer.text(), cancel) {
                        return state;
                    }
                }
                if scanner.complete() {
                    tracing::info!(bytes = buffer.text().len(), "Reply stream ended without marker");
                    observer.on_complete();
                }
                return scanner.state().clone();
            }
        }
    }
}

/// Apply one notification; returns the final state if it was terminal
fn deliver<O: StreamObserver + ?Sized>(
    scanner: &mut SentinelScanner,
    observer: &mut O,
    text: &str,
    cancel: &CancellationToken,
) -> Option<ExchangeState> {
    match scanner.observe(text) {
        Progress::Unchanged => None,
        Progress::Chunk => {
            observer.on_chunk(text);
            None
        }
        Progress::Done => {
            observer.on_chunk(text);
            observer.on_complete();
            tracing::info!(bytes = text.len(), "Reply stream completed");
            cancel.cancel();
            Some(ExchangeState::Completed)
        }
        Progress::Error(message) => {
            tracing::warn!(error = %message, "Server reported stream error");
            let state = ExchangeState::Failed(message.clone());
            observer.on_error(StreamError::Server(message));
            cancel.cancel();
            Some(state)
        }
    }
}

fn settle_failure<O: StreamObserver + ?Sized>(
    scanner: &mut SentinelScanner,
    observer: &mut O,
    error: StreamError,
) -> ExchangeState {
    if scanner.fail(error.to_string()) {
        tracing::warn!(error = %error, "Reply stream failed");
        observer.on_error(error);
    } else {
        tracing::debug!(error = %error, "Ignoring failure after terminal event");
    }
    scanner.state().clone()
}
