//! Streaming Replies
//!
//! The send endpoint answers with a plain-text body that grows while the model
//! generates. Control signals are embedded in that text as markers, so the
//! client has to re-read the whole body on every network chunk to find them.
//!
//! # Architecture
//!
//! ```text
//!   POST /send ──► bytes_stream ──► Utf8Accumulator ──► SentinelScanner
//!                                   (cumulative text)     │
//!                                                         ├─ Chunk  ─► on_chunk(full text)
//!                                                         ├─ Done   ─► on_chunk + on_complete
//!                                                         └─ Error  ─► on_error(Server(msg))
//! ```
//!
//! Each exchange owns a `CancellationToken`. Reaching a marker cancels it to
//! drop the connection; the caller can cancel it too through [`StreamHandle`].
//!
//! # Example
//!
//! ```ignore
//! use chatv2_core::streaming::{callbacks, SendRequest, StreamingTransport};
//!
//! let transport = StreamingTransport::from_config(&config, config.http_client()?)?;
//! let handle = transport.send(
//!     SendRequest::new("Hello", Some(&selector), None),
//!     callbacks(
//!         |text| println!("{text}"),
//!         || println!("done"),
//!         |err| eprintln!("failed: {err}"),
//!     ),
//! );
//! let outcome = handle.wait().await;
//! ```

mod buffer;
mod sentinel;
mod transport;

pub use buffer::Utf8Accumulator;
pub use sentinel::{
    extract_error_message, strip_markers, ExchangeState, Progress, SentinelScanner, DONE_MARKER,
    ERROR_MARKER, HEARTBEAT_MARKER, UNKNOWN_ERROR,
};
pub use transport::{
    callbacks, consume_stream, Callbacks, SendRequest, StreamError, StreamHandle, StreamObserver,
    StreamingTransport, SEND_PATH,
};
