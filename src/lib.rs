//! # chatwire - JSON and Server-Sent Events client helpers
//!
//! A small library for talking to a chat backend: one-shot JSON requests and
//! long-lived server-push streams with retry and fatal error handling.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Typed results for JSON requests; failures are reported, never swallowed
//! - Event stream consumer with retriable/fatal error classification,
//!   `FatalError` and `finish` control events, `Last-Event-ID` resume and
//!   cancellation
//! - Incremental SSE frame parser usable on its own
//!
//! ## Architecture
//!
//! - **`request`**: `api_request` for single calls, `ApiClient` for repeated ones
//! - **`stream`**: `fetch_sse` and the decisions taken at each stream hook
//! - **`source`**: the reconnecting event-source transport driving those hooks
//! - **`sse`**: byte-level framing into `EventSourceMessage`
//! - **`options`**: `TransportOptions` with its `RequestOptions` / `StreamOptions` forms
//!
//! ## Example
//! ```no_run
//! use chatwire::model::ChatMessage;
//! use chatwire::options::{RequestOptions, StreamOptions};
//! use chatwire::stream::{fetch_sse, FnCallbacks};
//! use chatwire::request::api_request;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sessions = api_request("http://localhost:8080/sessions", &RequestOptions::default()).await?;
//!     println!("{}", sessions);
//!
//!     let options = StreamOptions::new()
//!         .with_method(reqwest::Method::POST)
//!         .with_json(&serde_json::json!({"question": "Hello!"}))?;
//!
//!     let callbacks = FnCallbacks::new(|msg: ChatMessage| {
//!         if let Some(token) = msg.token {
//!             print!("{}", token);
//!         }
//!     })
//!     .with_on_error(|err| eprintln!("stream error, retrying: {}", err));
//!
//!     fetch_sse("http://localhost:8080/chat", options, callbacks)
//!         .join()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod request;
pub mod source;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{ClientError, StreamError};
pub use model::{ChatMessage, EventSourceMessage};
pub use options::{FinishPayload, RequestOptions, StreamOptions, StreamTransport, TransportOptions};
pub use request::{api_request, api_request_as, ApiClient};
pub use stream::{fetch_sse, FnCallbacks, StreamCallbacks, StreamHandle};
