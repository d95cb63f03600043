//! Event-source transport.
//!
//! Drives one server-push connection: connects, hands the response and every
//! frame to an [`EventSourceHooks`] implementation, and reconnects after
//! errors the hooks do not turn fatal. The hooks own every policy decision;
//! this module only owns the wire.
//!
//! Across reconnects the transport remembers the last frame `id` (sent back
//! as `Last-Event-ID`, cleared by an empty `id:`) and the last `retry` value
//! (used when the hooks do not supply their own delay).

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::StreamError;
use crate::http::{apply_headers, build_stream_client, has_header};
use crate::model::EventSourceMessage;
use crate::options::{StreamOptions, EVENT_STREAM_CONTENT_TYPE};
use crate::sse::SSEResponseExt;

/// Header carrying the last seen event id on reconnect.
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Lifecycle hooks called by [`run_event_source`].
///
/// An error returned from `on_open` or `on_message` is passed to `on_error`,
/// which decides whether the transport reconnects.
pub trait EventSourceHooks {
    /// Inspect a fresh response before any frame is read.
    fn on_open(&mut self, status: StatusCode, content_type: Option<&str>) -> Result<(), StreamError>;

    /// Handle one dispatched frame.
    fn on_message(&mut self, frame: EventSourceMessage) -> Result<(), StreamError>;

    /// Decide what follows a failure.
    ///
    /// `Ok(Some(delay))` reconnects after `delay`, `Ok(None)` reconnects after
    /// the transport's current retry interval, `Err` ends the stream.
    fn on_error(&mut self, error: StreamError) -> Result<Option<Duration>, StreamError>;

    /// The server ended the response body.
    fn on_close(&mut self) {}
}

/// Connection parameters for one event source.
#[derive(Debug, Clone)]
pub struct EventSource {
    pub url: String,
    pub method: Method,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    /// Bounds each connection attempt, not the response body
    pub connect_timeout: Option<Duration>,
    pub proxy: Option<String>,
    pub retry_interval: Duration,
    /// Present only when the stream pauses while hidden
    pub visibility: Option<watch::Receiver<bool>>,
}

impl EventSource {
    pub fn new(url: impl Into<String>, options: &StreamOptions) -> Self {
        let mut headers = options.headers();
        if !has_header(&headers, "Accept") {
            headers.insert("Accept".to_string(), EVENT_STREAM_CONTENT_TYPE.to_string());
        }

        let visibility = if options.transport.open_when_hidden {
            None
        } else {
            options.transport.visibility.clone()
        };

        Self {
            url: url.into(),
            method: options.method(),
            headers,
            body: options.body.clone(),
            connect_timeout: options.timeout,
            proxy: options.proxy.clone(),
            retry_interval: options.transport.retry_interval,
            visibility,
        }
    }
}

#[derive(Debug)]
struct ConnectionState {
    retry_interval: Duration,
    last_event_id: Option<String>,
}

enum Outcome {
    Closed,
    Hidden,
    Failed(StreamError),
}

/// Run an event source until it closes, fails fatally, or `signal` fires.
///
/// Cancellation ends the stream with `Ok(())` and without `on_close`; no
/// frame reaches the hooks once `signal` has fired.
pub async fn run_event_source<H: EventSourceHooks>(
    source: EventSource,
    hooks: &mut H,
    signal: CancellationToken,
) -> Result<(), StreamError> {
    let http_client = build_stream_client(source.connect_timeout, source.proxy.as_deref())?;
    let mut visibility = source.visibility.clone();
    let mut state = ConnectionState {
        retry_interval: source.retry_interval,
        last_event_id: None,
    };

    loop {
        if let Some(rx) = visibility.as_mut() {
            let visible = tokio::select! {
                biased;
                _ = signal.cancelled() => return Ok(()),
                visible = wait_visible(rx) => visible,
            };
            if !visible {
                // Sender gone, nothing left to pause for
                visibility = None;
            }
        }

        let request = build_request(&http_client, &source, &state);
        debug!("Connecting to event stream {}", source.url);

        let outcome = tokio::select! {
            biased;
            _ = signal.cancelled() => return Ok(()),
            _ = wait_hidden(&mut visibility) => Outcome::Hidden,
            result = connect_and_read(request, hooks, &mut state, &signal) => match result {
                Ok(()) => Outcome::Closed,
                Err(e) => Outcome::Failed(e),
            },
        };

        if signal.is_cancelled() {
            return Ok(());
        }

        match outcome {
            Outcome::Closed => {
                info!("Event stream {} closed by server", source.url);
                hooks.on_close();
                return Ok(());
            }
            Outcome::Hidden => {
                debug!("Event stream {} paused while hidden", source.url);
            }
            Outcome::Failed(e) => {
                let delay = hooks.on_error(e)?.unwrap_or(state.retry_interval);
                warn!(
                    "Event stream {} failed, reconnecting in {}ms",
                    source.url,
                    delay.as_millis()
                );

                tokio::select! {
                    biased;
                    _ = signal.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

fn build_request(
    http_client: &reqwest::Client,
    source: &EventSource,
    state: &ConnectionState,
) -> RequestBuilder {
    let mut request = http_client.request(source.method.clone(), &source.url);
    request = apply_headers(request, &source.headers);

    if let Some(id) = &state.last_event_id {
        request = request.header(LAST_EVENT_ID_HEADER, id);
    }
    if let Some(body) = &source.body {
        request = request.body(body.clone());
    }

    request
}

async fn connect_and_read<H: EventSourceHooks>(
    request: RequestBuilder,
    hooks: &mut H,
    state: &mut ConnectionState,
    signal: &CancellationToken,
) -> Result<(), StreamError> {
    let response = request.send().await?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    hooks.on_open(response.status(), content_type.as_deref())?;

    let mut frames = std::pin::pin!(response.sse());
    while let Some(frame) = frames.next().await {
        let frame = frame?;

        if let Some(id) = &frame.id {
            // An empty id clears the one sent on reconnect
            state.last_event_id = (!id.is_empty()).then(|| id.clone());
        }
        if let Some(retry) = frame.retry {
            state.retry_interval = Duration::from_millis(retry);
        }

        if signal.is_cancelled() {
            return Ok(());
        }
        hooks.on_message(frame)?;
    }

    Ok(())
}

/// Resolves `true` once visible, `false` if the sender was dropped.
async fn wait_visible(rx: &mut watch::Receiver<bool>) -> bool {
    rx.wait_for(|visible| *visible).await.is_ok()
}

/// Resolves once the consumer turns hidden; never resolves without a receiver.
async fn wait_hidden(visibility: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = visibility {
        if rx.wait_for(|visible| !*visible).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_header_added() {
        let source = EventSource::new("http://localhost/stream", &StreamOptions::default());
        assert_eq!(source.headers["Accept"], EVENT_STREAM_CONTENT_TYPE);
        assert_eq!(source.headers["Content-Type"], "application/json");
    }

    #[test]
    fn test_caller_accept_header_kept() {
        let options = StreamOptions::new().with_header("accept", "*/*");
        let source = EventSource::new("http://localhost/stream", &options);
        assert_eq!(source.headers["accept"], "*/*");
        assert!(!source.headers.contains_key("Accept"));
    }

    #[test]
    fn test_visibility_ignored_when_open_when_hidden() {
        let (_tx, rx) = watch::channel(false);
        let mut options = StreamOptions::new().with_visibility(rx);
        assert!(EventSource::new("u", &options).visibility.is_some());

        options.transport.open_when_hidden = true;
        assert!(EventSource::new("u", &options).visibility.is_none());
    }

    #[test]
    fn test_last_event_id_sent() {
        let client = reqwest::Client::new();
        let source = EventSource::new("http://localhost/stream", &StreamOptions::default());
        let state = ConnectionState {
            retry_interval: Duration::from_secs(1),
            last_event_id: Some("41".to_string()),
        };

        let request = build_request(&client, &source, &state).build().unwrap();
        assert_eq!(request.headers()[LAST_EVENT_ID_HEADER], "41");
        assert_eq!(request.method(), &Method::GET);
    }

    #[tokio::test]
    async fn test_wait_hidden_without_receiver_never_resolves() {
        let mut visibility = None;
        let waited =
            tokio::time::timeout(Duration::from_millis(20), wait_hidden(&mut visibility)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_wait_visible_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        assert!(!wait_visible(&mut rx).await);
    }
}
