//! Option structures for the request and stream clients.
//!
//! Both clients share [`TransportOptions`], which holds the HTTP settings
//! (method, headers, body, timeout, proxy) and their builders. The type
//! parameter carries what only one client needs: nothing for a plain request,
//! [`StreamTransport`] for a server-push stream.
//!
//! A field left at `None` falls back to the default, a field set by the
//! caller replaces the default for that field as a whole. In particular
//! `headers: Some(map)` replaces the default `Content-Type: application/json`
//! entry rather than merging into it.

use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Media type sent as the default `Content-Type`.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Media type a server-push stream must answer with.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Advisory reconnect delay handed back to the transport after a retriable error.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10_000);

/// Header set used when the caller supplies none.
pub fn default_headers() -> HashMap<String, String> {
    HashMap::from([("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string())])
}

/// Resolve the header set for a request.
///
/// Caller headers win at the top level: when present they are used verbatim
/// and the defaults are not consulted.
pub fn resolve_headers(headers: &Option<HashMap<String, String>>) -> HashMap<String, String> {
    match headers {
        Some(headers) => headers.clone(),
        None => default_headers(),
    }
}

/// HTTP settings shared by both clients, plus client-specific settings in
/// `transport`.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions<T> {
    /// HTTP method, `GET` when unset
    pub method: Option<Method>,

    /// Request headers; replaces the default JSON content type when set
    pub headers: Option<HashMap<String, String>>,

    /// Raw request body; a stream sends it on every (re)connect
    pub body: Option<String>,

    /// A plain request is bounded as a whole. A stream bounds each
    /// connection attempt only, so a long-lived body is never cut.
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Client-specific settings
    pub transport: T,
}

/// Options for a single JSON request.
///
/// # Example
/// ```rust
/// use chatwire::options::RequestOptions;
/// use reqwest::Method;
///
/// let options = RequestOptions::new()
///     .with_method(Method::POST)
///     .with_json(&serde_json::json!({"question": "hi"}))
///     .unwrap();
/// assert_eq!(options.method(), Method::POST);
/// ```
pub type RequestOptions = TransportOptions<()>;

/// Options for a server-push event stream.
pub type StreamOptions = TransportOptions<StreamTransport>;

impl<T: Default> TransportOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> TransportOptions<T> {
    /// Effective method.
    pub fn method(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }

    /// Effective header set.
    pub fn headers(&self) -> HashMap<String, String> {
        resolve_headers(&self.headers)
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Replace the header set.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Add a single header, starting from the defaults if no headers were set.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(default_headers)
            .insert(key.into(), value.into());
        self
    }

    /// Set a raw body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn with_json<B: serde::Serialize>(mut self, value: &B) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_string(value)?);
        Ok(self)
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }
}

/// What happens to the payload of a `finish` frame after the stream has been
/// cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishPayload {
    /// Parse the payload and hand it to `on_message` one last time.
    #[default]
    Deliver,

    /// Stop at the cancellation; the payload is dropped.
    Discard,
}

/// Stream-only settings.
/// Used as the transport field in `TransportOptions<StreamTransport>`.
#[derive(Debug, Clone)]
pub struct StreamTransport {
    /// Keep streaming while the consumer reports itself hidden
    pub open_when_hidden: bool,

    /// Visibility of the consumer, `true` meaning visible.
    /// Only consulted when `open_when_hidden` is false.
    pub visibility: Option<watch::Receiver<bool>>,

    /// Caller-supplied cancellation token; replaces the one created per call
    pub signal: Option<CancellationToken>,

    /// Delay between a retriable error and the next connect
    pub retry_interval: Duration,

    /// Handling of the `finish` frame payload
    pub finish_payload: FinishPayload,
}

impl Default for StreamTransport {
    fn default() -> Self {
        Self {
            open_when_hidden: true,
            visibility: None,
            signal: None,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            finish_payload: FinishPayload::default(),
        }
    }
}

impl TransportOptions<StreamTransport> {
    /// Pause the stream while `visibility` reports hidden.
    pub fn with_visibility(mut self, visibility: watch::Receiver<bool>) -> Self {
        self.transport.open_when_hidden = false;
        self.transport.visibility = Some(visibility);
        self
    }

    /// Use `signal` instead of the internally created cancellation token.
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.transport.signal = Some(signal);
        self
    }

    /// Set the reconnect delay.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.transport.retry_interval = interval;
        self
    }

    /// Set how the `finish` payload is handled.
    pub fn with_finish_payload(mut self, finish_payload: FinishPayload) -> Self {
        self.transport.finish_payload = finish_payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers_used_when_unset() {
        let options = RequestOptions::new();
        assert_eq!(
            options.headers().get("Content-Type").map(String::as_str),
            Some(JSON_CONTENT_TYPE)
        );
    }

    #[test]
    fn test_caller_headers_replace_defaults() {
        let headers = HashMap::from([
            ("Content-Type".to_string(), "text/plain".to_string()),
            ("X-Trace".to_string(), "abc".to_string()),
        ]);
        let options = RequestOptions::new().with_headers(headers.clone());
        assert_eq!(options.headers(), headers);

        // The whole map is replaced, not merged.
        let only_trace = HashMap::from([("X-Trace".to_string(), "abc".to_string())]);
        let options = StreamOptions::new().with_headers(only_trace.clone());
        assert_eq!(options.headers(), only_trace);
    }

    #[test]
    fn test_with_header_extends_defaults() {
        let options = StreamOptions::new().with_header("Authorization", "Bearer t");
        let headers = options.headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["Content-Type"], JSON_CONTENT_TYPE);
        assert_eq!(headers["Authorization"], "Bearer t");
    }

    #[test]
    fn test_stream_defaults() {
        let options = StreamOptions::default();
        assert!(options.transport.open_when_hidden);
        assert!(options.transport.signal.is_none());
        assert_eq!(options.transport.retry_interval, Duration::from_secs(10));
        assert_eq!(options.transport.finish_payload, FinishPayload::Deliver);
        assert_eq!(options.method(), Method::GET);
    }

    #[test]
    fn test_shared_builders_keep_stream_settings() {
        let options = StreamOptions::new()
            .with_retry_interval(Duration::from_millis(5))
            .with_method(Method::POST)
            .with_body("{}")
            .with_timeout(Duration::from_secs(3))
            .with_proxy("http://proxy.local:3128");

        assert_eq!(options.transport.retry_interval, Duration::from_millis(5));
        assert_eq!(options.method(), Method::POST);
        assert_eq!(options.body.as_deref(), Some("{}"));
        assert_eq!(options.timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.proxy.as_deref(), Some("http://proxy.local:3128"));
    }

    #[test]
    fn test_with_visibility_disables_open_when_hidden() {
        let (_tx, rx) = watch::channel(true);
        let options = StreamOptions::new().with_visibility(rx);
        assert!(!options.transport.open_when_hidden);
        assert!(options.transport.visibility.is_some());
    }

    #[test]
    fn test_with_json_body() {
        let options = RequestOptions::new()
            .with_json(&serde_json::json!({"a": 1}))
            .unwrap();
        assert_eq!(options.body.as_deref(), Some("{\"a\":1}"));
    }
}
