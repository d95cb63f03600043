//! Server-push stream client.
//!
//! [`fetch_sse`] opens an event stream in the background and forwards every
//! application message to a [`StreamCallbacks`] implementation. The decisions
//! taken at each transport hook live in [`StreamHooks`]:
//!
//! - **open**: a 2xx `text/event-stream` response is accepted; any other 4xx
//!   except 429 is fatal; everything else is retriable.
//! - **message**: a `FatalError` event is fatal and carries the frame data; a
//!   `finish` event cancels the stream; any other frame is parsed as JSON and
//!   delivered.
//! - **error**: fatal errors end the stream; others reach `on_error` and the
//!   stream reconnects after the configured retry interval.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::client::StreamError;
use crate::model::EventSourceMessage;
use crate::options::{FinishPayload, StreamOptions, EVENT_STREAM_CONTENT_TYPE};
use crate::source::{run_event_source, EventSource, EventSourceHooks};

/// Event name announcing a permanent server-side failure.
pub const FATAL_ERROR_EVENT: &str = "FatalError";

/// Event name announcing the normal end of a stream.
pub const FINISH_EVENT: &str = "finish";

/// Receiver of stream results.
///
/// Calls arrive in frame order from the task driving the stream.
pub trait StreamCallbacks<T>: Send {
    /// One application message, parsed from a frame's `data`.
    fn on_message(&mut self, message: T);

    /// A retriable error occurred; the stream will reconnect.
    fn on_error(&mut self, _error: &StreamError) {}

    /// The server closed the stream.
    fn on_close(&mut self) {}
}

type MessageFn<T> = Box<dyn FnMut(T) + Send>;
type ErrorFn = Box<dyn FnMut(&StreamError) + Send>;
type CloseFn = Box<dyn FnMut() + Send>;

/// [`StreamCallbacks`] built from closures.
///
/// # Example
/// ```rust
/// use chatwire::model::ChatMessage;
/// use chatwire::stream::FnCallbacks;
///
/// let callbacks = FnCallbacks::new(|msg: ChatMessage| {
///     print!("{}", msg.token.unwrap_or_default());
/// })
/// .with_on_error(|err| eprintln!("retrying: {}", err))
/// .with_on_close(|| println!());
/// ```
pub struct FnCallbacks<T> {
    on_message: MessageFn<T>,
    on_error: Option<ErrorFn>,
    on_close: Option<CloseFn>,
}

impl<T> FnCallbacks<T> {
    pub fn new(on_message: impl FnMut(T) + Send + 'static) -> Self {
        Self {
            on_message: Box::new(on_message),
            on_error: None,
            on_close: None,
        }
    }

    pub fn with_on_error(mut self, on_error: impl FnMut(&StreamError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    pub fn with_on_close(mut self, on_close: impl FnMut() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(on_close));
        self
    }
}

impl<T> StreamCallbacks<T> for FnCallbacks<T> {
    fn on_message(&mut self, message: T) {
        (self.on_message)(message)
    }

    fn on_error(&mut self, error: &StreamError) {
        if let Some(on_error) = self.on_error.as_mut() {
            on_error(error)
        }
    }

    fn on_close(&mut self) {
        if let Some(on_close) = self.on_close.as_mut() {
            on_close()
        }
    }
}

/// Whether a `Content-Type` value names the event-stream media type.
///
/// Parameters such as `charset` are ignored.
///
/// # Example
/// ```
/// use chatwire::stream::is_event_stream;
///
/// assert!(is_event_stream("text/event-stream"));
/// assert!(is_event_stream("Text/Event-Stream; charset=utf-8"));
/// assert!(!is_event_stream("application/json"));
/// ```
pub fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(EVENT_STREAM_CONTENT_TYPE))
}

/// Classify a freshly opened response.
pub fn check_open(status: StatusCode, content_type: Option<&str>) -> Result<(), StreamError> {
    if status.is_success() && content_type.is_some_and(is_event_stream) {
        return Ok(());
    }

    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        return Err(StreamError::fatal(format!("HTTP {}", status)));
    }

    Err(StreamError::retriable(format!(
        "HTTP {} with content type {}",
        status,
        content_type.unwrap_or("<none>")
    )))
}

/// Decision logic plugged into the event-source transport.
pub struct StreamHooks<T, C> {
    callbacks: C,
    signal: CancellationToken,
    finish_payload: FinishPayload,
    retry_interval: Duration,
    _message: PhantomData<fn() -> T>,
}

impl<T, C> StreamHooks<T, C>
where
    T: DeserializeOwned,
    C: StreamCallbacks<T>,
{
    pub fn new(callbacks: C, signal: CancellationToken, options: &StreamOptions) -> Self {
        Self {
            callbacks,
            signal,
            finish_payload: options.transport.finish_payload,
            retry_interval: options.transport.retry_interval,
            _message: PhantomData,
        }
    }

    /// Token cancelled by a `finish` event.
    pub fn signal(&self) -> &CancellationToken {
        &self.signal
    }

    pub fn into_callbacks(self) -> C {
        self.callbacks
    }
}

impl<T, C> EventSourceHooks for StreamHooks<T, C>
where
    T: DeserializeOwned,
    C: StreamCallbacks<T>,
{
    fn on_open(&mut self, status: StatusCode, content_type: Option<&str>) -> Result<(), StreamError> {
        check_open(status, content_type)
    }

    fn on_message(&mut self, frame: EventSourceMessage) -> Result<(), StreamError> {
        match frame.event.as_str() {
            FATAL_ERROR_EVENT => return Err(StreamError::fatal(frame.data)),
            FINISH_EVENT => {
                if !self.signal.is_cancelled() {
                    debug!("Finish event received, cancelling stream");
                    self.signal.cancel();
                }
                if self.finish_payload == FinishPayload::Discard || frame.data.is_empty() {
                    return Ok(());
                }
            }
            // id or retry only
            "" if frame.data.is_empty() => return Ok(()),
            _ => {}
        }

        let message = serde_json::from_str::<T>(&frame.data)?;
        self.callbacks.on_message(message);
        Ok(())
    }

    fn on_error(&mut self, error: StreamError) -> Result<Option<Duration>, StreamError> {
        if error.is_fatal() {
            return Err(error);
        }

        self.callbacks.on_error(&error);
        Ok(Some(self.retry_interval))
    }

    fn on_close(&mut self) {
        self.callbacks.on_close();
    }
}

/// Handle to a stream started by [`fetch_sse`].
///
/// Dropping the handle leaves the stream running.
#[derive(Debug)]
pub struct StreamHandle {
    signal: CancellationToken,
    task: StreamTask,
}

#[derive(Debug)]
enum StreamTask {
    Running(JoinHandle<Result<(), StreamError>>),
    /// The stream never started
    Failed(StreamError),
}

impl StreamHandle {
    /// Ask the stream to stop. No message is delivered once this returns and
    /// the current delivery, if any, has completed.
    pub fn cancel(&self) {
        self.signal.cancel();
    }

    /// The token controlling this stream.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.signal.clone()
    }

    pub fn is_finished(&self) -> bool {
        match &self.task {
            StreamTask::Running(task) => task.is_finished(),
            StreamTask::Failed(_) => true,
        }
    }

    /// Wait for the stream to end.
    ///
    /// `Ok(())` covers both a server close and cancellation.
    pub async fn join(self) -> Result<(), StreamError> {
        match self.task {
            StreamTask::Running(task) => task.await?,
            StreamTask::Failed(e) => Err(e),
        }
    }
}

/// Open a server-push stream and deliver its messages to `callbacks`.
///
/// Returns immediately; the stream runs on a task spawned on the current
/// Tokio runtime. Called outside a runtime, nothing is spawned and the
/// handle resolves to [`StreamError::Runtime`]. A caller-supplied
/// `options.transport.signal` replaces the cancellation token created for
/// the call.
///
/// # Example
/// ```no_run
/// use chatwire::model::ChatMessage;
/// use chatwire::options::StreamOptions;
/// use chatwire::stream::{fetch_sse, FnCallbacks};
///
/// # async fn run() -> Result<(), chatwire::StreamError> {
/// let handle = fetch_sse(
///     "http://localhost:8080/chat/stream",
///     StreamOptions::default(),
///     FnCallbacks::new(|msg: ChatMessage| print!("{}", msg.token.unwrap_or_default())),
/// );
/// handle.join().await?;
/// # Ok(())
/// # }
/// ```
pub fn fetch_sse<T, C>(url: impl Into<String>, options: StreamOptions, callbacks: C) -> StreamHandle
where
    T: DeserializeOwned + 'static,
    C: StreamCallbacks<T> + 'static,
{
    let url = url.into();
    let signal = options
        .transport
        .signal
        .clone()
        .unwrap_or_else(CancellationToken::new);
    let runtime = match Handle::try_current() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Event stream {} not started: {}", url, e);
            return StreamHandle {
                signal,
                task: StreamTask::Failed(e.into()),
            };
        }
    };

    let mut hooks = StreamHooks::new(callbacks, signal.clone(), &options);
    let source = EventSource::new(url, &options);
    let task_signal = signal.clone();

    let task = runtime.spawn(async move {
        if source.url.trim().is_empty() {
            return Err(StreamError::InvalidArgument(
                "Stream URL is required".to_string(),
            ));
        }

        let url = source.url.clone();
        let result = run_event_source(source, &mut hooks, task_signal).await;
        if let Err(e) = &result {
            error!("Event stream {} ended with error: {}", url, e);
        }
        result
    });

    StreamHandle {
        signal,
        task: StreamTask::Running(task),
    }
}
