//! HTTP client utilities shared by the request and stream clients.
//!
//! This module provides reqwest client construction and header
//! application so both clients configure requests the same way.

use reqwest::{Client, ClientBuilder, RequestBuilder};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Build a configured HTTP client.
///
/// `timeout` bounds each request as a whole, response body included.
/// An unparsable proxy URL is logged and skipped.
///
/// # Example
/// ```ignore
/// let client = build_http_client(options.timeout, options.proxy.as_deref())?;
/// ```
pub fn build_http_client(
    timeout: Option<Duration>,
    proxy: Option<&str>,
) -> Result<Client, reqwest::Error> {
    let mut builder = client_builder(proxy);

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder.build()
}

/// Build an HTTP client for long-lived streaming responses.
///
/// `connect_timeout` bounds establishing each connection only; an open
/// response body is never cut short by it.
pub fn build_stream_client(
    connect_timeout: Option<Duration>,
    proxy: Option<&str>,
) -> Result<Client, reqwest::Error> {
    let mut builder = client_builder(proxy);

    if let Some(timeout) = connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    builder.build()
}

fn client_builder(proxy: Option<&str>) -> ClientBuilder {
    let mut builder = Client::builder();

    if let Some(proxy_url) = proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => warn!("Ignoring invalid proxy {}: {}", proxy_url, e),
        }
    }

    builder
}

/// Add headers to a request.
///
/// # Example
/// ```ignore
/// let mut req = client.post(url);
/// req = apply_headers(req, &options.headers());
/// ```
pub fn apply_headers(mut request: RequestBuilder, headers: &HashMap<String, String>) -> RequestBuilder {
    for (key, value) in headers {
        request = request.header(key, value);
    }
    request
}

/// Case-insensitive lookup of a header name.
pub fn has_header(headers: &HashMap<String, String>, name: &str) -> bool {
    headers.keys().any(|key| key.eq_ignore_ascii_case(name))
}
