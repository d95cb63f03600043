//! Plain JSON request client.
//!
//! Two tiers, as elsewhere in the crate:
//!
//! 1. [`api_request`] / [`api_request_as`] build a one-off HTTP client from
//!    the given options
//! 2. [`ApiClient`] keeps a client, a base URL and default options for
//!    repeated calls
//!
//! Every failure is logged and returned; a call never resolves to an empty
//! value in place of an error.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::client::ClientError;
use crate::http::{apply_headers, build_http_client};
use crate::options::RequestOptions;

/// Send one request and parse the JSON body.
///
/// # Example
/// ```no_run
/// use chatwire::options::RequestOptions;
/// use chatwire::request::api_request;
///
/// # async fn run() -> Result<(), chatwire::ClientError> {
/// let sessions = api_request("http://localhost:8080/sessions", &RequestOptions::default()).await?;
/// println!("{}", sessions);
/// # Ok(())
/// # }
/// ```
pub async fn api_request(url: &str, options: &RequestOptions) -> Result<Value, ClientError> {
    api_request_as(url, options).await
}

/// Send one request and deserialize the JSON body into `T`.
pub async fn api_request_as<T: DeserializeOwned>(
    url: &str,
    options: &RequestOptions,
) -> Result<T, ClientError> {
    let result = one_off(url, options).await;
    if let Err(e) = &result {
        error!("API request to {} failed: {}", url, e);
    }
    result
}

/// Reusable JSON client with a base URL and default options.
///
/// # Example
/// ```no_run
/// use chatwire::options::RequestOptions;
/// use chatwire::request::ApiClient;
/// use std::time::Duration;
///
/// # async fn run() -> Result<(), chatwire::ClientError> {
/// let client = ApiClient::new(RequestOptions::new().with_timeout(Duration::from_secs(10)))?
///     .with_base_url("http://localhost:8080/api");
/// let history: serde_json::Value = client.request("history/s-1").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: Option<String>,
    options: RequestOptions,
}

impl ApiClient {
    /// Create a client; timeout and proxy from `options` configure the
    /// underlying HTTP client.
    pub fn new(options: RequestOptions) -> Result<Self, ClientError> {
        let http_client = build_http_client(options.timeout, options.proxy.as_deref())?;
        Ok(Self {
            http_client,
            base_url: None,
            options,
        })
    }

    /// Resolve request paths against `base_url`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Request `path` with the stored default options.
    pub async fn request<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request_with_options(path, &self.options).await
    }

    /// Request `path` with `options` in place of the stored defaults.
    ///
    /// The proxy is fixed when the client is built; a timeout in `options`
    /// applies to this request only.
    pub async fn request_with_options<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<T, ClientError> {
        let result = match validate_url(path) {
            Ok(()) => send_json(&self.http_client, &self.url(path), options).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            error!("API request to {} failed: {}", path, e);
        }
        result
    }

    fn url(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) if !path.contains("://") => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            _ => path.to_string(),
        }
    }
}

async fn one_off<T: DeserializeOwned>(url: &str, options: &RequestOptions) -> Result<T, ClientError> {
    validate_url(url)?;
    let http_client = build_http_client(options.timeout, options.proxy.as_deref())?;
    send_json(&http_client, url, options).await
}

fn validate_url(url: &str) -> Result<(), ClientError> {
    if url.trim().is_empty() {
        return Err(ClientError::InvalidArgument(
            "Request URL is required".to_string(),
        ));
    }
    Ok(())
}

async fn send_json<T: DeserializeOwned>(
    http_client: &Client,
    url: &str,
    options: &RequestOptions,
) -> Result<T, ClientError> {
    let method = options.method();
    debug!("{} {}", method, url);

    let mut req = http_client.request(method, url);
    req = apply_headers(req, &options.headers());

    if let Some(body) = &options.body {
        req = req.body(body.clone());
    }
    if let Some(timeout) = options.timeout {
        req = req.timeout(timeout);
    }

    let response = req.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status { status, body });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
