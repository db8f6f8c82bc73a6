//! Authenticated dispatcher for H51 API calls.
//!
//! The [`Client`] type is the only part of the crate that touches the wire.
//! Every resource operation funnels through [`Client::call`]. Use
//! [`ClientBuilder`] to configure and create clients.

use crate::{
    metadata::{RequestMetadata, Upload},
    rate_limit::RateLimit,
    response::Payload,
    Error, Response, Result,
};
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use url::Url;

/// The production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.h51.io";

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "X-H51-APIKey";

/// A client for the H51 API.
///
/// The client owns the API key, base URL and timeout, and records the rate
/// limit counters reported by the most recent response. Clones share the
/// same connection pool and rate limit snapshot.
///
/// Calls are never retried: every failure is returned to the caller as an
/// [`Error`], including `429 Too Many Requests`.
///
/// # Examples
///
/// ```no_run
/// use h51::{Asset, Client};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), h51::Error> {
/// let client = Client::builder()
///     .api_key("my-api-key")
///     .timeout(Duration::from_secs(30))
///     .build()?;
///
/// let asset = Asset::one(&client, "3owuun").await?;
/// println!("{}", asset);
///
/// if let Some(rate_limit) = client.rate_limit() {
///     println!("{:?} requests left", rate_limit.remaining);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    api_key: HeaderValue,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    rate_limit: Mutex<Option<RateLimit>>,
}

impl Client {
    /// Creates a client for the production API with no timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        ClientBuilder::new().api_key(api_key).build()
    }

    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the base URL requests are made against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Returns the per-call timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Returns the rate limit counters reported by the most recent response.
    ///
    /// This is `None` until a response carrying rate limit headers has been
    /// received.
    pub fn rate_limit(&self) -> Option<RateLimit> {
        *self
            .inner
            .rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Performs one authenticated API call.
    ///
    /// On a 200 or 204 response the body is returned as [`Payload::Bytes`]
    /// for download calls, [`Payload::Json`] when the response declares a
    /// JSON content type, and [`Payload::Empty`] otherwise. Any other status
    /// fails with [`Error::Api`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use h51::{metadata::RequestMetadata, Client};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), h51::Error> {
    /// let client = Client::new("my-api-key")?;
    ///
    /// let metadata = RequestMetadata::new(Method::GET, "assets")
    ///     .with_query_param("q", Some("holiday"))
    ///     .with_query_param("limit", 10u32);
    ///
    /// let response = client.call(metadata).await?;
    /// let page = response.data.into_json()?;
    /// println!("{} assets", page["result_count"]);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call(&self, metadata: RequestMetadata) -> Result<Response<Payload>> {
        let start_time = Instant::now();
        let download = metadata.download;
        let method = metadata.method.clone();
        let path = metadata.path.clone();

        let response = self.execute_request(metadata).await.inspect_err(|e| {
            tracing::warn!(
                error = %e,
                method = %method,
                path = %path,
                "Request failed"
            );
        })?;

        self.parse_response(response, download, start_time).await
    }

    /// Sends the request described by `metadata`.
    async fn execute_request(&self, metadata: RequestMetadata) -> Result<reqwest::Response> {
        let url = self.endpoint_url(&metadata.path, &metadata.query_params);

        tracing::debug!(
            method = %metadata.method,
            url = %url,
            download = metadata.download,
            "Executing HTTP request"
        );

        let mut request = self.inner.http_client.request(metadata.method, url);

        for (name, value) in &self.inner.default_headers {
            request = request.header(name, value);
        }

        request = request.header(API_KEY_HEADER, self.inner.api_key.clone());

        if !metadata.download {
            request = request.header(header::ACCEPT, "application/json");
        }

        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        if !metadata.files.is_empty() {
            request = request.multipart(multipart_form(metadata.form, metadata.files)?);
        } else if !metadata.form.is_empty() {
            request = request.form(&metadata.form);
        }

        Ok(request.send().await?)
    }

    /// Joins `path` onto the base URL, keeping any path prefix of the base.
    fn endpoint_url(&self, path: &str, query_params: &[(String, String)]) -> Url {
        let mut url = self.inner.base_url.clone();
        let full_path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&full_path);

        if !query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(query_params);
        }

        url
    }

    fn record_rate_limit(&self, snapshot: RateLimit) {
        tracing::debug!(
            limit = ?snapshot.limit,
            remaining = ?snapshot.remaining,
            "Updated rate limit"
        );

        *self
            .inner
            .rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Records rate limit headers and turns the response into a payload or error.
    async fn parse_response(
        &self,
        response: reqwest::Response,
        download: bool,
        start_time: Instant,
    ) -> Result<Response<Payload>> {
        let status = response.status();
        let headers = response.headers().clone();

        if let Some(snapshot) = RateLimit::from_headers(&headers) {
            self.record_rate_limit(snapshot);
        }

        tracing::info!(
            status = status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "Received HTTP response"
        );

        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            let raw_response = response.text().await.unwrap_or_default();

            if status.is_client_error() {
                tracing::error!(
                    status = status.as_u16(),
                    response = %raw_response,
                    "Client error (4xx)"
                );
            } else {
                tracing::warn!(
                    status = status.as_u16(),
                    response = %raw_response,
                    "Server error"
                );
            }

            let (hint, arg_errors) = parse_error_body(&raw_response);
            return Err(Error::from_response(status, hint, arg_errors));
        }

        let data = if download {
            Payload::Bytes(response.bytes().await?.to_vec())
        } else if is_json(&headers) {
            let raw_body = response.text().await?;
            if raw_body.trim().is_empty() {
                Payload::Empty
            } else {
                match serde_json::from_str::<Value>(&raw_body) {
                    Ok(value) => Payload::Json(value),
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            raw_response = %raw_body,
                            "Failed to deserialize response"
                        );

                        return Err(Error::DeserializationFailed {
                            raw_response: raw_body,
                            serde_error: e.to_string(),
                            status,
                        });
                    }
                }
            }
        } else {
            Payload::Empty
        };

        Ok(Response::new(data, status, headers, start_time.elapsed()))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Extracts `hint` and `arg_errors` from an error body.
///
/// Bodies that are not JSON, or fields of an unexpected shape, are treated
/// as absent.
fn parse_error_body(raw: &str) -> (Option<String>, Option<crate::ArgErrors>) {
    let Ok(Value::Object(mut body)) = serde_json::from_str::<Value>(raw) else {
        return (None, None);
    };

    let hint = match body.remove("hint") {
        Some(Value::String(hint)) => Some(hint),
        _ => None,
    };
    let arg_errors = body
        .remove("arg_errors")
        .and_then(|v| serde_json::from_value(v).ok());

    (hint, arg_errors)
}

fn multipart_form(
    fields: Vec<(String, String)>,
    files: Vec<(String, Upload)>,
) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();

    for (name, value) in fields {
        form = form.text(name, value);
    }

    for (name, upload) in files {
        let mut part = reqwest::multipart::Part::bytes(upload.bytes).file_name(upload.file_name);
        if let Some(content_type) = upload.content_type {
            part = part.mime_str(&content_type).map_err(|e| {
                Error::ConfigurationError(format!("Invalid content type: {}", e))
            })?;
        }
        form = form.part(name, part);
    }

    Ok(form)
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use h51::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), h51::Error> {
/// let client = ClientBuilder::new()
///     .api_key("my-api-key")
///     .base_url("https://api.h51.io")?
///     .timeout(Duration::from_secs(30))
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    api_key: Option<String>,
    base_url: Option<Url>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_headers: HeaderMap::new(),
            timeout: None,
        }
    }

    /// Sets the API key used to authenticate every call.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL for all requests. Defaults to [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Bounds the duration of each individual call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key was provided or if the client
    /// configuration is invalid.
    pub fn build(self) -> Result<Client> {
        let api_key = self
            .api_key
            .ok_or_else(|| Error::ConfigurationError("API key is required".to_string()))?;

        let mut api_key = HeaderValue::try_from(api_key)
            .map_err(|e| Error::ConfigurationError(format!("Invalid API key: {}", e)))?;
        api_key.set_sensitive(true);

        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)?,
        };

        let http_client = reqwest::Client::builder().build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                api_key,
                default_headers: self.default_headers,
                timeout: self.timeout,
                rate_limit: Mutex::new(None),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_api_key() {
        let result = ClientBuilder::new().build();
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_default_base_url() {
        let client = Client::new("key").unwrap();
        assert_eq!(client.base_url().as_str(), "https://api.h51.io/");
        assert!(client.rate_limit().is_none());
        assert!(client.timeout().is_none());
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let client = Client::builder()
            .api_key("key")
            .base_url("http://localhost:8080/v1/")
            .unwrap()
            .build()
            .unwrap();

        let url = client.endpoint_url(
            "assets/abc",
            &[("limit".to_string(), "10".to_string())],
        );
        assert_eq!(url.as_str(), "http://localhost:8080/v1/assets/abc?limit=10");

        let url = client.endpoint_url("/assets", &[]);
        assert_eq!(url.as_str(), "http://localhost:8080/v1/assets");
    }

    #[test]
    fn test_parse_error_body() {
        let (hint, arg_errors) = parse_error_body(
            r#"{"hint": "Bad uid", "arg_errors": {"uid": ["Not found.", "Invalid."]}}"#,
        );
        assert_eq!(hint.as_deref(), Some("Bad uid"));
        assert_eq!(
            arg_errors.unwrap()["uid"],
            vec!["Not found.".to_string(), "Invalid.".to_string()]
        );

        assert_eq!(parse_error_body("<html>oops</html>"), (None, None));
        assert_eq!(parse_error_body(r#"["not", "an", "object"]"#), (None, None));

        let (hint, arg_errors) = parse_error_body(r#"{"hint": 5, "arg_errors": "x"}"#);
        assert!(hint.is_none());
        assert!(arg_errors.is_none());
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let client = Client::new("super-secret").unwrap();
        assert!(!format!("{:?}", client).contains("super-secret"));
    }
}
