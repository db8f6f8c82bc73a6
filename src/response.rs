//! Response wrapper for successful API calls.
//!
//! The [`Response`] type wraps the body of a successful (200 or 204) call
//! together with the status, headers and latency of the HTTP transaction.

use crate::{Error, Result};
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// The body of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The response declared a JSON content type.
    Json(Value),
    /// The raw body of a download call.
    Bytes(Vec<u8>),
    /// Neither a download nor a JSON response (e.g. 204 No Content).
    Empty,
}

impl Payload {
    /// Returns the JSON value, failing for any other payload.
    pub fn into_json(self) -> Result<Value> {
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Bytes(_) => Err(Error::UnexpectedResponse(
                "expected a JSON body, got raw bytes".to_string(),
            )),
            Payload::Empty => Err(Error::UnexpectedResponse(
                "expected a JSON body, got none".to_string(),
            )),
        }
    }

    /// Returns the raw bytes, failing for any other payload.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Payload::Bytes(bytes) => Ok(bytes),
            Payload::Json(_) | Payload::Empty => Err(Error::UnexpectedResponse(
                "expected a raw body".to_string(),
            )),
        }
    }

    /// Returns `true` if the call returned no body.
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

/// A wrapper around a successful HTTP response.
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
/// let response = client.call(RequestMetadata::new(Method::GET, "assets/3owuun")).await?;
/// println!("Status: {}", response.status);
/// println!("Request took {:?}", response.latency);
///
/// let document = response.data.into_json()?;
/// println!("{}", document["uid"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The response body.
    pub data: T,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from sending the request until the body was read.
    pub latency: Duration,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(data: T, status: StatusCode, headers: HeaderMap, latency: Duration) -> Self {
        Self {
            data,
            status,
            headers,
            latency,
        }
    }
}
