//! Error types for H51 API calls.
//!
//! Every non-success response is classified into an [`ErrorKind`] from its
//! status code and surfaced as [`Error::Api`], together with the optional
//! `hint` and per-argument validation messages the API sends back. Transport
//! failures (timeouts, refused connections) are distinct variants and never
//! carry a status code.

use http::StatusCode;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Validation messages keyed by the name of the argument they relate to.
pub type ArgErrors = BTreeMap<String, Vec<String>>;

/// The category of an API error, derived from the HTTP status code.
///
/// # Examples
///
/// ```
/// use h51::ErrorKind;
/// use http::StatusCode;
///
/// assert_eq!(ErrorKind::from_status(StatusCode::NOT_FOUND), ErrorKind::NotFound);
/// assert_eq!(ErrorKind::from_status(StatusCode::METHOD_NOT_ALLOWED), ErrorKind::Forbidden);
/// assert_eq!(ErrorKind::from_status(StatusCode::BAD_GATEWAY), ErrorKind::Generic);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Not a valid request, most likely a missing or invalid parameter (400).
    InvalidRequest,
    /// The API key provided is not valid (401).
    Unauthorized,
    /// The request is not allowed (403, 405).
    Forbidden,
    /// The endpoint or the referenced document doesn't exist (404).
    NotFound,
    /// Too many requests within the current rate limit window (429).
    RequestLimitExceeded,
    /// Any other unsuccessful status.
    Generic,
}

impl ErrorKind {
    /// Classifies a response status code.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            400 => ErrorKind::InvalidRequest,
            401 => ErrorKind::Unauthorized,
            403 | 405 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            429 => ErrorKind::RequestLimitExceeded,
            _ => ErrorKind::Generic,
        }
    }

    /// A human readable explanation of the error category.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => {
                "Not a valid request, most likely a missing or invalid parameter."
            }
            ErrorKind::Unauthorized => "The API key provided is not valid.",
            ErrorKind::Forbidden => {
                "The request is not allowed, most likely the HTTP method used is incorrect or \
                 the API key does not have permission to perform the action."
            }
            ErrorKind::NotFound => {
                "The endpoint you are calling or the document you referenced doesn't exist."
            }
            ErrorKind::RequestLimitExceeded => {
                "You have exceeded the number of API requests allowed per second."
            }
            ErrorKind::Generic => "An error occurred while processing the request.",
        }
    }
}

/// The main error type for H51 API calls.
///
/// # Examples
///
/// ```no_run
/// use h51::{Asset, Client, Error, ErrorKind};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::new("my-api-key")?;
///
/// match Asset::one(&client, "3owuun").await {
///     Ok(asset) => println!("{}", asset),
///     Err(Error::Api { kind: ErrorKind::NotFound, .. }) => println!("no such asset"),
///     Err(Error::Api { arg_errors: Some(args), .. }) => {
///         for (name, messages) in &args {
///             eprintln!("{}: {}", name, messages.join(" "));
///         }
///     }
///     Err(e) => eprintln!("{}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The API answered with a status other than 200 or 204.
    #[error("{}", render_api_error(.status, .kind, .hint, .arg_errors))]
    Api {
        /// The category derived from the status code
        kind: ErrorKind,
        /// The HTTP status code
        status: StatusCode,
        /// Additional information as to why the error occurred
        hint: Option<String>,
        /// Errors relating to the arguments sent to the endpoint
        arg_errors: Option<ArgErrors>,
    },

    /// The request timed out.
    ///
    /// This occurs when a call takes longer than the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// A success response carried JSON that does not match the expected shape.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// A success response carried a different kind of payload than the
    /// operation needs (for example no JSON body where one was required).
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A required field is missing from a resource document.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A date field of a resource document is not a valid ISO-8601 timestamp.
    #[error("Invalid timestamp in field '{field}': {value}")]
    InvalidTimestamp {
        /// The field holding the timestamp
        field: String,
        /// The offending value
        value: String,
    },

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize part of the request payload.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Reading a file to upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(e)
        }
    }
}

impl Error {
    /// Builds the API error for an unsuccessful status code.
    pub(crate) fn from_response(
        status: StatusCode,
        hint: Option<String>,
        arg_errors: Option<ArgErrors>,
    ) -> Self {
        Error::Api {
            kind: ErrorKind::from_status(status),
            status,
            hint,
            arg_errors,
        }
    }

    /// Returns the error category for API errors, `None` for everything else.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Api { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    ///
    /// Transport failures such as [`Error::Timeout`] never have one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the hint sent along with an API error.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::Api { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// Returns the per-argument validation messages sent along with an API error.
    pub fn arg_errors(&self) -> Option<&ArgErrors> {
        match self {
            Error::Api { arg_errors, .. } => arg_errors.as_ref(),
            _ => None,
        }
    }

    /// Returns `true` if the call failed because the timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

fn render_api_error(
    status: &StatusCode,
    kind: &ErrorKind,
    hint: &Option<String>,
    arg_errors: &Option<ArgErrors>,
) -> String {
    let mut parts = vec![format!("[{}] {}", status.as_u16(), kind.description())];

    if let Some(hint) = hint.as_deref().filter(|h| !h.is_empty()) {
        parts.push(format!("Hint: {}", hint));
    }

    if let Some(arg_errors) = arg_errors.as_ref().filter(|a| !a.is_empty()) {
        let mut section = String::from("Argument errors:");
        for (name, messages) in arg_errors {
            let _ = write!(section, "\n- {}: {}", name, messages.join(" "));
        }
        parts.push(section);
    }

    parts.join("\n---\n")
}

/// A specialized `Result` type for H51 API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        let cases = [
            (400, ErrorKind::InvalidRequest),
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Forbidden),
            (404, ErrorKind::NotFound),
            (405, ErrorKind::Forbidden),
            (429, ErrorKind::RequestLimitExceeded),
            (402, ErrorKind::Generic),
            (500, ErrorKind::Generic),
            (503, ErrorKind::Generic),
        ];

        for (code, expected) in cases {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(ErrorKind::from_status(status), expected, "status {}", code);
        }
    }

    #[test]
    fn test_display_includes_hint_and_arg_errors() {
        let mut args = ArgErrors::new();
        args.insert(
            "expire".to_string(),
            vec!["Must be positive.".to_string(), "Too large.".to_string()],
        );

        let err = Error::from_response(
            StatusCode::BAD_REQUEST,
            Some("Check the expire value".to_string()),
            Some(args),
        );
        let rendered = err.to_string();

        assert!(rendered.starts_with("[400] Not a valid request"));
        assert!(rendered.contains("\n---\nHint: Check the expire value"));
        assert!(rendered.contains("Argument errors:\n- expire: Must be positive. Too large."));
    }

    #[test]
    fn test_display_without_details() {
        let err = Error::from_response(StatusCode::UNAUTHORIZED, None, None);
        assert_eq!(err.to_string(), "[401] The API key provided is not valid.");
        assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));
        assert!(err.hint().is_none());
        assert!(err.arg_errors().is_none());
    }

    #[test]
    fn test_timeout_has_no_status() {
        let err = Error::Timeout;
        assert!(err.is_timeout());
        assert!(err.status().is_none());
        assert!(err.kind().is_none());
    }
}
