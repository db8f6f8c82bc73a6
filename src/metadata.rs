//! Request description types.
//!
//! A [`RequestMetadata`] carries everything the [`Client`](crate::Client)
//! needs to perform one call: method, path, query parameters, form fields,
//! file parts and whether the body should be returned as raw bytes.

use crate::{Error, Result};
use http::Method;
use serde::Serialize;
use std::path::Path;

/// Conversion of a request parameter into its wire text.
///
/// Returning `None` marks the parameter as absent: it is dropped from the
/// request rather than sent empty. `false` and `0` are present values.
pub trait ParamValue {
    /// Returns the text to send, or `None` to omit the parameter.
    fn to_param(&self) -> Option<String>;
}

impl ParamValue for str {
    fn to_param(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ParamValue for String {
    fn to_param(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl ParamValue for bool {
    fn to_param(&self) -> Option<String> {
        Some(if *self { "true" } else { "false" }.to_string())
    }
}

macro_rules! impl_param_value_display {
    ($($ty:ty),*) => {
        $(
            impl ParamValue for $ty {
                fn to_param(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

impl_param_value_display!(i32, i64, u32, u64, usize, f32, f64);

impl<T: ParamValue + ?Sized> ParamValue for &T {
    fn to_param(&self) -> Option<String> {
        (**self).to_param()
    }
}

impl<T: ParamValue> ParamValue for Option<T> {
    fn to_param(&self) -> Option<String> {
        self.as_ref().and_then(ParamValue::to_param)
    }
}

/// A file to send as a multipart part.
#[derive(Debug, Clone)]
pub struct Upload {
    /// The file name reported to the server.
    pub file_name: String,

    /// The file contents.
    pub bytes: Vec<u8>,

    /// An explicit MIME type; the server sniffs the content when unset.
    pub content_type: Option<String>,
}

impl Upload {
    /// Creates an upload from in-memory bytes.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
            content_type: None,
        }
    }

    /// Reads a file from disk, using its file name for the upload.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::ConfigurationError(format!("Not a file path: {}", path.display()))
            })?;

        Ok(Self::new(file_name, bytes))
    }

    /// Sets the MIME type of the upload.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Metadata for an individual H51 API call.
///
/// Parameters and form fields whose value is absent are never recorded, so
/// they are never transmitted.
///
/// # Examples
///
/// ```
/// use h51::metadata::RequestMetadata;
/// use http::Method;
///
/// let metadata = RequestMetadata::new(Method::GET, "assets")
///     .with_query_param("q", Some("cat"))
///     .with_query_param("before", None::<&str>)
///     .with_query_param("secure", false);
///
/// assert_eq!(
///     metadata.query_params,
///     vec![
///         ("q".to_string(), "cat".to_string()),
///         ("secure".to_string(), "false".to_string()),
///     ]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path, relative to the client's base URL.
    pub path: String,

    /// Query parameters for this request.
    pub query_params: Vec<(String, String)>,

    /// Form fields for this request.
    pub form: Vec<(String, String)>,

    /// File parts; when non-empty the body is sent as `multipart/form-data`.
    pub files: Vec<(String, Upload)>,

    /// Return the raw response body instead of parsed JSON.
    pub download: bool,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query_params: Vec::new(),
            form: Vec::new(),
            files: Vec::new(),
            download: false,
        }
    }

    /// Adds a query parameter, unless its value is absent.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl ParamValue) -> Self {
        if let Some(value) = value.to_param() {
            self.query_params.push((key.into(), value));
        }
        self
    }

    /// Adds a form field, unless its value is absent.
    pub fn with_form_field(mut self, key: impl Into<String>, value: impl ParamValue) -> Self {
        if let Some(value) = value.to_param() {
            self.form.push((key.into(), value));
        }
        self
    }

    /// Adds a form field holding `value` serialized as JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn with_json_field<T: Serialize + ?Sized>(
        self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        let json = serde_json::to_string(value)
            .map_err(|e| Error::SerializationFailed(e.to_string()))?;
        Ok(self.with_form_field(key, json))
    }

    /// Adds a file part.
    pub fn with_file(mut self, key: impl Into<String>, upload: Upload) -> Self {
        self.files.push((key.into(), upload));
        self
    }

    /// Requests the raw response body.
    pub fn download(mut self) -> Self {
        self.download = true;
        self
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_values_are_dropped() {
        let metadata = RequestMetadata::new(Method::POST, "assets/abc/expire")
            .with_form_field("seconds", None::<u64>)
            .with_form_field("name", Some("photo"))
            .with_query_param("notification_url", None::<String>);

        assert!(metadata.query_params.is_empty());
        assert_eq!(
            metadata.form,
            vec![("name".to_string(), "photo".to_string())]
        );
    }

    #[test]
    fn test_false_and_zero_are_present() {
        let metadata = RequestMetadata::new(Method::GET, "assets")
            .with_query_param("secure", false)
            .with_query_param("limit", 0u32)
            .with_query_param("after", Some(String::new()));

        assert_eq!(metadata.query_params.len(), 3);
        assert_eq!(metadata.query_params[0].1, "false");
        assert_eq!(metadata.query_params[1].1, "0");
        assert_eq!(metadata.query_params[2].1, "");
    }

    #[test]
    fn test_json_field() {
        let metadata = RequestMetadata::new(Method::POST, "assets/analyze")
            .with_json_field("uids", &["a", "b"])
            .unwrap();

        assert_eq!(
            metadata.form,
            vec![("uids".to_string(), r#"["a","b"]"#.to_string())]
        );
    }

    #[test]
    fn test_download_flag() {
        let metadata = RequestMetadata::new(Method::GET, "assets/abc/download").download();
        assert!(metadata.download);
        assert!(!RequestMetadata::default().download);
    }
}
