//! Rate limit tracking from H51 response headers.
//!
//! Every response from the API may carry the `X-H51-RateLimit-*` headers. The
//! [`Client`](crate::Client) replaces its snapshot with the parsed values after
//! each call, successful or not, so the snapshot always describes the most
//! recently completed request.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Maximum number of requests per second allowed for the API key.
pub const LIMIT_HEADER: &str = "x-h51-ratelimit-limit";

/// Time (seconds since the epoch, fractional) when the current limit resets.
pub const RESET_HEADER: &str = "x-h51-ratelimit-reset";

/// Requests remaining before the next reset.
pub const REMAINING_HEADER: &str = "x-h51-ratelimit-remaining";

/// The most recently observed rate limit counters.
///
/// # Examples
///
/// ```
/// use h51::rate_limit::RateLimit;
/// use http::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("x-h51-ratelimit-limit", "10".parse().unwrap());
/// headers.insert("x-h51-ratelimit-reset", "1700000000.5".parse().unwrap());
/// headers.insert("x-h51-ratelimit-remaining", "7".parse().unwrap());
///
/// let snapshot = RateLimit::from_headers(&headers).unwrap();
/// assert_eq!(snapshot.limit, Some(10));
/// assert_eq!(snapshot.remaining, Some(7));
/// assert!(!snapshot.is_below(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Requests allowed per window.
    pub limit: Option<u64>,

    /// When the current window resets.
    pub reset_at: Option<SystemTime>,

    /// Requests remaining in the current window.
    pub remaining: Option<u64>,
}

impl RateLimit {
    /// Extracts a snapshot from response headers.
    ///
    /// Returns `None` when the response carries no `X-H51-RateLimit-Limit`
    /// header. The three headers are sent together, so the reset and
    /// remaining values are read whenever the limit is present.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let limit = header_str(headers, LIMIT_HEADER)?;

        Some(Self {
            limit: limit.parse().ok(),
            reset_at: parse_reset(headers),
            remaining: header_str(headers, REMAINING_HEADER).and_then(|v| v.parse().ok()),
        })
    }

    /// Returns how long until the current window resets.
    ///
    /// A reset time already in the past yields a zero duration. Returns
    /// `None` when no reset time was reported.
    pub fn delay_until_reset(&self) -> Option<Duration> {
        let reset_at = self.reset_at?;
        Some(
            reset_at
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Returns `true` if the remaining request count is at or below `buffer`.
    ///
    /// An unknown remaining count never counts as below the buffer.
    pub fn is_below(&self, buffer: u64) -> bool {
        matches!(self.remaining, Some(remaining) if remaining <= buffer)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

/// Parses the reset header (fractional Unix timestamp).
fn parse_reset(headers: &HeaderMap) -> Option<SystemTime> {
    let seconds: f64 = header_str(headers, RESET_HEADER)?.parse().ok()?;
    let offset = Duration::try_from_secs_f64(seconds).ok()?;
    UNIX_EPOCH.checked_add(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn full_headers(limit: &str, reset: &str, remaining: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LIMIT_HEADER, HeaderValue::from_str(limit).unwrap());
        headers.insert(RESET_HEADER, HeaderValue::from_str(reset).unwrap());
        headers.insert(REMAINING_HEADER, HeaderValue::from_str(remaining).unwrap());
        headers
    }

    #[test]
    fn test_no_headers_means_no_snapshot() {
        assert!(RateLimit::from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_parse_all_three_headers() {
        let headers = full_headers("10", "1700000000.25", "4");
        let info = RateLimit::from_headers(&headers).unwrap();

        assert_eq!(info.limit, Some(10));
        assert_eq!(info.remaining, Some(4));
        assert_eq!(
            info.reset_at,
            Some(UNIX_EPOCH + Duration::from_secs_f64(1700000000.25))
        );
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("X-H51-RateLimit-Limit", HeaderValue::from_static("5"));
        headers.insert("X-H51-RateLimit-Remaining", HeaderValue::from_static("0"));

        let info = RateLimit::from_headers(&headers).unwrap();
        assert_eq!(info.limit, Some(5));
        assert_eq!(info.remaining, Some(0));
        assert!(info.reset_at.is_none());
    }

    #[test]
    fn test_unrepresentable_reset_is_dropped() {
        for reset in ["1e300", "10000000000000000000", "-5", "NaN", "inf", "soon"] {
            let info = RateLimit::from_headers(&full_headers("10", reset, "4")).unwrap();
            assert!(info.reset_at.is_none(), "reset {:?} gave {:?}", reset, info.reset_at);
            assert_eq!(info.limit, Some(10));
            assert_eq!(info.remaining, Some(4));
            assert!(info.delay_until_reset().is_none());
        }
    }

    #[test]
    fn test_delay_until_reset() {
        let future = SystemTime::now() + Duration::from_secs(2);
        let info = RateLimit {
            limit: Some(10),
            reset_at: Some(future),
            remaining: Some(0),
        };

        let delay = info.delay_until_reset().unwrap();
        assert!(
            delay > Duration::from_secs(1) && delay <= Duration::from_secs(2),
            "Delay should be 1-2 seconds, got {:?}",
            delay
        );
    }

    #[test]
    fn test_delay_for_past_reset_is_zero() {
        let info = RateLimit {
            limit: Some(10),
            reset_at: Some(SystemTime::now() - Duration::from_secs(30)),
            remaining: Some(0),
        };
        assert_eq!(info.delay_until_reset(), Some(Duration::ZERO));
    }

    #[test]
    fn test_is_below() {
        let info = RateLimit {
            limit: Some(10),
            reset_at: None,
            remaining: Some(3),
        };
        assert!(info.is_below(5));
        assert!(info.is_below(3));
        assert!(!info.is_below(2));

        let unknown = RateLimit {
            remaining: None,
            ..info
        };
        assert!(!unknown.is_below(100));
    }
}
