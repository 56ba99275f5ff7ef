//! Error kinds for snapping, stitching and routing.
//!
//! Only [`ConfigError`] is fatal. Everything else is recovered per item and
//! surfaces as a status on the batch record.

use std::fmt;

/// Fatal configuration error, raised before any item is processed.
#[derive(Debug)]
pub enum ConfigError {
    NegativeTolerance(f64),
    NonFiniteTolerance(f64),
    EmptyLineCollection,
    ZeroRetryLimit,
    InvalidBackoff(String),
    ZeroTimeout,
    ThreadPool(String),
    InvalidIntervals(String),
    Http(reqwest::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NegativeTolerance(value) => {
                write!(f, "tolerance must not be negative, got {}", value)
            }
            ConfigError::NonFiniteTolerance(value) => {
                write!(f, "tolerance must be finite, got {}", value)
            }
            ConfigError::EmptyLineCollection => {
                write!(f, "at least one valid line feature is required")
            }
            ConfigError::ZeroRetryLimit => write!(f, "retry_limit must allow at least one attempt"),
            ConfigError::InvalidBackoff(reason) => write!(f, "invalid retry backoff: {}", reason),
            ConfigError::ZeroTimeout => write!(f, "timeout_secs must be greater than zero"),
            ConfigError::ThreadPool(reason) => write!(f, "failed to build worker pool: {}", reason),
            ConfigError::InvalidIntervals(reason) => write!(f, "invalid isochrone intervals: {}", reason),
            ConfigError::Http(err) => write!(f, "failed to build HTTP client: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ConfigError {
    fn from(err: reqwest::Error) -> Self {
        ConfigError::Http(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for ConfigError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        ConfigError::ThreadPool(err.to_string())
    }
}

/// Why a line feature was excluded from the spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidLineReason {
    TooFewVertices(usize),
    NonFiniteCoordinate,
}

/// A line feature rejected at index build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLineFeature {
    /// Debug rendering of the feature identifier.
    pub id: String,
    pub reason: InvalidLineReason,
}

impl fmt::Display for InvalidLineFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            InvalidLineReason::TooFewVertices(count) => write!(
                f,
                "line feature {} has {} vertices, at least 2 required",
                self.id, count
            ),
            InvalidLineReason::NonFiniteCoordinate => {
                write!(f, "line feature {} has a non-finite coordinate", self.id)
            }
        }
    }
}

impl std::error::Error for InvalidLineFeature {}

/// Why a route fragment could not be turned into line geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentParseFailure {
    Missing,
    MalformedWkt(String),
    MalformedPolyline(String),
    NotALine(&'static str),
    Empty,
    NonFiniteCoordinate,
    Degenerate,
}

impl fmt::Display for FragmentParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentParseFailure::Missing => write!(f, "fragment has no geometry"),
            FragmentParseFailure::MalformedWkt(reason) => write!(f, "malformed WKT: {}", reason),
            FragmentParseFailure::MalformedPolyline(reason) => {
                write!(f, "malformed encoded polyline: {}", reason)
            }
            FragmentParseFailure::NotALine(kind) => write!(f, "expected a line, got {}", kind),
            FragmentParseFailure::Empty => write!(f, "fragment geometry is empty"),
            FragmentParseFailure::NonFiniteCoordinate => {
                write!(f, "fragment geometry has a non-finite coordinate")
            }
            FragmentParseFailure::Degenerate => write!(f, "fragment geometry has zero length"),
        }
    }
}

impl std::error::Error for FragmentParseFailure {}

/// Failure reported by a routing provider.
#[derive(Debug)]
pub enum ProviderError {
    /// The service answered, but no route connects the points.
    RouteNotFound { message: String },
    /// The service throttled the request.
    RateLimited,
    Transport(reqwest::Error),
    Status { code: u16, body: String },
    Decode(String),
}

impl ProviderError {
    /// Whether another attempt could succeed.
    ///
    /// Rate limiting is retried only when `retry_over_rate_limit` is set.
    pub fn is_retryable(&self, retry_over_rate_limit: bool) -> bool {
        match self {
            ProviderError::RateLimited => retry_over_rate_limit,
            ProviderError::Transport(err) => err.is_timeout() || err.is_connect(),
            ProviderError::Status { code, .. } => *code >= 500,
            ProviderError::RouteNotFound { .. } | ProviderError::Decode(_) => false,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::RouteNotFound { message } => write!(f, "route not found: {}", message),
            ProviderError::RateLimited => write!(f, "rate limited by routing service"),
            ProviderError::Transport(err) => write!(f, "transport error: {}", err),
            ProviderError::Status { code, body } => {
                write!(f, "routing service returned {}: {}", code, body)
            }
            ProviderError::Decode(reason) => write!(f, "malformed routing response: {}", reason),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Transport(err)
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Decode(err.to_string())
    }
}
