//! Explicit configuration values, owned by the caller and passed in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Exponential backoff between retry attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryBackoff {
    pub initial_ms: u64,
    pub multiplier: f64,
    pub max_ms: u64,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            multiplier: 2.0,
            max_ms: 15_000,
        }
    }
}

impl RetryBackoff {
    /// Delay before retry number `retry` (1-based), capped at `max_ms`.
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = (self.initial_ms as f64) * self.multiplier.powi(exponent);
        let capped = if millis.is_finite() {
            millis.min(self.max_ms as f64)
        } else {
            self.max_ms as f64
        };
        Duration::from_millis(capped.round() as u64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidBackoff(format!(
                "multiplier must be a finite value >= 1, got {}",
                self.multiplier
            )));
        }
        if self.initial_ms > self.max_ms {
            return Err(ConfigError::InvalidBackoff(format!(
                "initial_ms ({}) exceeds max_ms ({})",
                self.initial_ms, self.max_ms
            )));
        }
        Ok(())
    }
}

/// HTTP client settings shared by the routing adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-request deadline.
    pub timeout_secs: u64,
    /// Maximum attempts per request, the first one included.
    pub retry_limit: u32,
    pub retry_backoff: RetryBackoff,
    /// Retry automatically when the service answers 429.
    pub retry_over_rate_limit: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_secs: 10,
            retry_limit: 6,
            retry_backoff: RetryBackoff::default(),
            retry_over_rate_limit: true,
        }
    }
}

impl ClientConfig {
    /// Default settings pointed at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Returns the per-request deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.retry_limit == 0 {
            return Err(ConfigError::ZeroRetryLimit);
        }
        self.retry_backoff.validate()
    }

    /// Builds the blocking HTTP client with the configured deadline.
    pub fn http_client(&self) -> Result<reqwest::blocking::Client, ConfigError> {
        self.validate()?;
        Ok(reqwest::blocking::Client::builder()
            .timeout(self.timeout())
            .build()?)
    }
}

/// Snapping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapConfig {
    /// Maximum point-to-line distance for a match, in coordinate units.
    pub tolerance: f64,
}

impl SnapConfig {
    /// Creates snapping settings with the given tolerance.
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tolerance.is_finite() {
            return Err(ConfigError::NonFiniteTolerance(self.tolerance));
        }
        if self.tolerance < 0.0 {
            return Err(ConfigError::NegativeTolerance(self.tolerance));
        }
        Ok(())
    }
}

/// Worker settings for batch processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Dedicated pool size; `None` uses the global rayon pool.
    pub threads: Option<usize>,
}

impl BatchConfig {
    /// Single worker thread.
    pub fn sequential() -> Self {
        Self { threads: Some(1) }
    }
}

/// Output column names for batch tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub id: String,
    pub from: String,
    pub to: String,
    pub geometry: String,
    pub matched: String,
    pub distance: String,
    pub duration: String,
    pub status: String,
    pub interval: String,
    pub interval_type: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            from: "from".to_string(),
            to: "to".to_string(),
            geometry: "geometry".to_string(),
            matched: "line_id".to_string(),
            distance: "distance".to_string(),
            duration: "duration".to_string(),
            status: "status".to_string(),
            interval: "interval".to_string(),
            interval_type: "interval_type".to_string(),
        }
    }
}

impl ColumnMapping {
    /// Metric columns named with their units.
    pub fn metric_units() -> Self {
        Self {
            distance: "distance_meters".to_string(),
            duration: "duration_seconds".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = RetryBackoff {
            initial_ms: 100,
            multiplier: 2.0,
            max_ms: 500,
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(500));
        assert_eq!(backoff.delay(60), Duration::from_millis(500));
    }

    #[test]
    fn test_default_client_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_client_config_rejects_zero_values() {
        let config = ClientConfig {
            timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));

        let config = ClientConfig {
            retry_limit: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRetryLimit)));
    }

    #[test]
    fn test_backoff_rejects_shrinking_multiplier() {
        let backoff = RetryBackoff {
            multiplier: 0.5,
            ..RetryBackoff::default()
        };
        assert!(matches!(backoff.validate(), Err(ConfigError::InvalidBackoff(_))));
    }

    #[test]
    fn test_snap_config_validation() {
        assert!(SnapConfig::new(0.0).validate().is_ok());
        assert!(matches!(
            SnapConfig::new(-0.5).validate(),
            Err(ConfigError::NegativeTolerance(_))
        ));
        assert!(matches!(
            SnapConfig::new(f64::INFINITY).validate(),
            Err(ConfigError::NonFiniteTolerance(_))
        ));
    }

    #[test]
    fn test_client_config_deserializes_partial_json() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url": "http://valhalla:8002", "retry_limit": 2}"#).unwrap();
        assert_eq!(config.base_url, "http://valhalla:8002");
        assert_eq!(config.retry_limit, 2);
        assert_eq!(config.timeout_secs, 10);
        assert!(config.retry_over_rate_limit);
    }

    #[test]
    fn test_metric_units_mapping() {
        let mapping = ColumnMapping::metric_units();
        assert_eq!(mapping.distance, "distance_meters");
        assert_eq!(mapping.duration, "duration_seconds");
        assert_eq!(mapping.geometry, "geometry");
    }
}
