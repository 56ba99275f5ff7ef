//! Valhalla HTTP adapter for point-to-point routes.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ConfigError, ProviderError};
use crate::geometry::Point;
use crate::retry::with_retry;
use crate::stitch::RouteFragment;
use crate::traits::{RouteProvider, RouteResponse};

/// Valhalla encodes leg shapes with six decimal digits.
pub const SHAPE_PRECISION: u32 = 6;

const METERS_PER_KILOMETER: f64 = 1000.0;
const METERS_PER_MILE: f64 = 1609.344;

/// Error codes meaning "the service is fine, there is just no route".
const NO_ROUTE_ERROR_CODES: &[u32] = &[171, 442];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValhallaConfig {
    pub client: ClientConfig,
    pub costing: String,
    pub use_tolls: f64,
    /// `kilometers` or `miles`.
    pub units: String,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::with_base_url("http://localhost:8002"),
            costing: "auto".to_string(),
            use_tolls: 0.0,
            units: "kilometers".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValhallaClient {
    config: ValhallaConfig,
    client: reqwest::blocking::Client,
}

impl ValhallaClient {
    /// Creates a client; fails on invalid client settings.
    pub fn new(config: ValhallaConfig) -> Result<Self, ConfigError> {
        let client = config.client.http_client()?;
        Ok(Self { config, client })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ValhallaConfig {
        &self.config
    }

    fn request_body(&self, from: Point, to: Point) -> serde_json::Value {
        let mut costing_options = serde_json::Map::new();
        costing_options.insert(
            self.config.costing.clone(),
            json!({ "use_tolls": self.config.use_tolls }),
        );

        json!({
            "locations": [
                { "lon": from.x, "lat": from.y },
                { "lon": to.x, "lat": to.y },
            ],
            "costing": self.config.costing,
            "costing_options": costing_options,
            "units": self.config.units,
        })
    }

    fn send(&self, body: &serde_json::Value) -> Result<RouteResponse, ProviderError> {
        let url = format!("{}/route", self.config.client.base_url.trim_end_matches('/'));
        let response = self.client.post(url).json(body).send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        decode_response(status, &text)
    }
}

impl RouteProvider for ValhallaClient {
    fn route(&self, from: Point, to: Point) -> Result<RouteResponse, ProviderError> {
        let body = self.request_body(from, to);
        with_retry(&self.config.client, |attempt| {
            debug!(attempt, "requesting Valhalla route");
            self.send(&body)
        })
    }
}

/// Maps an HTTP status and body to the route schema.
pub fn decode_response(status: u16, body: &str) -> Result<RouteResponse, ProviderError> {
    if !(200..300).contains(&status) {
        return Err(decode_error(status, body));
    }

    let parsed: ValhallaRouteBody = serde_json::from_str(body)?;
    let trip = parsed.trip;

    let fragments = trip
        .legs
        .into_iter()
        .enumerate()
        .map(|(ordinal, leg)| match leg.shape {
            Some(shape) => RouteFragment::encoded(ordinal, shape, SHAPE_PRECISION),
            None => RouteFragment::new(ordinal, None),
        })
        .collect();

    let meters_per_unit = match trip.units.as_deref() {
        Some("miles") => METERS_PER_MILE,
        _ => METERS_PER_KILOMETER,
    };
    let summary = trip.summary.unwrap_or_default();

    Ok(RouteResponse {
        fragments,
        distance_m: summary.length.map(|length| length * meters_per_unit),
        duration_s: summary.time,
    })
}

/// Error for a non-success answer. Shared by every Valhalla endpoint.
pub(crate) fn decode_error(status: u16, body: &str) -> ProviderError {
    if status == 429 {
        return ProviderError::RateLimited;
    }
    match serde_json::from_str::<ValhallaErrorBody>(body) {
        Ok(error) if error.error_code.is_some_and(|code| NO_ROUTE_ERROR_CODES.contains(&code)) => {
            ProviderError::RouteNotFound {
                message: error.error.unwrap_or_default(),
            }
        }
        _ => ProviderError::Status {
            code: status,
            body: body.to_string(),
        },
    }
}

#[derive(Debug, Deserialize)]
struct ValhallaRouteBody {
    trip: ValhallaTrip,
}

#[derive(Debug, Deserialize)]
struct ValhallaTrip {
    #[serde(default)]
    legs: Vec<ValhallaLeg>,
    summary: Option<ValhallaSummary>,
    units: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValhallaLeg {
    shape: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ValhallaSummary {
    length: Option<f64>,
    time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ValhallaErrorBody {
    error_code: Option<u32>,
    error: Option<String>,
}
