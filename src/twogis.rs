//! 2GIS routing API adapter.
//!
//! 2GIS returns a route as WKT pieces: an optional pedestrian approach, the
//! geometry of every maneuver, and an optional pedestrian egress. They are
//! handed to the stitcher untouched.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ConfigError, ProviderError};
use crate::geometry::Point;
use crate::retry::with_retry;
use crate::stitch::RouteFragment;
use crate::traits::{RouteProvider, RouteResponse};

/// Area the route must avoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludeArea {
    /// Polygon ring, `x` = longitude.
    pub ring: Vec<Point>,
    /// `hard` forbids entering the area, `soft` only discourages it.
    pub severity: String,
}

impl ExcludeArea {
    pub fn hard(ring: Vec<Point>) -> Self {
        Self {
            ring,
            severity: "hard".to_string(),
        }
    }

    fn to_request(&self) -> serde_json::Value {
        let points: Vec<_> = self
            .ring
            .iter()
            .map(|p| json!({ "lon": p.x, "lat": p.y }))
            .collect();
        json!({ "points": points, "type": "polygon", "severity": self.severity })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoGisConfig {
    pub client: ClientConfig,
    pub key: String,
    pub route_mode: String,
    pub traffic_mode: String,
    pub transport: String,
    pub output: String,
    pub locale: String,
    pub exclude: Vec<ExcludeArea>,
}

impl Default for TwoGisConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::with_base_url("https://routing.api.2gis.com/routing/7.0.0/global"),
            key: String::new(),
            route_mode: "fastest".to_string(),
            traffic_mode: "statistics".to_string(),
            transport: "driving".to_string(),
            output: "detailed".to_string(),
            locale: "ru".to_string(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TwoGisClient {
    config: TwoGisConfig,
    client: reqwest::blocking::Client,
}

impl TwoGisClient {
    /// Creates a client; fails on invalid client settings.
    pub fn new(config: TwoGisConfig) -> Result<Self, ConfigError> {
        let client = config.client.http_client()?;
        Ok(Self { config, client })
    }

    fn request_body(&self, from: Point, to: Point) -> serde_json::Value {
        let exclude: Vec<_> = self.config.exclude.iter().map(ExcludeArea::to_request).collect();
        json!({
            "route_mode": self.config.route_mode,
            "traffic_mode": self.config.traffic_mode,
            "transport": self.config.transport,
            "output": self.config.output,
            "locale": self.config.locale,
            "alternative": 0,
            "points": [
                { "type": "stop", "lon": from.x, "lat": from.y },
                { "type": "stop", "lon": to.x, "lat": to.y },
            ],
            "exclude": exclude,
        })
    }

    fn send(&self, body: &serde_json::Value) -> Result<RouteResponse, ProviderError> {
        let response = self
            .client
            .post(&self.config.client.base_url)
            .query(&[("key", self.config.key.as_str())])
            .json(body)
            .send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        decode_response(status, &text)
    }
}

impl RouteProvider for TwoGisClient {
    fn route(&self, from: Point, to: Point) -> Result<RouteResponse, ProviderError> {
        let body = self.request_body(from, to);
        with_retry(&self.config.client, |attempt| {
            debug!(attempt, "requesting 2GIS route");
            self.send(&body)
        })
    }
}

/// Maps an HTTP status and body to the route schema. Only the first
/// route of the result is used.
pub fn decode_response(status: u16, body: &str) -> Result<RouteResponse, ProviderError> {
    if status == 429 {
        return Err(ProviderError::RateLimited);
    }

    let parsed = match serde_json::from_str::<TwoGisBody>(body) {
        Ok(parsed) => parsed,
        Err(_) if !(200..300).contains(&status) => {
            return Err(ProviderError::Status {
                code: status,
                body: body.to_string(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    match parsed.status.as_deref() {
        Some("OK") => {}
        Some("ROUTE_NOT_FOUND") => {
            return Err(ProviderError::RouteNotFound {
                message: parsed.message.unwrap_or_else(|| "ROUTE_NOT_FOUND".to_string()),
            });
        }
        _ if !(200..300).contains(&status) => {
            return Err(ProviderError::Status {
                code: status,
                body: body.to_string(),
            });
        }
        other => {
            return Err(ProviderError::Decode(format!(
                "unexpected status {:?}",
                other.unwrap_or("<missing>")
            )));
        }
    }

    let route = parsed
        .result
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Decode("status OK without routes".to_string()))?;

    Ok(RouteResponse {
        fragments: route.fragments(),
        distance_m: route.total_distance,
        duration_s: route.total_duration,
    })
}

#[derive(Debug, Deserialize)]
struct TwoGisBody {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    result: Vec<TwoGisRoute>,
}

#[derive(Debug, Deserialize)]
struct TwoGisRoute {
    begin_pedestrian_path: Option<TwoGisPath>,
    #[serde(default)]
    maneuvers: Vec<TwoGisManeuver>,
    end_pedestrian_path: Option<TwoGisPath>,
    total_distance: Option<f64>,
    total_duration: Option<f64>,
}

impl TwoGisRoute {
    /// Pieces in travel order.
    fn fragments(&self) -> Vec<RouteFragment> {
        let begin = self
            .begin_pedestrian_path
            .iter()
            .map(|path| path.geometry.as_ref().and_then(|g| g.selection.clone()));
        let maneuvers = self
            .maneuvers
            .iter()
            .filter_map(|maneuver| maneuver.outcoming_path.as_ref())
            .flat_map(|path| path.geometry.iter().map(|g| g.selection.clone()));
        let end = self
            .end_pedestrian_path
            .iter()
            .map(|path| path.geometry.as_ref().and_then(|g| g.selection.clone()));

        begin
            .chain(maneuvers)
            .chain(end)
            .enumerate()
            .map(|(ordinal, selection)| match selection {
                Some(text) => RouteFragment::wkt(ordinal, text),
                None => RouteFragment::new(ordinal, None),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct TwoGisPath {
    geometry: Option<TwoGisSelection>,
}

#[derive(Debug, Deserialize)]
struct TwoGisManeuver {
    outcoming_path: Option<TwoGisOutcomingPath>,
}

#[derive(Debug, Deserialize)]
struct TwoGisOutcomingPath {
    #[serde(default)]
    geometry: Vec<TwoGisSelection>,
}

#[derive(Debug, Deserialize)]
struct TwoGisSelection {
    selection: Option<String>,
}
