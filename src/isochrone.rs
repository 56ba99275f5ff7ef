//! Valhalla `/isochrone` adapter.
//!
//! Intervals are given in seconds or meters and sent to Valhalla as
//! minutes or kilometers. The GeoJSON answer is decoded into one polygon
//! per contour; a contour whose rings are unusable comes back without a
//! polygon instead of failing the whole request.

use geo::{Area, Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ConfigError, ProviderError};
use crate::geometry::Point;
use crate::retry::with_retry;
use crate::traits::{IntervalType, Isochrone, IsochroneProvider};
use crate::valhalla::decode_error;

const SECONDS_PER_MINUTE: f64 = 60.0;
const METERS_PER_KILOMETER: f64 = 1000.0;

/// Fewest coordinates of a closed ring.
const MIN_RING_COORDS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsochroneConfig {
    pub client: ClientConfig,
    pub costing: String,
    /// Ask for polygons rather than closed lines.
    pub polygons: bool,
    /// Valhalla's `denoise`, 0 to 1. `None` keeps the service default.
    pub denoise: Option<f64>,
}

impl Default for IsochroneConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::with_base_url("http://localhost:8002"),
            costing: "pedestrian".to_string(),
            polygons: true,
            denoise: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValhallaIsochroneClient {
    config: IsochroneConfig,
    client: reqwest::blocking::Client,
}

impl ValhallaIsochroneClient {
    /// Creates a client; fails on invalid client settings.
    pub fn new(config: IsochroneConfig) -> Result<Self, ConfigError> {
        let client = config.client.http_client()?;
        Ok(Self { config, client })
    }

    fn request_body(&self, center: Point, intervals: &[f64], interval_type: IntervalType) -> serde_json::Value {
        let contours: Vec<_> = intervals
            .iter()
            .map(|&interval| match interval_type {
                IntervalType::Time => json!({ "time": interval / SECONDS_PER_MINUTE }),
                IntervalType::Distance => json!({ "distance": interval / METERS_PER_KILOMETER }),
            })
            .collect();

        let mut body = json!({
            "locations": [{ "lon": center.x, "lat": center.y }],
            "costing": self.config.costing,
            "contours": contours,
            "polygons": self.config.polygons,
        });
        if let Some(denoise) = self.config.denoise {
            body["denoise"] = json!(denoise);
        }
        body
    }

    fn send(&self, body: &serde_json::Value, interval_type: IntervalType) -> Result<Vec<Isochrone>, ProviderError> {
        let url = format!("{}/isochrone", self.config.client.base_url.trim_end_matches('/'));
        let response = self.client.post(url).json(body).send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        decode_response(status, &text, interval_type)
    }
}

impl IsochroneProvider for ValhallaIsochroneClient {
    fn isochrones(
        &self,
        center: Point,
        intervals: &[f64],
        interval_type: IntervalType,
    ) -> Result<Vec<Isochrone>, ProviderError> {
        let body = self.request_body(center, intervals, interval_type);
        with_retry(&self.config.client, |attempt| {
            debug!(attempt, "requesting Valhalla isochrones");
            self.send(&body, interval_type)
        })
    }
}

/// Maps an HTTP status and GeoJSON body to isochrones, intervals converted
/// back to seconds or meters.
pub fn decode_response(
    status: u16,
    body: &str,
    interval_type: IntervalType,
) -> Result<Vec<Isochrone>, ProviderError> {
    if !(200..300).contains(&status) {
        return Err(decode_error(status, body));
    }

    let parsed: FeatureCollection = serde_json::from_str(body)?;
    let scale = match interval_type {
        IntervalType::Time => SECONDS_PER_MINUTE,
        IntervalType::Distance => METERS_PER_KILOMETER,
    };

    let isochrones = parsed
        .features
        .into_iter()
        .filter_map(|feature| {
            let Some(contour) = feature.properties.and_then(|p| p.contour) else {
                warn!("isochrone feature without a contour value, skipping");
                return None;
            };
            let polygon = feature.geometry.and_then(|geometry| geometry.into_polygon());
            if polygon.is_none() {
                debug!(contour, "isochrone contour has no usable polygon");
            }
            Some(Isochrone {
                interval: contour * scale,
                polygon,
            })
        })
        .collect();
    Ok(isochrones)
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: Option<ContourProperties>,
    geometry: Option<GeoJsonGeometry>,
}

#[derive(Debug, Deserialize)]
struct ContourProperties {
    contour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonGeometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: serde_json::Value,
}

type Ring = Vec<[f64; 2]>;

impl GeoJsonGeometry {
    fn into_polygon(self) -> Option<Polygon<f64>> {
        match self.kind.as_str() {
            "Polygon" => polygon_from_rings(serde_json::from_value(self.coordinates).ok()?),
            // Largest part wins.
            "MultiPolygon" => serde_json::from_value::<Vec<Vec<Ring>>>(self.coordinates)
                .ok()?
                .into_iter()
                .filter_map(polygon_from_rings)
                .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area())),
            // `polygons: false` answers with the outline as a closed line.
            "LineString" => polygon_from_rings(vec![serde_json::from_value(self.coordinates).ok()?]),
            _ => None,
        }
    }
}

fn polygon_from_rings(rings: Vec<Ring>) -> Option<Polygon<f64>> {
    let mut rings = rings.into_iter().filter_map(ring_to_line);
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

fn ring_to_line(ring: Ring) -> Option<LineString<f64>> {
    if ring.len() < MIN_RING_COORDS || !ring.iter().flatten().all(|value| value.is_finite()) {
        return None;
    }
    Some(ring.into_iter().map(|[x, y]| Coord { x, y }).collect())
}
