//! Straight-line route provider for offline runs and tests.
//!
//! Produces a two-vertex route along the great circle, with the duration
//! derived from an assumed speed.

use geo::{Distance, Haversine};

use crate::error::ProviderError;
use crate::geometry::Point;
use crate::stitch::RouteFragment;
use crate::traits::{RouteProvider, RouteResponse};

const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Routes every pair directly from start to end.
///
/// Points are geographic: `x` = longitude, `y` = latitude, in degrees.
#[derive(Debug, Clone)]
pub struct StraightLineRouter {
    pub speed_kmh: f64,
}

impl Default for StraightLineRouter {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl StraightLineRouter {
    /// Creates a router with the given average speed.
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Great-circle distance in meters.
    pub fn haversine_m(from: Point, to: Point) -> f64 {
        Haversine.distance(geo::Point::from(from), geo::Point::from(to))
    }

    fn travel_seconds(&self, meters: f64) -> f64 {
        meters * 3.6 / self.speed_kmh
    }
}

impl RouteProvider for StraightLineRouter {
    fn route(&self, from: Point, to: Point) -> Result<RouteResponse, ProviderError> {
        if !from.is_finite() || !to.is_finite() {
            return Err(ProviderError::Decode("non-finite coordinate".to_string()));
        }
        let distance = Self::haversine_m(from, to);
        Ok(RouteResponse {
            fragments: vec![RouteFragment::coordinates(0, vec![from, to])],
            distance_m: Some(distance),
            duration_s: Some(self.travel_seconds(distance)),
        })
    }
}
