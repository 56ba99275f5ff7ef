//! Core seams between the geometric engines and their collaborators.
//!
//! These are intentionally minimal. Routing services and identifier types
//! are supplied by the caller.

use std::fmt::Debug;

use geo::Polygon;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::geometry::Point;
use crate::stitch::RouteFragment;

/// Identifier for line features and input rows.
///
/// `Ord` is required so that equidistant snap candidates resolve to the
/// lowest identifier.
pub trait Id: Clone + Ord + Debug + Send + Sync {}

impl<T> Id for T where T: Clone + Ord + Debug + Send + Sync {}

/// Decoded answer of a routing service for one origin/destination pair.
///
/// Fragments are still raw: parsing them is the stitcher's job so that one
/// malformed leg never invalidates the whole response.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub fragments: Vec<RouteFragment>,
    /// Total route length in meters.
    pub distance_m: Option<f64>,
    /// Total travel time in seconds.
    pub duration_s: Option<f64>,
}

/// Computes a route between two points.
///
/// Implementations own their transport, timeout and retry behavior; the
/// batch processor only sees the final outcome.
pub trait RouteProvider: Sync {
    fn route(&self, from: Point, to: Point) -> Result<RouteResponse, ProviderError>;
}

impl<P: RouteProvider + ?Sized> RouteProvider for &P {
    fn route(&self, from: Point, to: Point) -> Result<RouteResponse, ProviderError> {
        (**self).route(from, to)
    }
}

/// What an isochrone interval measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalType {
    /// Seconds of travel.
    Time,
    /// Meters of travel.
    Distance,
}

/// Area reachable from a center within one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Isochrone {
    /// Seconds or meters, per the requested [`IntervalType`].
    pub interval: f64,
    pub polygon: Option<Polygon<f64>>,
}

/// Computes reachability polygons around a point.
pub trait IsochroneProvider: Sync {
    /// Returns the isochrones the service produced. Intervals it could not
    /// compute may be absent from the result.
    fn isochrones(
        &self,
        center: Point,
        intervals: &[f64],
        interval_type: IntervalType,
    ) -> Result<Vec<Isochrone>, ProviderError>;
}

impl<P: IsochroneProvider + ?Sized> IsochroneProvider for &P {
    fn isochrones(
        &self,
        center: Point,
        intervals: &[f64],
        interval_type: IntervalType,
    ) -> Result<Vec<Isochrone>, ProviderError> {
        (**self).isochrones(center, intervals, interval_type)
    }
}
