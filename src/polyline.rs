//! Polyline representation for route geometries.
//!
//! Routes are kept as decoded coordinate sequences. Encoded formats (Google
//! encoded polylines, WKT) are handled only at the boundary: decoding when a
//! routing response arrives, WKT rendering when a batch table is produced.

use geo::LineString;
use serde::{Deserialize, Serialize};
use wkt::ToWkt;

use crate::error::FragmentParseFailure;
use crate::geometry::Point;

/// An ordered sequence of route vertices, `x` = longitude, `y` = latitude
/// for geographic data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Point>,
}

/// A stitched route.
pub type MergedRoute = Polyline;

/// Largest precision the encoded polyline scale factor (`10^precision`)
/// can represent.
pub const MAX_PRECISION: u32 = 9;

impl Polyline {
    /// Creates a polyline from decoded vertices.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Decodes a Google encoded polyline with `precision` decimal digits
    /// (5 for Google/OSRM, 6 for Valhalla).
    pub fn decode(encoded: &str, precision: u32) -> Result<Self, FragmentParseFailure> {
        if precision > MAX_PRECISION {
            return Err(FragmentParseFailure::MalformedPolyline(format!(
                "precision {} out of range, at most {} supported",
                precision, MAX_PRECISION
            )));
        }
        ::polyline::decode_polyline(encoded, precision)
            .map(Self::from)
            .map_err(|err| FragmentParseFailure::MalformedPolyline(err.to_string()))
    }

    /// Returns the vertices in travel order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Consumes the polyline, returning its vertices.
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    /// Returns the number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if there are no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the first vertex, if any.
    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    /// Returns the last vertex, if any.
    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Sum of segment lengths in coordinate units.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|pair| pair[0].distance(&pair[1])).sum()
    }

    /// True when there is no extent to travel along.
    pub fn is_degenerate(&self) -> bool {
        match self.points.first() {
            None => true,
            Some(first) => self.points.len() < 2 || self.points.iter().all(|p| p.coincides(first)),
        }
    }

    /// Adjacent vertex pairs farther apart than `gap` are reported by the
    /// index of the first vertex.
    pub fn gaps(&self, gap: f64) -> Vec<usize> {
        self.points
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0].distance(&pair[1]) > gap)
            .map(|(index, _)| index)
            .collect()
    }

    /// WKT rendering, `LINESTRING(x y,...)`.
    pub fn to_wkt(&self) -> String {
        self.points
            .iter()
            .map(|p| geo::Coord::from(*p))
            .collect::<LineString<f64>>()
            .wkt_string()
    }
}

impl From<LineString<f64>> for Polyline {
    fn from(line: LineString<f64>) -> Self {
        Self::new(line.into_inner().into_iter().map(Point::from).collect())
    }
}

impl From<Polyline> for LineString<f64> {
    fn from(polyline: Polyline) -> Self {
        polyline
            .points
            .into_iter()
            .map(geo::Coord::from)
            .collect()
    }
}
