//! Planar points and line features.
//!
//! All geometry lives in one reference frame; converting between frames is
//! the caller's job and happens before anything reaches this crate.

use geo::{Closest, ClosestPoint, Distance, Euclidean, Line};
use serde::{Deserialize, Serialize};

use crate::error::{InvalidLineFeature, InvalidLineReason};
use crate::traits::Id;

/// Two coordinates are treated as the same location below this distance.
pub const COORD_EPSILON: f64 = 1e-9;

/// Immutable 2D coordinate. For geographic input `x` is longitude and `y`
/// is latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns true if both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Planar Euclidean distance.
    pub fn distance(&self, other: &Point) -> f64 {
        Euclidean.distance(&geo::Point::from(*self), &geo::Point::from(*other))
    }

    /// Returns true if the points are within `COORD_EPSILON` of each other.
    pub fn coincides(&self, other: &Point) -> bool {
        self.distance(other) <= COORD_EPSILON
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(point: Point) -> Self {
        geo::Coord {
            x: point.x,
            y: point.y,
        }
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(point: Point) -> Self {
        geo::Point::new(point.x, point.y)
    }
}

impl From<geo::Coord<f64>> for Point {
    fn from(coord: geo::Coord<f64>) -> Self {
        Point::new(coord.x, coord.y)
    }
}

impl From<geo::Point<f64>> for Point {
    fn from(point: geo::Point<f64>) -> Self {
        Point::new(point.x(), point.y())
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// Closest location to `point` on the segment `start`-`end`.
///
/// The perpendicular foot is clamped to the segment span; a zero-length
/// segment projects onto its start.
pub fn project_onto_segment(point: Point, start: Point, end: Point) -> Point {
    let line = Line::new(geo::Coord::from(start), geo::Coord::from(end));
    match line.closest_point(&geo::Point::from(point)) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => p.into(),
        Closest::Indeterminate => start,
    }
}

/// Result of projecting a point onto a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub point: Point,
    /// Index of the segment (starting vertex) the projection falls on.
    pub segment: usize,
    pub distance: f64,
}

/// An identified polyline.
///
/// Construction does not validate; [`LineFeature::validate`] is applied when
/// the feature enters a [`crate::index::SpatialIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct LineFeature<I> {
    id: I,
    points: Vec<Point>,
}

impl<I: Id> LineFeature<I> {
    /// Creates a line feature. Validity is checked at index build time.
    pub fn new(id: I, points: Vec<Point>) -> Self {
        Self { id, points }
    }

    /// Returns the feature identifier.
    pub fn id(&self) -> &I {
        &self.id
    }

    /// Returns the vertices.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Consecutive vertex pairs.
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }

    pub fn validate(&self) -> Result<(), InvalidLineFeature> {
        let reason = if self.points.len() < 2 {
            Some(InvalidLineReason::TooFewVertices(self.points.len()))
        } else if !self.points.iter().all(Point::is_finite) {
            Some(InvalidLineReason::NonFiniteCoordinate)
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidLineFeature {
                id: format!("{:?}", self.id),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Projection onto one segment of this feature.
    pub fn project_onto(&self, point: Point, segment: usize) -> Option<Projection> {
        let start = *self.points.get(segment)?;
        let end = *self.points.get(segment + 1)?;
        let foot = project_onto_segment(point, start, end);
        Some(Projection {
            point: foot,
            segment,
            distance: point.distance(&foot),
        })
    }

    /// Closest location on the whole polyline. Ties between segments keep
    /// the earliest segment.
    pub fn project(&self, point: Point) -> Option<Projection> {
        (0..self.points.len().saturating_sub(1))
            .filter_map(|segment| self.project_onto(point, segment))
            .fold(None, |best: Option<Projection>, candidate| match best {
                Some(current) if current.distance <= candidate.distance => Some(current),
                _ => Some(candidate),
            })
    }
}
