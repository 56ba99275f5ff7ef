//! Multi-fragment route stitching.
//!
//! Routing services return a route as several disjoint pieces (pedestrian
//! approach, one piece per maneuver, pedestrian egress). Each piece is
//! parsed on its own and unusable pieces are dropped, so a zero-length
//! transition between travel modes never costs the whole route.

use geo::Geometry;
use tracing::debug;
use wkt::TryFromWkt;

use crate::error::FragmentParseFailure;
use crate::geometry::Point;
use crate::polyline::{MergedRoute, Polyline};

/// Raw geometry of one fragment, as delivered by the routing service.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentGeometry {
    Wkt(String),
    EncodedPolyline { encoded: String, precision: u32 },
    Coordinates(Vec<Point>),
}

/// One leg of a route, positioned by `ordinal`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFragment {
    pub ordinal: usize,
    pub geometry: Option<FragmentGeometry>,
}

impl RouteFragment {
    /// Creates a fragment with optional geometry.
    pub fn new(ordinal: usize, geometry: Option<FragmentGeometry>) -> Self {
        Self { ordinal, geometry }
    }

    /// Creates a WKT fragment.
    pub fn wkt(ordinal: usize, text: impl Into<String>) -> Self {
        Self::new(ordinal, Some(FragmentGeometry::Wkt(text.into())))
    }

    /// Creates an encoded polyline fragment.
    pub fn encoded(ordinal: usize, encoded: impl Into<String>, precision: u32) -> Self {
        Self::new(
            ordinal,
            Some(FragmentGeometry::EncodedPolyline {
                encoded: encoded.into(),
                precision,
            }),
        )
    }

    /// Creates a fragment from decoded coordinates.
    pub fn coordinates(ordinal: usize, points: Vec<Point>) -> Self {
        Self::new(ordinal, Some(FragmentGeometry::Coordinates(points)))
    }

    /// Decodes the fragment into a line with some extent.
    pub fn parse(&self) -> Result<Polyline, FragmentParseFailure> {
        let polyline = match &self.geometry {
            None => return Err(FragmentParseFailure::Missing),
            Some(FragmentGeometry::Wkt(text)) => parse_wkt_line(text)?,
            Some(FragmentGeometry::EncodedPolyline { encoded, precision }) => {
                Polyline::decode(encoded, *precision)?
            }
            Some(FragmentGeometry::Coordinates(points)) => Polyline::new(points.clone()),
        };

        if polyline.is_empty() {
            return Err(FragmentParseFailure::Empty);
        }
        if !polyline.points().iter().all(Point::is_finite) {
            return Err(FragmentParseFailure::NonFiniteCoordinate);
        }
        if polyline.is_degenerate() {
            return Err(FragmentParseFailure::Degenerate);
        }
        Ok(polyline)
    }
}

fn parse_wkt_line(text: &str) -> Result<Polyline, FragmentParseFailure> {
    let geometry = Geometry::<f64>::try_from_wkt_str(text)
        .map_err(|err| FragmentParseFailure::MalformedWkt(err.to_string()))?;

    match geometry {
        Geometry::LineString(line) => Ok(Polyline::from(line)),
        Geometry::Line(line) => Ok(Polyline::new(vec![line.start.into(), line.end.into()])),
        Geometry::MultiLineString(multi) => {
            let mut lines = multi.0.into_iter();
            match (lines.next(), lines.next()) {
                (None, _) => Err(FragmentParseFailure::Empty),
                (Some(line), None) => Ok(Polyline::from(line)),
                (Some(_), Some(_)) => Err(FragmentParseFailure::NotALine("multi-part MULTILINESTRING")),
            }
        }
        Geometry::Point(_) | Geometry::MultiPoint(_) => Err(FragmentParseFailure::NotALine("point geometry")),
        _ => Err(FragmentParseFailure::NotALine("areal geometry")),
    }
}

/// A fragment that did not make it into the merged route.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedFragment {
    pub ordinal: usize,
    pub reason: FragmentParseFailure,
}

/// Merged route plus the fragments that were filtered out.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchOutcome {
    pub route: Option<MergedRoute>,
    pub dropped: Vec<DroppedFragment>,
    /// Number of fragments that survived parsing.
    pub used: usize,
}

/// Stitches fragments into a single route.
///
/// Returns `None` when no fragment survives parsing.
pub fn stitch(fragments: &[RouteFragment]) -> Option<MergedRoute> {
    stitch_with_report(fragments).route
}

/// Like [`stitch`], also reporting which fragments were dropped and why.
pub fn stitch_with_report(fragments: &[RouteFragment]) -> StitchOutcome {
    let mut ordered: Vec<&RouteFragment> = fragments.iter().collect();
    ordered.sort_by_key(|fragment| fragment.ordinal);

    let mut parts = Vec::with_capacity(ordered.len());
    let mut dropped = Vec::new();
    for fragment in ordered {
        match fragment.parse() {
            Ok(polyline) => parts.push(polyline),
            Err(reason) => {
                debug!(ordinal = fragment.ordinal, reason = %reason, "dropping route fragment");
                dropped.push(DroppedFragment {
                    ordinal: fragment.ordinal,
                    reason,
                });
            }
        }
    }

    let used = parts.len();
    let route = match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(concatenate(parts)),
    };

    StitchOutcome {
        route,
        dropped,
        used,
    }
}

/// Joins parts in order. A shared endpoint is kept once; gaps between
/// parts are left as they are.
fn concatenate(parts: Vec<Polyline>) -> Polyline {
    let mut points: Vec<Point> = Vec::with_capacity(parts.iter().map(Polyline::len).sum());
    for part in parts {
        let mut vertices = part.into_points().into_iter().peekable();
        let shared = matches!(
            (points.last(), vertices.peek()),
            (Some(last), Some(first)) if last.coincides(first)
        );
        if shared {
            vertices.next();
        }
        points.extend(vertices);
    }
    Polyline::new(points)
}
