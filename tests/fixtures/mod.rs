//! Test fixtures for route-snap.
//!
//! Provides:
//! - a small planar street grid for snapping tests
//! - scripted routing and isochrone providers for batch tests
//! - real Las Vegas locations for the live Valhalla test

#![allow(dead_code)]

pub mod las_vegas;

use std::sync::atomic::{AtomicUsize, Ordering};

use geo::{polygon, Polygon};

use route_snap::error::ProviderError;
use route_snap::geometry::{LineFeature, Point};
use route_snap::stitch::RouteFragment;
use route_snap::traits::{IntervalType, Isochrone, IsochroneProvider, RouteProvider, RouteResponse};

/// Three horizontal streets (ids 10, 20, 30 at y = 0, 100, 200) and two
/// avenues (ids 40, 50 at x = 0, 100), each spanning the grid.
pub fn street_grid() -> Vec<LineFeature<u32>> {
    let mut lines = Vec::new();
    for (i, y) in [0.0, 100.0, 200.0].into_iter().enumerate() {
        lines.push(LineFeature::new(
            10 * (i as u32 + 1),
            vec![Point::new(-50.0, y), Point::new(50.0, y), Point::new(150.0, y)],
        ));
    }
    for (i, x) in [0.0, 100.0].into_iter().enumerate() {
        lines.push(LineFeature::new(
            40 + 10 * i as u32,
            vec![Point::new(x, -50.0), Point::new(x, 250.0)],
        ));
    }
    lines
}

/// Provider backed by a closure.
pub struct FnProvider<F> {
    f: F,
    calls: AtomicUsize,
}

impl<F> FnProvider<F>
where
    F: Fn(Point, Point) -> Result<RouteResponse, ProviderError> + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> RouteProvider for FnProvider<F>
where
    F: Fn(Point, Point) -> Result<RouteResponse, ProviderError> + Sync,
{
    fn route(&self, from: Point, to: Point) -> Result<RouteResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(from, to)
    }
}

/// A walk-drive-walk response: approach, two driving legs, egress.
pub fn multimodal_response(from: Point, to: Point) -> RouteResponse {
    let mid_a = Point::new(from.x + 1.0, from.y);
    let mid_b = Point::new(to.x - 1.0, to.y);
    RouteResponse {
        fragments: vec![
            RouteFragment::coordinates(0, vec![from, mid_a]),
            // zero-length transition between walking and driving
            RouteFragment::coordinates(1, vec![mid_a, mid_a]),
            RouteFragment::coordinates(2, vec![mid_a, Point::new(mid_a.x, mid_b.y)]),
            RouteFragment::coordinates(3, vec![Point::new(mid_a.x, mid_b.y), mid_b]),
            RouteFragment::coordinates(4, vec![mid_b, to]),
        ],
        distance_m: Some(from.distance(&to) * 1.3),
        duration_s: Some(60.0),
    }
}

pub fn transport_error() -> ProviderError {
    ProviderError::Status {
        code: 503,
        body: "service unavailable".to_string(),
    }
}

/// Isochrone provider backed by a closure.
pub struct FnIsochrones<F>(pub F);

impl<F> IsochroneProvider for FnIsochrones<F>
where
    F: Fn(Point, &[f64]) -> Result<Vec<Isochrone>, ProviderError> + Sync,
{
    fn isochrones(
        &self,
        center: Point,
        intervals: &[f64],
        _interval_type: IntervalType,
    ) -> Result<Vec<Isochrone>, ProviderError> {
        (self.0)(center, intervals)
    }
}

/// Axis-aligned square centred on `center`.
pub fn square_around(center: Point, half: f64) -> Polygon<f64> {
    polygon![
        (x: center.x - half, y: center.y - half),
        (x: center.x + half, y: center.y - half),
        (x: center.x + half, y: center.y + half),
        (x: center.x - half, y: center.y + half),
    ]
}
