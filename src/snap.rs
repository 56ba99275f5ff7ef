//! Point-to-network snapping.

use serde::Serialize;

use crate::config::SnapConfig;
use crate::error::ConfigError;
use crate::geometry::Point;
use crate::index::SpatialIndex;
use crate::traits::Id;

/// Outcome of snapping one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SnapStatus {
    Matched,
    NoCandidateWithinTolerance,
}

/// Snapped location of one input point.
///
/// When `matched` is set, `distance <= tolerance` and `snapped` lies on the
/// matched feature. Otherwise `snapped` equals `original`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapResult<I> {
    pub original: Point,
    pub matched: Option<I>,
    pub snapped: Point,
    pub distance: Option<f64>,
}

impl<I> SnapResult<I> {
    fn unmatched(original: Point) -> Self {
        Self {
            original,
            matched: None,
            snapped: original,
            distance: None,
        }
    }

    /// Returns whether a line was matched.
    pub fn status(&self) -> SnapStatus {
        if self.matched.is_some() {
            SnapStatus::Matched
        } else {
            SnapStatus::NoCandidateWithinTolerance
        }
    }
}

/// Relocates points onto the nearest line of an index.
#[derive(Debug)]
pub struct SnapEngine<'a, I> {
    index: &'a SpatialIndex<I>,
    tolerance: f64,
}

impl<'a, I: Id> SnapEngine<'a, I> {
    /// Fails on a negative or non-finite tolerance.
    pub fn new(index: &'a SpatialIndex<I>, config: &SnapConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            index,
            tolerance: config.tolerance,
        })
    }

    /// Returns the validated snapping tolerance.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Snaps a single point.
    pub fn snap_point(&self, point: Point) -> SnapResult<I> {
        match self.index.query_nearest(point, self.tolerance) {
            Some(candidate) => SnapResult {
                original: point,
                matched: Some(candidate.feature_id),
                snapped: candidate.projected,
                distance: Some(candidate.distance),
            },
            None => SnapResult::unmatched(point),
        }
    }

    /// One result per input point, in input order.
    pub fn snap(&self, points: &[Point]) -> Vec<SnapResult<I>> {
        points.iter().map(|point| self.snap_point(*point)).collect()
    }
}

/// Convenience wrapper: validate, then snap every point.
pub fn snap<I: Id>(
    points: &[Point],
    index: &SpatialIndex<I>,
    tolerance: f64,
) -> Result<Vec<SnapResult<I>>, ConfigError> {
    let engine = SnapEngine::new(index, &SnapConfig { tolerance })?;
    Ok(engine.snap(points))
}
