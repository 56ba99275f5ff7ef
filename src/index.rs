//! Bounding-box index over line features for nearest-line queries.
//!
//! Every polyline segment is stored in an R-tree together with the position
//! of its owning feature. Queries walk segments in increasing distance and
//! stop once nothing left can beat (or tie) the best candidate.

use rstar::primitives::{GeomWithData, Line};
use rstar::RTree;
use tracing::{info, warn};

use crate::error::{ConfigError, InvalidLineFeature};
use crate::geometry::{COORD_EPSILON, LineFeature, Point};
use crate::traits::Id;

/// Segment of a feature: `(feature position, segment index)`.
type SegmentItem = GeomWithData<Line<[f64; 2]>, (usize, usize)>;

/// Nearest line feature to a query point.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapCandidate<I> {
    pub point: Point,
    pub feature_id: I,
    /// Closest location on the feature.
    pub projected: Point,
    pub segment: usize,
    /// Distance between `point` and `projected`.
    pub distance: f64,
}

/// Read-only spatial index, built once per snapping session.
#[derive(Debug)]
pub struct SpatialIndex<I> {
    features: Vec<LineFeature<I>>,
    tree: RTree<SegmentItem>,
    rejected: Vec<InvalidLineFeature>,
}

impl<I: Id> SpatialIndex<I> {
    /// Builds the index from owned copies of the features.
    ///
    /// Invalid features (fewer than two vertices, non-finite coordinates)
    /// are logged and excluded; they are available from
    /// [`SpatialIndex::rejected`]. Fails when no valid feature remains.
    pub fn build(lines: impl IntoIterator<Item = LineFeature<I>>) -> Result<Self, ConfigError> {
        let mut features = Vec::new();
        let mut rejected = Vec::new();

        for line in lines {
            match line.validate() {
                Ok(()) => features.push(line),
                Err(err) => {
                    warn!(id = %err.id, reason = ?err.reason, "excluding invalid line feature");
                    rejected.push(err);
                }
            }
        }

        if features.is_empty() {
            return Err(ConfigError::EmptyLineCollection);
        }

        let segments: Vec<SegmentItem> = features
            .iter()
            .enumerate()
            .flat_map(|(position, feature)| {
                feature.segments().enumerate().map(move |(segment, (a, b))| {
                    GeomWithData::new(Line::new([a.x, a.y], [b.x, b.y]), (position, segment))
                })
            })
            .collect();

        let tree = RTree::bulk_load(segments);
        info!(
            features = features.len(),
            segments = tree.size(),
            rejected = rejected.len(),
            "spatial index built"
        );

        Ok(Self {
            features,
            tree,
            rejected,
        })
    }

    /// Number of indexed features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Indexed features, in input order.
    pub fn features(&self) -> &[LineFeature<I>] {
        &self.features
    }

    /// Features excluded at build time.
    pub fn rejected(&self) -> &[InvalidLineFeature] {
        &self.rejected
    }

    /// Nearest feature whose distance to `point` is at most `max_distance`.
    ///
    /// Features within [`COORD_EPSILON`] of each other count as equidistant
    /// and resolve to the lowest identifier.
    pub fn query_nearest(&self, point: Point, max_distance: f64) -> Option<SnapCandidate<I>> {
        if !point.is_finite() || max_distance.is_nan() || max_distance < 0.0 {
            return None;
        }

        // (distance, feature position, segment, projected point)
        let mut candidates: Vec<(f64, usize, usize, Point)> = Vec::new();
        let mut min_distance = f64::INFINITY;
        for (item, distance_2) in self.tree.nearest_neighbor_iter_with_distance_2(&[point.x, point.y]) {
            let segment_distance = distance_2.sqrt();
            if segment_distance > max_distance + COORD_EPSILON
                || segment_distance > min_distance + COORD_EPSILON
            {
                break;
            }

            let (position, segment) = item.data;
            let Some(projection) = self.features[position].project_onto(point, segment) else {
                continue;
            };
            if projection.distance > max_distance {
                continue;
            }
            min_distance = min_distance.min(projection.distance);
            candidates.push((projection.distance, position, segment, projection.point));
        }

        // The tie window is anchored at the true minimum, so it never chains.
        candidates
            .into_iter()
            .filter(|(distance, ..)| *distance <= min_distance + COORD_EPSILON)
            .min_by(|a, b| {
                self.features[a.1]
                    .id()
                    .cmp(self.features[b.1].id())
                    .then(a.2.cmp(&b.2))
            })
            .map(|(distance, position, segment, projected)| SnapCandidate {
                point,
                feature_id: self.features[position].id().clone(),
                projected,
                segment,
                distance,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: u32, points: &[(f64, f64)]) -> LineFeature<u32> {
        LineFeature::new(id, points.iter().copied().map(Point::from).collect())
    }

    #[test]
    fn test_build_excludes_invalid_lines() {
        let index = SpatialIndex::build(vec![
            line(1, &[(0.0, 0.0), (10.0, 0.0)]),
            line(2, &[(5.0, 5.0)]),
            line(3, &[]),
        ])
        .unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.rejected().len(), 2);
        assert_eq!(index.rejected()[0].id, "2");
    }

    #[test]
    fn test_build_fails_without_valid_lines() {
        let result = SpatialIndex::build(vec![line(1, &[(0.0, 0.0)])]);
        assert!(matches!(result, Err(ConfigError::EmptyLineCollection)));

        let result = SpatialIndex::<u32>::build(Vec::new());
        assert!(matches!(result, Err(ConfigError::EmptyLineCollection)));
    }

    #[test]
    fn test_query_uses_segment_distance_not_vertex_distance() {
        let index = SpatialIndex::build(vec![
            line(1, &[(0.0, 0.0), (100.0, 0.0)]),
            line(2, &[(48.0, 4.0), (52.0, 4.0)]),
        ])
        .unwrap();

        // Vertices of line 1 are 50 away, its interior is 1 away.
        let candidate = index.query_nearest(Point::new(50.0, 1.0), 5.0).unwrap();
        assert_eq!(candidate.feature_id, 1);
        assert!((candidate.distance - 1.0).abs() < 1e-9);
        assert_eq!(candidate.projected, Point::new(50.0, 0.0));
    }

    #[test]
    fn test_query_respects_max_distance() {
        let index = SpatialIndex::build(vec![line(1, &[(0.0, 0.0), (10.0, 0.0)])]).unwrap();
        assert!(index.query_nearest(Point::new(5.0, 10.0), 5.0).is_none());
        assert!(index.query_nearest(Point::new(5.0, 5.0), 5.0).is_some());
    }

    #[test]
    fn test_equidistant_lines_prefer_lowest_id() {
        let lines = vec![
            line(9, &[(0.0, 2.0), (10.0, 2.0)]),
            line(4, &[(0.0, -2.0), (10.0, -2.0)]),
            line(7, &[(0.0, 2.0), (10.0, 2.0)]),
        ];
        let index = SpatialIndex::build(lines.clone()).unwrap();
        let candidate = index.query_nearest(Point::new(5.0, 0.0), 5.0).unwrap();
        assert_eq!(candidate.feature_id, 4);

        // Insertion order must not matter.
        let mut reversed = lines;
        reversed.reverse();
        let index = SpatialIndex::build(reversed).unwrap();
        assert_eq!(index.query_nearest(Point::new(5.0, 0.0), 5.0).unwrap().feature_id, 4);
    }

    #[test]
    fn test_near_equidistant_lines_within_epsilon_prefer_lowest_id() {
        let index = SpatialIndex::build(vec![
            line(5, &[(0.0, 1.0), (10.0, 1.0)]),
            line(2, &[(0.0, -(1.0 + 0.5e-9)), (10.0, -(1.0 + 0.5e-9))]),
        ])
        .unwrap();
        let candidate = index.query_nearest(Point::new(5.0, 0.0), 5.0).unwrap();
        assert_eq!(candidate.feature_id, 2);
    }

    #[test]
    fn test_tie_window_does_not_chain() {
        // Each line is within epsilon of the next, but line 1 is not within
        // epsilon of the closest one.
        let index = SpatialIndex::build(vec![
            line(3, &[(0.0, 1.0), (10.0, 1.0)]),
            line(2, &[(0.0, -(1.0 + 0.8e-9)), (10.0, -(1.0 + 0.8e-9))]),
            line(1, &[(0.0, 1.0 + 1.6e-9), (10.0, 1.0 + 1.6e-9)]),
        ])
        .unwrap();
        let candidate = index.query_nearest(Point::new(5.0, 0.0), 5.0).unwrap();
        assert_eq!(candidate.feature_id, 2);
    }

    #[test]
    fn test_clearly_closer_line_beats_lower_id() {
        let index = SpatialIndex::build(vec![
            line(9, &[(0.0, 1.0), (10.0, 1.0)]),
            line(1, &[(0.0, -(1.0 + 1e-6)), (10.0, -(1.0 + 1e-6))]),
        ])
        .unwrap();
        assert_eq!(index.query_nearest(Point::new(5.0, 0.0), 5.0).unwrap().feature_id, 9);
    }

    #[test]
    fn test_many_features_still_find_nearest() {
        let lines: Vec<_> = (0..200)
            .map(|i| {
                let y = i as f64 * 10.0;
                line(i, &[(0.0, y), (50.0, y)])
            })
            .collect();
        let index = SpatialIndex::build(lines).unwrap();
        let candidate = index.query_nearest(Point::new(25.0, 1234.0), 8.0).unwrap();
        assert_eq!(candidate.feature_id, 123);
        assert!((candidate.distance - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_nan_query_finds_nothing() {
        let index = SpatialIndex::build(vec![line(1, &[(0.0, 0.0), (10.0, 0.0)])]).unwrap();
        assert!(index.query_nearest(Point::new(f64::NAN, 0.0), 5.0).is_none());
    }
}
