//! Batch orchestration with per-item failure isolation.
//!
//! Every operation returns exactly one record per input item, in input
//! order. A failing item yields a record with null geometry and metrics;
//! it never affects its neighbours. Only configuration errors abort a
//! batch, and they do so before any item runs.

use std::panic::{self, AssertUnwindSafe};

use geo::Polygon;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use wkt::ToWkt;

use crate::config::{BatchConfig, ColumnMapping, SnapConfig};
use crate::error::{ConfigError, ProviderError};
use crate::geometry::Point;
use crate::index::SpatialIndex;
use crate::polyline::MergedRoute;
use crate::snap::{SnapEngine, SnapResult, SnapStatus};
use crate::stitch::stitch_with_report;
use crate::traits::{Id, IntervalType, Isochrone, IsochroneProvider, RouteProvider};

/// Input row: an identifier carried through to the output, plus a point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRow<K> {
    pub id: K,
    pub point: Point,
}

impl<K> PointRow<K> {
    /// Creates an input row.
    pub fn new(id: K, point: Point) -> Self {
        Self { id, point }
    }
}

/// Origin/destination pair to route.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePair<K> {
    pub from: PointRow<K>,
    pub to: PointRow<K>,
}

/// Every start paired with every end, start-major.
pub fn cartesian<K: Clone>(starts: &[PointRow<K>], ends: &[PointRow<K>]) -> Vec<RoutePair<K>> {
    starts
        .iter()
        .flat_map(|from| {
            ends.iter().map(move |to| RoutePair {
                from: from.clone(),
                to: to.clone(),
            })
        })
        .collect()
}

/// Outcome of routing one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteStatus {
    Found,
    /// The service answered with a route, but no fragment was usable.
    NoValidFragments,
    /// The service reported that no route connects the points.
    RouteNotFound,
    /// Transport failure, throttling or malformed response, after retries.
    ServiceError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapRecord<K, I> {
    pub id: K,
    pub result: SnapResult<I>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRecord<K> {
    pub from: K,
    pub to: K,
    pub route: Option<MergedRoute>,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
    pub status: RouteStatus,
    /// Fragments filtered out while stitching.
    pub dropped_fragments: usize,
}

impl<K> RouteRecord<K> {
    fn failed(from: K, to: K, status: RouteStatus) -> Self {
        Self {
            from,
            to,
            route: None,
            distance_m: None,
            duration_s: None,
            status,
            dropped_fragments: 0,
        }
    }
}

/// Outcome of one isochrone interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IsochroneStatus {
    Found,
    /// The service answered, but had no usable polygon for this interval.
    NoPolygon,
    /// Transport failure, throttling or malformed response, after retries.
    ServiceError,
}

/// One row per (input point, interval).
#[derive(Debug, Clone, PartialEq)]
pub struct IsochroneRecord<K> {
    pub id: K,
    pub interval: f64,
    pub interval_type: IntervalType,
    pub polygon: Option<Polygon<f64>>,
    pub status: IsochroneStatus,
}

/// Relative slack when matching returned contours to requested intervals.
const INTERVAL_MATCH_EPSILON: f64 = 1e-6;

/// Drives snapping and routing over collections.
#[derive(Debug)]
pub struct BatchProcessor {
    pool: Option<rayon::ThreadPool>,
}

impl BatchProcessor {
    /// Creates a processor, building a dedicated pool when `threads` is set.
    pub fn new(config: &BatchConfig) -> Result<Self, ConfigError> {
        let pool = match config.threads {
            Some(threads) => Some(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?),
            None => None,
        };
        Ok(Self { pool })
    }

    /// Applies `op` to every item. Results come back in input order no
    /// matter which worker finishes first.
    pub fn run<T, R, F>(&self, items: &[T], op: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        let work = || items.par_iter().map(&op).collect::<Vec<R>>();
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }

    /// Snaps every row onto the index.
    pub fn snap_points<K, I>(
        &self,
        rows: &[PointRow<K>],
        index: &SpatialIndex<I>,
        config: &SnapConfig,
    ) -> Result<Vec<SnapRecord<K, I>>, ConfigError>
    where
        K: Clone + Send + Sync,
        I: Id,
    {
        let engine = SnapEngine::new(index, config)?;
        info!(rows = rows.len(), tolerance = config.tolerance, "snapping batch");

        let records = self.run(rows, |row| SnapRecord {
            id: row.id.clone(),
            result: engine.snap_point(row.point),
        });

        let matched = records
            .iter()
            .filter(|record| record.result.status() == SnapStatus::Matched)
            .count();
        info!(rows = records.len(), matched, unmatched = records.len() - matched, "snapping finished");
        Ok(records)
    }

    /// Routes every pair through `provider` and stitches the fragments.
    pub fn route_pairs<K, P>(&self, pairs: &[RoutePair<K>], provider: &P) -> Vec<RouteRecord<K>>
    where
        K: Id,
        P: RouteProvider + ?Sized,
    {
        info!(pairs = pairs.len(), "routing batch");
        let records = self.run(pairs, |pair| route_one(pair, provider));

        let count = |status: RouteStatus| records.iter().filter(|r| r.status == status).count();
        info!(
            found = count(RouteStatus::Found),
            no_valid_fragments = count(RouteStatus::NoValidFragments),
            route_not_found = count(RouteStatus::RouteNotFound),
            service_error = count(RouteStatus::ServiceError),
            "routing finished"
        );
        records
    }

    /// Routes every start to every end.
    pub fn route_all<K, P>(
        &self,
        starts: &[PointRow<K>],
        ends: &[PointRow<K>],
        provider: &P,
    ) -> Vec<RouteRecord<K>>
    where
        K: Id,
        P: RouteProvider + ?Sized,
    {
        self.route_pairs(&cartesian(starts, ends), provider)
    }

    /// Requests isochrones around every row.
    ///
    /// Emits exactly `rows.len() * intervals.len()` records, row-major in
    /// input order, each interval in the order given. Intervals must be
    /// positive and finite, in seconds or meters.
    pub fn isochrones<K, P>(
        &self,
        rows: &[PointRow<K>],
        intervals: &[f64],
        interval_type: IntervalType,
        provider: &P,
    ) -> Result<Vec<IsochroneRecord<K>>, ConfigError>
    where
        K: Id,
        P: IsochroneProvider + ?Sized,
    {
        validate_intervals(intervals)?;
        info!(rows = rows.len(), intervals = intervals.len(), ?interval_type, "isochrone batch");

        let records: Vec<IsochroneRecord<K>> = self
            .run(rows, |row| isochrones_one(row, intervals, interval_type, provider))
            .into_iter()
            .flatten()
            .collect();

        let found = records
            .iter()
            .filter(|record| record.status == IsochroneStatus::Found)
            .count();
        info!(records = records.len(), found, "isochrones finished");
        Ok(records)
    }
}

fn validate_intervals(intervals: &[f64]) -> Result<(), ConfigError> {
    if intervals.is_empty() {
        return Err(ConfigError::InvalidIntervals("at least one interval is required".to_string()));
    }
    if let Some(bad) = intervals.iter().find(|v| !v.is_finite() || **v <= 0.0) {
        return Err(ConfigError::InvalidIntervals(format!(
            "intervals must be positive and finite, got {}",
            bad
        )));
    }
    Ok(())
}

fn isochrones_one<K, P>(
    row: &PointRow<K>,
    intervals: &[f64],
    interval_type: IntervalType,
    provider: &P,
) -> Vec<IsochroneRecord<K>>
where
    K: Id,
    P: IsochroneProvider + ?Sized,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        provider.isochrones(row.point, intervals, interval_type)
    }));

    let returned: Option<Vec<Isochrone>> = match outcome {
        Ok(Ok(isochrones)) => Some(isochrones),
        Ok(Err(ProviderError::RouteNotFound { message })) => {
            info!(id = ?row.id, %message, "no reachable area around point");
            Some(Vec::new())
        }
        Ok(Err(err)) => {
            warn!(id = ?row.id, error = %err, "isochrone request failed");
            None
        }
        Err(_) => {
            warn!(id = ?row.id, "isochrone provider panicked");
            None
        }
    };

    intervals
        .iter()
        .map(|&interval| {
            let (polygon, status) = match &returned {
                None => (None, IsochroneStatus::ServiceError),
                Some(isochrones) => match matching_polygon(isochrones, interval) {
                    Some(polygon) => (Some(polygon), IsochroneStatus::Found),
                    None => (None, IsochroneStatus::NoPolygon),
                },
            };
            IsochroneRecord {
                id: row.id.clone(),
                interval,
                interval_type,
                polygon,
                status,
            }
        })
        .collect()
}

fn matching_polygon(isochrones: &[Isochrone], interval: f64) -> Option<Polygon<f64>> {
    isochrones
        .iter()
        .find(|iso| (iso.interval - interval).abs() <= INTERVAL_MATCH_EPSILON * interval.max(1.0))
        .and_then(|iso| iso.polygon.clone())
}

fn route_one<K, P>(pair: &RoutePair<K>, provider: &P) -> RouteRecord<K>
where
    K: Id,
    P: RouteProvider + ?Sized,
{
    // Covers the provider call and stitching of whatever it returned.
    match panic::catch_unwind(AssertUnwindSafe(|| route_and_stitch(pair, provider))) {
        Ok(record) => record,
        Err(_) => {
            warn!(from = ?pair.from.id, to = ?pair.to.id, "routing item panicked");
            RouteRecord::failed(pair.from.id.clone(), pair.to.id.clone(), RouteStatus::ServiceError)
        }
    }
}

fn route_and_stitch<K, P>(pair: &RoutePair<K>, provider: &P) -> RouteRecord<K>
where
    K: Id,
    P: RouteProvider + ?Sized,
{
    let from = pair.from.id.clone();
    let to = pair.to.id.clone();

    let response = match provider.route(pair.from.point, pair.to.point) {
        Ok(response) => response,
        Err(ProviderError::RouteNotFound { message }) => {
            info!(?from, ?to, %message, "no route between points");
            return RouteRecord::failed(from, to, RouteStatus::RouteNotFound);
        }
        Err(err) => {
            warn!(?from, ?to, error = %err, "routing request failed");
            return RouteRecord::failed(from, to, RouteStatus::ServiceError);
        }
    };

    let outcome = stitch_with_report(&response.fragments);
    match outcome.route {
        Some(route) => RouteRecord {
            from,
            to,
            route: Some(route),
            distance_m: response.distance_m,
            duration_s: response.duration_s,
            status: RouteStatus::Found,
            dropped_fragments: outcome.dropped.len(),
        },
        None => {
            warn!(?from, ?to, fragments = response.fragments.len(), "no usable route fragment");
            RouteRecord {
                dropped_fragments: outcome.dropped.len(),
                ..RouteRecord::failed(from, to, RouteStatus::NoValidFragments)
            }
        }
    }
}

/// A named output column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// Columnar batch output. Every column has one value per input item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchTable {
    columns: Vec<Column>,
    rows: usize,
}

impl BatchTable {
    fn from_columns(rows: usize, columns: Vec<(&str, Vec<Value>)>) -> Self {
        let columns = columns
            .into_iter()
            .map(|(name, values)| {
                debug_assert_eq!(values.len(), rows, "column {} length mismatch", name);
                Column {
                    name: name.to_string(),
                    values,
                }
            })
            .collect();
        Self { columns, rows }
    }

    /// One row per route record.
    pub fn from_routes<K: Serialize>(records: &[RouteRecord<K>], mapping: &ColumnMapping) -> Self {
        Self::from_columns(
            records.len(),
            vec![
                (
                    mapping.geometry.as_str(),
                    column_of(records, |r| {
                        r.route.as_ref().map_or(Value::Null, |route| Value::String(route.to_wkt()))
                    }),
                ),
                (mapping.from.as_str(), column_of(records, |r| to_value(&r.from))),
                (mapping.to.as_str(), column_of(records, |r| to_value(&r.to))),
                (mapping.distance.as_str(), column_of(records, |r| to_value(&r.distance_m))),
                (mapping.duration.as_str(), column_of(records, |r| to_value(&r.duration_s))),
                (mapping.status.as_str(), column_of(records, |r| to_value(&r.status))),
            ],
        )
    }

    /// One row per snap record; geometry is the snapped point.
    pub fn from_snaps<K: Serialize, I: Serialize>(
        records: &[SnapRecord<K, I>],
        mapping: &ColumnMapping,
    ) -> Self {
        Self::from_columns(
            records.len(),
            vec![
                (mapping.id.as_str(), column_of(records, |r| to_value(&r.id))),
                (
                    mapping.geometry.as_str(),
                    column_of(records, |r| {
                        Value::String(geo::Point::from(r.result.snapped).wkt_string())
                    }),
                ),
                (mapping.matched.as_str(), column_of(records, |r| to_value(&r.result.matched))),
                (mapping.distance.as_str(), column_of(records, |r| to_value(&r.result.distance))),
                (mapping.status.as_str(), column_of(records, |r| to_value(&r.result.status()))),
            ],
        )
    }

    /// One row per isochrone record; geometry is the polygon or null.
    pub fn from_isochrones<K: Serialize>(records: &[IsochroneRecord<K>], mapping: &ColumnMapping) -> Self {
        Self::from_columns(
            records.len(),
            vec![
                (
                    mapping.geometry.as_str(),
                    column_of(records, |r| {
                        r.polygon
                            .as_ref()
                            .map_or(Value::Null, |polygon| Value::String(polygon.wkt_string()))
                    }),
                ),
                (mapping.interval.as_str(), column_of(records, |r| to_value(&r.interval))),
                (mapping.interval_type.as_str(), column_of(records, |r| to_value(&r.interval_type))),
                (mapping.id.as_str(), column_of(records, |r| to_value(&r.id))),
                (mapping.status.as_str(), column_of(records, |r| to_value(&r.status))),
            ],
        )
    }

    /// Returns the number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the columns in output order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.values.as_slice())
    }

    /// Row-oriented view, one JSON object per input item.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, Value>> {
        (0..self.rows)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| (column.name.clone(), column.values[row].clone()))
                    .collect()
            })
            .collect()
    }
}

fn column_of<R>(records: &[R], value: impl Fn(&R) -> Value) -> Vec<Value> {
    records.iter().map(value).collect()
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "cell value could not be serialized, writing null");
            Value::Null
        }
    }
}
