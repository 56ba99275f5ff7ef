//! Isochrone batches: one row per (point, interval), whatever the service does.

mod fixtures;

use route_snap::batch::{BatchProcessor, BatchTable, IsochroneStatus, PointRow};
use route_snap::config::{BatchConfig, ColumnMapping};
use route_snap::error::{ConfigError, ProviderError};
use route_snap::geometry::Point;
use route_snap::traits::{IntervalType, Isochrone};
use serde_json::Value;

use fixtures::{square_around, transport_error, FnIsochrones};

fn stops() -> Vec<PointRow<&'static str>> {
    vec![
        PointRow::new("school", Point::new(0.0, 0.0)),
        PointRow::new("clinic", Point::new(10.0, 0.0)),
        PointRow::new("market", Point::new(20.0, 0.0)),
    ]
}

/// Returns every requested interval, except that the clinic fails outright
/// and the market only gets the smallest contour.
fn uneven_service(center: Point, intervals: &[f64]) -> Result<Vec<Isochrone>, ProviderError> {
    if center.x == 10.0 {
        return Err(transport_error());
    }
    let served = if center.x == 20.0 { &intervals[..1] } else { intervals };
    Ok(served
        .iter()
        .rev()
        .map(|&interval| Isochrone {
            interval,
            polygon: Some(square_around(center, interval / 600.0)),
        })
        .collect())
}

#[test]
fn every_column_has_one_value_per_point_and_interval() {
    let processor = BatchProcessor::new(&BatchConfig { threads: Some(2) }).unwrap();
    let intervals = [300.0, 600.0, 900.0];
    let records = processor
        .isochrones(&stops(), &intervals, IntervalType::Time, &FnIsochrones(uneven_service))
        .unwrap();

    assert_eq!(records.len(), 9);
    let table = BatchTable::from_isochrones(&records, &ColumnMapping::default());
    assert_eq!(table.rows(), 9);
    for column in table.columns() {
        assert_eq!(column.values.len(), 9, "column {}", column.name);
    }

    let ids: Vec<_> = table.column("id").unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert_eq!(
        ids,
        vec!["school", "school", "school", "clinic", "clinic", "clinic", "market", "market", "market"]
    );
    assert_eq!(table.column("interval").unwrap()[1], 600.0);
    assert_eq!(table.column("interval_type").unwrap()[0], "time");

    let geometry = table.column("geometry").unwrap();
    assert!(geometry[0].as_str().unwrap().starts_with("POLYGON(("));
    assert_eq!(geometry[3], Value::Null);
    assert_eq!(geometry[7], Value::Null);
}

#[test]
fn statuses_separate_service_errors_from_missing_contours() {
    let processor = BatchProcessor::new(&BatchConfig::sequential()).unwrap();
    let records = processor
        .isochrones(&stops(), &[300.0, 600.0], IntervalType::Time, &FnIsochrones(uneven_service))
        .unwrap();

    let statuses: Vec<_> = records.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            IsochroneStatus::Found,
            IsochroneStatus::Found,
            IsochroneStatus::ServiceError,
            IsochroneStatus::ServiceError,
            IsochroneStatus::Found,
            IsochroneStatus::NoPolygon,
        ]
    );
    // Contours come back largest first; each record still gets its own.
    let school_small = records[0].polygon.as_ref().unwrap();
    assert_eq!(school_small, &square_around(Point::new(0.0, 0.0), 0.5));
}

#[test]
fn panicking_service_only_fails_its_point() {
    let processor = BatchProcessor::new(&BatchConfig::sequential()).unwrap();
    let provider = FnIsochrones(|center: Point, intervals: &[f64]| {
        if center.x == 0.0 {
            panic!("service client bug");
        }
        uneven_service(center, intervals)
    });
    let records = processor
        .isochrones(&stops(), &[300.0], IntervalType::Time, &provider)
        .unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].status, IsochroneStatus::ServiceError);
    assert_eq!(records[2].status, IsochroneStatus::Found);
}

#[test]
fn bad_intervals_abort_before_any_request() {
    let processor = BatchProcessor::new(&BatchConfig::default()).unwrap();
    let provider = FnIsochrones(|_: Point, _: &[f64]| -> Result<Vec<Isochrone>, ProviderError> {
        panic!("must not be called")
    });
    for intervals in [&[][..], &[600.0, 0.0][..], &[f64::NAN][..]] {
        assert!(matches!(
            processor.isochrones(&stops(), intervals, IntervalType::Distance, &provider),
            Err(ConfigError::InvalidIntervals(_))
        ));
    }
}
