//! Route stitching over realistic fragment mixes.

use route_snap::geometry::Point;
use route_snap::stitch::{stitch, stitch_with_report, RouteFragment};
use route_snap::twogis;

fn xy(route: &route_snap::polyline::Polyline) -> Vec<(f64, f64)> {
    route.points().iter().map(|p| (p.x, p.y)).collect()
}

#[test]
fn scenario_degenerate_transition_is_ignored() {
    let fragments = vec![
        RouteFragment::coordinates(0, vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]),
        RouteFragment::coordinates(1, vec![Point::new(1.0, 0.0), Point::new(1.0, 0.0)]),
        RouteFragment::coordinates(2, vec![Point::new(1.0, 0.0), Point::new(2.0, 0.0)]),
    ];
    let route = stitch(&fragments).unwrap();
    assert_eq!(xy(&route), vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
}

#[test]
fn three_connected_segments_share_endpoints() {
    let fragments = vec![
        RouteFragment::wkt(0, "LINESTRING (0 0, 2 0)"),
        RouteFragment::wkt(1, "LINESTRING (2 0, 2 3)"),
        RouteFragment::wkt(2, "LINESTRING (2 3, 5 3)"),
    ];
    let route = stitch(&fragments).unwrap();
    // 3 fragments x 2 vertices - 2 shared endpoints
    assert_eq!(route.len(), 4);
    assert_eq!(xy(&route), vec![(0.0, 0.0), (2.0, 0.0), (2.0, 3.0), (5.0, 3.0)]);
}

#[test]
fn single_valid_fragment_is_returned_vertex_for_vertex() {
    let fragments = vec![
        RouteFragment::wkt(0, "LINESTRING (3 3, 3 3)"),
        RouteFragment::wkt(1, "LINESTRING (0 0, 1 1, 1 1, 4 2, 0 0)"),
        RouteFragment::new(2, None),
    ];
    let outcome = stitch_with_report(&fragments);
    assert_eq!(outcome.used, 1);
    assert_eq!(
        xy(outcome.route.as_ref().unwrap()),
        vec![(0.0, 0.0), (1.0, 1.0), (1.0, 1.0), (4.0, 2.0), (0.0, 0.0)]
    );
}

#[test]
fn no_valid_fragment_yields_none() {
    let fragments = vec![
        RouteFragment::wkt(0, "LINESTRING (3 3, 3 3)"),
        RouteFragment::wkt(1, "garbage"),
        RouteFragment::encoded(2, "!!", 6),
    ];
    assert!(stitch(&fragments).is_none());
}

#[test]
fn discontinuities_are_kept() {
    let fragments = vec![
        RouteFragment::wkt(0, "LINESTRING (0 0, 1 0)"),
        RouteFragment::wkt(1, "LINESTRING (1.001 0, 2 0)"),
        RouteFragment::wkt(2, "LINESTRING (2 0, 2 1)"),
    ];
    let route = stitch(&fragments).unwrap();
    assert_eq!(route.len(), 5);
    assert_eq!(route.gaps(0.0005), vec![1]);
    assert_eq!(route.points()[2], Point::new(1.001, 0.0));
}

#[test]
fn twogis_walk_drive_walk_route() {
    let body = r#"{
        "status": "OK",
        "result": [{
            "begin_pedestrian_path": {"geometry": {"selection": "LINESTRING(37.6176 55.7558, 37.6180 55.7560)"}},
            "maneuvers": [
                {"outcoming_path": {"geometry": [{"selection": "LINESTRING(37.6180 55.7560)"}]}},
                {"outcoming_path": {"geometry": [
                    {"selection": "LINESTRING(37.6180 55.7560, 37.6200 55.7570, 37.6250 55.7575)"},
                    {"selection": "LINESTRING(37.6250 55.7575, 37.6300 55.7600)"}
                ]}},
                {"comment": "arrival"}
            ],
            "end_pedestrian_path": {"geometry": {"selection": "LINESTRING(37.6300 55.7600, 37.6302 55.7603)"}},
            "total_distance": 1180,
            "total_duration": 305
        }]
    }"#;

    let response = twogis::decode_response(200, body).unwrap();
    let outcome = stitch_with_report(&response.fragments);
    assert_eq!(outcome.dropped.len(), 1);
    let route = outcome.route.unwrap();
    assert_eq!(route.len(), 6);
    assert_eq!(route.first(), Some(&Point::new(37.6176, 55.7558)));
    assert_eq!(route.last(), Some(&Point::new(37.6302, 55.7603)));
    assert_eq!(route.gaps(1e-9).len(), route.len() - 1);
}
