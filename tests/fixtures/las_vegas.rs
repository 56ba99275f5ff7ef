//! Real Las Vegas locations, routable with the Nevada OSM extract.
//!
//! Coordinates sourced from OpenStreetMap. `x` = longitude, `y` = latitude.

use route_snap::batch::PointRow;
use route_snap::geometry::Point;

pub const CASINOS: &[(&str, f64, f64)] = &[
    ("Wynn Las Vegas", -115.1658180, 36.1263781),
    ("MGM Grand", -115.1688720, 36.1023654),
    ("Bellagio", -115.1767, 36.1126),
];

pub const RESTAURANTS: &[(&str, f64, f64)] = &[
    ("Hard Rock Cafe", -115.1722166, 36.1041592),
    ("Brooklyn Bowl", -115.1695094, 36.1175388),
];

pub fn rows(locations: &[(&'static str, f64, f64)]) -> Vec<PointRow<&'static str>> {
    locations
        .iter()
        .map(|(name, lng, lat)| PointRow::new(*name, Point::new(*lng, *lat)))
        .collect()
}
