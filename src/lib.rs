//! route-snap: point-to-network snapping and multi-fragment route stitching.
//!
//! Points are matched to the nearest line of a network within a tolerance
//! and moved onto it; routes returned by external routing services as
//! several disjoint pieces are stitched into one polyline. Isochrone
//! polygons are requested per point. Batch helpers run all of these over
//! whole collections with per-item failure isolation.

pub mod traits;
pub mod error;
pub mod config;
pub mod geometry;
pub mod index;
pub mod snap;
pub mod polyline;
pub mod stitch;
pub mod retry;
pub mod valhalla;
pub mod isochrone;
pub mod twogis;
pub mod haversine;
pub mod batch;
