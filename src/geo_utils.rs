//! Geographic utilities: point distances, speed unit conversion and bounds.

use geo::{Distance, Haversine, Point};

use crate::{Bounds, TrackPoint};

/// Meters per second in one mile per hour.
pub const MPS_PER_MPH: f64 = 0.44704;

/// Meters per second in one kilometer per hour.
pub const MPS_PER_KMH: f64 = 1.0 / 3.6;

/// Calculate haversine distance between two points in meters, ignoring elevation.
pub fn haversine_distance(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Distance in meters including the elevation change, or `None` when
/// either point lacks an elevation.
pub fn distance_3d(p1: &TrackPoint, p2: &TrackPoint) -> Option<f64> {
    let (e1, e2) = (p1.elevation?, p2.elevation?);
    let horizontal = haversine_distance(p1, p2);
    Some(horizontal.hypot(e2 - e1))
}

/// 3-D distance when both elevations are known, horizontal distance otherwise.
pub fn point_distance(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    distance_3d(p1, p2).unwrap_or_else(|| haversine_distance(p1, p2))
}

/// Seconds elapsed from `from` to `to`, or 0 when either has no timestamp.
///
/// Negative when the points are out of temporal order.
pub fn elapsed_seconds(from: &TrackPoint, to: &TrackPoint) -> f64 {
    match (from.time, to.time) {
        (Some(t0), Some(t1)) => (t1 - t0).num_milliseconds() as f64 / 1000.0,
        _ => 0.0,
    }
}

pub fn mph_to_mps(mph: f64) -> f64 {
    mph * MPS_PER_MPH
}

pub fn kmh_to_mps(kmh: f64) -> f64 {
    kmh * MPS_PER_KMH
}

pub fn mps_to_mph(mps: f64) -> f64 {
    mps / MPS_PER_MPH
}

/// Compute the bounding box of a sequence of points.
pub fn compute_bounds<'a>(points: impl IntoIterator<Item = &'a TrackPoint>) -> Option<Bounds> {
    let mut iter = points.into_iter();
    let first = iter.next()?;

    let mut bounds = Bounds {
        min_lat: first.latitude,
        max_lat: first.latitude,
        min_lon: first.longitude,
        max_lon: first.longitude,
    };

    for p in iter {
        bounds.min_lat = bounds.min_lat.min(p.latitude);
        bounds.max_lat = bounds.max_lat.max(p.latitude);
        bounds.min_lon = bounds.min_lon.min(p.longitude);
        bounds.max_lon = bounds.max_lon.max(p.longitude);
    }

    Some(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_haversine_known_distance() {
        // ~111.2 km per degree of latitude
        let a = TrackPoint::new(0.0, 0.0);
        let b = TrackPoint::new(1.0, 0.0);
        let d = haversine_distance(&a, &b);
        assert!((d - 111_195.0).abs() < 100.0, "got {}", d);
    }

    #[test]
    fn test_distance_3d_includes_climb() {
        let a = TrackPoint::new(51.5, -0.12).with_elevation(10.0);
        let b = TrackPoint::new(51.5, -0.12).with_elevation(40.0);
        assert!((distance_3d(&a, &b).unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_falls_back_to_2d() {
        let a = TrackPoint::new(51.5000, -0.12).with_elevation(10.0);
        let b = TrackPoint::new(51.5010, -0.12);
        assert!(distance_3d(&a, &b).is_none());
        assert_eq!(point_distance(&a, &b), haversine_distance(&a, &b));
    }

    #[test]
    fn test_elapsed_seconds() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let a = TrackPoint::new(0.0, 0.0).with_time(t0);
        let b = TrackPoint::new(0.0, 0.0).with_time(t0 + chrono::Duration::milliseconds(2500));
        assert_eq!(elapsed_seconds(&a, &b), 2.5);
        assert_eq!(elapsed_seconds(&b, &a), -2.5);
        assert_eq!(elapsed_seconds(&a, &TrackPoint::new(0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_unit_conversion() {
        assert!((mph_to_mps(100.0) - 44.704).abs() < 1e-9);
        assert!((kmh_to_mps(36.0) - 10.0).abs() < 1e-9);
        assert!((mps_to_mph(mph_to_mps(12.0)) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_bounds_empty() {
        let points: Vec<TrackPoint> = Vec::new();
        assert!(compute_bounds(&points).is_none());
    }
}
