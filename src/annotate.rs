//! Speed and distance annotation.
//!
//! Every point gets two derived values computed from its neighbours within
//! the same segment:
//! - `speed`: distance from the previous point divided by the elapsed time
//! - `distance_to_next`: distance to the following point
//!
//! Distances are 3-D (haversine plus elevation change) when both points have
//! an elevation and plain haversine otherwise.
//!
//! ## Example
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use track_annotator::{
//!     compute_metrics, has_complete_annotation, Track, TrackPoint, TrackSegment,
//! };
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
//! let track = Track::new(vec![TrackSegment::new(vec![
//!     TrackPoint::new(51.5000, -0.1200).with_time(t0),
//!     TrackPoint::new(51.5001, -0.1200).with_time(t0 + Duration::seconds(10)),
//! ])]);
//!
//! let annotated = compute_metrics(&track);
//! assert!(has_complete_annotation(&annotated));
//! assert!(annotated.segments[0].points[0].speed.is_none());
//! ```

use log::{debug, info};

use crate::geo_utils::{elapsed_seconds, point_distance};
use crate::{Track, TrackSegment};

/// Number of leading points per segment inspected by the completeness check.
const COMPLETENESS_PREFIX: usize = 3;

/// Compute speed and distance-to-next for every point of the track.
///
/// Derived values are recomputed from scratch, so applying this to an
/// already annotated track yields the same track.
pub fn compute_metrics(track: &Track) -> Track {
    let mut annotated = track.clone();
    for segment in &mut annotated.segments {
        annotate_segment(segment);
    }
    annotated
}

/// Single forward pass over one segment.
fn annotate_segment(segment: &mut TrackSegment) {
    let points = &mut segment.points;
    let n = points.len();

    for i in 0..n {
        let speed = if i > 0 {
            let (prev, curr) = (&points[i - 1], &points[i]);
            let dt = elapsed_seconds(prev, curr);
            // Zero or negative elapsed time leaves speed absent
            if dt > 0.0 {
                Some(point_distance(prev, curr) / dt)
            } else {
                None
            }
        } else {
            None
        };

        let distance_to_next = if i + 1 < n {
            Some(point_distance(&points[i], &points[i + 1]))
        } else {
            None
        };

        points[i].speed = speed;
        points[i].distance_to_next = distance_to_next;
    }
}

/// Check whether the track already carries a full annotation.
///
/// Annotation is uniform across a track, so only the first three points of
/// each multi-point segment are inspected: every non-first point must have a
/// speed and every non-last point a distance-to-next.
pub fn has_complete_annotation(track: &Track) -> bool {
    track
        .segments
        .iter()
        .filter(|s| s.len() > 1)
        .all(|segment| {
            let last = segment.len() - 1;
            segment
                .points
                .iter()
                .take(COMPLETENESS_PREFIX)
                .enumerate()
                .all(|(i, p)| {
                    (i == 0 || p.speed.is_some()) && (i == last || p.distance_to_next.is_some())
                })
        })
}

/// Maximum speed (m/s) and maximum distance-to-next (m) over the whole track.
///
/// Each value is `None` when no point carries it.
pub fn max_speed_and_distance(track: &Track) -> (Option<f64>, Option<f64>) {
    let mut max_speed: Option<f64> = None;
    let mut max_distance: Option<f64> = None;

    for p in track.points() {
        if let Some(speed) = p.speed {
            max_speed = Some(max_speed.map_or(speed, |m| m.max(speed)));
        }
        if let Some(distance) = p.distance_to_next {
            max_distance = Some(max_distance.map_or(distance, |m| m.max(distance)));
        }
    }

    (max_speed, max_distance)
}

/// Annotate the track unless it is already complete.
///
/// Returns the (possibly unchanged) track and whether metrics were computed.
pub fn annotate_if_needed(track: &Track) -> (Track, bool) {
    if has_complete_annotation(track) {
        debug!(
            "[Annotate] '{}' already annotated, skipping",
            track.display_name()
        );
        return (track.clone(), false);
    }

    let annotated = compute_metrics(track);
    info!(
        "[Annotate] Added speed tags to '{}' ({} points, {} segments)",
        annotated.display_name(),
        annotated.point_count(),
        annotated.segments.len()
    );
    (annotated, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackPoint;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
    }

    /// Points heading north ~11 m apart, 10 s apart.
    fn walking_segment(n: usize) -> TrackSegment {
        TrackSegment::new(
            (0..n)
                .map(|i| {
                    TrackPoint::new(51.5 + i as f64 * 0.0001, -0.12)
                        .with_time(t0() + Duration::seconds(i as i64 * 10))
                })
                .collect(),
        )
    }

    #[test]
    fn test_compute_metrics_values() {
        let track = Track::new(vec![walking_segment(4)]);
        let annotated = compute_metrics(&track);
        let points = &annotated.segments[0].points;

        for i in 1..4 {
            let speed = points[i].speed.unwrap();
            // ~11.1 m over 10 s
            assert!((speed - 1.112).abs() < 0.01, "speed {} at {}", speed, i);
        }
        for i in 0..3 {
            let d = points[i].distance_to_next.unwrap();
            assert!((d - 11.12).abs() < 0.1);
        }
    }

    #[test]
    fn test_boundary_absence() {
        let track = Track::new(vec![walking_segment(5), walking_segment(2)]);
        let annotated = compute_metrics(&track);

        for segment in &annotated.segments {
            assert!(segment.points[0].speed.is_none());
            assert!(segment.points.last().unwrap().distance_to_next.is_none());
        }
    }

    #[test]
    fn test_boundary_values_cleared() {
        // Stale derived values on the boundaries are removed
        let mut segment = walking_segment(3);
        segment.points[0].speed = Some(99.0);
        segment.points[2].distance_to_next = Some(99.0);

        let annotated = compute_metrics(&Track::new(vec![segment]));
        assert!(annotated.segments[0].points[0].speed.is_none());
        assert!(annotated.segments[0].points[2].distance_to_next.is_none());
    }

    #[test]
    fn test_idempotent() {
        let track = Track::new(vec![walking_segment(6), walking_segment(3)]);
        let once = compute_metrics(&track);
        let twice = compute_metrics(&once);
        assert_eq!(once, twice);
        assert!(has_complete_annotation(&once));
        assert!(!has_complete_annotation(&track));
    }

    #[test]
    fn test_missing_time_leaves_speed_absent() {
        let mut segment = walking_segment(3);
        segment.points[1].time = None;

        let annotated = compute_metrics(&Track::new(vec![segment]));
        let points = &annotated.segments[0].points;
        assert!(points[1].speed.is_none());
        assert!(points[2].speed.is_none());
        // Distance needs no time
        assert!(points[1].distance_to_next.is_some());
    }

    #[test]
    fn test_zero_elapsed_time_guarded() {
        let mut segment = walking_segment(2);
        segment.points[1].time = segment.points[0].time;

        let annotated = compute_metrics(&Track::new(vec![segment]));
        assert!(annotated.segments[0].points[1].speed.is_none());
    }

    #[test]
    fn test_elevation_used_when_present() {
        let mut flat = walking_segment(2);
        let mut climb = walking_segment(2);
        climb.points[0].elevation = Some(0.0);
        climb.points[1].elevation = Some(20.0);
        flat.points[0].elevation = Some(0.0);

        let flat = compute_metrics(&Track::new(vec![flat]));
        let climb = compute_metrics(&Track::new(vec![climb]));
        let flat_d = flat.segments[0].points[0].distance_to_next.unwrap();
        let climb_d = climb.segments[0].points[0].distance_to_next.unwrap();
        assert!(climb_d > flat_d + 5.0);
    }

    #[test]
    fn test_empty_and_single_point() {
        let empty = Track::default();
        assert_eq!(compute_metrics(&empty), empty);
        assert!(has_complete_annotation(&empty));

        let single = Track::new(vec![walking_segment(1), TrackSegment::default()]);
        let annotated = compute_metrics(&single);
        assert_eq!(annotated, single);
        assert!(has_complete_annotation(&annotated));
    }

    #[test]
    fn test_completeness_checks_prefix_only() {
        let mut annotated = compute_metrics(&Track::new(vec![walking_segment(6)]));
        // Beyond the first three points nothing is inspected
        annotated.segments[0].points[4].speed = None;
        assert!(has_complete_annotation(&annotated));

        annotated.segments[0].points[2].speed = None;
        assert!(!has_complete_annotation(&annotated));
    }

    #[test]
    fn test_max_speed_and_distance() {
        assert_eq!(max_speed_and_distance(&Track::default()), (None, None));

        let mut annotated = compute_metrics(&Track::new(vec![walking_segment(4)]));
        annotated.segments[0].points[2].speed = Some(7.5);
        annotated.segments[0].points[1].distance_to_next = Some(300.0);

        let (speed, distance) = max_speed_and_distance(&annotated);
        assert_eq!(speed, Some(7.5));
        assert_eq!(distance, Some(300.0));
    }

    #[test]
    fn test_annotate_if_needed() {
        let track = Track::new(vec![walking_segment(4)]);
        let (annotated, computed) = annotate_if_needed(&track);
        assert!(computed);

        let (again, computed) = annotate_if_needed(&annotated);
        assert!(!computed);
        assert_eq!(again, annotated);
    }
}
