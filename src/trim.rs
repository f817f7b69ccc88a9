//! Run-aware outlier trimming.
//!
//! Points faster than the speed limit are removed, but not by simple
//! filtering. A single fast point is a momentary GPS jump and is dropped on
//! its own. A run of `run_threshold` consecutive fast points means the
//! receiver lost its fix: the run is dropped together with the accepted
//! points just ahead of it, and every later point of the segment is
//! discarded regardless of its speed.
//!
//! The speed limit is always in m/s. Convert user-facing units with
//! [`mph_to_mps`](crate::geo_utils::mph_to_mps) or
//! [`kmh_to_mps`](crate::geo_utils::kmh_to_mps) before calling.
//!
//! ## Example
//! ```rust
//! use track_annotator::{trim_by_max_speed_with, Track, TrackPoint, TrackSegment, TrimConfig};
//!
//! let speeds = [None, Some(1.0), Some(1.0), Some(5.0), Some(1.0), Some(1.0)];
//! let points = speeds
//!     .iter()
//!     .map(|&speed| TrackPoint { speed, ..TrackPoint::new(51.5, -0.12) })
//!     .collect();
//!
//! let track = Track::new(vec![TrackSegment::new(points)]);
//! let (trimmed, stats) = trim_by_max_speed_with(&track, 2.0, &TrimConfig::default());
//! assert_eq!(trimmed.point_count(), 5);
//! assert_eq!(stats.removed(), 1);
//! ```

use std::collections::VecDeque;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::{Track, TrackPoint, TrackSegment};

/// Configuration for outlier-run detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Consecutive over-limit points that make a run (a lost GPS fix).
    /// Default: 5
    pub run_threshold: usize,

    /// Cap on already accepted points retracted when a run is detected.
    /// Only points within the `run_threshold` positions before the
    /// run-confirming point are eligible, and the run itself fills all but
    /// the first of those positions. So at most one lead-in point is ever
    /// retracted, and 0 disables retraction.
    /// Default: 4
    pub retract_count: usize,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            run_threshold: 5,
            retract_count: 4,
        }
    }
}

impl TrimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.run_threshold == 0 {
            return Err(TrackError::InvalidConfig {
                message: "run_threshold must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Check that a speed limit is a finite, strictly positive m/s value.
    pub fn validate_speed_limit(speed_limit: f64) -> Result<()> {
        if speed_limit.is_finite() && speed_limit > 0.0 {
            Ok(())
        } else {
            Err(TrackError::InvalidSpeedLimit { value: speed_limit })
        }
    }
}

/// What a trimming pass removed, and why.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimStats {
    /// Points looked at across all segments
    pub points_examined: usize,
    /// Over-limit points dropped (isolated spikes and run members)
    pub speed_violations: usize,
    /// Accepted points taken back when a run was detected
    pub retracted: usize,
    /// Points discarded after a run, until the end of their segment
    pub tail_discarded: usize,
    /// Number of segments in which a run was detected
    pub runs_detected: usize,
}

impl TrimStats {
    /// Total number of points removed.
    pub fn removed(&self) -> usize {
        self.speed_violations + self.retracted + self.tail_discarded
    }
}

/// Remove speed outliers using the default run detection settings.
pub fn trim_by_max_speed(track: &Track, speed_limit: f64) -> Track {
    trim_by_max_speed_with(track, speed_limit, &TrimConfig::default()).0
}

/// Remove speed outliers and report what was removed.
///
/// Points without a speed (such as the first point of every segment) count
/// as within the limit and reset the run counter. Segments are trimmed
/// independently; an emptied segment stays in place.
pub fn trim_by_max_speed_with(
    track: &Track,
    speed_limit: f64,
    config: &TrimConfig,
) -> (Track, TrimStats) {
    let mut stats = TrimStats::default();

    let segments = track
        .segments
        .iter()
        .map(|segment| {
            TrackSegment::new(trim_segment(&segment.points, speed_limit, config, &mut stats))
        })
        .collect();

    let trimmed = Track {
        name: track.name.clone(),
        segments,
    };

    if stats.runs_detected > 0 {
        debug!(
            "[Trim] '{}': {} outlier runs, {} points retracted, {} tail points dropped",
            track.display_name(),
            stats.runs_detected,
            stats.retracted,
            stats.tail_discarded
        );
    }
    info!(
        "[Trim] Trimmed {} points with excessive speed (> {:.2} m/s) from '{}'",
        stats.removed(),
        speed_limit,
        track.display_name()
    );

    (trimmed, stats)
}

fn trim_segment(
    points: &[TrackPoint],
    speed_limit: f64,
    config: &TrimConfig,
    stats: &mut TrimStats,
) -> Vec<TrackPoint> {
    let mut kept: Vec<TrackPoint> = Vec::with_capacity(points.len());
    // Source indices of the most recently kept points, newest at the back.
    // Always a suffix of `kept`.
    let mut recent: VecDeque<usize> = VecDeque::with_capacity(config.retract_count);
    let mut consecutive = 0usize;
    let mut tail_trim = false;

    for (i, point) in points.iter().enumerate() {
        stats.points_examined += 1;

        if tail_trim {
            stats.tail_discarded += 1;
            continue;
        }

        match point.speed {
            Some(speed) if speed > speed_limit => {
                consecutive += 1;
                stats.speed_violations += 1;

                if consecutive >= config.run_threshold {
                    let window_start = i.saturating_sub(config.run_threshold);
                    while let Some(&idx) = recent.back() {
                        if idx < window_start {
                            break;
                        }
                        recent.pop_back();
                        kept.pop();
                        stats.retracted += 1;
                    }
                    stats.runs_detected += 1;
                    tail_trim = true;
                }
            }
            _ => {
                consecutive = 0;
                if config.retract_count > 0 {
                    if recent.len() == config.retract_count {
                        recent.pop_front();
                    }
                    recent.push_back(i);
                }
                kept.push(point.clone());
            }
        }
    }

    kept
}
