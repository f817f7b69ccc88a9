//! # Track Annotator
//!
//! GPS track annotation, outlier trimming and workout activity matching.
//!
//! This library provides:
//! - Per-point speed and distance-to-next annotation
//! - Run-aware removal of GPS artifacts (sustained bursts of implausible speed)
//! - Activity labelling by nearest start-time match against a metadata feed
//!
//! ## Features
//!
//! - **`parallel`** - Process batches of tracks in parallel with rayon
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use track_annotator::{compute_metrics, trim_by_max_speed, Track, TrackPoint, TrackSegment};
//!
//! let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
//! let points = (0..5)
//!     .map(|i| {
//!         TrackPoint::new(51.5074 + i as f64 * 0.0001, -0.1278)
//!             .with_time(start + Duration::seconds(i * 10))
//!     })
//!     .collect();
//!
//! let track = Track::new(vec![TrackSegment::new(points)]);
//! let annotated = compute_metrics(&track);
//! let cleaned = trim_by_max_speed(&annotated, 50.0);
//! assert_eq!(cleaned.point_count(), 5);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackError};

// Geographic utilities (distance, unit conversion, bounds)
pub mod geo_utils;

// Speed / distance annotation
pub mod annotate;
pub use annotate::{
    annotate_if_needed, compute_metrics, has_complete_annotation, max_speed_and_distance,
};

// Outlier-run trimming
pub mod trim;
pub use trim::{trim_by_max_speed, trim_by_max_speed_with, TrimConfig, TrimStats};

// Activity matching against workout metadata
pub mod activity;
pub use activity::{
    match_activity, parse_timestamp, track_start_time, ActivityMatchConfig, ActivityRecord,
    ActivityTable, ActivityType, DEFAULT_TOLERANCE_SECONDS,
};

// Annotate -> trim -> match pipeline
pub mod processor;
pub use processor::{ProcessedTrack, ProcessingConfig, TrackProcessor, TrackSummary};

// ============================================================================
// Core Types
// ============================================================================

/// A recorded GPS fix plus the values derived from its neighbours.
///
/// `speed` and `distance_to_next` are written by
/// [`compute_metrics`](crate::annotate::compute_metrics); everything else
/// comes from the recording.
///
/// # Example
/// ```
/// use track_annotator::TrackPoint;
/// let point = TrackPoint::new(51.5074, -0.1278).with_elevation(11.0);
/// assert!(point.speed.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    /// Elevation in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    /// Speed from the previous point in m/s (absent on a segment's first point)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Distance to the next point in meters (absent on a segment's last point)
    #[serde(
        rename = "distanceToNext",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub distance_to_next: Option<f64>,
}

impl TrackPoint {
    /// Create a new point with no elevation, time or derived values.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            time: None,
            speed: None,
            distance_to_next: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A contiguous run of points recorded without a discontinuity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    pub points: Vec<TrackPoint>,
}

impl TrackSegment {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One recorded activity: an ordered list of segments.
///
/// Point order is temporal and is never reshuffled by any operation in
/// this crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub segments: Vec<TrackSegment>,
}

impl Track {
    pub fn new(segments: Vec<TrackSegment>) -> Self {
        Self {
            name: None,
            segments,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name used in logs and error messages.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Total number of points across all segments.
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(TrackSegment::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Iterate over every point, segment by segment, in recording order.
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.segments.iter().flat_map(|s| s.points.iter())
    }

    /// Bounding box of all points, or `None` for an empty track.
    pub fn bounds(&self) -> Option<Bounds> {
        geo_utils::compute_bounds(self.points())
    }

    /// Parse a track from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the track to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Bounding box for a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Get the center of the bounds as (latitude, longitude).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
