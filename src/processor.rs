//! # Track Processor
//!
//! Runs the full cleaning pipeline over a track:
//! 1. annotate speed and distance-to-next (skipped when already complete)
//! 2. trim speed outliers
//! 3. label the track from the workout metadata
//!
//! The processor only holds read-only configuration and the workout table.
//! Tracks are never stored; every call derives its result from the track it
//! is given. Batches can be processed in parallel across tracks with the
//! `parallel` feature.
//!
//! ## Example
//! ```rust
//! use track_annotator::{ActivityTable, ProcessingConfig, Track, TrackProcessor};
//!
//! let config = ProcessingConfig::from_json(r#"{"speed_limit": 12.5}"#).unwrap();
//! let processor = TrackProcessor::new(config, ActivityTable::default()).unwrap();
//!
//! let processed = processor.process(&Track::default());
//! assert_eq!(processed.summary.points_after, 0);
//! assert!(processed.summary.activity.is_none());
//! ```

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::activity::{track_start_time, ActivityMatchConfig, ActivityTable, ActivityType};
use crate::annotate::{annotate_if_needed, max_speed_and_distance};
use crate::error::Result;
use crate::geo_utils::{kmh_to_mps, mph_to_mps, mps_to_mph};
use crate::trim::{trim_by_max_speed_with, TrimConfig, TrimStats};
use crate::{Bounds, Track};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the processing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Points faster than this are outliers, in m/s.
    /// Default: 50.0 (~180 km/h)
    pub speed_limit: f64,

    /// Outlier-run detection settings.
    pub trim: TrimConfig,

    /// Activity matching settings.
    pub matching: ActivityMatchConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            speed_limit: 50.0,
            trim: TrimConfig::default(),
            matching: ActivityMatchConfig::default(),
        }
    }
}

impl ProcessingConfig {
    /// Parse a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the speed limit from a miles-per-hour value.
    pub fn with_speed_limit_mph(mut self, mph: f64) -> Self {
        self.speed_limit = mph_to_mps(mph);
        self
    }

    /// Set the speed limit from a kilometers-per-hour value.
    pub fn with_speed_limit_kmh(mut self, kmh: f64) -> Self {
        self.speed_limit = kmh_to_mps(kmh);
        self
    }

    pub fn validate(&self) -> Result<()> {
        TrimConfig::validate_speed_limit(self.speed_limit)?;
        self.trim.validate()?;
        self.matching.validate()
    }
}

// ============================================================================
// Results
// ============================================================================

/// Report for one processed track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub name: Option<String>,
    /// Whether metrics were computed in this pass (false if already annotated)
    pub annotated: bool,
    pub points_before: usize,
    /// Input points with out-of-range or non-finite coordinates
    pub invalid_points: usize,
    pub points_after: usize,
    pub trim: TrimStats,
    /// Maximum speed of the cleaned track in m/s
    pub max_speed: Option<f64>,
    /// Maximum distance between consecutive points of the cleaned track in meters
    pub max_distance: Option<f64>,
    pub bounds: Option<Bounds>,
    pub start_time: Option<DateTime<Utc>>,
    /// Matched activity; `None` when the track has no timestamps
    pub activity: Option<ActivityType>,
}

/// A cleaned track with its report.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedTrack {
    pub track: Track,
    pub summary: TrackSummary,
}

impl ProcessedTrack {
    pub fn summary_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.summary)?)
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Stateless annotate -> trim -> match pipeline.
#[derive(Debug, Clone, Default)]
pub struct TrackProcessor {
    config: ProcessingConfig,
    activities: ActivityTable,
}

impl TrackProcessor {
    /// Create a processor, validating the configuration.
    pub fn new(config: ProcessingConfig, activities: ActivityTable) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, activities })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn activities(&self) -> &ActivityTable {
        &self.activities
    }

    /// Clean and label a single track.
    pub fn process(&self, track: &Track) -> ProcessedTrack {
        let points_before = track.point_count();
        let invalid_points = track.points().filter(|p| !p.is_valid()).count();
        if invalid_points > 0 {
            warn!(
                "[Processor] '{}' has {} points with invalid coordinates",
                track.display_name(),
                invalid_points
            );
        }

        let (annotated, computed) = annotate_if_needed(track);
        let (cleaned, trim) =
            trim_by_max_speed_with(&annotated, self.config.speed_limit, &self.config.trim);
        let (max_speed, max_distance) = max_speed_and_distance(&cleaned);

        // Label from the raw start: trimming may drop the first timed point
        let start_time = track_start_time(track);
        let activity = match start_time {
            Some(start) => Some(self.activities.match_start(start, &self.config.matching)),
            None => {
                debug!(
                    "[Processor] '{}' has no timestamps, leaving it unlabelled",
                    track.display_name()
                );
                None
            }
        };

        let summary = TrackSummary {
            name: track.name.clone(),
            annotated: computed,
            points_before,
            invalid_points,
            points_after: cleaned.point_count(),
            trim,
            max_speed,
            max_distance,
            bounds: cleaned.bounds(),
            start_time,
            activity,
        };

        info!(
            "[Processor] '{}': {} -> {} points, max {:.1} mph, activity {}",
            track.display_name(),
            summary.points_before,
            summary.points_after,
            max_speed.map_or(0.0, mps_to_mph),
            activity.map_or("-", |a| a.label())
        );

        ProcessedTrack {
            track: cleaned,
            summary,
        }
    }

    /// Process a batch of tracks, in parallel when the `parallel` feature is on.
    ///
    /// Output order matches input order.
    pub fn process_batch(&self, tracks: &[Track]) -> Vec<ProcessedTrack> {
        #[cfg(feature = "parallel")]
        let results = {
            info!("[Processor] Processing {} tracks in parallel (rayon)", tracks.len());
            tracks.par_iter().map(|t| self.process(t)).collect::<Vec<_>>()
        };

        #[cfg(not(feature = "parallel"))]
        let results = {
            info!("[Processor] Processing {} tracks sequentially", tracks.len());
            tracks.iter().map(|t| self.process(t)).collect::<Vec<_>>()
        };

        let removed: usize = results.iter().map(|r| r.summary.trim.removed()).sum();
        info!(
            "[Processor] Finished {} tracks, {} points removed",
            results.len(),
            removed
        );

        results
    }
}
