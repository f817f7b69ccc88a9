//! Activity labelling by start-time matching.
//!
//! Workout metadata (for example an Apple Health export) lists each workout
//! with its activity type and start time, separately from the GPS routes.
//! A track is labelled with the workout whose start time matches the
//! track's first timestamp:
//! 1. a workout starting in the same minute wins outright
//! 2. otherwise the closest workout within the tolerance window (300 s)
//! 3. otherwise the default label
//!
//! ## Example
//! ```rust
//! use track_annotator::{match_activity, parse_timestamp, ActivityRecord, ActivityType};
//!
//! let records = vec![
//!     ActivityRecord::parse("HKWorkoutActivityTypeHiking", "2024-05-01 08:28:00 +0000").unwrap(),
//!     ActivityRecord::parse("running", "2024-05-02T18:00:00Z").unwrap(),
//! ];
//! let start = parse_timestamp("2024-05-01T08:30:12Z").unwrap();
//! assert_eq!(match_activity(start, &records, 300), ActivityType::Hiking);
//! ```

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::debug;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, TrackError};
use crate::Track;

/// Default matching window in seconds.
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

/// Prefix of Apple HealthKit workout type identifiers.
const HEALTHKIT_PREFIX: &str = "hkworkoutactivitytype";

/// Workout activity vocabulary.
///
/// Serializes as the lowercase name. Deserializes through
/// [`ActivityType::from_label`], so feed labels in any accepted form load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ActivityType {
    #[default]
    Walking,
    Running,
    Biking,
    Hiking,
    Swimming,
    Yoga,
    Other,
}

static ACTIVITY_ALIASES: Lazy<HashMap<&'static str, ActivityType>> = Lazy::new(|| {
    HashMap::from([
        ("walking", ActivityType::Walking),
        ("walk", ActivityType::Walking),
        ("running", ActivityType::Running),
        ("run", ActivityType::Running),
        ("biking", ActivityType::Biking),
        ("bike", ActivityType::Biking),
        ("cycling", ActivityType::Biking),
        ("ride", ActivityType::Biking),
        ("hiking", ActivityType::Hiking),
        ("hike", ActivityType::Hiking),
        ("swimming", ActivityType::Swimming),
        ("swim", ActivityType::Swimming),
        ("yoga", ActivityType::Yoga),
        ("other", ActivityType::Other),
    ])
});

impl ActivityType {
    /// Parse a label, a common synonym or a HealthKit identifier.
    ///
    /// Unknown labels map to [`ActivityType::Other`].
    pub fn from_label(label: &str) -> Self {
        let lower = label.trim().to_ascii_lowercase();
        let key = lower.strip_prefix(HEALTHKIT_PREFIX).unwrap_or(lower.as_str());
        ACTIVITY_ALIASES
            .get(key)
            .copied()
            .unwrap_or(ActivityType::Other)
    }

    /// Human-readable label, as used when publishing.
    pub fn label(&self) -> &'static str {
        match self {
            ActivityType::Walking => "Walking",
            ActivityType::Running => "Running",
            ActivityType::Biking => "Biking",
            ActivityType::Hiking => "Hiking",
            ActivityType::Swimming => "Swimming",
            ActivityType::Yoga => "Yoga",
            ActivityType::Other => "Other",
        }
    }
}

impl From<String> for ActivityType {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One workout from the metadata feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub activity: ActivityType,
    pub start_time: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(activity: ActivityType, start_time: DateTime<Utc>) -> Self {
        Self {
            activity,
            start_time,
        }
    }

    /// Build a record from a raw activity label and start time string.
    pub fn parse(label: &str, start_time: &str) -> Result<Self> {
        Ok(Self::new(
            ActivityType::from_label(label),
            parse_timestamp(start_time)?,
        ))
    }
}

/// Parse a timestamp in one of the formats seen in workout exports.
///
/// Accepted:
/// - RFC 3339: `2024-05-01T08:30:00Z`, `2024-05-01T10:30:00+02:00`
/// - Apple Health: `2024-05-01 08:30:00 -0700`
/// - naive `2024-05-01 08:30:00`, taken as UTC
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(TrackError::InvalidTimestamp {
        input: input.to_string(),
        message: "expected RFC 3339 or 'YYYY-MM-DD HH:MM:SS [+ZZZZ]'".to_string(),
    })
}

/// Lookup key: the timestamp truncated to the minute.
fn minute_key(time: DateTime<Utc>) -> i64 {
    time.timestamp().div_euclid(60)
}

/// First timestamp of the track, scanning segments and points in order.
pub fn track_start_time(track: &Track) -> Option<DateTime<Utc>> {
    track.points().find_map(|p| p.time)
}

/// Closest record within the tolerance; the first one wins a tie.
fn nearest_within<'a>(
    start: DateTime<Utc>,
    records: &'a [ActivityRecord],
    tolerance_seconds: i64,
) -> Option<&'a ActivityRecord> {
    let tolerance_ms = tolerance_seconds.max(0).saturating_mul(1000);
    let mut best: Option<(&ActivityRecord, i64)> = None;

    for record in records {
        let diff_ms = (record.start_time - start).num_milliseconds().abs();
        if diff_ms > tolerance_ms {
            continue;
        }
        if best.map_or(true, |(_, best_ms)| diff_ms < best_ms) {
            best = Some((record, diff_ms));
        }
    }

    best.map(|(record, _)| record)
}

/// Label a track start time from an unordered list of workouts.
///
/// Falls back to [`ActivityType::Walking`] when nothing is within
/// `tolerance_seconds`.
pub fn match_activity(
    track_start: DateTime<Utc>,
    records: &[ActivityRecord],
    tolerance_seconds: i64,
) -> ActivityType {
    let key = minute_key(track_start);
    if let Some(record) = records.iter().find(|r| minute_key(r.start_time) == key) {
        return record.activity;
    }

    nearest_within(track_start, records, tolerance_seconds)
        .map(|r| r.activity)
        .unwrap_or_default()
}

/// Configuration for activity matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityMatchConfig {
    /// Maximum start time difference for a nearest match, in seconds.
    /// Default: 300
    pub tolerance_seconds: i64,

    /// Label used when no workout is close enough.
    /// Default: walking
    pub default_activity: ActivityType,
}

impl Default for ActivityMatchConfig {
    fn default() -> Self {
        Self {
            tolerance_seconds: DEFAULT_TOLERANCE_SECONDS,
            default_activity: ActivityType::Walking,
        }
    }
}

impl ActivityMatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tolerance_seconds < 0 {
            return Err(TrackError::InvalidConfig {
                message: format!(
                    "tolerance_seconds must be >= 0, got {}",
                    self.tolerance_seconds
                ),
            });
        }
        Ok(())
    }
}

/// Workout metadata indexed by start minute for repeated lookups.
#[derive(Debug, Clone, Default)]
pub struct ActivityTable {
    records: Vec<ActivityRecord>,
    /// minute key -> index of the first record starting in that minute
    by_minute: HashMap<i64, usize>,
}

impl ActivityTable {
    pub fn new(records: Vec<ActivityRecord>) -> Self {
        let mut by_minute = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            by_minute.entry(minute_key(record.start_time)).or_insert(i);
        }
        Self { records, by_minute }
    }

    /// Load a table from a JSON array of `{activity, startTime}` objects.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<ActivityRecord> = serde_json::from_str(json)?;
        Ok(Self::new(records))
    }

    pub fn records(&self) -> &[ActivityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Label a track start time.
    pub fn match_start(&self, start: DateTime<Utc>, config: &ActivityMatchConfig) -> ActivityType {
        if let Some(&i) = self.by_minute.get(&minute_key(start)) {
            let activity = self.records[i].activity;
            debug!("[Activity] Exact minute match for {}: {}", start, activity);
            return activity;
        }

        match nearest_within(start, &self.records, config.tolerance_seconds) {
            Some(record) => {
                debug!(
                    "[Activity] Nearest match for {}: {} ({}s away)",
                    start,
                    record.activity,
                    (record.start_time - start).num_seconds().abs()
                );
                record.activity
            }
            None => {
                debug!(
                    "[Activity] No workout within {}s of {}, using {}",
                    config.tolerance_seconds, start, config.default_activity
                );
                config.default_activity
            }
        }
    }

    /// Label a track by its first timestamp.
    ///
    /// Fails when the track has no timestamped point at all.
    pub fn match_track(&self, track: &Track, config: &ActivityMatchConfig) -> Result<ActivityType> {
        let start = track_start_time(track).ok_or_missing_timestamps(track.display_name())?;
        Ok(self.match_start(start, config))
    }
}

impl FromIterator<ActivityRecord> for ActivityTable {
    fn from_iter<I: IntoIterator<Item = ActivityRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
