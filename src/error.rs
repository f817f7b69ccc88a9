//! Unified error handling for the track-annotator library.
//!
//! The engine functions themselves are infallible: missing times and
//! elevations produce absent values. Errors only surface at the edges,
//! when parsing timestamps, reading or writing JSON, validating
//! configuration, or matching a track that carries no time at all.

use std::fmt;

/// Unified error type for track-annotator operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackError {
    /// A timestamp string could not be parsed in any supported format
    InvalidTimestamp { input: String, message: String },
    /// Speed limit is not a finite, strictly positive value (m/s)
    InvalidSpeedLimit { value: f64 },
    /// Track has no timestamped point, so it cannot be time-matched
    MissingTimestamps { track: String },
    /// JSON serialization or deserialization failed
    Serialization { message: String },
    /// Configuration error
    InvalidConfig { message: String },
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::InvalidTimestamp { input, message } => {
                write!(f, "Invalid timestamp '{}': {}", input, message)
            }
            TrackError::InvalidSpeedLimit { value } => {
                write!(f, "Speed limit must be a positive number of m/s, got {}", value)
            }
            TrackError::MissingTimestamps { track } => {
                write!(f, "Track '{}' has no timestamped points", track)
            }
            TrackError::Serialization { message } => {
                write!(f, "Serialization error: {}", message)
            }
            TrackError::InvalidConfig { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for TrackError {}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        TrackError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for track-annotator operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Extension trait for converting Option to TrackError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a missing timestamps error.
    fn ok_or_missing_timestamps(self, track: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing_timestamps(self, track: &str) -> Result<T> {
        self.ok_or_else(|| TrackError::MissingTimestamps {
            track: track.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackError::MissingTimestamps {
            track: "morning-walk".to_string(),
        };
        assert!(err.to_string().contains("morning-walk"));
        assert!(err.to_string().contains("no timestamped points"));

        let err = TrackError::InvalidSpeedLimit { value: -1.0 };
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_missing_timestamps("test");
        assert!(matches!(result, Err(TrackError::MissingTimestamps { .. })));

        let some = Some(3).ok_or_missing_timestamps("test");
        assert_eq!(some, Ok(3));
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let converted: TrackError = err.into();
        assert!(matches!(converted, TrackError::Serialization { .. }));
    }
}
