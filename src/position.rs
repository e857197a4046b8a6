//! Position fixes and accuracy levels.
//!
//! Accuracy is expressed in meters, where smaller is more precise. The two
//! negative sentinels mirror the platform's "best" levels and sort below every
//! real distance, so `min` always picks the most demanding request.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A batch of fixes shared by reference with every receiving subscriber.
pub type PositionBatch = Arc<[Position]>;

/// Requested or reported accuracy, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Accuracy(f64);

impl Accuracy {
    /// Highest precision, intended for navigation use.
    pub const BEST_FOR_NAVIGATION: Self = Self(-2.0);
    /// Highest precision the provider offers.
    pub const BEST: Self = Self(-1.0);
    /// Within ten meters.
    pub const NEAREST_TEN_METERS: Self = Self(10.0);
    /// Within one hundred meters.
    pub const HUNDRED_METERS: Self = Self(100.0);
    /// Within one kilometer.
    pub const KILOMETER: Self = Self(1_000.0);
    /// Within three kilometers.
    pub const THREE_KILOMETERS: Self = Self(3_000.0);

    /// Wraps a raw meter value.
    #[must_use]
    pub const fn meters(value: f64) -> Self {
        Self(value)
    }

    /// Returns the raw meter value.
    #[must_use]
    pub const fn as_meters(self) -> f64 {
        self.0
    }

    /// Returns the more precise of two accuracies.
    #[must_use]
    pub fn tightest(self, other: Self) -> Self {
        match self.0.total_cmp(&other.0) {
            Ordering::Greater => other,
            _ => self,
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::BEST_FOR_NAVIGATION {
            write!(f, "best-for-navigation")
        } else if *self == Self::BEST {
            write!(f, "best")
        } else {
            write!(f, "{}m", self.0)
        }
    }
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A single position fix reported by the provider.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Radius of uncertainty of `coordinate`, in meters.
    pub horizontal_accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Creates a fix at `coordinate` stamped with the current time.
    #[must_use]
    pub fn new(coordinate: Coordinate, horizontal_accuracy: f64) -> Self {
        Self {
            coordinate,
            altitude: None,
            horizontal_accuracy,
            speed: None,
            course: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets the fix timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the altitude.
    #[must_use]
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tightest_prefers_smaller_meters() {
        let a = Accuracy::KILOMETER;
        let b = Accuracy::NEAREST_TEN_METERS;
        assert_eq!(a.tightest(b), b);
        assert_eq!(b.tightest(a), b);
    }

    #[test]
    fn best_sentinels_beat_real_distances() {
        assert_eq!(Accuracy::meters(1.0).tightest(Accuracy::BEST), Accuracy::BEST);
        assert_eq!(
            Accuracy::BEST.tightest(Accuracy::BEST_FOR_NAVIGATION),
            Accuracy::BEST_FOR_NAVIGATION
        );
    }

    #[test]
    fn accuracy_display() {
        assert_eq!(Accuracy::BEST.to_string(), "best");
        assert_eq!(Accuracy::HUNDRED_METERS.to_string(), "100m");
    }

    #[test]
    fn position_serializes_without_empty_optionals() {
        let p = Position::new(Coordinate::new(40.7, -74.0), 5.0);
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("altitude").is_none());
        assert_eq!(json["horizontal_accuracy"], 5.0);

        let back: Position = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }
}
