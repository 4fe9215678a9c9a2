//! Data models for Ponto
//!
//! Defines the clock events produced by the registration flow and the
//! queued records owned by the durable local queue.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of time-clock action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockType {
    /// Start of the work day
    ClockIn,
    /// End of the work day
    ClockOut,
    /// Start of a break
    BreakStart,
    /// End of a break
    BreakEnd,
}

impl ClockType {
    /// Wire/storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ClockType::ClockIn => "clock_in",
            ClockType::ClockOut => "clock_out",
            ClockType::BreakStart => "break_start",
            ClockType::BreakEnd => "break_end",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ClockType::ClockIn => "Clock in",
            ClockType::ClockOut => "Clock out",
            ClockType::BreakStart => "Break start",
            ClockType::BreakEnd => "Break end",
        }
    }
}

impl fmt::Display for ClockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown clock type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown clock type '{0}' (expected clock_in, clock_out, break_start or break_end)")]
pub struct ParseClockTypeError(pub String);

impl FromStr for ClockType {
    type Err = ParseClockTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "clock_in" | "in" => Ok(ClockType::ClockIn),
            "clock_out" | "out" => Ok(ClockType::ClockOut),
            "break_start" => Ok(ClockType::BreakStart),
            "break_end" => Ok(ClockType::BreakEnd),
            _ => Err(ParseClockTypeError(s.to_string())),
        }
    }
}

/// Geographic position captured with an event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Opaque encoded image captured as evidence
///
/// The queue never inspects the payload; it is stored and transmitted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoPayload(String);

impl PhotoPayload {
    /// Wrap an already encoded payload
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encode raw image bytes as base64
    pub fn from_bytes(bytes: &[u8]) -> Self {
        use base64::Engine;
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A clock action as produced by the registration flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockEvent {
    pub clock_type: ClockType,
    pub coordinates: Option<Coordinates>,
    pub photo: Option<PhotoPayload>,
}

impl ClockEvent {
    /// Create an event without location or photo
    pub fn new(clock_type: ClockType) -> Self {
        Self {
            clock_type,
            coordinates: None,
            photo: None,
        }
    }

    /// Attach coordinates
    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Attach a photo payload
    pub fn with_photo(mut self, photo: PhotoPayload) -> Self {
        self.photo = Some(photo);
        self
    }
}

/// Confirmation state of a queued record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
        }
    }

    /// Parse the storage representation; unknown values read as pending
    pub fn from_db(value: &str) -> Self {
        match value {
            "synced" => SyncStatus::Synced,
            _ => SyncStatus::Pending,
        }
    }
}

/// One clock action awaiting confirmation by the remote authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEvent {
    /// Locally assigned, monotonically increasing, never reused
    pub id: i64,
    pub clock_type: ClockType,
    pub coordinates: Option<Coordinates>,
    pub photo: Option<PhotoPayload>,
    /// Set at insertion, immutable
    pub created_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl PendingEvent {
    /// The producer-visible part of the record
    pub fn event(&self) -> ClockEvent {
        ClockEvent {
            clock_type: self.clock_type,
            coordinates: self.coordinates,
            photo: self.photo.clone(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.sync_status == SyncStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_type_round_trips_through_str() {
        for ty in [
            ClockType::ClockIn,
            ClockType::ClockOut,
            ClockType::BreakStart,
            ClockType::BreakEnd,
        ] {
            assert_eq!(ty.as_str().parse::<ClockType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_clock_type_accepts_cli_spellings() {
        assert_eq!("in".parse::<ClockType>().unwrap(), ClockType::ClockIn);
        assert_eq!("out".parse::<ClockType>().unwrap(), ClockType::ClockOut);
        assert_eq!(
            "break-start".parse::<ClockType>().unwrap(),
            ClockType::BreakStart
        );
        assert!("lunch".parse::<ClockType>().is_err());
    }

    #[test]
    fn test_clock_type_serializes_snake_case() {
        let json = serde_json::to_string(&ClockType::BreakEnd).unwrap();
        assert_eq!(json, "\"break_end\"");
    }

    #[test]
    fn test_photo_from_bytes_is_base64() {
        let photo = PhotoPayload::from_bytes(b"jpeg");
        assert_eq!(photo.as_str(), "anBlZw==");
    }

    #[test]
    fn test_event_builder() {
        let event = ClockEvent::new(ClockType::ClockIn)
            .with_coordinates(Coordinates::new(-23.5, -46.6))
            .with_photo(PhotoPayload::new("abc"));

        assert_eq!(event.coordinates.unwrap().latitude, -23.5);
        assert_eq!(event.photo.unwrap().as_str(), "abc");
    }

    #[test]
    fn test_sync_status_from_db() {
        assert_eq!(SyncStatus::from_db("synced"), SyncStatus::Synced);
        assert_eq!(SyncStatus::from_db("pending"), SyncStatus::Pending);
    }
}
