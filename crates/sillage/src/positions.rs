//! In-memory position store.
//!
//! All tracks share one insertion-ordered buffer. The capacity bound is
//! global: once it is exceeded the oldest positions go first, whatever track
//! they belong to.

use std::collections::VecDeque;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

/// Default number of positions kept across all tracks.
pub const DEFAULT_MAX_POSITIONS: usize = 2000;

/// Track used when a client does not name one.
pub const DEFAULT_TRACK_ID: &str = "live";

pub fn default_track_id() -> String {
    DEFAULT_TRACK_ID.to_string()
}

/// A stored GPS fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub time: DateTime<Utc>,
    pub track_id: String,
}

/// A position as submitted by a client, before defaults are applied.
///
/// Coordinates may arrive as JSON numbers or as numeric strings.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPosition {
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub lat: f64,
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub lng: f64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default = "default_track_id")]
    pub track_id: String,
}

impl NewPosition {
    pub fn new(lat: f64, lng: f64, track_id: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            time: None,
            track_id: track_id.into(),
        }
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }
}

/// One point of a track as returned to map clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub time: DateTime<Utc>,
}

impl From<&Position> for TrackPoint {
    fn from(p: &Position) -> Self {
        Self {
            lat: p.lat,
            lng: p.lng,
            time: p.time,
        }
    }
}

/// Capped, insertion-ordered store of positions for every track.
#[derive(Debug)]
pub struct PositionStore {
    positions: VecDeque<Position>,
    capacity: usize,
}

impl PositionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: VecDeque::with_capacity(capacity.min(DEFAULT_MAX_POSITIONS)),
            capacity,
        }
    }

    /// Append a position, stamping it with the current time if it has none.
    ///
    /// Evicts the globally oldest positions until the store is back at
    /// capacity. Returns the number of positions held afterwards.
    pub fn append(&mut self, new: NewPosition) -> usize {
        let position = Position {
            lat: new.lat,
            lng: new.lng,
            time: new.time.unwrap_or_else(Utc::now),
            track_id: new.track_id,
        };
        self.positions.push_back(position);

        let mut evicted = 0;
        while self.positions.len() > self.capacity {
            self.positions.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, capacity = self.capacity, "evicted oldest positions");
        }

        self.positions.len()
    }

    /// Every position recorded for `track_id`, oldest first.
    pub fn query(&self, track_id: &str) -> Vec<Position> {
        self.positions
            .iter()
            .filter(|p| p.track_id == track_id)
            .cloned()
            .collect()
    }

    /// Drop every position of `track_id`. Returns how many were removed.
    pub fn reset(&mut self, track_id: &str) -> usize {
        let before = self.positions.len();
        self.positions.retain(|p| p.track_id != track_id);
        before - self.positions.len()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POSITIONS)
    }
}

/// Whole seconds, or microseconds when there is a fractional part.
fn serialize_timestamp<S: Serializer>(time: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    let format = if time.timestamp_subsec_micros() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    s.serialize_str(&time.to_rfc3339_opts(format, true))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCoordinate {
    Number(f64),
    Text(String),
}

fn deserialize_coordinate<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match RawCoordinate::deserialize(d)? {
        RawCoordinate::Number(value) => Ok(value),
        RawCoordinate::Text(text) => parse_coordinate(&text)
            .ok_or_else(|| D::Error::custom(format!("not a valid number: {text:?}"))),
    }
}

/// Parse a coordinate sent as text, ignoring surrounding whitespace.
pub fn parse_coordinate(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Epoch(f64),
}

/// Accepts RFC 3339, naive ISO-8601 (taken as UTC) or epoch seconds.
fn deserialize_timestamp<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<RawTimestamp>::deserialize(d)? {
        None => Ok(None),
        Some(RawTimestamp::Text(text)) => parse_timestamp(&text)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {text:?}"))),
        Some(RawTimestamp::Epoch(secs)) => {
            let millis = (secs * 1000.0).round() as i64;
            DateTime::<Utc>::from_timestamp_millis(millis)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
        }
    }
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}
