//! High-water-mark timestamps for incremental change detection.
//!
//! A [`Watermark`] is the last `updated_at` value a run observed. Checkpoint
//! stores hand it back as text, which may be a formatted date-time
//! (`2021-06-16 20:14:09.221838+00`), a raw epoch-seconds number, or, in the
//! worst case, something unparseable that is carried along verbatim.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Canonical rendering used when a watermark is written back to a checkpoint.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Date-time layouts carrying an explicit UTC offset (`+00`, `+03:00`, `+0300`).
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Date-time layouts without an offset, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// `0001-01-01 00:00:00` in microseconds since the Unix epoch.
const MIN_EPOCH_MICROS: i64 = -62_135_596_800_000_000;

const MICROS_PER_SEC: i64 = 1_000_000;

/// Last observed change time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Watermark {
    /// Microseconds since the Unix epoch (UTC).
    Epoch(i64),
    /// Checkpoint value that is neither a date-time nor a number.
    Raw(String),
}

/// Returned by [`Watermark::try_parse`] for values that are neither a
/// date-time nor epoch seconds. Callers usually fall back to
/// [`Watermark::Raw`] instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparseable watermark '{raw}': expected a date-time or epoch seconds")]
pub struct WatermarkParseError {
    pub raw: String,
}

impl Watermark {
    /// Lower bound used when no watermark has been committed yet.
    pub const MIN: Self = Self::Epoch(MIN_EPOCH_MICROS);

    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::Epoch(dt.timestamp_micros())
    }

    /// Build from fractional epoch seconds. Returns `None` for NaN/infinity.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_epoch_secs(secs: f64) -> Option<Self> {
        secs.is_finite()
            .then(|| Self::Epoch((secs * 1_000_000.0).round() as i64))
    }

    /// Parse a checkpoint value: date-time first, then raw epoch seconds.
    ///
    /// # Errors
    ///
    /// Returns [`WatermarkParseError`] when neither interpretation applies.
    pub fn try_parse(raw: &str) -> Result<Self, WatermarkParseError> {
        let trimmed = raw.trim();
        if let Some(dt) = parse_datetime(trimmed) {
            return Ok(Self::from_datetime(dt));
        }
        if let Some(wm) = trimmed
            .parse::<f64>()
            .ok()
            .and_then(Self::from_epoch_secs)
        {
            return Ok(wm);
        }
        Err(WatermarkParseError {
            raw: raw.to_string(),
        })
    }

    /// Like [`Watermark::try_parse`], but keeps unparseable input as
    /// [`Watermark::Raw`].
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        Self::try_parse(raw).unwrap_or_else(|e| Self::Raw(e.raw))
    }

    #[must_use]
    pub fn epoch_micros(&self) -> Option<i64> {
        match self {
            Self::Epoch(micros) => Some(*micros),
            Self::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.epoch_micros().and_then(DateTime::from_timestamp_micros)
    }

    /// Epoch microseconds floored to whole milliseconds.
    ///
    /// The row that produced the watermark always satisfies `>= bound`, so
    /// it is re-read by the next run instead of being skipped.
    #[must_use]
    pub fn query_bound_micros(&self) -> Option<i64> {
        self.epoch_micros()
            .map(|micros| micros.div_euclid(1_000) * 1_000)
    }

    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|ndt| ndt.and_utc())
        })
}

impl Default for Watermark {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epoch(micros) => match DateTime::from_timestamp_micros(*micros) {
                Some(dt) => write!(f, "{}", dt.format(CANONICAL_FORMAT)),
                None => write!(
                    f,
                    "{}.{:06}",
                    micros.div_euclid(MICROS_PER_SEC),
                    micros.rem_euclid(MICROS_PER_SEC)
                ),
            },
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

/// Only epoch watermarks are ordered; raw values compare equal to themselves
/// and are otherwise incomparable.
impl PartialOrd for Watermark {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Epoch(a), Self::Epoch(b)) => Some(a.cmp(b)),
            (Self::Raw(a), Self::Raw(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl Serialize for Watermark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Watermark {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Seconds(f64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Ok(Self::parse_lenient(&text)),
            Repr::Seconds(secs) => Self::from_epoch_secs(secs)
                .ok_or_else(|| de::Error::custom("epoch seconds must be finite")),
        }
    }
}
