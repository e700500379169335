//! Duration values carried by `Duration` entity fields.
//!
//! A [`TimeSpan`] stores days, seconds and microseconds normalised the same
//! way a calendar timedelta is: `seconds` is always in `0..86_400` and
//! `microseconds` in `0..1_000_000`, with the sign carried by `days`.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

const MICROS_PER_SECOND: i128 = 1_000_000;
const MICROS_PER_DAY: i128 = 86_400 * MICROS_PER_SECOND;

fn matcher() -> &'static Regex {
    static MATCHER: OnceLock<Regex> = OnceLock::new();
    MATCHER.get_or_init(|| {
        Regex::new(r"^(\d+)d (\d+)h(\d+)m(\d+)\.(\d+)s").expect("timespan pattern is valid")
    })
}

/// A span of time with microsecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeSpan {
    days: i64,
    seconds: u32,
    microseconds: u32,
}

impl TimeSpan {
    /// Build a span from possibly out-of-range parts, normalising them.
    pub fn new(days: i64, seconds: i64, microseconds: i64) -> Self {
        let total = i128::from(days) * MICROS_PER_DAY
            + i128::from(seconds) * MICROS_PER_SECOND
            + i128::from(microseconds);
        Self::from_total_micros(total)
    }

    /// `None` when the day count does not fit an `i64`.
    fn checked_from_total_micros(total: i128) -> Option<Self> {
        let days = i64::try_from(total.div_euclid(MICROS_PER_DAY)).ok()?;
        let rest = total.rem_euclid(MICROS_PER_DAY);
        Some(Self {
            days,
            seconds: (rest / MICROS_PER_SECOND) as u32,
            microseconds: (rest % MICROS_PER_SECOND) as u32,
        })
    }

    fn from_total_micros(total: i128) -> Self {
        let days = total.div_euclid(MICROS_PER_DAY);
        let rest = total.rem_euclid(MICROS_PER_DAY);
        Self {
            days: days as i64,
            seconds: (rest / MICROS_PER_SECOND) as u32,
            microseconds: (rest % MICROS_PER_SECOND) as u32,
        }
    }

    pub fn from_duration(duration: chrono::Duration) -> Self {
        let total = i128::from(duration.num_seconds()) * MICROS_PER_SECOND
            + i128::from(duration.subsec_nanos() / 1_000);
        Self::from_total_micros(total)
    }

    pub fn to_duration(&self) -> chrono::Duration {
        chrono::Duration::days(self.days)
            + chrono::Duration::seconds(i64::from(self.seconds))
            + chrono::Duration::microseconds(i64::from(self.microseconds))
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    pub fn microseconds(&self) -> u32 {
        self.microseconds
    }
}

impl From<chrono::Duration> for TimeSpan {
    fn from(duration: chrono::Duration) -> Self {
        TimeSpan::from_duration(duration)
    }
}

/// Renders `"<d>d <hh>h<mm>m<ss>.<uuu>s"`.
///
/// The fractional part is always three digits: values up to 999 are zero
/// padded, longer values keep only their leading three digits. This makes
/// the text lossy for microsecond counts of 1000 and above.
impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let micros = format!("{:03}", self.microseconds);
        write!(
            f,
            "{}d {:02}h{:02}m{:02}.{}s",
            self.days.abs(),
            self.seconds / 3600,
            self.seconds % 3600 / 60,
            self.seconds % 60,
            &micros[..3]
        )
    }
}

/// Error returned when text does not follow the time span grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeSpanError(String);

impl fmt::Display for ParseTimeSpanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "time span must be in \"<d>d <h>h<m>m<s>.<uuu>s\" format (got {:?})",
            self.0
        )
    }
}

impl std::error::Error for ParseTimeSpanError {}

impl FromStr for TimeSpan {
    type Err = ParseTimeSpanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = matcher()
            .captures(s)
            .ok_or_else(|| ParseTimeSpanError(s.to_string()))?;

        let mut parts = [0i64; 5];
        for (slot, idx) in parts.iter_mut().zip(1..=5) {
            *slot = caps[idx]
                .parse()
                .map_err(|_| ParseTimeSpanError(s.to_string()))?;
        }
        let [days, hours, minutes, seconds, micros] = parts;

        // Each part is at most i64::MAX, so the sum cannot overflow i128.
        let total_seconds = ((i128::from(days) * 24 + i128::from(hours)) * 60 + i128::from(minutes)) * 60
            + i128::from(seconds);
        Self::checked_from_total_micros(total_seconds * MICROS_PER_SECOND + i128::from(micros))
            .ok_or_else(|| ParseTimeSpanError(s.to_string()))
    }
}

impl Serialize for TimeSpan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
