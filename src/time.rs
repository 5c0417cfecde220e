//! Time spans and the Matroska date epoch.

use chrono::{DateTime, Utc};
use std::fmt;

/// Offset of the Matroska date epoch (2001-01-01T00:00:00Z) from the Unix
/// epoch, in seconds.
const MKV_EPOCH_UNIX_SECS: i64 = 978_307_200;

/// Convert a DateUTC payload (nanoseconds since 2001-01-01T00:00:00Z) to a
/// wall-clock timestamp. Returns `None` if the value is outside the
/// representable range.
pub fn date_from_mkv_ns(ns: i64) -> Option<DateTime<Utc>> {
    let unix_ns = i128::from(MKV_EPOCH_UNIX_SECS) * 1_000_000_000 + i128::from(ns);
    let secs = i64::try_from(unix_ns.div_euclid(1_000_000_000)).ok()?;
    let nanos = unix_ns.rem_euclid(1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// A cooked duration with nanosecond resolution.
///
/// Scanned timecodes become `TimeSpan`s once the segment's `TimecodeScale`
/// is known; the pre-cooking numeric value stays available on the element
/// as its raw value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSpan {
    nanos: u64,
}

impl TimeSpan {
    /// A span of `nanos` nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// A span of `ticks` units of `scale` nanoseconds each, saturating on
    /// overflow.
    pub const fn from_scaled(ticks: u64, scale: u64) -> Self {
        Self { nanos: ticks.saturating_mul(scale) }
    }

    /// The span in nanoseconds.
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// The span in milliseconds, truncating.
    pub const fn as_millis(&self) -> u64 {
        self.nanos / 1_000_000
    }

    /// The span in seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 / 1e9
    }

    /// The span formatted in milliseconds, e.g. `40 ms`.
    pub fn display_millis(&self) -> String {
        if self.nanos % 1_000_000 == 0 {
            format!("{} ms", self.as_millis())
        } else {
            format!("{:.3} ms", self.nanos as f64 / 1e6)
        }
    }
}

impl From<std::time::Duration> for TimeSpan {
    fn from(d: std::time::Duration) -> Self {
        Self::from_nanos(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.nanos / 1_000_000_000;
        let millis = (self.nanos % 1_000_000_000) / 1_000_000;
        if total_secs >= 3600 {
            let (h, m, s) = (total_secs / 3600, (total_secs / 60) % 60, total_secs % 60);
            write!(f, "{h}:{m:02}:{s:02}.{millis:03}")
        } else if self.nanos >= 1_000_000_000 {
            write!(f, "{total_secs}.{millis:03} s")
        } else {
            write!(f, "{}", self.display_millis())
        }
    }
}
