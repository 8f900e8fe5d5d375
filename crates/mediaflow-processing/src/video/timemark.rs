use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seeking to the exact end yields no frame.
const END_MARGIN: f64 = 0.1;

/// Position of the thumbnail frame: a share of the duration or an absolute time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timemark {
    Percent(f64),
    Seconds(f64),
}

impl Default for Timemark {
    fn default() -> Self {
        Timemark::Percent(50.0)
    }
}

impl Timemark {
    /// Seconds into a video of `duration` seconds, kept just short of the end.
    /// Percentages of an unknown duration map to 0.
    pub fn at(&self, duration: Option<f64>) -> f64 {
        let seconds = match *self {
            Timemark::Percent(percent) => duration.unwrap_or(0.0) * percent / 100.0,
            Timemark::Seconds(seconds) => seconds,
        };
        match duration {
            Some(duration) if seconds > duration - END_MARGIN => (duration - END_MARGIN).max(0.0),
            _ => seconds.max(0.0),
        }
    }
}

impl FromStr for Timemark {
    type Err = String;

    /// Accepts `"50%"`, `"12.5"` and `"[hh:]mm:ss[.ms]"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || format!("Invalid timemark: {}", s);

        if let Some(percent) = trimmed.strip_suffix('%') {
            let percent: f64 = percent.trim().parse().map_err(|_| invalid())?;
            if !(0.0..=100.0).contains(&percent) {
                return Err(invalid());
            }
            return Ok(Timemark::Percent(percent));
        }

        let mut seconds = 0.0;
        for part in trimmed.split(':') {
            let value: f64 = part.parse().map_err(|_| invalid())?;
            seconds = seconds * 60.0 + value;
        }
        if trimmed.split(':').count() > 3 || !seconds.is_finite() || seconds < 0.0 {
            return Err(invalid());
        }
        Ok(Timemark::Seconds(seconds))
    }
}

impl fmt::Display for Timemark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timemark::Percent(percent) => write!(f, "{}%", percent),
            Timemark::Seconds(seconds) => write!(f, "{}", seconds),
        }
    }
}

impl Serialize for Timemark {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timemark {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
