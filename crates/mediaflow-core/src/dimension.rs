//! Dimension resolution shared by the image, video and watermark paths.
//!
//! Every resolved dimension is even on both axes, several video encoders
//! (yuv420p) refuse odd frame sizes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A frame size, optionally flagged to keep the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
    #[serde(
        default,
        alias = "keep_aspect_ratio",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub keep_aspect_ratio: bool,
}

impl Dimension {
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            keep_aspect_ratio: false,
        }
    }

    pub const fn keeping_aspect_ratio(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            keep_aspect_ratio: true,
        }
    }

    pub fn is_portrait(&self) -> bool {
        self.width < self.height
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Same geometry, ignoring the aspect-ratio flag.
    pub fn same_size(&self, other: &Dimension) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// `WxH`, the form ffmpeg expects for `-s`.
    pub fn to_size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Percentage of a frame, written as `"N%"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePercent(f64);

impl ScalePercent {
    pub fn new(percent: f64) -> Result<Self, String> {
        if !percent.is_finite() || percent <= 0.0 {
            return Err(format!("Invalid scale percentage: {}", percent));
        }
        Ok(Self(percent))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn factor(&self) -> f64 {
        self.0 / 100.0
    }
}

impl FromStr for ScalePercent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        let percent = number
            .parse::<f64>()
            .map_err(|_| format!("Invalid scale: {}. Expected a value like \"10%\"", s))?;
        Self::new(percent)
    }
}

impl fmt::Display for ScalePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Serialize for ScalePercent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScalePercent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Round to the nearest even integer (half away from zero), never below 2 and
/// never above the largest even `u32`.
pub fn make_even(value: u32) -> u32 {
    let even = (f64::from(value) / 2.0).round() as u64 * 2;
    u32::try_from(even).unwrap_or(u32::MAX - 1).max(2)
}

/// Fit `source` inside `desired` while keeping the source aspect ratio.
///
/// A portrait source facing a landscape box swaps the box first. Sources that
/// already fit are never upscaled. Otherwise the longer source axis is pinned
/// to the box and the other follows the same ratio.
pub fn fit_within(source: Dimension, desired: Dimension) -> Dimension {
    let (mut box_width, mut box_height) = (desired.width, desired.height);
    if source.is_portrait() && desired.is_landscape() {
        std::mem::swap(&mut box_width, &mut box_height);
    }

    if source.width == 0 || source.height == 0 {
        return Dimension::new(make_even(box_width), make_even(box_height));
    }

    let (mut width, mut height) = (source.width, source.height);
    if source.width > box_width || source.height > box_height {
        if source.width > source.height {
            width = box_width;
            height = (f64::from(box_width) / f64::from(source.width) * f64::from(source.height))
                .round() as u32;
        } else {
            height = box_height;
            width = (f64::from(box_height) / f64::from(source.height) * f64::from(source.width))
                .round() as u32;
        }
    }

    Dimension::new(make_even(width), make_even(height))
}

/// Resolve a configured target against the source geometry.
pub fn resolve(source: Dimension, desired: Dimension) -> Dimension {
    if desired.keep_aspect_ratio {
        fit_within(source, desired)
    } else {
        Dimension::new(make_even(desired.width), make_even(desired.height))
    }
}

/// Drop later entries whose geometry repeats an earlier one.
pub fn dedup(dimensions: impl IntoIterator<Item = Dimension>) -> Vec<Dimension> {
    let mut unique: Vec<Dimension> = Vec::new();
    for dimension in dimensions {
        if !unique.iter().any(|d| d.same_size(&dimension)) {
            unique.push(dimension);
        }
    }
    unique
}

/// Resolve every configured target and dedup the outcome, keeping config order.
pub fn resolve_all(source: Dimension, desired: &[Dimension]) -> Vec<Dimension> {
    dedup(desired.iter().map(|d| resolve(source, *d)))
}

/// Scale both axes by a percentage, rounding to the nearest pixel.
pub fn scale(size: Dimension, percent: ScalePercent) -> Dimension {
    let factor = percent.factor();
    Dimension::new(
        (f64::from(size.width) * factor).round() as u32,
        (f64::from(size.height) * factor).round() as u32,
    )
}
