//! Piecewise intensity multiplication over 2θ ranges.
//!
//! Weak high-angle reflections are often scaled up for display. Each
//! range is given as `"start,end,factor"`; the observed, calculated and
//! difference intensities inside `[start, end]` are multiplied by `factor`.

use std::fmt;
use std::str::FromStr;

use log::info;
use thiserror::Error;

use crate::core::loaders::{Role, SampleDataset};

/// Lower bound used when the start field is empty.
pub const DEFAULT_START: f64 = 0.0;

/// Upper bound used when the end field is empty (largest 2θ angle).
pub const DEFAULT_END: f64 = 180.0;

/// Errors that can occur while parsing multiplication ranges.
#[derive(Debug, Error, PartialEq)]
pub enum MultiplyError {
    #[error("Malformed range '{0}': expected \"start,end,factor\"")]
    MalformedTuple(String),

    #[error("Missing multiplication factor in range '{0}'")]
    MissingFactor(String),

    #[error("Range '{0}' has neither a start nor an end value")]
    TooManyEmptyFields(String),

    #[error("Invalid number '{value}' in range '{raw}'")]
    InvalidNumber { raw: String, value: String },

    #[error("Upper bound smaller than lower bound in range {0}")]
    InvertedBounds(MultiplicationRange),

    #[error("Overlapping ranges not allowed: {first} and {second}")]
    OverlappingRanges {
        first: MultiplicationRange,
        second: MultiplicationRange,
    },
}

/// Result type for multiplication operations.
pub type Result<T> = std::result::Result<T, MultiplyError>;

/// A 2θ range whose intensities are scaled by `factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplicationRange {
    pub start: f64,
    pub end: f64,
    pub factor: f64,
}

impl MultiplicationRange {
    pub fn new(start: f64, end: f64, factor: f64) -> Self {
        Self { start, end, factor }
    }

    /// Whether an angle lies inside the closed range.
    #[inline]
    pub fn contains(&self, angle: f64) -> bool {
        angle >= self.start && angle <= self.end
    }
}

impl fmt::Display for MultiplicationRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.start, self.end, self.factor)
    }
}

/// Parse one field; NaN and infinities are rejected like any other non-number.
fn parse_field(raw: &str, value: &str) -> Result<f64> {
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(MultiplyError::InvalidNumber {
            raw: raw.to_string(),
            value: value.to_string(),
        }),
    }
}

impl FromStr for MultiplicationRange {
    type Err = MultiplyError;

    /// Parse a single `"start,end,factor"` entry.
    ///
    /// An empty start becomes 0 and an empty end becomes 180. Bounds are
    /// not checked here, see [`parse_ranges`].
    fn from_str(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
        let &[start, end, factor] = &fields[..] else {
            return Err(MultiplyError::MalformedTuple(raw.to_string()));
        };

        if factor.is_empty() {
            return Err(MultiplyError::MissingFactor(raw.to_string()));
        }
        if start.is_empty() && end.is_empty() {
            return Err(MultiplyError::TooManyEmptyFields(raw.to_string()));
        }

        let start = if start.is_empty() {
            DEFAULT_START
        } else {
            parse_field(raw, start)?
        };
        let end = if end.is_empty() {
            DEFAULT_END
        } else {
            parse_field(raw, end)?
        };
        let factor = parse_field(raw, factor)?;

        Ok(MultiplicationRange { start, end, factor })
    }
}

/// Parse and validate a set of multiplication ranges.
///
/// The result is sorted by start. Every range must satisfy
/// `start < end`. Sorted neighbours may touch but not overlap: the next
/// start must not be smaller than the previous end. A sample sitting
/// exactly on a shared boundary is therefore scaled by both factors.
///
/// # Errors
///
/// Fails on the first malformed entry, inverted range or overlap.
pub fn parse_ranges<S: AsRef<str>>(raw_ranges: &[S]) -> Result<Vec<MultiplicationRange>> {
    let mut ranges = raw_ranges
        .iter()
        .map(|raw| raw.as_ref().parse::<MultiplicationRange>())
        .collect::<Result<Vec<_>>>()?;

    if let Some(range) = ranges.iter().find(|r| !(r.start < r.end)) {
        return Err(MultiplyError::InvertedBounds(*range));
    }

    ranges.sort_by(|a, b| a.start.total_cmp(&b.start));

    for pair in ranges.windows(2) {
        if !(pair[1].start >= pair[0].end) {
            return Err(MultiplyError::OverlappingRanges {
                first: pair[0],
                second: pair[1],
            });
        }
    }

    Ok(ranges)
}

/// Multiply the observed, calculated and difference intensities inside a range.
///
/// Applying the same range twice compounds the factor.
pub fn apply_range(dataset: &mut SampleDataset, range: &MultiplicationRange) {
    for role in Role::SCALED {
        let series = dataset.series_mut(role);
        for (angle, intensity) in series.angle.iter().zip(series.intensity.iter_mut()) {
            if range.contains(*angle) {
                *intensity *= range.factor;
            }
        }
    }
}

/// Apply every range in order.
pub fn apply_ranges(dataset: &mut SampleDataset, ranges: &[MultiplicationRange]) {
    for range in ranges {
        info!(
            "Scaling '{}' between {}° and {}° by {}",
            dataset.name, range.start, range.end, range.factor
        );
        apply_range(dataset, range);
    }
}

/// Return a scaled copy of a dataset, leaving the input untouched.
pub fn scaled(dataset: &SampleDataset, ranges: &[MultiplicationRange]) -> SampleDataset {
    let mut copy = dataset.clone();
    apply_ranges(&mut copy, ranges);
    copy
}
