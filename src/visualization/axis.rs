//! Linear 2θ axis with major ticks at multiples of a fixed step.

use std::ops::Range;

use plotters::coord::ranged1d::{KeyPointHint, NoDefaultFormatting, Ranged, ValueFormatter};
use plotters::coord::types::RangedCoordf64;

/// Upper limit on major ticks before the step is replaced by an automatic one.
const MAX_MAJOR_TICKS: f64 = 100.0;

/// Step used for major ticks over `span`.
///
/// A positive finite `requested` step is kept unless it would produce more
/// than [`MAX_MAJOR_TICKS`] ticks; otherwise a 1/2/5 step giving about ten
/// ticks is chosen.
pub fn tick_step(span: f64, requested: f64) -> f64 {
    if requested.is_finite() && requested > 0.0 && span / requested <= MAX_MAJOR_TICKS {
        return requested;
    }

    let raw = (span.abs() / 10.0).max(f64::MIN_POSITIVE);
    let magnitude = 10f64.powf(raw.log10().floor());
    let mantissa = match raw / magnitude {
        m if m <= 1.0 => 1.0,
        m if m <= 2.0 => 2.0,
        m if m <= 5.0 => 5.0,
        _ => 10.0,
    };
    mantissa * magnitude
}

/// Multiples of `step` inside `[lo, hi]`.
pub fn major_ticks(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

/// Number of minor intervals per major step: 5 for steps with mantissa
/// 1, 2.5 or 5, otherwise 4.
pub fn minor_divisions(step: f64) -> usize {
    let mantissa = 10f64.powf(step.log10().rem_euclid(1.0));
    let close = |target: f64| (mantissa - target).abs() < 1e-6;
    if close(1.0) || close(2.5) || close(5.0) || close(10.0) {
        5
    } else {
        4
    }
}

/// Minor tick positions inside `[lo, hi]`, majors excluded.
pub fn minor_ticks(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    let divisions = minor_divisions(step);
    let minor = step / divisions as f64;
    let first = (lo / minor).ceil() as i64;
    let last = (hi / minor).floor() as i64;
    (first..=last)
        .filter(|k| k.rem_euclid(divisions as i64) != 0)
        .map(|k| k as f64 * minor)
        .collect()
}

/// Decimal places needed to print multiples of `step` exactly.
fn decimals(step: f64) -> usize {
    (0..6)
        .find(|&d| {
            let scaled = step * 10f64.powi(d as i32);
            (scaled - scaled.round()).abs() < 1e-6
        })
        .unwrap_or(6)
}

#[derive(Clone)]
pub struct SteppedAxis {
    inner: RangedCoordf64,
    lo: f64,
    hi: f64,
    step: f64,
    major: Vec<f64>,
}

impl SteppedAxis {
    pub fn new(lo: f64, hi: f64, requested_step: f64) -> Self {
        let step = tick_step(hi - lo, requested_step);
        Self {
            inner: (lo..hi).into(),
            lo,
            hi,
            step,
            major: major_ticks(lo, hi, step),
        }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn major(&self) -> &[f64] {
        &self.major
    }

    pub fn minor(&self) -> Vec<f64> {
        minor_ticks(self.lo, self.hi, self.step)
    }

    /// Tick label text for a value on this axis.
    pub fn label(&self, value: f64) -> String {
        format!("{:.*}", decimals(self.step), value)
    }
}

impl Ranged for SteppedAxis {
    type FormatOption = NoDefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.inner.map(value, limit)
    }

    // Light points are never labelled or meshed here, so both passes get the majors.
    fn key_points<Hint: KeyPointHint>(&self, _hint: Hint) -> Vec<f64> {
        self.major.clone()
    }

    fn range(&self) -> Range<f64> {
        self.lo..self.hi
    }
}

impl ValueFormatter<f64> for SteppedAxis {
    fn format(value: &f64) -> String {
        format!("{}", value)
    }

    fn format_ext(&self, value: &f64) -> String {
        self.label(*value)
    }
}
