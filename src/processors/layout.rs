//! Panel height ratios for the stacked fit plot.
//!
//! The overlay and difference panels share a fixed budget of nine units
//! in proportion to their data amplitude, so both are drawn with the same
//! intensity scale. The reflection panel always gets one unit.

use log::warn;
use thiserror::Error;

use crate::core::loaders::{extent, Role, SampleDataset};

/// Units shared by the overlay and difference panels.
pub const HEIGHT_BUDGET: f64 = 9.0;

/// Units of the reflection position panel.
pub const POSITION_WEIGHT: f64 = 1.0;

/// Smallest share of the budget the overlay panel keeps.
pub const MIN_OVERLAY_WEIGHT: f64 = 1.0;

/// Errors that can occur while computing panel heights.
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("Observed and calculated intensities are constant: cannot scale panels (division by zero)")]
    ZeroOverlayAmplitude,

    #[error("Non-finite amplitude (overlay {overlay}, difference {difference})")]
    NonFiniteAmplitude { overlay: f64, difference: f64 },

    #[error("No {0} data to lay out")]
    EmptySeries(Role),
}

/// Result type for layout operations.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Relative heights of the three panels, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightRatios {
    pub overlay: f64,
    pub position: f64,
    pub difference: f64,
}

/// Peak-to-peak amplitude of a set of values.
fn amplitude(bounds: (f64, f64)) -> f64 {
    (bounds.1 - bounds.0).abs()
}

/// Split the height budget by the ratio of difference to overlay amplitude.
///
/// A difference amplitude close to or above the overlay amplitude would
/// leave the overlay panel without room; the overlay then keeps
/// [`MIN_OVERLAY_WEIGHT`] units and the panels no longer share one scale.
///
/// # Errors
///
/// Fails for a zero or non-finite amplitude.
pub fn compute_height_ratios(overlay_amplitude: f64, difference_amplitude: f64) -> Result<HeightRatios> {
    if !overlay_amplitude.is_finite() || !difference_amplitude.is_finite() {
        return Err(LayoutError::NonFiniteAmplitude {
            overlay: overlay_amplitude,
            difference: difference_amplitude,
        });
    }
    if overlay_amplitude == 0.0 {
        return Err(LayoutError::ZeroOverlayAmplitude);
    }

    let ratio = difference_amplitude.abs() / overlay_amplitude.abs();
    let max_ratio = (HEIGHT_BUDGET - MIN_OVERLAY_WEIGHT) / HEIGHT_BUDGET;
    let difference = if ratio > max_ratio {
        warn!(
            "Difference amplitude is {:.2} times the overlay amplitude, clamping panel heights",
            ratio
        );
        HEIGHT_BUDGET - MIN_OVERLAY_WEIGHT
    } else {
        HEIGHT_BUDGET * ratio
    };

    Ok(HeightRatios {
        overlay: HEIGHT_BUDGET - difference,
        position: POSITION_WEIGHT,
        difference,
    })
}

impl HeightRatios {
    /// Ratios from the amplitudes of a (scaled) dataset.
    ///
    /// The overlay amplitude spans the observed and calculated intensities
    /// together; the difference amplitude spans the difference curve.
    pub fn from_dataset(dataset: &SampleDataset) -> Result<Self> {
        if dataset.exp.is_empty() {
            return Err(LayoutError::EmptySeries(Role::Observed));
        }
        if dataset.cal.is_empty() {
            return Err(LayoutError::EmptySeries(Role::Calculated));
        }
        let overlay = dataset
            .overlay_intensity_extent()
            .ok_or(LayoutError::EmptySeries(Role::Observed))?;
        let difference =
            extent(&dataset.dif.intensity).ok_or(LayoutError::EmptySeries(Role::Difference))?;

        compute_height_ratios(amplitude(overlay), amplitude(difference))
    }

    pub fn total(&self) -> f64 {
        self.overlay + self.position + self.difference
    }

    /// Distribute `available` pixels over the panels, top to bottom.
    ///
    /// The difference panel takes the rounding remainder so the parts
    /// always add up to `available`.
    pub fn split_pixels(&self, available: u32) -> (u32, u32, u32) {
        let total = self.total();
        let scale = |weight: f64| ((weight / total) * available as f64).round() as u32;

        let overlay = scale(self.overlay).min(available);
        let position = scale(self.position).min(available - overlay);
        let difference = available - overlay - position;

        (overlay, position, difference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::Series;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_height_ratios() {
        let ratios = compute_height_ratios(10.0, 2.0).unwrap();
        assert_close(ratios.overlay, 7.2);
        assert_close(ratios.position, 1.0);
        assert_close(ratios.difference, 1.8);
        assert_close(ratios.total(), 10.0);
    }

    #[test]
    fn test_zero_overlay_amplitude() {
        assert_eq!(
            compute_height_ratios(0.0, 2.0),
            Err(LayoutError::ZeroOverlayAmplitude)
        );
    }

    #[test]
    fn test_non_finite_amplitude() {
        assert!(matches!(
            compute_height_ratios(f64::NAN, 1.0),
            Err(LayoutError::NonFiniteAmplitude { .. })
        ));
        assert!(matches!(
            compute_height_ratios(10.0, f64::INFINITY),
            Err(LayoutError::NonFiniteAmplitude { .. })
        ));
    }

    #[test]
    fn test_difference_exceeds_overlay_is_clamped() {
        let ratios = compute_height_ratios(2.0, 3.0).unwrap();
        assert_close(ratios.overlay, MIN_OVERLAY_WEIGHT);
        assert_close(ratios.difference, HEIGHT_BUDGET - MIN_OVERLAY_WEIGHT);
        assert_close(ratios.total(), 10.0);

        let equal = compute_height_ratios(4.0, 4.0).unwrap();
        assert_close(equal.overlay, MIN_OVERLAY_WEIGHT);
    }

    #[test]
    fn test_ratio_just_below_clamp_is_kept() {
        let ratios = compute_height_ratios(9.0, 8.0).unwrap();
        assert_close(ratios.overlay, 1.0);
        assert_close(ratios.difference, 8.0);

        let ratios = compute_height_ratios(9.0, 7.0).unwrap();
        assert_close(ratios.overlay, 2.0);
        assert_close(ratios.difference, 7.0);
    }

    #[test]
    fn test_flat_difference() {
        let ratios = compute_height_ratios(5.0, 0.0).unwrap();
        assert_close(ratios.overlay, 9.0);
        assert_close(ratios.difference, 0.0);
    }

    #[test]
    fn test_from_dataset_uses_overlay_union() {
        let dataset = SampleDataset {
            name: "s".to_string(),
            exp: Series::new(vec![1.0, 2.0], vec![0.0, 8.0]),
            cal: Series::new(vec![1.0, 2.0], vec![1.0, 10.0]),
            pos: Series::new(vec![1.5], vec![0.0]),
            dif: Series::new(vec![1.0, 2.0], vec![-1.0, 1.0]),
        };

        let ratios = HeightRatios::from_dataset(&dataset).unwrap();
        assert_close(ratios.difference, 1.8);
        assert_close(ratios.overlay, 7.2);
    }

    #[test]
    fn test_from_dataset_constant_overlay() {
        let dataset = SampleDataset {
            name: "flat".to_string(),
            exp: Series::new(vec![1.0, 2.0], vec![3.0, 3.0]),
            cal: Series::new(vec![1.0, 2.0], vec![3.0, 3.0]),
            pos: Series::default(),
            dif: Series::new(vec![1.0, 2.0], vec![0.0, 0.0]),
        };

        assert_eq!(
            HeightRatios::from_dataset(&dataset),
            Err(LayoutError::ZeroOverlayAmplitude)
        );
    }

    #[test]
    fn test_from_dataset_empty_difference() {
        let dataset = SampleDataset {
            name: "s".to_string(),
            exp: Series::new(vec![1.0, 2.0], vec![0.0, 8.0]),
            cal: Series::new(vec![1.0, 2.0], vec![1.0, 10.0]),
            pos: Series::default(),
            dif: Series::default(),
        };

        assert_eq!(
            HeightRatios::from_dataset(&dataset),
            Err(LayoutError::EmptySeries(Role::Difference))
        );
    }

    #[test]
    fn test_split_pixels() {
        let ratios = compute_height_ratios(10.0, 2.0).unwrap();
        assert_eq!(ratios.split_pixels(1000), (720, 100, 180));

        let (a, b, c) = ratios.split_pixels(333);
        assert_eq!(a + b + c, 333);
    }
}
