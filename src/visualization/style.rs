//! Resolved plot styling: colors, draw styles, image formats and
//! point-to-pixel scaling.

use std::str::FromStr;

use plotters::style::RGBColor;

use super::{Result, VisualizationError};
use crate::config::{AxisConfig, LabelConfig, PlotConfig, SeriesConfig};

/// Typographic points per inch.
const POINTS_PER_INCH: f64 = 72.0;

/// Parse a color given as a matplotlib-style letter, a name or `#rrggbb`.
pub fn parse_color(value: &str) -> Result<RGBColor> {
    let value = value.trim();

    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(VisualizationError::InvalidColor(value.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| VisualizationError::InvalidColor(value.to_string()))
        };
        return Ok(RGBColor(channel(0)?, channel(2)?, channel(4)?));
    }

    let rgb = match value.to_ascii_lowercase().as_str() {
        "k" | "black" => (0, 0, 0),
        "w" | "white" => (255, 255, 255),
        "r" | "red" => (255, 0, 0),
        "g" | "green" => (0, 128, 0),
        "b" | "blue" => (0, 0, 255),
        "c" | "cyan" => (0, 191, 191),
        "m" | "magenta" => (191, 0, 191),
        "y" | "yellow" => (191, 191, 0),
        "gray" | "grey" => (128, 128, 128),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "brown" => (165, 42, 42),
        _ => return Err(VisualizationError::InvalidColor(value.to_string())),
    };

    Ok(RGBColor(rgb.0, rgb.1, rgb.2))
}

/// Line style of the multiplication range boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

impl FromStr for LineStyle {
    type Err = VisualizationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "-" | "solid" => Ok(LineStyle::Solid),
            "da" | "--" | "dashed" => Ok(LineStyle::Dashed),
            "do" | ":" | "dotted" => Ok(LineStyle::Dotted),
            other => Err(VisualizationError::InvalidLineStyle(other.to_string())),
        }
    }
}

impl LineStyle {
    /// Visible pieces of a vertical line from `lo` to `hi`, in data units.
    pub fn segments(self, lo: f64, hi: f64) -> Vec<(f64, f64)> {
        let (dash, gap) = match self {
            LineStyle::Solid => return vec![(lo, hi)],
            LineStyle::Dashed => (0.04, 0.025),
            LineStyle::Dotted => (0.008, 0.016),
        };

        let span = hi - lo;
        let dash = dash * span;
        let period = dash + gap * span;

        let mut segments = Vec::new();
        let mut start = lo;
        while start < hi {
            segments.push((start, (start + dash).min(hi)));
            start += period;
        }
        segments
    }
}

/// How the observed intensities are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpStyle {
    /// Cross markers only (`x`)
    Markers,
    /// Thin line only (`-`)
    Line,
    /// Line with markers (`x-`)
    MarkersAndLine,
}

impl FromStr for ExpStyle {
    type Err = VisualizationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "x" => Ok(ExpStyle::Markers),
            "-" => Ok(ExpStyle::Line),
            "x-" | "-x" => Ok(ExpStyle::MarkersAndLine),
            other => Err(VisualizationError::InvalidExpStyle(other.to_string())),
        }
    }
}

impl ExpStyle {
    pub fn draws_markers(self) -> bool {
        matches!(self, ExpStyle::Markers | ExpStyle::MarkersAndLine)
    }

    pub fn draws_line(self) -> bool {
        matches!(self, ExpStyle::Line | ExpStyle::MarkersAndLine)
    }
}

/// Backend family selected by the output extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Svg,
    Bitmap,
}

impl ImageFormat {
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "svg" => Ok(ImageFormat::Svg),
            "png" | "bmp" | "jpg" | "jpeg" => Ok(ImageFormat::Bitmap),
            other => Err(VisualizationError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Plot configuration with colors and styles parsed once per run.
#[derive(Debug, Clone)]
pub struct PlotStyle {
    pub color_exp: RGBColor,
    pub color_cal: RGBColor,
    pub color_pos: RGBColor,
    pub color_dif: RGBColor,
    pub exp_style: ExpStyle,
    pub vline_style: LineStyle,
    config: PlotConfig,
}

impl PlotStyle {
    /// Resolve colors and styles.
    ///
    /// # Errors
    ///
    /// Fails on an unknown color, observed style or boundary line style.
    pub fn from_config(config: &PlotConfig) -> Result<Self> {
        let series = &config.series;
        Ok(Self {
            color_exp: parse_color(&series.color_exp)?,
            color_cal: parse_color(&series.color_cal)?,
            color_pos: parse_color(&series.color_pos)?,
            color_dif: parse_color(&series.color_dif)?,
            exp_style: series.exp_style.parse()?,
            vline_style: config.axis.vline_style.parse()?,
            config: config.clone(),
        })
    }

    pub fn series(&self) -> &SeriesConfig {
        &self.config.series
    }

    pub fn labels(&self) -> &LabelConfig {
        &self.config.labels
    }

    pub fn axis(&self) -> &AxisConfig {
        &self.config.axis
    }

    /// Figure size in pixels: plot size in inches times dpi.
    pub fn figure_size(&self) -> (u32, u32) {
        let output = &self.config.output;
        let dpi = output.dpi as f64;
        (
            (output.plot_size[0] * dpi).round().max(1.0) as u32,
            (output.plot_size[1] * dpi).round().max(1.0) as u32,
        )
    }

    /// Pixels per typographic point.
    pub fn scale(&self) -> f64 {
        self.config.output.dpi as f64 / POINTS_PER_INCH
    }

    /// A length in points as fractional pixels.
    pub fn px_f(&self, points: f64) -> f64 {
        points * self.scale()
    }

    /// A length in points as whole pixels, at least one.
    pub fn px(&self, points: f64) -> u32 {
        self.px_f(points).round().max(1.0) as u32
    }

    /// Height of a reflection tick in pixels.
    ///
    /// The marker size is an area in points squared, so the tick is as
    /// tall as its square root.
    pub fn tick_length_px(&self) -> u32 {
        self.px(self.config.series.marker_pos_size.max(0.0).sqrt())
    }
}
