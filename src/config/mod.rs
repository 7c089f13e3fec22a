//! Configuration types for the Pawley fit plotter.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while reading or writing a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Colors, marker sizes and line widths of the four data series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Color of the observed intensities
    #[serde(default = "default_color_exp")]
    pub color_exp: String,

    /// Color of the calculated intensities
    #[serde(default = "default_color_cal")]
    pub color_cal: String,

    /// Color of the reflection position ticks
    #[serde(default = "default_color_pos")]
    pub color_pos: String,

    /// Color of the difference trace
    #[serde(default = "default_color_dif")]
    pub color_dif: String,

    /// Size of the observed cross markers in points
    #[serde(default = "default_marker_exp_size")]
    pub marker_exp_size: f64,

    /// Marker area of the reflection ticks in points squared
    #[serde(default = "default_marker_pos_size")]
    pub marker_pos_size: f64,

    /// Observed draw style: "x" (markers), "-" (line) or "x-" (both)
    #[serde(default = "default_exp_style")]
    pub exp_style: String,

    /// Line width of the calculated curve in points
    #[serde(default = "default_cal_line_width")]
    pub cal_line_width: f64,

    /// Line width of the observed and difference traces in points
    #[serde(default = "default_thin_line_width")]
    pub thin_line_width: f64,
}

fn default_color_exp() -> String {
    "k".to_string()
}

fn default_color_cal() -> String {
    "r".to_string()
}

fn default_color_pos() -> String {
    "b".to_string()
}

fn default_color_dif() -> String {
    "g".to_string()
}

fn default_marker_exp_size() -> f64 {
    6.0
}

fn default_marker_pos_size() -> f64 {
    50.0
}

fn default_exp_style() -> String {
    "x".to_string()
}

fn default_cal_line_width() -> f64 {
    2.0
}

fn default_thin_line_width() -> f64 {
    0.4
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            color_exp: default_color_exp(),
            color_cal: default_color_cal(),
            color_pos: default_color_pos(),
            color_dif: default_color_dif(),
            marker_exp_size: default_marker_exp_size(),
            marker_pos_size: default_marker_pos_size(),
            exp_style: default_exp_style(),
            cal_line_width: default_cal_line_width(),
            thin_line_width: default_thin_line_width(),
        }
    }
}

/// Legend texts, axis labels and font sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_legend_exp")]
    pub legend_text_exp: String,

    #[serde(default = "default_legend_cal")]
    pub legend_text_cal: String,

    #[serde(default = "default_legend_pos")]
    pub legend_text_pos: String,

    #[serde(default = "default_legend_dif")]
    pub legend_text_dif: String,

    /// Label of the 2θ axis
    #[serde(default = "default_x_label")]
    pub x_label: String,

    /// Label of the intensity axis
    #[serde(default = "default_y_label")]
    pub y_label: String,

    /// Font sizes in points
    #[serde(default = "default_font_size")]
    pub size_axis_labels: f64,

    #[serde(default = "default_font_size")]
    pub size_legend_labels: f64,

    #[serde(default = "default_font_size")]
    pub size_tick_labels: f64,

    #[serde(default = "default_font_size")]
    pub size_multiply_label: f64,
}

fn default_legend_exp() -> String {
    "Observed".to_string()
}

fn default_legend_cal() -> String {
    "Calculated".to_string()
}

fn default_legend_pos() -> String {
    "Reflections".to_string()
}

fn default_legend_dif() -> String {
    "Difference".to_string()
}

fn default_x_label() -> String {
    "2θ / °".to_string()
}

fn default_y_label() -> String {
    "Intensity / arb. units".to_string()
}

fn default_font_size() -> f64 {
    12.0
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            legend_text_exp: default_legend_exp(),
            legend_text_cal: default_legend_cal(),
            legend_text_pos: default_legend_pos(),
            legend_text_dif: default_legend_dif(),
            x_label: default_x_label(),
            y_label: default_y_label(),
            size_axis_labels: default_font_size(),
            size_legend_labels: default_font_size(),
            size_tick_labels: default_font_size(),
            size_multiply_label: default_font_size(),
        }
    }
}

/// X axis ticks and the boundary lines of multiplication ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Spacing of the major 2θ ticks in degrees
    #[serde(default = "default_x_step_width")]
    pub x_step_width: f64,

    /// Extra room left and right of the data in degrees
    #[serde(default)]
    pub x_axis_tolerance: f64,

    /// Boundary line style: "-" (solid), "da" (dashed) or "do" (dotted)
    #[serde(default = "default_vline_style")]
    pub vline_style: String,

    /// Boundary line width in points
    #[serde(default = "default_vline_strength")]
    pub vline_strength: f64,
}

fn default_x_step_width() -> f64 {
    10.0
}

fn default_vline_style() -> String {
    "-".to_string()
}

fn default_vline_strength() -> f64 {
    0.6
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            x_step_width: default_x_step_width(),
            x_axis_tolerance: 0.0,
            vline_style: default_vline_style(),
            vline_strength: default_vline_strength(),
        }
    }
}

/// Figure size, resolution and file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Figure size as [width, height] in inches
    #[serde(default = "default_plot_size")]
    pub plot_size: [f64; 2],

    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Image file extension used in silent mode
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Directory for rendered images and exported data
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_plot_size() -> [f64; 2] {
    [6.0, 4.0]
}

fn default_dpi() -> u32 {
    600
}

fn default_extension() -> String {
    "svg".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plot_size: default_plot_size(),
            dpi: default_dpi(),
            extension: default_extension(),
            output_dir: default_output_dir(),
        }
    }
}

/// Main plot configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default)]
    pub series: SeriesConfig,

    #[serde(default)]
    pub labels: LabelConfig,

    #[serde(default)]
    pub axis: AxisConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Multiplication ranges as "start,end,factor" strings
    #[serde(default)]
    pub multiply: Vec<String>,
}

impl PlotConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PlotConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
