//! Plotting of Pawley refinement results.
//!
//! This crate provides tools for:
//! - Grouping the four fit output files of each sample (observed, calculated,
//!   reflection positions, difference)
//! - Scaling intensities inside 2θ ranges to bring out weak reflections
//! - Sizing the stacked panels so overlay and difference share one scale
//! - Rendering the fit plot to SVG or bitmap images
//!
//! # Example
//!
//! ```no_run
//! use pawley_plot::processors::grouping::{discover, InputSource};
//! use pawley_plot::processors::layout::HeightRatios;
//! use pawley_plot::processors::multiply::{parse_ranges, scaled};
//!
//! let ranges = parse_ranges(&["40,,5"]).unwrap();
//! for group in discover(&InputSource::AutoBatch).unwrap().values() {
//!     let dataset = scaled(&group.load().unwrap(), &ranges);
//!     let ratios = HeightRatios::from_dataset(&dataset).unwrap();
//!     println!("{}: {:?}", group.name(), ratios);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{AxisConfig, LabelConfig, OutputConfig, PlotConfig, SeriesConfig};
pub use core::loaders::{Role, SampleDataset, Series};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
