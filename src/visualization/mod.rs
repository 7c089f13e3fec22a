//! Rendering of Pawley fit plots.
//!
//! A plot is three stacked panels sharing the 2θ axis: observed and
//! calculated intensities on top, reflection position ticks in the middle
//! and the difference curve at the bottom. Panel heights follow
//! [`HeightRatios`] so the overlay and difference curves use the same
//! intensity scale.

pub mod axis;
pub mod style;

use std::path::{Path, PathBuf};

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::loaders::{extent, SampleDataset};
use crate::processors::layout::HeightRatios;
use crate::processors::multiply::MultiplicationRange;

pub use axis::SteppedAxis;
pub use style::{parse_color, ExpStyle, ImageFormat, LineStyle, PlotStyle};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Invalid line style: {0} (use -, da or do)")]
    InvalidLineStyle(String),

    #[error("Invalid observed style: {0} (use x, - or x-)")]
    InvalidExpStyle(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

type FitChart<'a, DB> = ChartContext<'a, DB, Cartesian2d<SteppedAxis, RangedCoordf64>>;

/// Length of labelled 2θ ticks in points.
const MAJOR_TICK_POINTS: f64 = 3.5;

/// Length of unlabelled 2θ ticks in points.
const MINOR_TICK_POINTS: f64 = 2.0;

/// Relative padding above and below each curve.
const Y_PADDING: f64 = 0.05;

/// Half height of the reflection panel in data units.
const POSITION_HALF_RANGE: f64 = 1.0;

fn plot_err<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Output file for a sample: `<dir>/<sample>.<extension>`.
pub fn output_path(dir: &Path, sample: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", sample, extension))
}

/// Padded plotting range for a set of values.
fn padded_range(bounds: (f64, f64)) -> (f64, f64) {
    let (lo, hi) = bounds;
    let pad = (hi - lo).abs() * Y_PADDING;
    if pad == 0.0 {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo - pad, hi + pad)
    }
}

/// Render a fit plot to an image file, choosing the backend from the format.
pub fn render_to_file(
    path: &Path,
    format: ImageFormat,
    dataset: &SampleDataset,
    ranges: &[MultiplicationRange],
    ratios: &HeightRatios,
    style: &PlotStyle,
) -> Result<()> {
    let size = style.figure_size();

    match format {
        ImageFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_fit_plot(root, dataset, ranges, ratios, style)
        }
        ImageFormat::Bitmap => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_fit_plot(root, dataset, ranges, ratios, style)
        }
    }
}

/// Draw the three-panel fit plot onto a drawing area.
pub fn draw_fit_plot<DB>(
    root: DrawingArea<DB, Shift>,
    dataset: &SampleDataset,
    ranges: &[MultiplicationRange],
    ratios: &HeightRatios,
    style: &PlotStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (angle_lo, angle_hi) = dataset
        .overlay_angle_extent()
        .ok_or_else(|| VisualizationError::EmptyDataset(dataset.name.clone()))?;
    let tolerance = style.axis().x_axis_tolerance;
    let (x_lo, x_hi) = match (angle_lo - tolerance, angle_hi + tolerance) {
        (lo, hi) if hi > lo => (lo, hi),
        _ => (angle_lo - 1.0, angle_hi + 1.0),
    };

    let overlay_y = padded_range(
        dataset
            .overlay_intensity_extent()
            .ok_or_else(|| VisualizationError::EmptyDataset(dataset.name.clone()))?,
    );
    let difference_y = padded_range(
        extent(&dataset.dif.intensity)
            .ok_or_else(|| VisualizationError::EmptyDataset(dataset.name.clone()))?,
    );
    let position_y = (-POSITION_HALF_RANGE, POSITION_HALF_RANGE);
    let x_axis = SteppedAxis::new(x_lo, x_hi, style.axis().x_step_width);

    root.fill(&WHITE).map_err(plot_err)?;

    let (width, height) = root.dim_in_pixel();
    let axis_font = style.px_f(style.labels().size_axis_labels);
    let tick_font = style.px_f(style.labels().size_tick_labels);

    // Left strip for the rotated intensity label, bottom room for the 2θ axis.
    let strip_width = ((axis_font * 1.8).round() as u32).min(width / 4);
    let x_axis_height = (tick_font * 1.6 + axis_font * 1.8).round() as u32;
    let top_margin = style.px(6.0) as i32;
    let right_margin = style.px(12.0) as i32;

    let (label_strip, plot_area) = root.split_horizontally(strip_width as i32);
    let plot_area = plot_area.margin(top_margin, 0, 0, right_margin);
    let (_, plot_height) = plot_area.dim_in_pixel();
    let available = plot_height.saturating_sub(x_axis_height);
    let (overlay_height, position_height, _) = ratios.split_pixels(available);

    let (overlay_area, rest) = plot_area.split_vertically(overlay_height as i32);
    let (position_area, difference_area) = rest.split_vertically(position_height as i32);

    let y_label_style = TextStyle::from((FontFamily::SansSerif, axis_font).into_font())
        .transform(FontTransform::Rotate270)
        .pos(Pos::new(HPos::Center, VPos::Center));
    label_strip
        .draw_text(
            &style.labels().y_label,
            &y_label_style,
            ((strip_width / 2) as i32, (height / 2) as i32),
        )
        .map_err(plot_err)?;

    // Overlay panel
    let mut overlay = ChartBuilder::on(&overlay_area)
        .x_label_area_size(0)
        .y_label_area_size(0)
        .build_cartesian_2d(x_axis.clone(), overlay_y.0..overlay_y.1)
        .map_err(plot_err)?;
    draw_overlay_series(&mut overlay, dataset, style, position_height)?;
    draw_frame(&mut overlay, (x_lo, x_hi), overlay_y, true, style)?;
    draw_range_markers(&mut overlay, ranges, (x_lo, x_hi), overlay_y, style)?;
    draw_factor_labels(&mut overlay, ranges, (x_lo, x_hi), overlay_y, style)?;

    overlay
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .margin(style.px(4.0) as i32)
        .legend_area_size(style.px(18.0) as i32)
        .label_font((FontFamily::SansSerif, style.px_f(style.labels().size_legend_labels)))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    // Reflection panel
    let mut positions = ChartBuilder::on(&position_area)
        .x_label_area_size(0)
        .y_label_area_size(0)
        .build_cartesian_2d(x_axis.clone(), position_y.0..position_y.1)
        .map_err(plot_err)?;
    draw_reflection_ticks(&mut positions, dataset, (x_lo, x_hi), position_height, style)?;
    draw_frame(&mut positions, (x_lo, x_hi), position_y, false, style)?;
    draw_range_markers(&mut positions, ranges, (x_lo, x_hi), position_y, style)?;

    // Difference panel, carries the 2θ axis
    let mut difference = ChartBuilder::on(&difference_area)
        .x_label_area_size(x_axis_height as i32)
        .y_label_area_size(0)
        .build_cartesian_2d(x_axis.clone(), difference_y.0..difference_y.1)
        .map_err(plot_err)?;

    // Major ticks and labels come from the axis key points.
    difference
        .configure_mesh()
        .disable_mesh()
        .x_labels(x_axis.major().len().max(2))
        .y_labels(0)
        .set_tick_mark_size(LabelAreaPosition::Bottom, style.px(MAJOR_TICK_POINTS) as i32)
        .x_desc(style.labels().x_label.as_str())
        .axis_desc_style((FontFamily::SansSerif, axis_font))
        .label_style((FontFamily::SansSerif, tick_font))
        .axis_style(BLACK.stroke_width(style.px(0.8)))
        .draw()
        .map_err(plot_err)?;

    difference
        .draw_series(LineSeries::new(
            dataset.dif.points(),
            style.color_dif.stroke_width(style.px(style.series().thin_line_width)),
        ))
        .map_err(plot_err)?;
    draw_frame(&mut difference, (x_lo, x_hi), difference_y, false, style)?;
    draw_range_markers(&mut difference, ranges, (x_lo, x_hi), difference_y, style)?;
    draw_minor_ticks(&difference_area, &difference, &x_axis, difference_y.0, style)?;

    root.present().map_err(plot_err)?;

    Ok(())
}

/// Observed and calculated curves plus legend entries for all four series.
fn draw_overlay_series<DB>(
    chart: &mut FitChart<'_, DB>,
    dataset: &SampleDataset,
    style: &PlotStyle,
    position_height: u32,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let labels = style.labels();
    let series = style.series();
    let thin = style.px(series.thin_line_width);
    let marker = style.px(series.marker_exp_size / 2.0) as i32;
    let legend_marker = style.px(4.0) as i32;
    let legend_width = style.px(16.0) as i32;
    let legend_stroke = style.px(1.5);

    let exp_color = style.color_exp;
    let cal_color = style.color_cal;
    let pos_color = style.color_pos;
    let dif_color = style.color_dif;

    if style.exp_style.draws_line() {
        let anno = chart
            .draw_series(LineSeries::new(
                dataset.exp.points(),
                exp_color.stroke_width(thin),
            ))
            .map_err(plot_err)?;
        if !style.exp_style.draws_markers() {
            anno.label(labels.legend_text_exp.as_str()).legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + legend_width, y)], exp_color.stroke_width(legend_stroke))
            });
        }
    }

    if style.exp_style.draws_markers() {
        chart
            .draw_series(
                dataset
                    .exp
                    .points()
                    .map(|point| Cross::new(point, marker, exp_color.stroke_width(thin))),
            )
            .map_err(plot_err)?
            .label(labels.legend_text_exp.as_str())
            .legend(move |(x, y)| {
                Cross::new((x + legend_width / 2, y), legend_marker, exp_color.stroke_width(legend_stroke))
            });
    }

    chart
        .draw_series(LineSeries::new(
            dataset.cal.points(),
            cal_color.stroke_width(style.px(series.cal_line_width)),
        ))
        .map_err(plot_err)?
        .label(labels.legend_text_cal.as_str())
        .legend(move |(x, y)| {
            PathElement::new(vec![(x, y), (x + legend_width, y)], cal_color.stroke_width(legend_stroke))
        });

    // Reflections and difference live in other panels; register legend entries only.
    let tick_half = (style.tick_length_px().min(position_height) / 2).max(1) as i32;
    chart
        .draw_series(std::iter::empty::<PathElement<(f64, f64)>>())
        .map_err(plot_err)?
        .label(labels.legend_text_pos.as_str())
        .legend(move |(x, y)| {
            let center = x + legend_width / 2;
            PathElement::new(
                vec![(center, y - tick_half), (center, y + tick_half)],
                pos_color.stroke_width(legend_stroke),
            )
        });
    chart
        .draw_series(std::iter::empty::<PathElement<(f64, f64)>>())
        .map_err(plot_err)?
        .label(labels.legend_text_dif.as_str())
        .legend(move |(x, y)| {
            PathElement::new(vec![(x, y), (x + legend_width, y)], dif_color.stroke_width(legend_stroke))
        });

    Ok(())
}

/// Vertical tick at every reflection position inside the x range.
fn draw_reflection_ticks<DB>(
    chart: &mut FitChart<'_, DB>,
    dataset: &SampleDataset,
    x_range: (f64, f64),
    panel_height: u32,
    style: &PlotStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if panel_height == 0 {
        return Ok(());
    }

    // Panel spans 2 * POSITION_HALF_RANGE data units over panel_height pixels.
    let half = (style.tick_length_px() as f64 / panel_height as f64 * POSITION_HALF_RANGE)
        .min(0.9 * POSITION_HALF_RANGE);
    let color = style.color_pos;
    let width = style.px(0.5);

    chart
        .draw_series(
            dataset
                .pos
                .points()
                .filter(|(x, _)| *x >= x_range.0 && *x <= x_range.1)
                .map(move |(x, y)| PathElement::new(vec![(x, y - half), (x, y + half)], color.stroke_width(width))),
        )
        .map_err(plot_err)?;

    Ok(())
}

/// Unlabelled ticks between the major 2θ ticks, below the difference panel.
///
/// They sit in the label area outside the chart's clip region, so they are
/// drawn on the panel's drawing area in pixel coordinates.
fn draw_minor_ticks<DB>(
    area: &DrawingArea<DB, Shift>,
    chart: &FitChart<'_, DB>,
    x_axis: &SteppedAxis,
    y_bottom: f64,
    style: &PlotStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (base_x, base_y) = area.get_base_pixel();
    let length = style.px(MINOR_TICK_POINTS) as i32;
    let tick_style = BLACK.stroke_width(style.px(0.6));

    for x in x_axis.minor() {
        let (px, py) = chart.backend_coord(&(x, y_bottom));
        let (px, py) = (px - base_x, py - base_y);
        area.draw(&PathElement::new(vec![(px, py), (px, py + length)], tick_style))
            .map_err(plot_err)?;
    }

    Ok(())
}

/// Side edges of a panel, plus the top edge for the uppermost one.
///
/// Edges shared between stacked panels are left open; the bottom edge of
/// the figure is the 2θ axis itself.
fn draw_frame<DB>(
    chart: &mut FitChart<'_, DB>,
    x_range: (f64, f64),
    y_range: (f64, f64),
    top: bool,
    style: &PlotStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (x_lo, x_hi) = x_range;
    let (y_lo, y_hi) = y_range;

    let mut edges = vec![
        vec![(x_lo, y_lo), (x_lo, y_hi)],
        vec![(x_hi, y_lo), (x_hi, y_hi)],
    ];
    if top {
        edges.push(vec![(x_lo, y_hi), (x_hi, y_hi)]);
    }

    let width = style.px(0.8);
    chart
        .draw_series(
            edges
                .into_iter()
                .map(|edge| PathElement::new(edge, BLACK.stroke_width(width))),
        )
        .map_err(plot_err)?;

    Ok(())
}

/// Boundary lines at the start and end of every multiplication range.
fn draw_range_markers<DB>(
    chart: &mut FitChart<'_, DB>,
    ranges: &[MultiplicationRange],
    x_range: (f64, f64),
    y_range: (f64, f64),
    style: &PlotStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let width = style.px(style.axis().vline_strength);
    let segments = style.vline_style.segments(y_range.0, y_range.1);

    let boundaries: Vec<f64> = ranges
        .iter()
        .flat_map(|range| [range.start, range.end])
        .filter(|x| *x > x_range.0 && *x < x_range.1)
        .collect();

    chart
        .draw_series(boundaries.iter().flat_map(|&x| {
            segments
                .iter()
                .map(move |&(lo, hi)| PathElement::new(vec![(x, lo), (x, hi)], BLACK.stroke_width(width)))
        }))
        .map_err(plot_err)?;

    Ok(())
}

/// `x<factor>` annotation near the top of the overlay panel for every range.
fn draw_factor_labels<DB>(
    chart: &mut FitChart<'_, DB>,
    ranges: &[MultiplicationRange],
    x_range: (f64, f64),
    y_range: (f64, f64),
    style: &PlotStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_span = x_range.1 - x_range.0;
    let y = y_range.1 - (y_range.1 - y_range.0) * 0.03;
    let font = TextStyle::from(
        (
            FontFamily::SansSerif,
            style.px_f(style.labels().size_multiply_label),
        )
            .into_font(),
    )
    .pos(Pos::new(HPos::Left, VPos::Top));

    chart
        .draw_series(
            ranges
                .iter()
                .filter(|range| range.start < x_range.1 && range.end > x_range.0)
                .map(|range| {
                    let x = range.start.max(x_range.0) + x_span * 0.01;
                    Text::new(format!("x {}", range.factor), (x, y), font.clone())
                }),
        )
        .map_err(plot_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlotConfig;
    use crate::core::loaders::Series;
    use crate::processors::multiply::{parse_ranges, scaled};
    use tempfile::TempDir;

    fn fit_dataset() -> SampleDataset {
        let angles: Vec<f64> = (0..600).map(|i| 10.0 + i as f64 * 0.1).collect();
        let peak = |a: f64, center: f64| 400.0 * (-((a - center) / 0.3).powi(2)).exp();
        let calculated: Vec<f64> = angles
            .iter()
            .map(|&a| 50.0 + peak(a, 21.0) + peak(a, 33.5) + 0.2 * peak(a, 52.0))
            .collect();
        let observed: Vec<f64> = calculated
            .iter()
            .enumerate()
            .map(|(i, v)| v + if i % 2 == 0 { 3.0 } else { -3.0 })
            .collect();
        let difference: Vec<f64> = observed.iter().zip(&calculated).map(|(o, c)| o - c).collect();

        SampleDataset {
            name: "quartz".to_string(),
            exp: Series::new(angles.clone(), observed),
            cal: Series::new(angles.clone(), calculated),
            pos: Series::new(vec![21.0, 33.5, 52.0], vec![0.0; 3]),
            dif: Series::new(angles, difference),
        }
    }

    fn render(format: ImageFormat, extension: &str) -> (TempDir, PathBuf) {
        let mut config = PlotConfig::default();
        config.output.dpi = 100;
        config.series.exp_style = "x-".to_string();
        config.axis.vline_style = "da".to_string();
        let style = PlotStyle::from_config(&config).unwrap();

        let ranges = parse_ranges(&["40,50,2"]).unwrap();
        let dataset = scaled(&fit_dataset(), &ranges);
        let ratios = HeightRatios::from_dataset(&dataset).unwrap();

        let dir = TempDir::new().unwrap();
        let path = output_path(dir.path(), &dataset.name, extension);
        render_to_file(&path, format, &dataset, &ranges, &ratios, &style).unwrap();
        (dir, path)
    }

    #[test]
    fn test_render_svg() {
        let (_dir, path) = render(ImageFormat::Svg, "svg");

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(!svg.is_empty());
        assert!(svg.contains("<svg"));
        assert!(svg.contains("x 2"));
        assert!(svg.contains(&PlotConfig::default().labels.legend_text_cal));
    }

    #[test]
    fn test_svg_tick_labels_at_step_multiples() {
        let (_dir, path) = render(ImageFormat::Svg, "svg");

        let svg = std::fs::read_to_string(&path).unwrap();
        for label in ["20", "30", "40", "50", "60"] {
            assert!(svg.contains(&format!(">{}</text>", label)), "missing tick {}", label);
        }
        assert!(!svg.contains(">25</text>"));
    }

    #[test]
    fn test_render_png() {
        let (_dir, path) = render(ImageFormat::Bitmap, "png");

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.len() > 8);
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_render_empty_dataset_fails() {
        let style = PlotStyle::from_config(&PlotConfig::default()).unwrap();
        let dataset = SampleDataset {
            name: "empty".to_string(),
            exp: Series::default(),
            cal: Series::default(),
            pos: Series::default(),
            dif: Series::default(),
        };
        let ratios = HeightRatios {
            overlay: 7.0,
            position: 1.0,
            difference: 2.0,
        };

        let dir = TempDir::new().unwrap();
        let result = render_to_file(
            &dir.path().join("empty.svg"),
            ImageFormat::Svg,
            &dataset,
            &[],
            &ratios,
            &style,
        );
        assert!(matches!(result, Err(VisualizationError::EmptyDataset(_))));
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("plots"), "quartz", "svg"),
            Path::new("plots").join("quartz.svg")
        );
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range((0.0, 100.0)), (-5.0, 105.0));
        assert_eq!(padded_range((3.0, 3.0)), (2.0, 4.0));
    }
}
