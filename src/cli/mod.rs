//! Command-line interface for the Pawley fit plotter.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tempfile::TempDir;

use crate::config::PlotConfig;
use crate::core::loaders::{Role, SampleDataset};
use crate::core::writers::{export_path, write_dataset_csv};
use crate::processors::grouping::{discover, FileGroup, InputSource, AUTOBATCH};
use crate::processors::layout::HeightRatios;
use crate::processors::multiply::{parse_ranges, scaled, MultiplicationRange};
use crate::visualization::{output_path, render_to_file, ImageFormat, PlotStyle};

/// Resolution of the on-screen preview image.
const PREVIEW_DPI: u32 = 150;

#[derive(Parser, Debug)]
#[command(name = "pawley-plot")]
#[command(
    about = "Plot Pawley refinement fits: observed and calculated intensities, reflection positions and difference",
    version
)]
pub struct Cli {
    /// Fit output files or directories, or AUTOBATCH to scan the working directory
    #[arg(short, long, num_args = 1.., default_value = AUTOBATCH)]
    input: Vec<String>,

    /// Save plots to files instead of opening a preview
    #[arg(short, long)]
    silent: bool,

    /// Multiply intensities in a 2θ range: "START,END,FACTOR" (repeatable, empty bounds allowed)
    #[arg(short = 'm', long = "multi-range", action = ArgAction::Append, allow_hyphen_values = true)]
    multi_range: Vec<String>,

    /// Path to YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print the discovered sample groups and exit
    #[arg(long)]
    list: bool,

    /// Write the effective configuration to a YAML file and exit
    #[arg(long, value_name = "PATH")]
    dump_config: Option<PathBuf>,

    /// Also write the scaled data of every sample as CSV
    #[arg(long)]
    export_data: bool,

    /// Directory for saved plots and exported data
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(flatten)]
    style: StyleArgs,
}

/// Overrides for the plot configuration.
#[derive(Args, Debug, Default)]
pub struct StyleArgs {
    /// Color of the observed intensities
    #[arg(long)]
    color_exp: Option<String>,
    /// Color of the calculated intensities
    #[arg(long)]
    color_cal: Option<String>,
    /// Color of the reflection positions
    #[arg(long)]
    color_pos: Option<String>,
    /// Color of the difference curve
    #[arg(long)]
    color_dif: Option<String>,
    /// Size of the observed markers in points
    #[arg(long)]
    marker_exp_size: Option<f64>,
    /// Area of the reflection markers in points squared
    #[arg(long)]
    marker_pos_size: Option<f64>,
    /// Observed draw style: x, - or x-
    #[arg(long, allow_hyphen_values = true)]
    exp_style: Option<String>,
    /// Figure size in inches
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
    plot_size: Option<Vec<f64>>,
    /// Image resolution in dots per inch
    #[arg(long)]
    dpi: Option<u32>,
    /// Image format: svg, png, bmp or jpg
    #[arg(long)]
    extension: Option<String>,
    /// Legend text of the observed intensities
    #[arg(long)]
    legend_text_exp: Option<String>,
    /// Legend text of the calculated intensities
    #[arg(long)]
    legend_text_cal: Option<String>,
    /// Legend text of the reflection positions
    #[arg(long)]
    legend_text_pos: Option<String>,
    /// Legend text of the difference curve
    #[arg(long)]
    legend_text_dif: Option<String>,
    /// Font size of the axis labels in points
    #[arg(long)]
    size_axis_labels: Option<f64>,
    /// Font size of the legend in points
    #[arg(long)]
    size_legend_labels: Option<f64>,
    /// Font size of the tick labels in points
    #[arg(long)]
    size_tick_labels: Option<f64>,
    /// Font size of the multiplication factor labels in points
    #[arg(long)]
    size_multiply_label: Option<f64>,
    /// Text of the x axis label
    #[arg(long)]
    x_label: Option<String>,
    /// Text of the y axis label
    #[arg(long)]
    y_label: Option<String>,
    /// Step width of the x axis ticks in degrees
    #[arg(long)]
    x_step_width: Option<f64>,
    /// Extra x axis range on both sides in degrees
    #[arg(long)]
    x_axis_tolerance: Option<f64>,
    /// Line style of the range boundaries: -, da or do
    #[arg(long, allow_hyphen_values = true)]
    vline_style: Option<String>,
    /// Line width of the range boundaries in points
    #[arg(long)]
    vline_strength: Option<f64>,
}

fn set<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

impl StyleArgs {
    /// Overwrite every config value that was given on the command line.
    pub fn apply(&self, config: &mut PlotConfig) {
        let series = &mut config.series;
        set(&mut series.color_exp, &self.color_exp);
        set(&mut series.color_cal, &self.color_cal);
        set(&mut series.color_pos, &self.color_pos);
        set(&mut series.color_dif, &self.color_dif);
        set(&mut series.marker_exp_size, &self.marker_exp_size);
        set(&mut series.marker_pos_size, &self.marker_pos_size);
        set(&mut series.exp_style, &self.exp_style);

        let labels = &mut config.labels;
        set(&mut labels.legend_text_exp, &self.legend_text_exp);
        set(&mut labels.legend_text_cal, &self.legend_text_cal);
        set(&mut labels.legend_text_pos, &self.legend_text_pos);
        set(&mut labels.legend_text_dif, &self.legend_text_dif);
        set(&mut labels.size_axis_labels, &self.size_axis_labels);
        set(&mut labels.size_legend_labels, &self.size_legend_labels);
        set(&mut labels.size_tick_labels, &self.size_tick_labels);
        set(&mut labels.size_multiply_label, &self.size_multiply_label);
        set(&mut labels.x_label, &self.x_label);
        set(&mut labels.y_label, &self.y_label);

        let axis = &mut config.axis;
        set(&mut axis.x_step_width, &self.x_step_width);
        set(&mut axis.x_axis_tolerance, &self.x_axis_tolerance);
        set(&mut axis.vline_style, &self.vline_style);
        set(&mut axis.vline_strength, &self.vline_strength);

        let output = &mut config.output;
        if let Some([width, height]) = self.plot_size.as_deref() {
            output.plot_size = [*width, *height];
        }
        set(&mut output.dpi, &self.dpi);
        set(&mut output.extension, &self.extension);
    }
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar over the sample groups
fn create_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    if let Err(e) = execute(&cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn effective_config(cli: &Cli) -> Result<PlotConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = PlotConfig::from_yaml(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            info!("Loaded config from: {}", path.display());
            config
        }
        None => PlotConfig::default(),
    };

    cli.style.apply(&mut config);
    if !cli.multi_range.is_empty() {
        config.multiply = cli.multi_range.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output.output_dir = dir.clone();
    }

    Ok(config)
}

/// Everything a batch run needs, resolved once before the first sample.
struct PlotJob {
    ranges: Vec<MultiplicationRange>,
    style: PlotStyle,
    preview_style: PlotStyle,
    format: ImageFormat,
    extension: String,
    output_dir: PathBuf,
    silent: bool,
    export_data: bool,
}

impl PlotJob {
    fn new(cli: &Cli, config: &PlotConfig) -> Result<Self> {
        let ranges = parse_ranges(&config.multiply).context("Invalid multiplication range")?;
        let style = PlotStyle::from_config(config).context("Invalid plot style")?;
        let format = ImageFormat::from_extension(&config.output.extension)?;

        let mut preview_config = config.clone();
        preview_config.output.dpi = preview_config.output.dpi.min(PREVIEW_DPI);
        let preview_style = PlotStyle::from_config(&preview_config)?;

        Ok(Self {
            ranges,
            style,
            preview_style,
            format,
            extension: config.output.extension.to_ascii_lowercase(),
            output_dir: config.output.output_dir.clone(),
            silent: cli.silent,
            export_data: cli.export_data,
        })
    }

    /// Load, scale, lay out and render one sample.
    ///
    /// Returns the path of the saved plot in silent mode.
    fn plot_group(&self, group: &FileGroup) -> Result<Option<PathBuf>> {
        let name = group.name();
        let dataset = group
            .load()
            .with_context(|| format!("Failed to load sample '{}'", name))?;
        let dataset = scaled(&dataset, &self.ranges);
        let ratios = HeightRatios::from_dataset(&dataset)
            .with_context(|| format!("Cannot compute panel heights for sample '{}'", name))?;
        debug!(
            "Panel heights for '{}': overlay {:.3}, positions {:.3}, difference {:.3}",
            name, ratios.overlay, ratios.position, ratios.difference
        );

        if self.export_data {
            let path = export_path(&self.output_dir, name);
            write_dataset_csv(&path, &dataset)?;
            info!("Exported scaled data to {}", path.display());
        }

        if self.silent {
            std::fs::create_dir_all(&self.output_dir).with_context(|| {
                format!("Failed to create output directory {}", self.output_dir.display())
            })?;
            let path = output_path(&self.output_dir, name, &self.extension);
            render_to_file(&path, self.format, &dataset, &self.ranges, &ratios, &self.style)
                .with_context(|| format!("Failed to render {}", path.display()))?;
            info!("Saved plot {}", path.display());
            return Ok(Some(path));
        }

        let (preview_dir, path) = self.render_preview(&dataset, &ratios)?;
        show_preview(&path, name)?;
        drop(preview_dir);

        Ok(None)
    }

    /// Render a PNG preview into a fresh temporary directory.
    ///
    /// The directory and the image are removed when the returned guard drops.
    fn render_preview(
        &self,
        dataset: &SampleDataset,
        ratios: &HeightRatios,
    ) -> Result<(TempDir, PathBuf)> {
        let preview_dir = tempfile::Builder::new()
            .prefix("pawley-plot-")
            .tempdir()
            .context("Failed to create preview directory")?;
        let path = output_path(preview_dir.path(), &dataset.name, "png");
        render_to_file(
            &path,
            ImageFormat::Bitmap,
            dataset,
            &self.ranges,
            ratios,
            &self.preview_style,
        )
        .with_context(|| format!("Failed to render preview {}", path.display()))?;

        Ok((preview_dir, path))
    }
}

/// Open an image with the platform viewer and block until Enter is pressed.
fn show_preview(path: &Path, sample: &str) -> Result<()> {
    if let Err(e) = viewer_command(path).spawn() {
        warn!("Could not open a viewer ({}), preview saved to {}", e, path.display());
    }

    print!("Showing '{}' ({}), press Enter to continue...", sample, path.display());
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    Ok(())
}

#[cfg(target_os = "macos")]
fn viewer_command(path: &Path) -> Command {
    let mut command = Command::new("open");
    command.arg(path);
    command
}

#[cfg(target_os = "windows")]
fn viewer_command(path: &Path) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", ""]).arg(path);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn viewer_command(path: &Path) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(path);
    command
}

fn print_groups(groups: &BTreeMap<String, FileGroup>) {
    for group in groups.values() {
        println!("{}", group.name());
        for role in Role::ALL {
            if let Some(path) = group.path(role) {
                println!("  {:<4} {}", role.key(), path.display());
            }
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let start = Instant::now();
    let config = effective_config(cli)?;

    if let Some(path) = &cli.dump_config {
        config
            .to_yaml(path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let job = PlotJob::new(cli, &config)?;

    let source = InputSource::from_args(&cli.input);
    let spinner = create_spinner("Scanning for Pawley fit files...");
    let groups = discover(&source);
    spinner.finish_and_clear();
    let groups = groups.context("Input discovery failed")?;

    if groups.is_empty() {
        warn!("No Pawley fit files found");
        return Ok(());
    }

    if cli.list {
        print_groups(&groups);
        return Ok(());
    }

    let pb = if cli.silent {
        create_progress_bar(groups.len())
    } else {
        ProgressBar::hidden()
    };

    let mut saved = Vec::new();
    for group in groups.values() {
        pb.set_message(group.name().to_string());
        match job.plot_group(group) {
            Ok(path) => saved.extend(path),
            Err(e) => {
                pb.finish_and_clear();
                return Err(e);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if cli.silent {
        print_summary(
            "Pawley Plots Complete",
            &[
                ("Samples", groups.len().to_string()),
                ("Plots saved", saved.len().to_string()),
                ("Output directory", job.output_dir.display().to_string()),
                ("Format", job.extension.clone()),
                ("Ranges", job.ranges.len().to_string()),
                ("Data exported", job.export_data.to_string()),
                ("Duration", format!("{:.2?}", start.elapsed())),
            ],
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::Series;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pawley-plot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.input, vec![AUTOBATCH.to_string()]);
        assert!(!cli.silent);
        assert!(cli.multi_range.is_empty());
        assert_eq!(InputSource::from_args(&cli.input), InputSource::AutoBatch);
    }

    #[test]
    fn test_multiple_inputs() {
        let cli = parse(&["-i", "a_pawley_01_X_Yobs.txt", "data/", "-s"]);
        assert_eq!(cli.input.len(), 2);
        assert!(cli.silent);
    }

    #[test]
    fn test_repeated_ranges() {
        let cli = parse(&["-m", "10,20,2", "-m", ",5,3", "--multi-range", "-5,0,4"]);
        assert_eq!(cli.multi_range, vec!["10,20,2", ",5,3", "-5,0,4"]);
    }

    #[test]
    fn test_verbosity_count() {
        assert_eq!(parse(&["-vv"]).verbose, 2);
    }

    #[test]
    fn test_style_overrides_applied() {
        let cli = parse(&[
            "--color-exp",
            "#112233",
            "--plot-size",
            "8",
            "5",
            "--dpi",
            "300",
            "--extension",
            "png",
            "--vline-style",
            "da",
            "--exp-style",
            "x-",
            "--size-tick-labels",
            "9",
        ]);
        let mut config = PlotConfig::default();
        cli.style.apply(&mut config);

        assert_eq!(config.series.color_exp, "#112233");
        assert_eq!(config.series.exp_style, "x-");
        assert_eq!(config.output.plot_size, [8.0, 5.0]);
        assert_eq!(config.output.dpi, 300);
        assert_eq!(config.output.extension, "png");
        assert_eq!(config.axis.vline_style, "da");
        assert_eq!(config.labels.size_tick_labels, 9.0);
        // Untouched values keep their defaults
        assert_eq!(config.series.color_cal, PlotConfig::default().series.color_cal);
    }

    #[test]
    fn test_effective_config_merges_file_and_flags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plot.yaml");

        let mut file_config = PlotConfig::default();
        file_config.output.dpi = 200;
        file_config.series.color_dif = "m".to_string();
        file_config.multiply = vec!["30,40,5".to_string()];
        file_config.to_yaml(&path).unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let cli = parse(&["-c", &path_arg, "--color-dif", "c", "--output-dir", "plots"]);
        let config = effective_config(&cli).unwrap();

        assert_eq!(config.output.dpi, 200);
        assert_eq!(config.series.color_dif, "c");
        assert_eq!(config.multiply, vec!["30,40,5"]);
        assert_eq!(config.output.output_dir, PathBuf::from("plots"));

        let cli = parse(&["-c", &path_arg, "-m", "10,20,2"]);
        let config = effective_config(&cli).unwrap();
        assert_eq!(config.multiply, vec!["10,20,2"]);
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let cli = parse(&["-c", "/nonexistent/plot.yaml"]);
        assert!(effective_config(&cli).is_err());
    }

    #[test]
    fn test_job_rejects_bad_range() {
        let cli = parse(&["-m", "20,10,2"]);
        let config = effective_config(&cli).unwrap();
        assert!(PlotJob::new(&cli, &config).is_err());
    }

    #[test]
    fn test_job_caps_preview_resolution() {
        let cli = parse(&["--dpi", "600", "--extension", "SVG"]);
        let config = effective_config(&cli).unwrap();
        let job = PlotJob::new(&cli, &config).unwrap();

        assert_eq!(job.format, ImageFormat::Svg);
        assert_eq!(job.extension, "svg");
        assert_eq!(job.style.figure_size(), (3600, 2400));
        assert_eq!(job.preview_style.figure_size(), (900, 600));
    }

    #[test]
    fn test_preview_removed_with_guard() {
        let cli = parse(&["--dpi", "72"]);
        let config = effective_config(&cli).unwrap();
        let job = PlotJob::new(&cli, &config).unwrap();

        let angles: Vec<f64> = (0..200).map(|i| 10.0 + i as f64 * 0.1).collect();
        let observed: Vec<f64> = angles.iter().map(|a| 100.0 + 50.0 * (a * 2.0).sin()).collect();
        let calculated: Vec<f64> = observed.iter().map(|v| v + 1.0).collect();
        let difference: Vec<f64> = vec![-1.0; angles.len()];
        let dataset = SampleDataset {
            name: "quartz".to_string(),
            exp: Series::new(angles.clone(), observed),
            cal: Series::new(angles.clone(), calculated),
            pos: Series::new(vec![15.0, 25.0], vec![0.0, 0.0]),
            dif: Series::new(angles, difference),
        };
        let ratios = HeightRatios::from_dataset(&dataset).unwrap();

        let (guard, path) = job.render_preview(&dataset, &ratios).unwrap();
        assert_eq!(path.file_name().unwrap(), "quartz.png");
        assert!(std::fs::metadata(&path).unwrap().len() > 0);

        drop(guard);
        assert!(!path.exists());
    }
}
