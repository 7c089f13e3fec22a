//! Data loaders for TOPAS Pawley fit output files.
//!
//! Each output file holds two whitespace-separated numeric columns
//! (2θ angle, intensity) without a header. Four such files make up
//! one sample: observed, calculated, reflection positions and difference.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Parse error in {path} at line {line}: {message}")]
    ParseError {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("No {role} file in group '{sample}'")]
    MissingRole { sample: String, role: Role },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// The four data series written by a Pawley fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Observed intensities (`X_Yobs`)
    Observed,
    /// Calculated intensities (`Out_X_Ycalc`)
    Calculated,
    /// Reflection positions (`2Th_Ip`)
    Position,
    /// Observed minus calculated (`X_Difference`)
    Difference,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Observed,
        Role::Calculated,
        Role::Position,
        Role::Difference,
    ];

    /// Roles whose intensities are affected by range multiplication.
    pub const SCALED: [Role; 3] = [Role::Observed, Role::Calculated, Role::Difference];

    /// Short key used in logs and exported data.
    pub fn key(self) -> &'static str {
        match self {
            Role::Observed => "exp",
            Role::Calculated => "cal",
            Role::Position => "pos",
            Role::Difference => "dif",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Paired angle/intensity columns of one output file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    /// 2θ angles in degrees.
    pub angle: Vec<f64>,
    /// Intensities in arbitrary units.
    pub intensity: Vec<f64>,
}

impl Series {
    /// Creates a series from matching angle and intensity columns.
    pub fn new(angle: Vec<f64>, intensity: Vec<f64>) -> Self {
        debug_assert_eq!(angle.len(), intensity.len());
        Self { angle, intensity }
    }

    /// Creates an empty series with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            angle: Vec::with_capacity(capacity),
            intensity: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.angle.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.angle.is_empty()
    }

    #[inline]
    pub fn push(&mut self, angle: f64, intensity: f64) {
        self.angle.push(angle);
        self.intensity.push(intensity);
    }

    /// Iterates over `(angle, intensity)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.angle.iter().copied().zip(self.intensity.iter().copied())
    }

    /// Minimum and maximum angle, or `None` for an empty series.
    pub fn angle_extent(&self) -> Option<(f64, f64)> {
        extent(&self.angle)
    }

    /// Minimum and maximum intensity, or `None` for an empty series.
    pub fn intensity_extent(&self) -> Option<(f64, f64)> {
        extent(&self.intensity)
    }
}

/// Minimum and maximum of a slice.
pub fn extent(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Union of two optional extents.
pub fn merge_extents(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<(f64, f64)> {
    match (a, b) {
        (Some((a_lo, a_hi)), Some((b_lo, b_hi))) => Some((a_lo.min(b_lo), a_hi.max(b_hi))),
        (a, None) => a,
        (None, b) => b,
    }
}

/// All four series of one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDataset {
    /// Sample name, used for the output file name.
    pub name: String,
    pub exp: Series,
    pub cal: Series,
    /// Reflection positions; intensities are zero.
    pub pos: Series,
    pub dif: Series,
}

impl SampleDataset {
    pub fn series(&self, role: Role) -> &Series {
        match role {
            Role::Observed => &self.exp,
            Role::Calculated => &self.cal,
            Role::Position => &self.pos,
            Role::Difference => &self.dif,
        }
    }

    pub fn series_mut(&mut self, role: Role) -> &mut Series {
        match role {
            Role::Observed => &mut self.exp,
            Role::Calculated => &mut self.cal,
            Role::Position => &mut self.pos,
            Role::Difference => &mut self.dif,
        }
    }

    /// Angle extent shared by the observed and calculated curves.
    pub fn overlay_angle_extent(&self) -> Option<(f64, f64)> {
        merge_extents(self.exp.angle_extent(), self.cal.angle_extent())
    }

    /// Intensity extent of the observed and calculated curves together.
    pub fn overlay_intensity_extent(&self) -> Option<(f64, f64)> {
        merge_extents(self.exp.intensity_extent(), self.cal.intensity_extent())
    }
}

/// Load a two-column (angle, intensity) text file.
///
/// Columns are separated by any amount of whitespace. Blank lines and
/// lines starting with `#` or `'` (TOPAS comment marker) are skipped,
/// extra columns are ignored.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a row has fewer than two
/// numeric columns, or the file contains no data rows.
pub fn load_series<P: AsRef<Path>>(path: P) -> Result<Series> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut series = Series::with_capacity(4096);

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let stripped = line.trim();

        if stripped.is_empty() || stripped.starts_with('#') || stripped.starts_with('\'') {
            continue;
        }

        let mut values = stripped.split_whitespace();
        let (angle, intensity) = match (values.next(), values.next()) {
            (Some(a), Some(i)) => (a, i),
            _ => {
                return Err(LoaderError::ParseError {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: "expected two columns".to_string(),
                })
            }
        };

        let angle: f64 = angle.parse().map_err(|_| LoaderError::ParseError {
            path: path.to_path_buf(),
            line: index + 1,
            message: format!("invalid angle value: {}", angle),
        })?;
        let intensity: f64 = intensity.parse().map_err(|_| LoaderError::ParseError {
            path: path.to_path_buf(),
            line: index + 1,
            message: format!("invalid intensity value: {}", intensity),
        })?;

        series.push(angle, intensity);
    }

    if series.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    debug!("Loaded {} rows from {}", series.len(), path.display());

    Ok(series)
}

/// Load the four series of one sample.
///
/// Reflection position intensities are replaced with zeros so the ticks
/// sit on a common baseline.
pub fn load_dataset(name: &str, paths: &BTreeMap<Role, PathBuf>) -> Result<SampleDataset> {
    let load = |role: Role| -> Result<Series> {
        let path = paths.get(&role).ok_or_else(|| LoaderError::MissingRole {
            sample: name.to_string(),
            role,
        })?;
        load_series(path)
    };

    let exp = load(Role::Observed)?;
    let cal = load(Role::Calculated)?;
    let mut pos = load(Role::Position)?;
    let dif = load(Role::Difference)?;

    pos.intensity.iter_mut().for_each(|v| *v = 0.0);

    Ok(SampleDataset {
        name: name.to_string(),
        exp,
        cal,
        pos,
        dif,
    })
}
