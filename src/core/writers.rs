//! CSV export of scaled sample data.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::loaders::{Role, SampleDataset};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Path of the exported data for a sample: `<dir>/<sample>_scaled.csv`.
pub fn export_path(dir: &Path, sample: &str) -> PathBuf {
    dir.join(format!("{}_scaled.csv", sample))
}

/// Write all four series of a dataset to CSV.
///
/// The file has the header `role,angle,intensity` followed by one row per
/// point, series in the order exp, cal, pos, dif.
///
/// # Errors
///
/// Returns an error if parent directories or the file cannot be created,
/// or a record cannot be written.
pub fn write_dataset_csv(path: &Path, dataset: &SampleDataset) -> Result<()> {
    ensure_parent_dirs(path)?;

    let path_str = path.display().to_string();

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path_str.clone(),
        source: e,
    })?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    csv_writer
        .write_record(["role", "angle", "intensity"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for role in Role::ALL {
        for (angle, intensity) in dataset.series(role).points() {
            csv_writer
                .write_record(&[
                    role.key().to_string(),
                    format!("{:.6}", angle),
                    format!("{:.6}", intensity),
                ])
                .map_err(|e| WriteError::CsvError {
                    path: path_str.clone(),
                    source: e,
                })?;
        }
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
