//! Core data types and I/O operations.

pub mod loaders;
pub mod writers;

pub use loaders::{load_dataset, load_series, LoaderError, Role, SampleDataset, Series};
pub use writers::{export_path, write_dataset_csv, WriteError};
