//! Data processing modules.

pub mod grouping;
pub mod layout;
pub mod multiply;

// Re-export key types for convenience
pub use grouping::{
    add_files_to_groups, discover, parse_role, scan, split_file_name, validate_groups, FileGroup,
    GroupingError, InputSource,
};
pub use layout::{compute_height_ratios, HeightRatios, LayoutError};
pub use multiply::{
    apply_range, apply_ranges, parse_ranges, scaled, MultiplicationRange, MultiplyError,
};
