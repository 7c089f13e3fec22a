//! Discovery and grouping of Pawley fit output files.
//!
//! TOPAS writes four files per refined sample, named
//! `<sample>_pawley_<index>_<role>.txt`. Files are grouped by the text
//! before the `_pawley_<index>_` separator; the text after it names the role.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use thiserror::Error;

use crate::core::loaders::{self, Role, SampleDataset};

/// Substring every fit output file name contains (compared lower-cased).
pub const MARKER: &str = "_pawley_";

/// Extension of fit output files.
pub const DATA_EXTENSION: &str = "txt";

/// Input value that selects a scan of the working directory.
pub const AUTOBATCH: &str = "AUTOBATCH";

/// Number of files making up a complete group.
pub const GROUP_SIZE: usize = 4;

/// Errors that can occur while discovering file groups.
#[derive(Debug, Error)]
pub enum GroupingError {
    #[error("The input file {0} could not be found")]
    InputNotFound(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Undefined role '{token}' in file {path}")]
    UndefinedRole { path: PathBuf, token: String },

    #[error("File {0} has no sample name before the _pawley_ separator")]
    EmptySampleName(PathBuf),

    #[error("Found {found} input files for the input group {sample} instead of 4")]
    IncompleteGroup { sample: String, found: usize },
}

/// Result type for grouping operations.
pub type Result<T> = std::result::Result<T, GroupingError>;

/// Where to look for fit output files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Scan the working directory.
    AutoBatch,
    /// Explicit files or directories.
    Paths(Vec<PathBuf>),
}

impl InputSource {
    /// Interpret command-line input values.
    ///
    /// No values, or the single value `AUTOBATCH`, select a directory scan.
    pub fn from_args(inputs: &[String]) -> Self {
        match inputs {
            [] => InputSource::AutoBatch,
            [single] if single == AUTOBATCH => InputSource::AutoBatch,
            _ => InputSource::Paths(inputs.iter().map(PathBuf::from).collect()),
        }
    }
}

/// The files of one sample, keyed by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    name: String,
    files: BTreeMap<Role, PathBuf>,
}

impl FileGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: BTreeMap::new(),
        }
    }

    /// Sample name shared by all files of the group.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &BTreeMap<Role, PathBuf> {
        &self.files
    }

    pub fn path(&self, role: Role) -> Option<&Path> {
        self.files.get(&role).map(PathBuf::as_path)
    }

    /// Number of distinct roles present.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.files.len() == GROUP_SIZE
    }

    /// Register a file, returning the path it replaced if the role was already taken.
    pub fn insert(&mut self, role: Role, path: PathBuf) -> Option<PathBuf> {
        self.files.insert(role, path)
    }

    /// Read all four series of the group.
    pub fn load(&self) -> loaders::Result<SampleDataset> {
        loaders::load_dataset(&self.name, &self.files)
    }
}

fn separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"(?i)_pawley_\d+_").expect("separator pattern is valid"))
}

/// Map a raw role token to its canonical role (case-insensitive).
pub fn parse_role(token: &str) -> Option<Role> {
    match token.to_ascii_lowercase().as_str() {
        "x_yobs" => Some(Role::Observed),
        "out_x_ycalc" => Some(Role::Calculated),
        "2th_ip" => Some(Role::Position),
        "x_difference" => Some(Role::Difference),
        _ => None,
    }
}

/// Split a file name into sample name and raw role token.
///
/// The split happens at the first `_pawley_<digits>_` match; the
/// extension is stripped from the role token. Returns `None` when the
/// name has no separator.
pub fn split_file_name(file_name: &str) -> Option<(String, String)> {
    let found = separator().find(file_name)?;
    let sample = &file_name[..found.start()];
    let rest = &file_name[found.end()..];
    let token = Path::new(rest)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(rest);

    Some((sample.to_string(), token.to_string()))
}

/// Whether a file name looks like a fit output file.
pub fn is_candidate(file_name: &str) -> bool {
    file_name.to_lowercase().contains(MARKER)
        && Path::new(file_name)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(DATA_EXTENSION))
            .unwrap_or(false)
}

fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// List the fit output files in a directory, sorted by path.
fn collect_candidates(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory).map_err(|e| GroupingError::UnreadableDirectory {
        path: directory.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && file_name_of(path).map(is_candidate).unwrap_or(false))
        .collect();

    files.sort();
    Ok(files)
}

/// Fit output files next to an explicitly named input file.
///
/// If the input name carries the separator, files of the same sample are
/// selected; otherwise every candidate whose name contains the input's
/// file stem is.
fn collect_siblings(input: &Path) -> Result<Vec<PathBuf>> {
    let directory = match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let file_name = file_name_of(input).unwrap_or_default();
    let sample = split_file_name(file_name).map(|(sample, _)| sample);
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let siblings = collect_candidates(&directory)?
        .into_iter()
        .filter(|path| {
            let name = file_name_of(path).unwrap_or_default();
            match &sample {
                Some(sample) => split_file_name(name)
                    .map(|(other, _)| &other == sample)
                    .unwrap_or(false),
                None => name.contains(&stem),
            }
        })
        .collect();

    Ok(siblings)
}

/// Add files to the group map, creating groups as needed.
///
/// # Errors
///
/// Returns `UndefinedRole` for a role token outside the four known roles.
pub fn add_files_to_groups(
    files: &[PathBuf],
    groups: &mut BTreeMap<String, FileGroup>,
) -> Result<()> {
    for path in files {
        let file_name = match file_name_of(path) {
            Some(name) => name,
            None => continue,
        };

        let (sample, token) = match split_file_name(file_name) {
            Some(parts) => parts,
            None => {
                debug!("Skipping {}: no separator", path.display());
                continue;
            }
        };

        if sample.is_empty() {
            return Err(GroupingError::EmptySampleName(path.clone()));
        }

        let role = parse_role(&token).ok_or_else(|| GroupingError::UndefinedRole {
            path: path.clone(),
            token: token.clone(),
        })?;

        debug!("Matched {} as {} of '{}'", path.display(), role, sample);

        let group = groups
            .entry(sample.clone())
            .or_insert_with(|| FileGroup::new(sample.clone()));

        if let Some(previous) = group.insert(role, path.clone()) {
            if previous != *path {
                warn!(
                    "Group '{}' has several {} files, using {} instead of {}",
                    sample,
                    role,
                    path.display(),
                    previous.display()
                );
            }
        }
    }

    Ok(())
}

/// Find and group fit output files without checking group completeness.
pub fn scan(source: &InputSource) -> Result<BTreeMap<String, FileGroup>> {
    let mut groups = BTreeMap::new();

    match source {
        InputSource::AutoBatch => {
            let files = collect_candidates(Path::new("."))?;
            add_files_to_groups(&files, &mut groups)?;
        }
        InputSource::Paths(inputs) => {
            for input in inputs {
                if !input.exists() {
                    return Err(GroupingError::InputNotFound(input.clone()));
                }

                let files = if input.is_dir() {
                    collect_candidates(input)?
                } else {
                    collect_siblings(input)?
                };
                add_files_to_groups(&files, &mut groups)?;
            }
        }
    }

    Ok(groups)
}

/// Check that every group holds exactly four roles.
pub fn validate_groups(groups: &BTreeMap<String, FileGroup>) -> Result<()> {
    match groups.values().find(|group| !group.is_complete()) {
        Some(group) => Err(GroupingError::IncompleteGroup {
            sample: group.name().to_string(),
            found: group.len(),
        }),
        None => Ok(()),
    }
}

/// Find, group and validate fit output files.
///
/// Groups are returned in sample name order.
///
/// # Errors
///
/// Fails on a missing explicit input, an undefined role token or any
/// group without exactly four files.
pub fn discover(source: &InputSource) -> Result<BTreeMap<String, FileGroup>> {
    let groups = scan(source)?;
    validate_groups(&groups)?;
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    const ROLE_TOKENS: [&str; 4] = ["X_Yobs", "Out_X_Ycalc", "2Th_Ip", "X_Difference"];

    fn create_fit_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "10.0 1.0").unwrap();
        path
    }

    fn create_group(dir: &Path, sample: &str) {
        for token in ROLE_TOKENS {
            create_fit_file(dir, &format!("{}_pawley_01_{}.txt", sample, token));
        }
    }

    fn paths(dir: &Path) -> InputSource {
        InputSource::Paths(vec![dir.to_path_buf()])
    }

    #[test]
    fn test_split_file_name() {
        assert_eq!(
            split_file_name("quartz_pawley_01_X_Yobs.txt"),
            Some(("quartz".to_string(), "X_Yobs".to_string()))
        );
        assert_eq!(
            split_file_name("my_sample_pawley_123_Out_X_Ycalc.txt"),
            Some(("my_sample".to_string(), "Out_X_Ycalc".to_string()))
        );
        assert_eq!(split_file_name("quartz_X_Yobs.txt"), None);
    }

    #[test]
    fn test_split_uses_first_separator() {
        assert_eq!(
            split_file_name("a_pawley_1_b_pawley_2_X_Yobs.txt"),
            Some(("a".to_string(), "b_pawley_2_X_Yobs".to_string()))
        );
    }

    #[test]
    fn test_parse_role_is_case_insensitive() {
        assert_eq!(parse_role("X_Yobs"), Some(Role::Observed));
        assert_eq!(parse_role("x_yobs"), Some(Role::Observed));
        assert_eq!(parse_role("OUT_X_YCALC"), Some(Role::Calculated));
        assert_eq!(parse_role("2th_IP"), Some(Role::Position));
        assert_eq!(parse_role("x_DIFFERENCE"), Some(Role::Difference));
        assert_eq!(parse_role("X_Ycalc"), None);
    }

    #[test]
    fn test_is_candidate() {
        assert!(is_candidate("quartz_pawley_01_X_Yobs.txt"));
        assert!(is_candidate("quartz_PAWLEY_01_X_Yobs.TXT"));
        assert!(!is_candidate("quartz_pawley_01_X_Yobs.xy"));
        assert!(!is_candidate("quartz_rietveld_01_X_Yobs.txt"));
    }

    #[test]
    fn test_from_args() {
        assert_eq!(InputSource::from_args(&[]), InputSource::AutoBatch);
        assert_eq!(
            InputSource::from_args(&[AUTOBATCH.to_string()]),
            InputSource::AutoBatch
        );
        assert_eq!(
            InputSource::from_args(&["a.txt".to_string()]),
            InputSource::Paths(vec![PathBuf::from("a.txt")])
        );
    }

    #[test]
    fn test_discover_directory() {
        let temp_dir = TempDir::new().unwrap();
        create_group(temp_dir.path(), "quartz");
        create_group(temp_dir.path(), "corundum");
        create_fit_file(temp_dir.path(), "notes.txt");

        let groups = discover(&paths(temp_dir.path())).unwrap();

        let names: Vec<&String> = groups.keys().collect();
        assert_eq!(names, vec!["corundum", "quartz"]);

        let quartz = &groups["quartz"];
        assert!(quartz.is_complete());
        assert_eq!(
            quartz.path(Role::Position),
            Some(temp_dir.path().join("quartz_pawley_01_2Th_Ip.txt").as_path())
        );
    }

    #[test]
    fn test_discover_mixed_case_roles() {
        let temp_dir = TempDir::new().unwrap();
        for token in ["x_yobs", "OUT_X_YCALC", "2th_ip", "X_DIFFERENCE"] {
            create_fit_file(temp_dir.path(), &format!("rutile_Pawley_07_{}.txt", token));
        }

        let groups = discover(&paths(temp_dir.path())).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["rutile"].len(), 4);
    }

    #[test]
    fn test_incomplete_group_reports_count() {
        let temp_dir = TempDir::new().unwrap();
        for token in &ROLE_TOKENS[..3] {
            create_fit_file(temp_dir.path(), &format!("quartz_pawley_01_{}.txt", token));
        }

        match discover(&paths(temp_dir.path())) {
            Err(GroupingError::IncompleteGroup { sample, found }) => {
                assert_eq!(sample, "quartz");
                assert_eq!(found, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_scan_keeps_incomplete_groups() {
        let temp_dir = TempDir::new().unwrap();
        create_fit_file(temp_dir.path(), "quartz_pawley_01_X_Yobs.txt");

        let groups = scan(&paths(temp_dir.path())).unwrap();
        assert_eq!(groups["quartz"].len(), 1);
    }

    #[test]
    fn test_undefined_role() {
        let temp_dir = TempDir::new().unwrap();
        create_fit_file(temp_dir.path(), "quartz_pawley_01_Residuals.txt");

        match scan(&paths(temp_dir.path())) {
            Err(GroupingError::UndefinedRole { token, .. }) => assert_eq!(token, "Residuals"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_sample_name() {
        let temp_dir = TempDir::new().unwrap();
        create_fit_file(temp_dir.path(), "_pawley_01_X_Yobs.txt");

        match scan(&paths(temp_dir.path())) {
            Err(GroupingError::EmptySampleName(path)) => {
                assert_eq!(path, temp_dir.path().join("_pawley_01_X_Yobs.txt"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_explicit_file_selects_its_sample() {
        let temp_dir = TempDir::new().unwrap();
        create_group(temp_dir.path(), "quartz");
        create_group(temp_dir.path(), "quartz2");

        let input = temp_dir.path().join("quartz_pawley_01_X_Yobs.txt");
        let groups = discover(&InputSource::Paths(vec![input])).unwrap();

        assert_eq!(groups.len(), 1);
        assert!(groups.contains_key("quartz"));
    }

    #[test]
    fn test_explicit_file_without_separator_matches_stem() {
        let temp_dir = TempDir::new().unwrap();
        create_group(temp_dir.path(), "quartz");
        let input = create_fit_file(temp_dir.path(), "quartz.txt");

        let groups = discover(&InputSource::Paths(vec![input])).unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups["quartz"].is_complete());
    }

    #[test]
    fn test_missing_explicit_input() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("missing_pawley_01_X_Yobs.txt");

        assert!(matches!(
            discover(&InputSource::Paths(vec![input])),
            Err(GroupingError::InputNotFound(_))
        ));
    }

    #[test]
    fn test_group_load() {
        let temp_dir = TempDir::new().unwrap();
        create_group(temp_dir.path(), "quartz");

        let groups = discover(&paths(temp_dir.path())).unwrap();
        let dataset = groups["quartz"].load().unwrap();
        assert_eq!(dataset.name, "quartz");
        assert_eq!(dataset.exp.len(), 1);
        assert_eq!(dataset.pos.intensity, vec![0.0]);
    }
}
