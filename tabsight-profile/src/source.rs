//! Locating and loading tabular sources.
//!
//! Only local files are read here. Object-store locations (`s3://...`) belong to
//! the storage layer and are rejected with [`ProfileError::UnsupportedScheme`].

use crate::error::{ProfileError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Cell spellings treated as missing, in addition to blank cells.
pub const DEFAULT_MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Address of a tabular source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLocation {
    /// A file on the local filesystem
    Local(PathBuf),
}

impl DataLocation {
    /// Parse a location string.
    ///
    /// `file:///data/x.csv` and `/data/x.csv` are both local; any other
    /// `scheme://` prefix is unsupported.
    pub fn parse(location: &str) -> Result<Self> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(ProfileError::InvalidLocation {
                location: location.to_string(),
            });
        }

        if let Some(path) = trimmed.strip_prefix("file://") {
            if path.is_empty() {
                return Err(ProfileError::InvalidLocation {
                    location: location.to_string(),
                });
            }
            return Ok(DataLocation::Local(PathBuf::from(path)));
        }

        if let Some(scheme) = url_scheme(trimmed) {
            return Err(ProfileError::UnsupportedScheme {
                scheme: scheme.to_string(),
            });
        }

        Ok(DataLocation::Local(PathBuf::from(trimmed)))
    }

    pub fn path(&self) -> &Path {
        match self {
            DataLocation::Local(path) => path,
        }
    }

    /// Canonical `file://` form of this location.
    pub fn to_uri(&self) -> String {
        match self {
            DataLocation::Local(path) => format!("file://{}", path.display()),
        }
    }
}

impl FromStr for DataLocation {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        DataLocation::parse(s)
    }
}

fn url_scheme(location: &str) -> Option<&str> {
    let (scheme, _) = location.split_once("://")?;
    let valid = scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Set of cell values that count as missing.
#[derive(Debug, Clone)]
pub struct MissingMarkers {
    markers: HashSet<String>,
}

impl MissingMarkers {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Add extra markers on top of the current set (builder style)
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers.extend(markers.into_iter().map(Into::into));
        self
    }

    pub fn is_missing(&self, cell: &str) -> bool {
        let trimmed = cell.trim();
        trimmed.is_empty() || self.markers.contains(trimmed)
    }
}

impl Default for MissingMarkers {
    fn default() -> Self {
        Self::new(DEFAULT_MISSING_MARKERS.iter().copied())
    }
}

/// A fully loaded table, stored column-major. Missing cells are `None`;
/// present cells are trimmed of surrounding whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub columns: Vec<Vec<Option<String>>>,
    pub row_count: usize,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Iterate `(name, cells)` pairs in header order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[Option<String>])> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }
}

/// Open a local location and load it as a table.
pub fn load_table(location: &DataLocation, markers: &MissingMarkers) -> Result<Table> {
    let path = location.path();
    if !path.exists() {
        return Err(ProfileError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path)?;
    read_table(file, markers)
}

/// Read CSV with a header row from any reader.
pub fn read_table<R: Read>(reader: R, markers: &MissingMarkers) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let raw_headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    if raw_headers.is_empty() || (raw_headers.len() == 1 && raw_headers[0].trim().is_empty()) {
        return Err(ProfileError::NoColumns);
    }
    let headers = dedupe_headers(raw_headers);
    let width = headers.len();

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    let mut row_count = 0usize;

    for record in csv_reader.records() {
        let record = record?;
        if record.len() > width {
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(row_count as u64 + 2);
            return Err(ProfileError::RaggedRow {
                expected: width,
                line,
                found: record.len(),
            });
        }

        for (idx, column) in columns.iter_mut().enumerate() {
            let cell = record
                .get(idx)
                .filter(|cell| !markers.is_missing(cell))
                .map(|cell| cell.trim().to_string());
            column.push(cell);
        }
        row_count += 1;
    }

    tracing::debug!("Loaded table with {} rows and {} columns", row_count, width);
    Ok(Table {
        headers,
        columns,
        row_count,
    })
}

/// Make header names unique by suffixing repeats with `.1`, `.2`, ...
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut out = Vec::with_capacity(headers.len());
    for header in headers {
        let mut candidate = header.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{header}.{suffix}");
            suffix += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
