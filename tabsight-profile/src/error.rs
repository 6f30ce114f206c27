//! Error types for dataset profiling

use std::path::PathBuf;

/// Result type for profiling operations.
pub type Result<T> = std::result::Result<T, ProfileError>;

/// Everything that can stop a tabular source from being profiled.
///
/// These never escape [`crate::analyze_dataset`]; they are rendered into the
/// `error` field of the returned profile instead.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The location names a storage scheme this crate does not read
    #[error("Unsupported location scheme '{scheme}': only local file paths are supported")]
    UnsupportedScheme { scheme: String },

    /// The location is empty or otherwise unusable
    #[error("Invalid data location: {location:?}")]
    InvalidLocation { location: String },

    /// The file does not exist
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    /// The source has no header row
    #[error("No columns to parse from file")]
    NoColumns,

    /// A data row has more cells than the header declares
    #[error("Expected {expected} fields in line {line}, saw {found}")]
    RaggedRow {
        expected: usize,
        line: u64,
        found: usize,
    },

    /// IO errors when opening the source
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Malformed CSV
    #[error("CSV parse error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
}
