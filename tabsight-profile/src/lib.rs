//! # tabsight-profile
//!
//! Statistical profiling of CSV datasets into a strict-JSON structure.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tabsight_profile::analyze_dataset;
//!
//! let profile = analyze_dataset("file:///srv/uploads/titanic.csv");
//! if let Some(error) = profile.get("error") {
//!     eprintln!("analysis failed: {error:?}");
//! } else {
//!     println!("{}", serde_json::to_string_pretty(&profile).unwrap());
//! }
//! ```
//!
//! ## Profile layout
//!
//! | key | content |
//! |---|---|
//! | `schema` | column → `numeric` / `categorical` / `boolean` / `datetime` |
//! | `summary` | column → statistics plus `missing_count` |
//! | `correlation` | numeric column → numeric column → Pearson r (or null) |
//! | `distributions` | column → 10-bucket histogram or top-10 value counts |
//! | `row_count`, `column_count` | integers |
//!
//! A source that cannot be read yields `{"error": "..."}` instead.
//!
//! ## Modules
//!
//! - [`source`]: location parsing and CSV loading
//! - [`column`]: column type inference
//! - [`stats`]: numeric routines
//! - [`profiler`]: assembling a [`DatasetProfile`]
//! - [`sanitize`]: NaN/inf → null normalization
//! - [`value`]: the dynamic [`ProfileValue`] tree

pub mod column;
pub mod error;
pub mod profiler;
pub mod sanitize;
pub mod source;
pub mod stats;
pub mod value;

pub use column::ColumnType;
pub use error::{ProfileError, Result};
pub use profiler::{
    ColumnStats, ColumnSummary, DatasetProfile, Distribution, Profiler, ProfilerOptions,
    analyze_dataset, error_profile,
};
pub use sanitize::{is_sanitized, sanitize, sanitize_in_place};
pub use source::{DataLocation, MissingMarkers};
pub use value::{ProfileValue, ValueMap};
