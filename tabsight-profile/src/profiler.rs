//! Dataset profiling: table in, [`DatasetProfile`] out.

use crate::column::{ColumnData, ColumnType, classify};
use crate::error::Result;
use crate::sanitize::sanitize_in_place;
use crate::source::{DataLocation, MissingMarkers, Table, load_table, read_table};
use crate::stats::{
    CategoricalSummary, HistogramBin, NumericSummary, ValueCount, correlation_matrix, histogram,
    value_counts,
};
use crate::value::{ProfileValue, ValueMap};
use indexmap::IndexMap;
use std::io::Read;
use std::path::Path;

/// Number of equal-width histogram buckets for numeric columns.
pub const DEFAULT_HISTOGRAM_BINS: usize = 10;
/// Number of most frequent values kept for non-numeric columns.
pub const DEFAULT_TOP_CATEGORIES: usize = 10;

/// Tunables for [`Profiler`].
#[derive(Debug, Clone)]
pub struct ProfilerOptions {
    pub histogram_bins: usize,
    pub top_categories: usize,
    pub missing_markers: MissingMarkers,
}

impl ProfilerOptions {
    /// Set the histogram bucket count (builder style)
    pub fn with_histogram_bins(self, histogram_bins: usize) -> Self {
        Self {
            histogram_bins,
            ..self
        }
    }

    /// Set how many categorical values are kept (builder style)
    pub fn with_top_categories(self, top_categories: usize) -> Self {
        Self {
            top_categories,
            ..self
        }
    }

    /// Replace the missing-value markers (builder style)
    pub fn with_missing_markers(self, missing_markers: MissingMarkers) -> Self {
        Self {
            missing_markers,
            ..self
        }
    }
}

impl Default for ProfilerOptions {
    fn default() -> Self {
        Self {
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            top_categories: DEFAULT_TOP_CATEGORIES,
            missing_markers: MissingMarkers::default(),
        }
    }
}

/// Per-column statistics.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnStats {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
}

/// Statistics plus the number of missing cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub stats: ColumnStats,
    pub missing_count: usize,
}

/// Shape of a column's values for visualization.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Numeric { bins: Vec<HistogramBin> },
    Categorical { counts: Vec<ValueCount> },
}

impl Distribution {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Distribution::Numeric { .. } => "numeric",
            Distribution::Categorical { .. } => "categorical",
        }
    }
}

/// Structured statistical summary of a tabular dataset.
///
/// Correlation entries may be NaN here; use [`DatasetProfile::to_sanitized_value`]
/// for the strict-JSON form.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetProfile {
    pub schema: IndexMap<String, ColumnType>,
    pub summary: IndexMap<String, ColumnSummary>,
    pub correlation: IndexMap<String, IndexMap<String, f64>>,
    pub distributions: IndexMap<String, Distribution>,
    pub row_count: usize,
    pub column_count: usize,
}

impl DatasetProfile {
    /// Names of the numeric columns, in header order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.schema
            .iter()
            .filter(|(_, kind)| kind.is_numeric())
            .map(|(name, _)| name.as_str())
    }

    /// Render as a value tree. Undefined statistics stay NaN.
    pub fn to_value(&self) -> ProfileValue {
        let schema: ValueMap = self
            .schema
            .iter()
            .map(|(name, kind)| (name.clone(), ProfileValue::from(kind.as_str())))
            .collect();

        let summary: ValueMap = self
            .summary
            .iter()
            .map(|(name, column)| (name.clone(), summary_value(column)))
            .collect();

        let correlation: ValueMap = self
            .correlation
            .iter()
            .map(|(name, row)| {
                let row: ValueMap = row
                    .iter()
                    .map(|(other, r)| (other.clone(), ProfileValue::Float(*r)))
                    .collect();
                (name.clone(), ProfileValue::Map(row))
            })
            .collect();

        let distributions: ValueMap = self
            .distributions
            .iter()
            .map(|(name, dist)| (name.clone(), distribution_value(dist)))
            .collect();

        let mut root = ValueMap::new();
        root.insert("schema".to_string(), schema.into());
        root.insert("summary".to_string(), summary.into());
        root.insert("correlation".to_string(), correlation.into());
        root.insert("distributions".to_string(), distributions.into());
        root.insert("row_count".to_string(), self.row_count.into());
        root.insert("column_count".to_string(), self.column_count.into());
        ProfileValue::Map(root)
    }

    /// Render as a strict-JSON value tree.
    pub fn to_sanitized_value(&self) -> ProfileValue {
        let mut value = self.to_value();
        sanitize_in_place(&mut value);
        value
    }
}

fn summary_value(column: &ColumnSummary) -> ProfileValue {
    let mut map = ValueMap::new();
    match &column.stats {
        ColumnStats::Numeric(s) => {
            map.insert("count".into(), s.count.into());
            map.insert("mean".into(), s.mean.into());
            map.insert("std".into(), s.std.into());
            map.insert("min".into(), s.min.into());
            map.insert("25%".into(), s.p25.into());
            map.insert("50%".into(), s.p50.into());
            map.insert("75%".into(), s.p75.into());
            map.insert("max".into(), s.max.into());
        }
        ColumnStats::Categorical(s) => {
            map.insert("count".into(), s.count.into());
            map.insert("unique".into(), s.unique.into());
            map.insert("top".into(), s.top.clone().into());
            map.insert("freq".into(), s.freq.into());
        }
    }
    map.insert("missing_count".into(), column.missing_count.into());
    ProfileValue::Map(map)
}

fn distribution_value(dist: &Distribution) -> ProfileValue {
    let mut map = ValueMap::new();
    map.insert("type".into(), dist.type_tag().into());
    match dist {
        Distribution::Numeric { bins } => {
            let bins = bins
                .iter()
                .map(|bin| {
                    let mut entry = ValueMap::new();
                    entry.insert("range".into(), bin.range_label().into());
                    entry.insert("count".into(), bin.count.into());
                    ProfileValue::Map(entry)
                })
                .collect::<Vec<_>>();
            map.insert("bins".into(), bins.into());
        }
        Distribution::Categorical { counts } => {
            let counts = counts
                .iter()
                .map(|c| {
                    let mut entry = ValueMap::new();
                    entry.insert("name".into(), c.value.clone().into());
                    entry.insert("value".into(), c.count.into());
                    ProfileValue::Map(entry)
                })
                .collect::<Vec<_>>();
            map.insert("counts".into(), counts.into());
        }
    }
    ProfileValue::Map(map)
}

/// Builds [`DatasetProfile`]s from tabular sources.
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    options: ProfilerOptions,
}

impl Profiler {
    pub fn new(options: ProfilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProfilerOptions {
        &self.options
    }

    /// Profile the source at `location` (`file://...` or a bare path).
    pub fn profile_location(&self, location: &str) -> Result<DatasetProfile> {
        let location = DataLocation::parse(location)?;
        let table = load_table(&location, &self.options.missing_markers)?;
        Ok(self.profile_table(&table))
    }

    pub fn profile_path(&self, path: &Path) -> Result<DatasetProfile> {
        let table = load_table(
            &DataLocation::Local(path.to_path_buf()),
            &self.options.missing_markers,
        )?;
        Ok(self.profile_table(&table))
    }

    pub fn profile_reader<R: Read>(&self, reader: R) -> Result<DatasetProfile> {
        let table = read_table(reader, &self.options.missing_markers)?;
        Ok(self.profile_table(&table))
    }

    /// Profile an already loaded table. Infallible.
    pub fn profile_table(&self, table: &Table) -> DatasetProfile {
        let mut schema = IndexMap::with_capacity(table.column_count());
        let mut summary = IndexMap::with_capacity(table.column_count());
        let mut distributions = IndexMap::with_capacity(table.column_count());
        let mut numeric: Vec<(&str, Vec<Option<f64>>)> = Vec::new();

        for (name, cells) in table.iter_columns() {
            let data = classify(cells);
            let missing_count = data.missing_count();
            schema.insert(name.to_string(), data.column_type());

            match data {
                ColumnData::Numeric(values) => {
                    let present: Vec<f64> = values.iter().flatten().copied().collect();
                    summary.insert(
                        name.to_string(),
                        ColumnSummary {
                            stats: ColumnStats::Numeric(NumericSummary::from_values(&present)),
                            missing_count,
                        },
                    );
                    distributions.insert(
                        name.to_string(),
                        Distribution::Numeric {
                            bins: histogram(&present, self.options.histogram_bins),
                        },
                    );
                    numeric.push((name, values));
                }
                ColumnData::Text { values, .. } => {
                    let counts = value_counts(values.iter().flatten().map(String::as_str));
                    summary.insert(
                        name.to_string(),
                        ColumnSummary {
                            stats: ColumnStats::Categorical(CategoricalSummary::from_counts(
                                &counts,
                            )),
                            missing_count,
                        },
                    );
                    let mut top = counts;
                    top.truncate(self.options.top_categories);
                    distributions
                        .insert(name.to_string(), Distribution::Categorical { counts: top });
                }
            }
        }

        let numeric_refs: Vec<(&str, &[Option<f64>])> = numeric
            .iter()
            .map(|(name, values)| (*name, values.as_slice()))
            .collect();
        let correlation = correlation_matrix(&numeric_refs);

        tracing::debug!(
            "Profiled {} rows x {} columns ({} numeric)",
            table.row_count,
            table.column_count(),
            numeric_refs.len()
        );

        DatasetProfile {
            schema,
            summary,
            correlation,
            distributions,
            row_count: table.row_count,
            column_count: table.column_count(),
        }
    }

    /// Profile `location` and return the strict-JSON tree, or an
    /// `{"error": ...}` tree when the source cannot be read. Never fails.
    pub fn analyze(&self, location: &str) -> ProfileValue {
        match self.profile_location(location) {
            Ok(profile) => profile.to_sanitized_value(),
            Err(e) => {
                tracing::error!("Error analyzing dataset {}: {}", location, e);
                error_profile(e.to_string())
            }
        }
    }
}

/// Profile consisting solely of an `error` message.
pub fn error_profile(message: impl Into<String>) -> ProfileValue {
    let mut map = ValueMap::new();
    map.insert("error".to_string(), ProfileValue::Text(message.into()));
    ProfileValue::Map(map)
}

/// Profile `location` with default options. See [`Profiler::analyze`].
pub fn analyze_dataset(location: &str) -> ProfileValue {
    Profiler::default().analyze(location)
}
