//! Column type inference.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inferred type tag of a column.
///
/// Only `Numeric` columns get numeric statistics, histograms and correlation.
/// `Boolean` and `Datetime` are refinements of the non-numeric class and are
/// summarised like `Categorical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Boolean,
    Datetime,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Categorical => "categorical",
            ColumnType::Boolean => "boolean",
            ColumnType::Datetime => "datetime",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Numeric)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Row-aligned parsed values; `None` where the cell was missing
    Numeric(Vec<Option<f64>>),
    /// Row-aligned raw values for every non-numeric tag
    Text {
        kind: ColumnType,
        values: Vec<Option<String>>,
    },
}

impl ColumnData {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Numeric(_) => ColumnType::Numeric,
            ColumnData::Text { kind, .. } => *kind,
        }
    }

    pub fn missing_count(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnData::Text { values, .. } => values.iter().filter(|v| v.is_none()).count(),
        }
    }
}

/// Parse a cell as a number.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok()
}

fn is_boolean(cell: &str) -> bool {
    let cell = cell.trim();
    cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false")
}

fn is_datetime(cell: &str) -> bool {
    let cell = cell.trim();
    DateTime::parse_from_rfc3339(cell).is_ok()
        || NaiveDate::parse_from_str(cell, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(cell, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

/// Classify a column.
///
/// A column is numeric iff every non-missing cell parses as a number. An
/// all-missing column is numeric. NaN spellings that slipped past the missing
/// markers are stored as missing.
pub fn classify(cells: &[Option<String>]) -> ColumnData {
    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(raw) => parse_number(raw).map(|v| (!v.is_nan()).then_some(v)),
        })
        .collect();

    if let Some(values) = parsed {
        return ColumnData::Numeric(values);
    }

    let present = || cells.iter().flatten();
    let kind = if present().all(|c| is_boolean(c)) {
        ColumnType::Boolean
    } else if present().all(|c| is_datetime(c)) {
        ColumnType::Datetime
    } else {
        ColumnType::Categorical
    };

    ColumnData::Text {
        kind,
        values: cells.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(raw: &[Option<&str>]) -> Vec<Option<String>> {
        raw.iter().map(|c| c.map(str::to_string)).collect()
    }

    #[test]
    fn test_numeric_when_every_present_value_parses() {
        let column = classify(&cells(&[Some("1"), None, Some("2.5"), Some("-3e2")]));
        assert_eq!(
            column,
            ColumnData::Numeric(vec![Some(1.0), None, Some(2.5), Some(-300.0)])
        );
        assert_eq!(column.missing_count(), 1);
    }

    #[test]
    fn test_single_text_value_forces_categorical() {
        let column = classify(&cells(&[Some("1"), Some("2"), Some("three")]));
        assert_eq!(column.column_type(), ColumnType::Categorical);
    }

    #[test]
    fn test_stray_nan_spelling_counts_as_missing() {
        let column = classify(&cells(&[Some("1"), Some("NAN")]));
        assert_eq!(column, ColumnData::Numeric(vec![Some(1.0), None]));
        assert_eq!(column.missing_count(), 1);
    }

    #[test]
    fn test_all_missing_is_numeric() {
        let column = classify(&cells(&[None, None]));
        assert_eq!(column.column_type(), ColumnType::Numeric);
        assert_eq!(column.missing_count(), 2);
    }

    #[test]
    fn test_boolean_and_datetime_refinements() {
        let bools = classify(&cells(&[Some("True"), Some("false"), None]));
        assert_eq!(bools.column_type(), ColumnType::Boolean);

        let dates = classify(&cells(&[
            Some("2024-01-31"),
            Some("2024-02-01 10:30:00"),
            Some("2024-02-01T10:30:00Z"),
        ]));
        assert_eq!(dates.column_type(), ColumnType::Datetime);

        let mixed = classify(&cells(&[Some("2024-01-31"), Some("true")]));
        assert_eq!(mixed.column_type(), ColumnType::Categorical);
    }

    #[test]
    fn test_parse_number_edge_cases() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("inf"), Some(f64::INFINITY));
        assert!(parse_number("NAN").is_some_and(f64::is_nan));
        assert_eq!(parse_number("1,000"), None);
        assert!(!ColumnType::Boolean.is_numeric());
        assert_eq!(ColumnType::Datetime.to_string(), "datetime");
    }
}
