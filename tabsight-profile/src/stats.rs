//! Numeric routines behind the profile: moments, percentiles, equal-width
//! histograms, frequency counts and pairwise Pearson correlation.
//!
//! Undefined results are returned as `f64::NAN` and left for the sanitizer.

use indexmap::IndexMap;

/// Descriptive statistics of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl NumericSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                p25: f64::NAN,
                p50: f64::NAN,
                p75: f64::NAN,
                max: f64::NAN,
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let constant = is_constant(values.iter().copied());
        let mean = if constant {
            sorted[0]
        } else {
            values.iter().sum::<f64>() / count as f64
        };
        Self {
            count,
            mean,
            std: if constant && count >= 2 && mean.is_finite() {
                0.0
            } else {
                sample_std(values, mean)
            },
            min: sorted[0],
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.5),
            p75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        }
    }
}

fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Every value bit-for-bit equal to the first. A summed mean of such a
/// column need not equal the value (`0.1 * 3 / 3`), so zero variance is
/// detected here rather than from the deviations.
fn is_constant(mut values: impl Iterator<Item = f64>) -> bool {
    match values.next() {
        Some(first) => values.all(|v| v.to_bits() == first.to_bits()),
        None => true,
    }
}

/// Quantile of an ascending slice with linear interpolation between the two
/// nearest order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            if lo == hi {
                sorted[lo]
            } else {
                sorted[lo] + (sorted[hi] - sorted[lo]) * frac
            }
        }
    }
}

/// Distinct-value statistics of a non-numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalSummary {
    pub count: usize,
    pub unique: usize,
    pub top: Option<String>,
    pub freq: Option<usize>,
}

impl CategoricalSummary {
    pub fn from_counts(counts: &[ValueCount]) -> Self {
        let count = counts.iter().map(|c| c.count).sum();
        let head = counts.first();
        Self {
            count,
            unique: counts.len(),
            top: head.map(|c| c.value.clone()),
            freq: head.map(|c| c.count),
        }
    }
}

/// Frequency of one distinct value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Count distinct values, most frequent first; ties keep first-seen order.
pub fn value_counts<'a, I>(values: I) -> Vec<ValueCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: IndexMap<&'a str, usize> = IndexMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut counted: Vec<ValueCount> = counts
        .into_iter()
        .map(|(value, count)| ValueCount {
            value: value.to_string(),
            count,
        })
        .collect();
    // stable sort keeps first-seen order among equal counts
    counted.sort_by(|a, b| b.count.cmp(&a.count));
    counted
}

/// One equal-width histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

impl HistogramBin {
    /// `"lo-hi"` with two decimals, e.g. `"0.42-8.38"`.
    pub fn range_label(&self) -> String {
        format!("{:.2}-{:.2}", self.start, self.end)
    }
}

/// Equal-width histogram over the observed range.
///
/// The range comes from the finite values; when they are all equal it is
/// widened to `[v - 0.5, v + 0.5]`. The last bucket is closed on the right.
/// Infinite values land in the first or last bucket so that bucket counts
/// always add up to `values.len()`. Empty input gives no buckets.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let (mut lo, mut hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        lo = 0.0;
        hi = 0.0;
    }
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let n = bins as f64;
    let span = hi - lo;
    // the span of values near ±f64::MAX overflows
    let width = if span.is_finite() { span / n } else { hi / n - lo / n };
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = if v.is_nan() {
            continue;
        } else if v <= lo {
            0
        } else if v >= hi {
            bins - 1
        } else {
            (((v - lo) / width) as usize).min(bins - 1)
        };
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: lo + width * i as f64,
            end: if i + 1 == bins {
                hi
            } else {
                lo + width * (i + 1) as f64
            },
            count,
        })
        .collect()
}

/// Pearson correlation over rows where both values are present.
///
/// NaN when there are fewer than two complete pairs or either side has
/// zero variance.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    if is_constant(pairs.iter().map(|p| p.0)) || is_constant(pairs.iter().map(|p| p.1)) {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// Full symmetric correlation matrix over named numeric columns.
///
/// Empty when fewer than two columns are given. The diagonal is 1.0 for
/// columns with at least two values and non-zero variance, NaN otherwise.
pub fn correlation_matrix(
    columns: &[(&str, &[Option<f64>])],
) -> IndexMap<String, IndexMap<String, f64>> {
    let mut matrix: IndexMap<String, IndexMap<String, f64>> = IndexMap::new();
    if columns.len() < 2 {
        return matrix;
    }

    let n = columns.len();
    let mut cells = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        cells[i][i] = if pearson(columns[i].1, columns[i].1).is_nan() {
            f64::NAN
        } else {
            1.0
        };
        for j in (i + 1)..n {
            let r = pearson(columns[i].1, columns[j].1);
            cells[i][j] = r;
            cells[j][i] = r;
        }
    }

    for (i, (name, _)) in columns.iter().enumerate() {
        let row = columns
            .iter()
            .enumerate()
            .map(|(j, (other, _))| (other.to_string(), cells[i][j]))
            .collect();
        matrix.insert(name.to_string(), row);
    }
    matrix
}
