use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{instrument, warn};

use crate::types::{Cell, ColumnMap, Table};

/// The column a summary is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SummaryDimension {
    Category,
    UserProfile,
}

impl SummaryDimension {
    fn key_of<'a>(&self, columns: &ColumnMap, row: &'a [Cell]) -> std::borrow::Cow<'a, str> {
        match self {
            SummaryDimension::Category => columns.module(row),
            SummaryDimension::UserProfile => columns.user_profile(row),
        }
    }
}

impl fmt::Display for SummaryDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryDimension::Category => write!(f, "category"),
            SummaryDimension::UserProfile => write!(f, "user profile"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub key: String,
    pub sample_count: usize,
    pub total_count: usize,
    /// sample_count / total_count; NaN when the total is zero (serialized as null)
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub dimension: SummaryDimension,
    /// Header text for the key column in exports
    pub key_header: String,
    /// Ascending by key
    pub rows: Vec<SummaryRow>,
}

impl Summary {
    pub fn sample_total(&self) -> usize {
        self.rows.iter().map(|r| r.sample_count).sum()
    }

    pub fn row(&self, key: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.key == key)
    }
}

/// Ratio that reports NaN instead of dividing by zero
pub fn ratio(sample_count: usize, total_count: usize) -> f64 {
    if total_count == 0 {
        f64::NAN
    } else {
        sample_count as f64 / total_count as f64
    }
}

fn count_by(table: &Table, columns: &ColumnMap, dimension: SummaryDimension) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for row in table.rows() {
        *counts
            .entry(dimension.key_of(columns, row).into_owned())
            .or_insert(0) += 1;
    }
    counts
}

/// Join sample counts against population counts for one dimension.
///
/// Keys absent from the sample are left out (inner join). A sample key missing
/// from the population is also left out and logged, since it indicates the two
/// tables did not come from the same run.
#[instrument(skip_all, fields(dimension = %dimension))]
pub fn summarize(
    sample: &Table,
    population: &Table,
    columns: &ColumnMap,
    dimension: SummaryDimension,
    key_header: &str,
) -> Summary {
    let sampled = count_by(sample, columns, dimension);
    let totals = count_by(population, columns, dimension);

    let rows = sampled
        .into_iter()
        .filter_map(|(key, sample_count)| match totals.get(&key) {
            Some(&total_count) => Some(SummaryRow {
                ratio: ratio(sample_count, total_count),
                key,
                sample_count,
                total_count,
            }),
            None => {
                warn!(key = %key, "sampled key has no population rows; dropped from summary");
                None
            }
        })
        .collect();

    Summary {
        dimension,
        key_header: key_header.to_string(),
        rows,
    }
}
