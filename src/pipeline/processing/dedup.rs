use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, instrument, warn};

use crate::types::{ColumnMap, Table};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub input_rows: usize,
    pub removed_rows: usize,
    /// External codes that appeared more than once, ascending
    pub duplicated_codes: Vec<String>,
}

/// Keep the first row for each external code, preserving order.
///
/// Blank codes share the key `""`, so only the first blank-code row survives.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn drop_duplicate_codes(table: &mut Table, columns: &ColumnMap) -> DedupStats {
    let input_rows = table.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(input_rows);
    let mut duplicated: BTreeSet<String> = BTreeSet::new();

    table.retain_rows(|row| {
        let code = columns.external_code(row);
        if seen.contains(code.as_ref()) {
            duplicated.insert(code.into_owned());
            false
        } else {
            seen.insert(code.into_owned());
            true
        }
    });

    let stats = DedupStats {
        input_rows,
        removed_rows: input_rows - table.len(),
        duplicated_codes: duplicated.into_iter().collect(),
    };
    if stats.removed_rows > 0 {
        warn!(
            "Removed {} sampled rows sharing an external code ({} distinct codes); affected groups fall below quota",
            stats.removed_rows,
            stats.duplicated_codes.len()
        );
    }
    info!("{} rows after deduplication", table.len());
    stats
}
