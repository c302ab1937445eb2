use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::constants::QUOTA_COLUMN;
use crate::error::Result;
use crate::types::{Cell, ColumnMap, Table};

/// Rows sharing one user profile, with the number of them to sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub key: String,
    /// Row positions in the filtered table, ascending
    pub rows: Vec<usize>,
    pub quota: usize,
}

impl Group {
    pub fn size(&self) -> usize {
        self.rows.len()
    }
}

/// Groups in ascending key order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuotaPlan {
    pub groups: Vec<Group>,
}

impl QuotaPlan {
    pub fn total_quota(&self) -> usize {
        self.groups.iter().map(|g| g.quota).sum()
    }

    pub fn group(&self, key: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.key == key)
    }
}

/// ceil(size * percent / 100) in integer arithmetic; zero only for an empty group
pub fn quota_for(size: usize, percent: u32) -> usize {
    (size * percent as usize + 99) / 100
}

/// Group `table` by user profile and write the per-group quota as a derived column.
///
/// An input that already carries the quota column (a previous sample fed back in)
/// has it overwritten rather than duplicated.
#[instrument(skip(table, columns), fields(rows = table.len()))]
pub fn assign_quotas(table: &mut Table, columns: &ColumnMap, percent: u32) -> Result<QuotaPlan> {
    let mut by_profile: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, row) in table.rows().iter().enumerate() {
        by_profile
            .entry(columns.user_profile(row).into_owned())
            .or_default()
            .push(index);
    }

    let mut row_quota = vec![0usize; table.len()];
    let groups: Vec<Group> = by_profile
        .into_iter()
        .map(|(key, rows)| {
            let quota = quota_for(rows.len(), percent);
            for &i in &rows {
                row_quota[i] = quota;
            }
            debug!(profile = %key, size = rows.len(), quota, "group quota");
            Group { key, rows, quota }
        })
        .collect();

    table.set_column(
        QUOTA_COLUMN,
        row_quota.into_iter().map(|q| Cell::Number(q as f64)).collect(),
    )?;

    let plan = QuotaPlan { groups };
    info!(
        "{} user-profile groups, {} rows to sample",
        plan.groups.len(),
        plan.total_quota()
    );
    Ok(plan)
}
