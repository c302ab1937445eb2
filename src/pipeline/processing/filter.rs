use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::FilterConfig;
use crate::error::Result;
use crate::types::{Cell, ColumnMap, Table};

/// Which rule removed a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExclusionReason {
    UserProfile,
    ChangedUsing,
}

/// Row counts removed by each exclusion rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub input_rows: usize,
    pub excluded_by_user_profile: usize,
    pub excluded_by_changed_using: usize,
    pub retained_rows: usize,
}

impl FilterStats {
    pub fn excluded(&self) -> usize {
        self.excluded_by_user_profile + self.excluded_by_changed_using
    }
}

/// Removes rows whose user profile or change mechanism matches an exclusion rule
#[derive(Debug, Clone)]
pub struct CriteriaFilter {
    user_profile: Option<Regex>,
    changed_using: Option<Regex>,
}

impl CriteriaFilter {
    /// Compile the configured fragments into one alternation per column
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        Ok(Self {
            user_profile: compile(&config.user_profile_patterns, false)?,
            changed_using: compile(&config.changed_using_patterns, true)?,
        })
    }

    /// Why `row` would be removed, if it would. Empty cells never match.
    pub fn exclusion_reason(&self, columns: &ColumnMap, row: &[Cell]) -> Option<ExclusionReason> {
        if let Some(re) = &self.user_profile {
            let profile = columns.user_profile(row);
            if !profile.is_empty() && re.is_match(&profile) {
                return Some(ExclusionReason::UserProfile);
            }
        }
        if let Some(re) = &self.changed_using {
            let changed = columns.changed_using(row);
            if !changed.is_empty() && re.is_match(&changed) {
                return Some(ExclusionReason::ChangedUsing);
            }
        }
        None
    }

    /// Drop excluded rows in place, keeping order and columns
    #[instrument(skip_all, fields(rows = table.len()))]
    pub fn apply(&self, table: &mut Table, columns: &ColumnMap) -> FilterStats {
        let mut stats = FilterStats {
            input_rows: table.len(),
            ..FilterStats::default()
        };

        table.retain_rows(|row| match self.exclusion_reason(columns, row) {
            Some(ExclusionReason::UserProfile) => {
                stats.excluded_by_user_profile += 1;
                false
            }
            Some(ExclusionReason::ChangedUsing) => {
                stats.excluded_by_changed_using += 1;
                false
            }
            None => true,
        });
        stats.retained_rows = table.len();

        debug!(
            "user profile rule removed {}, changed-using rule removed {}",
            stats.excluded_by_user_profile, stats.excluded_by_changed_using
        );
        info!(
            "Filtered {} -> {} rows ({} excluded)",
            stats.input_rows,
            stats.retained_rows,
            stats.excluded()
        );
        stats
    }
}

fn compile(patterns: &[String], case_insensitive: bool) -> Result<Option<Regex>> {
    let parts: Vec<&str> = patterns
        .iter()
        .map(|p| p.as_str())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Ok(None);
    }
    // Group each fragment so an alternation inside one pattern stays local to it
    let joined = parts
        .iter()
        .map(|p| format!("(?:{p})"))
        .collect::<Vec<_>>()
        .join("|");
    let re = RegexBuilder::new(&joined)
        .case_insensitive(case_insensitive)
        .build()?;
    Ok(Some(re))
}
