//! Priority-weighted stratified sampling.
//!
//! Each user-profile group is sampled independently to exactly its quota. Rows in a
//! priority module are preferred: when a group has at least `quota` of them, the
//! sample is drawn from those rows alone. Otherwise every priority row is kept and
//! the shortfall is drawn from the group's remaining (non-priority) rows.
//!
//! All draws are uniform and without replacement, and come from the caller's RNG so
//! a fixed seed reproduces a run.

use rand::Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

use crate::types::{ColumnMap, Table};

use super::quota::{Group, QuotaPlan};

/// What the sampler did for one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDraw {
    pub profile: String,
    pub size: usize,
    pub quota: usize,
    pub priority_available: usize,
    pub priority_taken: usize,
    pub fallback_taken: usize,
}

impl GroupDraw {
    pub fn drawn(&self) -> usize {
        self.priority_taken + self.fallback_taken
    }

    /// True when the group had enough priority rows to fill its quota alone
    pub fn priority_only(&self) -> bool {
        self.priority_available >= self.quota
    }
}

/// Selected rows of the filtered table plus per-group accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleDraw {
    /// Row positions in the filtered table: groups in key order, rows ascending within a group
    pub indices: Vec<usize>,
    pub groups: Vec<GroupDraw>,
}

#[derive(Debug, Clone)]
pub struct PrioritySampler {
    priority_modules: BTreeSet<String>,
}

impl PrioritySampler {
    pub fn new(priority_modules: BTreeSet<String>) -> Self {
        Self { priority_modules }
    }

    pub fn is_priority(&self, module: &str) -> bool {
        self.priority_modules.contains(module)
    }

    /// Draw every group's quota from `table`
    #[instrument(skip_all, fields(groups = plan.groups.len()))]
    pub fn sample<R: Rng + ?Sized>(
        &self,
        table: &Table,
        columns: &ColumnMap,
        plan: &QuotaPlan,
        rng: &mut R,
    ) -> SampleDraw {
        let mut draw = SampleDraw::default();
        for group in &plan.groups {
            let (mut chosen, stats) = self.sample_group(table, columns, group, rng);
            chosen.sort_unstable();
            draw.indices.extend(chosen);
            draw.groups.push(stats);
        }

        let priority_only = draw.groups.iter().filter(|g| g.priority_only()).count();
        info!(
            "Sampled {} rows across {} groups ({} filled from priority modules alone)",
            draw.indices.len(),
            draw.groups.len(),
            priority_only
        );
        draw
    }

    fn sample_group<R: Rng + ?Sized>(
        &self,
        table: &Table,
        columns: &ColumnMap,
        group: &Group,
        rng: &mut R,
    ) -> (Vec<usize>, GroupDraw) {
        let (priority, others): (Vec<usize>, Vec<usize>) = group.rows.iter().partition(|&&i| {
            table
                .row(i)
                .map(|row| self.is_priority(&columns.module(row)))
                .unwrap_or(false)
        });

        let required = group.quota;
        let (chosen, priority_taken, fallback_taken) = if priority.len() >= required {
            (draw_without_replacement(&priority, required, rng), required, 0)
        } else {
            let shortfall = required - priority.len();
            let mut chosen = priority.clone();
            chosen.extend(draw_without_replacement(&others, shortfall, rng));
            (chosen, priority.len(), shortfall)
        };

        debug!(
            profile = %group.key,
            size = group.size(),
            quota = required,
            priority_available = priority.len(),
            priority_taken,
            fallback_taken,
            "group sampled"
        );

        let stats = GroupDraw {
            profile: group.key.clone(),
            size: group.size(),
            quota: required,
            priority_available: priority.len(),
            priority_taken,
            fallback_taken,
        };
        (chosen, stats)
    }
}

/// Uniformly pick `amount` entries of `pool`; `amount` is clamped to the pool size
fn draw_without_replacement<R: Rng + ?Sized>(pool: &[usize], amount: usize, rng: &mut R) -> Vec<usize> {
    let amount = amount.min(pool.len());
    rand::seq::index::sample(rng, pool.len(), amount)
        .into_iter()
        .map(|i| pool[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnNames;
    use crate::pipeline::processing::quota::assign_quotas;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixture(rows: &[(&str, &str)]) -> (Table, ColumnMap, QuotaPlan) {
        let codes: Vec<String> = (0..rows.len()).map(|i| format!("C{i}")).collect();
        let data: Vec<Vec<&str>> = rows
            .iter()
            .zip(&codes)
            .map(|((profile, module), code)| vec![*profile, "Manual", *module, code.as_str()])
            .collect();
        let mut table = Table::from_strings(
            &["User Profile", "Changed Using", "Module", "External Code"],
            &data,
        );
        let columns = ColumnMap::resolve(&table, &ColumnNames::default()).unwrap();
        let plan = assign_quotas(&mut table, &columns, 20).unwrap();
        (table, columns, plan)
    }

    fn sampler() -> PrioritySampler {
        PrioritySampler::new(["BEER".to_string()].into_iter().collect())
    }

    #[test]
    fn test_priority_rows_fill_quota_alone() {
        // 10 rows, 3 priority, quota 2
        let mut rows = vec![("a", "WINE"); 7];
        rows.extend(vec![("a", "BEER"); 3]);
        let (table, columns, plan) = fixture(&rows);
        let mut rng = StdRng::seed_from_u64(7);

        let draw = sampler().sample(&table, &columns, &plan, &mut rng);

        assert_eq!(draw.indices.len(), 2);
        for &i in &draw.indices {
            assert_eq!(columns.module(&table.rows()[i]), "BEER");
        }
        assert_eq!(draw.groups[0].priority_taken, 2);
        assert_eq!(draw.groups[0].fallback_taken, 0);
        assert!(draw.groups[0].priority_only());
    }

    #[test]
    fn test_all_priority_rows_kept_when_short() {
        // 15 rows, 1 priority, quota 3
        let mut rows = vec![("a", "WINE"); 14];
        rows.insert(5, ("a", "BEER"));
        let (table, columns, plan) = fixture(&rows);

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let draw = sampler().sample(&table, &columns, &plan, &mut rng);
            assert_eq!(draw.indices.len(), 3);
            assert!(draw.indices.contains(&5));
            let distinct: BTreeSet<usize> = draw.indices.iter().copied().collect();
            assert_eq!(distinct.len(), 3);
            assert_eq!(draw.groups[0].fallback_taken, 2);
        }
    }

    #[test]
    fn test_no_priority_rows_draws_uniformly() {
        let rows = vec![("a", "WINE"); 5];
        let (table, columns, plan) = fixture(&rows);

        let mut seen = BTreeSet::new();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let draw = sampler().sample(&table, &columns, &plan, &mut rng);
            assert_eq!(draw.indices.len(), 1);
            seen.insert(draw.indices[0]);
        }
        // Every row is reachable
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_groups_emitted_in_key_order_rows_ascending() {
        let rows = vec![
            ("zed", "WINE"),
            ("amy", "WINE"),
            ("zed", "BEER"),
            ("amy", "BEER"),
            ("zed", "WINE"),
            ("amy", "WINE"),
            ("amy", "WINE"),
            ("amy", "WINE"),
            ("amy", "WINE"),
            ("amy", "BEER"),
        ];
        let (table, columns, plan) = fixture(&rows);
        let mut rng = StdRng::seed_from_u64(1);

        let draw = sampler().sample(&table, &columns, &plan, &mut rng);

        let profiles: Vec<&str> = draw.groups.iter().map(|g| g.profile.as_str()).collect();
        assert_eq!(profiles, vec!["amy", "zed"]);
        // amy: 7 rows -> quota 2, two BEER rows available -> exactly those
        assert_eq!(&draw.indices[..2], &[3, 9]);
        // zed: 3 rows -> quota 1, its single BEER row
        assert_eq!(&draw.indices[2..], &[2]);
    }

    #[test]
    fn test_same_seed_same_sample() {
        let rows: Vec<(&str, &str)> = (0..40)
            .map(|i| (if i % 2 == 0 { "a" } else { "b" }, if i % 5 == 0 { "BEER" } else { "WINE" }))
            .collect();
        let (table, columns, plan) = fixture(&rows);

        let first = sampler().sample(&table, &columns, &plan, &mut StdRng::seed_from_u64(99));
        let second = sampler().sample(&table, &columns, &plan, &mut StdRng::seed_from_u64(99));
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_plan_yields_empty_draw() {
        let table = Table::from_strings(&["User Profile", "Changed Using", "Module", "External Code"], &[]);
        let columns = ColumnMap::resolve(&table, &ColumnNames::default()).unwrap();
        let draw = sampler().sample(&table, &columns, &QuotaPlan::default(), &mut StdRng::seed_from_u64(0));
        assert!(draw.indices.is_empty());
        assert!(draw.groups.is_empty());
    }
}
