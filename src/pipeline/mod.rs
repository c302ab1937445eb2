// Sampling pipeline: load -> filter -> quota -> priority sample -> dedup -> summarize -> export

pub mod export;
pub mod ingestion;
pub mod processing;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::{ColumnNames, Config};
use crate::error::Result;
use crate::metrics;
use crate::types::Table;

use self::export::Report;
use self::ingestion::{InputFormat, LoadedInput};
use self::processing::{
    assign_quotas, drop_duplicate_codes, summarize, CriteriaFilter, DedupStats, FilterStats,
    GroupDraw, PrioritySampler, Summary, SummaryDimension,
};

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    /// Seed the sampler RNG was built from; `None` when the caller supplied the RNG
    pub seed: Option<u64>,
    pub input_digest: String,
    pub filter: FilterStats,
    pub groups: Vec<GroupDraw>,
    /// Rows drawn before deduplication (the sum of all quotas)
    pub sampled_rows: usize,
    pub dedup: DedupStats,
    /// Filtered table with the derived quota column
    pub filtered: Table,
    pub final_sample: Table,
    pub category_summary: Summary,
    pub user_profile_summary: Summary,
}

impl PipelineResult {
    pub fn report(&self) -> Report<'_> {
        Report {
            final_sample: &self.final_sample,
            category_summary: &self.category_summary,
            user_profile_summary: &self.user_profile_summary,
        }
    }

    /// Groups whose final sample fell below quota because of deduplication
    pub fn short_groups(&self) -> Vec<(&str, usize, usize)> {
        self.groups
            .iter()
            .filter_map(|g| {
                let kept = self
                    .user_profile_summary
                    .row(&g.profile)
                    .map(|r| r.sample_count)
                    .unwrap_or(0);
                (kept < g.quota).then_some((g.profile.as_str(), kept, g.quota))
            })
            .collect()
    }
}

/// Configured pipeline; cheap to share across requests
#[derive(Debug, Clone)]
pub struct Pipeline {
    filter: CriteriaFilter,
    sampler: PrioritySampler,
    sample_percent: u32,
    columns: ColumnNames,
}

/// A fresh seed for production runs.
///
/// Kept to 53 bits so it round-trips through a JSON number in the browser.
pub fn fresh_seed() -> u64 {
    rand::random::<u64>() >> 11
}

impl Pipeline {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: CriteriaFilter::from_config(&config.filter)?,
            sampler: PrioritySampler::new(config.sampling.priority_set()),
            sample_percent: config.sampling.sample_percent,
            columns: config.columns.clone(),
        })
    }

    pub fn columns(&self) -> &ColumnNames {
        &self.columns
    }

    /// Parse `bytes` and run; a missing seed draws a fresh one
    pub fn run_bytes(&self, bytes: &[u8], format: InputFormat, seed: Option<u64>) -> Result<PipelineResult> {
        let input = ingestion::load_bytes(bytes, format, &self.columns)?;
        self.run_seeded(input, seed.unwrap_or_else(fresh_seed))
    }

    /// Read `path` and run; a missing seed draws a fresh one
    pub fn run_path(&self, path: &Path, seed: Option<u64>) -> Result<PipelineResult> {
        let input = ingestion::load_path(path, &self.columns)?;
        self.run_seeded(input, seed.unwrap_or_else(fresh_seed))
    }

    pub fn run_seeded(&self, input: LoadedInput, seed: u64) -> Result<PipelineResult> {
        info!("🎲 Sampling with seed {}", seed);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut result = self.run(input, &mut rng)?;
        result.seed = Some(seed);
        Ok(result)
    }

    /// Run every stage on an already validated input
    pub fn run<R: Rng + ?Sized>(&self, input: LoadedInput, rng: &mut R) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", run_id = %run_id);
        let _enter = span.enter();
        let started = Instant::now();

        let LoadedInput {
            mut table,
            columns,
            digest,
            ..
        } = input;

        // Step 1: Exclusion rules
        let filter = self.filter.apply(&mut table, &columns);
        if table.is_empty() {
            warn!("Every row matched an exclusion rule; the sample will be empty");
        }

        // Step 2: Per-profile quotas
        let plan = assign_quotas(&mut table, &columns, self.sample_percent)?;

        // Step 3: Priority sampling
        let draw = self.sampler.sample(&table, &columns, &plan, rng);
        let sampled_rows = draw.indices.len();

        // Step 4: Deduplicate external codes
        let mut final_sample = table.select(&draw.indices);
        let dedup = drop_duplicate_codes(&mut final_sample, &columns);

        // Step 5: Summaries against the filtered population
        let category_summary = summarize(
            &final_sample,
            &table,
            &columns,
            SummaryDimension::Category,
            &self.columns.module,
        );
        let user_profile_summary = summarize(
            &final_sample,
            &table,
            &columns,
            SummaryDimension::UserProfile,
            &self.columns.user_profile,
        );

        let result = PipelineResult {
            run_id,
            seed: None,
            input_digest: digest,
            filter,
            groups: draw.groups,
            sampled_rows,
            dedup,
            filtered: table,
            final_sample,
            category_summary,
            user_profile_summary,
        };

        for (profile, kept, quota) in result.short_groups() {
            warn!(profile = %profile, kept, quota, "group sample below quota after deduplication");
        }

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_run(&result, elapsed);
        info!(
            "✅ Run finished: {} rows in final sample ({} drawn, {} duplicates) in {:.3}s",
            result.final_sample.len(),
            result.sampled_rows,
            result.dedup.removed_rows,
            elapsed
        );
        Ok(result)
    }
}
