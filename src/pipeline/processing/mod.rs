// Pipeline processing: exclusion filter, quotas, priority sampling, dedup and summaries

pub mod dedup;
pub mod filter;
pub mod quota;
pub mod sampler;
pub mod summary;

pub use dedup::{drop_duplicate_codes, DedupStats};
pub use filter::{CriteriaFilter, FilterStats};
pub use quota::{assign_quotas, quota_for, QuotaPlan};
pub use sampler::{GroupDraw, PrioritySampler, SampleDraw};
pub use summary::{summarize, Summary, SummaryDimension, SummaryRow};
