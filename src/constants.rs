/// Column, sheet and rule constants shared across the pipeline.
/// Defaults here feed `Config::default()`; everything except the sheet layout is overridable.

// Required input columns (exact, case-sensitive header text)
pub const USER_PROFILE_COLUMN: &str = "User Profile";
pub const CHANGED_USING_COLUMN: &str = "Changed Using";
pub const MODULE_COLUMN: &str = "Module";
pub const EXTERNAL_CODE_COLUMN: &str = "External Code";

/// Derived column appended by the quota stage and carried into the final sample
pub const QUOTA_COLUMN: &str = "20_percent_entries";

// Output sections
pub const FINAL_SAMPLE_SHEET: &str = "Final Sample";
pub const CATEGORY_SUMMARY_SHEET: &str = "Category Summary";
pub const USER_PROFILE_SUMMARY_SHEET: &str = "User Profile Summary";

// Summary headers (the key header is the dimension's column name)
pub const SAMPLE_COUNT_HEADER: &str = "Sample Count";
pub const TOTAL_VOLUME_HEADER: &str = "Total Volume";
pub const PERCENTAGE_HEADER: &str = "Percentage";

pub const DEFAULT_SAMPLE_PERCENT: u32 = 20;
pub const DEFAULT_OUTPUT_FILE: &str = "final_sample_with_summary.xlsx";
pub const DEFAULT_CONFIG_FILE: &str = "audit_sampler.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Exclusion fragments matched case-sensitively against the user profile
pub const DEFAULT_USER_PROFILE_EXCLUSIONS: &[&str] = &["OGRDS SYSTEM"];

/// Exclusion fragments matched case-insensitively against "Changed Using"
pub const DEFAULT_CHANGED_USING_EXCLUSIONS: &[&str] = &["ITEM CODING", "SURGERY"];

/// Modules sampled ahead of everything else
pub const DEFAULT_PRIORITY_MODULES: &[&str] = &[
    "BEER",
    "HEALTH & PERFORMANCE POWDER",
    "DOG FOOD WET",
    "UNCODEABLE",
    "FOOD (DETAIL UNKNOWN)",
    "NPD LOW SALES",
    "UNCLASSIFIED SERVICES TOTAL",
];

/// Get the default priority modules as owned labels
pub fn default_priority_modules() -> Vec<String> {
    DEFAULT_PRIORITY_MODULES.iter().map(|m| m.to_string()).collect()
}
