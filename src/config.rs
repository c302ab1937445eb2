use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{Result, SamplerError};
use crate::pipeline::export::OutputFormat;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub filter: FilterConfig,
    pub columns: ColumnNames,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

/// Quota and priority settings for the sampler
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    /// Share of each user-profile group to sample, in whole percent (rounded up per group)
    pub sample_percent: u32,
    /// Module labels drawn ahead of all others
    pub priority_modules: Vec<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_percent: constants::DEFAULT_SAMPLE_PERCENT,
            priority_modules: constants::default_priority_modules(),
        }
    }
}

impl SamplingConfig {
    pub fn priority_set(&self) -> BTreeSet<String> {
        self.priority_modules.iter().cloned().collect()
    }
}

/// Exclusion rules applied before grouping
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Regex fragments; a user profile containing any of them is excluded (case-sensitive)
    pub user_profile_patterns: Vec<String>,
    /// Regex fragments; a "Changed Using" value containing any of them is excluded (case-insensitive)
    pub changed_using_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            user_profile_patterns: constants::DEFAULT_USER_PROFILE_EXCLUSIONS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            changed_using_patterns: constants::DEFAULT_CHANGED_USING_EXCLUSIONS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Header names of the columns the pipeline reads
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnNames {
    pub user_profile: String,
    pub changed_using: String,
    pub module: String,
    pub external_code: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            user_profile: constants::USER_PROFILE_COLUMN.to_string(),
            changed_using: constants::CHANGED_USING_COLUMN.to_string(),
            module: constants::MODULE_COLUMN.to_string(),
            external_code: constants::EXTERNAL_CODE_COLUMN.to_string(),
        }
    }
}

impl ColumnNames {
    pub fn all(&self) -> [&str; 4] {
        [
            self.user_profile.as_str(),
            self.changed_using.as_str(),
            self.module.as_str(),
            self.external_code.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_OUTPUT_FILE),
            format: OutputFormat::Xlsx,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: constants::DEFAULT_SERVER_PORT,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `audit_sampler.toml` in the working
    /// directory when present, falling back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(constants::DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SamplerError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.sampling.sample_percent) {
            return Err(SamplerError::Config(format!(
                "sampling.sample_percent must be between 1 and 100, got {}",
                self.sampling.sample_percent
            )));
        }

        let names = self.columns.all();
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(SamplerError::Config(
                "column names must not be empty".to_string(),
            ));
        }
        let distinct: BTreeSet<&str> = names.iter().copied().collect();
        if distinct.len() != names.len() {
            return Err(SamplerError::Config(
                "column names must be distinct".to_string(),
            ));
        }

        // Compile once here so bad patterns fail before any input is read
        crate::pipeline::processing::filter::CriteriaFilter::from_config(&self.filter)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_rules() {
        let config = Config::default();
        assert_eq!(config.sampling.sample_percent, 20);
        assert!(config.sampling.priority_set().contains("BEER"));
        assert_eq!(config.filter.user_profile_patterns, vec!["OGRDS SYSTEM"]);
        assert_eq!(config.columns.external_code, "External Code");
        assert_eq!(config.output.format, OutputFormat::Xlsx);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [sampling]
            sample_percent = 50
            priority_modules = ["WINE"]

            [output]
            format = "csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.sampling.sample_percent, 50);
        assert_eq!(config.sampling.priority_modules, vec!["WINE"]);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.columns.module, "Module");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_rejects_out_of_range_percent() {
        let mut config = Config::default();
        config.sampling.sample_percent = 0;
        assert!(matches!(config.validate(), Err(SamplerError::Config(_))));

        config.sampling.sample_percent = 101;
        assert!(matches!(config.validate(), Err(SamplerError::Config(_))));
    }

    #[test]
    fn test_rejects_invalid_pattern() {
        let mut config = Config::default();
        config.filter.changed_using_patterns = vec!["(unclosed".to_string()];
        assert!(matches!(config.validate(), Err(SamplerError::Pattern(_))));
    }

    #[test]
    fn test_rejects_duplicate_column_names() {
        let mut config = Config::default();
        config.columns.module = config.columns.user_profile.clone();
        assert!(matches!(config.validate(), Err(SamplerError::Config(_))));
    }

    #[test]
    fn test_unknown_keys_are_errors() {
        let result = Config::from_toml_str("[sampling]\nfraction = 0.2\n");
        assert!(matches!(result, Err(SamplerError::Toml(_))));
    }

    #[test]
    fn test_explicit_missing_file_is_config_error() {
        let result = Config::load(Some(Path::new("/nonexistent/audit_sampler.toml")));
        assert!(matches!(result, Err(SamplerError::Config(_))));
    }
}
