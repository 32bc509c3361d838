// ⚙️ Catalog Configuration - Thresholds, policy and tables
//
// Loaded from an optional JSON file (every field has a default), then
// overridden by AGENCY_* environment variables, then validated.

use crate::agency_type::AgencyKind;
use crate::error::ConfigError;
use crate::normalizer::{NormalizerConfig, StAbbreviation};
use crate::registry::{AmbiguityPolicy, MatchSettings};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

pub const ENV_MATCH_THRESHOLD: &str = "AGENCY_MATCH_THRESHOLD";
pub const ENV_AMBIGUITY_POLICY: &str = "AGENCY_AMBIGUITY_POLICY";
pub const ENV_ST_EXPANSION: &str = "AGENCY_ST_EXPANSION";
pub const ENV_LOG_LEVEL: &str = "AGENCY_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Fuzzy ratio (0-100) a name must exceed to count as a possible duplicate
    pub match_threshold: f64,

    pub ambiguity_policy: AmbiguityPolicy,

    /// Phrases ignored when comparing base names
    pub noise_tokens: Vec<String>,

    /// Agency kinds told apart by the words after their type phrase
    pub qualified_kinds: Vec<AgencyKind>,

    /// Jurisdictions where tied fuzzy matches are told apart by qualifier
    pub qualifier_jurisdictions: Vec<String>,

    /// Catalog marker for rows covering several agencies
    pub multi_marker: String,

    /// Catalog marker for rows with no agency
    pub na_marker: String,

    pub normalizer: NormalizerConfig,

    pub log_level: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let settings = MatchSettings::default();
        CatalogConfig {
            match_threshold: settings.match_threshold,
            ambiguity_policy: settings.ambiguity_policy,
            noise_tokens: settings.noise_tokens,
            qualified_kinds: settings.qualified_kinds,
            qualifier_jurisdictions: settings.qualifier_jurisdictions,
            multi_marker: "MULTIPLE".to_string(),
            na_marker: "NONE".to_string(),
            normalizer: NormalizerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl CatalogConfig {
    /// Defaults, or the given file, with environment overrides applied
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: CatalogConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON: {}", path.display()))?;

        Ok(config)
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn with_overrides<F>(mut self, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = var(ENV_MATCH_THRESHOLD) {
            self.match_threshold = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_MATCH_THRESHOLD,
                value: value.clone(),
            })?;
        }

        if let Some(value) = var(ENV_AMBIGUITY_POLICY) {
            self.ambiguity_policy =
                AmbiguityPolicy::parse(&value).ok_or_else(|| ConfigError::InvalidEnv {
                    name: ENV_AMBIGUITY_POLICY,
                    value: value.clone(),
                })?;
        }

        if let Some(value) = var(ENV_ST_EXPANSION) {
            self.normalizer.st_abbreviation =
                StAbbreviation::parse(&value).ok_or_else(|| ConfigError::InvalidEnv {
                    name: ENV_ST_EXPANSION,
                    value: value.clone(),
                })?;
        }

        if let Some(value) = var(ENV_LOG_LEVEL) {
            self.log_level = value;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.match_threshold) {
            return Err(ConfigError::ThresholdOutOfRange {
                field: "match_threshold",
                value: self.match_threshold,
            });
        }

        if self.qualifier_jurisdictions.iter().any(|j| j.trim().is_empty()) {
            return Err(ConfigError::EmptyJurisdiction {
                field: "qualifier_jurisdictions",
            });
        }

        Ok(())
    }

    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            match_threshold: self.match_threshold,
            noise_tokens: self.noise_tokens.clone(),
            qualified_kinds: self.qualified_kinds.clone(),
            qualifier_jurisdictions: self.qualifier_jurisdictions.clone(),
            ambiguity_policy: self.ambiguity_policy,
        }
    }

    /// Catalog row standing for several agencies
    pub fn is_multi_marker(&self, value: &str) -> bool {
        value.trim().eq_ignore_ascii_case(&self.multi_marker)
    }

    /// Catalog row with no agency
    pub fn is_na_marker(&self, value: &str) -> bool {
        value.trim().eq_ignore_ascii_case(&self.na_marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var(ENV_MATCH_THRESHOLD);
        env::remove_var(ENV_AMBIGUITY_POLICY);
        env::remove_var(ENV_ST_EXPANSION);
        env::remove_var(ENV_LOG_LEVEL);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.match_threshold, 86.0);
        assert_eq!(config.ambiguity_policy, AmbiguityPolicy::Flag);
        assert_eq!(config.noise_tokens, vec!["County", "University Of"]);
        assert_eq!(config.qualified_kinds, vec![AgencyKind::Prison]);
        assert_eq!(config.multi_marker, "MULTIPLE");
        assert_eq!(config.na_marker, "NONE");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: CatalogConfig = serde_json::from_str(
            r#"{"match_threshold": 90, "ambiguity_policy": "fail", "normalizer": {"st_abbreviation": "saint"}}"#,
        )
        .unwrap();

        assert_eq!(config.match_threshold, 90.0);
        assert_eq!(config.ambiguity_policy, AmbiguityPolicy::Fail);
        assert_eq!(config.normalizer.st_abbreviation, StAbbreviation::Saint);
        assert!(!config.normalizer.replacements.is_empty());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides_apply() {
        let config = CatalogConfig::default()
            .with_overrides(vars(&[
                (ENV_MATCH_THRESHOLD, "75.5"),
                (ENV_AMBIGUITY_POLICY, "SKIP"),
                (ENV_ST_EXPANSION, "state"),
                (ENV_LOG_LEVEL, "debug"),
            ]))
            .unwrap();

        assert_eq!(config.match_threshold, 75.5);
        assert_eq!(config.ambiguity_policy, AmbiguityPolicy::Skip);
        assert_eq!(config.normalizer.st_abbreviation, StAbbreviation::State);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_override_rejected() {
        let err = CatalogConfig::default()
            .with_overrides(vars(&[(ENV_AMBIGUITY_POLICY, "maybe")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                name: ENV_AMBIGUITY_POLICY,
                value: "maybe".to_string()
            }
        );

        let err = CatalogConfig::default()
            .with_overrides(vars(&[(ENV_MATCH_THRESHOLD, "high")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: ENV_MATCH_THRESHOLD, .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = CatalogConfig {
            match_threshold: 120.0,
            ..CatalogConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange { .. })
        ));

        let config = CatalogConfig {
            qualifier_jurisdictions: vec!["CA".to_string(), " ".to_string()],
            ..CatalogConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyJurisdiction { .. })
        ));
    }

    #[test]
    fn test_load_reads_environment() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var(ENV_MATCH_THRESHOLD, "92");

        let config = CatalogConfig::load(None).expect("config loads");
        assert_eq!(config.match_threshold, 92.0);

        env::set_var(ENV_MATCH_THRESHOLD, "101");
        assert!(CatalogConfig::load(None).is_err());
        reset_env();
    }

    #[test]
    fn test_markers() {
        let config = CatalogConfig::default();
        assert!(config.is_multi_marker("MULTIPLE"));
        assert!(config.is_na_marker(" none "));
        assert!(!config.is_multi_marker("NONE"));
        assert!(!config.is_na_marker("Mesa Police Department"));
    }
}
