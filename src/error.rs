// ⚠️ Error Types - Skips, ambiguity, lookups, configuration
//
// Normalization skips are local (one name is dropped). Ambiguity is fatal only
// under the `fail` policy. Lookup mismatches are collected per record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Why a raw name could not be turned into exactly one agency name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Nothing left after trimming
    Empty,

    /// "Department" appears more than once: several organizations concatenated
    RepeatedDepartment,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Empty => "empty name",
            SkipReason::RepeatedDepartment => "multiple departments in one name",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("skipping agency name {raw:?}: {reason}")]
pub struct NormalizationSkip {
    pub raw: String,
    pub reason: SkipReason,
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("jurisdiction is empty for agency {name:?}")]
    InvalidJurisdiction { name: String },

    #[error("cannot decide whether {name:?} ({jurisdiction}) duplicates any of {candidates:?}")]
    AmbiguousMatch {
        name: String,
        jurisdiction: String,
        candidates: Vec<String>,
    },
}

// ============================================================================
// CODE LOOKUP
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("code {code:?} matched {matches} rows in the lookup table, expected exactly 1")]
    Mismatch { code: String, matches: usize },

    #[error("lookup table has no column named {column:?}")]
    MissingColumn { column: String },

    #[error("code {code:?} needs a lookup table but none was configured")]
    NoLookup { code: String },
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be within 0..=100, got {value}")]
    ThresholdOutOfRange { field: &'static str, value: f64 },

    #[error("{field} contains an empty jurisdiction code")]
    EmptyJurisdiction { field: &'static str },

    #[error("{name} has an invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}
