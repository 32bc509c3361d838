// Agency Catalog - Core Library
// Normalizes police agency names and counts distinct agencies per jurisdiction

pub mod error;
pub mod normalizer;   // Raw name → canonical name
pub mod agency_type;  // Type suffixes, base names
pub mod similarity;   // Fuzzy ratio
pub mod rules;        // Tie-break rules for fuzzy matches
pub mod registry;     // consider(name, jurisdiction)
pub mod lookup;       // ORI code → name
pub mod batch;        // Catalog + agency lists → report
pub mod config;
pub mod telemetry;

// Re-export commonly used types
pub use error::{
    ConfigError, LookupError, NormalizationSkip, RegistryError, SkipReason,
};
pub use normalizer::{
    normalize, Normalizer, NormalizerConfig, Replacement, StAbbreviation,
};
pub use agency_type::{
    classify, clean, AgencyKind, AgencyName, AgencyTypeTable, AGENCY_TYPE_SUFFIXES,
};
pub use similarity::ratio;
pub use rules::{
    MatchRule, RuleEngine, RuleKind, RuleMatch, Verdict,
};
pub use registry::{
    Action, AmbiguityPolicy, Decision, MatchSettings,
    Registry, RegistryEntry, RegistrySnapshot, ReviewFlag,
};
pub use lookup::CodeLookup;
pub use batch::{
    AgencyListRow, AgencyRecord, AgencyValue, BatchCounts, BatchReport,
    BatchRunner, CatalogRow, ItemError,
};
pub use config::CatalogConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
