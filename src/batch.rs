// 📦 Batch Runner - Feed catalog rows and agency lists through the registry
//
// Input order is preserved: the registry's decisions depend on everything
// that came before.
//
// Per-item problems (unresolvable codes, empty jurisdictions) are collected
// in the report. Only an ambiguous match under the `fail` policy stops the run.

use crate::config::CatalogConfig;
use crate::error::{LookupError, RegistryError};
use crate::lookup::CodeLookup;
use crate::registry::{Action, Decision, Registry, ReviewFlag};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// INPUT ROWS
// ============================================================================

/// One row of the source catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    #[serde(rename = "State")]
    pub state: String,

    /// Short agency name, or a MULTIPLE / NONE marker
    #[serde(rename = "Agency")]
    pub agency: String,

    #[serde(rename = "AgencyFull", default)]
    pub agency_full: String,

    #[serde(rename = "SourceName", default)]
    pub source_name: Option<String>,
}

impl CatalogRow {
    /// Name fed to the registry: the full name when present
    pub fn agency_name(&self) -> &str {
        if self.agency_full.trim().is_empty() {
            &self.agency
        } else {
            &self.agency_full
        }
    }
}

/// One distinct agency value from a multi-agency dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyListRow {
    #[serde(rename = "State")]
    pub state: String,

    #[serde(rename = "Agency")]
    pub agency: String,
}

pub fn read_catalog<R: Read>(reader: R) -> Result<Vec<CatalogRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for result in rdr.deserialize() {
        let row: CatalogRow = result.context("Failed to deserialize catalog row")?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open catalog file: {}", path.display()))?;
    read_catalog(file).with_context(|| format!("Failed to load catalog: {}", path.display()))
}

pub fn read_agency_list<R: Read>(reader: R) -> Result<Vec<AgencyListRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for result in rdr.deserialize() {
        let row: AgencyListRow = result.context("Failed to deserialize agency list row")?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn load_agency_list(path: &Path) -> Result<Vec<AgencyListRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open agency list: {}", path.display()))?;
    read_agency_list(file).with_context(|| format!("Failed to load agency list: {}", path.display()))
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AgencyValue {
    Name(String),

    /// Needs the code lookup to become a name
    Code(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgencyRecord {
    pub jurisdiction: String,
    pub value: AgencyValue,

    /// Where the record came from (file or dataset name), for error reports
    pub source: String,
}

impl AgencyRecord {
    pub fn name(jurisdiction: &str, name: &str, source: &str) -> Self {
        AgencyRecord {
            jurisdiction: jurisdiction.to_string(),
            value: AgencyValue::Name(name.to_string()),
            source: source.to_string(),
        }
    }

    pub fn code(jurisdiction: &str, code: &str, source: &str) -> Self {
        AgencyRecord {
            jurisdiction: jurisdiction.to_string(),
            value: AgencyValue::Code(code.to_string()),
            source: source.to_string(),
        }
    }

    fn raw_value(&self) -> &str {
        match &self.value {
            AgencyValue::Name(v) | AgencyValue::Code(v) => v,
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub catalog_rows: usize,
    pub multi_rows: usize,
    pub not_applicable_rows: usize,
    pub records: usize,
    pub filtered: usize,
    pub repeat: usize,
    pub added: usize,
    pub replaced: usize,
    pub duplicate: usize,
    pub skipped: usize,
    pub ambiguous: usize,
    pub errors: usize,
}

impl BatchCounts {
    fn record(&mut self, action: Action) {
        match action {
            Action::Added => self.added += 1,
            Action::Replaced => self.replaced += 1,
            Action::Duplicate => self.duplicate += 1,
            Action::Skipped => self.skipped += 1,
            Action::Ambiguous => self.ambiguous += 1,
        }
    }
}

/// A record that could not be considered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    pub source: String,
    pub jurisdiction: String,
    pub value: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub agency_count: usize,
    pub jurisdiction_count: usize,
    pub counts: BatchCounts,
    pub review: Vec<ReviewFlag>,
    pub errors: Vec<ItemError>,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!(
            "Catalog contains data for {} police agencies",
            self.agency_count
        )
    }

    pub fn details(&self) -> String {
        let c = &self.counts;
        format!(
            "{} records: {} added, {} replaced, {} duplicate, {} repeat | {} skipped, {} filtered, {} ambiguous, {} errors",
            c.records, c.added, c.replaced, c.duplicate, c.repeat, c.skipped, c.filtered, c.ambiguous, c.errors
        )
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize batch report")
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }
}

// ============================================================================
// RUNNER
// ============================================================================

pub struct BatchRunner {
    registry: Registry,
    lookup: Option<CodeLookup>,
    config: CatalogConfig,
    seen: HashSet<(String, String)>,
    counts: BatchCounts,
    errors: Vec<ItemError>,
}

impl BatchRunner {
    pub fn new(registry: Registry, config: &CatalogConfig) -> Self {
        BatchRunner {
            registry,
            lookup: None,
            config: config.clone(),
            seen: HashSet::new(),
            counts: BatchCounts::default(),
            errors: Vec::new(),
        }
    }

    pub fn with_lookup(mut self, lookup: CodeLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Single-agency catalog rows. MULTIPLE / NONE rows are counted, not considered.
    pub fn add_catalog(&mut self, rows: &[CatalogRow]) -> Result<(), RegistryError> {
        for row in rows {
            self.counts.catalog_rows += 1;

            if self.config.is_multi_marker(&row.agency) {
                self.counts.multi_rows += 1;
                continue;
            }
            if self.config.is_na_marker(&row.agency) {
                self.counts.not_applicable_rows += 1;
                continue;
            }

            let source = row.source_name.as_deref().unwrap_or("catalog");
            self.process(&AgencyRecord::name(&row.state, row.agency_name(), source))?;
        }

        info!(
            rows = rows.len(),
            agencies = self.registry.len(),
            "processed catalog"
        );
        Ok(())
    }

    /// Agency names listed by a multi-agency dataset
    pub fn add_agency_names(&mut self, rows: &[AgencyListRow], source: &str) -> Result<(), RegistryError> {
        for row in rows {
            self.process(&AgencyRecord::name(&row.state, &row.agency, source))?;
        }

        info!(source, rows = rows.len(), agencies = self.registry.len(), "processed agency list");
        Ok(())
    }

    /// Agency codes listed by a multi-agency dataset, resolved through the lookup
    pub fn add_agency_codes(&mut self, rows: &[AgencyListRow], source: &str) -> Result<(), RegistryError> {
        for row in rows {
            self.process(&AgencyRecord::code(&row.state, &row.agency, source))?;
        }

        info!(source, rows = rows.len(), agencies = self.registry.len(), "processed agency code list");
        Ok(())
    }

    /// Consider one record. `Ok(None)` when it never reached the registry
    /// (filtered, repeated or unresolvable).
    pub fn process(&mut self, record: &AgencyRecord) -> Result<Option<Decision>, RegistryError> {
        self.counts.records += 1;

        let name = match self.resolve(record) {
            Ok(name) => name,
            Err(err) => {
                self.item_error(record, err.to_string());
                return Ok(None);
            }
        };

        let name = name.trim();
        if name.chars().count() <= 1 {
            self.counts.filtered += 1;
            return Ok(None);
        }

        let key = (name.to_string(), record.jurisdiction.trim().to_ascii_uppercase());
        if !self.seen.insert(key) {
            self.counts.repeat += 1;
            return Ok(None);
        }

        match self.registry.consider(name, &record.jurisdiction) {
            Ok(decision) => {
                self.counts.record(decision.action);
                Ok(Some(decision))
            }
            Err(err @ RegistryError::InvalidJurisdiction { .. }) => {
                self.item_error(record, err.to_string());
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn resolve(&self, record: &AgencyRecord) -> Result<String, LookupError> {
        match &record.value {
            AgencyValue::Name(name) => Ok(name.clone()),
            AgencyValue::Code(code) => match &self.lookup {
                Some(lookup) => lookup.resolve(code).map(str::to_string),
                None => Err(LookupError::NoLookup { code: code.clone() }),
            },
        }
    }

    fn item_error(&mut self, record: &AgencyRecord, message: String) {
        warn!(
            source = %record.source,
            jurisdiction = %record.jurisdiction,
            value = record.raw_value(),
            error = %message,
            "agency record not considered"
        );

        self.counts.errors += 1;
        self.errors.push(ItemError {
            source: record.source.clone(),
            jurisdiction: record.jurisdiction.clone(),
            value: record.raw_value().to_string(),
            message,
        });
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn counts(&self) -> &BatchCounts {
        &self.counts
    }

    pub fn errors(&self) -> &[ItemError] {
        &self.errors
    }

    pub fn report(&self) -> BatchReport {
        BatchReport {
            generated_at: Utc::now(),
            agency_count: self.registry.len(),
            jurisdiction_count: self.registry.jurisdiction_count(),
            counts: self.counts.clone(),
            review: self.registry.review_queue().to_vec(),
            errors: self.errors.clone(),
        }
    }

}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AmbiguityPolicy;
    use crate::rules::RuleEngine;

    const CATALOG: &str = "\
State,SourceName,Agency,AgencyFull,TableType
IL,Springfield,Springfield,springfield pd,STOPS
IL,Springfield,Springfield,springfield pd,ARRESTS
IL,Springfield,Springfield,Springfield Police,CALLS
CA,California,MULTIPLE,,USE OF FORCE
CA,Yolo County,Yolo County,Yolo Co. So,ARRESTS
US,Federal,NONE,,DEATHS
";

    fn runner(policy: AmbiguityPolicy) -> BatchRunner {
        let config = CatalogConfig {
            ambiguity_policy: policy,
            ..CatalogConfig::default()
        };
        let registry = Registry::from_config(&config, RuleEngine::with_defaults());
        BatchRunner::new(registry, &config)
    }

    #[test]
    fn test_catalog_counts() {
        let rows = read_catalog(CATALOG.as_bytes()).unwrap();
        assert_eq!(rows.len(), 6);

        let mut runner = runner(AmbiguityPolicy::Flag);
        runner.add_catalog(&rows).unwrap();

        let counts = runner.counts();
        assert_eq!(counts.catalog_rows, 6);
        assert_eq!(counts.multi_rows, 1);
        assert_eq!(counts.not_applicable_rows, 1);
        assert_eq!(counts.repeat, 1);
        assert_eq!(counts.added, 2);
        assert_eq!(counts.duplicate, 1);

        let report = runner.report();
        assert_eq!(report.agency_count, 2);
        assert_eq!(report.summary(), "Catalog contains data for 2 police agencies");
    }

    #[test]
    fn test_configured_markers() {
        let config = CatalogConfig {
            multi_marker: "MULTI".to_string(),
            na_marker: "N/A".to_string(),
            ..CatalogConfig::default()
        };
        let registry = Registry::from_config(&config, RuleEngine::with_defaults());
        let mut runner = BatchRunner::new(registry, &config);

        let rows = read_catalog(
            "State,Agency,AgencyFull\nAZ,multi,\nAZ,n/a,\nAZ,Mesa PD,\n".as_bytes(),
        )
        .unwrap();
        runner.add_catalog(&rows).unwrap();

        let counts = runner.counts();
        assert_eq!(counts.multi_rows, 1);
        assert_eq!(counts.not_applicable_rows, 1);
        assert_eq!(counts.added, 1);
        assert_eq!(runner.registry().entries()[0].name, "Mesa Police Department");
    }

    #[test]
    fn test_catalog_row_falls_back_to_short_name() {
        let rows = read_catalog("State,Agency\nAZ,Mesa PD\n".as_bytes()).unwrap();
        assert_eq!(rows[0].agency_name(), "Mesa PD");
        assert_eq!(rows[0].source_name, None);

        let mut runner = runner(AmbiguityPolicy::Flag);
        runner.add_catalog(&rows).unwrap();
        assert_eq!(runner.registry().entries()[0].name, "Mesa Police Department");
    }

    #[test]
    fn test_agency_list_filters_short_values() {
        let list = "State,Agency\nCA,\nCA,X\nCA,Oakland Police Department\nCA,Berkeley PD\n";
        let rows = read_agency_list(list.as_bytes()).unwrap();

        let mut runner = runner(AmbiguityPolicy::Flag);
        runner.add_agency_names(&rows, "ripa").unwrap();

        assert_eq!(runner.counts().filtered, 2);
        assert_eq!(runner.counts().added, 2);
        assert_eq!(runner.registry().len(), 2);
    }

    #[test]
    fn test_agency_codes_resolve_through_lookup() {
        let table = "ORI,AGENCY_NAME\nCA0010100,Alameda Police Department\nCA0019999,A\nCA0019999,B\n";
        let lookup = CodeLookup::from_reader(table.as_bytes(), "ORI", "AGENCY_NAME").unwrap();
        let rows = read_agency_list("State,Agency\nCA,CA0010100\nCA,CA0019999\nCA,CA0000000\n".as_bytes()).unwrap();

        let mut runner = runner(AmbiguityPolicy::Flag).with_lookup(lookup);
        runner.add_agency_codes(&rows, "ursus").unwrap();

        assert_eq!(runner.registry().len(), 1);
        assert_eq!(runner.registry().entries()[0].name, "Alameda Police Department");
        assert_eq!(runner.counts().errors, 2);
        assert_eq!(runner.errors()[0].value, "CA0019999");
        assert!(runner.errors()[0].message.contains("2 rows"));
        assert_eq!(runner.errors()[0].source, "ursus");
    }

    #[test]
    fn test_codes_without_lookup_are_item_errors() {
        let mut runner = runner(AmbiguityPolicy::Flag);
        let decision = runner
            .process(&AgencyRecord::code("CA", "CA0010100", "ursus"))
            .unwrap();

        assert_eq!(decision, None);
        assert_eq!(runner.counts().errors, 1);
        assert!(runner.registry().is_empty());
    }

    #[test]
    fn test_empty_jurisdiction_is_item_error() {
        let mut runner = runner(AmbiguityPolicy::Fail);
        let decision = runner
            .process(&AgencyRecord::name("", "Mesa Police Department", "catalog"))
            .unwrap();

        assert_eq!(decision, None);
        assert_eq!(runner.errors().len(), 1);
    }

    #[test]
    fn test_fail_policy_aborts_batch() {
        let list = "State,Agency\nIL,Springfield Police Department\nIL,Springfield Police Bureau\nIL,Peoria PD\n";
        let rows = read_agency_list(list.as_bytes()).unwrap();

        let mut runner = runner(AmbiguityPolicy::Fail);
        let err = runner.add_agency_names(&rows, "stops").unwrap_err();

        assert!(matches!(err, RegistryError::AmbiguousMatch { .. }));
        assert_eq!(runner.registry().len(), 1);
    }

    #[test]
    fn test_flag_policy_continues_and_reports() {
        let list = "State,Agency\nIL,Springfield Police Department\nIL,Springfield Police Bureau\nIL,Peoria PD\n";
        let rows = read_agency_list(list.as_bytes()).unwrap();

        let mut runner = runner(AmbiguityPolicy::Flag);
        runner.add_agency_names(&rows, "stops").unwrap();

        let report = runner.report();
        assert_eq!(report.agency_count, 2);
        assert_eq!(report.counts.ambiguous, 1);
        assert_eq!(report.review.len(), 1);
        assert_eq!(report.review[0].candidates, vec!["Springfield Police Department".to_string()]);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"agency_count\": 2"));
        assert!(json.contains("Springfield Police Bureau"));
    }
}
