// 🗂️ Agency Registry - Running list of distinct agencies per jurisdiction
//
// Every raw name goes through `consider`:
//   normalize → split off agency type → compare with same-jurisdiction entries
//
// Two paths:
// - Exact base-name match: decide by full name, agency type and prefixes
// - Fuzzy match: similarity ratio on noise-stripped base names, then tie-break rules
//
// Order matters: later decisions depend on everything accepted before them.

use crate::agency_type::{kinds_compatible, AgencyKind, AgencyName, AgencyTypeTable};
use crate::config::CatalogConfig;
use crate::error::RegistryError;
use crate::normalizer::Normalizer;
use crate::rules::{NamePair, RuleEngine, Verdict};
use crate::similarity::{comparison_key, ratio};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ============================================================================
// ACTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// New distinct agency appended
    Added,

    /// Existing entry replaced in place by a more specific name
    Replaced,

    /// Already present; registry unchanged
    Duplicate,

    /// Name could not be normalized into one agency
    Skipped,

    /// Heuristics could not decide; needs manual review
    Ambiguous,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Added => "added",
            Action::Replaced => "replaced",
            Action::Duplicate => "duplicate",
            Action::Skipped => "skipped",
            Action::Ambiguous => "ambiguous",
        }
    }
}

/// What to do when a name cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    /// Return an error (stops a batch)
    Fail,

    /// Report `Ambiguous` and move on
    Skip,

    /// Report `Ambiguous` and queue the case for manual review
    #[default]
    Flag,
}

impl AmbiguityPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Some(AmbiguityPolicy::Fail),
            "skip" => Some(AmbiguityPolicy::Skip),
            "flag" => Some(AmbiguityPolicy::Flag),
            _ => None,
        }
    }
}

// ============================================================================
// REGISTRY ENTRY
// ============================================================================

/// An accepted agency.
///
/// `id` is the identity and never changes. `name` may be replaced by a more
/// specific spelling; the names it replaced are kept in `previous_names`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: String,
    pub name: String,
    pub jurisdiction: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_names: Vec<String>,
}

impl RegistryEntry {
    pub fn new(name: &str, jurisdiction: &str) -> Self {
        RegistryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            jurisdiction: jurisdiction.to_string(),
            previous_names: Vec::new(),
        }
    }

    fn supersede(&mut self, name: String) {
        let old = std::mem::replace(&mut self.name, name);
        if !self.previous_names.contains(&old) {
            self.previous_names.push(old);
        }
    }

    /// Current name plus every name it replaced
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.previous_names.iter().map(String::as_str))
    }
}

/// A name held back for manual review, with the entries it competed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewFlag {
    pub name: String,
    pub jurisdiction: String,
    pub candidates: Vec<String>,
    pub reason: String,
}

// ============================================================================
// DECISION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub action: Action,

    /// Name as passed in
    pub raw: String,

    /// Canonical name (None when skipped)
    pub name: Option<String>,

    pub jurisdiction: String,

    /// Entry that was added, replaced or matched
    pub entry_id: Option<String>,

    /// Existing names this decision was made against
    pub candidates: Vec<String>,

    /// Tie-break rule that decided a fuzzy match
    pub rule_id: Option<String>,

    /// Human-readable reason
    pub reason: String,
}

/// Internal outcome of the decision tree, before the registry is touched
enum Resolution {
    Add {
        reason: String,
        rule_id: Option<String>,
    },
    Replace {
        index: usize,
        reason: String,
    },
    Duplicate {
        index: usize,
        reason: String,
        rule_id: Option<String>,
    },
    Ambiguous {
        indices: Vec<usize>,
        reason: String,
    },
}

impl Resolution {
    fn add(reason: impl Into<String>) -> Self {
        Resolution::Add {
            reason: reason.into(),
            rule_id: None,
        }
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MatchSettings {
    /// Fuzzy ratios at or below this are different agencies (scale 0-100)
    pub match_threshold: f64,

    /// Phrases ignored when comparing base names
    pub noise_tokens: Vec<String>,

    /// Kinds whose entries are told apart by the words after the type phrase
    /// ("California State Prison Sacramento" / "... Solano")
    pub qualified_kinds: Vec<AgencyKind>,

    /// Jurisdictions where tied fuzzy candidates are told apart the same way
    pub qualifier_jurisdictions: Vec<String>,

    pub ambiguity_policy: AmbiguityPolicy,
}

impl Default for MatchSettings {
    fn default() -> Self {
        MatchSettings {
            match_threshold: 86.0,
            noise_tokens: vec!["County".to_string(), "University Of".to_string()],
            qualified_kinds: vec![AgencyKind::Prison],
            qualifier_jurisdictions: vec!["CA".to_string()],
            ambiguity_policy: AmbiguityPolicy::Flag,
        }
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub generated_at: DateTime<Utc>,
    pub agency_count: usize,
    pub jurisdiction_count: usize,
    pub entries: Vec<RegistryEntry>,
    pub review: Vec<ReviewFlag>,
}

// ============================================================================
// REGISTRY
// ============================================================================

pub struct Registry {
    entries: Vec<RegistryEntry>,
    review: Vec<ReviewFlag>,
    normalizer: Normalizer,
    types: AgencyTypeTable,
    rules: RuleEngine,
    settings: MatchSettings,
}

impl Registry {
    /// Empty registry with built-in tables and rules
    pub fn new() -> Self {
        Registry::with_parts(
            Normalizer::default(),
            AgencyTypeTable::default(),
            RuleEngine::with_defaults(),
            MatchSettings::default(),
        )
    }

    pub fn with_parts(
        normalizer: Normalizer,
        types: AgencyTypeTable,
        rules: RuleEngine,
        settings: MatchSettings,
    ) -> Self {
        Registry {
            entries: Vec::new(),
            review: Vec::new(),
            normalizer,
            types,
            rules,
            settings,
        }
    }

    pub fn from_config(config: &CatalogConfig, rules: RuleEngine) -> Self {
        Registry::with_parts(
            Normalizer::new(&config.normalizer),
            AgencyTypeTable::default(),
            rules,
            config.match_settings(),
        )
    }

    /// Decide what a raw agency name means for this registry and apply it
    pub fn consider(&mut self, name: &str, jurisdiction: &str) -> Result<Decision, RegistryError> {
        let jurisdiction = jurisdiction.trim();
        if jurisdiction.is_empty() {
            return Err(RegistryError::InvalidJurisdiction {
                name: name.to_string(),
            });
        }

        let canonical = match self.normalizer.normalize(name) {
            Ok(canonical) => canonical,
            Err(skip) => {
                debug!(raw = name, jurisdiction, reason = %skip.reason, "skipped agency name");
                return Ok(Decision {
                    action: Action::Skipped,
                    raw: name.to_string(),
                    name: None,
                    jurisdiction: jurisdiction.to_string(),
                    entry_id: None,
                    candidates: Vec::new(),
                    rule_id: None,
                    reason: skip.reason.to_string(),
                });
            }
        };

        let candidate = self.types.classify(&canonical);
        let resolution = self.resolve(&candidate, jurisdiction);
        let decision = self.apply(name, jurisdiction, candidate, resolution)?;

        debug!(
            action = decision.action.as_str(),
            name = decision.name.as_deref().unwrap_or_default(),
            jurisdiction,
            reason = %decision.reason,
            "considered agency"
        );

        Ok(decision)
    }

    fn resolve(&self, candidate: &AgencyName, jurisdiction: &str) -> Resolution {
        let peers: Vec<(usize, AgencyName)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.jurisdiction.eq_ignore_ascii_case(jurisdiction))
            .map(|(i, e)| (i, self.types.classify(&e.name)))
            .collect();

        let same_base: Vec<&(usize, AgencyName)> = peers
            .iter()
            .filter(|(_, p)| p.base.eq_ignore_ascii_case(&candidate.base))
            .collect();

        if same_base.is_empty() {
            self.resolve_fuzzy(candidate, jurisdiction, &peers)
        } else {
            self.resolve_exact(candidate, &same_base)
        }
    }

    // ========================================================================
    // EXACT BASE-NAME PATH
    // ========================================================================

    fn resolve_exact(&self, candidate: &AgencyName, matches: &[&(usize, AgencyName)]) -> Resolution {
        let new_compact = compact(&candidate.name);

        // Already present: same name (current or replaced), or an existing
        // name that the new one merely extends
        for (index, existing) in matches {
            let entry = &self.entries[*index];
            if entry.all_names().any(|n| n.eq_ignore_ascii_case(&candidate.name)) {
                return Resolution::Duplicate {
                    index: *index,
                    reason: "same canonical name".to_string(),
                    rule_id: None,
                };
            }
            if new_compact.starts_with(&compact(&existing.name)) {
                return Resolution::Duplicate {
                    index: *index,
                    reason: "existing name is a prefix of the new name".to_string(),
                    rule_id: None,
                };
            }
        }

        // Entries of another type (or another unit of a qualified kind) are
        // different agencies; only the rest can be this one
        let remaining: Vec<&(usize, AgencyName)> = match candidate.kind {
            Some(kind) => matches
                .iter()
                .copied()
                .filter(|(_, existing)| match existing.kind {
                    Some(other) if other != kind => false,
                    Some(_) => !self.distinct_by_qualifier(candidate, existing),
                    None => true,
                })
                .collect(),
            None => matches.to_vec(),
        };

        if remaining.is_empty() {
            return Resolution::add(format!(
                "shares base name {:?} only with different agencies",
                candidate.base
            ));
        }

        if let [(index, existing)] = remaining.as_slice() {
            if supersedes(candidate, existing) {
                return Resolution::Replace {
                    index: *index,
                    reason: format!(
                        "{:?} is the standard spelling of {:?}",
                        candidate.type_phrase.as_deref().unwrap_or_default(),
                        existing.type_phrase.as_deref().unwrap_or_default()
                    ),
                };
            }

            if compact(&existing.name).starts_with(&new_compact) {
                return Resolution::Duplicate {
                    index: *index,
                    reason: "new name is a truncation of an existing name".to_string(),
                    rule_id: None,
                };
            }

            return Resolution::Ambiguous {
                indices: vec![*index],
                reason: "same base name, unresolved variant".to_string(),
            };
        }

        Resolution::Ambiguous {
            indices: remaining.iter().map(|(i, _)| *i).collect(),
            reason: format!(
                "{} entries of the same type share base name {:?}",
                remaining.len(),
                candidate.base
            ),
        }
    }

    /// Multi-unit complexes: same kind, both qualified, qualifiers differ
    fn distinct_by_qualifier(&self, candidate: &AgencyName, existing: &AgencyName) -> bool {
        let Some(kind) = candidate.kind else {
            return false;
        };
        if !self.settings.qualified_kinds.contains(&kind) {
            return false;
        }

        match (&candidate.qualifier, &existing.qualifier) {
            (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    // ========================================================================
    // FUZZY PATH
    // ========================================================================

    fn resolve_fuzzy(
        &self,
        candidate: &AgencyName,
        jurisdiction: &str,
        peers: &[(usize, AgencyName)],
    ) -> Resolution {
        if peers.is_empty() {
            return Resolution::add(format!("first agency in {}", jurisdiction));
        }

        let key = comparison_key(&candidate.base, &self.settings.noise_tokens);

        // Known look-alike pairs never match, whatever their score
        let mut excluded_rule = None;
        let scored: Vec<(usize, &AgencyName, String, f64)> = peers
            .iter()
            .filter_map(|(index, peer)| {
                let peer_key = comparison_key(&peer.base, &self.settings.noise_tokens);
                let pair = NamePair {
                    new_key: &key,
                    existing_key: &peer_key,
                };
                if let Some(rule) = self.rules.excluded_by(&pair) {
                    excluded_rule = Some(rule.id.clone());
                    return None;
                }
                let score = ratio(&key, &peer_key);
                Some((*index, peer, peer_key, score))
            })
            .collect();

        let best = scored.iter().map(|(_, _, _, s)| *s).fold(f64::MIN, f64::max);

        if scored.is_empty() || best <= self.settings.match_threshold {
            return Resolution::Add {
                reason: if scored.is_empty() {
                    "only known look-alikes in jurisdiction".to_string()
                } else {
                    format!(
                        "best similarity {:.1} is at or below {:.1}",
                        best, self.settings.match_threshold
                    )
                },
                rule_id: excluded_rule,
            };
        }

        let compatible: Vec<&(usize, &AgencyName, String, f64)> = scored
            .iter()
            .filter(|(_, _, _, s)| (s - best).abs() < 1e-9)
            .filter(|(_, peer, _, _)| kinds_compatible(candidate.kind, peer.kind))
            .collect();

        match compatible.as_slice() {
            [] => Resolution::add(format!(
                "closest names (similarity {:.1}) are a different agency type",
                best
            )),

            [(index, _, peer_key, _)] => {
                let pair = NamePair {
                    new_key: &key,
                    existing_key: peer_key,
                };
                match self.rules.evaluate(&pair) {
                    Some(m) if m.verdict == Verdict::Same => Resolution::Duplicate {
                        index: *index,
                        reason: format!("similarity {:.1}, same agency by rule {}", best, m.rule_id),
                        rule_id: Some(m.rule_id),
                    },
                    Some(m) => Resolution::Add {
                        reason: format!("similarity {:.1}, different agency by rule {}", best, m.rule_id),
                        rule_id: Some(m.rule_id),
                    },
                    None => Resolution::Ambiguous {
                        indices: vec![*index],
                        reason: format!("similarity {:.1} and no rule applies", best),
                    },
                }
            }

            tied => {
                if self.distinct_by_jurisdiction_qualifier(candidate, jurisdiction, tied) {
                    return Resolution::add("qualifier differs from every tied candidate");
                }
                Resolution::Ambiguous {
                    indices: tied.iter().map(|(i, _, _, _)| *i).collect(),
                    reason: format!("{} candidates tied at similarity {:.1}", tied.len(), best),
                }
            }
        }
    }

    fn distinct_by_jurisdiction_qualifier(
        &self,
        candidate: &AgencyName,
        jurisdiction: &str,
        tied: &[&(usize, &AgencyName, String, f64)],
    ) -> bool {
        let carved_out = self
            .settings
            .qualifier_jurisdictions
            .iter()
            .any(|j| j.eq_ignore_ascii_case(jurisdiction));
        let Some(qualifier) = &candidate.qualifier else {
            return false;
        };

        carved_out
            && tied.iter().all(|(_, peer, _, _)| match &peer.qualifier {
                Some(other) => !other.eq_ignore_ascii_case(qualifier),
                None => false,
            })
    }

    // ========================================================================
    // APPLY
    // ========================================================================

    fn apply(
        &mut self,
        raw: &str,
        jurisdiction: &str,
        candidate: AgencyName,
        resolution: Resolution,
    ) -> Result<Decision, RegistryError> {
        let mut decision = Decision {
            action: Action::Added,
            raw: raw.to_string(),
            name: Some(candidate.name.clone()),
            jurisdiction: jurisdiction.to_string(),
            entry_id: None,
            candidates: Vec::new(),
            rule_id: None,
            reason: String::new(),
        };

        match resolution {
            Resolution::Add { reason, rule_id } => {
                let entry = RegistryEntry::new(&candidate.name, jurisdiction);
                decision.entry_id = Some(entry.id.clone());
                decision.rule_id = rule_id;
                decision.reason = reason;
                self.entries.push(entry);
            }

            Resolution::Replace { index, reason } => {
                let entry = &mut self.entries[index];
                decision.action = Action::Replaced;
                decision.candidates = vec![entry.name.clone()];
                decision.entry_id = Some(entry.id.clone());
                decision.reason = reason;
                entry.supersede(candidate.name);
            }

            Resolution::Duplicate {
                index,
                reason,
                rule_id,
            } => {
                let entry = &self.entries[index];
                decision.action = Action::Duplicate;
                decision.candidates = vec![entry.name.clone()];
                decision.entry_id = Some(entry.id.clone());
                decision.rule_id = rule_id;
                decision.reason = reason;
            }

            Resolution::Ambiguous { indices, reason } => {
                let candidates: Vec<String> = indices
                    .iter()
                    .map(|i| self.entries[*i].name.clone())
                    .collect();

                match self.settings.ambiguity_policy {
                    AmbiguityPolicy::Fail => {
                        return Err(RegistryError::AmbiguousMatch {
                            name: candidate.name,
                            jurisdiction: jurisdiction.to_string(),
                            candidates,
                        });
                    }
                    AmbiguityPolicy::Skip => {}
                    AmbiguityPolicy::Flag => {
                        warn!(
                            name = %candidate.name,
                            jurisdiction,
                            candidates = ?candidates,
                            reason = %reason,
                            "ambiguous agency flagged for review"
                        );
                        self.review.push(ReviewFlag {
                            name: candidate.name.clone(),
                            jurisdiction: jurisdiction.to_string(),
                            candidates: candidates.clone(),
                            reason: reason.clone(),
                        });
                    }
                }

                decision.action = Action::Ambiguous;
                decision.candidates = candidates;
                decision.reason = reason;
            }
        }

        Ok(decision)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn entries_for<'a>(&'a self, jurisdiction: &'a str) -> impl Iterator<Item = &'a RegistryEntry> {
        self.entries
            .iter()
            .filter(move |e| e.jurisdiction.eq_ignore_ascii_case(jurisdiction))
    }

    pub fn review_queue(&self) -> &[ReviewFlag] {
        &self.review
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn jurisdiction_count(&self) -> usize {
        let mut seen: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.jurisdiction.to_ascii_uppercase())
            .collect();
        seen.sort();
        seen.dedup();
        seen.len()
    }

    /// Drop all entries and review flags; tables and rules are kept
    pub fn reset(&mut self) {
        self.entries.clear();
        self.review.clear();
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            generated_at: Utc::now(),
            agency_count: self.len(),
            jurisdiction_count: self.jurisdiction_count(),
            entries: self.entries.clone(),
            review: self.review.clone(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Lower-cased, whitespace-free form for prefix checks
fn compact(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// New name spells the same kind of agency with the standard type phrase,
/// where the existing entry uses a variant ("Department Of Police" → "Police Department")
fn supersedes(candidate: &AgencyName, existing: &AgencyName) -> bool {
    candidate.kind.is_some()
        && candidate.kind == existing.kind
        && candidate.canonical_type
        && !existing.canonical_type
        && candidate.qualifier == existing.qualifier
}

// ============================================================================
// TESTS
// ============================================================================
