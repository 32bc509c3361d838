// 🏷️ Match Rules - Rules as Data
// Tie-break rules for fuzzy matches between agency base names
//
// When a new name scores above the match threshold against exactly one
// existing name, the rules decide whether they are the same agency.
// Rules run in priority order; the first rule that returns a verdict wins.

use crate::similarity::{ratio, strip_common_affixes};
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Both names denote the same agency
    Same,

    /// Different agencies that happen to look alike
    Distinct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Literal pair of words known to name different places ("Chico" / "Chino").
    /// Excludes the pair from matching regardless of score.
    KnownDistinct { left: String, right: String },

    /// One name uses `left` where the other uses `right` ("Park" / "Beach")
    Substitution { left: String, right: String },

    /// One name starts or ends with the other, ignoring spaces
    Containment,

    /// Strip shared leading and trailing words, then compare what is left
    ResidualSimilarity { threshold: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRule {
    /// Rule ID for tracking
    pub id: String,

    pub kind: RuleKind,

    /// Description/notes about this rule
    pub description: Option<String>,

    /// Priority (higher = applied first)
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    0
}

/// The two comparison keys under consideration
#[derive(Debug, Clone, Copy)]
pub struct NamePair<'a> {
    pub new_key: &'a str,
    pub existing_key: &'a str,
}

impl MatchRule {
    pub fn new(id: &str, kind: RuleKind, priority: i32) -> Self {
        MatchRule {
            id: id.to_string(),
            kind,
            description: None,
            priority,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Known-distinct pairs apply before any tie-breaking
    pub fn is_exclusion(&self) -> bool {
        matches!(self.kind, RuleKind::KnownDistinct { .. })
    }

    /// Return a verdict if this rule applies to the pair
    pub fn evaluate(&self, pair: &NamePair) -> Option<Verdict> {
        match &self.kind {
            RuleKind::KnownDistinct { left, right } => {
                let new_words = words(pair.new_key);
                let old_words = words(pair.existing_key);
                let l = left.to_lowercase();
                let r = right.to_lowercase();

                let crossed = (new_words.contains(&l) && old_words.contains(&r))
                    || (new_words.contains(&r) && old_words.contains(&l));
                crossed.then_some(Verdict::Distinct)
            }

            RuleKind::Substitution { left, right } => {
                let new_words = words(pair.new_key);
                let old_words = words(pair.existing_key);
                let l = left.to_lowercase();
                let r = right.to_lowercase();

                let only = |ws: &[String], has: &str, lacks: &str| {
                    ws.iter().any(|w| w == has) && !ws.iter().any(|w| w == lacks)
                };

                let swapped = (only(&new_words, &l, &r) && only(&old_words, &r, &l))
                    || (only(&new_words, &r, &l) && only(&old_words, &l, &r));
                swapped.then_some(Verdict::Distinct)
            }

            RuleKind::Containment => {
                let a = compact(pair.new_key);
                let b = compact(pair.existing_key);
                let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };

                if shorter.is_empty() {
                    return None;
                }

                (longer.starts_with(&shorter) || longer.ends_with(&shorter))
                    .then_some(Verdict::Same)
            }

            RuleKind::ResidualSimilarity { threshold } => {
                let (a, b) = strip_common_affixes(pair.new_key, pair.existing_key);
                if a.is_empty() && b.is_empty() {
                    return Some(Verdict::Same);
                }

                if ratio(&a, &b) > *threshold {
                    Some(Verdict::Same)
                } else {
                    Some(Verdict::Distinct)
                }
            }
        }
    }
}

/// Lower-cased words with possessives dropped ("Women's" → "women")
fn words(key: &str) -> Vec<String> {
    key.split_whitespace()
        .map(|w| {
            let lower = w.to_lowercase();
            let trimmed = lower
                .strip_suffix("'s")
                .or_else(|| lower.strip_suffix('\''))
                .unwrap_or(&lower);
            trimmed.to_string()
        })
        .collect()
}

fn compact(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

// ============================================================================
// RULE MATCH
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub verdict: Verdict,
    pub rule_id: String,
}

// ============================================================================
// RULE ENGINE
// ============================================================================

pub struct RuleEngine {
    rules: Vec<MatchRule>,
}

impl RuleEngine {
    /// Create a new empty rule engine
    pub fn new() -> Self {
        RuleEngine { rules: Vec::new() }
    }

    /// Built-in tie-break rules
    pub fn with_defaults() -> Self {
        let distinct = |id: &str, left: &str, right: &str| {
            MatchRule::new(
                id,
                RuleKind::KnownDistinct {
                    left: left.to_string(),
                    right: right.to_string(),
                },
                100,
            )
        };
        let substitution = |id: &str, left: &str, right: &str| {
            MatchRule::new(
                id,
                RuleKind::Substitution {
                    left: left.to_string(),
                    right: right.to_string(),
                },
                50,
            )
        };

        RuleEngine::from_rules(vec![
            distinct("chico_chino", "Chico", "Chino")
                .with_description("Two California cities one letter apart"),
            distinct("willisville_williamsville", "Willisville", "Williamsville"),
            substitution("women_men", "Women", "Men")
                .with_description("Separate women's and men's facilities"),
            substitution("park_beach", "Park", "Beach"),
            substitution("center_institution", "Center", "Institution"),
            substitution("north_south", "North", "South"),
            substitution("east_west", "East", "West"),
            MatchRule::new("containment", RuleKind::Containment, 20)
                .with_description("Shorter name is the start or end of the longer one"),
            MatchRule::new(
                "residual_similarity",
                RuleKind::ResidualSimilarity { threshold: 90.0 },
                10,
            )
            .with_description("Differing words are near-identical spellings"),
        ])
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<MatchRule> =
            serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        Ok(RuleEngine::from_rules(rules))
    }

    /// Create engine from a list of rules
    pub fn from_rules(mut rules: Vec<MatchRule>) -> Self {
        // Sort by priority (higher first); stable for equal priorities
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        RuleEngine { rules }
    }

    /// First exclusion rule that separates the pair, if any
    pub fn excluded_by(&self, pair: &NamePair) -> Option<&MatchRule> {
        self.rules
            .iter()
            .filter(|rule| rule.is_exclusion())
            .find(|rule| rule.evaluate(pair).is_some())
    }

    /// Apply rules in priority order; None when no rule has an opinion
    pub fn evaluate(&self, pair: &NamePair) -> Option<RuleMatch> {
        self.rules.iter().find_map(|rule| {
            rule.evaluate(pair).map(|verdict| RuleMatch {
                verdict,
                rule_id: rule.id.clone(),
            })
        })
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    /// Get number of rules loaded
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// TESTS
// ============================================================================
