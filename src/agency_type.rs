// 🏛️ Agency Types - Known organizational suffixes and base names
//
// "Springfield Police Department" → base "Springfield", kind Police
// "California State Prison Sacramento" → base "California", kind Prison, qualifier "Sacramento"
//
// Base names are only used for comparison, never stored or displayed.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ============================================================================
// AGENCY KIND
// ============================================================================

/// Family of agency-type phrases that denote the same kind of organization
/// ("Police", "Police Department" and "Department Of Police" are all Police)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgencyKind {
    Police,
    Sheriff,
    StatePolice,
    PublicSafety,
    Corrections,
    Prison,
    Marshal,
    Constable,
    DistrictAttorney,
}

impl AgencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgencyKind::Police => "Police",
            AgencyKind::Sheriff => "Sheriff",
            AgencyKind::StatePolice => "State Police",
            AgencyKind::PublicSafety => "Public Safety",
            AgencyKind::Corrections => "Corrections",
            AgencyKind::Prison => "Prison",
            AgencyKind::Marshal => "Marshal",
            AgencyKind::Constable => "Constable",
            AgencyKind::DistrictAttorney => "District Attorney",
        }
    }
}

/// Two kinds are compatible when they agree or either is unknown
pub fn kinds_compatible(a: Option<AgencyKind>, b: Option<AgencyKind>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// Known agency-type phrases. The first phrase listed for a kind is its
/// canonical spelling.
pub const AGENCY_TYPE_SUFFIXES: &[(&str, AgencyKind)] = &[
    ("Police Department", AgencyKind::Police),
    ("Department Of Police", AgencyKind::Police),
    ("Police Bureau", AgencyKind::Police),
    ("Bureau Of Police", AgencyKind::Police),
    ("Police Division", AgencyKind::Police),
    ("Division Of Police", AgencyKind::Police),
    ("Police", AgencyKind::Police),
    ("Sheriff's Department", AgencyKind::Sheriff),
    ("Sheriff's Office", AgencyKind::Sheriff),
    ("Sheriff", AgencyKind::Sheriff),
    ("State Police", AgencyKind::StatePolice),
    ("State Highway Patrol", AgencyKind::StatePolice),
    ("Highway Patrol", AgencyKind::StatePolice),
    ("State Patrol", AgencyKind::StatePolice),
    ("Department Of Public Safety", AgencyKind::PublicSafety),
    ("Public Safety Department", AgencyKind::PublicSafety),
    ("Public Safety", AgencyKind::PublicSafety),
    ("Department Of Corrections", AgencyKind::Corrections),
    ("Department Of Correction", AgencyKind::Corrections),
    ("Division Of Corrections", AgencyKind::Corrections),
    ("Corrections Department", AgencyKind::Corrections),
    ("State Prison", AgencyKind::Prison),
    ("Marshal's Office", AgencyKind::Marshal),
    ("Marshal's Service", AgencyKind::Marshal),
    ("Marshals Service", AgencyKind::Marshal),
    ("Marshal", AgencyKind::Marshal),
    ("Constable's Office", AgencyKind::Constable),
    ("Constable", AgencyKind::Constable),
    ("District Attorney's Office", AgencyKind::DistrictAttorney),
    ("District Attorney", AgencyKind::DistrictAttorney),
];

// ============================================================================
// CLASSIFIED NAME
// ============================================================================

/// A canonical name split around its agency-type phrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyName {
    /// Full canonical name
    pub name: String,

    /// Name with the type phrase and everything after it removed
    pub base: String,

    /// Type phrase as it appears in the name
    pub type_phrase: Option<String>,

    pub kind: Option<AgencyKind>,

    /// Whether `type_phrase` is the canonical spelling for its kind
    pub canonical_type: bool,

    /// Words after the type phrase ("Sacramento" in "California State Prison Sacramento")
    pub qualifier: Option<String>,
}

// ============================================================================
// SUFFIX TABLE
// ============================================================================

struct Suffix {
    words: Vec<String>,
    phrase_len: usize,
    kind: AgencyKind,
    canonical: bool,
}

pub struct AgencyTypeTable {
    /// Sorted longest-first
    suffixes: Vec<Suffix>,
}

impl AgencyTypeTable {
    pub fn new(entries: &[(&str, AgencyKind)]) -> Self {
        let mut seen_kinds = Vec::new();
        let mut suffixes: Vec<Suffix> = entries
            .iter()
            .map(|(phrase, kind)| {
                let canonical = !seen_kinds.contains(kind);
                if canonical {
                    seen_kinds.push(*kind);
                }
                Suffix {
                    words: phrase.split_whitespace().map(str::to_lowercase).collect(),
                    phrase_len: phrase.chars().count(),
                    kind: *kind,
                    canonical,
                }
            })
            .filter(|s| !s.words.is_empty())
            .collect();

        // Stable: equal lengths keep table order
        suffixes.sort_by(|a, b| b.phrase_len.cmp(&a.phrase_len));

        AgencyTypeTable { suffixes }
    }

    /// Split a canonical name at the leftmost known type phrase.
    ///
    /// When the phrase starts the name there is nothing left to compare, so
    /// the whole name serves as the base.
    pub fn classify(&self, name: &str) -> AgencyName {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

        for start in 0..tokens.len() {
            let hit = self.suffixes.iter().find(|s| {
                let end = start + s.words.len();
                end <= lowered.len() && lowered[start..end] == s.words[..]
            });

            if let Some(suffix) = hit {
                let end = start + suffix.words.len();
                let base = if start == 0 {
                    tokens.join(" ")
                } else {
                    tokens[..start].join(" ")
                };
                let qualifier = tokens[end..].join(" ");

                return AgencyName {
                    name: tokens.join(" "),
                    base,
                    type_phrase: Some(tokens[start..end].join(" ")),
                    kind: Some(suffix.kind),
                    canonical_type: suffix.canonical,
                    qualifier: if qualifier.is_empty() { None } else { Some(qualifier) },
                };
            }
        }

        let joined = tokens.join(" ");
        AgencyName {
            name: joined.clone(),
            base: joined,
            type_phrase: None,
            kind: None,
            canonical_type: false,
            qualifier: None,
        }
    }

    /// Base name used for comparison
    pub fn clean(&self, name: &str) -> String {
        self.classify(name).base
    }
}

impl Default for AgencyTypeTable {
    fn default() -> Self {
        AgencyTypeTable::new(AGENCY_TYPE_SUFFIXES)
    }
}

fn default_table() -> &'static AgencyTypeTable {
    static TABLE: OnceLock<AgencyTypeTable> = OnceLock::new();
    TABLE.get_or_init(AgencyTypeTable::default)
}

/// Strip the trailing agency-type phrase using the built-in table
pub fn clean(name: &str) -> String {
    default_table().clean(name)
}

pub fn classify(name: &str) -> AgencyName {
    default_table().classify(name)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_police_department() {
        assert_eq!(clean("Springfield Police Department"), "Springfield");
        assert_eq!(clean("Springfield Police"), "Springfield");
        assert_eq!(clean("Yolo County Sheriff's Department"), "Yolo County");
    }

    #[test]
    fn test_clean_is_case_insensitive() {
        assert_eq!(clean("Springfield POLICE department"), "Springfield");
    }

    #[test]
    fn test_suffix_stability() {
        for base in ["Springfield", "Yolo County", "University Of Texas", "Fort Worth"] {
            for (phrase, _) in AGENCY_TYPE_SUFFIXES {
                let full = format!("{} {}", base, phrase);
                assert_eq!(clean(&full), base, "full: {}", full);
            }
        }
    }

    #[test]
    fn test_leftmost_longest_phrase_wins() {
        let name = classify("Michigan State Police");
        assert_eq!(name.base, "Michigan");
        assert_eq!(name.kind, Some(AgencyKind::StatePolice));

        let name = classify("Portland Police Bureau");
        assert_eq!(name.type_phrase.as_deref(), Some("Police Bureau"));
        assert!(!name.canonical_type);

        let name = classify("Michigan State University Police Department");
        assert_eq!(name.base, "Michigan State University");
        assert_eq!(name.kind, Some(AgencyKind::Police));
        assert!(name.canonical_type);
    }

    #[test]
    fn test_qualifier_after_type() {
        let name = classify("California State Prison Los Angeles County");
        assert_eq!(name.base, "California");
        assert_eq!(name.kind, Some(AgencyKind::Prison));
        assert_eq!(name.qualifier.as_deref(), Some("Los Angeles County"));

        assert_eq!(classify("Springfield Police Department").qualifier, None);
    }

    #[test]
    fn test_unknown_type() {
        let name = classify("Central California Women's Facility");
        assert_eq!(name.base, "Central California Women's Facility");
        assert_eq!(name.kind, None);
        assert_eq!(name.type_phrase, None);
    }

    #[test]
    fn test_phrase_at_start_keeps_whole_name() {
        let name = classify("Department Of Public Safety");
        assert_eq!(name.base, "Department Of Public Safety");
        assert_eq!(name.kind, Some(AgencyKind::PublicSafety));
    }

    #[test]
    fn test_kind_compatibility() {
        assert!(kinds_compatible(Some(AgencyKind::Police), Some(AgencyKind::Police)));
        assert!(kinds_compatible(None, Some(AgencyKind::Sheriff)));
        assert!(kinds_compatible(Some(AgencyKind::Sheriff), None));
        assert!(!kinds_compatible(Some(AgencyKind::Police), Some(AgencyKind::Sheriff)));
    }
}
