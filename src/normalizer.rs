// 🧹 Name Normalizer - Raw agency strings → canonical title-cased names
//
// Problem solved:
// - "springfield pd", "SPRINGFIELD P.D.", "Springfieldpd" → "Springfield Police Department"
// - "Yolo Co. So" → "Yolo County Sheriff's Department"
// - Sub-unit numbers ("#3"), hyphens and commas removed
//
// Each pass is a fixed sequence of token rewrites. Passes repeat until the
// output stops changing, so normalize(normalize(x)) == normalize(x).

use crate::error::{NormalizationSkip, SkipReason};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Upper bound on rewrite passes before giving up on a fixpoint
const MAX_PASSES: usize = 5;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// One literal phrase rewrite, matched on whole words
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

impl Replacement {
    pub fn new(from: &str, to: &str) -> Self {
        Replacement {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// How the abbreviation "St" is spelled out.
///
/// "St" is both "Saint" and "State" in the source data. Nothing in the name
/// itself tells them apart, so the expansion is chosen by the caller.
/// `Keep` leaves "St" as-is (only dropping a trailing dot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StAbbreviation {
    #[default]
    Keep,
    Saint,
    State,
}

impl StAbbreviation {
    pub fn expansion(&self) -> &'static str {
        match self {
            StAbbreviation::Keep => "St",
            StAbbreviation::Saint => "Saint",
            StAbbreviation::State => "State",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep" | "st" => Some(StAbbreviation::Keep),
            "saint" => Some(StAbbreviation::Saint),
            "state" => Some(StAbbreviation::State),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Misspelling and abbreviation fixes, applied in order
    pub replacements: Vec<Replacement>,

    /// Expansion used for "St" / "St."
    pub st_abbreviation: StAbbreviation,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        NormalizerConfig {
            replacements: default_replacements(),
            st_abbreviation: StAbbreviation::default(),
        }
    }
}

/// Known misspellings and abbreviations seen in police open-data tables
pub fn default_replacements() -> Vec<Replacement> {
    [
        ("Allegany", "Alleghany"),
        ("Co.", "County"),
        ("Cnty", "County"),
        ("Cnty.", "County"),
        ("Sherriff", "Sheriff"),
        ("Sherrif", "Sheriff"),
        ("Sherriff's", "Sheriff's"),
        ("Sherrif's", "Sheriff's"),
        ("Dept.", "Department"),
        ("Dept", "Department"),
        ("Twp.", "Township"),
        ("Twp", "Township"),
        ("Mt.", "Mount"),
        ("Ft.", "Fort"),
        ("Hwy", "Highway"),
        ("Dps", "Department Of Public Safety"),
    ]
    .iter()
    .map(|(from, to)| Replacement::new(from, to))
    .collect()
}

/// Sheriff spellings folded into the single form "Sheriff's Department"
const SHERIFF_VARIANTS: &[(&str, &str)] = &[
    ("Sheriffs Office", "Sheriff's Department"),
    ("Sheriff's Office", "Sheriff's Department"),
    ("Sheriff Office", "Sheriff's Department"),
    ("Sheriffs Department", "Sheriff's Department"),
    ("Sheriff Department", "Sheriff's Department"),
    ("Department Office", "Department"),
];

// ============================================================================
// NORMALIZER
// ============================================================================

type Phrase = Vec<String>;

pub struct Normalizer {
    replacements: Vec<(Phrase, Phrase)>,
    sheriff_variants: Vec<(Phrase, Phrase)>,
    st_abbreviation: StAbbreviation,
}

impl Normalizer {
    pub fn new(config: &NormalizerConfig) -> Self {
        Normalizer {
            replacements: config
                .replacements
                .iter()
                .map(|r| (phrase(&r.from), phrase(&r.to)))
                .filter(|(from, _)| !from.is_empty())
                .collect(),
            sheriff_variants: SHERIFF_VARIANTS
                .iter()
                .map(|(from, to)| (phrase(from), phrase(to)))
                .collect(),
            st_abbreviation: config.st_abbreviation,
        }
    }

    /// Map a raw agency name to its canonical form.
    ///
    /// Fails when nothing is left, or when "Department" occurs more than
    /// once (the raw string glued several organizations together).
    pub fn normalize(&self, raw: &str) -> Result<String, NormalizationSkip> {
        let mut current = raw.to_string();
        for _ in 0..MAX_PASSES {
            let next = self.pass(&current);
            if next == current {
                break;
            }
            current = next;
        }

        let skip = |reason| NormalizationSkip {
            raw: raw.to_string(),
            reason,
        };

        if current.is_empty() {
            return Err(skip(SkipReason::Empty));
        }

        let departments = current
            .split_whitespace()
            .filter(|t| t.eq_ignore_ascii_case("department"))
            .count();
        if departments > 1 {
            return Err(skip(SkipReason::RepeatedDepartment));
        }

        Ok(current)
    }

    /// One full rewrite pass
    fn pass(&self, input: &str) -> String {
        // 1. Trim + title case
        let cased = title_case(input.trim().replace('\u{2019}', "'").as_str());
        let mut tokens: Vec<String> = cased.split_whitespace().map(str::to_string).collect();

        // 2. Literal fixes
        for (from, to) in &self.replacements {
            tokens = replace_phrase(tokens, from, to);
        }

        // 3. "X X" → "X"
        tokens = collapse_repeats(tokens);

        // 4. Sheriff / Department variants
        for (from, to) in &self.sheriff_variants {
            tokens = replace_phrase(tokens, from, to);
        }

        // 5. Abbreviations
        expand_abbreviations(&mut tokens);

        // 6. St
        for token in tokens.iter_mut() {
            if token.eq_ignore_ascii_case("st") || token.eq_ignore_ascii_case("st.") {
                *token = self.st_abbreviation.expansion().to_string();
            }
        }

        // 7. Sub-unit numbers
        strip_trailing_numbers(&mut tokens);

        // 8. Punctuation
        let joined = tokens.join(" ").replace('-', " ").replace(',', "");

        // 9. Final title case
        collapse_whitespace(&title_case(&joined))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new(&NormalizerConfig::default())
    }
}

/// Normalize with the built-in tables
pub fn normalize(raw: &str) -> Result<String, NormalizationSkip> {
    static DEFAULT: OnceLock<Normalizer> = OnceLock::new();
    DEFAULT.get_or_init(Normalizer::default).normalize(raw)
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Title case: a letter is upper-cased unless it follows a letter, digit or
/// apostrophe ("sheriff's" → "Sheriff's", "1st" → "1st", "p.d." → "P.D.")
pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev: Option<char> = None;

    for c in s.chars() {
        let inside_word = matches!(prev, Some(p) if p.is_alphanumeric() || p == '\'');
        if inside_word {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev = Some(c);
    }

    out
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn phrase(s: &str) -> Phrase {
    title_case(s).split_whitespace().map(str::to_string).collect()
}

fn tokens_match(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Replace every whole-word occurrence of `from` with `to`, left to right,
/// without rescanning replaced text
fn replace_phrase(tokens: Vec<String>, from: &[String], to: &[String]) -> Vec<String> {
    if from.is_empty() || tokens.len() < from.len() {
        return tokens;
    }

    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let end = i + from.len();
        if end <= tokens.len() && tokens_match(&tokens[i..end], from) {
            out.extend(to.iter().cloned());
            i = end;
        } else {
            out.push(tokens[i].clone());
            i += 1;
        }
    }
    out
}

/// Drop an immediately repeated run of two or more words.
///
/// Single repeated words are left alone: "Walla Walla" is a place.
fn collapse_repeats(mut tokens: Vec<String>) -> Vec<String> {
    loop {
        let n = tokens.len();
        let mut found = None;

        'search: for k in (2..=n / 2).rev() {
            for i in 0..=(n - 2 * k) {
                if tokens_match(&tokens[i..i + k], &tokens[i + k..i + 2 * k]) {
                    found = Some((i + k, i + 2 * k));
                    break 'search;
                }
            }
        }

        match found {
            Some((start, end)) => {
                tokens.drain(start..end);
            }
            None => return tokens,
        }
    }
}

fn expand_abbreviations(tokens: &mut Vec<String>) {
    for token in tokens.iter_mut() {
        if token.trim_end_matches('.').eq_ignore_ascii_case("univ") {
            *token = "University".to_string();
        }
    }

    let Some(last) = tokens.last() else {
        return;
    };
    let bare = last.replace('.', "").to_ascii_lowercase();

    // A lone "Pd" or "Da" is not a name worth expanding
    let expansion: Option<&[&str]> = match bare.as_str() {
        _ if tokens.len() < 2 => None,
        "pd" | "p" => Some(&["Police", "Department"][..]),
        "sd" | "so" => Some(&["Sheriff's", "Department"][..]),
        "da" => Some(&["District", "Attorney"][..]),
        _ => None,
    };

    if let Some(words) = expansion {
        tokens.pop();
        tokens.extend(words.iter().map(|w| w.to_string()));
    } else if bare.len() > 4
        && bare.ends_with("pd")
        && bare.chars().all(|c| c.is_ascii_alphabetic())
    {
        // "Springfieldpd" → "Springfield Police Department"
        let stem = title_case(&bare[..bare.len() - 2]);
        tokens.pop();
        tokens.push(stem);
        tokens.push("Police".to_string());
        tokens.push("Department".to_string());
    }
}

/// "Precinct 12", "Station #3", "Station # 3" lose their trailing number
fn strip_trailing_numbers(tokens: &mut Vec<String>) {
    while tokens.len() > 1 {
        let Some(last) = tokens.last() else {
            break;
        };
        let digits = last.trim_start_matches('#');
        let is_number = last == "#" || (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
        if !is_number {
            break;
        }
        tokens.pop();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_pd_expands() {
        assert_eq!(
            normalize("springfield pd").unwrap(),
            "Springfield Police Department"
        );
        assert_eq!(
            normalize("SPRINGFIELD P.D.").unwrap(),
            "Springfield Police Department"
        );
        assert_eq!(normalize("Springfield P").unwrap(), "Springfield Police Department");
    }

    #[test]
    fn test_county_sheriff_abbreviations() {
        assert_eq!(
            normalize("Yolo Co. So").unwrap(),
            "Yolo County Sheriff's Department"
        );
        assert_eq!(
            normalize("Kern County SD").unwrap(),
            "Kern County Sheriff's Department"
        );
    }

    #[test]
    fn test_so_only_expands_at_end() {
        assert_eq!(
            normalize("So San Francisco PD").unwrap(),
            "So San Francisco Police Department"
        );
        assert_eq!(
            normalize("Kern County S.O.").unwrap(),
            "Kern County Sheriff's Department"
        );
    }

    #[test]
    fn test_sheriff_office_variants_fold() {
        for raw in [
            "Orange County Sheriff's Office",
            "ORANGE COUNTY SHERIFFS OFFICE",
            "Orange County Sheriff Department",
            "orange county sheriff’s office",
        ] {
            assert_eq!(
                normalize(raw).unwrap(),
                "Orange County Sheriff's Department",
                "raw: {}",
                raw
            );
        }
    }

    #[test]
    fn test_misspelling_table() {
        assert_eq!(
            normalize("Allegany County Sherriff").unwrap(),
            "Alleghany County Sheriff"
        );
        assert_eq!(
            normalize("Mesa Police Dept.").unwrap(),
            "Mesa Police Department"
        );
    }

    #[test]
    fn test_concatenated_pd() {
        assert_eq!(
            normalize("Springfieldpd").unwrap(),
            "Springfield Police Department"
        );
    }

    #[test]
    fn test_other_abbreviations() {
        assert_eq!(
            normalize("Univ of Texas PD").unwrap(),
            "University Of Texas Police Department"
        );
        assert_eq!(
            normalize("Yolo County DA").unwrap(),
            "Yolo County District Attorney"
        );
    }

    #[test]
    fn test_repeated_phrase_collapses() {
        assert_eq!(
            normalize("Mesa Police Department Mesa Police Department").unwrap(),
            "Mesa Police Department"
        );
        assert_eq!(
            normalize("Walla Walla Police Department").unwrap(),
            "Walla Walla Police Department"
        );
    }

    #[test]
    fn test_trailing_numbers_stripped() {
        assert_eq!(
            normalize("Springfield Police Department #3").unwrap(),
            "Springfield Police Department"
        );
        assert_eq!(
            normalize("Springfield Police Department 12").unwrap(),
            "Springfield Police Department"
        );
        assert_eq!(
            normalize("Springfield PD 4").unwrap(),
            "Springfield Police Department"
        );
    }

    #[test]
    fn test_hyphens_and_commas() {
        assert_eq!(
            normalize("winston-salem police department").unwrap(),
            "Winston Salem Police Department"
        );
        assert_eq!(
            normalize("California State Prison, Sacramento").unwrap(),
            "California State Prison Sacramento"
        );
    }

    #[test]
    fn test_st_expansion_is_configured() {
        let keep = Normalizer::default();
        assert_eq!(keep.normalize("St. Paul PD").unwrap(), "St Paul Police Department");

        let saint = Normalizer::new(&NormalizerConfig {
            st_abbreviation: StAbbreviation::Saint,
            ..NormalizerConfig::default()
        });
        assert_eq!(saint.normalize("St. Paul PD").unwrap(), "Saint Paul Police Department");

        let state = Normalizer::new(&NormalizerConfig {
            st_abbreviation: StAbbreviation::State,
            ..NormalizerConfig::default()
        });
        assert_eq!(state.normalize("Michigan St Police").unwrap(), "Michigan State Police");
    }

    #[test]
    fn test_repeated_department_is_skipped() {
        let err = normalize("Mesa Police Department Fire Department").unwrap_err();
        assert_eq!(err.reason, SkipReason::RepeatedDepartment);

        let err = normalize("   ").unwrap_err();
        assert_eq!(err.reason, SkipReason::Empty);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raws = [
            "springfield pd",
            "Yolo Co. So",
            "SPRINGFIELD P.D. #3",
            "Springfieldpd",
            "winston-salem police dept",
            "Allegany Co. Sherrif's Office",
            "St. Louis County PD",
            "California State Prison, Los Angeles County",
            "Mesa Police Department Mesa Police Department",
            "univ. of california, davis pd",
            "Station # 3",
        ];

        for raw in raws {
            let once = normalize(raw).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "raw: {}", raw);
        }
    }

    #[test]
    fn test_custom_replacements() {
        let normalizer = Normalizer::new(&NormalizerConfig {
            replacements: vec![Replacement::new("lapd", "Los Angeles Police Department")],
            st_abbreviation: StAbbreviation::Keep,
        });

        assert_eq!(
            normalizer.normalize("LAPD").unwrap(),
            "Los Angeles Police Department"
        );
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("sheriff's office"), "Sheriff's Office");
        assert_eq!(title_case("1st precinct"), "1st Precinct");
        assert_eq!(title_case("S.O."), "S.O.");
    }
}
