// 📏 Similarity - Fuzzy ratio between agency base names
//
// ratio(a, b) = 100 * (1 - indel_distance / (len(a) + len(b)))
//
// Indel distance counts insertions and deletions only (a substitution costs 2),
// so "Chico" vs "Chino" scores 80 and identical strings score 100.

/// Normalized similarity in [0, 100]
pub fn ratio(s1: &str, s2: &str) -> f64 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let total = a.len() + b.len();

    if total == 0 {
        return 100.0;
    }

    let distance = indel_distance(&a, &b);
    100.0 * (1.0 - distance as f64 / total as f64)
}

/// Minimum number of single-character insertions and deletions turning one
/// sequence into the other
fn indel_distance(a: &[char], b: &[char]) -> usize {
    let len1 = a.len();
    let len2 = b.len();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            matrix[i][j] = if a[i - 1] == b[j - 1] {
                matrix[i - 1][j - 1]
            } else {
                std::cmp::min(
                    matrix[i - 1][j] + 1, // deletion
                    matrix[i][j - 1] + 1, // insertion
                )
            };
        }
    }

    matrix[len1][len2]
}

/// Remove generic noise phrases ("County", "University Of") from a base name.
///
/// Only used for comparison; the stored name keeps them.
pub fn comparison_key(base: &str, noise: &[String]) -> String {
    let mut tokens: Vec<&str> = base.split_whitespace().collect();

    for phrase in noise {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        let mut kept = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let end = i + words.len();
            let hit = end <= tokens.len()
                && tokens[i..end]
                    .iter()
                    .zip(&words)
                    .all(|(t, w)| t.eq_ignore_ascii_case(w));
            if hit {
                i = end;
            } else {
                kept.push(tokens[i]);
                i += 1;
            }
        }
        tokens = kept;
    }

    tokens.join(" ")
}

/// Drop the words two names share at the front and at the back, returning
/// the differing middles ("Fort Worth West" / "Fort Worth East" → "West" / "East")
pub fn strip_common_affixes(a: &str, b: &str) -> (String, String) {
    let wa: Vec<&str> = a.split_whitespace().collect();
    let wb: Vec<&str> = b.split_whitespace().collect();

    let prefix = wa
        .iter()
        .zip(&wb)
        .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
        .count();

    let max_suffix = wa.len().min(wb.len()) - prefix;
    let suffix = wa
        .iter()
        .rev()
        .zip(wb.iter().rev())
        .take(max_suffix)
        .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
        .count();

    (
        wa[prefix..wa.len() - suffix].join(" "),
        wb[prefix..wb.len() - suffix].join(" "),
    )
}

// ============================================================================
// TESTS
// ============================================================================
