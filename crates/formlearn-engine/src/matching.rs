//! Cross-session field identity.
//!
//! The same logical field ("Full Name") is marked up differently on every site, so
//! identity is a matching function over a small closed attribute set rather than
//! key equality:
//! 1. Labels are normalized (case, whitespace, required markers).
//! 2. Labels are compared token-wise with a fuzzy threshold. Qualifier words
//!    ("address", "number") may extend a label; typos are absorbed on long labels only.
//! 3. Declared types must be compatible according to a fixed table.

use crate::config::LearningConfig;
use crate::field::{FieldFingerprint, FieldType};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());
static WORD_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_\-.\[\]]+").unwrap());
static OPTIONALITY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((required|optional)\)").unwrap());

/// Words that carry no identity in form labels ("Please enter your email").
const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "of", "your", "you", "please", "enter", "provide", "what", "is", "are",
    "do", "here",
];

/// Words that refine a field name without changing which field it is.
const QUALIFIER_WORDS: &[&str] = &["address", "number", "no", "num", "nr"];

/// Minimum compacted length for the typo rule.
const MIN_TYPO_LEN: usize = 8;

/// Lower-cases, drops required/optional markers and a trailing colon, and collapses
/// whitespace.
pub fn normalize_label(raw: &str) -> String {
    let lowered = raw.replace('*', " ").to_lowercase();
    let unmarked = OPTIONALITY_MARKER.replace_all(&lowered, " ");
    let collapsed = unmarked.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches(':').trim_end().to_string()
}

/// Turns a machine identifier (`firstName`, `first_name`, `applicant[email]`) into
/// label-like words, then normalizes.
pub fn humanize(raw: &str) -> String {
    let spaced = CAMEL_BOUNDARY.replace_all(raw, "$1 $2");
    let spaced = WORD_SEPARATORS.replace_all(&spaced, " ");
    normalize_label(&spaced)
}

/// Significant alphanumeric tokens of a label.
pub fn tokens(label: &str) -> Vec<String> {
    label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| !FILLER_WORDS.contains(&t.as_str()))
        .collect()
}

/// Tokens concatenated, so "e-mail" and "email" compare equal.
pub fn compact(label: &str) -> String {
    tokens(label).concat()
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn numerals(tokens: &[String]) -> BTreeSet<&str> {
    tokens
        .iter()
        .map(String::as_str)
        .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

/// Fuzzy label equality on already-normalized labels.
///
/// Numbered siblings ("address line 1" / "address line 2") never match.
pub fn labels_match(a: &str, b: &str, config: &LearningConfig) -> bool {
    if a == b {
        return true;
    }

    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return false;
    }
    if numerals(&ta) != numerals(&tb) {
        return false;
    }

    let ca = ta.concat();
    let cb = tb.concat();
    if ca == cb {
        return true;
    }

    if jaccard(&ta, &tb) >= config.label_similarity || qualified(&ta, &tb) {
        return true;
    }

    // Short labels one edit apart are usually different words ("county" / "country").
    ca.chars().count() >= MIN_TYPO_LEN
        && cb.chars().count() >= MIN_TYPO_LEN
        && strsim::normalized_levenshtein(&ca, &cb) >= config.typo_similarity
}

/// One label is the other plus only qualifier words ("email" / "email address").
fn qualified(a: &[String], b: &[String]) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() || short.len() == long.len() {
        return false;
    }
    short.iter().all(|t| long.contains(t))
        && long
            .iter()
            .filter(|t| !short.contains(t))
            .all(|t| QUALIFIER_WORDS.contains(&t.as_str()))
}

/// Type-compatibility table for clustering.
///
/// | family | compatible with |
/// |---|---|
/// | text, email, phone, url, textarea | each other |
/// | text | also number, date, select |
/// | select | radio |
/// | unknown | the free-text family |
/// | checkbox | only checkbox |
pub fn types_compatible(a: FieldType, b: FieldType) -> bool {
    use FieldType::*;

    let free_text = |t: FieldType| matches!(t, Text | Email | Phone | Url | Textarea);

    if a == b {
        return true;
    }
    match (a, b) {
        (Checkbox, _) | (_, Checkbox) => false,
        (Select, Radio) | (Radio, Select) => true,
        (Text, Number | Date | Select) | (Number | Date | Select, Text) => true,
        (Unknown, t) | (t, Unknown) => free_text(t),
        _ => free_text(a) && free_text(b),
    }
}

impl FieldFingerprint {
    /// Whether two fingerprints, possibly from unrelated sites, name the same logical field.
    pub fn same_field(&self, other: &FieldFingerprint, config: &LearningConfig) -> bool {
        types_compatible(self.declared_type, other.declared_type)
            && labels_match(&self.normalized_label, &other.normalized_label, config)
    }
}
