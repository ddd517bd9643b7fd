//! Address validation, normalization, and the shared regexes.
//!
//! Validation is deliberately structural, not a geocoder: a plausible
//! postal address has at least three comma-separated segments, a leading
//! house number, and a trailing two-letter state plus ZIP. Candidates
//! failing these checks are discarded silently.

use ozscan_core::NormalizedAddress;
use regex::Regex;
use std::sync::OnceLock;

/// Street-type tokens accepted by the tolerant address regexes.
const STREET_SUFFIXES: &str = "St|Street|Ave|Avenue|Blvd|Boulevard|Dr|Drive|Rd|Road|Ln|Lane|\
     Ct|Court|Pl|Place|Way|Ter|Terrace|Cir|Circle|Pkwy|Parkway|Hwy|Highway|Sq|Square|Trl|Trail";

/// Tolerant regex for addresses in running text: house number, street name,
/// street-type token, optional unit, city, two-letter state, 5-or-9-digit ZIP.
pub(crate) fn text_address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            concat!(
                r"\b\d{{1,6}}\s+(?:[A-Za-z0-9'.-]+\s+){{0,6}}?(?i:{suffixes})\.?",
                r"(?:\s+(?i:Apt|Unit|Ste|Suite|No|#)\.?\s*[A-Za-z0-9-]+)?",
                r"\s*,\s*[A-Za-z][A-Za-z .'-]*,\s*[A-Z]{{2}}\s+\d{{5}}(?:-\d{{4}})?\b"
            ),
            suffixes = STREET_SUFFIXES
        );
        Regex::new(&pattern).expect("valid text address regex")
    })
}

/// Comma-free variant for URL slugs, where separators arrive as hyphens.
/// Capture groups recompose a canonical comma-separated address.
pub(crate) fn slug_address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            concat!(
                r"(?i)\b(\d{{1,6}})\s+((?:[a-z0-9'.]+\s+){{0,6}}?(?:{suffixes}))\s+",
                r"((?:[a-z.']+\s+){{1,4}}?)([a-z]{{2}})\s+(\d{{5}})(?:-(\d{{4}}))?\b"
            ),
            suffixes = STREET_SUFFIXES
        );
        Regex::new(&pattern).expect("valid slug address regex")
    })
}

fn first_segment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+\s+\S").expect("valid first segment regex"))
}

fn last_segment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Z]{2}\s+\d{5}(?:-\d{4})?\b").expect("valid last segment regex")
    })
}

/// Structural check shared by every extraction strategy.
///
/// Requires ≥3 comma-separated segments, a first segment starting with
/// digits followed by text, and a last segment containing a two-letter
/// state code plus a 5-digit (optionally +4) ZIP.
#[must_use]
pub fn validate_address(candidate: &str) -> bool {
    let segments: Vec<&str> = candidate.split(',').map(str::trim).collect();
    if segments.len() < 3 {
        return false;
    }

    let first = segments[0];
    let last = segments[segments.len() - 1];

    first_segment_regex().is_match(first) && last_segment_regex().is_match(last)
}

/// Normalize a raw address into its canonical cache/deduplication key.
#[must_use]
pub fn normalize_address(raw: &str) -> NormalizedAddress {
    NormalizedAddress::new(raw)
}

/// Collapse runs of whitespace in element text into single spaces.
pub(crate) fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
