use crate::error::{Result, TrackerError};
use crate::model::floor::ToiletType;

/// Resolve `key` against `candidates`: exact match first, then a unique prefix.
pub fn expand_key<'a>(key: &str, candidates: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = candidates.iter().find(|&&c| c == key) {
        return Some(*exact);
    }

    let matches: Vec<&str> = candidates
        .iter()
        .filter(|&&c| c.starts_with(key))
        .cloned()
        .collect();

    match matches.len() {
        1 => Some(matches[0]),
        _ => None,
    }
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .to_uppercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lenient toilet type parser. Accepts display labels ("MALE PUBLIC"),
/// enum spellings ("male_public"), two-letter codes ("MP") and unique
/// prefixes ("POW").
pub fn parse_toilet_type(input: &str) -> Result<ToiletType> {
    let key = normalize(input);
    if key.is_empty() {
        return Err(TrackerError::UnknownToiletType(input.to_string()));
    }

    if let Some(kind) = ToiletType::ALL.iter().find(|t| t.code() == key) {
        return Ok(*kind);
    }

    let labels: Vec<&str> = ToiletType::ALL.iter().map(|t| t.label()).collect();
    expand_key(&key, &labels)
        .and_then(|label| ToiletType::ALL.iter().find(|t| t.label() == label).copied())
        .ok_or_else(|| TrackerError::UnknownToiletType(input.to_string()))
}
