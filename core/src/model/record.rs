use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::error::{Result, TrackerError};
use crate::model::floor::ToiletType;

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub floor: String,
    #[serde(rename = "type")]
    pub kind: ToiletType,
    #[serde(default)]
    pub usage: BTreeMap<String, u32>, // Key: "YYYY-MM-DD"
}

impl UsageRecord {
    pub fn new(floor: impl Into<String>, kind: ToiletType) -> Self {
        Self {
            floor: floor.into(),
            kind,
            usage: BTreeMap::new(),
        }
    }

    pub fn matches(&self, floor: &str, kind: ToiletType) -> bool {
        self.floor == floor && self.kind == kind
    }

    /// Missing keys read as zero.
    pub fn value_on(&self, date: NaiveDate) -> u32 {
        self.usage.get(&date_key(date)).copied().unwrap_or(0)
    }

    /// Usage entries whose key parses as a date. Malformed keys are skipped.
    pub fn dated_entries(&self) -> impl Iterator<Item = (NaiveDate, u32)> + '_ {
        self.usage
            .iter()
            .filter_map(|(key, value)| parse_date_key(key).ok().map(|d| (d, *value)))
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(key: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT)
        .map_err(|_| TrackerError::InvalidDate(key.to_string()))
}

/// Clamp an arbitrary input to a stored roll count: negatives become 0,
/// fractions are truncated, non-finite values become 0.
pub fn clamp_count(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.floor().min(u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_count() {
        assert_eq!(clamp_count(7.0), 7);
        assert_eq!(clamp_count(7.9), 7);
        assert_eq!(clamp_count(-3.0), 0);
        assert_eq!(clamp_count(-0.5), 0);
        assert_eq!(clamp_count(f64::NAN), 0);
        assert_eq!(clamp_count(f64::INFINITY), 0);
    }

    #[test]
    fn test_record_wire_format() {
        let json = r#"{"floor":"85","type":"FEMALE PUBLIC","usage":{"2026-01-05":4}}"#;
        let record: UsageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, ToiletType::FemalePublic);
        assert_eq!(record.value_on(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()), 4);
        assert_eq!(record.value_on(NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()), 0);
        assert_eq!(serde_json::to_string(&record).unwrap(), json);
    }

    #[test]
    fn test_dated_entries_skip_garbage_keys() {
        let mut record = UsageRecord::new("2", ToiletType::MalePublic);
        record.usage.insert("2026-01-05".to_string(), 3);
        record.usage.insert("not-a-date".to_string(), 9);
        let entries: Vec<_> = record.dated_entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, 3);
    }
}
