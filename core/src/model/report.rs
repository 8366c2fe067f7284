use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

use crate::model::floor::ToiletType;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UsageIntensity {
    None,
    Low,
    Medium,
    High,
}

impl UsageIntensity {
    pub fn classify(total: u64) -> Self {
        match total {
            0 => UsageIntensity::None,
            1..=4 => UsageIntensity::Low,
            5..=14 => UsageIntensity::Medium,
            _ => UsageIntensity::High,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: u64,
}

impl DailyTotal {
    pub fn intensity(&self) -> UsageIntensity {
        UsageIntensity::classify(self.total)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WeeklyBucket {
    pub name: String, // "W1".."W5"
    pub first_day: u32,
    /// Inclusive. Smaller than `first_day` when the bucket is empty (W5 of a 28-day month).
    pub last_day: u32,
    pub total: u64,
}

impl WeeklyBucket {
    pub fn day_count(&self) -> u32 {
        (self.last_day + 1).saturating_sub(self.first_day)
    }

    pub fn contains(&self, day: u32) -> bool {
        day >= self.first_day && day <= self.last_day
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FloorTotal {
    pub floor: String,
    pub total: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TypeTotal {
    #[serde(rename = "type")]
    pub kind: ToiletType,
    pub total: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub days: Vec<DailyTotal>,
    pub weeks: Vec<WeeklyBucket>,
    pub floors: Vec<FloorTotal>,
    pub types: Vec<TypeTotal>,
    pub total: u64,
    pub active_days: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DaySheetEntry {
    #[serde(rename = "type")]
    pub kind: ToiletType,
    pub value: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DaySheetFloor {
    pub floor: String,
    pub entries: Vec<DaySheetEntry>,
    pub total: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DaySheet {
    pub date: NaiveDate,
    pub floors: Vec<DaySheetFloor>,
}

impl DaySheet {
    pub fn total(&self) -> u64 {
        self.floors.iter().map(|f| f.total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_thresholds() {
        assert_eq!(UsageIntensity::classify(0), UsageIntensity::None);
        assert_eq!(UsageIntensity::classify(4), UsageIntensity::Low);
        assert_eq!(UsageIntensity::classify(5), UsageIntensity::Medium);
        assert_eq!(UsageIntensity::classify(14), UsageIntensity::Medium);
        assert_eq!(UsageIntensity::classify(15), UsageIntensity::High);
    }

    #[test]
    fn test_empty_bucket() {
        let bucket = WeeklyBucket { name: "W5".to_string(), first_day: 29, last_day: 28, total: 0 };
        assert_eq!(bucket.day_count(), 0);
        assert!(!bucket.contains(29));
    }
}
