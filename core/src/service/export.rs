use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::model::floor::ToiletType;
use crate::model::record::parse_date_key;
use crate::store::RecordStore;
use crate::time::{first_of_month, month_name};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ExportRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Floor")]
    pub floor: String,
    #[serde(rename = "Toilet Type")]
    pub kind: ToiletType,
    #[serde(rename = "Count (Rolls)")]
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    NothingToExport,
    Written { path: PathBuf, rows: usize },
}

/// Every non-zero entry of every record, oldest date first. Entries on the
/// same date keep record (configuration) order.
pub fn export_rows(store: &RecordStore) -> Vec<ExportRow> {
    let mut rows: Vec<ExportRow> = store
        .records()
        .flat_map(|record| {
            record
                .usage
                .iter()
                .filter(|(key, value)| **value > 0 && parse_date_key(key).is_ok())
                .map(move |(key, value)| ExportRow {
                    date: key.clone(),
                    floor: record.floor.clone(),
                    kind: record.kind,
                    count: *value,
                })
        })
        .collect();

    // Stable sort keeps record order within a date.
    rows.sort_by(|a, b| a.date.cmp(&b.date));
    rows
}

pub fn export_file_name(year: i32, month: u32) -> String {
    format!("Tissue_Report_{}_{}.csv", month_name(month), year)
}

/// Write the export spreadsheet into `dir`, named after the selected month.
/// Nothing is written when there is no non-zero usage.
pub fn export_csv(store: &RecordStore, year: i32, month: u32, dir: &Path) -> Result<ExportOutcome> {
    first_of_month(year, month)?;

    let rows = export_rows(store);
    if rows.is_empty() {
        info!("nothing to export");
        return Ok(ExportOutcome::NothingToExport);
    }

    let path = dir.join(export_file_name(year, month));
    let mut writer = csv::Writer::from_path(&path)?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "exported usage report");
    Ok(ExportOutcome::Written { path, rows: rows.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn sample_store() -> RecordStore {
        let mut batch = RecordStore::initial().batch();
        batch.set("99", ToiletType::MaleStaff, date(1, 9), 3.0);
        batch.set("2", ToiletType::MalePublic, date(1, 9), 5.0);
        batch.set("2", ToiletType::MalePublic, date(1, 2), 1.0);
        batch.set("105", ToiletType::PowderRoom, date(2, 1), 0.0);
        batch.finish()
    }

    #[test]
    fn test_rows_are_sorted_and_skip_zero() {
        let rows = export_rows(&sample_store());
        let summary: Vec<(&str, &str)> = rows.iter().map(|r| (r.date.as_str(), r.floor.as_str())).collect();
        assert_eq!(summary, vec![("2026-01-02", "2"), ("2026-01-09", "2"), ("2026-01-09", "99")]);
    }

    #[test]
    fn test_nothing_to_export() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = export_csv(&RecordStore::initial(), 2026, 1, dir.path()).unwrap();
        assert_eq!(outcome, ExportOutcome::NothingToExport);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = export_csv(&sample_store(), 2026, 1, dir.path()).unwrap();
        let expected_path = dir.path().join("Tissue_Report_Januari_2026.csv");
        assert_eq!(outcome, ExportOutcome::Written { path: expected_path.clone(), rows: 3 });

        let content = fs::read_to_string(expected_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Date,Floor,Toilet Type,Count (Rolls)");
        assert_eq!(lines[1], "2026-01-02,2,MALE PUBLIC,1");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_export_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(export_csv(&sample_store(), 2026, 1, &missing).is_err());
    }
}
