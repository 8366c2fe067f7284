use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::floor::{self, ToiletType, FLOORS_CONFIG};
use crate::model::report::{
    DailyTotal, DaySheet, DaySheetEntry, DaySheetFloor, FloorTotal, MonthlyReport, TypeTotal,
    WeeklyBucket,
};
use crate::store::RecordStore;
use crate::time::{days_in_month, first_of_month};

/// Fixed week partition of a month: (name, first day, last day).
const WEEK_BUCKETS: [(&str, u32, u32); 5] = [
    ("W1", 1, 7),
    ("W2", 8, 14),
    ("W3", 15, 21),
    ("W4", 22, 28),
    ("W5", 29, 31),
];

/// Every (record, day-of-month, value) entry that falls inside the month.
fn month_entries(
    store: &RecordStore,
    year: i32,
    month: u32,
) -> impl Iterator<Item = (&str, ToiletType, u32, u64)> + '_ {
    store.records().flat_map(move |record| {
        record
            .dated_entries()
            .filter(move |(date, _)| date.year() == year && date.month() == month)
            .map(move |(date, value)| (record.floor.as_str(), record.kind, date.day(), value as u64))
    })
}

pub fn daily_total(store: &RecordStore, date: NaiveDate) -> u64 {
    store.records().map(|r| r.value_on(date) as u64).sum()
}

/// Totals for every day 1..=N of the month, zero-filled.
pub fn daily_totals(store: &RecordStore, year: i32, month: u32) -> Result<Vec<DailyTotal>> {
    let first = first_of_month(year, month)?;
    let days = days_in_month(year, month)?;

    let mut totals = vec![0u64; days as usize];
    for (_, _, day, value) in month_entries(store, year, month) {
        totals[(day - 1) as usize] += value;
    }

    Ok(totals
        .into_iter()
        .zip(first.iter_days())
        .map(|(total, date)| DailyTotal { date, total })
        .collect())
}

pub fn weekly_buckets(store: &RecordStore, year: i32, month: u32) -> Result<Vec<WeeklyBucket>> {
    let days = daily_totals(store, year, month)?;
    Ok(buckets_from_days(&days))
}

fn buckets_from_days(days: &[DailyTotal]) -> Vec<WeeklyBucket> {
    let month_len = days.len() as u32;
    WEEK_BUCKETS
        .iter()
        .map(|&(name, first_day, last_day)| {
            let last_day = last_day.min(month_len);
            let total = days
                .iter()
                .filter(|d| d.date.day() >= first_day && d.date.day() <= last_day)
                .map(|d| d.total)
                .sum();
            WeeklyBucket {
                name: name.to_string(),
                first_day,
                last_day,
                total,
            }
        })
        .collect()
}

/// Per-floor totals for the month, in configuration order.
pub fn floor_totals(store: &RecordStore, year: i32, month: u32) -> Result<Vec<FloorTotal>> {
    first_of_month(year, month)?;

    let mut by_floor: BTreeMap<&str, u64> = BTreeMap::new();
    for (floor, _, _, value) in month_entries(store, year, month) {
        *by_floor.entry(floor).or_default() += value;
    }

    Ok(floor::floors()
        .map(|floor| FloorTotal {
            floor: floor.to_string(),
            total: by_floor.get(floor).copied().unwrap_or(0),
        })
        .collect())
}

pub fn type_totals(store: &RecordStore, year: i32, month: u32) -> Result<Vec<TypeTotal>> {
    first_of_month(year, month)?;

    let mut by_type: BTreeMap<ToiletType, u64> = BTreeMap::new();
    for (_, kind, _, value) in month_entries(store, year, month) {
        *by_type.entry(kind).or_default() += value;
    }

    Ok(ToiletType::ALL
        .iter()
        .map(|kind| TypeTotal {
            kind: *kind,
            total: by_type.get(kind).copied().unwrap_or(0),
        })
        .collect())
}

/// All projections for one month, recomputed from scratch.
pub fn monthly_report(store: &RecordStore, year: i32, month: u32) -> Result<MonthlyReport> {
    let days = daily_totals(store, year, month)?;
    let weeks = buckets_from_days(&days);
    let floors = floor_totals(store, year, month)?;
    let types = type_totals(store, year, month)?;
    let total = days.iter().map(|d| d.total).sum();
    let active_days = days.iter().filter(|d| d.total > 0).count();

    Ok(MonthlyReport {
        year,
        month,
        days,
        weeks,
        floors,
        types,
        total,
        active_days,
    })
}

/// Manual-entry view of a single date: every configured pair with its value.
pub fn day_sheet(store: &RecordStore, date: NaiveDate) -> DaySheet {
    let floors = FLOORS_CONFIG
        .iter()
        .map(|config| {
            let entries: Vec<DaySheetEntry> = config
                .types
                .iter()
                .map(|kind| DaySheetEntry {
                    kind: *kind,
                    value: store.value(config.floor, *kind, date),
                })
                .collect();
            let total = entries.iter().map(|e| e.value as u64).sum();
            DaySheetFloor {
                floor: config.floor.to_string(),
                entries,
                total,
            }
        })
        .collect();

    DaySheet { date, floors }
}
