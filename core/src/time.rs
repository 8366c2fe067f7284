use chrono::{Datelike, Duration, Local, NaiveDate};

use crate::error::{Result, TrackerError};

const MONTH_NAMES: [&str; 12] = [
    "Januari", "Februari", "Maret", "April", "Mei", "Juni",
    "Juli", "Agustus", "September", "Oktober", "November", "Desember",
];

pub fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(TrackerError::InvalidMonth { year, month })
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let first = first_of_month(year, month)?;
    let (next_year, next_month) = shift_month(year, month, 1);
    let next = first_of_month(next_year, next_month)?;
    Ok((next - first).num_days() as u32)
}

/// Move `offset` months forward (or back, when negative). `month` is 1-based.
pub fn shift_month(year: i32, month: u32, offset: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + offset;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.wrapping_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}

/// Parse "YYYY-MM".
pub fn parse_month(input: &str) -> Result<(i32, u32)> {
    let invalid = || TrackerError::InvalidDate(input.to_string());
    let (year_str, month_str) = input.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year_str.parse().map_err(|_| invalid())?;
    let month: u32 = month_str.parse().map_err(|_| invalid())?;
    first_of_month(year, month)?;
    Ok((year, month))
}

/// Parse a day for manual entry: "today", "yesterday", "-Nd" or "YYYY-MM-DD".
pub fn parse_day(input: &str) -> Result<NaiveDate> {
    parse_day_relative_to(input, Local::now().date_naive())
}

pub fn parse_day_relative_to(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let invalid = || TrackerError::InvalidDate(input.to_string());
    let input = input.trim();

    match input.to_lowercase().as_str() {
        "today" | "tod" => return Ok(today),
        "yesterday" | "yes" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if let Some(rest) = input.strip_prefix('-') {
        let count: i64 = rest
            .strip_suffix('d')
            .ok_or_else(invalid)?
            .parse()
            .map_err(|_| invalid())?;
        return Duration::try_days(count)
            .and_then(|offset| today.checked_sub_signed(offset))
            .ok_or_else(invalid);
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| invalid())
}

pub fn current_month() -> (i32, u32) {
    let today = Local::now().date_naive();
    (today.year(), today.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2026, 1).unwrap(), 31);
        assert_eq!(days_in_month(2026, 2).unwrap(), 28);
        assert_eq!(days_in_month(2028, 2).unwrap(), 29);
        assert_eq!(days_in_month(2026, 4).unwrap(), 30);
        assert_eq!(days_in_month(2026, 12).unwrap(), 31);
        assert!(days_in_month(2026, 13).is_err());
        assert!(days_in_month(2026, 0).is_err());
    }

    #[test]
    fn test_shift_month() {
        assert_eq!(shift_month(2026, 1, -1), (2025, 12));
        assert_eq!(shift_month(2026, 12, 1), (2027, 1));
        assert_eq!(shift_month(2026, 5, 14), (2027, 7));
    }

    #[test]
    fn test_parse_day_relative() {
        assert_eq!(parse_day_relative_to("today", anchor()).unwrap(), anchor());
        assert_eq!(
            parse_day_relative_to("yesterday", anchor()).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );
        assert_eq!(
            parse_day_relative_to("-3d", anchor()).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 26).unwrap()
        );
        assert_eq!(
            parse_day_relative_to("2026-01-05", anchor()).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
        );
        assert!(parse_day_relative_to("fri", anchor()).is_err());
        assert!(parse_day_relative_to("-3w", anchor()).is_err());
    }

    #[test]
    fn test_parse_day_out_of_range_offset() {
        for input in ["-999999999d", "-99999999999999d"] {
            let err = parse_day_relative_to(input, anchor()).unwrap_err();
            assert!(matches!(err, TrackerError::InvalidDate(_)));
        }
        assert_eq!(
            parse_day_relative_to("-365d", anchor()).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2026-01").unwrap(), (2026, 1));
        assert!(parse_month("2026-13").is_err());
        assert!(parse_month("january").is_err());
        assert_eq!(month_name(1), "Januari");
        assert_eq!(month_name(12), "Desember");
    }
}
