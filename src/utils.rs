use chrono::{Datelike, Days, Month, NaiveDate, Weekday};

pub fn first_day_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(NaiveDate::MAX)
}

/// Every day of the month except the weekly rest day, in calendar order.
pub fn business_days(year: i32, month: u32, rest_day: Weekday) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let last = last_day_of_month(year, month);

    first
        .iter_days()
        .take_while(|d| *d <= last)
        .filter(|d| d.weekday() != rest_day)
        .collect()
}

/// Upper-case English month name, `JANUARY` for 1.
pub fn month_label(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_uppercase())
        .unwrap_or_else(|| format!("MONTH {}", month))
}

/// Rounds a monetary amount to cents.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn within_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            last_day_of_month(2023, 12),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_business_days_skip_sundays() {
        // March 2024 starts on a Friday and has five Sundays.
        let days = business_days(2024, 3, Weekday::Sun);
        assert_eq!(days.len(), 26);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(
            *days.last().unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 30).unwrap()
        );
        assert!(days.iter().all(|d| d.weekday() != Weekday::Sun));
    }

    #[test]
    fn test_business_days_invalid_month() {
        assert!(business_days(2024, 13, Weekday::Sun).is_empty());
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(1), "JANUARY");
        assert_eq!(month_label(12), "DECEMBER");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(-2.344), -2.34);
        assert_eq!(round2(154_422.394_1), 154_422.39);
    }
}
