use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};

/// Month-granularity position on the calendar: `year * 12 + month0`.
///
/// All window checks, phase bounds and the simulation loop compare and step
/// these instead of dates.
pub type MonthIndex = i64;

pub fn year_month_index(year: i32, month0: u32) -> MonthIndex {
    year as i64 * 12 + month0 as i64
}

pub fn date_to_index(date: NaiveDate) -> MonthIndex {
    year_month_index(date.year(), date.month0())
}

/// First day of the month identified by `index`.
pub fn index_to_date(index: MonthIndex) -> Result<NaiveDate> {
    let month0 = index.rem_euclid(12);
    let year = index.div_euclid(12);
    i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month0 as u32 + 1, 1))
        .ok_or_else(|| ForecastError::InvalidDate(format!("Month index {index} is out of range")))
}

pub fn first_of_month(year: i32, month0: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).ok_or_else(|| {
        ForecastError::InvalidDate(format!("{year}-{} is not a valid month", month0 + 1))
    })
}

/// Annual percentage (e.g. `2.0` for 2 %/yr) to a per-month fraction.
pub fn yearly_percentage_to_monthly(rate: f64) -> f64 {
    rate / 100.0 / 12.0
}

pub fn monthly_to_yearly_percentage(rate: f64) -> f64 {
    rate * 12.0 * 100.0
}

pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];
