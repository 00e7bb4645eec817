//! Reporting periods.
//!
//! A period is a calendar month (`YYYY-MM`) or the aggregate `All`.

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the aggregate period.
pub const ALL: &str = "All";

const MONTH_NAMES: [&str; 12] = [
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

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("'{0}' is not a month in YYYY-MM form")]
    InvalidMonth(String),
    #[error("'{0}' is not a load target: expected latest, all or YYYY-MM")]
    InvalidTarget(String),
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (1..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::from_date(Utc::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
    }

    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    /// "March 2024"
    pub fn name(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }

    /// Seconds since the epoch at midnight UTC on the first of the month.
    pub fn unix_epoch(&self) -> i64 {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .map(|dt| dt.timestamp())
            .unwrap_or_default()
    }

    /// Every month from `self` through `last`, inclusive.
    pub fn range_to(&self, last: Month) -> Vec<Month> {
        let mut months = Vec::new();
        let mut current = *self;
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidMonth(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Month::new(year, month).ok_or_else(invalid)
    }
}

/// A reporting period: one month or the all-time aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    Month(Month),
    All,
}

impl Period {
    pub fn name(&self) -> String {
        self.to_string()
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Period::All)
    }

    /// The period named by an optional `month` query parameter; empty means `All`.
    pub fn from_param(month: Option<&str>) -> Result<Self, PeriodError> {
        match month.map(str::trim) {
            None | Some("") => Ok(Period::All),
            Some(value) if value.eq_ignore_ascii_case("all") => Ok(Period::All),
            Some(value) => value.parse(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Month(m) => m.fmt(f),
            Period::All => f.write_str(ALL),
        }
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ALL {
            Ok(Period::All)
        } else {
            s.parse().map(Period::Month)
        }
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.to_string()
    }
}

/// Which months a `load` run fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTarget {
    Latest,
    All,
    Month(Month),
}

impl FromStr for LoadTarget {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(LoadTarget::Latest),
            "all" => Ok(LoadTarget::All),
            other => other
                .parse()
                .map(LoadTarget::Month)
                .map_err(|_| PeriodError::InvalidTarget(other.to_string())),
        }
    }
}

impl LoadTarget {
    /// The months to fetch, oldest first.
    pub fn months(&self, first: Month, today: NaiveDate) -> Vec<Month> {
        let current = Month::from_date(today);
        match self {
            LoadTarget::Latest => vec![current],
            LoadTarget::All => first.range_to(current),
            LoadTarget::Month(m) => vec![*m],
        }
    }
}

/// The date window requested from the analytics API for one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub month: Month,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Last day of the month covered by the data
    pub complete_day: u32,
}

impl DateWindow {
    /// The current month is only complete up to `today`.
    pub fn for_month(month: Month, today: NaiveDate) -> Self {
        let start = month.first_day();
        if Month::from_date(today) == month {
            Self {
                month,
                start,
                end: today,
                complete_day: today.day(),
            }
        } else {
            Self {
                month,
                start,
                end: month.last_day(),
                complete_day: month.days(),
            }
        }
    }
}

/// "1st", "2nd", "3rd", "11th", "22nd"
pub fn ordinal_day(day: u32) -> String {
    let suffix = if (11..=13).contains(&(day % 100)) {
        "th"
    } else {
        match day % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{day}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> Month {
        s.parse().unwrap()
    }

    #[test]
    fn parses_months_and_rejects_garbage() {
        assert_eq!(ym("2024-03"), Month::new(2024, 3).unwrap());
        assert!("2024-3".parse::<Month>().is_err());
        assert!("2024-13".parse::<Month>().is_err());
        assert!("March".parse::<Month>().is_err());
        assert_eq!("All".parse::<Period>().unwrap(), Period::All);
        assert_eq!(Period::Month(ym("2012-12")).to_string(), "2012-12");
    }

    #[test]
    fn month_names_and_boundaries() {
        assert_eq!(ym("2024-03").name(), "March 2024");
        assert_eq!(ym("2024-02").days(), 29);
        assert_eq!(ym("2023-12").next(), ym("2024-01"));
        assert_eq!(ym("2024-01").unix_epoch(), 1_704_067_200);
    }

    #[test]
    fn load_targets() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!("latest".parse::<LoadTarget>().unwrap().months(ym("2010-01"), today), vec![ym("2024-03")]);
        assert_eq!(
            "all".parse::<LoadTarget>().unwrap().months(ym("2023-12"), today),
            vec![ym("2023-12"), ym("2024-01"), ym("2024-02"), ym("2024-03")]
        );
        assert_eq!(
            "bogus".parse::<LoadTarget>(),
            Err(PeriodError::InvalidTarget("bogus".to_string()))
        );
    }

    #[test]
    fn current_month_window_ends_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let current = DateWindow::for_month(ym("2024-03"), today);
        assert_eq!(current.end, today);
        assert_eq!(current.complete_day, 5);

        let past = DateWindow::for_month(ym("2024-02"), today);
        assert_eq!(past.end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(past.complete_day, 29);
    }

    #[test]
    fn ordinals() {
        let got: Vec<String> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 31].iter().map(|d| ordinal_day(*d)).collect();
        assert_eq!(got, ["1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "23rd", "31st"]);
    }

    #[test]
    fn query_param_periods() {
        assert_eq!(Period::from_param(None).unwrap(), Period::All);
        assert_eq!(Period::from_param(Some("")).unwrap(), Period::All);
        assert_eq!(Period::from_param(Some("all")).unwrap(), Period::All);
        assert_eq!(Period::from_param(Some("2024-01")).unwrap(), Period::Month(ym("2024-01")));
        assert!(Period::from_param(Some("2024-1")).is_err());
    }
}
