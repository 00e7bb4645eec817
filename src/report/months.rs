use serde::Serialize;
use tracing::error;

use super::{ReportError, Reporter};
use crate::period::{ordinal_day, Month, Period};
use crate::storage::PeriodSummary;

/// A month that has data, e.g. `("2024-03", "March 2024")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthOption {
    pub period_name: String,
    pub name: String,
}

/// Months with data, newest first, and how far the newest one is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthDetails {
    pub months: Vec<MonthOption>,
    pub day: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum MonthSource<'a> {
    Urls,
    Stats(Option<&'a str>),
}

impl MonthDetails {
    pub fn from_periods(periods: &[PeriodSummary]) -> Self {
        let day = periods
            .first()
            .filter(|p| p.period_complete_day > 0)
            .map(|p| ordinal_day(p.period_complete_day as u32));

        let months = periods
            .iter()
            .map(|p| MonthOption {
                period_name: p.period_name.clone(),
                name: month_name(&p.period_name),
            })
            .collect();

        Self { months, day }
    }

    /// "all months", or the name of the selected month.
    pub fn describe(&self, month: &Period) -> String {
        match month {
            Period::All => "all months".to_string(),
            Period::Month(m) => {
                let wanted = m.to_string();
                self.months
                    .iter()
                    .filter(|o| o.period_name == wanted)
                    .map(|o| o.name.as_str())
                    .collect()
            }
        }
    }

    pub fn option_title(&self, period_name: &str) -> String {
        month_option_title(period_name, &self.months, self.day.as_deref())
    }
}

impl Reporter {
    pub async fn month_details(&self, source: MonthSource<'_>) -> Result<MonthDetails, ReportError> {
        let periods = match source {
            MonthSource::Urls => self.storage.url_periods().await?,
            MonthSource::Stats(stat_name) => self.storage.stat_periods(stat_name).await?,
        };
        Ok(MonthDetails::from_periods(&periods))
    }
}

/// Label for a month selector entry; the newest month says how complete it is.
pub fn month_option_title(period_name: &str, months: &[MonthOption], day: Option<&str>) -> String {
    let Some(index) = months.iter().position(|m| m.period_name == period_name) else {
        error!("Month \"{period_name}\" not found in list of months.");
        return period_name.to_string();
    };

    let name = &months[index].name;
    match day {
        Some(day) if index == 0 => format!("{name} (up to {day})"),
        _ => name.clone(),
    }
}

pub(crate) fn month_name(period_name: &str) -> String {
    period_name
        .parse::<Month>()
        .map(|m| m.name())
        .unwrap_or_else(|_| period_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periods() -> Vec<PeriodSummary> {
        vec![
            PeriodSummary {
                period_name: "2024-03".to_string(),
                period_complete_day: 3,
            },
            PeriodSummary {
                period_name: "2024-02".to_string(),
                period_complete_day: 29,
            },
        ]
    }

    #[test]
    fn details_are_newest_first_with_ordinal_day() {
        let details = MonthDetails::from_periods(&periods());
        assert_eq!(details.day.as_deref(), Some("3rd"));
        assert_eq!(details.months[0].name, "March 2024");
        assert_eq!(details.months[1].period_name, "2024-02");

        assert_eq!(details.describe(&Period::All), "all months");
        assert_eq!(details.describe(&"2024-02".parse().unwrap()), "February 2024");
        assert_eq!(details.describe(&"2023-01".parse().unwrap()), "");
    }

    #[test]
    fn option_titles() {
        let details = MonthDetails::from_periods(&periods());
        assert_eq!(details.option_title("2024-03"), "March 2024 (up to 3rd)");
        assert_eq!(details.option_title("2024-02"), "February 2024");
        assert_eq!(details.option_title("2019-01"), "2019-01");
    }

    #[test]
    fn empty_details() {
        let details = MonthDetails::from_periods(&[]);
        assert!(details.months.is_empty());
        assert_eq!(details.day, None);
    }
}
