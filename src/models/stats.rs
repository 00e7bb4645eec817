use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Traffic for one url in one period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct GaUrl {
    pub id: i64,
    pub url: String,
    pub period_name: String,
    pub period_complete_day: i64,
    pub pageviews: i64,
    pub visits: i64,
    /// Publisher name, empty when unknown
    pub department_id: String,
    /// Dataset name, empty unless the url is a dataset page
    pub package_id: String,
}

/// A generic key/value statistic for one period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct GaStat {
    pub id: i64,
    pub stat_name: String,
    pub key: String,
    pub value: String,
    pub period_name: String,
    pub period_complete_day: i64,
}

impl GaStat {
    pub fn numeric_value(&self) -> f64 {
        self.value.trim().parse().unwrap_or(0.0)
    }
}

/// Visits arriving at `url` from a social `source`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct GaReferralStat {
    pub id: i64,
    pub url: String,
    pub source: String,
    pub count: i64,
    pub period_name: String,
}

/// The statistic families stored in `ga_stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatName {
    Totals,
    Browsers,
    BrowserVersions,
    OperatingSystems,
    OperatingSystemVersions,
    SocialSources,
    Languages,
    Country,
    Downloads,
}

impl StatName {
    /// Breakdowns shown on the site usage page, in display order.
    pub const BREAKDOWNS: [StatName; 7] = [
        StatName::Browsers,
        StatName::BrowserVersions,
        StatName::OperatingSystems,
        StatName::OperatingSystemVersions,
        StatName::SocialSources,
        StatName::Languages,
        StatName::Country,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatName::Totals => "Totals",
            StatName::Browsers => "Browsers",
            StatName::BrowserVersions => "Browser versions",
            StatName::OperatingSystems => "Operating Systems",
            StatName::OperatingSystemVersions => "Operating Systems versions",
            StatName::SocialSources => "Social sources",
            StatName::Languages => "Languages",
            StatName::Country => "Country",
            StatName::Downloads => "Downloads",
        }
    }

    /// Identifier used for HTML anchors and graph element ids.
    pub fn slug(&self) -> &'static str {
        match self {
            StatName::Totals => "totals",
            StatName::Browsers => "browsers",
            StatName::BrowserVersions => "browser_versions",
            StatName::OperatingSystems => "os",
            StatName::OperatingSystemVersions => "os_versions",
            StatName::SocialSources => "social_networks",
            StatName::Languages => "languages",
            StatName::Country => "country",
            StatName::Downloads => "downloads",
        }
    }
}

/// Filters over `ga_url` rows.
#[derive(Debug, Clone, Default)]
pub struct UrlQuery {
    pub period_name: Option<String>,
    pub exact_url: Option<String>,
    pub url_contains: Option<String>,
    pub department_id: Option<String>,
    pub package_ids: Option<Vec<String>>,
    /// Only rows with a non-empty `package_id`
    pub with_package: bool,
    /// Skip `All` rows
    pub exclude_all: bool,
}

impl UrlQuery {
    /// Dataset page rows, optionally within one publisher and period.
    pub fn datasets(dataset_path: &str) -> Self {
        Self {
            url_contains: Some(dataset_path.to_string()),
            with_package: true,
            ..Self::default()
        }
    }

    pub fn period(mut self, period_name: impl Into<String>) -> Self {
        self.period_name = Some(period_name.into());
        self
    }

    pub fn publisher(mut self, department_id: impl Into<String>) -> Self {
        self.department_id = Some(department_id.into());
        self
    }
}
