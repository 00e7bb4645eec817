use crate::models::{Dataset, GaReferralStat, GaStat, GaUrl, Publisher, Resource, UrlQuery};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid record: {0}")]
    Invalid(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Values written for one `(url, period_name)` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub url: String,
    pub period_name: String,
    pub period_complete_day: i64,
    pub pageviews: i64,
    pub visits: i64,
    pub department_id: String,
    pub package_id: String,
}

/// Values written for one `(stat_name, key, period_name)` row.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRecord {
    pub stat_name: String,
    pub key: String,
    pub value: String,
    pub period_name: String,
    pub period_complete_day: i64,
}

/// Values written for one `(url, source, period_name)` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralRecord {
    pub url: String,
    pub source: String,
    pub count: i64,
    pub period_name: String,
}

/// Filters over `ga_stat` rows.
#[derive(Debug, Clone, Default)]
pub struct StatQuery {
    pub stat_name: Option<String>,
    pub exclude_stat_name: Option<String>,
    pub key: Option<String>,
    pub period_name: Option<String>,
}

/// A period present in the data and the last day it covers.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PeriodSummary {
    pub period_name: String,
    pub period_complete_day: i64,
}

impl UrlRecord {
    pub(crate) fn validate(&self) -> StorageResult<()> {
        if self.url.is_empty() {
            return Err(StorageError::Invalid("url must not be empty".to_string()));
        }
        if self.period_name.is_empty() {
            return Err(StorageError::Invalid("period_name must not be empty".to_string()));
        }
        if self.pageviews < 0 || self.visits < 0 {
            return Err(StorageError::Invalid(format!(
                "negative counts for {} in {}",
                self.url, self.period_name
            )));
        }
        Ok(())
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Create tables and indexes if they do not exist
    async fn init(&self) -> Result<()>;

    /// Insert or replace the counts of a `(url, period_name)` row
    async fn upsert_url(&self, record: &UrlRecord) -> StorageResult<()>;

    /// List url rows matching the query, most viewed first
    async fn list_urls(&self, query: &UrlQuery) -> Result<Vec<GaUrl>>;

    /// Distinct urls that have at least one monthly row
    async fn urls_with_monthly_rows(&self) -> Result<Vec<String>>;

    /// Remove a single `(url, period_name)` row
    async fn delete_url_row(&self, url: &str, period_name: &str) -> Result<bool>;

    /// Insert or replace a statistic value
    async fn upsert_stat(&self, record: &StatRecord) -> StorageResult<()>;

    /// List statistics ordered by period, stat name and key
    async fn list_stats(&self, query: &StatQuery) -> Result<Vec<GaStat>>;

    /// Insert or replace a referral count
    async fn upsert_referral(&self, record: &ReferralRecord) -> StorageResult<()>;

    /// Referral rows, optionally limited to one period, highest count first
    async fn list_referrals(&self, period_name: Option<&str>) -> Result<Vec<GaReferralStat>>;

    /// Monthly periods present in `ga_url`, newest first
    async fn url_periods(&self) -> Result<Vec<PeriodSummary>>;

    /// Monthly periods present in `ga_stat`, newest first
    async fn stat_periods(&self, stat_name: Option<&str>) -> Result<Vec<PeriodSummary>>;

    /// Delete every row of a period from all three tables.
    /// Returns the urls whose rows were removed.
    async fn delete_period(&self, period_name: &str) -> Result<Vec<String>>;

    async fn upsert_publisher(&self, publisher: &Publisher) -> Result<()>;

    async fn get_publisher(&self, name: &str) -> Result<Option<Publisher>>;

    /// All publishers ordered by name
    async fn list_publishers(&self) -> Result<Vec<Publisher>>;

    async fn upsert_dataset(&self, dataset: &Dataset) -> Result<()>;

    async fn get_dataset(&self, name: &str) -> Result<Option<Dataset>>;

    /// Any active, public dataset
    async fn first_listed_dataset(&self) -> Result<Option<Dataset>>;

    /// Replace the resources attached to a dataset
    async fn replace_resources(&self, dataset_name: &str, resources: &[Resource]) -> Result<()>;

    async fn find_resource(&self, url: &str) -> Result<Option<Resource>>;

    /// Resources of a dataset in insertion order
    async fn dataset_resources(&self, dataset_name: &str) -> Result<Vec<Resource>>;
}
