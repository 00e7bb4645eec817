//! The narrow interface to the external analytics API.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("analytics credentials unavailable: {0}")]
    Auth(String),
    #[error("analytics request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("analytics API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected analytics response: {0}")]
    Malformed(String),
}

/// One page of a report request. `start_index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    pub filters: Option<String>,
    pub sort: Option<String>,
    pub start_index: u32,
    pub max_results: u32,
}

impl ReportQuery {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, metrics: &[&str]) -> Self {
        Self {
            start_date,
            end_date,
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            dimensions: Vec::new(),
            filters: None,
            sort: None,
            start_index: 1,
            max_results: 1000,
        }
    }

    pub fn dimensions(mut self, dimensions: &[&str]) -> Self {
        self.dimensions = dimensions.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn filters(mut self, filters: impl Into<String>) -> Self {
        self.filters = Some(filters.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}

/// Rows returned for one page, with the total across all pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportPage {
    pub column_headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_results: u64,
}

/// Rows accumulated across every page of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRows {
    pub column_headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportRows {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.column_headers.iter().position(|h| h == name)
    }

    /// The value of `name` in `row`, or an empty string if absent.
    pub fn value<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.column(name)
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Run a single page of a report query
    async fn run_query(&self, query: &ReportQuery) -> Result<ReportPage, SourceError>;
}
