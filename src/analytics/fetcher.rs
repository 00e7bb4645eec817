//! Pulls one month of traffic data from an [`AnalyticsSource`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::source::{AnalyticsSource, ReportQuery, ReportRows, SourceError};
use crate::models::StatName;
use crate::period::DateWindow;

pub const TOTAL_PAGE_VIEWS: &str = "Total page views";
pub const TOTAL_VISITS: &str = "Total visits";
pub const AVERAGE_TIME_ON_SITE: &str = "Average time on site";
pub const PAGES_PER_VISIT: &str = "Pages per visit";
pub const NEW_VISITS: &str = "New visits";
pub const UNIQUE_VISITORS: &str = "Unique visitors";
pub const BOUNCE_RATE: &str = "Bounce rate (home page)";

/// Page views and visits for one page path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlStat {
    pub path: String,
    pub pageviews: i64,
    pub visits: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteStat {
    pub stat: StatName,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialReferral {
    pub url: String,
    pub source: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCount {
    pub resource_url: String,
    pub count: i64,
}

pub struct Fetcher {
    source: Arc<dyn AnalyticsSource>,
    page_size: u32,
    dataset_path: String,
    publisher_path: String,
}

impl Fetcher {
    pub fn new(
        source: Arc<dyn AnalyticsSource>,
        page_size: u32,
        dataset_path: impl Into<String>,
        publisher_path: impl Into<String>,
    ) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            dataset_path: dataset_path.into(),
            publisher_path: publisher_path.into(),
        }
    }

    /// Run `query` across every page of results.
    pub async fn fetch_all(&self, mut query: ReportQuery) -> Result<ReportRows, SourceError> {
        let mut collected = ReportRows::default();
        query.start_index = 1;
        query.max_results = self.page_size;

        loop {
            let page = self.source.run_query(&query).await?;
            let received = page.rows.len();
            if collected.column_headers.is_empty() {
                collected.column_headers = page.column_headers;
            }
            collected.rows.extend(page.rows);

            debug!(
                "Fetched {} of {} rows for {}",
                collected.rows.len(),
                page.total_results,
                query.dimensions.join(",")
            );

            if received == 0 || collected.rows.len() as u64 >= page.total_results {
                break;
            }
            query.start_index += received as u32;
        }

        Ok(collected)
    }

    /// Page views and visits for dataset and publisher pages.
    pub async fn url_stats(&self, window: &DateWindow) -> Result<Vec<UrlStat>, SourceError> {
        let query = ReportQuery::new(window.start, window.end, &["ga:pageviews", "ga:sessions"])
            .dimensions(&["ga:pagePath"])
            .filters(format!(
                "ga:pagePath=@{},ga:pagePath=@{}",
                escape_filter(&self.dataset_path),
                escape_filter(&self.publisher_path)
            ))
            .sort("-ga:pageviews");

        let rows = self.fetch_all(query).await?;
        Ok(rows
            .rows
            .iter()
            .map(|row| UrlStat {
                path: rows.value(row, "ga:pagePath").to_string(),
                pageviews: parse_count(rows.value(row, "ga:pageviews")),
                visits: parse_count(rows.value(row, "ga:sessions")),
            })
            .filter(|stat| !stat.path.is_empty())
            .collect())
    }

    /// Site-wide totals and the browser, OS, language and country breakdowns.
    pub async fn site_stats(&self, window: &DateWindow) -> Result<Vec<SiteStat>, SourceError> {
        let mut stats = self.totals(window).await?;

        stats.extend(
            self.breakdown(window, StatName::Browsers, &["ga:browser"])
                .await?,
        );
        stats.extend(
            self.breakdown(window, StatName::BrowserVersions, &["ga:browser", "ga:browserVersion"])
                .await?,
        );
        stats.extend(
            self.breakdown(window, StatName::OperatingSystems, &["ga:operatingSystem"])
                .await?,
        );
        stats.extend(
            self.breakdown(
                window,
                StatName::OperatingSystemVersions,
                &["ga:operatingSystem", "ga:operatingSystemVersion"],
            )
            .await?,
        );
        stats.extend(self.breakdown(window, StatName::Languages, &["ga:language"]).await?);
        stats.extend(self.breakdown(window, StatName::Country, &["ga:country"]).await?);

        Ok(stats)
    }

    async fn totals(&self, window: &DateWindow) -> Result<Vec<SiteStat>, SourceError> {
        const TOTALS: [(&str, &str); 6] = [
            ("ga:pageviews", TOTAL_PAGE_VIEWS),
            ("ga:sessions", TOTAL_VISITS),
            ("ga:avgSessionDuration", AVERAGE_TIME_ON_SITE),
            ("ga:pageviewsPerSession", PAGES_PER_VISIT),
            ("ga:percentNewSessions", NEW_VISITS),
            ("ga:users", UNIQUE_VISITORS),
        ];

        let metrics: Vec<&str> = TOTALS.iter().map(|(metric, _)| *metric).collect();
        let rows = self
            .fetch_all(ReportQuery::new(window.start, window.end, &metrics))
            .await?;

        let mut stats = Vec::new();
        if let Some(row) = rows.rows.first() {
            for (metric, key) in TOTALS {
                let value = rows.value(row, metric);
                if !value.is_empty() {
                    stats.push(SiteStat {
                        stat: StatName::Totals,
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }

        let bounce = self
            .fetch_all(
                ReportQuery::new(window.start, window.end, &["ga:bounceRate"])
                    .filters("ga:pagePath==/"),
            )
            .await?;
        if let Some(row) = bounce.rows.first() {
            let value = bounce.value(row, "ga:bounceRate");
            if !value.is_empty() {
                stats.push(SiteStat {
                    stat: StatName::Totals,
                    key: BOUNCE_RATE.to_string(),
                    value: value.to_string(),
                });
            }
        }

        Ok(stats)
    }

    /// Visits keyed by the given dimensions, summed over equal keys.
    async fn breakdown(
        &self,
        window: &DateWindow,
        stat: StatName,
        dimensions: &[&str],
    ) -> Result<Vec<SiteStat>, SourceError> {
        let query = ReportQuery::new(window.start, window.end, &["ga:sessions"])
            .dimensions(dimensions)
            .sort("-ga:sessions");
        let rows = self.fetch_all(query).await?;

        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for row in &rows.rows {
            let key = match dimensions {
                [name] => rows.value(row, name).to_string(),
                [name, version, ..] => {
                    let version = major_version(rows.value(row, version));
                    format!("{} {}", rows.value(row, name), version)
                        .trim()
                        .to_string()
                }
                [] => continue,
            };
            if key.is_empty() {
                continue;
            }
            *counts.entry(key).or_insert(0) += parse_count(rows.value(row, "ga:sessions"));
        }

        Ok(counts
            .into_iter()
            .map(|(key, count)| SiteStat {
                stat,
                key,
                value: count.to_string(),
            })
            .collect())
    }

    /// Visits from social networks, per landing page.
    pub async fn social_stats(&self, window: &DateWindow) -> Result<Vec<SocialReferral>, SourceError> {
        let query = ReportQuery::new(window.start, window.end, &["ga:sessions"])
            .dimensions(&["ga:socialNetwork", "ga:landingPagePath"])
            .filters("ga:socialNetwork!=(not set)")
            .sort("-ga:sessions");
        let rows = self.fetch_all(query).await?;

        Ok(rows
            .rows
            .iter()
            .map(|row| SocialReferral {
                url: rows.value(row, "ga:landingPagePath").to_string(),
                source: rows.value(row, "ga:socialNetwork").to_string(),
                count: parse_count(rows.value(row, "ga:sessions")),
            })
            .filter(|r| !r.url.is_empty() && !r.source.is_empty())
            .collect())
    }

    /// Resource download events keyed by resource url.
    pub async fn download_stats(&self, window: &DateWindow) -> Result<Vec<DownloadCount>, SourceError> {
        let query = ReportQuery::new(window.start, window.end, &["ga:totalEvents"])
            .dimensions(&["ga:eventLabel"])
            .filters("ga:eventCategory==Resource;ga:eventAction==Download")
            .sort("-ga:totalEvents");
        let rows = self.fetch_all(query).await?;

        Ok(rows
            .rows
            .iter()
            .map(|row| DownloadCount {
                resource_url: rows.value(row, "ga:eventLabel").to_string(),
                count: parse_count(rows.value(row, "ga:totalEvents")),
            })
            .filter(|d| !d.resource_url.is_empty())
            .collect())
    }
}

/// Counts arrive as strings; fractional values are truncated.
fn parse_count(value: &str) -> i64 {
    let value = value.trim();
    value
        .parse::<i64>()
        .or_else(|_| value.parse::<f64>().map(|v| v as i64))
        .unwrap_or(0)
        .max(0)
}

/// "120.0.6099.71" -> "120"
fn major_version(version: &str) -> &str {
    match version {
        "(not set)" => "",
        v => v.split('.').next().unwrap_or(v),
    }
}

/// Backslash-escape the filter operators `,` and `;`.
fn escape_filter(value: &str) -> String {
    value.replace('\\', "\\\\").replace(',', "\\,").replace(';', "\\;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::source::ReportPage;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    /// Serves `total` numbered rows, recording each requested start index.
    struct PagedSource {
        total: usize,
        starts: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl AnalyticsSource for PagedSource {
        async fn run_query(&self, query: &ReportQuery) -> Result<ReportPage, SourceError> {
            self.starts.lock().unwrap().push(query.start_index);
            let start = (query.start_index - 1) as usize;
            let end = (start + query.max_results as usize).min(self.total);
            Ok(ReportPage {
                column_headers: vec!["ga:pagePath".into(), "ga:pageviews".into(), "ga:sessions".into()],
                rows: (start..end)
                    .map(|i| vec![format!("/dataset/d{i}"), "2".into(), "1".into()])
                    .collect(),
                total_results: self.total as u64,
            })
        }
    }

    fn window() -> DateWindow {
        DateWindow::for_month("2024-01".parse().unwrap(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    #[tokio::test]
    async fn fetch_all_walks_every_page() {
        let source = Arc::new(PagedSource {
            total: 7,
            starts: Mutex::new(Vec::new()),
        });
        let fetcher = Fetcher::new(source.clone(), 3, "/dataset/", "/publisher/");

        let stats = fetcher.url_stats(&window()).await.unwrap();
        assert_eq!(stats.len(), 7);
        assert_eq!(stats[6].path, "/dataset/d6");
        assert_eq!(*source.starts.lock().unwrap(), vec![1, 4, 7]);
    }

    #[tokio::test]
    async fn fetch_all_stops_on_empty_page() {
        struct Liar;

        #[async_trait]
        impl AnalyticsSource for Liar {
            async fn run_query(&self, _query: &ReportQuery) -> Result<ReportPage, SourceError> {
                Ok(ReportPage {
                    column_headers: vec![],
                    rows: vec![],
                    total_results: 100,
                })
            }
        }

        let fetcher = Fetcher::new(Arc::new(Liar), 10, "/dataset/", "/publisher/");
        let rows = fetcher
            .fetch_all(ReportQuery::new(window().start, window().end, &["ga:sessions"]))
            .await
            .unwrap();
        assert!(rows.rows.is_empty());
    }

    #[test]
    fn helpers() {
        assert_eq!(parse_count("12"), 12);
        assert_eq!(parse_count("12.7"), 12);
        assert_eq!(parse_count("n/a"), 0);
        assert_eq!(major_version("120.0.6099.71"), "120");
        assert_eq!(major_version("(not set)"), "");
        assert_eq!(escape_filter("/a,b;c"), "/a\\,b\\;c");
    }
}
