//! End-to-end load runs against a canned analytics source.

use async_trait::async_trait;
use chrono::NaiveDate;
use ga_report::analytics::{
    import_catalog, AnalyticsSource, Fetcher, LoadOptions, Loader, ReportPage, ReportQuery,
    SourceError, Upserter,
};
use ga_report::models::{CatalogDump, UrlQuery};
use ga_report::period::{LoadTarget, ALL};
use ga_report::storage::{SqliteStorage, StatQuery, Storage, UrlRecord};
use std::sync::{Arc, Mutex};

/// Answers every report with the same small data set, recording the start
/// date of each page-path query.
#[derive(Default)]
struct CannedSource {
    url_queries: Mutex<Vec<NaiveDate>>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[async_trait]
impl AnalyticsSource for CannedSource {
    async fn run_query(&self, query: &ReportQuery) -> Result<ReportPage, SourceError> {
        let first_dimension = query.dimensions.first().map(String::as_str);
        let (headers, rows): (Vec<String>, Vec<Vec<String>>) = match first_dimension {
            Some("ga:pagePath") => {
                self.url_queries.lock().unwrap().push(query.start_date);
                (
                    strings(&["ga:pagePath", "ga:pageviews", "ga:sessions"]),
                    vec![
                        strings(&["/dataset/roads?from=search", "10", "4"]),
                        strings(&["/publisher/dft", "3", "2"]),
                    ],
                )
            }
            Some("ga:browser") if query.dimensions.len() == 1 => (
                strings(&["ga:browser", "ga:sessions"]),
                vec![strings(&["Chrome", "30"]), strings(&["Firefox", "10"])],
            ),
            Some("ga:socialNetwork") => (
                strings(&["ga:socialNetwork", "ga:landingPagePath", "ga:sessions"]),
                vec![strings(&["Twitter", "/dataset/roads", "3"])],
            ),
            Some("ga:eventLabel") => (
                strings(&["ga:eventLabel", "ga:totalEvents"]),
                vec![strings(&["http://files.example/roads.csv", "6"])],
            ),
            Some(_) => {
                let mut headers = query.dimensions.clone();
                headers.push("ga:sessions".to_string());
                (headers, Vec::new())
            }
            None if query.metrics == ["ga:bounceRate"] => {
                (strings(&["ga:bounceRate"]), vec![strings(&["45.5"])])
            }
            None => (
                query.metrics.clone(),
                vec![strings(&["100", "40", "120.5", "2.5", "60.1", "35"])],
            ),
        };

        Ok(ReportPage {
            total_results: rows.len() as u64,
            column_headers: headers,
            rows,
        })
    }
}

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();

    let dump: CatalogDump = serde_json::from_value(serde_json::json!({
        "publishers": [{"name": "dft", "title": "Department for Transport"}],
        "datasets": [{
            "name": "roads",
            "title": "Road traffic counts",
            "organization": "dft",
            "resources": [{"url": "http://files.example/roads.csv", "format": "CSV"}]
        }]
    }))
    .unwrap();
    import_catalog(&storage, &dump).await.unwrap();

    Arc::new(storage)
}

fn loader(storage: &Arc<dyn Storage>, source: Arc<CannedSource>, first_month: &str) -> Loader {
    let fetcher = Fetcher::new(source, 100, "/dataset/", "/publisher/");
    let upserter = Arc::new(Upserter::new(Arc::clone(storage), "/dataset/", "/publisher/"));
    Loader::new(fetcher, upserter, first_month.parse().unwrap())
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

async fn all_row(storage: &Arc<dyn Storage>, url: &str) -> Option<(i64, i64)> {
    storage
        .list_urls(&UrlQuery {
            exact_url: Some(url.to_string()),
            period_name: Some(ALL.to_string()),
            ..UrlQuery::default()
        })
        .await
        .unwrap()
        .first()
        .map(|row| (row.pageviews, row.visits))
}

#[tokio::test]
async fn test_load_single_month() {
    let storage = create_test_storage().await;
    let source = Arc::new(CannedSource::default());
    let loader = loader(&storage, Arc::clone(&source), "2024-01");

    let summary = loader
        .load(LoadTarget::Month("2024-02".parse().unwrap()), LoadOptions::default(), today())
        .await
        .unwrap();

    assert_eq!(summary.periods, vec!["2024-02"]);
    assert_eq!(summary.urls, 2);
    assert_eq!(summary.all_rows, 2);
    assert_eq!(summary.referrals, 1);
    assert_eq!(summary.downloads, 1);
    // 7 totals and 2 browsers
    assert_eq!(summary.stats, 9);

    assert_eq!(all_row(&storage, "/dataset/roads").await, Some((10, 4)));

    let totals = storage
        .list_stats(&StatQuery {
            stat_name: Some("Totals".to_string()),
            period_name: Some("2024-02".to_string()),
            ..StatQuery::default()
        })
        .await
        .unwrap();
    let bounce = totals.iter().find(|s| s.key == "Bounce rate (home page)").unwrap();
    assert_eq!(bounce.value, "45.5");
    assert_eq!(bounce.period_complete_day, 29);

    let downloads = storage
        .list_stats(&StatQuery {
            stat_name: Some("Downloads".to_string()),
            ..StatQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(downloads[0].key, "roads");
    assert_eq!(downloads[0].value, "6");
}

#[tokio::test]
async fn test_load_all_walks_months_oldest_first() {
    let storage = create_test_storage().await;
    let source = Arc::new(CannedSource::default());
    let loader = loader(&storage, Arc::clone(&source), "2024-04");

    let summary = loader
        .load(LoadTarget::All, LoadOptions::default(), today())
        .await
        .unwrap();

    assert_eq!(summary.periods, vec!["2024-04", "2024-05", "2024-06"]);
    assert_eq!(
        *source.url_queries.lock().unwrap(),
        vec![
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        ]
    );
    assert_eq!(all_row(&storage, "/dataset/roads").await, Some((30, 12)));

    let periods = storage.url_periods().await.unwrap();
    assert_eq!(periods[0].period_name, "2024-06");
    assert_eq!(periods[0].period_complete_day, 15);
}

#[tokio::test]
async fn test_delete_first_clears_stale_rows() {
    let storage = create_test_storage().await;
    storage
        .upsert_url(&UrlRecord {
            url: "/dataset/stale".to_string(),
            period_name: "2024-03".to_string(),
            period_complete_day: 31,
            pageviews: 99,
            visits: 99,
            department_id: String::new(),
            package_id: String::new(),
        })
        .await
        .unwrap();

    let loader = loader(&storage, Arc::new(CannedSource::default()), "2024-01");
    let summary = loader
        .load(
            LoadTarget::Month("2024-03".parse().unwrap()),
            LoadOptions {
                delete_first: true,
                skip_url_stats: false,
            },
            today(),
        )
        .await
        .unwrap();

    assert_eq!(summary.deleted_urls, 1);
    let stale = storage
        .list_urls(&UrlQuery {
            exact_url: Some("/dataset/stale".to_string()),
            ..UrlQuery::default()
        })
        .await
        .unwrap();
    assert!(stale.is_empty());
}

#[tokio::test]
async fn test_skip_url_stats() {
    let storage = create_test_storage().await;
    let source = Arc::new(CannedSource::default());
    let loader = loader(&storage, Arc::clone(&source), "2024-01");

    let summary = loader
        .load(
            LoadTarget::Latest,
            LoadOptions {
                delete_first: false,
                skip_url_stats: true,
            },
            today(),
        )
        .await
        .unwrap();

    assert_eq!(summary.periods, vec!["2024-06"]);
    assert_eq!(summary.urls, 0);
    assert!(source.url_queries.lock().unwrap().is_empty());
    assert!(storage.url_periods().await.unwrap().is_empty());
    assert!(!storage.stat_periods(None).await.unwrap().is_empty());
}
