//! HTTP tests for the report pages, CSV exports and popular-dataset API.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use ga_report::analytics::fetcher::{DownloadCount, SiteStat, UrlStat, TOTAL_PAGE_VIEWS, TOTAL_VISITS};
use ga_report::analytics::{import_catalog, Upserter};
use ga_report::api::{create_router, AppState};
use ga_report::models::{CatalogDump, StatName};
use ga_report::period::DateWindow;
use ga_report::report::{ReportSettings, Reporter};
use ga_report::storage::{SqliteStorage, Storage};
use std::sync::Arc;
use tower::ServiceExt;

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();

    let dump: CatalogDump = serde_json::from_value(serde_json::json!({
        "publishers": [
            {"name": "dft", "title": "Department for Transport"},
            {"name": "defunct", "title": "Old Office", "state": "deleted"}
        ],
        "datasets": [
            {
                "name": "roads",
                "title": "Road traffic counts",
                "owner_org": "dft",
                "resources": [
                    {"url": "http://files.example/roads.csv", "format": "CSV"},
                    {"url": "http://files.example/roads.xls", "format": "XLS"}
                ]
            },
            {"name": "rail", "title": "Rail usage", "owner_org": "dft"},
            {"name": "secret", "title": "Private data", "owner_org": "dft", "private": true}
        ]
    }))
    .unwrap();
    import_catalog(&storage, &dump).await.unwrap();

    Arc::new(storage)
}

fn window(month: &str) -> DateWindow {
    DateWindow::for_month(month.parse().unwrap(), NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
}

fn url(path: &str, pageviews: i64, visits: i64) -> UrlStat {
    UrlStat {
        path: path.to_string(),
        pageviews,
        visits,
    }
}

fn total(key: &str, value: &str) -> SiteStat {
    SiteStat {
        stat: StatName::Totals,
        key: key.to_string(),
        value: value.to_string(),
    }
}

async fn seed(storage: &Arc<dyn Storage>) {
    let upserter = Upserter::new(Arc::clone(storage), "/dataset/", "/publisher/");

    let january = window("2024-01");
    upserter
        .upsert_urls(
            &january,
            &[
                url("/dataset/roads", 40, 20),
                url("/dataset/rail", 10, 5),
                url("/dataset/secret", 99, 99),
                url("/publisher/dft", 8, 4),
            ],
        )
        .await
        .unwrap();
    upserter
        .upsert_stats(&january, &[total(TOTAL_PAGE_VIEWS, "1500"), total(TOTAL_VISITS, "600")])
        .await
        .unwrap();
    upserter
        .upsert_downloads(
            &january,
            &[DownloadCount {
                resource_url: "http://files.example/roads.csv".to_string(),
                count: 12,
            }],
        )
        .await
        .unwrap();

    upserter
        .upsert_urls(&window("2024-02"), &[url("/dataset/roads", 5, 3)])
        .await
        .unwrap();
    upserter.fix().await.unwrap();
}

async fn create_test_app() -> Router {
    let storage = create_test_storage().await;
    seed(&storage).await;

    let settings = ReportSettings {
        site_url: "https://data.example".to_string(),
        dataset_path: "/dataset/".to_string(),
        publisher_path: "/publisher/".to_string(),
        downloads_available_from: "2012-12".parse().unwrap(),
    };
    let state = Arc::new(AppState {
        reporter: Reporter::new(storage, settings),
        static_dir: None,
    });
    create_router(state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, header::HeaderMap, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let (status, _, body) = get(create_test_app().await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("OK"));
}

#[tokio::test]
async fn test_site_usage_page() {
    let (status, headers, body) = get(create_test_app().await, "/site-usage?month=2024-01").await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    assert!(body.contains("Totals for"));
    assert!(body.contains(TOTAL_PAGE_VIEWS));
    assert!(body.contains("/site-usage_2024-01.csv"));
}

#[tokio::test]
async fn test_bad_month_is_rejected() {
    let (status, _, body) = get(create_test_app().await, "/site-usage?month=2024-13").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("error"));
}

#[tokio::test]
async fn test_stats_csv_export() {
    let (status, headers, body) = get(create_test_app().await, "/site-usage_2024-01.csv").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=stats_2024-01.csv"
    );
    let mut lines = body.lines();
    assert_eq!(lines.next(), Some("Period,Statistic,Key,Value"));
    assert!(body.contains("2024-01,Totals,Total page views,1500"));
    // downloads are exported with the dataset tables
    assert!(!body.contains("Downloads"));
}

#[tokio::test]
async fn test_unknown_root_path_is_not_found() {
    let (status, _, _) = get(create_test_app().await, "/favicon.ico").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_publishers_page_and_csv() {
    let app = create_test_app().await;

    let (status, _, body) = get(app.clone(), "/site-usage/publisher?month=2024-01").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Department for Transport"));
    assert!(body.contains("/site-usage/publishers_2024-01.csv"));

    let (status, headers, body) = get(app, "/site-usage/publishers_all.csv").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=publishers_all.csv"
    );
    let mut lines = body.lines();
    assert_eq!(
        lines.next(),
        Some("Publisher Title,Publisher Name,Views,Visits,Period Name")
    );
    // roads 45, rail 10 and secret 99 from the All rows
    assert_eq!(lines.next(), Some("Department for Transport,dft,154,127,all"));
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn test_datasets_page_for_publisher() {
    let app = create_test_app().await;

    let (status, _, body) = get(app.clone(), "/site-usage/dataset/dft?month=2024-01").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Datasets for Department for Transport"));
    assert!(body.contains("Road traffic counts"));
    assert!(!body.contains("Private data"));

    let (status, _, body) = get(app, "/site-usage/dataset?publisher=dft").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("/site-usage/dataset/datasets_dft_all.csv"));
}

#[tokio::test]
async fn test_unknown_publisher_is_not_found() {
    let app = create_test_app().await;

    let (status, _, body) = get(app.clone(), "/site-usage/dataset/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("nobody"));

    let (status, _, _) = get(app, "/site-usage/dataset/datasets_nobody_all.csv").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_datasets_csv_export() {
    let (status, headers, body) =
        get(create_test_app().await, "/site-usage/dataset/datasets_dft_2024-01.csv").await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=datasets_dft_2024-01.csv"
    );

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][1], "roads");
    assert_eq!(&rows[0][2], "40");
    assert_eq!(&rows[0][4], "12");
    assert_eq!(&rows[0][5], "CSV, XLS");
    assert_eq!(&rows[1][1], "rail");
}

#[tokio::test]
async fn test_popular_datasets_api() {
    let app = create_test_app().await;

    let (status, _, body) = get(app.clone(), "/api/ga-report/popular-datasets?count=1").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["publisher"]["name"], "dft");
    assert_eq!(json["datasets"].as_array().unwrap().len(), 1);

    let (status, _, body) = get(
        app.clone(),
        "/api/ga-report/most-popular-datasets?publisher=dft",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let datasets = json.as_array().unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[0]["name"], "roads");
    assert_eq!(datasets[0]["views"], 45);
    assert_eq!(datasets[0]["visits"], 23);

    let (status, _, _) = get(
        app.clone(),
        "/api/ga-report/most-popular-datasets?publisher=nobody",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = get(app, "/api/ga-report/single-popular-dataset?top=5").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let name = json["name"].as_str().unwrap();
    assert!(name == "roads" || name == "rail", "unexpected dataset {name}");
}

#[tokio::test]
async fn test_embedded_stylesheet() {
    let (status, headers, body) = get(create_test_app().await, "/assets/ga_report.css").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/css"));
    assert!(!body.is_empty());
}
