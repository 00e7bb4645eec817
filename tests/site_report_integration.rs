//! Reporter behaviour over seeded stats, referrals and url rows.

use chrono::NaiveDate;
use ga_report::analytics::fetcher::{
    SiteStat, SocialReferral, UrlStat, PAGES_PER_VISIT, TOTAL_PAGE_VIEWS, TOTAL_VISITS,
};
use ga_report::analytics::{import_catalog, Upserter};
use ga_report::models::{CatalogDump, StatName};
use ga_report::period::{DateWindow, Period};
use ga_report::report::{Breakdown, ReportSettings, Reporter, SiteUsageReport};
use ga_report::storage::{SqliteStorage, Storage, UrlRecord};
use std::sync::Arc;

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();

    let dump: CatalogDump = serde_json::from_value(serde_json::json!({
        "publishers": [{"name": "dft", "title": "Department for Transport"}],
        "datasets": [
            {"name": "roads", "title": "Road traffic counts", "owner_org": "dft"},
            {"name": "rail", "title": "Rail usage", "owner_org": "dft"}
        ]
    }))
    .unwrap();
    import_catalog(&storage, &dump).await.unwrap();

    Arc::new(storage)
}

fn reporter(storage: &Arc<dyn Storage>) -> Reporter {
    Reporter::new(
        Arc::clone(storage),
        ReportSettings {
            site_url: "https://data.example".to_string(),
            dataset_path: "/dataset/".to_string(),
            publisher_path: "/publisher/".to_string(),
            downloads_available_from: "2012-12".parse().unwrap(),
        },
    )
}

fn window(month: &str) -> DateWindow {
    DateWindow::for_month(month.parse().unwrap(), NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
}

fn stat(stat: StatName, key: &str, value: &str) -> SiteStat {
    SiteStat {
        stat,
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn referral(url: &str, source: &str, count: i64) -> SocialReferral {
    SocialReferral {
        url: url.to_string(),
        source: source.to_string(),
        count,
    }
}

/// Two months of totals, browsers and social referrals.
async fn seed_site_stats(storage: &Arc<dyn Storage>) {
    let upserter = Upserter::new(Arc::clone(storage), "/dataset/", "/publisher/");

    let months = [
        ("2024-01", "250", "100", "2.0", "30", vec![referral("/dataset/roads", "Facebook", 10)]),
        (
            "2024-02",
            "600",
            "200",
            "3.0",
            "50",
            vec![
                referral("/dataset/roads", "Facebook", 20),
                referral("/dataset/rail", "Twitter", 5),
            ],
        ),
    ];
    for (month, pageviews, visits, pages_per_visit, chrome, referrals) in months {
        let window = window(month);
        upserter
            .upsert_stats(
                &window,
                &[
                    stat(StatName::Totals, TOTAL_PAGE_VIEWS, pageviews),
                    stat(StatName::Totals, TOTAL_VISITS, visits),
                    stat(StatName::Totals, PAGES_PER_VISIT, pages_per_visit),
                    stat(StatName::Browsers, "Chrome", chrome),
                    stat(StatName::Browsers, "Firefox", "10"),
                ],
            )
            .await
            .unwrap();
        upserter.upsert_referrals(&window, &referrals).await.unwrap();
    }
}

fn total<'a>(report: &'a SiteUsageReport, key: &str) -> &'a str {
    &report.totals.iter().find(|t| t.key == key).unwrap().value
}

fn breakdown<'a>(report: &'a SiteUsageReport, stat: StatName) -> &'a Breakdown {
    report.breakdowns.iter().find(|b| b.stat == stat.as_str()).unwrap()
}

fn shares(breakdown: &Breakdown) -> Vec<(&str, &str)> {
    breakdown
        .rows
        .iter()
        .map(|(key, share)| (key.as_str(), share.as_str()))
        .collect()
}

#[tokio::test]
async fn test_all_months_sums_visits_and_averages_the_rest() {
    let storage = create_test_storage().await;
    seed_site_stats(&storage).await;

    let report = reporter(&storage).site_usage(&Period::All).await.unwrap();

    let keys: Vec<&str> = report.totals.iter().map(|t| t.key.as_str()).collect();
    assert_eq!(keys, vec![TOTAL_PAGE_VIEWS, TOTAL_VISITS, PAGES_PER_VISIT]);
    assert_eq!(total(&report, TOTAL_PAGE_VIEWS), "850");
    assert_eq!(total(&report, TOTAL_VISITS), "300");
    assert_eq!(total(&report, PAGES_PER_VISIT), "2.50");
}

#[tokio::test]
async fn test_sparklines_leave_out_the_newest_month() {
    let storage = create_test_storage().await;
    seed_site_stats(&storage).await;

    let report = reporter(&storage).site_usage(&Period::All).await.unwrap();

    for row in &report.totals {
        assert_eq!(row.sparkline.len(), 1, "{}", row.key);
    }
    let visits = report.totals.iter().find(|t| t.key == TOTAL_VISITS).unwrap();
    assert_eq!(visits.sparkline[0].value, "100");
    assert!(visits.sparkline[0].tooltip.starts_with("January 2024"));
}

#[tokio::test]
async fn test_breakdown_shares() {
    let storage = create_test_storage().await;
    seed_site_stats(&storage).await;
    let reporter = reporter(&storage);

    let all = reporter.site_usage(&Period::All).await.unwrap();
    assert_eq!(
        shares(breakdown(&all, StatName::Browsers)),
        vec![("Chrome", "80.00%"), ("Firefox", "20.00%")]
    );
    // social sources are a share of every visit, not of social visits
    assert_eq!(
        shares(breakdown(&all, StatName::SocialSources)),
        vec![("Facebook", "10.00%"), ("Twitter", "1.67%")]
    );

    let january = reporter.site_usage(&"2024-01".parse().unwrap()).await.unwrap();
    assert_eq!(total(&january, TOTAL_VISITS), "100");
    assert_eq!(total(&january, PAGES_PER_VISIT), "2.00");
    assert_eq!(
        shares(breakdown(&january, StatName::Browsers)),
        vec![("Chrome", "75.00%"), ("Firefox", "25.00%")]
    );
    assert_eq!(
        shares(breakdown(&january, StatName::SocialSources)),
        vec![("Facebook", "10.00%")]
    );
}

#[tokio::test]
async fn test_referral_totals_per_url() {
    let storage = create_test_storage().await;
    seed_site_stats(&storage).await;

    let report = reporter(&storage).site_usage(&Period::All).await.unwrap();

    assert_eq!(report.referrers.len(), 3);
    let totals: Vec<(&str, i64)> = report
        .referrer_totals
        .iter()
        .map(|r| (r.full_url.as_str(), r.count))
        .collect();
    assert_eq!(
        totals,
        vec![
            ("https://data.example/dataset/roads", 30),
            ("https://data.example/dataset/rail", 5),
        ]
    );
    assert_eq!(report.referrer_totals[0].short_url, "/dataset/roads");
}

#[tokio::test]
async fn test_top_datasets_lists_each_dataset_once() {
    let storage = create_test_storage().await;
    let upserter = Upserter::new(Arc::clone(&storage), "/dataset/", "/publisher/");
    let january = window("2024-01");

    upserter
        .upsert_urls(
            &january,
            &[
                UrlStat {
                    path: "/dataset/roads".to_string(),
                    pageviews: 40,
                    visits: 20,
                },
                UrlStat {
                    path: "/dataset/rail".to_string(),
                    pageviews: 35,
                    visits: 15,
                },
            ],
        )
        .await
        .unwrap();
    // a row attributed to its dataset before sub-pages were left unowned
    storage
        .upsert_url(&UrlRecord {
            url: "/dataset/roads/resource/abc".to_string(),
            period_name: "2024-01".to_string(),
            period_complete_day: 31,
            pageviews: 30,
            visits: 10,
            department_id: "dft".to_string(),
            package_id: "roads".to_string(),
        })
        .await
        .unwrap();
    upserter.fix().await.unwrap();

    let reporter = reporter(&storage);
    let top = reporter.top_datasets(None, &Period::All, None).await.unwrap();
    let ranked: Vec<(&str, i64, i64)> = top
        .iter()
        .map(|row| (row.dataset.name.as_str(), row.views, row.visits))
        .collect();
    assert_eq!(ranked, vec![("roads", 70, 30), ("rail", 35, 15)]);

    let limited = reporter.top_datasets(None, &Period::All, Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);

    let export = reporter.datasets_csv("all", "all").await.unwrap();
    let body = String::from_utf8(export.body).unwrap();
    assert_eq!(body.lines().filter(|l| l.contains(",roads,")).count(), 1);
}
