//! Writes fetched rows and keeps the `All` rows consistent.
//!
//! For every url, the `All` row holds the sum of pageviews and visits over
//! all of that url's monthly rows.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::fetcher::{DownloadCount, SiteStat, SocialReferral, UrlStat};
use crate::models::{StatName, UrlQuery};
use crate::period::{DateWindow, Month, ALL};
use crate::storage::{CachedCatalog, ReferralRecord, StatRecord, Storage, UrlRecord};

pub struct Upserter {
    storage: Arc<dyn Storage>,
    catalog: CachedCatalog,
    dataset_path: String,
    publisher_path: String,
}

/// Publisher and dataset a url belongs to; empty when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlOwner {
    pub department_id: String,
    pub package_id: String,
}

impl Upserter {
    pub fn new(
        storage: Arc<dyn Storage>,
        dataset_path: impl Into<String>,
        publisher_path: impl Into<String>,
    ) -> Self {
        let catalog = CachedCatalog::new(Arc::clone(&storage), 50_000);
        Self {
            storage,
            catalog,
            dataset_path: dataset_path.into(),
            publisher_path: publisher_path.into(),
        }
    }

    /// Upsert one month of url rows. Returns the normalised urls written.
    pub async fn upsert_urls(&self, window: &DateWindow, rows: &[UrlStat]) -> Result<Vec<String>> {
        let mut merged: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for row in rows {
            let url = normalize_path(&row.path);
            if url.is_empty() {
                continue;
            }
            let entry = merged.entry(url).or_insert((0, 0));
            entry.0 += row.pageviews;
            entry.1 += row.visits;
        }

        let period_name = window.month.to_string();
        for (url, (pageviews, visits)) in &merged {
            let owner = self.owner_of(url).await?;
            self.storage
                .upsert_url(&UrlRecord {
                    url: url.clone(),
                    period_name: period_name.clone(),
                    period_complete_day: window.complete_day as i64,
                    pageviews: *pageviews,
                    visits: *visits,
                    department_id: owner.department_id,
                    package_id: owner.package_id,
                })
                .await
                .with_context(|| format!("failed to store {url} for {period_name}"))?;
        }

        debug!("Stored {} urls for {}", merged.len(), period_name);
        Ok(merged.into_keys().collect())
    }

    pub async fn upsert_stats(&self, window: &DateWindow, stats: &[SiteStat]) -> Result<usize> {
        let period_name = window.month.to_string();
        for stat in stats {
            self.storage
                .upsert_stat(&StatRecord {
                    stat_name: stat.stat.as_str().to_string(),
                    key: stat.key.clone(),
                    value: stat.value.clone(),
                    period_name: period_name.clone(),
                    period_complete_day: window.complete_day as i64,
                })
                .await?;
        }
        Ok(stats.len())
    }

    /// Store referral rows and the per-network `Social sources` totals.
    /// Referrals without a landing path only count towards the totals.
    pub async fn upsert_referrals(
        &self,
        window: &DateWindow,
        referrals: &[SocialReferral],
    ) -> Result<usize> {
        let period_name = window.month.to_string();

        let mut per_url: BTreeMap<(String, String), i64> = BTreeMap::new();
        let mut per_source: BTreeMap<String, i64> = BTreeMap::new();
        for referral in referrals {
            *per_source.entry(referral.source.clone()).or_insert(0) += referral.count;
            let url = normalize_path(&referral.url);
            if url.is_empty() {
                continue;
            }
            *per_url.entry((url, referral.source.clone())).or_insert(0) += referral.count;
        }

        for ((url, source), count) in &per_url {
            self.storage
                .upsert_referral(&ReferralRecord {
                    url: url.clone(),
                    source: source.clone(),
                    count: *count,
                    period_name: period_name.clone(),
                })
                .await?;
        }

        let totals: Vec<SiteStat> = per_source
            .into_iter()
            .map(|(source, count)| SiteStat {
                stat: StatName::SocialSources,
                key: source,
                value: count.to_string(),
            })
            .collect();
        self.upsert_stats(window, &totals).await?;

        Ok(per_url.len())
    }

    /// Map download events to datasets and store them as `Downloads` stats.
    pub async fn upsert_downloads(
        &self,
        window: &DateWindow,
        downloads: &[DownloadCount],
    ) -> Result<usize> {
        let mut per_dataset: BTreeMap<String, i64> = BTreeMap::new();
        for download in downloads {
            match self.catalog.resource(&download.resource_url).await? {
                Some(resource) => {
                    *per_dataset.entry(resource.dataset_name).or_insert(0) += download.count;
                }
                None => {
                    warn!("No resource found for download url {}", download.resource_url);
                }
            }
        }

        let stats: Vec<SiteStat> = per_dataset
            .into_iter()
            .map(|(dataset, count)| SiteStat {
                stat: StatName::Downloads,
                key: dataset,
                value: count.to_string(),
            })
            .collect();
        self.upsert_stats(window, &stats).await
    }

    /// Recompute the `All` row of each url from its monthly rows.
    pub async fn update_all_rows<S: AsRef<str>>(&self, urls: &[S]) -> Result<usize> {
        let mut updated = 0;
        for url in urls {
            let url = url.as_ref();
            let mut monthly = self
                .storage
                .list_urls(&UrlQuery {
                    exact_url: Some(url.to_string()),
                    exclude_all: true,
                    ..UrlQuery::default()
                })
                .await?;

            if monthly.is_empty() {
                if self.storage.delete_url_row(url, ALL).await? {
                    debug!("Removed All row for {url}, it has no monthly rows left");
                }
                continue;
            }

            monthly.sort_by(|a, b| b.period_name.cmp(&a.period_name));
            let latest = &monthly[0];
            let pageviews = monthly.iter().map(|row| row.pageviews).sum();
            let visits = monthly.iter().map(|row| row.visits).sum();

            self.storage
                .upsert_url(&UrlRecord {
                    url: url.to_string(),
                    period_name: ALL.to_string(),
                    period_complete_day: 0,
                    pageviews,
                    visits,
                    department_id: latest.department_id.clone(),
                    package_id: latest.package_id.clone(),
                })
                .await?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Rebuild the `All` row of every url that has monthly data.
    pub async fn fix(&self) -> Result<usize> {
        let urls = self.storage.urls_with_monthly_rows().await?;
        info!("Updating All records for {} urls", urls.len());
        self.update_all_rows(&urls).await
    }

    /// Remove a month from every table and repair the affected `All` rows.
    pub async fn delete_period(&self, month: Month) -> Result<usize> {
        let period_name = month.to_string();
        let urls = self.storage.delete_period(&period_name).await?;
        info!("Deleted {} urls for {}", urls.len(), period_name);
        self.update_all_rows(&urls).await?;
        Ok(urls.len())
    }

    /// Resolve which publisher and dataset a normalised url belongs to.
    /// Only a dataset's own page is attributed; its sub-pages stay unowned.
    pub async fn owner_of(&self, url: &str) -> Result<UrlOwner> {
        if url.contains(self.dataset_path.as_str()) {
            let Some(name) = page_name_after(url, &self.dataset_path) else {
                return Ok(UrlOwner::default());
            };
            return Ok(match self.catalog.dataset(name).await? {
                Some(dataset) => UrlOwner {
                    department_id: dataset.publisher_name,
                    package_id: dataset.name,
                },
                None => {
                    debug!("Dataset '{name}' from {url} is not in the catalog");
                    UrlOwner::default()
                }
            });
        }

        if let Some(name) = path_segment_after(url, &self.publisher_path) {
            return Ok(match self.catalog.publisher(name).await? {
                Some(publisher) => UrlOwner {
                    department_id: publisher.name,
                    package_id: String::new(),
                },
                None => UrlOwner::default(),
            });
        }

        Ok(UrlOwner::default())
    }

}

/// Strip query string, fragment and trailing slash.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The path segment that follows `marker`, e.g. the dataset name in
/// `/data/dataset/roads/resource/1` for marker `/dataset/`.
fn path_segment_after<'a>(url: &'a str, marker: &str) -> Option<&'a str> {
    let start = url.find(marker)? + marker.len();
    url[start..].split('/').next().filter(|name| !name.is_empty())
}

/// The final segment after `marker` when nothing follows it, e.g. `roads`
/// in `/dataset/roads` but not in `/dataset/roads/resource/1`.
fn page_name_after<'a>(url: &'a str, marker: &str) -> Option<&'a str> {
    let start = url.find(marker)? + marker.len();
    Some(&url[start..]).filter(|name| !name.is_empty() && !name.contains('/'))
}

/// The urls touched by a load, deduplicated.
pub(crate) fn distinct(urls: impl IntoIterator<Item = String>) -> Vec<String> {
    urls.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path("/dataset/roads?x=1"), "/dataset/roads");
        assert_eq!(normalize_path("/dataset/roads/#top"), "/dataset/roads");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("?utm=1"), "");
    }

    #[test]
    fn finds_segments() {
        assert_eq!(path_segment_after("/data/dataset/roads/resource/1", "/dataset/"), Some("roads"));
        assert_eq!(path_segment_after("/dataset/", "/dataset/"), None);
        assert_eq!(path_segment_after("/publisher/dft", "/dataset/"), None);

        assert_eq!(page_name_after("/dataset/roads", "/dataset/"), Some("roads"));
        assert_eq!(page_name_after("/dataset/roads/resource/1", "/dataset/"), None);
        assert_eq!(page_name_after("/dataset/", "/dataset/"), None);
    }
}
