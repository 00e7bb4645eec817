use std::collections::HashMap;

use rand::RngExt;
use serde::Serialize;
use tracing::{error, warn};

use super::{ReportError, Reporter};
use crate::models::{Dataset, Publisher, UrlQuery};

/// Attempts at drawing an active dataset from the top list before falling back.
const MAX_DRAWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularDataset {
    pub name: String,
    pub title: String,
    pub publisher_name: String,
    pub views: i64,
    pub visits: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopularDatasets {
    pub publisher: Publisher,
    pub datasets: Vec<PopularDataset>,
}

impl Reporter {
    /// A publisher's most viewed listed datasets, views and visits summed
    /// over every month.
    pub async fn most_popular_datasets(
        &self,
        publisher: &Publisher,
        count: usize,
    ) -> Result<Vec<PopularDataset>, ReportError> {
        let query = UrlQuery {
            exclude_all: true,
            ..UrlQuery::datasets(&self.settings.dataset_path).publisher(publisher.name.clone())
        };
        let rows = self.storage.list_urls(&query).await?;

        let mut known: HashMap<String, Option<Dataset>> = HashMap::new();
        let mut totals: HashMap<String, PopularDataset> = HashMap::new();
        for row in rows {
            if !known.contains_key(&row.package_id) {
                let dataset = self
                    .storage
                    .get_dataset(&row.package_id)
                    .await?
                    .filter(|d| {
                        let listed = d.is_listed();
                        if !listed {
                            warn!("Dataset {} is {} or private, skipping", d.name, d.state);
                        }
                        listed
                    });
                known.insert(row.package_id.clone(), dataset);
            }
            let Some(Some(dataset)) = known.get(&row.package_id) else {
                continue;
            };

            if !totals.contains_key(&dataset.name) && totals.len() >= count {
                continue;
            }
            let entry = totals
                .entry(dataset.name.clone())
                .or_insert_with(|| PopularDataset {
                    name: dataset.name.clone(),
                    title: dataset.title.clone(),
                    publisher_name: dataset.publisher_name.clone(),
                    views: 0,
                    visits: 0,
                });
            entry.views += row.pageviews;
            entry.visits += row.visits;
        }

        let mut datasets: Vec<PopularDataset> = totals.into_values().collect();
        datasets.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.name.cmp(&b.name)));
        Ok(datasets)
    }

    /// Popular datasets of a randomly chosen active publisher that has any.
    pub async fn popular_datasets(&self, count: usize) -> Result<Option<PopularDatasets>, ReportError> {
        let mut candidates: Vec<Publisher> = self
            .storage
            .list_publishers()
            .await?
            .into_iter()
            .filter(Publisher::is_active)
            .collect();

        while !candidates.is_empty() {
            let index = rand::rng().random_range(0..candidates.len());
            let publisher = candidates.swap_remove(index);

            let datasets = self.most_popular_datasets(&publisher, count).await?;
            if !datasets.is_empty() {
                return Ok(Some(PopularDatasets { publisher, datasets }));
            }
        }
        Ok(None)
    }

    /// A random dataset from the `top` most viewed, or any listed dataset.
    pub async fn single_popular_dataset(&self, top: usize) -> Result<Option<Dataset>, ReportError> {
        let query = UrlQuery {
            exclude_all: true,
            ..UrlQuery::datasets(&self.settings.dataset_path)
        };
        let rows = self.storage.list_urls(&query).await?;
        let pool = &rows[..rows.len().min(top)];

        if !pool.is_empty() {
            for _ in 0..MAX_DRAWS {
                let index = rand::rng().random_range(0..pool.len());
                if let Some(dataset) = self.storage.get_dataset(&pool[index].package_id).await? {
                    if dataset.is_listed() {
                        return Ok(Some(dataset));
                    }
                }
            }
        }

        let fallback = self.storage.first_listed_dataset().await?;
        if fallback.is_none() {
            error!("No listed datasets to feature");
        }
        Ok(fallback)
    }
}
