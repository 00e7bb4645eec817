use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use super::graph::{to_graph, GraphSeries};
use super::months::{MonthDetails, MonthSource};
use super::{ReportError, Reporter};
use crate::models::{Dataset, Publisher, StatName, UrlQuery};
use crate::period::Period;
use crate::storage::StatQuery;

const TOP_DATASETS: usize = 100;
const GRAPH_DATASETS: usize = 20;

/// Resource downloads, unknown for months before download tracking began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Downloads {
    Count(i64),
    NoData,
}

impl fmt::Display for Downloads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Downloads::Count(n) => write!(f, "{n}"),
            Downloads::NoData => f.write_str("No data"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetRow {
    pub dataset: Dataset,
    pub views: i64,
    pub visits: i64,
    pub downloads: Downloads,
    pub formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetsReport {
    pub details: MonthDetails,
    pub month: Period,
    pub month_desc: String,
    /// Active publishers for the selector
    pub publishers: Vec<Publisher>,
    pub publisher: Option<Publisher>,
    pub publisher_page_views: i64,
    pub top: Vec<DatasetRow>,
    pub graph: Vec<GraphSeries>,
}

impl Reporter {
    /// `None`, empty and `all` select every publisher. Unknown names are an error.
    pub async fn resolve_publisher(&self, id: Option<&str>) -> Result<Option<Publisher>, ReportError> {
        match id.map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(name) => self
                .storage
                .get_publisher(name)
                .await?
                .map(Some)
                .ok_or_else(|| ReportError::PublisherNotFound(name.to_string())),
        }
    }

    pub async fn datasets_report(
        &self,
        publisher_id: Option<&str>,
        month: &Period,
    ) -> Result<DatasetsReport, ReportError> {
        let publisher = self.resolve_publisher(publisher_id).await?;

        let publishers = self
            .storage
            .list_publishers()
            .await?
            .into_iter()
            .filter(Publisher::is_active)
            .collect();

        let details = self.month_details(MonthSource::Urls).await?;
        let month_desc = details.describe(month);

        let publisher_page_views = match &publisher {
            Some(p) => self.publisher_page_views(p, month).await?,
            None => 0,
        };

        let top = self
            .top_datasets(publisher.as_ref(), month, Some(TOP_DATASETS))
            .await?;
        let graph = self.top_datasets_graph(publisher.as_ref(), &details).await?;

        Ok(DatasetsReport {
            details,
            month: *month,
            month_desc,
            publishers,
            publisher,
            publisher_page_views,
            top,
            graph,
        })
    }

    /// Listed datasets ranked by page views in `month`.
    pub async fn top_datasets(
        &self,
        publisher: Option<&Publisher>,
        month: &Period,
        count: Option<usize>,
    ) -> Result<Vec<DatasetRow>, ReportError> {
        let have_download_data = self.settings.has_download_data(month);

        let mut query = UrlQuery::datasets(&self.settings.dataset_path).period(month.name());
        if let Some(p) = publisher {
            query = query.publisher(p.name.clone());
        }
        let entries = self.storage.list_urls(&query).await?;

        // several urls can carry the same package id
        let mut totals: HashMap<String, (i64, i64)> = HashMap::new();
        for entry in entries {
            let sum = totals.entry(entry.package_id).or_insert((0, 0));
            sum.0 += entry.pageviews;
            sum.1 += entry.visits;
        }
        let mut ranked: Vec<(String, (i64, i64))> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(&b.0)));

        let mut top = Vec::new();
        for (package_id, (views, visits)) in ranked {
            if count.is_some_and(|count| top.len() >= count) {
                break;
            }

            let Some(dataset) = self.storage.get_dataset(&package_id).await? else {
                warn!("Could not find dataset '{package_id}'");
                continue;
            };
            if !dataset.is_listed() {
                continue;
            }

            let downloads = if have_download_data {
                Downloads::Count(self.dataset_downloads(&dataset.name, month).await?)
            } else {
                Downloads::NoData
            };
            let formats = self.dataset_formats(&dataset.name).await?;

            top.push(DatasetRow {
                dataset,
                views,
                visits,
                downloads,
                formats,
            });
        }
        Ok(top)
    }

    async fn top_datasets_graph(
        &self,
        publisher: Option<&Publisher>,
        details: &MonthDetails,
    ) -> Result<Vec<GraphSeries>, ReportError> {
        let leaders = self
            .top_datasets(publisher, &Period::All, Some(GRAPH_DATASETS))
            .await?;
        if leaders.is_empty() {
            return Ok(Vec::new());
        }

        let query = UrlQuery {
            package_ids: Some(leaders.iter().map(|row| row.dataset.name.clone()).collect()),
            exclude_all: true,
            ..UrlQuery::datasets(&self.settings.dataset_path)
        };
        let mut by_name: HashMap<String, GraphSeries> = HashMap::new();
        for row in self.storage.list_urls(&query).await? {
            by_name
                .entry(row.package_id.clone())
                .or_insert_with(|| GraphSeries::new(String::new()))
                .add(&row.period_name, row.pageviews as f64);
        }

        let series = leaders
            .into_iter()
            .filter_map(|row| {
                let mut s = by_name.remove(&row.dataset.name)?;
                s.name = row.dataset.title;
                Some(s)
            })
            .collect();

        Ok(to_graph(series, &details.months, false))
    }

    async fn publisher_page_views(&self, publisher: &Publisher, month: &Period) -> Result<i64, ReportError> {
        let url = format!("{}{}", self.settings.publisher_path, publisher.name);
        let rows = self
            .storage
            .list_urls(&UrlQuery {
                exact_url: Some(url),
                period_name: Some(month.name()),
                ..UrlQuery::default()
            })
            .await?;
        Ok(rows.first().map(|r| r.pageviews).unwrap_or(0))
    }

    /// Downloads in `month`, or in every month for `All`.
    async fn dataset_downloads(&self, dataset_name: &str, month: &Period) -> Result<i64, ReportError> {
        let stats = self
            .storage
            .list_stats(&StatQuery {
                stat_name: Some(StatName::Downloads.as_str().to_string()),
                key: Some(dataset_name.to_string()),
                period_name: (!month.is_all()).then(|| month.name()),
                ..StatQuery::default()
            })
            .await?;
        Ok(stats.iter().map(|s| s.numeric_value() as i64).sum())
    }

    /// Distinct non-empty resource formats, in resource order.
    async fn dataset_formats(&self, dataset_name: &str) -> Result<Vec<String>, ReportError> {
        let mut formats: Vec<String> = Vec::new();
        for resource in self.storage.dataset_resources(dataset_name).await? {
            if !resource.format.is_empty() && !formats.contains(&resource.format) {
                formats.push(resource.format);
            }
        }
        Ok(formats)
    }
}
