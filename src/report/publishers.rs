use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use super::graph::{to_graph, GraphSeries};
use super::months::{MonthDetails, MonthSource};
use super::{ReportError, Reporter};
use crate::models::{Publisher, UrlQuery};
use crate::period::Period;

const TOP_PUBLISHERS: usize = 100;
const GRAPH_PUBLISHERS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct PublisherRow {
    pub publisher: Publisher,
    pub views: i64,
    pub visits: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishersReport {
    pub details: MonthDetails,
    pub month: Period,
    pub month_desc: String,
    pub top: Vec<PublisherRow>,
    pub graph: Vec<GraphSeries>,
}

impl Reporter {
    pub async fn publishers_report(&self, month: &Period) -> Result<PublishersReport, ReportError> {
        let details = self.month_details(MonthSource::Urls).await?;
        let month_desc = details.describe(month);
        let top = self.top_publishers(month, Some(TOP_PUBLISHERS)).await?;
        let graph = self.top_publishers_graph(GRAPH_PUBLISHERS, &details).await?;

        Ok(PublishersReport {
            details,
            month: *month,
            month_desc,
            top,
            graph,
        })
    }

    /// Publishers ranked by dataset page views in `month`.
    pub async fn top_publishers(
        &self,
        month: &Period,
        limit: Option<usize>,
    ) -> Result<Vec<PublisherRow>, ReportError> {
        let ranked = self.rank_publishers(month).await?;

        let mut top = Vec::new();
        for (name, views, visits) in ranked {
            if limit.is_some_and(|limit| top.len() >= limit) {
                break;
            }
            match self.storage.get_publisher(&name).await? {
                Some(publisher) => top.push(PublisherRow {
                    publisher,
                    views,
                    visits,
                }),
                None => warn!("Publisher '{name}' has traffic but is not in the catalog"),
            }
        }
        Ok(top)
    }

    /// Monthly dataset page views of the most viewed publishers of all time.
    async fn top_publishers_graph(
        &self,
        limit: usize,
        details: &MonthDetails,
    ) -> Result<Vec<GraphSeries>, ReportError> {
        let leaders: Vec<String> = self
            .rank_publishers(&Period::All)
            .await?
            .into_iter()
            .take(limit)
            .map(|(name, _, _)| name)
            .collect();

        let mut series = Vec::with_capacity(leaders.len());
        for name in leaders {
            let title = match self.storage.get_publisher(&name).await? {
                Some(publisher) if !publisher.title.is_empty() => publisher.title,
                _ => name.clone(),
            };
            let mut s = GraphSeries::new(title);

            let query = UrlQuery {
                exclude_all: true,
                ..UrlQuery::datasets(&self.settings.dataset_path).publisher(name)
            };
            for row in self.storage.list_urls(&query).await? {
                s.add(&row.period_name, row.pageviews as f64);
            }
            series.push(s);
        }

        Ok(to_graph(series, &details.months, false))
    }

    /// `(publisher, views, visits)` over dataset pages, most viewed first.
    async fn rank_publishers(&self, month: &Period) -> Result<Vec<(String, i64, i64)>, ReportError> {
        let rows = self
            .storage
            .list_urls(&UrlQuery::datasets(&self.settings.dataset_path).period(month.name()))
            .await?;

        let mut sums: HashMap<String, (i64, i64)> = HashMap::new();
        for row in rows.into_iter().filter(|r| !r.department_id.is_empty()) {
            let entry = sums.entry(row.department_id).or_insert((0, 0));
            entry.0 += row.pageviews;
            entry.1 += row.visits;
        }

        let mut ranked: Vec<(String, i64, i64)> = sums
            .into_iter()
            .map(|(name, (views, visits))| (name, views, visits))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked)
    }
}
