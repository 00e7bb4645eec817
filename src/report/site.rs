use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::format::{absolutise, clean_key, is_summed_total, percent, round2, shorten_name, totals_order};
use super::graph::{to_graph, GraphSeries};
use super::months::{month_name, MonthDetails, MonthSource};
use super::{ReportError, Reporter};
use crate::analytics::fetcher::TOTAL_VISITS;
use crate::models::{GaStat, StatName};
use crate::period::Period;
use crate::storage::StatQuery;

#[derive(Debug, Clone, Serialize)]
pub struct SparkPoint {
    pub tooltip: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalRow {
    pub key: String,
    pub value: String,
    pub sparkline: Vec<SparkPoint>,
}

/// One breakdown table: keys and their share of the total.
#[derive(Debug, Clone, Serialize)]
pub struct Breakdown {
    pub stat: &'static str,
    pub slug: &'static str,
    pub rows: Vec<(String, String)>,
    pub graph: Vec<GraphSeries>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Referral {
    pub short_url: String,
    pub full_url: String,
    pub source: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteUsageReport {
    pub details: MonthDetails,
    pub month: Period,
    pub month_desc: String,
    pub totals: Vec<TotalRow>,
    pub breakdowns: Vec<Breakdown>,
    pub referrers: Vec<Referral>,
    pub referrer_totals: Vec<Referral>,
}

impl Reporter {
    pub async fn site_usage(&self, month: &Period) -> Result<SiteUsageReport, ReportError> {
        let details = self.month_details(MonthSource::Stats(None)).await?;
        let month_desc = details.describe(month);

        let (totals, total_visits) = self.site_totals(month).await?;

        let mut breakdowns = Vec::with_capacity(StatName::BREAKDOWNS.len());
        for stat in StatName::BREAKDOWNS {
            breakdowns.push(self.breakdown(stat, month, &details, total_visits).await?);
        }

        let (referrers, referrer_totals) = self.social_referrers(month).await?;

        Ok(SiteUsageReport {
            details,
            month: *month,
            month_desc,
            totals,
            breakdowns,
            referrers,
            referrer_totals,
        })
    }

    /// Totals for the month, or across all months, with their sparklines.
    /// Also returns the raw visit total used for social source shares.
    async fn site_totals(&self, month: &Period) -> Result<(Vec<TotalRow>, f64), ReportError> {
        let history = self
            .storage
            .list_stats(&StatQuery {
                stat_name: Some(StatName::Totals.as_str().to_string()),
                ..StatQuery::default()
            })
            .await?;

        let mut sparklines: HashMap<String, Vec<SparkPoint>> = HashMap::new();
        for stat in &history {
            let tooltip = format!(
                "{}: {}",
                month_name(&stat.period_name),
                clean_key(&stat.key, stat.numeric_value())
            );
            sparklines.entry(stat.key.clone()).or_default().push(SparkPoint {
                tooltip,
                value: stat.value.clone(),
            });
        }
        // the newest month is partial and would look like a drop-off
        for points in sparklines.values_mut() {
            points.pop();
        }

        let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for stat in history.iter().filter(|s| in_period(s, month)) {
            values.entry(stat.key.clone()).or_default().push(stat.numeric_value());
        }

        let mut total_visits = 0.0;
        let mut totals: Vec<TotalRow> = values
            .into_iter()
            .map(|(key, v)| {
                let value = if is_summed_total(&key) || !month.is_all() {
                    v.iter().sum::<f64>()
                } else {
                    round2(v.iter().sum::<f64>() / v.len() as f64)
                };
                if key == TOTAL_VISITS {
                    total_visits += value;
                }
                TotalRow {
                    value: clean_key(&key, value),
                    sparkline: sparklines.remove(&key).unwrap_or_default(),
                    key,
                }
            })
            .collect();
        totals.sort_by_key(|row| totals_order(&row.key));

        Ok((totals, total_visits))
    }

    async fn breakdown(
        &self,
        stat: StatName,
        month: &Period,
        details: &MonthDetails,
        total_visits: f64,
    ) -> Result<Breakdown, ReportError> {
        let history = self
            .storage
            .list_stats(&StatQuery {
                stat_name: Some(stat.as_str().to_string()),
                ..StatQuery::default()
            })
            .await?;

        let mut summed: HashMap<&str, i64> = HashMap::new();
        for row in history.iter().filter(|s| in_period(s, month)) {
            *summed.entry(row.key.as_str()).or_insert(0) += row.numeric_value() as i64;
        }
        let mut entries: Vec<(&str, i64)> = summed.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut series: BTreeMap<&str, GraphSeries> = BTreeMap::new();
        for row in &history {
            series
                .entry(row.key.as_str())
                .or_insert_with(|| GraphSeries::new(row.key.as_str()))
                .add(&row.period_name, row.numeric_value());
        }
        // table order first, then anything only seen in other months
        let mut ordered = Vec::with_capacity(series.len());
        for (key, _) in &entries {
            if let Some(s) = series.remove(key) {
                ordered.push(s);
            }
        }
        ordered.extend(series.into_values());

        let total = if stat == StatName::SocialSources {
            total_visits
        } else {
            entries.iter().map(|(_, n)| *n as f64).sum()
        };

        Ok(Breakdown {
            stat: stat.as_str(),
            slug: stat.slug(),
            rows: entries
                .iter()
                .map(|(key, n)| (key.to_string(), percent(*n as f64, total)))
                .collect(),
            graph: to_graph(ordered, &details.months, true),
        })
    }

    /// Individual social referrals and their totals per landing url.
    async fn social_referrers(&self, month: &Period) -> Result<(Vec<Referral>, Vec<Referral>), ReportError> {
        let period_name = (!month.is_all()).then(|| month.name());
        let rows = self.storage.list_referrals(period_name.as_deref()).await?;
        let site_url = &self.settings.site_url;

        let referrers = rows
            .iter()
            .map(|r| Referral {
                short_url: shorten_name(&r.url),
                full_url: absolutise(site_url, &r.url),
                source: r.source.clone(),
                count: r.count,
            })
            .collect();

        let mut per_url: HashMap<&str, i64> = HashMap::new();
        for r in &rows {
            *per_url.entry(r.url.as_str()).or_insert(0) += r.count;
        }
        let mut totals: Vec<(&str, i64)> = per_url.into_iter().collect();
        totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let referrer_totals = totals
            .into_iter()
            .map(|(url, count)| Referral {
                short_url: shorten_name(url),
                full_url: absolutise(site_url, url),
                source: String::new(),
                count,
            })
            .collect();

        Ok((referrers, referrer_totals))
    }
}

fn in_period(stat: &GaStat, month: &Period) -> bool {
    match month {
        Period::All => true,
        Period::Month(m) => stat.period_name == m.to_string(),
    }
}
