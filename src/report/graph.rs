//! Time series for the history graphs.

use std::collections::HashMap;

use serde::Serialize;

use super::months::MonthOption;
use crate::period::Month;

/// Series that never reach this share of a month are folded into `Other`.
const PERCENT_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GraphPoint {
    pub x: i64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSeries {
    pub name: String,
    /// Values keyed by period name
    #[serde(skip)]
    pub raw: HashMap<String, f64>,
    pub data: Vec<GraphPoint>,
}

impl GraphSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw: HashMap::new(),
            data: Vec::new(),
        }
    }

    pub fn add(&mut self, period_name: &str, value: f64) {
        *self.raw.entry(period_name.to_string()).or_insert(0.0) += value;
    }
}

/// Lay each series out over every known month except the newest, which is
/// incomplete. Months a series has no value for plot as zero.
///
/// In percentage mode each point becomes its share of that month's total.
pub fn to_graph(mut series: Vec<GraphSeries>, months: &[MonthOption], percentage: bool) -> Vec<GraphSeries> {
    if series.is_empty() {
        return series;
    }

    // months arrive newest first
    let mut x_axis: Vec<(&str, i64)> = months
        .iter()
        .rev()
        .filter_map(|m| {
            let month: Month = m.period_name.parse().ok()?;
            Some((m.period_name.as_str(), month.unix_epoch()))
        })
        .collect();
    x_axis.pop();

    let mut totals = vec![0.0; x_axis.len()];
    for s in &mut series {
        s.data = x_axis
            .iter()
            .enumerate()
            .map(|(i, (period_name, x))| {
                let y = s.raw.get(*period_name).copied().unwrap_or(0.0);
                totals[i] += y;
                GraphPoint { x: *x, y }
            })
            .collect();
    }

    if !percentage {
        return series;
    }

    let mut significant = Vec::new();
    let mut others = Vec::new();
    for mut s in series {
        let mut keep = false;
        for (point, total) in s.data.iter_mut().zip(&totals) {
            if *total == 0.0 {
                continue;
            }
            point.y = 100.0 * point.y / total;
            if point.y > PERCENT_THRESHOLD {
                keep = true;
            }
        }
        if keep {
            significant.push(s);
        } else {
            others.push(s);
        }
    }

    if !others.is_empty() {
        let data = x_axis
            .iter()
            .enumerate()
            .map(|(i, (_, x))| GraphPoint {
                x: *x,
                y: others.iter().map(|s| s.data[i].y).sum(),
            })
            .collect();
        significant.push(GraphSeries {
            name: "Other".to_string(),
            raw: HashMap::new(),
            data,
        });
    }

    significant
}
