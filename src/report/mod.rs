//! Traffic reports over the stored url, stat and referral rows.

pub mod csv_export;
pub mod datasets;
pub mod format;
pub mod graph;
pub mod months;
pub mod popular;
pub mod publishers;
pub mod site;

use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::period::{Month, Period, PeriodError};
use crate::storage::Storage;

pub use csv_export::CsvExport;
pub use datasets::{DatasetRow, DatasetsReport, Downloads};
pub use graph::{to_graph, GraphPoint, GraphSeries};
pub use months::{month_option_title, MonthDetails, MonthOption, MonthSource};
pub use popular::{PopularDataset, PopularDatasets};
pub use publishers::{PublisherRow, PublishersReport};
pub use site::{Breakdown, Referral, SiteUsageReport, SparkPoint, TotalRow};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("a publisher with that name could not be found: {0}")]
    PublisherNotFound(String),
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Settings the reports need from the wider configuration.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub site_url: String,
    pub dataset_path: String,
    pub publisher_path: String,
    /// Download events were not tracked before this month
    pub downloads_available_from: Month,
}

impl ReportSettings {
    pub fn from_config(config: &Config) -> Result<Self, PeriodError> {
        Ok(Self {
            site_url: config.site_url.clone(),
            dataset_path: config.ga.dataset_path.clone(),
            publisher_path: config.ga.publisher_path.clone(),
            downloads_available_from: config.report.downloads_available_from.parse()?,
        })
    }

    pub fn has_download_data(&self, month: &Period) -> bool {
        match month {
            Period::All => true,
            Period::Month(m) => *m >= self.downloads_available_from,
        }
    }
}

#[derive(Clone)]
pub struct Reporter {
    storage: Arc<dyn Storage>,
    settings: ReportSettings,
}

impl Reporter {
    pub fn new(storage: Arc<dyn Storage>, settings: ReportSettings) -> Self {
        Self { storage, settings }
    }
}
