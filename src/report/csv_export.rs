//! CSV downloads of the stats, publisher and dataset tables.

use super::{ReportError, Reporter};
use crate::models::StatName;
use crate::period::Period;
use crate::storage::StatQuery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub body: Vec<u8>,
}

impl CsvExport {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename={}", self.filename)
    }
}

impl Reporter {
    /// Every statistic except downloads, for `month` or all months.
    pub async fn stats_csv(&self, month: &str) -> Result<CsvExport, ReportError> {
        let period = Period::from_param(Some(month))?;

        let stats = self
            .storage
            .list_stats(&StatQuery {
                exclude_stat_name: Some(StatName::Downloads.as_str().to_string()),
                period_name: (!period.is_all()).then(|| period.name()),
                ..StatQuery::default()
            })
            .await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Period", "Statistic", "Key", "Value"])?;
        for stat in &stats {
            writer.write_record([&stat.period_name, &stat.stat_name, &stat.key, &stat.value])?;
        }

        Ok(CsvExport {
            filename: format!("stats_{month}.csv"),
            body: finish(writer)?,
        })
    }

    pub async fn publishers_csv(&self, month: &str) -> Result<CsvExport, ReportError> {
        let period = Period::from_param(Some(month))?;
        let publishers = self.top_publishers(&period, None).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Publisher Title", "Publisher Name", "Views", "Visits", "Period Name"])?;
        for row in &publishers {
            let (views, visits) = (row.views.to_string(), row.visits.to_string());
            writer.write_record([
                row.publisher.title.as_str(),
                row.publisher.name.as_str(),
                views.as_str(),
                visits.as_str(),
                month,
            ])?;
        }

        Ok(CsvExport {
            filename: format!("publishers_{month}.csv"),
            body: finish(writer)?,
        })
    }

    /// Datasets of one publisher (or `all`) with views, visits and downloads.
    pub async fn datasets_csv(&self, id: &str, month: &str) -> Result<CsvExport, ReportError> {
        let period = Period::from_param(Some(month))?;
        let publisher = self.resolve_publisher(Some(id)).await?;
        let datasets = self.top_datasets(publisher.as_ref(), &period, None).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "Dataset Title",
            "Dataset Name",
            "Views",
            "Visits",
            "Resource downloads",
            "Dataset formats",
            "Period Name",
        ])?;
        for row in &datasets {
            let (views, visits) = (row.views.to_string(), row.visits.to_string());
            let downloads = row.downloads.to_string();
            let formats = row.formats.join(", ");
            writer.write_record([
                row.dataset.title.as_str(),
                row.dataset.name.as_str(),
                views.as_str(),
                visits.as_str(),
                downloads.as_str(),
                formats.as_str(),
                month,
            ])?;
        }

        Ok(CsvExport {
            filename: format!("datasets_{id}_{month}.csv"),
            body: finish(writer)?,
        })
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ReportError> {
    writer
        .into_inner()
        .map_err(|e| ReportError::Csv(e.into_error().into()))
}
