use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::models::CatalogDump;
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub publishers: usize,
    pub datasets: usize,
    pub resources: usize,
}

pub fn read_dump(path: &Path) -> Result<CatalogDump> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read catalog dump {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a catalog dump", path.display()))
}

/// Copy a portal dump into the catalog tables. Resources of each dataset
/// are replaced wholesale.
pub async fn import_catalog(storage: &dyn Storage, dump: &CatalogDump) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for publisher in &dump.publishers {
        storage.upsert_publisher(publisher).await?;
        summary.publishers += 1;
    }

    for entry in &dump.datasets {
        let dataset = entry.dataset();
        storage.upsert_dataset(&dataset).await?;
        let resources = entry.resources();
        storage.replace_resources(&dataset.name, &resources).await?;
        summary.datasets += 1;
        summary.resources += resources.len();
    }

    info!(
        "Imported {} publishers, {} datasets and {} resources",
        summary.publishers, summary.datasets, summary.resources
    );
    Ok(summary)
}
