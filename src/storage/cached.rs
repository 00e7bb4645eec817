use crate::models::{Dataset, Publisher, Resource};
use crate::storage::Storage;
use anyhow::Result;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache over the portal catalog tables.
///
/// A load resolves the same dataset and publisher names many times over;
/// entries live for the length of a run and are never written back.
#[derive(Clone)]
pub struct CachedCatalog {
    inner: Arc<dyn Storage>,
    datasets: Cache<String, Option<Dataset>>,
    publishers: Cache<String, Option<Publisher>>,
    resources: Cache<String, Option<Resource>>,
}

impl CachedCatalog {
    pub fn new(inner: Arc<dyn Storage>, max_entries: u64) -> Self {
        Self {
            inner,
            datasets: lookup_cache(max_entries),
            publishers: lookup_cache(max_entries),
            resources: lookup_cache(max_entries),
        }
    }

    pub async fn dataset(&self, name: &str) -> Result<Option<Dataset>> {
        if let Some(hit) = self.datasets.get(name).await {
            return Ok(hit);
        }
        let dataset = self.inner.get_dataset(name).await?;
        self.datasets.insert(name.to_string(), dataset.clone()).await;
        Ok(dataset)
    }

    pub async fn publisher(&self, name: &str) -> Result<Option<Publisher>> {
        if let Some(hit) = self.publishers.get(name).await {
            return Ok(hit);
        }
        let publisher = self.inner.get_publisher(name).await?;
        self.publishers.insert(name.to_string(), publisher.clone()).await;
        Ok(publisher)
    }

    pub async fn resource(&self, url: &str) -> Result<Option<Resource>> {
        if let Some(hit) = self.resources.get(url).await {
            return Ok(hit);
        }
        let resource = self.inner.find_resource(url).await?;
        self.resources.insert(url.to_string(), resource.clone()).await;
        Ok(resource)
    }

    /// Forget everything, e.g. after a catalog import.
    pub fn invalidate_all(&self) {
        self.datasets.invalidate_all();
        self.publishers.invalidate_all();
        self.resources.invalidate_all();
    }
}

fn lookup_cache<V>(max_entries: u64) -> Cache<String, V>
where
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(max_entries)
        .time_to_live(Duration::from_secs(600))
        .build()
}
