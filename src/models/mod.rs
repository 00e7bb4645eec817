mod catalog;
mod stats;

pub use catalog::{CatalogDump, Dataset, DatasetDump, Publisher, Resource, ResourceDump};
pub use stats::{GaReferralStat, GaStat, GaUrl, StatName, UrlQuery};
