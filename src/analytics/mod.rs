//! The load pipeline: pull monthly figures from the analytics API and
//! store them as url, stat and referral rows.

pub mod catalog;
pub mod fetcher;
pub mod google;
pub mod loader;
pub mod source;
pub mod token;
pub mod upserter;

pub use catalog::{import_catalog, read_dump, ImportSummary};
pub use fetcher::Fetcher;
pub use google::GaClient;
pub use loader::{LoadOptions, LoadSummary, Loader};
pub use source::{AnalyticsSource, ReportPage, ReportQuery, SourceError};
pub use upserter::Upserter;
