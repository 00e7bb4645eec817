use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use super::fetcher::Fetcher;
use super::upserter::{distinct, Upserter};
use crate::period::{DateWindow, LoadTarget, Month};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Remove each period's rows before reloading it
    pub delete_first: bool,
    /// Only load site-wide stats
    pub skip_url_stats: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub periods: Vec<String>,
    pub urls: usize,
    pub stats: usize,
    pub referrals: usize,
    pub downloads: usize,
    pub all_rows: usize,
    pub deleted_urls: usize,
}

/// Runs the fetch and upsert steps for each month of a load target.
pub struct Loader {
    fetcher: Fetcher,
    upserter: Arc<Upserter>,
    first_month: Month,
}

impl Loader {
    pub fn new(fetcher: Fetcher, upserter: Arc<Upserter>, first_month: Month) -> Self {
        Self {
            fetcher,
            upserter,
            first_month,
        }
    }

    pub async fn load(
        &self,
        target: LoadTarget,
        options: LoadOptions,
        today: NaiveDate,
    ) -> Result<LoadSummary> {
        let months = target.months(self.first_month, today);
        let mut summary = LoadSummary::default();

        for month in months {
            let window = DateWindow::for_month(month, today);
            self.load_period(&window, options, &mut summary)
                .await
                .with_context(|| format!("loading {} failed", month.name()))?;
            summary.periods.push(month.to_string());
        }

        info!(
            "Load finished: {} periods, {} urls, {} stats, {} referrals",
            summary.periods.len(),
            summary.urls,
            summary.stats,
            summary.referrals
        );
        Ok(summary)
    }

    async fn load_period(
        &self,
        window: &DateWindow,
        options: LoadOptions,
        summary: &mut LoadSummary,
    ) -> Result<()> {
        info!(
            "Loading {} ({} to {})",
            window.month.name(),
            window.start,
            window.end
        );

        if options.delete_first {
            summary.deleted_urls += self.upserter.delete_period(window.month).await?;
        }

        let mut touched = Vec::new();
        if !options.skip_url_stats {
            let rows = self.fetcher.url_stats(window).await?;
            info!("Fetched {} url rows for {}", rows.len(), window.month);
            touched = self.upserter.upsert_urls(window, &rows).await?;
            summary.urls += touched.len();
        }

        let stats = self.fetcher.site_stats(window).await?;
        summary.stats += self.upserter.upsert_stats(window, &stats).await?;

        let referrals = self.fetcher.social_stats(window).await?;
        summary.referrals += self.upserter.upsert_referrals(window, &referrals).await?;

        let downloads = self.fetcher.download_stats(window).await?;
        summary.downloads += self.upserter.upsert_downloads(window, &downloads).await?;

        let touched = distinct(touched);
        summary.all_rows += self.upserter.update_all_rows(&touched).await?;

        info!(
            "Finished {}: {} urls, {} stats, {} referrals",
            window.month.name(),
            touched.len(),
            stats.len(),
            referrals.len()
        );
        Ok(())
    }
}
