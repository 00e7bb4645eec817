use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ga_report::analytics::{
    import_catalog, read_dump, Fetcher, GaClient, LoadOptions, Loader, Upserter,
};
use ga_report::config::Config;
use ga_report::period::{LoadTarget, Month};
use ga_report::storage::{self, Storage};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ga-report-admin")]
#[command(about = "Load and maintain site usage statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the statistics tables
    Init,
    /// Recompute the All rows from the monthly rows
    Fix,
    /// Fetch statistics from the analytics API and store them
    Load {
        /// latest, all or a month in YYYY-MM form
        #[arg(default_value = "latest")]
        period: String,
        /// Delete each month's stored data before loading it
        #[arg(short, long)]
        delete_first: bool,
        /// Only load site-wide statistics
        #[arg(short, long)]
        skip_url_stats: bool,
    },
    /// Load publishers, datasets and resources from a portal JSON dump
    ImportCatalog {
        /// Path to the dump
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    ga_report::init_tracing();

    let cli = Cli::parse();
    let config = Config::load()?;

    let storage = storage::connect(&config.database).await?;
    storage.init().await.context("failed to initialise the database")?;

    match cli.command {
        Commands::Init => {
            println!("✓ Tables are up to date");
        }
        Commands::Fix => {
            let upserter = upserter(&storage, &config);
            let fixed = upserter.fix().await?;
            println!("✓ Updated All rows for {} urls", fixed);
        }
        Commands::Load {
            period,
            delete_first,
            skip_url_stats,
        } => {
            // validate before touching the network
            let target: LoadTarget = period.parse()?;
            let first_month: Month = config
                .ga
                .first_month
                .parse()
                .context("invalid ga.first_month")?;

            let client = GaClient::from_config(&config.ga, &config.site_url)
                .await
                .context("cannot connect to the analytics API")?;
            let fetcher = Fetcher::new(
                Arc::new(client),
                config.ga.page_size,
                config.ga.dataset_path.clone(),
                config.ga.publisher_path.clone(),
            );
            let loader = Loader::new(fetcher, Arc::new(upserter(&storage, &config)), first_month);

            let today = chrono::Local::now().date_naive();
            let summary = loader
                .load(
                    target,
                    LoadOptions {
                        delete_first,
                        skip_url_stats,
                    },
                    today,
                )
                .await?;

            println!(
                "✓ Loaded {} ({} urls, {} stats, {} referrals, {} download counts)",
                summary.periods.join(", "),
                summary.urls,
                summary.stats,
                summary.referrals,
                summary.downloads
            );
        }
        Commands::ImportCatalog { file } => {
            let dump = read_dump(&file)?;
            let summary = import_catalog(storage.as_ref(), &dump).await?;
            println!(
                "✓ Imported {} publishers, {} datasets, {} resources",
                summary.publishers, summary.datasets, summary.resources
            );
        }
    }

    Ok(())
}

fn upserter(storage: &Arc<dyn Storage>, config: &Config) -> Upserter {
    Upserter::new(
        Arc::clone(storage),
        config.ga.dataset_path.clone(),
        config.ga.publisher_path.clone(),
    )
}
