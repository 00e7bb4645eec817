use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    /// Public base URL of the portal, used to absolutise report links
    pub site_url: String,
    pub ga: GaConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaConfig {
    /// Path to the stored OAuth token or service-account key. `~` is expanded.
    #[serde(default)]
    pub token_filepath: String,
    /// Reporting profile ("view") id. Resolved via the management API when unset.
    #[serde(default)]
    pub profile_id: Option<String>,
    pub api_base_url: String,
    pub token_uri: String,
    pub page_size: u32,
    /// First month fetched by `load all`
    pub first_month: String,
    /// Path fragment identifying dataset pages, e.g. `/dataset/`
    pub dataset_path: String,
    /// Path fragment identifying publisher pages, e.g. `/publisher/`
    pub publisher_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Months before this one have no resource download data
    pub downloads_available_from: String,
    /// Directory overriding the embedded stylesheet and scripts
    #[serde(default)]
    pub static_dir: Option<String>,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        5
    }
}

impl GaConfig {
    /// Resolve `token_filepath`, expanding a leading `~`.
    pub fn token_path(&self) -> anyhow::Result<PathBuf> {
        let raw = self.token_filepath.trim();
        if raw.is_empty() {
            anyhow::bail!(
                "the analytics token file is not configured; set ga.token_filepath \
                 (GA_REPORT_GA__TOKEN_FILEPATH) to the path of the token file"
            );
        }

        if let Some(rest) = raw.strip_prefix("~/") {
            let home = std::env::var("HOME").context("cannot expand '~': HOME is not set")?;
            return Ok(PathBuf::from(home).join(rest));
        }

        Ok(PathBuf::from(raw))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig {
                backend: DatabaseBackend::Sqlite,
                url: "sqlite://./ga_report.db?mode=rwc".to_string(),
                max_connections: DatabaseConfig::default_max_connections(),
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            site_url: "http://localhost:8080".to_string(),
            ga: GaConfig {
                token_filepath: String::new(),
                profile_id: None,
                api_base_url: "https://www.googleapis.com/analytics/v3".to_string(),
                token_uri: "https://oauth2.googleapis.com/token".to_string(),
                page_size: 10_000,
                first_month: "2010-01".to_string(),
                dataset_path: "/dataset/".to_string(),
                publisher_path: "/publisher/".to_string(),
            },
            report: ReportConfig {
                downloads_available_from: "2012-12".to_string(),
                static_dir: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and
    /// `GA_REPORT_`-prefixed environment variables, in that order.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let file = std::env::var("GA_REPORT_CONFIG").unwrap_or_else(|_| "ga-report.toml".to_string());

        let defaults = config::Config::try_from(&Config::default())
            .context("failed to build default configuration")?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix("GA_REPORT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to read configuration (file: {file})"))?;

        let config: Config = settings
            .try_deserialize()
            .context("invalid configuration")?;

        if config.ga.page_size == 0 {
            anyhow::bail!("ga.page_size must be greater than zero");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_path_requires_a_value() {
        let mut ga = Config::default().ga;
        ga.token_filepath = "   ".to_string();
        let err = ga.token_path().unwrap_err();
        assert!(err.to_string().contains("token_filepath"));
    }

    #[test]
    fn token_path_expands_home() {
        let mut ga = Config::default().ga;
        ga.token_filepath = "~/ga/token.json".to_string();
        let home = std::env::var("HOME").unwrap();
        assert_eq!(
            ga.token_path().unwrap(),
            PathBuf::from(home).join("ga/token.json")
        );
    }

    #[test]
    fn backend_accepts_postgresql_alias() {
        let backend: DatabaseBackend = serde_json::from_str("\"postgresql\"").unwrap();
        assert_eq!(backend, DatabaseBackend::Postgres);
    }
}
