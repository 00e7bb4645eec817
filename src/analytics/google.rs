//! Core Reporting API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::source::{AnalyticsSource, ReportPage, ReportQuery, SourceError};
use super::token::TokenProvider;
use crate::config::GaConfig;

const MAX_ATTEMPTS: u32 = 4;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct GaClient {
    client: Client,
    api_base: String,
    profile_id: String,
    tokens: Arc<TokenProvider>,
}

#[derive(Debug, Deserialize)]
struct DataResponse {
    #[serde(rename = "totalResults", default)]
    total_results: u64,
    #[serde(rename = "columnHeaders", default)]
    column_headers: Vec<ColumnHeader>,
    #[serde(default)]
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ColumnHeader {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProfileList {
    #[serde(default)]
    items: Vec<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    id: String,
    #[serde(rename = "websiteUrl", default)]
    website_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl GaClient {
    /// Build a client from configuration, reading the token file and
    /// resolving the reporting profile if none is configured.
    pub async fn from_config(config: &GaConfig, site_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ga-report/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()?;

        let token_path = config.token_path()?;
        let tokens = Arc::new(TokenProvider::from_file(
            &token_path,
            client.clone(),
            &config.token_uri,
        )?);

        let api_base = config.api_base_url.trim_end_matches('/').to_string();

        let profile_id = match &config.profile_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => {
                let id = resolve_profile_id(&client, &api_base, &tokens, site_url).await?;
                info!("Resolved analytics profile {id} for {site_url}");
                id
            }
        };

        Ok(Self {
            client,
            api_base,
            profile_id,
            tokens,
        })
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    fn data_params(&self, query: &ReportQuery) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = vec![
            ("ids", format!("ga:{}", self.profile_id)),
            ("start-date", query.start_date.format("%Y-%m-%d").to_string()),
            ("end-date", query.end_date.format("%Y-%m-%d").to_string()),
            ("metrics", query.metrics.join(",")),
            ("start-index", query.start_index.to_string()),
            ("max-results", query.max_results.to_string()),
        ];
        if !query.dimensions.is_empty() {
            params.push(("dimensions", query.dimensions.join(",")));
        }
        if let Some(filters) = &query.filters {
            params.push(("filters", filters.clone()));
        }
        if let Some(sort) = &query.sort {
            params.push(("sort", sort.clone()));
        }
        params
    }
}

#[async_trait]
impl AnalyticsSource for GaClient {
    async fn run_query(&self, query: &ReportQuery) -> Result<ReportPage, SourceError> {
        let url = format!("{}/data/ga", self.api_base);
        let params = self.data_params(query);
        let body: DataResponse = get_json(&self.client, &url, &params, &self.tokens).await?;

        Ok(ReportPage {
            column_headers: body.column_headers.into_iter().map(|h| h.name).collect(),
            rows: body.rows,
            total_results: body.total_results,
        })
    }
}

/// GET with a bearer token, retrying rate-limit and server errors with backoff.
async fn get_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
    params: &[(&str, String)],
    tokens: &TokenProvider,
) -> Result<T, SourceError> {
    let mut attempt = 1;
    loop {
        let token = tokens.access_token().await?;
        let response = client
            .get(url)
            .query(params)
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            return response.json::<T>().await.map_err(SourceError::from);
        }

        let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
        let message = error_message(response).await;

        if retryable && attempt < MAX_ATTEMPTS {
            let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
            warn!("Analytics API returned {status} ({message}), retrying in {delay:?}");
            tokio::time::sleep(delay).await;
            attempt += 1;
            continue;
        }

        return Err(SourceError::Api {
            status: status.as_u16(),
            message,
        });
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|e| e.error.message)
        .unwrap_or(text)
}

async fn resolve_profile_id(
    client: &Client,
    api_base: &str,
    tokens: &TokenProvider,
    site_url: &str,
) -> Result<String, SourceError> {
    let url = format!("{api_base}/management/accounts/~all/webproperties/~all/profiles");
    let profiles: ProfileList = get_json(client, &url, &[], tokens).await?;
    debug!("Found {} analytics profiles", profiles.items.len());

    pick_profile(&profiles.items, site_url)
        .ok_or_else(|| SourceError::Malformed("no analytics profiles are available to this account".to_string()))
}

fn pick_profile(profiles: &[Profile], site_url: &str) -> Option<String> {
    let wanted = host_of(site_url);
    profiles
        .iter()
        .find(|p| !wanted.is_empty() && host_of(&p.website_url) == wanted)
        .or_else(|| profiles.first())
        .map(|p| p.id.clone())
}

fn host_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, url: &str) -> Profile {
        Profile {
            id: id.to_string(),
            website_url: url.to_string(),
        }
    }

    #[test]
    fn picks_profile_matching_site() {
        let profiles = vec![
            profile("1", "http://other.example"),
            profile("2", "https://www.data.example/"),
        ];
        assert_eq!(pick_profile(&profiles, "https://data.example"), Some("2".to_string()));
        assert_eq!(pick_profile(&profiles, "https://unknown.example"), Some("1".to_string()));
        assert_eq!(pick_profile(&[], "https://data.example"), None);
    }
}
