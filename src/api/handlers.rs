use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use super::static_files::serve_asset;
use super::templates;
use crate::models::Dataset;
use crate::period::Period;
use crate::report::{CsvExport, PopularDataset, PopularDatasets, ReportError, Reporter};

pub struct AppState {
    pub reporter: Reporter,
    /// Directory overriding the embedded assets
    pub static_dir: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    #[serde(default = "default_popular_count")]
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    #[serde(default = "default_top")]
    pub top: usize,
}

#[derive(Debug, Deserialize)]
pub struct PublisherCountQuery {
    pub publisher: String,
    #[serde(default = "default_top")]
    pub count: usize,
}

fn default_popular_count() -> usize {
    10
}

fn default_top() -> usize {
    100
}

/// Errors surfaced to HTTP clients.
pub struct ApiError(ReportError);

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ReportError::PublisherNotFound(_) => StatusCode::NOT_FOUND,
            ReportError::Period(_) => StatusCode::BAD_REQUEST,
            ReportError::Csv(_) | ReportError::Storage(_) => {
                error!("Report failed: {:#}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "internal error".to_string(),
            _ => self.0.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not found".to_string(),
        }),
    )
        .into_response()
}

fn csv_response(export: CsvExport) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, export.content_disposition()),
        ],
        export.body,
    )
        .into_response()
}

pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}

/// Site-wide totals, breakdowns and social referrals
pub async fn site_usage(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Html<String>> {
    let month = Period::from_param(query.month.as_deref()).map_err(ReportError::from)?;
    let report = state.reporter.site_usage(&month).await?;
    Ok(Html(templates::site_usage_page(&report)))
}

/// `/site-usage_{month}.csv`
pub async fn root_export(
    State(state): State<Arc<AppState>>,
    Path(export): Path<String>,
) -> ApiResult<Response> {
    let Some(month) = csv_name(&export, "site-usage_") else {
        return Ok(not_found());
    };
    let export = state.reporter.stats_csv(month).await?;
    Ok(csv_response(export))
}

pub async fn publishers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Html<String>> {
    let month = Period::from_param(query.month.as_deref()).map_err(ReportError::from)?;
    let report = state.reporter.publishers_report(&month).await?;
    Ok(Html(templates::publishers_page(&report)))
}

/// `/site-usage/publishers_{month}.csv`
pub async fn site_usage_export(
    State(state): State<Arc<AppState>>,
    Path(export): Path<String>,
) -> ApiResult<Response> {
    let Some(month) = csv_name(&export, "publishers_") else {
        return Ok(not_found());
    };
    let export = state.reporter.publishers_csv(month).await?;
    Ok(csv_response(export))
}

/// Most viewed datasets across all publishers, or the `publisher` query parameter's
pub async fn datasets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Html<String>> {
    read_publisher(&state, query.publisher.as_deref(), query.month.as_deref()).await
}

/// `/site-usage/dataset/{publisher}` or `/site-usage/dataset/datasets_{id}_{month}.csv`
pub async fn dataset_segment(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    if let Some(rest) = csv_name(&segment, "datasets_") {
        let Some((id, month)) = rest.rsplit_once('_') else {
            return Ok(not_found());
        };
        let export = state.reporter.datasets_csv(id, month).await?;
        return Ok(csv_response(export));
    }

    let publisher = query.publisher.as_deref().unwrap_or(&segment);
    let page = read_publisher(&state, Some(publisher), query.month.as_deref()).await?;
    Ok(page.into_response())
}

async fn read_publisher(
    state: &AppState,
    publisher: Option<&str>,
    month: Option<&str>,
) -> ApiResult<Html<String>> {
    let month = Period::from_param(month).map_err(ReportError::from)?;
    let report = state.reporter.datasets_report(publisher, &month).await?;
    Ok(Html(templates::datasets_page(&report)))
}

pub async fn popular_datasets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CountQuery>,
) -> ApiResult<Json<Option<PopularDatasets>>> {
    Ok(Json(state.reporter.popular_datasets(query.count).await?))
}

pub async fn most_popular_datasets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublisherCountQuery>,
) -> ApiResult<Json<Vec<PopularDataset>>> {
    let Some(publisher) = state.reporter.resolve_publisher(Some(&query.publisher)).await? else {
        return Err(ReportError::PublisherNotFound(query.publisher).into());
    };
    Ok(Json(
        state
            .reporter
            .most_popular_datasets(&publisher, query.count)
            .await?,
    ))
}

pub async fn single_popular_dataset(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> ApiResult<Json<Option<Dataset>>> {
    Ok(Json(state.reporter.single_popular_dataset(query.top).await?))
}

pub async fn assets(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> Response {
    serve_asset(&path, state.static_dir.as_deref()).await
}

/// The part of `name` between `prefix` and a `.csv` suffix.
fn csv_name<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix)?
        .strip_suffix(".csv")
        .filter(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_names() {
        assert_eq!(csv_name("site-usage_2024-03.csv", "site-usage_"), Some("2024-03"));
        assert_eq!(csv_name("datasets_dft_all.csv", "datasets_"), Some("dft_all"));
        assert_eq!(csv_name("site-usage_.csv", "site-usage_"), None);
        assert_eq!(csv_name("favicon.ico", "site-usage_"), None);
    }
}
