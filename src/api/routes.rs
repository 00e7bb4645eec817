use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    assets, dataset_segment, datasets, health_check, most_popular_datasets, popular_datasets,
    publishers, root_export, single_popular_dataset, site_usage, site_usage_export, AppState,
};

pub fn create_router(state: Arc<AppState>) -> Router {
    let reports = Router::new()
        .route("/site-usage", get(site_usage))
        .route("/{export}", get(root_export))
        .route("/site-usage/publisher", get(publishers))
        .route("/site-usage/{export}", get(site_usage_export))
        .route("/site-usage/dataset", get(datasets))
        .route("/site-usage/dataset/{segment}", get(dataset_segment));

    let api = Router::new()
        .route("/api/ga-report/popular-datasets", get(popular_datasets))
        .route("/api/ga-report/most-popular-datasets", get(most_popular_datasets))
        .route("/api/ga-report/single-popular-dataset", get(single_popular_dataset));

    Router::new()
        .route("/health", get(health_check))
        .route("/assets/{*path}", get(assets))
        .merge(reports)
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
