//! HTTP surface: report pages, CSV exports and the popular-dataset API.

pub mod handlers;
pub mod routes;
pub mod static_files;
pub mod templates;

pub use handlers::AppState;
pub use routes::create_router;
