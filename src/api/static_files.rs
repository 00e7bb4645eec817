use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use mime_guess::from_path;
use rust_embed::RustEmbed;
use std::path::{Component, Path, PathBuf};

#[derive(RustEmbed)]
#[folder = "assets"]
pub struct Assets;

/// Serve a stylesheet or script, preferring `static_dir` when configured.
pub async fn serve_asset(path: &str, static_dir: Option<&str>) -> Response {
    let path = path.trim_start_matches('/');
    if !is_safe(path) {
        return StatusCode::NOT_FOUND.into_response();
    }

    if let Some(dir) = static_dir {
        let file_path = PathBuf::from(dir).join(path);
        if let Ok(content) = tokio::fs::read(&file_path).await {
            return asset_response(&file_path, content);
        }
    }

    match Assets::get(path) {
        Some(content) => asset_response(Path::new(path), content.data.into_owned()),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

fn asset_response(path: &Path, content: Vec<u8>) -> Response {
    let mime = from_path(path).first_or_octet_stream();
    (
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        Body::from(content),
    )
        .into_response()
}

/// Reject absolute paths and parent-directory segments.
fn is_safe(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}
