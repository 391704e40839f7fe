//! HTTP endpoints using axum.
//!
//! Endpoints (all under the configured prefix):
//! - GET  /index              - rescan the image folder
//! - GET  /images_json        - the persisted manifest file
//! - GET  /images/:name       - image bytes by name
//! - GET  /images/:name/info  - image size and dimensions
//! - GET  /favorites          - favorites list from the settings file
//! - POST /favorites/:name    - toggle a favorite
//! - GET  /status             - size and age of the current index
//! - GET  /enabled            - liveness check for the front-end

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::error;

use crate::service::{read_manifest, AssetError, AssetService, ImageInfo, IndexStatus, RebuildReport};

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AssetService>,
}

/// Build the router, nested under `prefix` unless it is empty.
pub fn router(service: Arc<AssetService>, prefix: &str) -> Router {
    let routes = Router::new()
        .route("/index", get(rebuild_index))
        .route("/images_json", get(images_json))
        .route("/images/", get(empty_image_name))
        .route("/images/:name", get(image_file))
        .route("/images/:name/info", get(image_info))
        .route("/favorites", get(favorites))
        .route("/favorites/:name", post(toggle_favorite))
        .route("/status", get(status))
        .route("/enabled", get(enabled))
        .with_state(AppState { service });

    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(prefix, routes)
    }
}

#[derive(Serialize)]
struct FavoritesResponse {
    favorites: Vec<String>,
}

#[derive(Serialize)]
struct EnabledResponse {
    enabled: bool,
}

/// Run a filesystem-touching service call off the async workers
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, AssetError>
where
    F: FnOnce(&AssetService) -> T + Send + 'static,
    T: Send + 'static,
{
    let service = state.service.clone();
    Ok(tokio::task::spawn_blocking(move || f(&service)).await?)
}

async fn rebuild_index(State(state): State<AppState>) -> Json<RebuildReport> {
    let report = blocking(&state, |service| service.rebuild_index())
        .await
        .unwrap_or_else(|e| {
            error!("❌ Rebuild task failed: {e}");
            RebuildReport {
                success: false,
                count: 0,
            }
        });
    Json(report)
}

async fn images_json(State(state): State<AppState>) -> Result<Response, AssetError> {
    let path = blocking(&state, |service| service.manifest_file()).await?;
    let bytes = read_manifest(&path).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], bytes).into_response())
}

async fn empty_image_name() -> AssetError {
    AssetError::BadRequest("image name is empty".to_string())
}

async fn image_file(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AssetError> {
    let path = state.service.resolve_image(&name).await?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        // Deleted between the existence check and the read
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AssetError::NotFound(name));
        }
        Err(source) => return Err(AssetError::Io { path, source }),
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        bytes,
    )
        .into_response())
}

async fn image_info(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ImageInfo>, AssetError> {
    let info = blocking(&state, move |service| service.image_info(&name)).await??;
    Ok(Json(info))
}

async fn favorites(State(state): State<AppState>) -> Result<Json<FavoritesResponse>, AssetError> {
    let favorites = blocking(&state, |service| service.list_favorites()).await?;
    Ok(Json(FavoritesResponse { favorites }))
}

async fn toggle_favorite(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<FavoritesResponse>, AssetError> {
    let favorites = blocking(&state, move |service| service.toggle_favorite(&name)).await??;
    Ok(Json(FavoritesResponse { favorites }))
}

async fn status(State(state): State<AppState>) -> Json<IndexStatus> {
    Json(state.service.status())
}

async fn enabled() -> Json<EnabledResponse> {
    Json(EnabledResponse { enabled: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::state::settings::SettingsStore;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const PREFIX: &str = "/PreviewIndex";

    fn create_test_service() -> (TempDir, Arc<AssetService>) {
        let dir = TempDir::new().unwrap();
        let settings_path = dir.path().join("settings.json");
        fs::write(&settings_path, r#"{"Unrelated.key": 42}"#).unwrap();
        let config = ServerConfig {
            base_dir: dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let service = AssetService::new(&config, SettingsStore::at(settings_path));
        (dir, Arc::new(service))
    }

    fn add_image(dir: &TempDir, rel: &str, bytes: &[u8]) {
        let path = dir.path().join("web/images").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    async fn send(service: &Arc<AssetService>, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let app = router(service.clone(), PREFIX);
        let resp = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get_json(service: &Arc<AssetService>, uri: &str) -> (StatusCode, Value) {
        let (status, body) = send(service, Method::GET, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_enabled() {
        let (_dir, service) = create_test_service();
        let (status, body) = get_json(&service, "/PreviewIndex/enabled").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], true);
    }

    #[tokio::test]
    async fn test_index_then_fetch_image() {
        let (dir, service) = create_test_service();
        add_image(&dir, "robot.png", b"\x89PNG-ish");

        let (status, body) = get_json(&service, "/PreviewIndex/index").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 1);

        let (status, bytes) = send(&service, Method::GET, "/PreviewIndex/images/robot").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"\x89PNG-ish");
    }

    #[tokio::test]
    async fn test_image_content_type() {
        let (dir, service) = create_test_service();
        add_image(&dir, "pic.webp", b"w");
        service.rebuild_index();

        let app = router(service.clone(), PREFIX);
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/PreviewIndex/images/pic")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/webp");
    }

    #[tokio::test]
    async fn test_index_missing_root() {
        let (_dir, service) = create_test_service();
        let (status, body) = get_json(&service, "/PreviewIndex/index").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_unknown_and_empty_names() {
        let (dir, service) = create_test_service();
        add_image(&dir, "a.png", b"a");
        service.rebuild_index();

        let (status, body) = get_json(&service, "/PreviewIndex/images/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);

        let (status, body) = get_json(&service, "/PreviewIndex/images/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn test_deleted_image_is_404() {
        let (dir, service) = create_test_service();
        add_image(&dir, "temp.jpg", b"t");
        service.rebuild_index();
        fs::remove_file(dir.path().join("web/images/temp.jpg")).unwrap();

        let (status, _) = send(&service, Method::GET, "/PreviewIndex/images/temp").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_images_json() {
        let (dir, service) = create_test_service();
        let (status, _) = send(&service, Method::GET, "/PreviewIndex/images_json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        add_image(&dir, "one.png", b"1");
        add_image(&dir, "sub/two.jpeg", b"2");
        service.rebuild_index();

        let (status, body) = get_json(&service, "/PreviewIndex/images_json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["images"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_manifest_is_404() {
        let (dir, service) = create_test_service();
        fs::create_dir_all(dir.path().join("web/images/images.json")).unwrap();

        let (status, body) = get_json(&service, "/PreviewIndex/images_json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);
    }

    #[tokio::test]
    async fn test_image_info_route() {
        let (dir, service) = create_test_service();
        let path = dir.path().join("web/images/square.png");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::new(4, 4).save(&path).unwrap();
        service.rebuild_index();

        let (status, body) = get_json(&service, "/PreviewIndex/images/square/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "square");
        assert_eq!(body["width"], 4);
        assert_eq!(body["height"], 4);

        let (status, _) = get_json(&service, "/PreviewIndex/images/nothing/info").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_favorites_routes() {
        let (dir, service) = create_test_service();
        let (status, body) = get_json(&service, "/PreviewIndex/favorites").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["favorites"], serde_json::json!([]));

        let (status, _) = send(&service, Method::POST, "/PreviewIndex/favorites/owl").await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(&service, "/PreviewIndex/favorites").await;
        assert_eq!(body["favorites"], serde_json::json!(["owl"]));

        let settings: Value =
            serde_json::from_slice(&fs::read(dir.path().join("settings.json")).unwrap()).unwrap();
        assert_eq!(settings["Unrelated.key"], 42);
        assert_eq!(settings["PreviewIndex.favorites"], serde_json::json!(["owl"]));
    }

    #[tokio::test]
    async fn test_status_route() {
        let (dir, service) = create_test_service();
        let (_, body) = get_json(&service, "/PreviewIndex/status").await;
        assert_eq!(body["count"], 0);
        assert!(body["built_at"].is_null());

        add_image(&dir, "s.png", b"s");
        get_json(&service, "/PreviewIndex/index").await;
        let (_, body) = get_json(&service, "/PreviewIndex/status").await;
        assert_eq!(body["count"], 1);
        assert!(body["built_at"].is_string());
    }

    #[tokio::test]
    async fn test_unprefixed_router() {
        let (_dir, service) = create_test_service();
        let app = router(service, "");
        let resp = app
            .oneshot(Request::builder().uri("/enabled").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
