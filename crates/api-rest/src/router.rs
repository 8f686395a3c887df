//! Route table and middleware stack.

use crate::config::ServerConfig;
use crate::handlers::{self, AppState};
use crate::openapi::ApiDoc;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use media_core::{CoreConfig, MediaService};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Media routes, relative to the mount prefix.
///
/// Static segments win over parameters, so `upload`, `dir`, `search`, `create-folder` and
/// `delete-folder` cannot be read back as filenames through `GET`, and `meta` shadows a tenant
/// of that name.
pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/meta/:tenant/:collection/:filename",
            get(handlers::get_metadata),
        )
        .route("/:tenant", get(handlers::list_collections))
        .route(
            "/:tenant/:collection",
            get(handlers::list_files).post(handlers::create_collection),
        )
        .route("/:tenant/:collection/upload", post(handlers::upload))
        .route("/:tenant/:collection/dir", get(handlers::list_dir))
        .route("/:tenant/:collection/search", get(handlers::search))
        .route(
            "/:tenant/:collection/create-folder",
            post(handlers::create_folder),
        )
        .route(
            "/:tenant/:collection/delete-folder",
            delete(handlers::delete_folder),
        )
        .route(
            "/:tenant/:collection/:filename",
            get(handlers::get_file).delete(handlers::delete_file),
        )
        .route(
            "/:tenant/:collection/:filename/download",
            get(handlers::download),
        )
        .route(
            "/:tenant/:collection/:filename/move",
            post(handlers::move_file),
        )
        .route(
            "/:tenant/:collection/:filename/rename",
            post(handlers::rename_file),
        )
}

/// Builds the complete application: media routes under the configured prefix, health and
/// OpenAPI at the root, CORS and request tracing around everything.
pub fn build_router(cfg: &CoreConfig, server: &ServerConfig) -> Router {
    let state = AppState {
        service: MediaService::new(cfg),
    };

    let media = media_routes().layer(DefaultBodyLimit::max(server.max_upload_bytes()));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(openapi_json));
    let app = if cfg.url_prefix().is_empty() {
        app.merge(media)
    } else {
        app.nest(cfg.url_prefix(), media)
    };

    app.layer(cors_layer(server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(server.allowed_origins().iter().cloned()))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
