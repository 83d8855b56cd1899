use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers;

/// Конфигурация всех роутов приложения
pub fn configure_routes() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        // UseCase u501: Sync catalog to UNAS
        .route(
            "/api/u501/sync/start",
            post(handlers::usecases::u501_start_sync),
        )
        .route(
            "/api/u501/sync/:session_id/progress",
            get(handlers::usecases::u501_get_progress),
        )
        .route(
            "/api/u501/runs/:process_id",
            get(handlers::usecases::u501_list_runs),
        )
        .route(
            "/api/u501/catalog/fields",
            post(handlers::usecases::u501_catalog_fields),
        )
        .layer(cors)
}
