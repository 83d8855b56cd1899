use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};
use once_cell::sync::{Lazy, OnceCell};
use serde::Deserialize;
use std::sync::Arc;

use crate::shared::config::Config;
use crate::usecases;
use crate::usecases::u501_sync_catalog::{ProgressTracker, SyncError, SyncExecutor};
use contracts::usecases::u501_sync_catalog::{
    CatalogField, CatalogFieldsRequest, RunStats, SyncProgress, SyncRequest, SyncResponse,
};

// ============================================================================
// UseCase u501: Sync catalog to UNAS
// ============================================================================

static SYNC_PROGRESS: Lazy<Arc<ProgressTracker>> = Lazy::new(|| Arc::new(ProgressTracker::new()));

static SYNC_EXECUTOR: OnceCell<Arc<SyncExecutor>> = OnceCell::new();

/// Создать executor синхронизации (один раз при старте)
pub fn init_u501(config: &Config) -> anyhow::Result<()> {
    let db = crate::shared::data::db::get_connection()?.clone();
    let executor = usecases::u501_sync_catalog::SyncExecutor::from_config(
        config,
        db,
        SYNC_PROGRESS.clone(),
    );
    SYNC_EXECUTOR
        .set(Arc::new(executor))
        .map_err(|_| anyhow::anyhow!("u501 executor is already initialized"))
}

fn executor() -> Result<&'static Arc<SyncExecutor>, StatusCode> {
    SYNC_EXECUTOR.get().ok_or_else(|| {
        tracing::error!("u501 executor is not initialized");
        StatusCode::SERVICE_UNAVAILABLE
    })
}

fn status_for(error: &SyncError) -> StatusCode {
    match error {
        SyncError::Auth(_) => StatusCode::UNAUTHORIZED,
        SyncError::Config(_) => StatusCode::BAD_REQUEST,
        SyncError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// POST /api/u501/sync/start
pub async fn u501_start_sync(
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, StatusCode> {
    match executor()?.start_sync(request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::error!("Failed to start catalog sync: {}", e);
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

/// GET /api/u501/sync/:session_id/progress
pub async fn u501_get_progress(
    Path(session_id): Path<String>,
) -> Result<Json<SyncProgress>, StatusCode> {
    match SYNC_PROGRESS.get_progress(&session_id) {
        Some(progress) => Ok(Json(progress)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<u64>,
}

/// GET /api/u501/runs/:process_id
pub async fn u501_list_runs(
    Path(process_id): Path<String>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<Vec<RunStats>>, StatusCode> {
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    match executor()?.list_runs(&process_id, limit).await {
        Ok(runs) => Ok(Json(runs)),
        Err(e) => {
            tracing::error!("Failed to list sync runs for {}: {}", process_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /api/u501/catalog/fields
pub async fn u501_catalog_fields(
    Json(request): Json<CatalogFieldsRequest>,
) -> Result<Json<Vec<CatalogField>>, StatusCode> {
    match executor()?.catalog_fields(&request.credential).await {
        Ok(fields) => Ok(Json(fields)),
        Err(e) => {
            tracing::error!(
                "Failed to read catalog fields for shop {}: {}",
                request.credential.shop_id,
                e
            );
            Err(status_for(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_for(&SyncError::Auth("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&SyncError::Config("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&SyncError::Transport("x".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let result = u501_get_progress(Path("missing".to_string())).await;
        assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);
    }
}
