pub mod api;
pub mod routes;
pub mod shared;
pub mod system;
pub mod usecases;

use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::usecases::u501_sync_catalog::index::repository::DbIndexCacheStore;
use crate::usecases::u501_sync_catalog::run_repository::DbRunStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    system::tracing::initialize()?;

    let config = shared::config::load_config()?;

    let db_path = shared::config::get_database_path(&config)?;
    shared::data::db::initialize_database(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("db init failed: {e}"))?;

    // Housekeeping of durable caches and run history
    let db = shared::data::db::get_connection()?;
    if let Err(e) = DbIndexCacheStore::new(db.clone())
        .cleanup_old(config.index.cache_ttl_hours)
        .await
    {
        tracing::warn!("Index cache cleanup failed: {}", e);
    }
    if let Err(e) = DbRunStore::new(db.clone())
        .cleanup_old(config.run.history_days)
        .await
    {
        tracing::warn!("Sync run history cleanup failed: {}", e);
    }

    api::handlers::usecases::init_u501(&config)?;

    let app = routes::configure_routes();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Starting server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
