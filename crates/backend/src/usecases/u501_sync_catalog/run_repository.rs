use async_trait::async_trait;
use chrono::Utc;
use contracts::usecases::u501_sync_catalog::RunStats;
use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::{Deserialize, Serialize};
#[cfg(test)]
use tokio::sync::RwLock;
use uuid::Uuid;

use super::errors::SyncResult;

/// История запусков синхронизации
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Сохранить итог запуска, вернуть id записи
    async fn save(&self, stats: &RunStats) -> SyncResult<String>;

    /// Последние запуски процесса, новые первыми
    async fn list_by_process(&self, process_id: &str, limit: u64) -> SyncResult<Vec<RunStats>>;
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "u501_sync_run")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub process_id: String,
    pub shop_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub dry_run: bool,
    pub stats_json: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS u501_sync_run (
        id TEXT PRIMARY KEY NOT NULL,
        process_id TEXT NOT NULL,
        shop_id TEXT NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT,
        dry_run INTEGER NOT NULL DEFAULT 0,
        stats_json TEXT NOT NULL
    );
"#;

/// Запуски в таблице `u501_sync_run`
#[derive(Clone)]
pub struct DbRunStore {
    db: DatabaseConnection,
}

impl DbRunStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Удалить запуски старше N дней
    pub async fn cleanup_old(&self, days: i64) -> SyncResult<u64> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let result = Entity::delete_many()
            .filter(Column::StartedAt.lt(cutoff))
            .exec(&self.db)
            .await?;
        tracing::info!(
            "Cleaned up {} sync run records older than {} days",
            result.rows_affected,
            days
        );
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl RunStore for DbRunStore {
    async fn save(&self, stats: &RunStats) -> SyncResult<String> {
        let id = Uuid::new_v4().to_string();
        let active = ActiveModel {
            id: Set(id.clone()),
            process_id: Set(stats.process_id.clone()),
            shop_id: Set(stats.shop_id.clone()),
            started_at: Set(stats.started_at.to_rfc3339()),
            finished_at: Set(stats.finished_at.map(|t| t.to_rfc3339())),
            dry_run: Set(stats.dry_run),
            stats_json: Set(serde_json::to_string(stats)?),
        };
        active.insert(&self.db).await?;
        Ok(id)
    }

    async fn list_by_process(&self, process_id: &str, limit: u64) -> SyncResult<Vec<RunStats>> {
        let rows = Entity::find()
            .filter(Column::ProcessId.eq(process_id))
            .order_by_desc(Column::StartedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<RunStats>(&row.stats_json) {
                Ok(stats) => runs.push(stats),
                Err(e) => tracing::warn!("Skipping unreadable sync run {}: {}", row.id, e),
            }
        }
        Ok(runs)
    }
}

/// История в памяти (без БД), для тестов executor
#[cfg(test)]
#[derive(Default)]
pub struct MemoryRunStore {
    runs: RwLock<Vec<RunStats>>,
}

#[cfg(test)]
#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save(&self, stats: &RunStats) -> SyncResult<String> {
        self.runs.write().await.push(stats.clone());
        Ok(Uuid::new_v4().to_string())
    }

    async fn list_by_process(&self, process_id: &str, limit: u64) -> SyncResult<Vec<RunStats>> {
        let runs = self.runs.read().await;
        Ok(runs
            .iter()
            .rev()
            .filter(|r| r.process_id == process_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
