use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use tokio::sync::RwLock;

use super::CatalogIndex;
use crate::usecases::u501_sync_catalog::errors::{SyncError, SyncResult};

/// Индекс из долговременного кеша с моментом построения
#[derive(Debug, Clone)]
pub struct CachedIndex {
    pub index: CatalogIndex,
    pub built_at: DateTime<Utc>,
}

/// Долговременный кеш индексов каталога
#[async_trait]
pub trait IndexCacheStore: Send + Sync {
    async fn load(&self, shop_id: &str, fingerprint: &str) -> SyncResult<Option<CachedIndex>>;

    async fn save(
        &self,
        shop_id: &str,
        fingerprint: &str,
        index: &CatalogIndex,
        built_at: DateTime<Utc>,
    ) -> SyncResult<()>;
}

fn cache_key(shop_id: &str, fingerprint: &str) -> String {
    format!("{shop_id}:{fingerprint}")
}

// ============================================================================
// sqlite (sea-orm)
// ============================================================================

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "u501_index_cache")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub cache_key: String,
    pub shop_id: String,
    pub fingerprint: String,
    pub entries_json: String,
    pub entry_count: i64,
    pub built_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS u501_index_cache (
        cache_key TEXT PRIMARY KEY NOT NULL,
        shop_id TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        entries_json TEXT NOT NULL,
        entry_count INTEGER NOT NULL DEFAULT 0,
        built_at TEXT NOT NULL
    );
"#;

/// Кеш индексов в таблице `u501_index_cache`
#[derive(Clone)]
pub struct DbIndexCacheStore {
    db: DatabaseConnection,
}

impl DbIndexCacheStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Удалить записи кеша старше N часов
    pub async fn cleanup_old(&self, hours: i64) -> SyncResult<u64> {
        let cutoff = (Utc::now() - chrono::Duration::hours(hours)).to_rfc3339();
        let result = Entity::delete_many()
            .filter(Column::BuiltAt.lt(cutoff))
            .exec(&self.db)
            .await?;
        tracing::info!(
            "Cleaned up {} stale catalog index cache rows (older than {} hours)",
            result.rows_affected,
            hours
        );
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl IndexCacheStore for DbIndexCacheStore {
    async fn load(&self, shop_id: &str, fingerprint: &str) -> SyncResult<Option<CachedIndex>> {
        let Some(row) = Entity::find_by_id(cache_key(shop_id, fingerprint))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let built_at = DateTime::parse_from_rfc3339(&row.built_at)
            .map_err(|e| SyncError::Storage(format!("bad built_at '{}': {e}", row.built_at)))?
            .with_timezone(&Utc);
        let index: CatalogIndex = serde_json::from_str(&row.entries_json)?;

        Ok(Some(CachedIndex { index, built_at }))
    }

    async fn save(
        &self,
        shop_id: &str,
        fingerprint: &str,
        index: &CatalogIndex,
        built_at: DateTime<Utc>,
    ) -> SyncResult<()> {
        let active = ActiveModel {
            cache_key: Set(cache_key(shop_id, fingerprint)),
            shop_id: Set(shop_id.to_string()),
            fingerprint: Set(fingerprint.to_string()),
            entries_json: Set(serde_json::to_string(index)?),
            entry_count: Set(index.len() as i64),
            built_at: Set(built_at.to_rfc3339()),
        };

        Entity::insert(active)
            .on_conflict(
                OnConflict::column(Column::CacheKey)
                    .update_columns([
                        Column::EntriesJson,
                        Column::EntryCount,
                        Column::BuiltAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        tracing::debug!(
            "Persisted catalog index: shop={}, fingerprint={}, keys={}",
            shop_id,
            fingerprint,
            index.len()
        );
        Ok(())
    }
}

// ============================================================================
// In-memory (tests)
// ============================================================================

/// Кеш в памяти процесса (без БД), для тестов построителя
#[cfg(test)]
#[derive(Default)]
pub struct MemoryIndexCacheStore {
    rows: RwLock<HashMap<String, CachedIndex>>,
}

#[cfg(test)]
#[async_trait]
impl IndexCacheStore for MemoryIndexCacheStore {
    async fn load(&self, shop_id: &str, fingerprint: &str) -> SyncResult<Option<CachedIndex>> {
        Ok(self
            .rows
            .read()
            .await
            .get(&cache_key(shop_id, fingerprint))
            .cloned())
    }

    async fn save(
        &self,
        shop_id: &str,
        fingerprint: &str,
        index: &CatalogIndex,
        built_at: DateTime<Utc>,
    ) -> SyncResult<()> {
        self.rows.write().await.insert(
            cache_key(shop_id, fingerprint),
            CachedIndex {
                index: index.clone(),
                built_at,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::u501_sync_catalog::index::CatalogIndexEntry;
    use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};
    use std::collections::BTreeMap;

    async fn store() -> DbIndexCacheStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            CREATE_TABLE_SQL.to_string(),
        ))
        .await
        .unwrap();
        DbIndexCacheStore::new(db)
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip_with_overwrite() {
        let store = store().await;
        assert!(store.load("shop", "fp").await.unwrap().is_none());

        let mut index = CatalogIndex::new(false);
        let row = BTreeMap::from([("Cikkszám".to_string(), "X1".to_string())]);
        index.insert("x1", CatalogIndexEntry::new("X1").with_row(row));
        let built_at = Utc::now();
        store.save("shop", "fp", &index, built_at).await.unwrap();

        let mut newer = index.clone();
        newer.insert("x2", CatalogIndexEntry::new("X2"));
        store.save("shop", "fp", &newer, built_at).await.unwrap();

        let cached = store.load("shop", "fp").await.unwrap().unwrap();
        assert_eq!(cached.index, newer);
        assert!(!cached.index.case_sensitive());
        assert_eq!(cached.built_at.timestamp(), built_at.timestamp());
        assert!(store.load("other-shop", "fp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_old_removes_stale_rows() {
        let store = store().await;
        let index = CatalogIndex::new(true);
        store
            .save("shop", "old", &index, Utc::now() - chrono::Duration::hours(48))
            .await
            .unwrap();
        store.save("shop", "new", &index, Utc::now()).await.unwrap();

        assert_eq!(store.cleanup_old(24).await.unwrap(), 1);
        assert!(store.load("shop", "old").await.unwrap().is_none());
        assert!(store.load("shop", "new").await.unwrap().is_some());
    }
}
