pub mod bulk_export;
pub mod live_crawl;
pub mod repository;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use contracts::domain::a001_shop_credential::ShopCredential;
use contracts::domain::a002_sync_process::{IndexStrategyKind, ProcessConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::errors::{SyncError, SyncResult};
use super::key_matcher::canonicalize;
use crate::shared::config::IndexConfig;

pub use repository::{CachedIndex, IndexCacheStore};

// ============================================================================
// Index
// ============================================================================

/// Запись индекса: нативный идентификатор + сырая строка выгрузки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogIndexEntry {
    #[serde(rename = "nativeId")]
    pub native_id: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub row: BTreeMap<String, String>,
}

impl CatalogIndexEntry {
    pub fn new(native_id: impl Into<String>) -> Self {
        Self {
            native_id: native_id.into(),
            row: BTreeMap::new(),
        }
    }

    pub fn with_row(mut self, row: BTreeMap<String, String>) -> Self {
        self.row = row;
        self
    }
}

/// Канонический бизнес-ключ -> запись каталога
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogIndex {
    #[serde(rename = "caseSensitive")]
    case_sensitive: bool,
    entries: HashMap<String, CatalogIndexEntry>,
}

impl CatalogIndex {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            entries: HashMap::new(),
        }
    }

    /// Добавить запись; при повторе ключа побеждает последняя.
    /// Пустой ключ игнорируется. Возвращает `true`, если ключ уже был.
    pub fn insert(&mut self, raw_key: &str, entry: CatalogIndexEntry) -> bool {
        let key = canonicalize(raw_key, self.case_sensitive);
        if key.is_empty() {
            return false;
        }
        self.entries.insert(key, entry).is_some()
    }

    pub fn get(&self, canonical_key: &str) -> Option<&CatalogIndexEntry> {
        self.entries.get(canonical_key)
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Match config
// ============================================================================

/// Ключ каталога, по которому строится индекс
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogKey {
    /// Артикул товара (Sku)
    Sku,
    /// Значение параметра товара с указанным именем
    Param(String),
    /// Колонка выгрузки с точным заголовком
    Column(String),
}

impl CatalogKey {
    pub fn parse(raw: &str) -> SyncResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SyncError::Config("catalog key is empty".into()));
        }
        if raw.eq_ignore_ascii_case("sku") {
            return Ok(Self::Sku);
        }
        if let Some(name) = raw.strip_prefix("param:") {
            let name = name.trim();
            if name.is_empty() {
                return Err(SyncError::Config("parameter name is empty in catalog key".into()));
            }
            return Ok(Self::Param(name.to_string()));
        }
        Ok(Self::Column(raw.to_string()))
    }
}

impl std::fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sku => f.write_str("sku"),
            Self::Param(name) => write!(f, "param:{name}"),
            Self::Column(header) => write!(f, "column:{header}"),
        }
    }
}

/// Параметры построения индекса, выведенные из конфигурации процесса
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    pub catalog_key: CatalogKey,
    pub case_sensitive: bool,
    pub strategy: IndexStrategyKind,
    pub fallback_to_crawl: bool,
}

impl MatchConfig {
    pub fn from_process(config: &ProcessConfig) -> SyncResult<Self> {
        let pair = config
            .key_fields
            .as_ref()
            .ok_or_else(|| SyncError::Config("key field pair is not configured".into()))?;
        if pair.feed_key.trim().is_empty() {
            return Err(SyncError::Config("feed key field is empty".into()));
        }

        Ok(Self {
            catalog_key: CatalogKey::parse(&pair.catalog_key)?,
            case_sensitive: config.case_sensitive,
            strategy: config.index_strategy,
            fallback_to_crawl: config.fallback_to_crawl,
        })
    }

    /// Отпечаток конфигурации для ключа кеша
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.strategy.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.catalog_key.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(if self.case_sensitive { b"cs" } else { b"ci" });
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Способ получить полный индекс каталога
#[async_trait]
pub trait CatalogIndexStrategy: Send + Sync {
    fn kind(&self) -> IndexStrategyKind;

    async fn build(
        &self,
        credential: &ShopCredential,
        config: &MatchConfig,
    ) -> SyncResult<CatalogIndex>;
}

/// Откуда взят индекс для запуска
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    BulkExport,
    LiveCrawl,
    MemoryCache,
    DurableCache,
}

impl IndexSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BulkExport => "bulk_export",
            Self::LiveCrawl => "live_crawl",
            Self::MemoryCache => "memory_cache",
            Self::DurableCache => "durable_cache",
        }
    }

    fn from_kind(kind: IndexStrategyKind) -> Self {
        match kind {
            IndexStrategyKind::BulkExport => Self::BulkExport,
            IndexStrategyKind::LiveCrawl => Self::LiveCrawl,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone)]
pub struct IndexBuilderSettings {
    pub cache_ttl: Duration,
    pub max_persisted_entries: usize,
    pub max_attempts: u32,
    pub retry_base_delay: std::time::Duration,
}

impl From<&IndexConfig> for IndexBuilderSettings {
    fn from(config: &IndexConfig) -> Self {
        Self {
            cache_ttl: Duration::hours(config.cache_ttl_hours),
            max_persisted_entries: config.max_persisted_entries,
            max_attempts: config.export_max_attempts.max(1),
            retry_base_delay: std::time::Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

struct MemoryEntry {
    index: Arc<CatalogIndex>,
    built_at: DateTime<Utc>,
}

/// Построитель индекса: кеш в памяти -> кеш в БД -> стратегия с повторами ->
/// (опционально) обход каталога.
pub struct CatalogIndexBuilder {
    bulk: Arc<dyn CatalogIndexStrategy>,
    crawl: Arc<dyn CatalogIndexStrategy>,
    store: Arc<dyn IndexCacheStore>,
    settings: IndexBuilderSettings,
    memory: RwLock<HashMap<(String, String), MemoryEntry>>,
}

impl CatalogIndexBuilder {
    pub fn new(
        bulk: Arc<dyn CatalogIndexStrategy>,
        crawl: Arc<dyn CatalogIndexStrategy>,
        store: Arc<dyn IndexCacheStore>,
        settings: IndexBuilderSettings,
    ) -> Self {
        Self {
            bulk,
            crawl,
            store,
            settings,
            memory: RwLock::new(HashMap::new()),
        }
    }

    fn strategy(&self, kind: IndexStrategyKind) -> &Arc<dyn CatalogIndexStrategy> {
        match kind {
            IndexStrategyKind::BulkExport => &self.bulk,
            IndexStrategyKind::LiveCrawl => &self.crawl,
        }
    }

    fn is_fresh(&self, built_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        built_at + self.settings.cache_ttl > now
    }

    /// Индекс для магазина. `Auth` пробрасывается как есть, все прочие
    /// неудачи превращаются в `IndexUnavailable`.
    pub async fn build(
        &self,
        credential: &ShopCredential,
        config: &MatchConfig,
    ) -> SyncResult<(Arc<CatalogIndex>, IndexSource)> {
        let fingerprint = config.fingerprint();
        let cache_key = (credential.shop_id.clone(), fingerprint.clone());
        let now = Utc::now();

        {
            let memory = self.memory.read().await;
            if let Some(entry) = memory.get(&cache_key) {
                if self.is_fresh(entry.built_at, now) {
                    tracing::info!(
                        "Catalog index for shop {} served from memory ({} keys)",
                        credential.shop_id,
                        entry.index.len()
                    );
                    return Ok((entry.index.clone(), IndexSource::MemoryCache));
                }
            }
        }

        match self.store.load(&credential.shop_id, &fingerprint).await {
            Ok(Some(cached)) if self.is_fresh(cached.built_at, now) => {
                tracing::info!(
                    "Catalog index for shop {} loaded from durable cache ({} keys, built {})",
                    credential.shop_id,
                    cached.index.len(),
                    cached.built_at
                );
                let index = Arc::new(cached.index);
                self.remember(cache_key, index.clone(), cached.built_at).await;
                return Ok((index, IndexSource::DurableCache));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Durable index cache unavailable: {}", e),
        }

        let (index, source) = self.build_fresh(credential, config).await?;
        let index = Arc::new(index);
        let built_at = Utc::now();

        if index.len() <= self.settings.max_persisted_entries {
            if let Err(e) = self
                .store
                .save(&credential.shop_id, &fingerprint, &index, built_at)
                .await
            {
                tracing::warn!("Failed to persist catalog index: {}", e);
            }
        } else {
            tracing::warn!(
                "Catalog index has {} keys (limit {}), kept in memory only",
                index.len(),
                self.settings.max_persisted_entries
            );
        }

        self.remember(cache_key, index.clone(), built_at).await;
        Ok((index, source))
    }

    /// Запомнить индекс в памяти, заодно выбросив просроченные
    async fn remember(&self, key: (String, String), index: Arc<CatalogIndex>, built_at: DateTime<Utc>) {
        let now = Utc::now();
        let mut memory = self.memory.write().await;
        let before = memory.len();
        memory.retain(|_, entry| self.is_fresh(entry.built_at, now));
        if memory.len() < before {
            tracing::debug!("Evicted {} stale catalog indexes", before - memory.len());
        }
        memory.insert(key, MemoryEntry { index, built_at });
    }

    async fn build_fresh(
        &self,
        credential: &ShopCredential,
        config: &MatchConfig,
    ) -> SyncResult<(CatalogIndex, IndexSource)> {
        let start_time = std::time::Instant::now();
        let primary = config.strategy;

        let primary_error = match self.with_retry(primary, credential, config).await {
            Ok((index, source)) => {
                tracing::info!(
                    "Built catalog index via {} in {}ms: {} keys (case_sensitive: {})",
                    source.as_str(),
                    start_time.elapsed().as_millis(),
                    index.len(),
                    config.case_sensitive
                );
                return Ok((index, source));
            }
            Err(e @ SyncError::Auth(_)) => return Err(e),
            Err(e) => e,
        };

        if primary == IndexStrategyKind::BulkExport && config.fallback_to_crawl {
            tracing::warn!(
                "Bulk export failed ({}), falling back to live crawl",
                primary_error
            );
            return match self
                .with_retry(IndexStrategyKind::LiveCrawl, credential, config)
                .await
            {
                Ok((index, source)) => {
                    tracing::info!(
                        "Built catalog index via {} in {}ms: {} keys",
                        source.as_str(),
                        start_time.elapsed().as_millis(),
                        index.len()
                    );
                    Ok((index, source))
                }
                Err(e @ SyncError::Auth(_)) => Err(e),
                Err(e) => Err(SyncError::IndexUnavailable(format!(
                    "bulk export: {primary_error}; live crawl: {e}"
                ))),
            };
        }

        Err(SyncError::IndexUnavailable(format!(
            "{}: {primary_error}",
            primary.as_str()
        )))
    }

    /// Повторы с растущей задержкой (base * номер попытки) только для
    /// транспортных ошибок и ответов не-2xx
    async fn with_retry(
        &self,
        kind: IndexStrategyKind,
        credential: &ShopCredential,
        config: &MatchConfig,
    ) -> SyncResult<(CatalogIndex, IndexSource)> {
        let strategy = self.strategy(kind);
        let mut attempt = 1;
        loop {
            match strategy.build(credential, config).await {
                Ok(index) => return Ok((index, IndexSource::from_kind(strategy.kind()))),
                Err(e) if is_retryable(&e) && attempt < self.settings.max_attempts => {
                    let delay = self.settings.retry_base_delay * attempt;
                    tracing::warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        kind.as_str(),
                        attempt,
                        self.settings.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable(error: &SyncError) -> bool {
    matches!(error, SyncError::Transport(_) | SyncError::HttpStatus { .. })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use repository::MemoryIndexCacheStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Стратегия-заглушка: сначала `failures` раз ошибка, затем индекс
    pub(crate) struct StubStrategy {
        pub kind: IndexStrategyKind,
        pub failures: u32,
        pub error: fn() -> SyncError,
        pub keys: Vec<(&'static str, &'static str)>,
        pub calls: AtomicU32,
    }

    impl StubStrategy {
        pub(crate) fn ok(kind: IndexStrategyKind, keys: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                kind,
                failures: 0,
                error: || SyncError::Transport("boom".into()),
                keys,
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn failing(kind: IndexStrategyKind, failures: u32, error: fn() -> SyncError) -> Self {
            Self {
                kind,
                failures,
                error,
                keys: vec![("K1", "N1")],
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogIndexStrategy for StubStrategy {
        fn kind(&self) -> IndexStrategyKind {
            self.kind
        }

        async fn build(
            &self,
            _credential: &ShopCredential,
            config: &MatchConfig,
        ) -> SyncResult<CatalogIndex> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)());
            }
            let mut index = CatalogIndex::new(config.case_sensitive);
            for (key, native) in &self.keys {
                index.insert(key, CatalogIndexEntry::new(*native));
            }
            Ok(index)
        }
    }

    fn settings() -> IndexBuilderSettings {
        IndexBuilderSettings {
            cache_ttl: Duration::hours(6),
            max_persisted_entries: 10,
            max_attempts: 3,
            retry_base_delay: std::time::Duration::from_millis(1),
        }
    }

    fn match_config(strategy: IndexStrategyKind, fallback: bool) -> MatchConfig {
        MatchConfig {
            catalog_key: CatalogKey::Sku,
            case_sensitive: true,
            strategy,
            fallback_to_crawl: fallback,
        }
    }

    fn credential() -> ShopCredential {
        ShopCredential::new("shop-1", "key")
    }

    #[test]
    fn test_duplicate_keys_last_write_wins() {
        let mut index = CatalogIndex::new(false);
        assert!(!index.insert("AB-1", CatalogIndexEntry::new("first")));
        assert!(index.insert(" ab-1 ", CatalogIndexEntry::new("second")));
        assert!(!index.insert("   ", CatalogIndexEntry::new("blank")));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("ab-1").map(|e| e.native_id.as_str()), Some("second"));
    }

    #[test]
    fn test_catalog_key_parsing() {
        assert_eq!(CatalogKey::parse("SKU").unwrap(), CatalogKey::Sku);
        assert_eq!(
            CatalogKey::parse("param: EAN ").unwrap(),
            CatalogKey::Param("EAN".into())
        );
        assert_eq!(
            CatalogKey::parse("Vonalkód").unwrap(),
            CatalogKey::Column("Vonalkód".into())
        );
        assert!(CatalogKey::parse("param:").is_err());
        assert!(CatalogKey::parse(" ").is_err());
    }

    #[test]
    fn test_fingerprint_depends_on_key_and_case() {
        let a = match_config(IndexStrategyKind::BulkExport, true);
        let mut b = a.clone();
        b.case_sensitive = false;
        let mut c = a.clone();
        c.catalog_key = CatalogKey::Param("EAN".into());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[tokio::test]
    async fn test_retries_then_succeeds_and_caches() {
        let bulk = Arc::new(StubStrategy::failing(IndexStrategyKind::BulkExport, 2, || {
            SyncError::Transport("timeout".into())
        }));
        let crawl = Arc::new(StubStrategy::ok(IndexStrategyKind::LiveCrawl, vec![]));
        let store = Arc::new(MemoryIndexCacheStore::default());
        let builder = CatalogIndexBuilder::new(bulk.clone(), crawl.clone(), store.clone(), settings());
        let config = match_config(IndexStrategyKind::BulkExport, true);

        let (index, source) = builder.build(&credential(), &config).await.unwrap();
        assert_eq!(source, IndexSource::BulkExport);
        assert_eq!(index.len(), 1);
        assert_eq!(bulk.calls(), 3);
        assert_eq!(crawl.calls(), 0);

        let (_, source) = builder.build(&credential(), &config).await.unwrap();
        assert_eq!(source, IndexSource::MemoryCache);
        assert_eq!(bulk.calls(), 3);
        assert!(store
            .load("shop-1", &config.fingerprint())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_stale_memory_entries_are_evicted() {
        let bulk = Arc::new(StubStrategy::ok(IndexStrategyKind::BulkExport, vec![("A", "A")]));
        let crawl = Arc::new(StubStrategy::ok(IndexStrategyKind::LiveCrawl, vec![]));
        let builder = CatalogIndexBuilder::new(
            bulk,
            crawl,
            Arc::new(MemoryIndexCacheStore::default()),
            IndexBuilderSettings {
                cache_ttl: Duration::zero(),
                ..settings()
            },
        );
        let config = match_config(IndexStrategyKind::BulkExport, false);

        builder.build(&credential(), &config).await.unwrap();
        builder
            .build(&ShopCredential::new("shop-2", "key"), &config)
            .await
            .unwrap();

        let memory = builder.memory.read().await;
        assert_eq!(memory.len(), 1);
        assert!(memory.contains_key(&("shop-2".to_string(), config.fingerprint())));
    }

    #[tokio::test]
    async fn test_exhausted_export_falls_back_to_crawl() {
        let bulk = Arc::new(StubStrategy::failing(IndexStrategyKind::BulkExport, 10, || {
            SyncError::HttpStatus {
                status: 503,
                body: String::new(),
            }
        }));
        let crawl = Arc::new(StubStrategy::ok(
            IndexStrategyKind::LiveCrawl,
            vec![("A", "1"), ("B", "2")],
        ));
        let builder = CatalogIndexBuilder::new(
            bulk.clone(),
            crawl.clone(),
            Arc::new(MemoryIndexCacheStore::default()),
            settings(),
        );

        let (index, source) = builder
            .build(&credential(), &match_config(IndexStrategyKind::BulkExport, true))
            .await
            .unwrap();
        assert_eq!(source, IndexSource::LiveCrawl);
        assert_eq!(index.len(), 2);
        assert_eq!(bulk.calls(), 3);
        assert_eq!(crawl.calls(), 1);
    }

    #[tokio::test]
    async fn test_without_fallback_index_is_unavailable() {
        let bulk = Arc::new(StubStrategy::failing(IndexStrategyKind::BulkExport, 10, || {
            SyncError::Transport("down".into())
        }));
        let crawl = Arc::new(StubStrategy::ok(IndexStrategyKind::LiveCrawl, vec![]));
        let builder = CatalogIndexBuilder::new(
            bulk,
            crawl.clone(),
            Arc::new(MemoryIndexCacheStore::default()),
            settings(),
        );

        let err = builder
            .build(&credential(), &match_config(IndexStrategyKind::BulkExport, false))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::IndexUnavailable(_)));
        assert!(err.is_run_fatal());
        assert_eq!(crawl.calls(), 0);
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried_nor_wrapped() {
        let bulk = Arc::new(StubStrategy::failing(IndexStrategyKind::BulkExport, 10, || {
            SyncError::Auth("bad key".into())
        }));
        let crawl = Arc::new(StubStrategy::ok(IndexStrategyKind::LiveCrawl, vec![]));
        let builder = CatalogIndexBuilder::new(
            bulk.clone(),
            crawl.clone(),
            Arc::new(MemoryIndexCacheStore::default()),
            settings(),
        );

        let err = builder
            .build(&credential(), &match_config(IndexStrategyKind::BulkExport, true))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
        assert_eq!(bulk.calls(), 1);
        assert_eq!(crawl.calls(), 0);
    }

    #[tokio::test]
    async fn test_durable_cache_is_checked_before_building() {
        let store = Arc::new(MemoryIndexCacheStore::default());
        let config = match_config(IndexStrategyKind::BulkExport, true);
        let mut cached = CatalogIndex::new(true);
        cached.insert("C", CatalogIndexEntry::new("cached"));
        store
            .save("shop-1", &config.fingerprint(), &cached, Utc::now())
            .await
            .unwrap();

        let bulk = Arc::new(StubStrategy::ok(IndexStrategyKind::BulkExport, vec![]));
        let builder = CatalogIndexBuilder::new(
            bulk.clone(),
            Arc::new(StubStrategy::ok(IndexStrategyKind::LiveCrawl, vec![])),
            store,
            settings(),
        );

        let (index, source) = builder.build(&credential(), &config).await.unwrap();
        assert_eq!(source, IndexSource::DurableCache);
        assert_eq!(index.get("C").map(|e| e.native_id.as_str()), Some("cached"));
        assert_eq!(bulk.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_durable_cache_is_rebuilt() {
        let store = Arc::new(MemoryIndexCacheStore::default());
        let config = match_config(IndexStrategyKind::BulkExport, true);
        store
            .save(
                "shop-1",
                &config.fingerprint(),
                &CatalogIndex::new(true),
                Utc::now() - Duration::hours(7),
            )
            .await
            .unwrap();

        let bulk = Arc::new(StubStrategy::ok(IndexStrategyKind::BulkExport, vec![("K", "N")]));
        let builder = CatalogIndexBuilder::new(
            bulk.clone(),
            Arc::new(StubStrategy::ok(IndexStrategyKind::LiveCrawl, vec![])),
            store,
            settings(),
        );

        let (_, source) = builder.build(&credential(), &config).await.unwrap();
        assert_eq!(source, IndexSource::BulkExport);
        assert_eq!(bulk.calls(), 1);
    }

    #[tokio::test]
    async fn test_oversized_index_is_not_persisted() {
        let keys: Vec<(&'static str, &'static str)> = vec![
            ("1", "a"), ("2", "b"), ("3", "c"), ("4", "d"), ("5", "e"), ("6", "f"),
            ("7", "g"), ("8", "h"), ("9", "i"), ("10", "j"), ("11", "k"),
        ];
        let store = Arc::new(MemoryIndexCacheStore::default());
        let builder = CatalogIndexBuilder::new(
            Arc::new(StubStrategy::ok(IndexStrategyKind::BulkExport, keys)),
            Arc::new(StubStrategy::ok(IndexStrategyKind::LiveCrawl, vec![])),
            store.clone(),
            settings(),
        );
        let config = match_config(IndexStrategyKind::BulkExport, true);

        let (index, _) = builder.build(&credential(), &config).await.unwrap();
        assert_eq!(index.len(), 11);
        assert!(store
            .load("shop-1", &config.fingerprint())
            .await
            .unwrap()
            .is_none());
    }
}
