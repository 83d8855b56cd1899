use anyhow::Result;
use contracts::domain::a001_shop_credential::ShopCredential;
use contracts::domain::a002_sync_process::ProcessConfig;
use contracts::usecases::u501_sync_catalog::{
    CatalogField, FeedRecord, RecordOutcome, RecordStatus, RunStats, SyncProgress, SyncRequest,
    SyncResponse, SyncStartStatus,
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::diff::{self, CatalogState};
use super::errors::{SyncError, SyncResult};
use super::index::bulk_export::{self, BulkExportStrategy};
use super::index::live_crawl::LiveCrawlStrategy;
use super::index::repository::DbIndexCacheStore;
use super::index::{CatalogIndex, CatalogIndexBuilder, IndexBuilderSettings, MatchConfig};
use super::key_matcher::match_record;
use super::progress_tracker::ProgressTracker;
use super::run_repository::{DbRunStore, RunStore};
use super::unas_api_client::UnasApiClient;
use super::{currency, pricing};
use crate::shared::config::Config;

/// Executor для UseCase синхронизации каталога UNAS
#[derive(Clone)]
pub struct SyncExecutor {
    api_client: Arc<UnasApiClient>,
    index_builder: Arc<CatalogIndexBuilder>,
    bulk_export: Arc<BulkExportStrategy>,
    run_store: Arc<dyn RunStore>,
    progress_tracker: Arc<ProgressTracker>,
    max_detail_bytes: usize,
    session_ttl_hours: i64,
}

impl SyncExecutor {
    pub fn new(
        api_client: Arc<UnasApiClient>,
        index_builder: Arc<CatalogIndexBuilder>,
        bulk_export: Arc<BulkExportStrategy>,
        run_store: Arc<dyn RunStore>,
        progress_tracker: Arc<ProgressTracker>,
        max_detail_bytes: usize,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            api_client,
            index_builder,
            bulk_export,
            run_store,
            progress_tracker,
            max_detail_bytes,
            session_ttl_hours,
        }
    }

    /// Собрать executor из конфигурации приложения и подключения к БД
    pub fn from_config(
        config: &Config,
        db: DatabaseConnection,
        progress_tracker: Arc<ProgressTracker>,
    ) -> Self {
        let api_client = Arc::new(UnasApiClient::new(&config.unas));
        let bulk_export = Arc::new(BulkExportStrategy::new(
            api_client.clone(),
            config.index.sku_column.clone(),
        ));
        let live_crawl = Arc::new(LiveCrawlStrategy::new(
            api_client.clone(),
            config.index.crawl_page_size,
        ));
        let index_builder = CatalogIndexBuilder::new(
            bulk_export.clone(),
            live_crawl,
            Arc::new(DbIndexCacheStore::new(db.clone())),
            IndexBuilderSettings::from(&config.index),
        );

        Self::new(
            api_client,
            Arc::new(index_builder),
            bulk_export,
            Arc::new(DbRunStore::new(db)),
            progress_tracker,
            config.run.max_detail_bytes,
            config.run.session_ttl_hours,
        )
    }

    /// Запустить синхронизацию (создает async task и возвращает session_id)
    pub async fn start_sync(&self, request: SyncRequest) -> Result<SyncResponse> {
        if request.credential.shop_id.trim().is_empty() {
            anyhow::bail!("shopId is empty");
        }
        if request.process.process_id.trim().is_empty() {
            anyhow::bail!("processId is empty");
        }

        self.progress_tracker
            .cleanup_old_sessions(self.session_ttl_hours);

        let session_id = Uuid::new_v4().to_string();
        self.progress_tracker.create_session(
            session_id.clone(),
            request.process.process_id.clone(),
            request.records.len(),
        );

        let executor = self.clone();
        let session_id_clone = session_id.clone();

        tokio::spawn(async move {
            match executor.run_sync(&session_id_clone, &request).await {
                Ok(stats) => {
                    executor
                        .progress_tracker
                        .complete_session(&session_id_clone, stats);
                }
                Err(e) => {
                    tracing::error!("Sync run {} failed: {}", session_id_clone, e);
                    executor
                        .progress_tracker
                        .fail_session(&session_id_clone, e.to_string());
                }
            }
        });

        Ok(SyncResponse {
            session_id,
            status: SyncStartStatus::Started,
            message: "Синхронизация запущена".to_string(),
        })
    }

    /// Получить текущий прогресс синхронизации
    pub fn get_progress(&self, session_id: &str) -> Option<SyncProgress> {
        self.progress_tracker.get_progress(session_id)
    }

    /// Последние сохраненные запуски процесса
    pub async fn list_runs(&self, process_id: &str, limit: u64) -> SyncResult<Vec<RunStats>> {
        self.run_store.list_by_process(process_id, limit).await
    }

    /// Поля каталога по заголовку свежей выгрузки
    pub async fn catalog_fields(&self, credential: &ShopCredential) -> SyncResult<Vec<CatalogField>> {
        let text = self.bulk_export.fetch_export(credential).await?;
        let headers = bulk_export::export_headers(&text)?;
        Ok(bulk_export::catalog_fields(&headers))
    }

    /// Выполнить синхронизацию.
    ///
    /// Ошибкой завершается только при неудачном логине или недоступном
    /// индексе; проблемы отдельных записей попадают в `RunStats`.
    pub async fn run_sync(&self, session_id: &str, request: &SyncRequest) -> SyncResult<RunStats> {
        let process = &request.process;
        let credential = &request.credential;
        let mut stats = RunStats::new(&process.process_id, &credential.shop_id, process.dry_run);

        tracing::info!(
            "Starting catalog sync '{}' for shop {}: {} records{}",
            process.display(),
            credential.shop_id,
            request.records.len(),
            if process.dry_run { " (dry run)" } else { "" }
        );

        let match_config = match MatchConfig::from_process(process) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "Process '{}' has no usable key fields, every record fails: {}",
                    process.display(),
                    e
                );
                for index in 0..request.records.len() {
                    stats.record(failed(RecordOutcome::new(index, RecordStatus::Failed), &e));
                }
                return Ok(self.finish(session_id, stats).await);
            }
        };

        self.api_client.bearer(credential).await?;

        let (index, source) = self.index_builder.build(credential, &match_config).await?;
        stats.index_source = Some(source.as_str().to_string());
        tracing::info!(
            "Catalog index ready: {} keys from {}",
            index.len(),
            source.as_str()
        );

        let feed_key = process
            .key_fields
            .as_ref()
            .map(|pair| pair.feed_key.as_str())
            .unwrap_or_default();

        for (position, record) in request.records.iter().enumerate() {
            let outcome = self
                .process_record(position, record, request, &index, feed_key)
                .await?;

            self.progress_tracker
                .update(session_id, position + 1, outcome.key.clone());
            stats.record(outcome);
        }

        Ok(self.finish(session_id, stats).await)
    }

    async fn finish(&self, session_id: &str, mut stats: RunStats) -> RunStats {
        stats.finish();
        if stats.bound_details(self.max_detail_bytes) {
            tracing::warn!(
                "Run {} detail truncated to {} outcomes",
                session_id,
                stats.outcomes.len()
            );
        }

        if let Err(e) = self.run_store.save(&stats).await {
            tracing::error!("Failed to persist sync run {}: {}", session_id, e);
        }

        tracing::info!(
            "Catalog sync finished: total={}, modified={}, failed={}, no_key={}, not_found={}, no_change={}",
            stats.total,
            stats.modified,
            stats.failed,
            stats.skipped_no_key,
            stats.skipped_not_found,
            stats.skipped_no_change
        );
        stats
    }

    /// Одна запись фида. `Err` только для ошибок уровня запуска.
    async fn process_record(
        &self,
        position: usize,
        record: &FeedRecord,
        request: &SyncRequest,
        index: &CatalogIndex,
        feed_key: &str,
    ) -> SyncResult<RecordOutcome> {
        let process = &request.process;
        let matched = match_record(record, index, feed_key);

        if !matched.has_key() {
            tracing::warn!("Record {}: no value in key field '{}'", position, feed_key);
            return Ok(RecordOutcome::new(position, RecordStatus::SkippedNoKey));
        }

        let key = matched.canonical_key.clone();
        let Some(entry) = matched.entry else {
            tracing::warn!("Record {}: key '{}' not found in catalog", position, key);
            return Ok(RecordOutcome::new(position, RecordStatus::SkippedNotFound).with_key(key));
        };

        let native_id = entry.native_id.clone();
        let outcome = RecordOutcome::new(position, RecordStatus::Failed)
            .with_key(key.clone())
            .with_native_id(native_id.clone());

        let desired = match desired_for(process, record, &request.rates) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Record {} ({}): {}", position, key, e);
                return Ok(failed(outcome, &e));
            }
        };

        if process.dry_run {
            let changes = diff::diff(&CatalogState::new(), &desired);
            let status = if changes.is_empty() {
                RecordStatus::SkippedNoChange
            } else {
                RecordStatus::WouldModify
            };
            return Ok(RecordOutcome { status, ..outcome }.with_changes(changes));
        }

        let product = match self.api_client.get_product(&request.credential, &native_id).await {
            Ok(Some(product)) => product,
            Ok(None) => {
                tracing::warn!(
                    "Record {} ({}): product {} vanished from catalog",
                    position,
                    key,
                    native_id
                );
                return Ok(RecordOutcome {
                    status: RecordStatus::SkippedNotFound,
                    ..outcome
                });
            }
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                tracing::error!("Record {} ({}): fetch failed: {}", position, key, e);
                return Ok(failed(outcome, &e));
            }
        };

        let changes = diff::diff(&product.catalog_state(), &desired);
        if changes.is_empty() {
            tracing::debug!("Record {} ({}): catalog already up to date", position, key);
            return Ok(RecordOutcome {
                status: RecordStatus::SkippedNoChange,
                ..outcome
            });
        }

        match self
            .api_client
            .set_product(&request.credential, &native_id, &changes)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    "Record {} ({}): modified {} fields of {}",
                    position,
                    key,
                    changes.len(),
                    native_id
                );
                Ok(RecordOutcome {
                    status: RecordStatus::Modified,
                    ..outcome
                }
                .with_changes(changes))
            }
            Err(e) if e.is_run_fatal() => Err(e),
            Err(e) => {
                tracing::error!("Record {} ({}): write failed: {}", position, key, e);
                Ok(failed(outcome, &e).with_changes(changes))
            }
        }
    }
}

/// Желаемое состояние записи: базовая цена -> валюта -> доставка -> цена
fn desired_for(
    process: &ProcessConfig,
    record: &FeedRecord,
    rates: &HashMap<String, Decimal>,
) -> SyncResult<CatalogState> {
    let raw = record.text(&process.price_field).unwrap_or_default();
    let mut base_price = pricing::parse_decimal(&raw).ok_or_else(|| {
        SyncError::Formula(format!(
            "price field '{}' is missing or not numeric: '{}'",
            process.price_field, raw
        ))
    })?;

    if let Some(feed_currency) = process.feed_currency.as_deref() {
        base_price = currency::convert(base_price, feed_currency, &process.currency, rates)?;
    }

    let shipping = pricing::shipping_cost(&process.shipping, record)?;
    let price = pricing::compute_price(process, base_price, shipping)?;
    Ok(diff::desired_state(process, &price, record))
}

fn failed(outcome: RecordOutcome, error: &SyncError) -> RecordOutcome {
    let status = match error {
        SyncError::Config(_) => RecordStatus::FailedConfig,
        _ => RecordStatus::Failed,
    };
    RecordOutcome { status, ..outcome }
        .with_error(error.to_string())
        .with_http_status(error.http_status())
}
