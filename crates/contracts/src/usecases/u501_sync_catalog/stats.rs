use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::a002_sync_process::ManagedField;

/// Изменение одного поля: было -> стало.
/// `from = None`: прежнее значение неизвестно (dry-run) или отсутствовало.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: Option<String>,
    pub to: String,
}

/// Набор изменений по полям; пустой набор означает пропуск записи
pub type ChangeSet = BTreeMap<ManagedField, FieldChange>;

/// Итоговое состояние обработки одной записи фида
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// В записи нет значения ключевого поля
    SkippedNoKey,
    /// Ключ не найден в индексе каталога
    SkippedNotFound,
    /// Состояние каталога уже совпадает с желаемым
    SkippedNoChange,
    /// Изменение записано в каталог
    Modified,
    /// Dry-run: изменение было бы записано
    WouldModify,
    /// Ошибка конфигурации для этой записи
    FailedConfig,
    /// Ошибка цены, курса или записи в каталог
    Failed,
}

impl RecordStatus {
    fn counts_as_modified_or_failed(&self) -> bool {
        matches!(
            self,
            Self::Modified | Self::WouldModify | Self::FailedConfig | Self::Failed
        )
    }
}

/// Результат по одной записи
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Позиция записи во входном списке
    pub index: usize,
    pub status: RecordStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(rename = "nativeId", default, skip_serializing_if = "Option::is_none")]
    pub native_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeSet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(rename = "httpStatus", default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl RecordOutcome {
    pub fn new(index: usize, status: RecordStatus) -> Self {
        Self {
            index,
            status,
            key: None,
            native_id: None,
            changes: None,
            error: None,
            http_status: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_native_id(mut self, native_id: impl Into<String>) -> Self {
        self.native_id = Some(native_id.into());
        self
    }

    pub fn with_changes(mut self, changes: ChangeSet) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_http_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }
}

/// Статистика запуска синхронизации
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(rename = "processId")]
    pub process_id: String,

    #[serde(rename = "shopId")]
    pub shop_id: String,

    #[serde(rename = "dryRun")]
    pub dry_run: bool,

    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,

    #[serde(rename = "finishedAt", default)]
    pub finished_at: Option<DateTime<Utc>>,

    /// Откуда получен индекс каталога (bulk_export / live_crawl / cache)
    #[serde(rename = "indexSource", default)]
    pub index_source: Option<String>,

    pub total: usize,
    pub modified: usize,
    pub failed: usize,

    #[serde(rename = "skippedNoKey")]
    pub skipped_no_key: usize,

    #[serde(rename = "skippedNotFound")]
    pub skipped_not_found: usize,

    #[serde(rename = "skippedNoChange")]
    pub skipped_no_change: usize,

    pub outcomes: Vec<RecordOutcome>,

    /// Детализация была урезана, чтобы уложиться в лимит документа
    #[serde(default)]
    pub truncated: bool,
}

impl RunStats {
    pub fn new(process_id: impl Into<String>, shop_id: impl Into<String>, dry_run: bool) -> Self {
        Self {
            process_id: process_id.into(),
            shop_id: shop_id.into(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            index_source: None,
            total: 0,
            modified: 0,
            failed: 0,
            skipped_no_key: 0,
            skipped_not_found: 0,
            skipped_no_change: 0,
            outcomes: Vec::new(),
            truncated: false,
        }
    }

    /// Учесть результат записи: ровно один счетчик + строка детализации
    pub fn record(&mut self, outcome: RecordOutcome) {
        self.total += 1;
        match outcome.status {
            RecordStatus::SkippedNoKey => self.skipped_no_key += 1,
            RecordStatus::SkippedNotFound => self.skipped_not_found += 1,
            RecordStatus::SkippedNoChange => self.skipped_no_change += 1,
            RecordStatus::Modified | RecordStatus::WouldModify => self.modified += 1,
            RecordStatus::FailedConfig | RecordStatus::Failed => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Сумма счетчиков всегда равна `total`
    pub fn buckets_sum(&self) -> usize {
        self.modified
            + self.failed
            + self.skipped_no_key
            + self.skipped_not_found
            + self.skipped_no_change
    }

    /// Урезать детализацию до `max_bytes` в JSON.
    ///
    /// Сначала удаляются самые ранние modified/failed записи, затем (если
    /// все еще не помещается) самые ранние пропуски. Счетчики не меняются.
    /// Возвращает `true`, если что-то было удалено.
    pub fn bound_details(&mut self, max_bytes: usize) -> bool {
        let mut size = json_len(self);
        if size <= max_bytes {
            return false;
        }

        let sizes: Vec<usize> = self
            .outcomes
            .iter()
            .map(|o| json_len(o).saturating_add(1))
            .collect();

        let mut order: Vec<usize> = (0..self.outcomes.len())
            .filter(|&i| self.outcomes[i].status.counts_as_modified_or_failed())
            .collect();
        order.extend(
            (0..self.outcomes.len())
                .filter(|&i| !self.outcomes[i].status.counts_as_modified_or_failed()),
        );

        let mut dropped = vec![false; self.outcomes.len()];
        for i in order {
            if size <= max_bytes {
                break;
            }
            dropped[i] = true;
            size = size.saturating_sub(sizes[i]);
        }

        let mut position = 0;
        self.outcomes.retain(|_| {
            let keep = !dropped[position];
            position += 1;
            keep
        });
        self.truncated = true;
        true
    }
}

fn json_len<T: Serialize>(value: &T) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(usize::MAX)
}
