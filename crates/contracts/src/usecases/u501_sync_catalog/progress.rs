use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stats::RunStats;

/// Текущий прогресс синхронизации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProgress {
    pub session_id: String,
    pub process_id: String,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,

    pub processed: i32,
    pub total: i32,

    /// Текущая обрабатываемая запись
    pub current_item: Option<String>,

    /// Итог запуска (после завершения)
    pub stats: Option<RunStats>,

    /// Ошибка уровня запуска (логин, индекс)
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Синхронизация запущена
    Running,
    /// Завершена без ошибок по записям
    Completed,
    /// Завершена, часть записей с ошибками
    CompletedWithErrors,
    /// Запуск провален целиком
    Failed,
}

impl SyncProgress {
    pub fn new(session_id: String, process_id: String, total: i32) -> Self {
        Self {
            session_id,
            process_id,
            status: SyncStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            updated_at: Utc::now(),
            processed: 0,
            total,
            current_item: None,
            stats: None,
            error: None,
        }
    }
}
