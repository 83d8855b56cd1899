use contracts::usecases::u501_sync_catalog::{RunStats, SyncProgress, SyncStatus};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Трекер прогресса синхронизации (in-memory, для real-time мониторинга)
#[derive(Clone, Default)]
pub struct ProgressTracker {
    sessions: Arc<RwLock<HashMap<String, SyncProgress>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SyncProgress>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SyncProgress>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Создать новую сессию
    pub fn create_session(&self, session_id: String, process_id: String, total: usize) {
        let progress = SyncProgress::new(session_id.clone(), process_id, total as i32);
        self.write().insert(session_id, progress);
    }

    /// Получить текущий прогресс сессии
    pub fn get_progress(&self, session_id: &str) -> Option<SyncProgress> {
        self.read().get(session_id).cloned()
    }

    /// Обновить счетчик обработанных записей
    pub fn update(&self, session_id: &str, processed: usize, current_item: Option<String>) {
        if let Some(progress) = self.write().get_mut(session_id) {
            progress.processed = processed as i32;
            progress.current_item = current_item;
            progress.updated_at = chrono::Utc::now();
        }
    }

    /// Завершить сессию с итогом запуска
    pub fn complete_session(&self, session_id: &str, stats: RunStats) {
        if let Some(progress) = self.write().get_mut(session_id) {
            progress.status = if stats.has_failures() {
                SyncStatus::CompletedWithErrors
            } else {
                SyncStatus::Completed
            };
            progress.processed = stats.total as i32;
            progress.current_item = None;
            progress.stats = Some(stats);
            progress.completed_at = Some(chrono::Utc::now());
            progress.updated_at = chrono::Utc::now();
        }
    }

    /// Провалить сессию (ошибка уровня запуска)
    pub fn fail_session(&self, session_id: &str, error: String) {
        if let Some(progress) = self.write().get_mut(session_id) {
            progress.status = SyncStatus::Failed;
            progress.error = Some(error);
            progress.current_item = None;
            progress.completed_at = Some(chrono::Utc::now());
            progress.updated_at = chrono::Utc::now();
        }
    }

    /// Удалить сессии, завершенные раньше чем `max_age_hours` назад
    pub fn cleanup_old_sessions(&self, max_age_hours: i64) {
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(max_age_hours);
        self.write().retain(|_, progress| match progress.completed_at {
            Some(completed_at) => completed_at > cutoff,
            None => true,
        });
    }
}
