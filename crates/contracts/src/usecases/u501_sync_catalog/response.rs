use serde::{Deserialize, Serialize};

/// Ответ на запрос запуска синхронизации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub session_id: String,
    pub status: SyncStartStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStartStatus {
    Started,
    Failed,
}

/// Поле каталога, доступное как ключ сопоставления
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogField {
    pub key: String,
    pub label: String,
    pub group: String,
}

impl CatalogField {
    pub fn new(key: impl Into<String>, label: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            group: group.into(),
        }
    }
}
