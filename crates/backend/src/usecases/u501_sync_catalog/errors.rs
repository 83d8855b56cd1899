use thiserror::Error;

/// Ошибки движка синхронизации
///
/// Ошибки уровня записи попадают в RunStats, запуск продолжается.
/// Только `Auth` и `IndexUnavailable` прерывают весь запуск.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Formula error: {0}")]
    Formula(String),

    #[error("Currency rates unavailable: {0}")]
    RatesUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Catalog index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SyncError {
    /// Ошибка, после которой ни одна запись не может быть обработана
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::IndexUnavailable(_))
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.http_status() == Some(401)
    }

    pub fn http(status: reqwest::StatusCode, body: &str) -> Self {
        let preview: String = body.chars().take(400).collect();
        Self::HttpStatus {
            status: status.as_u16(),
            body: preview,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<sea_orm::DbErr> for SyncError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
