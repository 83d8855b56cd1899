use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub unas: UnasConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Параметры доступа к UNAS API
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UnasConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Таймаут скачивания файла выгрузки
    pub download_timeout_secs: u64,
    /// Токен обновляется заранее, за столько секунд до истечения
    pub token_safety_margin_secs: i64,
    /// Срок жизни токена, если Expire не удалось разобрать
    pub token_fallback_minutes: i64,
}

impl Default for UnasConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.unas.eu/shop".to_string(),
            timeout_secs: 120,
            download_timeout_secs: 300,
            token_safety_margin_secs: 60,
            token_fallback_minutes: 20,
        }
    }
}

impl UnasConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Параметры построения и кеширования индекса каталога
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub cache_ttl_hours: i64,
    /// Индексы больше этого размера не сохраняются в БД
    pub max_persisted_entries: usize,
    pub export_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub crawl_page_size: usize,
    /// Колонка выгрузки с артикулом (Sku)
    pub sku_column: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cache_ttl_hours: 6,
            max_persisted_entries: 50_000,
            export_max_attempts: 3,
            retry_base_delay_ms: 2_000,
            crawl_page_size: 100,
            sku_column: "Cikkszám".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunConfig {
    /// Лимит размера детализации RunStats в JSON
    pub max_detail_bytes: usize,
    /// Сколько дней хранить историю запусков
    pub history_days: i64,
    /// Сколько часов держать в памяти прогресс завершенных сессий
    pub session_ttl_hours: i64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_detail_bytes: 900_000,
            history_days: 90,
            session_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[database]
path = "target/db/app.db"

[unas]
base_url = "https://api.unas.eu/shop"
timeout_secs = 120
download_timeout_secs = 300
token_safety_margin_secs = 60
token_fallback_minutes = 20

[index]
cache_ttl_hours = 6
max_persisted_entries = 50000
export_max_attempts = 3
retry_base_delay_ms = 2000
crawl_page_size = 100
sku_column = "Cikkszám"

[run]
max_detail_bytes = 900000
history_days = 90
session_ttl_hours = 24

[server]
port = 3000
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}

/// Get the database file path from configuration
/// Resolves relative paths relative to the executable directory
pub fn get_database_path(config: &Config) -> anyhow::Result<PathBuf> {
    let db_path_str = &config.database.path;
    let db_path = Path::new(db_path_str);

    if db_path.is_absolute() {
        return Ok(db_path.to_path_buf());
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return Ok(exe_dir.join(db_path));
        }
    }

    Ok(PathBuf::from(db_path_str))
}
