use contracts::usecases::u501_sync_catalog::FeedRecord;

use super::index::{CatalogIndex, CatalogIndexEntry};

/// Каноническая форма ключа: trim + (опционально) нижний регистр
pub fn canonicalize(raw: &str, case_sensitive: bool) -> String {
    let trimmed = raw.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// Результат сопоставления записи фида с индексом каталога
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a> {
    /// Исходное значение ключевого поля фида
    pub feed_value: Option<String>,
    pub canonical_key: String,
    /// `None`: записи нет в каталоге (окончательный пропуск)
    pub entry: Option<&'a CatalogIndexEntry>,
}

impl MatchResult<'_> {
    pub fn has_key(&self) -> bool {
        !self.canonical_key.is_empty()
    }
}

/// Точное сопоставление по ключевому полю; политика регистра берется из индекса.
/// Нечетких и частичных совпадений нет.
pub fn match_record<'a>(
    record: &FeedRecord,
    index: &'a CatalogIndex,
    feed_key_field: &str,
) -> MatchResult<'a> {
    let feed_value = record.text(feed_key_field);
    let canonical_key = feed_value
        .as_deref()
        .map(|v| canonicalize(v, index.case_sensitive()))
        .unwrap_or_default();

    let entry = if canonical_key.is_empty() {
        None
    } else {
        index.get(&canonical_key)
    };

    MatchResult {
        feed_value,
        canonical_key,
        entry,
    }
}
