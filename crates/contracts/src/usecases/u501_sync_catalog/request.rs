use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::feed_record::FeedRecord;
use crate::domain::a001_shop_credential::ShopCredential;
use crate::domain::a002_sync_process::ProcessConfig;

/// Запрос на запуск синхронизации каталога
///
/// Фид уже скачан и разобран вызывающей стороной.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub process: ProcessConfig,

    pub credential: ShopCredential,

    pub records: Vec<FeedRecord>,

    /// Курсы валют: код -> стоимость единицы в базовой валюте
    #[serde(default)]
    pub rates: HashMap<String, Decimal>,
}

/// Запрос списка полей каталога (по заголовку выгрузки)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFieldsRequest {
    pub credential: ShopCredential,
}
