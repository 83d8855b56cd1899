use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// Поле каталога, которым управляет процесс синхронизации
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedField {
    PriceNet,
    PriceGross,
    Stock,
    Orderable,
    Name,
    Description,
}

impl ManagedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceNet => "price_net",
            Self::PriceGross => "price_gross",
            Self::Stock => "stock",
            Self::Orderable => "orderable",
            Self::Name => "name",
            Self::Description => "description",
        }
    }

    /// Числовые поля сравниваются по нормализованному десятичному значению
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::PriceNet | Self::PriceGross | Self::Stock | Self::Orderable
        )
    }
}

impl std::fmt::Display for ManagedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Способ построения индекса каталога
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStrategyKind {
    /// Выгрузка getProductDB (csv2)
    #[default]
    BulkExport,
    /// Постраничный обход getProduct
    LiveCrawl,
}

impl IndexStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BulkExport => "bulk_export",
            Self::LiveCrawl => "live_crawl",
        }
    }
}

/// Политика расчета доставки
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShippingPolicy {
    #[default]
    None,
    Fixed {
        amount: Decimal,
    },
    WeightBased {
        #[serde(rename = "ratePerKg")]
        rate_per_kg: Decimal,
        /// Поле фида с весом в кг
        #[serde(rename = "weightField", default)]
        weight_field: Option<String>,
    },
}

// ============================================================================
// Process config
// ============================================================================

/// Пара ключевых полей: поле фида и ключ каталога
///
/// `catalog_key`: `sku`, `param:<имя параметра>` или точный заголовок
/// колонки выгрузки.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFieldPair {
    #[serde(rename = "feedKey")]
    pub feed_key: String,

    #[serde(rename = "catalogKey")]
    pub catalog_key: String,
}

/// Конфигурация процесса синхронизации (неизменна в течение запуска)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(rename = "processId")]
    pub process_id: String,

    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,

    #[serde(rename = "keyFields", default)]
    pub key_fields: Option<KeyFieldPair>,

    #[serde(rename = "caseSensitive", default = "default_true")]
    pub case_sensitive: bool,

    #[serde(rename = "indexStrategy", default)]
    pub index_strategy: IndexStrategyKind,

    /// При неудаче выгрузки перейти на обход каталога
    #[serde(rename = "fallbackToCrawl", default = "default_true")]
    pub fallback_to_crawl: bool,

    #[serde(rename = "priceField")]
    pub price_field: String,

    #[serde(rename = "pricingFormula", default)]
    pub pricing_formula: Option<String>,

    /// Результат формулы уже включает НДС (брутто)
    #[serde(rename = "taxInclusive", default)]
    pub tax_inclusive: bool,

    #[serde(rename = "vatPercent", default = "default_vat")]
    pub vat_percent: Decimal,

    #[serde(rename = "discountPercent", default)]
    pub discount_percent: Decimal,

    #[serde(rename = "marginPercent", default)]
    pub margin_percent: Decimal,

    #[serde(rename = "roundingUnit", default)]
    pub rounding_unit: Option<Decimal>,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(rename = "feedCurrency", default)]
    pub feed_currency: Option<String>,

    #[serde(default)]
    pub shipping: ShippingPolicy,

    #[serde(rename = "stockField", default)]
    pub stock_field: Option<String>,

    #[serde(rename = "stockThreshold", default = "default_stock_threshold")]
    pub stock_threshold: i64,

    #[serde(rename = "nameField", default)]
    pub name_field: Option<String>,

    #[serde(rename = "descriptionField", default)]
    pub description_field: Option<String>,

    #[serde(rename = "managedFields", default = "default_managed_fields")]
    pub managed_fields: Vec<ManagedField>,

    #[serde(rename = "dryRun", default)]
    pub dry_run: bool,
}

fn default_true() -> bool {
    true
}

fn default_vat() -> Decimal {
    Decimal::from(27)
}

fn default_currency() -> String {
    "HUF".to_string()
}

fn default_stock_threshold() -> i64 {
    1
}

pub fn default_managed_fields() -> Vec<ManagedField> {
    vec![
        ManagedField::PriceNet,
        ManagedField::PriceGross,
        ManagedField::Stock,
    ]
}

impl ProcessConfig {
    pub fn new(
        process_id: impl Into<String>,
        key_fields: KeyFieldPair,
        price_field: impl Into<String>,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            display_name: None,
            key_fields: Some(key_fields),
            case_sensitive: true,
            index_strategy: IndexStrategyKind::default(),
            fallback_to_crawl: true,
            price_field: price_field.into(),
            pricing_formula: None,
            tax_inclusive: false,
            vat_percent: default_vat(),
            discount_percent: Decimal::ZERO,
            margin_percent: Decimal::ZERO,
            rounding_unit: None,
            currency: default_currency(),
            feed_currency: None,
            shipping: ShippingPolicy::None,
            stock_field: None,
            stock_threshold: default_stock_threshold(),
            name_field: None,
            description_field: None,
            managed_fields: default_managed_fields(),
            dry_run: false,
        }
    }

    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.process_id)
    }

    pub fn manages(&self, field: ManagedField) -> bool {
        self.managed_fields.contains(&field)
    }

    /// Формула задана и непуста
    pub fn formula(&self) -> Option<&str> {
        self.pricing_formula
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "processId": "p1",
            "keyFields": { "feedKey": "sku", "catalogKey": "sku" },
            "priceField": "price"
        }"#;
        let config: ProcessConfig = serde_json::from_str(json).unwrap();
        assert!(config.case_sensitive);
        assert!(config.fallback_to_crawl);
        assert_eq!(config.vat_percent, Decimal::from(27));
        assert_eq!(config.currency, "HUF");
        assert_eq!(config.shipping, ShippingPolicy::None);
        assert_eq!(config.managed_fields, default_managed_fields());
        assert!(config.formula().is_none());
    }

    #[test]
    fn test_weight_based_shipping_parses() {
        let json = r#"{ "type": "weight_based", "ratePerKg": "50", "weightField": "weight" }"#;
        let policy: ShippingPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(
            policy,
            ShippingPolicy::WeightBased {
                rate_per_kg: Decimal::from(50),
                weight_field: Some("weight".into()),
            }
        );
    }
}
