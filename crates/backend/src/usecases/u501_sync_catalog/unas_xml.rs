//! XML-конверты и модели ответов UNAS API.

use contracts::domain::a002_sync_process::ManagedField;
use contracts::usecases::u501_sync_catalog::ChangeSet;
use serde::{Deserialize, Serialize};

use super::diff::CatalogState;
use super::errors::{SyncError, SyncResult};

pub const XML_PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Сериализовать конверт и добавить XML-пролог
pub fn envelope<T: Serialize>(value: &T) -> SyncResult<String> {
    let body = quick_xml::se::to_string(value)
        .map_err(|e| SyncError::Config(format!("cannot build XML envelope: {e}")))?;
    Ok(format!("{XML_PROLOG}\n{body}"))
}

pub fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> SyncResult<T> {
    quick_xml::de::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        SyncError::Transport(format!("malformed XML response: {e}; body: {preview}"))
    })
}

// ============================================================================
// Request envelopes
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename = "Params")]
pub struct LoginParams<'a> {
    #[serde(rename = "ApiKey")]
    pub api_key: &'a str,
    #[serde(rename = "WebshopInfo")]
    pub webshop_info: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename = "Params")]
pub struct ProductDbParams {
    #[serde(rename = "Format")]
    pub format: &'static str,
}

/// Страница getProduct (обход каталога)
#[derive(Debug, Serialize)]
#[serde(rename = "Params")]
pub struct ProductPageParams {
    #[serde(rename = "ContentType")]
    pub content_type: &'static str,
    #[serde(rename = "LimitStart")]
    pub limit_start: usize,
    #[serde(rename = "LimitNum")]
    pub limit_num: usize,
    #[serde(rename = "State")]
    pub state: &'static str,
}

impl ProductPageParams {
    pub fn new(limit_start: usize, limit_num: usize) -> Self {
        Self {
            content_type: "full",
            limit_start,
            limit_num,
            state: "live",
        }
    }
}

/// Один товар по Sku
#[derive(Debug, Serialize)]
#[serde(rename = "Params")]
pub struct ProductBySkuParams<'a> {
    #[serde(rename = "Sku")]
    pub sku: &'a str,
    #[serde(rename = "ContentType")]
    pub content_type: &'static str,
    #[serde(rename = "LimitNum")]
    pub limit_num: usize,
    #[serde(rename = "State")]
    pub state: &'static str,
}

impl<'a> ProductBySkuParams<'a> {
    pub fn new(sku: &'a str) -> Self {
        Self {
            sku,
            content_type: "full",
            limit_num: 1,
            state: "live",
        }
    }
}

/// setProduct: только `modify`, создание товаров не поддерживается
#[derive(Debug, Serialize)]
#[serde(rename = "Products")]
pub struct ProductUpdateEnvelope {
    #[serde(rename = "Product")]
    pub product: ProductUpdate,
}

#[derive(Debug, Serialize)]
pub struct ProductUpdate {
    #[serde(rename = "Action")]
    pub action: &'static str,
    #[serde(rename = "Sku")]
    pub sku: String,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<DescriptionUpdate>,
    #[serde(rename = "Prices", skip_serializing_if = "Option::is_none")]
    pub prices: Option<PricesUpdate>,
    #[serde(rename = "Stocks", skip_serializing_if = "Option::is_none")]
    pub stocks: Option<StocksUpdate>,
}

#[derive(Debug, Serialize)]
pub struct DescriptionUpdate {
    #[serde(rename = "Long")]
    pub long: String,
}

#[derive(Debug, Serialize)]
pub struct PricesUpdate {
    #[serde(rename = "Price")]
    pub price: PriceUpdate,
}

#[derive(Debug, Serialize)]
pub struct PriceUpdate {
    #[serde(rename = "Type")]
    pub price_type: &'static str,
    #[serde(rename = "Net", skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
    #[serde(rename = "Gross", skip_serializing_if = "Option::is_none")]
    pub gross: Option<String>,
    #[serde(rename = "Actual")]
    pub actual: u8,
}

#[derive(Debug, Serialize)]
pub struct StocksUpdate {
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    pub status: Option<StockStatusUpdate>,
    #[serde(rename = "Stock", skip_serializing_if = "Option::is_none")]
    pub stock: Option<StockUpdate>,
}

#[derive(Debug, Serialize)]
pub struct StockStatusUpdate {
    #[serde(rename = "Active")]
    pub active: String,
}

#[derive(Debug, Serialize)]
pub struct StockUpdate {
    #[serde(rename = "Qty")]
    pub qty: String,
}

impl ProductUpdateEnvelope {
    /// Конверт с нативным Sku и только измененными полями
    pub fn modify(native_id: &str, changes: &ChangeSet) -> Self {
        let value = |field: ManagedField| changes.get(&field).map(|c| c.to.clone());

        let net = value(ManagedField::PriceNet);
        let gross = value(ManagedField::PriceGross);
        let prices = (net.is_some() || gross.is_some()).then(|| PricesUpdate {
            price: PriceUpdate {
                price_type: "normal",
                net,
                gross,
                actual: 1,
            },
        });

        let qty = value(ManagedField::Stock);
        let active = value(ManagedField::Orderable);
        let stocks = (qty.is_some() || active.is_some()).then(|| StocksUpdate {
            status: active.map(|active| StockStatusUpdate { active }),
            stock: qty.map(|qty| StockUpdate { qty }),
        });

        Self {
            product: ProductUpdate {
                action: "modify",
                sku: native_id.to_string(),
                name: value(ManagedField::Name),
                description: value(ManagedField::Description).map(|long| DescriptionUpdate { long }),
                prices,
                stocks,
            },
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "Token", default)]
    pub token: Option<String>,
    #[serde(rename = "Expire", default)]
    pub expire: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductDbResponse {
    #[serde(rename = "Url", default)]
    pub url: Option<String>,
    #[serde(rename = "Link", default)]
    pub link: Option<String>,
}

impl ProductDbResponse {
    pub fn download_link(&self) -> Option<String> {
        self.url
            .iter()
            .chain(self.link.iter())
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductsResponse {
    #[serde(rename = "Product", default)]
    pub products: Vec<UnasProduct>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnasProduct {
    #[serde(rename = "Sku", default)]
    pub sku: Option<String>,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<Description>,
    #[serde(rename = "Prices", default)]
    pub prices: Option<Prices>,
    #[serde(rename = "Stocks", default)]
    pub stocks: Option<Stocks>,
    #[serde(rename = "Params", default)]
    pub params: Option<Params>,
    #[serde(rename = "Variants", default)]
    pub variants: Option<Variants>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Description {
    #[serde(rename = "Short", default)]
    pub short: Option<String>,
    #[serde(rename = "Long", default)]
    pub long: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Prices {
    #[serde(rename = "Price", default)]
    pub price: Vec<Price>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Price {
    #[serde(rename = "Type", default)]
    pub price_type: Option<String>,
    #[serde(rename = "Net", default)]
    pub net: Option<String>,
    #[serde(rename = "Gross", default)]
    pub gross: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stocks {
    #[serde(rename = "Status", default)]
    pub status: Option<StockStatus>,
    #[serde(rename = "Stock", default)]
    pub stock: Vec<Stock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockStatus {
    #[serde(rename = "Active", default)]
    pub active: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stock {
    #[serde(rename = "Qty", default)]
    pub qty: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Params {
    #[serde(rename = "Param", default)]
    pub param: Vec<Param>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Param {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Value", default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Variants {
    #[serde(rename = "Variant", default)]
    pub variant: Vec<Variant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Variant {
    #[serde(rename = "Sku", default)]
    pub sku: Option<String>,
    #[serde(rename = "Params", default)]
    pub params: Option<Params>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn find_param<'a>(params: Option<&'a Params>, name: &str) -> Option<&'a String> {
    params?
        .param
        .iter()
        .find(|p| p.name.as_deref().map(str::trim) == Some(name))
        .and_then(|p| p.value.as_ref())
}

impl UnasProduct {
    pub fn sku(&self) -> Option<String> {
        non_empty(self.sku.as_ref())
    }

    /// Основная цена (`Type = normal`, иначе первая)
    pub fn normal_price(&self) -> Option<&Price> {
        let prices = &self.prices.as_ref()?.price;
        prices
            .iter()
            .find(|p| p.price_type.as_deref() == Some("normal"))
            .or_else(|| prices.first())
    }

    /// Значение параметра товара
    pub fn param_value(&self, name: &str) -> Option<String> {
        non_empty(find_param(self.params.as_ref(), name))
    }

    /// Пары (значение параметра, Sku варианта) по вариантам товара
    pub fn variant_param_values(&self, name: &str) -> Vec<(String, Option<String>)> {
        self.variants
            .iter()
            .flat_map(|v| v.variant.iter())
            .filter_map(|variant| {
                non_empty(find_param(variant.params.as_ref(), name))
                    .map(|value| (value, non_empty(variant.sku.as_ref())))
            })
            .collect()
    }

    /// Текущее состояние товара по управляемым полям
    pub fn catalog_state(&self) -> CatalogState {
        let mut state = CatalogState::new();

        if let Some(price) = self.normal_price() {
            if let Some(net) = non_empty(price.net.as_ref()) {
                state.insert(ManagedField::PriceNet, net);
            }
            if let Some(gross) = non_empty(price.gross.as_ref()) {
                state.insert(ManagedField::PriceGross, gross);
            }
        }

        if let Some(stocks) = &self.stocks {
            if let Some(qty) = non_empty(stocks.stock.first().and_then(|s| s.qty.as_ref())) {
                state.insert(ManagedField::Stock, qty);
            }
            if let Some(active) = non_empty(stocks.status.as_ref().and_then(|s| s.active.as_ref())) {
                state.insert(ManagedField::Orderable, active);
            }
        }

        if let Some(name) = non_empty(self.name.as_ref()) {
            state.insert(ManagedField::Name, name);
        }
        if let Some(long) = non_empty(self.description.as_ref().and_then(|d| d.long.as_ref())) {
            state.insert(ManagedField::Description, long);
        }

        state
    }
}
