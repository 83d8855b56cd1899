use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Учетные данные магазина UNAS
///
/// `api_key` непрозрачен для движка: он уходит только в login-запрос.
/// Токен кешируется вместе с ключом, чтобы вызывающая сторона могла
/// сохранить его между запусками.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopCredential {
    #[serde(rename = "shopId")]
    pub shop_id: String,

    #[serde(rename = "apiKey")]
    pub api_key: String,

    #[serde(default)]
    pub token: Option<BearerToken>,
}

impl ShopCredential {
    pub fn new(shop_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            shop_id: shop_id.into(),
            api_key: api_key.into(),
            token: None,
        }
    }
}

/// Bearer-токен с моментом истечения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BearerToken {
    pub token: String,

    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

impl BearerToken {
    /// Токен годен, если до истечения остается больше `margin`
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - margin > now
    }
}
