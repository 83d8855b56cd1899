use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use contracts::domain::a001_shop_credential::{BearerToken, ShopCredential};
use contracts::usecases::u501_sync_catalog::ChangeSet;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::errors::{SyncError, SyncResult};
use super::unas_xml::{
    self, LoginParams, LoginResponse, ProductBySkuParams, ProductDbParams, ProductDbResponse,
    ProductPageParams, ProductUpdateEnvelope, ProductsResponse, UnasProduct,
};
use crate::shared::config::UnasConfig;

const XML_CONTENT_TYPE: &str = "application/xml; charset=UTF-8";
const EXPIRE_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// HTTP-клиент UNAS API (XML поверх HTTP)
///
/// Держит кеш bearer-токенов по магазинам: токен переиспользуется, пока до
/// истечения остается больше `token_margin`.
pub struct UnasApiClient {
    client: reqwest::Client,
    download_client: reqwest::Client,
    base_url: String,
    token_margin: Duration,
    token_fallback: Duration,
    tokens: RwLock<HashMap<String, BearerToken>>,
}

impl UnasApiClient {
    pub fn new(config: &UnasConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.timeout())
                .build()
                .expect("Failed to create HTTP client"),
            download_client: reqwest::Client::builder()
                .timeout(config.download_timeout())
                .build()
                .expect("Failed to create HTTP client"),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_margin: Duration::seconds(config.token_safety_margin_secs),
            token_fallback: Duration::minutes(config.token_fallback_minutes),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    fn url(&self, operation: &str) -> String {
        format!("{}/{}", self.base_url, operation)
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    /// Логин по API-ключу. Любая неудача здесь это `Auth`.
    pub async fn login(&self, credential: &ShopCredential) -> SyncResult<BearerToken> {
        if credential.api_key.trim().is_empty() {
            return Err(SyncError::Auth(format!(
                "API key is empty for shop {}",
                credential.shop_id
            )));
        }

        let body = unas_xml::envelope(&LoginParams {
            api_key: credential.api_key.trim(),
            webshop_info: false,
        })?;
        tracing::info!("UNAS login for shop {} (ApiKey: ****)", credential.shop_id);

        let response = self
            .client
            .post(self.url("login"))
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("login request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SyncError::Auth(format!("login response unreadable: {e}")))?;

        if !status.is_success() {
            let preview: String = text.chars().take(400).collect();
            return Err(SyncError::Auth(format!("login failed with HTTP {status}: {preview}")));
        }

        let login: LoginResponse = unas_xml::parse(&text)
            .map_err(|e| SyncError::Auth(format!("login response invalid: {e}")))?;
        let token = login
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Auth("token missing in login response".into()))?;

        let now = Utc::now();
        let expires_at = login
            .expire
            .as_deref()
            .and_then(parse_expire)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "UNAS login: Expire missing or unparseable, assuming {} minutes",
                    self.token_fallback.num_minutes()
                );
                now + self.token_fallback
            });

        tracing::info!("UNAS token for shop {} valid until {}", credential.shop_id, expires_at);
        Ok(BearerToken { token, expires_at })
    }

    /// Действующий токен магазина: из кеша, из учетных данных или новый логин
    pub async fn bearer(&self, credential: &ShopCredential) -> SyncResult<String> {
        let now = Utc::now();
        {
            let tokens = self.tokens.read().await;
            if let Some(cached) = tokens.get(&credential.shop_id) {
                if cached.is_fresh(now, self.token_margin) {
                    return Ok(cached.token.clone());
                }
            }
        }

        let token = match &credential.token {
            Some(t) if t.is_fresh(now, self.token_margin) => t.clone(),
            _ => self.login(credential).await?,
        };
        let value = token.token.clone();
        self.tokens
            .write()
            .await
            .insert(credential.shop_id.clone(), token);
        Ok(value)
    }

    /// Сбросить токен магазина (после неожиданного 401)
    pub async fn invalidate(&self, shop_id: &str) {
        self.tokens.write().await.remove(shop_id);
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    async fn post_xml(&self, operation: &str, body: &str, bearer: &str) -> SyncResult<String> {
        let preview: String = body.chars().take(500).collect();
        tracing::debug!("UNAS {} request: {}", operation, preview);

        let response = self
            .client
            .post(self.url(operation))
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .body(body.to_string())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!("UNAS {} failed with status {}", operation, status);
            return Err(SyncError::http(status, &text));
        }

        let preview: String = text.chars().take(500).collect();
        tracing::debug!("UNAS {} response preview: {}", operation, preview);
        Ok(text)
    }

    /// POST с токеном; на 401 токен сбрасывается, логин и повтор ровно один раз
    async fn post_authorized(
        &self,
        credential: &ShopCredential,
        operation: &str,
        body: &str,
    ) -> SyncResult<String> {
        let bearer = self.bearer(credential).await?;
        match self.post_xml(operation, body, &bearer).await {
            Err(e) if e.is_unauthorized() => {
                tracing::warn!(
                    "UNAS {} returned 401 for shop {}, re-login and retry once",
                    operation,
                    credential.shop_id
                );
                self.invalidate(&credential.shop_id).await;
                let token = self.login(credential).await?;
                let bearer = token.token.clone();
                self.tokens
                    .write()
                    .await
                    .insert(credential.shop_id.clone(), token);
                self.post_xml(operation, body, &bearer).await
            }
            other => other,
        }
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Запросить выгрузку каталога (csv2) и вернуть ссылку на файл.
    /// Сначала GET, при неудаче или отсутствии ссылки POST.
    pub async fn request_product_db(&self, credential: &ShopCredential) -> SyncResult<String> {
        let bearer = self.bearer(credential).await?;

        let get_result = self
            .client
            .get(self.url("getProductDB"))
            .query(&[("format", "csv2")])
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .send()
            .await;

        match get_result {
            Ok(response) if response.status().is_success() => {
                let text = response.text().await?;
                if let Some(link) = extract_download_link(&text) {
                    tracing::info!("getProductDB (GET) returned download link");
                    return Ok(link);
                }
                tracing::warn!("getProductDB (GET) carried no link, falling back to POST");
            }
            Ok(response) => {
                tracing::warn!(
                    "getProductDB (GET) failed with status {}, falling back to POST",
                    response.status()
                );
            }
            Err(e) => {
                tracing::warn!("getProductDB (GET) transport error: {}, falling back to POST", e);
            }
        }

        let body = unas_xml::envelope(&ProductDbParams { format: "csv2" })?;
        let text = self.post_authorized(credential, "getProductDB", &body).await?;
        extract_download_link(&text).ok_or_else(|| {
            let preview: String = text.chars().take(300).collect();
            SyncError::Transport(format!("getProductDB returned no download link: {preview}"))
        })
    }

    /// Скачать файл выгрузки как есть (csv или zip)
    pub async fn download(&self, link: &str) -> SyncResult<Vec<u8>> {
        tracing::info!("Downloading catalog export: {}", link);
        let response = self.download_client.get(link).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::http(status, &text));
        }
        let bytes = response.bytes().await?;
        tracing::info!("Catalog export downloaded: {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Страница каталога для обхода
    pub async fn get_products_page(
        &self,
        credential: &ShopCredential,
        limit_start: usize,
        limit_num: usize,
    ) -> SyncResult<Vec<UnasProduct>> {
        let body = unas_xml::envelope(&ProductPageParams::new(limit_start, limit_num))?;
        let text = self.post_authorized(credential, "getProduct", &body).await?;
        let response: ProductsResponse = unas_xml::parse(&text)?;
        Ok(response.products)
    }

    /// Один товар по нативному Sku (`None`, если товара нет)
    pub async fn get_product(
        &self,
        credential: &ShopCredential,
        sku: &str,
    ) -> SyncResult<Option<UnasProduct>> {
        let body = unas_xml::envelope(&ProductBySkuParams::new(sku))?;
        let text = self.post_authorized(credential, "getProduct", &body).await?;
        let response: ProductsResponse = unas_xml::parse(&text)?;
        Ok(response.products.into_iter().next())
    }

    /// setProduct c `Action=modify` и только измененными полями
    pub async fn set_product(
        &self,
        credential: &ShopCredential,
        native_id: &str,
        changes: &ChangeSet,
    ) -> SyncResult<()> {
        let body = unas_xml::envelope(&ProductUpdateEnvelope::modify(native_id, changes))?;
        let text = self.post_authorized(credential, "setProduct", &body).await?;

        if let Some(message) = rejected_update(&text) {
            return Err(SyncError::HttpStatus {
                status: StatusCode::OK.as_u16(),
                body: message,
            });
        }
        Ok(())
    }
}

/// Разбор `Expire` в формате `YYYY.MM.DD HH:MM:SS` (локальное время)
pub fn parse_expire(text: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), EXPIRE_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Ссылка на файл: `<Url>`, `<Link>` или голый http(s)-адрес в теле
fn extract_download_link(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Some(trimmed.to_string());
    }
    unas_xml::parse::<ProductDbResponse>(trimmed)
        .ok()
        .and_then(|r| r.download_link())
}

#[derive(Debug, Default, Deserialize)]
struct SetProductResponse {
    #[serde(rename = "Product", default)]
    products: Vec<SetProductResult>,
}

#[derive(Debug, Default, Deserialize)]
struct SetProductResult {
    #[serde(rename = "Status", default)]
    status: Option<String>,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

/// UNAS может ответить 200 со статусом `error` внутри
fn rejected_update(body: &str) -> Option<String> {
    let response: SetProductResponse = unas_xml::parse(body).ok()?;
    response
        .products
        .into_iter()
        .find(|p| p.status.as_deref().map(str::trim) == Some("error"))
        .map(|p| p.error.unwrap_or_else(|| "setProduct rejected the update".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::domain::a002_sync_process::ManagedField;
    use contracts::usecases::u501_sync_catalog::FieldChange;
    use httpmock::prelude::*;

    const LOGIN_OK: &str =
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Login><Token>tok-1</Token><Expire>2099.01.01 00:00:00</Expire></Login>";

    fn client(server: &MockServer) -> UnasApiClient {
        UnasApiClient::new(&UnasConfig {
            base_url: server.base_url(),
            ..UnasConfig::default()
        })
    }

    fn credential() -> ShopCredential {
        ShopCredential::new("shop-1", "key-1")
    }

    #[test]
    fn test_parse_expire() {
        let parsed = parse_expire("2026.10.19 12:30:00").unwrap();
        let local = parsed.with_timezone(&Local);
        assert_eq!(local.format("%Y-%m-%d %H:%M:%S").to_string(), "2026-10-19 12:30:00");
        assert!(parse_expire("19/10/2026").is_none());
    }

    #[test]
    fn test_extract_download_link() {
        assert_eq!(
            extract_download_link("  https://x.test/db.csv\n").as_deref(),
            Some("https://x.test/db.csv")
        );
        assert_eq!(
            extract_download_link("<getProductDB><Url>https://x.test/db.zip</Url></getProductDB>")
                .as_deref(),
            Some("https://x.test/db.zip")
        );
        assert_eq!(extract_download_link("<Error>nope</Error>"), None);
    }

    #[tokio::test]
    async fn test_login_and_token_reuse() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/login")
                    .header("content-type", XML_CONTENT_TYPE)
                    .body_contains("<ApiKey>key-1</ApiKey>");
                then.status(200).body(LOGIN_OK);
            })
            .await;

        let client = client(&server);
        assert_eq!(client.bearer(&credential()).await.unwrap(), "tok-1");
        assert_eq!(client.bearer(&credential()).await.unwrap(), "tok-1");
        login.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_login_without_expire_uses_fallback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(200).body("<Login><Token>tok-2</Token></Login>");
            })
            .await;

        let token = client(&server).login(&credential()).await.unwrap();
        let remaining = token.expires_at - Utc::now();
        assert!(remaining > Duration::minutes(19) && remaining <= Duration::minutes(20));
    }

    #[tokio::test]
    async fn test_login_failure_is_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(403).body("<Error>Invalid ApiKey</Error>");
            })
            .await;

        let err = client(&server).bearer(&credential()).await.unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
        assert!(err.is_run_fatal());
    }

    #[tokio::test]
    async fn test_unauthorized_triggers_single_relogin() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(200).body(LOGIN_OK);
            })
            .await;
        let product = server
            .mock_async(|when, then| {
                when.method(POST).path("/getProduct");
                then.status(401).body("<Error>token expired</Error>");
            })
            .await;

        let err = client(&server)
            .get_product(&credential(), "X1")
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), Some(401));
        login.assert_hits_async(2).await;
        product.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_product_db_falls_back_to_post() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(200).body(LOGIN_OK);
            })
            .await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/getProductDB")
                    .query_param("format", "csv2");
                then.status(500);
            })
            .await;
        let post = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/getProductDB")
                    .header("authorization", "Bearer tok-1")
                    .body_contains("<Format>csv2</Format>");
                then.status(200)
                    .body("<getProductDB><Url>https://x.test/db.csv</Url></getProductDB>");
            })
            .await;

        let link = client(&server).request_product_db(&credential()).await.unwrap();
        assert_eq!(link, "https://x.test/db.csv");
        get.assert_hits_async(1).await;
        post.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_set_product_sends_modify_envelope() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(200).body(LOGIN_OK);
            })
            .await;
        let set = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/setProduct")
                    .body_contains("<?xml version=\"1.0\" encoding=\"UTF-8\"?>")
                    .body_contains("<Action>modify</Action><Sku>N-1</Sku>")
                    .body_contains("<Gross>1300</Gross>");
                then.status(200)
                    .body("<Products><Product><Sku>N-1</Sku><Action>modify</Action><Status>ok</Status></Product></Products>");
            })
            .await;

        let mut changes = ChangeSet::new();
        changes.insert(
            ManagedField::PriceGross,
            FieldChange {
                from: Some("1200".into()),
                to: "1300".into(),
            },
        );
        client(&server)
            .set_product(&credential(), "N-1", &changes)
            .await
            .unwrap();
        set.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_set_product_rejected_in_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(200).body(LOGIN_OK);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/setProduct");
                then.status(200).body(
                    "<Products><Product><Sku>N-1</Sku><Status>error</Status><Error>Invalid price</Error></Product></Products>",
                );
            })
            .await;

        let mut changes = ChangeSet::new();
        changes.insert(
            ManagedField::Stock,
            FieldChange {
                from: None,
                to: "3".into(),
            },
        );
        let err = client(&server)
            .set_product(&credential(), "N-1", &changes)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid price"));
    }
}
