use async_trait::async_trait;
use contracts::domain::a001_shop_credential::ShopCredential;
use contracts::domain::a002_sync_process::IndexStrategyKind;
use std::collections::HashSet;
use std::sync::Arc;

use super::{CatalogIndex, CatalogIndexEntry, CatalogIndexStrategy, CatalogKey, MatchConfig};
use crate::usecases::u501_sync_catalog::errors::{SyncError, SyncResult};
use crate::usecases::u501_sync_catalog::unas_api_client::UnasApiClient;
use crate::usecases::u501_sync_catalog::unas_xml::UnasProduct;

/// Индекс постраничным обходом getProduct.
/// Обход заканчивается на неполной или пустой странице, а также на полной
/// странице без единого нового товара (сервер игнорирует смещение).
pub struct LiveCrawlStrategy {
    api_client: Arc<UnasApiClient>,
    page_size: usize,
}

impl LiveCrawlStrategy {
    pub fn new(api_client: Arc<UnasApiClient>, page_size: usize) -> Self {
        Self {
            api_client,
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl CatalogIndexStrategy for LiveCrawlStrategy {
    fn kind(&self) -> IndexStrategyKind {
        IndexStrategyKind::LiveCrawl
    }

    async fn build(
        &self,
        credential: &ShopCredential,
        config: &MatchConfig,
    ) -> SyncResult<CatalogIndex> {
        if let CatalogKey::Column(header) = &config.catalog_key {
            return Err(SyncError::Config(format!(
                "export column '{header}' cannot be resolved by live crawl"
            )));
        }

        let mut index = CatalogIndex::new(config.case_sensitive);
        let mut offset = 0usize;
        let mut pages = 0usize;
        let mut seen = HashSet::new();

        loop {
            let products = self
                .api_client
                .get_products_page(credential, offset, self.page_size)
                .await?;
            pages += 1;
            let count = products.len();

            let mut new_products = 0usize;
            for product in &products {
                if product.sku().is_some_and(|sku| seen.insert(sku)) {
                    new_products += 1;
                }
                index_product(&mut index, product, &config.catalog_key);
            }

            tracing::debug!(
                "Live crawl page {} (offset {}): {} products, {} keys so far",
                pages,
                offset,
                count,
                index.len()
            );

            if count < self.page_size {
                break;
            }
            if new_products == 0 {
                tracing::warn!(
                    "Live crawl page {} (offset {}) repeats already seen products, stopping",
                    pages,
                    offset
                );
                break;
            }
            offset += count;
        }

        tracing::info!(
            "Live crawl finished: {} pages, {} keys",
            pages,
            index.len()
        );
        Ok(index)
    }
}

/// Внести товар в индекс: ключ из Sku или параметра; параметры вариантов
/// добавляют отдельные записи.
pub fn index_product(index: &mut CatalogIndex, product: &UnasProduct, key: &CatalogKey) {
    let Some(sku) = product.sku() else {
        return;
    };

    match key {
        CatalogKey::Sku => {
            index.insert(&sku, CatalogIndexEntry::new(sku.clone()));
        }
        CatalogKey::Param(name) => {
            if let Some(value) = product.param_value(name) {
                index.insert(&value, CatalogIndexEntry::new(sku.clone()));
            }
            for (value, variant_sku) in product.variant_param_values(name) {
                let native_id = variant_sku.unwrap_or_else(|| sku.clone());
                index.insert(&value, CatalogIndexEntry::new(native_id));
            }
        }
        CatalogKey::Column(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::config::UnasConfig;
    use httpmock::prelude::*;

    fn config(key: CatalogKey) -> MatchConfig {
        MatchConfig {
            catalog_key: key,
            case_sensitive: true,
            strategy: IndexStrategyKind::LiveCrawl,
            fallback_to_crawl: false,
        }
    }

    fn product_xml(sku: &str, ean: &str) -> String {
        format!(
            "<Product><Sku>{sku}</Sku><Params><Param><Name>EAN</Name><Value>{ean}</Value></Param></Params></Product>"
        )
    }

    async fn login(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(200)
                    .body("<Login><Token>t</Token><Expire>2099.01.01 00:00:00</Expire></Login>");
            })
            .await;
    }

    #[tokio::test]
    async fn test_paginates_until_short_page() {
        let server = MockServer::start_async().await;
        login(&server).await;

        let page1 = format!("<Products>{}{}</Products>", product_xml("A", "1"), product_xml("B", "2"));
        let page2 = format!("<Products>{}</Products>", product_xml("C", "3"));
        let first = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/getProduct")
                    .body_contains("<LimitStart>0</LimitStart>");
                then.status(200).body(page1);
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/getProduct")
                    .body_contains("<LimitStart>2</LimitStart>");
                then.status(200).body(page2);
            })
            .await;

        let client = Arc::new(UnasApiClient::new(&UnasConfig {
            base_url: server.base_url(),
            ..UnasConfig::default()
        }));
        let strategy = LiveCrawlStrategy::new(client, 2);
        let index = strategy
            .build(
                &ShopCredential::new("s", "k"),
                &config(CatalogKey::Param("EAN".into())),
            )
            .await
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.get("3").map(|e| e.native_id.as_str()), Some("C"));
        first.assert_hits_async(1).await;
        second.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_repeated_page_stops_crawl() {
        let server = MockServer::start_async().await;
        login(&server).await;

        let page = format!("<Products>{}{}</Products>", product_xml("A", "1"), product_xml("B", "2"));
        let pages = server
            .mock_async(|when, then| {
                when.method(POST).path("/getProduct");
                then.status(200).body(page);
            })
            .await;

        let client = Arc::new(UnasApiClient::new(&UnasConfig {
            base_url: server.base_url(),
            ..UnasConfig::default()
        }));
        let index = LiveCrawlStrategy::new(client, 2)
            .build(&ShopCredential::new("s", "k"), &config(CatalogKey::Sku))
            .await
            .unwrap();

        assert_eq!(index.len(), 2);
        pages.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_empty_page_stops_crawl() {
        let server = MockServer::start_async().await;
        login(&server).await;
        let page1 = format!("<Products>{}</Products>", product_xml("A", "1"));
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/getProduct")
                    .body_contains("<LimitStart>0</LimitStart>");
                then.status(200).body(page1);
            })
            .await;
        let empty = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/getProduct")
                    .body_contains("<LimitStart>1</LimitStart>");
                then.status(200).body("<Products></Products>");
            })
            .await;

        let client = Arc::new(UnasApiClient::new(&UnasConfig {
            base_url: server.base_url(),
            ..UnasConfig::default()
        }));
        let index = LiveCrawlStrategy::new(client, 1)
            .build(&ShopCredential::new("s", "k"), &config(CatalogKey::Sku))
            .await
            .unwrap();
        assert_eq!(index.len(), 1);
        empty.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_column_key_is_rejected() {
        let client = Arc::new(UnasApiClient::new(&UnasConfig::default()));
        let err = LiveCrawlStrategy::new(client, 100)
            .build(
                &ShopCredential::new("s", "k"),
                &config(CatalogKey::Column("Vonalkód".into())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_variant_params_are_indexed() {
        let product: UnasProduct = crate::usecases::u501_sync_catalog::unas_xml::parse(
            "<Product><Sku>P</Sku><Variants>\
             <Variant><Sku>P-1</Sku><Params><Param><Name>EAN</Name><Value>111</Value></Param></Params></Variant>\
             <Variant><Params><Param><Name>EAN</Name><Value>222</Value></Param></Params></Variant>\
             </Variants></Product>",
        )
        .unwrap();
        let mut index = CatalogIndex::new(true);
        index_product(&mut index, &product, &CatalogKey::Param("EAN".into()));
        assert_eq!(index.get("111").map(|e| e.native_id.as_str()), Some("P-1"));
        assert_eq!(index.get("222").map(|e| e.native_id.as_str()), Some("P"));
    }
}
