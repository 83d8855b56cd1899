use async_trait::async_trait;
use contracts::domain::a001_shop_credential::ShopCredential;
use contracts::domain::a002_sync_process::IndexStrategyKind;
use contracts::usecases::u501_sync_catalog::CatalogField;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use super::{CatalogIndex, CatalogIndexEntry, CatalogIndexStrategy, CatalogKey, MatchConfig};
use crate::usecases::u501_sync_catalog::errors::{SyncError, SyncResult};
use crate::usecases::u501_sync_catalog::unas_api_client::UnasApiClient;

const PARAM_PREFIX: &str = "Paraméter:";

/// Индекс по выгрузке getProductDB (csv2)
pub struct BulkExportStrategy {
    api_client: Arc<UnasApiClient>,
    sku_column: String,
}

impl BulkExportStrategy {
    pub fn new(api_client: Arc<UnasApiClient>, sku_column: impl Into<String>) -> Self {
        Self {
            api_client,
            sku_column: sku_column.into(),
        }
    }

    /// Скачать выгрузку и вернуть ее текст
    pub async fn fetch_export(&self, credential: &ShopCredential) -> SyncResult<String> {
        let link = self.api_client.request_product_db(credential).await?;
        let bytes = self.api_client.download(&link).await?;
        decode_export(&bytes)
    }
}

#[async_trait]
impl CatalogIndexStrategy for BulkExportStrategy {
    fn kind(&self) -> IndexStrategyKind {
        IndexStrategyKind::BulkExport
    }

    async fn build(
        &self,
        credential: &ShopCredential,
        config: &MatchConfig,
    ) -> SyncResult<CatalogIndex> {
        let text = self.fetch_export(credential).await?;
        parse_export(&text, config, &self.sku_column)
    }
}

/// Байты выгрузки -> текст. Zip распаковывается (первый файл), BOM снимается.
pub fn decode_export(bytes: &[u8]) -> SyncResult<String> {
    let raw = if bytes.starts_with(b"PK") {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| SyncError::Transport(format!("export archive unreadable: {e}")))?;
        if archive.len() == 0 {
            return Err(SyncError::Transport("export archive is empty".into()));
        }
        let mut file = archive
            .by_index(0)
            .map_err(|e| SyncError::Transport(format!("export archive entry unreadable: {e}")))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| SyncError::Transport(format!("export archive entry unreadable: {e}")))?;
        buf
    } else {
        bytes.to_vec()
    };

    let text = String::from_utf8_lossy(&raw);
    Ok(text.trim_start_matches('\u{FEFF}').to_string())
}

/// Разделитель по строке заголовка: самый частый из `;` `,` TAB
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let mut best = (b';', 0usize);
    for candidate in [b';', b',', b'\t'] {
        let count = header_line.bytes().filter(|b| *b == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

/// Видимое имя параметра из заголовка `Paraméter: Név|típus|... - ...`
pub fn param_name(header: &str) -> Option<String> {
    let rest = header.trim().strip_prefix(PARAM_PREFIX)?;
    let name = rest.split('|').next().unwrap_or_default();
    let name = name.split(" - ").next().unwrap_or_default().trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn key_column(headers: &[String], key: &CatalogKey, sku_column: &str) -> SyncResult<usize> {
    let position = match key {
        CatalogKey::Sku => headers.iter().position(|h| h == sku_column),
        CatalogKey::Param(name) => headers
            .iter()
            .position(|h| param_name(h).as_deref() == Some(name.as_str())),
        CatalogKey::Column(header) => headers.iter().position(|h| h == header),
    };
    position.ok_or_else(|| SyncError::Config(format!("export has no column for key {key}")))
}

/// Разобрать выгрузку в индекс. Нативный идентификатор всегда Sku.
pub fn parse_export(text: &str, config: &MatchConfig, sku_column: &str) -> SyncResult<CatalogIndex> {
    let mut reader = export_reader(text);
    let headers = read_headers(&mut reader)?;

    let sku_idx = headers
        .iter()
        .position(|h| h == sku_column)
        .ok_or_else(|| SyncError::Config(format!("export has no '{sku_column}' column")))?;
    let key_idx = key_column(&headers, &config.catalog_key, sku_column)?;

    let mut index = CatalogIndex::new(config.case_sensitive);
    let mut rows = 0usize;
    let mut duplicates = 0usize;
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping malformed export row: {}", e);
                skipped += 1;
                continue;
            }
        };
        rows += 1;

        let native_id = record.get(sku_idx).map(str::trim).unwrap_or_default();
        let key = record.get(key_idx).map(str::trim).unwrap_or_default();
        if native_id.is_empty() || key.is_empty() {
            skipped += 1;
            continue;
        }

        let row: BTreeMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(h, v)| (h.clone(), v.trim().to_string()))
            .collect();

        if index.insert(key, CatalogIndexEntry::new(native_id).with_row(row)) {
            duplicates += 1;
        }
    }

    tracing::info!(
        "Parsed catalog export: {} rows, {} keys, {} duplicate keys, {} skipped",
        rows,
        index.len(),
        duplicates,
        skipped
    );
    Ok(index)
}

/// Поля каталога, доступные как ключ сопоставления
pub fn catalog_fields(headers: &[String]) -> Vec<CatalogField> {
    const STANDARD: [(&str, &str); 5] = [
        ("Cikkszám", "sku"),
        ("Nettó Ár", "price.net"),
        ("Bruttó Ár", "price.gross"),
        ("Raktárkészlet", "stock"),
        ("Megnevezés", "name"),
    ];
    const ALWAYS: [(&str, &str); 3] = [
        ("sku", "Cikkszám"),
        ("price.gross", "Bruttó Ár"),
        ("stock", "Raktárkészlet"),
    ];

    let mut fields: Vec<CatalogField> = Vec::new();
    let mut push = |field: CatalogField| {
        if !fields.iter().any(|f| f.key == field.key) {
            fields.push(field);
        }
    };

    for header in headers.iter().map(|h| h.trim()) {
        if let Some((label, key)) = STANDARD.iter().find(|(label, _)| *label == header) {
            push(CatalogField::new(*key, *label, "product"));
        } else if let Some(name) = param_name(header) {
            push(CatalogField::new(format!("param:{name}"), name, "param"));
        }
    }
    for (key, label) in ALWAYS {
        push(CatalogField::new(key, label, "product"));
    }

    fields
}

/// Заголовок выгрузки
pub fn export_headers(text: &str) -> SyncResult<Vec<String>> {
    read_headers(&mut export_reader(text))
}

fn export_reader(text: &str) -> csv::Reader<&[u8]> {
    let text = text.trim_start_matches('\u{FEFF}');
    let header_line = text.lines().next().unwrap_or_default();
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(sniff_delimiter(header_line))
        .from_reader(text.as_bytes())
}

fn read_headers(reader: &mut csv::Reader<&[u8]>) -> SyncResult<Vec<String>> {
    Ok(reader
        .headers()
        .map_err(|e| SyncError::Transport(format!("failed to read export headers: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::domain::a002_sync_process::IndexStrategyKind;
    use std::io::Write;

    const EXPORT: &str = "\u{FEFF}Cikkszám;Megnevezés;Bruttó Ár;Paraméter: EAN|text|12;Vonalkód\n\
                          X1;Lamp;1300;5999;B-1\n\
                          X2;Chair;2500;;B-2\n\
                          X3;Table;9900;6000;B-1\n\
                          ;Orphan;100;7000;B-9\n";

    fn config(key: CatalogKey, case_sensitive: bool) -> MatchConfig {
        MatchConfig {
            catalog_key: key,
            case_sensitive,
            strategy: IndexStrategyKind::BulkExport,
            fallback_to_crawl: true,
        }
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c"), b';');
        assert_eq!(sniff_delimiter("a,b,c;d"), b',');
        assert_eq!(sniff_delimiter("a\tb\tc"), b'\t');
        assert_eq!(sniff_delimiter("single"), b';');
    }

    #[test]
    fn test_param_name() {
        assert_eq!(param_name("Paraméter: EAN|text|12").as_deref(), Some("EAN"));
        assert_eq!(param_name("Paraméter: Szín - Color|enum").as_deref(), Some("Szín"));
        assert_eq!(param_name("Paraméter: |x"), None);
        assert_eq!(param_name("Cikkszám"), None);
    }

    #[test]
    fn test_index_by_sku_strips_bom() {
        let index = parse_export(EXPORT, &config(CatalogKey::Sku, true), "Cikkszám").unwrap();
        assert_eq!(index.len(), 3);
        let entry = index.get("X1").unwrap();
        assert_eq!(entry.native_id, "X1");
        assert_eq!(entry.row.get("Megnevezés").map(String::as_str), Some("Lamp"));
    }

    #[test]
    fn test_index_by_param_skips_empty_values() {
        let index = parse_export(
            EXPORT,
            &config(CatalogKey::Param("EAN".into()), true),
            "Cikkszám",
        )
        .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("6000").map(|e| e.native_id.as_str()), Some("X3"));
    }

    #[test]
    fn test_index_by_column_last_duplicate_wins() {
        let index = parse_export(
            EXPORT,
            &config(CatalogKey::Column("Vonalkód".into()), false),
            "Cikkszám",
        )
        .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("b-1").map(|e| e.native_id.as_str()), Some("X3"));
    }

    #[test]
    fn test_missing_key_column_is_config_error() {
        let err = parse_export(
            EXPORT,
            &config(CatalogKey::Param("Weight".into()), true),
            "Cikkszám",
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_comma_delimited_export() {
        let text = "Cikkszám,Megnevezés\nA-1,One\nA-2,Two\n";
        let index = parse_export(text, &config(CatalogKey::Sku, true), "Cikkszám").unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_decode_zip_export() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer
                .start_file("export.csv", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all("\u{FEFF}Cikkszám\nX1\n".as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        let text = decode_export(buf.get_ref()).unwrap();
        assert_eq!(text, "Cikkszám\nX1\n");
    }

    #[test]
    fn test_catalog_fields_from_header() {
        let headers = export_headers(EXPORT).unwrap();
        let fields = catalog_fields(&headers);
        let keys: Vec<&str> = fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["sku", "name", "price.gross", "param:EAN", "stock"]
        );
        assert_eq!(fields[3].label, "EAN");
        assert_eq!(fields[3].group, "param");
    }
}
