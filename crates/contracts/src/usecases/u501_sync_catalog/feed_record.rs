use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Строка фида после парсера: плоская карта "поле -> значение" без схемы.
/// Доступ только по имени поля из конфигурации, никогда по позиции.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedRecord(BTreeMap<String, Value>);

impl FeedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Значение поля как текст (без обрезки пробелов).
    /// `null`, массивы и объекты считаются отсутствующим значением.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_projection() {
        let record: FeedRecord = serde_json::from_value(json!({
            "sku": " X1 ",
            "price": 1000,
            "active": true,
            "tags": ["a"],
            "empty": null
        }))
        .unwrap();

        assert_eq!(record.text("sku").as_deref(), Some(" X1 "));
        assert_eq!(record.text("price").as_deref(), Some("1000"));
        assert_eq!(record.text("active").as_deref(), Some("1"));
        assert_eq!(record.text("tags"), None);
        assert_eq!(record.text("empty"), None);
        assert_eq!(record.text("missing"), None);
    }
}
