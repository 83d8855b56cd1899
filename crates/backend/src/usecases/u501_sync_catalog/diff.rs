use contracts::domain::a002_sync_process::{ManagedField, ProcessConfig};
use contracts::usecases::u501_sync_catalog::{ChangeSet, FeedRecord, FieldChange};
use rust_decimal::RoundingStrategy;
use std::collections::BTreeMap;

use super::pricing::{self, ComputedPrice};

/// Состояние товара в каталоге по управляемым полям (строковое представление)
pub type CatalogState = BTreeMap<ManagedField, String>;

/// Желаемое состояние: только поля, которыми управляет процесс и для которых
/// у записи есть значение.
pub fn desired_state(
    config: &ProcessConfig,
    price: &ComputedPrice,
    record: &FeedRecord,
) -> CatalogState {
    let mut state = CatalogState::new();

    if config.manages(ManagedField::PriceNet) {
        state.insert(ManagedField::PriceNet, price.net.normalize().to_string());
    }
    if config.manages(ManagedField::PriceGross) {
        state.insert(ManagedField::PriceGross, price.gross.normalize().to_string());
    }

    let stock = config
        .stock_field
        .as_deref()
        .and_then(|field| record.text(field))
        .map(|raw| pricing::normalize_stock(&raw));
    if let Some(stock) = stock {
        if config.manages(ManagedField::Stock) {
            state.insert(ManagedField::Stock, stock.to_string());
        }
        if config.manages(ManagedField::Orderable) {
            let flag = pricing::orderable(stock, config.stock_threshold);
            state.insert(ManagedField::Orderable, if flag { "1" } else { "0" }.to_string());
        }
    }

    let text_fields = [
        (ManagedField::Name, config.name_field.as_deref()),
        (ManagedField::Description, config.description_field.as_deref()),
    ];
    for (field, source) in text_fields {
        if !config.manages(field) {
            continue;
        }
        let value = source
            .and_then(|f| record.text(f))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if let Some(value) = value {
            state.insert(field, value);
        }
    }

    state
}

/// Стабильная проекция значения для сравнения:
/// числа через нормализованный Decimal (`1300.00` == `1300`), строки через trim.
pub fn project(field: ManagedField, value: &str) -> String {
    if field.is_numeric() {
        if let Some(d) = pricing::parse_decimal(value) {
            return d.normalize().to_string();
        }
    }
    value.trim().to_string()
}

/// Каталог хранит цену нетто с точностью до сотых
const CATALOG_NET_DP: u32 = 2;

/// Проекция для сравнения с каталогом: нетто сравнивается с точностью каталога
fn comparable(field: ManagedField, value: &str) -> String {
    if field == ManagedField::PriceNet {
        if let Some(d) = pricing::parse_decimal(value) {
            return d
                .round_dp_with_strategy(CATALOG_NET_DP, RoundingStrategy::MidpointAwayFromZero)
                .normalize()
                .to_string();
        }
    }
    project(field, value)
}

/// Набор отличий `after` от `before`.
///
/// Рассматриваются только поля из `after`; поле, отсутствующее в `before`,
/// считается изменением с `from = None`. В изменение попадает полное
/// желаемое значение.
pub fn diff(before: &CatalogState, after: &CatalogState) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for (field, desired) in after {
        let current = before.get(field);
        if current.map(|v| comparable(*field, v)) == Some(comparable(*field, desired)) {
            continue;
        }
        changes.insert(
            *field,
            FieldChange {
                from: current.map(|v| project(*field, v)),
                to: project(*field, desired),
            },
        );
    }

    changes
}
