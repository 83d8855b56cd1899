//! Расчет нетто/брутто цены, доставки и остатков.
//!
//! Авторитетна ровно одна сторона цены: брутто. Нетто всегда выводится
//! из округленного брутто через коэффициент НДС, до 4 знаков.

use contracts::domain::a002_sync_process::{ProcessConfig, ShippingPolicy};
use contracts::usecases::u501_sync_catalog::FeedRecord;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::str::FromStr;

use super::errors::{SyncError, SyncResult};
use super::formula;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedPrice {
    pub net: Decimal,
    pub gross: Decimal,
    pub currency: String,
}

/// 1 + VAT%
pub fn vat_factor(vat_percent: Decimal) -> Decimal {
    Decimal::ONE + vat_percent / HUNDRED
}

/// Значения плейсхолдеров формулы для одной записи
pub fn formula_bindings(
    config: &ProcessConfig,
    base_price: Decimal,
    shipping: Decimal,
) -> HashMap<String, Decimal> {
    let discount = Decimal::ONE - config.discount_percent / HUNDRED;
    let margin = Decimal::ONE + config.margin_percent / HUNDRED;

    HashMap::from([
        ("basePrice".to_string(), base_price),
        ("discount".to_string(), discount),
        ("discountPercent".to_string(), config.discount_percent),
        ("discountMultiplier".to_string(), discount),
        ("priceMargin".to_string(), margin),
        ("priceMarginPercent".to_string(), config.margin_percent),
        ("priceMarginFactor".to_string(), margin),
        ("vat".to_string(), vat_factor(config.vat_percent)),
        ("vatPercent".to_string(), config.vat_percent),
        ("shipping".to_string(), shipping),
    ])
}

/// Цена для записи.
///
/// С формулой: ее результат это брутто (`tax_inclusive`) или нетто, из
/// которого брутто получается умножением на коэффициент НДС. Без формулы:
/// `net = base * (1 - d%) * (1 + m%)`, `gross = net * (1 + VAT%)`, доставка
/// не добавляется. Затем брутто округляется, нетто пересчитывается.
pub fn compute_price(
    config: &ProcessConfig,
    base_price: Decimal,
    shipping: Decimal,
) -> SyncResult<ComputedPrice> {
    let vat = vat_factor(config.vat_percent);
    if vat <= Decimal::ZERO {
        return Err(SyncError::Config(format!(
            "VAT percent {} gives a non-positive VAT factor",
            config.vat_percent
        )));
    }

    let bindings = formula_bindings(config, base_price, shipping);

    let raw_gross = match config.formula() {
        Some(expr) => {
            let value = formula::evaluate(expr, &bindings)?;
            if config.tax_inclusive {
                value
            } else {
                checked(value.checked_mul(vat), "net * vat")?
            }
        }
        None => {
            let net = checked(
                base_price
                    .checked_mul(bindings["discount"])
                    .and_then(|v| v.checked_mul(bindings["priceMargin"])),
                "base * discount * margin",
            )?;
            checked(net.checked_mul(vat), "net * vat")?
        }
    };

    let gross = round_gross(raw_gross, config.rounding_unit)?;
    let net = net_from_gross(gross, vat)?;

    Ok(ComputedPrice {
        net,
        gross,
        currency: config.currency.clone(),
    })
}

/// Округление брутто: вверх до кратного `unit` при `unit > 1`, иначе до целого
pub fn round_gross(gross: Decimal, unit: Option<Decimal>) -> SyncResult<Decimal> {
    match unit {
        Some(unit) if unit > Decimal::ONE => {
            let steps = checked(gross.checked_div(unit), "gross / unit")?.ceil();
            checked(steps.checked_mul(unit), "steps * unit")
        }
        _ => Ok(gross.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)),
    }
}

pub fn net_from_gross(gross: Decimal, vat: Decimal) -> SyncResult<Decimal> {
    let net = checked(gross.checked_div(vat), "gross / vat")?;
    Ok(net.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero))
}

fn checked(value: Option<Decimal>, what: &str) -> SyncResult<Decimal> {
    value.ok_or_else(|| SyncError::Formula(format!("arithmetic overflow in {what}")))
}

/// Стоимость доставки для записи.
///
/// Для доставки по весу поле веса обязательно и в конфигурации, и в записи;
/// его отсутствие это ошибка конфигурации записи.
pub fn shipping_cost(policy: &ShippingPolicy, record: &FeedRecord) -> SyncResult<Decimal> {
    match policy {
        ShippingPolicy::None => Ok(Decimal::ZERO),
        ShippingPolicy::Fixed { amount } => Ok(*amount),
        ShippingPolicy::WeightBased {
            rate_per_kg,
            weight_field,
        } => {
            let field = weight_field
                .as_deref()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .ok_or_else(|| {
                    SyncError::Config("weight-based shipping without a weight field".into())
                })?;

            let weight = record
                .text(field)
                .as_deref()
                .and_then(parse_decimal)
                .ok_or_else(|| {
                    SyncError::Config(format!("weight field '{field}' is missing or not numeric"))
                })?;

            checked(rate_per_kg.checked_mul(weight), "rate * weight")
        }
    }
}

/// Разбор числа из фида: пробелы выкидываются, `,` считается десятичным
/// разделителем, если точки нет; при обоих разделителях последний из них
/// десятичный.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let compact: String = text
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if compact.is_empty() {
        return None;
    }

    let normalized = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (Some(_), None) => compact.replace(',', "."),
        _ => compact,
    };

    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

/// Остаток из фида: `,` -> `.`, все кроме цифр/точки/минуса выкидывается,
/// дробная часть отбрасывается, отрицательное значение становится нулем.
pub fn normalize_stock(text: &str) -> i64 {
    let cleaned: String = text
        .replacen(',', ".", 1)
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    Decimal::from_str(cleaned.trim())
        .ok()
        .and_then(|d| d.trunc().to_i64())
        .unwrap_or(0)
        .max(0)
}

/// Флаг "можно заказать": остаток не ниже порога
pub fn orderable(stock: i64, threshold: i64) -> bool {
    stock >= threshold
}
