use rust_decimal::Decimal;
use std::collections::HashMap;

use super::errors::{SyncError, SyncResult};

/// Пересчет суммы между валютами по таблице курсов.
///
/// Курс в таблице: сколько единиц базовой валюты стоит 1 единица кода,
/// поэтому `amount * rate[from] / rate[to]`. Одинаковые коды (без учета
/// регистра) ничего не меняют. Пустая таблица, отсутствующий код или
/// нулевой курс дают `RatesUnavailable`: молча подставить ноль нельзя.
pub fn convert(
    amount: Decimal,
    from: &str,
    to: &str,
    rates: &HashMap<String, Decimal>,
) -> SyncResult<Decimal> {
    let from = from.trim().to_uppercase();
    let to = to.trim().to_uppercase();
    if from == to {
        return Ok(amount);
    }
    if rates.is_empty() {
        return Err(SyncError::RatesUnavailable("rate table is empty".into()));
    }

    let from_rate = lookup(rates, &from)?;
    let to_rate = lookup(rates, &to)?;

    amount
        .checked_mul(from_rate)
        .and_then(|v| v.checked_div(to_rate))
        .ok_or_else(|| {
            SyncError::RatesUnavailable(format!("conversion {from}->{to} overflowed for {amount}"))
        })
}

fn lookup(rates: &HashMap<String, Decimal>, code: &str) -> SyncResult<Decimal> {
    let rate = rates
        .iter()
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(code))
        .map(|(_, v)| *v)
        .ok_or_else(|| SyncError::RatesUnavailable(format!("no rate for currency '{code}'")))?;

    if rate <= Decimal::ZERO {
        return Err(SyncError::RatesUnavailable(format!(
            "rate for currency '{code}' is not positive: {rate}"
        )));
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rates() -> HashMap<String, Decimal> {
        HashMap::from([
            ("HUF".to_string(), dec!(1)),
            ("EUR".to_string(), dec!(400)),
            ("USD".to_string(), dec!(360)),
        ])
    }

    #[test]
    fn test_same_currency_is_noop_even_without_rates() {
        let empty = HashMap::new();
        assert_eq!(convert(dec!(12.5), "huf", " HUF ", &empty).unwrap(), dec!(12.5));
    }

    #[test]
    fn test_converts_through_base() {
        assert_eq!(convert(dec!(10), "EUR", "HUF", &rates()).unwrap(), dec!(4000));
        assert_eq!(convert(dec!(4000), "HUF", "EUR", &rates()).unwrap(), dec!(10));
        assert_eq!(convert(dec!(9), "USD", "eur", &rates()).unwrap(), dec!(8.1));
    }

    #[test]
    fn test_missing_rates_propagate() {
        let err = convert(dec!(1), "EUR", "HUF", &HashMap::new()).unwrap_err();
        assert!(matches!(err, SyncError::RatesUnavailable(_)));

        let err = convert(dec!(1), "GBP", "HUF", &rates()).unwrap_err();
        assert!(matches!(err, SyncError::RatesUnavailable(_)));

        let mut zero = rates();
        zero.insert("EUR".into(), Decimal::ZERO);
        assert!(convert(dec!(1), "HUF", "EUR", &zero).is_err());
    }
}
