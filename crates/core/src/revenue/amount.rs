//! Lenient amount parsing for ledger read models.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

/// Parses an amount from an untrusted JSON value.
///
/// Null, missing, boolean, structured and non-numeric values are zero.
/// Strings may use a comma decimal separator (`"80,50"`) and either
/// thousands convention (`"1.234,56"`, `"1,234.56"`).
#[must_use]
pub fn parse_amount(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(&normalize(s)),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => Decimal::ZERO,
    }
}

fn parse_decimal(s: &str) -> Decimal {
    if s.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .unwrap_or(Decimal::ZERO)
}

/// Rewrites a locale-formatted number into `-1234.56` form.
fn normalize(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+' | 'e' | 'E'))
        .collect();

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    match (last_comma, last_dot) {
        // Both present: whichever comes last is the decimal separator.
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(comma), None) => {
            let commas = cleaned.matches(',').count();
            let decimals = cleaned.len() - comma - 1;
            if commas == 1 && decimals != 3 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[rstest]
    #[case(json!(80), dec!(80))]
    #[case(json!(80.5), dec!(80.5))]
    #[case(json!("80.50"), dec!(80.50))]
    #[case(json!("80,50"), dec!(80.50))]
    #[case(json!("1.234,56"), dec!(1234.56))]
    #[case(json!("1,234.56"), dec!(1234.56))]
    #[case(json!("1,234"), dec!(1234))]
    #[case(json!("1.234.567"), dec!(1234567))]
    #[case(json!("1,234,567.89"), dec!(1234567.89))]
    #[case(json!(" 20.00 "), dec!(20.00))]
    #[case(json!("R$ 1.500,00"), dec!(1500.00))]
    #[case(json!("-5,5"), dec!(-5.5))]
    #[case(json!("1e2"), dec!(100))]
    fn test_parses(#[case] value: Value, #[case] expected: Decimal) {
        assert_eq!(parse_amount(&value), expected);
    }

    #[rstest]
    #[case(Value::Null)]
    #[case(json!(""))]
    #[case(json!("abc"))]
    #[case(json!("--"))]
    #[case(json!(true))]
    #[case(json!([1, 2]))]
    #[case(json!({"amount": 5}))]
    fn test_malformed_is_zero(#[case] value: Value) {
        assert_eq!(parse_amount(&value), Decimal::ZERO);
    }
}
