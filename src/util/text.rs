use std::{collections::HashSet, str::FromStr};

use anyhow::*;
use rust_decimal::Decimal;
use serde_json::Value;

const NUMBER_ESCAPE_CHAR: &[char] = &['元', '%', ',', ' ', '"', '\n'];

/// Parses a decimal value from a given string.
///
/// The input may carry thousands separators, a percent sign or a currency unit;
/// those and any `escape_chars` are removed before parsing.
///
/// # Arguments
///
/// * `s`: A string slice such as `"1,234.56"` or `"3.25%"`.
/// * `escape_chars`: Optional characters to be escaped from the input string.
///
/// # Example
///
/// ```
/// let s = "1,234.56";
/// let decimal_value = parse_decimal(s, None).unwrap();
/// ```
pub fn parse_decimal(s: &str, escape_chars: Option<Vec<char>>) -> Result<Decimal> {
    let cleaned = clean_escape_chars(s, escape_chars);
    Decimal::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as Decimal because {:?}", cleaned, why))
}

/// 把 JSON 欄位轉成 `Decimal`，銀行回傳的額度有時是數字、有時是字串
pub fn decimal_from_json(value: &Value) -> Result<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string(), None),
        Value::String(s) => parse_decimal(s, None),
        other => Err(anyhow!("Expected a number or a string but got {}", other)),
    }
}

/// Removes a set of escape characters from a given string.
///
/// # Example
///
/// ```
/// let s = "1,000,000元";
/// let clean_s = clean_escape_chars(s, None);
/// assert_eq!(clean_s, "1000000");
/// ```
pub(crate) fn clean_escape_chars(s: &str, escape_chars: Option<Vec<char>>) -> String {
    let mut combined: Vec<char> = NUMBER_ESCAPE_CHAR.to_vec();
    if let Some(ec) = escape_chars {
        combined.extend(ec);
    }

    let filters = combined.iter().collect::<HashSet<_>>();
    s.chars().filter(|c| !filters.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    // 注意這個慣用法：在 tests 模組中，從外部範疇匯入所有名字。
    use super::*;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("1,234.56", None).unwrap(), dec!(1234.56));
        assert_eq!(parse_decimal("3.25%", None).unwrap(), dec!(3.25));
        assert_eq!(parse_decimal(" 1000000元", None).unwrap(), dec!(1000000));
        assert_eq!(
            parse_decimal("(4.10)", Some(vec!['(', ')'])).unwrap(),
            dec!(4.10)
        );
        assert!(parse_decimal("N/A", None).is_err());
    }

    #[test]
    fn test_decimal_from_json() {
        assert_eq!(decimal_from_json(&json!(1000000)).unwrap(), dec!(1000000));
        assert_eq!(decimal_from_json(&json!(12.5)).unwrap(), dec!(12.5));
        assert_eq!(
            decimal_from_json(&json!("98,765,432.10")).unwrap(),
            dec!(98765432.10)
        );
        assert!(decimal_from_json(&json!(null)).is_err());
        assert!(decimal_from_json(&json!([1])).is_err());
    }

    #[test]
    fn test_clean_escape_chars() {
        let result = clean_escape_chars("台積電% 元 ,", Some(vec!['元', '%', ',']));
        assert_eq!(result, "台積電");
    }
}
