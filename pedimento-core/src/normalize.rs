// Scalar normalization shared by both extraction paths and the mapper.
//
// Every function here is total: malformed input yields `None` (unknown),
// never zero and never a panic.

use chrono::NaiveDate;
use serde_json::Value;

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d.%m.%Y"];

/// Parse a monetary or quantity string, stripping thousands separators.
///
/// Accepts `12,345.67`, `12345.67`, `$ 1,600`, `-5`. Rejects misplaced
/// separators (`12,34,5`), multiple decimal points and any other text.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned = text.trim().trim_start_matches('$').trim();
    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned),
    };

    let (int_part, frac_part) = match body.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (body, None),
    };

    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    let digits = if int_part.contains(',') {
        let groups: Vec<&str> = int_part.split(',').collect();
        let leading_ok = (1..=3).contains(&groups[0].len());
        let rest_ok = groups[1..].iter().all(|g| g.len() == 3);
        if !leading_ok || !rest_ok {
            return None;
        }
        groups.concat()
    } else {
        int_part.to_string()
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let normalized = match frac_part {
        Some(frac) => format!("{digits}.{frac}"),
        None => digits,
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| if negative { -v } else { v })
}

/// True for tokens made only of digits and well-placed thousands separators.
pub fn is_integer_token(token: &str) -> bool {
    !token.contains('.') && !token.starts_with('-') && parse_amount(token).is_some()
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Tariff fractions are printed as `8504.40.99` or `85044099`.
pub fn normalize_fraccion(text: &str) -> Option<String> {
    let compact: String = text.chars().filter(|c| !matches!(c, '.' | ' ')).collect();
    non_empty(compact)
}

/// Uppercased, trimmed code; `None` when empty.
pub fn normalize_code(text: &str) -> Option<String> {
    non_empty(text.trim().to_uppercase())
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// ===== LOOSELY TYPED JSON =====

/// Number or numeric string to `f64`.
pub fn amount_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

/// Scalar to trimmed text. Arrays, objects, null and empty strings are unknown.
pub fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn sequence_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

pub fn date_from_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date(s),
        _ => None,
    }
}

pub fn opt_amount(value: &Option<Value>) -> Option<f64> {
    value.as_ref().and_then(amount_from_value)
}

pub fn opt_text(value: &Option<Value>) -> Option<String> {
    value.as_ref().and_then(text_from_value)
}

pub fn opt_code(value: &Option<Value>) -> Option<String> {
    opt_text(value).and_then(|t| normalize_code(&t))
}

pub fn opt_date(value: &Option<Value>) -> Option<NaiveDate> {
    value.as_ref().and_then(date_from_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_thousands_separators() {
        assert_eq!(parse_amount("12,345.67"), Some(12345.67));
        assert_eq!(parse_amount("1,600"), Some(1600.0));
        assert_eq!(parse_amount("$ 200,000"), Some(200000.0));
        assert_eq!(parse_amount("0"), Some(0.0));
        assert_eq!(parse_amount("-5.5"), Some(-5.5));
        assert_eq!(parse_amount("666.66667"), Some(666.66667));
    }

    #[test]
    fn malformed_numbers_are_unknown_not_zero() {
        for bad in ["", "abc", "12,34,5", "1.2.3", "1,2345", "12.", "N/A", "1 600", "--1"] {
            assert_eq!(parse_amount(bad), None, "{bad:?} should not parse");
        }
    }

    #[test]
    fn integer_tokens_exclude_rates() {
        assert!(is_integer_token("1,500"));
        assert!(is_integer_token("0"));
        assert!(!is_integer_token("16.00000"));
        assert!(!is_integer_token("IVA"));
    }

    #[test]
    fn dates_accept_document_and_iso_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 14);
        assert_eq!(parse_date("14/03/2024"), expected);
        assert_eq!(parse_date("2024-03-14"), expected);
        assert_eq!(parse_date("31/02/2024"), None);
    }

    #[test]
    fn json_scalars_degrade_to_unknown() {
        assert_eq!(amount_from_value(&json!("12,345.67")), Some(12345.67));
        assert_eq!(amount_from_value(&json!(12.5)), Some(12.5));
        assert_eq!(amount_from_value(&json!({"value": 1})), None);
        assert_eq!(text_from_value(&json!("  A1 ")), Some("A1".to_string()));
        assert_eq!(text_from_value(&json!([1, 2])), None);
        assert_eq!(sequence_from_value(&json!("007")), Some(7));
        assert_eq!(sequence_from_value(&json!(-1)), None);
    }

    #[test]
    fn fraccion_drops_dots() {
        assert_eq!(normalize_fraccion("8504.40.99"), Some("85044099".to_string()));
        assert_eq!(normalize_fraccion(" "), None);
    }
}
