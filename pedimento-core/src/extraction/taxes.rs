use crate::normalize::{is_integer_token, parse_amount};
use crate::raw::{text, RawTax};
use std::collections::HashSet;

/// Finds contribution lines by token scanning.
///
/// Layout is column-based (`IGI 3.00000 1 0 3,000` on item pages,
/// `DTA 0 1,600` in the liquidation table), so the `lookahead` tokens after a
/// tax code hold its numeric columns: an optional decimal rate, then the
/// rate-type and payment-form columns, then the amount. Another tax code
/// ends the window.
pub struct TaxScanner {
    codes: HashSet<String>,
    lookahead: usize,
}

impl TaxScanner {
    pub fn new(codes: &[String], lookahead: usize) -> Self {
        Self {
            codes: codes.iter().map(|c| c.to_uppercase()).collect(),
            lookahead: lookahead.max(1),
        }
    }

    fn is_code(&self, token: &str) -> bool {
        self.codes.contains(token.trim_end_matches(':'))
    }

    /// One tax per code, first occurrence wins.
    pub fn scan(&self, text: &str) -> Vec<RawTax> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut seen = HashSet::new();
        let mut taxes = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            if !self.is_code(token) {
                continue;
            }
            let code = token.trim_end_matches(':');
            let window_end = (i + 1 + self.lookahead).min(tokens.len());
            let numbers = self.numeric_run(&tokens[i + 1..window_end]);
            if numbers.is_empty() || !seen.insert(code.to_string()) {
                continue;
            }
            taxes.push(interpret(code, &numbers));
        }
        taxes
    }

    /// Filler before the first number (`*`, a payment label) is skipped.
    /// Once the numbers start, a non-numeric token ends the run.
    fn numeric_run<'a>(&self, window: &[&'a str]) -> Vec<&'a str> {
        let mut numbers = Vec::new();
        for token in window {
            if *token == "$" {
                continue;
            }
            if self.is_code(token) {
                break;
            }
            if parse_amount(token).is_none() {
                if numbers.is_empty() {
                    continue;
                }
                break;
            }
            numbers.push(*token);
        }
        numbers
    }
}

fn is_column_code(token: &str) -> bool {
    token.len() <= 2 && is_integer_token(token)
}

/// A lone decimal is a rate only when it is percentage-sized and printed
/// with rate precision (`16.00000`). `408.00` is an amount.
fn is_printed_rate(token: &str) -> bool {
    let Some((_, fraction)) = token.split_once('.') else {
        return false;
    };
    fraction.len() > 2 && parse_amount(token).is_some_and(|rate| (0.0..=100.0).contains(&rate))
}

fn interpret(code: &str, numbers: &[&str]) -> RawTax {
    let (rate, rest) = match numbers.split_first() {
        Some((first, rest)) if first.contains('.') && !rest.is_empty() => (Some(*first), rest),
        Some((first, rest)) if rest.is_empty() && is_printed_rate(first) => (Some(*first), rest),
        _ => (None, numbers),
    };

    let (rate_type, payment_form, amount) = match (rate.is_some(), rest) {
        (_, [tt, fp, amount, ..]) => (Some(*tt), Some(*fp), Some(*amount)),
        (true, [tt, fp]) => (Some(*tt), Some(*fp), None),
        (false, [fp, amount]) => (None, Some(*fp), Some(*amount)),
        (true, [only]) if is_column_code(only) => (Some(*only), None, None),
        (_, [only]) => (None, None, Some(*only)),
        _ => (None, None, None),
    };

    RawTax {
        clave: text(code),
        tasa: rate.and_then(|r| text(r)),
        tipo_tasa: rate_type.and_then(|r| text(r)),
        forma_pago: payment_form.and_then(|r| text(r)),
        importe: amount.and_then(|r| text(r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scanner() -> TaxScanner {
        let codes: Vec<String> = ["IGI", "IVA", "DTA", "PRV"].iter().map(|s| s.to_string()).collect();
        TaxScanner::new(&codes, 6)
    }

    #[test]
    fn reads_item_tax_lines() {
        let taxes = scanner().scan(
            "CON.   TASA       T.T.   F.P.   IMPORTE\n\
             IGI    3.00000    1      0      3,000\n\
             IVA    16.00000   1      0      16,482\n",
        );
        assert_eq!(taxes.len(), 2);
        assert_eq!(taxes[0].clave, Some(json!("IGI")));
        assert_eq!(taxes[0].tasa, Some(json!("3.00000")));
        assert_eq!(taxes[0].forma_pago, Some(json!("0")));
        assert_eq!(taxes[0].importe, Some(json!("3,000")));
        assert_eq!(taxes[1].importe, Some(json!("16,482")));
    }

    #[test]
    fn reads_liquidation_table_without_rates() {
        let taxes = scanner().scan("DTA        0      1,600\nPRV        0      290\nEFECTIVO: 1,890");
        assert_eq!(taxes.len(), 2);
        assert_eq!(taxes[0].tasa, None);
        assert_eq!(taxes[0].forma_pago, Some(json!("0")));
        assert_eq!(taxes[0].importe, Some(json!("1,600")));
        assert_eq!(taxes[1].importe, Some(json!("290")));
    }

    #[test]
    fn zero_amount_is_kept() {
        let taxes = scanner().scan("IGI 0.00000 1 0 0");
        assert_eq!(taxes[0].tasa, Some(json!("0.00000")));
        assert_eq!(taxes[0].importe, Some(json!("0")));
    }

    #[test]
    fn missing_amount_is_unknown() {
        let taxes = scanner().scan("IVA 16.00000 1 21\nIDENTIF: IC A");
        assert_eq!(taxes[0].forma_pago, Some(json!("21")));
        assert_eq!(taxes[0].importe, None);
    }

    #[test]
    fn codes_in_prose_are_ignored() {
        let taxes = scanner().scan("CERTIFICACION EN MATERIA DE IVA E IEPS");
        assert!(taxes.is_empty());
    }

    #[test]
    fn lookahead_bounds_the_window() {
        let codes = vec!["IGI".to_string()];
        let taxes = TaxScanner::new(&codes, 2).scan("IGI 3.00000 1 0 3,000");
        assert_eq!(taxes[0].tipo_tasa, Some(json!("1")));
        assert_eq!(taxes[0].importe, None);
    }

    #[test]
    fn filler_before_the_columns_is_skipped() {
        let taxes = scanner().scan("DTA  *  0   1,600\nIVA  EFE  32,484");
        assert_eq!(taxes.len(), 2);
        assert_eq!(taxes[0].clave, Some(json!("DTA")));
        assert_eq!(taxes[0].forma_pago, Some(json!("0")));
        assert_eq!(taxes[0].importe, Some(json!("1,600")));
        assert_eq!(taxes[1].clave, Some(json!("IVA")));
        assert_eq!(taxes[1].importe, Some(json!("32,484")));
    }

    #[test]
    fn text_after_the_amount_ends_the_columns() {
        let taxes = scanner().scan("IVA        0      32,484\nEFECTIVO: 37,374   TOTAL: 37,374");
        assert_eq!(taxes[0].forma_pago, Some(json!("0")));
        assert_eq!(taxes[0].importe, Some(json!("32,484")));
    }

    #[test]
    fn lone_decimal_amount_is_not_a_rate() {
        let taxes = scanner().scan("DTA 408.00");
        assert_eq!(taxes[0].tasa, None);
        assert_eq!(taxes[0].importe, Some(json!("408.00")));

        let taxes = scanner().scan("IVA 16.00000");
        assert_eq!(taxes[0].tasa, Some(json!("16.00000")));
        assert_eq!(taxes[0].importe, None);
    }
}
