use super::engine::{FnRule, RuleCategory};
use super::support::{money, sum_complete, tax_amount};
use crate::config::ValidationConfig;
use crate::types::{PedimentoRecord, ValidationFinding};

const CATEGORY: RuleCategory = RuleCategory::Reconciliation;

pub const RULES: &[FnRule] = &[
    FnRule::new("commercial_value_total", CATEGORY, commercial_value_total),
    FnRule::new("customs_value_total", CATEGORY, customs_value_total),
    FnRule::new("invoice_value_total", CATEGORY, invoice_value_total),
    FnRule::new("igi_total", CATEGORY, igi_total),
    FnRule::new("iva_total", CATEGORY, iva_total),
];

/// Flags when |declared − summed| exceeds the tolerance. Equal to the
/// tolerance is accepted. Unknown on either side means nothing to compare,
/// and a sum with any unknown part is unknown.
fn compare(
    rule: &str,
    field: &str,
    declared: Option<f64>,
    summed: Option<f64>,
    tolerance: f64,
    findings: &mut Vec<ValidationFinding>,
) {
    let (Some(declared), Some(summed)) = (declared, summed) else {
        return;
    };
    let diff = (declared - summed).abs();
    if diff > tolerance {
        findings.push(
            ValidationFinding::warning(
                rule,
                field,
                format!(
                    "Header {field} differs from the sum of items by {} (tolerance {})",
                    money(diff),
                    money(tolerance)
                ),
            )
            .with_expected(money(declared))
            .with_actual(money(summed)),
        );
    }
}

fn commercial_value_total(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    compare(
        "commercial_value_total",
        "Commercial Value",
        record.header.commercial_value,
        sum_complete(record.items.iter().map(|i| i.commercial_value)),
        config.value_tolerance,
        findings,
    );
}

fn customs_value_total(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    compare(
        "customs_value_total",
        "Customs Value",
        record.header.customs_value,
        sum_complete(record.items.iter().map(|i| i.customs_value)),
        config.value_tolerance,
        findings,
    );
}

/// Invoices are declared in dollars; the header's dollar value covers them all.
fn invoice_value_total(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    compare(
        "invoice_value_total",
        "Dollar Value",
        record.header.dollar_value,
        sum_complete(record.header.invoices.iter().map(|i| i.dollar_value)),
        config.value_tolerance,
        findings,
    );
}

fn tax_total(
    rule: &str,
    code: &str,
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    compare(
        rule,
        &format!("{code} Total"),
        tax_amount(record.header.tax(code)),
        sum_complete(record.items.iter().map(|i| tax_amount(i.tax(code)))),
        config.tax_total_tolerance,
        findings,
    );
}

fn igi_total(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    tax_total("igi_total", "IGI", record, config, findings);
}

fn iva_total(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    tax_total("iva_total", "IVA", record, config, findings);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ComplianceRule;
    use crate::types::{Invoice, LineItem, Severity, Tax};

    fn run(record: &PedimentoRecord) -> Vec<ValidationFinding> {
        let config = ValidationConfig::default();
        let mut findings = Vec::new();
        for rule in RULES {
            rule.evaluate(record, &config, &mut findings);
        }
        findings
    }

    fn record(header_value: f64, item_values: &[f64]) -> PedimentoRecord {
        let mut record = PedimentoRecord::default();
        record.header.commercial_value = Some(header_value);
        for (i, value) in item_values.iter().enumerate() {
            record.items.push(LineItem {
                commercial_value: Some(*value),
                ..LineItem::new(i as u32 + 1)
            });
        }
        record
    }

    #[test]
    fn difference_above_tolerance_warns() {
        let findings = run(&record(10_000.0, &[5_000.0, 4_994.5]));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].field, "Commercial Value");
        assert_eq!(findings[0].expected.as_deref(), Some("10000.00"));
        assert_eq!(findings[0].actual.as_deref(), Some("9994.50"));
    }

    #[test]
    fn difference_at_tolerance_passes() {
        assert!(run(&record(10_000.0, &[5_000.0, 4_995.0])).is_empty());
        assert!(run(&record(10_000.0, &[5_000.0, 4_996.0])).is_empty());
    }

    #[test]
    fn unknown_values_are_not_compared() {
        let mut record = record(10_000.0, &[]);
        record.items.push(LineItem::new(1));
        assert!(run(&record).is_empty());
    }

    #[test]
    fn zero_item_tax_still_counts() {
        let mut record = PedimentoRecord::default();
        record.header.taxes.push(Tax {
            code: "IGI".to_string(),
            amount: Some(3_000.0),
            ..Default::default()
        });
        for (seq, amount) in [(1, 3_000.0), (2, 0.0)] {
            let mut item = LineItem::new(seq);
            item.taxes.push(Tax {
                code: "IGI".to_string(),
                amount: Some(amount),
                ..Default::default()
            });
            record.items.push(item);
        }
        assert!(run(&record).is_empty());

        record.items[1].taxes[0].amount = Some(100.0);
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "igi_total");
    }

    #[test]
    fn unknown_item_value_is_not_counted_as_zero() {
        let mut record = record(10_000.0, &[5_000.0]);
        record.items.push(LineItem::new(2));
        assert!(run(&record).is_empty());
    }

    fn tax(code: &str, amount: f64) -> Tax {
        Tax {
            code: code.to_string(),
            amount: Some(amount),
            ..Default::default()
        }
    }

    #[test]
    fn customs_value_mismatch_warns() {
        let mut record = PedimentoRecord::default();
        record.header.customs_value = Some(200_027.0);
        for (seq, value) in [(1, 100_014.0), (2, 100_013.0)] {
            record.items.push(LineItem {
                customs_value: Some(value),
                ..LineItem::new(seq)
            });
        }
        assert!(run(&record).is_empty());

        record.items[1].customs_value = Some(90_013.0);
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "customs_value_total");
        assert_eq!(findings[0].actual.as_deref(), Some("190027.00"));
    }

    #[test]
    fn invoice_dollar_sum_is_checked() {
        let mut record = PedimentoRecord::default();
        record.header.dollar_value = Some(11_731.24);
        for number in ["A-1", "A-2"] {
            record.header.invoices.push(Invoice {
                number: number.to_string(),
                dollar_value: Some(5_865.62),
                ..Default::default()
            });
        }
        assert!(run(&record).is_empty());

        record.header.invoices.pop();
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "invoice_value_total");
        assert_eq!(findings[0].field, "Dollar Value");
    }

    #[test]
    fn iva_total_mismatch_warns() {
        let mut record = PedimentoRecord::default();
        record.header.taxes.push(tax("IVA", 32_484.0));
        for (seq, amount) in [(1, 16_482.0), (2, 16_002.0)] {
            let mut item = LineItem::new(seq);
            item.taxes.push(tax("IVA", amount));
            record.items.push(item);
        }
        assert!(run(&record).is_empty());

        record.header.taxes[0].amount = Some(32_500.0);
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "iva_total");
        assert_eq!(findings[0].field, "IVA Total");
        assert_eq!(findings[0].expected.as_deref(), Some("32500.00"));
    }

    #[test]
    fn item_without_the_tax_line_leaves_total_unknown() {
        let mut record = PedimentoRecord::default();
        record.header.taxes.push(tax("IVA", 32_484.0));
        let mut item = LineItem::new(1);
        item.taxes.push(tax("IVA", 16_482.0));
        record.items.push(item);
        record.items.push(LineItem::new(2));
        assert!(run(&record).is_empty());
    }
}
