use super::engine::{FnRule, RuleCategory};
use super::support::{item_field, money, sum_known, tax_amount};
use crate::config::ValidationConfig;
use crate::types::{LineItem, PedimentoRecord, ValidationFinding};

const CATEGORY: RuleCategory = RuleCategory::Rates;

pub const RULES: &[FnRule] = &[
    FnRule::new("iva_rate_plausibility", CATEGORY, iva_rate_plausibility),
    FnRule::new("igi_rate_plausibility", CATEGORY, igi_rate_plausibility),
    FnRule::new("dta_plausibility", CATEGORY, dta_plausibility),
];

/// Declared amounts are rounded to whole pesos, so one peso of slack is
/// always allowed on top of the percentage.
fn within(expected: f64, actual: f64, tolerance_pct: f64) -> bool {
    (expected - actual).abs() <= (expected.abs() * tolerance_pct / 100.0).max(1.0)
}

/// IVA is levied on the customs value plus every other contribution of the item.
fn iva_base(item: &LineItem) -> Option<f64> {
    let others = sum_known(
        item.taxes
            .iter()
            .filter(|t| t.code != "IVA")
            .map(|t| t.amount),
    )
    .unwrap_or(0.0);
    item.customs_value.map(|value| value + others)
}

fn iva_rate_plausibility(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let policy = &config.policy;
    let known_rates = [policy.standard_iva_rate, policy.alternate_iva_rate, 0.0];

    for item in &record.items {
        let Some(tax) = item.tax("IVA") else {
            continue;
        };
        // Credit and deferred payment forms settle IVA elsewhere.
        if tax.payment_form.is_some() && !policy.is_cash(tax.payment_form.as_deref()) {
            continue;
        }
        let field = item_field(item, "IVA");

        if let Some(rate) = tax.rate {
            if !known_rates.iter().any(|known| (known - rate).abs() < 0.01) {
                findings.push(
                    ValidationFinding::warning(
                        "iva_rate_plausibility",
                        &field,
                        format!("Unexpected IVA rate {rate}%"),
                    )
                    .with_expected(format!(
                        "{}% or {}%",
                        policy.standard_iva_rate, policy.alternate_iva_rate
                    ))
                    .with_actual(rate),
                );
                continue;
            }
        }

        let (Some(base), Some(amount)) = (iva_base(item), tax.amount) else {
            continue;
        };
        let rate = tax.rate.unwrap_or(policy.standard_iva_rate);
        let expected = base * rate / 100.0;
        if within(expected, amount, config.rate_tolerance_pct) {
            continue;
        }

        let alternate = base * policy.alternate_iva_rate / 100.0;
        let message = if within(alternate, amount, config.rate_tolerance_pct) {
            format!(
                "IVA amount matches the {}% rate, not the declared {rate}%",
                policy.alternate_iva_rate
            )
        } else {
            format!("IVA amount does not match {rate}% of the taxable base {}", money(base))
        };
        findings.push(
            ValidationFinding::info("iva_rate_plausibility", &field, message)
                .with_expected(money(expected))
                .with_actual(money(amount)),
        );
    }
}

fn igi_rate_plausibility(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    for item in &record.items {
        let Some(tax) = item.tax("IGI") else {
            continue;
        };
        let (Some(rate), Some(value), Some(amount)) = (tax.rate, item.customs_value, tax.amount)
        else {
            continue;
        };
        let expected = value * rate / 100.0;
        if !within(expected, amount, config.rate_tolerance_pct) {
            findings.push(
                ValidationFinding::info(
                    "igi_rate_plausibility",
                    &item_field(item, "IGI"),
                    format!("IGI amount does not match {rate}% of the customs value"),
                )
                .with_expected(money(expected))
                .with_actual(money(amount)),
            );
        }
    }
}

/// DTA is either a per-thousand rate on the customs value or a fixed fee.
fn dta_plausibility(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let policy = &config.policy;
    let declared = tax_amount(record.header.tax("DTA"))
        .or_else(|| sum_known(record.items.iter().map(|i| tax_amount(i.tax("DTA")))));
    let (Some(amount), Some(value)) = (declared, record.header.customs_value) else {
        return;
    };
    let proportional = value * policy.dta_rate;
    if within(proportional, amount, config.rate_tolerance_pct)
        || within(policy.dta_fixed_fee, amount, config.rate_tolerance_pct)
    {
        return;
    }
    findings.push(
        ValidationFinding::info(
            "dta_plausibility",
            "Liquidation DTA",
            format!(
                "DTA matches neither {} per thousand of the customs value nor the fixed fee {}",
                policy.dta_rate * 1000.0,
                money(policy.dta_fixed_fee)
            ),
        )
        .with_expected(money(proportional))
        .with_actual(money(amount)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ComplianceRule;
    use crate::types::{Severity, Tax};

    fn run(record: &PedimentoRecord) -> Vec<ValidationFinding> {
        let config = ValidationConfig::default();
        let mut findings = Vec::new();
        for rule in RULES {
            rule.evaluate(record, &config, &mut findings);
        }
        findings
    }

    fn tax(code: &str, rate: f64, fp: &str, amount: f64) -> Tax {
        Tax {
            code: code.to_string(),
            rate: Some(rate),
            payment_form: Some(fp.to_string()),
            amount: Some(amount),
            ..Default::default()
        }
    }

    fn item(customs_value: f64, taxes: Vec<Tax>) -> PedimentoRecord {
        let mut record = PedimentoRecord::default();
        let mut item = LineItem::new(1);
        item.customs_value = Some(customs_value);
        item.taxes = taxes;
        record.items.push(item);
        record
    }

    #[test]
    fn iva_on_customs_value_plus_duty_is_plausible() {
        let record = item(
            100_014.0,
            vec![tax("IGI", 3.0, "0", 3_000.0), tax("IVA", 16.0, "0", 16_482.0)],
        );
        assert!(run(&record).is_empty());
    }

    #[test]
    fn iva_at_alternate_rate_is_info() {
        let record = item(100_000.0, vec![tax("IVA", 16.0, "0", 8_000.0)]);
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].message.contains("8%"));
    }

    #[test]
    fn unknown_iva_rate_warns() {
        let record = item(100_000.0, vec![tax("IVA", 11.0, "0", 11_000.0)]);
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn credited_iva_is_not_checked() {
        let record = item(100_000.0, vec![tax("IVA", 16.0, "21", 0.0)]);
        assert!(run(&record).is_empty());
    }

    #[test]
    fn dta_accepts_rate_or_fixed_fee() {
        let mut record = PedimentoRecord::default();
        record.header.customs_value = Some(200_027.0);
        record.header.taxes.push(tax("DTA", 0.0, "0", 1_600.0));
        assert!(run(&record).is_empty());

        record.header.taxes[0].amount = Some(408.0);
        assert!(run(&record).is_empty());

        record.header.taxes[0].amount = Some(5_000.0);
        assert_eq!(run(&record).len(), 1);
    }

    #[test]
    fn igi_amount_off_its_rate_is_info() {
        let record = item(100_000.0, vec![tax("IGI", 5.0, "0", 5_000.0)]);
        assert!(run(&record).is_empty());

        let record = item(100_000.0, vec![tax("IGI", 5.0, "0", 4_000.0)]);
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "igi_rate_plausibility");
        assert_eq!(findings[0].severity, Severity::Info);
        assert_eq!(findings[0].expected.as_deref(), Some("5000.00"));
        assert_eq!(findings[0].actual.as_deref(), Some("4000.00"));
    }
}
