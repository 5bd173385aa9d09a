use super::engine::{FnRule, RuleCategory};
use super::support::item_field;
use crate::config::ValidationConfig;
use crate::types::{PedimentoRecord, ValidationFinding};

const CATEGORY: RuleCategory = RuleCategory::Format;

pub const RULES: &[FnRule] = &[
    FnRule::new("fraccion_format", CATEGORY, fraccion_format),
    FnRule::new("nico_format", CATEGORY, nico_format),
    FnRule::new("pedimento_number_format", CATEGORY, pedimento_number_format),
    FnRule::new("rfc_format", CATEGORY, rfc_format),
    FnRule::new("country_code_format", CATEGORY, country_code_format),
    FnRule::new("date_gap", CATEGORY, date_gap),
];

fn all_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

fn fraccion_format(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    for item in &record.items {
        match item.fraccion.as_deref() {
            Some(fraccion) if all_digits(fraccion, 8) => {}
            Some(fraccion) => findings.push(
                ValidationFinding::error(
                    "fraccion_format",
                    &item_field(item, "Fraccion"),
                    "Fraccion format invalid",
                )
                .with_expected("8 digits")
                .with_actual(fraccion),
            ),
            None => findings.push(ValidationFinding::error(
                "fraccion_format",
                &item_field(item, "Fraccion"),
                "Fraccion missing",
            )),
        }
    }
}

fn nico_format(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    for item in &record.items {
        match item.nico.as_deref() {
            Some(nico) if all_digits(nico, 2) => {}
            Some(nico) => findings.push(
                ValidationFinding::error(
                    "nico_format",
                    &item_field(item, "NICO"),
                    "NICO format invalid",
                )
                .with_expected("2 digits")
                .with_actual(nico),
            ),
            None => findings.push(ValidationFinding::warning(
                "nico_format",
                &item_field(item, "NICO"),
                "NICO missing",
            )),
        }
    }
}

/// Year (2) + customs office (2) + patent (4) + progressive number (7).
fn pedimento_number_format(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    if let Some(number) = record.header.pedimento_no() {
        if !all_digits(number, 15) {
            findings.push(
                ValidationFinding::warning(
                    "pedimento_number_format",
                    "Pedimento No",
                    "Pedimento number should have 15 digits",
                )
                .with_expected("15 digits")
                .with_actual(number),
            );
        }
    }
}

/// Legal entities use 3 letters, individuals 4; then YYMMDD and a
/// 3-character homoclave.
fn is_valid_rfc(rfc: &str) -> bool {
    let chars: Vec<char> = rfc.chars().collect();
    let letters = match chars.len() {
        12 => 3,
        13 => 4,
        _ => return false,
    };
    let (prefix, rest) = chars.split_at(letters);
    let (date, homoclave) = rest.split_at(6);
    prefix
        .iter()
        .all(|c| c.is_ascii_uppercase() || *c == 'Ñ' || *c == '&')
        && date.iter().all(|c| c.is_ascii_digit())
        && homoclave
            .iter()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn rfc_format(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    if let Some(rfc) = record.header.importer_rfc.as_deref() {
        if !is_valid_rfc(rfc) {
            findings.push(
                ValidationFinding::warning("rfc_format", "RFC", "RFC format invalid")
                    .with_expected("3-4 letters, YYMMDD, 3-character homoclave")
                    .with_actual(rfc),
            );
        }
    }
}

fn country_code_format(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let is_code = |c: &str| c.len() == 3 && c.bytes().all(|b| b.is_ascii_uppercase());
    for item in &record.items {
        for (label, country) in [
            ("Seller Country", &item.seller_country),
            ("Origin Country", &item.origin_country),
        ] {
            if let Some(country) = country.as_deref() {
                if !is_code(country) {
                    findings.push(
                        ValidationFinding::warning(
                            "country_code_format",
                            &item_field(item, label),
                            "Country code should be 3 letters",
                        )
                        .with_actual(country),
                    );
                }
            }
        }
    }
}

fn date_gap(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let (Some(entry), Some(payment)) = (record.header.entry_date, record.header.payment_date)
    else {
        return;
    };
    let gap = (payment - entry).num_days().abs();
    let limit = config.policy.max_entry_payment_gap_days;
    if gap > limit {
        findings.push(
            ValidationFinding::warning(
                "date_gap",
                "Payment Date",
                format!("Entry and payment dates are {gap} days apart"),
            )
            .with_expected(format!("at most {limit} days"))
            .with_actual(format!("entry {entry}, payment {payment}")),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ComplianceRule;
    use crate::types::{LineItem, Severity};
    use chrono::NaiveDate;

    fn run(record: &PedimentoRecord) -> Vec<ValidationFinding> {
        let config = ValidationConfig::default();
        let mut findings = Vec::new();
        for rule in RULES {
            rule.evaluate(record, &config, &mut findings);
        }
        findings
    }

    fn item(fraccion: &str, nico: &str) -> LineItem {
        LineItem {
            fraccion: Some(fraccion.to_string()),
            nico: Some(nico.to_string()),
            ..LineItem::new(1)
        }
    }

    #[test]
    fn six_digit_fraccion_is_an_error() {
        let mut record = PedimentoRecord::default();
        record.items.push(item("850431", "00"));
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[0].message, "Fraccion format invalid");
        assert_eq!(findings[0].actual.as_deref(), Some("850431"));
    }

    #[test]
    fn well_formed_item_passes() {
        let mut record = PedimentoRecord::default();
        record.items.push(item("85044099", "00"));
        assert!(run(&record).is_empty());
    }

    #[test]
    fn rfc_shapes() {
        assert!(is_valid_rfc("ABC010203XY4"));
        assert!(is_valid_rfc("GOMJ800101AB1"));
        assert!(is_valid_rfc("ÑAB010203XY4"));
        assert!(!is_valid_rfc("AB0102031XY4"));
        assert!(!is_valid_rfc("ABC01023XY4"));
    }

    #[test]
    fn payment_far_from_entry_is_flagged() {
        let mut record = PedimentoRecord::default();
        record.header.entry_date = NaiveDate::from_ymd_opt(2024, 1, 2);
        record.header.payment_date = NaiveDate::from_ymd_opt(2024, 3, 14);
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "date_gap");
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn nico_must_be_two_digits() {
        let mut record = PedimentoRecord::default();
        record.items.push(item("85044099", "0"));
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "nico_format");
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[0].actual.as_deref(), Some("0"));

        record.items[0].nico = None;
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn short_pedimento_number_warns() {
        let mut record = PedimentoRecord::default();
        record.header.set_pedimento_no("2447342940012");
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "pedimento_number_format");
        assert_eq!(findings[0].actual.as_deref(), Some("2447342940012"));

        let mut record = PedimentoRecord::default();
        record.header.set_pedimento_no("244734294001234");
        assert!(run(&record).is_empty());
    }

    #[test]
    fn country_codes_are_three_letters() {
        let mut record = PedimentoRecord::default();
        let mut line = item("85044099", "00");
        line.seller_country = Some("US".to_string());
        line.origin_country = Some("USA".to_string());
        record.items.push(line);
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "country_code_format");
        assert_eq!(findings[0].field, "Item 1 Seller Country");

        record.items[0].seller_country = Some("USA".to_string());
        assert!(run(&record).is_empty());
    }
}
