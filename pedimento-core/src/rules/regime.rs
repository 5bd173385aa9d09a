use super::engine::{FnRule, RuleCategory};
use super::support::{contains, item_field, money};
use crate::config::ValidationConfig;
use crate::types::{LineItem, PedimentoRecord, Tax, ValidationFinding};

const CATEGORY: RuleCategory = RuleCategory::Regime;

pub const RULES: &[FnRule] = &[
    FnRule::new(
        "vat_credit_requires_certification",
        CATEGORY,
        vat_credit_requires_certification,
    ),
    FnRule::new(
        "pending_payment_requires_program",
        CATEGORY,
        pending_payment_requires_program,
    ),
    FnRule::new(
        "temporary_import_requires_program",
        CATEGORY,
        temporary_import_requires_program,
    ),
    FnRule::new(
        "document_key_requires_identifier",
        CATEGORY,
        document_key_requires_identifier,
    ),
    FnRule::new(
        "treaty_preference_requires_complement",
        CATEGORY,
        treaty_preference_requires_complement,
    ),
    FnRule::new("treaty_origin_partner", CATEGORY, treaty_origin_partner),
    FnRule::new(
        "sector_program_requires_complement",
        CATEGORY,
        sector_program_requires_complement,
    ),
    FnRule::new("exclusive_identifiers", CATEGORY, exclusive_identifiers),
    FnRule::new("identifier_requires_permit", CATEGORY, identifier_requires_permit),
    FnRule::new(
        "sensitive_chapter_requires_permit",
        CATEGORY,
        sensitive_chapter_requires_permit,
    ),
    FnRule::new("sector_registry_chapter", CATEGORY, sector_registry_chapter),
    FnRule::new("countervailing_duty_origin", CATEGORY, countervailing_duty_origin),
    FnRule::new("export_with_iva", CATEGORY, export_with_iva),
    FnRule::new("program_cash_vat", CATEGORY, program_cash_vat),
    FnRule::new("temporary_import_cash_duty", CATEGORY, temporary_import_cash_duty),
    FnRule::new(
        "related_party_transaction_value",
        CATEGORY,
        related_party_transaction_value,
    ),
];

/// Every tax line in the document with the field label it is reported under.
fn tax_lines(record: &PedimentoRecord) -> impl Iterator<Item = (String, &Tax)> {
    let header = record
        .header
        .taxes
        .iter()
        .map(|tax| (format!("Liquidation {}", tax.code), tax));
    let items = record.items.iter().flat_map(|item| {
        item.taxes
            .iter()
            .map(move |tax| (item_field(item, &tax.code), tax))
    });
    header.chain(items)
}

fn paid_with<'a>(tax: &'a Tax, forms: &[String]) -> Option<&'a str> {
    tax.payment_form
        .as_deref()
        .filter(|fp| contains(forms, fp))
}

fn positive(amount: Option<f64>) -> bool {
    amount.is_some_and(|a| a > 0.0)
}

fn vat_credit_requires_certification(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let policy = &config.policy;
    if record.has_identifier(&policy.certification_identifier) {
        return;
    }
    for (field, tax) in tax_lines(record) {
        if let Some(fp) = paid_with(tax, &policy.vat_credit_payment_forms) {
            findings.push(
                ValidationFinding::error(
                    "vat_credit_requires_certification",
                    &field,
                    format!(
                        "Payment form {fp} takes VAT credit but no {} certification identifier is declared",
                        policy.certification_identifier
                    ),
                )
                .with_expected(&policy.certification_identifier)
                .with_actual(format!("F.P. {fp}")),
            );
        }
    }
}

fn pending_payment_requires_program(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let policy = &config.policy;
    if record.has_identifier(&policy.program_identifier) {
        return;
    }
    for (field, tax) in tax_lines(record) {
        if let Some(fp) = paid_with(tax, &policy.pending_payment_forms) {
            findings.push(
                ValidationFinding::warning(
                    "pending_payment_requires_program",
                    &field,
                    format!(
                        "Payment form {fp} defers payment but no {} program identifier is declared",
                        policy.program_identifier
                    ),
                )
                .with_expected(&policy.program_identifier),
            );
        }
    }
}

fn temporary_import_requires_program(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let policy = &config.policy;
    let key = record.header.document_key.as_deref();
    if policy.is_temporary(key) && !record.has_identifier(&policy.program_identifier) {
        findings.push(
            ValidationFinding::warning(
                "temporary_import_requires_program",
                "Document Key",
                format!(
                    "Temporary document key without a {} program identifier",
                    policy.program_identifier
                ),
            )
            .with_expected(&policy.program_identifier)
            .with_actual(key.unwrap_or_default()),
        );
    }
}

fn document_key_requires_identifier(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let Some(key) = record.header.document_key.as_deref() else {
        return;
    };
    for requirement in &config.policy.document_key_identifiers {
        if requirement.document_key == key && !record.has_identifier(&requirement.identifier) {
            findings.push(
                ValidationFinding::warning(
                    "document_key_requires_identifier",
                    "Identifiers",
                    format!(
                        "Document key {key} requires identifier {}",
                        requirement.identifier
                    ),
                )
                .with_expected(&requirement.identifier),
            );
        }
    }
}

fn treaty_preference_requires_complement(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let treaty = &config.policy.treaty_identifier;
    for item in &record.items {
        if let Some(identifier) = item.identifier(treaty) {
            if identifier.complement1.is_none() {
                findings.push(ValidationFinding::warning(
                    "treaty_preference_requires_complement",
                    &item_field(item, "Identifiers"),
                    format!("Identifier {treaty} claims a preference without naming the treaty country"),
                ));
            }
        }
    }
}

fn treaty_origin_partner(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let policy = &config.policy;
    for item in &record.items {
        let Some(identifier) = item.identifier(&policy.treaty_identifier) else {
            continue;
        };
        let origin = item
            .origin_country
            .as_deref()
            .or(identifier.complement1.as_deref());
        if let Some(origin) = origin {
            if !policy.is_treaty_partner(origin) {
                findings.push(
                    ValidationFinding::warning(
                        "treaty_origin_partner",
                        &item_field(item, "Origin Country"),
                        format!("Treaty preference claimed for origin {origin}, which is not a treaty partner"),
                    )
                    .with_actual(origin),
                );
            }
        }
    }
}

fn sector_program_requires_complement(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let program = &config.policy.sector_program_identifier;
    for item in &record.items {
        if let Some(identifier) = item.identifier(program) {
            if identifier.complement1.is_none() {
                findings.push(ValidationFinding::warning(
                    "sector_program_requires_complement",
                    &item_field(item, "Identifiers"),
                    format!("Identifier {program} declared without its sector program number"),
                ));
            }
        }
    }
}

fn exclusive_identifiers(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    for item in &record.items {
        for pair in &config.policy.exclusive_identifiers {
            if item.has_identifier(&pair.first) && item.has_identifier(&pair.second) {
                findings.push(
                    ValidationFinding::error(
                        "exclusive_identifiers",
                        &item_field(item, "Identifiers"),
                        format!(
                            "Identifiers {} and {} cannot be declared together",
                            pair.first, pair.second
                        ),
                    )
                    .with_actual(format!("{} + {}", pair.first, pair.second)),
                );
            }
        }
    }
}

fn has_permit(item: &LineItem, permits: &[String]) -> bool {
    item.regulations.iter().any(|r| contains(permits, &r.code))
}

fn identifier_requires_permit(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    for item in &record.items {
        for requirement in &config.policy.identifier_permits {
            if item.has_identifier(&requirement.identifier)
                && !has_permit(item, &requirement.permits)
            {
                findings.push(
                    ValidationFinding::warning(
                        "identifier_requires_permit",
                        &item_field(item, "Permits"),
                        format!(
                            "Identifier {} requires permit {}",
                            requirement.identifier,
                            requirement.permits.join(" or ")
                        ),
                    )
                    .with_expected(requirement.permits.join("|")),
                );
            }
        }
    }
}

fn sensitive_chapter_requires_permit(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    for item in &record.items {
        let Some(chapter) = item.chapter() else {
            continue;
        };
        let requirement = config
            .policy
            .permit_chapters
            .iter()
            .find(|r| r.chapter == chapter);
        if let Some(requirement) = requirement {
            if item.regulations.is_empty() {
                findings.push(
                    ValidationFinding::warning(
                        "sensitive_chapter_requires_permit",
                        &item_field(item, "Permits"),
                        format!(
                            "Chapter {chapter} goods usually need a permit ({}) but none is declared",
                            requirement.authority
                        ),
                    )
                    .with_actual(item.fraccion.as_deref().unwrap_or_default()),
                );
            }
        }
    }
}

fn sector_registry_chapter(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    if !record.is_import() {
        return;
    }
    for item in &record.items {
        if let Some(chapter) = item.chapter() {
            if contains(&config.policy.sector_registry_chapters, chapter) {
                findings.push(ValidationFinding::info(
                    "sector_registry_chapter",
                    &item_field(item, "Fraccion"),
                    format!("Chapter {chapter} imports may require the sector importer registry"),
                ));
            }
        }
    }
}

fn countervailing_duty_origin(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let policy = &config.policy;
    if !record.is_import() {
        return;
    }
    for item in &record.items {
        let (Some(origin), Some(chapter)) = (item.origin_country.as_deref(), item.chapter()) else {
            continue;
        };
        if contains(&policy.countervailing_origins, origin)
            && contains(&policy.countervailing_chapters, chapter)
            && item.tax(&policy.countervailing_tax_code).is_none()
        {
            findings.push(
                ValidationFinding::info(
                    "countervailing_duty_origin",
                    &item_field(item, "Taxes"),
                    format!(
                        "Chapter {chapter} goods from {origin} may be subject to countervailing duties; no {} line declared",
                        policy.countervailing_tax_code
                    ),
                )
                .with_expected(&policy.countervailing_tax_code),
            );
        }
    }
}

fn export_with_iva(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    if !record.is_export() {
        return;
    }
    for (field, tax) in tax_lines(record) {
        if tax.code == "IVA" && positive(tax.amount) {
            findings.push(
                ValidationFinding::warning(
                    "export_with_iva",
                    &field,
                    "Exports are not expected to pay IVA",
                )
                .with_expected(money(0.0))
                .with_actual(money(tax.amount.unwrap_or_default())),
            );
        }
    }
}

fn program_cash_vat(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let policy = &config.policy;
    if !record.has_identifier(&policy.program_identifier) {
        return;
    }
    for item in &record.items {
        if let Some(tax) = item.tax("IVA") {
            if policy.is_cash(tax.payment_form.as_deref()) && positive(tax.amount) {
                findings.push(ValidationFinding::info(
                    "program_cash_vat",
                    &item_field(item, "IVA"),
                    format!(
                        "IVA paid in cash although a {} program is declared",
                        policy.program_identifier
                    ),
                ));
            }
        }
    }
}

fn temporary_import_cash_duty(
    record: &PedimentoRecord,
    config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    let policy = &config.policy;
    if !policy.is_temporary(record.header.document_key.as_deref()) {
        return;
    }
    for item in &record.items {
        if let Some(tax) = item.tax("IGI") {
            if policy.is_cash(tax.payment_form.as_deref()) && positive(tax.amount) {
                findings.push(ValidationFinding::info(
                    "temporary_import_cash_duty",
                    &item_field(item, "IGI"),
                    "IGI paid in cash on a temporary import",
                ));
            }
        }
    }
}

fn related_party_transaction_value(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    for item in &record.items {
        let related = matches!(item.related_party.as_deref(), Some("1" | "SI" | "S"));
        if related && item.valuation_method.as_deref() == Some("1") {
            findings.push(ValidationFinding::info(
                "related_party_transaction_value",
                &item_field(item, "Valuation Method"),
                "Transaction value used between related parties; the price must not be influenced by the relationship",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ComplianceRule;
    use crate::types::{Identifier, Regulation, Severity};

    fn run(record: &PedimentoRecord) -> Vec<ValidationFinding> {
        let config = ValidationConfig::default();
        let mut findings = Vec::new();
        for rule in RULES {
            rule.evaluate(record, &config, &mut findings);
        }
        findings
    }

    fn identifier(code: &str, complement: Option<&str>) -> Identifier {
        Identifier {
            code: code.to_string(),
            complement1: complement.map(str::to_string),
            ..Default::default()
        }
    }

    fn tax(code: &str, fp: &str, amount: f64) -> Tax {
        Tax {
            code: code.to_string(),
            payment_form: Some(fp.to_string()),
            amount: Some(amount),
            ..Default::default()
        }
    }

    fn import() -> PedimentoRecord {
        let mut record = PedimentoRecord::default();
        record.header.operation_type = Some("IMP".to_string());
        record.header.document_key = Some("A1".to_string());
        record
    }

    #[test]
    fn vat_credit_without_certification_is_an_error() {
        let mut record = import();
        let mut item = LineItem::new(1);
        item.taxes.push(tax("IVA", "21", 1_600.0));
        record.items.push(item);

        let findings = run(&record);
        let finding = findings
            .iter()
            .find(|f| f.rule == "vat_credit_requires_certification")
            .unwrap();
        assert_eq!(finding.severity, Severity::Error);
        assert_eq!(finding.field, "Item 1 IVA");

        record.header.identifiers.push(identifier("IC", Some("O")));
        assert!(run(&record)
            .iter()
            .all(|f| f.rule != "vat_credit_requires_certification"));
    }

    #[test]
    fn treaty_and_sector_program_are_exclusive() {
        let mut record = import();
        let mut item = LineItem::new(1);
        item.origin_country = Some("USA".to_string());
        item.identifiers.push(identifier("TL", Some("USA")));
        item.identifiers.push(identifier("PS", Some("P-123")));
        record.items.push(item);

        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "exclusive_identifiers");
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn treaty_claim_from_non_partner_warns() {
        let mut record = import();
        let mut item = LineItem::new(1);
        item.origin_country = Some("CHN".to_string());
        item.identifiers.push(identifier("TL", Some("USA")));
        record.items.push(item);

        let rules: Vec<String> = run(&record).into_iter().map(|f| f.rule).collect();
        assert_eq!(rules, vec!["treaty_origin_partner"]);
    }

    #[test]
    fn identifier_permit_is_satisfied_by_any_listed_permit() {
        let mut record = import();
        let mut item = LineItem::new(1);
        item.identifiers.push(identifier("CI", None));
        record.items.push(item);
        assert!(run(&record)
            .iter()
            .any(|f| f.rule == "identifier_requires_permit"));

        record.items[0].regulations.push(Regulation {
            code: "CP".to_string(),
            permit: Some("ABC123".to_string()),
        });
        assert!(run(&record)
            .iter()
            .all(|f| f.rule != "identifier_requires_permit"));
    }

    #[test]
    fn countervailing_origin_without_cc_line_is_info() {
        let mut record = import();
        let mut item = LineItem::new(1);
        item.fraccion = Some("73181599".to_string());
        item.origin_country = Some("CHN".to_string());
        record.items.push(item);

        let findings = run(&record);
        let cc = findings
            .iter()
            .find(|f| f.rule == "countervailing_duty_origin")
            .unwrap();
        assert_eq!(cc.severity, Severity::Info);
        assert!(findings.iter().any(|f| f.rule == "sector_registry_chapter"));
        assert!(findings.iter().all(|f| f.severity == Severity::Info));
    }

    #[test]
    fn temporary_key_needs_program_identifier() {
        let mut record = import();
        record.header.document_key = Some("IN".to_string());
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "temporary_import_requires_program");

        record.header.identifiers.push(identifier("IM", Some("123-2020")));
        assert!(run(&record).is_empty());
    }

    #[test]
    fn export_paying_iva_warns() {
        let mut record = PedimentoRecord::default();
        record.header.operation_type = Some("EXP".to_string());
        record.header.taxes.push(tax("IVA", "0", 500.0));
        let findings = run(&record);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].field, "Liquidation IVA");
    }

    fn fired(record: &PedimentoRecord, rule: &str) -> Vec<ValidationFinding> {
        run(record).into_iter().filter(|f| f.rule == rule).collect()
    }

    fn item_with_tax(code: &str, fp: &str, amount: f64) -> LineItem {
        let mut item = LineItem::new(1);
        item.taxes.push(tax(code, fp, amount));
        item
    }

    #[test]
    fn deferred_payment_needs_program() {
        let mut record = import();
        record.items.push(item_with_tax("IVA", "6", 1_600.0));
        let findings = fired(&record, "pending_payment_requires_program");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].expected.as_deref(), Some("IM"));

        record.header.identifiers.push(identifier("IM", Some("123-2020")));
        assert!(fired(&record, "pending_payment_requires_program").is_empty());
    }

    #[test]
    fn document_key_needs_its_identifier() {
        let mut record = import();
        record.header.document_key = Some("V1".to_string());
        let findings = fired(&record, "document_key_requires_identifier");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].field, "Identifiers");
        assert_eq!(findings[0].expected.as_deref(), Some("V1"));

        record.header.identifiers.push(identifier("V1", Some("ABC010203XY4")));
        assert!(fired(&record, "document_key_requires_identifier").is_empty());
    }

    #[test]
    fn treaty_identifier_needs_country_complement() {
        let mut record = import();
        let mut item = LineItem::new(1);
        item.origin_country = Some("USA".to_string());
        item.identifiers.push(identifier("TL", None));
        record.items.push(item);
        let findings = fired(&record, "treaty_preference_requires_complement");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].field, "Item 1 Identifiers");

        record.items[0].identifiers[0].complement1 = Some("USA".to_string());
        assert!(fired(&record, "treaty_preference_requires_complement").is_empty());
    }

    #[test]
    fn sector_program_needs_program_number() {
        let mut record = import();
        let mut item = LineItem::new(1);
        item.identifiers.push(identifier("PS", None));
        record.items.push(item);
        assert_eq!(fired(&record, "sector_program_requires_complement").len(), 1);

        record.items[0].identifiers[0].complement1 = Some("P-123".to_string());
        assert!(fired(&record, "sector_program_requires_complement").is_empty());
    }

    #[test]
    fn sensitive_chapter_without_permit_warns() {
        let mut record = import();
        let mut item = LineItem::new(1);
        item.fraccion = Some("30049099".to_string());
        record.items.push(item);
        let findings = fired(&record, "sensitive_chapter_requires_permit");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].actual.as_deref(), Some("30049099"));

        record.items[0].regulations.push(Regulation {
            code: "C1".to_string(),
            permit: Some("COF-2024-1".to_string()),
        });
        assert!(fired(&record, "sensitive_chapter_requires_permit").is_empty());
    }

    #[test]
    fn cash_vat_under_program_is_info() {
        let mut record = import();
        record.header.identifiers.push(identifier("IM", Some("123-2020")));
        record.items.push(item_with_tax("IVA", "0", 1_600.0));
        let findings = fired(&record, "program_cash_vat");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);

        record.items[0].taxes[0].amount = Some(0.0);
        assert!(fired(&record, "program_cash_vat").is_empty());
    }

    #[test]
    fn cash_duty_on_temporary_import_is_info() {
        let mut record = import();
        record.header.document_key = Some("IN".to_string());
        record.items.push(item_with_tax("IGI", "0", 300.0));
        let findings = fired(&record, "temporary_import_cash_duty");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].field, "Item 1 IGI");

        record.header.document_key = Some("A1".to_string());
        assert!(fired(&record, "temporary_import_cash_duty").is_empty());
    }

    #[test]
    fn related_party_with_transaction_value_is_info() {
        let mut record = import();
        let mut item = LineItem::new(1);
        item.related_party = Some("1".to_string());
        item.valuation_method = Some("1".to_string());
        record.items.push(item);
        let findings = fired(&record, "related_party_transaction_value");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);

        record.items[0].related_party = Some("0".to_string());
        assert!(fired(&record, "related_party_transaction_value").is_empty());
    }
}
