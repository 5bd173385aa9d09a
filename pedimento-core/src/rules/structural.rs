use super::engine::{FnRule, RuleCategory};
use crate::config::ValidationConfig;
use crate::types::{DocumentKind, PedimentoRecord, ValidationFinding};

const CATEGORY: RuleCategory = RuleCategory::Structural;

pub const RULES: &[FnRule] = &[
    FnRule::new("items_present", CATEGORY, items_present),
    FnRule::new("importer_rfc_present", CATEGORY, importer_rfc_present),
    FnRule::new("pedimento_number_present", CATEGORY, pedimento_number_present),
    FnRule::new("document_key_present", CATEGORY, document_key_present),
    FnRule::new("exchange_rate_present", CATEGORY, exchange_rate_present),
    FnRule::new("chunk_coverage", CATEGORY, chunk_coverage),
];

/// Simplified pedimentos legitimately carry no partidas.
fn items_present(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    if !record.items.is_empty() {
        return;
    }
    let finding = if record.kind == DocumentKind::Simplified {
        ValidationFinding::info(
            "items_present",
            "Items",
            "No items extracted from a simplified pedimento",
        )
    } else {
        ValidationFinding::error("items_present", "Items", "No items extracted")
    };
    findings.push(finding.with_actual(0));
}

fn importer_rfc_present(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    if record.header.importer_rfc.is_none() {
        findings.push(ValidationFinding::error(
            "importer_rfc_present",
            "RFC",
            "Importer RFC missing",
        ));
    }
}

fn pedimento_number_present(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    if record.header.pedimento_no().is_none() {
        findings.push(ValidationFinding::error(
            "pedimento_number_present",
            "Pedimento No",
            "Pedimento number missing",
        ));
    }
}

fn document_key_present(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    if record.header.document_key.is_none() {
        findings.push(ValidationFinding::warning(
            "document_key_present",
            "Document Key",
            "Clave de pedimento missing",
        ));
    }
}

fn exchange_rate_present(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    match record.header.exchange_rate {
        Some(rate) if rate > 0.0 => {}
        Some(rate) => findings.push(
            ValidationFinding::warning(
                "exchange_rate_present",
                "Exchange Rate",
                "Exchange rate must be positive",
            )
            .with_actual(rate),
        ),
        None => findings.push(ValidationFinding::warning(
            "exchange_rate_present",
            "Exchange Rate",
            "Exchange rate missing",
        )),
    }
}

fn chunk_coverage(
    record: &PedimentoRecord,
    _config: &ValidationConfig,
    findings: &mut Vec<ValidationFinding>,
) {
    for gap in &record.unreadable_chunks {
        findings.push(
            ValidationFinding::warning(
                "chunk_coverage",
                "Pages",
                format!(
                    "Pages {}-{} could not be transcribed; their items may be missing",
                    gap.start_page + 1,
                    gap.end_page
                ),
            )
            .with_actual(&gap.reason),
        );
    }
}
