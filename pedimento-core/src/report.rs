use crate::config::{ExtractionStrategy, PipelineConfig};
use crate::transcription::ChunkOutcome;
use crate::types::{DocumentKind, Identifier, PedimentoRecord, Severity, ValidationFinding};
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Digest of the page text a record was extracted from.
pub fn calculate_source_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Digest of the configuration a run used.
pub fn calculate_config_hash<T: Serialize>(config: &T) -> Result<String> {
    let config_json = serde_json::to_string(config)
        .map_err(|e| anyhow!("Failed to serialize config for hashing: {}", e))?;

    let mut hasher = Sha256::new();
    hasher.update(config_json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Everything one pipeline run produced, with enough provenance to
/// reproduce it.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub strategy: ExtractionStrategy,
    pub source_digest: String,
    pub config_digest: String,
    pub policy_version: String,
    /// Empty for deterministic runs
    pub chunks: Vec<ChunkOutcome>,
    pub record: PedimentoRecord,
}

impl ExtractionReport {
    pub fn new(
        config: &PipelineConfig,
        source_text: &str,
        chunks: Vec<ChunkOutcome>,
        record: PedimentoRecord,
    ) -> Result<Self> {
        Ok(Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            strategy: config.strategy,
            source_digest: calculate_source_hash(source_text),
            config_digest: calculate_config_hash(config)?,
            policy_version: config.validation.policy.version.clone(),
            chunks,
            record,
        })
    }

    pub fn summary(&self) -> ReportSummary {
        let record = &self.record;
        ReportSummary {
            run_id: self.run_id,
            pedimento_no: record.header.pedimento_no().map(str::to_string),
            kind: record.kind,
            document_key: record.header.document_key.clone(),
            importer_rfc: record.header.importer_rfc.clone(),
            items: record.items.len(),
            errors: record.count_findings(Severity::Error),
            warnings: record.count_findings(Severity::Warning),
            infos: record.count_findings(Severity::Info),
            failed_chunks: self.chunks.iter().filter(|c| c.is_failed()).count(),
            identifiers: record.header.identifiers.clone(),
            policy_version: self.policy_version.clone(),
        }
    }

    pub fn findings(&self) -> &[ValidationFinding] {
        &self.record.findings
    }

    /// Render in one of the output formats: `report`, `record`, `findings`, `summary`.
    pub fn render(&self, format: &str) -> Result<String> {
        let json = match format {
            "report" => serde_json::to_string_pretty(self)?,
            "record" => serde_json::to_string_pretty(&self.record)?,
            "findings" => serde_json::to_string_pretty(self.findings())?,
            "summary" => serde_json::to_string_pretty(&self.summary())?,
            other => bail!(
                "Unknown output format '{}'. Use: report, record, findings, summary",
                other
            ),
        };
        Ok(json)
    }

    pub fn save_with_format(&self, path: &str, format: &str) -> Result<()> {
        let json = self.render(format)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub run_id: Uuid,
    pub pedimento_no: Option<String>,
    pub kind: DocumentKind,
    pub document_key: Option<String>,
    pub importer_rfc: Option<String>,
    pub items: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub failed_chunks: usize,
    pub identifiers: Vec<Identifier>,
    pub policy_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ExtractionReport {
        let mut record = PedimentoRecord::default();
        record.findings.push(ValidationFinding::error("items_present", "Items", "No items extracted"));
        record.findings.push(ValidationFinding::info("dta_plausibility", "Liquidation DTA", "fixed fee"));
        ExtractionReport::new(&PipelineConfig::default(), "page one", Vec::new(), record).unwrap()
    }

    #[test]
    fn digests_are_stable() {
        assert_eq!(calculate_source_hash("abc"), calculate_source_hash("abc"));
        assert_ne!(calculate_source_hash("abc"), calculate_source_hash("abd"));
        let config = PipelineConfig::default();
        assert_eq!(
            calculate_config_hash(&config).unwrap(),
            calculate_config_hash(&config).unwrap()
        );
        assert_eq!(report().source_digest.len(), 64);
    }

    #[test]
    fn summary_counts_by_severity() {
        let summary = report().summary();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.warnings, 0);
        assert_eq!(summary.infos, 1);
        assert_eq!(summary.policy_version, "2024.1");
    }

    #[test]
    fn saves_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let report = report();
        for format in ["report", "record", "findings", "summary"] {
            let path = dir.path().join(format!("{format}.json"));
            report
                .save_with_format(path.to_str().unwrap(), format)
                .unwrap();
            let value: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
            assert!(!value.is_null());
        }
        assert!(report.render("graph").is_err());
    }
}
