use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Top-level configuration for one extraction + validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub strategy: ExtractionStrategy,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    /// Pattern tables over the raw page text
    #[default]
    Deterministic,
    /// Chunked structured transcription through the injected collaborator
    Transcription,
    /// Transcription, with unknown fields filled from the deterministic pass
    Hybrid,
}

impl ExtractionStrategy {
    pub fn needs_transcriber(&self) -> bool {
        !matches!(self, ExtractionStrategy::Deterministic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::Deterministic => "deterministic",
            ExtractionStrategy::Transcription => "transcription",
            ExtractionStrategy::Hybrid => "hybrid",
        }
    }
}

impl FromStr for ExtractionStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "deterministic" => Ok(ExtractionStrategy::Deterministic),
            "transcription" => Ok(ExtractionStrategy::Transcription),
            "hybrid" => Ok(ExtractionStrategy::Hybrid),
            other => bail!(
                "Unknown strategy '{}'. Use: deterministic, transcription, hybrid",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Pages per transcription chunk (0 is treated as 1)
    pub pages_per_chunk: usize,
    /// Inserted between pages when a chunk or the full text is assembled
    pub page_separator: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            pages_per_chunk: 2,
            page_separator: "\n\u{c}\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Partida line anchor. Groups: sequence, fraction, sub-classification, rest of line.
    pub item_anchor_pattern: String,
    /// Tax codes recognized by the token scan
    pub tax_codes: Vec<String>,
    /// How many tokens after a tax code may hold its columns
    pub tax_lookahead: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            item_anchor_pattern:
                r"(?m)^[ \t]*(\d{1,4})[ \t]+(\d{4}\.?\d{2}\.?\d{2}|\d{6,10})[ \t]+(\d{1,3})\b([^\n]*)$"
                    .to_string(),
            tax_codes: strings(&["IGI", "IVA", "DTA", "IEPS", "ISAN", "CC", "ECI", "PRV", "REC"]),
            tax_lookahead: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Upper bound on in-flight collaborator calls
    pub max_concurrency: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// Exponential backoff for rate-limited collaborator calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Random extra delay, as a fraction of the computed delay
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 16_000,
            jitter_ratio: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Absolute tolerance for header vs item-sum value reconciliation
    pub value_tolerance: f64,
    /// Absolute tolerance for header vs item-sum tax totals
    pub tax_total_tolerance: f64,
    /// Percentage tolerance for rate plausibility checks
    pub rate_tolerance_pct: f64,
    /// Rules or rule categories to run, in order
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub policy: CompliancePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule name (`fraccion_format`) or category name (`Format`)
    pub name: String,
    /// Whether this rule is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RuleConfig {
    pub fn enabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
        }
    }
}

fn default_rules() -> Vec<RuleConfig> {
    ["Structural", "Format", "Reconciliation", "Regime", "Rates"]
        .iter()
        .map(|name| RuleConfig::enabled(name))
        .collect()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            value_tolerance: 5.0,
            tax_total_tolerance: 5.0,
            rate_tolerance_pct: 2.0,
            rules: default_rules(),
            policy: CompliancePolicy::default(),
        }
    }
}

// ===== COMPLIANCE POLICY =====

/// Regulatory data the rules read: codes, rates, country and chapter lists.
/// Versioned so a report can name the policy it was checked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompliancePolicy {
    pub version: String,

    pub standard_iva_rate: f64,
    pub alternate_iva_rate: f64,
    /// DTA per-thousand rate applied to the customs value
    pub dta_rate: f64,
    /// Fixed-fee DTA amount used for preferential and temporary operations
    pub dta_fixed_fee: f64,

    pub cash_payment_forms: Vec<String>,
    /// Payment forms that take VAT/IEPS credit and need certification
    pub vat_credit_payment_forms: Vec<String>,
    pub certification_identifier: String,
    /// Payment forms deferring contributions under a program
    pub pending_payment_forms: Vec<String>,
    pub program_identifier: String,

    pub temporary_document_keys: Vec<String>,
    pub simplified_document_keys: Vec<String>,
    pub rectification_document_keys: Vec<String>,
    pub document_key_identifiers: Vec<DocumentKeyRequirement>,

    pub treaty_identifier: String,
    pub treaty_partners: Vec<String>,
    pub sector_program_identifier: String,
    pub exclusive_identifiers: Vec<IdentifierPair>,
    pub identifier_permits: Vec<IdentifierPermitRequirement>,

    pub permit_chapters: Vec<ChapterRequirement>,
    pub sector_registry_chapters: Vec<String>,
    pub countervailing_origins: Vec<String>,
    pub countervailing_chapters: Vec<String>,
    pub countervailing_tax_code: String,

    /// Days allowed between entry and payment dates
    pub max_entry_payment_gap_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentKeyRequirement {
    pub document_key: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierPair {
    pub first: String,
    pub second: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierPermitRequirement {
    pub identifier: String,
    /// Any of these permit codes satisfies the requirement
    pub permits: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRequirement {
    pub chapter: String,
    pub authority: String,
}

impl CompliancePolicy {
    pub fn is_cash(&self, payment_form: Option<&str>) -> bool {
        payment_form.is_some_and(|fp| self.cash_payment_forms.iter().any(|c| c == fp))
    }

    pub fn is_temporary(&self, document_key: Option<&str>) -> bool {
        document_key.is_some_and(|k| self.temporary_document_keys.iter().any(|t| t == k))
    }

    pub fn is_treaty_partner(&self, country: &str) -> bool {
        self.treaty_partners.iter().any(|p| p == country)
    }
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        let textile_chapters: Vec<String> = (50..=64).map(|c| c.to_string()).collect();
        let mut sector_registry_chapters = textile_chapters;
        sector_registry_chapters.extend(strings(&["72", "73"]));

        Self {
            version: "2024.1".to_string(),
            standard_iva_rate: 16.0,
            alternate_iva_rate: 8.0,
            dta_rate: 0.008,
            dta_fixed_fee: 408.0,
            cash_payment_forms: strings(&["0"]),
            vat_credit_payment_forms: strings(&["21"]),
            certification_identifier: "IC".to_string(),
            pending_payment_forms: strings(&["6"]),
            program_identifier: "IM".to_string(),
            temporary_document_keys: strings(&["IN", "AF", "BM", "ITE", "ITR", "RT"]),
            simplified_document_keys: strings(&["T1", "T3", "T6", "T7", "T9"]),
            rectification_document_keys: strings(&["R1", "R2"]),
            document_key_identifiers: vec![
                DocumentKeyRequirement {
                    document_key: "V1".to_string(),
                    identifier: "V1".to_string(),
                },
                DocumentKeyRequirement {
                    document_key: "V5".to_string(),
                    identifier: "V5".to_string(),
                },
            ],
            treaty_identifier: "TL".to_string(),
            treaty_partners: strings(&[
                "USA", "CAN", "CHL", "COL", "PER", "JPN", "ISR", "URY", "BOL", "PAN", "CRI",
                "SLV", "GTM", "HND", "NIC", "NOR", "ISL", "CHE", "LIE", "GBR", "AUS", "NZL",
                "SGP", "VNM", "MYS", "BRN", "DEU", "FRA", "ITA", "ESP", "NLD", "BEL", "PRT",
                "AUT", "IRL", "SWE", "FIN", "DNK", "POL", "CZE", "HUN", "GRC", "ROU", "BGR",
                "SVK", "SVN", "HRV", "LTU", "LVA", "EST", "LUX", "MLT", "CYP",
            ]),
            sector_program_identifier: "PS".to_string(),
            exclusive_identifiers: vec![IdentifierPair {
                first: "TL".to_string(),
                second: "PS".to_string(),
            }],
            identifier_permits: vec![
                IdentifierPermitRequirement {
                    identifier: "EN".to_string(),
                    permits: strings(&["NM"]),
                },
                IdentifierPermitRequirement {
                    identifier: "CI".to_string(),
                    permits: strings(&["C1", "CP"]),
                },
            ],
            permit_chapters: vec![
                ChapterRequirement {
                    chapter: "28".to_string(),
                    authority: "SEMARNAT/COFEPRIS precursors".to_string(),
                },
                ChapterRequirement {
                    chapter: "29".to_string(),
                    authority: "COFEPRIS precursors".to_string(),
                },
                ChapterRequirement {
                    chapter: "30".to_string(),
                    authority: "COFEPRIS pharmaceuticals".to_string(),
                },
                ChapterRequirement {
                    chapter: "36".to_string(),
                    authority: "SEDENA explosives".to_string(),
                },
                ChapterRequirement {
                    chapter: "93".to_string(),
                    authority: "SEDENA arms".to_string(),
                },
            ],
            sector_registry_chapters,
            countervailing_origins: strings(&["CHN"]),
            countervailing_chapters: strings(&["64", "72", "73"]),
            countervailing_tax_code: "CC".to_string(),
            max_entry_payment_gap_days: 30,
        }
    }
}

impl PipelineConfig {
    /// Load config from file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                warn!(path = p, error = %e, "failed to load config, using defaults");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Rejects values no run can work with.
    pub fn validate(&self) -> Result<()> {
        if self.transcription.retry.max_attempts == 0 {
            bail!("transcription.retry.max_attempts must be at least 1");
        }
        if self.validation.value_tolerance < 0.0 || self.validation.tax_total_tolerance < 0.0 {
            bail!("validation tolerances must not be negative");
        }
        if self.extraction.item_anchor_pattern.trim().is_empty() {
            bail!("extraction.item_anchor_pattern must not be empty");
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: ExtractionStrategy::default(),
            chunking: ChunkingConfig::default(),
            extraction: ExtractionConfig::default(),
            transcription: TranscriptionConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}
