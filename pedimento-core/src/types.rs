use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ===== FINDINGS =====

/// Severity of a compliance observation. Ordered from most to least severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A severity-tagged domain observation. Not a software error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidationFinding {
    pub severity: Severity,
    /// Name of the rule that produced this finding
    pub rule: String,
    pub field: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub message: String,
}

impl ValidationFinding {
    pub fn new(severity: Severity, rule: &str, field: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            rule: rule.to_string(),
            field: field.to_string(),
            expected: None,
            actual: None,
            message: message.into(),
        }
    }

    pub fn error(rule: &str, field: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, rule, field, message)
    }

    pub fn warning(rule: &str, field: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, rule, field, message)
    }

    pub fn info(rule: &str, field: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, rule, field, message)
    }

    pub fn with_expected(mut self, expected: impl ToString) -> Self {
        self.expected = Some(expected.to_string());
        self
    }

    pub fn with_actual(mut self, actual: impl ToString) -> Self {
        self.actual = Some(actual.to_string());
        self
    }
}

// ===== LINE ITEM COMPONENTS =====

/// A contribution line (IGI, IVA, DTA, ...) at item or document level.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Tax {
    pub code: String,
    /// Rate as printed on the document (percent for IGI/IVA)
    pub rate: Option<f64>,
    /// Rate type column (T.T.)
    pub rate_type: Option<String>,
    /// Payment form column (F.P.)
    pub payment_form: Option<String>,
    /// `None` means unknown; `Some(0.0)` is a valid paid amount
    pub amount: Option<f64>,
}

/// Coded annotation signalling a legal treatment (certification, treaty claim, program...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub code: String,
    pub complement1: Option<String>,
    pub complement2: Option<String>,
    pub complement3: Option<String>,
}

/// Non-tariff regulation or permit declared for an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Regulation {
    pub code: String,
    pub permit: Option<String>,
}

// ===== HEADER SUB-RECORDS =====

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transport {
    /// Transport mode code (entry/exit)
    pub mode: Option<String>,
    pub identification: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Container {
    pub number: String,
    pub container_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub number: String,
    pub date: Option<NaiveDate>,
    pub incoterm: Option<String>,
    pub currency: Option<String>,
    pub foreign_value: Option<f64>,
    pub dollar_value: Option<f64>,
    pub supplier_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Supplier {
    pub tax_id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub related_party: Option<String>,
}

// ===== HEADER =====

/// Document-level data. Singleton per record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Header {
    pub(crate) pedimento_no: Option<String>,
    /// IMP or EXP
    pub operation_type: Option<String>,
    /// Clave de pedimento (A1, IN, V1, ...)
    pub document_key: Option<String>,
    pub regime: Option<String>,
    pub importer_rfc: Option<String>,
    pub importer_curp: Option<String>,
    pub importer_name: Option<String>,
    pub customs_office: Option<String>,
    pub exchange_rate: Option<f64>,
    pub gross_weight: Option<f64>,
    pub entry_date: Option<NaiveDate>,
    pub payment_date: Option<NaiveDate>,
    pub dollar_value: Option<f64>,
    pub customs_value: Option<f64>,
    /// Precio pagado / valor comercial
    pub commercial_value: Option<f64>,
    pub total_cash: Option<f64>,
    pub total: Option<f64>,
    /// Cuadro de liquidación
    pub taxes: Vec<Tax>,
    pub identifiers: Vec<Identifier>,
    pub transport: Transport,
    pub containers: Vec<Container>,
    pub invoices: Vec<Invoice>,
    pub supplier: Supplier,
}

impl Header {
    pub fn pedimento_no(&self) -> Option<&str> {
        self.pedimento_no.as_deref()
    }

    /// Sets the pedimento number unless one is already present.
    /// Returns whether the value was taken.
    pub fn set_pedimento_no(&mut self, value: impl Into<String>) -> bool {
        if self.pedimento_no.is_some() {
            return false;
        }
        self.pedimento_no = Some(value.into());
        true
    }

    pub fn supplier_name(&self) -> Option<&str> {
        self.supplier.name.as_deref()
    }

    pub fn supplier_tax_id(&self) -> Option<&str> {
        self.supplier.tax_id.as_deref()
    }

    pub fn transport_id(&self) -> Option<&str> {
        self.transport.identification.as_deref()
    }

    pub fn container_numbers(&self) -> Vec<&str> {
        self.containers.iter().map(|c| c.number.as_str()).collect()
    }

    pub fn tax(&self, code: &str) -> Option<&Tax> {
        self.taxes.iter().find(|t| t.code == code)
    }

    pub fn has_identifier(&self, code: &str) -> bool {
        self.identifiers.iter().any(|i| i.code == code)
    }
}

// ===== LINE ITEM =====

/// One declared merchandise line (partida).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    /// Unique within a record
    pub secuencia: u32,
    /// Fracción arancelaria, digits only
    pub fraccion: Option<String>,
    /// Sub-classification (NICO)
    pub nico: Option<String>,
    pub description: Option<String>,
    pub related_party: Option<String>,
    pub valuation_method: Option<String>,
    pub umc: Option<String>,
    pub umc_quantity: Option<f64>,
    pub umt: Option<String>,
    pub umt_quantity: Option<f64>,
    pub seller_country: Option<String>,
    pub origin_country: Option<String>,
    pub customs_value: Option<f64>,
    /// Importe precio pagado
    pub commercial_value: Option<f64>,
    pub unit_price: Option<f64>,
    pub added_value: Option<f64>,
    pub taxes: Vec<Tax>,
    pub identifiers: Vec<Identifier>,
    pub regulations: Vec<Regulation>,
    pub observations: Option<String>,
}

impl LineItem {
    pub fn new(secuencia: u32) -> Self {
        Self {
            secuencia,
            ..Default::default()
        }
    }

    pub fn tax(&self, code: &str) -> Option<&Tax> {
        self.taxes.iter().find(|t| t.code == code)
    }

    pub fn identifier(&self, code: &str) -> Option<&Identifier> {
        self.identifiers.iter().find(|i| i.code == code)
    }

    pub fn has_identifier(&self, code: &str) -> bool {
        self.identifier(code).is_some()
    }

    /// Tariff chapter: the first two digits of the fraction
    pub fn chapter(&self) -> Option<&str> {
        self.fraccion
            .as_deref()
            .filter(|f| f.len() >= 2 && f.is_char_boundary(2))
            .map(|f| &f[..2])
    }
}

// ===== RECORD =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DocumentKind {
    Normal,
    Simplified,
    Rectification,
    #[default]
    Unknown,
}

/// A page range that could not be transcribed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkGap {
    pub chunk: usize,
    /// First page, 0-indexed
    pub start_page: usize,
    /// One past the last page
    pub end_page: usize,
    pub reason: String,
}

/// Root aggregate, owned by one pipeline invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PedimentoRecord {
    pub kind: DocumentKind,
    pub header: Header,
    pub items: Vec<LineItem>,
    pub raw_text: String,
    pub unreadable_chunks: Vec<ChunkGap>,
    pub findings: Vec<ValidationFinding>,
}

impl PedimentoRecord {
    /// Header and item identifiers, header first.
    pub fn all_identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.header
            .identifiers
            .iter()
            .chain(self.items.iter().flat_map(|item| item.identifiers.iter()))
    }

    pub fn has_identifier(&self, code: &str) -> bool {
        self.all_identifiers().any(|i| i.code == code)
    }

    pub fn item(&self, secuencia: u32) -> Option<&LineItem> {
        self.items.iter().find(|i| i.secuencia == secuencia)
    }

    /// Atomically replaces the findings list.
    pub fn replace_findings(&mut self, findings: Vec<ValidationFinding>) {
        self.findings = findings;
    }

    pub fn count_findings(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn is_import(&self) -> bool {
        self.header.operation_type.as_deref() == Some("IMP")
    }

    pub fn is_export(&self) -> bool {
        self.header.operation_type.as_deref() == Some("EXP")
    }
}
