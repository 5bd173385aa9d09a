use crate::config::CompliancePolicy;
use crate::types::{DocumentKind, PedimentoRecord};
use tracing::info;

pub struct DocumentClassifier {
    simplified_keys: Vec<String>,
    rectification_keys: Vec<String>,
}

impl Default for DocumentClassifier {
    fn default() -> Self {
        Self::new(&CompliancePolicy::default())
    }
}

impl DocumentClassifier {
    pub fn new(policy: &CompliancePolicy) -> Self {
        Self {
            simplified_keys: policy.simplified_document_keys.clone(),
            rectification_keys: policy.rectification_document_keys.clone(),
        }
    }

    /// Decide the document kind from its key, falling back to the printed title.
    pub fn classify(&self, record: &PedimentoRecord) -> DocumentKind {
        let key = record.header.document_key.as_deref();
        let text = record.raw_text.to_uppercase();

        let kind = if self.is_simplified(key, &text) {
            DocumentKind::Simplified
        } else if self.is_rectification(key, &text) {
            DocumentKind::Rectification
        } else if key.is_some() || !record.items.is_empty() {
            DocumentKind::Normal
        } else {
            DocumentKind::Unknown
        };

        info!(kind = ?kind, document_key = key.unwrap_or("-"), "classified document");
        kind
    }

    fn is_simplified(&self, key: Option<&str>, text: &str) -> bool {
        key.is_some_and(|k| self.simplified_keys.iter().any(|s| s == k))
            || text.contains("PEDIMENTO SIMPLIFICADO")
    }

    fn is_rectification(&self, key: Option<&str>, text: &str) -> bool {
        key.is_some_and(|k| self.rectification_keys.iter().any(|r| r == k))
            || text.contains("RECTIFICACION")
            || text.contains("RECTIFICACIÓN")
    }
}
