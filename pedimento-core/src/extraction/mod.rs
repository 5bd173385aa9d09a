pub mod fields;
pub mod items;
pub mod taxes;

pub use fields::HeaderPatterns;
pub use items::{ItemScan, ItemScanner};
pub use taxes::TaxScanner;

use crate::config::ExtractionConfig;
use crate::error::PipelineError;
use crate::raw::RawFragment;
use tracing::debug;

/// Deterministic, pattern-table extraction over raw page text.
pub struct FieldExtractor {
    header: HeaderPatterns,
    items: ItemScanner,
    liquidation_marker: regex::Regex,
    taxes: TaxScanner,
}

impl FieldExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            header: HeaderPatterns::new()?,
            items: ItemScanner::new(config)?,
            liquidation_marker: fields::compile(r"CUADRO[ \t]*DE[ \t]*LIQUIDACI[OÓ]N")?,
            taxes: TaxScanner::new(&config.tax_codes, config.tax_lookahead),
        })
    }

    /// Extract a raw fragment from the full document text.
    ///
    /// Document-level lists (identifiers, global taxes) are read only from
    /// the text before the first item anchor.
    pub fn extract(&self, source: &str) -> RawFragment {
        let scan = self.items.scan(source);
        let preamble = &source[..scan.first_anchor.unwrap_or(source.len())];

        let mut header = self.header.extract_header(source);
        let liquidation = self
            .liquidation_marker
            .find(preamble)
            .map_or(preamble, |m| &preamble[m.end()..]);
        header.contribuciones = self.taxes.scan(liquidation);

        let fragment = RawFragment {
            header: Some(header),
            partidas: scan.partidas,
            facturas: self.header.extract_invoices(source),
            contenedores: self.header.extract_containers(source),
            identificadores: self.header.extract_identifiers(preamble),
            raw_text: Some(source.to_string()),
        };

        debug!(
            items = fragment.partidas.len(),
            invoices = fragment.facturas.len(),
            containers = fragment.contenedores.len(),
            "deterministic extraction finished"
        );
        fragment
    }
}
