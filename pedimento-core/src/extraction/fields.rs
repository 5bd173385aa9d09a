// Header field pattern tables.
//
// Each header field owns an ordered list of patterns: the most specific
// layout first, then looser fallbacks. Fields are resolved once; the first
// pattern that yields a value wins and later matches are never consulted.

use crate::error::PipelineError;
use crate::raw::{
    text, RawContainer, RawHeader, RawIdentifier, RawInvoice, RawScalar, RawSupplier,
    RawTransport,
};
use regex::{Captures, Regex};

pub type Extract = fn(&Captures<'_>) -> Option<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    PedimentoNo,
    OperationType,
    DocumentKey,
    Regime,
    Rfc,
    Curp,
    ImporterName,
    CustomsOffice,
    ExchangeRate,
    GrossWeight,
    EntryDate,
    PaymentDate,
    DollarValue,
    CustomsValue,
    CommercialValue,
    TotalCash,
    Total,
    TransportMode,
    TransportId,
    TransportCountry,
    SupplierTaxId,
    SupplierName,
    SupplierAddress,
    SupplierRelated,
}

const AMOUNT: &str = r"([\d,]+(?:\.\d+)?)";

const HEADER_PATTERNS: &[(HeaderField, &str, Extract)] = &[
    (
        HeaderField::PedimentoNo,
        r"NUM\.?\s*(?:DE\s*)?PEDIMENTO:?[ \t]*(\d{2}[ \t]+\d{2}[ \t]+\d{4}[ \t]+\d{7})\b",
        compact,
    ),
    (
        HeaderField::PedimentoNo,
        r"NUM\.?\s*(?:DE\s*)?PEDIMENTO:?[ \t]*(\d[\d \t]{8,22}\d)\b",
        compact,
    ),
    (HeaderField::PedimentoNo, r"\bPEDIMENTO[ \t]+(\d{15})\b", first),
    (
        HeaderField::OperationType,
        r"T\.?\s*OPER(?:ACION)?\.?:?[ \t]*(IMP|EXP|[12])\b",
        operation,
    ),
    (
        HeaderField::DocumentKey,
        r"CVE\.?\s*(?:DE\s*)?PEDIMENTO:?[ \t]*([A-Z0-9]{2})\b",
        first,
    ),
    (HeaderField::DocumentKey, r"\bCLAVE:?[ \t]*([A-Z][A-Z0-9])\b", first),
    (HeaderField::Regime, r"REGIMEN:?[ \t]*([A-Z]{3})\b", first),
    (
        HeaderField::Rfc,
        r"\bRFC:?[ \t]*([A-ZÑ&]{3,4}\d{6}[A-Z0-9]{3})\b",
        first,
    ),
    // Malformed RFCs are still captured so the format rule can flag them.
    (HeaderField::Rfc, r"\bRFC:?[ \t]*([A-Z0-9Ñ&]{10,14})\b", first),
    (HeaderField::Curp, r"\bCURP:?[ \t]*([A-Z]{4}\d{6}[A-Z0-9]{8})\b", first),
    (
        HeaderField::ImporterName,
        r"(?m)^[ \t]*NOMBRE,?[ \t]*DENOMINACI[OÓ]N[ \t]*O[ \t]*RAZ[OÓ]N[ \t]*SOCIAL:?[ \t]*([^\n]+?)[ \t]*$",
        first,
    ),
    (HeaderField::CustomsOffice, r"ADUANA[ \t]*E/S:?[ \t]*(\d{2,3})\b", first),
    (HeaderField::CustomsOffice, r"\bADUANA:?[ \t]*(\d{2,3})\b", first),
    (
        HeaderField::ExchangeRate,
        r"TIPO[ \t]*(?:DE[ \t]*)?CAMBIO:?[ \t]*(\d+(?:\.\d+)?)",
        first,
    ),
    (HeaderField::GrossWeight, r"PESO[ \t]*BRUTO:?[ \t]*([\d,]+(?:\.\d+)?)", first),
    (
        HeaderField::EntryDate,
        r"FECHA[ \t]*(?:DE[ \t]*)?ENTRADA:?[ \t]*(\d{2}/\d{2}/\d{4})",
        first,
    ),
    (HeaderField::EntryDate, r"(?m)^[ \t]*ENTRADA:[ \t]*(\d{2}/\d{2}/\d{4})", first),
    (
        HeaderField::PaymentDate,
        r"FECHA[ \t]*(?:DE[ \t]*)?PAGO:?[ \t]*(\d{2}/\d{2}/\d{4})",
        first,
    ),
    (HeaderField::PaymentDate, r"(?m)^[ \t]*PAGO:[ \t]*(\d{2}/\d{2}/\d{4})", first),
    (HeaderField::DollarValue, r"VALOR[ \t]*DOLARES:?[ \t]*([\d,]+(?:\.\d+)?)", first),
    (HeaderField::CustomsValue, r"VALOR[ \t]*ADUANA:?[ \t]*([\d,]+(?:\.\d+)?)", first),
    (
        HeaderField::CommercialValue,
        r"PRECIO[ \t]*PAGADO/VALOR[ \t]*COMERCIAL:?[ \t]*([\d,]+(?:\.\d+)?)",
        first,
    ),
    (
        HeaderField::CommercialValue,
        r"VALOR[ \t]*COMERCIAL:?[ \t]*([\d,]+(?:\.\d+)?)",
        first,
    ),
    (HeaderField::TotalCash, r"EFECTIVO:?[ \t]*([\d,]+(?:\.\d+)?)", first),
    (HeaderField::Total, r"\bTOTAL:[ \t]*([\d,]+(?:\.\d+)?)", first),
    (HeaderField::TransportMode, r"ENTRADA/SALIDA:?[ \t]*(\d{1,2})\b", first),
    (HeaderField::TransportId, r"\bIDENTIFICACION:?[ \t]*(\S+)", first),
    (
        HeaderField::TransportCountry,
        r"\bIDENTIFICACION:?[ \t]*\S+[ \t]+PAIS:?[ \t]*([A-Z]{3})\b",
        first,
    ),
    (HeaderField::SupplierTaxId, r"ID\.?[ \t]*FISCAL:?[ \t]*(\S+)", first),
    (
        HeaderField::SupplierName,
        r"(?m)ID\.?[ \t]*FISCAL:?[ \t]*\S+[ \t]+NOMBRE,?[ \t]*DENOMINACI[OÓ]N[ \t]*O[ \t]*RAZ[OÓ]N[ \t]*SOCIAL:?[ \t]*([^\n]+?)[ \t]*$",
        first,
    ),
    (HeaderField::SupplierName, r"(?m)\bPROVEEDOR:[ \t]*([^\n]+?)[ \t]*$", first),
    (
        HeaderField::SupplierAddress,
        r"(?m)DOMICILIO:?[ \t]*([^\n]+?)[ \t]{2,}VINCULACI[OÓ]N",
        first,
    ),
    (HeaderField::SupplierRelated, r"VINCULACI[OÓ]N:?[ \t]*(SI|NO)\b", first),
];

pub fn first(caps: &Captures<'_>) -> Option<String> {
    nth(caps, 1)
}

pub fn second(caps: &Captures<'_>) -> Option<String> {
    nth(caps, 2)
}

pub fn third(caps: &Captures<'_>) -> Option<String> {
    nth(caps, 3)
}

pub fn fourth(caps: &Captures<'_>) -> Option<String> {
    nth(caps, 4)
}

fn nth(caps: &Captures<'_>, group: usize) -> Option<String> {
    caps.get(group)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Digits printed in spaced groups (`24  47  3429  4001234`)
fn compact(caps: &Captures<'_>) -> Option<String> {
    first(caps).map(|s| s.split_whitespace().collect())
}

/// Numeric operation codes: 1 import, 2 export
fn operation(caps: &Captures<'_>) -> Option<String> {
    first(caps).map(|s| match s.as_str() {
        "1" => "IMP".to_string(),
        "2" => "EXP".to_string(),
        _ => s,
    })
}

pub(crate) fn compile(pattern: &str) -> Result<Regex, PipelineError> {
    Ok(Regex::new(pattern)?)
}

/// Compiled header, invoice, container and identifier patterns.
pub struct HeaderPatterns {
    fields: Vec<(HeaderField, Regex, Extract)>,
    invoice_line: Regex,
    invoice_date: Regex,
    invoice_incoterm: Regex,
    invoice_currency: Regex,
    invoice_foreign_value: Regex,
    invoice_dollar_value: Regex,
    container: Regex,
    identifier_line: Regex,
}

impl HeaderPatterns {
    pub fn new() -> Result<Self, PipelineError> {
        let fields = HEADER_PATTERNS
            .iter()
            .map(|(field, pattern, extract)| Ok((*field, compile(pattern)?, *extract)))
            .collect::<Result<Vec<_>, PipelineError>>()?;

        Ok(Self {
            fields,
            invoice_line: compile(
                r"(?m)^[^\n]*?(?:NUM\.?[ \t]*CFDI[ \t]*O[ \t]*DOC\.?[ \t]*EQUIVALENTE|FACTURA):?[ \t]*(\S+)([^\n]*)$",
            )?,
            invoice_date: compile(r"FECHA:?[ \t]*(\d{2}/\d{2}/\d{4})")?,
            invoice_incoterm: compile(r"INCOTERM:?[ \t]*([A-Z]{3})\b")?,
            invoice_currency: compile(r"MONEDA[ \t]*FACT:?[ \t]*([A-Z]{3})\b")?,
            invoice_foreign_value: compile(&format!(r"VAL\.?[ \t]*MON\.?[ \t]*FACT:?[ \t]*{AMOUNT}"))?,
            invoice_dollar_value: compile(&format!(r"VAL\.?[ \t]*DOLARES:?[ \t]*{AMOUNT}"))?,
            container: compile(r"CONTENEDOR:?[ \t]*([A-Z]{4}\d{7})(?:[ \t]+TIPO:?[ \t]*(\d{1,2}))?")?,
            identifier_line: identifier_line()?,
        })
    }

    /// Resolve every header field over `source`.
    pub fn extract_header(&self, source: &str) -> RawHeader {
        let mut header = RawHeader::default();
        let mut resolved: Vec<HeaderField> = Vec::new();

        for (field, pattern, extract) in &self.fields {
            if resolved.contains(field) {
                continue;
            }
            let value = pattern.captures_iter(source).find_map(|caps| extract(&caps));
            if let Some(value) = value {
                *slot(&mut header, *field) = text(value);
                resolved.push(*field);
            }
        }
        header
    }

    pub fn extract_invoices(&self, source: &str) -> Vec<RawInvoice> {
        self.invoice_line
            .captures_iter(source)
            .filter_map(|caps| {
                let numero = first(&caps)?;
                let rest = caps.get(2).map_or("", |m| m.as_str());
                let find = |re: &Regex| re.captures(rest).and_then(|c| first(&c)).and_then(|v| text(v));
                Some(RawInvoice {
                    numero: text(numero),
                    fecha: find(&self.invoice_date),
                    incoterm: find(&self.invoice_incoterm),
                    moneda: find(&self.invoice_currency),
                    valor_moneda: find(&self.invoice_foreign_value),
                    valor_dolares: find(&self.invoice_dollar_value),
                    id_proveedor: None,
                })
            })
            .collect()
    }

    pub fn extract_containers(&self, source: &str) -> Vec<RawContainer> {
        self.container
            .captures_iter(source)
            .filter_map(|caps| {
                Some(RawContainer {
                    numero: text(first(&caps)?),
                    tipo: second(&caps).and_then(|v| text(v)),
                })
            })
            .collect()
    }

    pub fn extract_identifiers(&self, source: &str) -> Vec<RawIdentifier> {
        parse_identifiers(&self.identifier_line, source)
    }
}

/// `IDENTIF: TL  USA` style lines, up to three complements.
pub(crate) fn identifier_line() -> Result<Regex, PipelineError> {
    compile(
        r"(?m)^[ \t]*IDENTIF(?:ICADOR)?\.?:?[ \t]+([A-Z0-9]{2})(?:[ \t]+(\S+))?(?:[ \t]+(\S+))?(?:[ \t]+(\S+))?[ \t]*$",
    )
}

pub(crate) fn parse_identifiers(pattern: &Regex, source: &str) -> Vec<RawIdentifier> {
    pattern
        .captures_iter(source)
        .filter_map(|caps| {
            Some(RawIdentifier {
                clave: text(first(&caps)?),
                complemento1: second(&caps).and_then(|v| text(v)),
                complemento2: third(&caps).and_then(|v| text(v)),
                complemento3: fourth(&caps).and_then(|v| text(v)),
            })
        })
        .collect()
}

fn slot(header: &mut RawHeader, field: HeaderField) -> &mut RawScalar {
    match field {
        HeaderField::PedimentoNo => &mut header.pedimento_no,
        HeaderField::OperationType => &mut header.tipo_operacion,
        HeaderField::DocumentKey => &mut header.clave_pedimento,
        HeaderField::Regime => &mut header.regimen,
        HeaderField::Rfc => &mut header.rfc,
        HeaderField::Curp => &mut header.curp,
        HeaderField::ImporterName => &mut header.nombre_importador,
        HeaderField::CustomsOffice => &mut header.aduana,
        HeaderField::ExchangeRate => &mut header.tipo_cambio,
        HeaderField::GrossWeight => &mut header.peso_bruto,
        HeaderField::EntryDate => &mut header.fecha_entrada,
        HeaderField::PaymentDate => &mut header.fecha_pago,
        HeaderField::DollarValue => &mut header.valor_dolares,
        HeaderField::CustomsValue => &mut header.valor_aduana,
        HeaderField::CommercialValue => &mut header.precio_pagado,
        HeaderField::TotalCash => &mut header.efectivo,
        HeaderField::Total => &mut header.total,
        HeaderField::TransportMode => &mut transport(header).medio,
        HeaderField::TransportId => &mut transport(header).identificacion,
        HeaderField::TransportCountry => &mut transport(header).pais,
        HeaderField::SupplierTaxId => &mut supplier(header).id_fiscal,
        HeaderField::SupplierName => &mut supplier(header).nombre,
        HeaderField::SupplierAddress => &mut supplier(header).domicilio,
        HeaderField::SupplierRelated => &mut supplier(header).vinculacion,
    }
}

fn transport(header: &mut RawHeader) -> &mut RawTransport {
    header.transporte.get_or_insert_with(RawTransport::default)
}

fn supplier(header: &mut RawHeader) -> &mut RawSupplier {
    header.proveedor.get_or_insert_with(RawSupplier::default)
}
