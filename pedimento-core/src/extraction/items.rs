use super::fields::{compile, first, fourth, identifier_line, parse_identifiers, second, third, Extract};
use super::taxes::TaxScanner;
use crate::config::ExtractionConfig;
use crate::error::PipelineError;
use crate::normalize::sequence_from_value;
use crate::raw::{text, RawPartida, RawRegulation, RawScalar};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Description,
    CustomsValue,
    CommercialValue,
    UnitPrice,
    AddedValue,
    Observations,
}

const VALUE_COLUMNS: &str = r"(?m)VAL\.?[ \t]*ADU/USD[^\n]*\n[ \t]*(\S+)";

const ITEM_PATTERNS: &[(ItemField, &str, Extract)] = &[
    (
        ItemField::Description,
        r"(?m)^[ \t]*DESCRIPCI[OÓ]N:?[ \t]*([^\n]+?)[ \t]*$",
        first,
    ),
    (
        ItemField::CustomsValue,
        r"VAL\.?[ \t]*ADU(?:ANA)?:[ \t]*([\d,]+(?:\.\d+)?)",
        first,
    ),
    (ItemField::CustomsValue, VALUE_COLUMNS, first),
    (
        ItemField::CommercialValue,
        r"IMP\.?[ \t]*PRECIO[ \t]*PAG(?:ADO)?\.?:[ \t]*([\d,]+(?:\.\d+)?)",
        first,
    ),
    (
        ItemField::CommercialValue,
        r"(?m)VAL\.?[ \t]*ADU/USD[^\n]*\n[ \t]*(\S+)[ \t]+(\S+)",
        second,
    ),
    (
        ItemField::UnitPrice,
        r"PRECIO[ \t]*UNIT(?:ARIO)?\.?:[ \t]*([\d,]+(?:\.\d+)?)",
        first,
    ),
    (
        ItemField::UnitPrice,
        r"(?m)VAL\.?[ \t]*ADU/USD[^\n]*\n[ \t]*(\S+)[ \t]+(\S+)[ \t]+(\S+)",
        third,
    ),
    (
        ItemField::AddedValue,
        r"VAL\.?[ \t]*AGREG(?:ADO)?\.?:[ \t]*([\d,]+(?:\.\d+)?)",
        first,
    ),
    (
        ItemField::AddedValue,
        r"(?m)VAL\.?[ \t]*ADU/USD[^\n]*\n[ \t]*(\S+)[ \t]+(\S+)[ \t]+(\S+)[ \t]+(\S+)",
        fourth,
    ),
    (
        ItemField::Observations,
        r"(?m)^[ \t]*OBSERVACIONES:?[ \t]*([^\n]+?)[ \t]*$",
        first,
    ),
];

/// Labels that start a non-description line inside an item scope.
const SCOPE_LABELS: &[&str] = &[
    "VAL", "CON.", "IDENTIF", "PERMISO", "OBSERVACIONES", "PEDIMENTO", "PARTIDAS", "SEC",
];

/// Items found in a document, plus where the first one starts.
pub struct ItemScan {
    pub partidas: Vec<RawPartida>,
    pub first_anchor: Option<usize>,
}

/// Locates partidas by their anchor line and reads each item's scope.
pub struct ItemScanner {
    anchor: Regex,
    fields: Vec<(ItemField, Regex, Extract)>,
    identifier_line: Regex,
    permit_line: Regex,
    taxes: TaxScanner,
}

impl ItemScanner {
    pub fn new(config: &ExtractionConfig) -> Result<Self, PipelineError> {
        let fields = ITEM_PATTERNS
            .iter()
            .map(|(field, pattern, extract)| Ok((*field, compile(pattern)?, *extract)))
            .collect::<Result<Vec<_>, PipelineError>>()?;

        Ok(Self {
            anchor: compile(&config.item_anchor_pattern)?,
            fields,
            identifier_line: identifier_line()?,
            permit_line: compile(r"(?m)^[ \t]*PERMISO:?[ \t]+([A-Z0-9]{1,3})(?:[ \t]+(\S+))?")?,
            taxes: TaxScanner::new(&config.tax_codes, config.tax_lookahead),
        })
    }

    /// Each scope runs from its anchor to the next anchor or the end of text.
    pub fn scan(&self, source: &str) -> ItemScan {
        let anchors: Vec<_> = self.anchor.captures_iter(source).collect();
        let first_anchor = anchors.first().and_then(|caps| caps.get(0)).map(|m| m.start());

        let mut seen = HashSet::new();
        let mut partidas = Vec::with_capacity(anchors.len());

        for (i, caps) in anchors.iter().enumerate() {
            let Some(whole) = caps.get(0) else { continue };
            let scope_end = anchors
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(source.len(), |m| m.start());
            let body = &source[whole.end()..scope_end];

            let mut partida = RawPartida {
                secuencia: caps.get(1).and_then(|m| text(m.as_str())),
                fraccion: caps.get(2).and_then(|m| text(m.as_str())),
                nico: caps.get(3).and_then(|m| text(m.as_str())),
                ..Default::default()
            };
            if let Some(rest) = caps.get(4) {
                assign_line_columns(&mut partida, rest.as_str());
            }
            self.read_scope(&mut partida, body);

            let key = partida.secuencia.as_ref().and_then(sequence_from_value);
            if let Some(key) = key {
                if !seen.insert(key) {
                    debug!(secuencia = key, "repeated item anchor, keeping first occurrence");
                    continue;
                }
            }
            partidas.push(partida);
        }

        ItemScan {
            partidas,
            first_anchor,
        }
    }

    fn read_scope(&self, partida: &mut RawPartida, body: &str) {
        let mut resolved: Vec<ItemField> = Vec::new();
        for (field, pattern, extract) in &self.fields {
            if resolved.contains(field) {
                continue;
            }
            if let Some(value) = pattern.captures(body).and_then(|caps| extract(&caps)) {
                *slot(partida, *field) = text(value);
                resolved.push(*field);
            }
        }

        if partida.descripcion.is_none() {
            partida.descripcion = description_fallback(body).and_then(|d| text(d));
        }

        partida.contribuciones = self.taxes.scan(body);
        partida.identificadores = parse_identifiers(&self.identifier_line, body);
        partida.permisos = self
            .permit_line
            .captures_iter(body)
            .filter_map(|caps| {
                Some(RawRegulation {
                    clave: text(first(&caps)?),
                    permiso: second(&caps).and_then(|p| text(p)),
                })
            })
            .collect();
    }
}

/// Anchor line columns after the sub-classification:
/// `VINC MET_VAL UMC CANT_UMC UMT CANT_UMT [P.V/C] [P.O/D]`.
/// Trailing three-letter tokens are countries.
fn assign_line_columns(partida: &mut RawPartida, rest: &str) {
    let mut tokens: Vec<&str> = rest.split_whitespace().collect();

    let mut countries = Vec::new();
    while let Some(last) = tokens.last() {
        if countries.len() < 2 && last.len() == 3 && last.chars().all(|c| c.is_ascii_uppercase()) {
            countries.insert(0, *last);
            tokens.pop();
        } else {
            break;
        }
    }
    match countries.as_slice() {
        [seller, origin] => {
            partida.pais_vendedor = text(*seller);
            partida.pais_origen = text(*origin);
        }
        [origin] => partida.pais_origen = text(*origin),
        _ => {}
    }

    let columns: [&mut RawScalar; 6] = [
        &mut partida.vinculacion,
        &mut partida.metodo_valoracion,
        &mut partida.umc,
        &mut partida.cantidad_umc,
        &mut partida.umt,
        &mut partida.cantidad_umt,
    ];
    for (slot, token) in columns.into_iter().zip(tokens) {
        *slot = text(token);
    }
}

fn description_fallback(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| !SCOPE_LABELS.iter().any(|label| line.starts_with(label)))
        .filter(|line| line.chars().any(|c| c.is_alphabetic()))
        .map(str::to_string)
}

fn slot(partida: &mut RawPartida, field: ItemField) -> &mut RawScalar {
    match field {
        ItemField::Description => &mut partida.descripcion,
        ItemField::CustomsValue => &mut partida.valor_aduana,
        ItemField::CommercialValue => &mut partida.precio_pagado,
        ItemField::UnitPrice => &mut partida.precio_unitario,
        ItemField::AddedValue => &mut partida.valor_agregado,
        ItemField::Observations => &mut partida.observaciones,
    }
}
