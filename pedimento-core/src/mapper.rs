// Canonical domain mapper: RawFragment -> PedimentoRecord.
//
// Total and pure. Unknown or mistyped raw values become `None`; missing
// sub-objects become empty typed containers. Nothing here fails.

use crate::normalize::{
    normalize_fraccion, opt_amount, opt_code, opt_date, opt_text, sequence_from_value,
};
use crate::raw::{
    RawContainer, RawFragment, RawHeader, RawIdentifier, RawInvoice, RawPartida, RawRegulation,
    RawTax,
};
use crate::types::{
    Container, Header, Identifier, Invoice, LineItem, PedimentoRecord, Regulation, Supplier, Tax,
    Transport,
};
use std::collections::HashSet;
use tracing::warn;

pub fn map_record(raw: &RawFragment) -> PedimentoRecord {
    let mut header = raw.header.as_ref().map(map_header).unwrap_or_default();
    header.identifiers = map_identifiers(&raw.identificadores);
    header.invoices = raw.facturas.iter().filter_map(map_invoice).collect();
    header.containers = raw.contenedores.iter().filter_map(map_container).collect();

    PedimentoRecord {
        header,
        items: map_items(&raw.partidas),
        raw_text: raw.raw_text.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn map_header(raw: &RawHeader) -> Header {
    let mut header = Header {
        operation_type: opt_code(&raw.tipo_operacion).map(|op| match op.as_str() {
            "1" => "IMP".to_string(),
            "2" => "EXP".to_string(),
            _ => op,
        }),
        document_key: opt_code(&raw.clave_pedimento),
        regime: opt_code(&raw.regimen),
        importer_rfc: opt_code(&raw.rfc),
        importer_curp: opt_code(&raw.curp),
        importer_name: opt_text(&raw.nombre_importador),
        customs_office: opt_text(&raw.aduana),
        exchange_rate: opt_amount(&raw.tipo_cambio),
        gross_weight: opt_amount(&raw.peso_bruto),
        entry_date: opt_date(&raw.fecha_entrada),
        payment_date: opt_date(&raw.fecha_pago),
        dollar_value: opt_amount(&raw.valor_dolares),
        customs_value: opt_amount(&raw.valor_aduana),
        commercial_value: opt_amount(&raw.precio_pagado),
        total_cash: opt_amount(&raw.efectivo),
        total: opt_amount(&raw.total),
        taxes: map_taxes(&raw.contribuciones),
        transport: map_transport(raw),
        supplier: map_supplier(raw),
        ..Default::default()
    };
    // Goes through the setter so the number stays first-write-wins.
    if let Some(number) = opt_text(&raw.pedimento_no) {
        header.set_pedimento_no(number.split_whitespace().collect::<String>());
    }
    header
}

/// Nested object first; the flattened keys only fill what it leaves unknown.
fn map_transport(raw: &RawHeader) -> Transport {
    let nested = raw.transporte.clone().unwrap_or_default();
    Transport {
        mode: opt_text(&nested.medio).or_else(|| opt_text(&raw.medio_transporte)),
        identification: opt_text(&nested.identificacion)
            .or_else(|| opt_text(&raw.identificacion_transporte)),
        country: opt_code(&nested.pais),
    }
}

fn map_supplier(raw: &RawHeader) -> Supplier {
    let nested = raw.proveedor.clone().unwrap_or_default();
    Supplier {
        tax_id: opt_text(&nested.id_fiscal).or_else(|| opt_text(&raw.proveedor_id_fiscal)),
        name: opt_text(&nested.nombre).or_else(|| opt_text(&raw.proveedor_nombre)),
        address: opt_text(&nested.domicilio),
        related_party: opt_code(&nested.vinculacion),
    }
}

fn map_taxes(raw: &[RawTax]) -> Vec<Tax> {
    raw.iter()
        .filter_map(|tax| {
            Some(Tax {
                code: opt_code(&tax.clave)?,
                rate: opt_amount(&tax.tasa),
                rate_type: opt_text(&tax.tipo_tasa),
                payment_form: opt_text(&tax.forma_pago).map(|fp| normalize_payment_form(&fp)),
                amount: opt_amount(&tax.importe),
            })
        })
        .collect()
}

/// `00` and `0` are the same payment form.
fn normalize_payment_form(fp: &str) -> String {
    match fp.trim_start_matches('0') {
        "" if !fp.is_empty() => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn map_identifiers(raw: &[RawIdentifier]) -> Vec<Identifier> {
    raw.iter()
        .filter_map(|identifier| {
            Some(Identifier {
                code: opt_code(&identifier.clave)?,
                complement1: opt_code(&identifier.complemento1),
                complement2: opt_code(&identifier.complemento2),
                complement3: opt_code(&identifier.complemento3),
            })
        })
        .collect()
}

fn map_regulations(raw: &[RawRegulation]) -> Vec<Regulation> {
    raw.iter()
        .filter_map(|regulation| {
            Some(Regulation {
                code: opt_code(&regulation.clave)?,
                permit: opt_text(&regulation.permiso),
            })
        })
        .collect()
}

fn map_invoice(raw: &RawInvoice) -> Option<Invoice> {
    Some(Invoice {
        number: opt_code(&raw.numero)?,
        date: opt_date(&raw.fecha),
        incoterm: opt_code(&raw.incoterm),
        currency: opt_code(&raw.moneda),
        foreign_value: opt_amount(&raw.valor_moneda),
        dollar_value: opt_amount(&raw.valor_dolares),
        supplier_id: opt_text(&raw.id_proveedor),
    })
}

fn map_container(raw: &RawContainer) -> Option<Container> {
    Some(Container {
        number: opt_code(&raw.numero)?,
        container_type: opt_text(&raw.tipo),
    })
}

/// Keeps the first item per sequence number. Items without a readable
/// sequence are numbered after the highest known one.
fn map_items(raw: &[RawPartida]) -> Vec<LineItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(raw.len());
    let mut unnumbered = Vec::new();

    for partida in raw {
        match partida.secuencia.as_ref().and_then(sequence_from_value) {
            Some(secuencia) if seen.insert(secuencia) => items.push(map_item(secuencia, partida)),
            Some(_) => {}
            None => unnumbered.push(partida),
        }
    }

    let mut next = seen.iter().max().copied().unwrap_or(0);
    for partida in unnumbered {
        let Some(secuencia) = next.checked_add(1) else {
            warn!("no sequence number left to assign, dropping unnumbered item");
            break;
        };
        next = secuencia;
        warn!(secuencia, "item without a readable sequence number, assigned one");
        items.push(map_item(secuencia, partida));
    }
    items
}

fn map_item(secuencia: u32, raw: &RawPartida) -> LineItem {
    LineItem {
        secuencia,
        fraccion: opt_text(&raw.fraccion).and_then(|f| normalize_fraccion(&f)),
        nico: opt_text(&raw.nico),
        description: opt_text(&raw.descripcion),
        related_party: opt_text(&raw.vinculacion),
        valuation_method: opt_text(&raw.metodo_valoracion),
        umc: opt_text(&raw.umc),
        umc_quantity: opt_amount(&raw.cantidad_umc),
        umt: opt_text(&raw.umt),
        umt_quantity: opt_amount(&raw.cantidad_umt),
        seller_country: opt_code(&raw.pais_vendedor),
        origin_country: opt_code(&raw.pais_origen),
        customs_value: opt_amount(&raw.valor_aduana),
        commercial_value: opt_amount(&raw.precio_pagado),
        unit_price: opt_amount(&raw.precio_unitario),
        added_value: opt_amount(&raw.valor_agregado),
        taxes: map_taxes(&raw.contribuciones),
        identifiers: map_identifiers(&raw.identificadores),
        regulations: map_regulations(&raw.permisos),
        observations: opt_text(&raw.observaciones),
    }
}
