// Raw, loosely typed extraction fragments.
//
// Both extraction paths produce a `RawFragment`. Field names follow the
// wire schema handed to the transcription service. Scalars stay as
// `serde_json::Value` so that a wrong type degrades a single field instead
// of rejecting the fragment; the mapper is the only place they are
// interpreted.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type RawScalar = Option<Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawFragment {
    #[serde(deserialize_with = "lenient_object")]
    pub header: Option<RawHeader>,
    #[serde(alias = "items", deserialize_with = "lenient_list")]
    pub partidas: Vec<RawPartida>,
    #[serde(alias = "invoices", deserialize_with = "lenient_list")]
    pub facturas: Vec<RawInvoice>,
    #[serde(alias = "containers", deserialize_with = "lenient_list")]
    pub contenedores: Vec<RawContainer>,
    /// Document-level identifiers
    #[serde(alias = "identifiers", deserialize_with = "lenient_list")]
    pub identificadores: Vec<RawIdentifier>,
    /// Source text this fragment was read from, when known
    #[serde(skip)]
    pub raw_text: Option<String>,
}

impl RawFragment {
    pub fn is_empty(&self) -> bool {
        self.header.as_ref().map_or(true, RawHeader::is_empty)
            && self.partidas.is_empty()
            && self.facturas.is_empty()
            && self.contenedores.is_empty()
            && self.identificadores.is_empty()
    }

    pub fn has_header(&self) -> bool {
        self.header.as_ref().is_some_and(|h| !h.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawHeader {
    #[serde(alias = "numero_pedimento")]
    pub pedimento_no: RawScalar,
    pub tipo_operacion: RawScalar,
    #[serde(alias = "clave")]
    pub clave_pedimento: RawScalar,
    pub regimen: RawScalar,
    pub rfc: RawScalar,
    pub curp: RawScalar,
    pub nombre_importador: RawScalar,
    pub aduana: RawScalar,
    pub tipo_cambio: RawScalar,
    pub peso_bruto: RawScalar,
    pub fecha_entrada: RawScalar,
    pub fecha_pago: RawScalar,
    pub valor_dolares: RawScalar,
    pub valor_aduana: RawScalar,
    #[serde(alias = "valor_comercial")]
    pub precio_pagado: RawScalar,
    pub efectivo: RawScalar,
    pub total: RawScalar,
    #[serde(alias = "impuestos", deserialize_with = "lenient_list")]
    pub contribuciones: Vec<RawTax>,
    #[serde(deserialize_with = "lenient_object")]
    pub transporte: Option<RawTransport>,
    #[serde(deserialize_with = "lenient_object")]
    pub proveedor: Option<RawSupplier>,
    // Flattened variants some responses use instead of the nested objects.
    pub proveedor_nombre: RawScalar,
    pub proveedor_id_fiscal: RawScalar,
    pub medio_transporte: RawScalar,
    pub identificacion_transporte: RawScalar,
}

impl RawHeader {
    pub fn is_empty(&self) -> bool {
        self.scalars().iter().all(|v| is_blank(v))
            && self.contribuciones.is_empty()
            && self.transporte.is_none()
            && self.proveedor.is_none()
    }

    /// Fills every unknown field from `other`. Known fields are kept.
    pub fn fill_from(&mut self, other: &RawHeader) {
        let theirs = other.scalars();
        for (mine, theirs) in self.scalars_mut().into_iter().zip(theirs) {
            if is_blank(mine) && !is_blank(theirs) {
                *mine = theirs.clone();
            }
        }
        if self.contribuciones.is_empty() {
            self.contribuciones = other.contribuciones.clone();
        }
        if self.transporte.is_none() {
            self.transporte = other.transporte.clone();
        }
        if self.proveedor.is_none() {
            self.proveedor = other.proveedor.clone();
        }
    }

    fn scalars(&self) -> [&RawScalar; 21] {
        [
            &self.pedimento_no,
            &self.tipo_operacion,
            &self.clave_pedimento,
            &self.regimen,
            &self.rfc,
            &self.curp,
            &self.nombre_importador,
            &self.aduana,
            &self.tipo_cambio,
            &self.peso_bruto,
            &self.fecha_entrada,
            &self.fecha_pago,
            &self.valor_dolares,
            &self.valor_aduana,
            &self.precio_pagado,
            &self.efectivo,
            &self.total,
            &self.proveedor_nombre,
            &self.proveedor_id_fiscal,
            &self.medio_transporte,
            &self.identificacion_transporte,
        ]
    }

    fn scalars_mut(&mut self) -> [&mut RawScalar; 21] {
        [
            &mut self.pedimento_no,
            &mut self.tipo_operacion,
            &mut self.clave_pedimento,
            &mut self.regimen,
            &mut self.rfc,
            &mut self.curp,
            &mut self.nombre_importador,
            &mut self.aduana,
            &mut self.tipo_cambio,
            &mut self.peso_bruto,
            &mut self.fecha_entrada,
            &mut self.fecha_pago,
            &mut self.valor_dolares,
            &mut self.valor_aduana,
            &mut self.precio_pagado,
            &mut self.efectivo,
            &mut self.total,
            &mut self.proveedor_nombre,
            &mut self.proveedor_id_fiscal,
            &mut self.medio_transporte,
            &mut self.identificacion_transporte,
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawPartida {
    #[serde(alias = "sec")]
    pub secuencia: RawScalar,
    pub fraccion: RawScalar,
    #[serde(alias = "subdivision")]
    pub nico: RawScalar,
    pub descripcion: RawScalar,
    pub vinculacion: RawScalar,
    pub metodo_valoracion: RawScalar,
    pub umc: RawScalar,
    pub cantidad_umc: RawScalar,
    pub umt: RawScalar,
    pub cantidad_umt: RawScalar,
    pub pais_vendedor: RawScalar,
    pub pais_origen: RawScalar,
    pub valor_aduana: RawScalar,
    pub precio_pagado: RawScalar,
    pub precio_unitario: RawScalar,
    pub valor_agregado: RawScalar,
    #[serde(alias = "impuestos", deserialize_with = "lenient_list")]
    pub contribuciones: Vec<RawTax>,
    #[serde(deserialize_with = "lenient_list")]
    pub identificadores: Vec<RawIdentifier>,
    #[serde(alias = "regulaciones", deserialize_with = "lenient_list")]
    pub permisos: Vec<RawRegulation>,
    pub observaciones: RawScalar,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawTax {
    #[serde(alias = "contribucion")]
    pub clave: RawScalar,
    pub tasa: RawScalar,
    pub tipo_tasa: RawScalar,
    pub forma_pago: RawScalar,
    pub importe: RawScalar,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawIdentifier {
    pub clave: RawScalar,
    pub complemento1: RawScalar,
    pub complemento2: RawScalar,
    pub complemento3: RawScalar,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawRegulation {
    pub clave: RawScalar,
    #[serde(alias = "numero_permiso")]
    pub permiso: RawScalar,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawInvoice {
    pub numero: RawScalar,
    pub fecha: RawScalar,
    pub incoterm: RawScalar,
    pub moneda: RawScalar,
    pub valor_moneda: RawScalar,
    pub valor_dolares: RawScalar,
    pub id_proveedor: RawScalar,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawContainer {
    pub numero: RawScalar,
    pub tipo: RawScalar,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawTransport {
    pub medio: RawScalar,
    pub identificacion: RawScalar,
    pub pais: RawScalar,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawSupplier {
    pub id_fiscal: RawScalar,
    pub nombre: RawScalar,
    pub domicilio: RawScalar,
    pub vinculacion: RawScalar,
}

/// Wraps a string as a raw scalar.
pub fn text(value: impl Into<String>) -> RawScalar {
    Some(Value::String(value.into()))
}

fn is_blank(value: &RawScalar) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Accepts a list, a single object, or anything else (empty). Elements that
/// are not objects are dropped.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(elements) => elements
            .into_iter()
            .filter_map(|element| serde_json::from_value(element).ok())
            .collect(),
        Value::Object(_) => serde_json::from_value(value).ok().into_iter().collect(),
        _ => Vec::new(),
    })
}

fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_is_accepted_as_list() {
        let fragment: RawFragment = serde_json::from_value(json!({
            "partidas": {"secuencia": 1, "fraccion": "85044099"}
        }))
        .unwrap();
        assert_eq!(fragment.partidas.len(), 1);
    }

    #[test]
    fn wrong_shapes_degrade_instead_of_failing() {
        let fragment: RawFragment = serde_json::from_value(json!({
            "header": "not an object",
            "partidas": [{"secuencia": 1}, "junk", 42, {"secuencia": 2}],
            "facturas": null,
            "contenedores": 7
        }))
        .unwrap();
        assert!(fragment.header.is_none());
        assert_eq!(fragment.partidas.len(), 2);
        assert!(fragment.facturas.is_empty());
        assert!(fragment.contenedores.is_empty());
    }

    #[test]
    fn english_aliases_are_understood() {
        let fragment: RawFragment = serde_json::from_value(json!({
            "items": [{"secuencia": "3"}],
            "invoices": [{"numero": "INV-1"}]
        }))
        .unwrap();
        assert_eq!(fragment.partidas.len(), 1);
        assert_eq!(fragment.facturas.len(), 1);
    }

    #[test]
    fn header_emptiness_ignores_blank_strings() {
        let header = RawHeader {
            rfc: text("  "),
            ..Default::default()
        };
        assert!(header.is_empty());

        let header = RawHeader {
            rfc: text("ABC010203XY4"),
            ..Default::default()
        };
        assert!(!header.is_empty());
    }

    #[test]
    fn fill_from_only_touches_unknown_fields() {
        let mut primary = RawHeader {
            rfc: text("AAA010101AAA"),
            ..Default::default()
        };
        let fallback = RawHeader {
            rfc: text("BBB010101BBB"),
            tipo_cambio: text("17.05"),
            ..Default::default()
        };
        primary.fill_from(&fallback);
        assert_eq!(primary.rfc, text("AAA010101AAA"));
        assert_eq!(primary.tipo_cambio, text("17.05"));
    }
}
