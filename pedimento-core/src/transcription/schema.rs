use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The contract handed to the transcription collaborator with every chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionSchema {
    pub version: String,
    pub instruction: String,
    pub json_schema: Value,
}

impl ExtractionSchema {
    /// Pedimento fragment schema. Field names match `RawFragment`.
    pub fn pedimento() -> Self {
        let tax = json!({
            "type": "object",
            "properties": {
                "clave": {"type": "string"},
                "tasa": {"type": ["number", "string"]},
                "tipo_tasa": {"type": "string"},
                "forma_pago": {"type": "string"},
                "importe": {"type": ["number", "string"]}
            }
        });
        let identifier = json!({
            "type": "object",
            "properties": {
                "clave": {"type": "string"},
                "complemento1": {"type": "string"},
                "complemento2": {"type": "string"},
                "complemento3": {"type": "string"}
            }
        });

        Self {
            version: "pedimento-fragment/1".to_string(),
            instruction: "Transcribe the pedimento pages into one JSON object that follows \
                the schema. Copy values exactly as printed, including thousands separators. \
                Omit fields that are not present on these pages; do not guess. Return only \
                the JSON object."
                .to_string(),
            json_schema: json!({
                "type": "object",
                "properties": {
                    "header": {
                        "type": "object",
                        "properties": {
                            "pedimento_no": {"type": "string"},
                            "tipo_operacion": {"type": "string"},
                            "clave_pedimento": {"type": "string"},
                            "regimen": {"type": "string"},
                            "rfc": {"type": "string"},
                            "curp": {"type": "string"},
                            "nombre_importador": {"type": "string"},
                            "aduana": {"type": "string"},
                            "tipo_cambio": {"type": ["number", "string"]},
                            "peso_bruto": {"type": ["number", "string"]},
                            "fecha_entrada": {"type": "string", "description": "dd/mm/yyyy"},
                            "fecha_pago": {"type": "string", "description": "dd/mm/yyyy"},
                            "valor_dolares": {"type": ["number", "string"]},
                            "valor_aduana": {"type": ["number", "string"]},
                            "precio_pagado": {"type": ["number", "string"]},
                            "efectivo": {"type": ["number", "string"]},
                            "total": {"type": ["number", "string"]},
                            "contribuciones": {"type": "array", "items": tax.clone()},
                            "transporte": {
                                "type": "object",
                                "properties": {
                                    "medio": {"type": "string"},
                                    "identificacion": {"type": "string"},
                                    "pais": {"type": "string"}
                                }
                            },
                            "proveedor": {
                                "type": "object",
                                "properties": {
                                    "id_fiscal": {"type": "string"},
                                    "nombre": {"type": "string"},
                                    "domicilio": {"type": "string"},
                                    "vinculacion": {"type": "string"}
                                }
                            }
                        }
                    },
                    "partidas": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "secuencia": {"type": ["integer", "string"]},
                                "fraccion": {"type": "string"},
                                "nico": {"type": "string"},
                                "descripcion": {"type": "string"},
                                "vinculacion": {"type": "string"},
                                "metodo_valoracion": {"type": "string"},
                                "umc": {"type": "string"},
                                "cantidad_umc": {"type": ["number", "string"]},
                                "umt": {"type": "string"},
                                "cantidad_umt": {"type": ["number", "string"]},
                                "pais_vendedor": {"type": "string"},
                                "pais_origen": {"type": "string"},
                                "valor_aduana": {"type": ["number", "string"]},
                                "precio_pagado": {"type": ["number", "string"]},
                                "precio_unitario": {"type": ["number", "string"]},
                                "valor_agregado": {"type": ["number", "string"]},
                                "contribuciones": {"type": "array", "items": tax},
                                "identificadores": {"type": "array", "items": identifier.clone()},
                                "permisos": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "clave": {"type": "string"},
                                            "permiso": {"type": "string"}
                                        }
                                    }
                                },
                                "observaciones": {"type": "string"}
                            }
                        }
                    },
                    "facturas": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "numero": {"type": "string"},
                                "fecha": {"type": "string"},
                                "incoterm": {"type": "string"},
                                "moneda": {"type": "string"},
                                "valor_moneda": {"type": ["number", "string"]},
                                "valor_dolares": {"type": ["number", "string"]},
                                "id_proveedor": {"type": "string"}
                            }
                        }
                    },
                    "contenedores": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "numero": {"type": "string"},
                                "tipo": {"type": "string"}
                            }
                        }
                    },
                    "identificadores": {"type": "array", "items": identifier}
                }
            }),
        }
    }
}

impl Default for ExtractionSchema {
    fn default() -> Self {
        Self::pedimento()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_every_fragment_section() {
        let schema = ExtractionSchema::pedimento();
        let properties = &schema.json_schema["properties"];
        for section in ["header", "partidas", "facturas", "contenedores", "identificadores"] {
            assert!(properties.get(section).is_some(), "missing {section}");
        }
    }
}
