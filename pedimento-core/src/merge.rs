use crate::normalize::{opt_code, opt_text, sequence_from_value};
use crate::raw::{RawFragment, RawHeader, RawIdentifier};
use crate::transcription::ChunkOutcome;
use std::collections::HashSet;
use std::hash::Hash;
use tracing::debug;

/// Merge per-chunk fragments into one.
///
/// Outcomes are taken in chunk order regardless of input order. The header
/// comes from the first chunk with a non-empty header; lists are
/// concatenated and deduplicated, first occurrence wins.
pub fn merge_fragments(outcomes: &[ChunkOutcome]) -> RawFragment {
    let mut ordered: Vec<&ChunkOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|o| o.index);

    let mut merged = RawFragment::default();
    for fragment in ordered.iter().filter_map(|o| o.fragment.as_ref()) {
        if !merged.has_header() && fragment.has_header() {
            merged.header = fragment.header.clone();
        }
        merged.partidas.extend(fragment.partidas.iter().cloned());
        merged.facturas.extend(fragment.facturas.iter().cloned());
        merged.contenedores.extend(fragment.contenedores.iter().cloned());
        merged.identificadores.extend(fragment.identificadores.iter().cloned());
    }

    dedup(merged)
}

/// Hybrid merge: keep `primary` where it has data, fill the gaps from `fallback`.
pub fn fill_gaps(mut primary: RawFragment, fallback: &RawFragment) -> RawFragment {
    if let Some(theirs) = &fallback.header {
        primary
            .header
            .get_or_insert_with(RawHeader::default)
            .fill_from(theirs);
    }
    if primary.partidas.is_empty() {
        primary.partidas = fallback.partidas.clone();
    }
    if primary.facturas.is_empty() {
        primary.facturas = fallback.facturas.clone();
    }
    if primary.contenedores.is_empty() {
        primary.contenedores = fallback.contenedores.clone();
    }
    if primary.identificadores.is_empty() {
        primary.identificadores = fallback.identificadores.clone();
    }
    if primary.raw_text.is_none() {
        primary.raw_text = fallback.raw_text.clone();
    }
    primary
}

fn dedup(mut fragment: RawFragment) -> RawFragment {
    let before = fragment.partidas.len();
    fragment.partidas = dedup_by_key(fragment.partidas, |p| {
        p.secuencia.as_ref().and_then(sequence_from_value)
    });
    fragment.facturas = dedup_by_key(fragment.facturas, |f| opt_code(&f.numero));
    fragment.contenedores = dedup_by_key(fragment.contenedores, |c| opt_code(&c.numero));
    fragment.identificadores = dedup_by_key(fragment.identificadores, identifier_key);

    if fragment.partidas.len() < before {
        debug!(
            dropped = before - fragment.partidas.len(),
            "dropped duplicate items across chunks"
        );
    }
    fragment
}

/// Keeps the first element per key. Elements without a key are all kept.
fn dedup_by_key<T, K, F>(elements: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> Option<K>,
{
    let mut seen = HashSet::new();
    elements
        .into_iter()
        .filter(|element| match key(element) {
            Some(k) => seen.insert(k),
            None => true,
        })
        .collect()
}

fn identifier_key(identifier: &RawIdentifier) -> Option<(String, Option<String>, Option<String>, Option<String>)> {
    Some((
        opt_code(&identifier.clave)?,
        opt_text(&identifier.complemento1),
        opt_text(&identifier.complemento2),
        opt_text(&identifier.complemento3),
    ))
}
