//! Builds the field-for-field data context a template is rendered against,
//! one entry point per record variant.

use serde::Serialize;
use serde_json::{json, Value};

use crate::tables::{
    coords::{join_points, split_layout},
    Row, Table,
};

/// One co-claimant of a collective record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Beneficiary {
    #[serde(rename = "Nom")]
    pub nom: String,
    #[serde(rename = "Prenom")]
    pub prenom: String,
    #[serde(rename = "CNI")]
    pub cni: String,
}

/// A newline-delimited multi-value cell, as produced when several
/// beneficiaries share one spreadsheet row.
///
/// Parts are index-aligned across sibling fields; reads are trimmed and
/// out-of-range indices degrade to empty strings.
#[derive(Debug, Clone)]
pub struct MultiValue {
    raw: String,
    parts: Vec<String>,
}

impl MultiValue {
    pub fn parse(raw: &str) -> Self {
        MultiValue {
            raw: raw.to_string(),
            parts: raw.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Trimmed part at `index`, empty when out of range.
    pub fn part(&self, index: usize) -> &str {
        self.parts.get(index).map(String::as_str).unwrap_or("").trim()
    }

    /// Single display line for templates that cannot iterate.
    pub fn flattened(&self) -> String {
        self.raw.replace('\n', " / ")
    }
}

/// Align the three multi-value fields by index. An entry is kept whenever
/// its name or surname is non-empty; a stray piece number alone is dropped.
pub fn beneficiaries(
    noms: &MultiValue,
    prenoms: &MultiValue,
    pieces: &MultiValue,
) -> Vec<Beneficiary> {
    let len = noms.len().max(prenoms.len()).max(pieces.len());
    let mut out = Vec::new();
    for i in 0..len {
        let nom = noms.part(i);
        let prenom = prenoms.part(i);
        if nom.is_empty() && prenom.is_empty() {
            continue;
        }
        out.push(Beneficiary {
            nom: nom.to_string(),
            prenom: prenom.to_string(),
            cni: pieces.part(i).to_string(),
        });
    }
    out
}

/// Context for one individual record. Pure function of the row, its
/// normalized key, and the PI coordinate table.
pub fn individual_context(row: &Row, key: &str, coords: &Table) -> Value {
    let points = join_points(key, coords, true);
    let split = split_layout(&points);

    json!({
        "nicad": key,
        "Nom": row.field("Nom"),
        "Prenom": row.field("Prenom"),
        "Village": row.field("Village"),
        "superficie": row.field("superficie"),
        "type_usag": row.field("type_usag"),
        "Num_piece": row.field("Num_piece"),
        "Type_piece": row.field("Type_piece"),
        "Date_naissance": row.first_of(&["Date_naissance", "date_naiss"]),
        "Telephone": row.field("Telephone"),
        "coords": points,
        "coords_split": split,
    })
}

/// Context for one collective record, including the beneficiary list and
/// the flattened single-line variants of the multi-value fields.
pub fn collective_context(row: &Row, key: &str, coords: &Table) -> Value {
    let points = join_points(key, coords, false);
    let split = split_layout(&points);

    let noms = MultiValue::parse(row.field("Nom"));
    let prenoms = MultiValue::parse(row.field("Prenom"));
    let pieces = MultiValue::parse(row.first_of(&["Numero_piece", "Num_piece"]));

    json!({
        "nicad": key,
        "Village": row.field("Village"),
        "superficie": row.field("superficie"),
        "type_usa": row.field("type_usa"),
        "beneficiaires": beneficiaries(&noms, &prenoms, &pieces),
        "coords": points,
        "coords_split": split,
        "Nom": noms.flattened(),
        "Prenom": prenoms.flattened(),
        "Num_piece": pieces.flattened(),
    })
}
