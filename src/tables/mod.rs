use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use tracing::info;

use crate::error::LoadError;

pub mod coords;

/// One spreadsheet row: column name → raw cell text.
///
/// Empty cells are not stored, so "absent column" and "empty cell" look the
/// same through the accessors, which is what the defaulting rules want.
#[derive(Debug, Clone, Default)]
pub struct Row {
    cells: HashMap<String, String>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cells.get(name).map(String::as_str)
    }

    /// Cell value with an empty-string default.
    pub fn field(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    /// First non-empty cell among `names`, else empty string.
    pub fn first_of(&self, names: &[&str]) -> &str {
        names.iter().find_map(|n| self.get(n)).unwrap_or("")
    }

    /// First cell among `names` parsed as a number, defaulting to 0.
    pub fn number(&self, names: &[&str]) -> f64 {
        self.first_of(names).trim().parse().unwrap_or(0.0)
    }

    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let cells = pairs
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Row { cells }
    }
}

/// An ordered sequence of rows plus the header vector, so column order
/// survives for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse headered CSV from any reader into a [`Table`]. Row order follows
/// the file; a parse failure is fatal for the table.
pub fn read_table<R: Read>(reader: R, label: &str) -> Result<Table, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|source| LoadError::Parse {
            label: label.to_string(),
            source,
        })?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|source| LoadError::Parse {
            label: label.to_string(),
            source,
        })?;
        let mut cells = HashMap::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            match record.get(i) {
                Some(value) if !value.is_empty() => {
                    cells.insert(header.clone(), value.to_string());
                }
                _ => {}
            }
        }
        rows.push(Row { cells });
    }

    Ok(Table { headers, rows })
}

/// Load a table from an optional path. No path means the input was simply
/// not supplied and yields an empty table.
pub fn load_table(path: Option<&Path>, label: &str) -> Result<Table, LoadError> {
    let Some(path) = path else {
        info!(label, "no file supplied; treating table as empty");
        return Ok(Table::default());
    };

    let file = File::open(path).map_err(|source| LoadError::Io {
        label: label.to_string(),
        source,
    })?;
    let table = read_table(BufReader::new(file), label)?;
    info!(label, rows = table.len(), "loaded table");
    Ok(table)
}

/// Canonicalize a record key: trim, then undo the `.0` suffix a numeric
/// spreadsheet column leaves on integer identifiers. Pure, never fails;
/// empty input stays empty.
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).to_string()
}
