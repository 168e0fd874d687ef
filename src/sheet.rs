use crate::error::{NormalizerError, Result};
use crate::utils::{normalize_key, trim_cell};
use encoding_rs::WINDOWS_1252;
use std::collections::BTreeMap;
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const SNIFF_LINES: usize = 10;
const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// A delimited file read cell-by-cell, with no header assumed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub rows: Vec<Vec<String>>,
}

impl RawSheet {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NormalizerError::MissingSourceFile(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = decode_text(bytes);
        let delimiter = sniff_delimiter(&text);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Decodes file bytes as UTF-8 (dropping a BOM), falling back to
/// Windows-1252 for legacy Latin-1 exports.
pub fn decode_text(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(body);
            decoded.into_owned()
        }
    }
}

/// Picks the delimiter that appears most consistently in the first lines.
pub fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best = b',';
    let mut best_count = 0usize;
    for delimiter in CANDIDATE_DELIMITERS {
        let count: usize = lines
            .iter()
            .map(|l| l.bytes().filter(|b| *b == delimiter).count())
            .sum();
        if count > best_count {
            best = delimiter;
            best_count = count;
        }
    }
    best
}

/// A rectangular block: named columns over string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Frame {
    /// Builds a frame, fitting every row to the column count and dropping
    /// rows with no content.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .filter(|row| row.iter().any(|cell| !trim_cell(cell).is_empty()))
            .collect();
        Self { columns, rows }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|c| trim_cell(c))
            .unwrap_or("")
    }

    /// Exact column-name lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Case- and whitespace-insensitive column lookup.
    pub fn find_column(&self, target: &str) -> Option<usize> {
        let wanted = normalize_key(target);
        if wanted.is_empty() {
            return None;
        }
        self.columns.iter().position(|c| normalize_key(c) == wanted)
    }

    /// Applies declared header renames. Exact names win over normalized matches.
    pub fn rename_columns(&mut self, renames: &BTreeMap<String, String>) {
        for (from, to) in renames {
            let idx = self.column_index(from).or_else(|| self.find_column(from));
            if let Some(idx) = idx {
                self.columns[idx] = to.clone();
            }
        }
    }

    pub fn drop_first_row(&mut self) {
        if !self.rows.is_empty() {
            self.rows.remove(0);
        }
    }

    /// Trimmed values of one column over the first `limit` rows.
    pub fn sample_column(&self, column: usize, limit: usize) -> Vec<&str> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| row.get(column).map(|c| trim_cell(c)).unwrap_or(""))
            .collect()
    }
}
