use crate::sheet::{Frame, RawSheet};
use crate::utils::{normalize_token, trim_cell};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;

/// How many leading rows are scanned for the real header.
pub const HEADER_SCAN_ROWS: usize = 10;
/// Minimum vocabulary hits for a row to be accepted as the header.
pub const MIN_HEADER_SCORE: usize = 3;
pub const PLACEHOLDER_PREFIX: &str = "col_";

/// Expected header tokens, already normalized (lower-case, no whitespace, no
/// diacritics).
pub const HEADER_VOCABULARY: &[&str] = &[
    // Spanish
    "empresa",
    "compania",
    "sociedad",
    "periodo",
    "cuenta",
    "monto",
    "importe",
    "centro",
    "centrodecosto",
    "centrodecostos",
    "escenario",
    "mes",
    "ano",
    "anio",
    "fecha",
    "saldo",
    "valor",
    "total",
    // English
    "company",
    "entity",
    "period",
    "account",
    "amount",
    "center",
    "centre",
    "costcenter",
    "scenario",
    "year",
    "month",
    "date",
    "balance",
    "value",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderConfidence {
    /// A row cleared the vocabulary threshold.
    Detected,
    /// Nothing cleared the threshold; row 0 was used.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderChoice {
    pub row: usize,
    pub score: usize,
    pub confidence: HeaderConfidence,
}

fn is_vocabulary_token(cell: &str) -> bool {
    let token = normalize_token(cell);
    !token.is_empty() && HEADER_VOCABULARY.contains(&token.as_str())
}

pub fn score_header_row(row: &[String]) -> usize {
    row.iter().filter(|cell| is_vocabulary_token(cell)).count()
}

/// Picks the header row among the first [`HEADER_SCAN_ROWS`] rows.
///
/// The best-scoring row wins (earliest on ties) when it scores at least
/// [`MIN_HEADER_SCORE`]; otherwise row 0 is forced.
pub fn locate_header(rows: &[Vec<String>]) -> HeaderChoice {
    let mut best_row = 0;
    let mut best_score = 0;

    for (idx, row) in rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let score = score_header_row(row);
        if score > best_score {
            best_score = score;
            best_row = idx;
        }
    }

    if best_score >= MIN_HEADER_SCORE {
        HeaderChoice {
            row: best_row,
            score: best_score,
            confidence: HeaderConfidence::Detected,
        }
    } else {
        HeaderChoice {
            row: 0,
            score: best_score,
            confidence: HeaderConfidence::Forced,
        }
    }
}

fn is_placeholder_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    name.is_empty()
        || matches!(lower.as_str(), "nan" | "none" | "null")
        || name.starts_with("Unnamed")
}

/// Turns raw header cells into unique column names.
///
/// Blank, `nan`/`none`/`null` and auto-generated (`Unnamed…`) names become
/// `col_N` (1-based position); duplicates get `_2`, `_3`, … suffixes.
pub fn normalize_headers(cells: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(cells.len());
    let mut taken: HashSet<String> = HashSet::new();

    for (idx, cell) in cells.iter().enumerate() {
        let raw = trim_cell(cell);
        let base = if is_placeholder_name(raw) {
            format!("{}{}", PLACEHOLDER_PREFIX, idx + 1)
        } else {
            raw.to_string()
        };

        let mut name = base.clone();
        let mut counter = 2;
        while taken.contains(&name) {
            name = format!("{}_{}", base, counter);
            counter += 1;
        }

        taken.insert(name.clone());
        out.push(name);
    }

    out
}

pub fn is_placeholder_column(name: &str) -> bool {
    name.strip_prefix(PLACEHOLDER_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Locates the header of a raw sheet and returns the data block below it.
pub fn frame_from_sheet(sheet: &RawSheet, source: &str) -> (Frame, HeaderChoice) {
    let choice = locate_header(&sheet.rows);
    match choice.confidence {
        HeaderConfidence::Detected => info!(
            "{}: header detected on row {} ({} vocabulary matches)",
            source,
            choice.row + 1,
            choice.score
        ),
        HeaderConfidence::Forced => warn!(
            "{}: no header row cleared the threshold; forcing the first row as header",
            source
        ),
    }

    // The header row fixes the width; data cells beyond it are dropped.
    let header_cells = sheet.rows.get(choice.row).cloned().unwrap_or_default();
    let columns = normalize_headers(&header_cells);

    let body = sheet.rows.iter().skip(choice.row + 1).cloned().collect();
    (Frame::new(columns, body), choice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_header_on_third_row() {
        let rows = vec![
            row(&["Estado de resultados 2024", "", ""]),
            row(&["", "", ""]),
            row(&["Empresa", "Cuenta", "Monto"]),
            row(&["ACME", "Ventas", "100"]),
        ];
        let choice = locate_header(&rows);
        assert_eq!(choice.row, 2);
        assert_eq!(choice.score, 3);
        assert_eq!(choice.confidence, HeaderConfidence::Detected);
    }

    #[test]
    fn test_forced_first_row() {
        let rows = vec![row(&["Foo", "Bar", "Monto"]), row(&["a", "b", "1"])];
        let choice = locate_header(&rows);
        assert_eq!(choice.row, 0);
        assert_eq!(choice.confidence, HeaderConfidence::Forced);
    }

    #[test]
    fn test_header_matching_ignores_case_space_and_accents() {
        let rows = vec![row(&[" EMPRESA ", "Año", "Centro de Costo", "mes"])];
        assert_eq!(score_header_row(&rows[0]), 4);
    }

    #[test]
    fn test_header_beyond_scan_window_is_ignored() {
        let mut rows: Vec<Vec<String>> = (0..HEADER_SCAN_ROWS).map(|_| row(&["x", "y", "z"])).collect();
        rows.push(row(&["Empresa", "Cuenta", "Monto"]));
        assert_eq!(locate_header(&rows).confidence, HeaderConfidence::Forced);
    }

    #[test]
    fn test_normalize_headers() {
        let cells = row(&["Empresa", "", "nan", "Unnamed: 3", "Monto", "Monto", "NULL", "Monto"]);
        let names = normalize_headers(&cells);
        assert_eq!(
            names,
            vec!["Empresa", "col_2", "col_3", "col_4", "Monto", "Monto_2", "col_7", "Monto_3"]
        );
    }

    #[test]
    fn test_normalize_headers_generated_name_clash() {
        let cells = row(&["col_2", ""]);
        let names = normalize_headers(&cells);
        assert_eq!(names, vec!["col_2", "col_2_2"]);
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder_column("col_12"));
        assert!(!is_placeholder_column("col_"));
        assert!(!is_placeholder_column("color"));
        assert!(!is_placeholder_column("Monto"));
    }

    #[test]
    fn test_frame_from_sheet() {
        let sheet = RawSheet::from_rows(vec![
            row(&["Reporte"]),
            row(&["Empresa", "Cuenta", "Monto"]),
            row(&["ACME", "Ventas", "100"]),
            row(&["ACME", "Costos"]),
        ]);
        let (frame, choice) = frame_from_sheet(&sheet, "test.csv");
        assert_eq!(choice.row, 1);
        assert_eq!(frame.columns, vec!["Empresa", "Cuenta", "Monto"]);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.cell(1, 2), "");
    }

    #[test]
    fn test_ragged_data_rows_do_not_widen_frame() {
        let sheet = RawSheet::from_bytes(
            b"Empresa,Cuenta,Monto\nACME,Ventas,100,\nACME,Costos,40,,extra\n,,,nota\n",
        )
        .unwrap();
        let (frame, _) = frame_from_sheet(&sheet, "ragged.csv");
        assert_eq!(frame.columns, vec!["Empresa", "Cuenta", "Monto"]);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.rows[1], vec!["ACME", "Costos", "40"]);
    }
}
