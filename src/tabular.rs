//! Header + rows view over CSV and spreadsheet files.
//!
//! Every cell comes back as a string. Catalog codes and personnel numbers
//! must never be coerced to numbers, so no typed deserialization happens here.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Unsupported table format {0:?} (expected csv, xlsx, xls or ods)")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Index of a header, compared trimmed and case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    }

    /// Cell by row and column; short rows read as empty.
    pub fn cell<'a>(&'a self, row: &'a [String], column: usize) -> &'a str {
        row.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Spreadsheet,
}

pub fn detect_format(path: &Path) -> Result<TableFormat, TableError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => Ok(TableFormat::Csv),
        "xlsx" | "xlsm" | "xls" | "ods" => Ok(TableFormat::Spreadsheet),
        _ => Err(TableError::UnsupportedFormat(ext)),
    }
}

/// Read the first sheet (or the whole CSV) with the first row as header.
pub fn read_table(path: &Path) -> Result<Table, TableError> {
    if !path.is_file() {
        return Err(TableError::NotFound(path.to_path_buf()));
    }
    match detect_format(path)? {
        TableFormat::Csv => read_csv(path),
        TableFormat::Spreadsheet => read_spreadsheet(path),
    }
}

fn read_csv(path: &Path) -> Result<Table, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Table { headers, rows })
}

fn read_spreadsheet(path: &Path) -> Result<Table, TableError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| TableError::Spreadsheet(e.to_string()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| TableError::Spreadsheet(e.to_string()))?,
        None => return Ok(Table::default()),
    };

    let mut rows_iter = range.rows();
    let headers = match rows_iter.next() {
        Some(header) => header.iter().map(cell_to_string).collect(),
        None => return Ok(Table::default()),
    };
    let rows = rows_iter
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();
    Ok(Table { headers, rows })
}

/// Render a spreadsheet cell as text.
///
/// Whole floats print without a decimal point ("1234567", not "1234567.0").
/// Leading zeros lost by a numeric cell cannot be recovered; catalogs should
/// store codes as text cells.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", *f as i64)
        }
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
