//! Normalise legacy record CSVs to the current 9-column layout.
//!
//! Older builds wrote 5, 6 or 7 columns depending on the variant:
//!
//! | columns | layout |
//! |---|---|
//! | 5 | time, nik, code, qty, image |
//! | 6 | time, nik, code, description, qty, image |
//! | 7 (and 8) | time, nik, name, code, description, qty, image |
//! | 9+ | current layout, extra cells dropped |

use std::path::Path;

use serde::Serialize;

use crate::models::RECORD_HEADERS;
use crate::storage::StorageError;

/// Rows with fewer cells than this are dropped.
const MIN_LEGACY_COLUMNS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_dropped: usize,
    pub header_skipped: bool,
}

/// Map one legacy row to `RECORD_HEADERS` order, or `None` if too short.
pub fn normalize_row(cells: &[String]) -> Option<Vec<String>> {
    let c = |i: usize| cells.get(i).cloned().unwrap_or_default();
    let row = match cells.len() {
        n if n < MIN_LEGACY_COLUMNS => return None,
        5 => vec![c(0), c(1), String::new(), c(2), String::new(), c(3), String::new(), c(4), String::new()],
        6 => vec![c(0), c(1), String::new(), c(2), c(3), c(4), String::new(), c(5), String::new()],
        7 | 8 => vec![c(0), c(1), c(2), c(3), c(4), c(5), String::new(), c(6), String::new()],
        _ => cells[..RECORD_HEADERS.len()].to_vec(),
    };
    Some(row)
}

/// A first row whose first cell is not a timestamp is treated as a header.
fn looks_like_header(cells: &[String]) -> bool {
    cells
        .first()
        .map(|first| !first.trim().starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// Rewrite `path` in place with the current header and normalised rows.
pub fn repair_legacy_csv(path: &Path) -> Result<RepairReport, StorageError> {
    if !path.is_file() {
        return Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut report = RepairReport::default();
    let mut repaired = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let cells: Vec<String> = record?.iter().map(|c| c.trim().to_string()).collect();
        if i == 0 && looks_like_header(&cells) {
            report.header_skipped = true;
            continue;
        }
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        report.rows_read += 1;
        match normalize_row(&cells) {
            Some(row) => repaired.push(row),
            None => {
                tracing::debug!(line = i + 1, cells = cells.len(), "Dropping short legacy row");
                report.rows_dropped += 1;
            }
        }
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::Builder::new()
        .prefix(".repair-")
        .suffix(".csv")
        .tempfile_in(dir)?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file());
        writer.write_record(RECORD_HEADERS)?;
        for row in &repaired {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;

    report.rows_written = repaired.len();
    tracing::info!(
        path = %path.display(),
        written = report.rows_written,
        dropped = report.rows_dropped,
        "Legacy CSV repaired"
    );
    Ok(report)
}
