use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use super::StorageError;
use crate::models::{sanitize_partition, ScanEvent, RECORD_HEADERS, TIMESTAMP_FORMAT};
use crate::tabular::{read_table, Table};

/// Default number of rows shown by the history view.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

const SHEET_NAME: &str = "Scans";
const CODE_COLUMN: usize = 3;
const QUANTITY_COLUMN: usize = 5;

/// Where a local append ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocalWrite {
    Xlsx { path: PathBuf },
    /// The spreadsheet could not be rewritten; the row went to CSV instead.
    CsvFallback { path: PathBuf, xlsx_error: String },
}

impl LocalWrite {
    pub fn path(&self) -> &Path {
        match self {
            Self::Xlsx { path } | Self::CsvFallback { path, .. } => path,
        }
    }
}

/// One persisted row as shown by the history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub operator_id: String,
    pub operator_name: String,
    pub component_code: String,
    pub component_description: String,
    pub quantity: String,
    pub reason: String,
    pub image_label: String,
    pub session_user: String,
}

impl HistoryEntry {
    fn from_cells(cells: &[String]) -> Self {
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
        Self {
            timestamp: cell(0),
            operator_id: cell(1),
            operator_name: cell(2),
            component_code: cell(3),
            component_description: cell(4),
            quantity: cell(5),
            reason: cell(6),
            image_label: cell(7),
            session_user: cell(8),
        }
    }

    pub fn recorded_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).ok()
    }
}

/// Per-partition record files under one data directory:
/// `data_<partition>.xlsx`, with `data_<partition>.csv` as fallback.
#[derive(Debug, Clone)]
pub struct LocalStore {
    data_dir: PathBuf,
}

impl LocalStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn xlsx_path(&self, partition: &str) -> PathBuf {
        self.data_dir
            .join(format!("data_{}.xlsx", sanitize_partition(partition)))
    }

    pub fn csv_path(&self, partition: &str) -> PathBuf {
        self.data_dir
            .join(format!("data_{}.csv", sanitize_partition(partition)))
    }

    /// Append one event. The spreadsheet is tried first; any failure there
    /// falls back to appending to the CSV file.
    pub fn append(&self, partition: &str, event: &ScanEvent) -> Result<LocalWrite, StorageError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let row = event.to_row();

        let xlsx_path = self.xlsx_path(partition);
        match append_xlsx(&xlsx_path, &row) {
            Ok(()) => {
                tracing::info!(path = %xlsx_path.display(), "Scan saved to spreadsheet");
                Ok(LocalWrite::Xlsx { path: xlsx_path })
            }
            Err(e) => {
                tracing::warn!(
                    path = %xlsx_path.display(),
                    error = %e,
                    "Spreadsheet write failed, falling back to CSV"
                );
                let csv_path = self.csv_path(partition);
                append_csv(&csv_path, &row)?;
                tracing::info!(path = %csv_path.display(), "Scan saved to CSV");
                Ok(LocalWrite::CsvFallback {
                    path: csv_path,
                    xlsx_error: e.to_string(),
                })
            }
        }
    }

    /// Newest `limit` rows of a partition, from the spreadsheet and any
    /// CSV fallback rows. A file that cannot be read is skipped so the rows
    /// of the other one still show.
    pub fn history(&self, partition: &str, limit: usize) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut entries = Vec::new();
        for path in [self.xlsx_path(partition), self.csv_path(partition)] {
            if !path.is_file() {
                continue;
            }
            let rows = read_table(&path)
                .map_err(StorageError::from)
                .and_then(|table| Ok(FileLayout::of(&table)?.record_rows(&table)));
            match rows {
                Ok(rows) => entries.extend(rows.iter().map(|r| HistoryEntry::from_cells(r))),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record file");
                }
            }
        }

        // Unparseable timestamps sort last
        entries.sort_by_key(|e| std::cmp::Reverse(e.recorded_at()));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Delete both record files of a partition. Returns the removed paths.
    pub fn clear(&self, partition: &str) -> Result<Vec<PathBuf>, StorageError> {
        let mut removed = Vec::new();
        for path in [self.xlsx_path(partition), self.csv_path(partition)] {
            if path.is_file() {
                std::fs::remove_file(&path)?;
                removed.push(path);
            }
        }
        tracing::info!(partition, files = removed.len(), "Partition history cleared");
        Ok(removed)
    }
}

// ═══════════════════════════════════════════════════════════
// Column layout of existing files
// ═══════════════════════════════════════════════════════════

/// Accepted header names per `RECORD_HEADERS` column, including the first
/// release's `Nama Pengambil` / `Component Number` / `Image Name` layout.
const HEADER_ALIASES: [&[&str]; RECORD_HEADERS.len()] = [
    &["Timestamp"],
    &["Operator ID", "NIK"],
    &["Operator Name", "Nama Pengambil"],
    &["Component Code", "Component Number"],
    &["Component Description", "Description"],
    &["Quantity"],
    &["Reason"],
    &["Image Label", "Image Name"],
    &["Session User"],
];

fn record_column(header: &str) -> Option<usize> {
    let header = header.trim();
    HEADER_ALIASES
        .iter()
        .position(|names| names.iter().any(|n| n.eq_ignore_ascii_case(header)))
}

/// Where each record column sits in an existing file, plus the columns the
/// current layout does not know. Those are carried along on rewrite.
#[derive(Debug)]
struct FileLayout {
    mapping: [Option<usize>; RECORD_HEADERS.len()],
    extras: Vec<(usize, String)>,
}

impl FileLayout {
    fn current() -> Self {
        Self {
            mapping: std::array::from_fn(Some),
            extras: Vec::new(),
        }
    }

    fn of(table: &Table) -> Result<Self, StorageError> {
        if table.headers.is_empty() && table.rows.is_empty() {
            return Ok(Self::current());
        }

        let mut mapping = [None; RECORD_HEADERS.len()];
        let mut extras = Vec::new();
        for (i, header) in table.headers.iter().enumerate() {
            match record_column(header) {
                Some(col) if mapping[col].is_none() => mapping[col] = Some(i),
                _ => {
                    let blank = header.trim().is_empty()
                        && table.rows.iter().all(|row| table.cell(row, i).is_empty());
                    if !blank {
                        extras.push((i, header.trim().to_string()));
                    }
                }
            }
        }

        if mapping[0].is_none() {
            return Err(StorageError::Malformed(format!(
                "unrecognized record columns {:?}",
                table.headers
            )));
        }
        Ok(Self { mapping, extras })
    }

    fn is_current(&self) -> bool {
        self.extras.is_empty() && self.mapping.iter().enumerate().all(|(i, m)| *m == Some(i))
    }

    fn headers(&self) -> Vec<String> {
        RECORD_HEADERS
            .iter()
            .map(|h| h.to_string())
            .chain(self.extras.iter().map(|(_, h)| h.clone()))
            .collect()
    }

    /// Rows in `headers()` order.
    fn rows(&self, table: &Table) -> Vec<Vec<String>> {
        table
            .rows
            .iter()
            .map(|row| {
                let cell = |i: usize| table.cell(row, i).to_string();
                self.mapping
                    .iter()
                    .map(|idx| idx.map(cell).unwrap_or_default())
                    .chain(self.extras.iter().map(|(i, _)| cell(*i)))
                    .collect()
            })
            .collect()
    }

    /// Rows cut to `RECORD_HEADERS`.
    fn record_rows(&self, table: &Table) -> Vec<Vec<String>> {
        let mut rows = self.rows(table);
        for row in &mut rows {
            row.truncate(RECORD_HEADERS.len());
        }
        rows
    }

    /// A new record padded with blanks for the extra columns.
    fn pad(&self, row: &[String]) -> Vec<String> {
        let mut padded = row.to_vec();
        padded.resize(RECORD_HEADERS.len() + self.extras.len(), String::new());
        padded
    }
}

fn append_xlsx(path: &Path, row: &[String]) -> Result<(), StorageError> {
    let (layout, mut rows) = if path.exists() {
        let table = read_table(path)?;
        let layout = FileLayout::of(&table)?;
        let rows = layout.rows(&table);
        (layout, rows)
    } else {
        (FileLayout::current(), Vec::new())
    };
    rows.push(layout.pad(row));

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in layout.headers().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &header_format)?;
    }
    for (r, cells) in rows.iter().enumerate() {
        let xlsx_row = (r + 1) as u32;
        for (col, value) in cells.iter().enumerate() {
            let xlsx_col = col as u16;
            // Codes stay text so leading zeros survive a round trip
            match value.parse::<u32>() {
                Ok(n) if col == QUANTITY_COLUMN => {
                    sheet.write_number(xlsx_row, xlsx_col, n)?;
                }
                _ if col == CODE_COLUMN || !value.is_empty() => {
                    sheet.write_string(xlsx_row, xlsx_col, value)?;
                }
                _ => {}
            }
        }
    }

    // Rewrite through a sibling temp file so a failed save never truncates
    // the existing records.
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::Builder::new()
        .prefix(".scan-")
        .suffix(".xlsx")
        .tempfile_in(dir)?;
    workbook.save(tmp.path())?;
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}

/// Append to the CSV file. A file in an older layout is rewritten in the
/// current one first; a file whose columns are not recognized is refused.
fn append_csv(path: &Path, row: &[String]) -> Result<(), StorageError> {
    let layout = if path.exists() {
        let table = read_table(path)?;
        let layout = FileLayout::of(&table)?;
        if !table.headers.is_empty() && !layout.is_current() {
            return rewrite_csv(path, &layout, &table, row);
        }
        (!table.headers.is_empty()).then_some(layout)
    } else {
        None
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if layout.is_none() {
        writer.write_record(RECORD_HEADERS)?;
    }
    writer.write_record(row)?;
    writer.flush()?;
    Ok(())
}

fn rewrite_csv(path: &Path, layout: &FileLayout, table: &Table, row: &[String]) -> Result<(), StorageError> {
    tracing::info!(path = %path.display(), "Migrating record CSV to the current column layout");
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::Builder::new()
        .prefix(".scan-")
        .suffix(".csv")
        .tempfile_in(dir)?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file());
        writer.write_record(layout.headers())?;
        for existing in layout.rows(table) {
            writer.write_record(&existing)?;
        }
        writer.write_record(layout.pad(row))?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}
