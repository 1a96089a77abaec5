use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::CatalogError;
use crate::models::{ComponentRecord, ScanCandidate, ValidatedScan};
use crate::pipeline::ScanError;
use crate::tabular::read_table;

/// Read-only component catalog keyed by exact code string.
#[derive(Debug, Clone)]
pub struct ComponentCatalog {
    source: PathBuf,
    by_code: HashMap<String, ComponentRecord>,
}

impl ComponentCatalog {
    /// Load a CSV or spreadsheet catalog.
    ///
    /// Rows with an empty code are skipped. When a code repeats, the first
    /// row wins.
    pub fn load(
        path: &Path,
        code_column: &str,
        description_column: &str,
    ) -> Result<Self, CatalogError> {
        let table =
            read_table(path).map_err(|e| CatalogError::from_table(path.to_path_buf(), e))?;

        let code_idx = table
            .column_index(code_column)
            .ok_or_else(|| CatalogError::MissingColumn {
                column: code_column.to_string(),
                path: path.to_path_buf(),
            })?;
        let desc_idx = table
            .column_index(description_column)
            .ok_or_else(|| CatalogError::MissingColumn {
                column: description_column.to_string(),
                path: path.to_path_buf(),
            })?;

        let records = table.rows.iter().map(|row| ComponentRecord {
            code: table.cell(row, code_idx).to_string(),
            description: table.cell(row, desc_idx).to_string(),
        });
        let catalog = Self::from_records(path, records);

        tracing::info!(
            path = %path.display(),
            components = catalog.len(),
            "Component catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_records<I>(source: &Path, records: I) -> Self
    where
        I: IntoIterator<Item = ComponentRecord>,
    {
        let mut by_code = HashMap::new();
        let mut duplicates = 0usize;
        for record in records {
            if record.code.is_empty() {
                continue;
            }
            if by_code.contains_key(&record.code) {
                duplicates += 1;
                continue;
            }
            by_code.insert(record.code.clone(), record);
        }
        if duplicates > 0 {
            tracing::warn!(duplicates, "Duplicate component codes in catalog, kept first");
        }
        Self {
            source: source.to_path_buf(),
            by_code,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    pub fn lookup(&self, code: &str) -> Option<&ComponentRecord> {
        self.by_code.get(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentValidation {
    pub code: String,
    pub valid: bool,
    pub description: Option<String>,
}

/// Exact string lookup; "0012345" and "12345" are different codes.
pub fn validate_component(code: &str, catalog: &ComponentCatalog) -> ComponentValidation {
    let record = catalog.lookup(code);
    ComponentValidation {
        code: code.to_string(),
        valid: record.is_some(),
        description: record.map(|r| r.description.clone()),
    }
}

/// Promote a candidate to a `ValidatedScan`, or reject it.
pub fn validate_candidate(
    candidate: ScanCandidate,
    catalog: &ComponentCatalog,
) -> Result<ValidatedScan, ScanError> {
    let validation = validate_component(&candidate.code, catalog);
    match validation.description {
        Some(description) if validation.valid => {
            tracing::info!(code = %candidate.code, source = %candidate.source, "Component validated");
            Ok(ValidatedScan::new(candidate, description))
        }
        _ => {
            tracing::warn!(code = %candidate.code, "Component code not in catalog");
            Err(ScanError::CodeNotInCatalog(candidate.code))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScanSource;

    fn catalog() -> ComponentCatalog {
        ComponentCatalog::from_records(
            Path::new("mem"),
            vec![
                ComponentRecord {
                    code: "0012345".into(),
                    description: "Spring washer M6".into(),
                },
                ComponentRecord {
                    code: "1234567".into(),
                    description: "Hex bolt M8x30".into(),
                },
                ComponentRecord {
                    code: "1234567".into(),
                    description: "duplicate row".into(),
                },
                ComponentRecord {
                    code: "".into(),
                    description: "no code".into(),
                },
            ],
        )
    }

    #[test]
    fn exact_match_is_valid() {
        let result = validate_component("1234567", &catalog());
        assert!(result.valid);
        assert_eq!(result.description.as_deref(), Some("Hex bolt M8x30"));
    }

    #[test]
    fn leading_zeros_are_significant() {
        let catalog = catalog();
        assert!(validate_component("0012345", &catalog).valid);
        assert!(!validate_component("12345", &catalog).valid);
        assert!(!validate_component("012345", &catalog).valid);
    }

    #[test]
    fn unknown_code_is_invalid_without_description() {
        let result = validate_component("7654321", &catalog());
        assert!(!result.valid);
        assert!(result.description.is_none());
    }

    #[test]
    fn duplicates_and_blank_codes_skipped() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.lookup("").is_none());
    }

    #[test]
    fn candidate_rejected_when_not_in_catalog() {
        let candidate =
            ScanCandidate::new("7654321".into(), ScanSource::Manual, "7654321".into(), "N/A".into());
        let err = validate_candidate(candidate, &catalog()).unwrap_err();
        assert!(matches!(err, ScanError::CodeNotInCatalog(ref c) if c == "7654321"));
    }

    #[test]
    fn candidate_promoted_with_description() {
        let candidate =
            ScanCandidate::new("0012345".into(), ScanSource::Camera, "x".into(), "cam.jpg".into());
        let validated = validate_candidate(candidate, &catalog()).unwrap();
        assert_eq!(validated.code(), "0012345");
        assert_eq!(validated.description(), "Spring washer M6");
    }

    #[test]
    fn load_csv_with_custom_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("komponen.csv");
        std::fs::write(
            &path,
            "Component Number,Nama Barang\n0012345,Spring washer\n7000001,Relay 24V\n",
        )
        .unwrap();

        let catalog = ComponentCatalog::load(&path, "component number", "nama barang").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup("0012345").unwrap().description, "Spring washer");
        assert_eq!(catalog.source(), path.as_path());
    }

    #[test]
    fn missing_file_reported_as_missing() {
        let err = ComponentCatalog::load(Path::new("/nonexistent/components.csv"), "code", "description")
            .unwrap_err();
        assert!(matches!(err, CatalogError::Missing(_)));
        let scan_err: ScanError = err.into();
        assert!(matches!(scan_err, ScanError::CatalogMissing(_)));
    }

    #[test]
    fn missing_column_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("components.csv");
        std::fs::write(&path, "sku,description\n1234567,Bolt\n").unwrap();
        let err = ComponentCatalog::load(&path, "code", "description").unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn { ref column, .. } if column == "code"));
    }

    #[test]
    fn load_xlsx_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("components.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "code").unwrap();
        sheet.write_string(0, 1, "description").unwrap();
        sheet.write_string(1, 0, "0012345").unwrap();
        sheet.write_string(1, 1, "Spring washer").unwrap();
        sheet.write_number(2, 0, 7000001.0).unwrap();
        sheet.write_string(2, 1, "Relay").unwrap();
        workbook.save(&path).unwrap();

        let catalog = ComponentCatalog::load(&path, "code", "description").unwrap();
        assert!(validate_component("0012345", &catalog).valid, "text cell keeps zeros");
        assert!(validate_component("7000001", &catalog).valid, "numeric cell as integer");
    }
}
