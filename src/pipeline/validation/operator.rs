use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use super::CatalogError;
use crate::models::{OperatorIdentity, OperatorRecord};
use crate::pipeline::ScanError;
use crate::tabular::read_table;

/// Length of an operator personnel number (NIK).
pub const OPERATOR_ID_LEN: usize = 6;

/// Read-only operator catalog keyed by personnel number.
#[derive(Debug, Clone)]
pub struct OperatorCatalog {
    by_id: HashMap<String, OperatorRecord>,
}

impl OperatorCatalog {
    pub fn load(path: &Path, id_column: &str, name_column: &str) -> Result<Self, CatalogError> {
        let table =
            read_table(path).map_err(|e| CatalogError::from_table(path.to_path_buf(), e))?;

        let id_idx = table
            .column_index(id_column)
            .ok_or_else(|| CatalogError::MissingColumn {
                column: id_column.to_string(),
                path: path.to_path_buf(),
            })?;
        let name_idx = table
            .column_index(name_column)
            .ok_or_else(|| CatalogError::MissingColumn {
                column: name_column.to_string(),
                path: path.to_path_buf(),
            })?;

        let catalog = Self::from_records(table.rows.iter().map(|row| OperatorRecord {
            personnel_number: table.cell(row, id_idx).to_string(),
            name: table.cell(row, name_idx).to_string(),
        }));
        tracing::info!(path = %path.display(), operators = catalog.len(), "Operator catalog loaded");
        Ok(catalog)
    }

    /// Like `load`, but an absent file is `Ok(None)`: operator checks are
    /// permissive without a catalog.
    pub fn load_optional(
        path: &Path,
        id_column: &str,
        name_column: &str,
    ) -> Result<Option<Self>, CatalogError> {
        match Self::load(path, id_column, name_column) {
            Ok(catalog) => Ok(Some(catalog)),
            Err(CatalogError::Missing(_)) => {
                tracing::warn!(path = %path.display(), "Operator catalog not found, operator checks are permissive");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = OperatorRecord>,
    {
        let mut by_id = HashMap::new();
        for record in records {
            if record.personnel_number.is_empty() {
                continue;
            }
            by_id.entry(record.personnel_number.clone()).or_insert(record);
        }
        Self { by_id }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn lookup(&self, personnel_number: &str) -> Option<&OperatorRecord> {
        self.by_id.get(personnel_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorValidation {
    pub personnel_number: String,
    pub valid: bool,
    pub name: Option<String>,
    /// False when no catalog was available and the operator was let through.
    pub verified: bool,
}

impl OperatorValidation {
    /// Identity for a record, or `OperatorNotFound` for an invalid result.
    pub fn into_identity(self) -> Result<OperatorIdentity, ScanError> {
        if !self.valid {
            return Err(ScanError::OperatorNotFound(self.personnel_number));
        }
        Ok(OperatorIdentity {
            id: self.personnel_number,
            name: self.name,
        })
    }
}

/// Check a typed operator identifier.
///
/// Surrounding whitespace is ignored; the rest must be exactly six ASCII
/// digits or the lookup is never attempted.
pub fn validate_operator(
    input: &str,
    catalog: Option<&OperatorCatalog>,
) -> Result<OperatorValidation, ScanError> {
    let personnel_number = input.trim();
    if personnel_number.len() != OPERATOR_ID_LEN
        || !personnel_number.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(ScanError::InvalidOperatorFormat(input.to_string()));
    }

    let Some(catalog) = catalog else {
        tracing::warn!(
            operator = personnel_number,
            "No operator catalog, accepting operator unverified"
        );
        return Ok(OperatorValidation {
            personnel_number: personnel_number.to_string(),
            valid: true,
            name: None,
            verified: false,
        });
    };

    let record = catalog.lookup(personnel_number);
    Ok(OperatorValidation {
        personnel_number: personnel_number.to_string(),
        valid: record.is_some(),
        name: record.map(|r| r.name.clone()),
        verified: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> OperatorCatalog {
        OperatorCatalog::from_records(vec![
            OperatorRecord {
                personnel_number: "012345".into(),
                name: "Dewi".into(),
            },
            OperatorRecord {
                personnel_number: "654321".into(),
                name: "Agus".into(),
            },
        ])
    }

    #[test]
    fn non_digit_rejected_before_lookup() {
        let err = validate_operator("12A456", Some(&catalog())).unwrap_err();
        assert!(matches!(err, ScanError::InvalidOperatorFormat(ref s) if s == "12A456"));
    }

    #[test]
    fn wrong_length_rejected() {
        for bad in ["12345", "1234567", ""] {
            assert!(matches!(
                validate_operator(bad, None),
                Err(ScanError::InvalidOperatorFormat(_))
            ));
        }
    }

    #[test]
    fn known_operator_resolves_name() {
        let result = validate_operator(" 012345 ", Some(&catalog())).unwrap();
        assert!(result.valid);
        assert!(result.verified);
        assert_eq!(result.personnel_number, "012345");
        assert_eq!(result.name.as_deref(), Some("Dewi"));
    }

    #[test]
    fn unknown_operator_invalid() {
        let result = validate_operator("111111", Some(&catalog())).unwrap();
        assert!(!result.valid);
        assert!(result.name.is_none());
        assert!(matches!(
            result.into_identity(),
            Err(ScanError::OperatorNotFound(ref id)) if id == "111111"
        ));
    }

    #[test]
    fn absent_catalog_is_permissive_but_flagged() {
        let result = validate_operator("111111", None).unwrap();
        assert!(result.valid);
        assert!(!result.verified);
        assert!(result.name.is_none());
        let identity = result.into_identity().unwrap();
        assert_eq!(identity.id, "111111");
        assert!(identity.name.is_none());
    }

    #[test]
    fn load_optional_missing_file_is_none() {
        let loaded =
            OperatorCatalog::load_optional(Path::new("/nonexistent/operators.csv"), "nik", "name")
                .unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_optional_keeps_real_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("operators.csv");
        std::fs::write(&path, "id,fullname\n123456,Rina\n").unwrap();
        let err = OperatorCatalog::load_optional(&path, "nik", "name").unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn { .. }));
    }

    #[test]
    fn load_csv_keeps_leading_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("operators.csv");
        std::fs::write(&path, "NIK,Name\n012345,Dewi\n").unwrap();
        let catalog = OperatorCatalog::load(&path, "nik", "name").unwrap();
        assert_eq!(catalog.lookup("012345").unwrap().name, "Dewi");
    }
}
