pub mod extraction;
pub mod recognition;
pub mod session;
pub mod validation;

use std::path::PathBuf;

use thiserror::Error;

use recognition::EngineAttempt;
use validation::CatalogError;

/// Failures of one scan attempt. All are recoverable: the operator retries,
/// types the code by hand, or cancels.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Component catalog not found at {0}")]
    CatalogMissing(PathBuf),

    #[error("Catalog error: {0}")]
    Catalog(CatalogError),

    #[error("No text recognized ({} engine attempt(s)); enter the code manually", .attempts.len())]
    RecognitionEmpty { attempts: Vec<EngineAttempt> },

    #[error("No 7-digit code found in recognized text: {raw_text:?}")]
    NoCodeFound { raw_text: String },

    #[error("Component code {0} is not in the catalog")]
    CodeNotInCatalog(String),

    #[error("Invalid component code {0:?}: expected exactly 7 digits")]
    InvalidManualCode(String),

    #[error("Invalid operator identifier {0:?}: expected exactly 6 digits")]
    InvalidOperatorFormat(String),

    #[error("Operator {0} is not in the operator catalog")]
    OperatorNotFound(String),

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Cannot {operation} while the scan is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },
}

impl From<CatalogError> for ScanError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Missing(path) => Self::CatalogMissing(path),
            other => Self::Catalog(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_catalog_maps_to_catalog_missing() {
        let err: ScanError = CatalogError::Missing(PathBuf::from("/x/components.csv")).into();
        assert!(matches!(err, ScanError::CatalogMissing(ref p) if p.ends_with("components.csv")));
    }

    #[test]
    fn other_catalog_errors_stay_wrapped() {
        let err: ScanError = CatalogError::MissingColumn {
            column: "code".into(),
            path: PathBuf::from("c.csv"),
        }
        .into();
        assert!(matches!(err, ScanError::Catalog(CatalogError::MissingColumn { .. })));
    }

    #[test]
    fn messages_are_operator_readable() {
        let err = ScanError::NoCodeFound {
            raw_text: "LOT A12".into(),
        };
        assert_eq!(
            err.to_string(),
            "No 7-digit code found in recognized text: \"LOT A12\""
        );
        let err = ScanError::RecognitionEmpty { attempts: vec![] };
        assert!(err.to_string().contains("enter the code manually"));
    }
}
