pub mod component;
pub mod operator;

pub use component::*;
pub use operator::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::tabular::TableError;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog file not found: {0}")]
    Missing(PathBuf),

    #[error("Column {column:?} not found in {path}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("Cannot read catalog {path}: {source}")]
    Unreadable { path: PathBuf, source: TableError },
}

impl CatalogError {
    pub(crate) fn from_table(path: PathBuf, source: TableError) -> Self {
        match source {
            TableError::NotFound(missing) => Self::Missing(missing),
            source => Self::Unreadable { path, source },
        }
    }
}
