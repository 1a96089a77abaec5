pub mod credentials;
pub mod local;
pub mod persister;
pub mod remote;

pub use credentials::*;
pub use local::*;
pub use persister::*;
pub use remote::*;

use thiserror::Error;

use crate::tabular::TableError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Cannot read spreadsheet: {0}")]
    XlsxRead(#[from] TableError),

    #[error("Cannot write spreadsheet: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Remote sheet unreachable: {0}")]
    Remote(String),

    #[error("Remote sheet returned HTTP {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("Remote sheet not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed data: {0}")]
    Malformed(String),
}
