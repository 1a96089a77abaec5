pub mod jpeg;
pub mod ocr_space;
pub mod recognizer;
pub mod tesseract;
pub mod types;

pub use jpeg::*;
pub use ocr_space::*;
pub use recognizer::*;
pub use tesseract::*;
pub use types::*;

use thiserror::Error;

/// Why a single engine produced no text. Carried in `EngineAttempt` so the
/// fallback path stays observable instead of being swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("Local OCR engine unavailable: {0}")]
    LocalEngineUnavailable(String),

    #[error("Local OCR engine failed: {0}")]
    LocalEngineFailed(String),

    #[error("Remote OCR service unavailable: {0}")]
    RemoteServiceUnavailable(String),

    #[error("Remote OCR service rejected the image: {0}")]
    RemoteRejected(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}
