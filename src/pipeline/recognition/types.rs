use serde::Serialize;

use super::RecognitionError;

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    /// Short stable name used in logs and attempt reports.
    fn name(&self) -> &'static str;

    /// Recognize text fragments in an encoded image (PNG, JPEG, ...).
    /// An empty vector means the engine ran but saw no text.
    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<String>, RecognitionError>;
}

/// What one engine contributed to a recognition pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptResult {
    Text { chars: usize },
    NoText,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineAttempt {
    pub engine: &'static str,
    pub result: AttemptResult,
    /// Kept typed so callers can branch on the failure kind.
    pub failure: Option<RecognitionError>,
}

impl EngineAttempt {
    pub fn text(engine: &'static str, chars: usize) -> Self {
        Self {
            engine,
            result: AttemptResult::Text { chars },
            failure: None,
        }
    }

    pub fn no_text(engine: &'static str) -> Self {
        Self {
            engine,
            result: AttemptResult::NoText,
            failure: None,
        }
    }

    pub fn failed(engine: &'static str, error: RecognitionError) -> Self {
        Self {
            engine,
            result: AttemptResult::Failed {
                reason: error.to_string(),
            },
            failure: Some(error),
        }
    }
}

/// Result of a full recognition pass across all configured engines.
/// Absence of text is a valid outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOutcome {
    pub text: Option<String>,
    /// Engine that produced `text`.
    pub engine: Option<&'static str>,
    pub attempts: Vec<EngineAttempt>,
}

impl RecognitionOutcome {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
    }

    /// Failure reported by a specific engine, if it failed.
    pub fn failure_of(&self, engine: &str) -> Option<&RecognitionError> {
        self.attempts
            .iter()
            .find(|a| a.engine == engine)
            .and_then(|a| a.failure.as_ref())
    }
}

/// Mock OCR engine for unit testing without Tesseract or network.
pub struct MockOcrEngine {
    name: &'static str,
    fragments: Vec<String>,
}

impl MockOcrEngine {
    pub fn new(name: &'static str, fragments: &[&str]) -> Self {
        Self {
            name,
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Engine that runs but never sees text.
    pub fn blank(name: &'static str) -> Self {
        Self::new(name, &[])
    }
}

impl OcrEngine for MockOcrEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<String>, RecognitionError> {
        Ok(self.fragments.clone())
    }
}

/// Engine that always fails with the configured error.
pub struct FailingOcrEngine {
    name: &'static str,
    error: RecognitionError,
}

impl FailingOcrEngine {
    pub fn new(name: &'static str, error: RecognitionError) -> Self {
        Self { name, error }
    }
}

impl OcrEngine for FailingOcrEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<String>, RecognitionError> {
        Err(self.error.clone())
    }
}
