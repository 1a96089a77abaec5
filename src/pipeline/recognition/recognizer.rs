use super::types::{EngineAttempt, OcrEngine, RecognitionOutcome};

/// Ordered OCR fallback chain: the first engine that yields text wins.
///
/// In production the chain is the local tesseract engine followed by the
/// remote OCR.space service. Every engine failure is recorded in the outcome
/// and never propagated; "no text" is a valid terminal result.
pub struct TextRecognizer {
    engines: Vec<Box<dyn OcrEngine + Send + Sync>>,
}

impl Default for TextRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecognizer {
    pub fn new() -> Self {
        Self {
            engines: Vec::new(),
        }
    }

    /// Append an engine to the end of the chain.
    pub fn with_engine(mut self, engine: Box<dyn OcrEngine + Send + Sync>) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn engine_names(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    pub fn recognize(&self, image_bytes: &[u8]) -> RecognitionOutcome {
        let _span = tracing::info_span!(
            "recognize_image",
            image_size = image_bytes.len(),
            engines = self.engines.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let mut attempts = Vec::with_capacity(self.engines.len());

        for engine in &self.engines {
            match engine.recognize(image_bytes) {
                Ok(fragments) => {
                    let text = join_fragments(&fragments);
                    if text.is_empty() {
                        tracing::info!(engine = engine.name(), "OCR engine returned no text");
                        attempts.push(EngineAttempt::no_text(engine.name()));
                        continue;
                    }

                    tracing::info!(
                        engine = engine.name(),
                        text_len = text.len(),
                        elapsed_ms = %start.elapsed().as_millis(),
                        "Text recognized"
                    );
                    attempts.push(EngineAttempt::text(engine.name(), text.chars().count()));
                    return RecognitionOutcome {
                        text: Some(text),
                        engine: Some(engine.name()),
                        attempts,
                    };
                }
                Err(e) => {
                    tracing::warn!(engine = engine.name(), error = %e, "OCR engine failed, falling back");
                    attempts.push(EngineAttempt::failed(engine.name(), e));
                }
            }
        }

        tracing::warn!(
            attempts = attempts.len(),
            elapsed_ms = %start.elapsed().as_millis(),
            "No engine recognized any text"
        );
        RecognitionOutcome {
            text: None,
            engine: None,
            attempts,
        }
    }
}

/// Trim fragments, drop empty ones, join with single spaces.
fn join_fragments(fragments: &[String]) -> String {
    fragments
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
