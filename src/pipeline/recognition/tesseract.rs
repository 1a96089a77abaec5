use std::path::{Path, PathBuf};

use super::jpeg::validate_image_bytes;
use super::types::OcrEngine;
use super::RecognitionError;

/// Local Tesseract OCR through libtesseract.
/// Only functional when compiled with the `ocr` feature flag; otherwise every
/// call reports `LocalEngineUnavailable` and the recognizer moves on.
pub struct LocalTesseract {
    /// `None` lets libtesseract use `TESSDATA_PREFIX` or its built-in path.
    tessdata_dir: Option<PathBuf>,
    language: String,
}

impl LocalTesseract {
    pub fn new(tessdata_dir: Option<&Path>, language: &str) -> Self {
        Self {
            tessdata_dir: tessdata_dir.map(Path::to_path_buf),
            language: language.to_string(),
        }
    }

    /// Start the engine once with the configured language data.
    pub fn check(&self) -> Result<String, RecognitionError> {
        self.check_ready()?;
        Ok(format!("libtesseract, language {}", self.language))
    }
}

#[cfg(feature = "ocr")]
impl LocalTesseract {
    fn init(&self) -> Result<leptess::LepTess, RecognitionError> {
        let data_path = match &self.tessdata_dir {
            Some(dir) => Some(dir.to_str().ok_or_else(|| {
                RecognitionError::LocalEngineUnavailable("Invalid tessdata path".into())
            })?),
            None => None,
        };
        leptess::LepTess::new(data_path, &self.language).map_err(|e| {
            RecognitionError::LocalEngineUnavailable(format!(
                "Cannot load tesseract data for {:?}: {e:?}",
                self.language
            ))
        })
    }

    fn check_ready(&self) -> Result<(), RecognitionError> {
        self.init().map(|_| ())
    }

    fn read_text(&self, image_bytes: &[u8]) -> Result<String, RecognitionError> {
        let mut tess = self.init()?;
        tess.set_image_from_mem(image_bytes)
            .map_err(|e| RecognitionError::LocalEngineFailed(format!("{e:?}")))?;
        tess.get_utf8_text()
            .map_err(|e| RecognitionError::LocalEngineFailed(format!("Invalid OCR output: {e}")))
    }
}

#[cfg(not(feature = "ocr"))]
impl LocalTesseract {
    fn check_ready(&self) -> Result<(), RecognitionError> {
        Err(RecognitionError::LocalEngineUnavailable(
            "built without the `ocr` feature".into(),
        ))
    }

    fn read_text(&self, _image_bytes: &[u8]) -> Result<String, RecognitionError> {
        self.check_ready().map(|_| String::new())
    }
}

impl OcrEngine for LocalTesseract {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<String>, RecognitionError> {
        validate_image_bytes(image_bytes)?;
        let text = self.read_text(image_bytes)?;
        let fragments = text_fragments(&text);
        tracing::debug!(fragments = fragments.len(), "tesseract finished");
        Ok(fragments)
    }
}

/// Split recognized text into trimmed, non-empty lines.
/// Form feeds separate pages and are treated as whitespace.
fn text_fragments(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() || c == '\u{c}'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::recognition::jpeg::test_images::gradient_png;
    use crate::pipeline::recognition::{MockOcrEngine, TextRecognizer};

    fn unusable() -> LocalTesseract {
        LocalTesseract::new(Some(Path::new("/nonexistent/tessdata")), "eng")
    }

    #[test]
    fn text_lines_become_fragments() {
        let text = "PART NO\n\n  1234567  \nQTY 10\n\u{c}";
        assert_eq!(text_fragments(text), vec!["PART NO", "1234567", "QTY 10"]);
    }

    #[test]
    fn blank_text_has_no_fragments() {
        assert!(text_fragments("\n \n\u{c}\n").is_empty());
    }

    #[test]
    fn missing_language_data_is_unavailable() {
        let engine = unusable();
        let err = engine.recognize(&gradient_png()).unwrap_err();
        assert!(matches!(err, RecognitionError::LocalEngineUnavailable(_)));
        assert!(matches!(
            engine.check(),
            Err(RecognitionError::LocalEngineUnavailable(_))
        ));
    }

    #[cfg(not(feature = "ocr"))]
    #[test]
    fn without_ocr_feature_engine_is_unavailable() {
        let engine = LocalTesseract::new(None, "eng");
        let err = engine.recognize(&gradient_png()).unwrap_err();
        assert!(err.to_string().contains("`ocr` feature"));
    }

    #[test]
    fn invalid_bytes_rejected_before_engine_starts() {
        assert!(matches!(
            unusable().recognize(b"x"),
            Err(RecognitionError::ImageProcessing(_))
        ));
    }

    #[test]
    fn unavailable_local_engine_falls_through_to_next() {
        let recognizer = TextRecognizer::new()
            .with_engine(Box::new(unusable()))
            .with_engine(Box::new(MockOcrEngine::new("remote", &["LOT 1234567"])));
        let outcome = recognizer.recognize(&gradient_png());
        assert_eq!(outcome.engine, Some("remote"));
        assert_eq!(outcome.attempts.len(), 2);
        assert!(matches!(
            outcome.attempts[0].failure,
            Some(RecognitionError::LocalEngineUnavailable(_))
        ));
    }
}
