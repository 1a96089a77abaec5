use std::sync::LazyLock;

use regex::Regex;

use super::ScanError;
pub use crate::models::CodeBoundary;

/// Length of a component code.
pub const COMPONENT_CODE_LEN: usize = 7;

// ASCII classes on purpose: `\d` would also accept non-Latin digits.
static PLAIN_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{7}").unwrap());
static WORD_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[0-9]{7}\b").unwrap());

/// A code picked out of recognized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCode {
    pub code: String,
    /// Later matches, in text order. First match wins; these are only
    /// reported so the operator can double-check.
    pub additional_matches: Vec<String>,
}

/// Find the first 7-digit run in `text`.
///
/// `Plain` takes the first seven digits of any longer run, `Word` only
/// accepts runs of exactly seven digits bounded by non-word characters.
pub fn extract_component_code(text: &str, boundary: CodeBoundary) -> Option<ExtractedCode> {
    let pattern = match boundary {
        CodeBoundary::Plain => &*PLAIN_CODE,
        CodeBoundary::Word => &*WORD_CODE,
    };

    let mut matches = pattern.find_iter(text).map(|m| m.as_str().to_string());
    let code = matches.next()?;
    let additional_matches: Vec<String> = matches.collect();

    if !additional_matches.is_empty() {
        tracing::warn!(
            code = %code,
            others = additional_matches.len(),
            "Multiple 7-digit codes in text, using the first"
        );
    }

    Some(ExtractedCode {
        code,
        additional_matches,
    })
}

/// Shape check for a typed component code: exactly seven ASCII digits.
pub fn check_manual_code(input: &str) -> Result<String, ScanError> {
    let trimmed = input.trim();
    if trimmed.len() == COMPONENT_CODE_LEN && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        Ok(trimmed.to_string())
    } else {
        Err(ScanError::InvalidManualCode(input.to_string()))
    }
}
