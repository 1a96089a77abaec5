use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;

use super::jpeg::encode_jpeg;
use super::types::OcrEngine;
use super::RecognitionError;
use crate::config::OcrConfig;

/// Remote OCR through the OCR.space `parse/image` endpoint.
///
/// One request per image, no retry. Transport failures surface as
/// `RemoteServiceUnavailable` and the recognizer treats them as "no text".
pub struct OcrSpaceClient {
    endpoint: String,
    api_key: String,
    language: String,
    engine: u8,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OcrSpaceClient {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        language: &str,
        engine: u8,
        timeout_secs: u64,
    ) -> Result<Self, RecognitionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                RecognitionError::RemoteServiceUnavailable(format!(
                    "Failed to create HTTP client: {e}"
                ))
            })?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            language: language.to_string(),
            engine,
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &OcrConfig) -> Result<Self, RecognitionError> {
        Self::new(
            &config.remote_url,
            &config.api_key,
            &config.remote_language,
            config.remote_engine,
            config.remote_timeout_secs,
        )
    }
}

/// Response body from OCR.space parse/image
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Option<Vec<OcrSpaceParsedResult>>,
    #[serde(default)]
    is_errored_on_processing: bool,
    /// String or array of strings depending on the failure.
    #[serde(default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceParsedResult {
    #[serde(default)]
    parsed_text: Option<String>,
}

impl OcrEngine for OcrSpaceClient {
    fn name(&self) -> &'static str {
        "ocr_space"
    }

    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<String>, RecognitionError> {
        let jpeg = encode_jpeg(image_bytes)?;

        let file_part = Part::bytes(jpeg)
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| RecognitionError::ImageProcessing(e.to_string()))?;
        let form = Form::new()
            .text("apikey", self.api_key.clone())
            .text("language", self.language.clone())
            .text("isOverlayRequired", "false")
            .text("OCREngine", self.engine.to_string())
            .part("filename", file_part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    RecognitionError::RemoteServiceUnavailable(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    RecognitionError::RemoteServiceUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RecognitionError::RemoteRejected(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let body = response
            .text()
            .map_err(|e| RecognitionError::ResponseParsing(e.to_string()))?;

        Ok(parse_ocr_space_response(&body)?.into_iter().collect())
    }
}

/// Extract `ParsedResults[0].ParsedText` with CRLF normalized to spaces.
/// Returns `None` when the service processed the image but found nothing.
pub fn parse_ocr_space_response(body: &str) -> Result<Option<String>, RecognitionError> {
    let parsed: OcrSpaceResponse = serde_json::from_str(body)
        .map_err(|e| RecognitionError::ResponseParsing(e.to_string()))?;

    if parsed.is_errored_on_processing {
        let message = parsed
            .error_message
            .map(|value| error_message_text(&value))
            .unwrap_or_else(|| "unspecified processing error".to_string());
        return Err(RecognitionError::RemoteRejected(message));
    }

    let text = parsed
        .parsed_results
        .and_then(|results| results.into_iter().next())
        .and_then(|first| first.parsed_text)
        .map(|t| t.replace("\r\n", " ").trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(text)
}

fn error_message_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}
