//! Per-scan state machine.
//!
//! One candidate is in flight at a time. Recognition is entered only from
//! `Acquired`, validation only from `Extracted`, and only a `Validated`
//! scan can be confirmed into a `ScanEvent`.

use chrono::{Local, NaiveDateTime};

use super::extraction::{check_manual_code, extract_component_code, CodeBoundary};
use super::recognition::{EngineAttempt, TextRecognizer};
use super::validation::{validate_candidate, ComponentCatalog};
use super::ScanError;
use crate::models::{
    OperatorIdentity, Quantity, ScanCandidate, ScanEvent, ScanSource, SessionUser,
    ValidatedScan, MANUAL_IMAGE_LABEL,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    Idle,
    Acquired {
        image: Vec<u8>,
        source: ScanSource,
        label: String,
    },
    /// Transient while engines run.
    Recognizing,
    Extracted(ScanCandidate),
    RecognitionEmpty {
        attempts: Vec<EngineAttempt>,
    },
    NoCodeFound {
        raw_text: String,
    },
    Validated(ValidatedScan),
    Rejected {
        code: String,
    },
}

impl ScanState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquired { .. } => "acquired",
            Self::Recognizing => "recognizing",
            Self::Extracted(_) => "extracted",
            Self::RecognitionEmpty { .. } => "recognition_empty",
            Self::NoCodeFound { .. } => "no_code_found",
            Self::Validated(_) => "validated",
            Self::Rejected { .. } => "rejected",
        }
    }
}

#[derive(Debug)]
pub struct ScanSession {
    state: ScanState,
    user: Option<SessionUser>,
    /// Engine whose text produced the current candidate.
    recognized_by: Option<&'static str>,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            state: ScanState::Idle,
            user: None,
            recognized_by: None,
        }
    }

    pub fn with_user(user: SessionUser) -> Self {
        Self {
            state: ScanState::Idle,
            user: Some(user),
            recognized_by: None,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn recognized_by(&self) -> Option<&'static str> {
        self.recognized_by
    }

    pub fn validated(&self) -> Option<&ValidatedScan> {
        match &self.state {
            ScanState::Validated(validated) => Some(validated),
            _ => None,
        }
    }

    /// The pending candidate, before or after validation.
    pub fn candidate(&self) -> Option<&ScanCandidate> {
        match &self.state {
            ScanState::Extracted(candidate) => Some(candidate),
            ScanState::Validated(validated) => Some(validated.candidate()),
            _ => None,
        }
    }

    pub fn acquire(
        &mut self,
        image: Vec<u8>,
        source: ScanSource,
        label: &str,
    ) -> Result<(), ScanError> {
        self.expect_state("acquire", |s| matches!(s, ScanState::Idle))?;
        tracing::debug!(source = %source, image_size = image.len(), "Image acquired");
        self.state = ScanState::Acquired {
            image,
            source,
            label: label.to_string(),
        };
        Ok(())
    }

    /// Run the recognizer on the acquired image and extract a code.
    ///
    /// Empty text and text without a code both leave the session in a
    /// state that accepts manual entry.
    pub fn recognize(
        &mut self,
        recognizer: &TextRecognizer,
        boundary: CodeBoundary,
    ) -> Result<&ScanCandidate, ScanError> {
        self.expect_state("recognize", |s| matches!(s, ScanState::Acquired { .. }))?;
        let ScanState::Acquired {
            image,
            source,
            label,
        } = std::mem::replace(&mut self.state, ScanState::Recognizing)
        else {
            return Err(self.invalid("recognize"));
        };

        let outcome = recognizer.recognize(&image);
        let Some(text) = outcome.text else {
            self.state = ScanState::RecognitionEmpty {
                attempts: outcome.attempts.clone(),
            };
            return Err(ScanError::RecognitionEmpty {
                attempts: outcome.attempts,
            });
        };

        let Some(extracted) = extract_component_code(&text, boundary) else {
            tracing::info!(text_len = text.len(), "Recognized text holds no component code");
            self.state = ScanState::NoCodeFound {
                raw_text: text.clone(),
            };
            return Err(ScanError::NoCodeFound { raw_text: text });
        };

        let mut candidate = ScanCandidate::new(extracted.code, source, text, label);
        candidate.additional_matches = extracted.additional_matches;
        tracing::info!(code = %candidate.code, source = %candidate.source, "Code extracted");
        self.recognized_by = outcome.engine;
        self.state = ScanState::Extracted(candidate);
        self.candidate().ok_or_else(|| self.invalid("recognize"))
    }

    /// Manual-entry fallback. A badly shaped code leaves the state unchanged.
    pub fn enter_manual(&mut self, input: &str) -> Result<&ScanCandidate, ScanError> {
        self.expect_state("enter a code", |s| {
            matches!(
                s,
                ScanState::Idle
                    | ScanState::RecognitionEmpty { .. }
                    | ScanState::NoCodeFound { .. }
                    | ScanState::Rejected { .. }
            )
        })?;
        let code = check_manual_code(input)?;
        let candidate = ScanCandidate::new(
            code,
            ScanSource::Manual,
            input.to_string(),
            MANUAL_IMAGE_LABEL.to_string(),
        );
        tracing::info!(code = %candidate.code, "Manual code entered");
        self.recognized_by = None;
        self.state = ScanState::Extracted(candidate);
        self.candidate().ok_or_else(|| self.invalid("enter a code"))
    }

    pub fn validate(&mut self, catalog: &ComponentCatalog) -> Result<&ValidatedScan, ScanError> {
        self.expect_state("validate", |s| matches!(s, ScanState::Extracted(_)))?;
        let ScanState::Extracted(candidate) = std::mem::replace(&mut self.state, ScanState::Idle)
        else {
            return Err(self.invalid("validate"));
        };

        match validate_candidate(candidate, catalog) {
            Ok(validated) => {
                self.state = ScanState::Validated(validated);
                match &self.state {
                    ScanState::Validated(validated) => Ok(validated),
                    _ => Err(self.invalid("validate")),
                }
            }
            Err(ScanError::CodeNotInCatalog(code)) => {
                self.state = ScanState::Rejected { code: code.clone() };
                Err(ScanError::CodeNotInCatalog(code))
            }
            Err(e) => Err(e),
        }
    }

    /// Turn the validated scan into an event stamped with local time.
    pub fn confirm(
        &mut self,
        operator: &OperatorIdentity,
        quantity: u32,
        reason: &str,
    ) -> Result<ScanEvent, ScanError> {
        self.confirm_at(operator, quantity, reason, Local::now().naive_local())
    }

    pub fn confirm_at(
        &mut self,
        operator: &OperatorIdentity,
        quantity: u32,
        reason: &str,
        recorded_at: NaiveDateTime,
    ) -> Result<ScanEvent, ScanError> {
        let ScanState::Validated(validated) = &self.state else {
            return Err(self.invalid("confirm"));
        };
        let quantity = Quantity::new(quantity).ok_or(ScanError::InvalidQuantity)?;
        let session_user = self.user.as_ref().map(|u| u.nik.as_str()).unwrap_or("");

        let event = ScanEvent::new(
            validated,
            operator,
            quantity,
            reason,
            session_user,
            recorded_at,
        );
        tracing::info!(
            code = event.component_code(),
            operator = event.operator_id(),
            quantity = event.quantity().get(),
            "Scan confirmed"
        );
        self.state = ScanState::Idle;
        self.recognized_by = None;
        Ok(event)
    }

    /// Discard whatever is pending. Allowed from any state.
    pub fn cancel(&mut self) {
        if !matches!(self.state, ScanState::Idle) {
            tracing::info!(state = self.state_name(), "Scan cancelled");
        }
        self.state = ScanState::Idle;
        self.recognized_by = None;
    }

    /// Logout: cancel and forget the session user.
    pub fn reset(&mut self) {
        self.cancel();
        self.user = None;
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: impl Fn(&ScanState) -> bool,
    ) -> Result<(), ScanError> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> ScanError {
        ScanError::InvalidTransition {
            operation,
            state: self.state_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::ComponentRecord;
    use crate::pipeline::recognition::{FailingOcrEngine, MockOcrEngine, RecognitionError};

    fn catalog() -> ComponentCatalog {
        ComponentCatalog::from_records(
            Path::new("mem"),
            vec![
                ComponentRecord {
                    code: "1234567".into(),
                    description: "Hex bolt M8".into(),
                },
                ComponentRecord {
                    code: "0012345".into(),
                    description: "Washer".into(),
                },
            ],
        )
    }

    fn recognizer(text: &[&str]) -> TextRecognizer {
        TextRecognizer::new().with_engine(Box::new(MockOcrEngine::new("local", text)))
    }

    fn operator() -> OperatorIdentity {
        OperatorIdentity {
            id: "123456".into(),
            name: Some("Sari".into()),
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn happy_path_from_image_to_event() {
        let mut session = ScanSession::with_user(SessionUser {
            nik: "654321".into(),
            name: "Budi".into(),
        });
        session
            .acquire(b"jpeg".to_vec(), ScanSource::Camera, "camera_capture.jpg")
            .unwrap();
        let candidate = session
            .recognize(&recognizer(&["ABC 1234567 XYZ"]), CodeBoundary::Plain)
            .unwrap();
        assert_eq!(candidate.code, "1234567");
        assert_eq!(session.state_name(), "extracted");
        assert_eq!(session.recognized_by(), Some("local"));

        let validated = session.validate(&catalog()).unwrap();
        assert_eq!(validated.description(), "Hex bolt M8");

        let event = session.confirm_at(&operator(), 2, "rework", noon()).unwrap();
        assert_eq!(event.component_code(), "1234567");
        assert_eq!(event.quantity().get(), 2);
        assert_eq!(event.session_user(), "654321");
        assert_eq!(event.image_label(), "camera_capture.jpg");
        assert_eq!(session.state(), &ScanState::Idle);
    }

    #[test]
    fn multiple_codes_keep_first_and_report_others() {
        let mut session = ScanSession::new();
        session.acquire(b"x".to_vec(), ScanSource::Upload, "a.jpg").unwrap();
        let candidate = session
            .recognize(&recognizer(&["1234567 and 7654321"]), CodeBoundary::Word)
            .unwrap();
        assert_eq!(candidate.code, "1234567");
        assert!(candidate.is_ambiguous());
    }

    #[test]
    fn empty_recognition_allows_manual_entry() {
        let remote_down = TextRecognizer::new()
            .with_engine(Box::new(MockOcrEngine::blank("local")))
            .with_engine(Box::new(FailingOcrEngine::new(
                "remote",
                RecognitionError::RemoteServiceUnavailable("dns".into()),
            )));

        let mut session = ScanSession::new();
        session.acquire(b"x".to_vec(), ScanSource::Upload, "a.jpg").unwrap();
        let err = session.recognize(&remote_down, CodeBoundary::Plain).unwrap_err();
        match err {
            ScanError::RecognitionEmpty { attempts } => assert_eq!(attempts.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.state_name(), "recognition_empty");

        let candidate = session.enter_manual("1234567").unwrap();
        assert_eq!(candidate.source, ScanSource::Manual);
        assert_eq!(candidate.image_label, MANUAL_IMAGE_LABEL);
    }

    #[test]
    fn text_without_code_keeps_raw_text() {
        let mut session = ScanSession::new();
        session.acquire(b"x".to_vec(), ScanSource::Upload, "a.jpg").unwrap();
        let err = session
            .recognize(&recognizer(&["LOT 12-34"]), CodeBoundary::Plain)
            .unwrap_err();
        assert!(matches!(err, ScanError::NoCodeFound { ref raw_text } if raw_text == "LOT 12-34"));
        assert_eq!(
            session.state(),
            &ScanState::NoCodeFound {
                raw_text: "LOT 12-34".into()
            }
        );
    }

    #[test]
    fn rejected_code_never_confirms() {
        let mut session = ScanSession::new();
        session.enter_manual("7654321").unwrap();
        let err = session.validate(&catalog()).unwrap_err();
        assert!(matches!(err, ScanError::CodeNotInCatalog(_)));
        assert_eq!(session.state_name(), "rejected");

        let err = session.confirm_at(&operator(), 1, "", noon()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidTransition { operation: "confirm", .. }));

        // retry by hand from the rejected state
        session.enter_manual("0012345").unwrap();
        assert_eq!(session.validate(&catalog()).unwrap().code(), "0012345");
    }

    #[test]
    fn recognition_only_from_acquired() {
        let mut session = ScanSession::new();
        let err = session
            .recognize(&recognizer(&["1234567"]), CodeBoundary::Plain)
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::InvalidTransition {
                operation: "recognize",
                state: "idle"
            }
        ));
    }

    #[test]
    fn no_second_candidate_while_one_is_pending() {
        let mut session = ScanSession::new();
        session.enter_manual("1234567").unwrap();
        assert!(matches!(
            session.enter_manual("0012345"),
            Err(ScanError::InvalidTransition { .. })
        ));
        assert!(matches!(
            session.acquire(b"x".to_vec(), ScanSource::Upload, "a.jpg"),
            Err(ScanError::InvalidTransition { .. })
        ));
        assert_eq!(session.candidate().unwrap().code, "1234567");
    }

    #[test]
    fn bad_manual_code_leaves_state_alone() {
        let mut session = ScanSession::new();
        assert!(matches!(
            session.enter_manual("12345"),
            Err(ScanError::InvalidManualCode(_))
        ));
        assert_eq!(session.state(), &ScanState::Idle);
    }

    #[test]
    fn zero_quantity_keeps_scan_validated() {
        let mut session = ScanSession::new();
        session.enter_manual("1234567").unwrap();
        session.validate(&catalog()).unwrap();
        assert!(matches!(
            session.confirm_at(&operator(), 0, "", noon()),
            Err(ScanError::InvalidQuantity)
        ));
        assert_eq!(session.state_name(), "validated");
        assert!(session.confirm_at(&operator(), 1, "", noon()).is_ok());
    }

    #[test]
    fn cancel_from_any_state_returns_to_idle() {
        let mut session = ScanSession::new();
        session.acquire(b"x".to_vec(), ScanSource::Upload, "a.jpg").unwrap();
        session.cancel();
        assert_eq!(session.state(), &ScanState::Idle);

        session.enter_manual("1234567").unwrap();
        session.validate(&catalog()).unwrap();
        session.cancel();
        assert_eq!(session.state(), &ScanState::Idle);
        assert!(session.candidate().is_none());
    }

    #[test]
    fn reset_logs_the_user_out() {
        let mut session = ScanSession::with_user(SessionUser {
            nik: "654321".into(),
            name: "Budi".into(),
        });
        session.enter_manual("1234567").unwrap();
        session.reset();
        assert!(session.user().is_none());
        assert_eq!(session.state(), &ScanState::Idle);
    }
}
