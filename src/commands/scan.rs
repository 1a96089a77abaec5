//! Scan commands: image scan, manual entry, operator check.

use std::path::Path;

use serde::Serialize;

use super::CommandError;
use crate::core_state::CoreState;
use crate::models::{OperatorIdentity, ScanSource, SessionUser, CAMERA_IMAGE_LABEL};
use crate::pipeline::session::ScanSession;
use crate::pipeline::validation::{validate_operator, OperatorValidation};
use crate::storage::PersistReport;

/// What to do with a validated scan.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub operator: Option<String>,
    pub quantity: u32,
    pub reason: String,
    /// Without it the validated scan is cancelled and nothing is stored.
    pub confirm: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanDisposition {
    Cancelled,
    Persisted { report: PersistReport },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub code: String,
    pub description: String,
    pub source: ScanSource,
    /// OCR engine that produced the text; `None` for manual entry.
    pub engine: Option<&'static str>,
    pub additional_matches: Vec<String>,
    /// Set when several codes were found and the variant asks the operator
    /// to double-check the first one.
    pub ambiguity_warning: bool,
    pub operator: OperatorIdentity,
    pub operator_verified: bool,
    pub disposition: ScanDisposition,
}

impl ScanOutcome {
    /// False only when a confirmed scan reached neither channel.
    pub fn stored_or_cancelled(&self) -> bool {
        match &self.disposition {
            ScanDisposition::Cancelled => true,
            ScanDisposition::Persisted { report } => report.saved_anywhere(),
        }
    }
}

/// Scan a label image: recognize, extract, validate, then confirm or cancel.
pub fn scan_image(
    state: &CoreState,
    user: Option<&SessionUser>,
    image_path: &Path,
    camera: bool,
    confirmation: &Confirmation,
) -> Result<ScanOutcome, CommandError> {
    // A missing catalog stops the scan before any recognition or lookup
    let catalog = state.component_catalog()?;
    let (operator, verified) = resolve_operator(state, user, confirmation.operator.as_deref())?;

    let image = std::fs::read(image_path).map_err(|source| CommandError::Io {
        path: image_path.to_path_buf(),
        source,
    })?;
    let (source, label) = if camera {
        (ScanSource::Camera, CAMERA_IMAGE_LABEL.to_string())
    } else {
        let name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_path.display().to_string());
        (ScanSource::Upload, name)
    };

    let mut session = new_session(user);
    session.acquire(image, source, &label)?;
    session.recognize(state.recognizer(), state.code_boundary())?;
    session.validate(catalog)?;

    finish(state, session, operator, verified, confirmation)
}

/// Manual-entry path: the typed code goes through the same validation.
pub fn scan_manual(
    state: &CoreState,
    user: Option<&SessionUser>,
    code: &str,
    confirmation: &Confirmation,
) -> Result<ScanOutcome, CommandError> {
    let catalog = state.component_catalog()?;
    let (operator, verified) = resolve_operator(state, user, confirmation.operator.as_deref())?;

    let mut session = new_session(user);
    session.enter_manual(code)?;
    session.validate(catalog)?;

    finish(state, session, operator, verified, confirmation)
}

/// Validate an operator NIK without scanning.
pub fn check_operator(state: &CoreState, input: &str) -> Result<OperatorValidation, CommandError> {
    let catalog = state.operator_catalog()?;
    Ok(validate_operator(input, catalog)?)
}

fn new_session(user: Option<&SessionUser>) -> ScanSession {
    match user {
        Some(user) => ScanSession::with_user(user.clone()),
        None => ScanSession::new(),
    }
}

fn resolve_operator(
    state: &CoreState,
    user: Option<&SessionUser>,
    input: Option<&str>,
) -> Result<(OperatorIdentity, bool), CommandError> {
    if state.variant().requires_operator() {
        let input = input.ok_or(CommandError::OperatorRequired)?;
        let validation = validate_operator(input, state.operator_catalog()?)?;
        let verified = validation.verified;
        return Ok((validation.into_identity()?, verified));
    }
    let user = user.ok_or(CommandError::LoginRequired)?;
    Ok((OperatorIdentity::from_session_user(user), true))
}

fn finish(
    state: &CoreState,
    mut session: ScanSession,
    operator: OperatorIdentity,
    operator_verified: bool,
    confirmation: &Confirmation,
) -> Result<ScanOutcome, CommandError> {
    let validated = session
        .validated()
        .cloned()
        .ok_or_else(|| CommandError::Usage("no validated scan to finish".into()))?;
    let engine = session.recognized_by();
    let candidate = validated.candidate().clone();
    let ambiguity_warning = candidate.is_ambiguous() && state.variant().warns_on_ambiguous_code();

    let disposition = if confirmation.confirm {
        let event = session.confirm(&operator, confirmation.quantity, &confirmation.reason)?;
        let user_nik = session.user().map(|u| u.nik.as_str()).unwrap_or("");
        let partition = state.variant().partition_for(user_nik, &operator.id);
        let report = state.persister().persist(&event, &partition);
        ScanDisposition::Persisted { report }
    } else {
        session.cancel();
        ScanDisposition::Cancelled
    };

    Ok(ScanOutcome {
        code: candidate.code,
        description: validated.description().to_string(),
        source: candidate.source,
        engine,
        additional_matches: candidate.additional_matches,
        ambiguity_warning,
        operator,
        operator_verified,
        disposition,
    })
}
