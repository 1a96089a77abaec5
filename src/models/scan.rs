use std::num::NonZeroU32;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ScanSource;

/// Timestamp layout used in every persisted row.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column headers of a persisted scan row, in write order.
pub const RECORD_HEADERS: [&str; 9] = [
    "Timestamp",
    "Operator ID",
    "Operator Name",
    "Component Code",
    "Component Description",
    "Quantity",
    "Reason",
    "Image Label",
    "Session User",
];

/// Label recorded when a camera capture carries no file name.
pub const CAMERA_IMAGE_LABEL: &str = "camera_capture.jpg";

/// Label recorded for typed codes.
pub const MANUAL_IMAGE_LABEL: &str = "N/A";

/// One pending code awaiting validation and confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanCandidate {
    pub id: Uuid,
    pub code: String,
    pub source: ScanSource,
    /// Text the code was taken from (the typed input for manual entry).
    pub raw_text: String,
    pub image_label: String,
    /// Other 7-digit runs found after the chosen one.
    pub additional_matches: Vec<String>,
}

impl ScanCandidate {
    pub fn new(code: String, source: ScanSource, raw_text: String, image_label: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            source,
            raw_text,
            image_label,
            additional_matches: Vec::new(),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.additional_matches.is_empty()
    }
}

/// A candidate whose code was found in the component catalog.
///
/// Only the component validator constructs this, so holding one proves the
/// code passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedScan {
    candidate: ScanCandidate,
    description: String,
}

impl ValidatedScan {
    pub(crate) fn new(candidate: ScanCandidate, description: String) -> Self {
        Self {
            candidate,
            description,
        }
    }

    pub fn candidate(&self) -> &ScanCandidate {
        &self.candidate
    }

    pub fn code(&self) -> &str {
        &self.candidate.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Number of pieces taken; zero is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The logged-in account of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub nik: String,
    pub name: String,
}

/// Who physically takes the component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorIdentity {
    pub id: String,
    /// None when the operator catalog was unavailable.
    pub name: Option<String>,
}

impl OperatorIdentity {
    pub fn from_session_user(user: &SessionUser) -> Self {
        Self {
            id: user.nik.clone(),
            name: Some(user.name.clone()),
        }
    }
}

/// Durable, append-only record of a confirmed scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEvent {
    recorded_at: NaiveDateTime,
    operator_id: String,
    operator_name: String,
    component_code: String,
    component_description: String,
    quantity: Quantity,
    reason: String,
    image_label: String,
    session_user: String,
}

impl ScanEvent {
    pub fn new(
        validated: &ValidatedScan,
        operator: &OperatorIdentity,
        quantity: Quantity,
        reason: &str,
        session_user: &str,
        recorded_at: NaiveDateTime,
    ) -> Self {
        Self {
            recorded_at,
            operator_id: operator.id.clone(),
            operator_name: operator.name.clone().unwrap_or_default(),
            component_code: validated.code().to_string(),
            component_description: validated.description().to_string(),
            quantity,
            reason: reason.trim().to_string(),
            image_label: validated.candidate().image_label.clone(),
            session_user: session_user.to_string(),
        }
    }

    pub fn recorded_at(&self) -> NaiveDateTime {
        self.recorded_at
    }

    pub fn timestamp(&self) -> String {
        self.recorded_at.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    pub fn operator_name(&self) -> &str {
        &self.operator_name
    }

    pub fn component_code(&self) -> &str {
        &self.component_code
    }

    pub fn component_description(&self) -> &str {
        &self.component_description
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn image_label(&self) -> &str {
        &self.image_label
    }

    pub fn session_user(&self) -> &str {
        &self.session_user
    }

    /// Cells in `RECORD_HEADERS` order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp(),
            self.operator_id.clone(),
            self.operator_name.clone(),
            self.component_code.clone(),
            self.component_description.clone(),
            self.quantity.to_string(),
            self.reason.clone(),
            self.image_label.clone(),
            self.session_user.clone(),
        ]
    }
}
