use serde::Serialize;

/// Component catalog entry. Codes stay strings so leading zeros survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentRecord {
    pub code: String,
    pub description: String,
}

/// Operator catalog entry keyed by the 6-digit personnel number (NIK).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorRecord {
    pub personnel_number: String,
    pub name: String,
}
