use std::path::Path;

use super::CommandError;
use crate::core_state::CoreState;
use crate::maintenance::{self, CheckResult, ConnectionReport, RepairReport};
use crate::storage::SheetsClient;

pub fn repair_csv(path: &Path) -> Result<RepairReport, CommandError> {
    Ok(maintenance::repair_legacy_csv(path)?)
}

pub fn doctor(state: &CoreState) -> Vec<CheckResult> {
    maintenance::run_doctor(state.config())
}

/// Exercise the configured remote sheet with a fresh client.
pub fn test_connection(state: &CoreState) -> ConnectionReport {
    match SheetsClient::from_config(state.config()) {
        Ok(client) => maintenance::test_connection(Some(&client), None),
        Err(e) => maintenance::test_connection(None, Some(e.to_string())),
    }
}
