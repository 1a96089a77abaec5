use chrono::Local;
use serde::Serialize;

use crate::models::TIMESTAMP_FORMAT;
use crate::storage::{RemoteSheet, SheetInfo};

/// First cell of the row appended by the connection test.
pub const CONNECTION_TEST_MARKER: &str = "connection-test";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStep {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub steps: Vec<ConnectionStep>,
    pub sheet: Option<SheetInfo>,
}

impl ConnectionReport {
    pub fn succeeded(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.passed)
    }
}

/// Walk configuration, authorize, open, append. Stops at the first failing
/// step.
///
/// `sheet` is `None` when the configuration cannot build a client; that
/// fails the first step with `config_error` as detail.
pub fn test_connection(
    sheet: Option<&dyn RemoteSheet>,
    config_error: Option<String>,
) -> ConnectionReport {
    let mut steps = Vec::new();

    let Some(sheet) = sheet else {
        steps.push(ConnectionStep {
            name: "configuration",
            passed: false,
            detail: config_error.unwrap_or_else(|| "remote sheet not configured".into()),
        });
        return ConnectionReport { steps, sheet: None };
    };
    steps.push(ConnectionStep {
        name: "configuration",
        passed: true,
        detail: sheet.target(),
    });

    match sheet.authorize() {
        Ok(identity) => steps.push(ConnectionStep {
            name: "authorize",
            passed: true,
            detail: identity,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Connection test: authorization failed");
            steps.push(ConnectionStep {
                name: "authorize",
                passed: false,
                detail: e.to_string(),
            });
            return ConnectionReport { steps, sheet: None };
        }
    }

    let info = match sheet.sheet_info() {
        Ok(info) => {
            steps.push(ConnectionStep {
                name: "open sheet",
                passed: true,
                detail: format!(
                    "{} / {} ({} rows)",
                    info.spreadsheet_title, info.worksheet_title, info.row_count
                ),
            });
            info
        }
        Err(e) => {
            tracing::warn!(error = %e, "Connection test: open failed");
            steps.push(ConnectionStep {
                name: "open sheet",
                passed: false,
                detail: e.to_string(),
            });
            return ConnectionReport { steps, sheet: None };
        }
    };

    let row = vec![
        CONNECTION_TEST_MARKER.to_string(),
        Local::now().format(TIMESTAMP_FORMAT).to_string(),
        "ok".to_string(),
    ];
    let append = sheet.append_row(&row);
    steps.push(ConnectionStep {
        name: "append test row",
        passed: append.is_ok(),
        detail: match append {
            Ok(()) => "test row written".into(),
            Err(e) => e.to_string(),
        },
    });

    ConnectionReport {
        steps,
        sheet: Some(info),
    }
}
