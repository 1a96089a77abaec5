use std::path::Path;

use serde::Serialize;

use crate::auth::UserDirectory;
use crate::config::{ScannerConfig, DEFAULT_OCR_API_KEY};
use crate::pipeline::recognition::LocalTesseract;
use crate::pipeline::validation::{ComponentCatalog, OperatorCatalog};
use crate::storage::SheetAuth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

impl CheckStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    fn ok(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Fail,
            detail: detail.into(),
        }
    }
}

pub fn has_failures(results: &[CheckResult]) -> bool {
    results.iter().any(|r| r.status == CheckStatus::Fail)
}

/// Check everything a scan run depends on. Never stops at the first problem.
pub fn run_doctor(config: &ScannerConfig) -> Vec<CheckResult> {
    let variant = config.general.variant;
    let mut results = vec![check_local_ocr(config), check_remote_ocr(config)];

    let components = config.component_catalog_path();
    results.push(
        match ComponentCatalog::load(
            &components,
            &config.catalog.component_code_column,
            &config.catalog.component_description_column,
        ) {
            Ok(catalog) => CheckResult::ok(
                "component catalog",
                format!("{} components in {}", catalog.len(), components.display()),
            ),
            Err(e) => CheckResult::fail("component catalog", e.to_string()),
        },
    );

    if variant.requires_operator() {
        let operators = config.operator_catalog_path();
        results.push(
            match OperatorCatalog::load_optional(
                &operators,
                &config.catalog.operator_id_column,
                &config.catalog.operator_name_column,
            ) {
                Ok(Some(catalog)) => CheckResult::ok(
                    "operator catalog",
                    format!("{} operators in {}", catalog.len(), operators.display()),
                ),
                Ok(None) => CheckResult::warn(
                    "operator catalog",
                    format!(
                        "{} not found; any 6-digit NIK will be accepted unverified",
                        operators.display()
                    ),
                ),
                Err(e) => CheckResult::fail("operator catalog", e.to_string()),
            },
        );
    }

    if variant.requires_login() {
        let users = config.users_path();
        results.push(match UserDirectory::load(&users) {
            Ok(directory) if directory.is_empty() => {
                CheckResult::warn("user directory", format!("{} has no users", users.display()))
            }
            Ok(directory) => CheckResult::ok(
                "user directory",
                format!("{} users in {}", directory.len(), users.display()),
            ),
            Err(e) => CheckResult::fail("user directory", e.to_string()),
        });
    }

    results.push(check_data_dir(&config.general.data_dir));

    results.push(check_remote_sheet(config));

    for result in &results {
        tracing::debug!(check = result.name, status = result.status.label(), detail = %result.detail);
    }
    results
}

fn check_local_ocr(config: &ScannerConfig) -> CheckResult {
    if !config.ocr.local_enabled {
        return CheckResult::warn("local OCR", "disabled in config");
    }
    let engine = LocalTesseract::new(config.ocr.tessdata_dir.as_deref(), &config.ocr.local_language);
    match engine.check() {
        Ok(version) => CheckResult::ok("local OCR", version),
        Err(e) => CheckResult::warn("local OCR", format!("{e}; remote OCR only")),
    }
}

fn check_remote_ocr(config: &ScannerConfig) -> CheckResult {
    if !config.ocr.remote_enabled {
        return CheckResult::warn("remote OCR", "disabled in config");
    }
    if config.ocr.api_key == DEFAULT_OCR_API_KEY {
        CheckResult::warn("remote OCR", "using the public demo API key (rate limited)")
    } else {
        CheckResult::ok("remote OCR", config.ocr.remote_url.clone())
    }
}

fn check_remote_sheet(config: &ScannerConfig) -> CheckResult {
    if !config.sheets.has_target() {
        return CheckResult::warn("remote sheet", "not configured; records are saved locally only");
    }
    match SheetAuth::from_config(config) {
        Ok(auth) => CheckResult::ok(
            "remote sheet",
            format!("{} via {}", config.sheets.sheet_name, auth.describe()),
        ),
        Err(e) => CheckResult::warn("remote sheet", format!("{e}; records are saved locally only")),
    }
}

fn check_data_dir(dir: &Path) -> CheckResult {
    let writable = std::fs::create_dir_all(dir).and_then(|_| tempfile::tempfile_in(dir).map(|_| ()));
    match writable {
        Ok(()) => CheckResult::ok("data directory", format!("{} is writable", dir.display())),
        Err(e) => CheckResult::fail("data directory", format!("{}: {e}", dir.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppVariant;

    fn config_in(dir: &Path, variant: AppVariant) -> ScannerConfig {
        let mut config = ScannerConfig::default();
        config.general.variant = variant;
        config.general.data_dir = dir.to_path_buf();
        config.ocr.tessdata_dir = Some(dir.join("no-tessdata"));
        config
    }

    fn find<'a>(results: &'a [CheckResult], name: &str) -> Option<&'a CheckResult> {
        results.iter().find(|r| r.name == name)
    }

    #[test]
    fn missing_component_catalog_fails() {
        let dir = tempfile::tempdir().unwrap();
        let results = run_doctor(&config_in(dir.path(), AppVariant::Admin));
        assert_eq!(find(&results, "component catalog").unwrap().status, CheckStatus::Fail);
        assert!(has_failures(&results));
    }

    #[test]
    fn missing_tesseract_is_only_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let results = run_doctor(&config_in(dir.path(), AppVariant::Admin));
        assert_eq!(find(&results, "local OCR").unwrap().status, CheckStatus::Warn);
    }

    #[test]
    fn complete_multi_operator_setup_has_no_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("components.csv"), "code,description\n1234567,Bolt\n").unwrap();
        std::fs::write(dir.path().join("operators.csv"), "nik,name\n012345,Dewi\n").unwrap();

        let results = run_doctor(&config_in(dir.path(), AppVariant::MultiOperator));
        assert!(!has_failures(&results), "{results:?}");
        assert_eq!(find(&results, "operator catalog").unwrap().status, CheckStatus::Ok);
        assert!(find(&results, "user directory").is_none());
        assert_eq!(find(&results, "data directory").unwrap().status, CheckStatus::Ok);
    }

    #[test]
    fn absent_operator_catalog_warns() {
        let dir = tempfile::tempdir().unwrap();
        let results = run_doctor(&config_in(dir.path(), AppVariant::MultiOperator));
        assert_eq!(find(&results, "operator catalog").unwrap().status, CheckStatus::Warn);
    }

    #[test]
    fn personal_variant_checks_users() {
        let dir = tempfile::tempdir().unwrap();
        let results = run_doctor(&config_in(dir.path(), AppVariant::Personal));
        assert_eq!(find(&results, "user directory").unwrap().status, CheckStatus::Fail);
        assert!(find(&results, "operator catalog").is_none());
    }

    #[test]
    fn remote_sheet_reports_service_account() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path(), AppVariant::Admin);
        assert_eq!(find(&run_doctor(&config), "remote sheet").unwrap().status, CheckStatus::Warn);

        config.sheets.enabled = true;
        config.sheets.spreadsheet_id = Some("sheet-123".into());
        assert_eq!(find(&run_doctor(&config), "remote sheet").unwrap().status, CheckStatus::Warn);

        std::fs::write(
            dir.path().join("Credentials.json"),
            r#"{"client_email": "scanner@inv.iam.gserviceaccount.com", "private_key": "k"}"#,
        )
        .unwrap();
        let check = run_doctor(&config).into_iter().find(|r| r.name == "remote sheet").unwrap();
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(check.detail.contains("scanner@inv.iam.gserviceaccount.com"));
    }
}
