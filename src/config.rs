//! Application constants and the layered scanner configuration.
//!
//! Precedence: built-in defaults < `scanner.toml` < `SCANNER_*` environment
//! variables < command-line flags (applied by the binary).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::models::AppVariant;
use crate::pipeline::extraction::CodeBoundary;

/// Application-level constants
pub const APP_NAME: &str = "ComponentScanner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file looked up in the data directory (`SCANNER_DATA_DIR` when set)
/// when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "scanner.toml";

/// Public placeholder key accepted by the OCR.space free tier.
pub const DEFAULT_OCR_API_KEY: &str = "helloworld";

pub fn default_log_filter() -> &'static str {
    "component_scanner=info,warn"
}

/// Get the application data directory.
/// ~/ComponentScanner/ when a home directory exists, the working directory otherwise.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

// ═══════════════════════════════════════════════════════════
// Sections
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub variant: AppVariant,
    /// Root for catalogs (when given relative) and per-partition data files.
    pub data_dir: PathBuf,
    /// Overrides the variant's default code pattern when set.
    pub code_boundary: Option<CodeBoundary>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            variant: AppVariant::default(),
            data_dir: app_data_dir(),
            code_boundary: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub components: PathBuf,
    pub operators: PathBuf,
    pub users: PathBuf,
    pub component_code_column: String,
    pub component_description_column: String,
    pub operator_id_column: String,
    pub operator_name_column: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            components: PathBuf::from("components.csv"),
            operators: PathBuf::from("operators.csv"),
            users: PathBuf::from("users.csv"),
            component_code_column: "code".into(),
            component_description_column: "description".into(),
            operator_id_column: "nik".into(),
            operator_name_column: "name".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub local_enabled: bool,
    /// Directory holding `<lang>.traineddata`; unset uses the system default.
    pub tessdata_dir: Option<PathBuf>,
    pub local_language: String,
    pub remote_enabled: bool,
    pub remote_url: String,
    pub api_key: String,
    pub remote_language: String,
    /// OCR.space engine selector (1, 2 or 3).
    pub remote_engine: u8,
    pub remote_timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            tessdata_dir: None,
            local_language: "eng".into(),
            remote_enabled: true,
            remote_url: "https://api.ocr.space/parse/image".into(),
            api_key: DEFAULT_OCR_API_KEY.into(),
            remote_language: "eng".into(),
            remote_engine: 2,
            remote_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub enabled: bool,
    pub spreadsheet_id: Option<String>,
    /// Tab that receives appended rows.
    pub sheet_name: String,
    /// Service-account key file, relative to the data directory. When unset,
    /// `Credentials.json` / `credentials.json` are looked up instead.
    pub credentials_file: Option<PathBuf>,
    /// Service-account key JSON given inline (environment or secret store).
    pub credentials_json: Option<String>,
    /// Pre-issued OAuth bearer token, used only when no key is available.
    pub access_token: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spreadsheet_id: None,
            sheet_name: "Data Scan".into(),
            credentials_file: None,
            credentials_json: None,
            access_token: None,
            endpoint: "https://sheets.googleapis.com/v4".into(),
            timeout_secs: 15,
        }
    }
}

impl SheetsConfig {
    /// Enabled and pointing at a spreadsheet. Credentials are resolved
    /// separately since they may come from a key file.
    pub fn has_target(&self) -> bool {
        self.enabled && self.spreadsheet_id.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// ScannerConfig
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub general: GeneralConfig,
    pub catalog: CatalogConfig,
    pub ocr: OcrConfig,
    pub sheets: SheetsConfig,
    pub logging: LoggingConfig,
}

impl ScannerConfig {
    /// Load from an explicit file, or from `<data_dir>/scanner.toml` when it
    /// exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// `load` with a custom variable lookup. `SCANNER_DATA_DIR` also moves
    /// the default config file location.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let data_dir = lookup("SCANNER_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(app_data_dir);
                let default_path = data_dir.join(CONFIG_FILE_NAME);
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(&lookup)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply `SCANNER_*` overrides through a lookup function.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SCANNER_VARIANT") {
            self.general.variant = v.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "SCANNER_VARIANT".into(),
                value: v.clone(),
                reason,
            })?;
        }
        if let Some(v) = lookup("SCANNER_DATA_DIR") {
            self.general.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SCANNER_CODE_BOUNDARY") {
            let boundary = v.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "SCANNER_CODE_BOUNDARY".into(),
                value: v.clone(),
                reason,
            })?;
            self.general.code_boundary = Some(boundary);
        }
        if let Some(v) = lookup("SCANNER_COMPONENT_CATALOG") {
            self.catalog.components = PathBuf::from(v);
        }
        if let Some(v) = lookup("SCANNER_OPERATOR_CATALOG") {
            self.catalog.operators = PathBuf::from(v);
        }
        if let Some(v) = lookup("SCANNER_USERS_FILE") {
            self.catalog.users = PathBuf::from(v);
        }
        if let Some(v) = lookup("SCANNER_TESSDATA_DIR") {
            self.ocr.tessdata_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("SCANNER_OCR_API_KEY") {
            self.ocr.api_key = v;
        }
        if let Some(v) = lookup("SCANNER_OCR_REMOTE") {
            self.ocr.remote_enabled = parse_bool("SCANNER_OCR_REMOTE", &v)?;
        }
        if let Some(v) = lookup("SCANNER_SHEETS_ID") {
            self.sheets.spreadsheet_id = Some(v);
            self.sheets.enabled = true;
        }
        if let Some(v) = lookup("SCANNER_SHEETS_CREDENTIALS") {
            self.sheets.credentials_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("SCANNER_SHEETS_CREDENTIALS_JSON") {
            self.sheets.credentials_json = Some(v);
        }
        if let Some(v) = lookup("SCANNER_SHEETS_TOKEN") {
            self.sheets.access_token = Some(v);
        }
        if let Some(v) = lookup("SCANNER_LOG") {
            self.logging.filter = Some(v);
        }
        Ok(())
    }

    /// Resolve a possibly relative path against the data directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.general.data_dir.join(path)
        }
    }

    pub fn component_catalog_path(&self) -> PathBuf {
        self.resolve(&self.catalog.components)
    }

    pub fn operator_catalog_path(&self) -> PathBuf {
        self.resolve(&self.catalog.operators)
    }

    pub fn users_path(&self) -> PathBuf {
        self.resolve(&self.catalog.users)
    }

    /// Code pattern in effect: explicit setting, else the variant default.
    pub fn code_boundary(&self) -> CodeBoundary {
        self.general
            .code_boundary
            .unwrap_or_else(|| self.general.variant.default_code_boundary())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: "expected true/false".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        let dir = app_data_dir();
        if dirs::home_dir().is_some() {
            assert!(dir.ends_with(APP_NAME));
        }
    }

    #[test]
    fn defaults_match_ocr_space_contract() {
        let config = ScannerConfig::default();
        assert_eq!(config.ocr.api_key, "helloworld");
        assert_eq!(config.ocr.remote_language, "eng");
        assert_eq!(config.ocr.remote_engine, 2);
        assert!(config.ocr.local_enabled);
        assert!(!config.sheets.has_target());
        assert_eq!(config.general.variant, AppVariant::Personal);
    }

    #[test]
    fn toml_overrides_defaults_per_section() {
        let raw = r#"
            [general]
            variant = "multi_operator"
            data_dir = "/srv/scanner"

            [ocr]
            remote_enabled = false
            tessdata_dir = "/opt/tess/tessdata"

            [catalog]
            component_code_column = "Component Number"
        "#;
        let config = ScannerConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.general.variant, AppVariant::MultiOperator);
        assert_eq!(config.general.data_dir, PathBuf::from("/srv/scanner"));
        assert!(!config.ocr.remote_enabled);
        assert_eq!(config.ocr.tessdata_dir, Some(PathBuf::from("/opt/tess/tessdata")));
        // Untouched keys keep defaults
        assert_eq!(config.ocr.api_key, "helloworld");
        assert_eq!(config.catalog.component_code_column, "Component Number");
        assert_eq!(config.catalog.component_description_column, "description");
    }

    #[test]
    fn env_overrides_win_over_toml() {
        let mut config =
            ScannerConfig::from_toml_str("[general]\nvariant = \"admin\"\n").unwrap();
        config
            .apply_overrides(lookup_from(&[
                ("SCANNER_VARIANT", "personal"),
                ("SCANNER_OCR_REMOTE", "off"),
                ("SCANNER_SHEETS_ID", "sheet-123"),
                ("SCANNER_SHEETS_TOKEN", "tok"),
                ("SCANNER_SHEETS_CREDENTIALS", "keys/sa.json"),
            ]))
            .unwrap();
        assert_eq!(config.general.variant, AppVariant::Personal);
        assert!(!config.ocr.remote_enabled);
        assert!(config.sheets.has_target());
        assert_eq!(config.sheets.access_token.as_deref(), Some("tok"));
        assert_eq!(config.sheets.credentials_file, Some(PathBuf::from("keys/sa.json")));
    }

    #[test]
    fn invalid_env_value_is_reported() {
        let mut config = ScannerConfig::default();
        let err = config
            .apply_overrides(lookup_from(&[("SCANNER_OCR_REMOTE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SCANNER_OCR_REMOTE"));

        let err = config
            .apply_overrides(lookup_from(&[("SCANNER_VARIANT", "kiosk")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn relative_catalog_paths_resolve_under_data_dir() {
        let mut config = ScannerConfig::default();
        config.general.data_dir = PathBuf::from("/data");
        assert_eq!(
            config.component_catalog_path(),
            PathBuf::from("/data/components.csv")
        );
        config.catalog.operators = PathBuf::from("/etc/scanner/operators.xlsx");
        assert_eq!(
            config.operator_catalog_path(),
            PathBuf::from("/etc/scanner/operators.xlsx")
        );
    }

    #[test]
    fn code_boundary_follows_variant_unless_set() {
        let mut config = ScannerConfig::default();
        assert_eq!(config.code_boundary(), CodeBoundary::Plain);
        config.general.variant = AppVariant::MultiOperator;
        assert_eq!(config.code_boundary(), CodeBoundary::Word);
        config.general.code_boundary = Some(CodeBoundary::Plain);
        assert_eq!(config.code_boundary(), CodeBoundary::Plain);
    }

    #[test]
    fn default_config_file_follows_data_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[general]\nvariant = \"admin\"\n[sheets]\nsheet_name = \"Gudang\"\n",
        )
        .unwrap();
        let data_dir = dir.path().to_string_lossy().into_owned();

        let config =
            ScannerConfig::load_with(None, lookup_from(&[("SCANNER_DATA_DIR", data_dir.as_str())])).unwrap();
        assert_eq!(config.general.variant, AppVariant::Admin);
        assert_eq!(config.sheets.sheet_name, "Gudang");
        assert_eq!(config.general.data_dir, dir.path());
    }

    #[test]
    fn explicit_config_path_wins_over_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[general]\nvariant = \"admin\"\n")
            .unwrap();
        let other = dir.path().join("other.toml");
        std::fs::write(&other, "[general]\nvariant = \"multi_operator\"\n").unwrap();
        let data_dir = dir.path().to_string_lossy().into_owned();

        let config =
            ScannerConfig::load_with(Some(&other), lookup_from(&[("SCANNER_DATA_DIR", data_dir.as_str())]))
                .unwrap();
        assert_eq!(config.general.variant, AppVariant::MultiOperator);
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScannerConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_config_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.toml");
        std::fs::write(&path, "[general\nvariant = ").unwrap();
        let err = ScannerConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
