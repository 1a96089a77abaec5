use std::sync::Mutex;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::credentials::SheetAuth;
use super::StorageError;
use crate::config::ScannerConfig;

/// Metadata read when probing a remote sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetInfo {
    pub spreadsheet_title: String,
    pub worksheet_title: String,
    pub row_count: u64,
}

/// Remote append-only record sheet (allows mocking for tests)
pub trait RemoteSheet {
    /// Human-readable target, e.g. `<spreadsheet id>/Data Scan`.
    fn target(&self) -> String;

    /// Obtain credentials and describe the identity used, e.g. the
    /// service-account email.
    fn authorize(&self) -> Result<String, StorageError>;

    fn sheet_info(&self) -> Result<SheetInfo, StorageError>;

    fn append_row(&self, row: &[String]) -> Result<(), StorageError>;
}

/// Google Sheets REST client (`values:append`) authenticated with a
/// service-account token or a static bearer token.
pub struct SheetsClient {
    endpoint: String,
    spreadsheet_id: String,
    sheet_name: String,
    auth: SheetAuth,
    client: reqwest::blocking::Client,
}

impl SheetsClient {
    pub fn new(
        endpoint: &str,
        spreadsheet_id: &str,
        sheet_name: &str,
        auth: SheetAuth,
        timeout_secs: u64,
    ) -> Result<Self, StorageError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StorageError::Remote(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: sheet_name.to_string(),
            auth,
            client,
        })
    }

    pub fn from_config(scanner: &ScannerConfig) -> Result<Self, StorageError> {
        let config = &scanner.sheets;
        if !config.enabled {
            return Err(StorageError::NotConfigured("sheets.enabled is false".into()));
        }
        let spreadsheet_id = config
            .spreadsheet_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StorageError::NotConfigured("sheets.spreadsheet_id is not set".into()))?;
        let auth = SheetAuth::from_config(scanner)?;

        Self::new(
            &config.endpoint,
            spreadsheet_id,
            &config.sheet_name,
            auth,
            config.timeout_secs,
        )
    }

    pub fn service_account_email(&self) -> Option<&str> {
        self.auth.service_account_email()
    }

    fn spreadsheet_url(&self, tail: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| StorageError::NotConfigured(format!("Invalid sheets endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::NotConfigured("Sheets endpoint cannot be a base".into()))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .extend(tail);
        Ok(url)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<String, StorageError> {
        let token = self.auth.bearer_token(&self.client)?;
        let response = request
            .bearer_auth(token)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    StorageError::Remote(format!("Request to {} timed out", self.target()))
                } else {
                    StorageError::Remote(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(StorageError::RemoteStatus {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(body)
    }
}

#[derive(Serialize)]
struct AppendBody<'a> {
    values: [&'a [String]; 1],
}

impl RemoteSheet for SheetsClient {
    fn target(&self) -> String {
        format!("{}/{}", self.spreadsheet_id, self.sheet_name)
    }

    fn authorize(&self) -> Result<String, StorageError> {
        self.auth.bearer_token(&self.client)?;
        Ok(self.auth.describe())
    }

    fn sheet_info(&self) -> Result<SheetInfo, StorageError> {
        let url = self.spreadsheet_url(&[])?;
        let request = self
            .client
            .get(url)
            .query(&[("fields", "properties.title,sheets.properties")]);
        let body = self.send(request)?;
        parse_sheet_metadata(&body, &self.sheet_name)
    }

    fn append_row(&self, row: &[String]) -> Result<(), StorageError> {
        let range = format!("{}:append", self.sheet_name);
        let url = self.spreadsheet_url(&["values", &range])?;
        // RAW keeps "0012345" a string instead of letting Sheets parse it
        let request = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&AppendBody { values: [row] });
        self.send(request)?;
        tracing::info!(target_sheet = %self.target(), "Row appended to remote sheet");
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetMeta {
    properties: TitleProperties,
    #[serde(default)]
    sheets: Vec<WorksheetMeta>,
}

#[derive(Deserialize)]
struct TitleProperties {
    title: String,
}

#[derive(Deserialize)]
struct WorksheetMeta {
    properties: WorksheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorksheetProperties {
    title: String,
    #[serde(default)]
    grid_properties: Option<GridProperties>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u64,
}

/// Pick the named worksheet out of a spreadsheet metadata response.
pub fn parse_sheet_metadata(body: &str, sheet_name: &str) -> Result<SheetInfo, StorageError> {
    let meta: SpreadsheetMeta = serde_json::from_str(body)
        .map_err(|e| StorageError::Malformed(format!("Spreadsheet metadata: {e}")))?;

    let worksheet = meta
        .sheets
        .into_iter()
        .find(|s| s.properties.title == sheet_name)
        .ok_or_else(|| {
            StorageError::NotConfigured(format!(
                "Worksheet {sheet_name:?} not found in spreadsheet {:?}",
                meta.properties.title
            ))
        })?;

    Ok(SheetInfo {
        spreadsheet_title: meta.properties.title,
        worksheet_title: worksheet.properties.title,
        row_count: worksheet
            .properties
            .grid_properties
            .map(|g| g.row_count)
            .unwrap_or(0),
    })
}

/// In-memory sheet for tests and dry runs.
pub struct MockSheet {
    rows: Mutex<Vec<Vec<String>>>,
    failure: Option<String>,
}

impl Default for MockSheet {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSheet {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    /// Sheet whose every call fails as unreachable.
    pub fn unreachable(reason: &str) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            failure: Some(reason.to_string()),
        }
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl RemoteSheet for MockSheet {
    fn target(&self) -> String {
        "mock/Data Scan".into()
    }

    fn authorize(&self) -> Result<String, StorageError> {
        match &self.failure {
            Some(reason) => Err(StorageError::Remote(reason.clone())),
            None => Ok("mock account".into()),
        }
    }

    fn sheet_info(&self) -> Result<SheetInfo, StorageError> {
        if let Some(reason) = &self.failure {
            return Err(StorageError::Remote(reason.clone()));
        }
        Ok(SheetInfo {
            spreadsheet_title: "Mock".into(),
            worksheet_title: "Data Scan".into(),
            row_count: self.rows().len() as u64,
        })
    }

    fn append_row(&self, row: &[String]) -> Result<(), StorageError> {
        if let Some(reason) = &self.failure {
            return Err(StorageError::Remote(reason.clone()));
        }
        self.rows
            .lock()
            .map_err(|_| StorageError::Remote("mock sheet poisoned".into()))?
            .push(row.to_vec());
        Ok(())
    }
}
