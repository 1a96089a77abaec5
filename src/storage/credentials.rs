//! Credentials for the remote sheet.
//!
//! A Google service-account key (`credentials.json`) mints short-lived OAuth
//! tokens through the JWT bearer grant. A pre-issued bearer token is still
//! accepted for setups without a key file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::StorageError;
use crate::config::ScannerConfig;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Key file names looked up in the data directory, then the working directory.
pub const CREDENTIAL_FILE_NAMES: [&str; 2] = ["Credentials.json", "credentials.json"];

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Cached tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account key file that the token exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw)
            .map_err(|e| StorageError::NotConfigured(format!("Invalid service account key: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, StorageError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StorageError::NotConfigured(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// RS256-signed assertion for the JWT bearer grant, issued at `issued_at`
/// (unix seconds).
pub fn signed_assertion(key: &ServiceAccountKey, issued_at: i64) -> Result<String, StorageError> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        StorageError::NotConfigured(format!("Invalid service account private key: {e}"))
    })?;
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: SHEETS_SCOPE,
        aud: &key.token_uri,
        iat: issued_at,
        exp: issued_at + ASSERTION_LIFETIME_SECS,
    };
    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| StorageError::Malformed(format!("Cannot sign token request: {e}")))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

/// Access token and lifetime in seconds from a token endpoint response.
pub fn parse_token_response(body: &str) -> Result<(String, u64), StorageError> {
    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| StorageError::Malformed(format!("Token response: {e}")))?;
    Ok((response.access_token, response.expires_in))
}

/// First existing key file across `dirs`, trying each name in order.
pub fn find_credentials_file(dirs: &[&Path]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CREDENTIAL_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

enum AuthSource {
    ServiceAccount(ServiceAccountKey),
    StaticToken(String),
}

/// How the sheets client obtains its bearer token.
pub struct SheetAuth {
    source: AuthSource,
    cache: Mutex<Option<CachedToken>>,
}

impl SheetAuth {
    pub fn service_account(key: ServiceAccountKey) -> Self {
        Self::with_source(AuthSource::ServiceAccount(key))
    }

    pub fn static_token(token: &str) -> Self {
        Self::with_source(AuthSource::StaticToken(token.to_string()))
    }

    fn with_source(source: AuthSource) -> Self {
        Self {
            source,
            cache: Mutex::new(None),
        }
    }

    /// Credential sources in order: `sheets.credentials_file`, a
    /// `Credentials.json`/`credentials.json` in the data or working
    /// directory, inline `sheets.credentials_json`, `sheets.access_token`.
    pub fn from_config(config: &ScannerConfig) -> Result<Self, StorageError> {
        let sheets = &config.sheets;
        if let Some(path) = &sheets.credentials_file {
            let key = ServiceAccountKey::from_file(&config.resolve(path))?;
            return Ok(Self::service_account(key));
        }

        let cwd = std::env::current_dir().ok();
        let mut dirs = vec![config.general.data_dir.as_path()];
        dirs.extend(cwd.as_deref());
        if let Some(path) = find_credentials_file(&dirs) {
            tracing::debug!(path = %path.display(), "Using service account key file");
            return Ok(Self::service_account(ServiceAccountKey::from_file(&path)?));
        }

        if let Some(raw) = sheets.credentials_json.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(Self::service_account(ServiceAccountKey::from_json(raw)?));
        }
        if let Some(token) = sheets.access_token.as_deref().filter(|s| !s.is_empty()) {
            return Ok(Self::static_token(token));
        }

        Err(StorageError::NotConfigured(format!(
            "no service account key: put credentials.json in {} or set \
             sheets.credentials_file, sheets.credentials_json or sheets.access_token",
            config.general.data_dir.display()
        )))
    }

    pub fn service_account_email(&self) -> Option<&str> {
        match &self.source {
            AuthSource::ServiceAccount(key) => Some(&key.client_email),
            AuthSource::StaticToken(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match &self.source {
            AuthSource::ServiceAccount(key) => format!("service account {}", key.client_email),
            AuthSource::StaticToken(_) => "static access token".into(),
        }
    }

    /// Current bearer token, minting a fresh one when the cached token is
    /// missing or about to expire.
    pub fn bearer_token(&self, http: &reqwest::blocking::Client) -> Result<String, StorageError> {
        let key = match &self.source {
            AuthSource::StaticToken(token) => return Ok(token.clone()),
            AuthSource::ServiceAccount(key) => key,
        };

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| StorageError::Remote("token cache poisoned".into()))?;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() + REFRESH_MARGIN < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let assertion = signed_assertion(key, chrono::Utc::now().timestamp())?;
        let response = http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .map_err(|e| StorageError::Remote(format!("Token request failed: {e}")))?;
        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(StorageError::RemoteStatus {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let (token, expires_in) = parse_token_response(&body)?;
        tracing::debug!(service_account = %key.client_email, expires_in, "Sheets access token minted");
        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        });
        Ok(token)
    }
}
