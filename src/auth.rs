//! Login check for the personal variant against a `users.csv` directory
//! (`nik`, `password`, `name`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::models::SessionUser;
use crate::tabular::{read_table, TableError};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("User directory not found: {0}")]
    DirectoryMissing(PathBuf),

    #[error("Cannot read user directory: {0}")]
    Directory(TableError),

    #[error("User directory {path} has no {column:?} column")]
    MissingColumn { column: &'static str, path: PathBuf },

    #[error("Invalid NIK or password")]
    InvalidCredentials,
}

struct UserEntry {
    password: String,
    name: String,
}

pub struct UserDirectory {
    users: HashMap<String, UserEntry>,
}

impl UserDirectory {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let table = read_table(path).map_err(|e| match e {
            TableError::NotFound(p) => AuthError::DirectoryMissing(p),
            other => AuthError::Directory(other),
        })?;

        let column = |name: &'static str| {
            table.column_index(name).ok_or_else(|| AuthError::MissingColumn {
                column: name,
                path: path.to_path_buf(),
            })
        };
        let nik_idx = column("nik")?;
        let password_idx = column("password")?;
        let name_idx = column("name")?;

        let mut users = HashMap::new();
        for row in &table.rows {
            let nik = table.cell(row, nik_idx);
            if nik.is_empty() {
                continue;
            }
            users.entry(nik.to_string()).or_insert_with(|| UserEntry {
                password: table.cell(row, password_idx).to_string(),
                name: table.cell(row, name_idx).to_string(),
            });
        }
        tracing::debug!(path = %path.display(), users = users.len(), "User directory loaded");
        Ok(Self { users })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Check credentials. Unknown NIK and wrong password are
    /// indistinguishable to the caller.
    pub fn authenticate(&self, nik: &str, password: &str) -> Result<SessionUser, AuthError> {
        let nik = nik.trim();
        let Some(entry) = self.users.get(nik) else {
            tracing::warn!(nik, "Login failed");
            return Err(AuthError::InvalidCredentials);
        };
        if entry.password.as_bytes().ct_eq(password.as_bytes()).unwrap_u8() == 0 {
            tracing::warn!(nik, "Login failed");
            return Err(AuthError::InvalidCredentials);
        }
        tracing::info!(nik, "Login succeeded");
        Ok(SessionUser {
            nik: nik.to_string(),
            name: entry.name.clone(),
        })
    }
}
