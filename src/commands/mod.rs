//! Command handlers behind the `scanner` binary.
//!
//! Handlers take the shared `CoreState`, do the work and return a
//! serializable result; rendering is left to the binary.

pub mod history;
pub mod maintenance;
pub mod scan;

use std::path::PathBuf;

use thiserror::Error;

use crate::auth::{AuthError, UserDirectory};
use crate::config::ConfigError;
use crate::core_state::CoreState;
use crate::models::{sanitize_partition, AppVariant, SessionUser, GENERAL_PARTITION};
use crate::pipeline::ScanError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Login required: pass --user and --password")]
    LoginRequired,

    #[error("Operator NIK required: pass --operator")]
    OperatorRequired,

    #[error("{0}")]
    Usage(String),
}

/// Log in when the variant requires it. Other variants run without a
/// session user.
pub fn login(
    state: &CoreState,
    nik: Option<&str>,
    password: Option<&str>,
) -> Result<Option<SessionUser>, CommandError> {
    if !state.variant().requires_login() {
        return Ok(None);
    }
    let (Some(nik), Some(password)) = (nik, password) else {
        return Err(CommandError::LoginRequired);
    };
    let directory = UserDirectory::load(&state.config().users_path())?;
    Ok(Some(directory.authenticate(nik, password)?))
}

/// Partition a history command works on.
///
/// Personal users only ever see their own partition, admin always works
/// on the shared one, multi-operator needs the operator's NIK.
pub fn history_partition(
    variant: AppVariant,
    user: Option<&SessionUser>,
    requested: Option<&str>,
) -> Result<String, CommandError> {
    match variant {
        AppVariant::Personal => {
            let user = user.ok_or(CommandError::LoginRequired)?;
            match requested {
                Some(p) if sanitize_partition(p) != sanitize_partition(&user.nik) => Err(
                    CommandError::Usage("personal users can only access their own history".into()),
                ),
                _ => Ok(sanitize_partition(&user.nik)),
            }
        }
        AppVariant::MultiOperator => requested
            .map(sanitize_partition)
            .ok_or_else(|| CommandError::Usage("--partition <operator NIK> is required".into())),
        AppVariant::Admin => Ok(requested
            .map(sanitize_partition)
            .unwrap_or_else(|| GENERAL_PARTITION.to_string())),
    }
}
