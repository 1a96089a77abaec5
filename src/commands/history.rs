use std::path::PathBuf;

use serde::Serialize;

use super::{history_partition, CommandError};
use crate::core_state::CoreState;
use crate::models::SessionUser;
use crate::storage::HistoryEntry;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub partition: String,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearedHistory {
    pub partition: String,
    pub removed: Vec<PathBuf>,
}

/// Latest records of a partition, newest first.
pub fn recent_history(
    state: &CoreState,
    user: Option<&SessionUser>,
    partition: Option<&str>,
    limit: usize,
) -> Result<HistoryView, CommandError> {
    let partition = history_partition(state.variant(), user, partition)?;
    let entries = state.local_store().history(&partition, limit)?;
    Ok(HistoryView { partition, entries })
}

/// Delete the local record files of a partition.
pub fn clear_history(
    state: &CoreState,
    user: Option<&SessionUser>,
    partition: Option<&str>,
) -> Result<ClearedHistory, CommandError> {
    let partition = history_partition(state.variant(), user, partition)?;
    let removed = state.local_store().clear(&partition)?;
    Ok(ClearedHistory { partition, removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::models::AppVariant;

    fn state_in(dir: &std::path::Path) -> CoreState {
        let mut config = ScannerConfig::default();
        config.general.data_dir = dir.to_path_buf();
        config.general.variant = AppVariant::Personal;
        CoreState::new(config)
    }

    #[test]
    fn personal_history_and_clear_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("data_012345.csv"),
            "Timestamp,Operator ID,Operator Name,Component Code,Component Description,Quantity,Reason,Image Label,Session User\n\
             2026-01-02 10:00:00,012345,Dewi,0012345,Washer,2,,N/A,012345\n",
        )
        .unwrap();
        let state = state_in(dir.path());
        let user = SessionUser {
            nik: "012345".into(),
            name: "Dewi".into(),
        };

        let view = recent_history(&state, Some(&user), None, 5).unwrap();
        assert_eq!(view.partition, "012345");
        assert_eq!(view.entries[0].component_code, "0012345");

        let cleared = clear_history(&state, Some(&user), None).unwrap();
        assert_eq!(cleared.removed.len(), 1);
        assert!(recent_history(&state, Some(&user), None, 5).unwrap().entries.is_empty());
    }

    #[test]
    fn personal_history_requires_login() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        assert!(matches!(
            recent_history(&state, None, None, 5),
            Err(CommandError::LoginRequired)
        ));
    }
}
