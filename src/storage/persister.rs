use serde::Serialize;

use super::local::{LocalStore, LocalWrite};
use super::remote::RemoteSheet;
use crate::models::ScanEvent;

/// Reason reported when no remote sheet is configured.
pub const REMOTE_OFFLINE: &str = "offline";

/// Result of one persistence channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Saved { location: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl ChannelOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub partition: String,
    pub remote: ChannelOutcome,
    pub local: ChannelOutcome,
    /// Set when the spreadsheet write failed and the row went to CSV.
    pub local_fallback: Option<String>,
}

impl PersistReport {
    pub fn saved_anywhere(&self) -> bool {
        self.remote.is_saved() || self.local.is_saved()
    }
}

/// Best-effort writer over the remote sheet and the local store.
///
/// The channels are independent: a remote failure never blocks the local
/// write and the other way round. Nothing is retried.
pub struct RecordPersister {
    local: LocalStore,
    remote: Option<Box<dyn RemoteSheet + Send + Sync>>,
}

impl RecordPersister {
    pub fn new(local: LocalStore, remote: Option<Box<dyn RemoteSheet + Send + Sync>>) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn remote(&self) -> Option<&(dyn RemoteSheet + Send + Sync)> {
        self.remote.as_deref()
    }

    pub fn persist(&self, event: &ScanEvent, partition: &str) -> PersistReport {
        let _span = tracing::info_span!(
            "persist_scan",
            code = event.component_code(),
            partition,
        )
        .entered();

        let remote = match &self.remote {
            None => ChannelOutcome::Skipped {
                reason: REMOTE_OFFLINE.to_string(),
            },
            Some(sheet) => match sheet.append_row(&event.to_row()) {
                Ok(()) => ChannelOutcome::Saved {
                    location: sheet.target(),
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Remote save failed");
                    ChannelOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            },
        };

        let mut local_fallback = None;
        let local = match self.local.append(partition, event) {
            Ok(write) => {
                if let LocalWrite::CsvFallback { xlsx_error, .. } = &write {
                    local_fallback = Some(xlsx_error.clone());
                }
                ChannelOutcome::Saved {
                    location: write.path().display().to_string(),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Local save failed");
                ChannelOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        PersistReport {
            partition: partition.to_string(),
            remote,
            local,
            local_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::{ComponentRecord, OperatorIdentity, Quantity, ScanCandidate, ScanSource};
    use crate::pipeline::validation::{validate_candidate, ComponentCatalog};
    use crate::storage::remote::MockSheet;

    fn event() -> ScanEvent {
        let catalog = ComponentCatalog::from_records(
            Path::new("mem"),
            vec![ComponentRecord {
                code: "0012345".into(),
                description: "Washer".into(),
            }],
        );
        let candidate =
            ScanCandidate::new("0012345".into(), ScanSource::Manual, "0012345".into(), "N/A".into());
        let validated = validate_candidate(candidate, &catalog).unwrap();
        ScanEvent::new(
            &validated,
            &OperatorIdentity {
                id: "123456".into(),
                name: None,
            },
            Quantity::new(1).unwrap(),
            "",
            "",
            NaiveDate::from_ymd_opt(2026, 2, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn both_channels_saved() {
        let dir = tempfile::tempdir().unwrap();
        let persister = RecordPersister::new(
            LocalStore::new(dir.path()),
            Some(Box::new(MockSheet::new())),
        );
        let report = persister.persist(&event(), "123456");
        assert!(report.remote.is_saved());
        assert!(report.local.is_saved());
        assert!(report.local_fallback.is_none());
    }

    #[test]
    fn remote_failure_does_not_block_local() {
        let dir = tempfile::tempdir().unwrap();
        let persister = RecordPersister::new(
            LocalStore::new(dir.path()),
            Some(Box::new(MockSheet::unreachable("connection refused"))),
        );
        let report = persister.persist(&event(), "123456");
        assert!(matches!(report.remote, ChannelOutcome::Failed { ref error } if error.contains("connection refused")));
        assert!(report.local.is_saved());
        assert!(report.saved_anywhere());
        let history = persister.local().history("123456", 5).unwrap();
        assert_eq!(history[0].component_code, "0012345");
    }

    #[test]
    fn no_remote_is_skipped_offline() {
        let dir = tempfile::tempdir().unwrap();
        let persister = RecordPersister::new(LocalStore::new(dir.path()), None);
        let report = persister.persist(&event(), "general");
        assert_eq!(
            report.remote,
            ChannelOutcome::Skipped {
                reason: REMOTE_OFFLINE.into()
            }
        );
        assert!(report.local.is_saved());
    }

    #[test]
    fn local_failure_does_not_block_remote() {
        let dir = tempfile::tempdir().unwrap();
        // data_dir is a regular file, so nothing can be created under it
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let sheet = MockSheet::new();
        let persister = RecordPersister::new(LocalStore::new(&blocker), Some(Box::new(sheet)));
        let report = persister.persist(&event(), "123456");
        assert!(report.remote.is_saved());
        assert!(matches!(report.local, ChannelOutcome::Failed { .. }));
        assert!(report.saved_anywhere());
    }
}
