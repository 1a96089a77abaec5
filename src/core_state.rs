//! Process-wide scanner state shared by every command.
//!
//! Catalogs are loaded lazily and cached for the life of the process; OCR
//! engines and the persister are built once from the configuration.

use std::sync::OnceLock;

use crate::config::ScannerConfig;
use crate::models::AppVariant;
use crate::pipeline::extraction::CodeBoundary;
use crate::pipeline::recognition::{LocalTesseract, OcrSpaceClient, TextRecognizer};
use crate::pipeline::validation::{ComponentCatalog, OperatorCatalog};
use crate::pipeline::ScanError;
use crate::storage::{LocalStore, RecordPersister, RemoteSheet, SheetsClient, StorageError};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    config: ScannerConfig,
    components: OnceLock<ComponentCatalog>,
    /// `None` inside means the operator catalog file is absent.
    operators: OnceLock<Option<OperatorCatalog>>,
    recognizer: TextRecognizer,
    persister: RecordPersister,
    /// Why no remote sheet is attached, when none is.
    remote_unavailable: Option<String>,
}

impl CoreState {
    /// Build engines and channels from configuration. Nothing here touches
    /// the network or the catalogs.
    pub fn new(config: ScannerConfig) -> Self {
        let recognizer = build_recognizer(&config);
        let local = LocalStore::new(&config.general.data_dir);

        let (remote, remote_unavailable) = match SheetsClient::from_config(&config) {
            Ok(client) => (
                Some(Box::new(client) as Box<dyn RemoteSheet + Send + Sync>),
                None,
            ),
            Err(e) => {
                if !matches!(e, StorageError::NotConfigured(_)) || config.sheets.enabled {
                    tracing::warn!(error = %e, "Remote sheet unavailable, saving locally only");
                }
                (None, Some(e.to_string()))
            }
        };

        tracing::info!(
            variant = %config.general.variant,
            engines = ?recognizer.engine_names(),
            remote_sheet = remote.is_some(),
            data_dir = %config.general.data_dir.display(),
            "Scanner state initialised"
        );

        Self {
            components: OnceLock::new(),
            operators: OnceLock::new(),
            recognizer,
            persister: RecordPersister::new(local, remote),
            remote_unavailable,
            config,
        }
    }

    /// Assemble from prepared parts (tests, embedding).
    pub fn from_parts(
        config: ScannerConfig,
        recognizer: TextRecognizer,
        persister: RecordPersister,
    ) -> Self {
        Self {
            config,
            components: OnceLock::new(),
            operators: OnceLock::new(),
            recognizer,
            persister,
            remote_unavailable: None,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn variant(&self) -> AppVariant {
        self.config.general.variant
    }

    pub fn code_boundary(&self) -> CodeBoundary {
        self.config.code_boundary()
    }

    pub fn recognizer(&self) -> &TextRecognizer {
        &self.recognizer
    }

    pub fn persister(&self) -> &RecordPersister {
        &self.persister
    }

    pub fn local_store(&self) -> &LocalStore {
        self.persister.local()
    }

    pub fn remote_unavailable(&self) -> Option<&str> {
        self.remote_unavailable.as_deref()
    }

    /// Component catalog, loaded on first use. A missing file is
    /// `ScanError::CatalogMissing` and is retried on the next call.
    pub fn component_catalog(&self) -> Result<&ComponentCatalog, ScanError> {
        if let Some(catalog) = self.components.get() {
            return Ok(catalog);
        }
        let catalog = ComponentCatalog::load(
            &self.config.component_catalog_path(),
            &self.config.catalog.component_code_column,
            &self.config.catalog.component_description_column,
        )?;
        Ok(self.components.get_or_init(|| catalog))
    }

    /// Operator catalog, loaded on first use; `Ok(None)` when the file is
    /// absent and operator checks are permissive.
    pub fn operator_catalog(&self) -> Result<Option<&OperatorCatalog>, ScanError> {
        if let Some(catalog) = self.operators.get() {
            return Ok(catalog.as_ref());
        }
        let catalog = OperatorCatalog::load_optional(
            &self.config.operator_catalog_path(),
            &self.config.catalog.operator_id_column,
            &self.config.catalog.operator_name_column,
        )?;
        Ok(self.operators.get_or_init(|| catalog).as_ref())
    }
}

fn build_recognizer(config: &ScannerConfig) -> TextRecognizer {
    let mut recognizer = TextRecognizer::new();
    if config.ocr.local_enabled {
        recognizer = recognizer.with_engine(Box::new(LocalTesseract::new(
            config.ocr.tessdata_dir.as_deref(),
            &config.ocr.local_language,
        )));
    }
    if config.ocr.remote_enabled {
        match OcrSpaceClient::from_config(&config.ocr) {
            Ok(client) => recognizer = recognizer.with_engine(Box::new(client)),
            Err(e) => tracing::warn!(error = %e, "Remote OCR disabled"),
        }
    }
    recognizer
}
