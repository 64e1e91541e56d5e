//! Core runtime configuration.
//!
//! Resolved once at process startup and passed into the engine, so no
//! request handler ever reads process-wide environment variables.

use crate::catalog::SymptomCatalog;
use crate::error::{CoreResult, TriageError};
use std::path::{Path, PathBuf};

/// Configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    catalog_path: Option<PathBuf>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::Validation`] if a catalogue override is
    /// given but does not point at a readable file.
    pub fn new(data_dir: PathBuf, catalog_path: Option<PathBuf>) -> CoreResult<Self> {
        if let Some(path) = &catalog_path {
            if !path.is_file() {
                return Err(TriageError::Validation(format!(
                    "symptom catalogue override is not a file: {}",
                    path.display()
                )));
            }
        }
        Ok(Self {
            data_dir,
            catalog_path,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn catalog_path(&self) -> Option<&Path> {
        self.catalog_path.as_deref()
    }

    /// Loads the symptom catalogue named by this configuration, falling
    /// back to the built-in default set.
    pub fn load_catalog(&self) -> CoreResult<SymptomCatalog> {
        match &self.catalog_path {
            Some(path) => SymptomCatalog::from_file(path),
            None => Ok(SymptomCatalog::default_catalog()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_catalogue_override_is_rejected() {
        let err = CoreConfig::new(
            PathBuf::from("/tmp/triage-data"),
            Some(PathBuf::from("/does/not/exist.yaml")),
        )
        .expect_err("expected validation failure");
        assert!(matches!(err, TriageError::Validation(_)));
    }

    #[test]
    fn default_config_loads_builtin_catalogue() {
        let cfg = CoreConfig::new(PathBuf::from("/tmp/triage-data"), None).expect("config");
        let catalog = cfg.load_catalog().expect("catalogue");
        assert!(!catalog.is_empty());
    }
}
