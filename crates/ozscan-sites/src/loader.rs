//! Site definition loading from TOML files.
//!
//! Override definitions live one-per-file in a definitions directory; each
//! file is a bare [`SiteDefinition`] table. Invalid files are logged and
//! skipped so one bad override cannot take down the registry.

use crate::{
    definition::SiteDefinition,
    error::{Result, SiteError},
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Loader for site definitions from TOML files.
#[derive(Debug)]
pub struct SiteLoader {
    /// Base directory containing site definition files
    definitions_dir: PathBuf,
}

impl SiteLoader {
    /// Create a new loader with the given definitions directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(definitions_dir: impl Into<PathBuf>) -> Result<Self> {
        let definitions_dir = definitions_dir.into();

        if !definitions_dir.is_dir() {
            return Err(SiteError::DirectoryNotFound {
                path: definitions_dir.display().to_string(),
            });
        }

        Ok(Self { definitions_dir })
    }

    /// Load all site definitions from the definitions directory.
    ///
    /// Invalid definitions are logged as warnings and skipped.
    ///
    /// # Errors
    /// Returns error if the directory can't be read.
    pub fn load_all(&self) -> Result<Vec<SiteDefinition>> {
        let mut definitions = Vec::new();

        for entry in std::fs::read_dir(&self.definitions_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                continue;
            }

            match Self::load_from_path(&path) {
                Ok(definition) => {
                    if let Err(e) = definition.validate() {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "skipping invalid site definition"
                        );
                        continue;
                    }
                    definitions.push(definition);
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load site definition"
                    );
                }
            }
        }

        info!(
            count = definitions.len(),
            dir = %self.definitions_dir.display(),
            "loaded site definitions"
        );

        Ok(definitions)
    }

    /// Load a site definition from a specific file path.
    fn load_from_path(path: &Path) -> Result<SiteDefinition> {
        let contents = std::fs::read_to_string(path).map_err(|e| SiteError::LoadError {
            path: path.display().to_string(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| SiteError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
    }
}
