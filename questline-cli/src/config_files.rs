//! Engine configuration and milestone catalog read from JSON files.
use questline_engine::{ConfigError, ConfigLoader, EngineConfig, MilestoneCatalog};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {}: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

/// Files overriding the embedded defaults; `None` keeps the default.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    pub engine: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<String, ConfigFileError> {
        fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ConfigLoader for FileConfig {
    type Error = ConfigFileError;

    fn load_engine_config(&self) -> Result<EngineConfig, Self::Error> {
        let Some(path) = &self.engine else {
            return Ok(EngineConfig::default());
        };
        EngineConfig::from_json(&Self::read(path)?).map_err(|source| ConfigFileError::Invalid {
            path: path.clone(),
            source,
        })
    }

    fn load_catalog(&self) -> Result<MilestoneCatalog, Self::Error> {
        let Some(path) = &self.catalog else {
            return Ok(MilestoneCatalog::standard().clone());
        };
        MilestoneCatalog::from_json(&Self::read(path)?).map_err(|source| {
            ConfigFileError::Invalid {
                path: path.clone(),
                source,
            }
        })
    }
}
