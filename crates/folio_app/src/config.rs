//! RON configuration for the `folio` binary.
//!
//! Every field is optional; missing fields keep the engine defaults.
//!
//! ```ron
//! (
//!     image_delay_ms: 800,
//!     max_image_bytes: 31457280,
//!     write_manifest: false,
//! )
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use engine_logging::{engine_debug, engine_info};
use folio_engine::{EngineConfig, FetchSettings, HarvestSettings};
use serde::{Deserialize, Serialize};

/// Looked up in the working directory when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "./folio.ron";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FolioConfig {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_document_bytes: u64,
    pub max_image_bytes: u64,
    /// Minimum gap between requests to the source host.
    pub image_delay_ms: u64,
    pub write_manifest: bool,
}

impl Default for FolioConfig {
    fn default() -> Self {
        let document = FetchSettings::for_documents();
        let image = FetchSettings::for_images();
        let harvest = HarvestSettings::default();
        Self {
            user_agent: document.user_agent,
            connect_timeout_secs: document.connect_timeout.as_secs(),
            request_timeout_secs: document.request_timeout.as_secs(),
            redirect_limit: document.redirect_limit,
            max_document_bytes: document.max_bytes,
            max_image_bytes: image.max_bytes,
            image_delay_ms: u64::try_from(harvest.image_delay.as_millis()).unwrap_or(u64::MAX),
            write_manifest: harvest.write_manifest,
        }
    }
}

impl FolioConfig {
    /// Loads `explicit` if given (it must exist), else the default file if
    /// present, else the defaults.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    engine_debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        engine_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub(crate) fn parse(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub(crate) fn engine_config(&self) -> EngineConfig {
        let document_fetch = FetchSettings {
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            redirect_limit: self.redirect_limit,
            max_bytes: self.max_document_bytes,
            ..FetchSettings::for_documents()
        };
        let image_fetch = FetchSettings {
            max_bytes: self.max_image_bytes,
            ..document_fetch.clone()
        };
        EngineConfig {
            document_fetch,
            image_fetch,
            harvest: HarvestSettings {
                image_delay: Duration::from_millis(self.image_delay_ms),
                write_manifest: self.write_manifest,
            },
            clock: Arc::new(|| Utc::now().to_rfc3339()),
        }
    }
}
