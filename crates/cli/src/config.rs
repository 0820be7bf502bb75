//! Settings for the `catalog` binary.
//!
//! Precedence, lowest first: built-in defaults, the TOML file given with
//! `--config`, then environment variables and flags (handled by clap).

use catalogflow_backend_http::HttpBackendConfig;
use catalogflow_history::DEFAULT_CAPACITY;
use catalogflow_source::SourceConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// On-disk configuration. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub live: LiveSection,
    #[serde(default)]
    pub dataset: DatasetSection,
    #[serde(default)]
    pub history: HistorySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiveSection {
    /// Catalog API base URL; no URL means run offline
    pub base_url: Option<String>,
    /// Bound on each live call
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSection {
    /// Static catalog JSON; the bundled sample is used when absent
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistorySection {
    /// Where recently viewed items are kept between runs
    pub path: Option<PathBuf>,
    pub capacity: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Command-line overrides, already merged with environment variables.
#[derive(Debug, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub dataset: Option<PathBuf>,
    pub history: Option<PathBuf>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: Option<String>,
    pub live_timeout: Duration,
    pub dataset: Option<PathBuf>,
    pub history: Option<PathBuf>,
    pub history_capacity: usize,
}

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

impl Settings {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Self {
        let api_url = overrides
            .api_url
            .or(file.live.base_url)
            .filter(|url| !url.trim().is_empty());

        let timeout_ms = overrides
            .timeout_ms
            .or(file.live.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Self {
            api_url,
            live_timeout: Duration::from_millis(timeout_ms),
            dataset: overrides.dataset.or(file.dataset.path),
            history: overrides.history.or(file.history.path),
            history_capacity: file.history.capacity.unwrap_or(DEFAULT_CAPACITY),
        }
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            live_timeout: self.live_timeout,
        }
    }

    /// HTTP client settings, when a live backend is configured.
    pub fn backend_config(&self) -> Option<HttpBackendConfig> {
        self.api_url.as_ref().map(|url| HttpBackendConfig {
            base_url: url.clone(),
            // The orchestrator enforces the tighter bound; this only caps
            // the client itself.
            timeout_secs: self.live_timeout.as_secs().max(1),
        })
    }
}
