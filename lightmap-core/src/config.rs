// User configuration: artifact locations and per-stage defaults

use crate::artifact;
use crate::geocode::{GeocodeOptions, GeocodeProvider};
use crate::map::{MapExtent, MapStyle, OutputFormat};
use lightmap_scanner::{HttpOptions, ListingLayout};
use lightmap_scanner::fetch::DEFAULT_USER_AGENT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/lightmap/";
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_RAW_PATH: &str = "data/raw/lighthouses.json";
pub const DEFAULT_PROCESSED_PATH: &str = "data/processed/lighthouses.json";
pub const DEFAULT_MAP_PATH: &str = "maps/lighthouses.svg";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Write(#[from] artifact::ArtifactError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// `~/.config/lightmap/config.json`, tilde expanded.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_DIR).as_ref()).join(CONFIG_FILE_NAME)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw: PathBuf,
    pub processed: PathBuf,
    pub map: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw: PathBuf::from(DEFAULT_RAW_PATH),
            processed: PathBuf::from(DEFAULT_PROCESSED_PATH),
            map: PathBuf::from(DEFAULT_MAP_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 25,
            retries: 3,
            backoff_ms: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub layout: ListingLayout,
    pub page_delay_ms: u64,
    pub keep_going: bool,
    /// Substituted into `{state}` URLs; empty means all states
    pub states: Vec<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            layout: ListingLayout::Auto,
            page_delay_ms: 500,
            keep_going: false,
            states: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    pub provider: GeocodeProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub workers: usize,
    /// Falls back to the provider's own spacing when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            provider: GeocodeProvider::Nominatim,
            endpoint: None,
            workers: 1,
            delay_ms: None,
            max_retries: 3,
            backoff_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Inferred from the output extension when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    pub extent: MapExtent,
    pub style: MapStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub http: HttpConfig,
    pub scrape: ScrapeConfig,
    pub geocode: GeocodeConfig,
    pub map: MapConfig,
}

impl PipelineConfig {
    /// Load the configuration. An explicitly named file must exist; the
    /// default location is optional and yields defaults when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref()), true),
            None => (default_config_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::NotFound(path));
            }
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        artifact::write_json(path, self)?;
        Ok(())
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.http.user_agent.clone(),
            timeout: Duration::from_secs(self.http.timeout_secs),
            retries: self.http.retries,
            backoff: Duration::from_millis(self.http.backoff_ms),
        }
    }

    pub fn geocode_options(&self) -> GeocodeOptions {
        GeocodeOptions {
            workers: self.geocode.workers.max(1),
            max_retries: self.geocode.max_retries,
            delay: self
                .geocode
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| self.geocode.provider.default_delay()),
            backoff: Duration::from_millis(self.geocode.backoff_ms),
            show_progress_bars: false,
        }
    }
}
