use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::semantic::{RankParams, DEFAULT_MIN_RESULTS, DEFAULT_THRESHOLD, DEFAULT_TOP_K};

const CONFIG_FILE: &str = "config.yaml";

/// Default corpus snapshot file name, relative to the base path
const DEFAULT_CORPUS_FILE: &str = "opportunities_with_embeddings.json";
const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("could not determine home directory; set OPPFINDER_BASE_PATH")]
    NoHomeDir,
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Defaults for the ranking parameters; CLI flags and request fields override them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum number of results
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Results to return even when too few items meet the threshold
    #[serde(default = "default_min_results")]
    pub min_results: usize,

    /// Similarity threshold [-1.0, 1.0]
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_results: DEFAULT_MIN_RESULTS,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl SearchConfig {
    pub fn rank_params(&self) -> RankParams {
        RankParams {
            top_k: self.top_k,
            min_results: self.min_results,
            threshold: self.threshold,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_min_results() -> usize {
    DEFAULT_MIN_RESULTS
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible HTTP API
    #[default]
    Openai,
    /// In-process fastembed model
    Local,
}

/// Configuration for the query embedding provider.
///
/// Must match the provider and model the corpus vectors were built with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Base URL of the embeddings API (openai provider only)
    #[serde(default = "default_embedding_url")]
    pub base_url: String,

    /// Model name, e.g. "text-embedding-ada-002" or "bge-base-en-v1.5"
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Expected vector dimension; unchecked when unset
    #[serde(default)]
    pub dimensions: Option<usize>,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            base_url: DEFAULT_EMBEDDING_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            dimensions: None,
            timeout_secs: DEFAULT_EMBEDDING_TIMEOUT_SECS,
        }
    }
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_embedding_timeout_secs() -> u64 {
    DEFAULT_EMBEDDING_TIMEOUT_SECS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_SERVER_ADDR.to_string(),
        }
    }
}

fn default_server_addr() -> String {
    DEFAULT_SERVER_ADDR.to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Corpus snapshot; relative paths resolve against the base path
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search
            .rank_params()
            .validate()
            .map_err(|e| ConfigError::invalid("search", e.to_string()))?;

        let emb = &self.embedding;
        if emb.provider == EmbeddingProvider::Openai {
            url::Url::parse(&emb.base_url).map_err(|e| {
                ConfigError::invalid("embedding.base_url", format!("{e}: {:?}", emb.base_url))
            })?;
        }

        if emb.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "embedding.timeout_secs",
                "must be greater than 0",
            ));
        }

        if emb.dimensions == Some(0) {
            return Err(ConfigError::invalid(
                "embedding.dimensions",
                "must be greater than 0 when set",
            ));
        }

        if emb.model.trim().is_empty() {
            return Err(ConfigError::invalid("embedding.model", "must not be empty"));
        }

        Ok(())
    }

    /// Resolve the base path from `OPPFINDER_BASE_PATH` or the home directory.
    pub fn default_base_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("OPPFINDER_BASE_PATH") {
            return Ok(PathBuf::from(path));
        }

        let home = homedir::my_home()
            .ok()
            .flatten()
            .ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".local/share/oppfinder"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&Self::default_base_path()?)
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults if missing.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        let path = base_path.join(CONFIG_FILE);
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(base_path).map_err(io_err)?;

        // create new if does not exist
        if !path.exists() {
            let defaults = serde_yml::to_string(&Self::default())?;
            std::fs::write(&path, defaults).map_err(io_err)?;
        }

        let config_str = std::fs::read_to_string(&path).map_err(io_err)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;
        config.base_path = base_path.to_path_buf();

        config.validate()?;

        Ok(config)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn corpus_path(&self) -> PathBuf {
        let path = self
            .corpus_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CORPUS_FILE));

        if path.is_absolute() {
            path
        } else {
            self.base_path.join(path)
        }
    }
}
