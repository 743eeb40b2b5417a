//! Query vectorization.
//!
//! Turns free-text queries into embedding vectors through one of two
//! providers:
//! - `RemoteEmbedder`: an OpenAI-compatible `/v1/embeddings` endpoint
//! - `LocalEmbedder`: an in-process fastembed model (feature `local-embeddings`)
//!
//! Every failure is terminal for the query. Nothing here retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Embedding API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("Embedding service returned an empty vector")]
    EmptyVector,

    #[error("Embedding contains a non-finite component at position {0}")]
    NonFiniteComponent(usize),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("API key missing: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

/// Turns query text into a vector.
pub trait QueryVectorizer: Send + Sync {
    /// Short description used in logs and health output.
    fn name(&self) -> &str;

    fn vectorize(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Check the structure of a vector returned by a provider.
///
/// The vector must be non-empty, contain only finite values and, when
/// `expected_dimensions` is set, have exactly that many components.
pub fn validate_vector(
    vector: &[f32],
    expected_dimensions: Option<usize>,
) -> Result<(), EmbeddingError> {
    if vector.is_empty() {
        return Err(EmbeddingError::EmptyVector);
    }

    if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
        return Err(EmbeddingError::NonFiniteComponent(position));
    }

    if let Some(expected) = expected_dimensions {
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                got: vector.len(),
            });
        }
    }

    Ok(())
}

/// Build the vectorizer selected in the configuration.
///
/// `base_path` is where the local provider caches downloaded models.
pub fn from_config(
    config: &EmbeddingConfig,
    base_path: &std::path::Path,
) -> Result<Box<dyn QueryVectorizer>, EmbeddingError> {
    match config.provider {
        crate::config::EmbeddingProvider::Openai => Ok(Box::new(RemoteEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        crate::config::EmbeddingProvider::Local => Ok(Box::new(LocalEmbedder::new(
            &config.model,
            base_path.to_path_buf(),
            config.dimensions,
        )?)),
        #[cfg(not(feature = "local-embeddings"))]
        crate::config::EmbeddingProvider::Local => {
            let _ = base_path;
            Err(EmbeddingError::InitFailed(
                "built without the local-embeddings feature".to_string(),
            ))
        }
    }
}

// OpenAI-compatible embeddings API

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings API.
pub struct RemoteEmbedder {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    dimensions: Option<usize>,
    name: String,
}

impl RemoteEmbedder {
    /// Create a client from configuration.
    ///
    /// The API key is read from the environment variable named in the config.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| EmbeddingError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self, EmbeddingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config.base_url.strip_suffix('/').unwrap_or(&config.base_url);

        Ok(Self {
            client,
            endpoint: format!("{base_url}/v1/embeddings"),
            model: config.model.clone(),
            api_key,
            dimensions: config.dimensions,
            name: format!("openai:{}", config.model),
        })
    }
}

impl QueryVectorizer for RemoteEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn vectorize(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        log::debug!("POST {}", self.endpoint);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
            })
            .send()?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            return Err(EmbeddingError::Status { status, body });
        }

        let text = resp.text()?;
        let vector = parse_embed_response(&text)?;
        validate_vector(&vector, self.dimensions)?;

        Ok(vector)
    }
}

fn parse_embed_response(body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let response: EmbedResponse = serde_json::from_str(body)
        .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| EmbeddingError::MalformedResponse("no embedding returned".to_string()))
}

// Local fastembed model

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use fastembed::{InitOptions, TextEmbedding};

    use super::{validate_vector, EmbeddingError, QueryVectorizer};

    /// Wrapper around fastembed's TextEmbedding model.
    /// Uses a Mutex because fastembed's embed() requires &mut self.
    pub struct LocalEmbedder {
        model: Mutex<TextEmbedding>,
        name: String,
        dimensions: usize,
    }

    impl LocalEmbedder {
        /// Load a model by name, downloading it into `cache_dir/models` on first use.
        pub fn new(
            model_name: &str,
            cache_dir: PathBuf,
            expected_dimensions: Option<usize>,
        ) -> Result<Self, EmbeddingError> {
            let model_enum = parse_model_name(model_name)?;

            let models_dir = cache_dir.join("models");
            std::fs::create_dir_all(&models_dir).map_err(|e| {
                EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
            })?;

            let options = InitOptions::new(model_enum)
                .with_cache_dir(models_dir)
                .with_show_download_progress(true);

            let mut model = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

            let dimensions = probe_dimensions(&mut model)?;
            if let Some(expected) = expected_dimensions {
                if expected != dimensions {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected,
                        got: dimensions,
                    });
                }
            }

            log::info!("Loaded local model '{model_name}' ({dimensions} dimensions)");

            Ok(Self {
                model: Mutex::new(model),
                name: format!("local:{model_name}"),
                dimensions,
            })
        }
    }

    impl QueryVectorizer for LocalEmbedder {
        fn name(&self) -> &str {
            &self.name
        }

        fn vectorize(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut model = self.model.lock().map_err(|e| {
                EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
            })?;

            let vector = model
                .embed(vec![text], None)
                .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    EmbeddingError::EmbeddingFailed("No embedding returned".to_string())
                })?;

            validate_vector(&vector, Some(self.dimensions))?;
            Ok(vector)
        }
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
            _ => Err(EmbeddingError::InvalidModel(format!(
                "Unknown model: {}. Supported local models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5",
                name
            ))),
        }
    }

    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        let test_embeddings = model.embed(vec!["test"], None).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to probe dimensions: {}", e))
        })?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_invalid_model_name() {
            let temp_dir = tempfile::tempdir().unwrap();
            let result = LocalEmbedder::new("text-embedding-ada-002", temp_dir.path().into(), None);
            assert!(matches!(result, Err(EmbeddingError::InvalidModel(_))));
        }

        #[test]
        #[ignore = "requires model download"]
        fn test_local_vectorize() {
            let temp_dir = tempfile::tempdir().unwrap();
            let model =
                LocalEmbedder::new("all-MiniLM-L6-v2", temp_dir.path().into(), Some(384)).unwrap();

            let vector = model.vectorize("swimming lessons for kids").unwrap();
            assert_eq!(vector.len(), 384);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_vector() {
        assert!(validate_vector(&[0.1, 0.2], None).is_ok());
        assert!(validate_vector(&[0.1, 0.2], Some(2)).is_ok());
        assert!(matches!(
            validate_vector(&[], None),
            Err(EmbeddingError::EmptyVector)
        ));
        assert!(matches!(
            validate_vector(&[0.1, f32::NAN, 0.3], None),
            Err(EmbeddingError::NonFiniteComponent(1))
        ));
        assert!(matches!(
            validate_vector(&[0.1, 0.2, 0.3], Some(2)),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn test_parse_embed_response() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.5,-0.25]}],"model":"m"}"#;
        assert_eq!(parse_embed_response(body).unwrap(), vec![0.5, -0.25]);
    }

    #[test]
    fn test_parse_embed_response_malformed() {
        assert!(matches!(
            parse_embed_response(r#"{"data":[]}"#),
            Err(EmbeddingError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_embed_response("<html>Bad Gateway</html>"),
            Err(EmbeddingError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_embed_response(r#"{"data":[{"embedding":"nope"}]}"#),
            Err(EmbeddingError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let config = EmbeddingConfig {
            api_key_env: "OPPFINDER_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            RemoteEmbedder::new(&config),
            Err(EmbeddingError::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_unreachable_endpoint_fails() {
        let config = EmbeddingConfig {
            base_url: "http://127.0.0.1:1/".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let embedder = RemoteEmbedder::with_api_key(&config, "sk-test".to_string()).unwrap();
        assert_eq!(embedder.endpoint, "http://127.0.0.1:1/v1/embeddings");
        assert!(matches!(
            embedder.vectorize("art classes"),
            Err(EmbeddingError::Request(_))
        ));
    }
}
