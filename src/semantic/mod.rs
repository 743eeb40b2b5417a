//! Semantic search over precomputed opportunity embeddings.
//!
//! # Architecture
//!
//! - `similarity`: Cosine similarity scoring
//! - `ranker`: Dynamic-threshold ranking (qualify, then floor)
//! - `embeddings`: Query vectorization through a remote API or a local model
//! - `corpus`: Loading opportunity records and their embeddings
//! - `service`: Vectorize-then-rank search over a shared corpus

pub mod corpus;
pub mod embeddings;
pub mod ranker;
mod service;
pub mod similarity;

pub use corpus::{CorpusSource, JsonCorpus};
pub use embeddings::{EmbeddingError, QueryVectorizer};
pub use ranker::{RankParams, Selection};
pub use service::{Hit, SearchError, SearchReport, SearchService};

/// Default cap on the number of results
pub const DEFAULT_TOP_K: usize = 10;

/// Default number of results returned even below the threshold
pub const DEFAULT_MIN_RESULTS: usize = 3;

/// Default similarity threshold for a result to count as qualified
pub const DEFAULT_THRESHOLD: f32 = 0.75;
