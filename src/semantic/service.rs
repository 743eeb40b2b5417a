//! Search service: query text in, ranked opportunities out.
//!
//! Owns the query vectorizer and a read-only snapshot of the corpus. The
//! corpus is shared behind an `Arc`, so concurrent searches need no locking.
//! Each search vectorizes the query and then ranks, and a failed
//! vectorization surfaces as `SearchError::Unavailable` before any scoring.

use std::sync::Arc;

use serde::Serialize;

use crate::opportunity::Item;
use crate::semantic::embeddings::{EmbeddingError, QueryVectorizer};
use crate::semantic::ranker::{self, RankParams, RankParamsError, Selection, SkippedItem};

/// Errors that prevent a search from being performed.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search unavailable: {0}")]
    Unavailable(#[from] EmbeddingError),

    #[error("query is empty")]
    EmptyQuery,

    #[error("invalid search parameters: {0}")]
    InvalidParams(#[from] RankParamsError),
}

/// A ranked opportunity.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub opportunity: serde_json::Value,
    pub similarity: f32,
}

/// Outcome of a search that was actually performed.
///
/// `results` may be empty; that means nothing matched, not that the search failed.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub results: Vec<Hit>,
    pub selection: Selection,
    pub qualified: usize,
    pub eligible: usize,
    /// Corpus items that could not be scored
    pub skipped: Vec<SkippedItem>,
}

pub struct SearchService {
    vectorizer: Box<dyn QueryVectorizer>,
    corpus: Arc<[Item]>,
    defaults: RankParams,
}

impl SearchService {
    pub fn new(
        vectorizer: Box<dyn QueryVectorizer>,
        corpus: impl Into<Arc<[Item]>>,
        defaults: RankParams,
    ) -> Self {
        Self {
            vectorizer,
            corpus: corpus.into(),
            defaults,
        }
    }

    pub fn defaults(&self) -> RankParams {
        self.defaults
    }

    pub fn corpus_len(&self) -> usize {
        self.corpus.len()
    }

    pub fn vectorizer_name(&self) -> &str {
        self.vectorizer.name()
    }

    /// Search the corpus for `query`.
    ///
    /// # Arguments
    /// * `query` - Free-text query
    /// * `params` - Ranking parameters (uses the service defaults if None)
    pub fn search(
        &self,
        query: &str,
        params: Option<RankParams>,
    ) -> Result<SearchReport, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let params = params.unwrap_or(self.defaults);
        params.validate()?;

        log::info!("Searching for: '{query}'");

        let query_vector = self.vectorizer.vectorize(query).map_err(|e| {
            log::error!("Failed to generate query embedding: {e}");
            SearchError::Unavailable(e)
        })?;

        log::debug!(
            "Generated query embedding (dimension: {})",
            query_vector.len()
        );

        let ranking = ranker::rank(&query_vector, &self.corpus, &params);

        Ok(SearchReport {
            query: query.to_string(),
            results: ranking
                .results
                .iter()
                .map(|s| Hit {
                    opportunity: s.item.payload.clone(),
                    similarity: s.score,
                })
                .collect(),
            selection: ranking.selection,
            qualified: ranking.qualified,
            eligible: ranking.eligible,
            skipped: ranking.skipped,
        })
    }
}
