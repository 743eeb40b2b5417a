mod search;

use serde_json::json;

use crate::opportunity::Item;
use crate::semantic::{EmbeddingError, QueryVectorizer};

/// Query vector used by the scenario corpora.
pub const QUERY: [f32; 2] = [1.0, 0.0];

/// A 2-d unit vector whose cosine similarity with [`QUERY`] is `score`.
pub fn vector_with_score(score: f32) -> Vec<f32> {
    vec![score, (1.0 - score * score).max(0.0).sqrt()]
}

pub fn item(name: &str, embedding: Option<Vec<f32>>) -> Item {
    Item::new(json!({ "activity_name": name }), embedding)
}

/// One item per score, named `item-<position>`.
pub fn corpus_with_scores(scores: &[f32]) -> Vec<Item> {
    scores
        .iter()
        .enumerate()
        .map(|(i, s)| item(&format!("item-{i}"), Some(vector_with_score(*s))))
        .collect()
}

/// Vectorizer that always returns the same vector.
pub struct FixedVectorizer(pub Vec<f32>);

impl QueryVectorizer for FixedVectorizer {
    fn name(&self) -> &str {
        "fixed"
    }

    fn vectorize(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.0.clone())
    }
}

/// Vectorizer standing in for an unreachable embedding service.
pub struct FailingVectorizer;

impl QueryVectorizer for FailingVectorizer {
    fn name(&self) -> &str {
        "failing"
    }

    fn vectorize(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Status {
            status: 401,
            body: "invalid api key".to_string(),
        })
    }
}
