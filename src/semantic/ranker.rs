//! Dynamic-threshold ranking of corpus items against a query vector.
//!
//! Ranking is a two-tier policy:
//! 1. Qualify: items scoring at or above the threshold are preferred, and
//!    when there are at least `min_results` of them only those are returned
//!    (trimmed to `top_k`).
//! 2. Floor: otherwise the threshold is relaxed and the best
//!    `min(min_results, top_k)` items are returned regardless of score.
//!
//! In both tiers the result never exceeds `top_k` or the number of items
//! that could be scored.

use rayon::prelude::*;
use serde::Serialize;

use crate::opportunity::Item;
use crate::semantic::similarity::{cosine_similarity, SimilarityError};

/// Parameters controlling a single ranking call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankParams {
    /// Hard cap on result length
    pub top_k: usize,
    /// Best-effort floor on result length
    pub min_results: usize,
    /// Minimum score for an item to count as qualified, in [-1.0, 1.0]
    pub threshold: f32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RankParamsError {
    #[error("top_k must be at least 1")]
    ZeroTopK,

    #[error("threshold must be between -1.0 and 1.0, got {0}")]
    ThresholdOutOfRange(f32),
}

impl RankParams {
    pub fn validate(&self) -> Result<(), RankParamsError> {
        if self.top_k == 0 {
            return Err(RankParamsError::ZeroTopK);
        }
        if !self.threshold.is_finite() || !(-1.0..=1.0).contains(&self.threshold) {
            return Err(RankParamsError::ThresholdOutOfRange(self.threshold));
        }
        Ok(())
    }

    /// Replace the fields that are given, keep the rest.
    pub fn with_overrides(
        self,
        top_k: Option<usize>,
        min_results: Option<usize>,
        threshold: Option<f32>,
    ) -> Self {
        Self {
            top_k: top_k.unwrap_or(self.top_k),
            min_results: min_results.unwrap_or(self.min_results),
            threshold: threshold.unwrap_or(self.threshold),
        }
    }
}

/// Which tier of the selection policy produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Enough items met the threshold; only qualified items were returned.
    Qualified,
    /// Too few items met the threshold; the best items were returned anyway.
    Relaxed,
}

/// An item paired with its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredItem<'a> {
    pub item: &'a Item,
    pub score: f32,
}

/// Why an item was left out of scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MissingVector,
    DimensionMismatch { expected: usize, got: usize },
}

/// A corpus item that could not be scored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedItem {
    /// Position of the item in the corpus
    pub position: usize,
    pub label: String,
    pub reason: SkipReason,
}

/// Result of one ranking call.
#[derive(Debug, Clone)]
pub struct Ranking<'a> {
    /// Selected items, highest score first
    pub results: Vec<ScoredItem<'a>>,
    pub selection: Selection,
    /// Number of scored items meeting the threshold
    pub qualified: usize,
    /// Number of items that could be scored
    pub eligible: usize,
    pub skipped: Vec<SkippedItem>,
}

/// Rank `corpus` against `query` using the two-tier selection policy.
///
/// Items without a vector, or whose vector has a different dimension than the
/// query, are skipped and reported in [`Ranking::skipped`]. Items with equal
/// scores keep their relative corpus order.
pub fn rank<'a>(query: &[f32], corpus: &'a [Item], params: &RankParams) -> Ranking<'a> {
    let outcomes: Vec<Result<ScoredItem<'a>, SkipReason>> = corpus
        .par_iter()
        .map(|item| score_item(query, item))
        .collect();

    let mut scored = Vec::with_capacity(outcomes.len());
    let mut skipped = Vec::new();

    for (position, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(scored_item) => scored.push(scored_item),
            Err(reason) => {
                let item = &corpus[position];
                match &reason {
                    SkipReason::MissingVector => {
                        log::warn!("Opportunity missing embedding: {}", item.label())
                    }
                    SkipReason::DimensionMismatch { expected, got } => log::warn!(
                        "Opportunity embedding has {got} dimensions, query has {expected}: {}",
                        item.label()
                    ),
                }
                skipped.push(SkippedItem {
                    position,
                    label: item.label().to_string(),
                    reason,
                });
            }
        }
    }

    // Stable sort: equal scores keep corpus order
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let qualified = scored
        .iter()
        .take_while(|s| s.score >= params.threshold)
        .count();
    let eligible = scored.len();

    let (len, selection) = select(qualified, eligible, params);
    scored.truncate(len);

    match selection {
        Selection::Qualified => log::info!(
            "Found {} results above threshold {:.2}",
            scored.len(),
            params.threshold
        ),
        Selection::Relaxed => log::info!(
            "Found {} results (threshold {:.2} too restrictive, showing top {})",
            scored.len(),
            params.threshold,
            scored.len()
        ),
    }
    if let (Some(first), Some(last)) = (scored.first(), scored.last()) {
        log::debug!("Similarity range: {:.3} - {:.3}", last.score, first.score);
    }

    Ranking {
        results: scored,
        selection,
        qualified,
        eligible,
        skipped,
    }
}

fn score_item<'a>(query: &[f32], item: &'a Item) -> Result<ScoredItem<'a>, SkipReason> {
    let embedding = item.embedding().ok_or(SkipReason::MissingVector)?;
    let score = cosine_similarity(query, embedding).map_err(|e| match e {
        SimilarityError::DimensionMismatch { expected, got } => {
            SkipReason::DimensionMismatch { expected, got }
        }
    })?;
    Ok(ScoredItem { item, score })
}

/// Decide how many items of the sorted list to return.
///
/// The relaxed branch is only reachable when `qualified < min_results`, so
/// the floor it takes always covers the whole qualified prefix. If the guard
/// changes, the floor has to be re-derived with it.
/// Both branches share the `top_k` cap.
fn select(qualified: usize, eligible: usize, params: &RankParams) -> (usize, Selection) {
    if qualified >= params.min_results {
        (qualified.min(params.top_k), Selection::Qualified)
    } else {
        let floor = params.min_results.min(params.top_k).min(eligible);
        (floor, Selection::Relaxed)
    }
}
