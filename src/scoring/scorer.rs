//! Dual-score pair scoring, playing the role of the teacher's
//! `scoring::scorer::{Scorer trait, TfIdfScorer, BM25Scorer}`:
//! `TagIdfContext` stands in for `DocStats`, `EdgeScorer` stands in for
//! `Scorer`, generalized from a single TF-IDF/BM25 term to the dual
//! semantic+tag model.

use std::collections::BTreeSet;

use crate::core::types::Node;
use crate::scoring::tag_idf::TagIdfContext;
use crate::text::tags::GENERIC_TERMS;

#[derive(Debug, Clone)]
pub struct PairScore {
    pub score: f32,
    pub semantic_score: Option<f32>,
    pub tag_score: Option<f32>,
    pub shared_tags: Vec<String>,
}

pub struct EdgeScorer {
    pub semantic_threshold: f32,
    pub tag_threshold: f32,
}

impl EdgeScorer {
    pub fn new(semantic_threshold: f32, tag_threshold: f32) -> Self {
        EdgeScorer { semantic_threshold, tag_threshold }
    }

    pub fn score(&self, a: &Node, b: &Node, ctx: &TagIdfContext) -> PairScore {
        let semantic_score = semantic_score(a, b);
        let (tag_score, shared_tags) = tag_score(a, b, ctx);

        let score = semantic_score.unwrap_or(0.0).max(tag_score.unwrap_or(0.0));

        PairScore { score, semantic_score, tag_score, shared_tags }
    }

    /// True iff the pair clears either threshold; structural edge types
    /// are never passed through this check (spec §4.4).
    pub fn passes_threshold(&self, pair: &PairScore) -> bool {
        pair.semantic_score.is_some_and(|s| s >= self.semantic_threshold)
            || pair.tag_score.is_some_and(|s| s >= self.tag_threshold)
    }
}

fn semantic_score(a: &Node, b: &Node) -> Option<f32> {
    let (va, vb) = (a.embedding.as_ref()?, b.embedding.as_ref()?);
    if va.len() != vb.len() {
        return None;
    }

    let dot: f32 = va.iter().zip(vb.iter()).map(|(x, y)| x * y).sum();
    let mut cosine = dot.clamp(-1.0, 1.0);

    if shares_only_generic_tokens(a, b) {
        cosine *= 0.4;
    }

    Some(cosine)
}

/// True when every token the two nodes have in common is on the generic
/// technical-term blocklist, per spec §4.2's 0.4x semantic down-weight.
fn shares_only_generic_tokens(a: &Node, b: &Node) -> bool {
    let shared: Vec<&String> = a
        .token_counts
        .keys()
        .filter(|token| b.token_counts.contains_key(token.as_str()))
        .collect();

    !shared.is_empty() && shared.iter().all(|token| GENERIC_TERMS.contains(&token.as_str()))
}

fn tag_score(a: &Node, b: &Node, ctx: &TagIdfContext) -> (Option<f32>, Vec<String>) {
    let shared: BTreeSet<String> = a.tags.intersection(&b.tags).cloned().collect();
    if shared.is_empty() {
        return (None, Vec::new());
    }

    let union_len = a.tags.union(&b.tags).count().max(1) as f64;
    let jaccard = shared.len() as f64 / union_len;
    let avg_idf = shared.iter().map(|t| ctx.idf_of(t)).sum::<f64>() / shared.len() as f64;

    let normalized_idf = if ctx.max_idf > 0.0 { avg_idf / ctx.max_idf } else { 0.0 };
    let score = (jaccard * normalized_idf).clamp(0.0, 1.0) as f32;

    (Some(score), shared.into_iter().collect())
}
