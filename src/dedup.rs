//! Semantic deduplication for incoming memories.
//!
//! New content is embedded (document mode, tags prepended — tags carry
//! real signal, "editor vim" pulls the vector toward editor territory)
//! and checked against its nearest neighbors. Two tiers: a high band that
//! blocks the write outright, and a soft band that is only reported so a
//! human or agent can decide. When embeddings are unavailable the check
//! degrades to exact text matching rather than failing the write.

use crate::embed::Embedder;
use crate::error::MnemoError;
use crate::store::{Memory, MemoryStore, SimilarityCandidate};

/// At or above this, a neighbor is a duplicate and blocks the write.
/// Conservative on purpose — silently discarding a distinct memory is
/// worse than letting a near-duplicate through.
pub const DUPLICATE_THRESHOLD: f64 = 0.93;

/// At or above this (below the duplicate band), a neighbor is reported
/// but does not block.
pub const SIMILAR_THRESHOLD: f64 = 0.85;

/// Duplicates are detected globally, so a handful of neighbors is enough.
const DEDUP_NEIGHBORS: usize = 3;

const TEXT_FALLBACK_LIMIT: usize = 5;

#[derive(Debug, Default)]
pub struct DedupReport {
    /// Neighbors at or above the duplicate threshold. Any one blocks.
    pub duplicates: Vec<SimilarityCandidate>,
    /// Neighbors in the soft band — reported, never blocking.
    pub similar: Vec<SimilarityCandidate>,
    /// Byte-identical matches found by the text fallback.
    pub text_matches: Vec<Memory>,
    /// The document embedding computed along the way, so the remember
    /// workflow never has to encode the same text twice.
    pub embedding: Option<Vec<f32>>,
}

impl DedupReport {
    pub fn blocked(&self) -> bool {
        !self.duplicates.is_empty() || !self.text_matches.is_empty()
    }
}

/// The text that gets embedded for a memory: tags first, then content.
pub fn embed_input(tags: &[String], content: &str) -> String {
    if tags.is_empty() {
        content.to_string()
    } else {
        format!("{} {}", tags.join(" "), content)
    }
}

/// Run the dedup check for proposed content. Never fails the write path:
/// embedding or vector trouble degrades to the text fallback with a
/// warning.
pub async fn check<E: Embedder>(
    store: &MemoryStore,
    embedder: &E,
    tags: &[String],
    content: &str,
) -> DedupReport {
    let mut report = DedupReport::default();

    match embedder.embed_document(&embed_input(tags, content)).await {
        Ok(vector) => {
            // No project restriction here — a duplicate is a duplicate
            // wherever it was filed.
            match store.vector_knn(&vector, DEDUP_NEIGHBORS) {
                Ok(neighbors) => {
                    let (duplicates, similar) = classify(neighbors);
                    report.duplicates = duplicates;
                    report.similar = similar;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "vector search failed, falling back to text match");
                }
            }
            report.embedding = Some(vector);
        }
        Err(e) => {
            tracing::warn!(error = %e, "embedding unavailable, using text match for dedup");
        }
    }

    // Either no embedding at all, or the vector tier found nothing
    // blocking — an exact text match still counts as a duplicate.
    if report.duplicates.is_empty() {
        match store.text_search(content, TEXT_FALLBACK_LIMIT) {
            Ok(matches) => {
                report.text_matches = matches
                    .into_iter()
                    .filter(|m| m.content == content)
                    .collect();
            }
            Err(e) => tracing::warn!(error = %e, "text fallback search failed"),
        }
    }

    report
}

/// Split neighbors into the duplicate and similar tiers; everything below
/// the soft band is dropped.
fn classify(
    neighbors: Vec<SimilarityCandidate>,
) -> (Vec<SimilarityCandidate>, Vec<SimilarityCandidate>) {
    let mut duplicates = Vec::new();
    let mut similar = Vec::new();
    for c in neighbors {
        if c.score >= DUPLICATE_THRESHOLD {
            duplicates.push(c);
        } else if c.score >= SIMILAR_THRESHOLD {
            similar.push(c);
        }
    }
    (duplicates, similar)
}
