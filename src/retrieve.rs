//! Similarity retrieval with project-scope filtering.

use crate::error::MnemoError;
use crate::store::{MemoryStore, SimilarityCandidate, PROJECT_TAG_PREFIX};

/// When a project filter will discard an unknown share of neighbors,
/// over-fetch by this factor. A heuristic, not a guarantee — if the
/// over-fetched set still under-fills, the result is short; there is no
/// second round-trip.
const PROJECT_OVERFETCH: usize = 3;

/// Nearest memories to `query`, optionally restricted to one project.
/// Candidates come back in the index's native descending-similarity
/// order; filtering never re-sorts.
pub fn similar(
    store: &MemoryStore,
    query: &[f32],
    limit: usize,
    project: Option<&str>,
) -> Result<Vec<SimilarityCandidate>, MnemoError> {
    if store.vector_count() == 0 {
        return Err(MnemoError::NotIndexed("no embeddings indexed".into()));
    }

    let fetch_n = match project {
        Some(_) => limit * PROJECT_OVERFETCH,
        None => limit,
    };
    let mut candidates = store.vector_knn(query, fetch_n)?;

    if let Some(p) = project {
        let tag = format!("{PROJECT_TAG_PREFIX}{p}");
        candidates.retain(|c| c.memory.tags.iter().any(|t| t == &tag));
    }
    candidates.truncate(limit);
    Ok(candidates)
}

/// Memories similar to an existing one, by its stored vector. Queries
/// `limit + 1` neighbors to tolerate the memory matching itself, then
/// drops it from the results.
pub fn related(
    store: &MemoryStore,
    id: &str,
    limit: usize,
) -> Result<Vec<SimilarityCandidate>, MnemoError> {
    let vector = store
        .vector_get(id)
        .ok_or_else(|| MnemoError::NotIndexed(format!("memory {id} has no embedding")))?;

    let mut results = similar(store, &vector, limit + 1, None)?;
    results.retain(|c| c.memory.id != id);
    results.truncate(limit);
    Ok(results)
}
