//! Lifecycle workflows: remember, update, merge, prune, reindex.
//!
//! These compose the store, the embedding gateway, and the dedup engine
//! into multi-step operations. Failure handling is deliberately uneven:
//! validation and missing ids abort, while embedding trouble on a write
//! degrades to a warning and per-item failures in bulk steps never stop
//! the rest.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::dedup::{self, DedupReport};
use crate::embed::Embedder;
use crate::error::MnemoError;
use crate::store::{Memory, MemoryStore, SimilarityCandidate};
use crate::util;
use crate::SharedStore;

#[derive(Debug, Clone)]
pub struct RememberInput {
    pub kind: String,
    pub content: String,
    pub tags: Vec<String>,
    pub project: String,
    /// Skip the dedup check entirely.
    pub force: bool,
}

#[derive(Debug)]
pub enum RememberOutcome {
    /// Stored. Soft-band neighbors ride along so the caller can surface
    /// them.
    Created {
        memory: Memory,
        similar: Vec<SimilarityCandidate>,
    },
    /// A duplicate blocked the write; nothing was persisted.
    Blocked(DedupReport),
}

/// Store a new memory, unless dedup blocks it.
///
/// The embedding is written before this returns: two rapid consecutive
/// remembers would otherwise both pass the duplicate check because
/// neither is indexed yet. Synchronous embedding narrows that window; it
/// does not close it, and no lock is taken.
pub async fn remember<E: Embedder>(
    store: &MemoryStore,
    embedder: &E,
    input: RememberInput,
) -> Result<RememberOutcome, MnemoError> {
    if input.content.trim().is_empty() {
        return Err(MnemoError::EmptyContent);
    }

    let mut embedding = None;
    let mut similar = Vec::new();
    if !input.force {
        let report = dedup::check(store, embedder, &input.tags, &input.content).await;
        if report.blocked() {
            return Ok(RememberOutcome::Blocked(report));
        }
        similar = report.similar;
        embedding = report.embedding;
    }

    let memory = store.create(&input.kind, &input.content, &input.tags, &input.project)?;

    let vector = match embedding {
        Some(v) => Some(v),
        None => {
            let text = dedup::embed_input(&input.tags, &input.content);
            match embedder.embed_document(&text).await {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(
                        id = %memory.id, error = %e,
                        "memory stored without embedding; next reindex picks it up"
                    );
                    None
                }
            }
        }
    };
    if let Some(v) = vector {
        if let Err(e) = store.vector_upsert(&memory.id, &v) {
            tracing::warn!(id = %memory.id, error = %e, "vector upsert failed");
        }
    }

    Ok(RememberOutcome::Created { memory, similar })
}

/// Replace a memory's content. Re-embedding happens on a detached task —
/// nothing after the content write depends on it, and its failure (or
/// non-completion at process exit) is swallowed; the embedding stays
/// stale until the task lands or the next reindex.
pub fn update<E>(
    store: &SharedStore,
    embedder: &E,
    id: &str,
    content: &str,
) -> Result<(), MnemoError>
where
    E: Embedder + Clone + 'static,
{
    if content.trim().is_empty() {
        return Err(MnemoError::EmptyContent);
    }
    store.update_content(id, content)?;

    let store = Arc::clone(store);
    let embedder = embedder.clone();
    let id = id.to_string();
    let content = content.to_string();
    tokio::spawn(async move {
        match embedder.embed_document(&content).await {
            Ok(vector) => {
                if let Err(e) = store.vector_upsert(&id, &vector) {
                    tracing::debug!(id = %id, error = %e, "background re-embed upsert failed");
                }
            }
            Err(e) => tracing::debug!(id = %id, error = %e, "background re-embed failed"),
        }
    });

    Ok(())
}

/// Fold `id2` into `id1`: combined (or overridden) content, unioned tags,
/// `id2` deleted, `id1` re-embedded. Each step after the fetches is
/// best-effort — a failed tag add or re-embed does not unwind what
/// already happened.
pub async fn merge<E: Embedder>(
    store: &MemoryStore,
    embedder: &E,
    id1: &str,
    id2: &str,
    override_content: Option<String>,
) -> Result<Memory, MnemoError> {
    let m1 = store.fetch(id1)?;
    let m2 = store.fetch(id2)?;

    let merged = override_content
        .unwrap_or_else(|| format!("{} | {}", m1.content, m2.content));
    store.update_content(id1, &merged)?;

    for tag in &m2.tags {
        if m1.tags.iter().any(|t| t == tag) {
            continue;
        }
        if let Err(e) = store.add_tag(id1, tag) {
            tracing::warn!(id = id1, tag = %tag, error = %e, "tag carry-over failed");
        }
    }

    if let Err(e) = store.delete(id2) {
        tracing::warn!(id = id2, error = %e, "delete of merged-away memory failed");
    }

    match embedder.embed_document(&merged).await {
        Ok(vector) => {
            if let Err(e) = store.vector_upsert(id1, &vector) {
                tracing::warn!(id = id1, error = %e, "re-embed upsert failed");
            }
        }
        Err(e) => tracing::warn!(id = id1, error = %e, "re-embed failed; run reindex"),
    }

    store.fetch_raw(id1)
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub candidates: Vec<Memory>,
    /// How many were actually removed (zero on a dry run).
    pub deleted: usize,
}

/// Find (and with `delete`, remove) stale memories: never accessed and
/// older than `days`. Dry run is the default. Unparseable created
/// timestamps exclude a memory from candidacy rather than aborting.
pub fn prune(store: &MemoryStore, days: i64, delete: bool) -> Result<PruneReport, MnemoError> {
    let ids = store.all_ids()?;
    let cutoff = Utc::now() - Duration::days(days);

    let mut report = PruneReport::default();
    for id in ids {
        let mem = match store.fetch_raw(&id) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "skipping unreadable memory");
                continue;
            }
        };
        if mem.access_count > 0 {
            continue;
        }
        let Ok(created) = util::parse_ts(&mem.created) else { continue };
        if created < cutoff {
            report.candidates.push(mem);
        }
    }

    if delete {
        for mem in &report.candidates {
            match store.delete(&mem.id) {
                Ok(()) => report.deleted += 1,
                Err(e) => tracing::warn!(id = %mem.id, error = %e, "prune delete failed"),
            }
        }
    }
    Ok(report)
}

/// Drop the vector index and rebuild it from every stored memory.
/// Per-memory embedding failures are logged and skipped; only a failed
/// enumeration aborts. Returns how many memories were embedded.
pub async fn reindex<E: Embedder>(
    store: &MemoryStore,
    embedder: &E,
) -> Result<usize, MnemoError> {
    store.vector_drop_all()?;
    let ids = store.all_ids()?;

    let mut count = 0;
    for id in ids {
        let mem = match store.fetch_raw(&id) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "skipping unreadable memory");
                continue;
            }
        };
        let text = dedup::embed_input(&mem.tags, &mem.content);
        match embedder.embed_document(&text).await {
            Ok(vector) => match store.vector_upsert(&id, &vector) {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!(id = %id, error = %e, "vector upsert failed"),
            },
            Err(e) => tracing::warn!(id = %id, error = %e, "embedding failed, skipping"),
        }
    }
    Ok(count)
}
