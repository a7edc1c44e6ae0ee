//! Vector half of the store: embedding persistence and cosine k-NN.
//!
//! Vectors live in their own table, keyed by memory id — the embedding is
//! never stored on the document. An in-memory mirror serves queries;
//! brute-force cosine is fine at personal-collection scale.

use rusqlite::params;

use super::*;

impl MemoryStore {
    /// Load all persisted vectors into the in-memory index. Failures are
    /// silent — a cold index just means k-NN sees fewer candidates until
    /// the next reindex.
    pub(super) fn load_vec_index(&self) {
        let Ok(conn) = self.conn() else { return };
        let Ok(mut stmt) = conn.prepare("SELECT id, embedding FROM vectors") else { return };

        let pairs: Vec<(String, Vec<f32>)> = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((id, bytes_to_embedding(&blob)))
            })
            .map(|iter| iter.filter_map(|r| r.ok()).collect())
            .unwrap_or_default();

        if let Ok(mut idx) = self.vec_index.write() {
            idx.clear();
            let count = pairs.len();
            for (id, emb) in pairs {
                idx.insert(id, emb);
            }
            tracing::debug!(count, "loaded vector index");
        }
    }

    /// Insert or replace the vector stored under `id`.
    pub fn vector_upsert(&self, id: &str, embedding: &[f32]) -> Result<(), MnemoError> {
        let bytes = embedding_to_bytes(embedding);
        self.conn()?.execute(
            "INSERT OR REPLACE INTO vectors (id, embedding) VALUES (?1, ?2)",
            params![id, bytes],
        )?;
        if let Ok(mut idx) = self.vec_index.write() {
            idx.insert(id.to_string(), embedding.to_vec());
        }
        Ok(())
    }

    /// K nearest neighbors by cosine, highest similarity first. Ids whose
    /// document has vanished are skipped — the index may briefly outlive
    /// a deleted memory.
    pub fn vector_knn(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SimilarityCandidate>, MnemoError> {
        let scored: Vec<(String, f64)> = {
            let idx = self
                .vec_index
                .read()
                .map_err(|_| MnemoError::Internal("vector index poisoned".into()))?;
            let mut scored: Vec<(String, f64)> = idx
                .iter()
                .map(|(id, emb)| (id.clone(), similarity_score(query, emb)))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(k);
            scored
        };

        let mut out = Vec::with_capacity(scored.len());
        for (id, score) in scored {
            match self.fetch_raw(&id) {
                Ok(memory) => out.push(SimilarityCandidate { memory, score }),
                Err(MnemoError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// The stored vector for a memory, if it has been embedded.
    pub fn vector_get(&self, id: &str) -> Option<Vec<f32>> {
        self.vec_index.read().ok()?.get(id).cloned()
    }

    pub fn vector_delete(&self, id: &str) -> Result<(), MnemoError> {
        self.conn()?
            .execute("DELETE FROM vectors WHERE id = ?1", params![id])?;
        if let Ok(mut idx) = self.vec_index.write() {
            idx.remove(id);
        }
        Ok(())
    }

    /// Drop every vector (reindex starts from here).
    pub fn vector_drop_all(&self) -> Result<(), MnemoError> {
        self.conn()?.execute("DELETE FROM vectors", [])?;
        if let Ok(mut idx) = self.vec_index.write() {
            idx.clear();
        }
        Ok(())
    }

    /// How many memories are embedded. Zero doubles as the
    /// "nothing indexed yet" probe.
    pub fn vector_count(&self) -> usize {
        self.vec_index.read().map(|idx| idx.len()).unwrap_or(0)
    }
}

/// Cosine similarity mapped from [-1, 1] onto [0, 1]; 1.0 = identical.
/// The dedup thresholds are calibrated against this normalized scale.
pub fn similarity_score(a: &[f32], b: &[f32]) -> f64 {
    (cosine_similarity(a, b) + 1.0) / 2.0
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for i in 0..a.len() {
        let (ai, bi) = (a[i] as f64, b[i] as f64);
        dot += ai * bi;
        na += ai * ai;
        nb += bi * bi;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Serialize an f32 vector to little-endian bytes for BLOB storage.
pub fn embedding_to_bytes(v: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(v.len() * 4);
    for &f in v {
        buf.extend_from_slice(&f.to_le_bytes());
    }
    buf
}

/// Deserialize BLOB bytes back to an f32 vector.
pub fn bytes_to_embedding(b: &[u8]) -> Vec<f32> {
    b.chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().expect("4 bytes");
            f32::from_le_bytes(arr)
        })
        .collect()
}
