//! SQLite-backed memory store: documents + FTS5 full-text index in one
//! half, embedding vectors in the other. Everything above this module
//! works with `Memory` values; SQL rows never escape it.

mod memory;
mod vec;

pub use vec::{bytes_to_embedding, embedding_to_bytes, similarity_score};

use std::collections::HashMap;
use std::sync::RwLock;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};

use crate::error::MnemoError;

pub const PROJECT_TAG_PREFIX: &str = "project:";

/// The four memory types statistics and filters recognize. Anything else
/// is stored verbatim but only counted in the total.
pub const KINDS: [&str; 4] = ["fact", "learned", "preference", "context"];

/// Set busy_timeout on every connection handed out by the pool.
#[derive(Debug)]
struct BusyTimeoutCustomizer;
impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error> for BusyTimeoutCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(())
    }
}

type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created: String,
    pub accessed: String,
    pub access_count: i64,
}

impl Memory {
    /// The project this memory is scoped to, if any. No project tag means
    /// the memory is global and visible from every project context.
    pub fn project(&self) -> Option<&str> {
        self.tags.iter().find_map(|t| t.strip_prefix(PROJECT_TAG_PREFIX))
    }
}

/// A memory paired with its similarity to some query vector. Transient —
/// scores are never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityCandidate {
    pub memory: Memory,
    /// Normalized to [0, 1]; 1.0 = identical.
    pub score: f64,
}

/// Structured list filter, translated to SQL in exactly one place
/// (`MemoryStore::list`). Both fields optional; together they AND.
#[derive(Debug, Default, Clone)]
pub struct ListFilter {
    pub kind: Option<String>,
    pub tag: Option<TagFilter>,
}

#[derive(Debug, Clone)]
pub enum TagFilter {
    Exact(String),
    /// Matches any tag sharing the prefix (the CLI's trailing-`*` form).
    Prefix(String),
}

impl TagFilter {
    /// `"editor*"` → prefix match, anything else → exact match.
    pub fn parse(raw: &str) -> TagFilter {
        match raw.strip_suffix('*') {
            Some(prefix) => TagFilter::Prefix(prefix.to_string()),
            None => TagFilter::Exact(raw.to_string()),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct Stats {
    pub fact: usize,
    pub learned: usize,
    pub preference: usize,
    pub context: usize,
    pub total: usize,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    created TEXT NOT NULL,
    accessed TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_memories_kind ON memories(kind);

CREATE TABLE IF NOT EXISTS vectors (
    id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL
);
"#;

// External-content FTS — rows are maintained manually on every document
// write so the indexed text always matches the stored document.
const FTS_SCHEMA: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(\
     id UNINDEXED, content, tags, tokenize='unicode61')";

pub struct MemoryStore {
    pool: Pool<SqliteConnectionManager>,
    /// In-memory mirror of the vectors table for brute-force cosine k-NN.
    vec_index: RwLock<HashMap<String, Vec<f32>>>,
}

impl MemoryStore {
    fn conn(&self) -> Result<PooledConn, MnemoError> {
        self.pool.get().map_err(|e| MnemoError::Internal(format!("pool: {e}")))
    }

    /// Open (or create) a store at the given path. `":memory:"` gets a
    /// uniquely named shared-cache database so all pool connections see
    /// the same data without bleeding across tests.
    pub fn open(path: &str) -> Result<Self, MnemoError> {
        let pool_size = if path == ":memory:" { 2 } else { 8 };
        let manager = if path == ":memory:" {
            let name = uuid::Uuid::new_v4().to_string();
            SqliteConnectionManager::file(format!("file:{name}?mode=memory&cache=shared"))
        } else {
            SqliteConnectionManager::file(path)
        };
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_customizer(Box::new(BusyTimeoutCustomizer))
            .build(manager)
            .map_err(|e| MnemoError::Internal(format!("pool: {e}")))?;

        let conn = pool.get().map_err(|e| MnemoError::Internal(e.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(FTS_SCHEMA, [])?;
        drop(conn);

        let store = Self { pool, vec_index: RwLock::new(HashMap::new()) };
        store.load_vec_index();
        Ok(store)
    }
}

/// The one place a SQL row becomes a `Memory`. Every SELECT uses `COLS`
/// so the column order below is the only shape to decode.
pub(crate) const COLS: &str = "id, kind, content, tags, created, accessed, access_count";

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    let tags_json: String = row.get("tags")?;
    Ok(Memory {
        id: row.get("id")?,
        kind: row.get("kind")?,
        content: row.get("content")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        created: row.get("created")?,
        accessed: row.get("accessed")?,
        access_count: row.get("access_count")?,
    })
}
