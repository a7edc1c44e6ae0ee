//! Document CRUD, list filters, and full-text search.

use rusqlite::params;

use crate::util;

use super::*;

impl MemoryStore {
    /// Store a new memory. Assigns id and timestamps here; the project tag
    /// (if any) always sits first in the tag list.
    pub fn create(
        &self,
        kind: &str,
        content: &str,
        tags: &[String],
        project: &str,
    ) -> Result<Memory, MnemoError> {
        if content.trim().is_empty() {
            return Err(MnemoError::EmptyContent);
        }

        let id = util::new_id();
        let ts = util::now();
        let mut all_tags: Vec<String> = Vec::with_capacity(tags.len() + 1);
        if !project.is_empty() {
            all_tags.push(format!("{PROJECT_TAG_PREFIX}{project}"));
        }
        all_tags.extend(tags.iter().filter(|t| !t.trim().is_empty()).cloned());
        let tags_json = serde_json::to_string(&all_tags).unwrap_or_else(|_| "[]".into());

        self.conn()?.execute(
            "INSERT INTO memories (id, kind, content, tags, created, accessed, access_count) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![id, kind, content, tags_json, ts, ts],
        )?;
        self.fts_insert(&id, content, &tags_json)?;

        Ok(Memory {
            id,
            kind: kind.into(),
            content: content.into(),
            tags: all_tags,
            created: ts.clone(),
            accessed: ts,
            access_count: 0,
        })
    }

    /// Primary fetch path: reads the memory, then bumps its access count
    /// and accessed timestamp. The returned record carries the
    /// pre-increment count — what the caller sees matches the history
    /// they were reviewing when they asked.
    pub fn fetch(&self, id: &str) -> Result<Memory, MnemoError> {
        let mem = self.fetch_raw(id)?;
        self.conn()?.execute(
            "UPDATE memories SET access_count = access_count + 1, accessed = ?1 WHERE id = ?2",
            params![util::now(), id],
        )?;
        Ok(mem)
    }

    /// Read without touching access stats. Dedup, similarity, and other
    /// machine-facing paths go through here so they never inflate counts.
    pub fn fetch_raw(&self, id: &str) -> Result<Memory, MnemoError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {COLS} FROM memories WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(row_to_memory(row)?),
            None => Err(MnemoError::NotFound(id.into())),
        }
    }

    /// Replace a memory's content. Existence is checked through the
    /// primary fetch path — the access bump is observable behavior that
    /// keeps updated memories out of prune's candidate set.
    pub fn update_content(&self, id: &str, content: &str) -> Result<(), MnemoError> {
        let mem = self.fetch(id)?;
        self.conn()?.execute(
            "UPDATE memories SET content = ?1 WHERE id = ?2",
            params![content, id],
        )?;
        let tags_json = serde_json::to_string(&mem.tags).unwrap_or_else(|_| "[]".into());
        self.fts_replace(id, content, &tags_json)?;
        Ok(())
    }

    /// Append a tag. Membership is case-sensitive exact match; a second
    /// add of the same tag is a conflict, not a no-op.
    pub fn add_tag(&self, id: &str, tag: &str) -> Result<(), MnemoError> {
        let mem = self.fetch_raw(id)?;
        if mem.tags.iter().any(|t| t == tag) {
            return Err(MnemoError::TagExists(tag.into()));
        }
        let mut tags = mem.tags;
        tags.push(tag.into());
        let tags_json = serde_json::to_string(&tags).unwrap_or_else(|_| "[]".into());
        self.conn()?.execute(
            "UPDATE memories SET tags = ?1 WHERE id = ?2",
            params![tags_json, id],
        )?;
        self.fts_replace(id, &mem.content, &tags_json)?;
        Ok(())
    }

    /// Delete the document (authoritative) and its vector entry
    /// (best-effort — a vector left behind only costs a skipped orphan in
    /// the next k-NN pass and vanishes on reindex).
    pub fn delete(&self, id: &str) -> Result<(), MnemoError> {
        let n = self
            .conn()?
            .execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(MnemoError::NotFound(id.into()));
        }
        self.fts_delete(id)?;
        if let Err(e) = self.vector_delete(id) {
            tracing::warn!(id, error = %e, "vector entry removal failed");
        }
        Ok(())
    }

    /// List newest-first with optional kind/tag filters (ANDed when both
    /// are present). The single spot where `ListFilter` becomes SQL.
    pub fn list(&self, filter: &ListFilter, limit: usize) -> Result<Vec<Memory>, MnemoError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut bind: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref kind) = filter.kind {
            bind.push(Box::new(kind.clone()));
            clauses.push(format!("kind = ?{}", bind.len()));
        }
        if let Some(ref tag) = filter.tag {
            // Tags live in a JSON array column; a quoted LIKE pattern
            // matches one element. Prefix form leaves the closing quote off.
            let pattern = match tag {
                TagFilter::Exact(t) => format!("%\"{}\"%", t.replace('"', "")),
                TagFilter::Prefix(p) => format!("%\"{}%", p.replace('"', "")),
            };
            bind.push(Box::new(pattern));
            clauses.push(format!("tags LIKE ?{}", bind.len()));
        }

        bind.push(Box::new(limit as i64));
        let limit_idx = bind.len();

        let mut sql = format!("SELECT {COLS} FROM memories");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY created DESC LIMIT ?{limit_idx}"));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let bind_refs: Vec<&dyn rusqlite::types::ToSql> =
            bind.iter().map(|p| p.as_ref()).collect();
        let rows: Vec<Memory> = stmt
            .query_map(bind_refs.as_slice(), row_to_memory)?
            .filter_map(|r| r.map_err(|e| tracing::warn!("row parse: {e}")).ok())
            .collect();
        Ok(rows)
    }

    /// Memories of one project, newest first.
    pub fn context(&self, project: &str, limit: usize) -> Result<Vec<Memory>, MnemoError> {
        let filter = ListFilter {
            kind: None,
            tag: Some(TagFilter::Exact(format!("{PROJECT_TAG_PREFIX}{project}"))),
        };
        self.list(&filter, limit)
    }

    /// Full-text match against content. All query terms must match
    /// (implicit AND), ranked by bm25.
    pub fn text_search(&self, query: &str, limit: usize) -> Result<Vec<Memory>, MnemoError> {
        let Some(terms) = sanitize_fts_query(query) else {
            return Ok(vec![]);
        };
        // Column filter: match content only, never the tags column.
        let fts_query = format!("content : ({terms})");
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {cols} FROM memories_fts f \
             JOIN memories m ON m.id = f.id \
             WHERE f.memories_fts MATCH ?1 ORDER BY f.rank LIMIT ?2",
            cols = "m.id, m.kind, m.content, m.tags, m.created, m.accessed, m.access_count",
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<Memory> = stmt
            .query_map(params![fts_query, limit as i64], row_to_memory)?
            .filter_map(|r| r.map_err(|e| tracing::warn!("row parse: {e}")).ok())
            .collect();
        Ok(rows)
    }

    /// Every memory id. Bulk-scan paths only (prune, reindex).
    pub fn all_ids(&self) -> Result<Vec<String>, MnemoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM memories")?;
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }

    pub fn stats(&self) -> Result<Stats, MnemoError> {
        let conn = self.conn()?;
        let mut stats = Stats::default();
        let mut stmt = conn.prepare("SELECT kind, COUNT(*) FROM memories GROUP BY kind")?;
        let counts: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        for (kind, n) in counts {
            let n = n as usize;
            stats.total += n;
            match kind.as_str() {
                "fact" => stats.fact = n,
                "learned" => stats.learned = n,
                "preference" => stats.preference = n,
                "context" => stats.context = n,
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Histogram of project tags, sorted by project name.
    pub fn projects(&self) -> Result<Vec<(String, usize)>, MnemoError> {
        let conn = self.conn()?;
        let pattern = format!("%\"{PROJECT_TAG_PREFIX}%");
        let mut stmt = conn.prepare("SELECT tags FROM memories WHERE tags LIKE ?1")?;
        let rows: Vec<String> = stmt
            .query_map(params![pattern], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        let mut counts: std::collections::BTreeMap<String, usize> = Default::default();
        for tags_json in rows {
            let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
            if let Some(p) = tags.iter().find_map(|t| t.strip_prefix(PROJECT_TAG_PREFIX)) {
                *counts.entry(p.to_string()).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    /// Rebuild the full-text index from the document table. Idempotent;
    /// `mnemo init` and crash recovery both land here.
    pub fn rebuild_index(&self) -> Result<usize, MnemoError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM memories_fts", [])?;
        let mut stmt = conn.prepare("SELECT id, content, tags FROM memories")?;
        let rows: Vec<(String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .filter_map(|r| r.map_err(|e| tracing::warn!("row parse: {e}")).ok())
            .collect();
        drop(stmt);
        drop(conn);
        for (id, content, tags_json) in &rows {
            self.fts_insert(id, content, tags_json)?;
        }
        Ok(rows.len())
    }

    fn fts_insert(&self, id: &str, content: &str, tags_json: &str) -> Result<(), MnemoError> {
        self.conn()?.execute(
            "INSERT INTO memories_fts (id, content, tags) VALUES (?1, ?2, ?3)",
            params![id, content, tags_json],
        )?;
        Ok(())
    }

    fn fts_replace(&self, id: &str, content: &str, tags_json: &str) -> Result<(), MnemoError> {
        self.fts_delete(id)?;
        self.fts_insert(id, content, tags_json)
    }

    fn fts_delete(&self, id: &str) -> Result<(), MnemoError> {
        self.conn()?
            .execute("DELETE FROM memories_fts WHERE id = ?1", params![id])?;
        Ok(())
    }
}

/// Reduce arbitrary text to a safe FTS5 query: lowercased alphanumeric
/// terms, space-joined (implicit AND). Lowercasing keeps uppercase
/// operators (AND/OR/NOT) from leaking into query syntax. None when
/// nothing searchable remains.
fn sanitize_fts_query(query: &str) -> Option<String> {
    let mut sanitized = String::with_capacity(query.len());
    for c in query.chars() {
        if c.is_alphanumeric() {
            sanitized.push(c);
        } else {
            sanitized.push(' ');
        }
    }
    let terms: Vec<String> = sanitized
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
