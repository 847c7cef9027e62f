use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use coderisk_ir::{Edge, EdgeKind, Node};

use crate::domain::{Direction, GraphStore};
use crate::error::Result;

/// SQLite-backed adjacency store: nodes and edges are rows with a JSON
/// attribute bag, upserted by natural key. This is one conforming
/// implementation of `GraphStore`; it needs no external service, which
/// matters for a tool that runs inside a commit hook.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(SqliteGraphStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(SqliteGraphStore {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS nodes (
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                span_start INTEGER,
                span_end INTEGER,
                attrs TEXT NOT NULL,
                PRIMARY KEY (kind, id)
             );
             CREATE TABLE IF NOT EXISTS edges (
                kind TEXT NOT NULL,
                from_id TEXT NOT NULL,
                to_id TEXT NOT NULL,
                attrs TEXT NOT NULL,
                PRIMARY KEY (kind, from_id, to_id)
             );
             CREATE INDEX IF NOT EXISTS edges_from_idx ON edges (from_id, kind);
             CREATE INDEX IF NOT EXISTS edges_to_idx ON edges (to_id, kind);",
        )?;
        Ok(())
    }
}

fn edge_kind_str(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Contains => "contains",
        EdgeKind::Imports => "imports",
        EdgeKind::Calls => "calls",
        EdgeKind::Tests => "tests",
        EdgeKind::Authored => "authored",
        EdgeKind::Modifies => "modifies",
        EdgeKind::CoChanged => "co_changed",
        EdgeKind::Affects => "affects",
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn upsert_nodes(&self, nodes: &[Node]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for node in nodes {
            let attrs = serde_json::to_string(&node.attrs)?;
            let (start, end) = node
                .span
                .map(|s| (Some(s.start_line as i64), Some(s.end_line as i64)))
                .unwrap_or((None, None));
            tx.execute(
                "INSERT INTO nodes (kind, id, span_start, span_end, attrs)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(kind, id) DO UPDATE SET
                    span_start = excluded.span_start,
                    span_end = excluded.span_end,
                    attrs = excluded.attrs",
                params![format!("{:?}", node.kind), node.id, start, end, attrs],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn upsert_edges(&self, edges: &[Edge]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for edge in edges {
            let attrs = serde_json::to_string(&edge.attrs)?;
            tx.execute(
                "INSERT INTO edges (kind, from_id, to_id, attrs)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(kind, from_id, to_id) DO UPDATE SET attrs = excluded.attrs",
                params![edge_kind_str(edge.kind), edge.from, edge.to, attrs],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn neighbors(&self, node_id: &str, kind: EdgeKind, dir: Direction) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let sql = match dir {
            Direction::Outgoing => "SELECT to_id FROM edges WHERE kind = ?1 AND from_id = ?2",
            Direction::Incoming => "SELECT from_id FROM edges WHERE kind = ?1 AND to_id = ?2",
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![edge_kind_str(kind), node_id], |row| row.get(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    async fn weighted_neighbors(
        &self,
        node_id: &str,
        kind: EdgeKind,
        dir: Direction,
    ) -> Result<Vec<(String, f64)>> {
        let conn = self.conn.lock().unwrap();
        let sql = match dir {
            Direction::Outgoing => "SELECT to_id, attrs FROM edges WHERE kind = ?1 AND from_id = ?2",
            Direction::Incoming => "SELECT from_id, attrs FROM edges WHERE kind = ?1 AND to_id = ?2",
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![edge_kind_str(kind), node_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for r in rows {
            let (id, attrs) = r?;
            let frequency = serde_json::from_str::<serde_json::Value>(&attrs)
                .ok()
                .and_then(|v| v.get("frequency").and_then(|f| f.as_f64()))
                .unwrap_or(1.0);
            out.push((id, frequency));
        }
        Ok(out)
    }

    async fn content_hash(&self) -> Result<String> {
        let conn = self.conn.lock().unwrap();
        let mut hasher = Sha256::new();
        let mut stmt = conn.prepare("SELECT kind, id, attrs FROM nodes ORDER BY kind, id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for r in rows {
            let (kind, id, attrs) = r?;
            hasher.update(kind.as_bytes());
            hasher.update(id.as_bytes());
            hasher.update(attrs.as_bytes());
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    async fn node_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}


