use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Schema, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy};

use crate::domain::{Incident, IncidentHit, IncidentStore};
use crate::error::{Result, StorageError};

/// Incident relational store. Structured columns live in SQLite; title and
/// body are additionally indexed in `tantivy`, which supplies the stemmed,
/// ranked full-text search a PostgreSQL GIN index gives in production.
pub struct SqliteIncidentStore {
    conn: Mutex<Connection>,
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    field_id: tantivy::schema::Field,
    field_title: tantivy::schema::Field,
    field_body: tantivy::schema::Field,
}

impl SqliteIncidentStore {
    pub fn open(sqlite_path: &Path) -> Result<Self> {
        let conn = Connection::open(sqlite_path)?;
        Self::init_schema(&conn)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Self::with_connection(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS incidents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                labels TEXT NOT NULL,
                created_ts INTEGER NOT NULL,
                closed_ts INTEGER
             )",
        )?;
        Ok(())
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let mut schema_builder = Schema::builder();
        let field_id = schema_builder.add_text_field("id", STRING | STORED);
        let field_title = schema_builder.add_text_field("title", TEXT | STORED);
        let field_body = schema_builder.add_text_field("body", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);
        let writer = index
            .writer(15_000_000)
            .map_err(|e| StorageError::Index(e.to_string()))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| StorageError::Index(e.to_string()))?;

        // Seed the in-memory index from whatever rows already exist on disk,
        // so the full-text index survives a process restart.
        let store = SqliteIncidentStore {
            conn: Mutex::new(conn),
            index,
            reader,
            writer: Mutex::new(writer),
            field_id,
            field_title,
            field_body,
        };
        store.reindex_all()?;
        Ok(store)
    }

    fn reindex_all(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, title, body FROM incidents")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut writer = self.writer.lock().unwrap();
        for r in rows {
            let (id, title, body) = r?;
            writer.add_document(doc!(
                self.field_id => id,
                self.field_title => title,
                self.field_body => body,
            ));
        }
        writer
            .commit()
            .map_err(|e| StorageError::Index(e.to_string()))?;
        drop(writer);
        self.reader
            .reload()
            .map_err(|e| StorageError::Index(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for SqliteIncidentStore {
    async fn upsert(&self, incident: &Incident) -> Result<()> {
        {
            let conn = self.conn.lock().unwrap();
            let labels = serde_json::to_string(&incident.labels)?;
            conn.execute(
                "INSERT INTO incidents (id, title, body, labels, created_ts, closed_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title, body = excluded.body,
                    labels = excluded.labels, created_ts = excluded.created_ts,
                    closed_ts = excluded.closed_ts",
                params![
                    incident.id,
                    incident.title,
                    incident.body,
                    labels,
                    incident.created_ts,
                    incident.closed_ts,
                ],
            )?;
        }

        let mut writer = self.writer.lock().unwrap();
        writer.delete_term(tantivy::Term::from_field_text(self.field_id, &incident.id));
        writer.add_document(doc!(
            self.field_id => incident.id.clone(),
            self.field_title => incident.title.clone(),
            self.field_body => incident.body.clone(),
        ));
        writer
            .commit()
            .map_err(|e| StorageError::Index(e.to_string()))?;
        drop(writer);
        self.reader
            .reload()
            .map_err(|e| StorageError::Index(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Incident>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, body, labels, created_ts, closed_ts FROM incidents WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            let labels: String = row.get(3)?;
            Ok(Some(Incident {
                id: row.get(0)?,
                title: row.get(1)?,
                body: row.get(2)?,
                labels: serde_json::from_str(&labels)?,
                created_ts: row.get(4)?,
                closed_ts: row.get(5)?,
            }))
        } else {
            Ok(None)
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<IncidentHit>> {
        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.field_title, self.field_body]);
        let parsed = parser
            .parse_query(query)
            .map_err(|e| StorageError::Index(e.to_string()))?;
        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(limit))
            .map_err(|e| StorageError::Index(e.to_string()))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved = searcher
                .doc(doc_address)
                .map_err(|e| StorageError::Index(e.to_string()))?;
            let id = retrieved
                .get_first(self.field_id)
                .and_then(|v| v.as_text())
                .unwrap_or_default()
                .to_string();
            if let Some(incident) = self.get(&id).await? {
                hits.push(IncidentHit { incident, score });
            }
        }
        Ok(hits)
    }
}
