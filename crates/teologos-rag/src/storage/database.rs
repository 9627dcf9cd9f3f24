//! SQLite implementation of the corpus store

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use async_trait::async_trait;

use super::CorpusStore;
use crate::error::{Error, Result};
use crate::types::{Agent, Document, NewDocument, Passage};

/// Agents present in every fresh database
const SEED_AGENTS: &[(&str, &str, &str)] = &[
    ("agostinho", "Santo Agostinho", "Patrística"),
    ("aquinas", "Tomás de Aquino", "Escolástica"),
    ("calvino", "João Calvino", "Reforma"),
];

/// SQLite-based corpus store
pub struct SqliteCorpusStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCorpusStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("Failed to open database: {}", e)))?;

        // journal_mode answers with a row, so it cannot go through pragma_update
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
            .map_err(|e| Error::storage(format!("Failed to enable WAL: {}", e)))?;

        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run database migrations and seed agents
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.pragma_update(None, "foreign_keys", true)
            .map_err(|e| Error::storage(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                slug TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                tradition TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                agent_slug TEXT NOT NULL REFERENCES agents(slug) ON DELETE CASCADE,
                title TEXT NOT NULL,
                source_url TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_agent ON documents(agent_slug, created_at);

            CREATE TABLE IF NOT EXISTS passages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                agent_slug TEXT NOT NULL,
                ord INTEGER NOT NULL,
                section TEXT,
                page TEXT,
                text_hash TEXT NOT NULL,
                UNIQUE(document_id, ord)
            );

            CREATE INDEX IF NOT EXISTS idx_passages_document ON passages(document_id);
        "#,
        )
        .map_err(|e| Error::storage(format!("Failed to run migrations: {}", e)))?;

        for (slug, name, tradition) in SEED_AGENTS {
            conn.execute(
                "INSERT OR IGNORE INTO agents (slug, name, tradition) VALUES (?1, ?2, ?3)",
                params![slug, name, tradition],
            )
            .map_err(|e| Error::storage(format!("Failed to seed agents: {}", e)))?;
        }

        tracing::info!("Database migrations complete");
        Ok(())
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::internal(format!("Database task failed: {}", e)))?
    }
}

fn row_to_agent(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        slug: row.get(0)?,
        name: row.get(1)?,
        tradition: row.get(2)?,
    })
}

/// Columns: id, agent_slug, title, source_url, created_at, passages_count
fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: DateTime<Utc> = row.get(4)?;
    let passages_count: i64 = row.get(5)?;

    Ok(Document {
        id,
        agent_slug: row.get(1)?,
        title: row.get(2)?,
        source_url: row.get(3)?,
        created_at,
        passages_count: passages_count.max(0) as usize,
    })
}

const DOCUMENT_SELECT: &str = r#"
    SELECT d.id, d.agent_slug, d.title, d.source_url, d.created_at, COUNT(p.id)
    FROM documents d
    LEFT JOIN passages p ON p.document_id = d.id
"#;

#[async_trait]
impl CorpusStore for SqliteCorpusStore {
    async fn find_agent(&self, slug: &str) -> Result<Option<Agent>> {
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT slug, name, tradition FROM agents WHERE slug = ?1",
                params![slug],
                row_to_agent,
            )
            .optional()
            .map_err(|e| Error::storage(format!("Failed to load agent: {}", e)))
        })
        .await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT slug, name, tradition FROM agents ORDER BY slug")
                .map_err(|e| Error::storage(format!("Failed to list agents: {}", e)))?;
            let agents = stmt
                .query_map([], row_to_agent)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| Error::storage(format!("Failed to list agents: {}", e)))?;
            Ok(agents)
        })
        .await
    }

    async fn create_document(&self, document: NewDocument) -> Result<Document> {
        self.with_conn(move |conn| {
            let created = Document {
                id: Uuid::new_v4(),
                agent_slug: document.agent_slug,
                title: document.title,
                source_url: document.source_url,
                created_at: Utc::now(),
                passages_count: 0,
            };
            conn.execute(
                "INSERT INTO documents (id, agent_slug, title, source_url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    created.id.to_string(),
                    created.agent_slug,
                    created.title,
                    created.source_url,
                    created.created_at,
                ],
            )
            .map_err(|e| Error::storage(format!("Failed to create document: {}", e)))?;
            Ok(created)
        })
        .await
    }

    async fn insert_passages(&self, passages: Vec<Passage>) -> Result<usize> {
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| Error::storage(format!("Failed to begin transaction: {}", e)))?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO passages (document_id, agent_slug, ord, section, page, text_hash) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )
                    .map_err(|e| Error::storage(format!("Failed to prepare insert: {}", e)))?;
                for passage in &passages {
                    stmt.execute(params![
                        passage.document_id.to_string(),
                        passage.agent_slug,
                        passage.ord,
                        passage.section,
                        passage.page,
                        passage.text_hash,
                    ])
                    .map_err(|e| Error::storage(format!("Failed to insert passage: {}", e)))?;
                }
            }
            tx.commit()
                .map_err(|e| Error::storage(format!("Failed to commit passages: {}", e)))?;
            Ok(passages.len())
        })
        .await
    }

    async fn delete_passages(&self, document_id: Uuid) -> Result<usize> {
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM passages WHERE document_id = ?1",
                params![document_id.to_string()],
            )
            .map_err(|e| Error::storage(format!("Failed to delete passages: {}", e)))
        })
        .await
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<bool> {
        self.with_conn(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM documents WHERE id = ?1",
                    params![document_id.to_string()],
                )
                .map_err(|e| Error::storage(format!("Failed to delete document: {}", e)))?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn get_document(&self, document_id: Uuid) -> Result<Option<Document>> {
        self.with_conn(move |conn| {
            let sql = format!("{} WHERE d.id = ?1 GROUP BY d.id", DOCUMENT_SELECT);
            conn.query_row(&sql, params![document_id.to_string()], row_to_document)
                .optional()
                .map_err(|e| Error::storage(format!("Failed to load document: {}", e)))
        })
        .await
    }

    async fn list_documents(&self, agent_slug: &str) -> Result<Vec<Document>> {
        let agent_slug = agent_slug.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "{} WHERE d.agent_slug = ?1 GROUP BY d.id ORDER BY d.created_at DESC, d.rowid DESC",
                DOCUMENT_SELECT
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| Error::storage(format!("Failed to list documents: {}", e)))?;
            let documents = stmt
                .query_map(params![agent_slug], row_to_document)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| Error::storage(format!("Failed to list documents: {}", e)))?;
            Ok(documents)
        })
        .await
    }
}
