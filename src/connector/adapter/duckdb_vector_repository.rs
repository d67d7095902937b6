use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{ChunkWithEmbedding, VectorMatch, VectorStore};
use crate::domain::DomainError;

const VECTOR_DIMENSIONS: usize = 384;

/// DuckDB-backed vector store using the VSS extension for cosine search
/// over persisted chunk embeddings (C9, spec §4.9).
pub struct DuckdbVectorStore {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
}

impl DuckdbVectorStore {
    pub fn new(path: &Path) -> Result<Self, DomainError> {
        Self::new_with_namespace(path, "main")
    }

    pub fn new_with_namespace(path: &Path, namespace: &str) -> Result<Self, DomainError> {
        let conn = Connection::open(path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize(&conn, namespace)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace: namespace.to_string(),
        })
    }

    #[allow(dead_code)]
    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        let namespace = "main";
        Self::initialize(&conn, namespace)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace: namespace.to_string(),
        })
    }

    /// Returns a clone of the shared connection Arc, so a snapshot store
    /// backed by the same file can share the single writable handle.
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn initialize(conn: &Connection, schema: &str) -> Result<(), DomainError> {
        let schema = schema.trim();
        let schema_name = if schema.is_empty() { "main" } else { schema };
        debug!("Initializing DuckDB with schema: {}", schema_name);

        conn.execute_batch("INSTALL vss; LOAD vss; SET hnsw_enable_experimental_persistence = true;")
            .map_err(|e| DomainError::storage(format!("Failed to initialize VSS extension: {}", e)))?;

        let schema_sql = format!(
            r#"
            CREATE SCHEMA IF NOT EXISTS "{}";

            CREATE TABLE IF NOT EXISTS "{}".chunks (
                id TEXT PRIMARY KEY,
                file_path TEXT NOT NULL,
                language TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS "{}".embeddings (
                chunk_id TEXT PRIMARY KEY,
                vector FLOAT[384] NOT NULL,
                model TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS embedding_hnsw_idx ON "{}".embeddings USING HNSW (vector) WITH (metric = 'cosine');
            "#,
            schema_name, schema_name, schema_name, schema_name
        );

        conn.execute_batch(&schema_sql)
            .map_err(|e| DomainError::storage(format!("Failed to initialize DuckDB schema: {}", e)))?;

        debug!("DuckDB schema initialized successfully");
        Ok(())
    }

    fn vector_to_array_literal(vector: &[f32]) -> Result<String, DomainError> {
        if vector.len() != VECTOR_DIMENSIONS {
            return Err(DomainError::invalid_input(format!(
                "Expected embedding dimension {}, got {}",
                VECTOR_DIMENSIONS,
                vector.len()
            )));
        }
        let mut s = String::with_capacity(vector.len() * 8);
        s.push('[');
        for (i, v) in vector.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            s.push_str(&format!("{}", v));
        }
        s.push(']');
        s.push_str("::FLOAT[384]");
        Ok(s)
    }

    fn row_to_match(row: &Row, score: f32) -> Result<VectorMatch, duckdb::Error> {
        let id: String = row.get(0)?;
        let file_path: String = row.get(1)?;
        let language: String = row.get(2)?;
        let mut chunk_metadata = HashMap::new();
        chunk_metadata.insert("file".to_string(), file_path);
        chunk_metadata.insert("language".to_string(), language);
        Ok(VectorMatch {
            id,
            score,
            chunk_metadata,
        })
    }

    fn run_search(
        conn: &Connection,
        namespace: &str,
        array_lit: &str,
        file_filter: Option<&str>,
        k: usize,
    ) -> Result<Vec<VectorMatch>, DomainError> {
        let mut sql = format!(
            "SELECT \
                c.id, c.file_path, c.language, \
                1.0 - array_cosine_distance(e.vector, {array_lit}) AS score \
             FROM \"{schema}\".embeddings e \
             JOIN \"{schema}\".chunks c ON c.id = e.chunk_id",
            array_lit = array_lit,
            schema = namespace,
        );

        if let Some(file) = file_filter {
            sql.push_str(&format!(" WHERE c.file_path = '{}'", file.replace('\'', "''")));
        }
        sql.push_str(&format!(
            " ORDER BY array_cosine_distance(e.vector, {array_lit}) LIMIT ?",
            array_lit = array_lit
        ));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare vector search: {}", e)))?;
        let mut rows = stmt
            .query(params![k as i64])
            .map_err(|e| DomainError::storage(format!("Failed to run vector search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read vector search row: {}", e)))?
        {
            let score: f32 = row
                .get(3)
                .map_err(|e| DomainError::storage(format!("Failed to read score: {}", e)))?;
            let item = Self::row_to_match(row, score)
                .map_err(|e| DomainError::storage(format!("Failed to parse match row: {}", e)))?;
            results.push(item);
        }
        Ok(results)
    }
}

#[async_trait]
impl VectorStore for DuckdbVectorStore {
    async fn add(&self, chunks: &[ChunkWithEmbedding]) -> Result<(), DomainError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT OR REPLACE INTO \"{}\".chunks (id, file_path, language) VALUES (?, ?, ?)",
                    self.namespace
                ))
                .map_err(|e| DomainError::storage(format!("Failed to prepare chunk insert: {}", e)))?;

            for item in chunks {
                stmt.execute(params![
                    item.chunk.id(),
                    item.chunk.file(),
                    item.chunk.language_tag().as_str(),
                ])
                .map_err(|e| {
                    DomainError::storage(format!("Failed to insert chunk {}: {}", item.chunk.id(), e))
                })?;
            }
        }

        for item in chunks {
            let array_lit = Self::vector_to_array_literal(item.embedding.vector())?;
            // The array literal is not parameterized: DuckDB's FLOAT[384] type
            // doesn't support binding array params. Safe here since the
            // literal is built from our own embedding floats, not user input.
            let sql = format!(
                "INSERT OR REPLACE INTO \"{}\".embeddings (chunk_id, vector, model) VALUES (?, {}, ?)",
                self.namespace, array_lit
            );
            tx.execute(&sql, params![item.chunk.id(), item.embedding.model()])
                .map_err(|e| {
                    DomainError::storage(format!(
                        "Failed to insert embedding for chunk {}: {}",
                        item.chunk.id(),
                        e
                    ))
                })?;
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        debug!("Saved {} chunk embeddings to DuckDB", chunks.len());
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        file_filter: Option<&str>,
    ) -> Result<Vec<VectorMatch>, DomainError> {
        let array_lit = Self::vector_to_array_literal(query_embedding)?;
        let conn = self.conn.lock().await;
        Self::run_search(&conn, &self.namespace, &array_lit, file_filter, k)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), DomainError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        for id in ids {
            tx.execute(
                &format!("DELETE FROM \"{}\".embeddings WHERE chunk_id = ?", self.namespace),
                params![id],
            )
            .map_err(|e| DomainError::storage(format!("Failed to delete embedding: {}", e)))?;
            tx.execute(
                &format!("DELETE FROM \"{}\".chunks WHERE id = ?", self.namespace),
                params![id],
            )
            .map_err(|e| DomainError::storage(format!("Failed to delete chunk: {}", e)))?;
        }
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    async fn delete_by_file(&self, path: &str) -> Result<u64, DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            &format!(
                "DELETE FROM \"{0}\".embeddings WHERE chunk_id IN (SELECT id FROM \"{0}\".chunks WHERE file_path = ?)",
                self.namespace
            ),
            params![path],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete embeddings: {}", e)))?;

        let deleted_count = tx
            .execute(
                &format!("DELETE FROM \"{}\".chunks WHERE file_path = ?", self.namespace),
                params![path],
            )
            .map_err(|e| DomainError::storage(format!("Failed to delete chunks: {}", e)))?;

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        debug!("Deleted {} chunks for file {}", deleted_count, path);
        Ok(deleted_count as u64)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\".chunks", self.namespace), [], |row| {
                row.get(0)
            })
            .map_err(|e| DomainError::storage(format!("Failed to count chunks: {}", e)))?;
        Ok(count as u64)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        tx.execute(&format!("DELETE FROM \"{}\".embeddings", self.namespace), [])
            .map_err(|e| DomainError::storage(format!("Failed to clear embeddings: {}", e)))?;
        tx.execute(&format!("DELETE FROM \"{}\".chunks", self.namespace), [])
            .map_err(|e| DomainError::storage(format!("Failed to clear chunks: {}", e)))?;
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;
        Ok(())
    }
}
