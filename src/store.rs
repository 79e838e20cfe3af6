//! Persisted vector index.
//!
//! An index is a directory (`persist_path`) holding a single SQLite file.
//! Chunk rows carry their embedding as a little-endian f32 BLOB;
//! similarity search is brute-force cosine over all rows, computed in
//! Rust. The store is single-writer: [`IndexWriter::write`] replaces the
//! whole index in one transaction, so readers only ever observe a fully
//! absent or fully valid index — never a partial one.
//!
//! The schema version lives in `PRAGMA user_version`. A file whose
//! version does not match [`SCHEMA_VERSION`] is reported as
//! [`StoreError::Incompatible`], the typed corruption signal the index
//! builder keys its delete-and-rebuild recovery on.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, ScoredChunk};

/// On-disk schema version. Bump on any incompatible layout change; old
/// files are then purged and rebuilt rather than migrated — the index is
/// a cache derived from the source document, so nothing is lost.
pub const SCHEMA_VERSION: i32 = 2;

/// SQLite file name inside `persist_path`.
pub const INDEX_FILE: &str = "index.sqlite";

/// Typed store failure, distinguishable from plain I/O errors.
#[derive(Debug)]
pub enum StoreError {
    /// The on-disk file carries a different schema version than this
    /// build understands. Recoverable by deleting and rebuilding.
    Incompatible { found: i32 },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Incompatible { found } => write!(
                f,
                "index schema version {} does not match expected version {}",
                found, SCHEMA_VERSION
            ),
        }
    }
}

impl std::error::Error for StoreError {}

/// Descriptive metadata stored alongside the chunk rows.
#[derive(Debug, Clone)]
pub struct IndexMeta {
    /// Source document path, as given to the builder.
    pub document: String,
    /// Embedding model the vectors were produced with.
    pub model: String,
    pub dims: usize,
}

async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

async fn read_schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: i32 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// The store-write primitive: persists (chunk, embedding) pairs at a
/// directory path. A trait so the builder's recovery protocol can be
/// exercised against failure-injecting implementations.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    async fn write(
        &self,
        persist_path: &Path,
        meta: &IndexMeta,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()>;
}

/// Production writer targeting the SQLite layout described above.
pub struct SqliteIndexWriter;

#[async_trait]
impl IndexWriter for SqliteIndexWriter {
    async fn write(
        &self,
        persist_path: &Path,
        meta: &IndexMeta,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        std::fs::create_dir_all(persist_path)
            .with_context(|| format!("failed to create {}", persist_path.display()))?;
        let db_path = persist_path.join(INDEX_FILE);
        let existed = db_path.exists();
        let pool = connect(&db_path, true).await?;

        // Refuse to write into a file from a different schema era; the
        // builder reacts by purging the directory and retrying once.
        if existed {
            let version = read_schema_version(&pool).await?;
            if version != 0 && version != SCHEMA_VERSION {
                pool.close().await;
                return Err(StoreError::Incompatible { found: version }.into());
            }
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                chunk_index INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                hash TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                document TEXT NOT NULL,
                model TEXT NOT NULL,
                dims INTEGER NOT NULL,
                built_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (chunk_index, text, hash, embedding) VALUES (?, ?, ?, ?)",
            )
            .bind(chunk.index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO index_meta (id, document, model, dims, built_at) VALUES (0, ?, ?, ?, ?)",
        )
        .bind(&meta.document)
        .bind(&meta.model)
        .bind(meta.dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
            .execute(&pool)
            .await?;

        pool.close().await;
        Ok(())
    }
}

/// Read handle over a built index. Never mutates the store.
#[derive(Debug)]
pub struct VectorIndex {
    pool: SqlitePool,
}

impl VectorIndex {
    /// Open an existing index for reading, validating the schema version.
    pub async fn open(persist_path: &Path) -> Result<Self> {
        let db_path = persist_path.join(INDEX_FILE);
        if !db_path.exists() {
            anyhow::bail!("no vector index at {}", persist_path.display());
        }
        let pool = connect(&db_path, false).await?;
        let version = read_schema_version(&pool).await?;
        if version != SCHEMA_VERSION {
            pool.close().await;
            return Err(StoreError::Incompatible { found: version }.into());
        }
        Ok(Self { pool })
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Top-`k` chunks by cosine similarity to `query_vec`, best first.
    pub async fn similarity_search(
        &self,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query("SELECT chunk_index, text, hash, embedding FROM chunks")
            .fetch_all(&self.pool)
            .await?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                ScoredChunk {
                    chunk: Chunk {
                        index: row.get("chunk_index"),
                        text: row.get("text"),
                        hash: row.get("hash"),
                    },
                    score: cosine_similarity(query_vec, &vector),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split_text;

    fn meta() -> IndexMeta {
        IndexMeta {
            document: "notes.txt".to_string(),
            model: "test-model".to_string(),
            dims: 3,
        }
    }

    fn axis_vectors(n: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| {
                let mut v = vec![0.0f32; 3];
                v[i % 3] = 1.0;
                v
            })
            .collect()
    }

    #[tokio::test]
    async fn write_then_search_returns_most_similar() {
        let tmp = tempfile::TempDir::new().unwrap();
        let chunks = split_text("alpha beta gamma", 6, 0);
        assert_eq!(chunks.len(), 3);
        let vectors = axis_vectors(chunks.len());

        SqliteIndexWriter
            .write(tmp.path(), &meta(), &chunks, &vectors)
            .await
            .unwrap();

        let index = VectorIndex::open(tmp.path()).await.unwrap();
        assert_eq!(index.chunk_count().await.unwrap(), 3);

        let results = index.similarity_search(&[0.0, 1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "beta");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn rewrite_replaces_all_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let first = split_text("one two three four", 5, 0);
        SqliteIndexWriter
            .write(tmp.path(), &meta(), &first, &axis_vectors(first.len()))
            .await
            .unwrap();

        let second = split_text("five six", 5, 0);
        SqliteIndexWriter
            .write(tmp.path(), &meta(), &second, &axis_vectors(second.len()))
            .await
            .unwrap();

        let index = VectorIndex::open(tmp.path()).await.unwrap();
        assert_eq!(index.chunk_count().await.unwrap(), second.len() as i64);
    }

    #[tokio::test]
    async fn foreign_schema_version_is_reported_as_incompatible() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join(INDEX_FILE);
        let pool = connect(&db_path, true).await.unwrap();
        sqlx::query("PRAGMA user_version = 9")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let err = SqliteIndexWriter
            .write(tmp.path(), &meta(), &[], &[])
            .await
            .unwrap_err();
        let store_err = err.downcast_ref::<StoreError>().expect("typed store error");
        assert!(matches!(store_err, StoreError::Incompatible { found: 9 }));
    }

    #[tokio::test]
    async fn open_rejects_mismatched_version() {
        let tmp = tempfile::TempDir::new().unwrap();
        let chunks = split_text("alpha", 10, 0);
        SqliteIndexWriter
            .write(tmp.path(), &meta(), &chunks, &axis_vectors(1))
            .await
            .unwrap();

        let db_path = tmp.path().join(INDEX_FILE);
        let pool = connect(&db_path, false).await.unwrap();
        sqlx::query("PRAGMA user_version = 1")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let err = VectorIndex::open(tmp.path()).await.unwrap_err();
        assert!(err.downcast_ref::<StoreError>().is_some());
    }
}
