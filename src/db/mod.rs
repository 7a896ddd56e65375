//! Local document store: résumés, cover letters and generation history.
//!
//! This module is split into submodules:
//! - `model`: records returned by the store.
//! - `repo`: SQL-only functions over a connection.
//! - `schema`: versioned, additive schema upgrades.
//!
//! Callers go through [`DocumentStore`], which owns the cached connection and
//! the content extractor used when adding documents.

pub mod model;
pub mod repo;
pub mod schema;

pub use model::{Document, HistoryEntry, NewHistoryEntry};

use crate::extract::{extract_text, Blob, ContentExtractor, ExtractionError};
use crate::model::DocumentKind;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

pub type Pool = SqlitePool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not extract text: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("no {kind} document with id {id}")]
    NotFound { kind: DocumentKind, id: i64 },
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("store is at schema version {stored}, cannot open at {requested}")]
    VersionConflict { stored: u32, requested: u32 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to the document store.
///
/// The connection is opened lazily on first use and reused until [`close`]
/// is called; the next operation after that reopens it.
///
/// [`close`]: DocumentStore::close
pub struct DocumentStore {
    url: String,
    version: u32,
    extractor: Arc<dyn ContentExtractor>,
    conn: Mutex<Option<Pool>>,
}

impl DocumentStore {
    pub fn new(database_url: &str, version: u32, extractor: Arc<dyn ContentExtractor>) -> Self {
        Self {
            url: prepare_sqlite_url(database_url),
            version,
            extractor,
            conn: Mutex::new(None),
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.version
    }

    /// Cached connection, opening (and upgrading) the database if needed.
    pub async fn pool(&self) -> Result<Pool, StoreError> {
        let mut guard = self.conn.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }
        let pool = open_pool(&self.url, self.version).await?;
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Drop the cached connection.
    pub async fn close(&self) {
        if let Some(pool) = self.conn.lock().await.take() {
            pool.close().await;
        }
    }

    /// Destructive recovery from a [`StoreError::VersionConflict`]: delete the
    /// whole database and recreate it at this handle's version.
    #[instrument(skip(self))]
    pub async fn delete_and_recreate(&self) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
        }
        if let Some(path) = sqlite_file_path(&self.url) {
            for suffix in ["", "-wal", "-shm"] {
                let mut p = path.clone().into_os_string();
                p.push(suffix);
                match tokio::fs::remove_file(&p).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        warn!(url = %self.url, "document store deleted");
        let pool = open_pool(&self.url, self.version).await?;
        *guard = Some(pool);
        Ok(())
    }

    /// Extract the blob's text and store it as a new document.
    #[instrument(skip(self, blob), fields(name = %blob.name))]
    pub async fn add(&self, kind: DocumentKind, blob: &Blob) -> Result<i64, StoreError> {
        let content = extract_text(self.extractor.as_ref(), blob).await?;
        let pool = self.pool().await?;
        let id = repo::insert_document(&pool, kind, &blob.name, &content).await?;
        info!(%kind, id, chars = content.len(), "document added");
        Ok(id)
    }

    /// All documents of one kind. Order is unspecified.
    pub async fn list(&self, kind: DocumentKind) -> Result<Vec<Document>, StoreError> {
        let pool = self.pool().await?;
        repo::list_documents(&pool, kind).await
    }

    pub async fn get_content(
        &self,
        kind: DocumentKind,
        id: i64,
    ) -> Result<Option<String>, StoreError> {
        let pool = self.pool().await?;
        repo::document_content(&pool, kind, id).await
    }

    /// Deleting a missing id is not an error.
    pub async fn delete(&self, kind: DocumentKind, id: i64) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        repo::delete_document(&pool, kind, id).await
    }

    pub async fn rename(
        &self,
        kind: DocumentKind,
        id: i64,
        new_name: &str,
    ) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        repo::rename_document(&pool, kind, id, new_name).await
    }

    /// Clear one named collection, or both document collections when `None`.
    /// History is never touched here.
    pub async fn clear(&self, collection: Option<&str>) -> Result<(), StoreError> {
        let kinds: Vec<DocumentKind> = match collection {
            None => DocumentKind::ALL.to_vec(),
            Some(name) => vec![DocumentKind::from_collection(name)
                .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))?],
        };
        let pool = self.pool().await?;
        repo::clear_documents(&pool, &kinds).await
    }

    pub async fn add_entry(&self, entry: &NewHistoryEntry) -> Result<i64, StoreError> {
        let pool = self.pool().await?;
        repo::insert_history(&pool, entry).await
    }

    /// Newest first.
    pub async fn list_entries(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let pool = self.pool().await?;
        repo::list_history(&pool).await
    }

    pub async fn delete_entry(&self, id: i64) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        repo::delete_history(&pool, id).await
    }

    pub async fn clear_history(&self) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        repo::clear_history(&pool).await
    }
}

async fn open_pool(url: &str, version: u32) -> Result<Pool, StoreError> {
    let in_memory = url.starts_with("sqlite::memory");
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    let pool = pool_options(in_memory).connect_with(options).await?;
    match schema::upgrade(&pool, version).await {
        Ok(_) => Ok(pool),
        Err(err) => {
            pool.close().await;
            Err(err)
        }
    }
}

/// A memory database lives exactly as long as its one connection, so that
/// connection is never reaped.
fn pool_options(in_memory: bool) -> SqlitePoolOptions {
    if in_memory {
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    }
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

/// Filesystem path behind a prepared `sqlite://` URL, if any.
fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    if url.starts_with("sqlite::memory") {
        return None;
    }
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    (!path.is_empty()).then(|| PathBuf::from(path))
}
