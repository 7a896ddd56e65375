//! SQL-only functions over a store connection.
use super::model::{Document, HistoryEntry, NewHistoryEntry};
use super::{Pool, StoreError};
use crate::model::{DocumentKind, Font};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{instrument, warn};

fn document_from_row(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        name: row.get("name"),
        content: row.get("content"),
    }
}

fn history_from_row(row: &SqliteRow) -> HistoryEntry {
    let font: String = row.get("font");
    let font = Font::parse(&font).unwrap_or_else(|| {
        warn!(font, "unknown font in history row; using default");
        Font::default()
    });
    HistoryEntry {
        id: row.get("id"),
        timestamp: row.get("timestamp"),
        content: row.get("content"),
        font,
        filename: row.get("filename"),
    }
}

#[instrument(skip(pool, content))]
pub async fn insert_document(
    pool: &Pool,
    kind: DocumentKind,
    name: &str,
    content: &str,
) -> Result<i64, StoreError> {
    let res = sqlx::query(&format!(
        "INSERT INTO {} (name, content) VALUES (?, ?)",
        kind.table()
    ))
    .bind(name)
    .bind(content)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn list_documents(pool: &Pool, kind: DocumentKind) -> Result<Vec<Document>, StoreError> {
    let rows = sqlx::query(&format!("SELECT id, name, content FROM {}", kind.table()))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(document_from_row).collect())
}

#[instrument(skip(pool))]
pub async fn document_content(
    pool: &Pool,
    kind: DocumentKind,
    id: i64,
) -> Result<Option<String>, StoreError> {
    let content = sqlx::query_scalar::<_, String>(&format!(
        "SELECT content FROM {} WHERE id = ?",
        kind.table()
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(content)
}

#[instrument(skip(pool))]
pub async fn delete_document(pool: &Pool, kind: DocumentKind, id: i64) -> Result<(), StoreError> {
    sqlx::query(&format!("DELETE FROM {} WHERE id = ?", kind.table()))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Rename in place. A row deleted concurrently shows up as `NotFound`.
#[instrument(skip(pool))]
pub async fn rename_document(
    pool: &Pool,
    kind: DocumentKind,
    id: i64,
    new_name: &str,
) -> Result<(), StoreError> {
    let res = sqlx::query(&format!("UPDATE {} SET name = ? WHERE id = ?", kind.table()))
        .bind(new_name)
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound { kind, id });
    }
    Ok(())
}

#[instrument(skip(pool))]
pub async fn clear_documents(pool: &Pool, kinds: &[DocumentKind]) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    for kind in kinds {
        sqlx::query(&format!("DELETE FROM {}", kind.table()))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn insert_history(pool: &Pool, entry: &NewHistoryEntry) -> Result<i64, StoreError> {
    let res = sqlx::query(
        "INSERT INTO generation_history (timestamp, content, font, filename) VALUES (?, ?, ?, ?)",
    )
    .bind(entry.timestamp)
    .bind(&entry.content)
    .bind(entry.font.as_str())
    .bind(&entry.filename)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

/// Newest first.
#[instrument(skip_all)]
pub async fn list_history(pool: &Pool) -> Result<Vec<HistoryEntry>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, timestamp, content, font, filename FROM generation_history ORDER BY timestamp DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(history_from_row).collect())
}

#[instrument(skip(pool))]
pub async fn delete_history(pool: &Pool, id: i64) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM generation_history WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn clear_history(pool: &Pool) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM generation_history")
        .execute(pool)
        .await?;
    Ok(())
}
