//! Versioned schema for the document store.
//!
//! The version lives in SQLite's `user_version` header field. Each step only
//! ever creates what is missing, so replaying steps on an existing database
//! is harmless. Opening at a version lower than the stored one is a
//! [`StoreError::VersionConflict`].
use super::{Pool, StoreError};
use tracing::{info, instrument};

/// Latest schema version known to this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

struct Step {
    version: u32,
    statements: &'static [&'static str],
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        statements: &[
            "CREATE TABLE IF NOT EXISTS cover_letters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                content TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS resumes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                content TEXT NOT NULL
            )",
        ],
    },
    Step {
        version: 2,
        statements: &[
            "CREATE TABLE IF NOT EXISTS generation_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                content TEXT NOT NULL,
                font TEXT NOT NULL,
                filename TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_generation_history_timestamp
                ON generation_history(timestamp)",
        ],
    },
];

pub async fn stored_version(pool: &Pool) -> Result<u32, sqlx::Error> {
    let v: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(v.max(0) as u32)
}

/// Bring the database up to `requested`. Returns the version now stored.
#[instrument(skip(pool))]
pub async fn upgrade(pool: &Pool, requested: u32) -> Result<u32, StoreError> {
    let stored = stored_version(pool).await?;
    if stored > requested {
        return Err(StoreError::VersionConflict { stored, requested });
    }
    if stored == requested {
        return Ok(stored);
    }

    let mut tx = pool.begin().await?;
    for step in STEPS.iter().filter(|s| s.version <= requested) {
        for stmt in step.statements {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
    }
    // PRAGMA does not accept bound parameters.
    sqlx::query(&format!("PRAGMA user_version = {requested}"))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(from = stored, to = requested, "upgraded document store schema");
    Ok(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn table_names(pool: &Pool) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'index') AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn fresh_database_reaches_current_version() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        assert_eq!(stored_version(&pool).await.unwrap(), 0);
        upgrade(&pool, CURRENT_SCHEMA_VERSION).await.unwrap();
        assert_eq!(stored_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
        assert_eq!(
            table_names(&pool).await,
            vec![
                "cover_letters",
                "generation_history",
                "idx_generation_history_timestamp",
                "resumes"
            ]
        );
    }

    #[tokio::test]
    async fn stepwise_upgrade_adds_history_only() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        upgrade(&pool, 1).await.unwrap();
        assert_eq!(table_names(&pool).await, vec!["cover_letters", "resumes"]);

        sqlx::query("INSERT INTO resumes (name, content) VALUES ('r.pdf', 'kept')")
            .execute(&pool)
            .await
            .unwrap();
        upgrade(&pool, 2).await.unwrap();

        let kept: String = sqlx::query_scalar("SELECT content FROM resumes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(kept, "kept");
        assert!(table_names(&pool)
            .await
            .contains(&"generation_history".to_string()));
    }

    #[tokio::test]
    async fn upgrade_recreates_missing_collection() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        upgrade(&pool, 1).await.unwrap();
        sqlx::query("DROP TABLE cover_letters")
            .execute(&pool)
            .await
            .unwrap();
        upgrade(&pool, 2).await.unwrap();
        assert!(table_names(&pool)
            .await
            .contains(&"cover_letters".to_string()));
    }

    #[tokio::test]
    async fn downgrade_is_a_conflict() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        upgrade(&pool, 2).await.unwrap();
        let err = upgrade(&pool, 1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                stored: 2,
                requested: 1
            }
        ));
        assert_eq!(upgrade(&pool, 2).await.unwrap(), 2);
    }
}
