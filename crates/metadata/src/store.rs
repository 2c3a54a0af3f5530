//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ObjectRepo, RateRepo, RetentionRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: ObjectRepo + RateRepo + RetentionRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout = Duration::from_secs(query_timeout_secs.unwrap_or(30));

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // Single connection: writes are serialized by the engine anyway and
            // downloads are short reads.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout,
        };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "Opened SQLite registry");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Log queries that run past the advisory timeout.
    fn note_slow(&self, query: &'static str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed > self.query_timeout {
            tracing::warn!(
                query,
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_secs = self.query_timeout.as_secs(),
                "Slow registry query"
            );
        }
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Internal(format!("I/O error: {e}"))
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map a unique-index violation on insert to the matching domain error.
///
/// SQLite reports e.g. "UNIQUE constraint failed: objects.bucket, objects.alias"
/// or "UNIQUE constraint failed: objects.content_name".
fn map_insert_error(e: sqlx::Error, object: &crate::models::NewStoredObject) -> MetadataError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.message().contains("UNIQUE constraint")
    {
        let message = db_err.message();
        if message.contains("objects.bucket")
            && let Some(key) = &object.alias
        {
            return MetadataError::DuplicateAlias {
                bucket: key.bucket.clone(),
                alias: key.alias.clone(),
            };
        }
        if message.contains("objects.content_name") {
            return MetadataError::DuplicateName(object.content_name.clone());
        }
    }
    e.into()
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::rates::{DAY_SECS, HOUR_SECS, MINUTE_SECS};

    #[async_trait]
    impl ObjectRepo for SqliteStore {
        async fn insert_object(&self, object: &NewStoredObject) -> MetadataResult<i64> {
            let started = Instant::now();
            let (bucket, alias) = match &object.alias {
                Some(key) => (Some(key.bucket.as_str()), Some(key.alias.as_str())),
                None => (None, None),
            };

            let result = sqlx::query(
                "INSERT INTO objects (content_name, bucket, alias, origin, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&object.content_name)
            .bind(bucket)
            .bind(alias)
            .bind(&object.origin)
            .bind(object.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, object))?;

            self.note_slow("insert_object", started);
            Ok(result.last_insert_rowid())
        }

        async fn get_object(&self, id: i64) -> MetadataResult<Option<StoredObjectRow>> {
            let row = sqlx::query_as::<_, StoredObjectRow>("SELECT * FROM objects WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_by_alias(
            &self,
            bucket: &str,
            alias: &str,
        ) -> MetadataResult<Option<StoredObjectRow>> {
            let row = sqlx::query_as::<_, StoredObjectRow>(
                "SELECT * FROM objects WHERE bucket = ? AND alias = ?",
            )
            .bind(bucket)
            .bind(alias)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn find_plain_by_content_name(
            &self,
            content_name: &str,
        ) -> MetadataResult<Option<StoredObjectRow>> {
            let row = sqlx::query_as::<_, StoredObjectRow>(
                "SELECT * FROM objects WHERE content_name = ? AND bucket IS NULL",
            )
            .bind(content_name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn count_content_references(&self, content_name: &str) -> MetadataResult<u64> {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM objects WHERE content_name = ?")
                    .bind(content_name)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(count as u64)
        }

        async fn count_objects(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM objects")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl RateRepo for SqliteStore {
        async fn count_since(&self, origin: &str, since: i64) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM objects WHERE origin = ? AND created_at >= ?",
            )
            .bind(origin)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
            Ok(count as u64)
        }

        async fn rate_window_counts(
            &self,
            origin: &str,
            now: i64,
        ) -> MetadataResult<RateWindowCounts> {
            let started = Instant::now();
            let counts = sqlx::query_as::<_, RateWindowCounts>(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END), 0) AS minute,
                    COALESCE(SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END), 0) AS hour,
                    COUNT(*) AS day
                FROM objects
                WHERE origin = ? AND created_at >= ?
                "#,
            )
            .bind(now - MINUTE_SECS)
            .bind(now - HOUR_SECS)
            .bind(origin)
            .bind(now - DAY_SECS)
            .fetch_one(&self.pool)
            .await?;

            self.note_slow("rate_window_counts", started);
            Ok(counts)
        }
    }

    #[async_trait]
    impl RetentionRepo for SqliteStore {
        async fn list_expired(&self, cutoff: i64) -> MetadataResult<Vec<StoredObjectRow>> {
            let rows = sqlx::query_as::<_, StoredObjectRow>(
                "SELECT * FROM objects WHERE created_at <= ? ORDER BY created_at, id",
            )
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_expired(&self, cutoff: i64) -> MetadataResult<Vec<String>> {
            let started = Instant::now();
            let mut tx = self.pool.begin().await?;

            let rows = sqlx::query_as::<_, StoredObjectRow>(
                "SELECT * FROM objects WHERE created_at <= ? ORDER BY created_at, id",
            )
            .bind(cutoff)
            .fetch_all(&mut *tx)
            .await?;

            let deleted = sqlx::query("DELETE FROM objects WHERE created_at <= ?")
                .bind(cutoff)
                .execute(&mut *tx)
                .await?;

            // Both statements ran inside the same write transaction.
            if deleted.rows_affected() != rows.len() as u64 {
                return Err(MetadataError::Internal(format!(
                    "expired set changed during deletion: selected {}, deleted {}",
                    rows.len(),
                    deleted.rows_affected()
                )));
            }

            tx.commit().await?;
            self.note_slow("delete_expired", started);

            Ok(rows.into_iter().map(|row| row.content_name).collect())
        }

        async fn delete_oldest(&self, n: u32) -> MetadataResult<Vec<String>> {
            let mut tx = self.pool.begin().await?;

            let rows = sqlx::query_as::<_, StoredObjectRow>(
                "SELECT * FROM objects ORDER BY created_at, id LIMIT ?",
            )
            .bind(n as i64)
            .fetch_all(&mut *tx)
            .await?;

            let mut names = Vec::with_capacity(rows.len());
            for row in rows {
                let deleted = sqlx::query("DELETE FROM objects WHERE id = ?")
                    .bind(row.id)
                    .execute(&mut *tx)
                    .await?;
                if deleted.rows_affected() > 0 {
                    names.push(row.content_name);
                }
            }

            tx.commit().await?;
            Ok(names)
        }
    }
}

/// Registry schema.
///
/// Plain uploads are unique by content name; aliased uploads are unique by
/// `(bucket, alias)`. The two partial indexes keep those namespaces apart, so
/// the same content can be both a plain upload and any number of aliases.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS objects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_name TEXT NOT NULL,
    bucket TEXT,
    alias TEXT,
    origin TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    CHECK ((bucket IS NULL) = (alias IS NULL))
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_objects_plain_name ON objects(content_name) WHERE bucket IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_objects_alias ON objects(bucket, alias) WHERE bucket IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_objects_content_name ON objects(content_name);
CREATE INDEX IF NOT EXISTS idx_objects_origin_created ON objects(origin, created_at);
CREATE INDEX IF NOT EXISTS idx_objects_created ON objects(created_at, id);
"#;
