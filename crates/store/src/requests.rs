use {
    anyhow::{Context, Result},
    serde::Serialize,
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
    tracing::debug,
};

/// A stored prayer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PrayerRequest {
    pub id: i64,
    pub content: String,
    /// Unix seconds.
    pub created_at: i64,
}

impl PrayerRequest {
    /// `created_at` as RFC 3339, or the raw number if out of range.
    pub fn created_at_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp(self.created_at, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| self.created_at.to_string())
    }
}

/// SQLite-backed prayer request store.
#[derive(Clone)]
pub struct PrayerStore {
    pool: SqlitePool,
}

impl PrayerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url` and create the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(url)
            .await
            .with_context(|| format!("failed to open database {url}"))?;
        let store = Self::new(pool);
        store.init().await?;
        Ok(store)
    }

    /// Single-connection in-memory database, for tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory database")?;
        let store = Self::new(pool);
        store.init().await?;
        Ok(store)
    }

    /// Create the `prayer_requests` table if it doesn't exist.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS prayer_requests (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                content    TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (unixepoch())
            )"#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create prayer_requests table")?;
        Ok(())
    }

    pub async fn insert(&self, content: &str) -> Result<PrayerRequest> {
        let row = sqlx::query_as::<_, PrayerRequest>(
            "INSERT INTO prayer_requests (content) VALUES (?) RETURNING id, content, created_at",
        )
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert prayer request")?;
        debug!(id = row.id, "stored prayer request");
        Ok(row)
    }

    /// Newest first.
    pub async fn list(&self, limit: u32) -> Result<Vec<PrayerRequest>> {
        self.list_page(limit, 0).await
    }

    /// Newest first, skipping the `offset` newest requests.
    pub async fn list_page(&self, limit: u32, offset: u64) -> Result<Vec<PrayerRequest>> {
        let offset = i64::try_from(offset).context("page offset out of range")?;
        sqlx::query_as::<_, PrayerRequest>(
            "SELECT id, content, created_at FROM prayer_requests
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("failed to list prayer requests")
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM prayer_requests")
            .fetch_one(&self.pool)
            .await
            .context("failed to count prayer requests")?;
        Ok(count)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
