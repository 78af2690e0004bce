use crate::constants::DB_PRAGMAS;
use crate::types::{AppId, ChatRole, ChatTurn, CodeloomError, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

pub type DbPool = SqlitePool;

/// Durable chat history, one row per turn.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    async fn append(&self, app_id: AppId, role: ChatRole, text: &str) -> Result<()>;

    /// Most-recent-first, at most `max_count` turns.
    async fn load_recent(&self, app_id: AppId, max_count: usize) -> Result<Vec<ChatTurn>>;

    async fn delete_by_app(&self, app_id: AppId) -> Result<u64>;
}

pub async fn init_db<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    let path_str = match path.as_ref().to_str() {
        Some(s) => s,
        None => {
            return Err(CodeloomError::Configuration(
                "Invalid database path: Path contains non-UTF8 characters".to_string(),
            )
            .into())
        }
    };
    let url = format!("sqlite:{}?mode=rwc", path_str);
    let pool = SqlitePool::connect(&url).await?;
    configure_db(&pool).await?;
    create_schema(&pool).await?;
    tracing::info!("Chat history database ready at {}", path_str);
    Ok(pool)
}

async fn configure_db(pool: &DbPool) -> Result<()> {
    for pragma in DB_PRAGMAS {
        sqlx::query(pragma).execute(pool).await?;
    }
    Ok(())
}

pub async fn create_schema(pool: &DbPool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chat_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            app_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chat_history_app_created
            ON chat_history (app_id, created_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Clone)]
pub struct SqliteChatHistory {
    pool: DbPool,
}

impl SqliteChatHistory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fresh in-memory store with the schema applied.
    pub async fn in_memory() -> Result<Self> {
        // A single connection keeps every query on the same in-memory database.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        create_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ChatHistoryStore for SqliteChatHistory {
    async fn append(&self, app_id: AppId, role: ChatRole, text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(CodeloomError::Persistence(format!(
                "Refusing to append empty {} message for app {}",
                role.as_str(),
                app_id
            ))
            .into());
        }
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO chat_history (app_id, role, message, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(app_id.0)
        .bind(role.as_str())
        .bind(text)
        .bind(now.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_recent(&self, app_id: AppId, max_count: usize) -> Result<Vec<ChatTurn>> {
        let rows = sqlx::query(
            "SELECT role, message, created_at FROM chat_history
             WHERE app_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(app_id.0)
        .bind(max_count as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row.try_get("role")?;
            let text: String = row.try_get("message")?;
            let created_at: String = row.try_get("created_at")?;
            let timestamp = match chrono::DateTime::parse_from_rfc3339(&created_at) {
                Ok(t) => t.with_timezone(&chrono::Utc),
                Err(e) => {
                    tracing::warn!(
                        "Unparseable chat history timestamp '{}' for app {}: {}",
                        created_at,
                        app_id,
                        e
                    );
                    chrono::Utc::now()
                }
            };
            turns.push(ChatTurn {
                app_id,
                role: role.parse()?,
                text,
                timestamp,
            });
        }
        Ok(turns)
    }

    async fn delete_by_app(&self, app_id: AppId) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM chat_history WHERE app_id = ?")
            .bind(app_id.0)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() > 0 {
            tracing::info!(
                "Removed {} chat history rows for app {}",
                deleted.rows_affected(),
                app_id
            );
        }
        Ok(deleted.rows_affected())
    }
}
