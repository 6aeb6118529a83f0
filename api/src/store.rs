use crate::{CacheEntry, PredictionRecord, ScheduleEntry};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store document error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence handle passed explicitly to whatever needs it.
///
/// Results and schedules are keyed by round. Predictions are unique per
/// `(user_id, round)`; `put_prediction` replaces an existing one in place.
#[async_trait]
pub trait Store: Send + Sync {
    async fn results(&self, round: &str) -> StoreResult<Option<CacheEntry>>;
    async fn put_results(&self, entry: CacheEntry) -> StoreResult<()>;
    async fn schedule(&self, round: &str) -> StoreResult<Option<ScheduleEntry>>;
    async fn put_schedule(&self, entry: ScheduleEntry) -> StoreResult<()>;
    async fn prediction(&self, user_id: &str, round: &str) -> StoreResult<Option<PredictionRecord>>;
    async fn put_prediction(&self, record: PredictionRecord) -> StoreResult<()>;
    /// Every prediction for a round, oldest submission first.
    async fn predictions(&self, round: &str) -> StoreResult<Vec<PredictionRecord>>;
}

// ── In-memory ───────────────────────────────────────────────

#[derive(Debug, Default)]
struct Documents {
    results: Vec<CacheEntry>,
    schedules: Vec<ScheduleEntry>,
    predictions: Vec<PredictionRecord>,
}

/// In-process store. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<Documents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Documents>> {
        self.documents.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn results(&self, round: &str) -> StoreResult<Option<CacheEntry>> {
        Ok(self.lock()?.results.iter().find(|e| e.round == round).cloned())
    }

    async fn put_results(&self, entry: CacheEntry) -> StoreResult<()> {
        let mut docs = self.lock()?;
        match docs.results.iter_mut().find(|e| e.round == entry.round) {
            Some(existing) => *existing = entry,
            None => docs.results.push(entry),
        }
        Ok(())
    }

    async fn schedule(&self, round: &str) -> StoreResult<Option<ScheduleEntry>> {
        Ok(self.lock()?.schedules.iter().find(|e| e.round == round).cloned())
    }

    async fn put_schedule(&self, entry: ScheduleEntry) -> StoreResult<()> {
        let mut docs = self.lock()?;
        match docs.schedules.iter_mut().find(|e| e.round == entry.round) {
            Some(existing) => *existing = entry,
            None => docs.schedules.push(entry),
        }
        Ok(())
    }

    async fn prediction(&self, user_id: &str, round: &str) -> StoreResult<Option<PredictionRecord>> {
        Ok(self
            .lock()?
            .predictions
            .iter()
            .find(|p| p.user_id == user_id && p.round == round)
            .cloned())
    }

    async fn put_prediction(&self, record: PredictionRecord) -> StoreResult<()> {
        let mut docs = self.lock()?;
        let existing = docs
            .predictions
            .iter_mut()
            .find(|p| p.user_id == record.user_id && p.round == record.round);
        match existing {
            Some(existing) => *existing = record,
            None => docs.predictions.push(record),
        }
        Ok(())
    }

    async fn predictions(&self, round: &str) -> StoreResult<Vec<PredictionRecord>> {
        Ok(self.lock()?.predictions.iter().filter(|p| p.round == round).cloned().collect())
    }
}

// ── SQLite ──────────────────────────────────────────────────

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS results (
        round TEXT PRIMARY KEY,
        ttl INTEGER NOT NULL,
        state TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS schedules (
        round TEXT PRIMARY KEY,
        ttl INTEGER NOT NULL,
        matches TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS predictions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        round TEXT NOT NULL,
        username TEXT NOT NULL,
        prediction TEXT NOT NULL,
        UNIQUE (user_id, round)
    )",
];

/// Documents kept in SQLite, bodies stored as JSON text. Each put is one
/// statement, so a failed write is never visible to later reads.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;
        Self::with_pool(pool).await
    }

    /// Private database that lives as long as the store.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> StoreResult<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn prediction_row(row: (String, String, String, String)) -> StoreResult<PredictionRecord> {
    let (user_id, username, round, prediction) = row;
    Ok(PredictionRecord { user_id, username, round, prediction: serde_json::from_str(&prediction)? })
}

#[async_trait]
impl Store for SqliteStore {
    async fn results(&self, round: &str) -> StoreResult<Option<CacheEntry>> {
        let row: Option<(i64, String)> = sqlx::query_as("SELECT ttl, state FROM results WHERE round = ?")
            .bind(round)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((ttl, state)) => Ok(Some(CacheEntry {
                round: round.to_owned(),
                ttl,
                state: serde_json::from_str(&state)?,
            })),
            None => Ok(None),
        }
    }

    async fn put_results(&self, entry: CacheEntry) -> StoreResult<()> {
        let state = serde_json::to_string(&entry.state)?;
        sqlx::query("INSERT OR REPLACE INTO results (round, ttl, state) VALUES (?, ?, ?)")
            .bind(&entry.round)
            .bind(entry.ttl)
            .bind(state)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn schedule(&self, round: &str) -> StoreResult<Option<ScheduleEntry>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT ttl, matches FROM schedules WHERE round = ?")
                .bind(round)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((ttl, matches)) => Ok(Some(ScheduleEntry {
                round: round.to_owned(),
                ttl,
                matches: serde_json::from_str(&matches)?,
            })),
            None => Ok(None),
        }
    }

    async fn put_schedule(&self, entry: ScheduleEntry) -> StoreResult<()> {
        let matches = serde_json::to_string(&entry.matches)?;
        sqlx::query("INSERT OR REPLACE INTO schedules (round, ttl, matches) VALUES (?, ?, ?)")
            .bind(&entry.round)
            .bind(entry.ttl)
            .bind(matches)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn prediction(&self, user_id: &str, round: &str) -> StoreResult<Option<PredictionRecord>> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT user_id, username, round, prediction FROM predictions WHERE user_id = ? AND round = ?",
        )
        .bind(user_id)
        .bind(round)
        .fetch_optional(&self.pool)
        .await?;
        row.map(prediction_row).transpose()
    }

    async fn put_prediction(&self, record: PredictionRecord) -> StoreResult<()> {
        let prediction = serde_json::to_string(&record.prediction)?;
        // Upsert keeps the row id, so resubmitting does not change leaderboard order.
        sqlx::query(
            "INSERT INTO predictions (user_id, round, username, prediction) VALUES (?, ?, ?, ?)
             ON CONFLICT (user_id, round) DO UPDATE
             SET username = excluded.username, prediction = excluded.prediction",
        )
        .bind(&record.user_id)
        .bind(&record.round)
        .bind(&record.username)
        .bind(prediction)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn predictions(&self, round: &str) -> StoreResult<Vec<PredictionRecord>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT user_id, username, round, prediction FROM predictions WHERE round = ? ORDER BY id",
        )
        .bind(round)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(prediction_row).collect()
    }
}
