//! Persistence layer.
//!
//! One store trait per aggregate ([`UserStore`], [`ChatStore`],
//! [`MessageStore`]), all implemented by [`SqliteStore`]. Handlers are generic
//! over the traits so tests can run against an in-memory database.
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` boxing is needed on this hot path.
//!
//! Every call checks a connection out of the pool, runs one statement and
//! returns it; no transaction is held open across a generation call.

pub mod chat;
pub mod dao;
pub mod message;
pub mod user;

pub use dao::{ChatRecord, MessageKind, MessageRecord, UserRecord};

pub use chat::ChatStore;
pub use message::MessageStore;
pub use user::UserStore;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the store traits.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A `UNIQUE` constraint rejected the write.
    #[error("{0}")]
    Duplicate(String),

    /// A `FOREIGN KEY` constraint rejected the write (the parent row is absent).
    #[error("referenced {parent} does not exist")]
    MissingParent { parent: &'static str },

    /// A stored column could not be decoded back into its domain type.
    #[error("corrupt {column} value: {raw}")]
    Decode { column: &'static str, raw: String },

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Classify a write error, singling out constraint violations.
    pub(crate) fn from_write(err: sqlx::Error, parent: &'static str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Duplicate(duplicate_message(db.message()));
            }
            if db.is_foreign_key_violation() {
                return StoreError::MissingParent { parent };
            }
        }
        StoreError::Database(err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

/// Turn `UNIQUE constraint failed: users.username` into a caller-facing hint.
fn duplicate_message(raw: &str) -> String {
    let columns = raw.rsplit(':').next().unwrap_or(raw).trim();
    let first = columns.split(',').next().unwrap_or(columns).trim();
    let parts: Vec<&str> = first.split('.').collect();
    if parts.len() >= 2 {
        let table = parts[parts.len() - 2];
        let column = parts[parts.len() - 1];
        format!("Duplicate entry for {column} in {table}. Choose another value.")
    } else {
        "Integrity error while processing your request.".to_owned()
    }
}

// ── Paging ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A window over a child collection, ordered by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
    pub order: SortOrder,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Build a page, clamping `limit` into `1..=MAX_LIMIT`.
    pub fn new(limit: u32, offset: u32, order: SortOrder) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset,
            order,
        }
    }

    /// Every row, newest first.
    pub fn all() -> Self {
        Self {
            limit: u32::MAX,
            offset: 0,
            order: SortOrder::Desc,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0, SortOrder::Desc)
    }
}

// ── SQLite store ──────────────────────────────────────────────────────────────

/// SQLite-backed store for users, chats and messages.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://duet.db?mode=rwc"`.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::migrate(pool).await
    }

    /// A private in-memory database.
    ///
    /// Pinned to a single connection that never expires, since every SQLite
    /// `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ── column codecs ─────────────────────────────────────────────────────────────

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(raw: &str, column: &'static str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, column, error = %e, "failed to parse timestamp; using now");
        Utc::now()
    })
}

pub(crate) fn decode_uuid(raw: &str, column: &'static str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|_| StoreError::Decode {
        column,
        raw: raw.to_owned(),
    })
}
