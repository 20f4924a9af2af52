//! Error taxonomy for the ingestion core.
//!
//! `IngestError` is the outcome type of a single ingestion run. A duplicate
//! is an expected control-flow result, not a failure; the remaining variants
//! distinguish which store (if any) was left untouched so callers know what
//! was persisted.

use thiserror::Error;

/// Failure modes of `ingest::ingest`.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The content is already archived. Nothing was written (or the
    /// just-written document unit was removed by the compensating delete).
    #[error("already archived as article {existing_id}")]
    Duplicate { existing_id: i64 },

    /// The content unit is unusable (empty title/body, no origin).
    /// Nothing was persisted.
    #[error("unusable content unit: {0}")]
    Extraction(String),

    /// The document store write failed. Nothing was persisted.
    #[error("document store write failed")]
    DocumentWrite(#[source] anyhow::Error),

    /// The metadata commit failed after the document unit was written; the
    /// compensating document delete has already run.
    #[error("metadata store commit failed")]
    MetadataWrite(#[source] StoreError),

    /// A failure outside the document/metadata pair (source resolution, etc.).
    #[error("storage failure")]
    Storage(#[source] anyhow::Error),
}

/// Metadata store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("article {0} not found")]
    NotFound(i64),

    /// A uniqueness constraint rejected the write. During ingestion this is
    /// the authoritative duplicate signal.
    #[error("unique constraint violated")]
    DuplicateKey,

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// True if the error is SQLite's lock-contention condition (another writer
/// holds the database). These are retried with bounded backoff.
pub fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code();
            let code = code.as_deref().unwrap_or("");
            // SQLITE_BUSY (5), SQLITE_LOCKED (6) and extended variants.
            matches!(code, "5" | "6" | "261" | "262" | "517")
                || db.message().contains("database is locked")
        }
        _ => false,
    }
}

/// True if the error is a SQLite UNIQUE/PRIMARY KEY constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code();
            let code = code.as_deref().unwrap_or("");
            // SQLITE_CONSTRAINT_UNIQUE (2067), SQLITE_CONSTRAINT_PRIMARYKEY (1555)
            code == "2067" || code == "1555" || db.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}
