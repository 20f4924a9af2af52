//! Daily reading-stats aggregates.
//!
//! One row per day, bumped by ingestion, read-marking, and rating. Callers
//! treat failures here as non-fatal and log them.

use anyhow::Result;
use sqlx::SqlitePool;

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

pub async fn record_saved(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reading_stats (date, articles_saved) VALUES (?, 1)
        ON CONFLICT(date) DO UPDATE SET articles_saved = articles_saved + 1
        "#,
    )
    .bind(today())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn record_read(pool: &SqlitePool, reading_time_min: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reading_stats (date, articles_read, total_reading_time_min)
        VALUES (?, 1, ?)
        ON CONFLICT(date) DO UPDATE SET
            articles_read = articles_read + 1,
            total_reading_time_min = total_reading_time_min + excluded.total_reading_time_min
        "#,
    )
    .bind(today())
    .bind(reading_time_min)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn record_rated(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reading_stats (date, articles_rated) VALUES (?, 1)
        ON CONFLICT(date) DO UPDATE SET articles_rated = articles_rated + 1
        "#,
    )
    .bind(today())
    .execute(pool)
    .await?;
    Ok(())
}
