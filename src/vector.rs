//! Vector index: an independent nearest-neighbor store keyed by article id.
//!
//! Lives in its own SQLite file next to the metadata store, so the two fail
//! independently. Keys are article ids serialized as strings. Queries report
//! cosine distance `d = 1 − cos(a, b)` in `[0, 2]` (0 = identical,
//! 2 = opposite), computed brute-force in Rust over the stored blobs.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};

#[derive(Debug, Clone)]
pub struct VectorIndex {
    pool: SqlitePool,
}

impl VectorIndex {
    /// Open (and if needed create) the index at the given file.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS article_vectors (
                article_id TEXT PRIMARY KEY,
                dims INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// Insert or replace the vector for an article. Idempotent and
    /// order-independent with respect to other upserts.
    pub async fn upsert(&self, article_id: i64, embedding: &[f32]) -> Result<()> {
        let blob = vec_to_blob(embedding);
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO article_vectors (article_id, dims, embedding, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(article_id) DO UPDATE SET
                dims = excluded.dims,
                embedding = excluded.embedding,
                created_at = excluded.created_at
            "#,
        )
        .bind(article_id.to_string())
        .bind(embedding.len() as i64)
        .bind(blob)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, article_id: i64) -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT embedding FROM article_vectors WHERE article_id = ?")
                .bind(article_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(blob.map(|b| blob_to_vec(&b)))
    }

    /// Nearest neighbors of `embedding`: up to `k` results as
    /// `(article_id, cosine_distance)`, ascending by distance.
    pub async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        exclude_id: Option<i64>,
    ) -> Result<Vec<(i64, f64)>> {
        let rows = sqlx::query("SELECT article_id, embedding FROM article_vectors")
            .fetch_all(&self.pool)
            .await?;

        let exclude = exclude_id.map(|id| id.to_string());
        let mut scored: Vec<(i64, f64)> = Vec::with_capacity(rows.len());

        for row in &rows {
            let key: String = row.get("article_id");
            if exclude.as_deref() == Some(key.as_str()) {
                continue;
            }
            let Ok(id) = key.parse::<i64>() else {
                continue;
            };
            let blob: Vec<u8> = row.get("embedding");
            let vec = blob_to_vec(&blob);
            let distance = 1.0 - f64::from(cosine_similarity(embedding, &vec));
            scored.push((id, distance));
        }

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Remove the vector for an article. Removing a missing record is not an
    /// error.
    pub async fn delete(&self, article_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM article_vectors WHERE article_id = ?")
            .bind(article_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All article ids present in the index. Used by the reconcile sweep.
    pub async fn ids(&self) -> Result<Vec<i64>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT article_id FROM article_vectors")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys.iter().filter_map(|k| k.parse().ok()).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
