//! Similarity relations: directed KNN edges between articles.
//!
//! For each article with a vector, the nearest neighbors become edges scored
//! by similarity in `[0, 1]`, derived from cosine distance `d` in `[0, 2]`
//! as `1 − d/2`. The top edges get an optional one-sentence connection note
//! from the enrichment collaborator; note failures never fail the
//! computation. Edges are directed: computing A's neighbors writes A's
//! outgoing edges only.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::config::{EnrichmentConfig, RelationsConfig};
use crate::enrich::{self, NoteCandidate};
use crate::error::StoreError;
use crate::metastore;
use crate::vector::VectorIndex;

/// Map cosine distance in `[0, 2]` to similarity in `[0, 1]`.
pub fn similarity_from_distance(distance: f64) -> f64 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// Recompute one article's outgoing edges. Returns the number of edges
/// written; an article with no vector gets none and is not an error.
pub async fn compute_for_article(
    pool: &SqlitePool,
    vectors: &VectorIndex,
    relations: &RelationsConfig,
    enrichment: &EnrichmentConfig,
    article_id: i64,
) -> Result<usize> {
    let Some(embedding) = vectors.get(article_id).await? else {
        debug!(article_id, "no vector stored, skipping relation computation");
        return Ok(0);
    };

    let neighbors = vectors
        .query(&embedding, relations.k, Some(article_id))
        .await?;
    if neighbors.is_empty() {
        metastore::replace_relations(pool, article_id, &[]).await?;
        return Ok(0);
    }

    // Neighbors can reference ids the metadata store no longer has (vector
    // orphans pending reconciliation); drop those.
    let mut scored: Vec<(i64, f64, Option<String>)> = Vec::with_capacity(neighbors.len());
    let mut candidates: Vec<NoteCandidate> = Vec::new();
    for (related_id, distance) in &neighbors {
        let related = match metastore::get_article(pool, *related_id).await {
            Ok(article) => article,
            Err(StoreError::NotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        let score = similarity_from_distance(*distance);
        if candidates.len() < relations.note_top_n {
            candidates.push(NoteCandidate {
                article_id: *related_id,
                title: related.title,
                summary: related.summary.unwrap_or_default(),
            });
        }
        scored.push((*related_id, score, None));
    }

    if enrichment.is_enabled() && !candidates.is_empty() {
        let source = metastore::get_article(pool, article_id).await?;
        match enrich::connection_notes(
            enrichment,
            &source.title,
            source.summary.as_deref().unwrap_or(""),
            &candidates,
        )
        .await
        {
            Ok(mut notes) => {
                for (id, _, note) in scored.iter_mut() {
                    if let Some(text) = notes.remove(id) {
                        *note = Some(text);
                    }
                }
            }
            Err(e) => {
                warn!(article_id, error = %e, "connection notes failed, storing edges without notes");
            }
        }
    }

    metastore::replace_relations(pool, article_id, &scored).await?;
    Ok(scored.len())
}

/// Recompute edges for every article. Returns `(articles, edges)`.
pub async fn recompute_all(
    pool: &SqlitePool,
    vectors: &VectorIndex,
    relations: &RelationsConfig,
    enrichment: &EnrichmentConfig,
) -> Result<(usize, usize)> {
    let ids = metastore::article_ids(pool).await?;
    let mut edges = 0;
    for id in &ids {
        edges += compute_for_article(pool, vectors, relations, enrichment, *id).await?;
    }
    Ok((ids.len(), edges))
}
