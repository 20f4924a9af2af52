//! The archive: one handle over the three stores.
//!
//! `Archive` bundles the metadata pool, the document store, and the vector
//! index together with the configuration, and exposes the read/update
//! surface. The metadata store is ground truth: mutations commit there
//! first, and document/vector cleanup is best-effort with the reconcile
//! sweep as the recovery path.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::warn;

use crate::config::Config;
use crate::decay;
use crate::docstore::DocumentStore;
use crate::error::StoreError;
use crate::metastore;
use crate::models::{
    Article, ArticleFilters, ArticleSummary, DecayReport, Page, PageInfo, Rating, RelatedArticle,
    Tier,
};
use crate::relations;
use crate::stats;
use crate::vector::VectorIndex;

#[derive(Debug, Clone)]
pub struct Archive {
    pub config: Config,
    pub meta: SqlitePool,
    pub docs: DocumentStore,
    pub vectors: VectorIndex,
}

impl Archive {
    /// Open (and if needed initialize) the library at the configured root.
    pub async fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(config.articles_dir())
            .with_context(|| format!("Failed to create {}", config.articles_dir().display()))?;

        let meta = crate::db::connect(&config.db_path()).await?;
        crate::migrate::run_migrations(&meta).await?;
        let vectors = VectorIndex::open(&config.vectors_path()).await?;
        let docs = DocumentStore::new(config.articles_dir());

        Ok(Self {
            config,
            meta,
            docs,
            vectors,
        })
    }

    /// Full article: metadata row joined with the document store body. A
    /// missing document unit yields empty content, not an error — the
    /// metadata row is the ground truth for existence.
    pub async fn get_article(&self, id: i64) -> Result<Article> {
        let mut article = metastore::get_article(&self.meta, id).await?;
        match self.docs.read(&article.slug) {
            Ok((_, body)) => article.content = body,
            Err(e) => {
                warn!(id, slug = %article.slug, error = %e, "document unit unreadable");
            }
        }
        Ok(article)
    }

    pub async fn list_articles(
        &self,
        filters: &ArticleFilters,
        page: Page,
    ) -> Result<(Vec<ArticleSummary>, PageInfo)> {
        let result =
            metastore::list_articles(&self.meta, filters, page, self.config.decay.threshold)
                .await?;
        Ok(result)
    }

    /// Set or clear the rating, then apply the new decay weight immediately
    /// so a positive rating surfaces the article without waiting for the
    /// next scheduled sweep.
    pub async fn rate(&self, id: i64, rating: Option<Rating>) -> Result<()> {
        metastore::update_rating(&self.meta, id, rating).await?;
        self.refresh_weight(id).await?;

        if rating.is_some() {
            if let Err(e) = stats::record_rated(&self.meta).await {
                warn!(error = %e, "failed to record rating stat");
            }
        }
        Ok(())
    }

    /// Mark read: engagement restarts the decay grace window, so the weight
    /// returns to 1.0.
    pub async fn mark_read(&self, id: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let reading_time = metastore::mark_read(&self.meta, id, now).await?;
        metastore::set_relevance_weight(&self.meta, id, 1.0).await?;

        if let Err(e) = stats::record_read(&self.meta, reading_time).await {
            warn!(error = %e, "failed to record read stat");
        }
        Ok(())
    }

    pub async fn set_tier(&self, id: i64, tier: Option<Tier>) -> Result<()> {
        metastore::set_tier(&self.meta, id, tier).await?;
        Ok(())
    }

    pub async fn set_analysis(&self, id: i64, analysis: &str) -> Result<()> {
        metastore::set_analysis(&self.meta, id, analysis).await?;
        Ok(())
    }

    pub async fn set_source_vip(&self, source_id: i64, is_vip: bool) -> Result<()> {
        metastore::set_source_vip(&self.meta, source_id, is_vip).await?;
        Ok(())
    }

    pub async fn get_related(&self, id: i64) -> Result<Vec<RelatedArticle>> {
        // Surface NotFound for the article itself rather than an empty list
        metastore::get_article(&self.meta, id).await?;
        let related = metastore::get_related(&self.meta, id).await?;
        Ok(related)
    }

    /// Delete an article everywhere. The metadata cascade commits first and
    /// is authoritative; document and vector removal are best-effort, with
    /// reconcile catching anything left behind.
    pub async fn delete_article(&self, id: i64) -> Result<()> {
        let slug = metastore::delete_article_cascade(&self.meta, id).await?;

        if let Err(e) = self.docs.delete(&slug) {
            warn!(id, slug = %slug, error = %e, "document cleanup failed, reconcile will retry");
        }
        if let Err(e) = self.vectors.delete(id).await {
            warn!(id, error = %e, "vector cleanup failed, reconcile will retry");
        }
        Ok(())
    }

    pub async fn recalculate_decay(&self, now: i64) -> Result<DecayReport> {
        decay::recalculate_all(&self.meta, &self.config.decay, now).await
    }

    /// Recompute one article's relation edges synchronously.
    pub async fn recompute_relations_for(&self, id: i64) -> Result<usize> {
        relations::compute_for_article(
            &self.meta,
            &self.vectors,
            &self.config.relations,
            &self.config.enrichment,
            id,
        )
        .await
    }

    /// Recompute every article's relation edges. Returns `(articles, edges)`.
    pub async fn recompute_relations(&self) -> Result<(usize, usize)> {
        relations::recompute_all(
            &self.meta,
            &self.vectors,
            &self.config.relations,
            &self.config.enrichment,
        )
        .await
    }

    async fn refresh_weight(&self, id: i64) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        let row = metastore::decay_row(&self.meta, id).await?;
        let anchor = row
            .last_opened_at
            .map_or(row.ingested_at, |o| o.max(row.ingested_at));
        let elapsed = ((now - anchor) as f64 / 86_400.0).max(0.0);
        let weight = decay::compute_weight(row.rating, row.is_vip, elapsed, &self.config.decay);
        metastore::set_relevance_weight(&self.meta, id, weight).await
    }
}
