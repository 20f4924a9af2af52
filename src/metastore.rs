//! Metadata store: relational records for articles, sources, tags, entities,
//! relations, and stats.
//!
//! Multi-row mutations run as a single transaction. SQLite serializes
//! writers, so commits that hit lock contention are retried with bounded
//! backoff before surfacing a hard failure. Uniqueness constraints (origin
//! URL per source, title per email source) are the authoritative dedup
//! guard; violations map to `StoreError::DuplicateKey`.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::warn;

use crate::error::{is_busy, is_unique_violation, StoreError};
use crate::models::{
    Article, ArticleFilters, ArticleSummary, Entity, Page, PageInfo, Rating, RelatedArticle,
    SourceKind, Tier,
};

/// Backoff schedule for lock-busy retries.
const BUSY_BACKOFF_MS: [u64; 3] = [50, 100, 200];

/// Fields for a new article row. `url` is empty for email-origin articles.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source_id: i64,
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub slug: String,
    pub summary: Option<String>,
    pub word_count: i64,
    pub reading_time_min: i64,
    pub published_at: Option<i64>,
    pub ingested_at: i64,
    pub embedding_pending: bool,
}

// ============ Sources ============

/// Find a source by its identity (domain for web/feed, sender for email) or
/// create it. Resolves insert races through the unique index.
pub async fn get_or_create_source(
    pool: &SqlitePool,
    kind: SourceKind,
    name: &str,
    domain: Option<&str>,
    email_sender: Option<&str>,
) -> Result<i64, StoreError> {
    if let Some(id) = find_source(pool, kind, domain, email_sender).await? {
        return Ok(id);
    }

    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "INSERT INTO sources (name, domain, email_sender, kind, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(domain)
    .bind(email_sender)
    .bind(kind.as_str())
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(r) => Ok(r.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => {
            // Lost the race to a concurrent ingest; the row exists now.
            find_source(pool, kind, domain, email_sender)
                .await?
                .ok_or(StoreError::Db(e))
        }
        Err(e) => Err(e.into()),
    }
}

async fn find_source(
    pool: &SqlitePool,
    kind: SourceKind,
    domain: Option<&str>,
    email_sender: Option<&str>,
) -> Result<Option<i64>, StoreError> {
    let id = if let Some(sender) = email_sender {
        sqlx::query_scalar("SELECT id FROM sources WHERE kind = ? AND email_sender = ?")
            .bind(kind.as_str())
            .bind(sender)
            .fetch_optional(pool)
            .await?
    } else {
        sqlx::query_scalar("SELECT id FROM sources WHERE kind = ? AND domain = ?")
            .bind(kind.as_str())
            .bind(domain)
            .fetch_optional(pool)
            .await?
    };
    Ok(id)
}

pub async fn source_is_vip(pool: &SqlitePool, source_id: i64) -> Result<bool, StoreError> {
    let vip: Option<bool> = sqlx::query_scalar("SELECT is_vip FROM sources WHERE id = ?")
        .bind(source_id)
        .fetch_optional(pool)
        .await?;
    Ok(vip.unwrap_or(false))
}

pub async fn set_source_vip(
    pool: &SqlitePool,
    source_id: i64,
    is_vip: bool,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE sources SET is_vip = ? WHERE id = ?")
        .bind(is_vip)
        .bind(source_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(source_id));
    }
    Ok(())
}

// ============ Article creation ============

/// Create the article row plus its tag/entity junctions in one transaction.
/// Retries the whole transaction on lock contention; a uniqueness violation
/// means another ingest of the same content won and maps to `DuplicateKey`.
pub async fn create_article(
    pool: &SqlitePool,
    article: &NewArticle,
    tags: &[String],
    entities: &[Entity],
) -> Result<i64, StoreError> {
    let mut attempt = 0;
    loop {
        match try_create_article(pool, article, tags, entities).await {
            Ok(id) => return Ok(id),
            Err(StoreError::Db(e)) if is_busy(&e) && attempt < BUSY_BACKOFF_MS.len() => {
                let delay = BUSY_BACKOFF_MS[attempt];
                warn!(attempt, delay_ms = delay, "metadata commit hit lock contention, retrying");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn try_create_article(
    pool: &SqlitePool,
    article: &NewArticle,
    tags: &[String],
    entities: &[Entity],
) -> Result<i64, StoreError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO articles
            (source_id, title, author, url, slug, summary, word_count,
             reading_time_min, published_at, ingested_at, embedding_pending)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(article.source_id)
    .bind(&article.title)
    .bind(&article.author)
    .bind(&article.url)
    .bind(&article.slug)
    .bind(&article.summary)
    .bind(article.word_count)
    .bind(article.reading_time_min)
    .bind(article.published_at)
    .bind(article.ingested_at)
    .bind(article.embedding_pending)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::DuplicateKey
        } else {
            StoreError::Db(e)
        }
    })?;

    let article_id = result.last_insert_rowid();

    for tag in tags {
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(tag)
            .execute(&mut *tx)
            .await?;
        let tag_id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
            .bind(tag)
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO article_tags (article_id, tag_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
    }

    for entity in entities {
        sqlx::query("INSERT OR IGNORE INTO entities (name, entity_type) VALUES (?, ?)")
            .bind(&entity.name)
            .bind(&entity.kind)
            .execute(&mut *tx)
            .await?;
        let entity_id: i64 =
            sqlx::query_scalar("SELECT id FROM entities WHERE name = ? AND entity_type = ?")
                .bind(&entity.name)
                .bind(&entity.kind)
                .fetch_one(&mut *tx)
                .await?;
        sqlx::query(
            "INSERT OR IGNORE INTO article_entities (article_id, entity_id) VALUES (?, ?)",
        )
        .bind(article_id)
        .bind(entity_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(article_id)
}

// ============ Article reads ============

const ARTICLE_COLUMNS: &str = r#"
    a.id, a.source_id, a.title, a.author, a.url, a.slug, a.summary,
    a.word_count, a.reading_time_min, a.published_at, a.ingested_at,
    a.last_opened_at, a.is_read, a.opened_count, a.rating, a.tier,
    a.relevance_weight, a.embedding_pending, a.analysis,
    s.name AS source_name, s.is_vip
"#;

pub async fn get_article(pool: &SqlitePool, id: i64) -> Result<Article, StoreError> {
    let sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles a JOIN sources s ON a.source_id = s.id WHERE a.id = ?"
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

    let tags = article_tags(pool, id).await?;
    Ok(article_from_row(&row, tags))
}

async fn article_tags(pool: &SqlitePool, article_id: i64) -> Result<Vec<String>, StoreError> {
    let tags = sqlx::query_scalar(
        r#"
        SELECT t.name FROM tags t
        JOIN article_tags at ON t.id = at.tag_id
        WHERE at.article_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(article_id)
    .fetch_all(pool)
    .await?;
    Ok(tags)
}

fn parse_rating(raw: Option<String>) -> Option<Rating> {
    raw.and_then(|s| s.parse().ok())
}

fn parse_tier(raw: Option<String>) -> Option<Tier> {
    raw.and_then(|s| s.parse().ok())
}

fn article_from_row(row: &SqliteRow, tags: Vec<String>) -> Article {
    Article {
        id: row.get("id"),
        source_id: row.get("source_id"),
        source_name: row.get("source_name"),
        is_vip: row.get("is_vip"),
        title: row.get("title"),
        author: row.get("author"),
        url: row.get("url"),
        slug: row.get("slug"),
        summary: row.get("summary"),
        tags,
        word_count: row.get("word_count"),
        reading_time_min: row.get("reading_time_min"),
        published_at: row.get("published_at"),
        ingested_at: row.get("ingested_at"),
        last_opened_at: row.get("last_opened_at"),
        is_read: row.get("is_read"),
        opened_count: row.get("opened_count"),
        rating: parse_rating(row.get("rating")),
        tier: parse_tier(row.get("tier")),
        relevance_weight: row.get("relevance_weight"),
        embedding_pending: row.get("embedding_pending"),
        analysis: row.get("analysis"),
        content: String::new(),
    }
}

// ============ Listing ============

enum Bind {
    Int(i64),
    Float(f64),
    Text(String),
}

fn build_filter_clauses(
    filters: &ArticleFilters,
    decay_threshold: f64,
) -> (Vec<&'static str>, Vec<Bind>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    if let Some(tier) = filters.tier {
        clauses.push("a.tier = ?");
        binds.push(Bind::Text(tier.as_str().to_string()));
    }
    if let Some(source_id) = filters.source_id {
        clauses.push("a.source_id = ?");
        binds.push(Bind::Int(source_id));
    }
    if let Some(ref tag) = filters.tag {
        clauses.push(
            "EXISTS (SELECT 1 FROM article_tags at JOIN tags t ON t.id = at.tag_id
             WHERE at.article_id = a.id AND t.name = ?)",
        );
        binds.push(Bind::Text(tag.clone()));
    }
    if let Some(rating) = filters.rating {
        clauses.push("a.rating = ?");
        binds.push(Bind::Text(rating.as_str().to_string()));
    }
    if let Some(is_read) = filters.is_read {
        clauses.push("a.is_read = ?");
        binds.push(Bind::Int(i64::from(is_read)));
    }
    if let Some(since) = filters.since {
        clauses.push("a.ingested_at >= ?");
        binds.push(Bind::Int(since));
    }
    if let Some(until) = filters.until {
        clauses.push("a.ingested_at <= ?");
        binds.push(Bind::Int(until));
    }
    if let Some(ref text) = filters.text {
        clauses.push("(lower(a.title) LIKE ? OR lower(COALESCE(a.summary, '')) LIKE ?)");
        let pattern = format!("%{}%", text.to_lowercase());
        binds.push(Bind::Text(pattern.clone()));
        binds.push(Bind::Text(pattern));
    }
    if !filters.include_decayed {
        clauses.push("a.relevance_weight >= ?");
        binds.push(Bind::Float(decay_threshold));
    }

    (clauses, binds)
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    binds: &'q [Bind],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for bind in binds {
        query = match bind {
            Bind::Int(v) => query.bind(v),
            Bind::Float(v) => query.bind(v),
            Bind::Text(v) => query.bind(v),
        };
    }
    query
}

/// Filtered, paginated listing. Ordering: VIP sources first, then newest
/// ingested, then id descending for determinism.
pub async fn list_articles(
    pool: &SqlitePool,
    filters: &ArticleFilters,
    page: Page,
    decay_threshold: f64,
) -> Result<(Vec<ArticleSummary>, PageInfo), StoreError> {
    let (clauses, binds) = build_filter_clauses(filters, decay_threshold);
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let count_sql = format!(
        "SELECT COUNT(*) FROM articles a JOIN sources s ON a.source_id = s.id {where_sql}"
    );
    let total: i64 = bind_all(sqlx::query(&count_sql), &binds)
        .fetch_one(pool)
        .await?
        .get(0);

    let per_page = page.per_page.max(1);
    let page_no = page.page.max(1);
    let offset = (page_no - 1) * per_page;

    let rows_sql = format!(
        r#"
        SELECT a.id, a.source_id, a.title, a.url, a.slug, a.summary,
               a.reading_time_min, a.ingested_at, a.is_read, a.rating, a.tier,
               a.relevance_weight, s.name AS source_name, s.is_vip
        FROM articles a
        JOIN sources s ON a.source_id = s.id
        {where_sql}
        ORDER BY s.is_vip DESC, a.ingested_at DESC, a.id DESC
        LIMIT ? OFFSET ?
        "#
    );

    let rows = bind_all(sqlx::query(&rows_sql), &binds)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: i64 = row.get("id");
        let tags = article_tags(pool, id).await?;
        summaries.push(ArticleSummary {
            id,
            source_id: row.get("source_id"),
            source_name: row.get("source_name"),
            is_vip: row.get("is_vip"),
            title: row.get("title"),
            url: row.get("url"),
            slug: row.get("slug"),
            summary: row.get("summary"),
            reading_time_min: row.get("reading_time_min"),
            ingested_at: row.get("ingested_at"),
            is_read: row.get("is_read"),
            rating: parse_rating(row.get("rating")),
            tier: parse_tier(row.get("tier")),
            relevance_weight: row.get("relevance_weight"),
            tags,
        });
    }

    let total_pages = if total == 0 {
        0
    } else {
        (total + per_page - 1) / per_page
    };

    Ok((
        summaries,
        PageInfo {
            page: page_no,
            per_page,
            total,
            total_pages,
        },
    ))
}

// ============ Article mutations ============

pub async fn update_rating(
    pool: &SqlitePool,
    id: i64,
    rating: Option<Rating>,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE articles SET rating = ? WHERE id = ?")
        .bind(rating.map(|r| r.as_str()))
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

/// Mark read: sets the flag, bumps the open counter, and records the
/// engagement time (which restarts the decay grace period). Returns the
/// article's reading time for the stats counter.
pub async fn mark_read(pool: &SqlitePool, id: i64, now: i64) -> Result<i64, StoreError> {
    let result = sqlx::query(
        "UPDATE articles SET is_read = 1, opened_count = opened_count + 1, last_opened_at = ?
         WHERE id = ?",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    let reading_time: i64 = sqlx::query_scalar("SELECT reading_time_min FROM articles WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(reading_time)
}

pub async fn set_tier(pool: &SqlitePool, id: i64, tier: Option<Tier>) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE articles SET tier = ? WHERE id = ?")
        .bind(tier.map(|t| t.as_str()))
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

pub async fn set_relevance_weight(
    pool: &SqlitePool,
    id: i64,
    weight: f64,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE articles SET relevance_weight = ? WHERE id = ?")
        .bind(weight)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

pub async fn set_analysis(pool: &SqlitePool, id: i64, analysis: &str) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE articles SET analysis = ? WHERE id = ?")
        .bind(analysis)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

pub async fn set_embedding_pending(
    pool: &SqlitePool,
    id: i64,
    pending: bool,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE articles SET embedding_pending = ? WHERE id = ?")
        .bind(pending)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

// ============ Relations ============

/// Insert or refresh a single directed edge. Keyed by the pair, so repeated
/// computation never duplicates edges.
pub async fn upsert_relation(
    pool: &SqlitePool,
    article_id: i64,
    related_id: i64,
    score: f64,
    note: Option<&str>,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO article_relations (article_id, related_article_id, similarity_score, connection_note)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(article_id, related_article_id) DO UPDATE SET
            similarity_score = excluded.similarity_score,
            connection_note = excluded.connection_note
        "#,
    )
    .bind(article_id)
    .bind(related_id)
    .bind(score)
    .bind(note)
    .execute(pool)
    .await?;
    Ok(())
}

/// Replace an article's outgoing edges in one transaction. Deleting first
/// guarantees no stale edges survive a recompute with a smaller K.
pub async fn replace_relations(
    pool: &SqlitePool,
    article_id: i64,
    edges: &[(i64, f64, Option<String>)],
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM article_relations WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut *tx)
        .await?;

    for (related_id, score, note) in edges {
        sqlx::query(
            r#"
            INSERT INTO article_relations (article_id, related_article_id, similarity_score, connection_note)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(article_id, related_article_id) DO UPDATE SET
                similarity_score = excluded.similarity_score,
                connection_note = excluded.connection_note
            "#,
        )
        .bind(article_id)
        .bind(related_id)
        .bind(score)
        .bind(note)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Stored related articles with metadata, best match first.
pub async fn get_related(pool: &SqlitePool, id: i64) -> Result<Vec<RelatedArticle>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT ar.related_article_id, ar.similarity_score, ar.connection_note,
               a.title, a.summary
        FROM article_relations ar
        JOIN articles a ON ar.related_article_id = a.id
        WHERE ar.article_id = ?
        ORDER BY ar.similarity_score DESC
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| RelatedArticle {
            related_article_id: row.get("related_article_id"),
            title: row.get("title"),
            summary: row.get("summary"),
            similarity_score: row.get("similarity_score"),
            connection_note: row.get("connection_note"),
        })
        .collect())
}

// ============ Deletion ============

/// Remove the article row and every junction/relation row referencing it,
/// in one transaction. Returns the slug so the caller can clean up the other
/// stores. Document and vector cleanup stay outside the transaction: they
/// are best-effort and the reconcile sweep catches what they miss.
pub async fn delete_article_cascade(pool: &SqlitePool, id: i64) -> Result<String, StoreError> {
    let mut tx = pool.begin().await?;

    let slug: Option<String> = sqlx::query_scalar("SELECT slug FROM articles WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let slug = slug.ok_or(StoreError::NotFound(id))?;

    sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM article_entities WHERE article_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM article_relations WHERE article_id = ? OR related_article_id = ?")
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM articles WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(slug)
}

// ============ Scans ============

/// Id of the committed article that owns a slug, if any. Used to guard the
/// ingest compensation against deleting another article's document unit.
pub async fn slug_owner(pool: &SqlitePool, slug: &str) -> Result<Option<i64>, StoreError> {
    let id = sqlx::query_scalar("SELECT id FROM articles WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

pub async fn article_ids(pool: &SqlitePool) -> Result<Vec<i64>, StoreError> {
    let ids = sqlx::query_scalar("SELECT id FROM articles ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

pub async fn ids_and_slugs(pool: &SqlitePool) -> Result<Vec<(i64, String)>, StoreError> {
    let rows = sqlx::query("SELECT id, slug FROM articles ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| (row.get("id"), row.get("slug")))
        .collect())
}

/// Articles flagged for the background embedding retry sweep.
pub async fn pending_embeddings(pool: &SqlitePool) -> Result<Vec<(i64, String)>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, slug FROM articles WHERE embedding_pending = 1 ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|row| (row.get("id"), row.get("slug")))
        .collect())
}

/// Row view consumed by the decay engine.
#[derive(Debug, Clone)]
pub struct DecayRow {
    pub id: i64,
    pub rating: Option<Rating>,
    pub ingested_at: i64,
    pub last_opened_at: Option<i64>,
    pub is_vip: bool,
}

/// Decay view of a single article.
pub async fn decay_row(pool: &SqlitePool, id: i64) -> Result<DecayRow, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT a.id, a.rating, a.ingested_at, a.last_opened_at, s.is_vip
        FROM articles a
        JOIN sources s ON a.source_id = s.id
        WHERE a.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound(id))?;

    Ok(DecayRow {
        id: row.get("id"),
        rating: parse_rating(row.get("rating")),
        ingested_at: row.get("ingested_at"),
        last_opened_at: row.get("last_opened_at"),
        is_vip: row.get("is_vip"),
    })
}

pub async fn decay_rows(pool: &SqlitePool) -> Result<Vec<DecayRow>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT a.id, a.rating, a.ingested_at, a.last_opened_at, s.is_vip
        FROM articles a
        JOIN sources s ON a.source_id = s.id
        ORDER BY a.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| DecayRow {
            id: row.get("id"),
            rating: parse_rating(row.get("rating")),
            ingested_at: row.get("ingested_at"),
            last_opened_at: row.get("last_opened_at"),
            is_vip: row.get("is_vip"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use tempfile::TempDir;

    async fn open_pool() -> (TempDir, SqlitePool) {
        let tmp = TempDir::new().unwrap();
        let pool = crate::db::connect(&tmp.path().join("meta.sqlite"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, pool)
    }

    fn new_article(source_id: i64, n: u32) -> NewArticle {
        NewArticle {
            source_id,
            title: format!("Article {n}"),
            author: None,
            url: format!("https://example.com/{n}"),
            slug: format!("2026-01-01_article-{n}"),
            summary: None,
            word_count: 500,
            reading_time_min: 2,
            published_at: None,
            ingested_at: 1_770_000_000 + i64::from(n),
            embedding_pending: false,
        }
    }

    #[tokio::test]
    async fn test_source_resolution_is_stable() {
        let (_tmp, pool) = open_pool().await;
        let a = get_or_create_source(&pool, SourceKind::Web, "example.com", Some("example.com"), None)
            .await
            .unwrap();
        let b = get_or_create_source(&pool, SourceKind::Web, "example.com", Some("example.com"), None)
            .await
            .unwrap();
        assert_eq!(a, b);

        // Same identity under a different kind is a different source
        let c = get_or_create_source(&pool, SourceKind::Feed, "example.com", Some("example.com"), None)
            .await
            .unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_duplicate_url_maps_to_duplicate_key() {
        let (_tmp, pool) = open_pool().await;
        let source = get_or_create_source(&pool, SourceKind::Web, "e.com", Some("e.com"), None)
            .await
            .unwrap();

        let mut first = new_article(source, 1);
        create_article(&pool, &first, &[], &[]).await.unwrap();

        first.slug = "2026-01-01_article-1-2".to_string();
        let err = create_article(&pool, &first, &[], &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));
    }

    #[tokio::test]
    async fn test_email_duplicate_title_maps_to_duplicate_key() {
        let (_tmp, pool) = open_pool().await;
        let source = get_or_create_source(
            &pool,
            SourceKind::Email,
            "Weekly",
            None,
            Some("news@weekly.io"),
        )
        .await
        .unwrap();

        let mut article = new_article(source, 1);
        article.url = String::new();
        create_article(&pool, &article, &[], &[]).await.unwrap();

        article.slug = "other-slug".to_string();
        let err = create_article(&pool, &article, &[], &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));
    }

    #[tokio::test]
    async fn test_tags_and_entities_round_trip() {
        let (_tmp, pool) = open_pool().await;
        let source = get_or_create_source(&pool, SourceKind::Web, "e.com", Some("e.com"), None)
            .await
            .unwrap();

        let tags = vec!["rust".to_string(), "databases".to_string()];
        let entities = vec![Entity {
            name: "SQLite".to_string(),
            kind: "product".to_string(),
        }];
        let id = create_article(&pool, &new_article(source, 1), &tags, &entities)
            .await
            .unwrap();

        let article = get_article(&pool, id).await.unwrap();
        assert_eq!(article.tags, vec!["databases", "rust"]);
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let (_tmp, pool) = open_pool().await;
        let source = get_or_create_source(&pool, SourceKind::Web, "e.com", Some("e.com"), None)
            .await
            .unwrap();

        for n in 1..=5 {
            let tags = if n % 2 == 0 {
                vec!["even".to_string()]
            } else {
                vec![]
            };
            create_article(&pool, &new_article(source, n), &tags, &[])
                .await
                .unwrap();
        }

        let (rows, info) = list_articles(
            &pool,
            &ArticleFilters::default(),
            Page {
                page: 1,
                per_page: 2,
            },
            0.1,
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(info.total, 5);
        assert_eq!(info.total_pages, 3);
        // Newest ingested first
        assert_eq!(rows[0].title, "Article 5");

        let filters = ArticleFilters {
            tag: Some("even".to_string()),
            ..ArticleFilters::default()
        };
        let (rows, info) = list_articles(&pool, &filters, Page::default(), 0.1)
            .await
            .unwrap();
        assert_eq!(info.total, 2);
        assert!(rows.iter().all(|r| r.tags.contains(&"even".to_string())));

        let filters = ArticleFilters {
            text: Some("article 3".to_string()),
            ..ArticleFilters::default()
        };
        let (_, info) = list_articles(&pool, &filters, Page::default(), 0.1)
            .await
            .unwrap();
        assert_eq!(info.total, 1);
    }

    #[tokio::test]
    async fn test_decay_threshold_filter() {
        let (_tmp, pool) = open_pool().await;
        let source = get_or_create_source(&pool, SourceKind::Web, "e.com", Some("e.com"), None)
            .await
            .unwrap();

        let faded = create_article(&pool, &new_article(source, 1), &[], &[])
            .await
            .unwrap();
        let fresh = create_article(&pool, &new_article(source, 2), &[], &[])
            .await
            .unwrap();
        set_relevance_weight(&pool, faded, 0.05).await.unwrap();
        set_relevance_weight(&pool, fresh, 0.12).await.unwrap();

        let (rows, _) = list_articles(&pool, &ArticleFilters::visible(), Page::default(), 0.1)
            .await
            .unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![fresh]);

        let (rows, _) = list_articles(&pool, &ArticleFilters::default(), Page::default(), 0.1)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_mark_read_records_engagement() {
        let (_tmp, pool) = open_pool().await;
        let source = get_or_create_source(&pool, SourceKind::Web, "e.com", Some("e.com"), None)
            .await
            .unwrap();
        let id = create_article(&pool, &new_article(source, 1), &[], &[])
            .await
            .unwrap();

        let minutes = mark_read(&pool, id, 1_780_000_000).await.unwrap();
        assert_eq!(minutes, 2);
        mark_read(&pool, id, 1_780_000_100).await.unwrap();

        let article = get_article(&pool, id).await.unwrap();
        assert!(article.is_read);
        assert_eq!(article.opened_count, 2);
        assert_eq!(article.last_opened_at, Some(1_780_000_100));
    }

    #[tokio::test]
    async fn test_mutations_on_missing_article() {
        let (_tmp, pool) = open_pool().await;
        assert!(matches!(
            update_rating(&pool, 42, Some(Rating::Like)).await,
            Err(StoreError::NotFound(42))
        ));
        assert!(matches!(
            set_tier(&pool, 42, Some(Tier::MustRead)).await,
            Err(StoreError::NotFound(42))
        ));
        assert!(matches!(
            mark_read(&pool, 42, 0).await,
            Err(StoreError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_slug_owner() {
        let (_tmp, pool) = open_pool().await;
        let source = get_or_create_source(&pool, SourceKind::Web, "e.com", Some("e.com"), None)
            .await
            .unwrap();
        let id = create_article(&pool, &new_article(source, 1), &[], &[])
            .await
            .unwrap();

        assert_eq!(
            slug_owner(&pool, "2026-01-01_article-1").await.unwrap(),
            Some(id)
        );
        assert_eq!(slug_owner(&pool, "never-committed").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_decay_row_single_article() {
        let (_tmp, pool) = open_pool().await;
        let source = get_or_create_source(&pool, SourceKind::Web, "e.com", Some("e.com"), None)
            .await
            .unwrap();
        let id = create_article(&pool, &new_article(source, 1), &[], &[])
            .await
            .unwrap();
        update_rating(&pool, id, Some(Rating::Dislike)).await.unwrap();
        mark_read(&pool, id, 1_780_000_000).await.unwrap();

        let row = decay_row(&pool, id).await.unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.rating, Some(Rating::Dislike));
        assert_eq!(row.ingested_at, 1_770_000_001);
        assert_eq!(row.last_opened_at, Some(1_780_000_000));
        assert!(!row.is_vip);

        assert!(matches!(
            decay_row(&pool, 999).await,
            Err(StoreError::NotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_replace_relations_drops_stale_edges() {
        let (_tmp, pool) = open_pool().await;
        let source = get_or_create_source(&pool, SourceKind::Web, "e.com", Some("e.com"), None)
            .await
            .unwrap();
        let a = create_article(&pool, &new_article(source, 1), &[], &[])
            .await
            .unwrap();
        let b = create_article(&pool, &new_article(source, 2), &[], &[])
            .await
            .unwrap();
        let c = create_article(&pool, &new_article(source, 3), &[], &[])
            .await
            .unwrap();

        replace_relations(
            &pool,
            a,
            &[(b, 0.9, Some("note".to_string())), (c, 0.5, None)],
        )
        .await
        .unwrap();
        replace_relations(&pool, a, &[(b, 0.8, None)]).await.unwrap();

        let related = get_related(&pool, a).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].related_article_id, b);
        assert!((related[0].similarity_score - 0.8).abs() < 1e-9);
        assert!(related[0].connection_note.is_none());
    }

    #[tokio::test]
    async fn test_cascade_removes_junctions_and_edges() {
        let (_tmp, pool) = open_pool().await;
        let source = get_or_create_source(&pool, SourceKind::Web, "e.com", Some("e.com"), None)
            .await
            .unwrap();
        let tags = vec!["rust".to_string()];
        let a = create_article(&pool, &new_article(source, 1), &tags, &[])
            .await
            .unwrap();
        let b = create_article(&pool, &new_article(source, 2), &[], &[])
            .await
            .unwrap();
        upsert_relation(&pool, a, b, 0.7, None).await.unwrap();
        upsert_relation(&pool, b, a, 0.7, None).await.unwrap();

        let slug = delete_article_cascade(&pool, a).await.unwrap();
        assert_eq!(slug, "2026-01-01_article-1");

        assert!(matches!(
            get_article(&pool, a).await,
            Err(StoreError::NotFound(_))
        ));
        // Incoming edge from the surviving article is gone too
        assert!(get_related(&pool, b).await.unwrap().is_empty());

        let orphan_tags: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM article_tags WHERE article_id = ?")
                .bind(a)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(orphan_tags, 0);
    }
}
