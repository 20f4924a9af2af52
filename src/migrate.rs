use anyhow::Result;
use sqlx::SqlitePool;

/// Create the metadata store schema. Idempotent; safe to run on every open.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Sources: web domains and newsletter senders
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            domain TEXT,
            email_sender TEXT,
            kind TEXT NOT NULL,
            is_vip INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_sources_domain
         ON sources(kind, domain) WHERE domain IS NOT NULL",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_sources_sender
         ON sources(kind, email_sender) WHERE email_sender IS NOT NULL",
    )
    .execute(pool)
    .await?;

    // Articles: core metadata, one row per archived item
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL REFERENCES sources(id),
            title TEXT NOT NULL,
            author TEXT,
            url TEXT NOT NULL DEFAULT '',
            slug TEXT UNIQUE NOT NULL,
            summary TEXT,
            word_count INTEGER NOT NULL,
            reading_time_min INTEGER NOT NULL,
            published_at INTEGER,
            ingested_at INTEGER NOT NULL,
            last_opened_at INTEGER,
            is_read INTEGER NOT NULL DEFAULT 0,
            opened_count INTEGER NOT NULL DEFAULT 0,
            rating TEXT,
            tier TEXT,
            relevance_weight REAL NOT NULL DEFAULT 1.0,
            embedding_pending INTEGER NOT NULL DEFAULT 0,
            analysis TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Authoritative dedup guards. The resolver's pre-check is advisory; these
    // indexes decide races between concurrent ingests.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_origin_url
         ON articles(source_id, url) WHERE url != ''",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_origin_title
         ON articles(source_id, title) WHERE url = ''",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_articles_ingested_at ON articles(ingested_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_weight ON articles(relevance_weight)")
        .execute(pool)
        .await?;

    // Tags and entities with their junction tables
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS article_tags (
            article_id INTEGER NOT NULL REFERENCES articles(id),
            tag_id INTEGER NOT NULL REFERENCES tags(id),
            PRIMARY KEY (article_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            UNIQUE(name, entity_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS article_entities (
            article_id INTEGER NOT NULL REFERENCES articles(id),
            entity_id INTEGER NOT NULL REFERENCES entities(id),
            PRIMARY KEY (article_id, entity_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Directed similarity edges, keyed by the pair so recomputation upserts
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS article_relations (
            article_id INTEGER NOT NULL REFERENCES articles(id),
            related_article_id INTEGER NOT NULL REFERENCES articles(id),
            similarity_score REAL NOT NULL,
            connection_note TEXT,
            PRIMARY KEY (article_id, related_article_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Daily reading stats
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reading_stats (
            date TEXT PRIMARY KEY,
            articles_saved INTEGER NOT NULL DEFAULT 0,
            articles_read INTEGER NOT NULL DEFAULT 0,
            articles_rated INTEGER NOT NULL DEFAULT 0,
            total_reading_time_min INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
