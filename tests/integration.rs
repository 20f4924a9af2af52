//! End-to-end tests over a real temporary library: ingestion, duplicate
//! handling, decay, relations, deletion, and reconciliation.

use tempfile::TempDir;

use tiro::archive::Archive;
use tiro::config::{Config, LibraryConfig};
use tiro::error::IngestError;
use tiro::ingest::{self, IngestReceipt};
use tiro::models::{ArticleFilters, ContentUnit, Page, Rating};
use tiro::{metastore, reconcile, relations};

fn test_config(root: &std::path::Path) -> Config {
    Config {
        library: LibraryConfig {
            root: root.to_path_buf(),
        },
        ..Config::default()
    }
}

async fn open_archive() -> (TempDir, Archive) {
    let tmp = TempDir::new().unwrap();
    let archive = Archive::open(test_config(tmp.path())).await.unwrap();
    (tmp, archive)
}

fn web_unit(title: &str, url: &str) -> ContentUnit {
    ContentUnit {
        title: title.to_string(),
        author: Some("Ada Lovelace".to_string()),
        body: "The quick brown fox jumps over the lazy dog. ".repeat(30),
        url: Some(url.to_string()),
        email_sender: None,
        published_at: Some(1_770_000_000),
    }
}

fn email_unit(title: &str, sender: &str) -> ContentUnit {
    ContentUnit {
        title: title.to_string(),
        author: None,
        body: "Newsletter body with enough words to count.".to_string(),
        url: None,
        email_sender: Some(sender.to_string()),
        published_at: None,
    }
}

async fn ingest_ok(archive: &Archive, unit: ContentUnit) -> IngestReceipt {
    let receipt = ingest::ingest(archive, unit).await.unwrap();
    receipt
}

fn markdown_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".md"))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_ingest_round_trip() {
    let (_tmp, archive) = open_archive().await;

    let receipt = ingest_ok(&archive, web_unit("Hello World", "https://example.com/hello")).await;
    receipt.relations.wait().await;

    let article = archive.get_article(receipt.article_id).await.unwrap();
    assert_eq!(article.title, "Hello World");
    assert_eq!(article.source_name, "example.com");
    assert_eq!(article.url, "https://example.com/hello");
    assert_eq!(article.author.as_deref(), Some("Ada Lovelace"));
    assert_eq!(article.word_count, 270);
    assert_eq!(article.reading_time_min, 2);
    assert!(article.content.contains("quick brown fox"));
    assert_eq!(article.relevance_weight, 1.0);
    assert!(!article.is_read);
    // With the provider disabled the article is flagged for the retry sweep
    assert!(article.embedding_pending);

    assert!(archive.docs.exists(&receipt.slug));
    assert!(receipt.slug.starts_with("2026-02-02_hello-world"));
}

#[tokio::test]
async fn test_ingest_rejects_invalid_units() {
    let (_tmp, archive) = open_archive().await;

    let mut no_title = web_unit("  ", "https://example.com/a");
    no_title.title = "  ".to_string();
    assert!(matches!(
        ingest::ingest(&archive, no_title).await,
        Err(IngestError::Extraction(_))
    ));

    let mut no_body = web_unit("Title", "https://example.com/a");
    no_body.body = "\n\n".to_string();
    assert!(matches!(
        ingest::ingest(&archive, no_body).await,
        Err(IngestError::Extraction(_))
    ));

    let mut no_origin = web_unit("Title", "");
    no_origin.url = None;
    assert!(matches!(
        ingest::ingest(&archive, no_origin).await,
        Err(IngestError::Extraction(_))
    ));

    // Nothing was written anywhere
    assert!(markdown_files(&archive.config.articles_dir()).is_empty());
}

#[tokio::test]
async fn test_duplicate_url_reports_existing_article() {
    let (_tmp, archive) = open_archive().await;

    let first = ingest_ok(&archive, web_unit("Post", "https://example.com/post")).await;
    let err = ingest::ingest(&archive, web_unit("Other Title", "https://example.com/post"))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Duplicate { existing_id } if existing_id == first.article_id));
    assert_eq!(markdown_files(&archive.config.articles_dir()).len(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_converges_on_one_article() {
    let (_tmp, archive) = open_archive().await;

    let unit = web_unit("Race", "https://example.com/race");
    let (a, b) = tokio::join!(
        ingest::ingest(&archive, unit.clone()),
        ingest::ingest(&archive, unit),
    );

    let (winner, loser) = match (a, b) {
        (Ok(receipt), Err(e)) => (receipt, e),
        (Err(e), Ok(receipt)) => (receipt, e),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert!(
        matches!(loser, IngestError::Duplicate { existing_id } if existing_id == winner.article_id)
    );

    // Exactly one document unit survives, and it is the winner's
    let files = markdown_files(&archive.config.articles_dir());
    assert_eq!(files, vec![format!("{}.md", winner.slug)]);
}

#[tokio::test]
async fn test_email_dedup_is_per_sender() {
    let (_tmp, archive) = open_archive().await;

    let first = ingest_ok(&archive, email_unit("Issue 42", "news@weekly.io")).await;

    let err = ingest::ingest(&archive, email_unit("Issue 42", "news@weekly.io"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Duplicate { existing_id } if existing_id == first.article_id));

    // Same title from a different sender is a distinct article
    let other = ingest_ok(&archive, email_unit("Issue 42", "digest@other.io")).await;
    assert_ne!(other.article_id, first.article_id);
}

#[tokio::test]
async fn test_same_title_same_day_gets_probed_slug() {
    let (_tmp, archive) = open_archive().await;

    let a = ingest_ok(&archive, web_unit("Hello World", "https://example.com/a")).await;
    let b = ingest_ok(&archive, web_unit("Hello World", "https://example.com/b")).await;

    assert_eq!(a.slug, "2026-02-02_hello-world");
    assert_eq!(b.slug, "2026-02-02_hello-world-2");
    assert_eq!(markdown_files(&archive.config.articles_dir()).len(), 2);
}

#[tokio::test]
async fn test_delete_removes_article_everywhere() {
    let (_tmp, archive) = open_archive().await;

    let a = ingest_ok(&archive, web_unit("Keep", "https://example.com/keep")).await;
    let b = ingest_ok(&archive, web_unit("Drop", "https://example.com/drop")).await;
    archive.vectors.upsert(b.article_id, &[1.0, 0.0]).await.unwrap();
    metastore::upsert_relation(&archive.meta, a.article_id, b.article_id, 0.9, None)
        .await
        .unwrap();

    archive.delete_article(b.article_id).await.unwrap();

    assert!(archive.get_article(b.article_id).await.is_err());
    assert!(!archive.docs.exists(&b.slug));
    assert_eq!(archive.vectors.get(b.article_id).await.unwrap(), None);
    assert!(archive.get_related(a.article_id).await.unwrap().is_empty());

    // The other article is untouched
    assert!(archive.get_article(a.article_id).await.is_ok());
}

#[tokio::test]
async fn test_decay_after_grace_window() {
    let (_tmp, archive) = open_archive().await;

    let receipt = ingest_ok(&archive, web_unit("Fades", "https://example.com/fades")).await;
    let article = archive.get_article(receipt.article_id).await.unwrap();

    // 10 days after ingestion: 3 decaying days past the 7-day grace window
    let now = article.ingested_at + 10 * 86_400;
    let report = archive.recalculate_decay(now).await.unwrap();
    assert_eq!(report.updated, 1);

    let article = archive.get_article(receipt.article_id).await.unwrap();
    assert!((article.relevance_weight - 0.95f64.powi(3)).abs() < 1e-9);
}

#[tokio::test]
async fn test_positive_rating_grants_immunity() {
    let (_tmp, archive) = open_archive().await;

    let receipt = ingest_ok(&archive, web_unit("Loved", "https://example.com/loved")).await;
    archive.rate(receipt.article_id, Some(Rating::Love)).await.unwrap();

    let article = archive.get_article(receipt.article_id).await.unwrap();
    let now = article.ingested_at + 400 * 86_400;
    let report = archive.recalculate_decay(now).await.unwrap();
    assert_eq!(report.immune, 1);

    let article = archive.get_article(receipt.article_id).await.unwrap();
    assert_eq!(article.relevance_weight, 1.0);
}

#[tokio::test]
async fn test_decay_is_idempotent_for_fixed_clock() {
    let (_tmp, archive) = open_archive().await;

    let receipt = ingest_ok(&archive, web_unit("Stable", "https://example.com/stable")).await;
    let article = archive.get_article(receipt.article_id).await.unwrap();
    let now = article.ingested_at + 30 * 86_400;

    let first = archive.recalculate_decay(now).await.unwrap();
    assert_eq!(first.updated, 1);

    let second = archive.recalculate_decay(now).await.unwrap();
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, 0);
}

#[tokio::test]
async fn test_reading_restores_decayed_weight() {
    let (_tmp, archive) = open_archive().await;

    let receipt = ingest_ok(&archive, web_unit("Revived", "https://example.com/revived")).await;
    let article = archive.get_article(receipt.article_id).await.unwrap();
    archive
        .recalculate_decay(article.ingested_at + 60 * 86_400)
        .await
        .unwrap();
    let decayed = archive.get_article(receipt.article_id).await.unwrap();
    assert!(decayed.relevance_weight < 0.1);

    archive.mark_read(receipt.article_id).await.unwrap();

    let revived = archive.get_article(receipt.article_id).await.unwrap();
    assert!(revived.is_read);
    assert_eq!(revived.relevance_weight, 1.0);
}

#[tokio::test]
async fn test_listing_hides_decayed_articles() {
    let (_tmp, archive) = open_archive().await;

    let faded = ingest_ok(&archive, web_unit("Faded", "https://example.com/faded")).await;
    let fresh = ingest_ok(&archive, web_unit("Fresh", "https://example.com/fresh")).await;
    metastore::set_relevance_weight(&archive.meta, faded.article_id, 0.05)
        .await
        .unwrap();
    metastore::set_relevance_weight(&archive.meta, fresh.article_id, 0.12)
        .await
        .unwrap();

    let (rows, _) = archive
        .list_articles(&ArticleFilters::visible(), Page::default())
        .await
        .unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![fresh.article_id]);

    // The unfiltered default view keeps decayed articles reachable
    let (rows, _) = archive
        .list_articles(&ArticleFilters::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_relation_edges_are_scored_and_bounded() {
    let (_tmp, archive) = open_archive().await;

    let mut ids = Vec::new();
    for n in 0..8 {
        let receipt = ingest_ok(
            &archive,
            web_unit(&format!("Article {n}"), &format!("https://example.com/{n}")),
        )
        .await;
        ids.push(receipt.article_id);
    }
    // Vectors at varying angles to article 0's [1, 0]
    archive.vectors.upsert(ids[0], &[1.0, 0.0]).await.unwrap();
    archive.vectors.upsert(ids[1], &[0.6, 0.8]).await.unwrap();
    for (offset, id) in ids[2..].iter().enumerate() {
        let angle = 0.3 + 0.2 * offset as f32;
        archive.vectors.upsert(*id, &[angle.cos(), angle.sin()]).await.unwrap();
    }

    let edges = archive.recompute_relations_for(ids[0]).await.unwrap();
    assert_eq!(edges, archive.config.relations.k);

    let related = archive.get_related(ids[0]).await.unwrap();
    assert_eq!(related.len(), archive.config.relations.k);

    // Scores are in [0, 1] and descending
    let mut prev = f64::INFINITY;
    for edge in &related {
        assert!((0.0..=1.0).contains(&edge.similarity_score));
        assert!(edge.similarity_score <= prev);
        prev = edge.similarity_score;
    }

    // cos([1,0], [0.6,0.8]) = 0.6, so similarity is 0.8
    let to_b = related
        .iter()
        .find(|e| e.related_article_id == ids[1])
        .unwrap();
    assert!((to_b.similarity_score - 0.8).abs() < 1e-6);

    // Edges are directed: computing 0's neighbors writes nothing for 1
    assert!(archive.get_related(ids[1]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_relations_skip_articles_without_vectors() {
    let (_tmp, archive) = open_archive().await;

    let receipt = ingest_ok(&archive, web_unit("Lonely", "https://example.com/lonely")).await;
    let edges = relations::compute_for_article(
        &archive.meta,
        &archive.vectors,
        &archive.config.relations,
        &archive.config.enrichment,
        receipt.article_id,
    )
    .await
    .unwrap();
    assert_eq!(edges, 0);
}

#[tokio::test]
async fn test_reconcile_removes_orphans_and_reports_missing() {
    let (_tmp, archive) = open_archive().await;

    let kept = ingest_ok(&archive, web_unit("Kept", "https://example.com/kept")).await;
    let gutted = ingest_ok(&archive, web_unit("Gutted", "https://example.com/gutted")).await;

    // Orphan vector with no metadata row
    archive.vectors.upsert(9_999, &[1.0, 0.0]).await.unwrap();
    // Orphan document unit with no metadata row
    std::fs::write(
        archive.config.articles_dir().join("2020-01-01_orphan.md"),
        "+++\ntitle = \"x\"\nsource = \"x\"\ningested_at = 0\nword_count = 1\nreading_time_min = 1\n+++\n\nbody",
    )
    .unwrap();
    // Metadata row whose document unit vanished
    std::fs::remove_file(
        archive
            .config
            .articles_dir()
            .join(format!("{}.md", gutted.slug)),
    )
    .unwrap();

    let report = reconcile::reconcile(&archive).await.unwrap();
    assert_eq!(report.vector_orphans_removed, 1);
    assert_eq!(report.document_orphans_removed, 1);
    assert_eq!(report.missing_documents, vec![gutted.article_id]);

    // The intact article and its document survived
    assert!(archive.docs.exists(&kept.slug));
    assert!(archive.get_article(kept.article_id).await.is_ok());

    // A second sweep finds nothing to remove
    let report = reconcile::reconcile(&archive).await.unwrap();
    assert_eq!(report.vector_orphans_removed, 0);
    assert_eq!(report.document_orphans_removed, 0);
}

#[tokio::test]
async fn test_stats_accumulate_daily() {
    let (_tmp, archive) = open_archive().await;

    let a = ingest_ok(&archive, web_unit("One", "https://example.com/1")).await;
    ingest_ok(&archive, web_unit("Two", "https://example.com/2")).await;
    archive.mark_read(a.article_id).await.unwrap();
    archive.rate(a.article_id, Some(Rating::Like)).await.unwrap();

    let row = sqlx::query_as::<_, (i64, i64, i64)>(
        "SELECT articles_saved, articles_read, articles_rated FROM reading_stats",
    )
    .fetch_one(&archive.meta)
    .await
    .unwrap();
    assert_eq!(row, (2, 1, 1));
}
