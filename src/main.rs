//! # Tiro CLI (`tiro`)
//!
//! The `tiro` binary is the primary interface to a Tiro library. It provides
//! commands for library initialization, ingesting extracted content units,
//! browsing and triaging the archive, relevance decay, relation computation,
//! and store reconciliation.
//!
//! ## Usage
//!
//! ```bash
//! tiro --config ./tiro.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tiro init` | Create the library directory, databases, and schema |
//! | `tiro ingest <file>` | Ingest one extracted content unit (JSON) |
//! | `tiro list` | List articles with filters and pagination |
//! | `tiro get <id>` | Print one article with its full body |
//! | `tiro rate <id> <rating>` | Rate an article (dislike, like, love) |
//! | `tiro read <id>` | Mark an article read |
//! | `tiro tier <id> <tier>` | Set the triage tier |
//! | `tiro related <id>` | Show stored similarity relations |
//! | `tiro delete <id>` | Delete an article from all three stores |
//! | `tiro decay` | Recalculate relevance weights |
//! | `tiro relations` | Recompute similarity edges |
//! | `tiro embed pending` | Retry missing embeddings |
//! | `tiro reconcile` | Remove orphans and report missing documents |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tiro::archive::Archive;
use tiro::models::{ArticleFilters, ContentUnit, Page, Rating, Tier};
use tiro::{config, ingest, reconcile};

/// Tiro — a local-first personal content archive with relevance decay and
/// similarity relations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file falls back to defaults with the library under
/// `./tiro-library`.
#[derive(Parser)]
#[command(
    name = "tiro",
    about = "Tiro — a local-first personal content archive with relevance decay and similarity relations",
    version,
    long_about = "Tiro ingests extracted web articles and email newsletters into a three-store \
    library: markdown document units, a relational metadata store, and a vector index. Articles \
    decay out of view unless engaged with, and semantically similar articles are linked \
    automatically."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./tiro.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the library.
    ///
    /// Creates the library directory, the metadata and vector databases, and
    /// all required tables. Idempotent — running it multiple times is safe.
    Init,

    /// Ingest one extracted content unit.
    ///
    /// Reads a JSON content unit (title, body, url or email_sender, optional
    /// author and published_at) from a file, or from stdin when the path is
    /// `-`. Prints the new article id, or the existing id when the unit is a
    /// duplicate.
    Ingest {
        /// Path to the JSON content unit, or `-` for stdin.
        file: PathBuf,

        /// Exit without waiting for the background relation computation.
        #[arg(long)]
        detach_relations: bool,
    },

    /// List articles.
    ///
    /// Filters are conjunctive. Decayed articles (below the configured
    /// weight threshold) are hidden unless `--include-decayed` is given.
    List {
        /// Filter by triage tier: `must-read`, `summary-enough`, `discard`.
        #[arg(long)]
        tier: Option<Tier>,

        /// Filter by source id.
        #[arg(long)]
        source: Option<i64>,

        /// Filter by tag.
        #[arg(long)]
        tag: Option<String>,

        /// Filter by rating: `dislike`, `like`, `love`.
        #[arg(long)]
        rating: Option<Rating>,

        /// Only read (`--read`) or only unread (`--read false`) articles.
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        read: Option<bool>,

        /// Only articles ingested on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only articles ingested on or before this date (YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,

        /// Case-insensitive substring match over title and summary.
        #[arg(long)]
        text: Option<String>,

        /// Include articles that have decayed below the threshold.
        #[arg(long)]
        include_decayed: bool,

        /// Page number (1-based).
        #[arg(long, default_value_t = 1)]
        page: i64,

        /// Results per page.
        #[arg(long, default_value_t = 50)]
        per_page: i64,
    },

    /// Print one article: metadata, summary, and the full body.
    Get {
        /// Article id.
        id: i64,
    },

    /// Rate an article. Positive ratings grant permanent decay immunity.
    Rate {
        /// Article id.
        id: i64,

        /// `dislike`, `like`, or `love`; omit `--clear` to set.
        rating: Option<Rating>,

        /// Clear the rating instead of setting one.
        #[arg(long)]
        clear: bool,
    },

    /// Mark an article read. Engagement restarts the decay grace window.
    Read {
        /// Article id.
        id: i64,
    },

    /// Set or clear the triage tier.
    Tier {
        /// Article id.
        id: i64,

        /// `must-read`, `summary-enough`, or `discard`.
        tier: Option<Tier>,

        /// Clear the tier instead of setting one.
        #[arg(long)]
        clear: bool,
    },

    /// Show stored similarity relations for an article.
    Related {
        /// Article id.
        id: i64,
    },

    /// Delete an article from all three stores.
    Delete {
        /// Article id.
        id: i64,
    },

    /// Recalculate relevance weights for every article.
    Decay,

    /// Recompute similarity edges.
    ///
    /// Without `--id`, recomputes edges for every article with a vector.
    Relations {
        /// Recompute for a single article only.
        #[arg(long)]
        id: Option<i64>,
    },

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Converge the three stores.
    ///
    /// Removes vectors and document units with no metadata row, and reports
    /// metadata rows whose document unit is missing.
    Reconcile,
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Embed articles flagged as missing their vector.
    Pending {
        /// Maximum number of articles to embed in this run.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tiro=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let archive = Archive::open(cfg).await?;

    match cli.command {
        Commands::Init => {
            println!(
                "Library initialized at {}",
                archive.config.library.root.display()
            );
        }
        Commands::Ingest {
            file,
            detach_relations,
        } => {
            let raw = if file.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                std::fs::read_to_string(&file)?
            };
            let unit: ContentUnit = serde_json::from_str(&raw)?;

            match ingest::ingest(&archive, unit).await {
                Ok(receipt) => {
                    println!("Ingested article {} ({})", receipt.article_id, receipt.slug);
                    if !detach_relations {
                        receipt.relations.wait().await;
                    }
                }
                Err(tiro::error::IngestError::Duplicate { existing_id }) => {
                    println!("Duplicate of existing article {existing_id}");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::List {
            tier,
            source,
            tag,
            rating,
            read,
            since,
            until,
            text,
            include_decayed,
            page,
            per_page,
        } => {
            let filters = ArticleFilters {
                tier,
                source_id: source,
                tag,
                rating,
                is_read: read,
                since: since.as_deref().map(parse_day_start).transpose()?,
                until: until.as_deref().map(parse_day_end).transpose()?,
                text,
                include_decayed,
            };
            let (rows, info) = archive
                .list_articles(&filters, Page { page, per_page })
                .await?;

            for row in &rows {
                let marks = format!(
                    "{}{}{}",
                    if row.is_vip { "*" } else { "" },
                    if row.is_read { "r" } else { "" },
                    row.rating.map(|r| &r.as_str()[..1]).unwrap_or(""),
                );
                println!(
                    "{:>5}  [{:<3}] {}  ({}, {} min, w={:.2})",
                    row.id, marks, row.title, row.source_name, row.reading_time_min, row.relevance_weight
                );
            }
            println!(
                "\nPage {}/{} — {} article(s) total",
                info.page, info.total_pages, info.total
            );
        }
        Commands::Get { id } => {
            let article = archive.get_article(id).await?;
            println!("# {} (id {})", article.title, article.id);
            println!("Source: {} | URL: {}", article.source_name, article.url);
            if let Some(author) = &article.author {
                println!("Author: {author}");
            }
            if !article.tags.is_empty() {
                println!("Tags: {}", article.tags.join(", "));
            }
            if let Some(summary) = &article.summary {
                println!("\n{summary}");
            }
            println!("\n{}", article.content);
        }
        Commands::Rate { id, rating, clear } => {
            let rating = validate_set_or_clear(rating, clear, "rating")?;
            archive.rate(id, rating).await?;
            match rating {
                Some(r) => println!("Article {id} rated {}", r.as_str()),
                None => println!("Article {id} rating cleared"),
            }
        }
        Commands::Read { id } => {
            archive.mark_read(id).await?;
            println!("Article {id} marked read");
        }
        Commands::Tier { id, tier, clear } => {
            let tier = validate_set_or_clear(tier, clear, "tier")?;
            archive.set_tier(id, tier).await?;
            match tier {
                Some(t) => println!("Article {id} set to {}", t.as_str()),
                None => println!("Article {id} tier cleared"),
            }
        }
        Commands::Related { id } => {
            let related = archive.get_related(id).await?;
            if related.is_empty() {
                println!("No stored relations for article {id}");
            }
            for edge in &related {
                println!(
                    "{:>5}  {:.3}  {}",
                    edge.related_article_id, edge.similarity_score, edge.title
                );
                if let Some(note) = &edge.connection_note {
                    println!("       ↳ {note}");
                }
            }
        }
        Commands::Delete { id } => {
            archive.delete_article(id).await?;
            println!("Article {id} deleted");
        }
        Commands::Decay => {
            let now = chrono::Utc::now().timestamp();
            let report = archive.recalculate_decay(now).await?;
            println!(
                "Decay: {} article(s), {} updated, {} immune, {} below threshold",
                report.total, report.updated, report.immune, report.below_threshold
            );
        }
        Commands::Relations { id } => match id {
            Some(id) => {
                let edges = archive.recompute_relations_for(id).await?;
                println!("Article {id}: {edges} edge(s) stored");
            }
            None => {
                let (articles, edges) = archive.recompute_relations().await?;
                println!("Relations: {articles} article(s), {edges} edge(s) stored");
            }
        },
        Commands::Embed { action } => match action {
            EmbedAction::Pending { limit } => {
                let (flagged, embedded) = ingest::embed_pending(&archive, limit).await?;
                println!("Embeddings: {embedded}/{flagged} pending article(s) embedded");
            }
        },
        Commands::Reconcile => {
            let report = reconcile::reconcile(&archive).await?;
            println!(
                "Reconcile: {} vector orphan(s) removed, {} document orphan(s) removed",
                report.vector_orphans_removed, report.document_orphans_removed
            );
            if !report.missing_documents.is_empty() {
                println!(
                    "Missing document units for article(s): {:?}",
                    report.missing_documents
                );
            }
        }
    }

    Ok(())
}

fn validate_set_or_clear<T>(value: Option<T>, clear: bool, what: &str) -> anyhow::Result<Option<T>> {
    match (value, clear) {
        (Some(v), false) => Ok(Some(v)),
        (None, true) => Ok(None),
        (Some(_), true) => anyhow::bail!("cannot both set and --clear a {what}"),
        (None, false) => anyhow::bail!("provide a {what} or pass --clear"),
    }
}

/// First second of the given day (UTC), for inclusive `--since` bounds.
fn parse_day_start(s: &str) -> anyhow::Result<i64> {
    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp())
}

/// Last second of the given day (UTC), for inclusive `--until` bounds.
fn parse_day_end(s: &str) -> anyhow::Result<i64> {
    Ok(parse_day_start(s)? + 86_399)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_flag_accepts_bare_and_explicit_forms() {
        for (args, expected) in [
            (vec!["tiro", "list"], None),
            (vec!["tiro", "list", "--read"], Some(true)),
            (vec!["tiro", "list", "--read", "true"], Some(true)),
            (vec!["tiro", "list", "--read", "false"], Some(false)),
        ] {
            let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
            let Commands::List { read, .. } = cli.command else {
                panic!("expected list command");
            };
            assert_eq!(read, expected, "for {args:?}");
        }
    }

    #[test]
    fn test_list_accepts_date_range() {
        let cli = Cli::try_parse_from([
            "tiro", "list", "--since", "2026-01-01", "--until", "2026-01-31",
        ])
        .unwrap();
        let Commands::List { since, until, .. } = cli.command else {
            panic!("expected list command");
        };
        assert_eq!(since.as_deref(), Some("2026-01-01"));
        assert_eq!(until.as_deref(), Some("2026-01-31"));
    }

    #[test]
    fn test_day_bounds() {
        assert_eq!(parse_day_start("1970-01-01").unwrap(), 0);
        assert_eq!(parse_day_end("1970-01-01").unwrap(), 86_399);
        assert_eq!(parse_day_start("2026-01-01").unwrap(), 1_767_225_600);
        assert!(parse_day_start("01/02/2026").is_err());
        assert!(parse_day_start("2026-13-01").is_err());
    }
}
