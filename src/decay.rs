//! Relevance decay: unengaged articles fade out of listings over time.
//!
//! The weight function is pure so the full recalculation is deterministic
//! for a fixed clock. Positive ratings grant permanent immunity; everything
//! else holds at 1.0 through a grace window and then decays exponentially,
//! floored at a minimum so a weight never reaches zero.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::DecayConfig;
use crate::error::StoreError;
use crate::metastore::{self, DecayRow};
use crate::models::{DecayReport, Rating};

const SECS_PER_DAY: f64 = 86_400.0;

/// Weight floor. A decayed article stays addressable, just buried.
pub const MIN_WEIGHT: f64 = 0.01;

/// Compute the relevance weight for one article.
///
/// `elapsed_days` counts from the later of ingestion and last engagement, so
/// opening an article restarts its grace window.
pub fn compute_weight(
    rating: Option<Rating>,
    is_vip: bool,
    elapsed_days: f64,
    config: &DecayConfig,
) -> f64 {
    if rating.is_some_and(|r| r.is_positive()) {
        return 1.0;
    }
    if elapsed_days <= config.grace_days {
        return 1.0;
    }

    let rate = match rating {
        Some(Rating::Dislike) => config.rate_disliked,
        _ if is_vip => config.rate_vip,
        _ => config.rate_default,
    };

    let decaying_days = elapsed_days - config.grace_days;
    rate.powf(decaying_days).clamp(MIN_WEIGHT, 1.0)
}

fn elapsed_days(row: &DecayRow, now: i64) -> f64 {
    let anchor = row.last_opened_at.map_or(row.ingested_at, |opened| {
        opened.max(row.ingested_at)
    });
    ((now - anchor) as f64 / SECS_PER_DAY).max(0.0)
}

/// Recompute every article's weight against the clock `now` (unix seconds).
/// A failing row is logged and counted in `skipped`; the sweep always
/// finishes the batch. Safe to run repeatedly: the function depends only on
/// stored state and the clock.
pub async fn recalculate_all(
    pool: &SqlitePool,
    config: &DecayConfig,
    now: i64,
) -> Result<DecayReport> {
    let rows = metastore::decay_rows(pool).await?;
    Ok(recalculate_rows(pool, config, now, &rows).await)
}

async fn recalculate_rows(
    pool: &SqlitePool,
    config: &DecayConfig,
    now: i64,
    rows: &[DecayRow],
) -> DecayReport {
    let mut report = DecayReport {
        total: rows.len(),
        ..DecayReport::default()
    };

    for row in rows {
        let immune = row.rating.is_some_and(|r| r.is_positive());
        let weight = compute_weight(row.rating, row.is_vip, elapsed_days(row, now), config);

        if immune {
            report.immune += 1;
        }
        if weight < config.threshold {
            report.below_threshold += 1;
        }

        match apply_weight(pool, row.id, weight).await {
            Ok(true) => report.updated += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(id = row.id, error = %e, "decay update failed, continuing sweep");
                report.skipped += 1;
            }
        }
    }

    info!(
        total = report.total,
        updated = report.updated,
        immune = report.immune,
        skipped = report.skipped,
        below_threshold = report.below_threshold,
        "decay recalculation complete"
    );
    report
}

/// Write the weight if it changed. Returns whether a write happened.
async fn apply_weight(pool: &SqlitePool, id: i64, weight: f64) -> Result<bool, StoreError> {
    let current: f64 = sqlx::query_scalar("SELECT relevance_weight FROM articles WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if (current - weight).abs() < 1e-9 {
        return Ok(false);
    }
    metastore::set_relevance_weight(pool, id, weight).await?;
    Ok(true)
}
