//! Reconciliation sweep: converge the three stores on the metadata store.
//!
//! The metadata store is ground truth. Vectors and document units with no
//! metadata row are orphans from interrupted ingests or best-effort deletes
//! and are removed. A metadata row whose document unit is missing is the
//! opposite case: the truth says the article exists, so it is reported, not
//! deleted.

use anyhow::Result;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::archive::Archive;
use crate::metastore;
use crate::models::ReconcileReport;

pub async fn reconcile(archive: &Archive) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    let rows = metastore::ids_and_slugs(&archive.meta).await?;
    let known_ids: HashSet<i64> = rows.iter().map(|(id, _)| *id).collect();
    let known_slugs: HashSet<&str> = rows.iter().map(|(_, slug)| slug.as_str()).collect();

    for vector_id in archive.vectors.ids().await? {
        if !known_ids.contains(&vector_id) {
            archive.vectors.delete(vector_id).await?;
            report.vector_orphans_removed += 1;
        }
    }

    for slug in archive.docs.slugs()? {
        if !known_slugs.contains(slug.as_str()) {
            archive.docs.delete(&slug)?;
            report.document_orphans_removed += 1;
        }
    }

    for (id, slug) in &rows {
        if !archive.docs.exists(slug) {
            warn!(id, slug = %slug, "article has no document unit");
            report.missing_documents.push(*id);
        }
    }

    info!(
        vector_orphans = report.vector_orphans_removed,
        document_orphans = report.document_orphans_removed,
        missing_documents = report.missing_documents.len(),
        "reconcile sweep complete"
    );
    Ok(report)
}
