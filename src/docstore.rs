//! Document store: one markdown unit per article under the library root.
//!
//! A unit is TOML front matter between `+++` fences followed by the body
//! text. Writes go through a temp file and an atomic rename, so a unit is
//! either fully present or not present at all — never half-written. A read
//! reproduces exactly the attributes and body of the most recent write.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-process sequence for temp file names, so parallel writers targeting
/// the same slug never share a temp path.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Structured attributes stored in a unit's front matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAttrs {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub source: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<i64>,
    pub ingested_at: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    pub word_count: i64,
    pub reading_time_min: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unit_path(&self, slug: &str) -> PathBuf {
        self.root.join(format!("{slug}.md"))
    }

    /// Write a unit, replacing any existing unit with the same slug.
    /// All-or-nothing: the content lands in a temp file first and is renamed
    /// into place, so a failure leaves either the old unit or nothing.
    pub fn write(&self, slug: &str, attrs: &DocumentAttrs, body: &str) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))?;

        let front = toml::to_string(attrs).context("Failed to serialize document attributes")?;
        let content = format!("+++\n{front}+++\n\n{body}");

        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self.root.join(format!(".{slug}.{seq}.md.tmp"));
        let path = self.unit_path(slug);

        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("Failed to move unit into {}", path.display()));
        }

        Ok(())
    }

    /// Read a unit back as (attributes, body).
    pub fn read(&self, slug: &str) -> Result<(DocumentAttrs, String)> {
        let path = self.unit_path(slug);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_unit(&content).with_context(|| format!("Malformed unit: {}", path.display()))
    }

    /// Remove a unit. Removing a unit that does not exist is not an error —
    /// deletion is used by best-effort cascades and the reconcile sweep.
    pub fn delete(&self, slug: &str) -> Result<()> {
        match std::fs::remove_file(self.unit_path(slug)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, slug: &str) -> bool {
        self.unit_path(slug).exists()
    }

    /// All slugs currently on disk. Used by the reconcile sweep.
    pub fn slugs(&self) -> Result<Vec<String>> {
        let mut slugs = Vec::new();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(slugs),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".md") {
                if !stem.starts_with('.') {
                    slugs.push(stem.to_string());
                }
            }
        }
        Ok(slugs)
    }

    /// Resolve a slug collision by probing existing units: `base`, `base-2`,
    /// `base-3`, … deterministically.
    pub fn unique_slug(&self, base: &str) -> String {
        if !self.exists(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.exists(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn parse_unit(content: &str) -> Result<(DocumentAttrs, String)> {
    let Some(rest) = content.strip_prefix("+++\n") else {
        bail!("missing front matter opening fence");
    };
    let Some(end) = rest.find("\n+++\n") else {
        bail!("missing front matter closing fence");
    };
    let front = &rest[..end + 1];
    let attrs: DocumentAttrs = toml::from_str(front)?;
    let body = &rest[end + "\n+++\n".len()..];
    // One blank separator line is part of the format, not the body.
    let body = body.strip_prefix('\n').unwrap_or(body);
    Ok((attrs, body.to_string()))
}

/// Derive a filename-safe slug from a title: lowercased, non-alphanumeric
/// runs collapsed to `-`, truncated to 80 characters.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let mut slug = slug.trim_matches('-').to_string();
    if slug.len() > 80 {
        slug.truncate(80);
        slug = slug.trim_end_matches('-').to_string();
    }
    slug
}

/// Slug base: `{YYYY-MM-DD}_{slugified-title}`, dated by publication.
pub fn slug_base(title: &str, published: DateTime<Utc>) -> String {
    format!("{}_{}", published.format("%Y-%m-%d"), slugify(title))
}
