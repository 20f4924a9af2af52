use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub decay: DecayConfig,
    #[serde(default)]
    pub relations: RelationsConfig,
}

impl Config {
    /// Root of the article markdown files (document store).
    pub fn articles_dir(&self) -> PathBuf {
        self.library.root.join("articles")
    }

    /// Metadata store database file.
    pub fn db_path(&self) -> PathBuf {
        self.library.root.join("tiro.sqlite")
    }

    /// Vector index database file (independent of the metadata store).
    pub fn vectors_path(&self) -> PathBuf {
        self.library.root.join("vectors.sqlite")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LibraryConfig {
    #[serde(default = "default_library_root")]
    pub root: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: default_library_root(),
        }
    }
}

fn default_library_root() -> PathBuf {
    PathBuf::from("./tiro-library")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `disabled`, `openai`, or `ollama`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Endpoint override (defaults per provider).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    /// `disabled` or `openai` (any OpenAI-compatible chat endpoint).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EnrichmentConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DecayConfig {
    #[serde(default = "default_rate_default")]
    pub rate_default: f64,
    #[serde(default = "default_rate_disliked")]
    pub rate_disliked: f64,
    #[serde(default = "default_rate_vip")]
    pub rate_vip: f64,
    /// Days after ingestion (or last engagement) with no decay.
    #[serde(default = "default_grace_days")]
    pub grace_days: f64,
    /// Listing with `include_decayed = false` hides rows below this weight.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            rate_default: default_rate_default(),
            rate_disliked: default_rate_disliked(),
            rate_vip: default_rate_vip(),
            grace_days: default_grace_days(),
            threshold: default_threshold(),
        }
    }
}

fn default_rate_default() -> f64 {
    0.95
}
fn default_rate_disliked() -> f64 {
    0.90
}
fn default_rate_vip() -> f64 {
    0.98
}
fn default_grace_days() -> f64 {
    7.0
}
fn default_threshold() -> f64 {
    0.1
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelationsConfig {
    /// Neighbors stored per article.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Top edges (by score) annotated with a connection note.
    #[serde(default = "default_note_top_n")]
    pub note_top_n: usize,
}

impl Default for RelationsConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            note_top_n: default_note_top_n(),
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_note_top_n() -> usize {
    3
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

/// Load configuration from a TOML file. A missing file yields the defaults,
/// so a fresh checkout works without any setup.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    for (name, rate) in [
        ("decay.rate_default", config.decay.rate_default),
        ("decay.rate_disliked", config.decay.rate_disliked),
        ("decay.rate_vip", config.decay.rate_vip),
    ] {
        if !(0.0..=1.0).contains(&rate) || rate == 0.0 {
            anyhow::bail!("{} must be in (0.0, 1.0], got {}", name, rate);
        }
    }

    if !(0.0..1.0).contains(&config.decay.threshold) {
        anyhow::bail!(
            "decay.threshold must be in [0.0, 1.0), got {}",
            config.decay.threshold
        );
    }

    if config.decay.grace_days < 0.0 {
        anyhow::bail!("decay.grace_days must be >= 0");
    }

    if config.relations.k == 0 {
        anyhow::bail!("relations.k must be >= 1");
    }

    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        match config.embedding.provider.as_str() {
            "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }
    }

    if config.enrichment.is_enabled() {
        if config.enrichment.model.is_none() {
            anyhow::bail!(
                "enrichment.model must be specified when provider is '{}'",
                config.enrichment.provider
            );
        }
        if config.enrichment.provider != "openai" {
            anyhow::bail!(
                "Unknown enrichment provider: '{}'. Must be disabled or openai.",
                config.enrichment.provider
            );
        }
    }

    Ok(config)
}
