//! Enrichment collaborators: metadata extraction and connection notes.
//!
//! Both talk to an OpenAI-compatible chat endpoint and are strictly
//! best-effort: ingestion proceeds with empty enrichment on any failure, and
//! a missing connection note simply stays null.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::EnrichmentConfig;
use crate::models::Entity;

/// Tags, entities, and summary produced for one article.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub entities: Vec<Entity>,
}

const EXCERPT_CHARS: usize = 2000;
const MAX_TAGS: usize = 8;

/// Extract tags, entities, and a short summary for an article.
pub async fn enrich(config: &EnrichmentConfig, title: &str, body: &str) -> Result<Enrichment> {
    let excerpt: String = body.chars().take(EXCERPT_CHARS).collect();

    let prompt = format!(
        "You are analyzing a saved article for a personal reading library. \
         Extract structured metadata.\n\n\
         Article title: {title}\n\
         Article content: {excerpt}\n\n\
         Respond with JSON only, no other text:\n\
         {{\n\
           \"tags\": [\"tag1\", \"tag2\", ...],\n\
           \"entities\": [\n\
             {{\"name\": \"Entity Name\", \"type\": \"person|company|organization|product\"}}\n\
           ],\n\
           \"summary\": \"2-3 sentence summary of the article's key points.\"\n\
         }}"
    );

    let text = chat(config, &prompt).await?;
    let json: serde_json::Value =
        serde_json::from_str(strip_code_fences(&text)).context("enrichment response is not JSON")?;

    let mut tags: Vec<String> = json
        .get("tags")
        .and_then(|t| t.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    tags.truncate(MAX_TAGS);
    tags.dedup();

    let entities: Vec<Entity> = json
        .get("entities")
        .and_then(|e| e.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| {
                    let name = v.get("name")?.as_str()?.trim().to_string();
                    let kind = v.get("type")?.as_str()?.trim().to_lowercase();
                    if name.is_empty() || kind.is_empty() {
                        return None;
                    }
                    Some(Entity { name, kind })
                })
                .collect()
        })
        .unwrap_or_default();

    let summary = json
        .get("summary")
        .and_then(|s| s.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(Enrichment {
        summary,
        tags,
        entities,
    })
}

/// One candidate for connection-note generation.
#[derive(Debug, Clone)]
pub struct NoteCandidate {
    pub article_id: i64,
    pub title: String,
    pub summary: String,
}

/// Generate one-sentence notes explaining how each candidate relates to the
/// source article. Missing ids in the result mean no note was produced.
pub async fn connection_notes(
    config: &EnrichmentConfig,
    source_title: &str,
    source_summary: &str,
    candidates: &[NoteCandidate],
) -> Result<HashMap<i64, String>> {
    if candidates.is_empty() {
        return Ok(HashMap::new());
    }

    let related_context: String = candidates
        .iter()
        .map(|c| format!("- Article {}: \"{}\" -- {}\n", c.article_id, c.title, c.summary))
        .collect();

    let prompt = format!(
        "You are a reading assistant. Given a source article and related \
         articles, write a brief connection note (1 sentence, max 20 words) \
         for each related article explaining HOW it relates to the source. \
         Use phrases like \"Contradicts...\", \"Builds on...\", \
         \"Different perspective on...\", \"Earlier coverage of...\", \
         \"Same topic from...\".\n\n\
         Source article: \"{source_title}\"\n\
         Summary: {source_summary}\n\n\
         Related articles:\n{related_context}\n\
         Respond with JSON only:\n\
         {{\"notes\": [{{\"article_id\": 123, \"note\": \"connection note\"}}, ...]}}"
    );

    let text = chat(config, &prompt).await?;
    let json: serde_json::Value = serde_json::from_str(strip_code_fences(&text))
        .context("connection-note response is not JSON")?;

    let mut notes = HashMap::new();
    if let Some(arr) = json.get("notes").and_then(|n| n.as_array()) {
        for item in arr {
            let Some(id) = item.get("article_id").and_then(|v| v.as_i64()) else {
                continue;
            };
            let Some(note) = item.get("note").and_then(|v| v.as_str()) else {
                continue;
            };
            let note = note.trim();
            if !note.is_empty() {
                notes.insert(id, note.to_string());
            }
        }
    }
    Ok(notes)
}

/// One chat-completion round trip returning the assistant's text.
async fn chat(config: &EnrichmentConfig, prompt: &str) -> Result<String> {
    if !config.is_enabled() {
        bail!("Enrichment provider is disabled");
    }

    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("enrichment.model required"))?;
    let url = config
        .url
        .as_deref()
        .unwrap_or("https://api.openai.com/v1/chat/completions");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "max_tokens": 1024,
    });

    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("enrichment API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    let text = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing message content"))?;

    Ok(text.trim().to_string())
}

/// Models often wrap JSON in markdown fences despite instructions.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, then the closing fence.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.rsplit_once("```").map(|(body, _)| body.trim()).unwrap_or(rest.trim())
}
