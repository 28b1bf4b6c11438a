//! Supermemory REST backend.
//!
//! Talks to the hosted API with a bearer token. One client is built at
//! startup and shared by every tool call.

use std::time::Duration;

use async_trait::async_trait;
use quill_config::MemoryConfig;
use serde_json::Value;
use tracing::{debug, error};

use super::{MemoryBackend, MemoryError, MemoryQuery, NewMemory, SearchResultItem};

const ADD_PATH: &str = "/v3/documents";
const SEARCH_PATH: &str = "/v4/search";
const PROFILE_PATH: &str = "/v4/profile";

/// Env var read when the config carries no key.
pub const API_KEY_ENV: &str = "SUPERMEMORY_API_KEY";

pub struct SupermemoryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupermemoryClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, MemoryError> {
        if api_key.is_empty() {
            return Err(MemoryError::MissingApiKey);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build a client from config, falling back to `SUPERMEMORY_API_KEY`.
    pub fn from_config(config: &MemoryConfig) -> Result<Self, MemoryError> {
        let key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
            .ok_or(MemoryError::MissingApiKey)?;
        Self::new(
            &key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, MemoryError> {
        let url = format!("{}{path}", self.base_url);
        debug!("Memory service POST {url}");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("Memory service request to {path} failed ({status}): {body}");
            return Err(MemoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl MemoryBackend for SupermemoryClient {
    async fn add(&self, memory: &NewMemory) -> Result<Value, MemoryError> {
        let body =
            serde_json::to_value(memory).map_err(|e| MemoryError::Decode(e.to_string()))?;
        self.post(ADD_PATH, &body).await
    }

    async fn search(&self, query: &MemoryQuery) -> Result<Vec<SearchResultItem>, MemoryError> {
        let body = serde_json::to_value(query).map_err(|e| MemoryError::Decode(e.to_string()))?;
        let response = self.post(SEARCH_PATH, &body).await?;
        parse_search_results(&response)
    }

    async fn profile(
        &self,
        container_tag: &str,
        question: &str,
    ) -> Result<Option<String>, MemoryError> {
        let body = serde_json::json!({
            "containerTag": container_tag,
            "q": question,
        });
        let response = self.post(PROFILE_PATH, &body).await?;
        Ok(render_profile(response.get("profile")))
    }
}

/// Pull `{content, score}` pairs out of a search response.
///
/// Hits carry their text under `memory`, `content` or `chunk` depending on
/// the search mode; a hit with none of them is kept as its raw JSON.
fn parse_search_results(response: &Value) -> Result<Vec<SearchResultItem>, MemoryError> {
    let Some(results) = response.get("results") else {
        return Ok(Vec::new());
    };
    let hits = results
        .as_array()
        .ok_or_else(|| MemoryError::Decode("'results' is not an array".into()))?;

    Ok(hits
        .iter()
        .map(|hit| {
            let content = ["memory", "content", "chunk"]
                .iter()
                .find_map(|key| hit.get(*key).and_then(|v| v.as_str()))
                .map(String::from)
                .unwrap_or_else(|| hit.to_string());
            let score = hit
                .get("similarity")
                .or_else(|| hit.get("score"))
                .and_then(|s| s.as_f64());
            SearchResultItem { content, score }
        })
        .collect())
}

/// Turn the service's profile payload into text.
///
/// Structured profiles list long-lived facts (`static`) and recent
/// observations (`dynamic`); both empty means there is no profile yet.
fn render_profile(profile: Option<&Value>) -> Option<String> {
    match profile? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) if obj.contains_key("static") || obj.contains_key("dynamic") => {
            let mut out = String::new();
            for (key, heading) in [("static", "Patterns"), ("dynamic", "Recent")] {
                let items: Vec<&str> = obj
                    .get(key)
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|i| i.as_str()).collect())
                    .unwrap_or_default();
                if items.is_empty() {
                    continue;
                }
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(heading);
                out.push_str(":\n");
                for item in items {
                    out.push_str(&format!("- {item}\n"));
                }
            }
            if out.is_empty() {
                None
            } else {
                Some(out.trim_end().to_string())
            }
        }
        other => Some(other.to_string()),
    }
}
