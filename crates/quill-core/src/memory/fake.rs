use std::sync::Mutex;

use async_trait::async_trait;

use super::{MemoryBackend, MemoryError, MemoryQuery, NewMemory, SearchResultItem};

/// In-process stand-in for the hosted memory service.
///
/// Search ranks documents in the queried partition by how many query words
/// they contain, which is enough to exercise partition scoping and limits.
#[derive(Default)]
pub(crate) struct FakeBackend {
    docs: Mutex<Vec<NewMemory>>,
    queries: Mutex<Vec<MemoryQuery>>,
    profile_requests: Mutex<Vec<(String, String)>>,
    profile: Option<String>,
    failure: Option<String>,
    omit_ids: bool,
}

impl FakeBackend {
    pub(crate) fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn with_profile(mut self, profile: &str) -> Self {
        self.profile = Some(profile.to_string());
        self
    }

    pub(crate) fn without_ids(mut self) -> Self {
        self.omit_ids = true;
        self
    }

    pub(crate) fn stored(&self) -> Vec<NewMemory> {
        self.docs.lock().unwrap().clone()
    }

    pub(crate) fn last_query(&self) -> Option<MemoryQuery> {
        self.queries.lock().unwrap().last().cloned()
    }

    pub(crate) fn last_profile_request(&self) -> Option<(String, String)> {
        self.profile_requests.lock().unwrap().last().cloned()
    }

    fn check(&self) -> Result<(), MemoryError> {
        match &self.failure {
            Some(message) => Err(MemoryError::Status {
                status: 503,
                body: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MemoryBackend for FakeBackend {
    async fn add(&self, memory: &NewMemory) -> Result<serde_json::Value, MemoryError> {
        self.check()?;
        let mut docs = self.docs.lock().unwrap();
        docs.push(memory.clone());
        if self.omit_ids {
            Ok(serde_json::json!({ "status": "queued" }))
        } else {
            Ok(serde_json::json!({ "id": format!("mem-{}", docs.len()), "status": "queued" }))
        }
    }

    async fn search(&self, query: &MemoryQuery) -> Result<Vec<SearchResultItem>, MemoryError> {
        self.queries.lock().unwrap().push(query.clone());
        self.check()?;
        let words: Vec<String> = query
            .q
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        let docs = self.docs.lock().unwrap();
        let mut hits: Vec<SearchResultItem> = docs
            .iter()
            .filter(|d| d.container_tag == query.container_tag)
            .filter_map(|d| {
                let lower = d.content.to_lowercase();
                let matched = words.iter().filter(|w| lower.contains(w.as_str())).count();
                (matched > 0).then(|| SearchResultItem {
                    content: d.content.clone(),
                    score: Some(matched as f64 / words.len() as f64),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn profile(
        &self,
        container_tag: &str,
        question: &str,
    ) -> Result<Option<String>, MemoryError> {
        self.profile_requests
            .lock()
            .unwrap()
            .push((container_tag.to_string(), question.to_string()));
        self.check()?;
        Ok(self.profile.clone())
    }
}
