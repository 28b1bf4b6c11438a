//! Student memory kept in a hosted memory service.
//!
//! Every record and query for a student is scoped to that student's
//! partition tag. The service does all storage, similarity search and
//! profile generation; this module only formats records and shapes results.

#[cfg(test)]
pub(crate) mod fake;
pub mod supermemory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use supermemory::SupermemoryClient;

/// Results returned by [`StudentMemory::search_history`] when no limit is given.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Question sent to the service when building a student profile.
pub const PROFILE_QUESTION: &str =
    "What are this student's most common writing errors and areas for improvement?";

/// Partition tag grouping all memories of one student.
///
/// Records are only found again if they were stored under the exact same tag,
/// so this is the one place the derivation lives.
pub fn partition_tag(student_id: &str) -> String {
    format!("student-{student_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("memory service API key not configured (set memory.apiKey in config.json or SUPERMEMORY_API_KEY)")]
    MissingApiKey,
    #[error("memory service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("memory service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected memory service response: {0}")]
    Decode(String),
}

/// A document ready to be written to the memory service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMemory {
    pub content: String,
    pub container_tag: String,
    pub metadata: serde_json::Value,
}

/// A similarity query scoped to one partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryQuery {
    pub q: String,
    pub container_tag: String,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub content: String,
    pub score: Option<f64>,
}

/// Operations the hosted memory service provides.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Store a document. Returns the raw service response.
    async fn add(&self, memory: &NewMemory) -> Result<serde_json::Value, MemoryError>;

    async fn search(&self, query: &MemoryQuery) -> Result<Vec<SearchResultItem>, MemoryError>;

    /// Summarize a partition. `Ok(None)` means the service has nothing yet.
    async fn profile(
        &self,
        container_tag: &str,
        question: &str,
    ) -> Result<Option<String>, MemoryError>;
}

/// One writing mistake made by a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakeRecord {
    pub student_id: String,
    pub mistake_type: String,
    pub details: String,
    pub sentence: String,
    pub timestamp: String,
}

impl MistakeRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        student_id: impl Into<String>,
        mistake_type: impl Into<String>,
        details: impl Into<String>,
        sentence: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            mistake_type: mistake_type.into(),
            details: details.into(),
            sentence: sentence.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn partition_tag(&self) -> String {
        partition_tag(&self.student_id)
    }

    /// Text stored in the memory service.
    pub fn content(&self) -> String {
        format!(
            "\nStudent Mistake Record:\n\
             - Type: {}\n\
             - Error: {}\n\
             - Original Sentence: \"{}\"\n\
             - Recorded: {}\n\
             \n\
             This helps track the student's learning patterns and recurring errors.\n",
            self.mistake_type, self.details, self.sentence, self.timestamp
        )
    }

    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.mistake_type,
            "student_id": self.student_id,
            "timestamp": self.timestamp,
        })
    }

    pub fn to_memory(&self) -> NewMemory {
        NewMemory {
            content: self.content(),
            container_tag: self.partition_tag(),
            metadata: self.metadata(),
        }
    }
}

/// Outcome of storing a mistake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedMistake {
    pub success: bool,
    /// Service-assigned id, or the whole response when it carries none.
    pub id: String,
}

/// Aggregated learning patterns for one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSummary {
    pub student_id: String,
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Student-facing view over a [`MemoryBackend`].
#[derive(Clone)]
pub struct StudentMemory {
    backend: Arc<dyn MemoryBackend>,
}

impl StudentMemory {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }

    /// Store a mistake under the student's partition. Inputs are passed through as-is.
    pub async fn record_mistake(
        &self,
        student_id: &str,
        mistake_type: &str,
        details: &str,
        sentence: &str,
    ) -> Result<RecordedMistake, MemoryError> {
        let record = MistakeRecord::new(student_id, mistake_type, details, sentence);
        self.record(&record).await
    }

    pub async fn record(&self, record: &MistakeRecord) -> Result<RecordedMistake, MemoryError> {
        let response = self.backend.add(&record.to_memory()).await?;
        let id = match response.get("id").and_then(|id| id.as_str()) {
            Some(id) => id.to_string(),
            None => response.to_string(),
        };
        debug!(
            "Stored {} mistake for student {} as {id}",
            record.mistake_type, record.student_id
        );
        Ok(RecordedMistake { success: true, id })
    }

    /// Similarity search over the student's past mistakes.
    ///
    /// An empty result does not tell apart "no match" from "no data yet".
    pub async fn search_history(
        &self,
        student_id: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResultItem>, MemoryError> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let request = MemoryQuery {
            q: query.to_string(),
            container_tag: partition_tag(student_id),
            limit,
        };
        let mut results = self.backend.search(&request).await?;
        results.truncate(limit);
        debug!(
            "History search for student {student_id} ({query:?}): {} result(s)",
            results.len()
        );
        Ok(results)
    }

    /// Ask the service for the student's learning profile. Failures end up in
    /// [`ProfileSummary::error`] instead of being returned.
    pub async fn get_profile(&self, student_id: &str) -> ProfileSummary {
        match self
            .backend
            .profile(&partition_tag(student_id), PROFILE_QUESTION)
            .await
        {
            Ok(profile) => ProfileSummary {
                student_id: student_id.to_string(),
                profile,
                error: None,
            },
            Err(e) => {
                warn!("Profile request for student {student_id} failed: {e}");
                ProfileSummary {
                    student_id: student_id.to_string(),
                    profile: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeBackend;
    use super::*;

    fn record() -> MistakeRecord {
        MistakeRecord {
            student_id: "s1".into(),
            mistake_type: "spelling".into(),
            details: "pley -> play".into(),
            sentence: "I pley football".into(),
            timestamp: "2026-10-18T09:30:00+00:00".into(),
        }
    }

    #[test]
    fn partition_tag_is_prefixed_student_id() {
        assert_eq!(partition_tag("s1"), "student-s1");
        assert_eq!(partition_tag(""), "student-");
        assert_eq!(partition_tag("Ana María"), "student-Ana María");
    }

    #[test]
    fn record_content_follows_template() {
        let expected = "\nStudent Mistake Record:\n\
                        - Type: spelling\n\
                        - Error: pley -> play\n\
                        - Original Sentence: \"I pley football\"\n\
                        - Recorded: 2026-10-18T09:30:00+00:00\n\
                        \n\
                        This helps track the student's learning patterns and recurring errors.\n";
        assert_eq!(record().content(), expected);
    }

    #[test]
    fn record_metadata_has_type_student_and_timestamp() {
        let meta = record().metadata();
        assert_eq!(meta["type"], "spelling");
        assert_eq!(meta["student_id"], "s1");
        assert_eq!(meta["timestamp"], "2026-10-18T09:30:00+00:00");
    }

    #[test]
    fn new_record_gets_parseable_timestamp() {
        let r = MistakeRecord::new("s1", "grammar", "a -> an", "a apple");
        assert!(chrono::DateTime::parse_from_rfc3339(&r.timestamp).is_ok());
    }

    #[tokio::test]
    async fn record_mistake_writes_under_partition() {
        let backend = Arc::new(FakeBackend::default());
        let memory = StudentMemory::new(backend.clone());

        let saved = memory
            .record_mistake("s1", "spelling", "pley -> play", "I pley football")
            .await
            .unwrap();
        assert!(saved.success);
        assert_eq!(saved.id, "mem-1");

        let stored = backend.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].container_tag, "student-s1");
        assert!(stored[0].content.contains("- Error: pley -> play"));
        assert_eq!(stored[0].metadata["student_id"], "s1");
    }

    #[tokio::test]
    async fn record_without_id_stringifies_response() {
        let backend = Arc::new(FakeBackend::default().without_ids());
        let memory = StudentMemory::new(backend);
        let saved = memory.record(&record()).await.unwrap();
        assert_eq!(saved.id, r#"{"status":"queued"}"#);
    }

    #[tokio::test]
    async fn empty_inputs_pass_through_unchanged() {
        let backend = Arc::new(FakeBackend::default());
        let memory = StudentMemory::new(backend.clone());
        memory.record_mistake("", "", "", "").await.unwrap();
        let stored = backend.stored();
        assert_eq!(stored[0].container_tag, "student-");
        assert!(stored[0].content.contains("- Original Sentence: \"\""));
    }

    #[tokio::test]
    async fn search_is_scoped_to_student() {
        let backend = Arc::new(FakeBackend::default());
        let memory = StudentMemory::new(backend);
        memory
            .record_mistake("s1", "spelling", "pley -> play", "I pley football")
            .await
            .unwrap();

        let own = memory.search_history("s1", "spelling", None).await.unwrap();
        assert_eq!(own.len(), 1);
        assert!(own[0].content.contains("pley -> play"));

        let other = memory.search_history("s2", "spelling", None).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let backend = Arc::new(FakeBackend::default());
        let memory = StudentMemory::new(backend.clone());
        for i in 0..8 {
            memory
                .record_mistake("s1", "spelling", &format!("word{i}"), "sentence")
                .await
                .unwrap();
        }
        let default = memory.search_history("s1", "spelling", None).await.unwrap();
        assert_eq!(default.len(), DEFAULT_SEARCH_LIMIT);
        assert_eq!(backend.last_query().unwrap().limit, DEFAULT_SEARCH_LIMIT);

        let three = memory.search_history("s1", "spelling", Some(3)).await.unwrap();
        assert_eq!(three.len(), 3);
    }

    #[tokio::test]
    async fn search_failure_is_returned() {
        let memory = StudentMemory::new(Arc::new(FakeBackend::failing("service down")));
        let err = memory.search_history("s1", "x", None).await.unwrap_err();
        assert!(err.to_string().contains("service down"));
    }

    #[tokio::test]
    async fn profile_uses_fixed_question() {
        let backend = Arc::new(FakeBackend::default().with_profile("Mixes up their/there."));
        let memory = StudentMemory::new(backend.clone());
        let summary = memory.get_profile("s1").await;
        assert_eq!(summary.student_id, "s1");
        assert_eq!(summary.profile.as_deref(), Some("Mixes up their/there."));
        assert!(summary.error.is_none());
        assert_eq!(
            backend.last_profile_request(),
            Some(("student-s1".to_string(), PROFILE_QUESTION.to_string()))
        );
    }

    #[tokio::test]
    async fn profile_failure_is_captured_not_raised() {
        let memory = StudentMemory::new(Arc::new(FakeBackend::failing("quota exceeded")));
        let summary = memory.get_profile("s1").await;
        assert!(summary.profile.is_none());
        assert!(summary.error.unwrap().contains("quota exceeded"));
    }
}
