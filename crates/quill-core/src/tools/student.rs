//! Student memory operations phrased as tool outcomes.

use tracing::warn;

use super::ToolOutcome;
use crate::memory::{MemoryError, ProfileSummary, RecordedMistake, SearchResultItem, StudentMemory};

/// Search query used when the model does not name an error type.
pub const DEFAULT_ERROR_TYPE: &str = "writing errors";

/// Past mistakes returned per lookup unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 3;

/// Characters of each past mistake shown to the model.
const HISTORY_PREVIEW_CHARS: usize = 200;

const NO_PROFILE_YET: &str = "No profile data available yet.";

/// The three memory operations the tutor agent can call.
#[derive(Clone)]
pub struct StudentTools {
    memory: StudentMemory,
    history_limit: usize,
}

impl StudentTools {
    pub fn new(memory: StudentMemory) -> Self {
        Self {
            memory,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub async fn save_mistake(
        &self,
        student_id: &str,
        mistake_type: &str,
        details: &str,
        sentence: &str,
    ) -> ToolOutcome {
        let result = self
            .memory
            .record_mistake(student_id, mistake_type, details, sentence)
            .await;
        render_saved(student_id, mistake_type, result)
    }

    pub async fn get_past_mistakes(&self, student_id: &str, error_type: Option<&str>) -> ToolOutcome {
        let error_type = error_type.unwrap_or(DEFAULT_ERROR_TYPE);
        let result = self
            .memory
            .search_history(student_id, error_type, Some(self.history_limit))
            .await;
        render_history(error_type, self.history_limit, result)
    }

    pub async fn get_learning_profile(&self, student_id: &str) -> ToolOutcome {
        render_profile(&self.memory.get_profile(student_id).await)
    }
}

fn render_saved(
    student_id: &str,
    mistake_type: &str,
    result: Result<RecordedMistake, MemoryError>,
) -> ToolOutcome {
    match result {
        Ok(_) => ToolOutcome::Success(format!(
            "✅ Saved {mistake_type} mistake for student {student_id}"
        )),
        Err(e) => {
            warn!("Saving mistake for student {student_id} failed: {e}");
            ToolOutcome::Failure(format!("❌ Could not save mistake: {e}"))
        }
    }
}

fn render_history(
    error_type: &str,
    limit: usize,
    result: Result<Vec<SearchResultItem>, MemoryError>,
) -> ToolOutcome {
    let items = match result {
        Ok(items) => items,
        Err(e) => {
            warn!("History lookup failed: {e}");
            return ToolOutcome::Failure(format!("Could not retrieve history: {e}"));
        }
    };

    if items.is_empty() {
        return ToolOutcome::Success(format!(
            "No previous {error_type} found for this student."
        ));
    }

    let shown = &items[..items.len().min(limit)];
    let mut output = format!("📚 Found {} similar past mistakes:\n", shown.len());
    for (i, item) in shown.iter().enumerate() {
        let preview: String = item.content.chars().take(HISTORY_PREVIEW_CHARS).collect();
        output.push_str(&format!("{}. {preview}...\n", i + 1));
    }
    ToolOutcome::Success(output)
}

fn render_profile(summary: &ProfileSummary) -> ToolOutcome {
    if let Some(error) = &summary.error {
        return ToolOutcome::Failure(format!("Could not generate profile: {error}"));
    }
    let profile = summary
        .profile
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(NO_PROFILE_YET);
    ToolOutcome::Success(format!(
        "📊 Student Profile for {}:\n{profile}",
        summary.student_id
    ))
}
