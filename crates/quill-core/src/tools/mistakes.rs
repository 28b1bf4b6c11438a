use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::student::{StudentTools, DEFAULT_ERROR_TYPE};
use super::{str_param, Tool, ToolOutcome};

/// Names of every tool [`student_tool`] can build.
pub const STUDENT_TOOL_NAMES: &[&str] = &["save_mistake", "get_past_mistakes", "get_learning_profile"];

/// Build a student tool by name.
pub fn student_tool(name: &str, tools: &Arc<StudentTools>) -> Option<Box<dyn Tool>> {
    let tool: Box<dyn Tool> = match name {
        "save_mistake" => Box::new(SaveMistakeTool::new(tools.clone())),
        "get_past_mistakes" => Box::new(PastMistakesTool::new(tools.clone())),
        "get_learning_profile" => Box::new(LearningProfileTool::new(tools.clone())),
        _ => return None,
    };
    Some(tool)
}

/// Records a mistake the model found in the student's sentence.
pub struct SaveMistakeTool {
    tools: Arc<StudentTools>,
}

impl SaveMistakeTool {
    pub fn new(tools: Arc<StudentTools>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Tool for SaveMistakeTool {
    fn name(&self) -> &str {
        "save_mistake"
    }

    fn description(&self) -> &str {
        "Save a student's writing mistake to memory for future reference. \
         Use this after identifying errors to track the student's learning progress."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "student_id": {
                    "type": "string",
                    "description": "The student's unique identifier"
                },
                "mistake_type": {
                    "type": "string",
                    "description": "Type of error (spelling, grammar, punctuation, capitalization)"
                },
                "details": {
                    "type": "string",
                    "description": "Description of the mistake (e.g. \"pley -> play\")"
                },
                "sentence": {
                    "type": "string",
                    "description": "The original sentence containing the error"
                }
            },
            "required": ["student_id", "mistake_type", "details", "sentence"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        Ok(self.invoke(params).await?.into_text())
    }

    async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutcome> {
        Ok(self
            .tools
            .save_mistake(
                str_param(&params, "student_id"),
                str_param(&params, "mistake_type"),
                str_param(&params, "details"),
                str_param(&params, "sentence"),
            )
            .await)
    }
}

/// Looks up similar mistakes the student made before.
pub struct PastMistakesTool {
    tools: Arc<StudentTools>,
}

impl PastMistakesTool {
    pub fn new(tools: Arc<StudentTools>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Tool for PastMistakesTool {
    fn name(&self) -> &str {
        "get_past_mistakes"
    }

    fn description(&self) -> &str {
        "Retrieve a student's past similar mistakes from memory. \
         Use this to check if the student has made similar errors before."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "student_id": {
                    "type": "string",
                    "description": "The student's unique identifier"
                },
                "error_type": {
                    "type": ["string", "null"],
                    "description": format!(
                        "What type of errors to search for (e.g. \"spelling\", \"grammar\"). Defaults to \"{DEFAULT_ERROR_TYPE}\"."
                    )
                }
            },
            "required": ["student_id"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        Ok(self.invoke(params).await?.into_text())
    }

    async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutcome> {
        // Absent and null both mean "use the default".
        let error_type = params.get("error_type").and_then(|v| v.as_str());
        Ok(self
            .tools
            .get_past_mistakes(str_param(&params, "student_id"), error_type)
            .await)
    }
}

/// Summarizes the student's recurring patterns.
pub struct LearningProfileTool {
    tools: Arc<StudentTools>,
}

impl LearningProfileTool {
    pub fn new(tools: Arc<StudentTools>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Tool for LearningProfileTool {
    fn name(&self) -> &str {
        "get_learning_profile"
    }

    fn description(&self) -> &str {
        "Get an AI-generated summary of the student's learning patterns. \
         Use this to understand the student's strengths and areas for improvement."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "student_id": {
                    "type": "string",
                    "description": "The student's unique identifier"
                }
            },
            "required": ["student_id"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        Ok(self.invoke(params).await?.into_text())
    }

    async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutcome> {
        Ok(self
            .tools
            .get_learning_profile(str_param(&params, "student_id"))
            .await)
    }
}
