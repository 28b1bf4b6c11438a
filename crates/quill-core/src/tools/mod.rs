pub mod mistakes;
pub mod outcome;
pub mod student;

use anyhow::Result;
use async_trait::async_trait;

pub use mistakes::{student_tool, LearningProfileTool, PastMistakesTool, SaveMistakeTool};
pub use outcome::ToolOutcome;
pub use student::StudentTools;

/// Trait for tools callable by the LLM agent.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;
    async fn execute(&self, params: serde_json::Value) -> Result<String>;

    /// Run the tool and report whether it did its job. Tools whose text
    /// alone cannot tell success from failure override this.
    async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutcome> {
        Ok(ToolOutcome::Success(self.execute(params).await?))
    }
}

/// Ordered set of tools handed to the model.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool, replacing any earlier tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(i) => self.tools[i] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Tools in registration order.
    pub fn list(&self) -> Vec<&dyn Tool> {
        self.tools.iter().map(|t| t.as_ref()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(&self, name: &str, params: serde_json::Value) -> Result<String> {
        Ok(self.execute_outcome(name, params).await?.into_text())
    }

    /// Like [`execute`](Self::execute) but keeps the success/failure split.
    /// Parameters that fail validation are a failure.
    pub async fn execute_outcome(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<ToolOutcome> {
        match self.get(name) {
            Some(tool) => {
                let errors = validate_params(&params, &tool.parameters_schema());
                if !errors.is_empty() {
                    return Ok(ToolOutcome::Failure(format!(
                        "Error: Invalid parameters for tool '{}': {}",
                        name,
                        errors.join("; ")
                    )));
                }
                tool.invoke(params).await
            }
            None => anyhow::bail!("unknown tool: {name}"),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate tool parameters against a JSON schema.
/// Returns a list of validation error strings (empty if valid).
fn validate_params(params: &serde_json::Value, schema: &serde_json::Value) -> Vec<String> {
    let mut errors = Vec::new();
    validate_value(params, schema, "", &mut errors);
    errors
}

fn validate_value(
    val: &serde_json::Value,
    schema: &serde_json::Value,
    path: &str,
    errors: &mut Vec<String>,
) {
    let display_path = if path.is_empty() { "root" } else { path };

    // "type" is either one name or a list of allowed names.
    let expected: Vec<&str> = match schema.get("type") {
        Some(serde_json::Value::String(t)) => vec![t.as_str()],
        Some(serde_json::Value::Array(ts)) => ts.iter().filter_map(|t| t.as_str()).collect(),
        _ => Vec::new(),
    };
    if !expected.is_empty() && !expected.iter().any(|t| type_matches(val, t)) {
        errors.push(format!(
            "{display_path}: expected type '{}'",
            expected.join("' or '")
        ));
        return;
    }

    if let Some(allowed) = schema.get("enum").and_then(|e| e.as_array()) {
        if !allowed.contains(val) {
            errors.push(format!("{display_path}: value not in allowed enum"));
        }
    }

    if let Some(obj) = val.as_object() {
        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for field in required.iter().filter_map(|r| r.as_str()) {
                if !obj.contains_key(field) {
                    let field_path = if path.is_empty() {
                        field.to_string()
                    } else {
                        format!("{path}.{field}")
                    };
                    errors.push(format!("{field_path}: required field missing"));
                }
            }
        }
        if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
            for (key, prop_schema) in props {
                if let Some(prop_val) = obj.get(key) {
                    let prop_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    validate_value(prop_val, prop_schema, &prop_path, errors);
                }
            }
        }
    }
}

fn type_matches(val: &serde_json::Value, expected_type: &str) -> bool {
    match expected_type {
        "object" => val.is_object(),
        "array" => val.is_array(),
        "string" => val.is_string(),
        "integer" => val.is_i64() || val.is_u64(),
        "number" => val.is_number(),
        "boolean" => val.is_boolean(),
        "null" => val.is_null(),
        _ => true,
    }
}

/// Read a string argument, treating a missing or non-string value as empty.
pub(crate) fn str_param<'a>(params: &'a serde_json::Value, key: &str) -> &'a str {
    params.get(key).and_then(|v| v.as_str()).unwrap_or("")
}
