use std::sync::Arc;

use anyhow::{bail, Result};
use quill_config::{AgentOptions, SUPPORTED_AGENT_SCHEMA_VERSIONS};

use crate::tools::mistakes::STUDENT_TOOL_NAMES;
use crate::tools::{student_tool, StudentTools, ToolRegistry};

/// Built-in instruction for the writing tutor.
pub const TUTOR_INSTRUCTION: &str = r#"You are an AI writing tutor for children. Be CONCISE and encouraging.

WORKFLOW:
1. Check for past mistakes using get_past_mistakes(student_id, error_type)
2. Analyze the sentence and identify errors
3. Save new mistakes using save_mistake(student_id, mistake_type, details, sentence)
4. Provide corrected sentence and child-friendly tips

Use student_id="default-student" if not specified.

RESPONSE FORMAT:
📝 Errors found:
1. [Type]: "wrong" → "correct" - Brief tip
2. [Type]: "wrong" → "correct" - Brief tip

✅ Corrected: [Full corrected sentence]

💡 [Personalized tip if student has recurring errors]
"#;

/// Everything the runner needs to know about the tutor agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDefinition {
    pub schema_version: u32,
    pub name: String,
    pub provider: String,
    pub model: String,
    pub instruction: String,
    pub tools: Vec<String>,
    pub temperature: f64,
    pub max_tokens: u64,
    pub max_iterations: usize,
}

impl AgentDefinition {
    /// Validate config options and resolve the instruction text.
    pub fn from_options(options: &AgentOptions) -> Result<Self> {
        if !SUPPORTED_AGENT_SCHEMA_VERSIONS.contains(&options.schema_version) {
            bail!(
                "Unsupported agent schemaVersion {} (supported: {:?})",
                options.schema_version,
                SUPPORTED_AGENT_SCHEMA_VERSIONS
            );
        }
        if options.provider.is_empty() {
            bail!("No provider configured. Set agent.provider in config.json.");
        }
        if options.model.is_empty() {
            bail!(
                "No model configured for provider '{}'. Set agent.model in config.json.",
                options.provider
            );
        }
        if options.max_tool_iterations == 0 {
            bail!("agent.maxToolIterations must be at least 1");
        }

        let mut tools: Vec<String> = Vec::new();
        for name in &options.tools {
            if !STUDENT_TOOL_NAMES.contains(&name.as_str()) {
                bail!(
                    "Unknown tool '{name}' in agent.tools. Valid tools: {}",
                    STUDENT_TOOL_NAMES.join(", ")
                );
            }
            if tools.contains(name) {
                bail!("Tool '{name}' listed twice in agent.tools");
            }
            tools.push(name.clone());
        }

        let instruction = options
            .instruction
            .clone()
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| TUTOR_INSTRUCTION.to_string());

        Ok(Self {
            schema_version: options.schema_version,
            name: options.name.clone(),
            provider: options.provider.clone(),
            model: options.model.clone(),
            instruction,
            tools,
            temperature: options.temperature as f64,
            max_tokens: options.max_tokens as u64,
            max_iterations: options.max_tool_iterations as usize,
        })
    }

    /// Registry holding exactly the tools this agent declares.
    pub fn build_registry(&self, tools: &Arc<StudentTools>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in &self.tools {
            // Names were checked in from_options.
            if let Some(tool) = student_tool(name, tools) {
                registry.register(tool);
            }
        }
        registry
    }
}

/// Prefix a message with the student it is about so the model passes the
/// right id to its tools.
pub fn student_prompt(student_id: &str, message: &str) -> String {
    format!("student_id: {student_id}\n{message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::fake::FakeBackend;
    use crate::memory::StudentMemory;

    #[test]
    fn defaults_build_the_tutor() {
        let def = AgentDefinition::from_options(&AgentOptions::default()).unwrap();
        assert_eq!(def.name, "writing_tutor");
        assert_eq!(def.provider, "groq");
        assert_eq!(def.model, "moonshotai/kimi-k2-instruct-0905");
        assert_eq!(def.instruction, TUTOR_INSTRUCTION);
        assert_eq!(
            def.tools,
            vec!["save_mistake", "get_past_mistakes", "get_learning_profile"]
        );
        assert_eq!(def.max_iterations, 10);
    }

    #[test]
    fn instruction_describes_the_workflow() {
        assert!(TUTOR_INSTRUCTION.contains("get_past_mistakes(student_id, error_type)"));
        assert!(TUTOR_INSTRUCTION
            .contains("save_mistake(student_id, mistake_type, details, sentence)"));
        assert!(TUTOR_INSTRUCTION.contains("student_id=\"default-student\""));
    }

    #[test]
    fn instruction_override_wins_unless_blank() {
        let mut options = AgentOptions {
            instruction: Some("Only praise.".into()),
            ..AgentOptions::default()
        };
        let def = AgentDefinition::from_options(&options).unwrap();
        assert_eq!(def.instruction, "Only praise.");

        options.instruction = Some("   ".into());
        let def = AgentDefinition::from_options(&options).unwrap();
        assert_eq!(def.instruction, TUTOR_INSTRUCTION);
    }

    #[test]
    fn unsupported_schema_version_rejected() {
        let options = AgentOptions {
            schema_version: 2,
            ..AgentOptions::default()
        };
        let err = AgentDefinition::from_options(&options).unwrap_err();
        assert!(err.to_string().contains("Unsupported agent schemaVersion 2"));
    }

    #[test]
    fn unknown_and_duplicate_tools_rejected() {
        let options = AgentOptions {
            tools: vec!["shell".into()],
            ..AgentOptions::default()
        };
        assert!(AgentDefinition::from_options(&options)
            .unwrap_err()
            .to_string()
            .contains("Unknown tool 'shell'"));

        let options = AgentOptions {
            tools: vec!["save_mistake".into(), "save_mistake".into()],
            ..AgentOptions::default()
        };
        assert!(AgentDefinition::from_options(&options)
            .unwrap_err()
            .to_string()
            .contains("listed twice"));
    }

    #[test]
    fn empty_model_rejected() {
        let options = AgentOptions {
            model: String::new(),
            ..AgentOptions::default()
        };
        assert!(AgentDefinition::from_options(&options).is_err());
    }

    #[test]
    fn registry_follows_declared_tools() {
        let options = AgentOptions {
            tools: vec!["get_learning_profile".into(), "get_past_mistakes".into()],
            ..AgentOptions::default()
        };
        let def = AgentDefinition::from_options(&options).unwrap();
        let tools = Arc::new(StudentTools::new(StudentMemory::new(Arc::new(
            FakeBackend::default(),
        ))));
        let registry = def.build_registry(&tools);
        assert_eq!(
            registry.names(),
            vec!["get_learning_profile", "get_past_mistakes"]
        );
    }

    #[test]
    fn student_prompt_prefixes_id() {
        assert_eq!(
            student_prompt("s1", "Check this sentence: I pley football"),
            "student_id: s1\nCheck this sentence: I pley football"
        );
    }
}
