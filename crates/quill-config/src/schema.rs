use serde::{Deserialize, Serialize};

/// Agent option schema versions this build understands.
pub const SUPPORTED_AGENT_SCHEMA_VERSIONS: &[u32] = &[1];

pub const DEFAULT_PROVIDER: &str = "groq";
pub const DEFAULT_MODEL: &str = "moonshotai/kimi-k2-instruct-0905";
pub const DEFAULT_STUDENT_ID: &str = "default-student";
pub const DEFAULT_MEMORY_BASE_URL: &str = "https://api.supermemory.ai";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentOptions,
    pub providers: ProvidersConfig,
    pub memory: MemoryConfig,
}

/// The single declaration of the tutor agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentOptions {
    pub schema_version: u32,
    pub name: String,
    pub provider: String,
    pub model: String,
    /// Replaces the built-in tutor instruction when set.
    pub instruction: Option<String>,
    /// Tool names exposed to the model, in order.
    pub tools: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tool_iterations: u32,
    pub default_student_id: String,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            schema_version: 1,
            name: "writing_tutor".into(),
            provider: DEFAULT_PROVIDER.into(),
            model: DEFAULT_MODEL.into(),
            instruction: None,
            tools: vec![
                "save_mistake".into(),
                "get_past_mistakes".into(),
                "get_learning_profile".into(),
            ],
            temperature: 0.7,
            max_tokens: 4096,
            max_tool_iterations: 10,
            default_student_id: DEFAULT_STUDENT_ID.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub ollama: Option<ProviderConfig>,
    pub anthropic: Option<ProviderConfig>,
    pub openai: Option<ProviderConfig>,
    pub openrouter: Option<ProviderConfig>,
    pub deepseek: Option<ProviderConfig>,
    pub groq: Option<ProviderConfig>,
    pub gemini: Option<ProviderConfig>,
    pub mistral: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

/// Hosted memory service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryConfig {
    /// Falls back to SUPERMEMORY_API_KEY when unset.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Number of past mistakes handed back to the model per lookup.
    pub history_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_MEMORY_BASE_URL.into(),
            timeout_secs: 30,
            history_limit: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_tutor_defaults() {
        let cfg: Config = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(cfg.agent.schema_version, 1);
        assert_eq!(cfg.agent.provider, "groq");
        assert_eq!(cfg.agent.model, "moonshotai/kimi-k2-instruct-0905");
        assert_eq!(cfg.agent.default_student_id, "default-student");
        assert_eq!(cfg.agent.tools.len(), 3);
        assert!(cfg.agent.instruction.is_none());
        assert_eq!(cfg.memory.base_url, "https://api.supermemory.ai");
        assert_eq!(cfg.memory.history_limit, 3);
    }

    #[test]
    fn camel_case_fields_parsed() {
        let cfg: Config = serde_json::from_value(serde_json::json!({
            "agent": {
                "schemaVersion": 1,
                "maxToolIterations": 4,
                "defaultStudentId": "kid-7",
                "tools": ["get_past_mistakes"]
            },
            "memory": {
                "apiKey": "sm-test",
                "timeoutSecs": 5
            },
            "providers": {
                "groq": { "apiKey": "gsk-test" }
            }
        }))
        .unwrap();
        assert_eq!(cfg.agent.max_tool_iterations, 4);
        assert_eq!(cfg.agent.default_student_id, "kid-7");
        assert_eq!(cfg.agent.tools, vec!["get_past_mistakes".to_string()]);
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.agent.name, "writing_tutor");
        assert_eq!(cfg.memory.api_key.as_deref(), Some("sm-test"));
        assert_eq!(cfg.memory.timeout_secs, 5);
        assert_eq!(cfg.memory.base_url, DEFAULT_MEMORY_BASE_URL);
        assert_eq!(
            cfg.providers.groq.and_then(|g| g.api_key).as_deref(),
            Some("gsk-test")
        );
    }

    #[test]
    fn instruction_override_parsed() {
        let cfg: Config = serde_json::from_value(serde_json::json!({
            "agent": { "instruction": "Grade politely." }
        }))
        .unwrap();
        assert_eq!(cfg.agent.instruction.as_deref(), Some("Grade politely."));
    }

    #[test]
    fn provider_section_has_only_key_and_base() {
        let cfg: Config = serde_json::from_value(serde_json::json!({
            "providers": {
                "openai": { "apiKey": "sk-test", "apiBase": "http://localhost:8080/v1" }
            }
        }))
        .unwrap();
        let openai = cfg.providers.openai.unwrap();
        assert_eq!(openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(openai.api_base.as_deref(), Some("http://localhost:8080/v1"));

        let written = serde_json::to_value(&openai).unwrap();
        let mut keys: Vec<&String> = written.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["apiBase", "apiKey"]);
    }
}
