use anyhow::Result;
#[allow(deprecated)]
use rig::client::completion::CompletionModelHandle;
use rig::completion::{CompletionModel, CompletionRequest, Message, ToolDefinition};
use rig::message::{AssistantContent, Text, ToolResult, ToolResultContent, UserContent};
use rig::OneOrMany;
use tracing::{debug, info, warn};

use crate::agent::definition::AgentDefinition;
use crate::tools::{ToolOutcome, ToolRegistry};

const MAX_CONSECUTIVE_ERRORS: usize = 3;
const PREVIEW_BYTES: usize = 200;
const CONTINUE_PROMPT: &str =
    "If more tool calls are needed, make them. Otherwise, respond with the result.";

/// Find the largest byte index <= `max` that is a UTF-8 char boundary.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut i = max;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn preview(s: &str) -> String {
    if s.len() > PREVIEW_BYTES {
        let end = floor_char_boundary(s, PREVIEW_BYTES);
        format!("{}... ({} chars)", &s[..end], s.len())
    } else {
        s.to_string()
    }
}

/// Per-model parameter overrides keyed by substring pattern.
/// E.g. ("kimi-k2.5", {temperature: 1.0}) forces temperature for Kimi K2.5.
#[derive(Debug, Clone, Default)]
pub struct ModelOverrides {
    pub entries: Vec<(String, OverrideParams)>,
}

#[derive(Debug, Clone, Default)]
pub struct OverrideParams {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl ModelOverrides {
    pub fn defaults() -> Self {
        Self {
            entries: vec![(
                "kimi-k2.5".to_string(),
                OverrideParams {
                    temperature: Some(1.0),
                    max_tokens: None,
                },
            )],
        }
    }

    /// Find overrides matching a model name (case-insensitive substring match).
    pub fn find(&self, model_name: &str) -> Option<&OverrideParams> {
        let lower = model_name.to_lowercase();
        self.entries
            .iter()
            .find(|(pattern, _)| lower.contains(pattern))
            .map(|(_, params)| params)
    }

    /// Temperature and max tokens to actually send for `model_name`.
    pub fn effective(&self, model_name: &str, temperature: f64, max_tokens: u64) -> (f64, u64) {
        match self.find(model_name) {
            Some(o) => (
                o.temperature.unwrap_or(temperature),
                o.max_tokens.unwrap_or(max_tokens),
            ),
            None => (temperature, max_tokens),
        }
    }
}

/// Something that happened while the agent answered.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Reasoning(String),
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        name: String,
        output: String,
    },
    Text(String),
}

/// Ordered events of one run.
#[derive(Debug, Clone, Default)]
pub struct AgentRun {
    pub events: Vec<AgentEvent>,
}

impl AgentRun {
    /// The model's final reply, if it produced one.
    pub fn final_text(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|e| match e {
            AgentEvent::Text(t) => Some(t.as_str()),
            _ => None,
        })
    }

    pub fn tools_used(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::ToolCall { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Runs the tutor: one user input in, events out.
///
/// Holds no conversation state; each call starts from the instruction and
/// the given input.
#[allow(deprecated)]
pub struct TutorRunner {
    pub model: CompletionModelHandle<'static>,
    pub definition: AgentDefinition,
    pub tools: ToolRegistry,
    pub model_overrides: ModelOverrides,
}

#[allow(deprecated)]
impl TutorRunner {
    pub fn new(
        model: CompletionModelHandle<'static>,
        definition: AgentDefinition,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            model,
            definition,
            tools,
            model_overrides: ModelOverrides::defaults(),
        }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .list()
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Run the LLM <> tool loop until the model produces a text response or
    /// the iteration limit is hit.
    pub async fn run(&self, user_input: &str) -> Result<AgentRun> {
        let def = &self.definition;
        let tool_defs = self.tool_definitions();
        let (temperature, max_tokens) =
            self.model_overrides
                .effective(&def.model, def.temperature, def.max_tokens);

        let mut run = AgentRun::default();
        let mut chat_history: Vec<Message> = Vec::new();
        let mut current_prompt = Message::User {
            content: OneOrMany::one(UserContent::Text(Text {
                text: user_input.to_string(),
            })),
        };
        let mut consecutive_errors: usize = 0;

        for iteration in 0..def.max_iterations {
            let mut all_messages = chat_history.clone();
            all_messages.push(current_prompt.clone());

            debug!(
                "LLM request [{}/{}]: {} messages, temp={temperature}, max_tokens={max_tokens}",
                iteration + 1,
                def.max_iterations,
                all_messages.len()
            );

            let request = CompletionRequest {
                preamble: Some(def.instruction.clone()),
                chat_history: OneOrMany::many(all_messages)
                    .unwrap_or_else(|_| OneOrMany::one(current_prompt.clone())),
                documents: Vec::new(),
                tools: tool_defs.clone(),
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                tool_choice: None,
                additional_params: None,
            };

            let llm_start = std::time::Instant::now();
            let response = self
                .model
                .completion(request)
                .await
                .map_err(|e| anyhow::anyhow!("LLM completion error: {e}"))?;
            let llm_elapsed = llm_start.elapsed();

            let mut text_content = String::new();
            let mut tool_calls = Vec::new();
            for content in response.choice.iter() {
                match content {
                    AssistantContent::Text(t) => text_content.push_str(&t.text),
                    AssistantContent::ToolCall(tc) => tool_calls.push(tc.clone()),
                    AssistantContent::Reasoning(r) => {
                        let reasoning = r.reasoning.join(" ");
                        debug!("Model reasoning: {reasoning}");
                        run.events.push(AgentEvent::Reasoning(reasoning));
                    }
                    _ => {}
                }
            }

            if tool_calls.is_empty() {
                if text_content.is_empty() {
                    text_content = "I've finished checking but have nothing to add.".into();
                }
                debug!(
                    "LLM response [{}/{}]: text ({} chars) in {:.1}s",
                    iteration + 1,
                    def.max_iterations,
                    text_content.len(),
                    llm_elapsed.as_secs_f64()
                );
                run.events.push(AgentEvent::Text(text_content));
                return Ok(run);
            }

            debug!(
                "LLM response [{}/{}]: {} tool call(s) in {:.1}s",
                iteration + 1,
                def.max_iterations,
                tool_calls.len(),
                llm_elapsed.as_secs_f64()
            );

            chat_history.push(current_prompt);
            chat_history.push(Message::Assistant {
                id: None,
                content: response.choice.clone(),
            });

            let mut tool_results: Vec<UserContent> = Vec::new();
            let mut iteration_has_success = false;
            let mut last_error = String::new();
            for tc in &tool_calls {
                let tool_name = &tc.function.name;
                let tool_args = &tc.function.arguments;
                info!(
                    "Tool call [{}/{}]: {tool_name}({})",
                    iteration + 1,
                    def.max_iterations,
                    preview(&tool_args.to_string())
                );
                run.events.push(AgentEvent::ToolCall {
                    name: tool_name.clone(),
                    arguments: tool_args.clone(),
                });

                let outcome = self
                    .tools
                    .execute_outcome(tool_name, tool_args.clone())
                    .await;
                let result = match outcome {
                    Ok(ToolOutcome::Success(r)) => {
                        iteration_has_success = true;
                        r
                    }
                    Ok(ToolOutcome::Failure(r)) => {
                        last_error.clone_from(&r);
                        r
                    }
                    Err(e) => {
                        let err = format!("Error executing {tool_name}: {e}");
                        last_error.clone_from(&err);
                        err
                    }
                };
                debug!("Tool result [{tool_name}]: {}", preview(&result));
                run.events.push(AgentEvent::ToolResult {
                    name: tool_name.clone(),
                    output: result.clone(),
                });

                tool_results.push(UserContent::ToolResult(ToolResult {
                    id: tc.id.clone(),
                    call_id: tc.call_id.clone(),
                    content: OneOrMany::one(ToolResultContent::Text(Text { text: result })),
                }));
            }

            // Stop when the model keeps producing calls that cannot run.
            if iteration_has_success {
                consecutive_errors = 0;
            } else {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    warn!(
                        "Circuit breaker: {consecutive_errors} consecutive iterations with all tool calls failing"
                    );
                    run.events.push(AgentEvent::Text(format!(
                        "I'm having trouble using my memory tools right now. \
                         Last error: {last_error}. Could you try again?"
                    )));
                    return Ok(run);
                }
            }

            tool_results.push(UserContent::Text(Text {
                text: CONTINUE_PROMPT.into(),
            }));
            current_prompt = Message::User {
                content: OneOrMany::many(tool_results).unwrap_or_else(|_| {
                    OneOrMany::one(UserContent::Text(Text {
                        text: CONTINUE_PROMPT.into(),
                    }))
                }),
            };
        }

        warn!(
            "Agent loop reached max iterations ({}) without final response",
            def.max_iterations
        );
        run.events.push(AgentEvent::Text(
            "I ran out of steps before finishing my feedback. Please send the sentence again."
                .to_string(),
        ));
        Ok(run)
    }
}
