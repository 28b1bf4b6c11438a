use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quill_config::{
    find_config_path, load_config, quill_home, save_config, Config, ProviderConfig,
};
use quill_core::agent::{student_prompt, AgentDefinition, AgentEvent, TutorRunner};
use quill_core::memory::supermemory::API_KEY_ENV;
use quill_core::memory::{StudentMemory, SupermemoryClient};
use quill_core::tools::StudentTools;
#[allow(deprecated)]
use rig::client::completion::CompletionModelHandle;
use rig::client::{CompletionClient, Nothing};
use rig::providers::{anthropic, deepseek, gemini, groq, mistral, ollama, openai, openrouter};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const VALID_PROVIDERS: &str = "groq, anthropic, openai, ollama, openrouter, deepseek, gemini, mistral";

/// Render markdown text to the terminal using termimad.
fn render_markdown(text: &str) {
    let skin = termimad::MadSkin::default();
    skin.print_text(text);
}

#[derive(Parser)]
#[command(name = "quill", about = "Writing tutor agent with student memory", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the tutor to check writing (interactive unless --message is given)
    Agent {
        /// Single message mode (non-interactive)
        #[arg(short, long)]
        message: Option<String>,

        /// Student the writing belongs to
        #[arg(short, long)]
        student: Option<String>,
    },
    /// Show a student's past mistakes
    Mistakes {
        #[arg(short, long)]
        student: String,

        /// Kind of error to look for
        #[arg(short = 't', long)]
        error_type: Option<String>,
    },
    /// Show a student's learning profile
    Profile {
        #[arg(short, long)]
        student: String,
    },
    /// Record a mistake without going through the model
    Save {
        #[arg(short, long)]
        student: String,
        /// Mistake category (spelling, grammar, punctuation, ...)
        #[arg(long = "type")]
        mistake_type: String,
        /// What went wrong, e.g. "pley -> play"
        #[arg(long)]
        details: String,
        /// The sentence containing the mistake
        #[arg(long)]
        sentence: String,
    },
    /// Show configuration and credential status
    Status,
    /// Write a config file
    Onboard {
        /// Skip interactive prompts and write defaults
        #[arg(long)]
        non_interactive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let base_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = format!("{base_filter},quill_core::agent=debug");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(find_config_path);

    match cli.command {
        Commands::Onboard { non_interactive } => run_onboard(&config_path, non_interactive),
        Commands::Status => run_status(&config_path),
        Commands::Agent { message, student } => {
            let config = load_config(&config_path)?;
            let runner = build_runner(&config)?;
            let student = student_or_default(student, &config);
            match message {
                Some(msg) => run_single_message(&runner, &student, &msg).await,
                None => run_interactive(&runner, student).await,
            }
        }
        Commands::Mistakes {
            student,
            error_type,
        } => {
            let config = load_config(&config_path)?;
            let tools = build_student_tools(&config)?;
            let outcome = tools
                .get_past_mistakes(&student, error_type.as_deref())
                .await;
            println!("{outcome}");
            Ok(())
        }
        Commands::Profile { student } => {
            let config = load_config(&config_path)?;
            let tools = build_student_tools(&config)?;
            println!("{}", tools.get_learning_profile(&student).await);
            Ok(())
        }
        Commands::Save {
            student,
            mistake_type,
            details,
            sentence,
        } => {
            let config = load_config(&config_path)?;
            let tools = build_student_tools(&config)?;
            let outcome = tools
                .save_mistake(&student, &mistake_type, &details, &sentence)
                .await;
            if !outcome.is_success() {
                anyhow::bail!("{outcome}");
            }
            println!("{outcome}");
            Ok(())
        }
    }
}

/// The student named on the command line, else the configured default.
fn student_or_default(student: Option<String>, config: &Config) -> String {
    student.unwrap_or_else(|| config.agent.default_student_id.clone())
}

/// Resolve an API key from config, falling back to an environment variable.
fn resolve_api_key(provider_cfg: Option<&ProviderConfig>, env_var: &str) -> Option<String> {
    provider_cfg
        .and_then(|c| c.api_key.clone())
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.is_empty()))
}

/// Env var consulted for a provider's key, if it needs one.
fn provider_env_var(provider: &str) -> Option<&'static str> {
    match provider {
        "groq" => Some("GROQ_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        _ => None,
    }
}

/// The `providers.<name>` section, if the provider is known and configured.
fn provider_config<'a>(config: &'a Config, provider: &str) -> Option<&'a ProviderConfig> {
    let p = &config.providers;
    let section = match provider {
        "groq" => &p.groq,
        "anthropic" => &p.anthropic,
        "openai" => &p.openai,
        "openrouter" => &p.openrouter,
        "deepseek" => &p.deepseek,
        "gemini" => &p.gemini,
        "mistral" => &p.mistral,
        "ollama" => &p.ollama,
        _ => return None,
    };
    section.as_ref()
}

fn require_key(config: &Config, provider: &str, label: &str) -> Result<String> {
    let env_var = provider_env_var(provider).unwrap_or("API_KEY");
    resolve_api_key(provider_config(config, provider), env_var).ok_or_else(|| {
        anyhow::anyhow!(
            "{label} provider selected but no API key found. \
             Set providers.{provider}.apiKey in config.json or {env_var} env var."
        )
    })
}

/// Create a completion model for the agent's provider + model.
#[allow(deprecated)]
fn create_model_for(
    provider: &str,
    model_name: &str,
    config: &Config,
) -> Result<CompletionModelHandle<'static>> {
    let api_base = provider_config(config, provider)
        .and_then(|c| c.api_base.clone())
        .filter(|b| !b.is_empty());

    match provider {
        "groq" => {
            let key = require_key(config, provider, "Groq")?;
            let client: groq::Client = groq::Client::new(&key)
                .map_err(|e| anyhow::anyhow!("Failed to create Groq client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using Groq provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        "anthropic" => {
            let key = require_key(config, provider, "Anthropic")?;
            let client: anthropic::Client = anthropic::Client::builder()
                .api_key(&key)
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create Anthropic client: {e}"))?;
            let model = client.completion_model(model_name).with_prompt_caching();
            tracing::info!(
                "Using Anthropic provider with model '{model_name}' (prompt caching enabled)"
            );
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        "openai" => {
            let key = require_key(config, provider, "OpenAI")?;
            let mut builder = openai::CompletionsClient::builder().api_key(&key);
            if let Some(ref base) = api_base {
                builder = builder.base_url(base);
                tracing::info!("Using OpenAI provider with custom base: {base}");
            }
            let client: openai::CompletionsClient = builder
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create OpenAI client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using OpenAI provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        "ollama" => {
            let mut builder = ollama::Client::builder().api_key(Nothing);
            if let Some(ref base) = api_base {
                builder = builder.base_url(base);
            }
            let client: ollama::Client = builder
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create Ollama client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using Ollama provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        "openrouter" => {
            let key = require_key(config, provider, "OpenRouter")?;
            let client: openrouter::Client = openrouter::Client::new(&key)
                .map_err(|e| anyhow::anyhow!("Failed to create OpenRouter client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using OpenRouter provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        "deepseek" => {
            let key = require_key(config, provider, "DeepSeek")?;
            let client: deepseek::Client = deepseek::Client::new(&key)
                .map_err(|e| anyhow::anyhow!("Failed to create DeepSeek client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using DeepSeek provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        "gemini" => {
            let key = require_key(config, provider, "Gemini")?;
            let client: gemini::Client = gemini::Client::new(key)
                .map_err(|e| anyhow::anyhow!("Failed to create Gemini client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using Gemini provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        "mistral" => {
            let key = require_key(config, provider, "Mistral")?;
            let client: mistral::Client = mistral::Client::new(&key)
                .map_err(|e| anyhow::anyhow!("Failed to create Mistral client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using Mistral provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(model)))
        }

        other => {
            anyhow::bail!("Unknown provider '{other}'. Valid providers: {VALID_PROVIDERS}");
        }
    }
}

/// Build the memory client once and wrap it in the student tools.
fn build_student_tools(config: &Config) -> Result<Arc<StudentTools>> {
    let client = SupermemoryClient::from_config(&config.memory)
        .context("failed to set up memory service client")?;
    let memory = StudentMemory::new(Arc::new(client));
    Ok(Arc::new(
        StudentTools::new(memory).with_history_limit(config.memory.history_limit),
    ))
}

fn build_runner(config: &Config) -> Result<TutorRunner> {
    let definition = AgentDefinition::from_options(&config.agent)?;
    let model = create_model_for(&definition.provider, &definition.model, config)?;
    let tools = build_student_tools(config)?;
    let registry = definition.build_registry(&tools);
    tracing::info!(
        "Agent '{}' ready with tools: {}",
        definition.name,
        registry.names().join(", ")
    );
    Ok(TutorRunner::new(model, definition, registry))
}

fn print_tool_events(events: &[AgentEvent]) {
    for event in events {
        if let AgentEvent::ToolCall { name, .. } = event {
            println!("  ↳ {name}");
        }
    }
}

async fn run_single_message(runner: &TutorRunner, student: &str, message: &str) -> Result<()> {
    let run = runner.run(&student_prompt(student, message)).await?;
    for event in &run.events {
        if let AgentEvent::Text(text) = event {
            render_markdown(text);
        }
    }
    Ok(())
}

async fn run_interactive(runner: &TutorRunner, mut student: String) -> Result<()> {
    let history_dir = quill_home();
    std::fs::create_dir_all(&history_dir)?;
    let history_path = history_dir.join("history");

    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    println!("quill tutor (student: {student}; type /help for commands, Ctrl-D to quit)");
    println!();

    let result = loop {
        let readline = rl.readline(&format!("{student}> "));
        match readline {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(input);

                if matches!(input, "exit" | "quit" | "/exit" | "/quit" | ":q") {
                    break Ok(());
                }

                if input == "/help" {
                    println!("Commands:");
                    println!("  /student <id>  - Switch to another student");
                    println!("  /help          - Show this help");
                    println!("  /quit          - Exit");
                    println!();
                    continue;
                }

                if let Some(rest) = input.strip_prefix("/student") {
                    let id = rest.trim();
                    if id.is_empty() {
                        println!("Current student: {student}");
                    } else {
                        student = id.to_string();
                        println!("Now tutoring {student}.");
                    }
                    println!();
                    continue;
                }

                match runner.run(&student_prompt(&student, input)).await {
                    Ok(run) => {
                        print_tool_events(&run.events);
                        println!();
                        if let Some(text) = run.final_text() {
                            render_markdown(text);
                        }
                        println!();
                    }
                    Err(e) => {
                        eprintln!("Error: {e}");
                        println!();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break Ok(());
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break Ok(());
            }
        }
    };

    let _ = rl.save_history(&history_path);
    result
}

fn prompt_with_default(prompt: &str, default: &str) -> Result<String> {
    use std::io::{self, Write};
    print!("{prompt} [{default}]: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Write a config file, prompting for the model and credentials unless told not to.
fn run_onboard(config_path: &Path, non_interactive: bool) -> Result<()> {
    if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
        println!("To reset, delete it and run `quill onboard` again.");
        return Ok(());
    }

    let mut cfg = Config::default();
    if !non_interactive {
        println!("Interactive setup");
        cfg.agent.provider = prompt_with_default("Model provider", &cfg.agent.provider)?;
        cfg.agent.model = prompt_with_default("Model", &cfg.agent.model)?;
        cfg.agent.default_student_id =
            prompt_with_default("Default student id", &cfg.agent.default_student_id)?;

        let memory_key = prompt_with_default(
            &format!("Supermemory API key (empty to use {API_KEY_ENV})"),
            "",
        )?;
        if !memory_key.is_empty() {
            cfg.memory.api_key = Some(memory_key);
        }
    }

    save_config(config_path, &cfg)?;
    println!("Created config: {}", config_path.display());
    println!();
    println!("Next steps:");
    if let Some(env_var) = provider_env_var(&cfg.agent.provider) {
        println!(
            "  1. Set {env_var} (or providers.{}.apiKey in the config)",
            cfg.agent.provider
        );
    }
    println!("  2. Run `quill agent -m \"Check this sentence: I pley football\"`");
    Ok(())
}

fn configured(flag: bool) -> &'static str {
    if flag {
        "configured"
    } else {
        "not configured"
    }
}

/// Show configuration summary and which credentials are present.
fn run_status(config_path: &Path) -> Result<()> {
    println!("quill status");
    println!();

    if config_path.exists() {
        println!("  Config:    {} (found)", config_path.display());
    } else {
        println!(
            "  Config:    {} (not found, using defaults; run `quill onboard`)",
            config_path.display()
        );
    }

    let config = load_config(config_path)?;
    let agent = &config.agent;
    println!("  Agent:     {} (schema v{})", agent.name, agent.schema_version);
    println!("  Provider:  {}", agent.provider);
    println!("  Model:     {}", agent.model);
    println!("  Tools:     {}", agent.tools.join(", "));
    println!("  Student:   {} (default)", agent.default_student_id);
    if let Err(e) = AgentDefinition::from_options(agent) {
        println!("  Problem:   {e}");
    }
    println!();

    let model_key = match provider_env_var(&agent.provider) {
        Some(env_var) => {
            resolve_api_key(provider_config(&config, &agent.provider), env_var).is_some()
        }
        None => true,
    };
    let memory_key = config.memory.api_key.as_deref().is_some_and(|k| !k.is_empty())
        || std::env::var(API_KEY_ENV).is_ok_and(|k| !k.is_empty());

    println!("  Credentials:");
    println!("    Model provider: {}", configured(model_key));
    println!("    Memory service: {}", configured(memory_key));
    println!("    Memory URL:     {}", config.memory.base_url);
    println!();

    Ok(())
}
