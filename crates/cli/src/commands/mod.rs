//! CLI command implementations.

pub mod config_cmd;
pub mod demo;
pub mod run;
pub mod tools;

use std::sync::Arc;

use agentry_agent::{AgentLoop, AgentOptions, CancellationToken};
use agentry_config::{AgentSettings, AppConfig};
use agentry_core::event::TraceSink;
use agentry_core::provider::CompletionClient;
use agentry_tools::{CUSTOMER_SERVICE_PROMPT, ToolSet, UserService};

/// Command-line overrides applied on top of the loaded config.
#[derive(Debug, Default)]
pub struct Overrides {
    pub max_iterations: Option<u32>,
    pub model: Option<String>,
}

impl Overrides {
    pub fn apply(self, config: &mut AppConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(max) = self.max_iterations {
            config.agent.max_iterations = max;
        }
        if let Some(model) = self.model {
            config.agent.model = model;
        }
        config.validate()?;
        Ok(())
    }
}

/// Load the config and fail early, with setup instructions, when no key is set.
pub fn load_config(overrides: Overrides) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    overrides.apply(&mut config)?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY=sk-...        (OpenAI direct)");
        eprintln!("    BRAINTRUST_API_KEY=...       (via the Braintrust proxy)");
        eprintln!("    AGENTRY_API_KEY=...          (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(config)
}

/// The configured system prompt, or the customer-service prompt when the
/// config leaves the generic default in place.
pub fn system_prompt(settings: &AgentSettings) -> &str {
    if settings.system_prompt == AgentSettings::default().system_prompt {
        CUSTOMER_SERVICE_PROMPT
    } else {
        &settings.system_prompt
    }
}

/// Assemble an agent over `tool_set` backed by `service`.
pub fn build_agent(
    config: &AppConfig,
    client: Arc<dyn CompletionClient>,
    tool_set: ToolSet,
    service: UserService,
    sink: Arc<dyn TraceSink>,
) -> Result<AgentLoop, Box<dyn std::error::Error>> {
    let tools = Arc::new(tool_set.registry(service)?);
    let mut settings = config.agent.clone();
    settings.system_prompt = system_prompt(&config.agent).to_string();

    let options = AgentOptions::from_settings(&settings, client, tools)?.with_sink(sink);
    Ok(AgentLoop::new(options))
}

/// A token cancelled when the user presses Ctrl+C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            trigger.cancel();
        }
    });
    token
}
