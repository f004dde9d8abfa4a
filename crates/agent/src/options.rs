//! Immutable configuration for an [`AgentLoop`](crate::AgentLoop).

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use agentry_config::AgentSettings;
use agentry_core::error::AgentError;
use agentry_core::event::{NoopSink, TraceSink};
use agentry_core::provider::CompletionClient;
use agentry_core::tool::ToolRegistry;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Everything one agent needs to run, fixed for the agent's lifetime.
///
/// Built once via [`AgentOptions::builder`] or [`AgentOptions::from_settings`]
/// and shared read-only across runs.
#[derive(Clone)]
pub struct AgentOptions {
    model: String,
    system_prompt: String,
    max_iterations: NonZeroU32,
    tools: Arc<ToolRegistry>,
    client: Arc<dyn CompletionClient>,
    sink: Arc<dyn TraceSink>,
    run_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    parallel_tools: bool,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl AgentOptions {
    pub fn builder(
        client: Arc<dyn CompletionClient>,
        tools: Arc<ToolRegistry>,
    ) -> AgentOptionsBuilder {
        AgentOptionsBuilder {
            model: DEFAULT_MODEL.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tools,
            client,
            sink: Arc::new(NoopSink),
            run_timeout: None,
            tool_timeout: None,
            parallel_tools: true,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Options from the `[agent]` config section.
    pub fn from_settings(
        settings: &AgentSettings,
        client: Arc<dyn CompletionClient>,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self, AgentError> {
        let mut builder = Self::builder(client, tools)
            .model(&settings.model)
            .system_prompt(&settings.system_prompt)
            .max_iterations(settings.max_iterations)
            .parallel_tools(settings.parallel_tools);
        if let Some(t) = settings.temperature {
            builder = builder.temperature(t);
        }
        if let Some(n) = settings.max_tokens {
            builder = builder.max_tokens(n);
        }
        if let Some(secs) = settings.run_timeout_secs {
            builder = builder.run_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = settings.tool_timeout_secs {
            builder = builder.tool_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Replace the trace sink.
    pub fn with_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations.get()
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn client(&self) -> &Arc<dyn CompletionClient> {
        &self.client
    }

    pub fn sink(&self) -> &Arc<dyn TraceSink> {
        &self.sink
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout
    }

    pub fn parallel_tools(&self) -> bool {
        self.parallel_tools
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }
}

impl std::fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptions")
            .field("model", &self.model)
            .field("max_iterations", &self.max_iterations)
            .field("client", &self.client.name())
            .field("tools", &self.tools.names())
            .field("run_timeout", &self.run_timeout)
            .field("tool_timeout", &self.tool_timeout)
            .field("parallel_tools", &self.parallel_tools)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AgentOptions`]; validation happens in [`build`](Self::build).
pub struct AgentOptionsBuilder {
    model: String,
    system_prompt: String,
    max_iterations: u32,
    tools: Arc<ToolRegistry>,
    client: Arc<dyn CompletionClient>,
    sink: Arc<dyn TraceSink>,
    run_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    parallel_tools: bool,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl AgentOptionsBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Upper bound on completion calls per run. Must be positive.
    pub fn max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    /// Run one turn's tool calls concurrently (the default) or one by one.
    pub fn parallel_tools(mut self, enabled: bool) -> Self {
        self.parallel_tools = enabled;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn build(self) -> Result<AgentOptions, AgentError> {
        let max_iterations = NonZeroU32::new(self.max_iterations)
            .ok_or_else(|| AgentError::InvalidOptions("max_iterations must be positive".into()))?;

        if self.model.trim().is_empty() {
            return Err(AgentError::InvalidOptions("model must not be empty".into()));
        }

        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(AgentError::InvalidOptions(format!(
                "temperature must be between 0.0 and 2.0, got {t}"
            )));
        }

        if self.max_tokens == Some(0) {
            return Err(AgentError::InvalidOptions(
                "max_tokens must be positive".into(),
            ));
        }

        Ok(AgentOptions {
            model: self.model,
            system_prompt: self.system_prompt,
            max_iterations,
            tools: self.tools,
            client: self.client,
            sink: self.sink,
            run_timeout: self.run_timeout,
            tool_timeout: self.tool_timeout,
            parallel_tools: self.parallel_tools,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}
