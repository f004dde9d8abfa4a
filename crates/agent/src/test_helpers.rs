//! Shared test helpers for agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use agentry_core::error::{CompletionError, ToolError};
use agentry_core::event::{TraceEvent, TraceSink};
use agentry_core::message::ToolCallRequest;
use agentry_core::provider::{CompletionClient, CompletionRequest, CompletionResponse, Usage};
use agentry_core::tool::Tool;
use async_trait::async_trait;
use serde_json::{Value, json};

/// A completion client that replays a script of responses.
///
/// Records every request it receives. Panics if called more times than
/// scripted.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<CompletionResponse, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Duration,
}

impl ScriptedClient {
    pub fn new(script: Vec<Result<CompletionResponse, CompletionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Sleep for `delay` after recording each request, before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A client that answers every call with the same response.
    pub fn repeating(response: CompletionResponse, times: usize) -> Self {
        Self::new(vec![Ok(response); times])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedClient: no response scripted for call #{call}"))
    }
}

/// A plain text turn.
pub fn text(content: &str) -> CompletionResponse {
    CompletionResponse {
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        ..CompletionResponse::text(content)
    }
}

/// A turn requesting the given `(id, tool, arguments)` calls.
pub fn tool_calls(calls: &[(&str, &str, Value)]) -> CompletionResponse {
    CompletionResponse {
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        ..CompletionResponse::with_tool_calls(
            calls
                .iter()
                .map(|(id, name, args)| ToolCallRequest::new(*id, *name, args.to_string()))
                .collect(),
        )
    }
}

/// Records every event it receives.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TraceSink for CollectingSink {
    fn emit(&self, event: TraceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// `lookup{email}` → "user found: <email>".
pub struct LookupTool;

#[async_trait]
impl Tool for LookupTool {
    fn name(&self) -> &str {
        "lookup"
    }
    fn description(&self) -> &str {
        "Looks up a user by email"
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "email": { "type": "string" } },
            "required": ["email"]
        })
    }
    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        Ok(format!(
            "user found: {}",
            arguments["email"].as_str().unwrap_or_default()
        ))
    }
}

/// Always fails with an execution error.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _arguments: Value) -> Result<String, ToolError> {
        Err(ToolError::execution("failing", "mail server unreachable"))
    }
}

/// Panics when executed.
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "panicking"
    }
    fn description(&self) -> &str {
        "Panics"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _arguments: Value) -> Result<String, ToolError> {
        panic!("tool blew up");
    }
}

/// Sleeps, then replies "<name> done".
pub struct SleepyTool {
    name: String,
    delay: Duration,
}

impl SleepyTool {
    pub fn new(name: &str, delay_ms: u64) -> Self {
        Self {
            name: name.into(),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

#[async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Takes its time"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _arguments: Value) -> Result<String, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(format!("{} done", self.name))
    }
}
