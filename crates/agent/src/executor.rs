//! Tool dispatch for one assistant turn.
//!
//! Every requested call yields exactly one [`ToolOutcome`], returned in
//! request order. Lookup failures, bad arguments, tool errors, timeouts and
//! panics all become error content for the model; nothing here aborts a run.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use agentry_core::error::ToolError;
use agentry_core::event::TraceEventKind;
use agentry_core::message::{Message, ToolCallRequest};
use agentry_core::tool::ToolRegistry;
use futures::FutureExt;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::trace::RunTrace;

/// The result of one tool call, ready to append as a tool response.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    pub success: bool,
    pub duration_ms: u64,
}

impl ToolOutcome {
    pub fn into_message(self) -> Message {
        Message::tool_result(self.call_id, self.content)
    }
}

/// Validates and invokes tool calls against a registry.
#[derive(Clone)]
pub struct ToolExecutor {
    tools: Arc<ToolRegistry>,
    parallel: bool,
    timeout: Option<Duration>,
}

impl ToolExecutor {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            parallel: true,
            timeout: None,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute every call of one turn and wait for all of them.
    ///
    /// Concurrent calls are polled in this task, so dropping the returned
    /// future cancels them all.
    pub async fn execute_all(
        &self,
        calls: &[ToolCallRequest],
        trace: &RunTrace,
        iteration: u32,
    ) -> Vec<ToolOutcome> {
        if self.parallel && calls.len() > 1 {
            debug!(count = calls.len(), "Executing tool calls concurrently");
            return join_all(calls.iter().map(|call| self.execute_traced(call, trace, iteration)))
                .await;
        }

        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.execute_traced(call, trace, iteration).await);
        }
        outcomes
    }

    async fn execute_traced(
        &self,
        call: &ToolCallRequest,
        trace: &RunTrace,
        iteration: u32,
    ) -> ToolOutcome {
        trace.emit(TraceEventKind::ToolCallStarted {
            iteration,
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
        });

        let outcome = self.execute(call).await;

        trace.emit(TraceEventKind::ToolCallFinished {
            iteration,
            call_id: outcome.call_id.clone(),
            tool_name: outcome.tool_name.clone(),
            success: outcome.success,
            duration_ms: outcome.duration_ms,
        });
        outcome
    }

    /// Execute a single call.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolOutcome {
        let start = Instant::now();
        let result = self.invoke(call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (content, success) = match result {
            Ok(output) => (output, true),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool call failed");
                (e.model_content(), false)
            }
        };

        ToolOutcome {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content,
            success,
            duration_ms,
        }
    }

    async fn invoke(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        let entry = self
            .tools
            .lookup(&call.name)
            .map_err(|_| ToolError::UnknownTool(call.name.clone()))?;
        let args = entry.validate(&call.arguments)?;

        let run = AssertUnwindSafe(entry.tool().execute(args)).catch_unwind();
        let caught = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => run.await,
        };

        caught.unwrap_or_else(|_| Err(ToolError::execution(&call.name, "tool panicked")))
    }
}
