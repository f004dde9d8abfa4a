//! Trace events — structured observability for agent runs.
//!
//! The loop emits a [`TraceEvent`] at each step of a run into a
//! [`TraceSink`]. Sinks are fire-and-forget: the driver never looks at what
//! they do with an event, and a sink that panics does not affect the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::broadcast;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Exhausted,
    Failed,
    Cancelled,
}

/// One observable step of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEventKind {
    RunStarted {
        model: String,
        input: String,
    },
    IterationStarted {
        iteration: u32,
        message_count: usize,
    },
    IterationFinished {
        iteration: u32,
        tool_calls: usize,
    },
    ToolCallStarted {
        iteration: u32,
        call_id: String,
        tool_name: String,
    },
    ToolCallFinished {
        iteration: u32,
        call_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
    },
    CompletionFailed {
        iteration: u32,
        error: String,
    },
    RunFinished {
        iterations: u32,
        outcome: RunOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

impl TraceEvent {
    pub fn new(run_id: impl Into<String>, kind: TraceEventKind) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Receives trace events from agent runs.
pub trait TraceSink: Send + Sync {
    fn emit(&self, event: TraceEvent);
}

/// Deliver an event, containing any panic raised by the sink.
pub fn emit_guarded(sink: &dyn TraceSink, event: TraceEvent) {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| sink.emit(event)));
    if result.is_err() {
        tracing::warn!("Trace sink panicked; event dropped");
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn emit(&self, _event: TraceEvent) {}
}

/// Forwards events to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn emit(&self, event: TraceEvent) {
        let run_id = event.run_id.as_str();
        match &event.kind {
            TraceEventKind::RunStarted { model, .. } => {
                tracing::info!(run_id, model = %model, "Run started");
            }
            TraceEventKind::IterationStarted {
                iteration,
                message_count,
            } => {
                tracing::debug!(run_id, iteration, message_count, "Iteration started");
            }
            TraceEventKind::IterationFinished {
                iteration,
                tool_calls,
            } => {
                tracing::debug!(run_id, iteration, tool_calls, "Iteration finished");
            }
            TraceEventKind::ToolCallStarted {
                tool_name, call_id, ..
            } => {
                tracing::debug!(run_id, tool = %tool_name, call_id = %call_id, "Tool call started");
            }
            TraceEventKind::ToolCallFinished {
                tool_name,
                success,
                duration_ms,
                ..
            } => {
                tracing::info!(run_id, tool = %tool_name, success, duration_ms, "Tool call finished");
            }
            TraceEventKind::CompletionFailed { iteration, error } => {
                tracing::warn!(run_id, iteration, error = %error, "Completion failed");
            }
            TraceEventKind::RunFinished {
                iterations,
                outcome,
                ..
            } => {
                tracing::info!(run_id, iterations, outcome = ?outcome, "Run finished");
            }
        }
    }
}

/// A broadcast-based sink for live subscribers.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Slow
/// subscribers lag and lose events rather than block the run.
pub struct BroadcastSink {
    sender: broadcast::Sender<Arc<TraceEvent>>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TraceEvent>> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl TraceSink for BroadcastSink {
    fn emit(&self, event: TraceEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }
}

/// Fans each event out to several sinks.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn TraceSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl TraceSink for MultiSink {
    fn emit(&self, event: TraceEvent) {
        for sink in &self.sinks {
            emit_guarded(sink.as_ref(), event.clone());
        }
    }
}
