//! Data model for recorded run traces and spans.

use agentry_core::event::RunOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Span ──────────────────────────────────────────────────────────────────

/// The kind of work a span represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// The whole run (user request → final answer).
    Run,
    /// One completion call plus its tool executions.
    Iteration,
    /// A single tool execution.
    ToolCall,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Iteration => write!(f, "iteration"),
            Self::ToolCall => write!(f, "tool_call"),
        }
    }
}

/// A single traced execution unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Unique identifier.
    pub id: String,
    /// Parent span id (None for the run span).
    pub parent_id: Option<String>,
    /// What kind of work this represents.
    pub kind: SpanKind,
    /// Human-readable label (e.g. tool name, "iteration 2").
    pub label: String,
    pub started_at: DateTime<Utc>,
    /// None while the span is still open.
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub success: Option<bool>,
    /// Arbitrary metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Span {
    /// Create a new span starting at `started_at`.
    pub fn new(kind: SpanKind, label: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            kind,
            label: label.into(),
            started_at,
            ended_at: None,
            duration_ms: None,
            success: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Set the parent span.
    pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Mark the span as ended at `at`.
    pub fn end(&mut self, success: bool, at: DateTime<Utc>) {
        self.ended_at = Some(at);
        self.duration_ms = Some(
            at.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.success = Some(success);
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// All spans recorded for one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub run_id: String,
    pub model: String,
    /// The user request that started the run.
    pub input: String,
    pub spans: Vec<Span>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<RunOutcome>,
    pub answer: Option<String>,
}

impl Trace {
    /// Create a trace with its root run span.
    pub fn new(
        run_id: impl Into<String>,
        model: impl Into<String>,
        input: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let model = model.into();
        let root = Span::new(SpanKind::Run, model.clone(), started_at);
        Self {
            run_id: run_id.into(),
            model,
            input: input.into(),
            spans: vec![root],
            started_at,
            ended_at: None,
            outcome: None,
            answer: None,
        }
    }

    pub fn root(&self) -> Option<&Span> {
        self.spans.iter().find(|s| s.kind == SpanKind::Run)
    }

    pub(crate) fn root_id(&self) -> Option<String> {
        self.root().map(|s| s.id.clone())
    }

    pub(crate) fn open_iteration_mut(&mut self, iteration: u32) -> Option<&mut Span> {
        self.spans.iter_mut().rev().find(|s| {
            s.kind == SpanKind::Iteration
                && s.is_open()
                && s.metadata.get("iteration").and_then(|v| v.as_u64()) == Some(iteration as u64)
        })
    }

    pub(crate) fn open_tool_call_mut(&mut self, call_id: &str) -> Option<&mut Span> {
        self.spans.iter_mut().rev().find(|s| {
            s.kind == SpanKind::ToolCall && s.is_open() && s.meta_str("call_id") == Some(call_id)
        })
    }

    /// Close the run span and every span left open.
    pub(crate) fn finish(&mut self, outcome: RunOutcome, answer: Option<String>, at: DateTime<Utc>) {
        let success = matches!(outcome, RunOutcome::Completed);
        for span in self.spans.iter_mut().filter(|s| s.is_open()) {
            let ok = if span.kind == SpanKind::Run { success } else { false };
            span.end(ok, at);
        }
        self.outcome = Some(outcome);
        self.answer = answer;
        self.ended_at = Some(at);
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Number of iterations (completion calls) in this trace.
    pub fn iteration_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| s.kind == SpanKind::Iteration)
            .count()
    }

    /// Number of tool executions in this trace.
    pub fn tool_call_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| s.kind == SpanKind::ToolCall)
            .count()
    }

    pub fn failed_tool_calls(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| s.kind == SpanKind::ToolCall && s.success == Some(false))
            .count()
    }

    /// Wall-clock duration of the run, if finished.
    pub fn duration_ms(&self) -> Option<u64> {
        self.root().and_then(|s| s.duration_ms)
    }

    /// Tool spans in the order they started.
    pub fn tool_calls(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|s| s.kind == SpanKind::ToolCall)
    }
}
