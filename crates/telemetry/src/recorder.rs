//! Thread-safe trace recorder — turns the agent's trace events into
//! span trees and serves them back for inspection.

use std::sync::{PoisonError, RwLock};

use agentry_core::event::{TraceEvent, TraceEventKind, TraceSink};

use crate::model::{Span, SpanKind, Trace};

/// Maximum number of traces retained; finished ones are dropped first.
const MAX_TRACES: usize = 5_000;

/// An in-memory [`TraceSink`] that records one [`Trace`] per run.
///
/// Thread-safe via `RwLock`; concurrent runs sharing one recorder are kept
/// apart by their run id.
#[derive(Default)]
pub struct TraceRecorder {
    /// All recorded traces (most recent last).
    traces: RwLock<Vec<Trace>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Get the trace of a specific run.
    pub fn get_trace(&self, run_id: &str) -> Option<Trace> {
        let traces = self.traces.read().unwrap_or_else(PoisonError::into_inner);
        traces.iter().find(|t| t.run_id == run_id).cloned()
    }

    /// List recent traces (most recent first).
    pub fn recent_traces(&self, limit: usize) -> Vec<Trace> {
        let traces = self.traces.read().unwrap_or_else(PoisonError::into_inner);
        traces.iter().rev().take(limit).cloned().collect()
    }

    /// Total number of traces recorded.
    pub fn trace_count(&self) -> usize {
        self.traces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // ── Recording ─────────────────────────────────────────────────────

    fn start_trace(traces: &mut Vec<Trace>, trace: Trace) {
        Self::prune(traces, MAX_TRACES);
        traces.push(trace);
    }

    /// Make room below `limit`: oldest finished traces go first, then the
    /// oldest of any kind (runs dropped mid-flight never finish).
    fn prune(traces: &mut Vec<Trace>, limit: usize) {
        if traces.len() < limit {
            return;
        }
        let drain_count = (limit / 10).max(1);
        let mut removed = 0;
        traces.retain(|t| {
            if removed >= drain_count || !t.is_finished() {
                return true;
            }
            removed += 1;
            false
        });
        if traces.len() >= limit {
            let excess = traces.len() + 1 - limit;
            traces.drain(..excess.max(drain_count - removed).min(traces.len()));
        }
    }

    fn record(&self, event: TraceEvent) {
        let mut traces = self.traces.write().unwrap_or_else(PoisonError::into_inner);
        let at = event.timestamp;

        if let TraceEventKind::RunStarted { model, input } = event.kind {
            Self::start_trace(&mut traces, Trace::new(event.run_id, model, input, at));
            return;
        }

        let Some(trace) = traces.iter_mut().rev().find(|t| t.run_id == event.run_id) else {
            tracing::debug!(run_id = %event.run_id, "Trace event for unknown run ignored");
            return;
        };

        match event.kind {
            TraceEventKind::RunStarted { .. } => {}
            TraceEventKind::IterationStarted {
                iteration,
                message_count,
            } => {
                let span = Span::new(SpanKind::Iteration, format!("iteration {iteration}"), at)
                    .with_parent(trace.root_id())
                    .with_meta("iteration", iteration)
                    .with_meta("message_count", message_count);
                trace.spans.push(span);
            }
            TraceEventKind::IterationFinished {
                iteration,
                tool_calls,
            } => {
                if let Some(span) = trace.open_iteration_mut(iteration) {
                    span.metadata.insert("tool_calls".into(), tool_calls.into());
                    span.end(true, at);
                }
            }
            TraceEventKind::ToolCallStarted {
                iteration,
                call_id,
                tool_name,
            } => {
                let parent = trace.open_iteration_mut(iteration).map(|s| s.id.clone());
                let span = Span::new(SpanKind::ToolCall, tool_name, at)
                    .with_parent(parent)
                    .with_meta("call_id", call_id);
                trace.spans.push(span);
            }
            TraceEventKind::ToolCallFinished {
                call_id,
                success,
                duration_ms,
                ..
            } => {
                if let Some(span) = trace.open_tool_call_mut(&call_id) {
                    span.end(success, at);
                    span.duration_ms = Some(duration_ms);
                }
            }
            TraceEventKind::CompletionFailed { iteration, error } => {
                if let Some(span) = trace.open_iteration_mut(iteration) {
                    span.metadata.insert("error".into(), error.into());
                    span.end(false, at);
                }
            }
            TraceEventKind::RunFinished {
                outcome, answer, ..
            } => {
                trace.finish(outcome, answer, at);
            }
        }
    }
}

impl TraceSink for TraceRecorder {
    fn emit(&self, event: TraceEvent) {
        self.record(event);
    }
}
