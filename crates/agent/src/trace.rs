//! Per-run handle onto the configured trace sink.

use std::sync::Arc;

use agentry_core::event::{TraceEvent, TraceEventKind, TraceSink, emit_guarded};

/// Stamps events with the run id and delivers them to the sink.
#[derive(Clone)]
pub struct RunTrace {
    run_id: String,
    sink: Arc<dyn TraceSink>,
}

impl RunTrace {
    /// Open a trace with a fresh run id.
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            sink,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&self, kind: TraceEventKind) {
        emit_guarded(self.sink.as_ref(), TraceEvent::new(self.run_id.clone(), kind));
    }
}
