//! Run tracing for Agentry.
//!
//! [`TraceRecorder`] is a `TraceSink` that folds the agent loop's trace
//! events into span trees: one trace per run, with iteration and tool-call
//! spans beneath the run span.

pub mod model;
pub mod recorder;

pub use model::{Span, SpanKind, Trace};
pub use recorder::TraceRecorder;
