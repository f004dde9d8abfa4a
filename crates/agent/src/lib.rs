//! The agent loop: the heart of Agentry.
//!
//! A run follows a **Complete → Act → Observe** cycle:
//!
//! 1. **Seed** the conversation with the system prompt and the user request
//! 2. **Complete**: send the history and the advertised tools to the model
//! 3. **If tool calls**: validate and execute them, append one response per
//!    call, loop back to step 2
//! 4. **If text**: that is the answer
//!
//! The loop stops when the model answers or the iteration budget is spent.

pub mod executor;
pub mod loop_runner;
pub mod options;
pub mod trace;

#[cfg(test)]
mod test_helpers;

pub use executor::{ToolExecutor, ToolOutcome};
pub use loop_runner::{AgentLoop, EMPTY_ANSWER_FALLBACK, NO_ANSWER_FALLBACK, RunResult, RunStatus};
pub use options::{AgentOptions, AgentOptionsBuilder};
pub use trace::RunTrace;
pub use tokio_util::sync::CancellationToken;
