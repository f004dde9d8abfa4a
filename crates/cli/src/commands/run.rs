//! `agentry run` — answer a single request.

use std::sync::Arc;

use agentry_agent::{RunResult, RunStatus};
use agentry_core::event::{LogSink, MultiSink};
use agentry_telemetry::TraceRecorder;
use agentry_tools::{ToolSet, UserService};

use super::{Overrides, build_agent, cancel_on_ctrl_c, load_config};

pub async fn run(
    message: &str,
    tool_set: ToolSet,
    overrides: Overrides,
    print_trace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let client = agentry_providers::build_client(&config)?;

    let recorder = Arc::new(TraceRecorder::new());
    let sink = MultiSink::new()
        .with(Arc::new(LogSink))
        .with(recorder.clone());
    let agent = build_agent(
        &config,
        client,
        tool_set,
        UserService::default(),
        Arc::new(sink),
    )?;

    eprint!("  Thinking...");
    let result = agent.run_with_cancel(message, cancel_on_ctrl_c()).await;
    eprint!("\r              \r");
    let result = result?;

    println!("{}", render(&result));

    if print_trace && let Some(trace) = recorder.get_trace(&result.run_id) {
        println!("{}", serde_json::to_string_pretty(&trace)?);
    }

    Ok(())
}

/// The answer, with a note when the iteration budget ran out.
pub fn render(result: &RunResult) -> String {
    match result.status {
        RunStatus::Completed => result.answer_or_fallback().to_string(),
        RunStatus::Exhausted => match result.answer.as_deref() {
            Some(partial) if !partial.is_empty() => format!(
                "{partial}\n\n[incomplete: stopped after {} iterations]",
                result.iterations
            ),
            _ => result.answer_or_fallback().to_string(),
        },
    }
}
