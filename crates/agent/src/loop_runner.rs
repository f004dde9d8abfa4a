//! The agent loop implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use agentry_core::conversation::ConversationState;
use agentry_core::error::{AgentError, Result};
use agentry_core::event::{RunOutcome, TraceEventKind};
use agentry_core::message::{Message, ToolCallRequest};
use agentry_core::provider::{CompletionRequest, Usage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::executor::ToolExecutor;
use crate::options::AgentOptions;
use crate::trace::RunTrace;

/// Returned by [`RunResult::answer_or_fallback`] when an exhausted run has no answer.
pub const NO_ANSWER_FALLBACK: &str =
    "Agent reached maximum iterations without completing the task.";

/// Returned by [`RunResult::answer_or_fallback`] when the model finished with an empty turn.
pub const EMPTY_ANSWER_FALLBACK: &str = "The agent returned no answer.";

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The model answered without requesting tools.
    Completed,
    /// The iteration budget ran out while the model still wanted tools.
    Exhausted,
}

/// The outcome of one run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    /// Final answer; on exhaustion, the last assistant text if any.
    pub answer: Option<String>,
    pub iterations: u32,
    pub completion_calls: u32,
    pub tool_calls: u32,
    pub usage: Usage,
    /// The full transcript, system prompt first.
    pub messages: Vec<Message>,
}

impl RunResult {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn answer_or_fallback(&self) -> &str {
        match self.answer.as_deref() {
            Some(answer) if !answer.is_empty() => answer,
            _ => match self.status {
                RunStatus::Completed => EMPTY_ANSWER_FALLBACK,
                RunStatus::Exhausted => NO_ANSWER_FALLBACK,
            },
        }
    }
}

enum LoopState {
    /// `completed` iterations are done; the next completion call is number `completed + 1`.
    Running { completed: u32 },
    AwaitingToolResults {
        iteration: u32,
        calls: Vec<ToolCallRequest>,
    },
    Done(Option<String>),
    Exhausted,
}

/// Per-run counters, kept outside the driving future so they survive
/// cancellation.
#[derive(Default)]
struct Progress {
    iterations: AtomicU32,
}

/// Drives completion calls and tool dispatch until the model answers or the
/// iteration budget runs out.
///
/// One `AgentLoop` can serve many concurrent runs; each run owns its own
/// conversation.
pub struct AgentLoop {
    options: Arc<AgentOptions>,
    executor: ToolExecutor,
}

impl AgentLoop {
    pub fn new(options: AgentOptions) -> Self {
        let executor = ToolExecutor::new(options.tools().clone())
            .with_parallel(options.parallel_tools())
            .with_timeout(options.tool_timeout());
        Self {
            options: Arc::new(options),
            executor,
        }
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Run the agent on one user request.
    pub async fn run(&self, input: &str) -> Result<RunResult> {
        self.run_with_cancel(input, CancellationToken::new()).await
    }

    /// Run the agent, aborting in-flight work when `cancel` fires or the
    /// configured run timeout elapses.
    pub async fn run_with_cancel(
        &self,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let trace = RunTrace::new(self.options.sink().clone());
        let progress = Progress::default();

        info!(
            run_id = %trace.run_id(),
            model = %self.options.model(),
            max_iterations = self.options.max_iterations(),
            "Starting agent run"
        );
        trace.emit(TraceEventKind::RunStarted {
            model: self.options.model().to_string(),
            input: input.to_string(),
        });

        let drive = self.drive(input, &trace, &progress);
        let result = match self.options.run_timeout() {
            Some(limit) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AgentError::Cancelled {
                    iterations: progress.iterations.load(Ordering::Relaxed),
                }),
                timed = tokio::time::timeout(limit, drive) => timed.unwrap_or_else(|_| {
                    Err(AgentError::Timeout {
                        timeout_ms: limit.as_millis() as u64,
                        iterations: progress.iterations.load(Ordering::Relaxed),
                    })
                }),
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AgentError::Cancelled {
                    iterations: progress.iterations.load(Ordering::Relaxed),
                }),
                r = drive => r,
            },
        };

        let iterations = progress.iterations.load(Ordering::Relaxed);
        let (outcome, answer) = match &result {
            Ok(run) => (
                match run.status {
                    RunStatus::Completed => RunOutcome::Completed,
                    RunStatus::Exhausted => RunOutcome::Exhausted,
                },
                run.answer.clone(),
            ),
            Err(AgentError::Cancelled { .. }) => (RunOutcome::Cancelled, None),
            Err(e) => {
                warn!(run_id = %trace.run_id(), error = %e, "Agent run failed");
                (RunOutcome::Failed, None)
            }
        };
        trace.emit(TraceEventKind::RunFinished {
            iterations,
            outcome,
            answer,
        });
        info!(run_id = %trace.run_id(), iterations, outcome = ?outcome, "Agent run finished");

        result
    }

    async fn drive(&self, input: &str, trace: &RunTrace, progress: &Progress) -> Result<RunResult> {
        let opts = &self.options;
        let tools = opts.tools().describe_all();
        let max_iterations = opts.max_iterations();

        let mut conversation = ConversationState::seed(opts.system_prompt(), input);
        let mut completion_calls: u32 = 0;
        let mut tool_calls: u32 = 0;
        let mut usage = Usage::default();
        let mut state = LoopState::Running { completed: 0 };

        loop {
            state = match state {
                LoopState::Running { completed } if completed >= max_iterations => {
                    LoopState::Exhausted
                }

                LoopState::Running { completed } => {
                    let iteration = completed + 1;
                    progress.iterations.store(iteration, Ordering::Relaxed);
                    debug!(run_id = %trace.run_id(), iteration, "Agent loop iteration");
                    trace.emit(TraceEventKind::IterationStarted {
                        iteration,
                        message_count: conversation.len(),
                    });

                    let request = CompletionRequest {
                        model: opts.model().to_string(),
                        messages: conversation.snapshot().to_vec(),
                        tools: tools.clone(),
                        temperature: opts.temperature(),
                        max_tokens: opts.max_tokens(),
                    };

                    completion_calls += 1;
                    let response = match opts.client().complete(request).await {
                        Ok(response) => response,
                        Err(e) => {
                            trace.emit(TraceEventKind::CompletionFailed {
                                iteration,
                                error: e.to_string(),
                            });
                            return Err(e.into());
                        }
                    };

                    if let Some(u) = response.usage {
                        usage.prompt_tokens += u.prompt_tokens;
                        usage.completion_tokens += u.completion_tokens;
                        usage.total_tokens += u.total_tokens;
                    }

                    let answer = response.answer_text().map(str::to_owned);
                    let calls = response.tool_calls.clone();
                    conversation.append(response.into_message())?;

                    if calls.is_empty() {
                        trace.emit(TraceEventKind::IterationFinished {
                            iteration,
                            tool_calls: 0,
                        });
                        LoopState::Done(answer)
                    } else {
                        // Tool calls win over any text in the same turn
                        debug!(
                            run_id = %trace.run_id(),
                            iteration,
                            tool_count = calls.len(),
                            "Executing tool calls"
                        );
                        LoopState::AwaitingToolResults { iteration, calls }
                    }
                }

                LoopState::AwaitingToolResults { iteration, calls } => {
                    let outcomes = self.executor.execute_all(&calls, trace, iteration).await;
                    tool_calls += outcomes.len() as u32;
                    for outcome in outcomes {
                        conversation.append(outcome.into_message())?;
                    }
                    trace.emit(TraceEventKind::IterationFinished {
                        iteration,
                        tool_calls: calls.len(),
                    });
                    LoopState::Running {
                        completed: iteration,
                    }
                }

                LoopState::Done(answer) => {
                    return Ok(RunResult {
                        run_id: trace.run_id().to_string(),
                        status: RunStatus::Completed,
                        answer,
                        iterations: progress.iterations.load(Ordering::Relaxed),
                        completion_calls,
                        tool_calls,
                        usage,
                        messages: conversation.into_messages(),
                    });
                }

                LoopState::Exhausted => {
                    warn!(
                        run_id = %trace.run_id(),
                        max_iterations,
                        "Max iterations reached without a final answer"
                    );
                    let answer = conversation.last_assistant_text().map(str::to_owned);
                    return Ok(RunResult {
                        run_id: trace.run_id().to_string(),
                        status: RunStatus::Exhausted,
                        answer,
                        iterations: progress.iterations.load(Ordering::Relaxed),
                        completion_calls,
                        tool_calls,
                        usage,
                        messages: conversation.into_messages(),
                    });
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        CollectingSink, FailingTool, LookupTool, ScriptedClient, SleepyTool, text, tool_calls,
    };
    use agentry_core::error::CompletionError;
    use agentry_core::message::Role;
    use agentry_core::provider::{CompletionClient, CompletionResponse};
    use agentry_core::tool::ToolRegistry;
    use agentry_providers::{RetryPolicy, RetryingClient};
    use agentry_telemetry::TraceRecorder;
    use serde_json::json;
    use std::time::Duration;

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(
            ToolRegistry::new()
                .with(LookupTool)
                .unwrap()
                .with(FailingTool)
                .unwrap()
                .with(SleepyTool::new("slow", 200))
                .unwrap()
                .with(SleepyTool::new("stuck", 60_000))
                .unwrap(),
        )
    }

    fn agent(client: Arc<dyn CompletionClient>, max_iterations: u32) -> AgentLoop {
        AgentLoop::new(
            AgentOptions::builder(client, registry())
                .system_prompt("You are a test agent.")
                .max_iterations(max_iterations)
                .build()
                .unwrap(),
        )
    }

    fn tool_contents(messages: &[Message]) -> Vec<(String, String)> {
        messages
            .iter()
            .filter_map(|m| match m {
                Message::Tool {
                    tool_call_id,
                    content,
                } => Some((tool_call_id.clone(), content.clone())),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn plain_text_answer_completes_in_one_call() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(text("Hello! How can I help?"))]));
        let result = agent(client.clone(), 10).run("Hello!").await.unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.answer.as_deref(), Some("Hello! How can I help?"));
        assert_eq!(result.iterations, 1);
        assert_eq!(result.tool_calls, 0);
        assert_eq!(client.call_count(), 1);
        // System + User + Assistant
        assert_eq!(result.messages.len(), 3);
        assert_eq!(result.usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn request_carries_model_history_and_tools() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(text("hi"))]));
        agent(client.clone(), 10).run("Hello!").await.unwrap();

        let request = &client.requests()[0];
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages[0], Message::system("You are a test agent."));
        assert_eq!(request.messages[1], Message::user("Hello!"));
        let names: Vec<&str> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["lookup", "failing", "slow", "stuck"]);
    }

    #[tokio::test]
    async fn exhausts_after_max_iterations_without_extra_call() {
        let turn = CompletionResponse {
            content: Some("still looking".into()),
            ..tool_calls(&[("c1", "lookup", json!({"email": "john@co.com"}))])
        };
        let client = Arc::new(ScriptedClient::repeating(turn, 3));
        let result = agent(client.clone(), 3).run("find john").await.unwrap();

        assert_eq!(result.status, RunStatus::Exhausted);
        assert!(!result.is_complete());
        assert_eq!(client.call_count(), 3);
        assert_eq!(result.completion_calls, 3);
        assert_eq!(result.iterations, 3);
        assert_eq!(result.tool_calls, 3);
        assert_eq!(result.answer.as_deref(), Some("still looking"));
    }

    #[tokio::test]
    async fn exhaustion_without_text_uses_fallback() {
        let turn = tool_calls(&[("c1", "lookup", json!({"email": "john@co.com"}))]);
        let client = Arc::new(ScriptedClient::repeating(turn, 1));
        let result = agent(client, 1).run("find john").await.unwrap();

        assert_eq!(result.status, RunStatus::Exhausted);
        assert!(result.answer.is_none());
        assert_eq!(result.answer_or_fallback(), NO_ANSWER_FALLBACK);
    }

    #[tokio::test]
    async fn unknown_tool_and_success_both_answered() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(tool_calls(&[
                ("c1", "lookup", json!({"email": "john@co.com"})),
                ("c2", "nonexistent", json!({})),
            ])),
            Ok(text("John exists.")),
        ]));
        let result = agent(client.clone(), 10).run("find john").await.unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.tool_calls, 2);

        let second = &client.requests()[1];
        let tools = tool_contents(&second.messages);
        assert_eq!(
            tools,
            vec![
                ("c1".to_string(), "user found: john@co.com".to_string()),
                ("c2".to_string(), "Error: Tool nonexistent not found".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failing_tool_does_not_end_the_run() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(tool_calls(&[("c1", "failing", json!({}))])),
            Ok(text("The email could not be sent.")),
        ]));
        let result = agent(client.clone(), 10).run("notify john").await.unwrap();

        assert!(result.is_complete());
        let second = &client.requests()[1];
        let last = second.messages.last().unwrap();
        assert_eq!(last.role(), Role::Tool);
        assert_eq!(last.text(), Some("Error executing tool: mail server unreachable"));
    }

    #[tokio::test]
    async fn invalid_json_arguments_become_error_response() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(CompletionResponse::with_tool_calls(vec![ToolCallRequest::new(
                "c1", "lookup", "{not json",
            )])),
            Ok(text("Sorry.")),
        ]));
        let result = agent(client.clone(), 10).run("find").await.unwrap();
        assert!(result.is_complete());
        let (_, content) = &tool_contents(&result.messages)[0];
        assert!(content.starts_with("Error: invalid arguments for lookup:"));
    }

    #[tokio::test]
    async fn text_alongside_tool_calls_keeps_looping() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(CompletionResponse {
                content: Some("Let me check.".into()),
                ..tool_calls(&[("c1", "lookup", json!({"email": "jane@co.com"}))])
            }),
            Ok(text("Jane exists.")),
        ]));
        let result = agent(client.clone(), 10).run("find jane").await.unwrap();
        assert_eq!(client.call_count(), 2);
        assert_eq!(result.answer.as_deref(), Some("Jane exists."));
        assert_eq!(result.messages[2].text(), Some("Let me check."));
    }

    #[tokio::test]
    async fn empty_turn_completes_without_answer() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(CompletionResponse::default())]));
        let result = agent(client.clone(), 10).run("...").await.unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert!(result.answer.is_none());
        assert_eq!(result.answer_or_fallback(), EMPTY_ANSWER_FALLBACK);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn replay_is_deterministic() {
        let script = || {
            vec![
                Ok(tool_calls(&[
                    ("c1", "lookup", json!({"email": "a@co.com"})),
                    ("c2", "failing", json!({})),
                ])),
                Ok(text("done")),
            ]
        };
        let first = agent(Arc::new(ScriptedClient::new(script())), 5)
            .run("go")
            .await
            .unwrap();
        let second = agent(Arc::new(ScriptedClient::new(script())), 5)
            .run("go")
            .await
            .unwrap();
        assert_eq!(first.messages, second.messages);
        assert_eq!(first.answer, second.answer);
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn completion_failure_fails_the_run() {
        let client = Arc::new(ScriptedClient::new(vec![Err(
            CompletionError::AuthenticationFailed("bad key".into()),
        )]));
        let err = agent(client, 10).run("hi").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Completion(CompletionError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_then_completes() {
        let flaky = Arc::new(ScriptedClient::new(vec![
            Err(CompletionError::Network("connection reset".into())),
            Err(CompletionError::ApiError {
                status_code: 503,
                message: "unavailable".into(),
            }),
            Ok(text("recovered")),
        ]));
        let policy = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };
        let client = Arc::new(RetryingClient::new(flaky.clone(), policy));
        let result = agent(client, 10).run("hi").await.unwrap();

        assert!(result.is_complete());
        assert_eq!(result.answer.as_deref(), Some("recovered"));
        assert_eq!(result.completion_calls, 1);
        assert_eq!(flaky.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_tool_aborts_the_run() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(tool_calls(&[(
            "c1",
            "stuck",
            json!({}),
        )]))]));
        let agent = agent(client, 10);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = agent.run_with_cancel("wait", cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled { iterations: 1 }));
    }

    fn cancel_after(cancel: &CancellationToken, after: Duration) {
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            trigger.cancel();
        });
    }

    fn finished_outcome(sink: &CollectingSink) -> Option<RunOutcome> {
        sink.events().into_iter().rev().find_map(|e| match e.kind {
            TraceEventKind::RunFinished { outcome, .. } => Some(outcome),
            _ => None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_completion_aborts_the_run() {
        let client = Arc::new(
            ScriptedClient::new(vec![Ok(text("too late"))]).with_delay(Duration::from_secs(60)),
        );
        let sink = Arc::new(CollectingSink::default());
        let agent = AgentLoop::new(
            AgentOptions::builder(client.clone(), registry())
                .sink(sink.clone())
                .build()
                .unwrap(),
        );
        let cancel = CancellationToken::new();
        cancel_after(&cancel, Duration::from_millis(100));

        let err = agent.run_with_cancel("wait", cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled { iterations: 1 }));
        assert_eq!(client.call_count(), 1);
        assert_eq!(finished_outcome(&sink), Some(RunOutcome::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_retry_backoff_aborts_the_run() {
        let flaky = Arc::new(ScriptedClient::new(vec![
            Err(CompletionError::Network("connection reset".into())),
            Ok(text("recovered")),
        ]));
        let policy = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(30),
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        let client = Arc::new(RetryingClient::new(flaky.clone(), policy));
        let sink = Arc::new(CollectingSink::default());
        let agent = AgentLoop::new(
            AgentOptions::builder(client, registry())
                .sink(sink.clone())
                .build()
                .unwrap(),
        );
        let cancel = CancellationToken::new();
        cancel_after(&cancel, Duration::from_secs(1));

        let err = agent.run_with_cancel("hi", cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled { iterations: 1 }));
        assert_eq!(flaky.call_count(), 1);
        assert_eq!(finished_outcome(&sink), Some(RunOutcome::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn run_timeout_aborts_pending_completion() {
        let client = Arc::new(
            ScriptedClient::new(vec![Ok(text("too late"))]).with_delay(Duration::from_secs(60)),
        );
        let sink = Arc::new(CollectingSink::default());
        let agent = AgentLoop::new(
            AgentOptions::builder(client.clone(), registry())
                .sink(sink.clone())
                .run_timeout(Duration::from_secs(1))
                .build()
                .unwrap(),
        );

        let err = agent.run("wait").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Timeout {
                timeout_ms: 1000,
                iterations: 1
            }
        ));
        assert_eq!(client.call_count(), 1);
        assert_eq!(finished_outcome(&sink), Some(RunOutcome::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn run_timeout_aborts_the_run() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(tool_calls(&[(
            "c1",
            "stuck",
            json!({}),
        )]))]));
        let agent = AgentLoop::new(
            AgentOptions::builder(client, registry())
                .run_timeout(Duration::from_secs(1))
                .build()
                .unwrap(),
        );
        let err = agent.run("wait").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Timeout {
                timeout_ms: 1000,
                iterations: 1
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn tool_timeout_is_reported_to_the_model() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(tool_calls(&[("c1", "slow", json!({}))])),
            Ok(text("It took too long.")),
        ]));
        let agent = AgentLoop::new(
            AgentOptions::builder(client, registry())
                .tool_timeout(Duration::from_millis(50))
                .build()
                .unwrap(),
        );
        let result = agent.run("go").await.unwrap();
        let (_, content) = &tool_contents(&result.messages)[0];
        assert_eq!(content, "Error executing tool: timed out after 50ms");
    }

    #[tokio::test]
    async fn trace_events_follow_the_run() {
        let sink = Arc::new(CollectingSink::default());
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(tool_calls(&[("c1", "lookup", json!({"email": "john@co.com"}))])),
            Ok(text("found")),
        ]));
        let agent = AgentLoop::new(
            AgentOptions::builder(client, registry())
                .sink(sink.clone())
                .build()
                .unwrap(),
        );
        let result = agent.run("find john").await.unwrap();

        let events = sink.events();
        assert!(events.iter().all(|e| e.run_id == result.run_id));
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match &e.kind {
                TraceEventKind::RunStarted { .. } => "run_started",
                TraceEventKind::IterationStarted { .. } => "iteration_started",
                TraceEventKind::IterationFinished { .. } => "iteration_finished",
                TraceEventKind::ToolCallStarted { .. } => "tool_call_started",
                TraceEventKind::ToolCallFinished { .. } => "tool_call_finished",
                TraceEventKind::CompletionFailed { .. } => "completion_failed",
                TraceEventKind::RunFinished { .. } => "run_finished",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "run_started",
                "iteration_started",
                "tool_call_started",
                "tool_call_finished",
                "iteration_finished",
                "iteration_started",
                "iteration_finished",
                "run_finished",
            ]
        );
    }

    #[tokio::test]
    async fn recorder_builds_span_tree() {
        let recorder = Arc::new(TraceRecorder::new());
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(tool_calls(&[
                ("c1", "lookup", json!({"email": "john@co.com"})),
                ("c2", "failing", json!({})),
            ])),
            Ok(text("partially done")),
        ]));
        let agent = AgentLoop::new(
            AgentOptions::builder(client, registry())
                .sink(recorder.clone())
                .build()
                .unwrap(),
        );
        let result = agent.run("go").await.unwrap();

        let trace = recorder.get_trace(&result.run_id).unwrap();
        assert!(trace.is_finished());
        assert_eq!(trace.iteration_count(), 2);
        assert_eq!(trace.tool_call_count(), 2);
        assert_eq!(trace.failed_tool_calls(), 1);
        assert_eq!(trace.answer.as_deref(), Some("partially done"));
    }

    #[tokio::test]
    async fn concurrent_runs_share_one_agent() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(text("a")), Ok(text("b"))]));
        let agent = agent(client.clone(), 10);
        let (first, second) = tokio::join!(agent.run("one"), agent.run("two"));
        let mut answers = vec![first.unwrap().answer.unwrap(), second.unwrap().answer.unwrap()];
        answers.sort();
        assert_eq!(answers, vec!["a", "b"]);
        assert_eq!(client.call_count(), 2);
    }
}
