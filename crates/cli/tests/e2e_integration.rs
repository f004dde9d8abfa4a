//! End-to-end integration tests for the Agentry agent driver.
//!
//! These tests exercise the full pipeline from user request to final answer
//! with the real customer-service tools and a scripted completion client.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentry_agent::{AgentLoop, AgentOptions, RunStatus};
use agentry_core::error::CompletionError;
use agentry_core::message::{Message, ToolCallRequest};
use agentry_core::provider::{CompletionClient, CompletionRequest, CompletionResponse};
use agentry_telemetry::TraceRecorder;
use agentry_tools::{
    CUSTOMER_SERVICE_PROMPT, SubscriptionStatus, ToolSet, UserService, UserStore,
};
use serde_json::json;

// ── Mock Client ──────────────────────────────────────────────────────────

/// A completion client that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: Mutex<Vec<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl CompletionClient for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();
        if index >= responses.len() {
            panic!(
                "ScriptedProvider exhausted: call #{}, have {}",
                index,
                responses.len()
            );
        }
        requests.push(request);
        Ok(responses[index].clone())
    }
}

fn text(answer: &str) -> CompletionResponse {
    CompletionResponse::text(answer)
}

fn calls(calls: &[(&str, &str, serde_json::Value)]) -> CompletionResponse {
    CompletionResponse::with_tool_calls(
        calls
            .iter()
            .map(|(id, name, args)| ToolCallRequest::new(*id, *name, args.to_string()))
            .collect(),
    )
}

fn service() -> UserService {
    UserService::new(Arc::new(UserStore::seeded())).with_notify_delay(Duration::ZERO)
}

fn agent(provider: Arc<ScriptedProvider>, tool_set: ToolSet, service: UserService) -> AgentLoop {
    let tools = Arc::new(tool_set.registry(service).unwrap());
    AgentLoop::new(
        AgentOptions::builder(provider, tools)
            .system_prompt(CUSTOMER_SERVICE_PROMPT)
            .build()
            .unwrap(),
    )
}

fn tool_responses(messages: &[Message]) -> Vec<&str> {
    messages
        .iter()
        .filter(|m| m.tool_call_id().is_some())
        .filter_map(|m| m.text())
        .collect()
}

// ── Specific tools ───────────────────────────────────────────────────────

#[tokio::test]
async fn finds_premium_users_with_expired_subscriptions() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        calls(&[(
            "call_1",
            "search_users",
            json!({"subscriptionPlan": "premium", "subscriptionStatus": "expired"}),
        )]),
        text("Bob Wilson (bob@co.com) is the only premium user with an expired subscription."),
    ]));
    let result = agent(provider.clone(), ToolSet::Specific, service())
        .run("Find all premium users with expired subscriptions")
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.answer.unwrap().contains("Bob Wilson"));
    assert_eq!(provider.calls(), 2);

    let second = provider.request(1);
    let responses = tool_responses(&second.messages);
    assert_eq!(responses.len(), 1);
    assert!(responses[0].starts_with("Found 1 user:\n\n1. Bob Wilson (bob@co.com)"));
    assert!(responses[0].ends_with("Use 'get_user_details' with the user's email."));
}

#[tokio::test]
async fn details_then_notification_across_iterations() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        calls(&[("call_1", "get_user_details", json!({"email": "john@co.com"}))]),
        calls(&[(
            "call_2",
            "notify_customer",
            json!({"customerEmail": "john@co.com", "message": "Your premium plan renews on 15/01/2025."}),
        )]),
        text("I sent John a renewal reminder."),
    ]));
    let result = agent(provider.clone(), ToolSet::Specific, service())
        .run("Get details for john@co.com and send them a renewal reminder")
        .await
        .unwrap();

    assert_eq!(result.iterations, 3);
    assert_eq!(result.tool_calls, 2);
    let responses = tool_responses(&result.messages);
    assert!(responses[0].starts_with("User Details for John Smith:"));
    assert_eq!(
        responses[1],
        "✓ Sent update to john@co.com: \"Your premium plan renews on 15/01/2025.\""
    );
}

#[tokio::test]
async fn cancellation_persists_for_later_runs() {
    let store = Arc::new(UserStore::seeded());
    let shared = UserService::new(store.clone()).with_notify_delay(Duration::ZERO);

    let provider = Arc::new(ScriptedProvider::new(vec![
        calls(&[(
            "call_1",
            "update_subscription",
            json!({"email": "jane@co.com", "action": "cancel"}),
        )]),
        text("Jane's subscription is cancelled."),
    ]));
    agent(provider, ToolSet::Specific, shared.clone())
        .run("Cancel the subscription for jane@co.com")
        .await
        .unwrap();

    let jane = store.find_by_email("jane@co.com").await.unwrap();
    assert_eq!(jane.subscription.status, SubscriptionStatus::Expired);

    let provider = Arc::new(ScriptedProvider::new(vec![
        calls(&[("call_1", "search_users", json!({"subscriptionStatus": "expired"}))]),
        text("Two users have expired subscriptions."),
    ]));
    let result = agent(provider, ToolSet::Specific, shared)
        .run("Who has an expired subscription?")
        .await
        .unwrap();
    assert!(tool_responses(&result.messages)[0].starts_with("Found 2 users:"));
}

#[tokio::test]
async fn parallel_notifications_keep_call_order() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        calls(&[(
            "call_1",
            "search_users",
            json!({"subscriptionPlan": "premium", "subscriptionStatus": "active"}),
        )]),
        calls(&[
            ("call_2", "notify_customer", json!({"customerEmail": "john@co.com", "message": "Thank you!"})),
            ("call_3", "notify_customer", json!({"customerEmail": "ghost@co.com", "message": "Thank you!"})),
        ]),
        text("Thanked John; ghost@co.com is not a customer."),
    ]));
    let result = agent(provider.clone(), ToolSet::Specific, service())
        .run("Find all premium users with active subscriptions and send them a thank you email")
        .await
        .unwrap();

    let third = provider.request(2);
    let ids: Vec<&str> = third
        .messages
        .iter()
        .filter_map(|m| m.tool_call_id())
        .collect();
    assert_eq!(ids, vec!["call_1", "call_2", "call_3"]);
    let responses = tool_responses(&result.messages);
    assert!(responses[1].starts_with("✓ Sent update to john@co.com"));
    assert!(responses[2].starts_with("❌ Failed to send notification"));
}

#[tokio::test]
async fn invalid_arguments_let_the_model_retry() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        calls(&[("call_1", "get_user_details", json!({"user": "john"}))]),
        calls(&[("call_2", "get_user_details", json!({"email": "john@co.com"}))]),
        text("John is a premium subscriber."),
    ]));
    let result = agent(provider, ToolSet::Specific, service())
        .run("Tell me about John")
        .await
        .unwrap();

    let responses = tool_responses(&result.messages);
    assert!(responses[0].starts_with("Error: invalid arguments for get_user_details:"));
    assert!(responses[1].starts_with("User Details for John Smith:"));
    assert!(result.is_complete());
}

// ── Generic tools ────────────────────────────────────────────────────────

#[tokio::test]
async fn generic_tools_report_misuse_as_content() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        calls(&[(
            "call_1",
            "query_data",
            json!({"source": "users", "operation": "count", "filters": {"subscription_plan": "basic"}}),
        )]),
        calls(&[(
            "call_2",
            "query_data",
            json!({"source": "users", "operation": "find", "filters": {"subscription_plan": "basic"}}),
        )]),
        text("Jane Doe is on the basic plan."),
    ]));
    let result = agent(provider, ToolSet::Generic, service())
        .run("Search for users with basic plans")
        .await
        .unwrap();

    let responses = tool_responses(&result.messages);
    assert_eq!(
        responses[0],
        "Error: Operation 'count' not supported for user queries. Use 'find' instead."
    );
    assert!(responses[1].starts_with("Found 1 user:\n\n1. Jane Doe"));
}

// ── Limits & tracing ─────────────────────────────────────────────────────

#[tokio::test]
async fn iteration_budget_is_respected() {
    let looping = calls(&[("call_1", "search_users", json!({}))]);
    let provider = Arc::new(ScriptedProvider::new(vec![looping.clone(), looping.clone(), looping]));
    let tools = Arc::new(ToolSet::Specific.registry(service()).unwrap());
    let agent = AgentLoop::new(
        AgentOptions::builder(provider.clone(), tools)
            .max_iterations(3)
            .build()
            .unwrap(),
    );
    let result = agent.run("Keep searching").await.unwrap();

    assert_eq!(result.status, RunStatus::Exhausted);
    assert_eq!(provider.calls(), 3);
    assert_eq!(
        result.answer_or_fallback(),
        "Agent reached maximum iterations without completing the task."
    );
}

#[tokio::test]
async fn recorder_captures_the_run() {
    let recorder = Arc::new(TraceRecorder::new());
    let provider = Arc::new(ScriptedProvider::new(vec![
        calls(&[("call_1", "get_user_details", json!({"email": "bob@co.com"}))]),
        text("Bob's premium plan expired on 01/02/2024."),
    ]));
    let tools = Arc::new(ToolSet::Specific.registry(service()).unwrap());
    let agent = AgentLoop::new(
        AgentOptions::builder(provider, tools)
            .sink(recorder.clone())
            .build()
            .unwrap(),
    );
    let result = agent.run("What happened to Bob?").await.unwrap();

    let trace = recorder.get_trace(&result.run_id).unwrap();
    assert_eq!(trace.input, "What happened to Bob?");
    assert_eq!(trace.iteration_count(), 2);
    assert_eq!(trace.tool_call_count(), 1);
    assert_eq!(trace.failed_tool_calls(), 0);
    assert!(trace.is_finished());
}
