//! OpenAI-compatible completion client.
//!
//! Works with: OpenAI, the Braintrust proxy, Ollama, vLLM, and any endpoint
//! that exposes `/chat/completions` with function calling.

use std::time::Duration;

use async_trait::async_trait;
use agentry_core::error::CompletionError;
use agentry_core::message::{Message, ToolCallRequest};
use agentry_core::provider::{CompletionClient, CompletionRequest, CompletionResponse, Usage};
use agentry_core::tool::ToolSpec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// An OpenAI-compatible completion client.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new client against `base_url` (without the `/chat/completions` suffix).
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CompletionError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, CompletionError> {
        Self::new(
            "openai",
            agentry_config::OPENAI_BASE_URL,
            api_key,
            Duration::from_secs(120),
        )
    }

    /// Create a client routed through the Braintrust proxy.
    pub fn braintrust_proxy(api_key: impl Into<String>) -> Result<Self, CompletionError> {
        Self::new(
            "braintrust",
            agentry_config::BRAINTRUST_PROXY_URL,
            api_key,
            Duration::from_secs(120),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| match m {
                Message::System { content } => ApiMessage::text("system", content),
                Message::User { content } => ApiMessage::text("user", content),
                Message::Assistant {
                    content,
                    tool_calls,
                } => ApiMessage {
                    role: "assistant".into(),
                    content: content.clone(),
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            tool_calls
                                .iter()
                                .map(|tc| ApiToolCall {
                                    id: tc.id.clone(),
                                    r#type: "function".into(),
                                    function: ApiFunction {
                                        name: tc.name.clone(),
                                        arguments: tc.arguments.clone(),
                                    },
                                })
                                .collect(),
                        )
                    },
                    tool_call_id: None,
                },
                Message::Tool {
                    tool_call_id,
                    content,
                } => ApiMessage {
                    tool_call_id: Some(tool_call_id.clone()),
                    ..ApiMessage::text("tool", content)
                },
            })
            .collect()
    }

    /// Convert tool specs to OpenAI API format.
    fn to_api_tools(tools: &[ToolSpec]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn build_body(request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// Parse a successful response body into one assistant turn.
    fn parse_response(body: &str) -> Result<CompletionResponse, CompletionError> {
        let api_response: ApiResponse = serde_json::from_str(body).map_err(|e| {
            CompletionError::MalformedResponse(format!("Failed to parse response: {e}"))
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::MalformedResponse("No choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            content: choice.message.content,
            tool_calls,
            usage,
            model: api_response.model,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            client = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(e.to_string())
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(CompletionError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(CompletionError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Completion endpoint returned error");
            return Err(CompletionError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        Self::parse_response(&text)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_constructor() {
        let client = OpenAiCompatClient::openai("test-key").unwrap();
        assert_eq!(client.name(), "openai");
        assert_eq!(client.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn braintrust_constructor_trims_slash() {
        let client = OpenAiCompatClient::new(
            "custom",
            "http://localhost:8080/v1/",
            "k",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1");

        let bt = OpenAiCompatClient::braintrust_proxy("bt").unwrap();
        assert_eq!(bt.base_url(), "https://api.braintrust.dev/v1/proxy");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("sys"), Message::user("Hello")];
        let api = OpenAiCompatClient::to_api_messages(&messages);
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[1].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let messages = vec![
            Message::assistant_tool_calls(
                None,
                vec![ToolCallRequest::new(
                    "call_1",
                    "search_users",
                    r#"{"query":"john"}"#,
                )],
            ),
            Message::tool_result("call_1", "Found 1 user(s):"),
        ];
        let api = OpenAiCompatClient::to_api_messages(&messages);
        let calls = api[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "search_users");
        assert_eq!(calls[0].r#type, "function");
        assert!(api[0].content.is_none());
        assert_eq!(api[1].role, "tool");
        assert_eq!(api[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn body_includes_tools_and_optional_sampling() {
        let request = CompletionRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::user("hi")],
            tools: vec![ToolSpec {
                name: "get_user_details".into(),
                description: "Look up a user".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            temperature: None,
            max_tokens: Some(256),
        };
        let body = OpenAiCompatClient::build_body(&request);
        assert_eq!(body["tools"][0]["function"]["name"], "get_user_details");
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn parse_tool_call_response() {
        let body = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_a", "type": "function",
                         "function": {"name": "search_users", "arguments": "{\"query\":\"bob\"}"}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let resp = OpenAiCompatClient::parse_response(body).unwrap();
        assert_eq!(resp.content, None);
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].id, "call_a");
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
        assert_eq!(resp.model, "gpt-4o-mini-2024-07-18");
    }

    #[test]
    fn parse_text_response() {
        let body = r#"{"model":"m","choices":[{"message":{"role":"assistant","content":"Hello!"}}]}"#;
        let resp = OpenAiCompatClient::parse_response(body).unwrap();
        assert_eq!(resp.answer_text(), Some("Hello!"));
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn malformed_response_is_retryable() {
        let err = OpenAiCompatClient::parse_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, CompletionError::MalformedResponse(_)));
        assert!(err.is_retryable());

        let err = OpenAiCompatClient::parse_response(r#"{"model":"m","choices":[]}"#).unwrap_err();
        assert!(err.to_string().contains("No choices"));
    }
}
