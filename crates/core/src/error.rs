//! Error types for the Agentry domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`AgentError`] is what a run
//! surfaces to its caller.

use crate::message::Role;
use thiserror::Error;

/// The run-level error returned by the agent loop.
///
/// Tool failures never show up here: they are converted into tool-response
/// messages so the model can react to them.
#[derive(Debug, Error)]
pub enum AgentError {
    // --- Completion endpoint ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    // --- Conversation invariants ---
    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    // --- Run control ---
    #[error("Run cancelled after {iterations} iteration(s)")]
    Cancelled { iterations: u32 },

    #[error("Run timed out after {timeout_ms}ms ({iterations} iteration(s) started)")]
    Timeout { timeout_ms: u64, iterations: u32 },

    // --- Setup ---
    #[error("Invalid agent options: {0}")]
    InvalidOptions(String),
}

/// Result type alias using [`AgentError`].
pub type Result<T> = std::result::Result<T, AgentError>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by endpoint, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("Completion endpoint not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Completion failed after {attempts} attempt(s): {last}")]
    RetryFailed {
        attempts: u32,
        last: Box<CompletionError>,
    },
}

impl CompletionError {
    /// Whether a retry of the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Timeout(_)
            | Self::RateLimited { .. }
            | Self::MalformedResponse(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_) | Self::RetryFailed { .. } => {
                false
            }
        }
    }
}

/// Failures of a single tool call. All of them are recoverable: the
/// executor turns them into model-visible tool-response content.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool {0} not found")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool {tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool {tool_name} timed out after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },
}

impl ToolError {
    /// Shorthand for an execution failure raised from inside a tool.
    pub fn execution(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an argument validation failure.
    pub fn invalid_arguments(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }

    /// The text placed in the tool-response message the model sees.
    ///
    /// Only the short diagnostic is exposed, never debug output.
    pub fn model_content(&self) -> String {
        match self {
            Self::UnknownTool(name) => format!("Error: Tool {name} not found"),
            Self::InvalidArguments { tool_name, reason } => {
                format!("Error: invalid arguments for {tool_name}: {reason}")
            }
            Self::ExecutionFailed { reason, .. } => format!("Error executing tool: {reason}"),
            Self::Timeout { timeout_ms, .. } => {
                format!("Error executing tool: timed out after {timeout_ms}ms")
            }
        }
    }
}

/// Setup-time registry errors. These fail fast, before any run starts.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Tool {tool_name} has an invalid parameter schema: {reason}")]
    InvalidSchema { tool_name: String, reason: String },
}

/// Violations of the conversation ordering invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("{role} message cannot be appended to a seeded conversation")]
    UnexpectedRole { role: Role },

    #[error("Tool response {call_id} does not answer a pending tool call")]
    UnmatchedToolResponse { call_id: String },

    #[error("Assistant turn appended while {pending} tool call(s) are unanswered")]
    UnansweredToolCalls { pending: usize },
}
