//! # Agentry Core
//!
//! Domain types, traits, and error definitions for the Agentry agent driver.
//! This crate has **no I/O of its own** — it defines the domain model that
//! all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here: the completion
//! endpoint ([`CompletionClient`]), the capabilities ([`Tool`]) and the
//! observability backend ([`TraceSink`]). Implementations live in their
//! respective crates, and tests substitute scripted ones.

pub mod conversation;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use conversation::ConversationState;
pub use error::{
    AgentError, CompletionError, ConversationError, RegistryError, Result, ToolError,
};
pub use event::{
    BroadcastSink, LogSink, MultiSink, NoopSink, RunOutcome, TraceEvent, TraceEventKind,
    TraceSink,
};
pub use message::{Message, Role, ToolCallRequest};
pub use provider::{CompletionClient, CompletionRequest, CompletionResponse, Usage};
pub use tool::{Tool, ToolEntry, ToolRegistry, ToolSpec, TypedTool, typed};
