//! Append-only conversation state for a single run.
//!
//! The history always opens with one system message and the triggering user
//! message. After that it alternates: an assistant turn, then one tool
//! response per tool call that turn requested.

use crate::error::ConversationError;
use crate::message::Message;

/// The ordered message history owned by one run.
#[derive(Debug, Clone)]
pub struct ConversationState {
    messages: Vec<Message>,

    /// Ids of the latest assistant turn's tool calls not yet answered.
    pending: Vec<String>,
}

impl ConversationState {
    /// Start a conversation from a system prompt and the user's request.
    pub fn seed(system_prompt: impl Into<String>, user_request: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(user_request)],
            pending: Vec::new(),
        }
    }

    /// Append exactly one message, enforcing the turn ordering.
    pub fn append(&mut self, message: Message) -> Result<(), ConversationError> {
        match &message {
            Message::System { .. } | Message::User { .. } => {
                return Err(ConversationError::UnexpectedRole {
                    role: message.role(),
                });
            }
            Message::Assistant { tool_calls, .. } => {
                if !self.pending.is_empty() {
                    return Err(ConversationError::UnansweredToolCalls {
                        pending: self.pending.len(),
                    });
                }
                self.pending = tool_calls.iter().map(|tc| tc.id.clone()).collect();
            }
            Message::Tool { tool_call_id, .. } => {
                let Some(pos) = self.pending.iter().position(|id| id == tool_call_id) else {
                    return Err(ConversationError::UnmatchedToolResponse {
                        call_id: tool_call_id.clone(),
                    });
                };
                self.pending.remove(pos);
            }
        }

        self.messages.push(message);
        Ok(())
    }

    /// The ordered history, ready to submit to the completion endpoint.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: a seeded conversation holds at least two messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Tool call ids of the latest assistant turn still awaiting a response.
    pub fn pending_tool_calls(&self) -> &[String] {
        &self.pending
    }

    /// The most recent non-empty assistant text, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::Assistant {
                content: Some(text),
                ..
            } if !text.is_empty() => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
