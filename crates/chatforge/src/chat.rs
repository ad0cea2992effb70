//! Conversation types: messages, content blocks, tool calls, responses.
//!
//! A conversation is a `Vec<ChatMessage>`. Each message has a
//! [`ChatRole`] and a list of [`ContentBlock`]s, so a single assistant
//! turn can carry text and tool calls side by side, the way every
//! function-calling provider models it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::usage::Usage;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ChatRole {
    /// Instructions that frame the conversation.
    System,
    /// The end user.
    User,
    /// The model.
    Assistant,
    /// The output of a tool invocation.
    Tool,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The author of this message.
    pub role: ChatRole,
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    fn text_message(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    /// A user message with a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self::text_message(ChatRole::User, text)
    }

    /// An assistant message with a single text block.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text_message(ChatRole::Assistant, text)
    }

    /// A system message with a single text block.
    pub fn system(text: impl Into<String>) -> Self {
        Self::text_message(ChatRole::System, text)
    }

    /// A successful tool result for the call identified by `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::tool_result_full(ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        })
    }

    /// A tool message wrapping an existing [`ToolResult`].
    pub fn tool_result_full(result: ToolResult) -> Self {
        Self {
            role: ChatRole::Tool,
            content: vec![ContentBlock::ToolResult(result)],
        }
    }

    /// Concatenates every text block in the message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ContentBlock {
    /// Plain text.
    Text(String),
    /// A request from the model to invoke a tool.
    ToolCall(ToolCall),
    /// The outcome of a tool invocation.
    ToolResult(ToolResult),
    /// Chain-of-thought output, when the provider exposes it.
    Reasoning {
        /// The reasoning text.
        content: String,
    },
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier, echoed back in the result.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Parsed JSON arguments.
    pub arguments: Value,
}

/// The result of executing a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The [`ToolCall::id`] this result answers.
    pub tool_call_id: String,
    /// Text handed back to the model.
    pub content: String,
    /// Whether the tool failed.
    pub is_error: bool,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StopReason {
    /// The model finished its answer.
    EndTurn,
    /// The model wants one or more tools executed.
    ToolUse,
    /// Generation hit the token limit.
    MaxTokens,
}

/// A model response collected from a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Content blocks in the order the model produced them.
    pub content: Vec<ContentBlock>,
    /// Token accounting for this call.
    pub usage: Usage,
    /// Why generation ended.
    pub stop_reason: StopReason,
    /// The model that served the request, as reported by the provider.
    pub model: String,
    /// Provider-specific extras.
    pub metadata: HashMap<String, Value>,
}

impl ChatResponse {
    /// A response with no content, used when a loop ends before the
    /// model produced anything.
    pub fn empty() -> Self {
        Self {
            content: Vec::new(),
            usage: Usage::default(),
            stop_reason: StopReason::EndTurn,
            model: String::new(),
            metadata: HashMap::new(),
        }
    }

    /// The first text block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|b| match b {
            ContentBlock::Text(t) => Some(t.as_str()),
            _ => None,
        })
    }

    /// All tool calls in the response.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolCall(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Splits the content into owned tool calls and everything else.
    pub fn partition_content(self) -> (Vec<ToolCall>, Vec<ContentBlock>) {
        let mut calls = Vec::new();
        let mut other = Vec::new();
        for block in self.content {
            match block {
                ContentBlock::ToolCall(c) => calls.push(c),
                b => other.push(b),
            }
        }
        (calls, other)
    }
}
