//! Defines the JSON frame types used on the client and upstream sockets.
//!
//! Every frame is a text frame carrying an object discriminated by its
//! `type` field. Only `tool_call` frames are interpreted by the gateway;
//! everything else passes through untouched, so passthrough frames are
//! relayed as their original text rather than re-serialized.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// First frame sent by the client to configure its session. Absent fields
/// fall back to the service configuration.
#[derive(Debug, Default, Deserialize)]
pub struct SessionSetup {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

/// A tool invocation requested by the speech model. Consumed exactly once;
/// `id` correlates the eventual response.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: Value,
}

/// Classification of an inbound upstream frame. Anything that is not a
/// `tool_call` is relayed verbatim; a frame without a recognizable `type`
/// fails to parse and is treated as a protocol error by the bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamEvent {
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
    #[serde(other)]
    Passthrough,
}

/// Frames the gateway itself sends on the upstream connection.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Sent once at session start: instructions, the tool catalog, and
    /// automatic tool choice.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    /// The reply to a `tool_call`, correlated by `call_id`.
    ToolResponse {
        call_id: String,
        name: String,
        content: Value,
    },
}

#[derive(Debug, Serialize)]
pub struct SessionConfig {
    pub instructions: String,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: String,
}

/// One entry of the advertised tool catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}
