//! Wire protocol for the agent-updates feed.
//!
//! The server pushes JSON objects discriminated by a `type` field. Unknown
//! types decode to [`AgentUpdate::Unknown`] so newer servers never break older
//! clients; unknown extra fields inside known types are ignored for the same
//! reason. The only outbound application message is the keepalive ping.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Decode error for inbound frames.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed update frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("update frame has no string `type` field")]
    MissingType,
}

/// Per-subtask detail attached to `task_status` updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubtaskInfo {
    #[serde(default)]
    pub subtask_text: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
}

/// Server-pushed update on the agent-updates channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentUpdate {
    ConnectionEstablished {
        #[serde(default)]
        thread_id: Option<String>,
        #[serde(default)]
        thread_title: Option<String>,
        #[serde(default)]
        thread_status: Option<String>,
    },
    AgentAction {
        #[serde(default)]
        thread_id: Option<String>,
        #[serde(default)]
        description: String,
        #[serde(default)]
        action_data: Option<Value>,
        #[serde(default)]
        timestamp: Option<String>,
    },
    AgentThinking {
        #[serde(default)]
        thread_id: Option<String>,
        #[serde(default)]
        thinking: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    TaskStatus {
        #[serde(default)]
        thread_id: Option<String>,
        #[serde(default)]
        status: String,
        #[serde(default)]
        subtask_info: Option<SubtaskInfo>,
        #[serde(default)]
        timestamp: Option<String>,
    },
    /// Reply to our keepalive ping.
    Pong {},
    /// Any `type` this client does not recognize.
    #[serde(skip)]
    Unknown { kind: String },
}

impl AgentUpdate {
    /// Wire token of this update's discriminant.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::AgentAction { .. } => "agent_action",
            Self::AgentThinking { .. } => "agent_thinking",
            Self::TaskStatus { .. } => "task_status",
            Self::Pong {} => "pong",
            Self::Unknown { kind } => kind.as_str(),
        }
    }
}

/// Decode one inbound text frame.
///
/// Unknown `type` values are not an error; they come back as
/// [`AgentUpdate::Unknown`] and the caller decides whether to log them.
pub fn decode_update(text: &str) -> Result<AgentUpdate, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;
    match kind {
        "connection_established" | "agent_action" | "agent_thinking" | "task_status" | "pong" => {
            Ok(serde_json::from_value(value)?)
        }
        other => Ok(AgentUpdate::Unknown {
            kind: other.to_string(),
        }),
    }
}

/// Outbound message to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}

impl ClientMessage {
    pub fn encode(self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self)
    }
}

/// Classifier over the free-form `task_status.status` strings the server
/// emits. Anything unrecognized maps to [`TaskPhase::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Planning,
    UsingTool,
    SubtaskStarted,
    SubtaskCompleted,
    TaskCompleted,
    TaskFailed,
    Other,
}

impl TaskPhase {
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "planning" => Self::Planning,
            "using_tool" => Self::UsingTool,
            "subtask_started" => Self::SubtaskStarted,
            "subtask_completed" => Self::SubtaskCompleted,
            "task_completed" => Self::TaskCompleted,
            "task_failed" => Self::TaskFailed,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::UsingTool => "using_tool",
            Self::SubtaskStarted => "subtask_started",
            Self::SubtaskCompleted => "subtask_completed",
            Self::TaskCompleted => "task_completed",
            Self::TaskFailed => "task_failed",
            Self::Other => "other",
        }
    }
}
