//! CDP message codec.
//!
//! Outgoing commands are `{"id", "method", "params"}` objects. Incoming text
//! is classified by shape: an `id` makes it a [`CommandResult`], a `method`
//! without `id` makes it an [`Event`]. Anything else is a protocol error.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CaptureError;

/// Method names used by the capture flow.
pub mod methods {
    /// Register a script that runs before any page script.
    pub const ADD_SCRIPT_ON_NEW_DOCUMENT: &str = "Page.addScriptToEvaluateOnNewDocument";
    /// Enable page lifecycle events.
    pub const PAGE_ENABLE: &str = "Page.enable";
    /// Navigate the page.
    pub const PAGE_NAVIGATE: &str = "Page.navigate";
    /// Load-completion event.
    pub const LOAD_EVENT_FIRED: &str = "Page.loadEventFired";
    /// Evaluate an expression in the page.
    pub const RUNTIME_EVALUATE: &str = "Runtime.evaluate";
    /// Start pushing frames.
    pub const START_SCREENCAST: &str = "Page.startScreencast";
    /// A pushed frame.
    pub const SCREENCAST_FRAME: &str = "Page.screencastFrame";
    /// Acknowledge a pushed frame.
    pub const SCREENCAST_FRAME_ACK: &str = "Page.screencastFrameAck";
    /// Stop pushing frames.
    pub const STOP_SCREENCAST: &str = "Page.stopScreencast";
}

/// An outgoing command.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Command {
    /// Per-session identifier, echoed back in the reply.
    pub id: u64,
    /// Protocol method, e.g. `Page.navigate`.
    pub method: String,
    /// Method parameters.
    pub params: Value,
}

impl Command {
    /// Build a command.
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

/// Error object carried by a failed command reply.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ResponseError {
    /// Protocol error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional extra detail.
    #[serde(default)]
    pub data: Option<Value>,
}

/// The reply to a [`Command`].
#[derive(Clone, Debug, PartialEq)]
pub struct CommandResult {
    /// Identifier of the command being answered.
    pub id: u64,
    /// `result` on success, `error` on failure.
    pub outcome: Result<Value, ResponseError>,
}

/// An unsolicited notification.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Event method, e.g. `Page.loadEventFired`.
    pub method: String,
    /// Event parameters (`null` when absent).
    pub params: Value,
}

impl Event {
    /// Build an event.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Interpret this event as a screencast frame.
    ///
    /// Returns `Ok(None)` for any other method.
    pub fn screencast_frame(&self) -> Result<Option<ScreencastFrame>, CaptureError> {
        if self.method != methods::SCREENCAST_FRAME {
            return Ok(None);
        }
        ScreencastFrame::deserialize(&self.params)
            .map(Some)
            .map_err(|e| CaptureError::Protocol(format!("malformed screencast frame: {e}")))
    }
}

/// A decoded incoming message.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Reply to a command.
    Response(CommandResult),
    /// Unsolicited event.
    Event(Event),
}

/// Payload of a `Page.screencastFrame` event.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreencastFrame {
    /// Handle that must be echoed back in the acknowledgment.
    pub session_id: i64,
    /// Base64-encoded image.
    pub data: String,
}

/// Decode a standard-alphabet base64 payload.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, CaptureError> {
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| CaptureError::Protocol(format!("invalid base64 frame payload: {e}")))
}

/// Serialize a command to its wire text.
pub fn encode(command: &Command) -> Result<String, CaptureError> {
    serde_json::to_string(command)
        .map_err(|e| CaptureError::Protocol(format!("failed to serialize command: {e}")))
}

/// Parse one complete wire message.
pub fn decode(text: &str) -> Result<Message, CaptureError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| CaptureError::Protocol(format!("invalid JSON: {e}")))?;
    let Value::Object(mut obj) = value else {
        return Err(CaptureError::Protocol("message is not a JSON object".into()));
    };

    if let Some(id) = obj.get("id") {
        let id = id
            .as_u64()
            .ok_or_else(|| CaptureError::Protocol(format!("non-integer message id: {id}")))?;
        let outcome = match obj.remove("error") {
            Some(err) => Err(serde_json::from_value::<ResponseError>(err)
                .map_err(|e| CaptureError::Protocol(format!("malformed error object: {e}")))?),
            None => Ok(obj.remove("result").unwrap_or(Value::Null)),
        };
        return Ok(Message::Response(CommandResult { id, outcome }));
    }

    match obj.remove("method") {
        Some(Value::String(method)) => Ok(Message::Event(Event {
            method,
            params: obj.remove("params").unwrap_or(Value::Null),
        })),
        _ => Err(CaptureError::Protocol(
            "message has neither an id nor a method".into(),
        )),
    }
}
