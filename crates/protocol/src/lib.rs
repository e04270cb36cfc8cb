//! Wire protocol between the coordinator and the page-side relay.
//!
//! Three message shapes cover the whole conversation: `tools/call` (request,
//! exactly one response), `tools/list` (request whose reply arrives as a
//! `tools/listChanged` notification rather than a direct response, so
//! capability state always flows through the one notification path) and
//! `tools/listChanged` itself. Everything travels inside an [`Envelope`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pagebridge_core_types::CallId;

/// Version tag carried by every envelope.
pub const PROTOCOL_VERSION: &str = "pagebridge/1";

pub const METHOD_TOOLS_CALL: &str = "tools/call";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_LIST_CHANGED: &str = "tools/listChanged";

/// Error payload carried inside a response envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

/// One message on the wire. Exactly one of {method+params, result, error} is
/// populated; the combination decides the message kind (see [`Envelope::classify`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CallId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

/// The demultiplexed view of an envelope.
#[derive(Clone, Debug)]
pub enum Message {
    /// id plus result-or-error.
    Response {
        id: CallId,
        outcome: Result<Value, ErrorPayload>,
    },
    /// method with no id.
    Notification { method: String, params: Value },
    /// method plus id; expects exactly one response.
    Request {
        id: CallId,
        method: String,
        params: Value,
    },
    /// Anything that matches no shape. Ignored, never errored.
    Ignored,
}

impl Envelope {
    fn base() -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }

    /// `tools/call` request carrying a tool name and its arguments.
    pub fn call_request(id: CallId, name: &str, arguments: Value) -> Self {
        let mut env = Self::base();
        env.id = Some(id);
        env.method = Some(METHOD_TOOLS_CALL.to_string());
        env.params = Some(serde_json::json!({ "name": name, "arguments": arguments }));
        env
    }

    /// `tools/list` resync request. The page replies with a
    /// `tools/listChanged` notification, never a direct response.
    pub fn list_request(id: CallId) -> Self {
        let mut env = Self::base();
        env.id = Some(id);
        env.method = Some(METHOD_TOOLS_LIST.to_string());
        env.params = Some(Value::Object(Default::default()));
        env
    }

    /// `tools/listChanged` notification carrying a full snapshot.
    pub fn list_changed(snapshot: &CapabilitySnapshot) -> Self {
        let mut env = Self::base();
        env.method = Some(METHOD_TOOLS_LIST_CHANGED.to_string());
        env.params = serde_json::to_value(snapshot).ok();
        env
    }

    pub fn response_ok(id: CallId, result: Value) -> Self {
        let mut env = Self::base();
        env.id = Some(id);
        env.result = Some(result);
        env
    }

    pub fn response_err(id: CallId, message: impl Into<String>) -> Self {
        let mut env = Self::base();
        env.id = Some(id);
        env.error = Some(ErrorPayload::new(message));
        env
    }

    /// Apply the demultiplexing rule. Malformed combinations are classified
    /// as [`Message::Ignored`] so a confused peer cannot wedge the session.
    pub fn classify(self) -> Message {
        match (self.id, self.method, self.result, self.error) {
            (Some(id), _, Some(result), None) => Message::Response {
                id,
                outcome: Ok(result),
            },
            (Some(id), _, None, Some(error)) => Message::Response {
                id,
                outcome: Err(error),
            },
            (Some(id), Some(method), None, None) => Message::Request {
                id,
                method,
                params: self.params.unwrap_or(Value::Null),
            },
            (None, Some(method), None, None) => Message::Notification {
                method,
                params: self.params.unwrap_or(Value::Null),
            },
            _ => Message::Ignored,
        }
    }
}

/// Coordinator-visible description of one tool. The executor never crosses
/// the boundary; only this summary does.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Full capability state of one page, replaced wholesale on every change
/// notification; there is no incremental merge.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySnapshot {
    pub tools: Vec<ToolSummary>,
    pub origin: String,
    pub timestamp: DateTime<Utc>,
    /// Set on the first snapshot announced after bootstrap.
    #[serde(default)]
    pub initial: bool,
    /// Set when the snapshot answers an explicit `tools/list` resync.
    #[serde(default)]
    pub requested: bool,
}

impl CapabilitySnapshot {
    pub fn new(tools: Vec<ToolSummary>, origin: impl Into<String>) -> Self {
        Self {
            tools,
            origin: origin.into(),
            timestamp: Utc::now(),
            initial: false,
            requested: false,
        }
    }
}
