use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    ToolCall,
    ToolResult,
    #[serde(other)]
    Unknown,
}

/// One persisted message record, as served by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessageRow {
    /// Storage row id; numeric or string depending on the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<Value>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl RawMessageRow {
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            tool_calls: None,
            files: Vec::new(),
            created_at: created_at.into(),
            message_id: None,
            chat_id: None,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content, created_at)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content, created_at)
    }

    /// A `tool_call` row; the payload is stored JSON-encoded.
    #[must_use]
    pub fn tool_call(payload: &Value, created_at: impl Into<String>) -> Self {
        Self::new(MessageRole::ToolCall, payload.to_string(), created_at)
    }

    /// A `tool_result` row; the payload is stored JSON-encoded.
    #[must_use]
    pub fn tool_result(payload: &Value, created_at: impl Into<String>) -> Self {
        Self::new(MessageRole::ToolResult, payload.to_string(), created_at)
    }

    #[must_use]
    pub fn with_tool_calls(mut self, tool_calls: Value) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    #[must_use]
    pub fn with_files(mut self, files: Vec<Value>) -> Self {
        self.files = files;
        self
    }

    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Whether the row carries a non-empty structured call payload.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        match &self.tool_calls {
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
            _ => false,
        }
    }

    /// Stable id for the turn this row opens, if the row names one.
    #[must_use]
    pub fn stable_id(&self) -> Option<String> {
        if let Some(message_id) = self.message_id.as_deref().filter(|id| !id.is_empty()) {
            return Some(message_id.to_owned());
        }
        match &self.id {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}
