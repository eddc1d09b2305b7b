use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outer JSON body of one `data: ` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamEnvelope {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StreamEnvelope {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Text of an explicit envelope error, if one is present and truthy.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null | Value::Bool(false) => None,
            Value::String(message) if message.is_empty() => None,
            other => Some(value_as_text(other)),
        }
    }

    /// Decode the inner `{ type, content }` event carried in `message`.
    pub fn event(&self) -> Result<Option<StreamEvent>, serde_json::Error> {
        let Some(message) = self.message.as_deref() else {
            return Ok(None);
        };
        let value = serde_json::from_str::<Value>(message)?;
        Ok(map_event(value))
    }
}

/// Durable conversation id assigned on the first turn of a new chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Permanent ids for the latest user/assistant pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_message_id: Option<String>,
}

/// Inner stream event after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum StreamEvent {
    Text(String),
    /// Raw call batch, kept verbatim so it can be re-encoded byte for byte.
    ToolCalls(Value),
    ToolResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        result: Value,
    },
    ChatInfo(ChatInfo),
    MessageInfo(MessageInfo),
    Error(Value),
    /// Unrecognised event type, ignored by the decoder.
    Unknown { event_type: String },
}

fn map_event(value: Value) -> Option<StreamEvent> {
    let event_type = value.get("type")?.as_str()?.to_owned();
    let content = value.get("content").cloned().unwrap_or(Value::Null);

    let event = match event_type.as_str() {
        "text" => StreamEvent::Text(value_as_text(&content)),
        "tool_calls" => StreamEvent::ToolCalls(content),
        "tool_result" => {
            let name = content
                .get("name")
                .and_then(|value| value.as_str())
                .filter(|value| !value.is_empty())
                .map(ToString::to_string);
            let result = content.get("result").cloned().unwrap_or(Value::Null);
            StreamEvent::ToolResult { name, result }
        }
        "chat_info" => StreamEvent::ChatInfo(serde_json::from_value(content).ok()?),
        "message_info" => StreamEvent::MessageInfo(serde_json::from_value(content).ok()?),
        "error" => StreamEvent::Error(content),
        _ => StreamEvent::Unknown { event_type },
    };

    Some(event)
}

/// Non-empty `name` fields of a call batch, in batch order, duplicates kept.
///
/// Accepts the array shape used on the wire as well as the record-of-arrays
/// shape some persisted assistant rows carry.
pub fn call_names(calls: &Value) -> Vec<String> {
    match calls {
        Value::Array(items) => items.iter().flat_map(call_names).collect(),
        Value::Object(map) => match map.get("name") {
            Some(name) => name
                .as_str()
                .filter(|name| !name.is_empty())
                .map(|name| vec![name.to_owned()])
                .unwrap_or_default(),
            None => map
                .values()
                .filter(|value| value.is_array())
                .flat_map(call_names)
                .collect(),
        },
        _ => Vec::new(),
    }
}

impl StreamEvent {
    /// Wrap the event in its envelope and emit one wire line, newline included.
    pub fn to_frame_line(&self) -> String {
        let message = serde_json::to_string(self).unwrap_or_default();
        let envelope = serde_json::json!({ "message": message });
        format!("{}{envelope}\n", crate::frame::FRAME_PREFIX)
    }
}

/// Render a JSON value the way it is spliced into prose.
pub(crate) fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{call_names, StreamEnvelope, StreamEvent};

    #[test]
    fn envelope_unwraps_nested_message_json() {
        let envelope = StreamEnvelope::parse(
            r#"{"message":"{\"type\":\"text\",\"content\":\"Hi\"}"}"#,
        )
        .expect("envelope");
        assert_eq!(envelope.error_message(), None);
        assert_eq!(
            envelope.event().expect("event"),
            Some(StreamEvent::Text("Hi".to_owned()))
        );
    }

    #[test]
    fn unknown_event_type_is_preserved_as_unknown() {
        let envelope =
            StreamEnvelope::parse(r#"{"message":"{\"type\":\"usage\",\"content\":1}"}"#)
                .expect("envelope");
        assert!(matches!(
            envelope.event().expect("event"),
            Some(StreamEvent::Unknown { event_type }) if event_type == "usage"
        ));
    }

    #[test]
    fn call_names_skips_empty_and_walks_records() {
        let calls = json!([{"name": "search"}, {"name": ""}, {"name": "read"}]);
        assert_eq!(call_names(&calls), vec!["search", "read"]);

        let record = json!({"srv": [{"name": "fetch", "arguments": {}}]});
        assert_eq!(call_names(&record), vec!["fetch"]);
    }
}
