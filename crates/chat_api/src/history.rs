use serde::{Deserialize, Serialize};
use tool_transcript::RawMessageRow;

use crate::error::ChatApiError;

/// Chat record as returned with its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMeta {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Persisted history of one chat: its record and its rows in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub chat: ChatMeta,
    #[serde(default)]
    pub messages: Vec<RawMessageRow>,
}

/// `{ success, message?, data? }` wrapper around every JSON answer.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub(crate) fn into_data(self) -> Result<T, ChatApiError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(ChatApiError::LoadFailed("response carried no data".to_owned())),
            (false, _) => Err(ChatApiError::LoadFailed(
                self.message
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| "service reported failure".to_owned()),
            )),
        }
    }
}

/// Decode a history response body.
pub fn parse_history(body: &str) -> Result<ChatHistory, ChatApiError> {
    serde_json::from_str::<ApiEnvelope<ChatHistory>>(body)?.into_data()
}
