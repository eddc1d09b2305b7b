use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chat_api::{CancellationSignal, ChatApiClient, ChatHistory, ChatRequest};
use serde::Deserialize;
use serde_json::Value;
use tool_transcript::{
    decode_stream, reconstruct, split_transcript, ChatInfo, Conversation, DecoderState,
    MessageInfo, RawMessageRow, StreamObserver, TranscriptSegment, TranscriptSession, Turn,
};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Prose with tool blocks expanded into their calls and results.
    #[default]
    Text,
    /// Turn text exactly as stored, blocks still encoded.
    Raw,
    /// The turn list as JSON.
    Json,
}

/// Accepted shapes for a rows file: a bare row array, a `{ chat, messages }`
/// history, or the service's `{ success, data }` answer.
#[derive(Deserialize)]
#[serde(untagged)]
enum RowsDocument {
    Rows(Vec<RawMessageRow>),
    Envelope { data: ChatHistory },
    History(ChatHistory),
}

pub fn read_rows(path: &Path) -> Result<Vec<RawMessageRow>> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read rows file {}", path.display()))?;
    let document: RowsDocument = serde_json::from_str(&body)
        .with_context(|| format!("{} is not a message row list or chat history", path.display()))?;
    Ok(match document {
        RowsDocument::Rows(rows) => rows,
        RowsDocument::Envelope { data } | RowsDocument::History(data) => data.messages,
    })
}

/// Rebuild a conversation from a persisted rows file.
pub fn replay_file(path: &Path) -> Result<Conversation> {
    let rows = read_rows(path)?;
    let turns = reconstruct(&mut TranscriptSession::new(), &rows)
        .with_context(|| format!("failed to replay {}", path.display()))?;
    info!(rows = rows.len(), turns = turns.len(), "replayed rows file");
    Ok(Conversation::from_turns(turns))
}

/// Decode a captured response stream as the answer to `prompt`.
pub fn decode_file(path: &Path, prompt: &str) -> Result<(DecoderState, Conversation)> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read stream capture {}", path.display()))?;
    let mut conversation = Conversation::new();
    conversation.begin_exchange(prompt, Vec::new());
    let mut tracker = ChatTracker::default();
    let state = decode_stream(
        &mut TranscriptSession::new(),
        &mut conversation,
        &bytes,
        &mut tracker,
    );
    info!(bytes = bytes.len(), state = state.as_str(), "decoded stream capture");
    Ok((state, conversation))
}

/// Outcome of one live exchange.
#[derive(Debug)]
pub struct StreamOutcome {
    pub state: DecoderState,
    pub chat_id: Option<String>,
    pub conversation: Conversation,
}

/// Stream `request` live. When the request names an existing chat its
/// history is loaded first, so retry and edit targets resolve.
pub async fn stream_request(
    client: &ChatApiClient,
    request: &ChatRequest,
    cancellation: &CancellationSignal,
) -> Result<StreamOutcome> {
    let mut session = TranscriptSession::new();
    let mut conversation = match request.chat_id() {
        Some(chat_id) => {
            client
                .load_transcript(chat_id, &mut session, Some(cancellation))
                .await
                .with_context(|| format!("failed to load chat {chat_id}"))?
                .conversation
        }
        None => Conversation::new(),
    };

    let mut tracker = ChatTracker {
        chat_id: request.chat_id().map(str::to_owned),
        ..ChatTracker::default()
    };
    let state = client
        .stream_chat(
            request,
            &mut session,
            &mut conversation,
            &mut tracker,
            Some(cancellation),
        )
        .await
        .with_context(|| format!("{} request failed", request.kind()))?;

    Ok(StreamOutcome {
        state,
        chat_id: tracker.chat_id,
        conversation,
    })
}

/// Remembers the chat id a stream assigns.
#[derive(Debug, Default)]
pub struct ChatTracker {
    pub chat_id: Option<String>,
    pub updates: usize,
}

impl StreamObserver for ChatTracker {
    fn chat_assigned(&mut self, info: &ChatInfo) {
        info!(chat_id = %info.id, title = info.title.as_deref().unwrap_or(""), "chat assigned");
        self.chat_id = Some(info.id.clone());
    }

    fn message_ids_assigned(&mut self, info: &MessageInfo) {
        debug!(
            user = info.user_message_id.as_deref().unwrap_or(""),
            assistant = info.assistant_message_id.as_deref().unwrap_or(""),
            "message ids assigned"
        );
    }

    fn turn_updated(&mut self, _turn: &Turn) {
        self.updates += 1;
    }
}

pub fn render(conversation: &Conversation, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&conversation.turns)?),
        OutputFormat::Raw => {
            let mut out = String::new();
            for turn in &conversation.turns {
                writeln!(out, "[{}] {}", role_label(turn), turn.id)?;
                out.push_str(&turn.text);
                out.push_str("\n\n");
            }
            Ok(out)
        }
        OutputFormat::Text => render_text(conversation),
    }
}

fn render_text(conversation: &Conversation) -> Result<String> {
    let mut out = String::new();
    for turn in &conversation.turns {
        writeln!(out, "[{}] {}", role_label(turn), turn.id)?;
        if !turn.files.is_empty() {
            let files: Vec<String> = turn.files.iter().map(file_label).collect();
            writeln!(out, "files: {}", files.join(", "))?;
        }

        let segments = split_transcript(&turn.text)
            .with_context(|| format!("turn {} holds a corrupt tool block", turn.id))?;
        for segment in segments {
            match segment {
                TranscriptSegment::Text(text) => {
                    out.push_str(text);
                    if !text.ends_with('\n') {
                        out.push('\n');
                    }
                }
                TranscriptSegment::Tool(block) => {
                    let names = block.names().join(", ");
                    let names = if names.is_empty() { "?" } else { names.as_str() };
                    writeln!(out, "[tool #{} {names}]", block.toolkey())?;
                    for call in block.calls() {
                        writeln!(out, "  call: {call}")?;
                    }
                    for result in block.results() {
                        writeln!(out, "  result: {result}")?;
                    }
                }
            }
        }
        out.push('\n');
    }
    Ok(out)
}

fn role_label(turn: &Turn) -> &'static str {
    match (turn.is_sent, turn.is_error) {
        (true, _) => "user",
        (false, true) => "error",
        (false, false) => "assistant",
    }
}

fn file_label(file: &Value) -> String {
    match file {
        Value::String(name) => name.clone(),
        other => other
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tool_transcript::{Conversation, Turn};

    use super::{file_label, render, role_label, OutputFormat};

    #[test]
    fn roles_follow_sender_and_error_flags() {
        assert_eq!(role_label(&Turn::user("q", Vec::new())), "user");
        assert_eq!(role_label(&Turn::assistant("a")), "assistant");
        assert_eq!(role_label(&Turn::error("boom")), "error");
    }

    #[test]
    fn file_labels_prefer_names() {
        assert_eq!(file_label(&json!("a.png")), "a.png");
        assert_eq!(file_label(&json!({"name": "b.pdf", "size": 3})), "b.pdf");
        assert_eq!(file_label(&json!(7)), "7");
    }

    #[test]
    fn json_output_lists_turns() {
        let conversation = Conversation::from_turns(vec![Turn::assistant("hi")]);
        let out = render(&conversation, OutputFormat::Json).expect("render");
        let turns: serde_json::Value = serde_json::from_str(&out).expect("json");
        assert_eq!(turns[0]["text"], "hi");
        assert_eq!(turns[0]["isSent"], false);
    }
}
