//! Historical reconstruction of a chat from persisted message rows.
//!
//! The fold mirrors the live decoder: buffered calls and results become one
//! [`ToolBlock`] rendered with the same encoder, so a replayed transcript
//! matches what was shown while the answer streamed.

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::block::ToolBlock;
use crate::error::TranscriptError;
use crate::events::call_names;
use crate::schema::{MessageRole, RawMessageRow};
use crate::session::TranscriptSession;
use crate::turn::{unix_millis, Turn};

/// Rebuild the turn list of one chat from its rows, in persistence order.
pub fn reconstruct(
    session: &mut TranscriptSession,
    rows: &[RawMessageRow],
) -> Result<Vec<Turn>, TranscriptError> {
    let mut replay = Replay::new(session);

    for (index, row) in rows.iter().enumerate() {
        let timestamp = replay.timestamp(index, &row.created_at);
        let next_is_result = rows
            .get(index + 1)
            .is_some_and(|next| next.role == MessageRole::ToolResult);
        replay.apply(index, row, timestamp, next_is_result)?;
    }
    replay.settle();

    debug!(
        rows = rows.len(),
        turns = replay.turns.len(),
        "transcript reconstructed"
    );
    Ok(replay.turns)
}

struct Replay<'s> {
    session: &'s mut TranscriptSession,
    turns: Vec<Turn>,
    calls: Vec<Value>,
    results: Vec<(Option<String>, Value)>,
}

impl<'s> Replay<'s> {
    fn new(session: &'s mut TranscriptSession) -> Self {
        Self {
            session,
            turns: Vec::new(),
            calls: Vec::new(),
            results: Vec::new(),
        }
    }

    fn apply(
        &mut self,
        index: usize,
        row: &RawMessageRow,
        timestamp: i64,
        next_is_result: bool,
    ) -> Result<(), TranscriptError> {
        match row.role {
            MessageRole::User => {
                self.settle();
                self.turns
                    .push(row_turn(index, row, &row.content, timestamp, true));
            }
            MessageRole::ToolCall => {
                let payload = serde_json::from_str::<Value>(&row.content)
                    .map_err(|source| TranscriptError::malformed_tool_call(index, source))?;
                self.calls.push(payload);
                self.land(index, row, "", timestamp);
            }
            MessageRole::ToolResult => {
                self.results.push(unwrap_result(&row.content));
                self.land(index, row, "", timestamp);
                if next_is_result {
                    return Ok(());
                }
                self.fold();
            }
            MessageRole::Assistant if row.has_tool_calls() => {
                let calls_open = !self.calls.is_empty();
                let (turn, opened) = self.land(index, row, &row.content, timestamp);
                if !opened && !calls_open {
                    turn.text.push_str(&row.content);
                }
                let batch = row.tool_calls.clone().unwrap_or(Value::Null);
                if call_names(&batch).is_empty() {
                    debug!(row = index, "skipping tool call batch without resolved names");
                } else {
                    self.calls.push(batch);
                }
            }
            MessageRole::Assistant => {
                let (turn, opened) = self.land(index, row, &row.content, timestamp);
                if !opened {
                    turn.text.push_str(&row.content);
                }
            }
            MessageRole::Unknown => {
                if let Some(turn) = self.turns.last_mut().filter(|turn| !turn.is_sent) {
                    turn.merge_files(&row.files);
                }
            }
        }
        Ok(())
    }

    /// The open assistant turn for a non-user row, pushed with `content` when
    /// the last turn is the user's. Row files land on that turn.
    fn land(
        &mut self,
        index: usize,
        row: &RawMessageRow,
        content: &str,
        timestamp: i64,
    ) -> (&mut Turn, bool) {
        let opened = self.turns.last().map_or(true, |turn| turn.is_sent);
        if opened {
            self.turns.push(row_turn(index, row, content, timestamp, false));
        }
        let last = self.turns.len() - 1;
        let turn = &mut self.turns[last];
        if !opened {
            turn.merge_files(&row.files);
        }
        (turn, opened)
    }

    /// Epoch milliseconds of row `index`; an unparsable value inherits the
    /// previous turn's time so ordering is kept.
    fn timestamp(&self, index: usize, value: &str) -> i64 {
        parse_timestamp(value).unwrap_or_else(|| {
            let fallback = self.turns.last().map_or(0, |turn| turn.timestamp);
            warn!(row = index, %value, fallback, "row has an invalid createdAt");
            fallback
        })
    }

    /// Close a tool round that never received all of its results. The block
    /// is rendered with whatever arrived, as when a stream ends early.
    fn settle(&mut self) {
        if self.calls.is_empty() && self.results.is_empty() {
            return;
        }
        debug!(
            calls = self.calls.len(),
            results = self.results.len(),
            "closing unfinished tool round"
        );
        self.fold();
    }

    fn fold(&mut self) {
        let mut block = ToolBlock::new(self.session.claim_toolkey());
        for batch in self.calls.drain(..) {
            block.push_calls(batch);
        }
        for (name, result) in self.results.drain(..) {
            block.push_result(name, result);
        }
        debug!(
            toolkey = block.toolkey(),
            calls = block.calls().len(),
            results = block.results().len(),
            "tool block folded"
        );

        let rendered = block.render();
        if let Some(turn) = self.turns.last_mut() {
            turn.text.push_str(&rendered);
        }
    }
}

fn row_turn(
    index: usize,
    row: &RawMessageRow,
    content: &str,
    timestamp: i64,
    is_sent: bool,
) -> Turn {
    Turn {
        id: row.stable_id().unwrap_or_else(|| format!("row-{index}")),
        text: content.to_owned(),
        is_sent,
        timestamp,
        files: row.files.clone(),
        is_error: false,
    }
}

/// Split a persisted result into its back-patch name and payload.
///
/// Results stored in the `{ name, result }` envelope the stream uses are
/// unwrapped; anything else is the payload itself. Non-JSON content is kept
/// as a JSON string.
fn unwrap_result(content: &str) -> (Option<String>, Value) {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(mut map)) if map.contains_key("result") => {
            let name = map
                .get("name")
                .and_then(|name| name.as_str())
                .filter(|name| !name.is_empty())
                .map(ToString::to_string);
            let result = map.remove("result").unwrap_or(Value::Null);
            (name, result)
        }
        Ok(value) => (None, value),
        Err(_) => (None, Value::String(content.to_owned())),
    }
}

fn parse_timestamp(value: &str) -> Option<i64> {
    OffsetDateTime::parse(value, &Rfc3339).map(unix_millis).ok()
}
