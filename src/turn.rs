use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// One displayed chat entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: String,
    pub text: String,
    pub is_sent: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub files: Vec<Value>,
    #[serde(default)]
    pub is_error: bool,
}

impl Turn {
    #[must_use]
    pub fn user(text: impl Into<String>, files: Vec<Value>) -> Self {
        Self {
            id: provisional_id(),
            text: text.into(),
            is_sent: true,
            timestamp: now_millis(),
            files,
            is_error: false,
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: provisional_id(),
            text: text.into(),
            is_sent: false,
            timestamp: now_millis(),
            files: Vec::new(),
            is_error: false,
        }
    }

    /// Error entry that replaces an assistant turn after a fatal stream failure.
    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(format!("Error: {message}"))
        }
    }

    pub fn merge_files(&mut self, files: &[Value]) {
        self.files.extend_from_slice(files);
    }
}

/// The ordered turn list of one chat, as owned by the conversation view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub turns: Vec<Turn>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    /// Push the user's message and the empty assistant turn the stream fills.
    pub fn begin_exchange(&mut self, text: impl Into<String>, files: Vec<Value>) {
        self.turns.push(Turn::user(text, files));
        self.turns.push(Turn::assistant(""));
    }

    /// Truncate at `id` and re-open it empty for a retry.
    ///
    /// A retried user turn keeps its text and gets a fresh assistant turn after
    /// it; a retried assistant turn is cleared in place. Returns `false` when
    /// `id` is unknown.
    pub fn reset_for_retry(&mut self, id: &str) -> bool {
        let Some(index) = self.turns.iter().position(|turn| turn.id == id) else {
            return false;
        };
        self.turns.truncate(index + 1);
        if self.turns[index].is_sent {
            self.turns.push(Turn::assistant(""));
        } else {
            let turn = &mut self.turns[index];
            turn.text.clear();
            turn.is_error = false;
        }
        true
    }

    /// Replace the user turn `id` with edited text and clear its reply.
    pub fn reset_for_edit(&mut self, id: &str, text: impl Into<String>) -> bool {
        let Some(index) = self.turns.iter().position(|turn| turn.id == id) else {
            return false;
        };
        self.turns.truncate(index + 1);
        self.turns[index].text = text.into();
        self.turns.push(Turn::assistant(""));
        true
    }

    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The assistant turn currently being built, opened on demand.
    pub fn open_assistant(&mut self) -> &mut Turn {
        let needs_turn = self.turns.last().map_or(true, |turn| turn.is_sent);
        if needs_turn {
            self.turns.push(Turn::assistant(""));
        }
        let last = self.turns.len() - 1;
        &mut self.turns[last]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Fresh id for a turn the server has not named yet.
#[must_use]
pub fn provisional_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn now_millis() -> i64 {
    unix_millis(OffsetDateTime::now_utc())
}

pub(crate) fn unix_millis(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}
