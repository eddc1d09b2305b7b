//! Inline tool block encoding.
//!
//! A block embeds one or more tool call batches and their results inside a
//! turn's prose:
//!
//! ```text
//! <tool-call toolkey=0 name="search">##Tool Calls:W3si...##Tool Result:Im9rIg==</tool-call>
//! ```
//!
//! Payloads are compact JSON, base64 encoded so that `#`, `<` and newlines in
//! the payload never collide with the delimiters. Blocks are built as
//! [`ToolBlock`] values and serialized in one render step.

use std::borrow::Cow;
use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde_json::Value;

use crate::error::BlockParseError;
use crate::events::call_names;

/// Name rendered while no call or result has supplied one yet.
pub const NAME_PLACEHOLDER: &str = "%name%";
pub const CLOSE_TAG: &str = "</tool-call>";
pub const CALLS_MARKER: &str = "##Tool Calls:";
pub const RESULT_MARKER: &str = "##Tool Result:";

const NAME_SEPARATOR: &str = ", ";
const QUOTE_ENTITY: &str = "&quot;";

fn block_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r#"(?s)\n?<tool-call toolkey=([^ >]*) name="([^"]*)">(.*?)</tool-call>\n?"#)
            .expect("tool block regex must compile")
    })
}

/// One inline unit of tool calls and their results.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolBlock {
    toolkey: u64,
    names: Vec<String>,
    calls: Vec<Value>,
    results: Vec<Value>,
    result_name: Option<String>,
}

impl ToolBlock {
    #[must_use]
    pub fn new(toolkey: u64) -> Self {
        Self {
            toolkey,
            names: Vec::new(),
            calls: Vec::new(),
            results: Vec::new(),
            result_name: None,
        }
    }

    #[must_use]
    pub fn toolkey(&self) -> u64 {
        self.toolkey
    }

    /// Append one call batch as its own segment.
    ///
    /// Returns how many calls in the batch carry a non-empty name; that is
    /// the number of results the batch is expected to produce.
    pub fn push_calls(&mut self, batch: Value) -> usize {
        let names = call_names(&batch);
        let named = names.len();
        for name in names {
            if !self.names.contains(&name) {
                self.names.push(name);
            }
        }
        self.calls.push(batch);
        named
    }

    /// Append one result segment; a non-empty `name` becomes the back-patch name.
    pub fn push_result(&mut self, name: Option<String>, result: Value) {
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            self.result_name = Some(name);
        }
        self.results.push(result);
    }

    #[must_use]
    pub fn calls(&self) -> &[Value] {
        &self.calls
    }

    #[must_use]
    pub fn results(&self) -> &[Value] {
        &self.results
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name shown while results are still arriving.
    #[must_use]
    pub fn display_name(&self) -> Cow<'_, str> {
        self.resolved_name()
            .unwrap_or(Cow::Borrowed(NAME_PLACEHOLDER))
    }

    /// Name written once the block is folded into the turn text.
    #[must_use]
    pub fn final_name(&self) -> Cow<'_, str> {
        self.resolved_name().unwrap_or(Cow::Borrowed(""))
    }

    fn resolved_name(&self) -> Option<Cow<'_, str>> {
        if !self.names.is_empty() {
            return Some(Cow::Owned(self.names.join(NAME_SEPARATOR)));
        }
        self.result_name.as_deref().map(Cow::Borrowed)
    }

    /// Serialize the block in its final form.
    #[must_use]
    pub fn render(&self) -> String {
        self.render_with_name(&self.final_name())
    }

    /// Serialize the block as shown mid-stream: closed eagerly, placeholder
    /// name until one is known.
    #[must_use]
    pub fn render_pending(&self) -> String {
        self.render_with_name(&self.display_name())
    }

    fn render_with_name(&self, name: &str) -> String {
        let mut out = format!(
            "\n<tool-call toolkey={} name=\"{}\">",
            self.toolkey,
            name.replace('"', QUOTE_ENTITY)
        );
        for call in &self.calls {
            out.push_str(CALLS_MARKER);
            out.push_str(&encode_segment(call));
        }
        for result in &self.results {
            out.push_str(RESULT_MARKER);
            out.push_str(&encode_segment(result));
        }
        out.push_str(CLOSE_TAG);
        out.push('\n');
        out
    }

    /// Parse a single rendered block (surrounding newlines optional).
    pub fn parse(text: &str) -> Result<Option<Self>, BlockParseError> {
        match block_regex().captures(text) {
            Some(captures) => parse_captures(&captures).map(Some),
            None => Ok(None),
        }
    }
}

/// Base64 of the compact JSON form of `value`.
#[must_use]
pub fn encode_segment(value: &Value) -> String {
    STANDARD.encode(value.to_string())
}

/// Inverse of [`encode_segment`].
pub fn decode_segment(
    toolkey: u64,
    segment: usize,
    encoded: &str,
) -> Result<Value, BlockParseError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|source| BlockParseError::Base64 {
            toolkey,
            segment,
            source,
        })?;
    serde_json::from_slice(&bytes).map_err(|source| BlockParseError::Json {
        toolkey,
        segment,
        source,
    })
}

/// One piece of a turn's text: prose or a decoded tool block.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptSegment<'a> {
    Text(&'a str),
    Tool(ToolBlock),
}

/// Split turn text into prose and tool blocks, in order.
pub fn split_transcript(text: &str) -> Result<Vec<TranscriptSegment<'_>>, BlockParseError> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for captures in block_regex().captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if whole.start() > cursor {
            segments.push(TranscriptSegment::Text(&text[cursor..whole.start()]));
        }
        segments.push(TranscriptSegment::Tool(parse_captures(&captures)?));
        cursor = whole.end();
    }

    if cursor < text.len() {
        segments.push(TranscriptSegment::Text(&text[cursor..]));
    }

    Ok(segments)
}

fn parse_captures(captures: &regex::Captures<'_>) -> Result<ToolBlock, BlockParseError> {
    let raw_key = captures.get(1).map_or("", |m| m.as_str());
    let toolkey = raw_key
        .parse::<u64>()
        .map_err(|_| BlockParseError::InvalidToolkey {
            value: raw_key.to_owned(),
        })?;
    let name = captures
        .get(2)
        .map_or(String::new(), |m| m.as_str().replace(QUOTE_ENTITY, "\""));
    let body = captures.get(3).map_or("", |m| m.as_str());

    let mut block = ToolBlock::new(toolkey);
    if !name.is_empty() && name != NAME_PLACEHOLDER {
        block.names = name.split(NAME_SEPARATOR).map(ToString::to_string).collect();
    }

    // Base64 never contains '#', so every "##" starts a new segment.
    for (segment, raw) in body.split("##").filter(|raw| !raw.is_empty()).enumerate() {
        if let Some(encoded) = raw.strip_prefix(&CALLS_MARKER[2..]) {
            block.calls.push(decode_segment(toolkey, segment, encoded)?);
        } else if let Some(encoded) = raw.strip_prefix(&RESULT_MARKER[2..]) {
            block.results.push(decode_segment(toolkey, segment, encoded)?);
        } else {
            return Err(BlockParseError::UnknownSegment {
                toolkey,
                prefix: raw.chars().take(16).collect(),
            });
        }
    }

    Ok(block)
}
