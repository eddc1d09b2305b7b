use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("row {index} has a tool_call payload that is not valid JSON: {source}")]
    MalformedToolCall {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    BlockParse(#[from] BlockParseError),
}

impl TranscriptError {
    #[must_use]
    pub fn malformed_tool_call(index: usize, source: serde_json::Error) -> Self {
        Self::MalformedToolCall { index, source }
    }
}

/// Failure to decode an embedded `<tool-call>` block back into its payloads.
#[derive(Debug, Error)]
pub enum BlockParseError {
    #[error("tool block toolkey '{value}' is not an unsigned integer")]
    InvalidToolkey { value: String },

    #[error("tool block {toolkey} contains an unknown segment starting with '{prefix}'")]
    UnknownSegment { toolkey: u64, prefix: String },

    #[error("tool block {toolkey} segment {segment} is not valid base64: {source}")]
    Base64 {
        toolkey: u64,
        segment: usize,
        #[source]
        source: base64::DecodeError,
    },

    #[error("tool block {toolkey} segment {segment} does not decode to JSON: {source}")]
    Json {
        toolkey: u64,
        segment: usize,
        #[source]
        source: serde_json::Error,
    },
}
