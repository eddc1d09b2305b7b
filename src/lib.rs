//! Chat transcript construction with inline tool-call blocks.
//!
//! Two paths build the same [`Turn`] list:
//! - live: [`FrameBuffer`] splits the response byte stream, [`LiveDecoder`]
//!   dispatches each frame and grows the assistant turn;
//! - historical: [`reconstruct`] folds persisted [`RawMessageRow`]s.
//!
//! Both embed tool calls and results through [`ToolBlock`], so a replayed
//! transcript is byte-identical to the one produced while streaming. Tool
//! payloads are opaque JSON; nothing here interprets them.
//!
//! Keys handed to blocks come from a caller-owned [`TranscriptSession`];
//! there is no global state.

pub mod block;
pub mod error;
pub mod events;
pub mod frame;
pub mod live;
pub mod replay;
pub mod schema;
pub mod session;
pub mod turn;

pub use block::{split_transcript, ToolBlock, TranscriptSegment, NAME_PLACEHOLDER};
pub use error::{BlockParseError, TranscriptError};
pub use events::{ChatInfo, MessageInfo, StreamEnvelope, StreamEvent};
pub use frame::{Frame, FrameBuffer, DONE_SENTINEL, FRAME_PREFIX};
pub use live::{decode_stream, DecoderState, LiveDecoder, StreamObserver};
pub use replay::reconstruct;
pub use schema::{MessageRole, RawMessageRow};
pub use session::TranscriptSession;
pub use turn::{Conversation, Turn};
