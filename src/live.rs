//! Live decoding of a chat completion frame stream into the current turn.

use tracing::{debug, warn};

use crate::block::ToolBlock;
use crate::events::{call_names, value_as_text, ChatInfo, MessageInfo, StreamEnvelope, StreamEvent};
use crate::frame::{Frame, FrameBuffer};
use crate::session::TranscriptSession;
use crate::turn::{Conversation, Turn};

/// Lifecycle of one live decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Streaming,
    Completed,
    Aborted,
    Errored,
}

impl DecoderState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Errored)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Errored => "errored",
        }
    }
}

/// Out-of-band notifications emitted while a stream is decoded.
///
/// Every method defaults to a no-op, so observers implement only what they
/// forward (session state, navigation, a renderer).
pub trait StreamObserver {
    /// The server created a durable conversation for this exchange.
    fn chat_assigned(&mut self, _info: &ChatInfo) {}

    /// The latest user/assistant turns received permanent ids.
    fn message_ids_assigned(&mut self, _info: &MessageInfo) {}

    /// The turn under construction changed; called once per applied frame.
    fn turn_updated(&mut self, _turn: &Turn) {}
}

impl StreamObserver for () {}

#[derive(Debug)]
struct PendingBlock {
    block: ToolBlock,
    expected: usize,
    received: usize,
}

/// Stateful consumer of one response stream.
///
/// Text frames accumulate as prose. Tool call batches open a [`ToolBlock`]
/// that stays pending, rendered closed with a placeholder name, until its
/// results arrive; it is then folded into the prose exactly once.
pub struct LiveDecoder<'s> {
    session: &'s mut TranscriptSession,
    frames: FrameBuffer,
    state: DecoderState,
    plain_text: String,
    pending: Option<PendingBlock>,
}

impl<'s> LiveDecoder<'s> {
    pub fn new(session: &'s mut TranscriptSession) -> Self {
        Self {
            session,
            frames: FrameBuffer::default(),
            state: DecoderState::Idle,
            plain_text: String::new(),
            pending: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Text the turn currently shows: folded prose plus any pending block.
    #[must_use]
    pub fn visible_text(&self) -> String {
        match &self.pending {
            Some(pending) => format!("{}{}", self.plain_text, pending.block.render_pending()),
            None => self.plain_text.clone(),
        }
    }

    /// Feed one transport chunk and apply every complete frame in it.
    pub fn feed<O>(
        &mut self,
        conversation: &mut Conversation,
        chunk: &[u8],
        observer: &mut O,
    ) -> DecoderState
    where
        O: StreamObserver + ?Sized,
    {
        if self.state.is_terminal() {
            debug!(state = self.state.as_str(), bytes = chunk.len(), "ignoring chunk after terminal state");
            return self.state;
        }

        for frame in self.frames.feed(chunk) {
            if self.state.is_terminal() {
                debug!(state = self.state.as_str(), "dropping frame after terminal state");
                break;
            }
            self.apply_frame(conversation, frame, observer);
        }

        self.state
    }

    /// The transport ended normally; flush buffered input and settle the turn.
    pub fn finish<O>(&mut self, conversation: &mut Conversation, observer: &mut O) -> DecoderState
    where
        O: StreamObserver + ?Sized,
    {
        if let Some(frame) = self.frames.flush() {
            if !self.state.is_terminal() {
                self.apply_frame(conversation, frame, observer);
            }
        }
        if !self.state.is_terminal() {
            self.settle(conversation, observer, DecoderState::Completed);
        }
        self.state
    }

    /// The caller cancelled mid-stream; keep what was accumulated.
    pub fn abort<O>(&mut self, conversation: &mut Conversation, observer: &mut O) -> DecoderState
    where
        O: StreamObserver + ?Sized,
    {
        if !self.state.is_terminal() {
            self.settle(conversation, observer, DecoderState::Aborted);
        }
        self.state
    }

    /// Fatal failure for this turn: replace it with an error entry.
    pub fn fail<O>(
        &mut self,
        conversation: &mut Conversation,
        message: &str,
        observer: &mut O,
    ) -> DecoderState
    where
        O: StreamObserver + ?Sized,
    {
        warn!(%message, "chat stream failed");
        self.pending = None;
        self.state = DecoderState::Errored;
        let turn = conversation.open_assistant();
        *turn = Turn::error(message);
        observer.turn_updated(turn);
        self.state
    }

    /// Apply one already-split frame.
    pub fn apply_frame<O>(&mut self, conversation: &mut Conversation, frame: Frame, observer: &mut O)
    where
        O: StreamObserver + ?Sized,
    {
        let body = match frame {
            Frame::Done => {
                debug!("received stream sentinel");
                self.settle(conversation, observer, DecoderState::Completed);
                return;
            }
            Frame::Data(body) => body,
        };

        if self.state == DecoderState::Idle {
            debug!("stream started");
            self.state = DecoderState::Streaming;
        }

        let envelope = match StreamEnvelope::parse(&body) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%error, "skipping malformed stream frame");
                return;
            }
        };

        if let Some(message) = envelope.error_message() {
            self.fail(conversation, &message, observer);
            return;
        }

        match envelope.event() {
            Ok(Some(event)) => self.apply_event(conversation, event, observer),
            Ok(None) => debug!("frame carried no message"),
            Err(error) => warn!(%error, "skipping frame with malformed message payload"),
        }
    }

    /// Apply one decoded event to the turn under construction.
    pub fn apply_event<O>(
        &mut self,
        conversation: &mut Conversation,
        event: StreamEvent,
        observer: &mut O,
    ) where
        O: StreamObserver + ?Sized,
    {
        match event {
            StreamEvent::Text(content) => {
                self.plain_text.push_str(&content);
                self.publish(conversation, observer);
            }
            StreamEvent::ToolCalls(calls) => {
                if call_names(&calls).is_empty() {
                    debug!("skipping tool_calls frame without resolved names");
                    return;
                }
                let pending = self.pending_block();
                pending.expected += pending.block.push_calls(calls);
                debug!(
                    toolkey = pending.block.toolkey(),
                    expected = pending.expected,
                    "tool calls buffered"
                );
                self.publish(conversation, observer);
            }
            StreamEvent::ToolResult { name, result } => {
                let pending = self.pending_block();
                pending.block.push_result(name, result);
                pending.received += 1;
                debug!(
                    toolkey = pending.block.toolkey(),
                    received = pending.received,
                    expected = pending.expected,
                    "tool result received"
                );
                if pending.received >= pending.expected {
                    self.fold_pending();
                }
                self.publish(conversation, observer);
            }
            StreamEvent::ChatInfo(info) => {
                debug!(chat_id = %info.id, "chat id assigned");
                observer.chat_assigned(&info);
            }
            StreamEvent::MessageInfo(info) => {
                assign_message_ids(conversation, &info);
                observer.message_ids_assigned(&info);
            }
            StreamEvent::Error(content) => {
                self.plain_text.push_str("\n\nError: ");
                self.plain_text.push_str(&value_as_text(&content));
                conversation.open_assistant().is_error = true;
                self.publish(conversation, observer);
            }
            StreamEvent::Unknown { event_type } => {
                debug!(%event_type, "ignoring unknown stream event");
            }
        }
    }

    fn pending_block(&mut self) -> &mut PendingBlock {
        let session = &mut *self.session;
        self.pending.get_or_insert_with(|| PendingBlock {
            block: ToolBlock::new(session.claim_toolkey()),
            expected: 0,
            received: 0,
        })
    }

    fn fold_pending(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        debug!(
            toolkey = pending.block.toolkey(),
            received = pending.received,
            expected = pending.expected,
            "tool block folded"
        );
        self.plain_text.push_str(&pending.block.render());
        true
    }

    fn settle<O>(&mut self, conversation: &mut Conversation, observer: &mut O, state: DecoderState)
    where
        O: StreamObserver + ?Sized,
    {
        if self.fold_pending() {
            self.publish(conversation, observer);
        }
        debug!(state = state.as_str(), "stream settled");
        self.state = state;
    }

    fn publish<O>(&self, conversation: &mut Conversation, observer: &mut O)
    where
        O: StreamObserver + ?Sized,
    {
        let turn = conversation.open_assistant();
        turn.text = self.visible_text();
        observer.turn_updated(turn);
    }
}

fn assign_message_ids(conversation: &mut Conversation, info: &MessageInfo) {
    let user_index = conversation.turns.len().checked_sub(2);
    if let (Some(id), Some(index)) = (&info.user_message_id, user_index) {
        conversation.turns[index].id = id.clone();
    }
    if let Some(id) = &info.assistant_message_id {
        if let Some(turn) = conversation.turns.last_mut() {
            turn.id = id.clone();
        }
    }
}

/// Decode a complete captured stream in one pass.
pub fn decode_stream<O>(
    session: &mut TranscriptSession,
    conversation: &mut Conversation,
    bytes: &[u8],
    observer: &mut O,
) -> DecoderState
where
    O: StreamObserver + ?Sized,
{
    let mut decoder = LiveDecoder::new(session);
    decoder.feed(conversation, bytes, observer);
    decoder.finish(conversation, observer)
}
