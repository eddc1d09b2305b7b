#![allow(dead_code)]

use tool_transcript::{ChatInfo, Conversation, MessageInfo, StreamEvent, StreamObserver, Turn};

pub const T0: &str = "2026-02-14T00:00:00Z";

/// Wire bytes for a sequence of events, terminated by the sentinel.
pub fn stream_bytes(events: &[StreamEvent]) -> Vec<u8> {
    let mut body = String::new();
    for event in events {
        body.push_str(&event.to_frame_line());
    }
    body.push_str("data: [DONE]\n");
    body.into_bytes()
}

/// Conversation with one pending user/assistant exchange.
pub fn exchange(text: &str) -> Conversation {
    let mut conversation = Conversation::new();
    conversation.begin_exchange(text, Vec::new());
    conversation
}

pub fn assistant_text(conversation: &Conversation) -> &str {
    conversation
        .last()
        .map(|turn| turn.text.as_str())
        .unwrap_or_default()
}

#[derive(Default)]
pub struct Recorder {
    pub chats: Vec<ChatInfo>,
    pub message_ids: Vec<MessageInfo>,
    pub updates: Vec<String>,
}

impl StreamObserver for Recorder {
    fn chat_assigned(&mut self, info: &ChatInfo) {
        self.chats.push(info.clone());
    }

    fn message_ids_assigned(&mut self, info: &MessageInfo) {
        self.message_ids.push(info.clone());
    }

    fn turn_updated(&mut self, turn: &Turn) {
        self.updates.push(turn.text.clone());
    }
}
