mod support;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use support::T0;
use tool_transcript::{
    reconstruct, MessageRole, RawMessageRow, ToolBlock, TranscriptError, TranscriptSession,
    Turn,
};

fn batch() -> Value {
    json!([
        {"name": "search", "arguments": {"q": "a"}},
        {"name": "read", "arguments": {"path": "b"}},
        {"name": "search", "arguments": {"q": "c"}},
    ])
}

fn result_row(name: &str, result: Value) -> RawMessageRow {
    RawMessageRow::tool_result(&json!({"name": name, "result": result}), T0)
}

fn texts(turns: &[Turn]) -> Vec<&str> {
    turns.iter().map(|turn| turn.text.as_str()).collect()
}

#[test]
fn consecutive_results_fold_into_one_block() {
    let rows = vec![
        RawMessageRow::user("look things up", T0).with_message_id("u-1"),
        RawMessageRow::assistant("Let me look", T0)
            .with_tool_calls(batch())
            .with_message_id("a-1"),
        result_row("search", json!(1)),
        result_row("read", json!(2)),
        result_row("search", json!(3)),
        RawMessageRow::assistant("Done", T0),
    ];

    let mut session = TranscriptSession::new();
    let turns = reconstruct(&mut session, &rows).expect("reconstruct");

    let mut block = ToolBlock::new(0);
    block.push_calls(batch());
    block.push_result(Some("search".to_owned()), json!(1));
    block.push_result(Some("read".to_owned()), json!(2));
    block.push_result(Some("search".to_owned()), json!(3));

    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].id, "u-1");
    assert!(turns[0].is_sent);
    assert_eq!(turns[1].id, "a-1");
    assert!(!turns[1].is_sent);
    assert_eq!(turns[1].text, format!("Let me look{}Done", block.render()));
    assert_eq!(session.peek_toolkey(), 1);
}

#[test]
fn reconstruction_is_repeatable() {
    let rows = vec![
        RawMessageRow::user("q", T0),
        RawMessageRow::assistant("", T0).with_tool_calls(batch()),
        result_row("search", json!("x")),
        RawMessageRow::user("again", T0),
        RawMessageRow::tool_call(&json!([{"name": "read", "arguments": {}}]), T0),
        result_row("read", json!("y")),
        RawMessageRow::assistant("ok", T0),
    ];

    let first = reconstruct(&mut TranscriptSession::new(), &rows).expect("first pass");
    let second = reconstruct(&mut TranscriptSession::new(), &rows).expect("second pass");

    assert_eq!(texts(&first), texts(&second));
    assert_eq!(first.len(), 4);
    assert!(first[3].text.starts_with("\n<tool-call toolkey=1 name=\"read\">"));
    assert!(first[3].text.ends_with("</tool-call>\nok"));
}

#[test]
fn timestamps_come_from_rows_in_epoch_millis() {
    let rows = vec![
        RawMessageRow::user("q", T0),
        RawMessageRow::assistant("a", "2026-02-14T00:00:01.250Z"),
    ];
    let turns = reconstruct(&mut TranscriptSession::new(), &rows).expect("reconstruct");
    assert_eq!(turns[0].timestamp, 1_771_027_200_000);
    assert_eq!(turns[1].timestamp, 1_771_027_201_250);
}

#[test]
fn files_from_later_rows_merge_into_the_assistant_turn() {
    let rows = vec![
        RawMessageRow::user("see attached", T0).with_files(vec![json!("notes.txt")]),
        RawMessageRow::assistant("", T0)
            .with_tool_calls(json!([{"name": "render", "arguments": {}}]))
            .with_files(vec![json!("draft.png")]),
        result_row("render", json!("ok")).with_files(vec![json!("final.png")]),
    ];

    let turns = reconstruct(&mut TranscriptSession::new(), &rows).expect("reconstruct");
    assert_eq!(turns[0].files, vec![json!("notes.txt")]);
    assert_eq!(turns[1].files, vec![json!("draft.png"), json!("final.png")]);
}

#[test]
fn result_without_preceding_call_opens_an_assistant_turn() {
    let rows = vec![
        RawMessageRow::user("q", T0),
        result_row("lookup", json!({"hits": 0})),
    ];

    let turns = reconstruct(&mut TranscriptSession::new(), &rows).expect("reconstruct");
    assert_eq!(turns.len(), 2);
    assert!(!turns[1].is_sent);

    let block = ToolBlock::parse(&turns[1].text)
        .expect("parse")
        .expect("block");
    assert!(block.calls().is_empty());
    assert_eq!(block.results(), [json!({"hits": 0})]);
    assert!(turns[1].text.contains("name=\"lookup\""));
}

#[test]
fn unnamed_assistant_call_batches_are_skipped() {
    let rows = vec![
        RawMessageRow::user("q", T0),
        RawMessageRow::assistant("thinking", T0).with_tool_calls(json!([{"name": ""}])),
        RawMessageRow::assistant(" aloud", T0),
    ];

    let mut session = TranscriptSession::new();
    let turns = reconstruct(&mut session, &rows).expect("reconstruct");
    assert_eq!(texts(&turns), vec!["q", "thinking aloud"]);
    assert_eq!(session.peek_toolkey(), 0);
}

#[test]
fn raw_result_content_is_kept_as_payload() {
    let rows = vec![
        RawMessageRow::user("q", T0),
        RawMessageRow::tool_call(&json!([{"name": "echo"}]), T0),
        RawMessageRow::new(MessageRole::ToolResult, "not json at all", T0),
    ];

    let turns = reconstruct(&mut TranscriptSession::new(), &rows).expect("reconstruct");
    let block = ToolBlock::parse(&turns[1].text)
        .expect("parse")
        .expect("block");
    assert_eq!(block.results(), [json!("not json at all")]);
    assert_eq!(block.names(), ["echo".to_owned()]);
}

#[test]
fn malformed_tool_call_row_is_reported_with_its_index() {
    let rows = vec![
        RawMessageRow::user("q", T0),
        RawMessageRow::new(MessageRole::ToolCall, "{oops", T0),
    ];

    let error = reconstruct(&mut TranscriptSession::new(), &rows).expect_err("should fail");
    assert!(matches!(error, TranscriptError::MalformedToolCall { index: 1, .. }));
}

#[test]
fn invalid_timestamp_keeps_the_row_with_the_previous_time() {
    let rows = vec![
        RawMessageRow::user("q", "last tuesday"),
        RawMessageRow::assistant("a", "2026-02-14T00:00:01Z"),
        RawMessageRow::user("again", "soon"),
    ];

    let turns = reconstruct(&mut TranscriptSession::new(), &rows).expect("reconstruct");
    assert_eq!(texts(&turns), vec!["q", "a", "again"]);
    assert_eq!(turns[0].timestamp, 0);
    assert_eq!(turns[1].timestamp, 1_771_027_201_000);
    assert_eq!(turns[2].timestamp, 1_771_027_201_000);
}

#[test]
fn rows_without_ids_get_positional_ids() {
    let rows = vec![
        RawMessageRow::user("q", T0),
        RawMessageRow::assistant("a", T0),
    ];

    let first = reconstruct(&mut TranscriptSession::new(), &rows).expect("first pass");
    let second = reconstruct(&mut TranscriptSession::new(), &rows).expect("second pass");

    assert_eq!(first[0].id, "row-0");
    assert_eq!(first[1].id, "row-1");
    assert_eq!(first, second);
}

#[test]
fn unanswered_calls_close_before_the_next_user_turn() {
    let rows = vec![
        RawMessageRow::user("q", T0),
        RawMessageRow::assistant("Hi", T0)
            .with_tool_calls(json!([{"name": "search", "arguments": {}}])),
        RawMessageRow::user("still there?", T0),
        RawMessageRow::assistant("yes", T0)
            .with_tool_calls(json!([{"name": "read", "arguments": {}}])),
    ];

    let mut session = TranscriptSession::new();
    let turns = reconstruct(&mut session, &rows).expect("reconstruct");

    let mut search = ToolBlock::new(0);
    search.push_calls(json!([{"name": "search", "arguments": {}}]));
    let mut read = ToolBlock::new(1);
    read.push_calls(json!([{"name": "read", "arguments": {}}]));

    assert_eq!(turns.len(), 4);
    assert_eq!(turns[1].text, format!("Hi{}", search.render()));
    assert_eq!(turns[2].text, "still there?");
    assert_eq!(turns[3].text, format!("yes{}", read.render()));
    assert_eq!(session.peek_toolkey(), 2);
}

#[test]
fn rows_deserialized_from_history_json_replay() {
    let rows: Vec<RawMessageRow> = serde_json::from_value(json!([
        {"id": 1, "role": "user", "content": "hi", "createdAt": T0, "files": null},
        {"id": 2, "role": "assistant", "content": "hello", "createdAt": T0,
         "messageId": "m-2", "toolCalls": null, "files": []},
    ]))
    .expect("rows");

    let turns = reconstruct(&mut TranscriptSession::new(), &rows).expect("reconstruct");
    assert_eq!(turns[0].id, "1");
    assert_eq!(turns[1].id, "m-2");
    assert_eq!(texts(&turns), vec!["hi", "hello"]);
}
