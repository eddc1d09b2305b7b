use pretty_assertions::assert_eq;
use serde_json::json;
use tool_transcript::block::{decode_segment, encode_segment};
use tool_transcript::{
    split_transcript, BlockParseError, Frame, FrameBuffer, ToolBlock, TranscriptSegment,
};

#[test]
fn segments_survive_delimiter_characters() {
    let payload = json!({"text": "## heading\n<tool-call toolkey=9>\"quoted\"</tool-call>"});
    let encoded = encode_segment(&payload);

    assert!(!encoded.contains('#'));
    assert!(!encoded.contains('<'));
    assert!(!encoded.contains('\n'));
    assert_eq!(decode_segment(0, 0, &encoded).expect("decode"), payload);
}

#[test]
fn rendered_block_parses_back_to_the_same_block() {
    let mut block = ToolBlock::new(4);
    block.push_calls(json!([{"name": "search", "arguments": {"q": "a"}}]));
    block.push_calls(json!([{"name": "read", "arguments": {}}]));
    block.push_result(None, json!([1, 2, 3]));
    block.push_result(Some("read".to_owned()), json!("body"));

    let rendered = block.render();
    assert!(rendered.starts_with("\n<tool-call toolkey=4 name=\"search, read\">##Tool Calls:"));

    let parsed = ToolBlock::parse(&rendered).expect("parse").expect("block");
    assert_eq!(parsed.toolkey(), 4);
    assert_eq!(parsed.calls(), block.calls());
    assert_eq!(parsed.results(), block.results());
    assert_eq!(parsed.names(), block.names());
}

#[test]
fn transcript_splits_into_prose_and_blocks_in_order() {
    let mut first = ToolBlock::new(0);
    first.push_calls(json!([{"name": "a"}]));
    first.push_result(None, json!(1));
    let mut second = ToolBlock::new(1);
    second.push_result(Some("b".to_owned()), json!(2));

    let text = format!("intro{}middle{}", first.render(), second.render());
    let segments = split_transcript(&text).expect("split");

    assert_eq!(segments.len(), 4);
    assert_eq!(segments[0], TranscriptSegment::Text("intro"));
    assert_eq!(segments[1], TranscriptSegment::Tool(first));
    assert_eq!(segments[2], TranscriptSegment::Text("middle"));
    let TranscriptSegment::Tool(tail) = &segments[3] else {
        panic!("last segment should be a tool block");
    };
    assert_eq!(tail.toolkey(), 1);
    assert!(tail.calls().is_empty());
    assert_eq!(tail.results(), [json!(2)]);
    assert_eq!(tail.names(), ["b".to_owned()]);
}

#[test]
fn prose_without_blocks_is_one_segment() {
    assert_eq!(
        split_transcript("just words").expect("split"),
        vec![TranscriptSegment::Text("just words")]
    );
    assert!(split_transcript("").expect("split").is_empty());
}

#[test]
fn corrupt_blocks_are_reported() {
    let bad_key = "<tool-call toolkey=x name=\"a\"></tool-call>";
    assert!(matches!(
        ToolBlock::parse(bad_key),
        Err(BlockParseError::InvalidToolkey { value }) if value == "x"
    ));

    let bad_segment = "<tool-call toolkey=2 name=\"a\">##Tool Other:e30=</tool-call>";
    assert!(matches!(
        ToolBlock::parse(bad_segment),
        Err(BlockParseError::UnknownSegment { toolkey: 2, .. })
    ));

    let bad_base64 = "<tool-call toolkey=3 name=\"a\">##Tool Result:!!!</tool-call>";
    assert!(matches!(
        ToolBlock::parse(bad_base64),
        Err(BlockParseError::Base64 { toolkey: 3, segment: 0, .. })
    ));
}

#[test]
fn parse_frames_handles_crlf_and_unterminated_tail() {
    let frames = FrameBuffer::parse_frames(
        "data: {\"message\":\"a\"}\r\n\r\nid: 4\ndata:  [DONE] \r\ndata: {\"tail\":1}",
    );
    assert_eq!(
        frames,
        vec![
            Frame::Data("{\"message\":\"a\"}".to_owned()),
            Frame::Done,
            Frame::Data("{\"tail\":1}".to_owned()),
        ]
    );
}
