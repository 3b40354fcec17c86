//! Server-sent event framing for the engine's streams.

use std::io;

use chrono::Utc;
use engine::{EngineClient, EngineError, EventFilters, LogFrameCodec};
use futures_util::{Stream, StreamExt, TryStreamExt, future};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

/// Format one SSE frame. Multi-line text becomes one `data:` line per line.
pub fn format_sse_event(text: &str) -> String {
    let mut frame = String::new();
    for line in text.trim_end_matches(['\r', '\n']).split('\n') {
        frame.push_str("data: ");
        frame.push_str(line.trim_end_matches('\r'));
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

/// Final frame sent when a stream fails.
pub fn error_frame(message: &str) -> String {
    let body = serde_json::json!({
        "error": message,
        "timestamp": Utc::now(),
    });
    format_sse_event(&body.to_string())
}

/// Pass frames through until the first failure, which becomes one error
/// frame and ends the stream.
fn until_error<S>(frames: S) -> impl Stream<Item = String> + Send
where
    S: Stream<Item = Result<String, String>> + Send,
{
    frames.scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        future::ready(Some(match item {
            Ok(frame) => frame,
            Err(e) => {
                *failed = true;
                error_frame(&e)
            }
        }))
    })
}

/// Follow a container's logs as SSE frames of decoded text.
pub async fn log_events(
    client: &EngineClient,
    container_id: &str,
) -> Result<impl Stream<Item = String> + Send + use<>, EngineError> {
    let body = client.stream_container_logs(container_id).await?;
    let reader = StreamReader::new(body.map_err(io::Error::other));
    let frames = FramedRead::new(reader, LogFrameCodec::new())
        .map_ok(|chunk| format_sse_event(&chunk.text()))
        .map_err(|e| e.to_string());
    Ok(until_error(frames))
}

/// Follow the engine event feed as SSE frames of raw chunks.
pub async fn engine_events(
    client: &EngineClient,
    filters: &EventFilters,
) -> Result<impl Stream<Item = String> + Send + use<>, EngineError> {
    let body = client.stream_events(filters).await?;
    let frames = body
        .map_ok(|chunk| format_sse_event(&String::from_utf8_lossy(&chunk)))
        .map_err(|e| e.to_string());
    Ok(until_error(frames))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use futures_util::stream;

    #[test]
    fn frames_single_and_multi_line_text() {
        assert_eq!(format_sse_event("{\"a\":1}"), "data: {\"a\":1}\n\n");
        assert_eq!(format_sse_event("one\ntwo\n"), "data: one\ndata: two\n\n");
        assert_eq!(format_sse_event("crlf\r\n"), "data: crlf\n\n");
    }

    #[test]
    fn error_frame_carries_message_and_timestamp() -> Result<(), serde_json::Error> {
        let frame = error_frame("connection reset");
        let json = frame
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap_or_default();
        let value: serde_json::Value = serde_json::from_str(json)?;
        assert_eq!(value["error"], "connection reset");
        assert!(value["timestamp"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn failure_ends_the_stream() {
        let items = vec![
            Ok("data: a\n\n".to_string()),
            Err("boom".to_string()),
            Ok("data: b\n\n".to_string()),
        ];
        let frames: Vec<String> = until_error(stream::iter(items)).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], "data: a\n\n");
        assert!(frames[1].contains("\"error\":\"boom\""));
    }
}
