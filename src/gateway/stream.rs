//! Streaming reassembly and outbound delta framing.

use async_stream::stream;
use axum::response::sse::Event;
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde_json::json;
use tracing::{trace, warn};

use super::translate::GenerateResponse;

/// Reassembles the backend's line-delimited JSON frames from arbitrarily
/// split network chunks. One assembler per connection.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: String,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every frame completed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<GenerateResponse> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(frame) => frames.push(frame),
                Err(err) => trace!(error = %err, "skipping undecodable stream line"),
            }
        }
        frames
    }

    /// Parse whatever is left once the upstream connection ends.
    pub fn finish(self) -> Option<GenerateResponse> {
        let line = self.buffer.trim();
        if line.is_empty() {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

/// Which outbound delta framing a connection asked for, decided by the
/// endpoint it hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaEncoding {
    /// Chat-completions `chat.completion.chunk` objects.
    Chat,
    /// Unified-protocol `response.output_text.delta` frames.
    Unified,
}

impl DeltaEncoding {
    /// Encode one backend frame as the event payload for this framing.
    pub fn delta_json(&self, model: &str, frame: &GenerateResponse) -> serde_json::Value {
        match self {
            Self::Unified => json!({
                "type": "response.output_text.delta",
                "output_index": 0,
                "content_index": 0,
                "delta": frame.response,
            }),
            Self::Chat => json!({
                "id": format!("chatcmpl-{}", Utc::now().timestamp_millis()),
                "object": "chat.completion.chunk",
                "created": Utc::now().timestamp(),
                "model": model,
                "choices": [{
                    "index": 0,
                    "delta": { "content": frame.response },
                    "finish_reason": frame.done.then_some("stop"),
                }],
            }),
        }
    }
}

/// Re-emit the backend's frame stream as server-sent events, ending with
/// the `[DONE]` sentinel once the backend reports completion.
pub fn sse_events(
    encoding: DeltaEncoding,
    model: String,
    upstream: reqwest::Response,
) -> impl Stream<Item = std::result::Result<Event, std::convert::Infallible>> {
    stream! {
        let mut assembler = LineAssembler::new();
        let byte_stream = upstream.bytes_stream();
        futures::pin_mut!(byte_stream);
        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    warn!(error = %err, "upstream stream failed mid-flight");
                    return;
                }
            };
            for frame in assembler.push(&String::from_utf8_lossy(&chunk)) {
                let done = frame.done;
                yield Ok(Event::default().data(encoding.delta_json(&model, &frame).to_string()));
                if done {
                    yield Ok(Event::default().data("[DONE]"));
                    return;
                }
            }
        }
        // Upstream closed without a terminator; flush any partial line.
        if let Some(frame) = assembler.finish() {
            let done = frame.done;
            yield Ok(Event::default().data(encoding.delta_json(&model, &frame).to_string()));
            if done {
                yield Ok(Event::default().data("[DONE]"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reassembles_lines_split_across_chunks() {
        let mut assembler = LineAssembler::new();

        let first = assembler.push("{\"response\":\"he\",\"done\":false}\n{\"resp");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].response, "he");
        assert!(!first[0].done);

        let second = assembler.push("onse\":\"llo\",\"done\":true}\n");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].response, "llo");
        assert!(second[0].done);
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut assembler = LineAssembler::new();
        let frames =
            assembler.push("{\"response\":\"a\",\"done\":false}\n{\"response\":\"b\",\"done\":false}\n");
        let texts: Vec<&str> = frames.iter().map(|f| f.response.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push("{\"response\":\"tail\",\"done\":true}").is_empty());
        let frame = assembler.finish().unwrap();
        assert_eq!(frame.response, "tail");
        assert!(frame.done);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let mut assembler = LineAssembler::new();
        let frames = assembler.push("not json\n{\"response\":\"ok\",\"done\":false}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].response, "ok");
    }

    #[test]
    fn unified_delta_frame_shape() {
        let frame = GenerateResponse {
            response: "hi".to_string(),
            done: false,
            ..Default::default()
        };
        let value = DeltaEncoding::Unified.delta_json("qwen2.5:0.5b", &frame);
        assert_eq!(value["type"], "response.output_text.delta");
        assert_eq!(value["delta"], "hi");
        assert_eq!(value["output_index"], 0);
    }

    #[test]
    fn chat_delta_frame_shape() {
        let frame = GenerateResponse {
            response: "hi".to_string(),
            done: true,
            ..Default::default()
        };
        let value = DeltaEncoding::Chat.delta_json("qwen2.5:0.5b", &frame);
        assert_eq!(value["object"], "chat.completion.chunk");
        assert_eq!(value["model"], "qwen2.5:0.5b");
        assert_eq!(value["choices"][0]["delta"]["content"], "hi");
        assert_eq!(value["choices"][0]["finish_reason"], "stop");

        let open = GenerateResponse::default();
        let value = DeltaEncoding::Chat.delta_json("qwen2.5:0.5b", &open);
        assert!(value["choices"][0]["finish_reason"].is_null());
    }
}
