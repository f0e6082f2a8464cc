//! Event framing for the progress stream.
//!
//! Each [`ProgressEvent`] travels as one server-sent-event frame:
//! `data: <json>\n\n`. The server side only needs [`encode`]; consumers feed
//! raw response chunks into a [`FrameDecoder`], which copes with frames and
//! multi-byte characters split across chunk boundaries.

use crate::model::event::ProgressEvent;
use thiserror::Error;

const DATA_PREFIX: &str = "data: ";
const FRAME_END: &[u8] = b"\n\n";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Serializes an event as a complete frame.
pub fn encode(event: &ProgressEvent) -> Result<String, serde_json::Error> {
    Ok(format!("{}{}\n\n", DATA_PREFIX, serde_json::to_string(event)?))
}

/// Incremental decoder for a stream of frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    // bytes of `buffer` already known not to start a frame terminator
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every event completed by it, in order.
    ///
    /// Lines that do not carry a `data: ` payload (comments, `event:` lines)
    /// are skipped. A malformed frame yields an error entry but does not stop
    /// decoding of the frames after it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<ProgressEvent, FrameError>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut from = self.scanned;
        while let Some(pos) = find(&self.buffer[from..], FRAME_END) {
            let end = from + pos;
            let frame: Vec<u8> = self.buffer.drain(..end + FRAME_END.len()).collect();
            if let Some(result) = decode_frame(&frame[..end]) {
                events.push(result);
            }
            from = 0;
        }
        // a terminator may straddle the next chunk boundary
        self.scanned = self.buffer.len().saturating_sub(FRAME_END.len() - 1);
        events
    }

    /// True while an incomplete frame is buffered.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn decode_frame(frame: &[u8]) -> Option<Result<ProgressEvent, FrameError>> {
    let text = match std::str::from_utf8(frame) {
        Ok(text) => text,
        Err(e) => return Some(Err(e.into())),
    };
    let payload: String = text
        .lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .collect::<Vec<_>>()
        .join("\n");
    if payload.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&payload).map_err(FrameError::from))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::RunSummary;
    use crate::model::record::EnrichedRecord;
    use serde_json::json;

    fn record_event(index: usize, title: &str, progress: u8) -> ProgressEvent {
        let fields = json!({ "title": title }).as_object().cloned().unwrap();
        ProgressEvent::Record {
            progress,
            product: EnrichedRecord::new(index, fields),
        }
    }

    #[test]
    fn encoded_frame_has_data_prefix_and_blank_line() {
        let frame = encode(&record_event(0, "Tuoli", 50)).unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
    }

    #[test]
    fn frames_split_across_chunks_decode_once_complete() {
        let mut stream = encode(&record_event(0, "Pöytä", 50)).unwrap().into_bytes();
        stream.extend(
            encode(&ProgressEvent::Summary {
                progress: 100,
                summary: RunSummary { emitted: 1, skipped: 1 },
            })
            .unwrap()
            .into_bytes(),
        );

        // split inside the two-byte 'ö' and inside the second frame
        let split_utf8 = stream.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&stream[..split_utf8]).is_empty());
        assert!(decoder.has_pending());

        let events = decoder.push(&stream[split_utf8..stream.len() - 5]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &record_event(0, "Pöytä", 50));

        let events = decoder.push(&stream[stream.len() - 5..]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().progress(), 100);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn byte_by_byte_feeding_finds_every_frame() {
        let mut stream = encode(&record_event(0, "Hylly", 50)).unwrap().into_bytes();
        stream.extend(encode(&record_event(1, "Sänky", 100)).unwrap().into_bytes());

        let mut decoder = FrameDecoder::new();
        let events: Vec<ProgressEvent> = stream
            .iter()
            .flat_map(|byte| decoder.push(std::slice::from_ref(byte)))
            .map(Result::unwrap)
            .collect();

        assert_eq!(events, [record_event(0, "Hylly", 50), record_event(1, "Sänky", 100)]);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn terminator_split_between_chunks_is_found() {
        let stream = encode(&record_event(2, "Lamppu", 30)).unwrap().into_bytes();
        let mut decoder = FrameDecoder::new();

        assert!(decoder.push(&stream[..stream.len() - 1]).is_empty());
        let events = decoder.push(&stream[stream.len() - 1..]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &record_event(2, "Lamppu", 30));
    }

    #[test]
    fn non_data_lines_are_ignored_and_bad_payloads_reported() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push(b": keep-alive\n\ndata: {oops}\n\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(FrameError::Payload(_))));
    }
}
