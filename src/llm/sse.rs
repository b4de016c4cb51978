// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Server-sent-events plumbing shared by the streaming adapters
//!
//! SSE is a newline-delimited text format: frames are separated by a blank
//! line and carry `event:` and `data:` fields. Adapters receive decoded
//! frames and map them onto canonical stream chunks; frames that fail to
//! parse downstream are logged and skipped, never fatal.

use futures::{Stream, StreamExt};

use crate::error::{ApiError, CaretError, Result};

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, when present
    pub event: Option<String>,
    /// The concatenated `data:` lines
    pub data: String,
}

/// Parse a single frame (the text between blank-line separators).
///
/// Returns `None` for frames without any `data:` field (comments,
/// keep-alives).
pub fn parse_sse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in frame.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

/// Locate the next blank-line frame separator, LF or CRLF flavored.
fn find_frame_boundary(buffer: &str) -> Option<(usize, usize)> {
    match (buffer.find("\n\n"), buffer.find("\r\n\r\n")) {
        (Some(lf), Some(crlf)) if crlf < lf => Some((crlf, 4)),
        (Some(lf), _) => Some((lf, 2)),
        (None, Some(crlf)) => Some((crlf, 4)),
        (None, None) => None,
    }
}

/// Turn an HTTP response body into a stream of decoded SSE frames.
pub fn sse_stream(response: reqwest::Response) -> impl Stream<Item = Result<SseEvent>> + Send {
    response
        .bytes_stream()
        .map(|result| {
            result.map_err(|e| CaretError::Api(ApiError::StreamError(e.to_string())))
        })
        .scan(String::new(), |buffer, result| {
            let chunk = match result {
                Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                Err(e) => return futures::future::ready(Some(vec![Err(e)])),
            };

            buffer.push_str(&chunk);

            let mut events = Vec::new();
            while let Some((pos, sep_len)) = find_frame_boundary(buffer) {
                let frame = buffer[..pos].to_string();
                *buffer = buffer[pos + sep_len..].to_string();

                if let Some(event) = parse_sse_frame(&frame) {
                    events.push(Ok(event));
                }
            }

            futures::future::ready(Some(events))
        })
        .flat_map(futures::stream::iter)
}
