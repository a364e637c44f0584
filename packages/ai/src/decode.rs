// ABOUTME: Lenient decoding of model output and incremental SSE frame parsing
// ABOUTME: Recovers JSON objects from fenced or chatty responses

use serde_json::Value;

use crate::error::{AIServiceError, AIServiceResult};

/// Remove a surrounding markdown fence (```json ... ```) if present
pub fn strip_json_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let start = trimmed.find('\n').map(|i| i + 1).unwrap_or(trimmed.len());
    let end = trimmed[start..]
        .rfind("```")
        .map(|i| i + start)
        .unwrap_or(trimmed.len());
    trimmed[start..end].trim()
}

/// Decode structured model output.
///
/// Tries the (fence-stripped) text directly, accepting an object or a bare
/// array, then falls back to the span from the first `{` to the last `}`.
/// Fails with `Decode` when neither yields a JSON document.
pub fn extract_json_object(text: &str) -> AIServiceResult<Value> {
    let candidate = strip_json_fences(text);
    if let Ok(value @ (Value::Object(_) | Value::Array(_))) = serde_json::from_str::<Value>(candidate) {
        return Ok(value);
    }

    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(AIServiceError::Decode(
            "no JSON object boundary in model output".to_string(),
        ));
    };
    if end < start {
        return Err(AIServiceError::Decode(
            "no JSON object boundary in model output".to_string(),
        ));
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(AIServiceError::Decode(
            "model output is not a JSON object".to_string(),
        )),
        Err(e) => Err(AIServiceError::Decode(format!(
            "invalid JSON in model output: {}",
            e
        ))),
    }
}

/// Accumulates raw SSE bytes and yields the `data:` payloads of complete events.
///
/// Bytes are only decoded once an event is complete, so a multi-byte character
/// split across network reads survives intact.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete event's data lines
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // CR never appears inside a UTF-8 sequence
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(event_end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let event: Vec<u8> = self.buffer.drain(..event_end + 2).collect();
            payloads.extend(data_lines(&String::from_utf8_lossy(&event)));
        }
        payloads
    }

    /// Data lines of a trailing event that was never terminated by a blank line
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_lines(&String::from_utf8_lossy(&rest))
    }
}

fn data_lines(event: &str) -> Vec<String> {
    event
        .lines()
        .filter_map(|line| {
            line.strip_prefix("data:")
                .map(|data| data.trim_start().to_string())
        })
        .filter(|data| !data.is_empty() && data != "[DONE]")
        .collect()
}
