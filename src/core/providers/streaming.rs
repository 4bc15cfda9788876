//! Aggregation of streamed upstream responses
//!
//! Server-sent events for every provider except Bedrock, which frames its
//! converse stream as AWS event-stream binary messages.

use super::ProviderId;
use super::body::{
    CompletionPayload, UpstreamUsage, anthropic_usage, bedrock_usage, extract_responses,
    google_text, google_usage, openai_usage,
};
use super::endpoints::WireFormat;
use serde_json::Value;

/// `data:` payloads of an SSE body, `[DONE]` excluded
pub fn parse_sse_events(text: &str) -> Vec<Value> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty() && *data != "[DONE]")
        .filter_map(|data| serde_json::from_str(data).ok())
        .collect()
}

/// Fold a complete streamed body into one payload
pub fn collect_stream(
    provider: ProviderId,
    responses_api: bool,
    bytes: &[u8],
) -> Result<CompletionPayload, String> {
    match provider.endpoint().wire {
        WireFormat::BedrockConverse => collect_bedrock(bytes),
        wire => {
            let events = parse_sse_events(&String::from_utf8_lossy(bytes));
            if events.is_empty() {
                return Err("stream carried no events".to_string());
            }
            if let Some(error) = events.iter().find(|e| e.get("error").is_some()) {
                return Err(error["error"].to_string());
            }
            Ok(match wire {
                WireFormat::OpenAiChat if responses_api => collect_responses(&events)?,
                WireFormat::Anthropic => collect_anthropic(&events),
                WireFormat::Google => collect_google(&events),
                _ => collect_openai(&events),
            })
        }
    }
}

fn collect_openai(events: &[Value]) -> CompletionPayload {
    let mut payload = CompletionPayload::default();
    for event in events {
        if let Some(choice) = event["choices"].get(0) {
            if let Some(text) = choice["delta"]["content"].as_str() {
                payload.content.push_str(text);
            }
            if let Some(reason) = choice["finish_reason"].as_str() {
                payload.raw_finish_reason = Some(reason.to_string());
            }
        }
        if let Some(usage) = openai_usage(&event["usage"]) {
            payload.usage = Some(usage);
        }
    }
    payload
}

fn collect_responses(events: &[Value]) -> Result<CompletionPayload, String> {
    let mut streamed = String::new();
    for event in events {
        match event["type"].as_str() {
            Some("response.output_text.delta") => {
                streamed.push_str(event["delta"].as_str().unwrap_or_default());
            }
            Some("response.completed") | Some("response.incomplete") => {
                let mut payload = extract_responses(&event["response"])?;
                if payload.content.is_empty() {
                    payload.content = streamed;
                }
                return Ok(payload);
            }
            _ => {}
        }
    }
    Ok(CompletionPayload {
        content: streamed,
        ..CompletionPayload::default()
    })
}

fn collect_anthropic(events: &[Value]) -> CompletionPayload {
    let mut payload = CompletionPayload::default();
    let mut usage = UpstreamUsage::default();
    let mut saw_usage = false;
    for event in events {
        match event["type"].as_str() {
            Some("message_start") => {
                usage = anthropic_usage(&event["message"]["usage"]);
                saw_usage = true;
            }
            Some("content_block_delta") => {
                if let Some(text) = event["delta"]["text"].as_str() {
                    payload.content.push_str(text);
                }
            }
            Some("message_delta") => {
                if let Some(reason) = event["delta"]["stop_reason"].as_str() {
                    payload.raw_finish_reason = Some(reason.to_string());
                }
                if let Some(output) = event["usage"]["output_tokens"].as_u64() {
                    usage.completion_tokens = output as u32;
                    saw_usage = true;
                }
            }
            _ => {}
        }
    }
    payload.usage = saw_usage.then_some(usage);
    payload
}

fn collect_google(events: &[Value]) -> CompletionPayload {
    let mut payload = CompletionPayload::default();
    for event in events {
        if let Some(candidate) = event["candidates"].get(0) {
            payload.content.push_str(&google_text(candidate));
            if let Some(reason) = candidate["finishReason"].as_str() {
                payload.raw_finish_reason = Some(reason.to_string());
            }
        }
        if let Some(usage) = google_usage(&event["usageMetadata"]) {
            payload.usage = Some(usage);
        }
    }
    payload
}

/// One decoded AWS event-stream message
#[derive(Debug, Clone, PartialEq)]
pub struct EventStreamMessage {
    pub event_type: Option<String>,
    pub message_type: Option<String>,
    pub payload: Vec<u8>,
}

fn read_u16(bytes: &[u8], at: usize) -> Option<usize> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
}

fn read_u32(bytes: &[u8], at: usize) -> Option<usize> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
}

/// Split an event-stream body into messages; CRCs are not verified
pub fn decode_event_stream(mut bytes: &[u8]) -> Result<Vec<EventStreamMessage>, String> {
    let mut messages = Vec::new();
    while !bytes.is_empty() {
        let total = read_u32(bytes, 0).ok_or("truncated prelude")?;
        let headers_len = read_u32(bytes, 4).ok_or("truncated prelude")?;
        if total < 16 + headers_len || total > bytes.len() {
            return Err(format!("invalid message length {}", total));
        }

        let headers = &bytes[12..12 + headers_len];
        let mut message = EventStreamMessage {
            event_type: None,
            message_type: None,
            payload: bytes[12 + headers_len..total - 4].to_vec(),
        };

        let mut at = 0;
        while at < headers.len() {
            let name_len = headers[at] as usize;
            let name = headers
                .get(at + 1..at + 1 + name_len)
                .ok_or("truncated header name")?;
            at += 1 + name_len;
            let value_type = *headers.get(at).ok_or("truncated header type")?;
            at += 1;
            let value_len = match value_type {
                0 | 1 => 0,
                2 => 1,
                3 => 2,
                4 => 4,
                5 | 8 => 8,
                9 => 16,
                6 | 7 => {
                    let len = read_u16(headers, at).ok_or("truncated header value")?;
                    at += 2;
                    len
                }
                other => return Err(format!("unknown header type {}", other)),
            };
            let value = headers
                .get(at..at + value_len)
                .ok_or("truncated header value")?;
            at += value_len;

            if value_type == 7 {
                let value = String::from_utf8_lossy(value).into_owned();
                match name {
                    b":event-type" => message.event_type = Some(value),
                    b":message-type" => message.message_type = Some(value),
                    _ => {}
                }
            }
        }

        messages.push(message);
        bytes = &bytes[total..];
    }
    Ok(messages)
}

fn collect_bedrock(bytes: &[u8]) -> Result<CompletionPayload, String> {
    let mut payload = CompletionPayload::default();
    for message in decode_event_stream(bytes)? {
        let body: Value = serde_json::from_slice(&message.payload).unwrap_or(Value::Null);
        if message.message_type.as_deref() == Some("exception") {
            return Err(body["message"]
                .as_str()
                .unwrap_or("bedrock stream exception")
                .to_string());
        }
        match message.event_type.as_deref() {
            Some("contentBlockDelta") => {
                if let Some(text) = body["delta"]["text"].as_str() {
                    payload.content.push_str(text);
                }
            }
            Some("messageStop") => {
                payload.raw_finish_reason = body["stopReason"].as_str().map(str::to_string);
            }
            Some("metadata") => payload.usage = bedrock_usage(&body["usage"]),
            _ => {}
        }
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event_type: &str, payload: &str) -> Vec<u8> {
        let mut headers = Vec::new();
        for (name, value) in [(":event-type", event_type), (":message-type", "event")] {
            headers.push(name.len() as u8);
            headers.extend_from_slice(name.as_bytes());
            headers.push(7);
            headers.extend_from_slice(&(value.len() as u16).to_be_bytes());
            headers.extend_from_slice(value.as_bytes());
        }
        let total = 16 + headers.len() + payload.len();
        let mut out = Vec::new();
        out.extend_from_slice(&(total as u32).to_be_bytes());
        out.extend_from_slice(&(headers.len() as u32).to_be_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&headers);
        out.extend_from_slice(payload.as_bytes());
        out.extend_from_slice(&[0; 4]);
        out
    }

    #[test]
    fn test_parse_sse_events_skips_done_and_comments() {
        let text = ": keepalive\n\ndata: {\"a\":1}\n\nevent: x\ndata: [DONE]\n\n";
        assert_eq!(parse_sse_events(text), vec![serde_json::json!({"a": 1})]);
    }

    #[test]
    fn test_collect_openai_stream() {
        let text = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2}}\n\n",
            "data: [DONE]\n\n",
        );
        let payload = collect_stream(ProviderId::OpenAI, false, text.as_bytes()).unwrap();
        assert_eq!(payload.content, "Hello");
        assert_eq!(payload.raw_finish_reason.as_deref(), Some("stop"));
        assert_eq!(payload.usage.unwrap().completion_tokens, 2);
    }

    #[test]
    fn test_collect_anthropic_stream() {
        let text = concat!(
            "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":9,\"output_tokens\":1}}}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"max_tokens\"},\"usage\":{\"output_tokens\":12}}\n\n",
        );
        let payload = collect_stream(ProviderId::Anthropic, false, text.as_bytes()).unwrap();
        assert_eq!(payload.content, "Hi");
        assert_eq!(payload.raw_finish_reason.as_deref(), Some("max_tokens"));
        let usage = payload.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 9);
        assert_eq!(usage.completion_tokens, 12);
    }

    #[test]
    fn test_collect_bedrock_event_stream() {
        let mut body = frame("contentBlockDelta", r#"{"contentBlockIndex":0,"delta":{"text":"Hey"}}"#);
        body.extend(frame("messageStop", r#"{"stopReason":"end_turn"}"#));
        body.extend(frame("metadata", r#"{"usage":{"inputTokens":4,"outputTokens":1}}"#));

        let payload = collect_stream(ProviderId::AwsBedrock, false, &body).unwrap();
        assert_eq!(payload.content, "Hey");
        assert_eq!(payload.raw_finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(payload.usage.unwrap().prompt_tokens, 4);
    }

    #[test]
    fn test_truncated_event_stream_is_an_error() {
        let body = frame("metadata", "{}");
        assert!(decode_event_stream(&body[..body.len() - 3]).is_err());
    }

    #[test]
    fn test_empty_sse_stream_is_an_error() {
        assert!(collect_stream(ProviderId::Groq, false, b"").is_err());
    }
}
