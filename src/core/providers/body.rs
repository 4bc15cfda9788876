//! Request body construction and response extraction per wire format

use super::ProviderId;
use super::endpoints::WireFormat;
use super::params::SamplingParams;
use super::streaming;
use crate::core::catalog::ProviderModelMapping;
use crate::core::types::{ChatMessage, ChatRequest, ContentPart, MessageContent, MessageRole, ResponseFormat};
use serde_json::{Map, Value, json};

/// Anthropic requires max_tokens on every request
const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 4096;

/// Token usage as reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpstreamUsage {
    /// All prompt tokens, cached ones included
    pub prompt_tokens: u32,
    /// Visible completion tokens, reasoning excluded
    pub completion_tokens: u32,
    pub cached_tokens: u32,
    pub reasoning_tokens: u32,
}

/// Provider-agnostic view of a completed upstream response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionPayload {
    pub content: String,
    pub raw_finish_reason: Option<String>,
    pub usage: Option<UpstreamUsage>,
}

fn reasoning_budget(effort: &str) -> u32 {
    match effort {
        "low" => 1024,
        "high" => 16_000,
        _ => 4096,
    }
}

fn openai_message(message: &ChatMessage) -> Value {
    let mut value = serde_json::to_value(message).unwrap_or(Value::Null);
    if message.role == MessageRole::Developer {
        value["role"] = json!("system");
    }
    value
}

/// Build the JSON body for the chosen provider and endpoint variant
pub fn build_request_body(
    provider: ProviderId,
    mapping: &ProviderModelMapping,
    request: &ChatRequest,
    params: &SamplingParams,
    responses_api: bool,
) -> Value {
    let mut body = match provider.endpoint().wire {
        WireFormat::OpenAiChat if responses_api => responses_body(mapping, request, params),
        WireFormat::OpenAiChat => openai_chat_body(provider, mapping, request, params),
        WireFormat::Anthropic => anthropic_body(mapping, request, params),
        WireFormat::Google => google_body(request, params),
        WireFormat::BedrockConverse => bedrock_body(request, params),
    };
    enforce_max_tokens(&mut body, mapping);
    body
}

fn openai_chat_body(
    provider: ProviderId,
    mapping: &ProviderModelMapping,
    request: &ChatRequest,
    params: &SamplingParams,
) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), json!(mapping.model_name));
    body.insert(
        "messages".into(),
        Value::Array(request.messages.iter().map(openai_message).collect()),
    );
    insert_opt(&mut body, "temperature", params.temperature);
    insert_opt(&mut body, "top_p", params.top_p);
    insert_opt(&mut body, "frequency_penalty", params.frequency_penalty);
    insert_opt(&mut body, "presence_penalty", params.presence_penalty);

    if let Some(max_tokens) = params.max_tokens {
        // OpenAI reasoning models only accept the newer field
        let field = if mapping.capabilities.reasoning
            && matches!(provider, ProviderId::OpenAI | ProviderId::Azure)
        {
            "max_completion_tokens"
        } else {
            "max_tokens"
        };
        body.insert(field.into(), json!(max_tokens));
    }

    if request.stream {
        body.insert("stream".into(), json!(true));
        body.insert("stream_options".into(), json!({ "include_usage": true }));
    }
    if let Some(format) = &request.response_format {
        body.insert("response_format".into(), json!(format));
    }
    insert_opt(&mut body, "stop", request.stop.clone());
    insert_opt(&mut body, "tools", request.tools.clone());
    insert_opt(&mut body, "tool_choice", request.tool_choice.clone());
    if mapping.capabilities.reasoning {
        insert_opt(&mut body, "reasoning_effort", request.reasoning_effort.clone());
    }
    Value::Object(body)
}

fn responses_body(
    mapping: &ProviderModelMapping,
    request: &ChatRequest,
    params: &SamplingParams,
) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), json!(mapping.model_name));

    let instructions: Vec<String> = request
        .messages
        .iter()
        .filter(|m| m.role.is_instruction())
        .map(ChatMessage::text)
        .collect();
    if !instructions.is_empty() {
        body.insert("instructions".into(), json!(instructions.join("\n\n")));
    }

    let input: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| !m.role.is_instruction())
        .map(|m| {
            let role = if m.role == MessageRole::Assistant { "assistant" } else { "user" };
            json!({ "role": role, "content": m.text() })
        })
        .collect();
    body.insert("input".into(), Value::Array(input));

    insert_opt(&mut body, "temperature", params.temperature);
    insert_opt(&mut body, "top_p", params.top_p);
    insert_opt(&mut body, "max_output_tokens", params.max_tokens);
    if request.stream {
        body.insert("stream".into(), json!(true));
    }
    if let Some(effort) = &request.reasoning_effort {
        body.insert("reasoning".into(), json!({ "effort": effort }));
    }
    match &request.response_format {
        Some(ResponseFormat::JsonObject) => {
            body.insert("text".into(), json!({ "format": { "type": "json_object" } }));
        }
        Some(ResponseFormat::JsonSchema { json_schema }) => {
            body.insert(
                "text".into(),
                json!({ "format": {
                    "type": "json_schema",
                    "name": json_schema.name,
                    "schema": json_schema.schema,
                    "strict": json_schema.strict.unwrap_or(false),
                }}),
            );
        }
        _ => {}
    }
    insert_opt(&mut body, "tools", request.tools.clone());
    Value::Object(body)
}

fn anthropic_content(message: &ChatMessage) -> Value {
    match &message.content {
        Some(MessageContent::Parts(parts)) => Value::Array(
            parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                    ContentPart::ImageUrl { image_url } => json!({
                        "type": "image",
                        "source": { "type": "url", "url": image_url.url },
                    }),
                })
                .collect(),
        ),
        _ => json!(message.text()),
    }
}

fn anthropic_body(
    mapping: &ProviderModelMapping,
    request: &ChatRequest,
    params: &SamplingParams,
) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), json!(mapping.model_name));

    let system: Vec<String> = request
        .messages
        .iter()
        .filter(|m| m.role.is_instruction())
        .map(ChatMessage::text)
        .collect();
    if !system.is_empty() {
        body.insert("system".into(), json!(system.join("\n\n")));
    }

    let messages: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| !m.role.is_instruction())
        .map(|m| match m.role {
            MessageRole::Tool => json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
                    "content": m.text(),
                }],
            }),
            MessageRole::Assistant => json!({ "role": "assistant", "content": anthropic_content(m) }),
            _ => json!({ "role": "user", "content": anthropic_content(m) }),
        })
        .collect();
    body.insert("messages".into(), Value::Array(messages));

    let mut max_tokens = params
        .max_tokens
        .or(mapping.max_output)
        .unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS)
        .min(mapping.max_output.unwrap_or(u32::MAX));

    let thinking = request
        .reasoning_effort
        .as_deref()
        .filter(|_| mapping.capabilities.reasoning)
        .map(reasoning_budget);
    if let Some(budget) = thinking {
        max_tokens = max_tokens.max(budget.saturating_add(ANTHROPIC_DEFAULT_MAX_TOKENS));
        max_tokens = max_tokens.min(mapping.max_output.unwrap_or(u32::MAX));
        if budget < max_tokens {
            body.insert(
                "thinking".into(),
                json!({ "type": "enabled", "budget_tokens": budget }),
            );
        }
    }
    body.insert("max_tokens".into(), json!(max_tokens));

    // Extended thinking rejects custom temperature
    if !body.contains_key("thinking") {
        insert_opt(&mut body, "temperature", params.temperature);
        insert_opt(&mut body, "top_p", params.top_p);
    }
    if request.stream {
        body.insert("stream".into(), json!(true));
    }
    if let Some(stop) = &request.stop {
        body.insert("stop_sequences".into(), json!(stop));
    }
    if let Some(schema) = request.response_format.as_ref().and_then(ResponseFormat::schema) {
        body.insert(
            "output_format".into(),
            json!({ "type": "json_schema", "schema": schema }),
        );
    }
    if let Some(tools) = &request.tools {
        let tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                let f = &t["function"];
                json!({
                    "name": f["name"],
                    "description": f.get("description").cloned().unwrap_or(Value::Null),
                    "input_schema": f.get("parameters").cloned().unwrap_or_else(|| json!({"type": "object"})),
                })
            })
            .collect();
        body.insert("tools".into(), Value::Array(tools));
    }
    Value::Object(body)
}

fn google_body(request: &ChatRequest, params: &SamplingParams) -> Value {
    let mut body = Map::new();

    let system: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| m.role.is_instruction())
        .map(|m| json!({ "text": m.text() }))
        .collect();
    if !system.is_empty() {
        body.insert("systemInstruction".into(), json!({ "parts": system }));
    }

    let contents: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| !m.role.is_instruction())
        .map(|m| {
            let role = if m.role == MessageRole::Assistant { "model" } else { "user" };
            json!({ "role": role, "parts": [{ "text": m.text() }] })
        })
        .collect();
    body.insert("contents".into(), Value::Array(contents));

    let mut config = Map::new();
    insert_opt(&mut config, "temperature", params.temperature);
    insert_opt(&mut config, "topP", params.top_p);
    insert_opt(&mut config, "frequencyPenalty", params.frequency_penalty);
    insert_opt(&mut config, "presencePenalty", params.presence_penalty);
    insert_opt(&mut config, "maxOutputTokens", params.max_tokens);
    insert_opt(&mut config, "stopSequences", request.stop.clone());
    if request.expects_json() {
        config.insert("responseMimeType".into(), json!("application/json"));
        if let Some(schema) = request.response_format.as_ref().and_then(ResponseFormat::schema) {
            config.insert("responseSchema".into(), schema.clone());
        }
    }
    if let Some(effort) = &request.reasoning_effort {
        config.insert(
            "thinkingConfig".into(),
            json!({ "thinkingBudget": reasoning_budget(effort) }),
        );
    }
    if !config.is_empty() {
        body.insert("generationConfig".into(), Value::Object(config));
    }
    Value::Object(body)
}

fn bedrock_body(request: &ChatRequest, params: &SamplingParams) -> Value {
    let mut body = Map::new();

    let system: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| m.role.is_instruction())
        .map(|m| json!({ "text": m.text() }))
        .collect();
    if !system.is_empty() {
        body.insert("system".into(), Value::Array(system));
    }

    let messages: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| !m.role.is_instruction())
        .map(|m| {
            let role = if m.role == MessageRole::Assistant { "assistant" } else { "user" };
            json!({ "role": role, "content": [{ "text": m.text() }] })
        })
        .collect();
    body.insert("messages".into(), Value::Array(messages));

    let mut config = Map::new();
    insert_opt(&mut config, "maxTokens", params.max_tokens);
    insert_opt(&mut config, "temperature", params.temperature);
    insert_opt(&mut config, "topP", params.top_p);
    insert_opt(&mut config, "stopSequences", request.stop.clone());
    if !config.is_empty() {
        body.insert("inferenceConfig".into(), Value::Object(config));
    }
    Value::Object(body)
}

fn insert_opt<T: serde::Serialize>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        if let Ok(value) = serde_json::to_value(value) {
            map.insert(key.to_string(), value);
        }
    }
}

/// Clamp every wire-specific max-token field to the model's max output
pub fn enforce_max_tokens(body: &mut Value, mapping: &ProviderModelMapping) {
    let Some(limit) = mapping.max_output else {
        return;
    };
    let paths: [&[&str]; 5] = [
        &["max_tokens"],
        &["max_completion_tokens"],
        &["max_output_tokens"],
        &["generationConfig", "maxOutputTokens"],
        &["inferenceConfig", "maxTokens"],
    ];
    for path in paths {
        let mut slot = Some(&mut *body);
        for key in path {
            slot = slot.and_then(|v| v.get_mut(*key));
        }
        if let Some(slot) = slot {
            if slot.as_u64().map(|v| v > u64::from(limit)).unwrap_or(false) {
                *slot = json!(limit);
            }
        }
    }
}

fn as_u32(value: &Value) -> u32 {
    value.as_u64().map(|v| v.min(u64::from(u32::MAX)) as u32).unwrap_or(0)
}

/// Extract content, finish reason and usage from a non-streaming response body
pub fn extract_completion(
    provider: ProviderId,
    responses_api: bool,
    body: &Value,
) -> Result<CompletionPayload, String> {
    match provider.endpoint().wire {
        WireFormat::OpenAiChat if responses_api => extract_responses(body),
        WireFormat::OpenAiChat => extract_openai(body),
        WireFormat::Anthropic => extract_anthropic(body),
        WireFormat::Google => extract_google(body),
        WireFormat::BedrockConverse => extract_bedrock(body),
    }
}

/// Extract from a raw upstream body, decoding streams when `streamed`
pub fn extract_from_bytes(
    provider: ProviderId,
    responses_api: bool,
    streamed: bool,
    bytes: &[u8],
) -> Result<CompletionPayload, String> {
    if streamed {
        return streaming::collect_stream(provider, responses_api, bytes);
    }
    let body: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    extract_completion(provider, responses_api, &body)
}

pub(super) fn openai_usage(usage: &Value) -> Option<UpstreamUsage> {
    if usage.is_null() {
        return None;
    }
    let reasoning = as_u32(&usage["completion_tokens_details"]["reasoning_tokens"]);
    Some(UpstreamUsage {
        prompt_tokens: as_u32(&usage["prompt_tokens"]),
        // completion_tokens already counts reasoning tokens
        completion_tokens: as_u32(&usage["completion_tokens"]).saturating_sub(reasoning),
        cached_tokens: as_u32(&usage["prompt_tokens_details"]["cached_tokens"]),
        reasoning_tokens: reasoning,
    })
}

fn extract_openai(body: &Value) -> Result<CompletionPayload, String> {
    let choice = body["choices"]
        .get(0)
        .ok_or_else(|| "response has no choices".to_string())?;
    Ok(CompletionPayload {
        content: choice["message"]["content"].as_str().unwrap_or_default().to_string(),
        raw_finish_reason: choice["finish_reason"].as_str().map(str::to_string),
        usage: openai_usage(&body["usage"]),
    })
}

pub(super) fn extract_responses(body: &Value) -> Result<CompletionPayload, String> {
    let output = body["output"]
        .as_array()
        .ok_or_else(|| "response has no output".to_string())?;
    let content: String = output
        .iter()
        .filter(|item| item["type"] == "message")
        .flat_map(|item| item["content"].as_array().cloned().unwrap_or_default())
        .filter(|part| part["type"] == "output_text")
        .filter_map(|part| part["text"].as_str().map(str::to_string))
        .collect();

    let raw_finish_reason = match body["status"].as_str() {
        Some("incomplete") => body["incomplete_details"]["reason"]
            .as_str()
            .map(str::to_string)
            .or(Some("incomplete".to_string())),
        other => other.map(str::to_string),
    };

    let usage = &body["usage"];
    let usage = (!usage.is_null()).then(|| {
        let reasoning = as_u32(&usage["output_tokens_details"]["reasoning_tokens"]);
        UpstreamUsage {
            prompt_tokens: as_u32(&usage["input_tokens"]),
            completion_tokens: as_u32(&usage["output_tokens"]).saturating_sub(reasoning),
            cached_tokens: as_u32(&usage["input_tokens_details"]["cached_tokens"]),
            reasoning_tokens: reasoning,
        }
    });

    Ok(CompletionPayload {
        content,
        raw_finish_reason,
        usage,
    })
}

pub(super) fn anthropic_usage(usage: &Value) -> UpstreamUsage {
    let cached = as_u32(&usage["cache_read_input_tokens"]);
    UpstreamUsage {
        // input_tokens excludes cache reads and writes
        prompt_tokens: as_u32(&usage["input_tokens"])
            .saturating_add(cached)
            .saturating_add(as_u32(&usage["cache_creation_input_tokens"])),
        completion_tokens: as_u32(&usage["output_tokens"]),
        cached_tokens: cached,
        reasoning_tokens: 0,
    }
}

fn extract_anthropic(body: &Value) -> Result<CompletionPayload, String> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| "response has no content".to_string())?;
    let content: String = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();
    Ok(CompletionPayload {
        content,
        raw_finish_reason: body["stop_reason"].as_str().map(str::to_string),
        usage: (!body["usage"].is_null()).then(|| anthropic_usage(&body["usage"])),
    })
}

pub(super) fn google_usage(usage: &Value) -> Option<UpstreamUsage> {
    (!usage.is_null()).then(|| UpstreamUsage {
        prompt_tokens: as_u32(&usage["promptTokenCount"]),
        completion_tokens: as_u32(&usage["candidatesTokenCount"]),
        cached_tokens: as_u32(&usage["cachedContentTokenCount"]),
        reasoning_tokens: as_u32(&usage["thoughtsTokenCount"]),
    })
}

pub(super) fn google_text(candidate: &Value) -> String {
    candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p["thought"] != true)
                .filter_map(|p| p["text"].as_str())
                .collect()
        })
        .unwrap_or_default()
}

fn extract_google(body: &Value) -> Result<CompletionPayload, String> {
    let candidate = body["candidates"].get(0);
    if candidate.is_none() && body["promptFeedback"]["blockReason"].is_string() {
        return Ok(CompletionPayload {
            content: String::new(),
            raw_finish_reason: body["promptFeedback"]["blockReason"]
                .as_str()
                .map(str::to_string),
            usage: google_usage(&body["usageMetadata"]),
        });
    }
    let candidate = candidate.ok_or_else(|| "response has no candidates".to_string())?;
    Ok(CompletionPayload {
        content: google_text(candidate),
        raw_finish_reason: candidate["finishReason"].as_str().map(str::to_string),
        usage: google_usage(&body["usageMetadata"]),
    })
}

pub(super) fn bedrock_usage(usage: &Value) -> Option<UpstreamUsage> {
    (!usage.is_null()).then(|| {
        let cached = as_u32(&usage["cacheReadInputTokens"]);
        UpstreamUsage {
            prompt_tokens: as_u32(&usage["inputTokens"]).saturating_add(cached),
            completion_tokens: as_u32(&usage["outputTokens"]),
            cached_tokens: cached,
            reasoning_tokens: 0,
        }
    })
}

fn extract_bedrock(body: &Value) -> Result<CompletionPayload, String> {
    let blocks = body["output"]["message"]["content"]
        .as_array()
        .ok_or_else(|| "response has no output message".to_string())?;
    Ok(CompletionPayload {
        content: blocks.iter().filter_map(|b| b["text"].as_str()).collect(),
        raw_finish_reason: body["stopReason"].as_str().map(str::to_string),
        usage: bedrock_usage(&body["usage"]),
    })
}
