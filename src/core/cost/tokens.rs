//! Heuristic token estimation for responses without reported usage

use crate::core::types::ChatMessage;

use super::TokenUsage;
use crate::core::providers::UpstreamUsage;

/// Average characters per token for English-heavy text
const CHARS_PER_TOKEN: usize = 4;
/// Role and delimiter tokens added per message by chat templates
const MESSAGE_OVERHEAD_TOKENS: u32 = 4;
/// Tokens priming the assistant reply
const REPLY_PRIMING_TOKENS: u32 = 3;

/// Estimate the token count of a piece of text
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

/// Estimate the prompt size of a conversation
pub fn estimate_prompt_tokens(messages: &[ChatMessage]) -> u32 {
    if messages.is_empty() {
        return 0;
    }
    messages
        .iter()
        .map(|m| estimate_tokens(&m.text()).saturating_add(MESSAGE_OVERHEAD_TOKENS))
        .fold(REPLY_PRIMING_TOKENS, u32::saturating_add)
}

/// Reported usage when present, otherwise an estimate flagged as such
pub fn resolve_usage(
    reported: Option<UpstreamUsage>,
    messages: &[ChatMessage],
    completion: &str,
) -> TokenUsage {
    match reported {
        Some(usage) => TokenUsage::from(usage),
        None => {
            TokenUsage::new(estimate_prompt_tokens(messages), estimate_tokens(completion)).estimated()
        }
    }
}
