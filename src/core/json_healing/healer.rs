//! Staged repair of structured-output text

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("Invalid fenced block regex")
});

/// Stage that produced parseable JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingMethod {
    MarkdownExtraction,
    MixedContentExtraction,
    SyntaxFix,
    TruncationCompletion,
}

impl HealingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealingMethod::MarkdownExtraction => "markdown_extraction",
            HealingMethod::MixedContentExtraction => "mixed_content_extraction",
            HealingMethod::SyntaxFix => "syntax_fix",
            HealingMethod::TruncationCompletion => "truncation_completion",
        }
    }
}

impl std::fmt::Display for HealingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealingResult {
    pub content: String,
    pub healed: bool,
    pub method: Option<HealingMethod>,
}

impl HealingResult {
    fn unchanged(content: &str) -> Self {
        Self {
            content: content.to_string(),
            healed: false,
            method: None,
        }
    }

    fn healed(content: String, method: HealingMethod) -> Self {
        debug!(method = %method, "healed JSON response");
        Self {
            content,
            healed: true,
            method: Some(method),
        }
    }
}

fn parses(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

/// Repair model output into parseable JSON
///
/// Valid input is returned untouched. Each stage works on the output of the
/// previous one; the first stage yielding parseable JSON names the method.
/// Never fails: unrepairable text comes back unchanged with `healed = false`.
pub fn heal_json_response(text: &str) -> HealingResult {
    if parses(text) {
        return HealingResult::unchanged(text);
    }

    let mut current = text.trim().to_string();

    if let Some(inner) = extract_fenced(&current) {
        if parses(&inner) {
            return HealingResult::healed(inner, HealingMethod::MarkdownExtraction);
        }
        current = inner;
    }

    let starts = match extract_balanced(&current) {
        Extraction::Parsed(span) => {
            return HealingResult::healed(span, HealingMethod::MixedContentExtraction);
        }
        Extraction::Candidates(starts) => starts,
    };

    for start in starts {
        let candidate = &current[start..];
        let fixed = fix_syntax(candidate);
        if parses(&fixed) {
            return HealingResult::healed(fixed, HealingMethod::SyntaxFix);
        }
        if let Some(completed) = complete_truncated(&fixed) {
            return HealingResult::healed(completed, HealingMethod::TruncationCompletion);
        }
    }

    HealingResult::unchanged(text)
}

fn extract_fenced(text: &str) -> Option<String> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

enum Extraction {
    Parsed(String),
    /// No span parsed; byte offsets to attempt repair from, in order
    Candidates(Vec<usize>),
}

/// Try every balanced `{...}`/`[...]` span in order of its opening delimiter
///
/// Repair candidates are the first opening delimiter and the first one after
/// each top-level balanced span that did not parse, so a bracketed aside in
/// prose does not hide a truncated object behind it.
fn extract_balanced(text: &str) -> Extraction {
    let mut starts = Vec::new();
    // Opening delimiters before this offset belong to an earlier candidate
    let mut next_candidate_at = 0;
    for (idx, ch) in text.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let span = balanced_span_from(text, idx);
        if let Some(span) = span {
            if parses(span) {
                return Extraction::Parsed(span.to_string());
            }
        }
        if idx >= next_candidate_at {
            starts.push(idx);
            next_candidate_at = span.map_or(usize::MAX, |span| idx + span.len());
        }
    }
    Extraction::Candidates(starts)
}

fn balanced_span_from(text: &str, start: usize) -> Option<&str> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Single quotes to double quotes, bare keys quoted, trailing commas dropped
fn fix_syntax(text: &str) -> String {
    remove_trailing_commas(&quote_bare_keys(&normalize_quotes(text)))
}

fn normalize_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    // Which quote opened the current string, if any
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        match quote {
            None => match ch {
                '"' => {
                    quote = Some('"');
                    out.push('"');
                }
                '\'' => {
                    quote = Some('\'');
                    out.push('"');
                }
                _ => out.push(ch),
            },
            Some(q) => {
                if ch == '\\' {
                    match chars.next() {
                        Some('\'') if q == '\'' => out.push('\''),
                        Some(next) => {
                            out.push('\\');
                            out.push(next);
                        }
                        None => out.push('\\'),
                    }
                } else if ch == q {
                    quote = None;
                    out.push('"');
                } else if ch == '"' {
                    out.push_str("\\\"");
                } else {
                    out.push(ch);
                }
            }
        }
    }
    out
}

fn is_key_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' || ch == '-'
}

fn quote_bare_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if expect_key && is_key_start(ch) {
            let mut end = i;
            while end < chars.len() && is_key_char(chars[end]) {
                end += 1;
            }
            let mut after = end;
            while after < chars.len() && chars[after].is_whitespace() {
                after += 1;
            }
            if chars.get(after) == Some(&':') {
                out.push('"');
                out.extend(&chars[i..end]);
                out.push('"');
                i = end;
                expect_key = false;
                continue;
            }
        }

        match ch {
            '"' => {
                in_string = true;
                expect_key = false;
            }
            '{' | ',' => expect_key = true,
            c if c.is_whitespace() => {}
            _ => expect_key = false,
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }
        if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        if ch == '"' {
            in_string = true;
        }
        out.push(ch);
    }
    out
}

/// Scan state of text cut off mid-structure
struct OpenState {
    closers: Vec<char>,
    in_string: bool,
    dangling_escape: bool,
    /// Byte offset of the last comma outside any string
    last_comma: Option<usize>,
}

fn scan_open(text: &str) -> OpenState {
    let mut state = OpenState {
        closers: Vec::new(),
        in_string: false,
        dangling_escape: false,
        last_comma: None,
    };
    for (idx, ch) in text.char_indices() {
        if state.in_string {
            if state.dangling_escape {
                state.dangling_escape = false;
            } else if ch == '\\' {
                state.dangling_escape = true;
            } else if ch == '"' {
                state.in_string = false;
            }
            continue;
        }
        match ch {
            '"' => state.in_string = true,
            '{' => state.closers.push('}'),
            '[' => state.closers.push(']'),
            '}' | ']' => {
                state.closers.pop();
            }
            ',' => state.last_comma = Some(idx),
            _ => {}
        }
    }
    state
}

fn close_structure(text: &str) -> (String, OpenState) {
    let state = scan_open(text);
    let mut out = text.to_string();
    if state.in_string {
        if state.dangling_escape {
            out.pop();
        }
        out.push('"');
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    } else if out.ends_with(':') {
        out.push_str("null");
    }

    out.extend(state.closers.iter().rev());
    (out, state)
}

/// Close open strings and structures; on failure retry from the last complete member
fn complete_truncated(text: &str) -> Option<String> {
    let (closed, state) = close_structure(text);
    if parses(&closed) {
        return Some(closed);
    }
    let comma = state.last_comma?;
    let (closed, _) = close_structure(&text[..comma]);
    parses(&closed).then_some(closed)
}
