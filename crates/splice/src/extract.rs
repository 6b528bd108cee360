//! Tolerant extraction of candidate function-call JSON from assistant text.
//!
//! The extractor makes a single left-to-right pass over the input with a
//! small automaton: outside text, inline backtick code, triple-backtick
//! fences (with an optional language tag), and in-flight JSON values with
//! string/escape tracking. It emits every self-contained JSON value (object
//! or array) it finds, with fence and backtick markers stripped, and never
//! fails: malformed runs are abandoned and the scan continues after them.
//!
//! The pass is linear in the input length and keeps an explicit bracket
//! stack rather than recursing, so nesting depth cannot overflow the call
//! stack.

use std::ops::Range;

/// A self-contained JSON value located in assistant text.
///
/// `text` is the candidate itself, markers stripped; `span` covers the
/// enclosing region of the original input including any fence or backtick
/// markers, so callers can split surrounding prose.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate<'a> {
    pub text: &'a str,
    pub span: Range<usize>,
}

/// Scan `input` and return candidates in source order.
///
/// Candidates longer than `max_candidate_bytes` are discarded, not
/// truncated, to protect against pathological input.
pub(crate) fn extract_candidates(input: &str, max_candidate_bytes: usize) -> Vec<Candidate<'_>> {
    let bytes = input.as_bytes();
    let mut candidates = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i..].starts_with(b"```") {
            match scan_fence(input, i, max_candidate_bytes) {
                FenceOutcome::Candidate { inner, end } => {
                    candidates.push(Candidate {
                        text: inner,
                        span: i..end,
                    });
                    i = end;
                }
                FenceOutcome::Skip { end } => i = end,
                // Unterminated fence: the region runs to the end of input
                // and is never emitted.
                FenceOutcome::Unterminated => break,
            }
            continue;
        }

        match bytes[i] {
            b'`' => match scan_inline_backtick(input, i, max_candidate_bytes) {
                Some((inner, end)) => {
                    candidates.push(Candidate {
                        text: inner,
                        span: i..end,
                    });
                    i = end;
                }
                None => i += 1,
            },
            b'{' | b'[' => match scan_json_value(bytes, i, max_candidate_bytes) {
                Ok(end) => {
                    candidates.push(Candidate {
                        text: &input[i..end],
                        span: i..end,
                    });
                    i = end;
                }
                // Malformed or oversized: resume after the failure point so
                // the pass stays linear.
                Err(failed_at) => i = failed_at.max(i) + 1,
            },
            _ => i += 1,
        }
    }

    candidates
}

enum FenceOutcome<'a> {
    /// The fence held a self-contained JSON value with an accepted tag.
    Candidate { inner: &'a str, end: usize },
    /// Well-formed fence without an acceptable JSON payload.
    Skip { end: usize },
    /// No closing fence before end of input.
    Unterminated,
}

/// Scan a triple-backtick fence starting at `start`.
///
/// Only fences whose language tag is empty or `json` can produce a
/// candidate, and only when the stripped content is one balanced JSON
/// value.
fn scan_fence(input: &str, start: usize, max_candidate_bytes: usize) -> FenceOutcome<'_> {
    let tag_start = start + 3;
    let Some(newline_offset) = input[tag_start..].find('\n') else {
        return FenceOutcome::Unterminated;
    };

    let tag = input[tag_start..tag_start + newline_offset].trim();
    let content_start = tag_start + newline_offset + 1;

    let Some(close_offset) = input[content_start..].find("```") else {
        return FenceOutcome::Unterminated;
    };

    let close_start = content_start + close_offset;
    let end = close_start + 3;
    let inner = input[content_start..close_start].trim();

    let tag_accepted = tag.is_empty() || tag.eq_ignore_ascii_case("json");
    if tag_accepted && is_self_contained_json(inner, max_candidate_bytes) {
        FenceOutcome::Candidate { inner, end }
    } else {
        FenceOutcome::Skip { end }
    }
}

/// Scan an inline single-backtick span starting at `start`. Returns the
/// stripped inner value and the index one past the closing backtick when
/// the span holds a balanced JSON value.
fn scan_inline_backtick(input: &str, start: usize, max_candidate_bytes: usize) -> Option<(&str, usize)> {
    let content_start = start + 1;
    let close_offset = input[content_start..].find('`')?;
    let close = content_start + close_offset;
    let inner = input[content_start..close].trim();

    if is_self_contained_json(inner, max_candidate_bytes) {
        Some((inner, close + 1))
    } else {
        None
    }
}

/// True when `text` is exactly one balanced JSON object or array.
fn is_self_contained_json(text: &str, max_candidate_bytes: usize) -> bool {
    let bytes = text.as_bytes();
    if !matches!(bytes.first(), Some(b'{' | b'[')) {
        return false;
    }

    match scan_json_value(bytes, 0, max_candidate_bytes) {
        Ok(end) => text[end..].trim().is_empty(),
        Err(_) => false,
    }
}

/// Walk one JSON value starting at `start` (which must index `{` or `[`).
///
/// Strings are honored: `"` toggles string state unless escaped, and a
/// backslash escapes the byte after it. Returns the exclusive end on
/// success. On depth underflow, a mismatched closer, an unterminated
/// string/value, or an oversized run, returns the byte index where
/// scanning gave up.
fn scan_json_value(bytes: &[u8], start: usize, max_candidate_bytes: usize) -> Result<usize, usize> {
    let mut closers: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut i = start;

    while i < bytes.len() {
        if i - start >= max_candidate_bytes {
            return Err(i);
        }

        let b = bytes[i];

        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => closers.push(b'}'),
                b'[' => closers.push(b']'),
                b'}' | b']' => {
                    if closers.pop() != Some(b) {
                        return Err(i);
                    }
                    if closers.is_empty() {
                        return Ok(i + 1);
                    }
                }
                _ => {}
            }
        }

        i += 1;
    }

    Err(bytes.len())
}

/// Streaming early-detection heuristic: does this running prefix of
/// assistant content look like it is going to carry a function call?
///
/// Matches a trimmed `{"name"` / `[{"name"` prefix (whitespace between the
/// structural tokens is tolerated), an opened fence whose content mentions
/// `"name"`, or a backtick immediately followed by a call-shaped opener.
pub(crate) fn looks_tool_shaped(prefix: &str) -> bool {
    let trimmed = prefix.trim_start();

    if starts_with_call_shape(trimmed) {
        return true;
    }

    if let Some(fence) = trimmed.find("```") {
        let after_tag = match trimmed[fence + 3..].find('\n') {
            Some(nl) => &trimmed[fence + 3 + nl + 1..],
            None => &trimmed[fence + 3..],
        };
        if after_tag.contains("\"name\"") {
            return true;
        }
    }

    let mut rest = trimmed;
    while let Some(tick) = rest.find('`') {
        if starts_with_call_shape(rest[tick + 1..].trim_start()) {
            return true;
        }
        rest = &rest[tick + 1..];
    }

    false
}

/// True when `s` begins with `{"name"` or `[{"name"`, allowing whitespace
/// between the structural tokens. A shorter prefix of that shape (for
/// example `[{"na`) also matches, so a stream can turn to buffering before
/// the key is complete.
fn starts_with_call_shape(s: &str) -> bool {
    for opener in [&["{", "\"name\""][..], &["[", "{", "\"name\""][..]] {
        if matches_token_prefix(s, opener) {
            return true;
        }
    }
    false
}

fn matches_token_prefix(s: &str, tokens: &[&str]) -> bool {
    let mut rest = s;
    for token in tokens {
        rest = rest.trim_start();
        if rest.is_empty() {
            // Ran out of input mid-shape: still plausible.
            return true;
        }
        if rest.len() < token.len() {
            return token.starts_with(rest);
        }
        let Some(stripped) = rest.strip_prefix(token) else {
            return false;
        };
        rest = stripped;
    }
    true
}
