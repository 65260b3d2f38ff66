// Fri Jan 16 2026 - Alex

use crate::engine::buffer::WorkingBuffer;
use crate::engine::phase::{Phase, PhaseContext, PhaseError, PhaseKind, PhaseOutcome};
use crate::utils::scanner::{TokenKind, TokenStream};
use std::ops::Range;

/// Marker left behind by flattening transforms.
pub const FLATTENING_MARKER: &str = "ControlFlow";

/// Longest condition, in significant tokens, a jump wrapper may carry.
const MAX_CONDITION_TOKENS: usize = 256;

const BLOCK_KEYWORDS: &[&str] = &[
    "if", "end", "do", "function", "while", "repeat", "until", "for", "local", "return", "goto", "then", "else", "elseif",
];

/// Finds `if <cond> then goto <label> [;] end` shells and returns their spans.
pub fn find_jump_wrappers(stream: &TokenStream<'_>) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut idx = 0;

    while idx < stream.len() {
        if !stream.is_name(idx, "if") {
            idx += 1;
            continue;
        }
        match match_wrapper(stream, idx) {
            Some(end_token) => {
                spans.push(stream.tokens()[idx].start..stream.tokens()[end_token].end);
                idx = end_token + 1;
            }
            None => idx += 1,
        }
    }
    spans
}

fn match_wrapper(stream: &TokenStream<'_>, if_token: usize) -> Option<usize> {
    let mut cursor = stream.next_significant(if_token)?;
    let mut condition_tokens = 0;

    while !stream.is_name(cursor, "then") {
        let tok = stream.get(cursor)?;
        if tok.kind == TokenKind::Name && BLOCK_KEYWORDS.contains(&stream.text(cursor)) {
            return None;
        }
        condition_tokens += 1;
        if condition_tokens > MAX_CONDITION_TOKENS {
            return None;
        }
        cursor = stream.next_significant(cursor)?;
    }
    if condition_tokens == 0 {
        return None;
    }

    let goto = stream.next_significant(cursor)?;
    if !stream.is_name(goto, "goto") {
        return None;
    }
    let label = stream.next_significant(goto)?;
    let label_tok = stream.get(label)?;
    if label_tok.kind != TokenKind::Name || BLOCK_KEYWORDS.contains(&stream.text(label)) {
        return None;
    }

    let mut end = stream.next_significant(label)?;
    if stream.is_punct(end, ';') {
        end = stream.next_significant(end)?;
    }
    stream.is_name(end, "end").then_some(end)
}

fn remove_spans(src: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(src.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&src[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&src[cursor..]);
    out
}

/// Deletes dead dispatch shells left by flattening. Heuristic and shallow:
/// it never rebuilds loops or branches.
pub struct ControlFlowPhase;

impl ControlFlowPhase {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ControlFlowPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl Phase for ControlFlowPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::ControlFlow
    }

    fn apply(&self, buffer: WorkingBuffer, _ctx: &PhaseContext<'_>) -> Result<PhaseOutcome, PhaseError> {
        let mut outcome = PhaseOutcome::new(self.kind(), buffer);
        if !outcome.buffer.contains(FLATTENING_MARKER) {
            return Ok(outcome);
        }

        let stream = TokenStream::new(outcome.buffer.as_str());
        let spans = find_jump_wrappers(&stream);
        if spans.is_empty() {
            return Ok(outcome);
        }

        let text = remove_spans(stream.src(), &spans);
        if outcome.buffer.set(text) {
            outcome.record_change(format!("Removed {} jump wrapper(s)", spans.len()));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::signature::Family;

    fn apply(src: &str) -> PhaseOutcome {
        let config = Config::default();
        let ctx = PhaseContext::new(Family::Unknown, &config);
        ControlFlowPhase::new().apply(WorkingBuffer::from(src), &ctx).unwrap()
    }

    #[test]
    fn test_removes_wrappers_when_marked() {
        let src = "-- ControlFlow\nif state == 3 then goto L3 end\nprint(1)\nif x then goto done; end";
        let outcome = apply(src);
        assert_eq!(outcome.buffer.as_str(), "-- ControlFlow\n\nprint(1)\n");
        assert_eq!(outcome.changes, 1);
        assert_eq!(outcome.entries[0].description, "Removed 2 jump wrapper(s)");
    }

    #[test]
    fn test_requires_marker() {
        let src = "if state == 3 then goto L3 end";
        let outcome = apply(src);
        assert_eq!(outcome.buffer.as_str(), src);
        assert!(!outcome.changed());
    }

    #[test]
    fn test_keeps_real_branches() {
        let src = "-- ControlFlow\nif a then print(a) goto x end\nif b then goto y else z() end\nif function() end then goto q end";
        let outcome = apply(src);
        assert_eq!(outcome.buffer.as_str(), src);
        assert_eq!(outcome.changes, 0);
    }

    #[test]
    fn test_ignores_wrappers_in_strings() {
        let src = "-- ControlFlow\nlocal s = \"if a then goto b end\"";
        assert_eq!(apply(src).buffer.as_str(), src);
    }

    #[test]
    fn test_second_pass_is_noop() {
        let first = apply("-- ControlFlow\nif s then goto a end\nreturn 1");
        let second = apply(first.buffer.as_str());
        assert_eq!(second.changes, 0);
    }
}
