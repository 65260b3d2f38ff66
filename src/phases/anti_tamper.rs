// Fri Jan 16 2026 - Alex

use crate::engine::buffer::WorkingBuffer;
use crate::engine::phase::{Phase, PhaseContext, PhaseError, PhaseKind, PhaseOutcome};
use crate::utils::scanner::{rewrite_calls, statement_terminator_len, CallPattern, CallSite, Rewrite, TokenStream};
use crate::utils::string::StringUtils;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// How far past the hook assignment the installing `setmetatable` may sit.
const DUMP_HOOK_WINDOW: usize = 512;

static SELF_DESTRUCT_MARKER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)self[\s_-]?destruct").ok());

const GETUPVALUES: CallPattern = CallPattern {
    name: "getupvalues",
    qualifiers: &["debug"],
    allow_bare: false,
};

const GETUPVALUE: CallPattern = CallPattern {
    name: "getupvalue",
    qualifiers: &["debug"],
    allow_bare: false,
};

const COLLECTGARBAGE: CallPattern = CallPattern {
    name: "collectgarbage",
    qualifiers: &[],
    allow_bare: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    AntiDump,
    AntiDecompile,
    SelfDestruct,
}

impl Guard {
    pub const ALL: [Guard; 3] = [Guard::AntiDump, Guard::AntiDecompile, Guard::SelfDestruct];

    pub fn name(&self) -> &'static str {
        match self {
            Guard::AntiDump => "anti-dump guard",
            Guard::AntiDecompile => "anti-decompile probe",
            Guard::SelfDestruct => "self-destruct trailer",
        }
    }

    pub fn is_present(&self, text: &str) -> bool {
        match self {
            Guard::AntiDump => StringUtils::contains_any(text, &["AntiDump", "dump_hook"]),
            Guard::AntiDecompile => StringUtils::contains_any(text, &["AntiDecompile", "debug.getupvalues"]),
            Guard::SelfDestruct => SELF_DESTRUCT_MARKER.as_ref().map_or(false, |re| re.is_match(text)),
        }
    }

    /// Returns the stripped text and how many guard sites were removed.
    pub fn strip(&self, text: &str) -> (String, usize) {
        match self {
            Guard::AntiDump => strip_dump_hooks(text),
            Guard::AntiDecompile => {
                let (out, first) = strip_calls(text, &GETUPVALUES);
                let (out, second) = strip_calls(&out, &GETUPVALUE);
                (out, first + second)
            }
            Guard::SelfDestruct => strip_gc_triggers(text),
        }
    }
}

/// Statement calls are dropped with their `;`; calls used as values become `nil`.
fn strip_calls(text: &str, pattern: &CallPattern) -> (String, usize) {
    let (out, report) = rewrite_calls(text, pattern, &mut |site: &CallSite<'_>| {
        if site.in_expression {
            Rewrite::replace("nil")
        } else {
            Rewrite::Replace {
                text: String::new(),
                consumed: statement_terminator_len(site.tail),
            }
        }
    });
    (out, report.rewritten)
}

/// Drops bare `collectgarbage()` statements. Calls with arguments or used
/// as values are real program logic and stay.
fn strip_gc_triggers(text: &str) -> (String, usize) {
    let (out, report) = rewrite_calls(text, &COLLECTGARBAGE, &mut |site: &CallSite<'_>| {
        if site.in_expression || !site.args.is_empty() {
            return Rewrite::Skip;
        }
        Rewrite::Replace {
            text: String::new(),
            consumed: statement_terminator_len(site.tail),
        }
    });
    (out, report.rewritten)
}

fn dump_hook_spans(stream: &TokenStream<'_>) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut idx = 0;

    while idx < stream.len() {
        if !stream.is_name(idx, "dump_hook") {
            idx += 1;
            continue;
        }
        let assigns = stream.next_significant(idx).map_or(false, |n| stream.is_punct(n, '='));
        if !assigns {
            idx += 1;
            continue;
        }
        let first = match stream.prev_significant(idx) {
            Some(p) if stream.is_name(p, "local") => p,
            _ => idx,
        };

        let limit = (idx + DUMP_HOOK_WINDOW).min(stream.len());
        let installed = (idx + 1..limit).find_map(|i| {
            if !stream.is_name(i, "setmetatable") {
                return None;
            }
            let open = stream.next_significant(i)?;
            if !stream.is_punct(open, '(') {
                return None;
            }
            stream.parse_args(open).ok()
        });

        match installed {
            Some(list) => {
                let end = list.end + statement_terminator_len(&stream.src()[list.end..]);
                spans.push(stream.tokens()[first].start..end);
                idx = stream.index_at(end);
            }
            None => idx += 1,
        }
    }
    spans
}

fn strip_dump_hooks(text: &str) -> (String, usize) {
    let stream = TokenStream::new(text);
    let spans = dump_hook_spans(&stream);
    if spans.is_empty() {
        return (text.to_string(), 0);
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in &spans {
        out.push_str(&text[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    (out, spans.len())
}

/// Removes guard code obfuscators inject against dumping and analysis.
pub struct AntiTamperPhase {
    guards: Vec<Guard>,
}

impl AntiTamperPhase {
    pub fn new() -> Self {
        Self {
            guards: Guard::ALL.to_vec(),
        }
    }
}

impl Default for AntiTamperPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl Phase for AntiTamperPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::AntiTamper
    }

    fn apply(&self, buffer: WorkingBuffer, _ctx: &PhaseContext<'_>) -> Result<PhaseOutcome, PhaseError> {
        let mut outcome = PhaseOutcome::new(self.kind(), buffer);

        for guard in &self.guards {
            if !guard.is_present(outcome.buffer.as_str()) {
                continue;
            }
            let (text, removed) = guard.strip(outcome.buffer.as_str());
            if removed > 0 && outcome.buffer.set(text) {
                log::debug!("Stripped {} {} site(s)", removed, guard.name());
                outcome.record_change(format!("Removed {} ({} site(s))", guard.name(), removed));
            }
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
        AntiTamperPhase::new().apply(WorkingBuffer::from(src), &ctx).unwrap()
    }

    #[test]
    fn test_anti_dump_block_removed() {
        let src = "local dump_hook = function() end; setmetatable(_G, {...});\nlocal x = 1\nprint(x)";
        let outcome = apply(src);
        assert_eq!(outcome.buffer.as_str(), "\nlocal x = 1\nprint(x)");
        assert_eq!(outcome.changes, 1);
        assert_eq!(outcome.entries[0].phase_label, "Anti-Tamper");
    }

    #[test]
    fn test_anti_dump_needs_installation() {
        let src = "local dump_hook = nil\nprint(dump_hook)";
        let outcome = apply(src);
        assert_eq!(outcome.buffer.as_str(), src);
        assert_eq!(outcome.changes, 0);
        assert!(outcome.entries.is_empty());
    }

    #[test]
    fn test_anti_decompile_probes() {
        let src = "debug.getupvalues(f);\nlocal u = debug.getupvalue(f, 1)\nprint(u)";
        let outcome = apply(src);
        assert_eq!(outcome.buffer.as_str(), "\nlocal u = nil\nprint(u)");
        assert_eq!(outcome.changes, 1);
    }

    #[test]
    fn test_self_destruct_trailer() {
        let src = "-- self-destruct\nprint(1)\ncollectgarbage();";
        let outcome = apply(src);
        assert_eq!(outcome.buffer.as_str(), "-- self-destruct\nprint(1)\n");
        assert_eq!(outcome.changes, 1);

        let untouched = "print(1)\ncollectgarbage()";
        assert_eq!(apply(untouched).buffer.as_str(), untouched);
    }

    #[test]
    fn test_self_destruct_keeps_gc_queries() {
        let src = "-- self destruct\nlocal mem = collectgarbage(\"count\")\nprint(mem)\ncollectgarbage(\"step\", 0)\ncollectgarbage()";
        let outcome = apply(src);
        assert_eq!(
            outcome.buffer.as_str(),
            "-- self destruct\nlocal mem = collectgarbage(\"count\")\nprint(mem)\ncollectgarbage(\"step\", 0)\n"
        );
        assert_eq!(outcome.changes, 1);

        let value_only = "-- self destruct\nlocal n = collectgarbage()";
        let outcome = apply(value_only);
        assert_eq!(outcome.buffer.as_str(), value_only);
        assert!(outcome.entries.is_empty());
    }

    #[test]
    fn test_guards_count_separately() {
        let src = "-- AntiDump AntiDecompile SelfDestruct\nlocal dump_hook = f\nsetmetatable(t, mt)\ndebug.getupvalues(g)\ncollectgarbage()";
        let outcome = apply(src);
        assert_eq!(outcome.changes, 3);
        let again = apply(outcome.buffer.as_str());
        assert_eq!(again.changes, 0);
    }
}
