// Fri Jan 16 2026 - Alex

use crate::engine::buffer::WorkingBuffer;
use crate::engine::phase::{Phase, PhaseContext, PhaseError, PhaseKind, PhaseOutcome};
use crate::utils::scanner::{rewrite_calls, CallPattern, CallSite, Rewrite};
use crate::utils::string::StringUtils;

const EXTRACT: CallPattern = CallPattern {
    name: "extract",
    qualifiers: &["bit32"],
    allow_bare: true,
};

const SIN: CallPattern = CallPattern {
    name: "sin",
    qualifiers: &["math"],
    allow_bare: true,
};

const CHAR: CallPattern = CallPattern {
    name: "char",
    qualifiers: &["string"],
    allow_bare: true,
};

/// Literal encodings the phase knows how to undo, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralDecoder {
    BitExtract,
    SinMask,
    CharCode,
}

impl LiteralDecoder {
    pub const ALL: [LiteralDecoder; 3] = [LiteralDecoder::BitExtract, LiteralDecoder::SinMask, LiteralDecoder::CharCode];

    pub fn label(&self) -> &'static str {
        match self {
            LiteralDecoder::BitExtract => "bit-packed constant",
            LiteralDecoder::SinMask => "sin-masked constant",
            LiteralDecoder::CharCode => "char-code literal",
        }
    }

    fn pattern(&self) -> &'static CallPattern {
        match self {
            LiteralDecoder::BitExtract => &EXTRACT,
            LiteralDecoder::SinMask => &SIN,
            LiteralDecoder::CharCode => &CHAR,
        }
    }

    /// Cheap gate checked before tokenizing.
    pub fn is_triggered(&self, text: &str) -> bool {
        text.contains(self.pattern().name) && text.contains('(')
    }

    fn rewrite(&self, site: &CallSite<'_>) -> Rewrite {
        match self {
            LiteralDecoder::BitExtract => decode_extract(site),
            LiteralDecoder::SinMask => decode_sin_mask(site),
            LiteralDecoder::CharCode => decode_char(site),
        }
    }

    /// Runs this decoder over `text`, returning the rewritten text, the number
    /// of decoded occurrences and one message per occurrence left untouched.
    pub fn decode(&self, text: &str) -> (String, usize, Vec<String>) {
        let (out, report) = rewrite_calls(text, self.pattern(), &mut |site: &CallSite<'_>| self.rewrite(site));
        (out, report.rewritten, report.failures)
    }
}

fn preview(site: &CallSite<'_>) -> String {
    StringUtils::truncate(site.text, 48).into_owned()
}

fn decode_extract(site: &CallSite<'_>) -> Rewrite {
    let args = site.args;
    if args.len() != 2 && args.len() != 3 {
        return Rewrite::Fail(format!("Bit extraction skipped `{}`: expected 2 or 3 arguments, got {}", preview(site), args.len()));
    }
    if args[0].trim().is_empty() {
        return Rewrite::Fail(format!("Bit extraction skipped `{}`: missing source operand", preview(site)));
    }

    let shift = match StringUtils::parse_integer(&args[1]) {
        Some(s) if s <= 31 => s,
        _ => {
            return Rewrite::Fail(format!("Bit extraction skipped `{}`: shift `{}` is not in 0..=31", preview(site), args[1].trim()));
        }
    };
    let width = match args.get(2) {
        None => 1,
        Some(w) => match StringUtils::parse_integer(w) {
            Some(w) if (1..=32).contains(&w) => w,
            _ => {
                return Rewrite::Fail(format!("Bit extraction skipped `{}`: width `{}` is not in 1..=32", preview(site), w.trim()));
            }
        },
    };
    if shift + width > 32 {
        return Rewrite::Fail(format!("Bit extraction skipped `{}`: field runs past bit 31", preview(site)));
    }

    let mask = (1u64 << width) - 1;
    let expr = format!("({} >> {}) & {}", StringUtils::parenthesize(&args[0]), shift, mask);
    if followed_by_operator(site.tail) {
        Rewrite::replace(format!("({})", expr))
    } else {
        Rewrite::replace(expr)
    }
}

fn followed_by_operator(tail: &str) -> bool {
    tail.trim_start_matches([' ', '\t'])
        .starts_with(['+', '-', '*', '/', '%', '^', '&', '|', '~', '<', '>', '=', '.', '[', ':'])
}

/// Length of ` * K` at the start of `tail`, where K is a number or name.
fn mask_operand_len(tail: &str) -> Option<usize> {
    let bytes = tail.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    if bytes.get(i) != Some(&b'*') {
        return None;
    }
    i += 1;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }

    let start = i;
    match bytes.get(i) {
        Some(&b) if StringUtils::is_ident_start(b) => {
            while i < bytes.len() && StringUtils::is_ident_char(bytes[i]) {
                i += 1;
            }
        }
        Some(b) if b.is_ascii_digit() => {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                i += 1;
            }
            let literal = &tail[start..i];
            if !StringUtils::is_number_literal(literal) && literal.parse::<f64>().is_err() {
                return None;
            }
        }
        _ => return None,
    }

    // K must be the whole right operand.
    let rest = tail[i..].trim_start_matches([' ', '\t']);
    if rest.starts_with(['.', '(', '[', ':', '^', '{', '"', '\'']) {
        return None;
    }
    Some(i)
}

fn decode_sin_mask(site: &CallSite<'_>) -> Rewrite {
    let Some(consumed) = mask_operand_len(site.tail) else {
        return Rewrite::Skip;
    };
    if site.args.len() != 1 || site.args[0].trim().is_empty() {
        return Rewrite::Fail(format!("Sin mask skipped `{}`: expected exactly one argument", preview(site)));
    }
    Rewrite::Replace {
        text: StringUtils::parenthesize(&site.args[0]),
        consumed,
    }
}

fn decode_char(site: &CallSite<'_>) -> Rewrite {
    let mut bytes = Vec::with_capacity(site.args.len());
    for arg in site.args {
        match StringUtils::parse_integer(arg) {
            Some(v) if v <= 255 => bytes.push(v as u8),
            _ => {
                return Rewrite::Fail(format!(
                    "Char decoding skipped `{}`: `{}` is not a byte value",
                    preview(site),
                    StringUtils::truncate(arg.trim(), 24)
                ));
            }
        }
    }
    Rewrite::replace(StringUtils::lua_quote(&bytes))
}

/// Undoes literal encodings that several obfuscators share, keyed on the
/// construct being present rather than on the detected family.
pub struct LiteralDecodingPhase {
    decoders: Vec<LiteralDecoder>,
}

impl LiteralDecodingPhase {
    pub fn new() -> Self {
        Self {
            decoders: LiteralDecoder::ALL.to_vec(),
        }
    }
}

impl Default for LiteralDecodingPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl Phase for LiteralDecodingPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::LiteralDecoding
    }

    fn apply(&self, buffer: WorkingBuffer, _ctx: &PhaseContext<'_>) -> Result<PhaseOutcome, PhaseError> {
        let mut outcome = PhaseOutcome::new(self.kind(), buffer);

        for decoder in &self.decoders {
            if !decoder.is_triggered(outcome.buffer.as_str()) {
                continue;
            }

            let (text, decoded, failures) = decoder.decode(outcome.buffer.as_str());
            for failure in failures {
                outcome.record_failure(failure);
            }
            if decoded > 0 && outcome.buffer.set(text) {
                log::debug!("Decoded {} {} occurrence(s)", decoded, decoder.label());
                outcome.record_change(format!("Decoded {} {} occurrence(s)", decoded, decoder.label()));
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
        LiteralDecodingPhase::new().apply(WorkingBuffer::from(src), &ctx).unwrap()
    }

    #[test]
    fn test_char_code_decoding() {
        let outcome = apply("print(string.char(72,105))");
        assert_eq!(outcome.buffer.as_str(), "print(\"Hi\")");
        assert_eq!(outcome.changes, 1);
        assert_eq!(outcome.failure_count(), 0);
    }

    #[test]
    fn test_char_code_escapes() {
        let (out, n, _) = LiteralDecoder::CharCode.decode("x = char(34, 0x5c, 10, 200)");
        assert_eq!(n, 1);
        assert_eq!(out, "x = \"\\\"\\\\\\n\\200\"");

        let (out, _, _) = LiteralDecoder::CharCode.decode("x = string.char()");
        assert_eq!(out, "x = \"\"");
    }

    #[test]
    fn test_char_code_escape_followed_by_digit() {
        let outcome = apply("print(string.char(1, 50))");
        assert_eq!(outcome.buffer.as_str(), "print(\"\\0012\")");
        assert_eq!(outcome.changes, 1);
    }

    #[test]
    fn test_nested_sin_without_mask_is_linear() {
        let depth = 30;
        let src = format!("x = {}1{}", "sin(".repeat(depth), ")".repeat(depth));
        let started = std::time::Instant::now();
        let outcome = apply(&src);
        assert_eq!(outcome.buffer.as_str(), src);
        assert_eq!(outcome.changes, 0);
        assert!(outcome.entries.is_empty());
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_char_code_rejects_partial_decode() {
        let src = "print(string.char(72, abc, 105))";
        let outcome = apply(src);
        assert_eq!(outcome.buffer.as_str(), src);
        assert_eq!(outcome.failure_count(), 1);
        assert_eq!(outcome.changes, 0);

        let (out, n, failures) = LiteralDecoder::CharCode.decode("s = string.char(256)");
        assert_eq!(out, "s = string.char(256)");
        assert_eq!(n, 0);
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn test_char_code_unbalanced_left_alone() {
        let src = "print(string.char(72, (105)";
        let outcome = apply(src);
        assert_eq!(outcome.buffer.as_str(), src);
        assert_eq!(outcome.failure_count(), 1);
    }

    #[test]
    fn test_char_in_string_is_ignored() {
        let src = "print(\"string.char(72)\") -- char(65)";
        let outcome = apply(src);
        assert_eq!(outcome.buffer.as_str(), src);
        assert_eq!(outcome.changes, 0);
    }

    #[test]
    fn test_bit_extract() {
        let (out, n, _) = LiteralDecoder::BitExtract.decode("local a = bit32.extract(v, 3, 4)");
        assert_eq!(n, 1);
        assert_eq!(out, "local a = (v >> 3) & 15");

        let (out, _, _) = LiteralDecoder::BitExtract.decode("local b = extract(x + 1, 0)");
        assert_eq!(out, "local b = ((x + 1) >> 0) & 1");

        let (out, _, _) = LiteralDecoder::BitExtract.decode("local c = bit32.extract(v, 3, 4) + 1");
        assert_eq!(out, "local c = ((v >> 3) & 15) + 1");
    }

    #[test]
    fn test_bit_extract_malformed() {
        for src in ["bit32.extract(v, n, 4)", "bit32.extract(v)", "bit32.extract(v, 30, 4)", "bit32.extract(v, 1, 0)"] {
            let (out, n, failures) = LiteralDecoder::BitExtract.decode(src);
            assert_eq!(out, src);
            assert_eq!(n, 0);
            assert_eq!(failures.len(), 1, "{}", src);
        }
    }

    #[test]
    fn test_sin_mask() {
        let (out, n, _) = LiteralDecoder::SinMask.decode("local k = math.sin(42) * MASK\nprint(k)");
        assert_eq!(n, 1);
        assert_eq!(out, "local k = 42\nprint(k)");

        let (out, _, _) = LiteralDecoder::SinMask.decode("local k = sin(a + b) * 1e3");
        assert_eq!(out, "local k = (a + b)");
    }

    #[test]
    fn test_sin_without_mask_is_not_an_occurrence() {
        let src = "local y = math.sin(t) + 1\nlocal z = math.sin(t) * obj.scale";
        let (out, n, failures) = LiteralDecoder::SinMask.decode(src);
        assert_eq!(out, src);
        assert_eq!(n, 0);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_nested_decoding() {
        let (out, n, _) = LiteralDecoder::BitExtract.decode("bit32.extract(bit32.extract(v, 0, 8), 4, 4)");
        assert_eq!(n, 2);
        assert_eq!(out, "(((v >> 0) & 255) >> 4) & 15");
    }

    #[test]
    fn test_decoders_are_idempotent() {
        let first = apply("local a = bit32.extract(v, 3, 4)\nlocal b = math.sin(7) * K\nprint(string.char(72, 105))");
        assert_eq!(first.changes, 3);
        let second = apply(first.buffer.as_str());
        assert_eq!(second.changes, 0);
        assert_eq!(second.buffer.as_str(), first.buffer.as_str());
    }
}
