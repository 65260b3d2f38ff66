// Fri Jan 16 2026 - Alex

use crate::utils::string::StringUtils;
use std::ops::Range;
use thiserror::Error;

/// Upper bound on how far an argument list may extend past its opening paren.
pub const MAX_ARG_SPAN: usize = 64 * 1024;

/// Upper bound on nested call rewriting.
pub const MAX_NESTING: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    Comment,
    Str,
    Name,
    Number,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("argument list is never closed")]
    Unterminated,
    #[error("expected '{expected}' but found '{found}'")]
    Mismatched { expected: char, found: char },
    #[error("unexpected '{0}'")]
    UnexpectedCloser(char),
    #[error("argument list exceeds 64 KiB")]
    TooLong,
}

/// Tokenizes Lua source. Never fails: unterminated strings stop at the line
/// break and unterminated long brackets run to the end of input.
pub fn tokenize(src: &str) -> Vec<Token> {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let start = i;
        let b = bytes[i];

        let kind = if b.is_ascii_whitespace() {
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            TokenKind::Whitespace
        } else if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
            i += 2;
            match long_bracket_level(bytes, i) {
                Some(level) => i = skip_long_bracket(bytes, i, level),
                None => {
                    while i < len && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
            }
            TokenKind::Comment
        } else if b == b'"' || b == b'\'' {
            i = skip_quoted(bytes, i);
            TokenKind::Str
        } else if let Some(level) = long_bracket_level(bytes, i) {
            i = skip_long_bracket(bytes, i, level);
            TokenKind::Str
        } else if StringUtils::is_ident_start(b) {
            while i < len && StringUtils::is_ident_char(bytes[i]) {
                i += 1;
            }
            TokenKind::Name
        } else if b.is_ascii_digit() || (b == b'.' && bytes.get(i + 1).map_or(false, |c| c.is_ascii_digit())) {
            i = skip_number(bytes, i);
            TokenKind::Number
        } else if b < 0x80 {
            i += 1;
            TokenKind::Punct
        } else {
            i += src[i..].chars().next().map_or(1, char::len_utf8);
            TokenKind::Punct
        };

        tokens.push(Token { kind, start, end: i });
    }

    tokens
}

fn long_bracket_level(bytes: &[u8], i: usize) -> Option<usize> {
    if bytes.get(i) != Some(&b'[') {
        return None;
    }
    let mut j = i + 1;
    while bytes.get(j) == Some(&b'=') {
        j += 1;
    }
    if bytes.get(j) == Some(&b'[') {
        Some(j - i - 1)
    } else {
        None
    }
}

fn skip_long_bracket(bytes: &[u8], i: usize, level: usize) -> usize {
    let mut j = i + level + 2;
    while j < bytes.len() {
        if bytes[j] == b']' {
            let mut k = j + 1;
            let mut eq = 0;
            while bytes.get(k) == Some(&b'=') {
                eq += 1;
                k += 1;
            }
            if eq == level && bytes.get(k) == Some(&b']') {
                return k + 1;
            }
        }
        j += 1;
    }
    bytes.len()
}

fn skip_quoted(bytes: &[u8], i: usize) -> usize {
    let quote = bytes[i];
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' => return j,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

fn skip_number(bytes: &[u8], i: usize) -> usize {
    let mut j = i;
    while j < bytes.len() {
        let c = bytes[j];
        if c.is_ascii_alphanumeric() || c == b'.' {
            j += 1;
        } else if (c == b'+' || c == b'-') && j > i && matches!(bytes[j - 1], b'e' | b'E' | b'p' | b'P') {
            j += 1;
        } else {
            break;
        }
    }
    j
}

/// A function name to look for, optionally reached through a library table.
#[derive(Debug, Clone, Copy)]
pub struct CallPattern {
    pub name: &'static str,
    pub qualifiers: &'static [&'static str],
    pub allow_bare: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CallHead {
    /// Byte offset of the qualifier (or the name when unqualified).
    pub start: usize,
    pub first_token: usize,
    pub open_token: usize,
}

#[derive(Debug, Clone)]
pub struct ArgList {
    pub args: Vec<Range<usize>>,
    /// Byte offset just past the closing paren.
    pub end: usize,
    pub close_token: usize,
}

pub struct TokenStream<'a> {
    src: &'a str,
    tokens: Vec<Token>,
}

impl<'a> TokenStream<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            tokens: tokenize(src),
        }
    }

    pub fn src(&self) -> &'a str {
        self.src
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Token> {
        self.tokens.get(idx)
    }

    pub fn text(&self, idx: usize) -> &'a str {
        self.tokens[idx].text(self.src)
    }

    pub fn next_significant(&self, idx: usize) -> Option<usize> {
        (idx + 1..self.tokens.len()).find(|&i| !self.tokens[i].is_trivia())
    }

    pub fn prev_significant(&self, idx: usize) -> Option<usize> {
        (0..idx).rev().find(|&i| !self.tokens[i].is_trivia())
    }

    pub fn is_name(&self, idx: usize, name: &str) -> bool {
        self.tokens.get(idx).map_or(false, |t| t.kind == TokenKind::Name && t.text(self.src) == name)
    }

    pub fn is_punct(&self, idx: usize, ch: char) -> bool {
        self.tokens.get(idx).map_or(false, |t| {
            t.kind == TokenKind::Punct && t.text(self.src).starts_with(ch) && t.end - t.start == ch.len_utf8()
        })
    }

    /// First token index whose start is at or past `offset`.
    pub fn index_at(&self, offset: usize) -> usize {
        self.tokens.partition_point(|t| t.start < offset)
    }

    pub fn match_call(&self, idx: usize, pattern: &CallPattern) -> Option<CallHead> {
        if !self.is_name(idx, pattern.name) {
            return None;
        }
        let open_token = self.next_significant(idx)?;
        if !self.is_punct(open_token, '(') {
            return None;
        }

        match self.prev_significant(idx) {
            Some(p) if self.is_punct(p, '.') => {
                let q = self.prev_significant(p)?;
                let qualifier = self.tokens[q];
                if qualifier.kind != TokenKind::Name || !pattern.qualifiers.contains(&qualifier.text(self.src)) {
                    return None;
                }
                if let Some(before) = self.prev_significant(q) {
                    if self.is_punct(before, '.') || self.is_punct(before, ':') {
                        return None;
                    }
                }
                Some(CallHead {
                    start: qualifier.start,
                    first_token: q,
                    open_token,
                })
            }
            Some(p) if self.is_punct(p, ':') || self.is_name(p, "function") => None,
            _ if pattern.allow_bare => Some(CallHead {
                start: self.tokens[idx].start,
                first_token: idx,
                open_token,
            }),
            _ => None,
        }
    }

    pub fn parse_args(&self, open_token: usize) -> Result<ArgList, ArgError> {
        let open = self.tokens[open_token];
        let mut stack: Vec<u8> = Vec::new();
        let mut args = Vec::new();
        let mut arg_start = open.end;
        let mut saw_comma = false;

        for idx in open_token + 1..self.tokens.len() {
            let tok = self.tokens[idx];
            if tok.start - open.start > MAX_ARG_SPAN {
                return Err(ArgError::TooLong);
            }
            if tok.kind != TokenKind::Punct {
                continue;
            }

            let c = self.src.as_bytes()[tok.start];
            match c {
                b'(' | b'[' | b'{' => stack.push(c),
                b')' | b']' | b'}' => match stack.pop() {
                    Some(opener) => {
                        let expected = closer_for(opener);
                        if expected != c {
                            return Err(ArgError::Mismatched {
                                expected: expected as char,
                                found: c as char,
                            });
                        }
                    }
                    None if c == b')' => {
                        let last = self.trimmed(arg_start..tok.start);
                        if saw_comma || !last.is_empty() {
                            args.push(last);
                        }
                        return Ok(ArgList {
                            args,
                            end: tok.end,
                            close_token: idx,
                        });
                    }
                    None => return Err(ArgError::UnexpectedCloser(c as char)),
                },
                b',' if stack.is_empty() => {
                    args.push(self.trimmed(arg_start..tok.start));
                    arg_start = tok.end;
                    saw_comma = true;
                }
                _ => {}
            }
        }

        Err(ArgError::Unterminated)
    }

    fn trimmed(&self, range: Range<usize>) -> Range<usize> {
        let text = &self.src[range.clone()];
        let lead = text.len() - text.trim_start().len();
        let trail = text.len() - text.trim_end().len();
        range.start + lead..range.end - trail
    }

    /// Whether the token at `idx` sits where an expression is expected rather
    /// than at the start of a statement.
    pub fn is_expression_context(&self, idx: usize) -> bool {
        let Some(p) = self.prev_significant(idx) else {
            return false;
        };
        let tok = self.tokens[p];
        match tok.kind {
            TokenKind::Punct => !matches!(tok.text(self.src), ")" | "]" | "}" | ";"),
            TokenKind::Name => matches!(
                tok.text(self.src),
                "return" | "and" | "or" | "not" | "in" | "until" | "if" | "elseif" | "while"
            ),
            _ => false,
        }
    }
}

fn closer_for(opener: u8) -> u8 {
    match opener {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

/// One matched call handed to a rewrite handler.
pub struct CallSite<'a> {
    /// The full original text of the call.
    pub text: &'a str,
    /// Arguments with nested occurrences already rewritten.
    pub args: &'a [String],
    /// Source text following the closing paren.
    pub tail: &'a str,
    pub in_expression: bool,
}

pub enum Rewrite {
    Replace { text: String, consumed: usize },
    Fail(String),
    Skip,
}

impl Rewrite {
    pub fn replace(text: impl Into<String>) -> Self {
        Rewrite::Replace {
            text: text.into(),
            consumed: 0,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RewriteReport {
    pub rewritten: usize,
    pub failures: Vec<String>,
}

impl RewriteReport {
    pub fn merge(&mut self, other: RewriteReport) {
        self.rewritten += other.rewritten;
        self.failures.extend(other.failures);
    }
}

/// Rewrites every call matching `pattern`, innermost first. A failed
/// occurrence is copied through byte-for-byte.
pub fn rewrite_calls<F>(src: &str, pattern: &CallPattern, handler: &mut F) -> (String, RewriteReport)
where
    F: FnMut(&CallSite<'_>) -> Rewrite,
{
    rewrite_calls_at(src, pattern, handler, 0)
}

fn rewrite_calls_at<F>(src: &str, pattern: &CallPattern, handler: &mut F, depth: usize) -> (String, RewriteReport)
where
    F: FnMut(&CallSite<'_>) -> Rewrite,
{
    let stream = TokenStream::new(src);
    let mut out = String::with_capacity(src.len());
    let mut report = RewriteReport::default();
    let mut cursor = 0;
    let mut idx = 0;

    while idx < stream.len() {
        let head = match stream.match_call(idx, pattern) {
            Some(head) if head.start >= cursor => head,
            _ => {
                idx += 1;
                continue;
            }
        };

        let list = match stream.parse_args(head.open_token) {
            Ok(list) => list,
            Err(e) => {
                let preview = &src[head.start..stream.tokens()[head.open_token].end];
                report.failures.push(format!("`{}...` has a malformed argument list: {}", preview, e));
                idx += 1;
                continue;
            }
        };

        let occurrence = &src[head.start..list.end];
        if depth >= MAX_NESTING {
            report.failures.push(format!("`{}` is nested too deeply", StringUtils::truncate(occurrence, 40)));
            idx = list.close_token + 1;
            continue;
        }

        let mut nested = RewriteReport::default();
        let args: Vec<String> = list
            .args
            .iter()
            .map(|range| {
                let (text, inner) = rewrite_calls_at(&src[range.clone()], pattern, handler, depth + 1);
                nested.merge(inner);
                text
            })
            .collect();

        let site = CallSite {
            text: occurrence,
            args: &args,
            tail: &src[list.end..],
            in_expression: stream.is_expression_context(head.first_token),
        };

        match handler(&site) {
            Rewrite::Replace { text, consumed } => {
                out.push_str(&src[cursor..head.start]);
                out.push_str(&text);
                cursor = (list.end + consumed).min(src.len());
                report.rewritten += 1;
                report.merge(nested);
                idx = stream.index_at(cursor);
            }
            Rewrite::Fail(reason) => {
                report.failures.push(reason);
                idx = list.close_token + 1;
            }
            Rewrite::Skip => {
                if nested.rewritten > 0 {
                    out.push_str(&src[cursor..head.start]);
                    let mut pos = head.start;
                    for (range, text) in list.args.iter().zip(&args) {
                        out.push_str(&src[pos..range.start]);
                        out.push_str(text);
                        pos = range.end;
                    }
                    out.push_str(&src[pos..list.end]);
                    cursor = list.end;
                }
                report.merge(nested);
                idx = list.close_token + 1;
            }
        }
    }

    out.push_str(&src[cursor..]);
    (out, report)
}

/// Length of a `;` directly terminating a statement, including leading blanks.
pub fn statement_terminator_len(tail: &str) -> usize {
    let trimmed = tail.trim_start_matches([' ', '\t']);
    if trimmed.starts_with(';') {
        tail.len() - trimmed.len() + 1
    } else {
        0
    }
}
