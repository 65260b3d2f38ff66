// Tue Jan 13 2026 - Alex

use std::borrow::Cow;

pub struct StringUtils;

impl StringUtils {
    pub fn truncate(s: &str, max_len: usize) -> Cow<'_, str> {
        if s.chars().count() <= max_len {
            Cow::Borrowed(s)
        } else if max_len >= 3 {
            let kept: String = s.chars().take(max_len - 3).collect();
            Cow::Owned(format!("{}...", kept))
        } else {
            Cow::Owned(s.chars().take(max_len).collect())
        }
    }

    pub fn is_ident_start(b: u8) -> bool {
        b.is_ascii_alphabetic() || b == b'_'
    }

    pub fn is_ident_char(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_'
    }

    pub fn is_valid_identifier(s: &str) -> bool {
        let bytes = s.as_bytes();
        !bytes.is_empty() && Self::is_ident_start(bytes[0]) && bytes.iter().all(|&b| Self::is_ident_char(b))
    }

    /// Parses a decimal or `0x` hexadecimal integer literal.
    pub fn parse_integer(s: &str) -> Option<u64> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            return u64::from_str_radix(hex, 16).ok();
        }
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok()
    }

    pub fn is_number_literal(s: &str) -> bool {
        Self::parse_integer(s).is_some() || (s.bytes().all(|b| b.is_ascii_digit() || b == b'.') && s.parse::<f64>().is_ok())
    }

    /// Whether `s` can stand as an operand without surrounding parentheses:
    /// a name, a dotted path, a number, or a single parenthesised group.
    pub fn is_atomic_expression(s: &str) -> bool {
        let s = s.trim();
        if s.is_empty() {
            return false;
        }
        if Self::is_number_literal(s) || s.split('.').all(Self::is_valid_identifier) {
            return true;
        }
        if s.starts_with('(') && s.ends_with(')') {
            let mut depth = 0usize;
            for (i, c) in s.char_indices() {
                match c {
                    '(' => depth += 1,
                    ')' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 && i != s.len() - 1 {
                            return false;
                        }
                    }
                    _ => {}
                }
            }
            return depth == 0;
        }
        false
    }

    pub fn parenthesize(s: &str) -> String {
        let s = s.trim();
        if Self::is_atomic_expression(s) {
            s.to_string()
        } else {
            format!("({})", s)
        }
    }

    /// Renders raw bytes as a double-quoted Lua string literal. Other bytes use
    /// the fixed-width `\ddd` form so a following digit never joins the escape.
    pub fn lua_quote(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len() + 2);
        out.push('"');
        for &b in bytes {
            match b {
                b'"' => out.push_str("\\\""),
                b'\\' => out.push_str("\\\\"),
                b'\n' => out.push_str("\\n"),
                b'\r' => out.push_str("\\r"),
                b'\t' => out.push_str("\\t"),
                0x20..=0x7e => out.push(b as char),
                _ => out.push_str(&format!("\\{:03}", b)),
            }
        }
        out.push('"');
        out
    }

    pub fn contains_any(s: &str, patterns: &[&str]) -> bool {
        patterns.iter().any(|p| s.contains(p))
    }

}
