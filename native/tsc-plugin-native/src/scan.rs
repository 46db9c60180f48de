//! Scan Module
//!
//! Cheap text-level checks used before handing a file to the full transpiler.
//! None of this parses the language: it is a conservative pre-filter and may
//! miss decorators written in unusual styles.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `@`, an optional `(`, then an identifier. What follows the identifier is
    /// checked by hand since `regex` has no lookaround.
    static ref DECORATOR_START: Regex = Regex::new(r"@\(?[A-Za-z_$][\w$]*").unwrap();
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Remove `//` and `/* */` comments, leaving string and template literals
/// intact. Newlines inside block comments are kept so line numbers survive.
/// Quotes in JSX text or regex literals also open a string, so comments after
/// them may be kept.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut state = State::Code;

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                '"' | '\'' | '`' => {
                    out.push(c);
                    state = State::Quoted(c);
                }
                _ => out.push(c),
            },
            State::Quoted(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote {
                    state = State::Code;
                }
            }
            State::LineComment => {
                if c == '\n' {
                    out.push(c);
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                } else if c == '\n' {
                    out.push(c);
                }
            }
        }
    }

    out
}

/// True when `source` (already stripped of comments) looks like it applies a decorator.
pub fn has_decorator(source: &str) -> bool {
    DECORATOR_START.find_iter(source).any(|m| {
        let quoted = source[..m.start()]
            .chars()
            .next_back()
            .map_or(false, |prev| matches!(prev, '\'' | '"' | '`'));
        if quoted {
            return false;
        }

        let rest = &source[m.end()..];
        let Some(next) = rest.chars().next() else {
            return false;
        };
        if !(next.is_whitespace() || matches!(next, '(' | ')' | '?' | '=')) {
            return false;
        }
        // `@name;` is not an invocation
        !rest.trim_start().starts_with(';')
    })
}

/// Decorator check on raw file text.
pub fn has_decorator_usage(source: &str) -> bool {
    has_decorator(&strip_comments(source))
}
