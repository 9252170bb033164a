//! Pattern search over buffer lines.
//!
//! Patterns use Vim "magic" syntax and are translated before compiling.
//! Matching is line by line; a match never spans a line break.

use std::fmt;

use regex::RegexBuilder;

use super::buffer::BufferAdapter;
use super::position::Position;
use super::text;
use crate::error::{EngineError, Result};

/// Search direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchDirection {
    #[default]
    Forward,
    Backward,
}

impl SearchDirection {
    pub fn reverse(self) -> Self {
        match self {
            SearchDirection::Forward => SearchDirection::Backward,
            SearchDirection::Backward => SearchDirection::Forward,
        }
    }

    /// Prompt char for the search line
    pub fn prompt(self) -> char {
        match self {
            SearchDirection::Forward => '/',
            SearchDirection::Backward => '?',
        }
    }
}

/// One match inside a line; columns are chars, `end` exclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub start: usize,
    pub end: usize,
    /// Capture groups, index 0 is the whole match
    pub groups: Vec<Option<String>>,
}

/// A compiled pattern ready to match single lines
pub trait CompiledPattern: fmt::Debug {
    /// All non-overlapping matches in a line, left to right
    fn matches(&self, line: &str) -> Vec<PatternMatch>;

    fn is_match(&self, line: &str) -> bool {
        !self.matches(line).is_empty()
    }
}

/// The regex capability the engine is given.
///
/// Receives patterns already translated from Vim syntax to the
/// common `(`, `|`, `+`, `\b` dialect.
pub trait PatternEngine: fmt::Debug {
    fn compile(&self, pattern: &str, ignore_case: bool) -> std::result::Result<Box<dyn CompiledPattern>, String>;
}

/// Default pattern engine backed by the `regex` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexEngine;

#[derive(Debug)]
struct RegexPattern(regex::Regex);

impl CompiledPattern for RegexPattern {
    fn matches(&self, line: &str) -> Vec<PatternMatch> {
        self.0
            .captures_iter(line)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some(PatternMatch {
                    start: text::char_col(line, whole.start()),
                    end: text::char_col(line, whole.end()),
                    groups: caps
                        .iter()
                        .map(|g| g.map(|m| m.as_str().to_string()))
                        .collect(),
                })
            })
            .collect()
    }

    fn is_match(&self, line: &str) -> bool {
        self.0.is_match(line)
    }
}

impl PatternEngine for RegexEngine {
    fn compile(&self, pattern: &str, ignore_case: bool) -> std::result::Result<Box<dyn CompiledPattern>, String> {
        RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map(|re| Box::new(RegexPattern(re)) as Box<dyn CompiledPattern>)
            .map_err(|err| err.to_string())
    }
}

/// A pattern after Vim syntax translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedPattern {
    pub pattern: String,
    /// Forced by `\c` (true) or `\C` (false)
    pub ignore_case: Option<bool>,
}

/// Translate Vim magic syntax into the regex crate's syntax.
///
/// Only the default `\m` mode is understood; `\v`, `\V` and `\M` are refused.
pub fn translate_magic(pattern: &str) -> Result<TranslatedPattern> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut ignore_case = None;
    let mut in_brace = false;
    let mut in_class = false;
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if in_class {
            if c == ']' {
                in_class = false;
            }
            if c == '\\' {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
                continue;
            }
            out.push(c);
            continue;
        }
        match c {
            '\\' => match chars.next() {
                Some('(') => out.push('('),
                Some(')') => out.push(')'),
                Some('|') => out.push('|'),
                Some('+') => out.push('+'),
                Some('?') | Some('=') => out.push('?'),
                Some('{') => {
                    if chars.peek() == Some(&'-') {
                        // \{-} and \{-n,m} are the lazy forms
                        chars.next();
                        let mut body = String::new();
                        for b in chars.by_ref() {
                            if b == '}' {
                                break;
                            }
                            if b != '\\' {
                                body.push(b);
                            }
                        }
                        if body.is_empty() {
                            out.push_str("*?");
                        } else {
                            out.push('{');
                            out.push_str(&body);
                            out.push_str("}?");
                        }
                    } else {
                        in_brace = true;
                        out.push('{');
                    }
                }
                Some('}') if in_brace => {
                    in_brace = false;
                    out.push('}');
                }
                Some('<') | Some('>') => out.push_str("\\b"),
                Some('c') => ignore_case = Some(true),
                Some('C') => ignore_case = Some(false),
                Some('m') => {}
                Some('v' | 'V' | 'M') => return Err(EngineError::InvalidPattern(pattern.to_string())),
                Some('a') => out.push_str("[A-Za-z]"),
                Some('A') => out.push_str("[^A-Za-z]"),
                Some('l') => out.push_str("[a-z]"),
                Some('u') => out.push_str("[A-Z]"),
                Some('h') => out.push_str("[A-Za-z_]"),
                Some('t') => out.push_str("\\t"),
                Some('e') => out.push_str("\\x1b"),
                Some(class @ ('s' | 'S' | 'd' | 'D' | 'w' | 'W')) => {
                    out.push('\\');
                    out.push(class);
                }
                Some(d @ '1'..='9') => {
                    // back-references are not supported by the regex crate
                    out.push('\\');
                    out.push(d);
                }
                Some(other) => out.push_str(&regex::escape(&other.to_string())),
                None => out.push_str("\\\\"),
            },
            '}' if in_brace => {
                in_brace = false;
                out.push('}');
            }
            '[' => {
                in_class = true;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    out.push('^');
                    chars.next();
                }
                if chars.peek() == Some(&']') {
                    out.push_str("\\]");
                    chars.next();
                }
            }
            '(' | ')' | '|' | '+' | '?' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push('~'),
            _ => out.push(c),
        }
    }

    if in_class {
        // an unterminated [ is a literal bracket in Vim
        if let Some(idx) = out.rfind('[') {
            out.insert(idx, '\\');
        }
    }

    Ok(TranslatedPattern {
        pattern: out,
        ignore_case,
    })
}

/// Whether the pattern has an uppercase letter outside of an escape
fn has_uppercase(pattern: &str) -> bool {
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c.is_uppercase() {
            return true;
        }
    }
    false
}

/// Pattern for `*` / `#`: the literal word with word boundaries
pub fn word_pattern(word: &str) -> String {
    let mut out = String::from("\\<");
    for c in word.chars() {
        if matches!(c, '\\' | '/' | '.' | '*' | '$' | '^' | '~' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push_str("\\>");
    out
}

/// Where a search landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOutcome {
    pub pos: Position,
    /// Exclusive end of the match on the same line
    pub end_col: usize,
    /// The search passed the end (or start) of the buffer
    pub wrapped: bool,
}

impl SearchOutcome {
    /// Informational message for a wrapped search
    pub fn wrap_message(&self, direction: SearchDirection) -> Option<&'static str> {
        if !self.wrapped {
            return None;
        }
        Some(match direction {
            SearchDirection::Forward => "search hit BOTTOM, continuing at TOP",
            SearchDirection::Backward => "search hit TOP, continuing at BOTTOM",
        })
    }
}

/// A highlighted match span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// Search state and the pattern capability
#[derive(Debug)]
pub struct SearchEngine {
    engine: Box<dyn PatternEngine>,
    ignorecase: bool,
    smartcase: bool,
    /// Last search pattern (for n/N)
    last_pattern: Option<String>,
    /// Last search direction
    last_direction: SearchDirection,
    /// Highlights are shown until `:nohlsearch`
    highlight_active: bool,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(Box::new(RegexEngine))
    }
}

impl SearchEngine {
    pub fn new(engine: Box<dyn PatternEngine>) -> Self {
        Self {
            engine,
            ignorecase: true,
            smartcase: true,
            last_pattern: None,
            last_direction: SearchDirection::Forward,
            highlight_active: false,
        }
    }

    pub fn set_case_options(&mut self, ignorecase: bool, smartcase: bool) {
        self.ignorecase = ignorecase;
        self.smartcase = smartcase;
    }

    pub fn last_pattern(&self) -> Option<&str> {
        self.last_pattern.as_deref()
    }

    pub fn last_direction(&self) -> SearchDirection {
        self.last_direction
    }

    /// Remember a pattern for `n`/`N`, `:s//` and highlighting
    pub fn set_last(&mut self, pattern: &str, direction: SearchDirection) {
        self.last_pattern = Some(pattern.to_string());
        self.last_direction = direction;
        self.highlight_active = true;
    }

    /// Remember a pattern used by `:s` or `:g` without touching the direction
    pub fn set_last_pattern(&mut self, pattern: &str) {
        self.last_pattern = Some(pattern.to_string());
        self.highlight_active = true;
    }

    pub fn clear_highlight(&mut self) {
        self.highlight_active = false;
    }

    pub fn highlight_active(&self) -> bool {
        self.highlight_active
    }

    /// Empty patterns stand for the last one
    pub fn resolve_pattern<'a>(&'a self, pattern: &'a str) -> Result<&'a str> {
        if !pattern.is_empty() {
            return Ok(pattern);
        }
        self.last_pattern().ok_or(EngineError::NoPreviousPattern)
    }

    /// Compile a Vim pattern honouring ignorecase, smartcase and `\c`/`\C`
    pub fn compile(&self, pattern: &str) -> Result<Box<dyn CompiledPattern>> {
        self.compile_with_case(pattern, None)
    }

    /// Like `compile`, with the `:s` `i`/`I` flags taking the place of the options
    pub fn compile_with_case(&self, pattern: &str, ignore_case: Option<bool>) -> Result<Box<dyn CompiledPattern>> {
        let translated = translate_magic(pattern)?;
        let ignore_case = translated
            .ignore_case
            .or(ignore_case)
            .unwrap_or(self.ignorecase && !(self.smartcase && has_uppercase(pattern)));
        tracing::trace!(target: "engine.search", pattern, translated = %translated.pattern, ignore_case, "compile");
        self.engine
            .compile(&translated.pattern, ignore_case)
            .map_err(|err| {
                tracing::debug!(target: "engine.search", %err, "invalid pattern");
                EngineError::InvalidPattern(pattern.to_string())
            })
    }

    /// Find the next match of `pattern` from `from` (exclusive) in `direction`
    pub fn search<B: BufferAdapter + ?Sized>(
        &self,
        buffer: &B,
        pattern: &str,
        direction: SearchDirection,
        from: Position,
        wrap: bool,
    ) -> Result<SearchOutcome> {
        let compiled = self.compile(pattern)?;
        let found = match direction {
            SearchDirection::Forward => find_forward(buffer, compiled.as_ref(), from, wrap),
            SearchDirection::Backward => find_backward(buffer, compiled.as_ref(), from, wrap),
        };
        if let Some(outcome) = found {
            return Ok(outcome);
        }
        if !wrap && buffer_has_match(buffer, compiled.as_ref()) {
            return Err(match direction {
                SearchDirection::Forward => EngineError::HitBottom(pattern.to_string()),
                SearchDirection::Backward => EngineError::HitTop(pattern.to_string()),
            });
        }
        Err(EngineError::PatternNotFound(pattern.to_string()))
    }

    /// All match spans of the last pattern, empty when highlighting is off
    pub fn highlights<B: BufferAdapter + ?Sized>(&self, buffer: &B) -> Vec<MatchSpan> {
        let Some(pattern) = self.last_pattern.as_deref().filter(|_| self.highlight_active) else {
            return Vec::new();
        };
        match self.compile(pattern) {
            Ok(compiled) => all_matches(buffer, compiled.as_ref()),
            Err(_) => Vec::new(),
        }
    }
}

/// All match spans in the buffer
pub fn all_matches<B: BufferAdapter + ?Sized>(buffer: &B, pattern: &dyn CompiledPattern) -> Vec<MatchSpan> {
    let mut spans = Vec::new();
    for line in 0..buffer.line_count() {
        for m in pattern.matches(&buffer.line_text(line)) {
            spans.push(MatchSpan {
                line,
                start: m.start,
                end: m.end,
            });
        }
    }
    spans
}

fn buffer_has_match<B: BufferAdapter + ?Sized>(buffer: &B, pattern: &dyn CompiledPattern) -> bool {
    (0..buffer.line_count()).any(|line| pattern.is_match(&buffer.line_text(line)))
}

fn find_forward<B: BufferAdapter + ?Sized>(
    buffer: &B,
    pattern: &dyn CompiledPattern,
    from: Position,
    wrap: bool,
) -> Option<SearchOutcome> {
    let line_count = buffer.line_count();
    let hit = |line: usize, accept: &dyn Fn(usize) -> bool| {
        pattern
            .matches(&buffer.line_text(line))
            .into_iter()
            .find(|m| accept(m.start))
    };

    if let Some(m) = hit(from.line, &|start| start > from.col) {
        return Some(SearchOutcome {
            pos: Position::new(from.line, m.start),
            end_col: m.end,
            wrapped: false,
        });
    }
    for line in from.line + 1..line_count {
        if let Some(m) = hit(line, &|_| true) {
            return Some(SearchOutcome {
                pos: Position::new(line, m.start),
                end_col: m.end,
                wrapped: false,
            });
        }
    }
    if !wrap {
        return None;
    }
    for line in 0..=from.line.min(line_count.saturating_sub(1)) {
        let accept = |start: usize| line < from.line || start <= from.col;
        if let Some(m) = hit(line, &accept) {
            return Some(SearchOutcome {
                pos: Position::new(line, m.start),
                end_col: m.end,
                wrapped: true,
            });
        }
    }
    None
}

fn find_backward<B: BufferAdapter + ?Sized>(
    buffer: &B,
    pattern: &dyn CompiledPattern,
    from: Position,
    wrap: bool,
) -> Option<SearchOutcome> {
    let line_count = buffer.line_count();
    let hit = |line: usize, accept: &dyn Fn(usize) -> bool| {
        pattern
            .matches(&buffer.line_text(line))
            .into_iter()
            .rev()
            .find(|m| accept(m.start))
    };

    if let Some(m) = hit(from.line, &|start| start < from.col) {
        return Some(SearchOutcome {
            pos: Position::new(from.line, m.start),
            end_col: m.end,
            wrapped: false,
        });
    }
    for line in (0..from.line).rev() {
        if let Some(m) = hit(line, &|_| true) {
            return Some(SearchOutcome {
                pos: Position::new(line, m.start),
                end_col: m.end,
                wrapped: false,
            });
        }
    }
    if !wrap {
        return None;
    }
    for line in (from.line..line_count).rev() {
        let accept = |start: usize| line > from.line || start >= from.col;
        if let Some(m) = hit(line, &accept) {
            return Some(SearchOutcome {
                pos: Position::new(line, m.start),
                end_col: m.end,
                wrapped: true,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::buffer::Buffer;

    fn engine() -> SearchEngine {
        SearchEngine::default()
    }

    #[test]
    fn test_translate_magic() {
        assert_eq!(translate_magic(r"\(foo\|bar\)\+").unwrap().pattern, "(foo|bar)+");
        assert_eq!(translate_magic("f(o)+").unwrap().pattern, r"f\(o\)\+");
        assert_eq!(translate_magic(r"\<word\>").unwrap().pattern, r"\bword\b");
        assert_eq!(translate_magic(r"a\{2,3}").unwrap().pattern, "a{2,3}");
        assert_eq!(translate_magic(r"a\{-}b").unwrap().pattern, "a*?b");
        assert_eq!(translate_magic("a.*b").unwrap().pattern, "a.*b");
        assert_eq!(translate_magic(r"\/path").unwrap().pattern, "/path");
        assert_eq!(translate_magic(r"\mfoo").unwrap().pattern, "foo");
    }

    #[test]
    fn test_other_magic_modes_are_refused() {
        for pattern in [r"\va", r"\Va", r"\Ma"] {
            assert_eq!(
                translate_magic(pattern).unwrap_err(),
                EngineError::InvalidPattern(pattern.to_string())
            );
        }
        let search = engine();
        let buf = Buffer::from_lines(&["a"]);
        let err = search
            .search(&buf, r"\va", SearchDirection::Forward, Position::new(0, 0), true)
            .unwrap_err();
        assert_eq!(err.to_string(), r"Invalid regular expression: \va");
    }

    #[test]
    fn test_case_flags() {
        let t = translate_magic(r"foo\c").unwrap();
        assert_eq!(t.pattern, "foo");
        assert_eq!(t.ignore_case, Some(true));
        assert_eq!(translate_magic(r"\Cfoo").unwrap().ignore_case, Some(false));
    }

    #[test]
    fn test_smartcase() {
        let search = engine();
        let buf = Buffer::from_lines(&["Foo foo"]);
        let lower = search.compile("foo").unwrap();
        assert_eq!(lower.matches(&buf.line_text(0)).len(), 2);
        let upper = search.compile("Foo").unwrap();
        assert_eq!(upper.matches(&buf.line_text(0)).len(), 1);
        let forced = search.compile(r"Foo\c").unwrap();
        assert_eq!(forced.matches(&buf.line_text(0)).len(), 2);
    }

    #[test]
    fn test_search_forward_and_wrap() {
        let search = engine();
        let buf = Buffer::from_lines(&["foo", "bar", "baz"]);
        let found = search
            .search(&buf, "ba", SearchDirection::Forward, Position::new(0, 0), true)
            .unwrap();
        assert_eq!(found.pos, Position::new(1, 0));
        assert!(!found.wrapped);

        let wrapped = search
            .search(&buf, "foo", SearchDirection::Forward, Position::new(1, 0), true)
            .unwrap();
        assert_eq!(wrapped.pos, Position::new(0, 0));
        assert_eq!(
            wrapped.wrap_message(SearchDirection::Forward),
            Some("search hit BOTTOM, continuing at TOP")
        );
    }

    #[test]
    fn test_search_backward() {
        let search = engine();
        let buf = Buffer::from_lines(&["x one x", "two"]);
        let found = search
            .search(&buf, "x", SearchDirection::Backward, Position::new(0, 6), true)
            .unwrap();
        assert_eq!(found.pos, Position::new(0, 0));

        let wrapped = search
            .search(&buf, "two", SearchDirection::Backward, Position::new(0, 0), true)
            .unwrap();
        assert_eq!(wrapped.pos, Position::new(1, 0));
        assert!(wrapped.wrapped);
    }

    #[test]
    fn test_only_match_at_cursor_wraps_to_itself() {
        let search = engine();
        let buf = Buffer::from_lines(&["needle", "hay"]);
        let found = search
            .search(&buf, "needle", SearchDirection::Forward, Position::new(0, 0), true)
            .unwrap();
        assert_eq!(found.pos, Position::new(0, 0));
        assert!(found.wrapped);
    }

    #[test]
    fn test_nowrapscan_errors() {
        let search = engine();
        let buf = Buffer::from_lines(&["foo", "bar"]);
        assert_eq!(
            search.search(&buf, "foo", SearchDirection::Forward, Position::new(1, 0), false),
            Err(EngineError::HitBottom("foo".into()))
        );
        assert_eq!(
            search.search(&buf, "bar", SearchDirection::Backward, Position::new(0, 0), false),
            Err(EngineError::HitTop("bar".into()))
        );
        assert_eq!(
            search.search(&buf, "qux", SearchDirection::Forward, Position::new(0, 0), false),
            Err(EngineError::PatternNotFound("qux".into()))
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let search = engine();
        let buf = Buffer::from_lines(&["foo"]);
        assert_eq!(
            search.search(&buf, r"\(", SearchDirection::Forward, Position::default(), true),
            Err(EngineError::InvalidPattern(r"\(".into()))
        );
    }

    #[test]
    fn test_unicode_columns() {
        let search = engine();
        let buf = Buffer::from_lines(&["héllo wörld"]);
        let found = search
            .search(&buf, "w", SearchDirection::Forward, Position::default(), true)
            .unwrap();
        assert_eq!(found.pos, Position::new(0, 6));
        assert_eq!(found.end_col, 7);
    }

    #[test]
    fn test_highlights_follow_last_pattern() {
        let mut search = engine();
        let buf = Buffer::from_lines(&["a b a", "a"]);
        assert!(search.highlights(&buf).is_empty());
        search.set_last("a", SearchDirection::Forward);
        assert_eq!(search.highlights(&buf).len(), 3);
        search.clear_highlight();
        assert!(search.highlights(&buf).is_empty());
    }

    #[test]
    fn test_word_pattern() {
        assert_eq!(word_pattern("foo"), r"\<foo\>");
        let search = engine();
        let compiled = search.compile(&word_pattern("foo")).unwrap();
        assert_eq!(compiled.matches("foo foobar foo").len(), 2);
    }
}
