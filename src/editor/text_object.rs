//! Text object selection (`iw`, `a"`, `i(`, `ap`, ...)
//!
//! Words and quotes never leave the cursor line. Brackets may span lines;
//! when both the opening and closing bracket sit on their own lines, the
//! inner object is the whole lines in between (linewise).

use super::buffer::BufferAdapter;
use super::position::Position;
use super::text::{classify_char, CharClass};
use crate::input::motion::{scan_backward_for_open, scan_forward_for_close};

/// Text object modifier (inner vs around)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextObjectModifier {
    Inner,  // i - inside, excluding delimiters
    Around, // a - around, including delimiters/whitespace
}

/// Text object types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextObjectType {
    Word,         // w
    BigWord,      // W
    DoubleQuote,  // "
    SingleQuote,  // '
    BackTick,     // `
    Paren,        // ( ) b
    Brace,        // { } B
    Bracket,      // [ ]
    AngleBracket, // < >
    Paragraph,    // p
}

impl TextObjectType {
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'w' => TextObjectType::Word,
            'W' => TextObjectType::BigWord,
            '"' => TextObjectType::DoubleQuote,
            '\'' => TextObjectType::SingleQuote,
            '`' => TextObjectType::BackTick,
            '(' | ')' | 'b' => TextObjectType::Paren,
            '{' | '}' | 'B' => TextObjectType::Brace,
            '[' | ']' => TextObjectType::Bracket,
            '<' | '>' => TextObjectType::AngleBracket,
            'p' => TextObjectType::Paragraph,
            _ => return None,
        })
    }
}

/// A complete text object specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextObject {
    pub modifier: TextObjectModifier,
    pub object_type: TextObjectType,
}

/// A span of buffer text an operator works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: Position,
    /// Exclusive end for charwise ranges; last line for linewise ones
    pub end: Position,
    pub linewise: bool,
}

impl TextRange {
    pub fn charwise(start: Position, end: Position) -> Self {
        Self {
            start,
            end,
            linewise: false,
        }
    }

    pub fn lines(first: usize, last: usize) -> Self {
        Self {
            start: Position::new(first, 0),
            end: Position::new(last, 0),
            linewise: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.linewise && self.start >= self.end
    }
}

/// Find the range of a text object around `pos`
pub fn find_text_object<B: BufferAdapter + ?Sized>(
    buffer: &B,
    pos: Position,
    object: TextObject,
    count: usize,
) -> Option<TextRange> {
    let around = object.modifier == TextObjectModifier::Around;
    match object.object_type {
        TextObjectType::Word => word_object(buffer, pos, around, false),
        TextObjectType::BigWord => word_object(buffer, pos, around, true),
        TextObjectType::DoubleQuote => quote_object(buffer, pos, around, '"'),
        TextObjectType::SingleQuote => quote_object(buffer, pos, around, '\''),
        TextObjectType::BackTick => quote_object(buffer, pos, around, '`'),
        TextObjectType::Paren => bracket_object(buffer, pos, around, '(', ')', count),
        TextObjectType::Brace => bracket_object(buffer, pos, around, '{', '}', count),
        TextObjectType::Bracket => bracket_object(buffer, pos, around, '[', ']', count),
        TextObjectType::AngleBracket => bracket_object(buffer, pos, around, '<', '>', count),
        TextObjectType::Paragraph => paragraph_object(buffer, pos, around, count),
    }
}

/// Find word text object boundaries
fn word_object<B: BufferAdapter + ?Sized>(
    buffer: &B,
    pos: Position,
    around: bool,
    big_word: bool,
) -> Option<TextRange> {
    let chars: Vec<char> = buffer.line_text(pos.line).chars().collect();
    if chars.is_empty() {
        return None;
    }
    let col = pos.col.min(chars.len() - 1);
    let class = classify_char(chars[col], big_word);
    let same = |c: char| classify_char(c, big_word) == class;

    let mut start = col;
    while start > 0 && same(chars[start - 1]) {
        start -= 1;
    }
    let mut end = col + 1;
    while end < chars.len() && same(chars[end]) {
        end += 1;
    }

    if around {
        if class == CharClass::Blank {
            // blanks plus the following word
            if end < chars.len() {
                let next = classify_char(chars[end], big_word);
                while end < chars.len() && classify_char(chars[end], big_word) == next {
                    end += 1;
                }
            }
        } else {
            let mut trailing = end;
            while trailing < chars.len() && chars[trailing].is_whitespace() {
                trailing += 1;
            }
            if trailing > end {
                end = trailing;
            } else {
                // No trailing whitespace, take the leading run instead
                while start > 0 && chars[start - 1].is_whitespace() {
                    start -= 1;
                }
            }
        }
    }

    Some(TextRange::charwise(
        Position::new(pos.line, start),
        Position::new(pos.line, end),
    ))
}

/// Find quote text object boundaries on the cursor line.
///
/// Quotes pair up from the start of the line; backslash-escaped quotes are
/// skipped. When the cursor is not inside a pair, the next pair after it is used.
fn quote_object<B: BufferAdapter + ?Sized>(
    buffer: &B,
    pos: Position,
    around: bool,
    quote: char,
) -> Option<TextRange> {
    let chars: Vec<char> = buffer.line_text(pos.line).chars().collect();
    let quotes: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| c == quote && (i == 0 || chars[i - 1] != '\\'))
        .map(|(i, _)| i)
        .collect();

    let (open, close) = quotes
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .find(|&(_, close)| pos.col <= close)?;

    let (mut start, mut end) = if around {
        (open, close + 1)
    } else {
        (open + 1, close)
    };

    if around {
        let mut trailing = end;
        while trailing < chars.len() && chars[trailing].is_whitespace() {
            trailing += 1;
        }
        if trailing > end {
            end = trailing;
        } else {
            while start > 0 && chars[start - 1].is_whitespace() {
                start -= 1;
            }
        }
    }

    Some(TextRange::charwise(
        Position::new(pos.line, start),
        Position::new(pos.line, end),
    ))
}

/// Find bracket text object boundaries with nesting support
fn bracket_object<B: BufferAdapter + ?Sized>(
    buffer: &B,
    pos: Position,
    around: bool,
    open_ch: char,
    close_ch: char,
    count: usize,
) -> Option<TextRange> {
    let mut open = match buffer.char_at(pos) {
        Some(c) if c == open_ch => pos,
        Some(c) if c == close_ch => scan_backward_for_open(buffer, pos, open_ch, close_ch)?,
        _ => enclosing_open(buffer, pos, open_ch, close_ch)?,
    };
    for _ in 1..count.max(1) {
        let outer = if open.col > 0 {
            Position::new(open.line, open.col - 1)
        } else if open.line > 0 {
            let prev = open.line - 1;
            Position::new(prev, buffer.line_len(prev))
        } else {
            return None;
        };
        open = enclosing_open(buffer, outer, open_ch, close_ch)?;
    }
    let close = scan_forward_for_close(buffer, open, open_ch, close_ch)?;

    if around {
        return Some(TextRange::charwise(
            open,
            Position::new(close.line, close.col + 1),
        ));
    }

    let open_at_eol = open.col + 1 >= buffer.line_len(open.line);
    let close_at_bol = buffer
        .line_text(close.line)
        .chars()
        .take(close.col)
        .all(char::is_whitespace);

    if open_at_eol && close_at_bol && close.line > open.line + 1 {
        return Some(TextRange::lines(open.line + 1, close.line - 1));
    }

    let start = if open_at_eol && close.line > open.line {
        Position::new(open.line + 1, 0)
    } else {
        Position::new(open.line, open.col + 1)
    };
    let end = if close_at_bol && close.line > start.line {
        let prev = close.line - 1;
        Position::new(prev, buffer.line_len(prev))
    } else {
        close
    };
    Some(TextRange::charwise(start, end.max(start)))
}

/// Search backward from `pos` (inclusive) for an unmatched opening bracket
fn enclosing_open<B: BufferAdapter + ?Sized>(
    buffer: &B,
    pos: Position,
    open_ch: char,
    close_ch: char,
) -> Option<Position> {
    let mut depth = 0usize;
    for line in (0..=pos.line).rev() {
        let chars: Vec<char> = buffer.line_text(line).chars().collect();
        let upto = if line == pos.line {
            (pos.col + 1).min(chars.len())
        } else {
            chars.len()
        };
        for col in (0..upto).rev() {
            let c = chars[col];
            if c == close_ch && !(line == pos.line && col == pos.col) {
                depth += 1;
            } else if c == open_ch {
                if depth == 0 {
                    return Some(Position::new(line, col));
                }
                depth -= 1;
            }
        }
    }
    None
}

/// Paragraph object: the run of lines sharing the cursor line's blankness
fn paragraph_object<B: BufferAdapter + ?Sized>(
    buffer: &B,
    pos: Position,
    around: bool,
    count: usize,
) -> Option<TextRange> {
    let last = buffer.last_line();
    let blank = buffer.is_blank_line(pos.line);

    let mut first = pos.line;
    while first > 0 && buffer.is_blank_line(first - 1) == blank {
        first -= 1;
    }

    let run_end = |from: usize| -> usize {
        let kind = buffer.is_blank_line(from);
        let mut end = from;
        while end < last && buffer.is_blank_line(end + 1) == kind {
            end += 1;
        }
        end
    };

    let mut end = run_end(pos.line);
    for _ in 1..count.max(1) {
        if end >= last {
            break;
        }
        end = run_end(end + 1);
    }

    if around {
        if end < last {
            end = run_end(end + 1);
        } else if !blank {
            // no blank lines after: take the ones before instead
            while first > 0 && buffer.is_blank_line(first - 1) {
                first -= 1;
            }
        }
    }

    Some(TextRange::lines(first, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::buffer::Buffer;

    fn obj(modifier: TextObjectModifier, c: char) -> TextObject {
        TextObject {
            modifier,
            object_type: TextObjectType::from_char(c).unwrap(),
        }
    }

    fn inner(c: char) -> TextObject {
        obj(TextObjectModifier::Inner, c)
    }

    fn around(c: char) -> TextObject {
        obj(TextObjectModifier::Around, c)
    }

    fn text(b: &Buffer, r: TextRange) -> String {
        if r.linewise {
            b.lines_text(r.start.line, r.end.line).join("\n")
        } else {
            b.text_range(r.start, r.end)
        }
    }

    fn select(lines: &[&str], line: usize, col: usize, object: TextObject) -> Option<String> {
        let b = Buffer::from_lines(lines);
        find_text_object(&b, Position::new(line, col), object, 1).map(|r| text(&b, r))
    }

    #[test]
    fn test_word_objects() {
        assert_eq!(select(&["foo bar baz"], 0, 5, inner('w')).as_deref(), Some("bar"));
        assert_eq!(select(&["foo bar baz"], 0, 5, around('w')).as_deref(), Some("bar "));
        // last word takes leading blanks
        assert_eq!(select(&["foo bar"], 0, 5, around('w')).as_deref(), Some(" bar"));
        assert_eq!(select(&["a.b c"], 0, 0, inner('W')).as_deref(), Some("a.b"));
        assert_eq!(select(&[""], 0, 0, inner('w')), None);
    }

    #[test]
    fn test_quote_objects() {
        let line = r#"say "hello there" now"#;
        assert_eq!(select(&[line], 0, 7, inner('"')).as_deref(), Some("hello there"));
        assert_eq!(select(&[line], 0, 7, around('"')).as_deref(), Some("\"hello there\" "));
        // before the first quote selects the next pair
        assert_eq!(select(&[line], 0, 0, inner('"')).as_deref(), Some("hello there"));
        assert_eq!(select(&[line], 0, 19, inner('"')), None);
    }

    #[test]
    fn test_quote_skips_escaped() {
        let line = r#"x = "a \" b";"#;
        assert_eq!(select(&[line], 0, 6, inner('"')).as_deref(), Some(r#"a \" b"#));
    }

    #[test]
    fn test_empty_quotes_give_empty_range() {
        let b = Buffer::from_lines(&["x = \"\""]);
        let r = find_text_object(&b, Position::new(0, 4), inner('"'), 1).unwrap();
        assert!(r.is_empty());
        assert_eq!(r.start, Position::new(0, 5));
    }

    #[test]
    fn test_bracket_objects_single_line() {
        let line = "call(a, (b, c), d)";
        assert_eq!(select(&[line], 0, 9, inner('(')).as_deref(), Some("b, c"));
        assert_eq!(select(&[line], 0, 9, around(')')).as_deref(), Some("(b, c)"));
        assert_eq!(select(&[line], 0, 5, inner('b')).as_deref(), Some("a, (b, c), d"));
        // on the opening bracket itself
        assert_eq!(select(&[line], 0, 4, inner('(')).as_deref(), Some("a, (b, c), d"));
        // count selects the enclosing pair
        let b = Buffer::from_lines(&[line]);
        let r = find_text_object(&b, Position::new(0, 9), inner('('), 2).unwrap();
        assert_eq!(text(&b, r), "a, (b, c), d");
    }

    #[test]
    fn test_bracket_block_is_linewise_inside() {
        let lines = ["fn main() {", "    let x = 1;", "    x", "}"];
        let b = Buffer::from_lines(&lines);
        let r = find_text_object(&b, Position::new(1, 6), inner('{'), 1).unwrap();
        assert!(r.linewise);
        assert_eq!((r.start.line, r.end.line), (1, 2));

        let r = find_text_object(&b, Position::new(1, 6), around('{'), 1).unwrap();
        assert_eq!(r.start, Position::new(0, 10));
        assert_eq!(r.end, Position::new(3, 1));
    }

    #[test]
    fn test_bracket_spanning_lines_charwise() {
        let lines = ["f(a,", "  b)"];
        assert_eq!(select(&lines, 1, 2, inner('(')).as_deref(), Some("a,\n  b"));
    }

    #[test]
    fn test_no_enclosing_bracket() {
        assert_eq!(select(&["plain text"], 0, 3, inner('(')), None);
    }

    #[test]
    fn test_paragraph_objects() {
        let lines = ["a", "b", "", "", "c"];
        let b = Buffer::from_lines(&lines);
        let r = find_text_object(&b, Position::new(0, 0), inner('p'), 1).unwrap();
        assert_eq!((r.start.line, r.end.line), (0, 1));
        let r = find_text_object(&b, Position::new(0, 0), around('p'), 1).unwrap();
        assert_eq!((r.start.line, r.end.line), (0, 3));
        // last paragraph borrows the blank lines above it
        let r = find_text_object(&b, Position::new(4, 0), around('p'), 1).unwrap();
        assert_eq!((r.start.line, r.end.line), (2, 4));
    }
}
