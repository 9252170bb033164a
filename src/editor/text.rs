//! Line-level text helpers shared by motions, text objects and operators

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

/// Character classification for word motions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Blank,
    /// alphanumeric + underscore
    Word,
    /// punctuation, symbols
    Punct,
}

/// Check if a character is a "word" character (alphanumeric or underscore)
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Classify a char; with `big_word` every non-blank is one class (WORD)
pub fn classify_char(ch: char, big_word: bool) -> CharClass {
    if ch.is_whitespace() {
        CharClass::Blank
    } else if big_word || is_word_char(ch) {
        CharClass::Word
    } else {
        CharClass::Punct
    }
}

/// Column of the first non-blank char, or 0 for a blank line
pub fn first_non_blank(line: &str) -> usize {
    line.chars()
        .position(|c| !c.is_whitespace())
        .unwrap_or(0)
}

/// Column of the last non-blank char, or 0 for a blank line
pub fn last_non_blank(line: &str) -> usize {
    let chars: Vec<char> = line.chars().collect();
    chars
        .iter()
        .rposition(|c| !c.is_whitespace())
        .unwrap_or(0)
}

/// Number of leading blank chars
pub fn leading_blanks(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

/// Display width of the leading indentation
pub fn indent_width(line: &str, tabstop: usize) -> usize {
    let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
    display_width(&indent, tabstop)
}

/// Build indentation of the given display width
pub fn make_indent(width: usize, tabstop: usize, expandtab: bool) -> String {
    if expandtab || tabstop == 0 {
        return " ".repeat(width);
    }
    let mut indent = "\t".repeat(width / tabstop);
    indent.push_str(&" ".repeat(width % tabstop));
    indent
}

/// Display width of a string starting at screen column 0
pub fn display_width(text: &str, tabstop: usize) -> usize {
    text.chars().fold(0, |vcol, ch| vcol + char_width(ch, vcol, tabstop))
}

fn char_width(ch: char, vcol: usize, tabstop: usize) -> usize {
    if ch == '\t' {
        let ts = tabstop.max(1);
        ts - vcol % ts
    } else {
        ch.width().unwrap_or(0)
    }
}

/// Display column where the char at `col` starts
pub fn display_col(line: &str, col: usize, tabstop: usize) -> usize {
    let mut vcol = 0;
    for ch in line.chars().take(col) {
        vcol += char_width(ch, vcol, tabstop);
    }
    vcol
}

/// Char column covering display column `vcol`; `None` when the line is shorter
pub fn col_at_display(line: &str, vcol: usize, tabstop: usize) -> Option<usize> {
    let mut start = 0;
    for (col, ch) in line.chars().enumerate() {
        let w = char_width(ch, start, tabstop).max(1);
        if vcol < start + w {
            return Some(col);
        }
        start += w;
    }
    None
}

/// Char column of the grapheme boundary after `col`
pub fn next_grapheme_col(line: &str, col: usize) -> usize {
    let mut pos = 0;
    for g in line.graphemes(true) {
        let len = g.chars().count();
        if pos + len > col {
            return pos + len;
        }
        pos += len;
    }
    pos
}

/// Char column where the grapheme before `col` starts
pub fn prev_grapheme_col(line: &str, col: usize) -> usize {
    let mut pos = 0;
    let mut prev = 0;
    for g in line.graphemes(true) {
        if pos >= col {
            break;
        }
        prev = pos;
        pos += g.chars().count();
    }
    prev
}

/// Char column where the grapheme containing `col` starts
pub fn grapheme_start(line: &str, col: usize) -> usize {
    let mut pos = 0;
    for g in line.graphemes(true) {
        let len = g.chars().count();
        if pos + len > col {
            return pos;
        }
        pos += len;
    }
    pos
}

/// Char slice of a line, `start..end` in columns
pub fn slice_chars(line: &str, start: usize, end: usize) -> String {
    line.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

/// Byte offset of char column `col` (clamped to the end)
pub fn byte_offset(line: &str, col: usize) -> usize {
    line.char_indices()
        .nth(col)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}

/// Char column of byte offset `idx`
pub fn char_col(line: &str, idx: usize) -> usize {
    line[..idx.min(line.len())].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify_char('a', false), CharClass::Word);
        assert_eq!(classify_char('_', false), CharClass::Word);
        assert_eq!(classify_char('.', false), CharClass::Punct);
        assert_eq!(classify_char('.', true), CharClass::Word);
        assert_eq!(classify_char('\t', true), CharClass::Blank);
    }

    #[test]
    fn test_indent_helpers() {
        assert_eq!(indent_width("\t  x", 4), 6);
        assert_eq!(make_indent(6, 4, false), "\t  ");
        assert_eq!(make_indent(6, 4, true), "      ");
        assert_eq!(first_non_blank("   abc "), 3);
        assert_eq!(last_non_blank("   abc "), 5);
        assert_eq!(first_non_blank("    "), 0);
    }

    #[test]
    fn test_display_columns_with_wide_chars() {
        // each CJK char is two cells wide
        let line = "a漢字b";
        assert_eq!(display_col(line, 3, 8), 5);
        assert_eq!(col_at_display(line, 2, 8), Some(1));
        assert_eq!(col_at_display(line, 3, 8), Some(2));
        assert_eq!(col_at_display(line, 9, 8), None);
        assert_eq!(display_col("\tx", 1, 4), 4);
    }

    #[test]
    fn test_grapheme_steps() {
        // 'e' + combining acute accent is one grapheme of two chars
        let line = "ae\u{301}b";
        assert_eq!(next_grapheme_col(line, 1), 3);
        assert_eq!(prev_grapheme_col(line, 3), 1);
        assert_eq!(grapheme_start(line, 2), 1);
        assert_eq!(next_grapheme_col(line, 3), 4);
    }

    #[test]
    fn test_byte_and_char_offsets() {
        let line = "héllo";
        assert_eq!(byte_offset(line, 2), 3);
        assert_eq!(char_col(line, 3), 2);
        assert_eq!(byte_offset(line, 10), line.len());
        assert_eq!(slice_chars(line, 1, 3), "él");
    }
}
