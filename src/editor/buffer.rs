use ropey::Rope;

use super::position::Position;

/// The contract the engine needs from a host text buffer.
///
/// Lines are numbered from 0 and never include their line terminator. A
/// position whose column equals the line length addresses the line break
/// after that line, so deleting from `(l, len)` to `(l + 1, 0)` joins two
/// lines. A buffer always has at least one (possibly empty) line.
pub trait BufferAdapter {
    fn line_count(&self) -> usize;

    /// Text of a line without its terminator; empty when out of range
    fn line_text(&self, line: usize) -> String;

    /// Insert text (which may contain '\n') at a position
    fn insert_at(&mut self, pos: Position, text: &str);

    /// Delete the text between two positions, end exclusive
    fn delete_range(&mut self, start: Position, end: Position);

    fn cursor_position(&self) -> Position;

    fn set_cursor_position(&mut self, pos: Position);

    /// Length of a line in chars
    fn line_len(&self, line: usize) -> usize {
        self.line_text(line).chars().count()
    }

    fn char_at(&self, pos: Position) -> Option<char> {
        self.line_text(pos.line).chars().nth(pos.col)
    }

    fn last_line(&self) -> usize {
        self.line_count().saturating_sub(1)
    }

    /// Text between two positions, end exclusive, with '\n' between lines
    fn text_range(&self, start: Position, end: Position) -> String {
        if end <= start {
            return String::new();
        }
        let mut out = String::new();
        for line in start.line..=end.line.min(self.last_line()) {
            let text = self.line_text(line);
            let len = text.chars().count();
            let from = if line == start.line { start.col.min(len) } else { 0 };
            if line == end.line {
                let to = end.col.min(len).max(from);
                out.extend(text.chars().skip(from).take(to - from));
                if end.col > len && line < self.last_line() {
                    out.push('\n');
                }
            } else {
                out.extend(text.chars().skip(from));
                out.push('\n');
            }
        }
        out
    }

    /// Lines `first..=last` clamped to the buffer
    fn lines_text(&self, first: usize, last: usize) -> Vec<String> {
        let last = last.min(self.last_line());
        (first..=last).map(|l| self.line_text(l)).collect()
    }

    /// Whole buffer with a trailing newline, the way files store it
    fn content(&self) -> String {
        let mut out = String::new();
        for line in 0..self.line_count() {
            out.push_str(&self.line_text(line));
            out.push('\n');
        }
        out
    }

    fn is_blank_line(&self, line: usize) -> bool {
        self.line_text(line).chars().all(char::is_whitespace)
    }

    /// Clamp a position to an existing char (or column 0 of an empty line)
    fn clamp_position(&self, pos: Position) -> Position {
        let line = pos.line.min(self.last_line());
        let len = self.line_len(line);
        Position::new(line, pos.col.min(len.saturating_sub(1)))
    }
}

/// A text buffer backed by a rope data structure.
/// Ropes provide O(log n) insertions and deletions, making them
/// ideal for text editors.
#[derive(Debug, Clone)]
pub struct Buffer {
    /// The text content, lines joined by '\n' without a final terminator
    text: Rope,
    cursor: Position,
    /// Monotonic version for change tracking
    version: u64,
}

impl Buffer {
    /// Create a new empty buffer
    pub fn new() -> Self {
        Self {
            text: Rope::new(),
            cursor: Position::default(),
            version: 0,
        }
    }

    /// Create a buffer from file contents; one trailing newline is the file terminator
    pub fn from_text(content: &str) -> Self {
        let content = content.strip_suffix('\n').unwrap_or(content);
        let content = content.replace("\r\n", "\n");
        Self {
            text: Rope::from_str(&content),
            cursor: Position::default(),
            version: 0,
        }
    }

    pub fn from_lines(lines: &[&str]) -> Self {
        Self {
            text: Rope::from_str(&lines.join("\n")),
            cursor: Position::default(),
            version: 0,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        (0..self.line_count()).map(|l| self.line_text(l)).collect()
    }

    /// Get the current version of the buffer
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Get total character count
    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    /// Char index for a position, clamped to the text
    fn char_idx(&self, pos: Position) -> usize {
        let line = pos.line.min(self.text.len_lines().saturating_sub(1));
        let line_start = self.text.line_to_char(line);
        (line_start + pos.col.min(self.line_len(line))).min(self.text.len_chars())
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferAdapter for Buffer {
    fn line_count(&self) -> usize {
        self.text.len_lines()
    }

    fn line_text(&self, line: usize) -> String {
        if line >= self.text.len_lines() {
            return String::new();
        }
        let mut text = self.text.line(line).to_string();
        if text.ends_with('\n') {
            text.pop();
        }
        text
    }

    fn line_len(&self, line: usize) -> usize {
        if line >= self.text.len_lines() {
            return 0;
        }
        let l = self.text.line(line);
        let len = l.len_chars();
        if len > 0 && l.char(len - 1) == '\n' {
            len - 1
        } else {
            len
        }
    }

    fn char_at(&self, pos: Position) -> Option<char> {
        if pos.col >= self.line_len(pos.line) {
            return None;
        }
        Some(self.text.char(self.text.line_to_char(pos.line) + pos.col))
    }

    fn insert_at(&mut self, pos: Position, text: &str) {
        if text.is_empty() {
            return;
        }
        let idx = self.char_idx(pos);
        self.text.insert(idx, text);
        self.version = self.version.wrapping_add(1);
    }

    fn delete_range(&mut self, start: Position, end: Position) {
        let start = self.char_idx(start);
        let end = if end.line >= self.text.len_lines() {
            self.text.len_chars()
        } else {
            // a column past the line end reaches the line break
            let line_start = self.text.line_to_char(end.line);
            let full = self.text.line(end.line).len_chars();
            (line_start + end.col.min(full)).min(self.text.len_chars())
        };
        if start < end {
            self.text.remove(start..end);
            self.version = self.version.wrapping_add(1);
        }
    }

    fn cursor_position(&self) -> Position {
        self.cursor
    }

    fn set_cursor_position(&mut self, pos: Position) {
        self.cursor = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_strips_file_terminator() {
        let buf = Buffer::from_text("alpha\nbeta\n");
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.content(), "alpha\nbeta\n");

        let empty = Buffer::from_text("");
        assert_eq!(empty.line_count(), 1);
        assert_eq!(empty.line_text(0), "");
    }

    #[test]
    fn test_insert_and_delete_across_lines() {
        let mut buf = Buffer::from_lines(&["alpha", "beta", "gamma"]);
        buf.insert_at(Position::new(1, 4), "\nnew");
        assert_eq!(buf.lines(), vec!["alpha", "beta", "new", "gamma"]);

        buf.delete_range(Position::new(0, 5), Position::new(1, 0));
        assert_eq!(buf.lines(), vec!["alphabeta", "new", "gamma"]);

        // deleting a whole line including its break
        buf.delete_range(Position::new(1, 0), Position::new(2, 0));
        assert_eq!(buf.lines(), vec!["alphabeta", "gamma"]);
    }

    #[test]
    fn test_text_range() {
        let buf = Buffer::from_lines(&["one", "two", "three"]);
        assert_eq!(buf.text_range(Position::new(0, 1), Position::new(0, 3)), "ne");
        assert_eq!(buf.text_range(Position::new(0, 2), Position::new(1, 1)), "e\nt");
        assert_eq!(buf.text_range(Position::new(1, 0), Position::new(2, 0)), "two\n");
        assert_eq!(buf.text_range(Position::new(1, 3), Position::new(1, 3)), "");
    }

    #[test]
    fn test_unicode_columns_are_chars() {
        let mut buf = Buffer::from_lines(&["héllo wörld"]);
        assert_eq!(buf.line_len(0), 11);
        assert_eq!(buf.char_at(Position::new(0, 7)), Some('ö'));
        buf.delete_range(Position::new(0, 1), Position::new(0, 2));
        assert_eq!(buf.line_text(0), "hllo wörld");
    }

    #[test]
    fn test_clamp_position() {
        let buf = Buffer::from_lines(&["abc", ""]);
        assert_eq!(buf.clamp_position(Position::new(0, 10)), Position::new(0, 2));
        assert_eq!(buf.clamp_position(Position::new(5, 3)), Position::new(1, 0));
    }

    #[test]
    fn test_version_tracks_edits() {
        let mut buf = Buffer::new();
        let v = buf.version();
        buf.insert_at(Position::new(0, 0), "x");
        assert!(buf.version() > v);
    }
}
