//! Insert and Replace mode

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::error::{EngineError, Result};
use crate::input::InsertPosition;

use super::buffer::BufferAdapter;
use super::operator::repeat_text;
use super::position::Position;
use super::register::Registers;
use super::text::{self, classify_char, CharClass};
use super::undo::GroupHandle;
use super::{Engine, Mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertKind {
    Insert,
    /// Typed chars overwrite
    Replace,
}

/// Text typed on the first line of a visual block is copied to the others
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockInsert {
    pub first: usize,
    pub last: usize,
    /// Display column the text goes in at
    pub vcol: usize,
    /// `A`: short lines are padded instead of skipped
    pub append: bool,
    /// The block was extended with `$`
    pub to_eol: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct InsertSession {
    kind: InsertKind,
    /// Opened lazily on the first edit, except for change operators and `o`/`O`
    group: Option<GroupHandle>,
    count: usize,
    /// Text typed since the session started or the cursor was last moved by a key
    typed: String,
    /// Where typing began
    start: Position,
    /// `o` (false) or `O` (true)
    open_line: Option<bool>,
    block: Option<BlockInsert>,
    /// Chars overwritten in Replace mode; `None` where a char was appended
    replaced: Vec<Option<char>>,
    /// `Ctrl-r` waits for a register name
    awaiting_register: bool,
}

impl InsertSession {
    fn new(kind: InsertKind, count: usize, start: Position) -> Self {
        Self {
            kind,
            group: None,
            count: count.max(1),
            typed: String::new(),
            start,
            open_line: None,
            block: None,
            replaced: Vec::new(),
            awaiting_register: false,
        }
    }

    /// The next key is a register name, not text
    pub(crate) fn awaits_register(&self) -> bool {
        self.awaiting_register
    }

    pub(crate) fn has_group(&self) -> bool {
        self.group.is_some()
    }
}

impl<B: BufferAdapter> Engine<B> {
    /// `i a I A o O`
    pub(crate) fn begin_insert(&mut self, position: InsertPosition, count: usize) -> Result<()> {
        let cursor = self.cursor();
        let line = self.buffer.line_text(cursor.line);
        let len = line.chars().count();
        match position {
            InsertPosition::AtCursor => {
                self.set_cursor(Position::new(cursor.line, cursor.col.min(len)));
            }
            InsertPosition::AfterCursor => {
                let col = if len == 0 { 0 } else { text::next_grapheme_col(&line, cursor.col) };
                self.set_cursor(Position::new(cursor.line, col.min(len)));
            }
            InsertPosition::LineStart => {
                self.set_cursor(Position::new(cursor.line, text::first_non_blank(&line)));
            }
            InsertPosition::LineEnd => self.set_cursor(Position::new(cursor.line, len)),
            InsertPosition::NewLineBelow | InsertPosition::NewLineAbove => {
                let above = position == InsertPosition::NewLineAbove;
                let handle = self.undo_stack.begin(cursor);
                let line = if above {
                    self.insert_lines_above(cursor.line, "")
                } else {
                    self.insert_lines_below(cursor.line, "")
                };
                self.set_cursor(Position::new(line, 0));
                self.start_insert(InsertKind::Insert, count, Some(handle), Some(above), None);
                return Ok(());
            }
        }
        self.start_insert(InsertKind::Insert, count, None, None, None);
        Ok(())
    }

    /// `R`
    pub(crate) fn begin_replace(&mut self, count: usize) -> Result<()> {
        self.start_insert(InsertKind::Replace, count, None, None, None);
        Ok(())
    }

    pub(crate) fn start_insert(
        &mut self,
        kind: InsertKind,
        count: usize,
        group: Option<GroupHandle>,
        open_line: Option<bool>,
        block: Option<BlockInsert>,
    ) {
        let mut session = InsertSession::new(kind, count, self.cursor());
        session.group = group;
        session.open_line = open_line;
        session.block = block;
        tracing::debug!(target: "engine.dispatch", ?kind, count, "insert session");
        self.insert = Some(session);
        self.desired_col = None;
        self.mode = match kind {
            InsertKind::Insert => Mode::Insert,
            InsertKind::Replace => Mode::Replace,
        };
    }

    pub(crate) fn insert_key(&mut self, key: KeyEvent) {
        self.record_insert_key(key);
        let Some(session) = self.insert.as_mut() else {
            self.mode = Mode::Normal;
            return;
        };

        if session.awaiting_register {
            session.awaiting_register = false;
            if let (KeyModifiers::NONE, KeyCode::Char(name)) = (key.modifiers, key.code) {
                self.insert_register(name);
            }
            return;
        }

        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c' | '[')) => self.finish_insert(),
            (_, KeyCode::Enter) | (KeyModifiers::CONTROL, KeyCode::Char('m' | 'j')) => self.type_text("\n"),
            (_, KeyCode::Backspace) | (KeyModifiers::CONTROL, KeyCode::Char('h')) => self.insert_backspace(),
            (_, KeyCode::Delete) => self.insert_delete(),
            (_, KeyCode::Tab) | (KeyModifiers::CONTROL, KeyCode::Char('i')) => self.insert_tab(),
            (KeyModifiers::CONTROL, KeyCode::Char('w')) => self.delete_word_before(),
            (KeyModifiers::CONTROL, KeyCode::Char('u')) => self.delete_to_line_start(),
            (KeyModifiers::CONTROL, KeyCode::Char('r')) => {
                if let Some(session) = self.insert.as_mut() {
                    session.awaiting_register = true;
                }
            }
            (_, KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down | KeyCode::Home | KeyCode::End) => {
                self.insert_move(key.code)
            }
            (KeyModifiers::NONE, KeyCode::Char(c)) => {
                let mut buf = [0; 4];
                self.type_text(c.encode_utf8(&mut buf));
            }
            _ => tracing::trace!(target: "engine.dispatch", ?key, "ignored in insert mode"),
        }
    }

    fn session_kind(&self) -> InsertKind {
        self.insert.as_ref().map_or(InsertKind::Insert, |s| s.kind)
    }

    fn ensure_insert_group(&mut self) {
        let cursor = self.cursor();
        if let Some(session) = self.insert.as_mut() {
            if session.group.is_none() {
                session.group = Some(self.undo_stack.begin(cursor));
            }
        }
    }

    /// Commit the session's group, then the macro groups waiting on it
    fn commit_insert_group(&mut self) {
        let cursor = self.cursor();
        if let Some(handle) = self.insert.as_mut().and_then(|s| s.group.take()) {
            self.undo_stack.commit(handle, cursor);
        }
        for handle in std::mem::take(&mut self.deferred_groups) {
            self.undo_stack.commit(handle, cursor);
        }
    }

    /// Type text at the cursor as if entered key by key
    fn type_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.put_typed(text);
        if let Some(session) = self.insert.as_mut() {
            session.typed.push_str(text);
        }
    }

    /// Insert or overwrite text at the cursor and move past it
    fn put_typed(&mut self, text: &str) {
        self.ensure_insert_group();
        match self.session_kind() {
            InsertKind::Insert => {
                let cursor = self.cursor();
                self.insert_text(cursor, text);
                self.set_cursor(cursor.advance_over(text));
            }
            InsertKind::Replace => {
                for c in text.chars() {
                    let cursor = self.cursor();
                    let len = self.buffer.line_len(cursor.line);
                    let old = if c != '\n' && cursor.col < len {
                        self.buffer.char_at(cursor)
                    } else {
                        None
                    };
                    if old.is_some() {
                        self.delete_text(cursor, Position::new(cursor.line, cursor.col + 1));
                    }
                    let mut buf = [0; 4];
                    let s = c.encode_utf8(&mut buf);
                    self.insert_text(cursor, s);
                    self.set_cursor(cursor.advance_over(s));
                    if let Some(session) = self.insert.as_mut() {
                        session.replaced.push(old);
                    }
                }
            }
        }
    }

    /// Drop the last `n` chars of what was typed, after the buffer lost them
    fn forget_typed(&mut self, n: usize) {
        if let Some(session) = self.insert.as_mut() {
            for _ in 0..n {
                if session.typed.pop().is_none() {
                    break;
                }
            }
        }
    }

    fn insert_backspace(&mut self) {
        let cursor = self.cursor();
        if self.session_kind() == InsertKind::Replace {
            let replaced = self.insert.as_mut().and_then(|s| s.replaced.pop());
            match replaced {
                Some(Some(old)) if cursor.col > 0 => {
                    let at = Position::new(cursor.line, cursor.col - 1);
                    self.delete_text(at, cursor);
                    let mut buf = [0; 4];
                    self.insert_text(at, old.encode_utf8(&mut buf));
                    self.set_cursor(at);
                    self.forget_typed(1);
                }
                Some(_) => {
                    self.delete_before_cursor();
                    self.forget_typed(1);
                }
                // nothing typed here: only move
                None => {
                    if cursor.col > 0 {
                        let line = self.buffer.line_text(cursor.line);
                        self.set_cursor(Position::new(cursor.line, text::prev_grapheme_col(&line, cursor.col)));
                    }
                }
            }
            return;
        }
        let removed = self.delete_before_cursor();
        self.forget_typed(removed);
    }

    /// Delete the grapheme before the cursor, or the line break at column 0
    fn delete_before_cursor(&mut self) -> usize {
        let cursor = self.cursor();
        if cursor.col == 0 {
            if cursor.line == 0 {
                return 0;
            }
            self.ensure_insert_group();
            let prev = cursor.line - 1;
            let at = Position::new(prev, self.buffer.line_len(prev));
            self.delete_text(at, cursor);
            self.set_cursor(at);
            return 1;
        }
        self.ensure_insert_group();
        let line = self.buffer.line_text(cursor.line);
        let start = text::prev_grapheme_col(&line, cursor.col);
        let at = Position::new(cursor.line, start);
        self.delete_text(at, cursor);
        self.set_cursor(at);
        cursor.col - start
    }

    fn insert_delete(&mut self) {
        let cursor = self.cursor();
        let line = self.buffer.line_text(cursor.line);
        let len = line.chars().count();
        let end = if cursor.col < len {
            Position::new(cursor.line, text::next_grapheme_col(&line, cursor.col))
        } else if cursor.line < self.buffer.last_line() {
            Position::new(cursor.line + 1, 0)
        } else {
            return;
        };
        self.ensure_insert_group();
        self.delete_text(cursor, end);
        self.set_cursor(cursor);
    }

    fn insert_tab(&mut self) {
        if !self.options.expandtab {
            self.type_text("\t");
            return;
        }
        let cursor = self.cursor();
        let vcol = text::display_col(&self.buffer.line_text(cursor.line), cursor.col, self.options.tabstop);
        let ts = self.options.tabstop.max(1);
        let spaces = " ".repeat(ts - vcol % ts);
        self.type_text(&spaces);
    }

    /// `Ctrl-w`: blanks before the cursor, then one word or punctuation run
    fn delete_word_before(&mut self) {
        let cursor = self.cursor();
        if cursor.col == 0 {
            self.insert_backspace();
            return;
        }
        let chars: Vec<char> = self.buffer.line_text(cursor.line).chars().collect();
        let mut start = cursor.col.min(chars.len());
        while start > 0 && chars[start - 1].is_whitespace() {
            start -= 1;
        }
        if start > 0 {
            let class = classify_char(chars[start - 1], false);
            while start > 0 && classify_char(chars[start - 1], false) == class && class != CharClass::Blank {
                start -= 1;
            }
        }
        self.ensure_insert_group();
        let at = Position::new(cursor.line, start);
        self.delete_text(at, cursor);
        self.set_cursor(at);
        self.forget_typed(cursor.col - start);
    }

    /// `Ctrl-u`
    fn delete_to_line_start(&mut self) {
        let cursor = self.cursor();
        if cursor.col == 0 {
            self.insert_backspace();
            return;
        }
        self.ensure_insert_group();
        let at = Position::new(cursor.line, 0);
        self.delete_text(at, cursor);
        self.set_cursor(at);
        self.forget_typed(cursor.col);
    }

    /// `Ctrl-r {reg}`
    fn insert_register(&mut self, name: char) {
        if !Registers::is_valid_name(name) {
            self.set_error(EngineError::InvalidRegister(name));
            return;
        }
        let content = self.registers.get(name);
        self.type_text(&content.text);
    }

    /// Cursor keys start a new undo step and drop the count
    fn insert_move(&mut self, code: KeyCode) {
        let cursor = self.cursor();
        let line = self.buffer.line_text(cursor.line);
        let len = line.chars().count();
        let target = match code {
            KeyCode::Left if cursor.col > 0 => Position::new(cursor.line, text::prev_grapheme_col(&line, cursor.col)),
            KeyCode::Right if cursor.col < len => {
                Position::new(cursor.line, text::next_grapheme_col(&line, cursor.col))
            }
            KeyCode::Up if cursor.line > 0 => {
                Position::new(cursor.line - 1, cursor.col.min(self.buffer.line_len(cursor.line - 1)))
            }
            KeyCode::Down if cursor.line < self.buffer.last_line() => {
                Position::new(cursor.line + 1, cursor.col.min(self.buffer.line_len(cursor.line + 1)))
            }
            KeyCode::Home => Position::new(cursor.line, 0),
            KeyCode::End => Position::new(cursor.line, len),
            _ => return,
        };
        self.commit_insert_group();
        self.set_cursor(target);
        if let Some(session) = self.insert.as_mut() {
            session.typed.clear();
            session.count = 1;
            session.open_line = None;
            session.block = None;
            session.replaced.clear();
            session.start = target;
        }
    }

    /// Leave insert or replace mode: apply the count, fill a block, commit
    pub(crate) fn finish_insert(&mut self) {
        let Some(session) = self.insert.clone() else {
            self.mode = Mode::Normal;
            return;
        };
        let typed = session.typed.clone();

        if session.count > 1 && !typed.is_empty() {
            if let Err(err) = self.repeat_insert(&typed, session.count - 1, session.open_line.is_some()) {
                self.set_error(err);
            }
        }

        let mut cursor_to = None;
        if let Some(block) = session.block {
            if !typed.is_empty() && !typed.contains('\n') {
                self.fill_block(block, &typed);
                cursor_to = Some(session.start);
            }
        }

        self.registers.set_last_inserted(typed);
        self.commit_insert_group();
        self.insert = None;

        let cursor = cursor_to.unwrap_or_else(|| self.cursor());
        let line = self.buffer.line_text(cursor.line);
        let col = if cursor.col > 0 && cursor_to.is_none() {
            text::prev_grapheme_col(&line, cursor.col)
        } else {
            cursor.col
        };
        self.mode = Mode::Normal;
        self.set_cursor_clamped(Position::new(cursor.line, col));
        self.finish_dot_recording();
    }

    /// The extra copies of a counted insert, each on its own line after `o` or `O`
    fn repeat_insert(&mut self, typed: &str, times: usize, open_line: bool) -> Result<()> {
        let piece = if open_line {
            format!("\n{typed}")
        } else {
            typed.to_string()
        };
        if let Some(limit) = self.options.line_limit {
            let lines = piece.matches('\n').count().saturating_mul(times);
            if lines > limit {
                return Err(EngineError::LineLimit { lines, limit });
            }
        }
        let text = repeat_text(&piece, times)?;
        if open_line {
            let line = self.cursor().line;
            self.set_cursor(Position::new(line, self.buffer.line_len(line)));
        }
        self.put_typed(&text);
        Ok(())
    }

    /// Copy the text typed on the first block line to the others
    fn fill_block(&mut self, block: BlockInsert, typed: &str) {
        let tabstop = self.options.tabstop;
        self.ensure_insert_group();
        for line in block.first + 1..=block.last.min(self.buffer.last_line()) {
            let current = self.buffer.line_text(line);
            let len = current.chars().count();
            let col = if block.to_eol {
                len
            } else {
                match text::col_at_display(&current, block.vcol, tabstop) {
                    Some(col) => col,
                    None if block.append => {
                        let width = text::display_width(&current, tabstop);
                        let pad = " ".repeat(block.vcol.saturating_sub(width));
                        self.insert_text(Position::new(line, len), &pad);
                        len + pad.chars().count()
                    }
                    // short lines are left alone by `I`
                    None => continue,
                }
            };
            self.insert_text(Position::new(line, col), typed);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::editor::{Buffer, Engine, Mode, Position};
    use crate::io::MemoryFileIo;

    fn run(text: &str, keys: &str) -> Engine<Buffer> {
        let mut e = Engine::new(Buffer::from_text(text), Box::new(MemoryFileIo::new()));
        e.handle_keys(keys);
        e
    }

    fn lines(e: &Engine<Buffer>) -> Vec<String> {
        e.buffer().lines()
    }

    #[test]
    fn test_insert_and_escape_moves_left() {
        let e = run("world", "ihello <Esc>");
        assert_eq!(lines(&e), vec!["hello world"]);
        assert_eq!(e.cursor(), Position::new(0, 5));
        assert_eq!(e.current_mode(), Mode::Normal);
        assert_eq!(e.registers().get('.').text, "hello ");
    }

    #[test]
    fn test_escape_at_column_zero_stays() {
        let e = run("abc", "i<Esc>");
        assert_eq!(e.cursor(), Position::new(0, 0));
    }

    #[test]
    fn test_enter_splits_and_backspace_joins() {
        let mut e = run("abcd", "lli<CR>");
        assert_eq!(lines(&e), vec!["ab", "cd"]);
        assert_eq!(e.cursor(), Position::new(1, 0));
        e.handle_keys("<BS><Esc>");
        assert_eq!(lines(&e), vec!["abcd"]);
    }

    #[test]
    fn test_insert_is_one_undo_step() {
        let mut e = run("x", "aone<CR>two<Esc>");
        assert_eq!(lines(&e), vec!["xone", "two"]);
        e.handle_keys("u");
        assert_eq!(lines(&e), vec!["x"]);
    }

    #[test]
    fn test_counted_insert_repeats() {
        assert_eq!(lines(&run("", "3ia<Esc>")), vec!["aaa"]);
        assert_eq!(lines(&run("x", "2oab<Esc>")), vec!["x", "ab", "ab"]);
        assert_eq!(lines(&run("x", "2Oab<Esc>")), vec!["ab", "ab", "x"]);
        assert_eq!(lines(&run("x", "3Rab<Esc>")), vec!["ababab"]);
    }

    #[test]
    fn test_huge_insert_count_keeps_one_copy() {
        let mut e = run("abc", "");
        let effects = e.handle_keys("99999999999999ix<Esc>");
        assert_eq!(lines(&e), vec!["xabc"]);
        assert_eq!(e.current_mode(), Mode::Normal);
        assert_eq!(effects.status.unwrap().text, "Resulting text too long");
        e.handle_keys("u");
        assert_eq!(lines(&e), vec!["abc"]);
    }

    #[test]
    fn test_counted_open_line_honours_line_limit() {
        let mut e = run("x", "");
        e.execute_ex("set line_limit=3").unwrap();
        let effects = e.handle_keys("5oab<Esc>");
        assert_eq!(lines(&e), vec!["x", "ab"]);
        assert_eq!(effects.status.unwrap().text, "Range of 4 lines exceeds line_limit of 3");
        e.handle_keys("3oab<Esc>");
        assert_eq!(lines(&e), vec!["x", "ab", "ab", "ab", "ab"]);
    }

    #[test]
    fn test_open_line_undo() {
        let mut e = run("a\nb", "o<Esc>");
        assert_eq!(lines(&e), vec!["a", "", "b"]);
        e.handle_keys("u");
        assert_eq!(lines(&e), vec!["a", "b"]);
    }

    #[test]
    fn test_ctrl_w_and_ctrl_u() {
        assert_eq!(lines(&run("", "ifoo bar<C-w>baz<Esc>")), vec!["foo baz"]);
        assert_eq!(lines(&run("keep", "Afoo<C-u>x<Esc>")), vec!["x"]);
    }

    #[test]
    fn test_tab_with_expandtab() {
        let mut e = Engine::new(Buffer::from_text("ab"), Box::new(MemoryFileIo::new()));
        let mut options = e.options().clone();
        options.expandtab = true;
        options.tabstop = 4;
        e.set_options(options);
        e.handle_keys("A<Tab>x<Esc>");
        assert_eq!(lines(&e), vec!["ab  x"]);
    }

    #[test]
    fn test_ctrl_r_inserts_register() {
        let e = run("word", "yiwA <C-r>\"<Esc>");
        assert_eq!(lines(&e), vec!["word word"]);
    }

    #[test]
    fn test_replace_mode_and_backspace() {
        let e = run("abcd", "Rxyz<Esc>");
        assert_eq!(lines(&e), vec!["xyzd"]);
        let e = run("ab", "Rwxyz<Esc>");
        assert_eq!(lines(&e), vec!["wxyz"]);
        let e = run("abcd", "Rxy<BS><BS>z<Esc>");
        assert_eq!(lines(&e), vec!["zbcd"]);
    }

    #[test]
    fn test_arrow_starts_new_undo_step() {
        let mut e = run("", "iab<Left>c<Esc>");
        assert_eq!(lines(&e), vec!["acb"]);
        e.handle_keys("u");
        assert_eq!(lines(&e), vec!["ab"]);
    }

    #[test]
    fn test_change_word_dot_repeat() {
        let mut e = run("foo foo foo", "cwbar<Esc>");
        e.handle_keys("w.");
        assert_eq!(lines(&e), vec!["bar bar foo"]);
    }
}
