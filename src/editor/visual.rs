//! Visual, visual-line and visual-block selections

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::keymap::keys_to_notation;
use crate::error::{EngineError, Result};
use crate::input::{Action, Command, KeyAction, Motion, Operator, OperatorTarget, ParseContext, VisualKind};

use super::buffer::BufferAdapter;
use super::insert::BlockInsert;
use super::operator::{repeat_text, repeated_len, Region};
use super::position::Position;
use super::register::RegisterKind;
use super::text;
use super::text_object::find_text_object;
use super::{Engine, LastChange, Mode, Registers};

/// The last selection, for `gv`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LastVisual {
    mode: Mode,
    anchor: Position,
    cursor: Position,
    to_eol: bool,
}

/// Size of a selection, so `.` can apply a visual change to the same amount of text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VisualExtent {
    mode: Mode,
    /// Lines below the first one
    lines: usize,
    /// Chars on a single-line selection, the end column otherwise; display width for blocks
    cols: usize,
    to_eol: bool,
}

fn mode_for(kind: VisualKind) -> Mode {
    match kind {
        VisualKind::Char => Mode::Visual,
        VisualKind::Line => Mode::VisualLine,
        VisualKind::Block => Mode::VisualBlock,
    }
}

impl<B: BufferAdapter> Engine<B> {
    /// `v`, `V`, `Ctrl-v`: enter, switch, or leave when already in that mode
    pub(crate) fn enter_visual(&mut self, kind: VisualKind) {
        let mode = mode_for(kind);
        if self.mode == mode {
            self.exit_visual();
            return;
        }
        if !self.mode.is_visual() {
            self.visual_anchor = self.cursor();
            self.block_to_eol = false;
        }
        tracing::debug!(target: "engine.dispatch", mode = mode.as_str(), "visual");
        self.mode = mode;
    }

    /// Leave visual mode, remembering the selection in `'<`, `'>` and for `gv`
    pub(crate) fn exit_visual(&mut self) {
        if !self.mode.is_visual() {
            return;
        }
        let anchor = self.visual_anchor;
        let cursor = self.cursor();
        let (start, end) = Position::ordered(anchor, cursor);
        let (start, end) = if self.mode == Mode::VisualLine {
            (
                Position::new(start.line, 0),
                Position::new(end.line, self.buffer.line_len(end.line).saturating_sub(1)),
            )
        } else {
            (start, end)
        };
        self.marks.set(self.buffer_id, '<', start);
        self.marks.set(self.buffer_id, '>', end);
        self.last_visual = Some(LastVisual {
            mode: self.mode,
            anchor,
            cursor,
            to_eol: self.block_to_eol,
        });
        self.mode = Mode::Normal;
        self.set_cursor_clamped(cursor);
    }

    /// `gv`
    pub(crate) fn reselect(&mut self) -> Result<()> {
        let Some(last) = self.last_visual else {
            return Ok(());
        };
        if self.mode.is_visual() {
            self.exit_visual();
        }
        let clamp = |engine: &Self, pos: Position| {
            let line = pos.line.min(engine.buffer.last_line());
            Position::new(line, pos.col.min(engine.buffer.line_len(line)))
        };
        self.visual_anchor = clamp(self, last.anchor);
        let cursor = clamp(self, last.cursor);
        self.mode = last.mode;
        self.block_to_eol = last.to_eol;
        self.set_cursor(cursor);
        Ok(())
    }

    pub(crate) fn visual_key(&mut self, key: KeyEvent) {
        let cancel = key.code == KeyCode::Esc
            || (key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c'));
        if cancel && !self.parser.is_pending() {
            self.exit_visual();
            return;
        }

        self.pending_keys.push(key);
        let context = ParseContext {
            visual: true,
            block: self.mode == Mode::VisualBlock,
            recording: self.macros.is_recording(),
        };
        match self.parser.process_key(key, context) {
            KeyAction::Pending => {}
            KeyAction::Cancelled => self.pending_keys.clear(),
            KeyAction::Invalid(reprocess) => {
                let keys = std::mem::take(&mut self.pending_keys);
                match reprocess {
                    Some(key) => self.visual_key(key),
                    None => self.report_error(EngineError::NotAnEditorCommand(keys_to_notation(&keys))),
                }
            }
            KeyAction::Complete(command) => {
                self.pending_keys.clear();
                if let Err(err) = self.execute_visual(command) {
                    self.report_error(err);
                }
            }
        }
    }

    fn execute_visual(&mut self, command: Command) -> Result<()> {
        tracing::debug!(target: "engine.dispatch", action = ?command.action, mode = self.mode.as_str(), "visual command");
        let count = command.count_or_one();
        match command.action {
            Action::Motion(motion) => {
                if !matches!(motion, Motion::Up | Motion::Down) {
                    self.block_to_eol = motion == Motion::LineEnd;
                }
                self.run_motion(motion, command.count)
            }
            Action::SelectTextObject(object) => {
                let Some(range) = find_text_object(&self.buffer, self.cursor(), object, count) else {
                    self.abort_keys();
                    return Ok(());
                };
                if range.linewise {
                    self.visual_anchor = range.start;
                    self.set_cursor(range.end);
                    if self.mode == Mode::Visual {
                        self.mode = Mode::VisualLine;
                    }
                } else if !range.is_empty() {
                    self.visual_anchor = range.start;
                    let end = if range.end.col > 0 {
                        Position::new(range.end.line, range.end.col - 1)
                    } else {
                        let line = range.end.line.saturating_sub(1);
                        Position::new(line, self.buffer.line_len(line))
                    };
                    self.set_cursor(end);
                }
                Ok(())
            }
            Action::SwapSelectionEnds => {
                let cursor = self.cursor();
                let anchor = self.visual_anchor;
                self.visual_anchor = cursor;
                self.set_cursor(anchor);
                self.desired_col = None;
                Ok(())
            }
            Action::Operator(op, target) => {
                let region = self.selection_region(target == OperatorTarget::SelectionLines);
                let extent = self.visual_extent();
                self.exit_visual();
                let shifts = if matches!(op, Operator::Indent | Operator::Dedent) { count } else { 1 };
                self.apply_operator(op, region, command.register, shifts)?;
                if op.is_change() {
                    self.remember_visual_change(command, extent);
                }
                Ok(())
            }
            Action::ReplaceChar(c) => {
                let region = self.selection_region(false);
                let extent = self.visual_extent();
                self.exit_visual();
                if c == '\n' {
                    return Ok(());
                }
                self.with_group(|engine| {
                    engine.replace_region(region, c);
                    Ok(())
                })?;
                self.remember_visual_change(command, extent);
                Ok(())
            }
            Action::JoinLines { spaces } => {
                let region = self.selection_region(true);
                let extent = self.visual_extent();
                self.exit_visual();
                let Region::Lines { first, last } = region else {
                    return Ok(());
                };
                self.join_lines(first, (last - first + 1).max(2), spaces)?;
                self.remember_visual_change(command, extent);
                Ok(())
            }
            Action::Put { .. } => {
                let region = self.selection_region(false);
                let extent = self.visual_extent();
                self.exit_visual();
                self.put_over_selection(region, command.register, count)?;
                self.remember_visual_change(command, extent);
                Ok(())
            }
            Action::BlockInsert { append } => {
                let region = self.selection_region(false);
                self.exit_visual();
                let Region::Block {
                    first,
                    last,
                    start_vcol,
                    end_vcol,
                } = region
                else {
                    return Ok(());
                };
                let to_eol = append && end_vcol == usize::MAX;
                let block = BlockInsert {
                    first,
                    last,
                    vcol: if append { end_vcol } else { start_vcol },
                    append,
                    to_eol,
                };
                self.start_block_insert(block);
                Ok(())
            }
            Action::EnterVisual(kind) => {
                self.enter_visual(kind);
                Ok(())
            }
            Action::Reselect => self.reselect(),
            Action::EnterCommandLine => {
                self.exit_visual();
                self.open_command_line("'<,'>");
                Ok(())
            }
            Action::EnterSearch(direction) => {
                self.open_search(direction);
                Ok(())
            }
            Action::SetMark(_)
            | Action::JumpBack
            | Action::JumpForward
            | Action::StartRecording(_)
            | Action::StopRecording
            | Action::PlayMacro(_)
            | Action::Ex(_) => self.execute_command(command),
            _ => {
                tracing::trace!(target: "engine.dispatch", action = ?command.action, "ignored in visual mode");
                Ok(())
            }
        }
    }

    /// The selected text as an operator region; `lines` widens it to whole lines
    pub(crate) fn selection_region(&self, lines: bool) -> Region {
        let anchor = self.visual_anchor;
        let cursor = self.cursor();
        let (start, end) = Position::ordered(anchor, cursor);
        match self.mode {
            _ if lines => Region::Lines {
                first: start.line,
                last: end.line,
            },
            Mode::VisualLine => Region::Lines {
                first: start.line,
                last: end.line,
            },
            Mode::VisualBlock => {
                let tabstop = self.options.tabstop;
                let span = |pos: Position| {
                    let line = self.buffer.line_text(pos.line);
                    let start = text::display_col(&line, pos.col, tabstop);
                    let end = if pos.col < line.chars().count() {
                        text::display_col(&line, text::next_grapheme_col(&line, pos.col), tabstop)
                    } else {
                        start + 1
                    };
                    (start, end)
                };
                let (a_start, a_end) = span(anchor);
                let (c_start, c_end) = span(cursor);
                Region::Block {
                    first: start.line,
                    last: end.line,
                    start_vcol: a_start.min(c_start),
                    end_vcol: if self.block_to_eol { usize::MAX } else { a_end.max(c_end) },
                }
            }
            _ => {
                let line = self.buffer.line_text(end.line);
                let len = line.chars().count();
                // a selection ending past the last char takes the line break
                let end = if end.col >= len {
                    if end.line < self.buffer.last_line() {
                        Position::new(end.line + 1, 0)
                    } else {
                        Position::new(end.line, len)
                    }
                } else {
                    Position::new(end.line, text::next_grapheme_col(&line, end.col))
                };
                Region::Chars { start, end }
            }
        }
    }

    fn visual_extent(&self) -> VisualExtent {
        let (start, end) = Position::ordered(self.visual_anchor, self.cursor());
        let lines = end.line - start.line;
        let cols = match self.selection_region(false) {
            Region::Block {
                start_vcol, end_vcol, ..
            } if end_vcol != usize::MAX => end_vcol - start_vcol,
            Region::Block { .. } => 0,
            _ if lines == 0 => end.col - start.col,
            _ => end.col,
        };
        VisualExtent {
            mode: self.mode,
            lines,
            cols,
            to_eol: self.block_to_eol,
        }
    }

    fn remember_visual_change(&mut self, command: Command, extent: VisualExtent) {
        if self.replaying {
            return;
        }
        let change = LastChange {
            command,
            insert_keys: Vec::new(),
            visual: Some(extent),
        };
        if self.mode.is_insert() {
            self.dot_recording = Some(change);
        } else {
            self.last_change = Some(change);
        }
    }

    /// `.` after a visual change: select the same amount of text at the cursor and redo it
    pub(crate) fn repeat_visual(&mut self, command: Command, extent: VisualExtent) -> Result<()> {
        let cursor = self.cursor();
        let last_line = (cursor.line + extent.lines).min(self.buffer.last_line());
        let end = match extent.mode {
            Mode::VisualBlock => {
                let line = self.buffer.line_text(last_line);
                let vcol = text::display_col(&self.buffer.line_text(cursor.line), cursor.col, self.options.tabstop);
                let target = vcol + extent.cols.saturating_sub(1);
                let col = text::col_at_display(&line, target, self.options.tabstop)
                    .unwrap_or(line.chars().count().saturating_sub(1));
                Position::new(last_line, col)
            }
            _ if extent.lines == 0 => Position::new(cursor.line, cursor.col + extent.cols),
            _ => Position::new(last_line, extent.cols),
        };
        let end = Position::new(end.line, end.col.min(self.buffer.line_len(end.line)));
        self.visual_anchor = cursor;
        self.block_to_eol = extent.to_eol;
        self.mode = extent.mode;
        self.set_cursor(end);
        let result = self.execute_visual(command);
        if self.mode.is_visual() {
            self.exit_visual();
        }
        result
    }

    /// `r{c}` over a selection; line breaks are kept
    fn replace_region(&mut self, region: Region, c: char) {
        let tabstop = self.options.tabstop;
        let (first, last) = match region {
            Region::Chars { start, end } => (start.line, end.line),
            Region::Lines { first, last } | Region::Block { first, last, .. } => (first, last),
        };
        let mut cursor = None;
        for line in first..=last.min(self.buffer.last_line()) {
            let current = self.buffer.line_text(line);
            let len = current.chars().count();
            let (from, to) = match region {
                Region::Chars { start, end } => {
                    let from = if line == start.line { start.col } else { 0 };
                    let to = if line == end.line { end.col.min(len) } else { len };
                    (from.min(len), to)
                }
                Region::Lines { .. } => (0, len),
                Region::Block {
                    start_vcol, end_vcol, ..
                } => super::operator::block_cols(&current, start_vcol, end_vcol, tabstop),
            };
            cursor.get_or_insert(Position::new(line, from));
            if from >= to {
                continue;
            }
            let replaced: String = std::iter::repeat(c).take(to - from).collect();
            let new = format!(
                "{}{}{}",
                text::slice_chars(&current, 0, from),
                replaced,
                text::slice_chars(&current, to, len)
            );
            self.set_line(line, &new);
        }
        if let Some(pos) = cursor {
            self.set_cursor_clamped(pos);
        }
    }

    /// `p` in visual mode: the register replaces the selection, which goes to the unnamed register
    fn put_over_selection(&mut self, region: Region, register: Option<char>, count: usize) -> Result<()> {
        let name = register.unwrap_or('"');
        if !Registers::is_valid_name(name) {
            return Err(EngineError::InvalidRegister(name));
        }
        let content = self.registers.get(name);
        if content.is_empty() {
            return Err(EngineError::EmptyRegister(name));
        }
        repeated_len(content.text.len() + 1, count.max(1))?;
        self.with_group(|engine| {
            engine.delete_region(region, None)?;
            match region {
                Region::Lines { first, .. } => {
                    let text = match content.kind {
                        RegisterKind::Linewise => repeat_text(&content.text, count)?,
                        _ => repeat_text(&format!("{}\n", content.text), count)?,
                    };
                    let line = if first > engine.buffer.last_line() {
                        let last = engine.buffer.last_line();
                        engine.insert_lines_below(last, &text)
                    } else {
                        engine.insert_lines_above(first, &text)
                    };
                    engine.cursor_to_line(line);
                }
                Region::Chars { start, .. } if content.kind == RegisterKind::Linewise => {
                    let body = repeat_text(&content.text, count)?;
                    engine.insert_text(start, &format!("\n{body}"));
                    engine.cursor_to_line(start.line + 1);
                }
                Region::Chars { start, .. } => {
                    engine.set_cursor(start);
                    engine.put_content(&content, true, false, count)?;
                }
                Region::Block {
                    first, start_vcol, ..
                } => {
                    let line = engine.buffer.line_text(first);
                    let col = text::col_at_display(&line, start_vcol, engine.options.tabstop)
                        .unwrap_or(line.chars().count());
                    engine.set_cursor(Position::new(first, col));
                    engine.put_content(&content, true, false, count)?;
                }
            }
            Ok(())
        })
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
    fn test_charwise_delete_across_lines() {
        let e = run("abc\ndef", "vjd");
        assert_eq!(lines(&e), vec!["ef"]);
        assert_eq!(e.current_mode(), Mode::Normal);
        assert_eq!(e.registers().get('"').text, "abc\nd");
    }

    #[test]
    fn test_linewise_delete() {
        let e = run("a\nb\nc", "Vjd");
        assert_eq!(lines(&e), vec!["c"]);
        assert!(e.registers().get('"').is_linewise());
    }

    #[test]
    fn test_escape_leaves_buffer_alone() {
        let e = run("abc", "vl<Esc>");
        assert_eq!(lines(&e), vec!["abc"]);
        assert_eq!(e.current_mode(), Mode::Normal);
        assert_eq!(e.marks().get(e.buffer_id(), '>'), Some(Position::new(0, 1)));
    }

    #[test]
    fn test_text_object_selection() {
        assert_eq!(lines(&run("foo bar", "viwU")), vec!["FOO bar"]);
        let e = run("one\ntwo\n\nthree", "vipd");
        assert_eq!(lines(&e), vec!["", "three"]);
    }

    #[test]
    fn test_swap_ends() {
        let e = run("abcd", "lvlohd");
        assert_eq!(lines(&e), vec!["d"]);
    }

    #[test]
    fn test_switch_and_toggle_modes() {
        let mut e = run("abc", "v");
        assert_eq!(e.current_mode(), Mode::Visual);
        e.handle_keys("V");
        assert_eq!(e.current_mode(), Mode::VisualLine);
        e.handle_keys("V");
        assert_eq!(e.current_mode(), Mode::Normal);
    }

    #[test]
    fn test_block_delete() {
        let e = run("abc\ndef\nghi", "l<C-v>jjd");
        assert_eq!(lines(&e), vec!["ac", "df", "gi"]);
        assert_eq!(e.registers().get('"').text, "b\ne\nh");
    }

    #[test]
    fn test_block_insert_and_append() {
        assert_eq!(lines(&run("a\nb", "<C-v>jI# <Esc>")), vec!["# a", "# b"]);
        assert_eq!(lines(&run("ab\nabcd", "<C-v>j$A!<Esc>")), vec!["ab!", "abcd!"]);
        assert_eq!(lines(&run("abc\nabc", "l<C-v>jcX<Esc>")), vec!["aXc", "aXc"]);
    }

    #[test]
    fn test_block_insert_skips_short_lines() {
        let e = run("abcd\na\nabcd", "ll<C-v>jjIX<Esc>");
        assert_eq!(lines(&e), vec!["abXcd", "a", "abXcd"]);
    }

    #[test]
    fn test_reselect() {
        let e = run("abcdef", "vly0gvd");
        assert_eq!(lines(&e), vec!["cdef"]);
    }

    #[test]
    fn test_visual_shift_with_count() {
        let mut e = Engine::new(Buffer::from_text("a\nb"), Box::new(MemoryFileIo::new()));
        let mut options = e.options().clone();
        options.shiftwidth = 2;
        options.expandtab = true;
        e.set_options(options);
        e.handle_keys("Vj2>");
        assert_eq!(lines(&e), vec!["    a", "    b"]);
    }

    #[test]
    fn test_put_replaces_selection() {
        let e = run("foo bar", "yiwwviwp");
        assert_eq!(lines(&e), vec!["foo foo"]);
        assert_eq!(e.registers().get('"').text, "bar");
    }

    #[test]
    fn test_oversized_put_over_selection_keeps_selection_text() {
        let mut e = run("foo bar", "yiww");
        let effects = e.handle_keys("viw99999999999999p");
        assert_eq!(effects.status.unwrap().text, "Resulting text too long");
        assert_eq!(lines(&e), vec!["foo bar"]);
        assert_eq!(e.registers().get('"').text, "foo");
    }

    #[test]
    fn test_replace_selection() {
        let e = run("abc\ndef", "vjr-");
        assert_eq!(lines(&e), vec!["---", "-ef"]);
    }

    #[test]
    fn test_dot_repeats_same_amount() {
        let mut e = run("abcdefgh", "vld");
        assert_eq!(lines(&e), vec!["cdefgh"]);
        e.handle_keys(".");
        assert_eq!(lines(&e), vec!["efgh"]);
    }

    #[test]
    fn test_colon_prefills_visual_range() {
        let mut e = run("a\nb\nc", "Vj:");
        assert_eq!(e.command_line(), Some((':', "'<,'>", 5)));
        e.handle_keys("d<CR>");
        assert_eq!(lines(&e), vec!["c"]);
    }

    #[test]
    fn test_visual_join() {
        let e = run("a\nb\nc", "VjjJ");
        assert_eq!(lines(&e), vec!["a b c"]);
    }
}
