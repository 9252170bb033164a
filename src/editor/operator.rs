//! Operators and the standalone editing commands built on them

use crate::error::{EngineError, Result};
use crate::input::{Command, Motion, MotionKind, Operator, OperatorTarget};

use super::buffer::BufferAdapter;
use super::insert::{BlockInsert, InsertKind};
use super::position::Position;
use super::register::{is_black_hole_register, RegisterContent, RegisterKind};
use super::text::{self, classify_char};
use super::text_object::find_text_object;
use super::Engine;

/// Largest text, in bytes, a count may multiply a put or an insert into
pub(crate) const MAX_REPEAT_LEN: usize = 1 << 26;

/// Size of something `len` long repeated `count` times
pub(crate) fn repeated_len(len: usize, count: usize) -> Result<usize> {
    len.checked_mul(count)
        .filter(|&total| total <= MAX_REPEAT_LEN)
        .ok_or(EngineError::TextTooLong)
}

pub(crate) fn repeat_text(text: &str, count: usize) -> Result<String> {
    repeated_len(text.len(), count)?;
    Ok(text.repeat(count))
}

/// The text an operator works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Region {
    /// `start..end`, end exclusive
    Chars { start: Position, end: Position },
    Lines { first: usize, last: usize },
    /// Display columns `start_vcol..end_vcol` on each line; `usize::MAX` reaches the line end
    Block {
        first: usize,
        last: usize,
        start_vcol: usize,
        end_vcol: usize,
    },
}

impl Region {
    fn first_line(&self) -> usize {
        match *self {
            Region::Chars { start, .. } => start.line,
            Region::Lines { first, .. } | Region::Block { first, .. } => first,
        }
    }

    fn last_line(&self) -> usize {
        match *self {
            Region::Chars { start, end } => {
                // an end at column 0 only covers the line break before it
                if end.col == 0 && end.line > start.line {
                    end.line - 1
                } else {
                    end.line
                }
            }
            Region::Lines { last, .. } | Region::Block { last, .. } => last,
        }
    }
}

/// Char columns of a block row, `start..end`
pub(crate) fn block_cols(line: &str, start_vcol: usize, end_vcol: usize, tabstop: usize) -> (usize, usize) {
    let len = line.chars().count();
    let start = text::col_at_display(line, start_vcol, tabstop).unwrap_or(len);
    let end = if end_vcol == usize::MAX || end_vcol == 0 {
        len
    } else {
        text::col_at_display(line, end_vcol - 1, tabstop).map_or(len, |c| c + 1)
    };
    (start, end.max(start))
}

fn toggle_case(c: char) -> String {
    if c.is_uppercase() {
        c.to_lowercase().collect()
    } else {
        c.to_uppercase().collect()
    }
}

fn convert_case(op: Operator, text: &str) -> String {
    match op {
        Operator::Lowercase => text.to_lowercase(),
        Operator::Uppercase => text.to_uppercase(),
        _ => text.chars().map(toggle_case).collect(),
    }
}

impl<B: BufferAdapter> Engine<B> {
    /// Run an operator from normal mode
    pub(crate) fn run_operator(&mut self, op: Operator, target: OperatorTarget, command: Command) -> Result<()> {
        let count = command.count_or_one();
        let region = match target {
            OperatorTarget::Motion(motion) => self.motion_region(op, motion, command.count)?,
            OperatorTarget::TextObject(object) => {
                find_text_object(&self.buffer, self.cursor(), object, count).map(|range| {
                    if range.linewise {
                        Region::Lines {
                            first: range.start.line,
                            last: range.end.line,
                        }
                    } else {
                        Region::Chars {
                            start: range.start,
                            end: range.end,
                        }
                    }
                })
            }
            OperatorTarget::Line => {
                let first = self.cursor().line;
                Some(Region::Lines {
                    first,
                    last: (first + count - 1).min(self.buffer.last_line()),
                })
            }
            OperatorTarget::Selection | OperatorTarget::SelectionLines => None,
        };
        let Some(region) = region else {
            self.abort_keys();
            return Ok(());
        };
        // `3>>` shifts three lines once
        self.apply_operator(op, region, command.register, 1)
    }

    /// The region an operator covers for a motion, with Vim's special cases
    fn motion_region(&mut self, op: Operator, motion: Motion, count: Option<usize>) -> Result<Option<Region>> {
        let cursor = self.cursor();
        let n = count.unwrap_or(1).max(1);

        // `cw` on a non-blank works like `ce`
        if op == Operator::Change && matches!(motion, Motion::WordForward | Motion::BigWordForward) {
            let big = motion == Motion::BigWordForward;
            let line = self.buffer.line_text(cursor.line);
            let chars: Vec<char> = line.chars().collect();
            if chars.get(cursor.col).map_or(false, |c| !c.is_whitespace()) {
                let end_motion = if big { Motion::BigWordEnd } else { Motion::WordEnd };
                let at_word_end = chars
                    .get(cursor.col + 1)
                    .map_or(true, |next| classify_char(*next, big) != classify_char(chars[cursor.col], big));
                // on the last char of a word the first count stays put
                let steps = if at_word_end { n - 1 } else { n };
                let mut end = cursor;
                for _ in 0..steps {
                    match crate::input::apply_motion(&self.buffer, end_motion, end, 1) {
                        Some(p) => end = p,
                        None => break,
                    }
                }
                let end_line = self.buffer.line_text(end.line);
                return Ok(Some(Region::Chars {
                    start: cursor,
                    end: Position::new(end.line, text::next_grapheme_col(&end_line, end.col)),
                }));
            }
        }

        let Some(target) = self.resolve_motion(motion, count)? else {
            return Ok(None);
        };
        let (start, end) = Position::ordered(cursor, target);

        match motion.kind() {
            MotionKind::Linewise => Ok(Some(Region::Lines {
                first: start.line,
                last: end.line,
            })),
            MotionKind::Inclusive => {
                let line = self.buffer.line_text(end.line);
                Ok(Some(Region::Chars {
                    start,
                    end: Position::new(end.line, text::next_grapheme_col(&line, end.col)),
                }))
            }
            MotionKind::Exclusive => {
                let mut end = end;
                // `dw` stops at the end of the line the last word is on
                if matches!(motion, Motion::WordForward | Motion::BigWordForward)
                    && end.line > start.line
                    && end.col <= text::first_non_blank(&self.buffer.line_text(end.line))
                {
                    let line = end.line - 1;
                    end = Position::new(line, self.buffer.line_len(line));
                    return Ok(Some(Region::Chars { start, end }));
                }
                if end.col == 0 && end.line > start.line {
                    let line = end.line - 1;
                    let first_non_blank = text::first_non_blank(&self.buffer.line_text(start.line));
                    if start.col <= first_non_blank {
                        return Ok(Some(Region::Lines {
                            first: start.line,
                            last: line,
                        }));
                    }
                    end = Position::new(line, self.buffer.line_len(line));
                }
                Ok(Some(Region::Chars { start, end }))
            }
        }
    }

    /// Apply an operator to a region. `shifts` is how far `>`/`<` move.
    pub(crate) fn apply_operator(
        &mut self,
        op: Operator,
        region: Region,
        register: Option<char>,
        shifts: usize,
    ) -> Result<()> {
        tracing::debug!(target: "engine.dispatch", ?op, ?region, ?register, "operator");
        match op {
            Operator::Yank => self.yank_region(region, register),
            Operator::Delete => self.with_group(|engine| engine.delete_region(region, register)),
            Operator::Change => self.change_region(region, register),
            Operator::Indent | Operator::Dedent => self.with_group(|engine| {
                let (first, last) = (region.first_line(), region.last_line());
                engine.shift_lines(first, last, op == Operator::Indent, shifts);
                Ok(())
            }),
            Operator::Reindent => self.with_group(|engine| {
                engine.reindent_lines(region.first_line(), region.last_line());
                Ok(())
            }),
            Operator::Lowercase | Operator::Uppercase | Operator::ToggleCase => {
                self.with_group(|engine| {
                    engine.case_region(op, region);
                    Ok(())
                })
            }
        }
    }

    /// Text of a region the way a register stores it
    pub(crate) fn region_content(&self, region: Region) -> RegisterContent {
        match region {
            Region::Chars { start, end } => RegisterContent::chars(self.buffer.text_range(start, end)),
            Region::Lines { first, last } => RegisterContent::lines(self.buffer.lines_text(first, last).join("\n")),
            Region::Block {
                first,
                last,
                start_vcol,
                end_vcol,
            } => {
                let rows: Vec<String> = (first..=last)
                    .map(|line| {
                        let text = self.buffer.line_text(line);
                        let (start, end) = block_cols(&text, start_vcol, end_vcol, self.options.tabstop);
                        text::slice_chars(&text, start, end)
                    })
                    .collect();
                RegisterContent::block(&rows)
            }
        }
    }

    fn yank_region(&mut self, region: Region, register: Option<char>) -> Result<()> {
        let content = self.region_content(region);
        self.registers.yank(register, content)?;
        let cursor = self.cursor();
        match region {
            Region::Chars { start, .. } => self.set_cursor_clamped(start),
            Region::Lines { first, last } => {
                if cursor.line != first {
                    self.set_cursor_clamped(Position::new(first, cursor.col));
                }
                let count = last - first + 1;
                if count > 2 {
                    self.set_info(format!("{count} lines yanked"));
                }
            }
            Region::Block { first, start_vcol, .. } => {
                let line = self.buffer.line_text(first);
                let col = text::col_at_display(&line, start_vcol, self.options.tabstop).unwrap_or(0);
                self.set_cursor_clamped(Position::new(first, col));
            }
        }
        Ok(())
    }

    /// Store deleted text in the registers; errors before anything changes
    fn store_delete(&mut self, region: Region, register: Option<char>) -> Result<()> {
        if is_black_hole_register(register) {
            return Ok(());
        }
        let content = self.region_content(region);
        let is_small = matches!(region, Region::Chars { start, end } if start.line == end.line);
        self.registers.delete(register, content, is_small)
    }

    pub(crate) fn delete_region(&mut self, region: Region, register: Option<char>) -> Result<()> {
        self.store_delete(region, register)?;
        match region {
            Region::Chars { start, end } => {
                self.delete_text(start, end);
                self.set_cursor_clamped(start);
            }
            Region::Lines { first, last } => {
                self.delete_lines(first, last);
                self.cursor_to_line(first);
                let count = last - first + 1;
                if count > 2 {
                    self.set_info(format!("{count} fewer lines"));
                }
            }
            Region::Block {
                first,
                last,
                start_vcol,
                end_vcol,
            } => {
                let mut cursor_col = 0;
                for line in first..=last {
                    let text = self.buffer.line_text(line);
                    let (start, end) = block_cols(&text, start_vcol, end_vcol, self.options.tabstop);
                    if line == first {
                        cursor_col = start;
                    }
                    self.delete_text(Position::new(line, start), Position::new(line, end));
                }
                self.set_cursor_clamped(Position::new(first, cursor_col));
            }
        }
        Ok(())
    }

    /// Delete a region and start inserting in its place; the group stays open until Esc
    pub(crate) fn change_region(&mut self, region: Region, register: Option<char>) -> Result<()> {
        self.store_delete(region, register)?;
        let handle = self.undo_stack.begin(self.cursor());
        match region {
            Region::Chars { start, end } => {
                self.delete_text(start, end);
                self.set_cursor(start);
                self.start_insert(InsertKind::Insert, 1, Some(handle), None, None);
            }
            Region::Lines { first, last } => {
                if last > first {
                    self.delete_lines(first + 1, last);
                }
                self.set_line(first, "");
                self.set_cursor(Position::new(first, 0));
                self.start_insert(InsertKind::Insert, 1, Some(handle), None, None);
            }
            Region::Block {
                first,
                last,
                start_vcol,
                end_vcol,
            } => {
                for line in first..=last {
                    let text = self.buffer.line_text(line);
                    let (start, end) = block_cols(&text, start_vcol, end_vcol, self.options.tabstop);
                    self.delete_text(Position::new(line, start), Position::new(line, end));
                }
                let line = self.buffer.line_text(first);
                let col = text::col_at_display(&line, start_vcol, self.options.tabstop)
                    .unwrap_or(line.chars().count());
                self.set_cursor(Position::new(first, col));
                let block = BlockInsert {
                    first,
                    last,
                    vcol: start_vcol,
                    append: false,
                    to_eol: false,
                };
                self.start_insert(InsertKind::Insert, 1, Some(handle), None, Some(block));
            }
        }
        Ok(())
    }

    /// `>` and `<` on whole lines; empty lines are left alone
    pub(crate) fn shift_lines(&mut self, first: usize, last: usize, right: bool, times: usize) {
        let tabstop = self.options.tabstop;
        let shiftwidth = if self.options.shiftwidth == 0 {
            tabstop
        } else {
            self.options.shiftwidth
        };
        let amount = shiftwidth * times.max(1);
        let last = last.min(self.buffer.last_line());
        for line in first..=last {
            let current = self.buffer.line_text(line);
            if current.is_empty() {
                continue;
            }
            let width = text::indent_width(&current, tabstop);
            let new_width = if right {
                width + amount
            } else {
                width.saturating_sub(amount)
            };
            let rest: String = current.chars().skip(text::leading_blanks(&current)).collect();
            let indent = text::make_indent(new_width, tabstop, self.options.expandtab);
            self.set_line(line, &format!("{indent}{rest}"));
        }
        self.cursor_to_line(first);

        let count = last - first + 1;
        if count > 2 {
            let direction = if right { '>' } else { '<' };
            let plural = if times > 1 { "s" } else { "" };
            self.set_info(format!("{count} lines {direction}ed {times} time{plural}"));
        }
    }

    /// `=`: give each line the indent of the nearest non-blank line above the range
    pub(crate) fn reindent_lines(&mut self, first: usize, last: usize) {
        let tabstop = self.options.tabstop;
        let width = (0..first)
            .rev()
            .find(|line| !self.buffer.is_blank_line(*line))
            .map_or(0, |line| text::indent_width(&self.buffer.line_text(line), tabstop));
        let indent = text::make_indent(width, tabstop, self.options.expandtab);
        let last = last.min(self.buffer.last_line());
        for line in first..=last {
            let current = self.buffer.line_text(line);
            if current.trim().is_empty() {
                self.set_line(line, "");
                continue;
            }
            let rest: String = current.chars().skip(text::leading_blanks(&current)).collect();
            self.set_line(line, &format!("{indent}{rest}"));
        }
        self.cursor_to_line(first);
        let count = last - first + 1;
        if count > 2 {
            self.set_info(format!("{count} lines indented "));
        }
    }

    fn case_region(&mut self, op: Operator, region: Region) {
        let tabstop = self.options.tabstop;
        let first = region.first_line();
        let last = region.last_line().min(self.buffer.last_line());
        let mut cursor = None;
        for line in first..=last {
            let current = self.buffer.line_text(line);
            let len = current.chars().count();
            let (start, end) = match region {
                Region::Chars { start, end } => {
                    let from = if line == start.line { start.col } else { 0 };
                    let to = if line == end.line { end.col.min(len) } else { len };
                    (from.min(len), to)
                }
                Region::Lines { .. } => (0, len),
                Region::Block {
                    start_vcol,
                    end_vcol,
                    ..
                } => block_cols(&current, start_vcol, end_vcol, tabstop),
            };
            cursor.get_or_insert(Position::new(line, start));
            if start >= end {
                continue;
            }
            let head = text::slice_chars(&current, 0, start);
            let body = convert_case(op, &text::slice_chars(&current, start, end));
            let tail = text::slice_chars(&current, end, len);
            self.set_line(line, &format!("{head}{body}{tail}"));
        }
        match region {
            Region::Lines { .. } if self.cursor().line == first => {}
            Region::Lines { .. } => self.cursor_to_line(first),
            _ => {
                if let Some(pos) = cursor {
                    self.set_cursor_clamped(pos);
                }
            }
        }
    }

    /// `x`: delete `count` chars under and after the cursor
    pub(crate) fn delete_chars(&mut self, count: usize, register: Option<char>) -> Result<()> {
        let cursor = self.cursor();
        let line = self.buffer.line_text(cursor.line);
        let len = line.chars().count();
        if len == 0 {
            return Ok(());
        }
        let mut end = cursor.col;
        for _ in 0..count {
            if end >= len {
                break;
            }
            end = text::next_grapheme_col(&line, end);
        }
        let region = Region::Chars {
            start: cursor,
            end: Position::new(cursor.line, end),
        };
        self.with_group(|engine| engine.delete_region(region, register))
    }

    /// `r{c}`: replace `count` chars; a line break replaces them with one break
    pub(crate) fn replace_chars(&mut self, c: char, count: usize) -> Result<()> {
        let cursor = self.cursor();
        let line = self.buffer.line_text(cursor.line);
        let len = line.chars().count();
        let mut end = cursor.col;
        for _ in 0..count {
            if end >= len {
                // not enough chars: nothing changes
                self.abort_keys();
                return Ok(());
            }
            end = text::next_grapheme_col(&line, end);
        }
        self.with_group(|engine| {
            let end_pos = Position::new(cursor.line, end);
            engine.delete_text(cursor, end_pos);
            if c == '\n' {
                engine.insert_text(cursor, "\n");
                // the break eats trailing blanks before it
                let next = cursor.line + 1;
                let blanks = text::leading_blanks(&engine.buffer.line_text(next));
                engine.delete_text(Position::new(next, 0), Position::new(next, blanks));
                engine.set_cursor_clamped(Position::new(next, 0));
            } else {
                let replacement: String = std::iter::repeat(c).take(count).collect();
                engine.insert_text(cursor, &replacement);
                engine.set_cursor_clamped(Position::new(cursor.line, cursor.col + count - 1));
            }
            Ok(())
        })
    }

    /// `~`: toggle case of `count` chars and move past them
    pub(crate) fn toggle_case_chars(&mut self, count: usize) -> Result<()> {
        let cursor = self.cursor();
        let line = self.buffer.line_text(cursor.line);
        let len = line.chars().count();
        if len == 0 {
            return Ok(());
        }
        let mut end = cursor.col;
        for _ in 0..count {
            if end >= len {
                break;
            }
            end = text::next_grapheme_col(&line, end);
        }
        self.with_group(|engine| {
            engine.case_region(
                Operator::ToggleCase,
                Region::Chars {
                    start: cursor,
                    end: Position::new(cursor.line, end),
                },
            );
            engine.set_cursor_clamped(Position::new(cursor.line, end));
            Ok(())
        })
    }

    /// `J` / `gJ`: join `count` lines starting at `line` (at least two)
    pub(crate) fn join_lines(&mut self, line: usize, count: usize, spaces: bool) -> Result<()> {
        let last = (line + count.max(2) - 1).min(self.buffer.last_line());
        if last <= line {
            self.abort_keys();
            return Ok(());
        }
        self.with_group(|engine| {
            let mut join_col = 0;
            for _ in line..last {
                let current = engine.buffer.line_text(line);
                let len = current.chars().count();
                let next = engine.buffer.line_text(line + 1);
                let blanks = if spaces { text::leading_blanks(&next) } else { 0 };
                engine.delete_text(Position::new(line, len), Position::new(line + 1, blanks));

                let rest = text::slice_chars(&next, blanks, next.chars().count());
                let needs_space = spaces
                    && !current.is_empty()
                    && !current.ends_with([' ', '\t'])
                    && !rest.is_empty()
                    && !rest.starts_with(')');
                if needs_space {
                    engine.insert_text(Position::new(line, len), " ");
                }
                join_col = len;
            }
            engine.set_cursor_clamped(Position::new(line, join_col));
            Ok(())
        })
    }

    /// `p`, `P`, `gp`, `gP`
    pub(crate) fn put(&mut self, register: Option<char>, before: bool, cursor_after: bool, count: usize) -> Result<()> {
        let name = register.unwrap_or('"');
        if !super::Registers::is_valid_name(name) {
            return Err(EngineError::InvalidRegister(name));
        }
        let content = self.registers.get(name);
        if content.is_empty() {
            return Err(EngineError::EmptyRegister(name));
        }
        repeated_len(content.text.len(), count.max(1))?;
        self.with_group(|engine| engine.put_content(&content, before, cursor_after, count))
    }

    pub(crate) fn put_content(
        &mut self,
        content: &RegisterContent,
        before: bool,
        cursor_after: bool,
        count: usize,
    ) -> Result<()> {
        let count = count.max(1);
        let cursor = self.cursor();
        match content.kind {
            RegisterKind::Linewise => {
                let body = repeat_text(&content.text, count)?;
                let added = body.matches('\n').count();
                let first = if before {
                    self.insert_lines_above(cursor.line, &body)
                } else {
                    self.insert_lines_below(cursor.line, &body)
                };
                if cursor_after {
                    let line = (first + added).min(self.buffer.last_line());
                    self.set_cursor_clamped(Position::new(line, 0));
                } else {
                    self.cursor_to_line(first);
                }
                if added > 2 {
                    self.set_info(format!("{added} more lines"));
                }
            }
            RegisterKind::Charwise => {
                let text = repeat_text(&content.text, count)?;
                let line = self.buffer.line_text(cursor.line);
                let len = line.chars().count();
                let col = if before || len == 0 {
                    cursor.col.min(len)
                } else {
                    text::next_grapheme_col(&line, cursor.col).min(len)
                };
                let at = Position::new(cursor.line, col);
                self.insert_text(at, &text);
                let end = at.advance_over(&text);
                if cursor_after {
                    self.set_cursor(end);
                    self.desired_col = None;
                    if end.col >= self.buffer.line_len(end.line) && end.line < self.buffer.last_line() {
                        self.set_cursor(Position::new(end.line + 1, 0));
                    }
                } else if text.contains('\n') {
                    self.set_cursor_clamped(at);
                } else {
                    self.set_cursor_clamped(Position::new(end.line, end.col.saturating_sub(1)));
                }
            }
            RegisterKind::Blockwise => self.put_block(content, before, cursor_after, count)?,
        }
        Ok(())
    }

    fn put_block(&mut self, content: &RegisterContent, before: bool, cursor_after: bool, count: usize) -> Result<()> {
        let tabstop = self.options.tabstop;
        let cursor = self.cursor();
        let rows = content.rows();
        let width = rows
            .iter()
            .map(|row| text::display_width(row, tabstop))
            .max()
            .unwrap_or(0);
        let widest = rows.iter().map(|row| row.len()).max().unwrap_or(0);
        repeated_len(widest + width, count)?;

        let line = self.buffer.line_text(cursor.line);
        let vcol = if before || line.is_empty() {
            text::display_col(&line, cursor.col, tabstop)
        } else {
            text::display_col(&line, text::next_grapheme_col(&line, cursor.col), tabstop)
        };

        let mut end_col = 0;
        for (i, row) in rows.iter().enumerate() {
            let target = cursor.line + i;
            if target > self.buffer.last_line() {
                let last = self.buffer.last_line();
                self.insert_lines_below(last, "");
            }
            let current = self.buffer.line_text(target);
            let current_width = text::display_width(&current, tabstop);
            let len = current.chars().count();
            if current_width < vcol {
                let pad = " ".repeat(vcol - current_width);
                self.insert_text(Position::new(target, len), &pad);
            }
            let current = self.buffer.line_text(target);
            let col = text::col_at_display(&current, vcol, tabstop).unwrap_or(current.chars().count());
            let has_tail = col < current.chars().count();

            let mut piece = String::new();
            for n in 0..count {
                piece.push_str(row);
                if has_tail || n + 1 < count {
                    let pad = width.saturating_sub(text::display_width(row, tabstop));
                    piece.push_str(&" ".repeat(pad));
                }
            }
            self.insert_text(Position::new(target, col), &piece);
            if i == 0 {
                end_col = col + piece.chars().count();
                if !cursor_after {
                    end_col = col;
                }
            }
        }
        self.set_cursor_clamped(Position::new(cursor.line, end_col));
        Ok(())
    }

    /// Start insert mode for a visual-block `I` / `A`
    pub(crate) fn start_block_insert(&mut self, block: BlockInsert) {
        let tabstop = self.options.tabstop;
        let line = self.buffer.line_text(block.first);
        let len = line.chars().count();
        let col = if block.to_eol {
            len
        } else {
            match text::col_at_display(&line, block.vcol, tabstop) {
                Some(col) => col,
                None if block.append => {
                    let width = text::display_width(&line, tabstop);
                    let handle = self.undo_stack.begin(self.cursor());
                    self.insert_text(Position::new(block.first, len), &" ".repeat(block.vcol - width));
                    self.set_cursor(Position::new(block.first, self.buffer.line_len(block.first)));
                    self.start_insert(InsertKind::Insert, 1, Some(handle), None, Some(block));
                    return;
                }
                None => len,
            }
        };
        self.set_cursor(Position::new(block.first, col));
        self.start_insert(InsertKind::Insert, 1, None, None, Some(block));
    }

}

#[cfg(test)]
mod tests {
    use crate::editor::{Buffer, Engine, Position};
    use crate::io::MemoryFileIo;

    fn engine(text: &str) -> Engine<Buffer> {
        Engine::new(Buffer::from_text(text), Box::new(MemoryFileIo::new()))
    }

    fn run(text: &str, keys: &str) -> Engine<Buffer> {
        let mut e = engine(text);
        e.handle_keys(keys);
        e
    }

    fn lines(e: &Engine<Buffer>) -> Vec<String> {
        e.buffer().lines()
    }

    #[test]
    fn test_dd_and_undo() {
        let mut e = run("one\ntwo\nthree", "jdd");
        assert_eq!(lines(&e), vec!["one", "three"]);
        assert_eq!(e.registers().get('"').text, "two\n");
        assert_eq!(e.registers().get('1').text, "two\n");
        e.handle_keys("u");
        assert_eq!(lines(&e), vec!["one", "two", "three"]);
        assert_eq!(e.cursor().line, 1);
    }

    #[test]
    fn test_dd_last_line_moves_up() {
        let e = run("one\ntwo", "jdd");
        assert_eq!(lines(&e), vec!["one"]);
        assert_eq!(e.cursor(), Position::new(0, 0));
    }

    #[test]
    fn test_dw_stays_on_line() {
        let e = run("foo bar\n  baz", "wdw");
        assert_eq!(lines(&e), vec!["foo ", "  baz"]);
    }

    #[test]
    fn test_cw_acts_like_ce() {
        let e = run("foo bar", "cwxyz<Esc>");
        assert_eq!(lines(&e), vec!["xyz bar"]);
        let e = run("a b", "cwX<Esc>");
        assert_eq!(lines(&e), vec!["X b"]);
    }

    #[test]
    fn test_exclusive_motion_to_column_zero() {
        // `d}` from the start of a paragraph deletes whole lines
        let e = run("a\nb\n\nc", "d}");
        assert_eq!(lines(&e), vec!["", "c"]);
    }

    #[test]
    fn test_inclusive_find() {
        let e = run("abc,def", "dt,");
        assert_eq!(lines(&e), vec![",def"]);
        let e = run("abc,def", "df,");
        assert_eq!(lines(&e), vec!["def"]);
    }

    #[test]
    fn test_small_delete_register() {
        let e = run("one two", "dw");
        assert_eq!(e.registers().get('-').text, "one ");
        assert_eq!(e.registers().get('1').text, "one ");
    }

    #[test]
    fn test_named_register_yank_and_put() {
        let e = run("alpha\nbeta", "\"xyyj\"xp");
        assert_eq!(lines(&e), vec!["alpha", "beta", "alpha"]);
        assert_eq!(e.registers().get('0').text, "");
        assert_eq!(e.cursor(), Position::new(2, 0));
    }

    #[test]
    fn test_append_register() {
        let e = run("one\ntwo", "\"ayyj\"Ayy");
        assert_eq!(e.registers().get('a').text, "one\ntwo\n");
    }

    #[test]
    fn test_black_hole_keeps_unnamed() {
        let e = run("one two", "yw\"_dw");
        assert_eq!(e.registers().get('"').text, "one ");
        assert_eq!(lines(&e), vec!["two"]);
    }

    #[test]
    fn test_charwise_put_with_count() {
        let e = run("ab", "yl3p");
        assert_eq!(lines(&e), vec!["aaaab"]);
        assert_eq!(e.cursor(), Position::new(0, 3));
    }

    #[test]
    fn test_gp_moves_after_text() {
        let e = run("a\nb", "yyjgp");
        assert_eq!(lines(&e), vec!["a", "b", "a"]);
        assert_eq!(e.cursor().line, 2);
    }

    #[test]
    fn test_put_empty_register_fails() {
        let mut e = engine("x");
        let effects = e.handle_keys("\"qp");
        assert_eq!(effects.status.unwrap().text, "Nothing in register q");
    }

    #[test]
    fn test_oversized_put_count_is_refused() {
        let mut e = engine("abc");
        let effects = e.handle_keys("yy99999999999999p");
        assert_eq!(effects.status.unwrap().text, "Resulting text too long");
        assert_eq!(lines(&e), vec!["abc"]);
        assert!(!e.can_undo());

        let effects = e.handle_keys("yl99999999999999999999P");
        assert!(effects.status.unwrap().is_error);
        assert_eq!(lines(&e), vec!["abc"]);
    }

    #[test]
    fn test_oversized_block_put_count_is_refused() {
        let mut e = engine("ab\ncd");
        let effects = e.handle_keys("<C-v>jy99999999999999p");
        assert_eq!(effects.status.unwrap().text, "Resulting text too long");
        assert_eq!(lines(&e), vec!["ab", "cd"]);
        assert!(!e.can_undo());
    }

    #[test]
    fn test_cc_keeps_one_line() {
        let e = run("a\nb\nc", "2ccX<Esc>");
        assert_eq!(lines(&e), vec!["X", "c"]);
    }

    #[test]
    fn test_shift_lines() {
        let mut e = engine("a\n\nb");
        let mut options = e.options().clone();
        options.shiftwidth = 4;
        options.expandtab = true;
        e.set_options(options);
        e.handle_keys("3>>");
        assert_eq!(lines(&e), vec!["    a", "", "    b"]);
        e.handle_keys("<<");
        assert_eq!(lines(&e), vec!["a", "", "    b"]);
    }

    #[test]
    fn test_reindent_uses_line_above() {
        let e = run("\tif x\n  a\n      b", "j=j");
        assert_eq!(lines(&e), vec!["\tif x", "\ta", "\tb"]);
    }

    #[test]
    fn test_case_operators() {
        assert_eq!(lines(&run("hello world", "gUw")), vec!["HELLO world"]);
        assert_eq!(lines(&run("Hello", "g~~")), vec!["hELLO"]);
        assert_eq!(lines(&run("ABC", "guiw")), vec!["abc"]);
        assert_eq!(lines(&run("abc", "2~")), vec!["ABc"]);
    }

    #[test]
    fn test_join() {
        let e = run("a\n  b\n)c", "3J");
        assert_eq!(lines(&e), vec!["a b)c"]);
        let e = run("a\n  b", "gJ");
        assert_eq!(lines(&e), vec!["a  b"]);
        let e = run("", "J");
        assert_eq!(lines(&e), vec![""]);
    }

    #[test]
    fn test_replace_chars() {
        assert_eq!(lines(&run("abcd", "3rx")), vec!["xxxd"]);
        assert_eq!(lines(&run("ab", "3rx")), vec!["ab"]);
        assert_eq!(lines(&run("ab cd", "llr<CR>")), vec!["ab", "cd"]);
    }

    #[test]
    fn test_x_with_count_and_undo() {
        let mut e = run("abcdef", "l3x");
        assert_eq!(lines(&e), vec!["aef"]);
        e.handle_keys("u");
        assert_eq!(lines(&e), vec!["abcdef"]);
    }

    #[test]
    fn test_text_object_delete() {
        assert_eq!(lines(&run("call(a, b)", "f(di(")), vec!["call()"]);
        assert_eq!(lines(&run("say \"hi there\" now", "fhda\"")), vec!["say now"]);
    }

    #[test]
    fn test_failed_operator_keeps_buffer() {
        let e = run("abc", "dfz");
        assert_eq!(lines(&e), vec!["abc"]);
        assert!(!e.can_undo());
    }
}
