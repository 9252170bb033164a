//! Ex command line: `:` commands, their ranges, and the `/` `?` prompts.

use std::path::PathBuf;

use crossterm::event::KeyEvent;

use super::buffer::BufferAdapter;
use super::marks::Marks;
use super::operator::Region;
use super::position::Position;
use super::register::{RegisterContent, RegisterKind};
use super::search::SearchDirection;
use super::{Engine, Mode, QuitKind, SearchPrompt};
use crate::commands::substitute::{expand_replacement, expand_tilde, parse_substitute, SubstituteFlags};
use crate::commands::{
    parse_address_arg, parse_ex, parse_global, register_and_count, AddressContext, ExCommand, LineEdit, LineRange,
};
use crate::config::keymap::{parse_key_sequence, MapMode};
use crate::error::{EngineError, Result};

/// What an ex command asks of its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExOutcome {
    Done,
    /// Informational text for the status line
    Message(String),
    Quit(QuitKind),
}

/// Pattern, replacement and flags of the last `:s`, for `:&`, `:&&` and `&`
#[derive(Debug, Clone)]
pub(crate) struct LastSubstitute {
    pattern: String,
    replacement: String,
    flags: SubstituteFlags,
}

/// Range used when none is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultRange {
    None,
    Current,
    Whole,
}

fn default_range(name: &str) -> DefaultRange {
    match name {
        "global" | "vglobal" | "write" | "wq" | "xit" | "exit" | "update" => DefaultRange::Whole,
        "" | "substitute" | "&" | "&&" | "delete" | "yank" | "put" | "print" | "join" | "move" | "copy" | "t"
        | "<" | ">" | "read" | "k" | "mark" => DefaultRange::Current,
        _ => DefaultRange::None,
    }
}

/// Commands whose range `line_limit` caps
fn edits_range(name: &str) -> bool {
    matches!(
        name,
        "substitute"
            | "&"
            | "&&"
            | "global"
            | "vglobal"
            | "delete"
            | "move"
            | "copy"
            | "t"
            | "join"
            | "<"
            | ">"
            | "normal"
    )
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Register text as `:registers` shows it
fn escape_register(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        match c {
            '\n' => out.push_str("^J"),
            '\t' => out.push_str("^I"),
            c if c.is_ascii_control() => {
                out.push('^');
                out.push(char::from(((c as u8) & 0x1f) | 0x40));
            }
            c => out.push(c),
        }
    }
    out
}

impl<B: BufferAdapter> AddressContext for Engine<B> {
    fn current_line(&self) -> usize {
        self.cursor().line + 1
    }

    fn line_count(&self) -> usize {
        self.buffer.line_count()
    }

    fn mark_line(&self, mark: char) -> Result<usize> {
        Ok(self.mark_position(mark)?.line + 1)
    }

    fn search_line(&self, pattern: &str, forward: bool, from: usize) -> Result<usize> {
        let pattern = self.search.resolve_pattern(pattern)?;
        let compiled = self.search.compile(pattern)?;
        let count = self.buffer.line_count() as isize;
        let start = from as isize - 1;
        let step = if forward { 1 } else { -1 };
        for i in 1..=count {
            let raw = start + step * i;
            if !self.options.wrapscan && !(0..count).contains(&raw) {
                break;
            }
            let line = raw.rem_euclid(count) as usize;
            if compiled.is_match(&self.buffer.line_text(line)) {
                return Ok(line + 1);
            }
        }
        Err(EngineError::PatternNotFound(pattern.to_string()))
    }

    fn last_pattern(&self) -> Option<String> {
        self.search.last_pattern().map(str::to_string)
    }
}

impl<B: BufferAdapter> Engine<B> {
    // ------------------------------------------------------------------
    // Prompts
    // ------------------------------------------------------------------

    pub(crate) fn open_command_line(&mut self, prefill: &str) {
        self.cmdline.set_input(prefill);
        self.mode = Mode::ExCommandLine;
    }

    pub(crate) fn command_line_key(&mut self, key: KeyEvent) {
        match self.cmdline.handle_key(key) {
            LineEdit::Edited | LineEdit::Moved => {}
            LineEdit::Cancel => {
                self.cmdline.clear();
                self.mode = Mode::Normal;
            }
            LineEdit::Submit => {
                let line = self.cmdline.submit();
                self.mode = Mode::Normal;
                if line.trim().is_empty() {
                    return;
                }
                self.registers.set_last_command(line.as_str());
                match self.execute_ex(&line) {
                    Ok(outcome) => self.report_outcome(outcome),
                    Err(err) => self.report_error(err),
                }
            }
        }
    }

    pub(crate) fn open_search(&mut self, direction: SearchDirection) {
        let return_mode = if self.mode.is_visual() {
            self.mode
        } else {
            Mode::Normal
        };
        self.search_prompt = Some(SearchPrompt {
            direction,
            origin: self.cursor(),
            return_mode,
        });
        self.search_line.clear();
        self.mode = Mode::SearchLine;
    }

    pub(crate) fn search_line_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.search_prompt else {
            self.mode = Mode::Normal;
            return;
        };
        match self.search_line.handle_key(key) {
            LineEdit::Moved => {}
            LineEdit::Edited => self.preview_search(prompt),
            LineEdit::Cancel => {
                self.search_line.clear();
                self.search_prompt = None;
                self.mode = prompt.return_mode;
                self.set_cursor(prompt.origin);
            }
            LineEdit::Submit => {
                let typed = self.search_line.submit();
                self.search_prompt = None;
                self.mode = prompt.return_mode;
                self.set_cursor(prompt.origin);
                if let Err(err) = self.submit_search(&typed, prompt) {
                    self.report_error(err);
                }
            }
        }
    }

    /// `incsearch`: show where the typed pattern would land
    fn preview_search(&mut self, prompt: SearchPrompt) {
        if !self.options.incsearch {
            return;
        }
        let pattern = self.search_line.input().to_string();
        let found = if pattern.is_empty() {
            None
        } else {
            self.search
                .search(&self.buffer, &pattern, prompt.direction, prompt.origin, self.options.wrapscan)
                .ok()
        };
        match found {
            Some(outcome) => self.set_cursor(outcome.pos),
            None => self.set_cursor(prompt.origin),
        }
    }

    fn submit_search(&mut self, typed: &str, prompt: SearchPrompt) -> Result<()> {
        let typed = strip_closing_delimiter(typed, prompt.direction.prompt());
        let pattern = self.search.resolve_pattern(typed)?.to_string();
        // compile first so a bad pattern never becomes the last one
        self.search.compile(&pattern)?;
        self.search.set_last(&pattern, prompt.direction);
        self.registers.set_last_search(pattern.as_str());
        let target = self.search_from(&pattern, prompt.direction, prompt.origin, 1)?;
        self.record_jump(prompt.origin);
        self.set_cursor_clamped(target);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Parse and run one ex command line. Edits it makes form one undo step
    /// and are rolled back when it fails.
    pub fn execute_ex(&mut self, line: &str) -> Result<ExOutcome> {
        let command = parse_ex(line)?;
        tracing::debug!(target: "engine.ex", name = command.name, bang = command.bang, args = %command.args, "ex command");

        let range = match command.range.as_ref() {
            Some(spec) => Some(spec.resolve(&*self)?),
            None => match default_range(command.name) {
                DefaultRange::None => None,
                DefaultRange::Current => Some(LineRange::single(self.cursor().line + 1)),
                DefaultRange::Whole => Some(LineRange {
                    start: 1,
                    end: self.buffer.line_count(),
                }),
            },
        };

        if let (Some(limit), Some(range)) = (self.options.line_limit, range) {
            if edits_range(command.name) && range.len() > limit {
                tracing::warn!(target: "engine.ex", lines = range.len(), limit, "range over line_limit");
                return Err(EngineError::LineLimit {
                    lines: range.len(),
                    limit,
                });
            }
        }

        match command.name {
            // history moves cannot happen inside the group of a :g
            "undo" | "redo" if self.in_global => Ok(ExOutcome::Done),
            "undo" => self.undo(1).map(|_| ExOutcome::Done),
            "redo" => self.redo(1).map(|_| ExOutcome::Done),
            _ => self.with_group(|engine| engine.run_ex(&command, range)),
        }
    }

    fn run_ex(&mut self, cmd: &ExCommand, range: Option<LineRange>) -> Result<ExOutcome> {
        let current = LineRange::single(self.cursor().line + 1);
        let lines = range.unwrap_or(current);
        match cmd.name {
            "" => {
                let from = self.cursor();
                self.record_jump(from);
                self.cursor_to_line(lines.end.saturating_sub(1));
                Ok(ExOutcome::Done)
            }
            "substitute" | "&" | "&&" => self.ex_substitute(cmd, lines),
            "global" | "vglobal" => self.ex_global(cmd, lines),
            "write" | "wq" | "xit" | "exit" | "update" => self.ex_write(cmd, range),
            "quit" => {
                if cmd.bang {
                    Ok(ExOutcome::Quit(QuitKind::Force))
                } else if self.modified {
                    Err(EngineError::NoWriteSinceLastChange)
                } else {
                    Ok(ExOutcome::Quit(QuitKind::Quit))
                }
            }
            "read" => self.ex_read(&cmd.args, lines),
            "delete" => {
                let (register, count) = register_and_count(&cmd.args)?;
                let (first, last) = self.with_count(lines, count).lines();
                self.delete_region(Region::Lines { first, last }, register)?;
                Ok(ExOutcome::Done)
            }
            "yank" => {
                let (register, count) = register_and_count(&cmd.args)?;
                let (first, last) = self.with_count(lines, count).lines();
                let content = self.region_content(Region::Lines { first, last });
                self.registers.yank(register, content)?;
                Ok(ExOutcome::Done)
            }
            "put" => self.ex_put(cmd, lines),
            "move" => self.ex_move(&cmd.args, lines),
            "copy" | "t" => self.ex_copy(&cmd.args, lines),
            "join" => {
                let count = parse_count(&cmd.args)?;
                let (first, last) = lines.lines();
                let (start, count) = match count {
                    Some(count) => (last, count),
                    None => (first, (last - first + 1).max(2)),
                };
                self.join_lines(start, count, !cmd.bang)?;
                Ok(ExOutcome::Done)
            }
            ">" | "<" => {
                let right = cmd.name == ">";
                let marker = if right { '>' } else { '<' };
                let extra = cmd.args.chars().take_while(|c| *c == marker).count();
                let count = parse_count(cmd.args.trim_start_matches(marker))?;
                let (first, last) = self.with_count(lines, count).lines();
                self.shift_lines(first, last, right, extra + 1);
                self.cursor_to_line(last);
                Ok(ExOutcome::Done)
            }
            "=" => {
                let line = match range {
                    Some(range) => range.end,
                    None => self.buffer.line_count(),
                };
                Ok(ExOutcome::Message(line.to_string()))
            }
            "print" => {
                let (first, last) = lines.lines();
                let text = self.buffer.lines_text(first, last).join("\n");
                self.cursor_to_line(last);
                Ok(ExOutcome::Message(text))
            }
            "normal" => self.ex_normal(cmd, range),
            "k" | "mark" => {
                let mut chars = cmd.args.chars();
                let name = chars.next().ok_or(EngineError::ArgumentRequired)?;
                let rest = chars.as_str().trim();
                if !rest.is_empty() {
                    return Err(EngineError::TrailingCharacters(rest.to_string()));
                }
                if !Marks::is_settable(name) {
                    return Err(EngineError::InvalidMark(name));
                }
                let line = lines.end.saturating_sub(1);
                self.marks.set(self.buffer_id, name, Position::new(line, 0));
                Ok(ExOutcome::Done)
            }
            "marks" => Ok(ExOutcome::Message(self.list_marks(&cmd.args))),
            "registers" | "display" => Ok(ExOutcome::Message(self.list_registers(&cmd.args))),
            "nohlsearch" => {
                self.search.clear_highlight();
                Ok(ExOutcome::Done)
            }
            "set" => {
                let shown = self.options.apply_set(&cmd.args)?;
                self.sync_options();
                Ok(shown.map_or(ExOutcome::Done, ExOutcome::Message))
            }
            name => match MapMode::for_command(name, cmd.bang) {
                Some(modes) => self.ex_map(name, modes, &cmd.args),
                None => Err(EngineError::NotAnEditorCommand(name.to_string())),
            },
        }
    }

    /// `:d x 3` style counts start at the last line of the range
    fn with_count(&self, range: LineRange, count: Option<usize>) -> LineRange {
        match count {
            Some(count) => {
                let start = range.end.max(1);
                LineRange {
                    start,
                    end: (start + count - 1).min(self.buffer.line_count()),
                }
            }
            None => LineRange {
                start: range.start.max(1),
                end: range.end.max(1),
            },
        }
    }

    // ------------------------------------------------------------------
    // :substitute and :global
    // ------------------------------------------------------------------

    fn ex_substitute(&mut self, cmd: &ExCommand, range: LineRange) -> Result<ExOutcome> {
        let mut sub = parse_substitute(&cmd.args)?;
        if cmd.name == "&&" {
            sub.flags.keep_flags = true;
        }
        let (pattern, replacement, flags) = match sub.pattern.take() {
            Some(pattern) => {
                let pattern = self.search.resolve_pattern(&pattern)?.to_string();
                let previous = self
                    .last_substitute
                    .as_ref()
                    .map_or("", |last| last.replacement.as_str());
                let replacement = expand_tilde(&sub.replacement, previous);
                (pattern, replacement, sub.flags)
            }
            None => {
                let last = self
                    .last_substitute
                    .clone()
                    .ok_or(EngineError::NoPreviousSubstitute)?;
                let flags = sub.flags.merged_with(last.flags);
                (last.pattern, last.replacement, flags)
            }
        };
        let compiled = self.search.compile_with_case(&pattern, flags.ignore_case)?;
        self.last_substitute = Some(LastSubstitute {
            pattern: pattern.clone(),
            replacement: replacement.clone(),
            flags: SubstituteFlags {
                keep_flags: false,
                ..flags
            },
        });
        self.search.set_last_pattern(&pattern);

        let range = self.with_count(range, sub.count);
        let (mut line, mut last) = range.lines();
        let mut substitutions = 0;
        let mut changed_lines = 0;
        let mut last_changed = None;
        while line <= last {
            let text = self.buffer.line_text(line);
            let mut matches = compiled.matches(&text);
            if matches.is_empty() {
                line += 1;
                continue;
            }
            if !flags.global {
                matches.truncate(1);
            }
            substitutions += matches.len();
            changed_lines += 1;
            if flags.count_only {
                line += 1;
                continue;
            }

            let chars: Vec<char> = text.chars().collect();
            let mut new = String::new();
            let mut col = 0;
            for m in &matches {
                new.extend(&chars[col..m.start]);
                new.push_str(&expand_replacement(&replacement, &m.groups));
                col = m.end;
            }
            new.extend(&chars[col..]);
            let added = new.matches('\n').count();
            self.set_line(line, &new);
            last_changed = Some(line + added);
            line += added + 1;
            last += added;
        }

        if substitutions == 0 {
            if flags.no_error || self.in_global {
                return Ok(ExOutcome::Done);
            }
            return Err(EngineError::PatternNotFound(pattern));
        }
        tracing::debug!(target: "engine.ex", pattern = %pattern, substitutions, lines = changed_lines, "substitute");
        if flags.count_only {
            return Ok(ExOutcome::Message(format!(
                "{} on {}",
                if substitutions == 1 { "1 match".to_string() } else { format!("{substitutions} matches") },
                plural(changed_lines, "line")
            )));
        }
        if let Some(line) = last_changed {
            let from = self.cursor();
            self.record_jump(from);
            self.cursor_to_line(line);
        }
        if substitutions > 2 {
            return Ok(ExOutcome::Message(format!(
                "{} on {}",
                plural(substitutions, "substitution"),
                plural(changed_lines, "line")
            )));
        }
        Ok(ExOutcome::Done)
    }

    fn ex_global(&mut self, cmd: &ExCommand, range: LineRange) -> Result<ExOutcome> {
        if self.in_global {
            return Err(EngineError::RecursiveGlobal);
        }
        let (pattern, command) = parse_global(&cmd.args)?;
        let invert = cmd.bang || cmd.name == "vglobal";
        let pattern = self.search.resolve_pattern(&pattern)?.to_string();
        let compiled = self.search.compile(&pattern)?;
        self.search.set_last_pattern(&pattern);

        let (first, last) = range.lines();
        let lines: Vec<usize> = (first..=last)
            .filter(|line| compiled.is_match(&self.buffer.line_text(*line)) != invert)
            .collect();
        if lines.is_empty() {
            return Ok(ExOutcome::Message(if invert {
                format!("Pattern found in every line: {pattern}")
            } else {
                format!("Pattern not found: {pattern}")
            }));
        }
        tracing::debug!(target: "engine.ex", pattern = %pattern, command = %command, lines = lines.len(), "global");

        let count = lines.len();
        self.in_global = true;
        self.marks.track_lines(lines);
        let result = self.run_global(&command, count);
        self.marks.clear_tracked();
        self.in_global = false;

        let messages = result?;
        Ok(if messages.is_empty() {
            ExOutcome::Done
        } else {
            ExOutcome::Message(messages.join("\n"))
        })
    }

    fn run_global(&mut self, command: &str, count: usize) -> Result<Vec<String>> {
        let mut messages = Vec::new();
        for idx in 0..count {
            // deleted by an earlier iteration
            let Some(line) = self.marks.tracked_line(idx) else {
                continue;
            };
            if line > self.buffer.last_line() {
                continue;
            }
            self.set_cursor_clamped(Position::new(line, 0));
            match self.execute_ex(command)? {
                ExOutcome::Done => {}
                ExOutcome::Message(text) => messages.push(text),
                ExOutcome::Quit(kind) => self.effects.quit = Some(kind),
            }
        }
        Ok(messages)
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    fn file_arg(&self, arg: &str) -> Result<PathBuf> {
        let arg = arg.trim();
        if arg.is_empty() {
            self.file_name.clone().ok_or(EngineError::NoFileName)
        } else {
            Ok(PathBuf::from(arg))
        }
    }

    fn ex_write(&mut self, cmd: &ExCommand, range: Option<LineRange>) -> Result<ExOutcome> {
        let quit = matches!(cmd.name, "wq" | "xit" | "exit");
        let only_when_modified = matches!(cmd.name, "xit" | "exit" | "update");
        if only_when_modified && !self.modified && cmd.args.trim().is_empty() {
            return Ok(if quit {
                ExOutcome::Quit(QuitKind::Quit)
            } else {
                ExOutcome::Done
            });
        }

        let path = self.file_arg(&cmd.args)?;
        let own_file = self.file_name.as_deref() == Some(path.as_path());
        let range = range.unwrap_or(LineRange {
            start: 1,
            end: self.buffer.line_count(),
        });
        let (first, last) = range.lines();
        let lines = self.buffer.lines_text(first, last);
        let mut content = lines.join("\n");
        content.push('\n');

        self.file_io.write_file(&path, &content, own_file || cmd.bang)?;
        tracing::info!(target: "engine.ex", path = %path.display(), lines = lines.len(), "written");

        let whole = range.start <= 1 && range.end >= self.buffer.line_count();
        if self.file_name.is_none() {
            self.file_name = Some(path.clone());
            self.modified = self.modified && !whole;
        } else if own_file && whole {
            self.modified = false;
        }
        let message = format!(
            "\"{}\" {}L, {}B written",
            path.display(),
            lines.len(),
            content.len()
        );
        self.effects.written = Some(path);
        Ok(if quit {
            ExOutcome::Quit(QuitKind::Quit)
        } else {
            ExOutcome::Message(message)
        })
    }

    fn ex_read(&mut self, arg: &str, range: LineRange) -> Result<ExOutcome> {
        let path = self.file_arg(arg)?;
        let content = self.file_io.read_file(&path)?;
        let body = content.strip_suffix('\n').unwrap_or(&content);
        let count = if content.is_empty() {
            0
        } else {
            body.split('\n').count()
        };
        if count > 0 {
            let first = if range.end == 0 {
                self.insert_lines_above(0, body)
            } else {
                self.insert_lines_below(range.end - 1, body)
            };
            self.cursor_to_line(first);
        }
        Ok(ExOutcome::Message(format!(
            "\"{}\" {}L, {}B",
            path.display(),
            count,
            content.len()
        )))
    }

    // ------------------------------------------------------------------
    // Line commands
    // ------------------------------------------------------------------

    fn ex_put(&mut self, cmd: &ExCommand, range: LineRange) -> Result<ExOutcome> {
        let name = cmd.args.trim().chars().next().unwrap_or('"');
        if !super::Registers::is_valid_name(name) {
            return Err(EngineError::InvalidRegister(name));
        }
        let content = self.registers.get(name);
        if content.is_empty() {
            return Err(EngineError::EmptyRegister(name));
        }
        // :put is always linewise
        let content = match content.kind {
            RegisterKind::Linewise => content,
            _ => RegisterContent::lines(content.rows().join("\n")),
        };
        let (line, before) = if range.end == 0 {
            (0, true)
        } else {
            (range.end - 1, cmd.bang)
        };
        self.set_cursor_clamped(Position::new(line, 0));
        self.put_content(&content, before, false, 1)?;
        Ok(ExOutcome::Done)
    }

    fn target_line(&self, args: &str) -> Result<usize> {
        let address = parse_address_arg(args)?;
        address.resolve(self, self.cursor().line + 1)
    }

    fn ex_move(&mut self, args: &str, range: LineRange) -> Result<ExOutcome> {
        let target = self.target_line(args)?;
        let range = self.with_count(range, None);
        if target >= range.start && target < range.end {
            return Err(EngineError::MoveIntoSelf);
        }
        let (first, last) = range.lines();
        let n = last - first + 1;
        if target == range.end || target + 1 == range.start {
            self.cursor_to_line(last);
            return Ok(ExOutcome::Done);
        }

        let text = self.buffer.lines_text(first, last).join("\n");
        let new_last = if target > range.end {
            self.insert_lines_below(target - 1, &text);
            self.delete_lines(first, last);
            target - 1
        } else {
            self.delete_lines(first, last);
            if target == 0 {
                self.insert_lines_above(0, &text);
            } else {
                self.insert_lines_below(target - 1, &text);
            }
            target + n - 1
        };
        self.cursor_to_line(new_last);
        if n > 2 {
            return Ok(ExOutcome::Message(format!("{n} lines moved")));
        }
        Ok(ExOutcome::Done)
    }

    fn ex_copy(&mut self, args: &str, range: LineRange) -> Result<ExOutcome> {
        let target = self.target_line(args)?;
        let range = self.with_count(range, None);
        let (first, last) = range.lines();
        let text = self.buffer.lines_text(first, last).join("\n");
        let start = if target == 0 {
            self.insert_lines_above(0, &text)
        } else {
            self.insert_lines_below(target - 1, &text)
        };
        self.cursor_to_line(start + last - first);
        Ok(ExOutcome::Done)
    }

    fn ex_normal(&mut self, cmd: &ExCommand, range: Option<LineRange>) -> Result<ExOutcome> {
        if cmd.args.is_empty() {
            return Err(EngineError::ArgumentRequired);
        }
        let keys = parse_key_sequence(&cmd.args);
        let remap = !cmd.bang;
        match range {
            None => self.run_nested_keys(&keys, remap)?,
            Some(range) => {
                let (first, last) = range.lines();
                for line in first..=last {
                    if line > self.buffer.last_line() {
                        break;
                    }
                    self.set_cursor_clamped(Position::new(line, 0));
                    self.run_nested_keys(&keys, remap)?;
                    if self.aborted {
                        break;
                    }
                }
            }
        }
        Ok(ExOutcome::Done)
    }

    // ------------------------------------------------------------------
    // Listings and mappings
    // ------------------------------------------------------------------

    fn list_marks(&self, filter: &str) -> String {
        let mut out = vec!["mark line  col text".to_string()];
        for (name, pos) in self.marks.list(self.buffer_id) {
            if !filter.is_empty() && !filter.contains(name) {
                continue;
            }
            let text = self.buffer.line_text(pos.line.min(self.buffer.last_line()));
            out.push(format!(" {name} {:>6} {:>4} {}", pos.line + 1, pos.col, text.trim()));
        }
        out.join("\n")
    }

    fn list_registers(&self, filter: &str) -> String {
        let mut out = vec!["Type Name Content".to_string()];
        for (name, content) in self.registers.list() {
            if !filter.is_empty() && !filter.contains(name) {
                continue;
            }
            let kind = match content.kind {
                RegisterKind::Charwise => 'c',
                RegisterKind::Linewise => 'l',
                RegisterKind::Blockwise => 'b',
            };
            out.push(format!("  {kind}  \"{name}   {}", escape_register(&content.text)));
        }
        out.join("\n")
    }

    fn ex_map(&mut self, name: &str, modes: &'static [MapMode], args: &str) -> Result<ExOutcome> {
        let args = args.trim();
        if name == "mapclear" {
            self.mappings.clear(modes);
            return Ok(ExOutcome::Done);
        }
        if name.ends_with("unmap") {
            if args.is_empty() {
                return Err(EngineError::ArgumentRequired);
            }
            if !self.mappings.remove(modes, &parse_key_sequence(args)) {
                return Err(EngineError::NoSuchMapping);
            }
            return Ok(ExOutcome::Done);
        }

        let (lhs, rhs) = match args.split_once(char::is_whitespace) {
            Some((lhs, rhs)) => (lhs, rhs.trim_start()),
            None => (args, ""),
        };
        if rhs.is_empty() {
            let listing = self.mappings.describe(modes, &parse_key_sequence(lhs));
            return Ok(ExOutcome::Message(if listing.is_empty() {
                "No mapping found".to_string()
            } else {
                listing.join("\n")
            }));
        }
        let noremap = name.contains("noremap");
        tracing::debug!(target: "engine.mapping", lhs, rhs, noremap, "define");
        self.mappings
            .insert(modes, parse_key_sequence(lhs), parse_key_sequence(rhs), noremap);
        Ok(ExOutcome::Done)
    }
}

fn parse_count(args: &str) -> Result<Option<usize>> {
    let args = args.trim();
    if args.is_empty() {
        return Ok(None);
    }
    match args.parse::<usize>() {
        Ok(0) => Err(EngineError::InvalidArgument(args.to_string())),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(EngineError::TrailingCharacters(args.to_string())),
    }
}

/// `/foo/` searches for `foo`
fn strip_closing_delimiter(typed: &str, delim: char) -> &str {
    let Some(body) = typed.strip_suffix(delim) else {
        return typed;
    };
    let backslashes = body.chars().rev().take_while(|c| *c == '\\').count();
    if backslashes % 2 == 0 {
        body
    } else {
        typed
    }
}
