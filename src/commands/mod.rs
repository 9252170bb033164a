//! The `:` command line: line editing, history, ranges and command names

pub mod substitute;

use std::collections::VecDeque;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::keymap::key_to_notation;
use crate::editor::text;
use crate::error::{EngineError, Result};

const MAX_HISTORY: usize = 100;

/// What a key did to a prompt line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEdit {
    /// The text changed
    Edited,
    /// Only the cursor moved
    Moved,
    Submit,
    Cancel,
}

/// Input line of the ex and search prompts
#[derive(Debug, Clone, Default)]
pub struct LineEditor {
    /// The current input buffer
    input: String,
    /// Cursor position in the input, in chars
    cursor: usize,
    /// Entries, most recent first
    history: VecDeque<String>,
    /// Current position in history (for up/down navigation)
    history_index: Option<usize>,
    /// Saved input when browsing history
    saved_input: Option<String>,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Clear the command line
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor = 0;
        self.history_index = None;
        self.saved_input = None;
    }

    /// Start editing with some text already typed
    pub fn set_input(&mut self, text: &str) {
        self.clear();
        self.input.push_str(text);
        self.cursor = text.chars().count();
    }

    fn len(&self) -> usize {
        self.input.chars().count()
    }

    /// Insert a character at the cursor position
    pub fn insert_char(&mut self, ch: char) {
        let idx = text::byte_offset(&self.input, self.cursor);
        self.input.insert(idx, ch);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        let idx = text::byte_offset(&self.input, self.cursor);
        self.input.insert_str(idx, s);
        self.cursor += s.chars().count();
    }

    /// Delete character before cursor (backspace); false when the line was already empty
    pub fn delete_char_before(&mut self) -> bool {
        if self.input.is_empty() {
            return false;
        }
        if self.cursor > 0 {
            self.cursor -= 1;
            let idx = text::byte_offset(&self.input, self.cursor);
            self.input.remove(idx);
        }
        true
    }

    /// Delete character at cursor (delete key)
    pub fn delete_char_at(&mut self) {
        if self.cursor < self.len() {
            let idx = text::byte_offset(&self.input, self.cursor);
            self.input.remove(idx);
        }
    }

    /// Ctrl-u: delete everything before the cursor
    pub fn delete_to_start(&mut self) {
        let idx = text::byte_offset(&self.input, self.cursor);
        self.input.replace_range(..idx, "");
        self.cursor = 0;
    }

    /// Ctrl-w: delete the word before the cursor
    pub fn delete_word_before(&mut self) {
        let chars: Vec<char> = self.input.chars().collect();
        let mut start = self.cursor;
        while start > 0 && chars[start - 1].is_whitespace() {
            start -= 1;
        }
        if start > 0 {
            let word = text::is_word_char(chars[start - 1]);
            while start > 0 && !chars[start - 1].is_whitespace() && text::is_word_char(chars[start - 1]) == word {
                start -= 1;
            }
        }
        let from = text::byte_offset(&self.input, start);
        let to = text::byte_offset(&self.input, self.cursor);
        self.input.replace_range(from..to, "");
        self.cursor = start;
    }

    /// Move cursor left
    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Move cursor right
    pub fn move_right(&mut self) {
        if self.cursor < self.len() {
            self.cursor += 1;
        }
    }

    /// Move cursor to start
    pub fn move_to_start(&mut self) {
        self.cursor = 0;
    }

    /// Move cursor to end
    pub fn move_to_end(&mut self) {
        self.cursor = self.len();
    }

    /// Recall an older entry that starts with the text typed before browsing
    pub fn history_prev(&mut self) {
        let prefix = self.saved_input.clone().unwrap_or_else(|| self.input.clone());
        let start = self.history_index.map_or(0, |i| i + 1);
        let found = self
            .history
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, entry)| entry.starts_with(&prefix))
            .map(|(i, entry)| (i, entry.clone()));
        if let Some((idx, entry)) = found {
            if self.history_index.is_none() {
                self.saved_input = Some(self.input.clone());
            }
            self.history_index = Some(idx);
            self.input = entry;
            self.cursor = self.len();
        }
    }

    /// Navigate to next history entry
    pub fn history_next(&mut self) {
        let Some(current) = self.history_index else {
            return;
        };
        let prefix = self.saved_input.clone().unwrap_or_default();
        let newer = (0..current)
            .rev()
            .find(|&i| self.history.get(i).map_or(false, |e| e.starts_with(&prefix)));
        match newer {
            Some(idx) => {
                self.history_index = Some(idx);
                self.input = self.history.get(idx).cloned().unwrap_or_default();
            }
            None => {
                // Restore saved input
                self.history_index = None;
                self.input = self.saved_input.take().unwrap_or_default();
            }
        }
        self.cursor = self.len();
    }

    /// Record an entry, moving duplicates to the front
    pub fn add_history(&mut self, entry: &str) {
        if entry.is_empty() {
            return;
        }
        self.history.retain(|e| e != entry);
        self.history.push_front(entry.to_string());
        self.history.truncate(MAX_HISTORY);
    }

    /// Take the typed line, recording it in history
    pub fn submit(&mut self) -> String {
        let line = std::mem::take(&mut self.input);
        self.add_history(&line);
        self.clear();
        line
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Apply one key; keys without an editing meaning are typed as their notation
    pub fn handle_key(&mut self, key: KeyEvent) -> LineEdit {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => LineEdit::Cancel,
            (_, KeyCode::Enter) | (KeyModifiers::CONTROL, KeyCode::Char('m' | 'j')) => LineEdit::Submit,
            (_, KeyCode::Backspace) | (KeyModifiers::CONTROL, KeyCode::Char('h')) => {
                if self.delete_char_before() {
                    LineEdit::Edited
                } else {
                    LineEdit::Cancel
                }
            }
            (_, KeyCode::Delete) => {
                self.delete_char_at();
                LineEdit::Edited
            }
            (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
                self.delete_to_start();
                LineEdit::Edited
            }
            (KeyModifiers::CONTROL, KeyCode::Char('w')) => {
                self.delete_word_before();
                LineEdit::Edited
            }
            (_, KeyCode::Left) => {
                self.move_left();
                LineEdit::Moved
            }
            (_, KeyCode::Right) => {
                self.move_right();
                LineEdit::Moved
            }
            (_, KeyCode::Home) | (KeyModifiers::CONTROL, KeyCode::Char('b')) => {
                self.move_to_start();
                LineEdit::Moved
            }
            (_, KeyCode::End) | (KeyModifiers::CONTROL, KeyCode::Char('e')) => {
                self.move_to_end();
                LineEdit::Moved
            }
            (_, KeyCode::Up) => {
                self.history_prev();
                LineEdit::Edited
            }
            (_, KeyCode::Down) => {
                self.history_next();
                LineEdit::Edited
            }
            (KeyModifiers::NONE, KeyCode::Char(c)) => {
                self.insert_char(c);
                LineEdit::Edited
            }
            (_, KeyCode::Tab) => {
                self.insert_char('\t');
                LineEdit::Edited
            }
            _ => {
                self.insert_str(&key_to_notation(&key));
                LineEdit::Edited
            }
        }
    }
}

/// Where an address starts counting from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressBase {
    /// Absolute 1-based line number; 0 means "before the first line"
    Line(usize),
    Current,
    Last,
    Mark(char),
    /// `/pat/`: next line matching, searching forward
    Forward(String),
    /// `?pat?`
    Backward(String),
    /// `\/` and `\?` reuse the last search pattern
    LastForward,
    LastBackward,
}

/// A single line address with its offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub base: AddressBase,
    pub offset: isize,
}

/// The range prefix of an ex command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSpec {
    /// `%`
    Whole,
    /// One or two addresses; `;` makes the second relative to the first
    Addresses {
        first: Address,
        second: Option<(Address, bool)>,
    },
}

/// What range resolution needs from the editor
pub trait AddressContext {
    /// Current line, 1-based
    fn current_line(&self) -> usize;
    /// Number of lines in the buffer
    fn line_count(&self) -> usize;
    /// 1-based line of a mark
    fn mark_line(&self, mark: char) -> Result<usize>;
    /// 1-based line of the next line matching `pattern` after (or before) `from`
    fn search_line(&self, pattern: &str, forward: bool, from: usize) -> Result<usize>;
    fn last_pattern(&self) -> Option<String>;
}

/// Resolved range, 1-based inclusive; `0` only appears as a target address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn single(line: usize) -> Self {
        Self { start: line, end: line }
    }

    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// 0-based first and last line
    pub fn lines(&self) -> (usize, usize) {
        (self.start.saturating_sub(1), self.end.saturating_sub(1))
    }
}

impl Address {
    pub fn resolve(&self, ctx: &dyn AddressContext, current: usize) -> Result<usize> {
        let base = match &self.base {
            AddressBase::Line(n) => *n,
            AddressBase::Current => current,
            AddressBase::Last => ctx.line_count(),
            AddressBase::Mark(c) => ctx.mark_line(*c)?,
            AddressBase::Forward(p) => ctx.search_line(p, true, current)?,
            AddressBase::Backward(p) => ctx.search_line(p, false, current)?,
            AddressBase::LastForward | AddressBase::LastBackward => {
                let pattern = ctx.last_pattern().ok_or(EngineError::NoPreviousPattern)?;
                let forward = self.base == AddressBase::LastForward;
                ctx.search_line(&pattern, forward, current)?
            }
        };
        let line = base as isize + self.offset;
        if line < 0 || line as usize > ctx.line_count() {
            return Err(EngineError::InvalidRange);
        }
        Ok(line as usize)
    }
}

impl RangeSpec {
    /// Resolve to 1-based lines; reversed ranges are swapped
    pub fn resolve(&self, ctx: &dyn AddressContext) -> Result<LineRange> {
        match self {
            RangeSpec::Whole => Ok(LineRange {
                start: 1,
                end: ctx.line_count(),
            }),
            RangeSpec::Addresses { first, second } => {
                let current = ctx.current_line();
                let start = first.resolve(ctx, current)?;
                let end = match second {
                    None => start,
                    Some((addr, semicolon)) => {
                        let from = if *semicolon { start.max(1) } else { current };
                        addr.resolve(ctx, from)?
                    }
                };
                let (start, end) = if end < start { (end, start) } else { (start, end) };
                Ok(LineRange { start, end })
            }
        }
    }
}

/// A parsed `[range] name[!] [args]` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExCommand {
    pub range: Option<RangeSpec>,
    /// Canonical command name; empty for a bare range
    pub name: &'static str,
    pub bang: bool,
    pub args: String,
}

/// Commands and the shortest accepted abbreviation
const COMMANDS: &[(&str, usize)] = &[
    ("substitute", 1),
    ("global", 1),
    ("vglobal", 1),
    ("write", 1),
    ("wq", 2),
    ("read", 1),
    ("redo", 3),
    ("registers", 3),
    ("delete", 1),
    ("display", 2),
    ("move", 1),
    ("mark", 2),
    ("marks", 5),
    ("map", 3),
    ("mapclear", 4),
    ("copy", 2),
    ("t", 1),
    ("yank", 1),
    ("put", 2),
    ("print", 1),
    ("join", 1),
    ("normal", 4),
    ("k", 1),
    ("nohlsearch", 3),
    ("noremap", 2),
    ("nmap", 2),
    ("nnoremap", 2),
    ("nunmap", 3),
    ("set", 2),
    ("undo", 1),
    ("unmap", 3),
    ("quit", 1),
    ("xit", 1),
    ("exit", 3),
    ("vmap", 2),
    ("vnoremap", 2),
    ("vunmap", 2),
    ("imap", 2),
    ("inoremap", 3),
    ("iunmap", 2),
    ("update", 2),
    ("&", 1),
    ("&&", 2),
    ("<", 1),
    (">", 1),
    ("=", 1),
];

/// Expand an abbreviated command name
pub fn lookup_command(name: &str) -> Option<&'static str> {
    if let Some((full, _)) = COMMANDS.iter().find(|(full, _)| *full == name) {
        return Some(full);
    }
    COMMANDS
        .iter()
        .find(|(full, min)| name.len() >= *min && full.starts_with(name))
        .map(|(full, _)| *full)
}

/// Parse an ex command line
pub fn parse_ex(line: &str) -> Result<ExCommand> {
    let input = line.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    let mut parser = Cursor::new(input);
    let range = parser.parse_range()?;
    parser.skip_whitespace();

    let rest = parser.rest();
    if rest.is_empty() {
        return Ok(ExCommand {
            range,
            name: "",
            bang: false,
            args: String::new(),
        });
    }

    let (raw_name, after) = split_name(rest);
    let unknown = || EngineError::NotAnEditorCommand(line.trim().to_string());

    // `:ka` is `:k a`
    let (name, after) = match lookup_command(raw_name) {
        Some(name) => (name, after),
        None if raw_name.len() == 2 && raw_name.starts_with('k') => ("k", &rest[1..]),
        None => return Err(unknown()),
    };

    let (bang, args) = match after.strip_prefix('!') {
        Some(args) => (true, args),
        None => (false, after),
    };
    let args = if matches!(name, "substitute" | "global" | "vglobal" | "&" | "&&") {
        args.to_string()
    } else {
        args.trim().to_string()
    };

    Ok(ExCommand {
        range,
        name,
        bang,
        args,
    })
}

/// Split the command name off; `<`/`>` runs and `&&` are names of their own
fn split_name(rest: &str) -> (&str, &str) {
    let first = rest.chars().next().unwrap_or(' ');
    let end = if first.is_ascii_alphabetic() {
        rest.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(rest.len())
    } else if rest.starts_with("&&") {
        2
    } else {
        first.len_utf8()
    };
    let (name, after) = rest.split_at(end);
    // :>>> shifts three times; keep the extra marks in the arguments
    (name, after)
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.bump();
        }
    }

    fn number(&mut self) -> Option<usize> {
        let digits: String = self.rest().chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }
        self.pos += digits.len();
        Some(digits.parse().unwrap_or(usize::MAX))
    }

    fn parse_range(&mut self) -> Result<Option<RangeSpec>> {
        self.skip_whitespace();
        if self.peek() == Some('%') {
            self.bump();
            return Ok(Some(RangeSpec::Whole));
        }
        let first = self.parse_address()?;
        self.skip_whitespace();
        let separator = match self.peek() {
            Some(',') => Some(false),
            Some(';') => Some(true),
            _ => None,
        };
        let Some(semicolon) = separator else {
            return Ok(first.map(|first| RangeSpec::Addresses { first, second: None }));
        };
        self.bump();
        self.skip_whitespace();
        let current = Address {
            base: AddressBase::Current,
            offset: 0,
        };
        // ",5" starts at the current line and "5," ends at it
        let first = first.unwrap_or_else(|| current.clone());
        let second = self.parse_address()?.unwrap_or(current);
        Ok(Some(RangeSpec::Addresses {
            first,
            second: Some((second, semicolon)),
        }))
    }

    fn parse_address(&mut self) -> Result<Option<Address>> {
        let base = match self.peek() {
            Some(c) if c.is_ascii_digit() => self.number().map(AddressBase::Line),
            Some('.') => {
                self.bump();
                Some(AddressBase::Current)
            }
            Some('$') => {
                self.bump();
                Some(AddressBase::Last)
            }
            Some('\'') => {
                self.bump();
                let mark = self.bump().ok_or(EngineError::InvalidAddress)?;
                Some(AddressBase::Mark(mark))
            }
            Some(delim @ ('/' | '?')) => {
                self.bump();
                let pattern = self.delimited(delim);
                Some(if delim == '/' {
                    AddressBase::Forward(pattern)
                } else {
                    AddressBase::Backward(pattern)
                })
            }
            Some('\\') => {
                let mut probe = self.rest().chars();
                probe.next();
                match probe.next() {
                    Some('/') => {
                        self.pos += 2;
                        Some(AddressBase::LastForward)
                    }
                    Some('?') => {
                        self.pos += 2;
                        Some(AddressBase::LastBackward)
                    }
                    _ => return Err(EngineError::InvalidAddress),
                }
            }
            _ => None,
        };

        let mut offset: isize = 0;
        let mut has_offset = false;
        loop {
            match self.peek() {
                Some(sign @ ('+' | '-')) => {
                    self.bump();
                    let n = self.number().unwrap_or(1) as isize;
                    offset += if sign == '+' { n } else { -n };
                    has_offset = true;
                }
                _ => break,
            }
        }

        match base {
            Some(base) => Ok(Some(Address { base, offset })),
            None if has_offset => Ok(Some(Address {
                base: AddressBase::Current,
                offset,
            })),
            None => Ok(None),
        }
    }

    /// Text up to an unescaped `delim`; `\delim` becomes `delim`
    fn delimited(&mut self, delim: char) -> String {
        let mut out = String::new();
        while let Some(c) = self.bump() {
            if c == delim {
                break;
            }
            if c == '\\' && self.peek() == Some(delim) {
                self.bump();
                out.push(delim);
                continue;
            }
            if c == '\\' {
                out.push(c);
                if let Some(next) = self.bump() {
                    out.push(next);
                }
                continue;
            }
            out.push(c);
        }
        out
    }
}

/// Parse the target address of `:move` and `:copy`
pub fn parse_address_arg(args: &str) -> Result<Address> {
    let mut cursor = Cursor::new(args.trim());
    let address = cursor.parse_address()?.ok_or(EngineError::InvalidAddress)?;
    let rest = cursor.rest().trim();
    if !rest.is_empty() {
        return Err(EngineError::TrailingCharacters(rest.to_string()));
    }
    Ok(address)
}

/// Split `:g/pat/cmd` into the pattern and the command (`p` when omitted)
pub fn parse_global(args: &str) -> Result<(String, String)> {
    let args = args.trim_start();
    let delim = args.chars().next().ok_or(EngineError::ArgumentRequired)?;
    if delim.is_alphanumeric() || matches!(delim, '\\' | '"' | '|') {
        return Err(EngineError::InvalidArgument(args.to_string()));
    }
    let mut cursor = Cursor::new(&args[delim.len_utf8()..]);
    let pattern = cursor.delimited(delim);
    let command = cursor.rest().trim();
    let command = if command.is_empty() { "p" } else { command };
    Ok((pattern, command.to_string()))
}

/// Split a leading register name off `:d x 3` style arguments
pub fn register_and_count(args: &str) -> Result<(Option<char>, Option<usize>)> {
    let args = args.trim();
    if args.is_empty() {
        return Ok((None, None));
    }
    let mut chars = args.chars();
    let mut register = None;
    let mut rest = args;
    if let Some(c) = chars.next() {
        if !c.is_ascii_digit() {
            if !crate::editor::register::Registers::is_valid_name(c) {
                return Err(EngineError::InvalidRegister(c));
            }
            register = Some(c);
            rest = chars.as_str().trim_start();
        }
    }
    if rest.is_empty() {
        return Ok((register, None));
    }
    let count: usize = rest
        .parse()
        .map_err(|_| EngineError::TrailingCharacters(rest.to_string()))?;
    if count == 0 {
        return Err(EngineError::InvalidArgument(rest.to_string()));
    }
    Ok((register, Some(count)))
}
