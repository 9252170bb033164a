//! The modal editing engine.
//!
//! [`Engine`] owns the buffer and every piece of editing state: registers,
//! marks, undo history, macros, search and mappings. Keys arrive through
//! [`Engine::handle_key`], pass the typeahead queue where user mappings
//! expand, and are dispatched by [`Mode`].

pub mod buffer;
pub mod ex;
pub mod insert;
pub mod macros;
pub mod marks;
pub mod operator;
pub mod position;
pub mod register;
pub mod search;
pub mod text;
pub mod text_object;
pub mod undo;
pub mod visual;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent};

use crate::commands::LineEditor;
use crate::config::keymap::{
    key_to_notation, keys_to_notation, normalize_key, parse_key_sequence, MapMode, MapTable, Mapping,
    MappingLookup,
};
use crate::config::{Options, Settings};
use crate::error::{EngineError, Result};
use crate::input::motion::find_char;
use crate::input::{apply_motion, Action, Command, KeyAction, Motion, ParseContext, PendingCommand};
use crate::io::FileIo;

pub use buffer::{Buffer, BufferAdapter};
pub use ex::ExOutcome;
pub use macros::MacroState;
pub use marks::{BufferId, JumpList, Mark, Marks, RemovedLines};
pub use position::Position;
pub use register::{RegisterContent, RegisterKind, Registers};
pub use search::{MatchSpan, PatternEngine, RegexEngine, SearchDirection, SearchEngine};
pub use undo::{Change, GroupHandle, UndoStack};

use ex::LastSubstitute;
use insert::InsertSession;
use visual::{LastVisual, VisualExtent};

/// The current mode of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Insert,
    Replace,
    Visual,
    VisualLine,
    VisualBlock,
    ExCommandLine,
    SearchLine,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::Insert => "INSERT",
            Mode::Replace => "REPLACE",
            Mode::Visual => "VISUAL",
            Mode::VisualLine => "V-LINE",
            Mode::VisualBlock => "V-BLOCK",
            Mode::ExCommandLine => "COMMAND",
            Mode::SearchLine => "SEARCH",
        }
    }

    pub fn is_visual(&self) -> bool {
        matches!(self, Mode::Visual | Mode::VisualLine | Mode::VisualBlock)
    }

    /// Insert or Replace: typed chars go into the buffer
    pub fn is_insert(&self) -> bool {
        matches!(self, Mode::Insert | Mode::Replace)
    }

    /// Mapping table consulted in this mode; prompts are never remapped
    pub fn map_mode(&self) -> Option<MapMode> {
        match self {
            Mode::Normal => Some(MapMode::Normal),
            Mode::Visual | Mode::VisualLine | Mode::VisualBlock => Some(MapMode::Visual),
            Mode::Insert | Mode::Replace => Some(MapMode::Insert),
            Mode::ExCommandLine | Mode::SearchLine => None,
        }
    }
}

/// A message for the host's status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitKind {
    /// `:q`, `:wq`, `:x`
    Quit,
    /// `:q!`: discard changes
    Force,
}

/// What one call into the engine did, for the host to react to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineEffects {
    /// Mode before and after the call, when it changed
    pub mode_change: Option<(Mode, Mode)>,
    /// Primitive edits applied to the buffer, in order
    pub edits: Vec<Change>,
    /// The last error reported, or else the last message
    pub status: Option<StatusMessage>,
    /// Every error reported, in order
    pub errors: Vec<StatusMessage>,
    pub quit: Option<QuitKind>,
    /// Path written by `:w` and friends
    pub written: Option<PathBuf>,
}

impl EngineEffects {
    /// Fold the effects of a later call into these
    pub fn merge(&mut self, later: EngineEffects) {
        self.mode_change = match (self.mode_change, later.mode_change) {
            (Some((from, _)), Some((_, to))) => (from != to).then_some((from, to)),
            (first, None) => first,
            (None, second) => second,
        };
        self.edits.extend(later.edits);
        let keep_error = self.status.as_ref().is_some_and(|s| s.is_error)
            && !later.status.as_ref().is_some_and(|s| s.is_error);
        if later.status.is_some() && !keep_error {
            self.status = later.status;
        }
        self.errors.extend(later.errors);
        self.quit = later.quit.or(self.quit);
        self.written = later.written.or(self.written.take());
    }
}

/// An entry of the typeahead queue
#[derive(Debug, Clone, Copy)]
enum Queued {
    Key { key: KeyEvent, remap: bool, depth: usize },
    /// The keys of a macro have all been consumed
    EndPlayback,
}

/// Everything needed to repeat the last change with `.`
#[derive(Debug, Clone)]
struct LastChange {
    command: Command,
    /// Keys typed in insert or replace mode, up to and including Esc
    insert_keys: Vec<KeyEvent>,
    /// Size of the selection for changes made in visual mode
    visual: Option<VisualExtent>,
}

/// A `/` or `?` prompt in progress
#[derive(Debug, Clone, Copy)]
struct SearchPrompt {
    direction: SearchDirection,
    origin: Position,
    /// Visual mode the prompt was opened from
    return_mode: Mode,
}

/// Nesting limit for `:normal` inside `:normal`
const MAX_NORMAL_DEPTH: usize = 100;

/// The Vim-style modal command engine
pub struct Engine<B: BufferAdapter> {
    buffer: B,
    file_io: Box<dyn FileIo>,
    file_name: Option<PathBuf>,
    buffer_id: BufferId,
    /// Changed since the last write
    modified: bool,
    mode: Mode,
    options: Options,

    parser: PendingCommand,
    /// Keys of the command being parsed, for messages
    pending_keys: Vec<KeyEvent>,
    registers: Registers,
    marks: Marks,
    jumps: JumpList,
    macros: MacroState,
    undo_stack: UndoStack,
    search: SearchEngine,
    mappings: MapTable,

    typeahead: VecDeque<Queued>,
    /// Keys matching a mapping prefix, with their expansion depth
    map_pending: Vec<(KeyEvent, usize)>,
    /// An error stopped a macro or `:normal`; outer queues are dropped too
    aborted: bool,
    /// Undo groups spanning a macro's playback, innermost last
    playback_groups: Vec<GroupHandle>,
    /// Groups to commit once the running insert session ends
    deferred_groups: Vec<GroupHandle>,
    normal_depth: usize,

    insert: Option<InsertSession>,
    visual_anchor: Position,
    /// `$` was used in block mode: every row extends to its line end
    block_to_eol: bool,
    last_visual: Option<LastVisual>,

    cmdline: LineEditor,
    search_line: LineEditor,
    search_prompt: Option<SearchPrompt>,

    last_change: Option<LastChange>,
    /// A change whose insert keys are still being collected
    dot_recording: Option<LastChange>,
    replaying: bool,
    last_substitute: Option<LastSubstitute>,
    in_global: bool,
    /// Display column vertical motions aim for; `usize::MAX` means line end
    desired_col: Option<usize>,

    status: Option<StatusMessage>,
    effects: EngineEffects,
}

impl<B: BufferAdapter> std::fmt::Debug for Engine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("mode", &self.mode)
            .field("cursor", &self.buffer.cursor_position())
            .field("file_name", &self.file_name)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

impl<B: BufferAdapter> Engine<B> {
    pub fn new(buffer: B, file_io: Box<dyn FileIo>) -> Self {
        Self::with_options(buffer, file_io, Options::default())
    }

    pub fn with_options(buffer: B, file_io: Box<dyn FileIo>, options: Options) -> Self {
        let mut search = SearchEngine::default();
        search.set_case_options(options.ignorecase, options.smartcase);
        Self {
            buffer,
            file_io,
            file_name: None,
            buffer_id: 1,
            modified: false,
            mode: Mode::Normal,
            parser: PendingCommand::new(),
            pending_keys: Vec::new(),
            registers: Registers::new(),
            marks: Marks::new(),
            jumps: JumpList::default(),
            macros: MacroState::new(),
            undo_stack: UndoStack::with_levels(options.undolevels),
            search,
            mappings: MapTable::new(),
            typeahead: VecDeque::new(),
            map_pending: Vec::new(),
            aborted: false,
            playback_groups: Vec::new(),
            deferred_groups: Vec::new(),
            normal_depth: 0,
            insert: None,
            visual_anchor: Position::default(),
            block_to_eol: false,
            last_visual: None,
            cmdline: LineEditor::new(),
            search_line: LineEditor::new(),
            search_prompt: None,
            last_change: None,
            dot_recording: None,
            replaying: false,
            last_substitute: None,
            in_global: false,
            desired_col: None,
            status: None,
            effects: EngineEffects::default(),
            options,
        }
    }

    /// Replace the regex capability used by searches, `:s` and `:g`
    pub fn with_pattern_engine(mut self, engine: Box<dyn PatternEngine>) -> Self {
        let mut search = SearchEngine::new(engine);
        search.set_case_options(self.options.ignorecase, self.options.smartcase);
        self.search = search;
        self
    }

    /// Name of the file the buffer belongs to, used by `:w` without arguments
    pub fn with_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_name = Some(path.into());
        self
    }

    /// Apply loaded settings: options plus mappings
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.set_options(settings.options.clone());
        for mapping in &settings.mappings {
            let Some(modes) = MapMode::parse(&mapping.mode) else {
                tracing::warn!(target: "engine.mapping", mode = %mapping.mode, from = %mapping.from, "unknown mapping mode");
                continue;
            };
            let lhs = parse_key_sequence(&mapping.from);
            if lhs.is_empty() {
                continue;
            }
            self.mappings
                .insert(modes, lhs, parse_key_sequence(&mapping.to), mapping.noremap);
        }
    }

    pub fn set_options(&mut self, options: Options) {
        self.options = options;
        self.sync_options();
    }

    fn sync_options(&mut self) {
        self.undo_stack.set_levels(self.options.undolevels);
        self.search
            .set_case_options(self.options.ignorecase, self.options.smartcase);
    }

    pub fn current_mode(&self) -> Mode {
        self.mode
    }

    /// The last message, kept until the next key
    pub fn status_message(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn cursor(&self) -> Position {
        self.buffer.cursor_position()
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn marks(&self) -> &Marks {
        &self.marks
    }

    pub fn buffer_id(&self) -> BufferId {
        self.buffer_id
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn mappings(&self) -> &MapTable {
        &self.mappings
    }

    pub fn file_name(&self) -> Option<&Path> {
        self.file_name.as_deref()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_recording(&self) -> Option<char> {
        self.macros.recording_register()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_stack.can_redo()
    }

    /// Keys of the unfinished normal-mode command (`2d`, `"a`)
    pub fn pending_keys(&self) -> String {
        keys_to_notation(&self.pending_keys)
    }

    /// The prompt being edited: its leading char, text and cursor column
    pub fn command_line(&self) -> Option<(char, &str, usize)> {
        match self.mode {
            Mode::ExCommandLine => Some((':', self.cmdline.input(), self.cmdline.cursor())),
            Mode::SearchLine => {
                let direction = self
                    .search_prompt
                    .map_or(SearchDirection::Forward, |p| p.direction);
                Some((
                    direction.prompt(),
                    self.search_line.input(),
                    self.search_line.cursor(),
                ))
            }
            _ => None,
        }
    }

    /// Match spans of the last pattern, when `hlsearch` is on
    pub fn search_highlights(&self) -> Vec<MatchSpan> {
        if !self.options.hlsearch {
            return Vec::new();
        }
        self.search.highlights(&self.buffer)
    }

    /// Hand the engine another buffer; marks, undo history and jumps of the old one are dropped
    pub fn swap_buffer(&mut self, buffer: B, file_name: Option<PathBuf>) -> B {
        tracing::debug!(target: "engine.dispatch", old = self.buffer_id, "swapping buffer");
        self.marks.invalidate_buffer(self.buffer_id);
        self.buffer_id += 1;
        self.undo_stack.clear();
        self.jumps = JumpList::default();
        self.parser.reset();
        self.pending_keys.clear();
        self.insert = None;
        self.playback_groups.clear();
        self.deferred_groups.clear();
        self.dot_recording = None;
        self.last_visual = None;
        self.search_prompt = None;
        self.mode = Mode::Normal;
        self.modified = false;
        self.desired_col = None;
        self.file_name = file_name;
        std::mem::replace(&mut self.buffer, buffer)
    }

    // ------------------------------------------------------------------
    // Key entry points
    // ------------------------------------------------------------------

    /// Process one key and report what it did
    pub fn handle_key(&mut self, key: KeyEvent) -> EngineEffects {
        let before = self.begin_call();
        let key = normalize_key(key);
        self.macros.record_key(key);
        self.typeahead.push_back(Queued::Key {
            key,
            remap: true,
            depth: 0,
        });
        self.drain_typeahead();
        self.end_call(before)
    }

    /// Process a key script in notation (`dd`, `:s/a/b/<CR>`, `<C-r>`)
    pub fn handle_keys(&mut self, keys: &str) -> EngineEffects {
        let mut effects = EngineEffects::default();
        for key in parse_key_sequence(keys) {
            effects.merge(self.handle_key(key));
        }
        effects
    }

    /// The host's key timeout elapsed: an ambiguous mapping takes its shortest match
    pub fn timeout(&mut self) -> EngineEffects {
        let before = self.begin_call();
        if !self.map_pending.is_empty() {
            self.flush_pending_mapping(true);
            self.drain_typeahead();
        }
        self.end_call(before)
    }

    fn begin_call(&mut self) -> Mode {
        self.status = None;
        self.effects = EngineEffects::default();
        self.aborted = false;
        self.mode
    }

    fn end_call(&mut self, before: Mode) -> EngineEffects {
        let mut effects = std::mem::take(&mut self.effects);
        if before != self.mode {
            effects.mode_change = Some((before, self.mode));
        }
        effects
    }

    fn drain_typeahead(&mut self) {
        while let Some(item) = self.typeahead.pop_front() {
            match item {
                Queued::EndPlayback => self.end_playback(),
                Queued::Key { key, remap, depth } => self.feed_key(key, remap, depth),
            }
        }
    }

    /// Table to consult for the next key, if any
    fn mapping_mode(&self) -> Option<MapMode> {
        if self.parser.awaits_literal() || self.insert.as_ref().map_or(false, |s| s.awaits_register()) {
            return None;
        }
        self.mode.map_mode().filter(|m| !self.mappings.is_empty(*m))
    }

    fn feed_key(&mut self, key: KeyEvent, remap: bool, depth: usize) {
        let map_mode = if remap { self.mapping_mode() } else { None };
        let Some(map_mode) = map_mode else {
            if !self.map_pending.is_empty() {
                // an unmappable key ends the candidate
                self.typeahead
                    .push_front(Queued::Key { key, remap, depth });
                self.flush_pending_mapping(false);
                return;
            }
            self.dispatch_key(key);
            return;
        };

        self.map_pending.push((key, depth));
        let keys: Vec<KeyEvent> = self.map_pending.iter().map(|(k, _)| *k).collect();
        match self.mappings.lookup(map_mode, &keys) {
            MappingLookup::Prefix | MappingLookup::Ambiguous(_) => {
                tracing::trace!(target: "engine.mapping", keys = %keys_to_notation(&keys), "waiting for more keys");
            }
            MappingLookup::Exact(mapping) => self.expand_mapping(mapping),
            MappingLookup::None => self.flush_pending_mapping(false),
        }
    }

    /// Give up on the pending candidate. After a timeout an exact match still expands.
    fn flush_pending_mapping(&mut self, timed_out: bool) {
        if timed_out {
            let keys: Vec<KeyEvent> = self.map_pending.iter().map(|(k, _)| *k).collect();
            if let Some(map_mode) = self.mapping_mode() {
                if let MappingLookup::Ambiguous(mapping) | MappingLookup::Exact(mapping) =
                    self.mappings.lookup(map_mode, &keys)
                {
                    self.expand_mapping(mapping);
                    return;
                }
            }
        }

        let mut pending = std::mem::take(&mut self.map_pending).into_iter();
        let Some((first, _)) = pending.next() else {
            return;
        };
        // the rest may start another mapping
        for (key, depth) in pending.rev() {
            self.typeahead.push_front(Queued::Key {
                key,
                remap: true,
                depth,
            });
        }
        self.dispatch_key(first);
    }

    fn expand_mapping(&mut self, mapping: Mapping) {
        let depth = self.map_pending.iter().map(|(_, d)| *d).max().unwrap_or(0) + 1;
        self.map_pending.clear();
        if depth > self.options.maxmapdepth {
            tracing::warn!(target: "engine.mapping", lhs = %keys_to_notation(&mapping.lhs), depth, "mapping recursion limit");
            self.typeahead.clear();
            self.abort_playback();
            self.set_error(EngineError::RecursiveMapping);
            return;
        }
        tracing::trace!(
            target: "engine.mapping",
            lhs = %keys_to_notation(&mapping.lhs),
            rhs = %keys_to_notation(&mapping.rhs),
            depth,
            "expand"
        );
        let literal_prefix = if mapping.rhs.starts_with(&mapping.lhs) {
            mapping.lhs.len()
        } else {
            0
        };
        for (i, key) in mapping.rhs.iter().enumerate().rev() {
            self.typeahead.push_front(Queued::Key {
                key: *key,
                remap: !mapping.noremap && i >= literal_prefix,
                depth,
            });
        }
    }

    fn dispatch_key(&mut self, key: KeyEvent) {
        tracing::trace!(target: "engine.dispatch", mode = self.mode.as_str(), key = %key_to_notation(&key), "key");
        match self.mode {
            Mode::Normal => self.normal_key(key),
            Mode::Visual | Mode::VisualLine | Mode::VisualBlock => self.visual_key(key),
            Mode::Insert | Mode::Replace => self.insert_key(key),
            Mode::ExCommandLine => self.command_line_key(key),
            Mode::SearchLine => self.search_line_key(key),
        }
    }

    /// Run keys as typed, without mappings from the queue getting in between (`:normal`)
    pub(crate) fn run_nested_keys(&mut self, keys: &[KeyEvent], remap: bool) -> Result<()> {
        if self.normal_depth >= MAX_NORMAL_DEPTH {
            return Err(EngineError::RecursiveMapping);
        }
        let saved_queue = std::mem::take(&mut self.typeahead);
        let saved_pending = std::mem::take(&mut self.map_pending);
        self.normal_depth += 1;

        for key in keys {
            self.typeahead.push_back(Queued::Key {
                key: *key,
                remap,
                depth: 0,
            });
        }
        self.drain_typeahead();
        if !self.map_pending.is_empty() {
            self.flush_pending_mapping(true);
            self.drain_typeahead();
        }
        // an unfinished command is abandoned like an Esc would
        if self.mode != Mode::Normal || self.parser.is_pending() {
            self.typeahead.push_back(Queued::Key {
                key: KeyEvent::from(KeyCode::Esc),
                remap: false,
                depth: 0,
            });
            self.drain_typeahead();
        }

        self.normal_depth -= 1;
        self.map_pending = saved_pending;
        if self.aborted {
            self.abort_playback();
        } else {
            self.typeahead = saved_queue;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Normal mode
    // ------------------------------------------------------------------

    fn normal_key(&mut self, key: KeyEvent) {
        self.pending_keys.push(key);
        let context = ParseContext {
            visual: false,
            block: false,
            recording: self.macros.is_recording(),
        };
        match self.parser.process_key(key, context) {
            KeyAction::Pending => {}
            KeyAction::Cancelled => self.pending_keys.clear(),
            KeyAction::Invalid(reprocess) => {
                let keys = std::mem::take(&mut self.pending_keys);
                match reprocess {
                    Some(key) => self.normal_key(key),
                    None => self.report_error(EngineError::NotAnEditorCommand(keys_to_notation(&keys))),
                }
            }
            KeyAction::Complete(command) => {
                self.pending_keys.clear();
                if let Err(err) = self.run_command(command) {
                    self.report_error(err);
                }
            }
        }
    }

    /// Execute a command, remembering it for `.` when it changes text
    fn run_command(&mut self, command: Command) -> Result<()> {
        let repeatable = !self.replaying && is_repeatable(&command.action);
        self.execute_command(command)?;
        if repeatable {
            let change = LastChange {
                command,
                insert_keys: Vec::new(),
                visual: None,
            };
            if self.mode.is_insert() {
                self.dot_recording = Some(change);
            } else {
                self.last_change = Some(change);
            }
        }
        Ok(())
    }

    fn execute_command(&mut self, command: Command) -> Result<()> {
        tracing::debug!(target: "engine.dispatch", action = ?command.action, count = ?command.count, register = ?command.register, "command");
        let count = command.count_or_one();
        let register = command.register;
        match command.action {
            Action::Motion(motion) => self.run_motion(motion, command.count),
            Action::Operator(op, target) => self.run_operator(op, target, command),
            Action::EnterInsert(position) => self.begin_insert(position, count),
            Action::EnterReplace => self.begin_replace(count),
            Action::DeleteChar => self.delete_chars(count, register),
            Action::ReplaceChar(c) => self.replace_chars(c, count),
            Action::JoinLines { spaces } => {
                let line = self.cursor().line;
                self.join_lines(line, count.max(2), spaces)
            }
            Action::ToggleCaseChar => self.toggle_case_chars(count),
            Action::Put {
                before,
                cursor_after,
            } => self.put(register, before, cursor_after, count),
            Action::Undo => self.undo(count),
            Action::Redo => self.redo(count),
            Action::RepeatLastChange => self.repeat_last_change(command.count),
            Action::SetMark(c) => self.set_mark(c),
            Action::StartRecording(c) => self.start_recording(c),
            Action::StopRecording => self.stop_recording(),
            Action::PlayMacro(c) => self.play_macro(c, count),
            Action::EnterVisual(kind) => {
                self.enter_visual(kind);
                Ok(())
            }
            Action::Reselect => self.reselect(),
            Action::EnterCommandLine => {
                let prefill = match command.count {
                    Some(1) => ".".to_string(),
                    Some(n) => format!(".,.+{}", n - 1),
                    None => String::new(),
                };
                self.open_command_line(&prefill);
                Ok(())
            }
            Action::EnterSearch(direction) => {
                self.open_search(direction);
                Ok(())
            }
            Action::JumpBack => self.jump_back(count),
            Action::JumpForward => self.jump_forward(count),
            Action::RepeatSubstitute => {
                let outcome = self.execute_ex("s")?;
                self.report_outcome(outcome);
                Ok(())
            }
            Action::Ex(line) => {
                let outcome = self.execute_ex(line)?;
                self.report_outcome(outcome);
                Ok(())
            }
            // visual-only actions
            Action::SelectTextObject(_) | Action::SwapSelectionEnds | Action::BlockInsert { .. } => Ok(()),
        }
    }

    pub(crate) fn report_outcome(&mut self, outcome: ExOutcome) {
        match outcome {
            ExOutcome::Done => {}
            ExOutcome::Message(text) => self.set_info(text),
            ExOutcome::Quit(kind) => self.effects.quit = Some(kind),
        }
    }

    // ------------------------------------------------------------------
    // Motions, jumps and marks
    // ------------------------------------------------------------------

    fn run_motion(&mut self, motion: Motion, count: Option<usize>) -> Result<()> {
        let from = self.cursor();
        let Some(target) = self.resolve_motion(motion, count)? else {
            // a failed motion ends a macro the way an error does
            self.abort_keys();
            return Ok(());
        };
        if motion.is_jump() && target != from {
            self.record_jump(from);
        }
        self.place_cursor(motion, target);
        Ok(())
    }

    /// Where a motion lands, including the motions that need engine state
    pub(crate) fn resolve_motion(&mut self, motion: Motion, count: Option<usize>) -> Result<Option<Position>> {
        let n = count.unwrap_or(1).max(1);
        let cursor = self.cursor();
        match motion {
            Motion::MarkExact(c) => self.mark_position(c).map(Some),
            Motion::MarkLine(c) => {
                let pos = self.mark_position(c)?;
                let col = text::first_non_blank(&self.buffer.line_text(pos.line));
                Ok(Some(Position::new(pos.line, col)))
            }
            Motion::SearchNext | Motion::SearchPrev => {
                let pattern = self
                    .search
                    .last_pattern()
                    .ok_or(EngineError::NoPreviousPattern)?
                    .to_string();
                let direction = match motion {
                    Motion::SearchNext => self.search.last_direction(),
                    _ => self.search.last_direction().reverse(),
                };
                // n and N bring back highlighting turned off by :nohlsearch
                self.search.set_last_pattern(&pattern);
                self.search_from(&pattern, direction, cursor, n).map(Some)
            }
            Motion::StarForward | Motion::StarBackward => {
                let (word, start) = self
                    .word_under_cursor()
                    .ok_or(EngineError::NoStringUnderCursor)?;
                let pattern = search::word_pattern(&word);
                let direction = if motion == Motion::StarForward {
                    SearchDirection::Forward
                } else {
                    SearchDirection::Backward
                };
                self.search.set_last(&pattern, direction);
                self.registers.set_last_search(pattern.clone());
                let from = Position::new(cursor.line, start);
                self.search_from(&pattern, direction, from, n).map(Some)
            }
            Motion::RepeatFind | Motion::RepeatFindReverse => {
                let Some((find, target)) = self.parser.last_find() else {
                    return Ok(None);
                };
                let find = if motion == Motion::RepeatFind {
                    find
                } else {
                    find.reversed()
                };
                Ok(find_char(
                    &self.buffer,
                    cursor,
                    target,
                    find.is_forward(),
                    find.is_till(),
                    n,
                    true,
                ))
            }
            _ => Ok(apply_motion(&self.buffer, motion, cursor, n)),
        }
    }

    /// Move the cursor after a motion, keeping the wanted column for `j`/`k`
    fn place_cursor(&mut self, motion: Motion, target: Position) {
        let end_allowed = self.mode.is_visual();
        match motion {
            Motion::Up | Motion::Down => {
                let want = self
                    .desired_col
                    .unwrap_or_else(|| self.display_col(self.cursor()));
                let line = self.buffer.line_text(target.line);
                let len = line.chars().count();
                let col = if want == usize::MAX {
                    len
                } else {
                    text::col_at_display(&line, want, self.options.tabstop).unwrap_or(len)
                };
                let max = if end_allowed && !line.is_empty() && self.mode != Mode::VisualBlock {
                    len - 1
                } else {
                    len.saturating_sub(1)
                };
                self.set_cursor(Position::new(target.line, col.min(max)));
                self.desired_col = Some(want);
            }
            Motion::LineEnd => {
                let pos = self.buffer.clamp_position(target);
                self.set_cursor(pos);
                self.desired_col = Some(usize::MAX);
            }
            _ => self.set_cursor_clamped(target),
        }
    }

    fn display_col(&self, pos: Position) -> usize {
        text::display_col(&self.buffer.line_text(pos.line), pos.col, self.options.tabstop)
    }

    /// Keyword under or after the cursor, and the column it starts at
    fn word_under_cursor(&self) -> Option<(String, usize)> {
        let cursor = self.cursor();
        let chars: Vec<char> = self.buffer.line_text(cursor.line).chars().collect();
        let from = cursor.col.min(chars.len());
        // prefer a keyword; fall back to any non-blank run
        let keyword = (from..chars.len()).any(|i| text::is_word_char(chars[i]));
        let matches = |c: char| {
            if keyword {
                text::is_word_char(c)
            } else {
                !c.is_whitespace()
            }
        };
        let mut start = (from..chars.len()).find(|&i| matches(chars[i]))?;
        if start == from {
            while start > 0 && matches(chars[start - 1]) {
                start -= 1;
            }
        }
        let end = (start..chars.len())
            .find(|&i| !matches(chars[i]))
            .unwrap_or(chars.len());
        Some((chars[start..end].iter().collect(), start))
    }

    /// Search `count` times from `from`, reporting a wrap once
    pub(crate) fn search_from(
        &mut self,
        pattern: &str,
        direction: SearchDirection,
        from: Position,
        count: usize,
    ) -> Result<Position> {
        let mut pos = from;
        let mut wrapped = None;
        for _ in 0..count.max(1) {
            let outcome = self
                .search
                .search(&self.buffer, pattern, direction, pos, self.options.wrapscan)?;
            if let Some(message) = outcome.wrap_message(direction) {
                tracing::debug!(target: "engine.search", pattern, message, "search wrapped");
                wrapped = Some(message);
            }
            pos = outcome.pos;
        }
        if let Some(message) = wrapped {
            self.set_info(message);
        } else {
            self.set_info(format!("{}{}", direction.prompt(), pattern));
        }
        Ok(pos)
    }

    pub(crate) fn record_jump(&mut self, from: Position) {
        self.marks.set(self.buffer_id, '\'', from);
        self.jumps.record(from);
    }

    fn jump_back(&mut self, count: usize) -> Result<()> {
        let mut target = None;
        for _ in 0..count {
            match self.jumps.go_back(self.cursor()) {
                Some(pos) => target = Some(pos),
                None => break,
            }
        }
        if let Some(pos) = target {
            self.set_cursor_clamped(pos);
        }
        Ok(())
    }

    fn jump_forward(&mut self, count: usize) -> Result<()> {
        let mut target = None;
        for _ in 0..count {
            match self.jumps.go_forward() {
                Some(pos) => target = Some(pos),
                None => break,
            }
        }
        if let Some(pos) = target {
            self.set_cursor_clamped(pos);
        }
        Ok(())
    }

    fn set_mark(&mut self, name: char) -> Result<()> {
        if !Marks::is_settable(name) {
            return Err(EngineError::InvalidMark(name));
        }
        self.marks.set(self.buffer_id, name, self.cursor());
        Ok(())
    }

    /// Position of a mark, clamped to the buffer
    pub(crate) fn mark_position(&self, name: char) -> Result<Position> {
        if !Marks::is_valid_mark(name) {
            return Err(EngineError::InvalidMark(name));
        }
        let pos = match self.marks.get(self.buffer_id, name) {
            Some(pos) => pos,
            // before any jump the context mark is the top of the buffer
            None if matches!(name, '\'' | '`') => Position::default(),
            None => return Err(EngineError::MarkNotSet(name)),
        };
        let line = pos.line.min(self.buffer.last_line());
        Ok(Position::new(line, pos.col.min(self.buffer.line_len(line))))
    }

    // ------------------------------------------------------------------
    // Cursor helpers
    // ------------------------------------------------------------------

    pub(crate) fn set_cursor(&mut self, pos: Position) {
        self.buffer.set_cursor_position(pos);
    }

    /// Put the cursor on an existing char and forget the wanted column
    pub(crate) fn set_cursor_clamped(&mut self, pos: Position) {
        let pos = self.buffer.clamp_position(pos);
        self.set_cursor(pos);
        self.desired_col = None;
    }

    /// Cursor to the first non-blank of a line
    pub(crate) fn cursor_to_line(&mut self, line: usize) {
        let line = line.min(self.buffer.last_line());
        let col = text::first_non_blank(&self.buffer.line_text(line));
        self.set_cursor_clamped(Position::new(line, col));
    }

    // ------------------------------------------------------------------
    // Edit primitives: every buffer change goes through these
    // ------------------------------------------------------------------

    /// Insert text and record it
    pub(crate) fn insert_text(&mut self, pos: Position, text: &str) {
        if text.is_empty() {
            return;
        }
        self.buffer.insert_at(pos, text);
        self.record_change(Change::insert(pos, text), None);
    }

    /// Delete `start..end` and record it; returns the removed text
    pub(crate) fn delete_text(&mut self, start: Position, end: Position) -> String {
        self.delete_text_removing(start, end, removed_lines(start, end))
    }

    fn delete_text_removing(&mut self, start: Position, end: Position, removed: Option<RemovedLines>) -> String {
        let old = self.buffer.text_range(start, end);
        if old.is_empty() {
            return old;
        }
        let end = start.advance_over(&old);
        self.buffer.delete_range(start, end);
        self.record_change(Change::delete(start, old.clone()), removed);
        self.jumps.clamp(self.buffer.last_line());
        old
    }

    fn record_change(&mut self, change: Change, removed: Option<RemovedLines>) {
        track_change(&mut self.marks, &change, removed);
        self.marks.set(self.buffer_id, '.', change.start);
        self.modified = true;
        self.undo_stack.record(change.clone());
        self.effects.edits.push(change);
    }

    /// Delete whole lines `first..=last`; returns their text with a trailing newline
    pub(crate) fn delete_lines(&mut self, first: usize, last: usize) -> String {
        let last_line = self.buffer.last_line();
        let last = last.min(last_line);
        let mut text = self.buffer.lines_text(first, last).join("\n");
        text.push('\n');
        let removed = Some(RemovedLines { first, last });
        let (start, end) = if last < last_line {
            (Position::new(first, 0), Position::new(last + 1, 0))
        } else if first > 0 {
            (
                Position::new(first - 1, self.buffer.line_len(first - 1)),
                Position::new(last, self.buffer.line_len(last)),
            )
        } else {
            (Position::new(0, 0), Position::new(last, self.buffer.line_len(last)))
        };
        self.delete_text_removing(start, end, removed);
        text
    }

    /// Insert whole lines below `line`; returns the index of the first new line
    pub(crate) fn insert_lines_below(&mut self, line: usize, text: &str) -> usize {
        let body = text.strip_suffix('\n').unwrap_or(text);
        let len = self.buffer.line_len(line);
        self.insert_text(Position::new(line, len), &format!("\n{body}"));
        line + 1
    }

    /// Insert whole lines above `line`; returns the index of the first new line
    pub(crate) fn insert_lines_above(&mut self, line: usize, text: &str) -> usize {
        let body = text.strip_suffix('\n').unwrap_or(text);
        self.insert_text(Position::new(line, 0), &format!("{body}\n"));
        line
    }

    /// Replace the text of one line, touching only the part that differs
    pub(crate) fn set_line(&mut self, line: usize, new: &str) {
        let old: Vec<char> = self.buffer.line_text(line).chars().collect();
        let new: Vec<char> = new.chars().collect();
        if old == new {
            return;
        }
        let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
        let max_suffix = old.len().min(new.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();
        let start = Position::new(line, prefix);
        self.delete_text(start, Position::new(line, old.len() - suffix));
        let inserted: String = new[prefix..new.len() - suffix].iter().collect();
        self.insert_text(start, &inserted);
    }

    /// Run `f` as one undo step; on error its edits are rolled back
    pub(crate) fn with_group<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let cursor = self.cursor();
        let handle = self.undo_stack.begin(cursor);
        let marks = self.marks.clone();
        let edits = self.effects.edits.len();
        let modified = self.modified;
        match f(self) {
            Ok(value) => {
                let after = self.cursor();
                self.undo_stack.commit(handle, after);
                Ok(value)
            }
            Err(err) => {
                self.undo_stack.rollback(handle, &mut self.buffer);
                self.marks = marks;
                self.effects.edits.truncate(edits);
                self.modified = modified;
                let cursor = self.buffer.clamp_position(cursor);
                self.set_cursor(cursor);
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    pub(crate) fn undo(&mut self, count: usize) -> Result<()> {
        self.with_history_unlocked(|engine| {
            for _ in 0..count.max(1) {
                let marks = &mut engine.marks;
                let edits = &mut engine.effects.edits;
                let cursor = engine
                    .undo_stack
                    .undo_observed(&mut engine.buffer, &mut |change: &Change| {
                        track_change(marks, change, None);
                        edits.push(change.clone());
                    });
                match cursor {
                    Some(pos) => {
                        engine.modified = true;
                        engine.set_cursor_clamped(pos);
                    }
                    None => {
                        engine.set_info("Already at oldest change");
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    pub(crate) fn redo(&mut self, count: usize) -> Result<()> {
        self.with_history_unlocked(|engine| {
            for _ in 0..count.max(1) {
                let marks = &mut engine.marks;
                let edits = &mut engine.effects.edits;
                let cursor = engine
                    .undo_stack
                    .redo_observed(&mut engine.buffer, &mut |change: &Change| {
                        track_change(marks, change, None);
                        edits.push(change.clone());
                    });
                match cursor {
                    Some(pos) => {
                        engine.modified = true;
                        engine.set_cursor_clamped(pos);
                    }
                    None => {
                        engine.set_info("Already at newest change");
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    /// Undo inside a macro: close the playback groups around it and reopen them after
    fn with_history_unlocked(&mut self, f: impl FnOnce(&mut Self)) {
        let reopen = self.playback_groups.len();
        while let Some(handle) = self.playback_groups.pop() {
            let cursor = self.cursor();
            self.undo_stack.commit(handle, cursor);
        }
        f(self);
        for _ in 0..reopen {
            let handle = self.undo_stack.begin(self.cursor());
            self.playback_groups.push(handle);
        }
    }

    // ------------------------------------------------------------------
    // Macros
    // ------------------------------------------------------------------

    fn start_recording(&mut self, register: char) -> Result<()> {
        self.macros.start_recording(register)?;
        tracing::debug!(target: "engine.macro", %register, "recording");
        self.set_info(format!("recording @{register}"));
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        if let Some((register, keys)) = self.macros.stop_recording() {
            let text = keys_to_notation(&keys);
            tracing::debug!(target: "engine.macro", %register, keys = %text, "recorded");
            self.registers.set(register, RegisterContent::chars(text))?;
        }
        Ok(())
    }

    fn play_macro(&mut self, register: char, count: usize) -> Result<()> {
        let register = match register {
            '@' => self
                .macros
                .last_executed()
                .ok_or(EngineError::NoPreviousRegister)?,
            c => c,
        };

        if register == ':' {
            let line = self.registers.get(':').text;
            if line.is_empty() {
                return Err(EngineError::EmptyRegister(':'));
            }
            self.macros.begin_playback(':', self.options.maxmapdepth)?;
            self.macros.end_playback();
            for _ in 0..count {
                let outcome = self.execute_ex(&line)?;
                self.report_outcome(outcome);
            }
            return Ok(());
        }

        if !Registers::is_valid_name(register) {
            return Err(EngineError::InvalidRegister(register));
        }
        let content = self.registers.get(register);
        if content.is_empty() {
            return Err(EngineError::EmptyRegister(register));
        }
        let keys = parse_key_sequence(&content.text);
        operator::repeated_len(keys.len(), count)?;
        self.macros
            .begin_playback(register, self.options.maxmapdepth)?;
        tracing::debug!(target: "engine.macro", %register, count, depth = self.macros.depth(), "playing");

        let handle = self.undo_stack.begin(self.cursor());
        self.playback_groups.push(handle);
        self.typeahead.push_front(Queued::EndPlayback);
        for _ in 0..count {
            for key in keys.iter().rev() {
                self.typeahead.push_front(Queued::Key {
                    key: *key,
                    remap: true,
                    depth: 0,
                });
            }
        }
        Ok(())
    }

    fn end_playback(&mut self) {
        self.macros.end_playback();
        if let Some(handle) = self.playback_groups.pop() {
            self.close_group(handle);
        }
    }

    /// Stop every running macro after an error
    fn abort_playback(&mut self) {
        while self.macros.is_playing() {
            self.end_playback();
        }
    }

    /// Commit a group now, or after the insert session running inside it
    fn close_group(&mut self, handle: GroupHandle) {
        if self.insert.as_ref().map_or(false, |s| s.has_group()) {
            self.deferred_groups.push(handle);
        } else {
            let cursor = self.cursor();
            self.undo_stack.commit(handle, cursor);
        }
    }

    // ------------------------------------------------------------------
    // Dot repeat
    // ------------------------------------------------------------------

    fn repeat_last_change(&mut self, count: Option<usize>) -> Result<()> {
        let Some(mut change) = self.last_change.clone() else {
            return Ok(());
        };
        if count.is_some() {
            change.command.count = count;
        }
        tracing::debug!(target: "engine.dispatch", action = ?change.command.action, "repeat");
        self.replaying = true;
        let result = self.with_group(|engine| engine.replay_change(&change));
        self.replaying = false;
        if result.is_ok() {
            if let Some(last) = self.last_change.as_mut() {
                last.command.count = change.command.count;
            }
        }
        result
    }

    fn replay_change(&mut self, change: &LastChange) -> Result<()> {
        match change.visual {
            Some(extent) => self.repeat_visual(change.command, extent)?,
            None => self.execute_command(change.command)?,
        }
        for key in &change.insert_keys {
            if !self.mode.is_insert() {
                break;
            }
            self.insert_key(*key);
        }
        if self.mode.is_insert() {
            self.finish_insert();
        }
        Ok(())
    }

    /// An insert session ended: its keys complete the change for `.`
    pub(crate) fn finish_dot_recording(&mut self) {
        if let Some(change) = self.dot_recording.take() {
            self.last_change = Some(change);
        }
    }

    pub(crate) fn record_insert_key(&mut self, key: KeyEvent) {
        if self.replaying {
            return;
        }
        if let Some(change) = self.dot_recording.as_mut() {
            change.insert_keys.push(key);
        }
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub(crate) fn set_info(&mut self, text: impl Into<String>) {
        let message = StatusMessage::info(text);
        self.status = Some(message.clone());
        if self.effects.errors.is_empty() {
            self.effects.status = Some(message);
        }
    }

    pub(crate) fn set_error(&mut self, err: EngineError) {
        tracing::debug!(target: "engine.dispatch", error = %err, category = ?err.category(), "command failed");
        let message = StatusMessage::error(err.to_string());
        self.status = Some(message.clone());
        self.effects.errors.push(message.clone());
        self.effects.status = Some(message);
    }

    /// Report a failed command; a running macro or `:normal` stops here
    pub(crate) fn report_error(&mut self, err: EngineError) {
        self.set_error(err);
        self.abort_keys();
    }

    /// Drop the rest of a running macro or `:normal`
    fn abort_keys(&mut self) {
        if self.macros.is_playing() || self.normal_depth > 0 {
            tracing::debug!(target: "engine.macro", "aborting playback");
            self.typeahead.clear();
            self.map_pending.clear();
            self.abort_playback();
            self.aborted = true;
        }
    }
}

fn is_repeatable(action: &Action) -> bool {
    match action {
        Action::Operator(op, _) => op.is_change(),
        Action::DeleteChar
        | Action::ReplaceChar(_)
        | Action::JoinLines { .. }
        | Action::ToggleCaseChar
        | Action::Put { .. }
        | Action::EnterInsert(_)
        | Action::EnterReplace => true,
        _ => false,
    }
}

/// Whole lines a charwise deletion removes, for dropping their marks
fn removed_lines(start: Position, end: Position) -> Option<RemovedLines> {
    if end.line <= start.line {
        return None;
    }
    let first = if start.col == 0 { start.line } else { start.line + 1 };
    let last = end.line - 1;
    (first <= last).then_some(RemovedLines { first, last })
}

/// Move marks for a change already applied to the buffer
fn track_change(marks: &mut Marks, change: &Change, removed: Option<RemovedLines>) {
    if !change.old_text.is_empty() {
        let end = change.start.advance_over(&change.old_text);
        let removed = removed.or_else(|| removed_lines(change.start, end));
        marks.adjust_for_delete(change.start, end, removed);
    }
    if !change.new_text.is_empty() {
        marks.adjust_for_insert(change.start, &change.new_text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryFileIo;

    fn engine(text: &str) -> Engine<Buffer> {
        Engine::new(Buffer::from_text(text), Box::new(MemoryFileIo::new()))
    }

    fn lines(engine: &Engine<Buffer>) -> Vec<String> {
        engine.buffer().lines()
    }

    #[test]
    fn test_motion_moves_cursor() {
        let mut e = engine("one two three\nfour");
        e.handle_keys("w");
        assert_eq!(e.cursor(), Position::new(0, 4));
        e.handle_keys("2w");
        assert_eq!(e.cursor(), Position::new(1, 0));
        e.handle_keys("$");
        assert_eq!(e.cursor(), Position::new(1, 3));
    }

    #[test]
    fn test_vertical_motion_keeps_column() {
        let mut e = engine("long line here\nab\nanother long line");
        e.handle_keys("10l");
        e.handle_keys("j");
        assert_eq!(e.cursor(), Position::new(1, 1));
        e.handle_keys("j");
        assert_eq!(e.cursor(), Position::new(2, 10));
    }

    #[test]
    fn test_dollar_sticks_to_line_end() {
        let mut e = engine("abc\nabcdef\nab");
        e.handle_keys("$j");
        assert_eq!(e.cursor(), Position::new(1, 5));
        e.handle_keys("j");
        assert_eq!(e.cursor(), Position::new(2, 1));
    }

    #[test]
    fn test_invalid_sequence_reports() {
        let mut e = engine("text");
        let effects = e.handle_keys("Q");
        let status = effects.status.unwrap();
        assert!(status.is_error);
        assert!(status.text.starts_with("Not an editor command"));
        assert_eq!(lines(&e), vec!["text"]);
    }

    #[test]
    fn test_marks_and_jumps() {
        let mut e = engine("a\nb\nc\nd");
        e.handle_keys("jma");
        e.handle_keys("G");
        assert_eq!(e.cursor().line, 3);
        e.handle_keys("'a");
        assert_eq!(e.cursor().line, 1);
        e.handle_keys("''");
        assert_eq!(e.cursor().line, 3);
        e.handle_keys("<C-o>");
        assert_eq!(e.cursor().line, 1);

        let effects = e.handle_keys("'z");
        assert_eq!(effects.status.unwrap().text, "Mark not set");
    }

    #[test]
    fn test_marks_follow_line_deletion() {
        let mut e = engine("a\nb\nc\nd");
        e.handle_keys("Gmakk");
        e.handle_keys("dd");
        assert_eq!(e.marks().get(e.buffer_id(), 'a'), Some(Position::new(2, 0)));
        e.handle_keys("u");
        assert_eq!(e.marks().get(e.buffer_id(), 'a'), Some(Position::new(3, 0)));
    }

    #[test]
    fn test_star_searches_word() {
        let mut e = engine("foo bar\nfoobar\nbar foo");
        let effects = e.handle_keys("*");
        assert_eq!(e.cursor(), Position::new(2, 4));
        assert_eq!(effects.status.unwrap().text, "/\\<foo\\>");
        let effects = e.handle_keys("n");
        assert_eq!(e.cursor(), Position::new(0, 0));
        assert_eq!(
            effects.status.unwrap().text,
            "search hit BOTTOM, continuing at TOP"
        );
    }

    #[test]
    fn test_mapping_expands() {
        let mut e = engine("one two");
        e.handle_keys(":nmap Q dw<CR>");
        e.handle_keys("Q");
        assert_eq!(lines(&e), vec!["two"]);
    }

    #[test]
    fn test_mapping_prefix_waits_for_timeout() {
        let mut e = engine("abc");
        e.handle_keys(":nnoremap x $<CR>");
        e.handle_keys(":nnoremap xy 0<CR>");
        e.handle_keys("x");
        assert_eq!(e.cursor(), Position::new(0, 0));
        e.timeout();
        assert_eq!(e.cursor(), Position::new(0, 2));
    }

    #[test]
    fn test_recursive_mapping_is_reported() {
        let mut e = engine("abc");
        e.handle_keys(":map x y<CR>");
        e.handle_keys(":map y x<CR>");
        let effects = e.handle_keys("x");
        assert_eq!(effects.status.unwrap().text, "Recursive mapping");
        assert_eq!(lines(&e), vec!["abc"]);
    }

    #[test]
    fn test_rhs_starting_with_lhs_does_not_loop() {
        let mut e = engine("one two");
        e.handle_keys(":nmap d dw<CR>");
        e.handle_keys("d");
        assert_eq!(lines(&e), vec!["two"]);
    }

    #[test]
    fn test_record_and_play_macro() {
        let mut e = engine("1\n2\n3\n4");
        e.handle_keys("qaA!<Esc>jq");
        assert_eq!(e.registers().get('a').text, "A!<Esc>j");
        e.handle_keys("2@a");
        assert_eq!(lines(&e), vec!["1!", "2!", "3!", "4"]);
        e.handle_keys("@@");
        assert_eq!(lines(&e), vec!["1!", "2!", "3!", "4!"]);
    }

    #[test]
    fn test_macro_is_one_undo_step() {
        let mut e = engine("a b c");
        e.handle_keys("qqxq");
        e.handle_keys("3@q");
        assert_eq!(lines(&e), vec!["c"]);
        e.handle_keys("u");
        assert_eq!(lines(&e), vec![" b c"]);
    }

    #[test]
    fn test_macro_stops_on_error() {
        let mut e = engine("ax\nbx\ncy");
        e.registers_mut()
            .set('a', RegisterContent::chars("0fxrZj"))
            .unwrap();
        e.handle_keys("5@a");
        assert_eq!(lines(&e), vec!["aZ", "bZ", "cy"]);
        // nothing left queued
        e.handle_keys("x");
        assert_eq!(lines(&e), vec!["aZ", "bZ", "y"]);
    }

    #[test]
    fn test_recursive_macro_is_bounded() {
        let mut e = engine("abc");
        let mut options = Options::default();
        options.maxmapdepth = 20;
        e.set_options(options);
        e.registers_mut().set('a', RegisterContent::chars("@a")).unwrap();
        let effects = e.handle_keys("@a");
        assert_eq!(effects.status.unwrap().text, "Recursive macro");
    }

    #[test]
    fn test_oversized_macro_count_is_refused() {
        let mut e = engine("abc");
        e.registers_mut().set('a', RegisterContent::chars("x")).unwrap();
        let effects = e.handle_keys("99999999999999@a");
        assert_eq!(effects.status.unwrap().text, "Resulting text too long");
        assert_eq!(lines(&e), vec!["abc"]);
        e.handle_keys("2@a");
        assert_eq!(lines(&e), vec!["c"]);
    }

    #[test]
    fn test_merged_effects_keep_errors() {
        let mut e = engine("foo");
        let effects = e.handle_keys("'q/foo<CR>");
        assert_eq!(effects.status.as_ref().unwrap().text, "Mark not set");
        assert!(effects.status.unwrap().is_error);
        assert_eq!(effects.errors.len(), 1);

        let effects = e.handle_keys("/foo<CR>");
        assert!(effects.errors.is_empty());
        assert!(!effects.status.unwrap().is_error);
    }

    #[test]
    fn test_cannot_record_into_playing_register() {
        let mut e = engine("abc");
        e.registers_mut().set('a', RegisterContent::chars("qa")).unwrap();
        let effects = e.handle_keys("@a");
        let status = effects.status.unwrap();
        assert!(status.is_error);
        assert!(status.text.contains("while it is playing"));
    }

    #[test]
    fn test_dot_repeats_insert() {
        let mut e = engine("a\nb");
        e.handle_keys("A!<Esc>j.");
        assert_eq!(lines(&e), vec!["a!", "b!"]);
    }

    #[test]
    fn test_dot_with_new_count() {
        let mut e = engine("abcdefgh");
        e.handle_keys("2x");
        e.handle_keys("3.");
        assert_eq!(lines(&e), vec!["fgh"]);
        e.handle_keys(".");
        assert_eq!(lines(&e), vec![""]);
    }

    #[test]
    fn test_undo_redo_messages() {
        let mut e = engine("abc");
        let effects = e.handle_keys("u");
        assert_eq!(effects.status.unwrap().text, "Already at oldest change");
        let effects = e.handle_keys("<C-r>");
        assert_eq!(effects.status.unwrap().text, "Already at newest change");
    }

    #[test]
    fn test_effects_report_mode_change_and_edits() {
        let mut e = engine("abc");
        let effects = e.handle_keys("i");
        assert_eq!(effects.mode_change, Some((Mode::Normal, Mode::Insert)));
        let effects = e.handle_keys("x");
        assert_eq!(effects.edits, vec![Change::insert(Position::new(0, 0), "x")]);
        let effects = e.handle_keys("<Esc>");
        assert_eq!(effects.mode_change, Some((Mode::Insert, Mode::Normal)));
    }

    #[test]
    fn test_swap_buffer_invalidates_marks() {
        let mut e = engine("a\nb");
        e.handle_keys("jma");
        let old = e.swap_buffer(Buffer::from_text("x\ny\nz"), None);
        assert_eq!(old.lines(), vec!["a", "b"]);
        let effects = e.handle_keys("'a");
        assert!(effects.status.unwrap().is_error);
        assert!(!e.can_undo());
    }

    #[test]
    fn test_settings_mappings_apply() {
        let mut e = engine("one two");
        let settings = crate::config::parse_settings(
            "[[mappings]]\nmode = \"normal\"\nfrom = \"Q\"\nto = \"dw\"\n",
        )
        .unwrap();
        e.apply_settings(&settings);
        e.handle_keys("Q");
        assert_eq!(lines(&e), vec!["two"]);
    }
}
