pub mod motion;

pub use motion::{apply_motion, Motion, MotionKind};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::editor::search::SearchDirection;
use crate::editor::text_object::{TextObject, TextObjectModifier, TextObjectType};

/// Type of find char command (f, F, t, T)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindCharType {
    Forward,      // f - find forward, land on char
    Backward,     // F - find backward, land on char
    TillForward,  // t - find forward, land before char
    TillBackward, // T - find backward, land after char
}

impl FindCharType {
    pub fn reversed(self) -> Self {
        match self {
            FindCharType::Forward => FindCharType::Backward,
            FindCharType::Backward => FindCharType::Forward,
            FindCharType::TillForward => FindCharType::TillBackward,
            FindCharType::TillBackward => FindCharType::TillForward,
        }
    }

    pub fn is_forward(self) -> bool {
        matches!(self, FindCharType::Forward | FindCharType::TillForward)
    }

    pub fn is_till(self) -> bool {
        matches!(self, FindCharType::TillForward | FindCharType::TillBackward)
    }
}

/// Operators that can be combined with motions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Delete,     // d
    Change,     // c
    Yank,       // y
    Indent,     // >
    Dedent,     // <
    Reindent,   // =
    Lowercase,  // gu
    Uppercase,  // gU
    ToggleCase, // g~
}

impl Operator {
    fn from_key(c: char) -> Option<Self> {
        Some(match c {
            'd' => Operator::Delete,
            'c' => Operator::Change,
            'y' => Operator::Yank,
            '>' => Operator::Indent,
            '<' => Operator::Dedent,
            '=' => Operator::Reindent,
            _ => return None,
        })
    }

    fn from_g_key(c: char) -> Option<Self> {
        Some(match c {
            '~' => Operator::ToggleCase,
            'u' => Operator::Lowercase,
            'U' => Operator::Uppercase,
            _ => return None,
        })
    }

    /// Second key of `g~~`, `guu`, `gUU`
    fn case_double(self) -> Option<char> {
        match self {
            Operator::ToggleCase => Some('~'),
            Operator::Lowercase => Some('u'),
            Operator::Uppercase => Some('U'),
            _ => None,
        }
    }

    /// Operators that modify the buffer
    pub fn is_change(self) -> bool {
        self != Operator::Yank
    }
}

/// Which visual mode to enter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualKind {
    Char,
    Line,
    Block,
}

/// What an operator acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorTarget {
    Motion(Motion),
    TextObject(TextObject),
    /// Doubled operator (`dd`, `>>`): count lines
    Line,
    /// The visual selection
    Selection,
    /// The visual selection extended to whole lines (`D`, `X`, `Y` in visual mode)
    SelectionLines,
}

/// Where to position cursor when entering insert mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    AtCursor,     // i
    AfterCursor,  // a
    LineStart,    // I
    LineEnd,      // A
    NewLineBelow, // o
    NewLineAbove, // O
}

/// A complete command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Motion(Motion),
    Operator(Operator, OperatorTarget),
    /// Select a text object in visual mode
    SelectTextObject(TextObject),
    EnterInsert(InsertPosition),
    /// Delete character at cursor (x)
    DeleteChar,
    /// Replace character at cursor with given char (r)
    ReplaceChar(char),
    /// J (with spaces) and gJ (without)
    JoinLines { spaces: bool },
    /// ~ in normal mode
    ToggleCaseChar,
    /// p P gp gP
    Put { before: bool, cursor_after: bool },
    Undo,
    Redo,
    /// Repeat last change (.)
    RepeatLastChange,
    SetMark(char),
    StartRecording(char),
    StopRecording,
    /// @x, with '@' meaning the last executed register
    PlayMacro(char),
    EnterReplace,
    EnterVisual(VisualKind),
    /// gv
    Reselect,
    EnterCommandLine,
    EnterSearch(SearchDirection),
    /// Jump back in jump list (Ctrl+o)
    JumpBack,
    /// Jump forward in jump list (Ctrl+i)
    JumpForward,
    /// & - repeat last :s on the current line
    RepeatSubstitute,
    /// Normal-mode shorthand for an ex command (ZZ, ZQ)
    Ex(&'static str),
    /// o in visual mode
    SwapSelectionEnds,
    /// I / A in visual block mode
    BlockInsert { append: bool },
}

/// A parsed command with its count and register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// Product of the counts before and after the operator; None when neither was typed
    pub count: Option<usize>,
    pub register: Option<char>,
    pub action: Action,
}

impl Command {
    pub fn count_or_one(&self) -> usize {
        self.count.unwrap_or(1).max(1)
    }
}

/// Result of processing a key in normal or visual mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Key was consumed but more input is needed
    Pending,
    /// A command is ready to run
    Complete(Command),
    /// Escape cleared the pending state
    Cancelled,
    /// The sequence is not a command; a returned key starts a new one
    Invalid(Option<KeyEvent>),
}

/// Mode information the parser needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseContext {
    /// Visual modes apply operators to the selection directly
    pub visual: bool,
    /// Visual block mode (`I`/`A` insert on every line)
    pub block: bool,
    /// `q` stops an active recording
    pub recording: bool,
}

/// Key waiting for a follow-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartialKey {
    G,
    Z,
    Register,
    SetMark,
    MarkJump { exact: bool },
    Find(FindCharType),
    Replace,
    Record,
    Play,
    TextObject(TextObjectModifier),
}

/// Accumulates keys until they form a command:
/// `[count] ["x] [operator [count]] motion` or `[count] ["x] command`
#[derive(Debug, Clone, Default)]
pub struct PendingCommand {
    /// Accumulated count (e.g., "23" in "23j")
    count: Option<usize>,
    /// Selected register for the next operation
    register: Option<char>,
    /// Pending operator (e.g., 'd' waiting for motion in "dw")
    operator: Option<Operator>,
    /// Count typed after the operator ("3" in "d3w")
    operator_count: Option<usize>,
    partial: Option<PartialKey>,
    /// Last find char command for repeating with ; and ,
    last_find_char: Option<(FindCharType, char)>,
}

impl PendingCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset input state (preserves last_find_char for ; and , repeats)
    pub fn reset(&mut self) {
        self.count = None;
        self.register = None;
        self.operator = None;
        self.operator_count = None;
        self.partial = None;
    }

    /// Whether any key has been accumulated
    pub fn is_pending(&self) -> bool {
        self.count.is_some() || self.register.is_some() || self.operator.is_some() || self.partial.is_some()
    }

    /// The next key is taken literally (`r`, `f`, `m`, `"`, `q`, `@` targets)
    pub fn awaits_literal(&self) -> bool {
        matches!(
            self.partial,
            Some(
                PartialKey::Register
                    | PartialKey::SetMark
                    | PartialKey::MarkJump { .. }
                    | PartialKey::Find(_)
                    | PartialKey::Replace
                    | PartialKey::Record
                    | PartialKey::Play
            )
        )
    }

    pub fn pending_operator(&self) -> Option<Operator> {
        self.operator
    }

    pub fn last_find(&self) -> Option<(FindCharType, char)> {
        self.last_find_char
    }

    pub fn set_last_find(&mut self, find: FindCharType, target: char) {
        self.last_find_char = Some((find, target));
    }

    fn total_count(&self) -> Option<usize> {
        match (self.count, self.operator_count) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(1).saturating_mul(b.unwrap_or(1))),
        }
    }

    /// Process a digit for count accumulation
    fn accumulate_count(&mut self, digit: u32) {
        let slot = if self.operator.is_some() {
            &mut self.operator_count
        } else {
            &mut self.count
        };
        *slot = Some(slot.unwrap_or(0).saturating_mul(10).saturating_add(digit as usize));
    }

    fn has_digits(&self) -> bool {
        if self.operator.is_some() {
            self.operator_count.is_some()
        } else {
            self.count.is_some()
        }
    }

    fn complete(&mut self, action: Action) -> KeyAction {
        let command = Command {
            count: self.total_count(),
            register: self.register,
            action,
        };
        self.reset();
        KeyAction::Complete(command)
    }

    fn invalid(&mut self, reprocess: Option<KeyEvent>) -> KeyAction {
        self.reset();
        KeyAction::Invalid(reprocess)
    }

    /// Standalone commands are not valid while an operator waits for its motion
    fn standalone(&mut self, action: Action) -> KeyAction {
        if self.operator.is_some() {
            return self.invalid(None);
        }
        self.complete(action)
    }

    fn motion_or_operator(&mut self, motion: Motion) -> KeyAction {
        let count = self.total_count();
        // {count}G and {count}gg address a line
        let motion = match (motion, count) {
            (Motion::FileEnd | Motion::FileStart, Some(n)) => Motion::GotoLine(n),
            (m, _) => m,
        };
        match self.operator {
            Some(op) => self.complete(Action::Operator(op, OperatorTarget::Motion(motion))),
            None => self.complete(Action::Motion(motion)),
        }
    }

    fn operator_key(&mut self, op: Operator, context: ParseContext, key: KeyEvent) -> KeyAction {
        if context.visual {
            return self.complete(Action::Operator(op, OperatorTarget::Selection));
        }
        match self.operator {
            None => {
                self.operator = Some(op);
                KeyAction::Pending
            }
            Some(pending) if pending == op => self.complete(Action::Operator(op, OperatorTarget::Line)),
            Some(_) => self.invalid(Some(key)),
        }
    }

    /// Process a key in normal or visual mode
    pub fn process_key(&mut self, key: KeyEvent, context: ParseContext) -> KeyAction {
        if key.code == KeyCode::Esc {
            self.reset();
            return KeyAction::Cancelled;
        }

        if let Some(partial) = self.partial.take() {
            return self.handle_partial(partial, key, context);
        }

        let mods = key.modifiers;
        let ch = match key.code {
            KeyCode::Char(c) if mods == KeyModifiers::NONE => Some(c),
            _ => None,
        };

        // Digits for count (but '0' is line start if no count started)
        if let Some(c @ '0'..='9') = ch {
            if c != '0' || self.has_digits() {
                self.accumulate_count(c.to_digit(10).unwrap_or(0));
                return KeyAction::Pending;
            }
        }

        if let Some(c) = ch {
            if let Some(op) = Operator::from_key(c) {
                return self.operator_key(op, context, key);
            }
            // guu, gUU, g~~
            if let Some(op) = self.operator.filter(|op| op.case_double() == Some(c)) {
                return self.complete(Action::Operator(op, OperatorTarget::Line));
            }
        }

        if let Some(motion) = Self::simple_motion(key) {
            return self.motion_or_operator(motion);
        }

        if context.visual {
            if let Some(action) = self.visual_key(key, context) {
                return action;
            }
        }

        match (mods, key.code) {
            // Register selection with "
            (KeyModifiers::NONE, KeyCode::Char('"')) if self.operator.is_none() => {
                self.partial = Some(PartialKey::Register);
                KeyAction::Pending
            }

            (KeyModifiers::NONE, KeyCode::Char('g')) => {
                self.partial = Some(PartialKey::G);
                KeyAction::Pending
            }
            (KeyModifiers::NONE, KeyCode::Char('Z')) if self.operator.is_none() => {
                self.partial = Some(PartialKey::Z);
                KeyAction::Pending
            }

            // Find char motions (f, F, t, T)
            (KeyModifiers::NONE, KeyCode::Char(c @ ('f' | 'F' | 't' | 'T'))) => {
                let find = match c {
                    'f' => FindCharType::Forward,
                    'F' => FindCharType::Backward,
                    't' => FindCharType::TillForward,
                    _ => FindCharType::TillBackward,
                };
                self.partial = Some(PartialKey::Find(find));
                KeyAction::Pending
            }
            (KeyModifiers::NONE, KeyCode::Char('`')) => {
                self.partial = Some(PartialKey::MarkJump { exact: true });
                KeyAction::Pending
            }
            (KeyModifiers::NONE, KeyCode::Char('\'')) => {
                self.partial = Some(PartialKey::MarkJump { exact: false });
                KeyAction::Pending
            }

            // Text objects after an operator
            (KeyModifiers::NONE, KeyCode::Char('i')) if self.operator.is_some() => {
                self.partial = Some(PartialKey::TextObject(TextObjectModifier::Inner));
                KeyAction::Pending
            }
            (KeyModifiers::NONE, KeyCode::Char('a')) if self.operator.is_some() => {
                self.partial = Some(PartialKey::TextObject(TextObjectModifier::Around));
                KeyAction::Pending
            }

            // Insert mode entry
            (KeyModifiers::NONE, KeyCode::Char('i')) | (KeyModifiers::NONE, KeyCode::Insert) => {
                self.standalone(Action::EnterInsert(InsertPosition::AtCursor))
            }
            (KeyModifiers::NONE, KeyCode::Char('a')) => self.standalone(Action::EnterInsert(InsertPosition::AfterCursor)),
            (KeyModifiers::NONE, KeyCode::Char('I')) => self.standalone(Action::EnterInsert(InsertPosition::LineStart)),
            (KeyModifiers::NONE, KeyCode::Char('A')) => self.standalone(Action::EnterInsert(InsertPosition::LineEnd)),
            (KeyModifiers::NONE, KeyCode::Char('o')) => self.standalone(Action::EnterInsert(InsertPosition::NewLineBelow)),
            (KeyModifiers::NONE, KeyCode::Char('O')) => self.standalone(Action::EnterInsert(InsertPosition::NewLineAbove)),

            // Shorthands for operators
            (KeyModifiers::NONE, KeyCode::Char('x')) | (KeyModifiers::NONE, KeyCode::Delete) => {
                self.standalone(Action::DeleteChar)
            }
            (KeyModifiers::NONE, KeyCode::Char('X')) => {
                self.standalone(Action::Operator(Operator::Delete, OperatorTarget::Motion(Motion::Left)))
            }
            // D = d$ (delete to end of line)
            (KeyModifiers::NONE, KeyCode::Char('D')) => {
                self.standalone(Action::Operator(Operator::Delete, OperatorTarget::Motion(Motion::LineEnd)))
            }
            // C = c$ (change to end of line)
            (KeyModifiers::NONE, KeyCode::Char('C')) => {
                self.standalone(Action::Operator(Operator::Change, OperatorTarget::Motion(Motion::LineEnd)))
            }
            // s = cl
            (KeyModifiers::NONE, KeyCode::Char('s')) => {
                self.standalone(Action::Operator(Operator::Change, OperatorTarget::Motion(Motion::Right)))
            }
            // S = cc
            (KeyModifiers::NONE, KeyCode::Char('S')) => {
                self.standalone(Action::Operator(Operator::Change, OperatorTarget::Line))
            }
            // Y = yy (yank line) - vim behavior
            (KeyModifiers::NONE, KeyCode::Char('Y')) => {
                self.standalone(Action::Operator(Operator::Yank, OperatorTarget::Line))
            }

            (KeyModifiers::NONE, KeyCode::Char('r')) if self.operator.is_none() => {
                self.partial = Some(PartialKey::Replace);
                KeyAction::Pending
            }
            (KeyModifiers::NONE, KeyCode::Char('R')) => self.standalone(Action::EnterReplace),
            (KeyModifiers::NONE, KeyCode::Char('J')) => self.standalone(Action::JoinLines { spaces: true }),
            (KeyModifiers::NONE, KeyCode::Char('~')) => self.standalone(Action::ToggleCaseChar),
            (KeyModifiers::NONE, KeyCode::Char('p')) => self.standalone(Action::Put {
                before: false,
                cursor_after: false,
            }),
            (KeyModifiers::NONE, KeyCode::Char('P')) => self.standalone(Action::Put {
                before: true,
                cursor_after: false,
            }),
            (KeyModifiers::NONE, KeyCode::Char('u')) => self.standalone(Action::Undo),
            (KeyModifiers::CONTROL, KeyCode::Char('r')) => self.standalone(Action::Redo),
            (KeyModifiers::NONE, KeyCode::Char('.')) => self.standalone(Action::RepeatLastChange),

            (KeyModifiers::NONE, KeyCode::Char('m')) if self.operator.is_none() => {
                self.partial = Some(PartialKey::SetMark);
                KeyAction::Pending
            }
            (KeyModifiers::NONE, KeyCode::Char('q')) if self.operator.is_none() => {
                if context.recording {
                    self.complete(Action::StopRecording)
                } else {
                    self.partial = Some(PartialKey::Record);
                    KeyAction::Pending
                }
            }
            (KeyModifiers::NONE, KeyCode::Char('@')) if self.operator.is_none() => {
                self.partial = Some(PartialKey::Play);
                KeyAction::Pending
            }

            (KeyModifiers::NONE, KeyCode::Char('v')) => self.standalone(Action::EnterVisual(VisualKind::Char)),
            (KeyModifiers::NONE, KeyCode::Char('V')) => self.standalone(Action::EnterVisual(VisualKind::Line)),
            (KeyModifiers::CONTROL, KeyCode::Char('v')) => self.standalone(Action::EnterVisual(VisualKind::Block)),

            (KeyModifiers::NONE, KeyCode::Char(':')) => self.standalone(Action::EnterCommandLine),
            (KeyModifiers::NONE, KeyCode::Char('/')) => self.standalone(Action::EnterSearch(SearchDirection::Forward)),
            (KeyModifiers::NONE, KeyCode::Char('?')) => self.standalone(Action::EnterSearch(SearchDirection::Backward)),
            (KeyModifiers::NONE, KeyCode::Char('&')) => self.standalone(Action::RepeatSubstitute),

            (KeyModifiers::CONTROL, KeyCode::Char('o')) => self.standalone(Action::JumpBack),
            (KeyModifiers::NONE, KeyCode::Tab) | (KeyModifiers::CONTROL, KeyCode::Char('i')) => {
                self.standalone(Action::JumpForward)
            }

            _ => self.invalid(None),
        }
    }

    /// Keys that map straight to a motion
    fn simple_motion(key: KeyEvent) -> Option<Motion> {
        let motion = match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Char('h')) | (_, KeyCode::Left) | (_, KeyCode::Backspace) => Motion::Left,
            (KeyModifiers::CONTROL, KeyCode::Char('h')) => Motion::Left,
            (KeyModifiers::NONE, KeyCode::Char('l')) | (_, KeyCode::Right) | (KeyModifiers::NONE, KeyCode::Char(' ')) => {
                Motion::Right
            }
            (KeyModifiers::NONE, KeyCode::Char('j')) | (_, KeyCode::Down) => Motion::Down,
            (KeyModifiers::CONTROL, KeyCode::Char('n' | 'j')) => Motion::Down,
            (KeyModifiers::NONE, KeyCode::Char('k')) | (_, KeyCode::Up) => Motion::Up,
            (KeyModifiers::CONTROL, KeyCode::Char('p')) => Motion::Up,

            // Word motions
            (KeyModifiers::NONE, KeyCode::Char('w')) => Motion::WordForward,
            (KeyModifiers::NONE, KeyCode::Char('W')) => Motion::BigWordForward,
            (KeyModifiers::NONE, KeyCode::Char('b')) => Motion::WordBackward,
            (KeyModifiers::NONE, KeyCode::Char('B')) => Motion::BigWordBackward,
            (KeyModifiers::NONE, KeyCode::Char('e')) => Motion::WordEnd,
            (KeyModifiers::NONE, KeyCode::Char('E')) => Motion::BigWordEnd,

            // Line motions
            (KeyModifiers::NONE, KeyCode::Char('0')) | (_, KeyCode::Home) => Motion::LineStart,
            (KeyModifiers::NONE, KeyCode::Char('^')) => Motion::FirstNonBlank,
            (KeyModifiers::NONE, KeyCode::Char('$')) | (_, KeyCode::End) => Motion::LineEnd,
            (KeyModifiers::NONE, KeyCode::Char('+')) | (KeyModifiers::NONE, KeyCode::Enter) => Motion::NextLine,
            (KeyModifiers::CONTROL, KeyCode::Char('m')) => Motion::NextLine,
            (KeyModifiers::NONE, KeyCode::Char('-')) => Motion::PrevLine,
            (KeyModifiers::NONE, KeyCode::Char('_')) => Motion::CurrentLine,
            (KeyModifiers::NONE, KeyCode::Char('G')) => Motion::FileEnd,

            // Paragraph motions
            (KeyModifiers::NONE, KeyCode::Char('}')) => Motion::ParagraphForward,
            (KeyModifiers::NONE, KeyCode::Char('{')) => Motion::ParagraphBackward,

            // Bracket matching
            (KeyModifiers::NONE, KeyCode::Char('%')) => Motion::MatchingBracket,

            // Repeat find char (; and ,)
            (KeyModifiers::NONE, KeyCode::Char(';')) => Motion::RepeatFind,
            (KeyModifiers::NONE, KeyCode::Char(',')) => Motion::RepeatFindReverse,

            // Search
            (KeyModifiers::NONE, KeyCode::Char('n')) => Motion::SearchNext,
            (KeyModifiers::NONE, KeyCode::Char('N')) => Motion::SearchPrev,
            (KeyModifiers::NONE, KeyCode::Char('*')) => Motion::StarForward,
            (KeyModifiers::NONE, KeyCode::Char('#')) => Motion::StarBackward,
            _ => return None,
        };
        Some(motion)
    }

    /// Keys with a visual-mode meaning
    fn visual_key(&mut self, key: KeyEvent, context: ParseContext) -> Option<KeyAction> {
        let ch = match key.code {
            KeyCode::Char(c) if key.modifiers == KeyModifiers::NONE => c,
            _ => return None,
        };
        let selection = |op| Action::Operator(op, OperatorTarget::Selection);
        let lines = |op| Action::Operator(op, OperatorTarget::SelectionLines);
        let action = match ch {
            'i' if !context.block => {
                self.partial = Some(PartialKey::TextObject(TextObjectModifier::Inner));
                return Some(KeyAction::Pending);
            }
            'a' if !context.block => {
                self.partial = Some(PartialKey::TextObject(TextObjectModifier::Around));
                return Some(KeyAction::Pending);
            }
            'I' if context.block => Action::BlockInsert { append: false },
            'A' if context.block => Action::BlockInsert { append: true },
            'x' => selection(Operator::Delete),
            's' => selection(Operator::Change),
            'X' | 'D' if !context.block => lines(Operator::Delete),
            'X' | 'D' => selection(Operator::Delete),
            'S' | 'R' => lines(Operator::Change),
            'C' if !context.block => lines(Operator::Change),
            'C' => selection(Operator::Change),
            'Y' => lines(Operator::Yank),
            'u' => selection(Operator::Lowercase),
            'U' => selection(Operator::Uppercase),
            '~' => selection(Operator::ToggleCase),
            'o' | 'O' => Action::SwapSelectionEnds,
            'J' => Action::JoinLines { spaces: true },
            'p' | 'P' => Action::Put {
                before: ch == 'P',
                cursor_after: false,
            },
            _ => return None,
        };
        Some(self.complete(action))
    }

    fn handle_partial(&mut self, partial: PartialKey, key: KeyEvent, context: ParseContext) -> KeyAction {
        let ch = match key.code {
            KeyCode::Char(c) if key.modifiers == KeyModifiers::NONE => Some(c),
            KeyCode::Enter if partial == PartialKey::Replace => Some('\n'),
            KeyCode::Tab if partial == PartialKey::Replace => Some('\t'),
            _ => None,
        };
        let Some(c) = ch else {
            return self.invalid(None);
        };

        match partial {
            PartialKey::G => self.handle_g(c, key, context),
            PartialKey::Z => match c {
                'Z' => self.complete(Action::Ex("x")),
                'Q' => self.complete(Action::Ex("q!")),
                _ => self.invalid(None),
            },
            PartialKey::Register => {
                if crate::editor::register::Registers::is_valid_name(c) {
                    self.register = Some(c);
                    KeyAction::Pending
                } else {
                    self.invalid(None)
                }
            }
            PartialKey::SetMark => self.complete(Action::SetMark(c)),
            PartialKey::MarkJump { exact } => {
                let motion = if exact { Motion::MarkExact(c) } else { Motion::MarkLine(c) };
                self.motion_or_operator(motion)
            }
            PartialKey::Find(find) => {
                self.last_find_char = Some((find, c));
                let motion = match find {
                    FindCharType::Forward => Motion::FindChar(c),
                    FindCharType::Backward => Motion::FindCharBack(c),
                    FindCharType::TillForward => Motion::TillChar(c),
                    FindCharType::TillBackward => Motion::TillCharBack(c),
                };
                self.motion_or_operator(motion)
            }
            PartialKey::Replace => self.complete(Action::ReplaceChar(c)),
            PartialKey::Record => self.complete(Action::StartRecording(c)),
            PartialKey::Play => self.complete(Action::PlayMacro(c)),
            PartialKey::TextObject(modifier) => {
                let Some(object_type) = TextObjectType::from_char(c) else {
                    return self.invalid(None);
                };
                let object = TextObject { modifier, object_type };
                match self.operator {
                    Some(op) => self.complete(Action::Operator(op, OperatorTarget::TextObject(object))),
                    None => self.complete(Action::SelectTextObject(object)),
                }
            }
        }
    }

    fn handle_g(&mut self, c: char, key: KeyEvent, context: ParseContext) -> KeyAction {
        if let Some(op) = Operator::from_g_key(c) {
            if context.visual {
                return self.complete(Action::Operator(op, OperatorTarget::Selection));
            }
            return match self.operator {
                None => {
                    self.operator = Some(op);
                    KeyAction::Pending
                }
                Some(pending) if pending == op => self.complete(Action::Operator(op, OperatorTarget::Line)),
                Some(_) => self.invalid(None),
            };
        }
        match c {
            'g' => self.motion_or_operator(Motion::FileStart),
            'e' => self.motion_or_operator(Motion::WordEndBackward),
            'E' => self.motion_or_operator(Motion::BigWordEndBackward),
            '_' => self.motion_or_operator(Motion::LastNonBlank),
            'J' => self.standalone(Action::JoinLines { spaces: false }),
            'p' => self.standalone(Action::Put {
                before: false,
                cursor_after: true,
            }),
            'P' => self.standalone(Action::Put {
                before: true,
                cursor_after: true,
            }),
            'v' => self.standalone(Action::Reselect),
            _ => {
                tracing::trace!(target: "engine.dispatch", key = ?key, "unknown g command");
                self.invalid(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::keymap::parse_key_sequence;

    fn feed(keys: &str, context: ParseContext) -> Vec<KeyAction> {
        let mut parser = PendingCommand::new();
        parse_key_sequence(keys)
            .into_iter()
            .map(|k| parser.process_key(k, context))
            .collect()
    }

    fn last(keys: &str) -> KeyAction {
        *feed(keys, ParseContext::default()).last().unwrap()
    }

    fn command(count: Option<usize>, register: Option<char>, action: Action) -> KeyAction {
        KeyAction::Complete(Command {
            count,
            register,
            action,
        })
    }

    #[test]
    fn test_counts_multiply() {
        assert_eq!(
            last("2d3w"),
            command(
                Some(6),
                None,
                Action::Operator(Operator::Delete, OperatorTarget::Motion(Motion::WordForward))
            )
        );
        assert_eq!(last("10j"), command(Some(10), None, Action::Motion(Motion::Down)));
    }

    #[test]
    fn test_zero_is_line_start_without_count() {
        assert_eq!(last("0"), command(None, None, Action::Motion(Motion::LineStart)));
        assert_eq!(feed("10", ParseContext::default())[1], KeyAction::Pending);
    }

    #[test]
    fn test_register_and_doubled_operator() {
        assert_eq!(
            last("\"ayy"),
            command(None, Some('a'), Action::Operator(Operator::Yank, OperatorTarget::Line))
        );
        assert_eq!(
            last("3>>"),
            command(Some(3), None, Action::Operator(Operator::Indent, OperatorTarget::Line))
        );
    }

    #[test]
    fn test_case_operators_double() {
        for keys in ["g~~", "g~g~"] {
            assert_eq!(
                last(keys),
                command(None, None, Action::Operator(Operator::ToggleCase, OperatorTarget::Line))
            );
        }
        assert_eq!(
            last("gUU"),
            command(None, None, Action::Operator(Operator::Uppercase, OperatorTarget::Line))
        );
        assert_eq!(
            last("guiw"),
            command(
                None,
                None,
                Action::Operator(
                    Operator::Lowercase,
                    OperatorTarget::TextObject(TextObject {
                        modifier: TextObjectModifier::Inner,
                        object_type: TextObjectType::Word,
                    })
                )
            )
        );
    }

    #[test]
    fn test_mismatched_operator_reprocesses_key() {
        let actions = feed("dy", ParseContext::default());
        let y = parse_key_sequence("y")[0];
        assert_eq!(actions, vec![KeyAction::Pending, KeyAction::Invalid(Some(y))]);
    }

    #[test]
    fn test_unknown_key_is_invalid() {
        assert_eq!(last("dx"), KeyAction::Invalid(None));
        assert_eq!(last("gz"), KeyAction::Invalid(None));
    }

    #[test]
    fn test_escape_cancels() {
        let actions = feed("2d<Esc>", ParseContext::default());
        assert_eq!(actions[2], KeyAction::Cancelled);
    }

    #[test]
    fn test_counted_g_motions() {
        assert_eq!(last("5G"), command(Some(5), None, Action::Motion(Motion::GotoLine(5))));
        assert_eq!(last("gg"), command(None, None, Action::Motion(Motion::FileStart)));
        assert_eq!(
            last("d3gg"),
            command(
                Some(3),
                None,
                Action::Operator(Operator::Delete, OperatorTarget::Motion(Motion::GotoLine(3)))
            )
        );
    }

    #[test]
    fn test_find_char_remembers_target() {
        let mut parser = PendingCommand::new();
        for key in parse_key_sequence("tx") {
            parser.process_key(key, ParseContext::default());
        }
        assert_eq!(parser.last_find(), Some((FindCharType::TillForward, 'x')));
        let semicolon = parser.process_key(parse_key_sequence(";")[0], ParseContext::default());
        assert_eq!(semicolon, command(None, None, Action::Motion(Motion::RepeatFind)));
    }

    #[test]
    fn test_marks_and_macros() {
        assert_eq!(last("ma"), command(None, None, Action::SetMark('a')));
        assert_eq!(
            last("d'a"),
            command(
                None,
                None,
                Action::Operator(Operator::Delete, OperatorTarget::Motion(Motion::MarkLine('a')))
            )
        );
        assert_eq!(last("qa"), command(None, None, Action::StartRecording('a')));
        assert_eq!(last("3@@"), command(Some(3), None, Action::PlayMacro('@')));

        let recording = ParseContext {
            recording: true,
            ..ParseContext::default()
        };
        assert_eq!(feed("q", recording)[0], command(None, None, Action::StopRecording));
    }

    #[test]
    fn test_visual_context() {
        let visual = ParseContext {
            visual: true,
            ..ParseContext::default()
        };
        assert_eq!(
            feed("d", visual)[0],
            command(None, None, Action::Operator(Operator::Delete, OperatorTarget::Selection))
        );
        assert_eq!(
            feed("U", visual)[0],
            command(None, None, Action::Operator(Operator::Uppercase, OperatorTarget::Selection))
        );
        assert_eq!(
            *feed("ip", visual).last().unwrap(),
            command(
                None,
                None,
                Action::SelectTextObject(TextObject {
                    modifier: TextObjectModifier::Inner,
                    object_type: TextObjectType::Paragraph,
                })
            )
        );
        assert_eq!(feed("o", visual)[0], command(None, None, Action::SwapSelectionEnds));
    }

    #[test]
    fn test_replace_accepts_enter() {
        assert_eq!(last("r<CR>"), command(None, None, Action::ReplaceChar('\n')));
        assert_eq!(last("3rx"), command(Some(3), None, Action::ReplaceChar('x')));
    }

    #[test]
    fn test_shorthands() {
        assert_eq!(
            last("D"),
            command(
                None,
                None,
                Action::Operator(Operator::Delete, OperatorTarget::Motion(Motion::LineEnd))
            )
        );
        assert_eq!(last("ZZ"), command(None, None, Action::Ex("x")));
        assert_eq!(
            last("gP"),
            command(
                None,
                None,
                Action::Put {
                    before: true,
                    cursor_after: true
                }
            )
        );
    }
}
