use crate::editor::buffer::BufferAdapter;
use crate::editor::position::Position;
use crate::editor::text::{self, classify_char, CharClass};

/// Represents a motion that can move the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    // Character motions
    Left,
    Right,
    Up,
    Down,

    // Word motions
    WordForward,        // w
    WordBackward,       // b
    WordEnd,            // e
    WordEndBackward,    // ge
    BigWordForward,     // W
    BigWordBackward,    // B
    BigWordEnd,         // E
    BigWordEndBackward, // gE

    // Line motions
    LineStart,     // 0
    FirstNonBlank, // ^
    LineEnd,       // $
    LastNonBlank,  // g_
    NextLine,      // + and Enter
    PrevLine,      // -
    CurrentLine,   // _ and doubled operators

    // File motions
    FileStart,       // gg
    FileEnd,         // G
    GotoLine(usize), // {count}G

    // Find char motions
    FindChar(char),     // f{char}
    FindCharBack(char), // F{char}
    TillChar(char),     // t{char}
    TillCharBack(char), // T{char}
    RepeatFind,         // ;
    RepeatFindReverse,  // ,

    // Paragraph motions
    ParagraphForward,  // }
    ParagraphBackward, // {

    // Bracket matching
    MatchingBracket, // %

    // Motions resolved by the engine (marks, search state)
    MarkExact(char), // `{mark}
    MarkLine(char),  // '{mark}
    SearchNext,      // n
    SearchPrev,      // N
    StarForward,     // *
    StarBackward,    // #
}

/// How an operator treats the span covered by a motion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    /// the char under the end position is not included
    Exclusive,
    Inclusive,
    Linewise,
}

impl Motion {
    pub fn kind(&self) -> MotionKind {
        match self {
            Motion::Up
            | Motion::Down
            | Motion::NextLine
            | Motion::PrevLine
            | Motion::CurrentLine
            | Motion::FileStart
            | Motion::FileEnd
            | Motion::GotoLine(_)
            | Motion::MarkLine(_) => MotionKind::Linewise,
            Motion::WordEnd
            | Motion::BigWordEnd
            | Motion::WordEndBackward
            | Motion::BigWordEndBackward
            | Motion::LineEnd
            | Motion::LastNonBlank
            | Motion::FindChar(_)
            | Motion::TillChar(_)
            | Motion::MatchingBracket => MotionKind::Inclusive,
            _ => MotionKind::Exclusive,
        }
    }

    /// Jumps set the previous-context mark and go on the jump list
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Motion::FileStart
                | Motion::FileEnd
                | Motion::GotoLine(_)
                | Motion::ParagraphForward
                | Motion::ParagraphBackward
                | Motion::MatchingBracket
                | Motion::MarkExact(_)
                | Motion::MarkLine(_)
                | Motion::SearchNext
                | Motion::SearchPrev
                | Motion::StarForward
                | Motion::StarBackward
        )
    }

    /// Vertical motions keep the remembered column
    pub fn keeps_column(&self) -> bool {
        matches!(self, Motion::Up | Motion::Down)
    }
}

/// Find the position after applying a motion.
///
/// Returns None if the motion fails (e.g. `f` target not on the line) or when
/// the motion needs engine state (marks, search, repeat-find).
pub fn apply_motion<B: BufferAdapter + ?Sized>(
    buffer: &B,
    motion: Motion,
    pos: Position,
    count: usize,
) -> Option<Position> {
    let count = count.max(1);
    let last = buffer.last_line();

    match motion {
        Motion::Left => {
            if pos.col == 0 {
                return None;
            }
            let line = buffer.line_text(pos.line);
            let mut col = pos.col.min(line.chars().count());
            for _ in 0..count {
                if col == 0 {
                    break;
                }
                col = text::prev_grapheme_col(&line, col);
            }
            Some(Position::new(pos.line, col))
        }

        Motion::Right => {
            let line = buffer.line_text(pos.line);
            let len = line.chars().count();
            // one past the last char is allowed so operators can reach the line end
            if pos.col >= len {
                return None;
            }
            let mut col = pos.col;
            for _ in 0..count {
                if col >= len {
                    break;
                }
                col = text::next_grapheme_col(&line, col);
            }
            Some(Position::new(pos.line, col))
        }

        Motion::Up => {
            if pos.line == 0 {
                return None;
            }
            Some(Position::new(pos.line.saturating_sub(count), pos.col))
        }

        Motion::Down => {
            if pos.line >= last {
                return None;
            }
            Some(Position::new((pos.line + count).min(last), pos.col))
        }

        Motion::WordForward | Motion::BigWordForward => {
            let big = motion == Motion::BigWordForward;
            let mut p = pos;
            for _ in 0..count {
                p = word_forward(buffer, p, big);
            }
            Some(p)
        }

        Motion::WordBackward | Motion::BigWordBackward => {
            let big = motion == Motion::BigWordBackward;
            let mut p = pos;
            for _ in 0..count {
                p = word_backward(buffer, p, big);
            }
            Some(p)
        }

        Motion::WordEnd | Motion::BigWordEnd => {
            let big = motion == Motion::BigWordEnd;
            let mut p = pos;
            for _ in 0..count {
                p = word_end(buffer, p, big);
            }
            Some(p)
        }

        Motion::WordEndBackward | Motion::BigWordEndBackward => {
            let big = motion == Motion::BigWordEndBackward;
            let mut p = pos;
            for _ in 0..count {
                p = word_end_backward(buffer, p, big);
            }
            Some(p)
        }

        Motion::LineStart => Some(Position::new(pos.line, 0)),

        Motion::FirstNonBlank => Some(Position::new(
            pos.line,
            text::first_non_blank(&buffer.line_text(pos.line)),
        )),

        Motion::LineEnd => {
            let line = (pos.line + count - 1).min(last);
            Some(Position::new(line, buffer.line_len(line).saturating_sub(1)))
        }

        Motion::LastNonBlank => {
            let line = (pos.line + count - 1).min(last);
            Some(Position::new(
                line,
                text::last_non_blank(&buffer.line_text(line)),
            ))
        }

        Motion::NextLine => {
            if pos.line >= last {
                return None;
            }
            let line = (pos.line + count).min(last);
            Some(Position::new(line, text::first_non_blank(&buffer.line_text(line))))
        }

        Motion::PrevLine => {
            if pos.line == 0 {
                return None;
            }
            let line = pos.line.saturating_sub(count);
            Some(Position::new(line, text::first_non_blank(&buffer.line_text(line))))
        }

        Motion::CurrentLine => {
            let line = (pos.line + count - 1).min(last);
            Some(Position::new(line, text::first_non_blank(&buffer.line_text(line))))
        }

        Motion::FileStart => Some(Position::new(0, text::first_non_blank(&buffer.line_text(0)))),

        Motion::FileEnd => Some(Position::new(last, text::first_non_blank(&buffer.line_text(last)))),

        Motion::GotoLine(target) => {
            let line = target.saturating_sub(1).min(last);
            Some(Position::new(line, text::first_non_blank(&buffer.line_text(line))))
        }

        Motion::FindChar(target) => find_char(buffer, pos, target, true, false, count, false),
        Motion::FindCharBack(target) => find_char(buffer, pos, target, false, false, count, false),
        Motion::TillChar(target) => find_char(buffer, pos, target, true, true, count, false),
        Motion::TillCharBack(target) => find_char(buffer, pos, target, false, true, count, false),

        Motion::ParagraphForward => {
            // } - move to the next blank line after non-blank content
            let total = buffer.line_count();
            let mut l = pos.line;
            for _ in 0..count {
                while l < total && buffer.is_blank_line(l) {
                    l += 1;
                }
                while l < total && !buffer.is_blank_line(l) {
                    l += 1;
                }
            }
            if l >= total {
                Some(Position::new(last, buffer.line_len(last)))
            } else {
                Some(Position::new(l, 0))
            }
        }

        Motion::ParagraphBackward => {
            // { - move to the previous blank line before non-blank content
            let mut l = pos.line;
            for _ in 0..count {
                if l == 0 {
                    break;
                }
                l -= 1;
                while l > 0 && buffer.is_blank_line(l) {
                    l -= 1;
                }
                while l > 0 && !buffer.is_blank_line(l) {
                    l -= 1;
                }
            }
            Some(Position::new(l, 0))
        }

        Motion::MatchingBracket => find_matching_bracket(buffer, pos),

        Motion::RepeatFind
        | Motion::RepeatFindReverse
        | Motion::MarkExact(_)
        | Motion::MarkLine(_)
        | Motion::SearchNext
        | Motion::SearchPrev
        | Motion::StarForward
        | Motion::StarBackward => None,
    }
}

/// Class of the char at a position; the virtual line break counts as blank
fn class_at<B: BufferAdapter + ?Sized>(buffer: &B, pos: Position, big: bool) -> CharClass {
    buffer
        .char_at(pos)
        .map_or(CharClass::Blank, |ch| classify_char(ch, big))
}

/// Next char position, stepping onto the next line after the last char
fn next_pos<B: BufferAdapter + ?Sized>(buffer: &B, pos: Position) -> Option<Position> {
    if pos.col + 1 < buffer.line_len(pos.line) {
        Some(Position::new(pos.line, pos.col + 1))
    } else if pos.line < buffer.last_line() {
        Some(Position::new(pos.line + 1, 0))
    } else {
        None
    }
}

/// Previous char position, stepping onto the last char of the previous line
fn prev_pos<B: BufferAdapter + ?Sized>(buffer: &B, pos: Position) -> Option<Position> {
    let len = buffer.line_len(pos.line);
    if pos.col > 0 && len > 0 {
        Some(Position::new(pos.line, pos.col.min(len) - 1))
    } else if pos.line > 0 {
        let prev = pos.line - 1;
        Some(Position::new(prev, buffer.line_len(prev).saturating_sub(1)))
    } else {
        None
    }
}

fn is_empty_line<B: BufferAdapter + ?Sized>(buffer: &B, line: usize) -> bool {
    buffer.line_len(line) == 0
}

/// End of the buffer, one past the last char so exclusive ranges cover it
fn buffer_end<B: BufferAdapter + ?Sized>(buffer: &B) -> Position {
    let last = buffer.last_line();
    Position::new(last, buffer.line_len(last))
}

/// Find the start of the next word (w motion)
fn word_forward<B: BufferAdapter + ?Sized>(buffer: &B, pos: Position, big: bool) -> Position {
    let start_class = class_at(buffer, pos, big);
    let mut p = pos;

    // Phase 1: move past the current word; a line break always ends it
    loop {
        let Some(n) = next_pos(buffer, p) else {
            return buffer_end(buffer);
        };
        let crossed = n.line != p.line;
        p = n;
        if crossed || start_class == CharClass::Blank || class_at(buffer, p, big) != start_class {
            break;
        }
    }

    // Phase 2: skip blanks; an empty line counts as a word
    loop {
        if is_empty_line(buffer, p.line) || class_at(buffer, p, big) != CharClass::Blank {
            return p;
        }
        match next_pos(buffer, p) {
            Some(n) => p = n,
            None => return buffer_end(buffer),
        }
    }
}

/// Find the start of the previous word (b motion)
fn word_backward<B: BufferAdapter + ?Sized>(buffer: &B, pos: Position, big: bool) -> Position {
    let Some(mut p) = prev_pos(buffer, pos) else {
        return Position::new(0, 0);
    };

    // Phase 1: skip blanks going backward; an empty line is a stop
    loop {
        if is_empty_line(buffer, p.line) || class_at(buffer, p, big) != CharClass::Blank {
            break;
        }
        match prev_pos(buffer, p) {
            Some(q) => p = q,
            None => return p,
        }
    }
    if is_empty_line(buffer, p.line) {
        return p;
    }

    // Phase 2: move back through same-class characters on this line
    let class = class_at(buffer, p, big);
    while p.col > 0 {
        let q = Position::new(p.line, p.col - 1);
        if class_at(buffer, q, big) != class {
            break;
        }
        p = q;
    }
    p
}

/// Find the end of the current/next word (e motion)
fn word_end<B: BufferAdapter + ?Sized>(buffer: &B, pos: Position, big: bool) -> Position {
    let Some(mut p) = next_pos(buffer, pos) else {
        return pos;
    };

    // Phase 1: skip blanks and empty lines
    while is_empty_line(buffer, p.line) || class_at(buffer, p, big) == CharClass::Blank {
        match next_pos(buffer, p) {
            Some(n) => p = n,
            None => return p,
        }
    }

    // Phase 2: move forward through same-class characters on this line
    let class = class_at(buffer, p, big);
    let len = buffer.line_len(p.line);
    while p.col + 1 < len {
        let q = Position::new(p.line, p.col + 1);
        if class_at(buffer, q, big) != class {
            break;
        }
        p = q;
    }
    p
}

/// Find the end of the previous word (ge motion)
fn word_end_backward<B: BufferAdapter + ?Sized>(buffer: &B, pos: Position, big: bool) -> Position {
    let start_class = class_at(buffer, pos, big);
    let mut p = pos;

    // Phase 1: leave the current word
    loop {
        let Some(q) = prev_pos(buffer, p) else {
            return Position::new(0, 0);
        };
        let crossed = q.line != p.line;
        p = q;
        if crossed || start_class == CharClass::Blank || class_at(buffer, p, big) != start_class {
            break;
        }
    }

    // Phase 2: skip blanks backward; an empty line is a stop
    loop {
        if is_empty_line(buffer, p.line) || class_at(buffer, p, big) != CharClass::Blank {
            return p;
        }
        match prev_pos(buffer, p) {
            Some(q) => p = q,
            None => return p,
        }
    }
}

/// Find character on the same line (f/t/F/T motions).
///
/// `till` stops one position before the character. With `skip_adjacent`, a
/// till target right next to the cursor is skipped so `;` can make progress.
pub fn find_char<B: BufferAdapter + ?Sized>(
    buffer: &B,
    pos: Position,
    target: char,
    forward: bool,
    till: bool,
    count: usize,
    skip_adjacent: bool,
) -> Option<Position> {
    let chars: Vec<char> = buffer.line_text(pos.line).chars().collect();
    let mut found = 0;

    if forward {
        let from = pos.col + if till && skip_adjacent { 2 } else { 1 };
        for c in from..chars.len() {
            if chars[c] == target {
                found += 1;
                if found == count {
                    let col = if till { c - 1 } else { c };
                    return (col != pos.col || !till).then_some(Position::new(pos.line, col));
                }
            }
        }
    } else {
        let until = if till && skip_adjacent {
            pos.col.saturating_sub(1)
        } else {
            pos.col
        };
        for c in (0..until.min(chars.len())).rev() {
            if chars[c] == target {
                found += 1;
                if found == count {
                    let col = if till { c + 1 } else { c };
                    return (col != pos.col || !till).then_some(Position::new(pos.line, col));
                }
            }
        }
    }

    // Character not found (or not enough occurrences)
    None
}

/// Find the matching bracket for the first bracket at or after the cursor on its line
pub fn find_matching_bracket<B: BufferAdapter + ?Sized>(buffer: &B, pos: Position) -> Option<Position> {
    let line: Vec<char> = buffer.line_text(pos.line).chars().collect();
    let (start_col, bracket) = line
        .iter()
        .enumerate()
        .skip(pos.col)
        .find(|(_, ch)| matches!(ch, '(' | ')' | '[' | ']' | '{' | '}'))
        .map(|(c, ch)| (c, *ch))?;

    let (open, close, forward) = match bracket {
        '(' => ('(', ')', true),
        ')' => ('(', ')', false),
        '[' => ('[', ']', true),
        ']' => ('[', ']', false),
        '{' => ('{', '}', true),
        '}' => ('{', '}', false),
        _ => return None,
    };

    let start = Position::new(pos.line, start_col);
    if forward {
        scan_forward_for_close(buffer, start, open, close)
    } else {
        scan_backward_for_open(buffer, start, open, close)
    }
}

/// Starting on an opening bracket, find its partner
pub fn scan_forward_for_close<B: BufferAdapter + ?Sized>(
    buffer: &B,
    start: Position,
    open: char,
    close: char,
) -> Option<Position> {
    let mut depth = 0usize;
    for l in start.line..buffer.line_count() {
        let chars: Vec<char> = buffer.line_text(l).chars().collect();
        let from = if l == start.line { start.col } else { 0 };
        for (c, &ch) in chars.iter().enumerate().skip(from) {
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(Position::new(l, c));
                }
            }
        }
    }
    None
}

/// Starting on a closing bracket, find its partner
pub fn scan_backward_for_open<B: BufferAdapter + ?Sized>(
    buffer: &B,
    start: Position,
    open: char,
    close: char,
) -> Option<Position> {
    let mut depth = 0usize;
    for l in (0..=start.line).rev() {
        let chars: Vec<char> = buffer.line_text(l).chars().collect();
        let upto = if l == start.line {
            (start.col + 1).min(chars.len())
        } else {
            chars.len()
        };
        for c in (0..upto).rev() {
            let ch = chars[c];
            if ch == close {
                depth += 1;
            } else if ch == open {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(Position::new(l, c));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::buffer::Buffer;

    fn buf(lines: &[&str]) -> Buffer {
        Buffer::from_lines(lines)
    }

    fn go(b: &Buffer, motion: Motion, line: usize, col: usize, count: usize) -> Option<(usize, usize)> {
        apply_motion(b, motion, Position::new(line, col), count).map(|p| (p.line, p.col))
    }

    #[test]
    fn test_word_forward() {
        let b = buf(&["hello world", "foo.bar baz"]);
        assert_eq!(go(&b, Motion::WordForward, 0, 0, 1), Some((0, 6)));
        assert_eq!(go(&b, Motion::WordForward, 0, 6, 1), Some((1, 0)));
        assert_eq!(go(&b, Motion::WordForward, 1, 0, 1), Some((1, 3)));
        assert_eq!(go(&b, Motion::WordForward, 1, 3, 1), Some((1, 4)));
        assert_eq!(go(&b, Motion::BigWordForward, 1, 0, 1), Some((1, 8)));
        assert_eq!(go(&b, Motion::WordForward, 0, 0, 3), Some((1, 3)));
    }

    #[test]
    fn test_word_forward_stops_on_empty_line() {
        let b = buf(&["one", "", "two"]);
        assert_eq!(go(&b, Motion::WordForward, 0, 0, 1), Some((1, 0)));
        assert_eq!(go(&b, Motion::WordForward, 1, 0, 1), Some((2, 0)));
        // past the last word goes to the end of the buffer
        assert_eq!(go(&b, Motion::WordForward, 2, 0, 1), Some((2, 3)));
    }

    #[test]
    fn test_word_backward() {
        let b = buf(&["hello world", "  foo.bar"]);
        assert_eq!(go(&b, Motion::WordBackward, 0, 8, 1), Some((0, 6)));
        assert_eq!(go(&b, Motion::WordBackward, 0, 6, 1), Some((0, 0)));
        assert_eq!(go(&b, Motion::WordBackward, 1, 2, 1), Some((0, 6)));
        assert_eq!(go(&b, Motion::WordBackward, 1, 6, 1), Some((1, 5)));
        assert_eq!(go(&b, Motion::BigWordBackward, 1, 8, 1), Some((1, 2)));
    }

    #[test]
    fn test_word_end() {
        let b = buf(&["hello world", "x"]);
        assert_eq!(go(&b, Motion::WordEnd, 0, 0, 1), Some((0, 4)));
        assert_eq!(go(&b, Motion::WordEnd, 0, 4, 1), Some((0, 10)));
        assert_eq!(go(&b, Motion::WordEnd, 0, 10, 1), Some((1, 0)));
        assert_eq!(go(&b, Motion::WordEndBackward, 0, 8, 1), Some((0, 4)));
    }

    #[test]
    fn test_line_motions() {
        let b = buf(&["  indented  ", "x"]);
        assert_eq!(go(&b, Motion::FirstNonBlank, 0, 9, 1), Some((0, 2)));
        assert_eq!(go(&b, Motion::LineEnd, 0, 0, 1), Some((0, 11)));
        assert_eq!(go(&b, Motion::LastNonBlank, 0, 0, 1), Some((0, 9)));
        assert_eq!(go(&b, Motion::LineEnd, 0, 0, 2), Some((1, 0)));
        assert_eq!(go(&b, Motion::NextLine, 0, 5, 1), Some((1, 0)));
        assert_eq!(go(&b, Motion::NextLine, 1, 0, 1), None);
    }

    #[test]
    fn test_vertical_boundaries_fail() {
        let b = buf(&["a", "b"]);
        assert_eq!(go(&b, Motion::Up, 0, 0, 1), None);
        assert_eq!(go(&b, Motion::Down, 0, 0, 5), Some((1, 0)));
        assert_eq!(go(&b, Motion::Down, 1, 0, 1), None);
        assert_eq!(go(&b, Motion::Left, 0, 0, 1), None);
    }

    #[test]
    fn test_goto_line() {
        let b = buf(&["a", "  b", "c"]);
        assert_eq!(go(&b, Motion::GotoLine(2), 0, 0, 1), Some((1, 2)));
        assert_eq!(go(&b, Motion::GotoLine(99), 0, 0, 1), Some((2, 0)));
        assert_eq!(go(&b, Motion::FileStart, 2, 0, 1), Some((0, 0)));
    }

    #[test]
    fn test_find_char() {
        let b = buf(&["a,b,c,d"]);
        assert_eq!(go(&b, Motion::FindChar(','), 0, 0, 1), Some((0, 1)));
        assert_eq!(go(&b, Motion::FindChar(','), 0, 0, 2), Some((0, 3)));
        assert_eq!(go(&b, Motion::TillChar(','), 0, 0, 1), None);
        assert_eq!(go(&b, Motion::TillChar('c'), 0, 0, 1), Some((0, 3)));
        assert_eq!(go(&b, Motion::FindCharBack('a'), 0, 4, 1), Some((0, 0)));
        assert_eq!(go(&b, Motion::TillCharBack('a'), 0, 4, 1), Some((0, 1)));
        assert_eq!(go(&b, Motion::FindChar('z'), 0, 0, 1), None);
    }

    #[test]
    fn test_repeated_till_skips_adjacent() {
        let b = buf(&["a,b,c"]);
        let p = find_char(&b, Position::new(0, 0), ',', true, true, 1, true);
        assert_eq!(p, Some(Position::new(0, 2)));
    }

    #[test]
    fn test_paragraph_motions() {
        let b = buf(&["a", "b", "", "c", "d"]);
        assert_eq!(go(&b, Motion::ParagraphForward, 0, 0, 1), Some((2, 0)));
        assert_eq!(go(&b, Motion::ParagraphForward, 2, 0, 1), Some((4, 1)));
        assert_eq!(go(&b, Motion::ParagraphBackward, 4, 0, 1), Some((2, 0)));
        assert_eq!(go(&b, Motion::ParagraphBackward, 2, 0, 1), Some((0, 0)));
    }

    #[test]
    fn test_matching_bracket() {
        let b = buf(&["f(a, (b)) {", "}"]);
        assert_eq!(go(&b, Motion::MatchingBracket, 0, 0, 1), Some((0, 8)));
        assert_eq!(go(&b, Motion::MatchingBracket, 0, 8, 1), Some((0, 1)));
        assert_eq!(go(&b, Motion::MatchingBracket, 0, 10, 1), Some((1, 0)));
        assert_eq!(go(&b, Motion::MatchingBracket, 1, 0, 1), Some((0, 10)));
    }

    #[test]
    fn test_grapheme_aware_horizontal() {
        let b = buf(&["ae\u{301}b"]);
        assert_eq!(go(&b, Motion::Right, 0, 1, 1), Some((0, 3)));
        assert_eq!(go(&b, Motion::Left, 0, 3, 1), Some((0, 1)));
    }

    #[test]
    fn test_motion_kinds() {
        assert_eq!(Motion::WordForward.kind(), MotionKind::Exclusive);
        assert_eq!(Motion::WordEnd.kind(), MotionKind::Inclusive);
        assert_eq!(Motion::FindCharBack('x').kind(), MotionKind::Exclusive);
        assert_eq!(Motion::Down.kind(), MotionKind::Linewise);
        assert!(Motion::FileEnd.is_jump());
        assert!(!Motion::WordForward.is_jump());
    }
}
