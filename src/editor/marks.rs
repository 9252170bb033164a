use std::collections::HashMap;

use super::position::Position;

/// Identifies one buffer session; marks die with it
pub type BufferId = u64;

/// A mark position in a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub buffer_id: BufferId,
    pub pos: Position,
}

/// Lines removed outright by a deletion, `first..=last`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedLines {
    pub first: usize,
    pub last: usize,
}

/// Manages marks for the engine.
///
/// Lowercase marks are set by `m{a-z}`. The engine also maintains the
/// previous-context mark (`'`), visual bounds (`<`, `>`) and last change (`.`).
/// Marks move with line insertions and deletions.
#[derive(Debug, Clone, Default)]
pub struct Marks {
    marks: HashMap<char, Mark>,
    /// Lines followed by `:global` while it runs
    tracked: Vec<Option<usize>>,
}

impl Marks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a character names a mark that can be read
    pub fn is_valid_mark(c: char) -> bool {
        c.is_ascii_lowercase() || matches!(c, '\'' | '`' | '<' | '>' | '.' | '[' | ']')
    }

    /// Marks the user may set with `m`
    pub fn is_settable(c: char) -> bool {
        c.is_ascii_lowercase() || matches!(c, '\'' | '`' | '<' | '>' | '[' | ']')
    }

    pub fn set(&mut self, buffer_id: BufferId, name: char, pos: Position) {
        let name = if name == '`' { '\'' } else { name };
        self.marks.insert(name, Mark { buffer_id, pos });
    }

    pub fn get(&self, buffer_id: BufferId, name: char) -> Option<Position> {
        let name = if name == '`' { '\'' } else { name };
        self.marks
            .get(&name)
            .filter(|m| m.buffer_id == buffer_id)
            .map(|m| m.pos)
    }

    /// Drop every mark of a closed buffer
    pub fn invalidate_buffer(&mut self, buffer_id: BufferId) {
        self.marks.retain(|_, m| m.buffer_id != buffer_id);
        self.tracked.clear();
    }

    /// Marks of a buffer sorted by name, for `:marks`
    pub fn list(&self, buffer_id: BufferId) -> Vec<(char, Position)> {
        let mut out: Vec<(char, Position)> = self
            .marks
            .iter()
            .filter(|(_, m)| m.buffer_id == buffer_id)
            .map(|(c, m)| (*c, m.pos))
            .collect();
        out.sort_by_key(|(c, _)| *c);
        out
    }

    /// Start following a set of lines through later edits
    pub fn track_lines(&mut self, lines: Vec<usize>) {
        self.tracked = lines.into_iter().map(Some).collect();
    }

    /// Current line of the `idx`th tracked line, None once it was deleted
    pub fn tracked_line(&self, idx: usize) -> Option<usize> {
        self.tracked.get(idx).copied().flatten()
    }

    pub fn clear_tracked(&mut self) {
        self.tracked.clear();
    }

    /// Shift marks after `text` was inserted at `at`
    pub fn adjust_for_insert(&mut self, at: Position, text: &str) {
        let added = text.matches('\n').count();
        if added == 0 {
            return;
        }
        let tail = text.rsplit('\n').next().map_or(0, |t| t.chars().count());
        let shift = |pos: Position| -> Position {
            if pos.line > at.line {
                Position::new(pos.line + added, pos.col)
            } else if pos.line == at.line && pos.col >= at.col {
                Position::new(pos.line + added, pos.col - at.col + tail)
            } else {
                pos
            }
        };
        for mark in self.marks.values_mut() {
            mark.pos = shift(mark.pos);
        }
        for line in self.tracked.iter_mut().flatten() {
            if *line > at.line || (*line == at.line && at.col == 0 && !text.starts_with('\n')) {
                *line += added;
            }
        }
    }

    /// Shift or drop marks after the text between `start` and `end` was deleted
    pub fn adjust_for_delete(&mut self, start: Position, end: Position, removed: Option<RemovedLines>) {
        let joined = end.line - start.line;
        let is_removed = |line: usize| removed.map_or(false, |r| line >= r.first && line <= r.last);
        let shift = |pos: Position| -> Position {
            if pos < start {
                pos
            } else if pos < end {
                start
            } else if pos.line == end.line {
                Position::new(start.line, start.col + pos.col - end.col)
            } else {
                Position::new(pos.line - joined, pos.col)
            }
        };

        self.marks.retain(|_, m| !is_removed(m.pos.line));
        for mark in self.marks.values_mut() {
            mark.pos = shift(mark.pos);
        }

        for slot in self.tracked.iter_mut() {
            if let Some(line) = *slot {
                *slot = if is_removed(line) {
                    None
                } else {
                    Some(shift(Position::new(line, 0)).line)
                };
            }
        }
    }
}

/// Positions visited by jump motions, navigated with Ctrl-o / Ctrl-i
#[derive(Debug, Clone, Default)]
pub struct JumpList {
    jumps: Vec<Position>,
    /// When position == jumps.len(), we're "at the end" (current location, not navigating)
    position: usize,
}

const MAX_JUMPS: usize = 100;

impl JumpList {
    /// Check if we're at the end (not navigating history)
    fn is_at_end(&self) -> bool {
        self.position >= self.jumps.len()
    }

    pub fn len(&self) -> usize {
        self.jumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jumps.is_empty()
    }

    /// Record a jump (before jumping to a new location)
    pub fn record(&mut self, pos: Position) {
        // A new jump while navigating drops the forward history
        if !self.is_at_end() {
            self.jumps.truncate(self.position + 1);
        }

        // Only one entry per line
        self.jumps.retain(|j| j.line != pos.line);
        self.jumps.push(pos);

        if self.jumps.len() > MAX_JUMPS {
            self.jumps.remove(0);
        }
        self.position = self.jumps.len();
    }

    /// Go back in the jump list (Ctrl-o), saving `current` when leaving the end
    pub fn go_back(&mut self, current: Position) -> Option<Position> {
        if self.jumps.is_empty() {
            return None;
        }
        if self.is_at_end() {
            if self.jumps.last().map_or(false, |last| last.line == current.line) {
                self.position = self.jumps.len() - 1;
            } else {
                self.jumps.push(current);
                self.position = self.jumps.len() - 1;
            }
        }
        if self.position == 0 {
            return None;
        }
        self.position -= 1;
        self.jumps.get(self.position).copied()
    }

    /// Go forward in the jump list (Ctrl-i)
    pub fn go_forward(&mut self) -> Option<Position> {
        if self.position + 1 < self.jumps.len() {
            self.position += 1;
            self.jumps.get(self.position).copied()
        } else {
            None
        }
    }

    /// Clamp entries after the buffer shrank
    pub fn clamp(&mut self, last_line: usize) {
        for jump in &mut self.jumps {
            jump.line = jump.line.min(last_line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUF: BufferId = 1;

    fn marks_with(entries: &[(char, usize, usize)]) -> Marks {
        let mut marks = Marks::new();
        for &(c, line, col) in entries {
            marks.set(BUF, c, Position::new(line, col));
        }
        marks
    }

    #[test]
    fn test_set_get_and_backtick_alias() {
        let mut marks = Marks::new();
        marks.set(BUF, 'a', Position::new(3, 1));
        marks.set(BUF, '`', Position::new(7, 0));
        assert_eq!(marks.get(BUF, 'a'), Some(Position::new(3, 1)));
        assert_eq!(marks.get(BUF, '\''), Some(Position::new(7, 0)));
        assert_eq!(marks.get(2, 'a'), None);
        assert_eq!(marks.get(BUF, 'b'), None);
    }

    #[test]
    fn test_invalidate_buffer() {
        let mut marks = marks_with(&[('a', 0, 0)]);
        marks.set(2, 'b', Position::new(1, 1));
        marks.invalidate_buffer(BUF);
        assert_eq!(marks.get(BUF, 'a'), None);
        assert_eq!(marks.get(2, 'b'), Some(Position::new(1, 1)));
    }

    #[test]
    fn test_insert_lines_shifts_marks_below() {
        let mut marks = marks_with(&[('a', 1, 2), ('b', 3, 0), ('c', 0, 4)]);
        // linewise put above line 1
        marks.adjust_for_insert(Position::new(1, 0), "new\n");
        assert_eq!(marks.get(BUF, 'a'), Some(Position::new(2, 2)));
        assert_eq!(marks.get(BUF, 'b'), Some(Position::new(4, 0)));
        assert_eq!(marks.get(BUF, 'c'), Some(Position::new(0, 4)));
    }

    #[test]
    fn test_delete_lines_drops_and_shifts() {
        let mut marks = marks_with(&[('a', 1, 2), ('b', 3, 1), ('c', 0, 0)]);
        // dd on line 1
        marks.adjust_for_delete(
            Position::new(1, 0),
            Position::new(2, 0),
            Some(RemovedLines { first: 1, last: 1 }),
        );
        assert_eq!(marks.get(BUF, 'a'), None);
        assert_eq!(marks.get(BUF, 'b'), Some(Position::new(2, 1)));
        assert_eq!(marks.get(BUF, 'c'), Some(Position::new(0, 0)));
    }

    #[test]
    fn test_charwise_delete_moves_columns() {
        let mut marks = marks_with(&[('a', 0, 8), ('b', 0, 3)]);
        marks.adjust_for_delete(Position::new(0, 2), Position::new(0, 5), None);
        assert_eq!(marks.get(BUF, 'a'), Some(Position::new(0, 5)));
        assert_eq!(marks.get(BUF, 'b'), Some(Position::new(0, 2)));
    }

    #[test]
    fn test_tracked_lines_follow_deletes() {
        let mut marks = Marks::new();
        marks.track_lines(vec![0, 2, 4]);
        marks.adjust_for_delete(
            Position::new(0, 0),
            Position::new(1, 0),
            Some(RemovedLines { first: 0, last: 0 }),
        );
        assert_eq!(marks.tracked_line(0), None);
        assert_eq!(marks.tracked_line(1), Some(1));
        assert_eq!(marks.tracked_line(2), Some(3));
    }

    #[test]
    fn test_jump_list_navigation() {
        let mut jumps = JumpList::default();
        jumps.record(Position::new(1, 0));
        jumps.record(Position::new(10, 0));

        // from line 20: back to 10, back to 1, then nothing further
        assert_eq!(jumps.go_back(Position::new(20, 0)), Some(Position::new(10, 0)));
        assert_eq!(jumps.go_back(Position::new(10, 0)), Some(Position::new(1, 0)));
        assert_eq!(jumps.go_back(Position::new(1, 0)), None);
        assert_eq!(jumps.go_forward(), Some(Position::new(10, 0)));
        assert_eq!(jumps.go_forward(), Some(Position::new(20, 0)));
        assert_eq!(jumps.go_forward(), None);
    }

    #[test]
    fn test_jump_list_dedups_lines() {
        let mut jumps = JumpList::default();
        jumps.record(Position::new(5, 0));
        jumps.record(Position::new(5, 3));
        assert_eq!(jumps.len(), 1);
    }
}
