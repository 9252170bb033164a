use std::collections::VecDeque;

use super::buffer::BufferAdapter;
use super::position::Position;

/// A single change that can be undone/redone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Starting position of the change
    pub start: Position,
    /// The text that was removed (empty for pure insertions)
    pub old_text: String,
    /// The text that was inserted (empty for pure deletions)
    pub new_text: String,
}

impl Change {
    pub fn new(start: Position, old_text: String, new_text: String) -> Self {
        Self {
            start,
            old_text,
            new_text,
        }
    }

    /// Create a change for inserting text
    pub fn insert(start: Position, text: impl Into<String>) -> Self {
        Self::new(start, String::new(), text.into())
    }

    /// Create a change for deleting text
    pub fn delete(start: Position, text: impl Into<String>) -> Self {
        Self::new(start, text.into(), String::new())
    }

    /// Create the inverse of this change (for undo)
    pub fn inverse(&self) -> Self {
        Self {
            start: self.start,
            old_text: self.new_text.clone(),
            new_text: self.old_text.clone(),
        }
    }

    /// Apply the change to a buffer that currently holds `old_text` at `start`
    pub fn apply<B: BufferAdapter + ?Sized>(&self, buffer: &mut B) {
        if !self.old_text.is_empty() {
            buffer.delete_range(self.start, self.start.advance_over(&self.old_text));
        }
        if !self.new_text.is_empty() {
            buffer.insert_at(self.start, &self.new_text);
        }
    }
}

/// A group of changes that form a single undoable action
#[derive(Debug, Clone, Default)]
pub struct UndoEntry {
    /// The changes in this entry (in order they were made)
    pub changes: Vec<Change>,
    /// Cursor position before this entry
    pub cursor_before: Position,
    /// Cursor position after this entry
    pub cursor_after: Position,
}

impl UndoEntry {
    pub fn new(cursor: Position) -> Self {
        Self {
            changes: Vec::new(),
            cursor_before: cursor,
            cursor_after: cursor,
        }
    }

    /// Check if this entry has any changes
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Token for an open undo group; only the outermost one commits history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct GroupHandle {
    depth: usize,
}

impl GroupHandle {
    pub fn is_outermost(&self) -> bool {
        self.depth == 1
    }
}

/// Manages the undo/redo history
#[derive(Debug, Clone)]
pub struct UndoStack {
    /// Stack of undoable entries (VecDeque for O(1) front removal during trimming)
    undo_stack: VecDeque<UndoEntry>,
    /// Stack of redoable entries
    redo_stack: Vec<UndoEntry>,
    /// Current entry being built (during editing)
    current_entry: Option<UndoEntry>,
    /// Change count and cursor at each open `begin`, outermost first
    open: Vec<(usize, Position)>,
    /// Maximum number of undo entries to keep
    max_entries: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::with_levels(1000)
    }
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_levels(max_entries: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            current_entry: None,
            open: Vec::new(),
            max_entries,
        }
    }

    pub fn set_levels(&mut self, max_entries: usize) {
        self.max_entries = max_entries;
        self.trim();
    }

    /// Open a group. Nested calls join the outermost group.
    pub fn begin(&mut self, cursor: Position) -> GroupHandle {
        if self.open.is_empty() {
            self.current_entry = Some(UndoEntry::new(cursor));
        }
        let recorded = self.current_entry.as_ref().map_or(0, |e| e.changes.len());
        self.open.push((recorded, cursor));
        tracing::trace!(target: "engine.undo", depth = self.open.len(), "begin group");
        GroupHandle {
            depth: self.open.len(),
        }
    }

    /// Whether a group is currently open
    pub fn is_open(&self) -> bool {
        !self.open.is_empty()
    }

    /// Record a change in the current undo group
    pub fn record(&mut self, change: Change) {
        if let Some(entry) = self.current_entry.as_mut() {
            entry.changes.push(change);
        } else {
            // No group started, the change is its own entry
            let cursor = change.start;
            let mut entry = UndoEntry::new(cursor);
            entry.cursor_after = cursor;
            entry.changes.push(change);
            self.push_entry(entry);
        }
    }

    /// Close a group; the outermost commit pushes the entry onto history
    pub fn commit(&mut self, handle: GroupHandle, cursor_after: Position) {
        if !self.check_handle(handle) {
            return;
        }
        self.open.pop();
        if !self.open.is_empty() {
            return;
        }
        if let Some(mut entry) = self.current_entry.take() {
            if !entry.is_empty() {
                entry.cursor_after = cursor_after;
                tracing::debug!(target: "engine.undo", changes = entry.changes.len(), "commit group");
                self.push_entry(entry);
            }
        }
    }

    /// Undo every change recorded since `handle` was opened and close it.
    ///
    /// Returns the cursor position at the time the group was opened.
    pub fn rollback<B: BufferAdapter + ?Sized>(&mut self, handle: GroupHandle, buffer: &mut B) -> Option<Position> {
        if !self.check_handle(handle) {
            return None;
        }
        let (recorded, cursor) = self.open.pop()?;
        if let Some(entry) = self.current_entry.as_mut() {
            for change in entry.changes.drain(recorded..).rev() {
                change.inverse().apply(buffer);
            }
        }
        if self.open.is_empty() {
            self.current_entry = None;
        }
        tracing::debug!(target: "engine.undo", depth = handle.depth, "rolled back group");
        Some(cursor)
    }

    /// Undo the newest entry; returns where the cursor goes
    pub fn undo<B: BufferAdapter + ?Sized>(&mut self, buffer: &mut B) -> Option<Position> {
        self.undo_observed(buffer, &mut |_| {})
    }

    /// Undo, reporting each primitive change as it is applied
    pub fn undo_observed<B: BufferAdapter + ?Sized>(
        &mut self,
        buffer: &mut B,
        observer: &mut dyn FnMut(&Change),
    ) -> Option<Position> {
        if self.is_open() {
            tracing::warn!(target: "engine.undo", "undo requested inside an open group");
            return None;
        }
        let entry = self.undo_stack.pop_back()?;
        for change in entry.changes.iter().rev() {
            let inverse = change.inverse();
            inverse.apply(buffer);
            observer(&inverse);
        }
        let cursor = entry.cursor_before;
        self.redo_stack.push(entry);
        Some(cursor)
    }

    /// Redo the most recently undone entry
    pub fn redo<B: BufferAdapter + ?Sized>(&mut self, buffer: &mut B) -> Option<Position> {
        self.redo_observed(buffer, &mut |_| {})
    }

    pub fn redo_observed<B: BufferAdapter + ?Sized>(
        &mut self,
        buffer: &mut B,
        observer: &mut dyn FnMut(&Change),
    ) -> Option<Position> {
        if self.is_open() {
            return None;
        }
        let entry = self.redo_stack.pop()?;
        for change in &entry.changes {
            change.apply(buffer);
            observer(change);
        }
        let cursor = entry.changes.first().map_or(entry.cursor_before, |c| c.start);
        self.undo_stack.push_back(entry);
        Some(cursor)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get the number of undo entries
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the number of redo entries
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_entry = None;
        self.open.clear();
    }

    fn push_entry(&mut self, entry: UndoEntry) {
        self.undo_stack.push_back(entry);
        // Clear redo stack when new changes are made
        self.redo_stack.clear();
        self.trim();
    }

    fn trim(&mut self) {
        while self.undo_stack.len() > self.max_entries {
            self.undo_stack.pop_front();
        }
    }

    fn check_handle(&self, handle: GroupHandle) -> bool {
        let ok = handle.depth == self.open.len() && handle.depth > 0;
        if !ok {
            tracing::error!(
                target: "engine.undo",
                handle = handle.depth,
                open = self.open.len(),
                "mismatched undo group handle"
            );
            debug_assert!(ok, "mismatched undo group handle");
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::buffer::Buffer;

    fn delete_line(buf: &mut Buffer, undo: &mut UndoStack, line: usize) {
        let start = Position::new(line, 0);
        let end = Position::new(line + 1, 0);
        let text = buf.text_range(start, end);
        buf.delete_range(start, end);
        undo.record(Change::delete(start, text));
    }

    #[test]
    fn test_undo_restores_deleted_line() {
        let mut buf = Buffer::from_lines(&["alpha", "beta", "gamma"]);
        let mut undo = UndoStack::new();
        let group = undo.begin(Position::new(1, 0));
        delete_line(&mut buf, &mut undo, 1);
        undo.commit(group, Position::new(1, 0));

        assert_eq!(buf.lines(), vec!["alpha", "gamma"]);
        assert_eq!(undo.undo(&mut buf), Some(Position::new(1, 0)));
        assert_eq!(buf.lines(), vec!["alpha", "beta", "gamma"]);
        assert_eq!(undo.undo(&mut buf), None);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut buf = Buffer::from_lines(&["one"]);
        let mut undo = UndoStack::new();
        let group = undo.begin(Position::new(0, 0));
        buf.insert_at(Position::new(0, 3), " two");
        undo.record(Change::insert(Position::new(0, 3), " two"));
        buf.insert_at(Position::new(0, 7), "\nthree");
        undo.record(Change::insert(Position::new(0, 7), "\nthree"));
        undo.commit(group, Position::new(1, 4));

        let after = buf.lines();
        undo.undo(&mut buf);
        assert_eq!(buf.lines(), vec!["one"]);
        undo.redo(&mut buf);
        assert_eq!(buf.lines(), after);
    }

    #[test]
    fn test_nested_groups_flatten() {
        let mut buf = Buffer::from_lines(&["a", "b", "c"]);
        let mut undo = UndoStack::new();
        let outer = undo.begin(Position::new(0, 0));
        let inner = undo.begin(Position::new(0, 0));
        assert!(!inner.is_outermost());
        delete_line(&mut buf, &mut undo, 0);
        undo.commit(inner, Position::new(0, 0));
        delete_line(&mut buf, &mut undo, 0);
        undo.commit(outer, Position::new(0, 0));

        assert_eq!(undo.undo_count(), 1);
        undo.undo(&mut buf);
        assert_eq!(buf.lines(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut buf = Buffer::from_lines(&["a", "b"]);
        let mut undo = UndoStack::new();
        let g = undo.begin(Position::default());
        delete_line(&mut buf, &mut undo, 0);
        undo.commit(g, Position::default());
        undo.undo(&mut buf);
        assert!(undo.can_redo());

        let g = undo.begin(Position::default());
        delete_line(&mut buf, &mut undo, 1);
        undo.commit(g, Position::default());
        assert!(!undo.can_redo());
    }

    #[test]
    fn test_rollback_discards_partial_edits() {
        let mut buf = Buffer::from_lines(&["a", "b", "c"]);
        let mut undo = UndoStack::new();
        let g = undo.begin(Position::new(2, 0));
        delete_line(&mut buf, &mut undo, 0);
        delete_line(&mut buf, &mut undo, 0);
        assert_eq!(undo.rollback(g, &mut buf), Some(Position::new(2, 0)));
        assert_eq!(buf.lines(), vec!["a", "b", "c"]);
        assert!(!undo.can_undo());
        assert!(!undo.is_open());
    }

    #[test]
    fn test_nested_rollback_keeps_outer_changes() {
        let mut buf = Buffer::from_lines(&["a", "b", "c"]);
        let mut undo = UndoStack::new();
        let outer = undo.begin(Position::default());
        delete_line(&mut buf, &mut undo, 0);
        let inner = undo.begin(Position::default());
        delete_line(&mut buf, &mut undo, 0);
        undo.rollback(inner, &mut buf);
        undo.commit(outer, Position::default());

        assert_eq!(buf.lines(), vec!["b", "c"]);
        undo.undo(&mut buf);
        assert_eq!(buf.lines(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_levels_bound_history() {
        let mut buf = Buffer::from_lines(&["1", "2", "3", "4"]);
        let mut undo = UndoStack::with_levels(2);
        for _ in 0..3 {
            let g = undo.begin(Position::default());
            delete_line(&mut buf, &mut undo, 0);
            undo.commit(g, Position::default());
        }
        assert_eq!(undo.undo_count(), 2);
    }

    #[test]
    fn test_empty_group_not_recorded() {
        let mut undo = UndoStack::new();
        let g = undo.begin(Position::default());
        undo.commit(g, Position::default());
        assert!(!undo.can_undo());
    }
}
