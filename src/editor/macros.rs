use crossterm::event::KeyEvent;

use crate::error::{EngineError, Result};

/// Macro recording and playback state.
///
/// Recorded keys are stored in the register itself (as key notation), so
/// this only tracks which register is recording and which are playing.
#[derive(Debug, Clone, Default)]
pub struct MacroState {
    /// Currently recording to this register (None if not recording)
    recording: Option<char>,
    /// Keys being recorded for the current macro
    current_recording: Vec<KeyEvent>,
    /// Registers whose playback is in progress, innermost last
    playing: Vec<char>,
    /// Last executed macro register (for @@)
    last_executed: Option<char>,
}

impl MacroState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if currently recording a macro
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Get the register currently being recorded to
    pub fn recording_register(&self) -> Option<char> {
        self.recording
    }

    pub fn is_playing(&self) -> bool {
        !self.playing.is_empty()
    }

    /// Nesting depth of macro playback
    pub fn depth(&self) -> usize {
        self.playing.len()
    }

    /// Start recording a macro to the given register
    pub fn start_recording(&mut self, register: char) -> Result<()> {
        if !Self::is_valid_register(register) {
            return Err(EngineError::InvalidRegister(register));
        }
        if self.playing.contains(&register.to_ascii_lowercase()) {
            return Err(EngineError::RegisterBusy(register));
        }
        self.recording = Some(register);
        self.current_recording.clear();
        Ok(())
    }

    /// Stop recording and hand back the register and its keys, minus the final `q`
    pub fn stop_recording(&mut self) -> Option<(char, Vec<KeyEvent>)> {
        let register = self.recording.take()?;
        let mut keys = std::mem::take(&mut self.current_recording);
        keys.pop();
        Some((register, keys))
    }

    /// Record a key event (called during recording)
    pub fn record_key(&mut self, key: KeyEvent) {
        if self.recording.is_some() && self.playing.is_empty() {
            self.current_recording.push(key);
        }
    }

    /// Mark a register as playing; fails when nesting gets too deep
    pub fn begin_playback(&mut self, register: char, max_depth: usize) -> Result<()> {
        if self.playing.len() >= max_depth {
            return Err(EngineError::RecursiveMacro);
        }
        self.playing.push(register.to_ascii_lowercase());
        self.last_executed = Some(register);
        Ok(())
    }

    pub fn end_playback(&mut self) {
        self.playing.pop();
    }

    /// Get the last executed macro register
    pub fn last_executed(&self) -> Option<char> {
        self.last_executed
    }

    /// Check if a register name is valid for recording
    pub fn is_valid_register(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '"'
    }
}
