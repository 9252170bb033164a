#![allow(dead_code)] // Shared across the integration tests; each test binary uses a subset of helpers.

use notemode::{Buffer, BufferAdapter, Engine, FileIo, MemoryFileIo};

pub fn engine(text: &str) -> Engine<Buffer> {
    Engine::new(Buffer::from_text(text), Box::new(MemoryFileIo::new()))
}

pub fn engine_with_io(text: &str, io: impl FileIo + 'static) -> Engine<Buffer> {
    Engine::new(Buffer::from_text(text), Box::new(io))
}

/// Run a key script on a fresh engine
pub fn run(text: &str, keys: &str) -> Engine<Buffer> {
    let mut e = engine(text);
    e.handle_keys(keys);
    e
}

pub fn lines(e: &Engine<Buffer>) -> Vec<String> {
    e.buffer().lines()
}

pub fn text(e: &Engine<Buffer>) -> String {
    e.buffer().content()
}

pub fn status(e: &Engine<Buffer>) -> String {
    e.status_message().map(|m| m.text.clone()).unwrap_or_default()
}

pub fn is_error(e: &Engine<Buffer>) -> bool {
    e.status_message().map_or(false, |m| m.is_error)
}
