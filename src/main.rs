use std::env;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use notemode::{load_settings, Buffer, BufferAdapter, Engine, FsFileIo};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: notemode FILE [KEYS]";

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the buffer
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next().map(PathBuf::from) else {
        bail!(USAGE);
    };
    let keys = args.next().unwrap_or_default();
    if args.next().is_some() {
        bail!(USAGE);
    }

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };

    let settings = load_settings();
    let mut engine = Engine::new(Buffer::from_text(&content), Box::new(FsFileIo)).with_file_name(&path);
    engine.apply_settings(&settings);
    tracing::debug!(path = %path.display(), keys = %keys, "running key script");

    let effects = engine.handle_keys(&keys);
    for error in &effects.errors {
        eprintln!("{}", error.text);
    }

    if effects.written.is_none() {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(engine.buffer().content().as_bytes())
            .context("writing buffer to stdout")?;
    }

    match effects.errors.len() {
        0 => Ok(()),
        1 => bail!("1 command failed"),
        n => bail!("{n} commands failed"),
    }
}
