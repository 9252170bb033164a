//! Configuration for the engine
//!
//! Loads settings from ~/.config/notemode/config.toml and applies `:set` changes at runtime.

pub mod keymap;

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{EngineError, Result};

pub use keymap::{
    key_to_notation, keys_to_notation, parse_key_notation, parse_key_sequence, MapMode, MapTable,
    Mapping, MappingLookup,
};

/// Top-level settings file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub options: Options,
    pub mappings: Vec<MappingSettings>,
}

/// A mapping declared in the settings file
#[derive(Debug, Clone, Deserialize)]
pub struct MappingSettings {
    /// "normal", "visual", "insert" or "all" (normal + visual)
    #[serde(default = "default_map_mode")]
    pub mode: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub noremap: bool,
}

fn default_map_mode() -> String {
    "all".to_string()
}

/// Behavioural options, the subset of Vim's options the engine honours
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Display width of a tab character (default: 8)
    pub tabstop: usize,
    /// Columns per indent level for `>`, `<` and `=` (default: 8)
    pub shiftwidth: usize,
    /// Insert spaces instead of tabs (default: false)
    pub expandtab: bool,
    /// Ignore case in search patterns (default: true)
    pub ignorecase: bool,
    /// Override ignorecase when the pattern has uppercase (default: true)
    pub smartcase: bool,
    /// Preview matches while typing a search (default: true)
    pub incsearch: bool,
    /// Searches wrap around the end of the buffer (default: true)
    pub wrapscan: bool,
    /// Report every match of the last pattern for highlighting (default: false)
    pub hlsearch: bool,
    /// Maximum number of undo groups kept (default: 1000)
    pub undolevels: usize,
    /// Maximum mapping and macro nesting before giving up (default: 1000)
    pub maxmapdepth: usize,
    /// Refuse ex-commands whose range covers more lines than this
    pub line_limit: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tabstop: 8,
            shiftwidth: 8,
            expandtab: false,
            ignorecase: true,
            smartcase: true,
            incsearch: true,
            wrapscan: true,
            hlsearch: false,
            undolevels: 1000,
            maxmapdepth: 1000,
            line_limit: None,
        }
    }
}

/// Options addressable from `:set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionName {
    Tabstop,
    Shiftwidth,
    Expandtab,
    Ignorecase,
    Smartcase,
    Incsearch,
    Wrapscan,
    Hlsearch,
    Undolevels,
    Maxmapdepth,
    LineLimit,
}

impl OptionName {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "tabstop" | "ts" => OptionName::Tabstop,
            "shiftwidth" | "sw" => OptionName::Shiftwidth,
            "expandtab" | "et" => OptionName::Expandtab,
            "ignorecase" | "ic" => OptionName::Ignorecase,
            "smartcase" | "scs" => OptionName::Smartcase,
            "incsearch" | "is" => OptionName::Incsearch,
            "wrapscan" | "ws" => OptionName::Wrapscan,
            "hlsearch" | "hls" => OptionName::Hlsearch,
            "undolevels" | "ul" => OptionName::Undolevels,
            "maxmapdepth" | "mmd" => OptionName::Maxmapdepth,
            "line_limit" | "linelimit" => OptionName::LineLimit,
            _ => return None,
        })
    }

    fn full_name(self) -> &'static str {
        match self {
            OptionName::Tabstop => "tabstop",
            OptionName::Shiftwidth => "shiftwidth",
            OptionName::Expandtab => "expandtab",
            OptionName::Ignorecase => "ignorecase",
            OptionName::Smartcase => "smartcase",
            OptionName::Incsearch => "incsearch",
            OptionName::Wrapscan => "wrapscan",
            OptionName::Hlsearch => "hlsearch",
            OptionName::Undolevels => "undolevels",
            OptionName::Maxmapdepth => "maxmapdepth",
            OptionName::LineLimit => "line_limit",
        }
    }

    fn is_bool(self) -> bool {
        matches!(
            self,
            OptionName::Expandtab
                | OptionName::Ignorecase
                | OptionName::Smartcase
                | OptionName::Incsearch
                | OptionName::Wrapscan
                | OptionName::Hlsearch
        )
    }
}

impl Options {
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply the arguments of a `:set` command.
    ///
    /// Returns a message to display for queries (`:set ts?`, `:set ic`).
    pub fn apply_set(&mut self, args: &str) -> Result<Option<String>> {
        let args = args.trim();
        if args.is_empty() {
            return Ok(Some(self.describe_changed()));
        }

        let mut shown = Vec::new();
        for item in args.split_whitespace() {
            if let Some(msg) = self.apply_one(item)? {
                shown.push(msg);
            }
        }
        Ok(if shown.is_empty() {
            None
        } else {
            Some(shown.join("  "))
        })
    }

    fn apply_one(&mut self, item: &str) -> Result<Option<String>> {
        if let Some((name, value)) = item.split_once('=') {
            let opt = OptionName::lookup(name)
                .ok_or_else(|| EngineError::UnknownOption(name.to_string()))?;
            if opt.is_bool() {
                return Err(EngineError::InvalidArgument(item.to_string()));
            }
            self.set_number(opt, value, item)?;
            return Ok(None);
        }

        if let Some(name) = item.strip_suffix('?') {
            let opt = OptionName::lookup(name)
                .ok_or_else(|| EngineError::UnknownOption(name.to_string()))?;
            return Ok(Some(self.show(opt)));
        }

        if let Some(name) = item.strip_suffix('!') {
            return self.toggle(name, item);
        }
        if let Some(name) = item.strip_prefix("inv") {
            if OptionName::lookup(name).is_some() {
                return self.toggle(name, item);
            }
        }

        if let Some(opt) = OptionName::lookup(item) {
            if opt.is_bool() {
                self.set_bool(opt, true);
                return Ok(None);
            }
            // `:set ts` shows the value of a number option
            return Ok(Some(self.show(opt)));
        }

        if let Some(name) = item.strip_prefix("no") {
            if let Some(opt) = OptionName::lookup(name) {
                if opt == OptionName::LineLimit {
                    self.line_limit = None;
                    return Ok(None);
                }
                if !opt.is_bool() {
                    return Err(EngineError::InvalidArgument(item.to_string()));
                }
                self.set_bool(opt, false);
                return Ok(None);
            }
        }

        Err(EngineError::UnknownOption(item.to_string()))
    }

    fn toggle(&mut self, name: &str, item: &str) -> Result<Option<String>> {
        let opt =
            OptionName::lookup(name).ok_or_else(|| EngineError::UnknownOption(name.to_string()))?;
        if !opt.is_bool() {
            return Err(EngineError::InvalidArgument(item.to_string()));
        }
        let current = self.get_bool(opt);
        self.set_bool(opt, !current);
        Ok(None)
    }

    fn set_number(&mut self, opt: OptionName, value: &str, item: &str) -> Result<()> {
        let n: usize = value
            .parse()
            .map_err(|_| EngineError::InvalidArgument(item.to_string()))?;
        match opt {
            OptionName::Tabstop | OptionName::Shiftwidth if n == 0 => {
                return Err(EngineError::InvalidArgument(item.to_string()));
            }
            OptionName::Tabstop => self.tabstop = n,
            OptionName::Shiftwidth => self.shiftwidth = n,
            OptionName::Undolevels => self.undolevels = n,
            OptionName::Maxmapdepth => self.maxmapdepth = n.max(1),
            OptionName::LineLimit => self.line_limit = Some(n),
            _ => return Err(EngineError::InvalidArgument(item.to_string())),
        }
        Ok(())
    }

    fn get_bool(&self, opt: OptionName) -> bool {
        match opt {
            OptionName::Expandtab => self.expandtab,
            OptionName::Ignorecase => self.ignorecase,
            OptionName::Smartcase => self.smartcase,
            OptionName::Incsearch => self.incsearch,
            OptionName::Wrapscan => self.wrapscan,
            OptionName::Hlsearch => self.hlsearch,
            _ => false,
        }
    }

    fn set_bool(&mut self, opt: OptionName, value: bool) {
        match opt {
            OptionName::Expandtab => self.expandtab = value,
            OptionName::Ignorecase => self.ignorecase = value,
            OptionName::Smartcase => self.smartcase = value,
            OptionName::Incsearch => self.incsearch = value,
            OptionName::Wrapscan => self.wrapscan = value,
            OptionName::Hlsearch => self.hlsearch = value,
            _ => {}
        }
    }

    fn show(&self, opt: OptionName) -> String {
        let name = opt.full_name();
        match opt {
            OptionName::Tabstop => format!("{}={}", name, self.tabstop),
            OptionName::Shiftwidth => format!("{}={}", name, self.shiftwidth),
            OptionName::Undolevels => format!("{}={}", name, self.undolevels),
            OptionName::Maxmapdepth => format!("{}={}", name, self.maxmapdepth),
            OptionName::LineLimit => match self.line_limit {
                Some(n) => format!("{}={}", name, n),
                None => format!("no{}", name),
            },
            _ if self.get_bool(opt) => name.to_string(),
            _ => format!("no{}", name),
        }
    }

    /// Options that differ from their defaults, as `:set` with no arguments reports them
    fn describe_changed(&self) -> String {
        let defaults = Options::default();
        let all = [
            OptionName::Tabstop,
            OptionName::Shiftwidth,
            OptionName::Expandtab,
            OptionName::Ignorecase,
            OptionName::Smartcase,
            OptionName::Incsearch,
            OptionName::Wrapscan,
            OptionName::Hlsearch,
            OptionName::Undolevels,
            OptionName::Maxmapdepth,
            OptionName::LineLimit,
        ];
        let changed: Vec<String> = all
            .into_iter()
            .filter(|&opt| self.show(opt) != defaults.show(opt))
            .map(|opt| self.show(opt))
            .collect();
        if changed.is_empty() {
            "--- Options ---".to_string()
        } else {
            format!("--- Options ---  {}", changed.join("  "))
        }
    }
}

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("notemode"))
}

/// Get the config file path
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

pub fn parse_settings(content: &str) -> std::result::Result<Settings, toml::de::Error> {
    toml::from_str(content)
}

/// Load settings from the config file, or return defaults
pub fn load_settings() -> Settings {
    let Some(path) = config_path() else {
        return Settings::default();
    };

    if !path.exists() {
        return Settings::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_settings(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(target: "config", path = %path.display(), error = %e, "failed to parse config file");
                Settings::default()
            }
        },
        Err(e) => {
            tracing::warn!(target: "config", path = %path.display(), error = %e, "failed to read config file");
            Settings::default()
        }
    }
}
