//! Key notation parsing and user mapping tables for `:map` and friends

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

/// Modes a mapping can apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    Normal,
    Visual,
    Insert,
}

impl MapMode {
    /// Modes covered by a `:map`-family command name (`map`, `nmap`, `inoremap`, ...)
    pub fn for_command(name: &str, bang: bool) -> Option<&'static [MapMode]> {
        const NV: &[MapMode] = &[MapMode::Normal, MapMode::Visual];
        const N: &[MapMode] = &[MapMode::Normal];
        const V: &[MapMode] = &[MapMode::Visual];
        const I: &[MapMode] = &[MapMode::Insert];
        match name {
            "map" | "noremap" | "unmap" | "mapclear" if bang => Some(I),
            "map" | "noremap" | "unmap" | "mapclear" => Some(NV),
            "nmap" | "nnoremap" | "nunmap" => Some(N),
            "vmap" | "vnoremap" | "vunmap" | "xmap" | "xnoremap" | "xunmap" => Some(V),
            "imap" | "inoremap" | "iunmap" => Some(I),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<&'static [MapMode]> {
        match s {
            "normal" | "n" => Some(&[MapMode::Normal]),
            "visual" | "v" => Some(&[MapMode::Visual]),
            "insert" | "i" => Some(&[MapMode::Insert]),
            "all" | "" => Some(&[MapMode::Normal, MapMode::Visual]),
            _ => None,
        }
    }

    fn letter(self) -> char {
        match self {
            MapMode::Normal => 'n',
            MapMode::Visual => 'v',
            MapMode::Insert => 'i',
        }
    }
}

/// A user-defined key mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub lhs: Vec<KeyEvent>,
    pub rhs: Vec<KeyEvent>,
    /// When set, the expansion is not subject to further mapping
    pub noremap: bool,
}

/// Result of matching typed keys against the mapping table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingLookup {
    /// No mapping starts with these keys
    None,
    /// Keys are a strict prefix of at least one mapping
    Prefix,
    /// Keys match a mapping exactly and nothing longer
    Exact(Mapping),
    /// Keys match a mapping exactly, but a longer mapping also starts with them
    Ambiguous(Mapping),
}

/// All user mappings, per mode
#[derive(Debug, Clone, Default)]
pub struct MapTable {
    maps: HashMap<MapMode, Vec<Mapping>>,
}

impl MapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self, mode: MapMode) -> bool {
        self.maps.get(&mode).map_or(true, Vec::is_empty)
    }

    /// Define or redefine a mapping in each of `modes`
    pub fn insert(&mut self, modes: &[MapMode], lhs: Vec<KeyEvent>, rhs: Vec<KeyEvent>, noremap: bool) {
        for mode in modes {
            let entries = self.maps.entry(*mode).or_default();
            entries.retain(|m| m.lhs != lhs);
            entries.push(Mapping {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
                noremap,
            });
        }
    }

    /// Remove a mapping; returns false when no mode had it
    pub fn remove(&mut self, modes: &[MapMode], lhs: &[KeyEvent]) -> bool {
        let mut removed = false;
        for mode in modes {
            if let Some(entries) = self.maps.get_mut(mode) {
                let before = entries.len();
                entries.retain(|m| m.lhs != lhs);
                removed |= entries.len() != before;
            }
        }
        removed
    }

    pub fn clear(&mut self, modes: &[MapMode]) {
        for mode in modes {
            self.maps.remove(mode);
        }
    }

    pub fn lookup(&self, mode: MapMode, keys: &[KeyEvent]) -> MappingLookup {
        let Some(entries) = self.maps.get(&mode) else {
            return MappingLookup::None;
        };

        let mut exact = None;
        let mut longer = false;
        for mapping in entries {
            if mapping.lhs == keys {
                exact = Some(mapping.clone());
            } else if mapping.lhs.len() > keys.len() && mapping.lhs.starts_with(keys) {
                longer = true;
            }
        }

        match (exact, longer) {
            (Some(m), false) => MappingLookup::Exact(m),
            (Some(m), true) => MappingLookup::Ambiguous(m),
            (None, true) => MappingLookup::Prefix,
            (None, false) => MappingLookup::None,
        }
    }

    /// Listing shown by `:map` without a rhs, filtered by an optional lhs prefix
    pub fn describe(&self, modes: &[MapMode], prefix: &[KeyEvent]) -> Vec<String> {
        let mut lines = Vec::new();
        for mode in modes {
            if let Some(entries) = self.maps.get(mode) {
                for m in entries.iter().filter(|m| m.lhs.starts_with(prefix)) {
                    lines.push(format!(
                        "{}  {:<10} {}{}",
                        mode.letter(),
                        keys_to_notation(&m.lhs),
                        if m.noremap { "* " } else { "  " },
                        keys_to_notation(&m.rhs)
                    ));
                }
            }
        }
        lines.sort();
        lines
    }
}

/// Canonical form of a key event.
///
/// Hosts report uppercase letters with or without SHIFT and with varying
/// kind/state fields; the engine compares keys by code and meaningful modifiers only.
pub fn normalize_key(key: KeyEvent) -> KeyEvent {
    let mut modifiers = key.modifiers & (KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SHIFT);
    let code = match key.code {
        KeyCode::Char(c) => {
            modifiers.remove(KeyModifiers::SHIFT);
            if modifiers.contains(KeyModifiers::CONTROL) {
                KeyCode::Char(c.to_ascii_lowercase())
            } else {
                KeyCode::Char(c)
            }
        }
        KeyCode::BackTab => {
            modifiers.remove(KeyModifiers::SHIFT);
            KeyCode::BackTab
        }
        other => other,
    };
    KeyEvent::new(code, modifiers)
}

/// Parse a key notation string into a KeyEvent
///
/// Supported formats:
/// - Single characters: "a", "H", ";", "0"
/// - Control keys: "<C-r>", "<C-s>"
/// - Special keys: "<CR>", "<Esc>", "<Tab>", "<BS>", "<Space>", "<lt>"
/// - Function keys: "<F1>" through "<F12>"
pub fn parse_key_notation(s: &str) -> Option<KeyEvent> {
    if s.is_empty() {
        return None;
    }

    if s.len() > 2 && s.starts_with('<') && s.ends_with('>') {
        let inner = &s[1..s.len() - 1];
        return parse_special_notation(inner);
    }

    let mut chars = s.chars();
    let c = chars.next()?;
    if chars.next().is_none() {
        return Some(char_key(c));
    }

    None
}

/// Parse a whole key sequence like `dw`, `:s/a/b/<CR>` or `<C-r>"`.
///
/// A `<` that does not start valid notation is taken literally.
pub fn parse_key_sequence(s: &str) -> Vec<KeyEvent> {
    let mut keys = Vec::new();
    let mut remaining = s;

    while let Some(c) = remaining.chars().next() {
        if c == '<' {
            if let Some(end) = remaining.find('>') {
                if let Some(key) = parse_key_notation(&remaining[..=end]) {
                    keys.push(key);
                    remaining = &remaining[end + 1..];
                    continue;
                }
            }
        }
        keys.push(char_key(c));
        remaining = &remaining[c.len_utf8()..];
    }

    keys
}

/// Parse special notation (content inside < >)
fn parse_special_notation(inner: &str) -> Option<KeyEvent> {
    let inner_lower = inner.to_lowercase();

    let modified = |prefix: &str| -> Option<char> {
        let head = inner.get(..prefix.len())?;
        if !head.eq_ignore_ascii_case(prefix) {
            return None;
        }
        let mut chars = inner[prefix.len()..].chars();
        let c = chars.next()?;
        chars.next().is_none().then_some(c)
    };

    // Control key: <C-x>
    if let Some(c) = modified("c-") {
        return Some(KeyEvent::new(
            KeyCode::Char(c.to_ascii_lowercase()),
            KeyModifiers::CONTROL,
        ));
    }

    // Alt/Meta key: <A-x> or <M-x>
    if let Some(c) = modified("a-").or_else(|| modified("m-")) {
        return Some(KeyEvent::new(KeyCode::Char(c), KeyModifiers::ALT));
    }

    // Shift key: <S-x>
    if let Some(c) = modified("s-") {
        return Some(char_key(c.to_ascii_uppercase()));
    }

    // Function keys: <F1> through <F12>
    if let Some(n) = inner_lower.strip_prefix('f') {
        if let Ok(n) = n.parse::<u8>() {
            if (1..=12).contains(&n) {
                return Some(KeyEvent::new(KeyCode::F(n), KeyModifiers::NONE));
            }
        }
    }

    let code = match inner_lower.as_str() {
        "cr" | "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "bs" | "backspace" => KeyCode::Backspace,
        "del" | "delete" => KeyCode::Delete,
        "space" => KeyCode::Char(' '),
        "lt" => KeyCode::Char('<'),
        "bar" => KeyCode::Char('|'),
        "bslash" => KeyCode::Char('\\'),
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        "insert" => KeyCode::Insert,
        _ => return None,
    };
    Some(KeyEvent::new(code, KeyModifiers::NONE))
}

/// Convert a single character to a normalized KeyEvent
/// Plain chars; raw control chars from register text map to their keys
fn char_key(c: char) -> KeyEvent {
    let code = match c {
        '\n' | '\r' => KeyCode::Enter,
        '\t' => KeyCode::Tab,
        '\x1b' => KeyCode::Esc,
        c => KeyCode::Char(c),
    };
    KeyEvent::new(code, KeyModifiers::NONE)
}

/// Render a key in notation form, the inverse of `parse_key_notation`
pub fn key_to_notation(key: &KeyEvent) -> String {
    let key = normalize_key(*key);
    if let KeyCode::Char(c) = key.code {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return format!("<C-{}>", c);
        }
        if key.modifiers.contains(KeyModifiers::ALT) {
            return format!("<M-{}>", c);
        }
        return match c {
            '<' => "<lt>".to_string(),
            c => c.to_string(),
        };
    }

    let name = match key.code {
        KeyCode::Enter => "CR".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => "S-Tab".to_string(),
        KeyCode::Backspace => "BS".to_string(),
        KeyCode::Delete => "Del".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Insert => "Insert".to_string(),
        KeyCode::F(n) => format!("F{}", n),
        _ => "Nop".to_string(),
    };
    format!("<{}>", name)
}

pub fn keys_to_notation(keys: &[KeyEvent]) -> String {
    keys.iter().map(key_to_notation).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(s: &str) -> Vec<KeyEvent> {
        parse_key_sequence(s)
    }

    #[test]
    fn test_parse_single_char() {
        let key = parse_key_notation("a").unwrap();
        assert_eq!(key.code, KeyCode::Char('a'));
        assert_eq!(key.modifiers, KeyModifiers::NONE);

        let key = parse_key_notation("H").unwrap();
        assert_eq!(key.code, KeyCode::Char('H'));
        assert_eq!(key.modifiers, KeyModifiers::NONE);
    }

    #[test]
    fn test_parse_control() {
        let key = parse_key_notation("<C-r>").unwrap();
        assert_eq!(key.code, KeyCode::Char('r'));
        assert_eq!(key.modifiers, KeyModifiers::CONTROL);

        let key = parse_key_notation("<C-V>").unwrap();
        assert_eq!(key.code, KeyCode::Char('v'));
    }

    #[test]
    fn test_parse_special() {
        assert_eq!(parse_key_notation("<CR>").unwrap().code, KeyCode::Enter);
        assert_eq!(parse_key_notation("<Esc>").unwrap().code, KeyCode::Esc);
        assert_eq!(parse_key_notation("<lt>").unwrap().code, KeyCode::Char('<'));
        assert_eq!(parse_key_notation("<F12>").unwrap().code, KeyCode::F(12));
        assert!(parse_key_notation("<Bogus>").is_none());
    }

    #[test]
    fn test_parse_sequence_with_literal_angle() {
        let seq = keys("d<Esc>a<b");
        assert_eq!(seq.len(), 5);
        assert_eq!(seq[1].code, KeyCode::Esc);
        assert_eq!(seq[3].code, KeyCode::Char('<'));
        assert_eq!(seq[4].code, KeyCode::Char('b'));
    }

    #[test]
    fn test_notation_round_trip() {
        let text = "ihello<Esc>:s/a/b/<CR><C-r><lt>";
        assert_eq!(keys_to_notation(&keys(text)), text);
    }

    #[test]
    fn test_normalize_strips_shift_on_chars() {
        let shifted = KeyEvent::new(KeyCode::Char('W'), KeyModifiers::SHIFT);
        assert_eq!(normalize_key(shifted), parse_key_notation("W").unwrap());
        let ctrl = KeyEvent::new(KeyCode::Char('R'), KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        assert_eq!(normalize_key(ctrl), parse_key_notation("<C-r>").unwrap());
    }

    #[test]
    fn test_lookup_prefix_and_exact() {
        let mut table = MapTable::new();
        table.insert(&[MapMode::Normal], keys("gx"), keys("dd"), false);
        table.insert(&[MapMode::Normal], keys("g"), keys("G"), true);

        assert!(matches!(
            table.lookup(MapMode::Normal, &keys("g")),
            MappingLookup::Ambiguous(_)
        ));
        assert!(matches!(
            table.lookup(MapMode::Normal, &keys("gx")),
            MappingLookup::Exact(_)
        ));
        assert_eq!(table.lookup(MapMode::Normal, &keys("q")), MappingLookup::None);
        assert_eq!(table.lookup(MapMode::Insert, &keys("g")), MappingLookup::None);
    }

    #[test]
    fn test_redefine_and_remove() {
        let mut table = MapTable::new();
        let modes = MapMode::for_command("map", false).unwrap();
        table.insert(modes, keys("x"), keys("y"), false);
        table.insert(modes, keys("x"), keys("z"), true);
        match table.lookup(MapMode::Visual, &keys("x")) {
            MappingLookup::Exact(m) => {
                assert_eq!(m.rhs, keys("z"));
                assert!(m.noremap);
            }
            other => panic!("expected exact mapping, got {:?}", other),
        }
        assert!(table.remove(modes, &keys("x")));
        assert!(!table.remove(modes, &keys("x")));
        assert!(table.is_empty(MapMode::Normal));
    }

    #[test]
    fn test_map_modes_for_commands() {
        assert_eq!(MapMode::for_command("map", true), Some(&[MapMode::Insert][..]));
        assert_eq!(MapMode::for_command("nnoremap", false), Some(&[MapMode::Normal][..]));
        assert_eq!(MapMode::for_command("frob", false), None);
    }
}
