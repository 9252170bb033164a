use std::collections::HashMap;

use crate::error::{EngineError, Result};

/// How register text is put back into the buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegisterKind {
    /// Character-wise (inline) content
    #[default]
    Charwise,
    /// Whole lines; the text always ends with a newline
    Linewise,
    /// Rectangular block; one row per line, no trailing newline
    Blockwise,
}

/// Content of a register
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterContent {
    pub text: String,
    pub kind: RegisterKind,
}

impl RegisterContent {
    pub fn chars(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: RegisterKind::Charwise,
        }
    }

    /// Linewise content; a trailing newline is added when missing
    pub fn lines(text: impl Into<String>) -> Self {
        let mut text = text.into();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Self {
            text,
            kind: RegisterKind::Linewise,
        }
    }

    pub fn block(rows: &[String]) -> Self {
        Self {
            text: rows.join("\n"),
            kind: RegisterKind::Blockwise,
        }
    }

    pub fn is_linewise(&self) -> bool {
        self.kind == RegisterKind::Linewise
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Lines of the content without the linewise terminator
    pub fn rows(&self) -> Vec<&str> {
        let text = match self.kind {
            RegisterKind::Linewise => self.text.strip_suffix('\n').unwrap_or(&self.text),
            _ => &self.text,
        };
        text.split('\n').collect()
    }

    fn append(&mut self, other: RegisterContent) {
        match (self.kind, other.kind) {
            (RegisterKind::Linewise, RegisterKind::Linewise) => self.text.push_str(&other.text),
            (RegisterKind::Linewise, _) => {
                self.text.push_str(&other.text);
                self.text.push('\n');
            }
            (_, RegisterKind::Linewise) => {
                self.text.push('\n');
                self.text.push_str(&other.text);
                self.kind = RegisterKind::Linewise;
            }
            (RegisterKind::Blockwise, _) | (_, RegisterKind::Blockwise) => {
                self.text.push('\n');
                self.text.push_str(&other.text);
            }
            _ => self.text.push_str(&other.text),
        }
    }
}

/// Check if a register is the black hole register
pub fn is_black_hole_register(name: Option<char>) -> bool {
    matches!(name, Some('_'))
}

/// Vim-style register system
#[derive(Debug, Clone, Default)]
pub struct Registers {
    /// Named registers (a-z) and other user slots (+, *)
    named: HashMap<char, RegisterContent>,
    /// Unnamed register (default for yank/delete)
    unnamed: Option<RegisterContent>,
    /// Register 0, the last yank
    last_yank: Option<RegisterContent>,
    /// Small delete register (for deletes within one line)
    small_delete: Option<RegisterContent>,
    /// Numbered registers 1-9 (for delete history)
    numbered: [Option<RegisterContent>; 9],
    /// Read-only registers maintained by the engine
    last_inserted: Option<String>,
    last_command: Option<String>,
    last_search: Option<String>,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `c` names any register
    pub fn is_valid_name(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '"' | '-' | '_' | '.' | ':' | '/' | '+' | '*')
    }

    pub fn is_read_only(c: char) -> bool {
        matches!(c, '.' | ':' | '/')
    }

    /// Get the content of a register; unset registers read as empty text
    pub fn get(&self, name: char) -> RegisterContent {
        let stored = match name {
            '"' => self.unnamed.clone(),
            '0' => self.last_yank.clone(),
            '-' => self.small_delete.clone(),
            c @ '1'..='9' => self.numbered[c as usize - '1' as usize].clone(),
            c @ ('a'..='z' | 'A'..='Z') => self.named.get(&c.to_ascii_lowercase()).cloned(),
            '.' => self.last_inserted.clone().map(RegisterContent::chars),
            ':' => self.last_command.clone().map(RegisterContent::chars),
            '/' => self.last_search.clone().map(RegisterContent::chars),
            '_' => None,
            c => self.named.get(&c).cloned(),
        };
        stored.unwrap_or_default()
    }

    /// Register used when none is given
    pub fn unnamed(&self) -> RegisterContent {
        self.get('"')
    }

    /// Set the content of a register directly.
    ///
    /// Uppercase names append. The unnamed register is not touched unless it is the target.
    pub fn set(&mut self, name: char, content: RegisterContent) -> Result<()> {
        if !Self::is_valid_name(name) || Self::is_read_only(name) {
            return Err(EngineError::InvalidRegister(name));
        }
        match name {
            '"' => self.unnamed = Some(content),
            '0' => self.last_yank = Some(content),
            '-' => self.small_delete = Some(content),
            '_' => {}
            c @ '1'..='9' => self.numbered[c as usize - '1' as usize] = Some(content),
            c @ 'A'..='Z' => {
                let lower = c.to_ascii_lowercase();
                match self.named.get_mut(&lower) {
                    Some(existing) => existing.append(content),
                    None => {
                        self.named.insert(lower, content);
                    }
                }
            }
            c => {
                self.named.insert(c, content);
            }
        }
        Ok(())
    }

    /// Store a yank: the named register (if any), the unnamed one, and `0` when none was named
    pub fn yank(&mut self, name: Option<char>, content: RegisterContent) -> Result<()> {
        if is_black_hole_register(name) {
            return Ok(());
        }
        match name {
            Some(c) if c != '"' => {
                self.set(c, content)?;
                self.unnamed = Some(self.get(c));
            }
            _ => {
                self.last_yank = Some(content.clone());
                self.unnamed = Some(content);
            }
        }
        Ok(())
    }

    /// Store a delete.
    ///
    /// Every delete shifts the numbered ring so `1` holds the newest one;
    /// deletes within a line also land in `-` when no register was named.
    pub fn delete(&mut self, name: Option<char>, content: RegisterContent, is_small: bool) -> Result<()> {
        if is_black_hole_register(name) {
            return Ok(());
        }

        match name {
            Some(c) if c != '"' => {
                self.set(c, content.clone())?;
                self.unnamed = Some(self.get(c));
            }
            _ => {
                self.unnamed = Some(content.clone());
                if is_small {
                    self.small_delete = Some(content.clone());
                }
            }
        }

        self.numbered.rotate_right(1);
        self.numbered[0] = Some(content);
        Ok(())
    }

    pub fn set_last_inserted(&mut self, text: impl Into<String>) {
        self.last_inserted = Some(text.into());
    }

    pub fn set_last_command(&mut self, text: impl Into<String>) {
        self.last_command = Some(text.into());
    }

    pub fn set_last_search(&mut self, text: impl Into<String>) {
        self.last_search = Some(text.into());
    }

    /// Non-empty registers in display order, for `:registers`
    pub fn list(&self) -> Vec<(char, RegisterContent)> {
        let mut names = vec!['"', '0'];
        names.extend('1'..='9');
        names.extend('a'..='z');
        names.extend(['-', '.', ':', '/', '+', '*']);
        names
            .into_iter()
            .map(|c| (c, self.get(c)))
            .filter(|(_, content)| !content.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_register_is_empty() {
        let regs = Registers::new();
        let content = regs.get('q');
        assert_eq!(content.text, "");
        assert_eq!(content.kind, RegisterKind::Charwise);
    }

    #[test]
    fn test_yank_updates_unnamed_and_zero() {
        let mut regs = Registers::new();
        regs.yank(None, RegisterContent::lines("beta")).unwrap();
        assert_eq!(regs.unnamed().text, "beta\n");
        assert_eq!(regs.get('0').text, "beta\n");

        regs.yank(Some('a'), RegisterContent::chars("x")).unwrap();
        assert_eq!(regs.get('a').text, "x");
        assert_eq!(regs.unnamed().text, "x");
        // a named yank leaves register 0 alone
        assert_eq!(regs.get('0').text, "beta\n");
    }

    #[test]
    fn test_numbered_ring_shifts() {
        let mut regs = Registers::new();
        for i in 1..=10 {
            regs.delete(None, RegisterContent::lines(format!("line{}", i)), false)
                .unwrap();
        }
        assert_eq!(regs.get('1').text, "line10\n");
        assert_eq!(regs.get('2').text, "line9\n");
        assert_eq!(regs.get('9').text, "line2\n");
    }

    #[test]
    fn test_named_delete_still_shifts_ring() {
        let mut regs = Registers::new();
        regs.delete(Some('k'), RegisterContent::chars("word"), true).unwrap();
        assert_eq!(regs.get('k').text, "word");
        assert_eq!(regs.get('1').text, "word");
        assert_eq!(regs.get('-').text, "");
    }

    #[test]
    fn test_small_delete_register() {
        let mut regs = Registers::new();
        regs.delete(None, RegisterContent::chars("abc"), true).unwrap();
        assert_eq!(regs.get('-').text, "abc");
        assert_eq!(regs.unnamed().text, "abc");
    }

    #[test]
    fn test_black_hole() {
        let mut regs = Registers::new();
        regs.yank(None, RegisterContent::chars("keep")).unwrap();
        regs.delete(Some('_'), RegisterContent::chars("gone"), true).unwrap();
        assert_eq!(regs.unnamed().text, "keep");
        assert_eq!(regs.get('1').text, "");
    }

    #[test]
    fn test_uppercase_appends() {
        let mut regs = Registers::new();
        regs.set('a', RegisterContent::chars("foo")).unwrap();
        regs.set('A', RegisterContent::chars("bar")).unwrap();
        assert_eq!(regs.get('a').text, "foobar");

        regs.set('A', RegisterContent::lines("baz")).unwrap();
        let a = regs.get('a');
        assert_eq!(a.text, "foobar\nbaz\n");
        assert!(a.is_linewise());
    }

    #[test]
    fn test_read_only_and_invalid_names() {
        let mut regs = Registers::new();
        assert_eq!(
            regs.set('.', RegisterContent::chars("x")),
            Err(EngineError::InvalidRegister('.'))
        );
        assert!(regs.set('!', RegisterContent::chars("x")).is_err());
        regs.set_last_search("foo");
        assert_eq!(regs.get('/').text, "foo");
    }

    #[test]
    fn test_rows() {
        assert_eq!(RegisterContent::lines("a\nb").rows(), vec!["a", "b"]);
        assert_eq!(
            RegisterContent::block(&["ab".into(), "cd".into()]).rows(),
            vec!["ab", "cd"]
        );
    }

    #[test]
    fn test_list_skips_empty() {
        let mut regs = Registers::new();
        regs.yank(Some('c'), RegisterContent::chars("x")).unwrap();
        let names: Vec<char> = regs.list().into_iter().map(|(c, _)| c).collect();
        assert_eq!(names, vec!['"', 'c']);
    }
}
