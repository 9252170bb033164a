//! `:s/pattern/replacement/flags count`

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstituteFlags {
    /// `g`: every match on the line, not only the first
    pub global: bool,
    /// `i` / `I` override ignorecase for this command
    pub ignore_case: Option<bool>,
    /// `n`: count matches without changing anything
    pub count_only: bool,
    /// `e`: no error when the pattern is not found
    pub no_error: bool,
    /// `&`: start from the flags of the previous substitute
    pub keep_flags: bool,
}

/// A parsed substitute command. `pattern` is `None` for the repeat forms
/// (`:s`, `:&`, `:s g 3`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Substitute {
    pub pattern: Option<String>,
    pub replacement: String,
    pub flags: SubstituteFlags,
    pub count: Option<usize>,
}

impl SubstituteFlags {
    fn apply(&mut self, c: char) -> bool {
        match c {
            'g' => self.global = !self.global,
            'i' => self.ignore_case = Some(true),
            'I' => self.ignore_case = Some(false),
            'n' => self.count_only = true,
            'e' => self.no_error = true,
            '&' => self.keep_flags = true,
            _ => return false,
        }
        true
    }

    /// Combine with the previous flags for `&`
    pub fn merged_with(self, previous: SubstituteFlags) -> SubstituteFlags {
        if !self.keep_flags {
            return self;
        }
        SubstituteFlags {
            global: previous.global ^ self.global,
            ignore_case: self.ignore_case.or(previous.ignore_case),
            count_only: previous.count_only || self.count_only,
            no_error: previous.no_error || self.no_error,
            keep_flags: false,
        }
    }
}

fn is_delimiter(c: char) -> bool {
    !(c.is_alphanumeric() || c.is_whitespace() || matches!(c, '\\' | '"' | '|'))
}

/// Parse the arguments of `:s`
pub fn parse_substitute(args: &str) -> Result<Substitute> {
    let mut chars = args.chars().peekable();
    let mut sub = Substitute::default();

    match chars.peek() {
        Some(&delim) if is_delimiter(delim) && delim != '&' => {
            chars.next();
            sub.pattern = Some(take_until(&mut chars, delim));
            sub.replacement = take_until(&mut chars, delim);
        }
        _ => {
            while chars.peek().map_or(false, |c| c.is_whitespace()) {
                chars.next();
            }
        }
    }

    while let Some(&c) = chars.peek() {
        if sub.flags.apply(c) {
            chars.next();
        } else {
            break;
        }
    }
    let rest: String = chars.collect();
    let rest = rest.trim();
    if !rest.is_empty() {
        let count: usize = rest
            .parse()
            .map_err(|_| EngineError::TrailingCharacters(rest.to_string()))?;
        if count == 0 {
            return Err(EngineError::InvalidArgument(rest.to_string()));
        }
        sub.count = Some(count);
    }
    Ok(sub)
}

/// Read up to an unescaped `delim`. `\delim` turns into a plain `delim`;
/// other escapes are kept for the pattern or replacement parser.
fn take_until(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, delim: char) -> String {
    let mut out = String::new();
    while let Some(c) = chars.next() {
        if c == delim {
            break;
        }
        if c == '\\' {
            match chars.next() {
                Some(next) if next == delim => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Replace an unescaped `~` with the previous replacement string
pub fn expand_tilde(replacement: &str, previous: &str) -> String {
    let mut out = String::new();
    let mut chars = replacement.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '~' => out.push_str(previous),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CaseMode {
    None,
    Upper,
    Lower,
}

/// Build the text for one match. `groups[0]` is the whole match.
pub fn expand_replacement(replacement: &str, groups: &[Option<String>]) -> String {
    let mut out = String::new();
    let mut one_shot = CaseMode::None;
    let mut span = CaseMode::None;
    let mut chars = replacement.chars();

    let emit = |out: &mut String, text: &str, one_shot: &mut CaseMode, span: CaseMode| {
        for ch in text.chars() {
            let mode = if *one_shot != CaseMode::None { *one_shot } else { span };
            *one_shot = CaseMode::None;
            match mode {
                CaseMode::Upper => out.extend(ch.to_uppercase()),
                CaseMode::Lower => out.extend(ch.to_lowercase()),
                CaseMode::None => out.push(ch),
            }
        }
    };
    let group = |n: usize| groups.get(n).cloned().flatten().unwrap_or_default();

    while let Some(c) = chars.next() {
        match c {
            '&' => emit(&mut out, &group(0), &mut one_shot, span),
            '\\' => match chars.next() {
                Some(d @ '0'..='9') => {
                    let n = d as usize - '0' as usize;
                    emit(&mut out, &group(n), &mut one_shot, span);
                }
                Some('r') | Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('u') => one_shot = CaseMode::Upper,
                Some('l') => one_shot = CaseMode::Lower,
                Some('U') => span = CaseMode::Upper,
                Some('L') => span = CaseMode::Lower,
                Some('e') | Some('E') => span = CaseMode::None,
                Some(other) => emit(&mut out, &other.to_string(), &mut one_shot, span),
                None => out.push('\\'),
            },
            _ => emit(&mut out, &c.to_string(), &mut one_shot, span),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(items: &[&str]) -> Vec<Option<String>> {
        items.iter().map(|s| Some(s.to_string())).collect()
    }

    #[test]
    fn test_parse_basic() {
        let sub = parse_substitute("/foo/bar/g").unwrap();
        assert_eq!(sub.pattern.as_deref(), Some("foo"));
        assert_eq!(sub.replacement, "bar");
        assert!(sub.flags.global);
        assert_eq!(sub.count, None);
    }

    #[test]
    fn test_parse_without_trailing_delimiter() {
        let sub = parse_substitute("/foo/bar").unwrap();
        assert_eq!(sub.replacement, "bar");
        assert!(!sub.flags.global);

        let sub = parse_substitute("/foo").unwrap();
        assert_eq!(sub.pattern.as_deref(), Some("foo"));
        assert_eq!(sub.replacement, "");
    }

    #[test]
    fn test_parse_other_delimiter() {
        let sub = parse_substitute("#a/b#c\\#d#").unwrap();
        assert_eq!(sub.pattern.as_deref(), Some("a/b"));
        assert_eq!(sub.replacement, "c#d");
    }

    #[test]
    fn test_parse_escaped_slash_and_kept_escapes() {
        let sub = parse_substitute("/a\\/b/\\1x/").unwrap();
        assert_eq!(sub.pattern.as_deref(), Some("a/b"));
        assert_eq!(sub.replacement, "\\1x");
    }

    #[test]
    fn test_parse_flags_and_count() {
        let sub = parse_substitute("/x/y/gin 3").unwrap();
        assert!(sub.flags.global);
        assert_eq!(sub.flags.ignore_case, Some(true));
        assert!(sub.flags.count_only);
        assert_eq!(sub.count, Some(3));

        assert_eq!(
            parse_substitute("/x/y/gz"),
            Err(EngineError::TrailingCharacters("z".into()))
        );
    }

    #[test]
    fn test_parse_repeat_forms() {
        let sub = parse_substitute("").unwrap();
        assert_eq!(sub.pattern, None);

        let sub = parse_substitute("&").unwrap();
        assert_eq!(sub.pattern, None);
        assert!(sub.flags.keep_flags);

        let sub = parse_substitute(" g 2").unwrap();
        assert_eq!(sub.pattern, None);
        assert!(sub.flags.global);
        assert_eq!(sub.count, Some(2));
    }

    #[test]
    fn test_merge_flags() {
        let previous = SubstituteFlags {
            global: true,
            ..Default::default()
        };
        let flags = SubstituteFlags {
            keep_flags: true,
            ..Default::default()
        };
        assert!(flags.merged_with(previous).global);
        assert!(!SubstituteFlags::default().merged_with(previous).global);
    }

    #[test]
    fn test_expand_groups_and_ampersand() {
        let g = groups(&["foo bar", "foo", "bar"]);
        assert_eq!(expand_replacement("\\2 \\1", &g), "bar foo");
        assert_eq!(expand_replacement("[&]", &g), "[foo bar]");
        assert_eq!(expand_replacement("\\&\\\\", &g), "&\\");
        assert_eq!(expand_replacement("\\0!", &g), "foo bar!");
        assert_eq!(expand_replacement("\\9", &g), "");
    }

    #[test]
    fn test_expand_line_breaks() {
        let g = groups(&["x"]);
        assert_eq!(expand_replacement("a\\rb", &g), "a\nb");
        assert_eq!(expand_replacement("a\\nb", &g), "a\nb");
    }

    #[test]
    fn test_expand_case_modifiers() {
        let g = groups(&["hello world", "hello"]);
        assert_eq!(expand_replacement("\\u\\1", &g), "Hello");
        assert_eq!(expand_replacement("\\U&\\E!", &g), "HELLO WORLD!");
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("<~>", "prev"), "<prev>");
        assert_eq!(expand_tilde("\\~", "prev"), "\\~");
    }
}
