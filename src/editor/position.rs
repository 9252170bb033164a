/// A position in the buffer (0-indexed, column counted in chars)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// Position just past `text` when it is inserted at `self`
    pub fn advance_over(self, text: &str) -> Self {
        match text.rfind('\n') {
            None => Self::new(self.line, self.col + text.chars().count()),
            Some(idx) => Self::new(
                self.line + text.matches('\n').count(),
                text[idx + 1..].chars().count(),
            ),
        }
    }

    /// Order two positions so the first is never after the second
    pub fn ordered(a: Self, b: Self) -> (Self, Self) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

impl From<(usize, usize)> for Position {
    fn from((line, col): (usize, usize)) -> Self {
        Self::new(line, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_single_line() {
        assert_eq!(Position::new(2, 3).advance_over("abc"), Position::new(2, 6));
        assert_eq!(Position::new(2, 3).advance_over(""), Position::new(2, 3));
    }

    #[test]
    fn test_advance_multi_line() {
        assert_eq!(Position::new(1, 4).advance_over("x\nyz"), Position::new(2, 2));
        assert_eq!(Position::new(0, 0).advance_over("a\nb\n"), Position::new(2, 0));
    }

    #[test]
    fn test_ordering_is_line_major() {
        assert!(Position::new(0, 9) < Position::new(1, 0));
        let (a, b) = Position::ordered(Position::new(3, 1), Position::new(1, 5));
        assert_eq!((a.line, b.line), (1, 3));
    }
}
