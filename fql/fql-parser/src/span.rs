use std::fmt::{self, Debug, Formatter};
use std::ops::Range;

use serde::Serialize;

/// A byte range within the expression text.
#[derive(Clone, PartialEq, Eq, Copy, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn merge_opt(a: Option<Span>, b: Option<Span>) -> Option<Span> {
        match (a, b) {
            (None, None) => None,
            (None, Some(s)) => Some(s),
            (Some(s), None) => Some(s),
            (Some(a), Some(b)) => Some(Span::merge(a, b)),
        }
    }

    pub fn merge(a: Span, b: Span) -> Span {
        Span {
            start: usize::min(a.start, b.start),
            end: usize::max(a.end, b.end),
        }
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl From<Span> for Range<usize> {
    fn from(a: Span) -> Self {
        a.start..a.end
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl Serialize for Span {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{self:?}"))
    }
}

impl chumsky::Span for Span {
    type Context = ();

    type Offset = usize;

    fn new(_context: Self::Context, range: Range<Self::Offset>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }

    fn context(&self) -> Self::Context {}

    fn start(&self) -> Self::Offset {
        self.start
    }

    fn end(&self) -> Self::Offset {
        self.end
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_merge() {
        let a = Span { start: 2, end: 5 };
        let b = Span { start: 4, end: 9 };

        assert_eq!(Span::merge(a, b), Span { start: 2, end: 9 });
        assert_eq!(Span::merge_opt(Some(a), None), Some(a));
        assert_eq!(Span::merge_opt(None, None), None);
    }

    #[test]
    fn test_contains() {
        let outer = Span { start: 0, end: 10 };
        let inner = Span { start: 3, end: 7 };

        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_debug() {
        let span = Span { start: 12, end: 15 };
        assert_eq!(format!("{span:?}"), "12-15");
    }
}
