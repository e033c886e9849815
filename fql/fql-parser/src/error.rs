use chumsky::error::SimpleReason;

use crate::lexer::Token;
use crate::parser::PError;
use crate::span::Span;

/// A diagnostic produced while parsing or translating an expression.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: MessageKind,
    pub span: Option<Span>,
    pub reason: Reason,
    pub hints: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub enum Reason {
    Simple(String),
    Expected {
        who: Option<String>,
        expected: String,
        found: String,
    },
    Unexpected {
        found: String,
    },
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error {
            kind: MessageKind::Error,
            span: None,
            reason,
            hints: Vec::new(),
        }
    }

    pub fn new_simple<S: ToString>(reason: S) -> Self {
        Error::new(Reason::Simple(reason.to_string()))
    }

    /// Line/column position of the error within `source` (0-based).
    pub fn location(&self, source: &str) -> Option<SourceLocation> {
        let span = self.span?;

        Some(SourceLocation {
            start: offset_to_line_col(source, span.start)?,
            end: offset_to_line_col(source, span.end)?,
        })
    }

    /// The single-line, `line:column`-annotated message shown to users.
    pub fn message(&self, source: &str) -> String {
        match self.location(source) {
            Some(location) => {
                let (line, column) = location.start;
                format!("line: {}, column: {}: {}", line + 1, column + 1, self.reason)
            }
            None => self.reason.to_string(),
        }
    }
}

/// Location within the source text. Tuples contain the 0-based line number
/// and column within that line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub start: (usize, usize),
    pub end: (usize, usize),
}

fn offset_to_line_col(source: &str, offset: usize) -> Option<(usize, usize)> {
    let mut line = 0;
    let mut column = 0;

    for (i, c) in source.chars().enumerate() {
        if i == offset {
            return Some((line, column));
        }

        if c == '\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }

    // An offset one past the end is valid; it marks end-of-input.
    (offset <= source.chars().count() + 1).then_some((line, column))
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::Simple(text) => f.write_str(text),
            Reason::Expected {
                who,
                expected,
                found,
            } => {
                if let Some(who) = who {
                    write!(f, "{who} ")?;
                }
                write!(f, "expected {expected}, but found {found}")
            }
            Reason::Unexpected { found } => write!(f, "unexpected {found}"),
        }
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.reason, f)
    }
}

pub trait WithErrorInfo: Sized {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self;

    fn with_span(self, span: Option<Span>) -> Self;

    fn with_span_fallback(self, span: Option<Span>) -> Self;
}

impl WithErrorInfo for Error {
    fn push_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hints.push(hint.into());
        self
    }

    fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }

    fn with_span_fallback(mut self, span: Option<Span>) -> Self {
        self.span = self.span.or(span);
        self
    }
}

impl<T, E: WithErrorInfo> WithErrorInfo for Result<T, E> {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self {
        self.map_err(|e| e.push_hint(hint))
    }

    fn with_span(self, span: Option<Span>) -> Self {
        self.map_err(|e| e.with_span(span))
    }

    fn with_span_fallback(self, span: Option<Span>) -> Self {
        self.map_err(|e| e.with_span_fallback(span))
    }
}

pub(crate) fn convert_lexer_error(source: &str, e: chumsky::error::Cheap<char>) -> Error {
    // Spans are char-based, so we can't index into the str directly.
    let found: String = source
        .chars()
        .skip(e.span().start)
        .take(e.span().end - e.span().start)
        .collect();
    let span = Span {
        start: e.span().start,
        end: e.span().end,
    };

    let mut e = Error::new(Reason::Unexpected {
        found: format!("`{found}`"),
    });
    e.span = Some(span);
    e
}

pub(crate) fn convert_parser_error(e: PError) -> Error {
    let mut span = e.span();

    if e.found().is_none() {
        // found end of file
        // fix for span outside of source
        if span.start > 0 && span.end > 0 {
            span.start -= 1;
            span.end -= 1;
        }
    }

    let mut e = construct_parser_error(&e);
    e.span = Some(span);
    e
}

fn construct_parser_error(e: &PError) -> Error {
    if let SimpleReason::Custom(message) = e.reason() {
        return Error::new_simple(message);
    }

    fn token_to_string(t: Option<Token>) -> String {
        t.as_ref()
            .map(Token::to_string)
            .unwrap_or_else(|| "end of input".to_string())
    }

    let expected: Vec<String> = e
        .expected()
        .cloned()
        .map(token_to_string)
        .collect();

    let while_parsing = e
        .label()
        .map(|l| format!(" while parsing {l}"))
        .unwrap_or_default();

    if expected.is_empty() || expected.len() > 10 {
        let label = token_to_string(e.found().cloned());
        return Error::new_simple(format!("unexpected {label}{while_parsing}"));
    }

    let mut expected = expected;
    expected.sort();

    let expected = match expected.len() {
        1 => expected.remove(0),
        2 => expected.join(" or "),
        _ => {
            let last = expected.pop().unwrap_or_default();
            format!("one of {} or {last}", expected.join(", "))
        }
    };

    match e.found() {
        Some(found) => Error::new(Reason::Expected {
            who: e.label().map(|x| x.to_string()),
            expected,
            found: found.to_string(),
        }),
        // We want a friendlier message than "found end of input"...
        None => Error::new(Reason::Simple(format!(
            "expected {expected}, but didn't find anything before the end"
        ))),
    }
}
