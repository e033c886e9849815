use chumsky::{error::Cheap, prelude::*};

use crate::ast::{Literal, SizeUnit, TimeUnit};

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Token {
    Ident(String),

    /// `and`, `or`, `not` or `true`.
    Keyword(String),

    Literal(Literal),

    /// single-char control tokens: parentheses, comma, `<` and `>`
    Control(char),

    Eq,  // = or ==
    Ne,  // !=
    Gte, // >=
    Lte, // <=
}

/// Lex chars to tokens until the end of the input
pub fn lexer() -> impl Parser<char, Vec<TokenSpan>, Error = Cheap<char>> {
    lex_token()
        .repeated()
        .then_ignore(ignored())
        .then_ignore(end())
}

/// Lex chars to a single token
fn lex_token() -> impl Parser<char, TokenSpan, Error = Cheap<char>> {
    let control_multi = choice((
        just("==").to(Token::Eq),
        just("!=").to(Token::Ne),
        just(">=").to(Token::Gte),
        just("<=").to(Token::Lte),
        just("=").to(Token::Eq),
    ));

    let control = one_of("()<>,").map(Token::Control);

    let keyword = choice((just("and"), just("or"), just("not"), just("true")))
        .then_ignore(end_expr())
        .map(|x| x.to_string())
        .map(Token::Keyword);

    let literal = literal().map(Token::Literal);

    let ident = ident_part().map(Token::Ident);

    let token = choice((control_multi, control, literal, keyword, ident));

    ignored().ignore_then(token.map_with_span(TokenSpan))
}

fn ignored() -> impl Parser<char, (), Error = Cheap<char>> {
    filter(|c: &char| c.is_whitespace()).repeated().ignored()
}

pub fn ident_part() -> impl Parser<char, String, Error = Cheap<char>> + Clone {
    filter(|c: &char| c.is_alphabetic() || *c == '_')
        .chain(filter(|c: &char| c.is_alphanumeric() || *c == '_').repeated())
        .collect()
}

fn literal() -> impl Parser<char, Literal, Error = Cheap<char>> {
    let integer = filter(|c: &char| c.is_ascii_digit())
        .repeated()
        .at_least(1)
        .collect::<String>();

    // Unit words before unit letters so that e.g. `mb` isn't cut short at `m`.
    let time_unit = choice((
        just("minutes").to(TimeUnit::Minutes),
        just("minute").to(TimeUnit::Minutes),
        just("hours").to(TimeUnit::Hours),
        just("hour").to(TimeUnit::Hours),
        just("days").to(TimeUnit::Days),
        just("day").to(TimeUnit::Days),
        just("m").to(TimeUnit::Minutes),
        just("h").to(TimeUnit::Hours),
        just("d").to(TimeUnit::Days),
    ));

    let size_unit = choice((
        choice((
            just("kilobytes").to(SizeUnit::Kb),
            just("kilobyte").to(SizeUnit::Kb),
            just("megabytes").to(SizeUnit::Mb),
            just("megabyte").to(SizeUnit::Mb),
            just("gigabytes").to(SizeUnit::Gb),
            just("gigabyte").to(SizeUnit::Gb),
            just("bytes").to(SizeUnit::Bytes),
            just("byte").to(SizeUnit::Bytes),
        )),
        choice((
            just("kb").to(SizeUnit::Kb),
            just("mb").to(SizeUnit::Mb),
            just("gb").to(SizeUnit::Gb),
            just("b").to(SizeUnit::Bytes),
            just("k").to(SizeUnit::Kb),
            just("K").to(SizeUnit::Kb),
            just("M").to(SizeUnit::Mb),
            just("G").to(SizeUnit::Gb),
            just("g").to(SizeUnit::Gb),
        )),
    ));

    #[derive(Clone)]
    enum Unit {
        Time(TimeUnit),
        Size(SizeUnit),
    }

    // A bare `m` is minutes; megabytes are spelled `M` or `mb`.
    let unit = choice((
        time_unit.then_ignore(end_expr()).map(Unit::Time),
        size_unit.then_ignore(end_expr()).map(Unit::Size),
    ));

    let value_and_unit = integer
        .clone()
        .then(unit)
        .try_map(|(digits, unit), span| {
            let n = parse_digits(&digits, span)?;

            Ok(match unit {
                Unit::Time(unit) => Literal::Time(n, unit),
                Unit::Size(unit) => Literal::Size(n, unit),
            })
        })
        .labelled("number");

    let number = integer
        .then_ignore(end_expr())
        .try_map(|digits, span| parse_digits(&digits, span).map(Literal::Integer))
        .labelled("number");

    let string = quoted_string().map(Literal::String);

    choice((string, value_and_unit, number))
}

fn parse_digits(digits: &str, span: std::ops::Range<usize>) -> Result<i64, Cheap<char>> {
    digits
        .parse::<i64>()
        .map_err(|_| Cheap::expected_input_found(span, None, None))
}

fn quoted_string() -> impl Parser<char, String, Error = Cheap<char>> {
    let escaped = just('\\').ignore_then(choice((
        just('\\'),
        just('"'),
        just('/'),
        just('b').to('\x08'),
        just('f').to('\x0C'),
        just('n').to('\n'),
        just('r').to('\r'),
        just('t').to('\t'),
    )));

    none_of("\\\"")
        .or(escaped)
        .repeated()
        .delimited_by(just('"'), just('"'))
        .collect::<String>()
        .labelled("string")
}

fn end_expr() -> impl Parser<char, (), Error = Cheap<char>> {
    choice((end(), one_of(" \t\r\n(),<>=!").ignored())).rewind()
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => {
                if s.is_empty() {
                    // FYI this shows up in errors
                    write!(f, "an identifier")
                } else {
                    write!(f, "`{s}`")
                }
            }
            Token::Keyword(s) => write!(f, "keyword {s}"),
            Token::Literal(lit) => write!(f, "{lit}"),
            Token::Control(c) => write!(f, "{c}"),

            Token::Eq => f.write_str("=="),
            Token::Ne => f.write_str("!="),
            Token::Gte => f.write_str(">="),
            Token::Lte => f.write_str("<="),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenSpan(pub Token, pub std::ops::Range<usize>);

impl std::fmt::Debug for TokenSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}..{}: {:?}", self.1.start, self.1.end, self.0)
    }
}

pub struct TokenVec(pub Vec<TokenSpan>);

impl std::fmt::Debug for TokenVec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "TokenVec (")?;
        for token in self.0.iter() {
            writeln!(f, "  {:?},", token)?;
        }
        write!(f, ")")
    }
}
