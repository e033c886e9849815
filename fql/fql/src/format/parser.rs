//! Parse a printf-like format string into a node sequence.

use chumsky::{error::Cheap, prelude::*};

use fql_parser::error::Error;

/// Attribute letters the renderer understands.
pub const ATTRIBUTES: &str = "bfgGhHiklmMnpPsSuUyYFDXNact";
/// Date attributes; followed by a run of strftime-style field letters.
const DATE_ATTRIBUTES: &str = "ACT";
const DATE_FIELDS: &str = "aAbBcdDhjmUwWxyYHIklMprST+XZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintFlags {
    pub minus: bool,
    pub zero: bool,
    pub space: bool,
    pub plus: bool,
    pub hash: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormatNode {
    Text(String),
    Attr(AttrNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrNode {
    pub attr: char,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub flags: PrintFlags,
    pub date_format: Option<String>,
}

/// A format string parsed into nodes, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFormat {
    pub nodes: Vec<FormatNode>,
}

pub fn parse_format(format: &str) -> Result<ParsedFormat, Error> {
    log::debug!("parsing format string: {format}");

    format_parser()
        .parse(format)
        .map(|nodes| ParsedFormat {
            nodes: merge_text(nodes),
        })
        .map_err(|errors| {
            let offset = errors.first().map(|e| e.span().start).unwrap_or_default();
            Error::new_simple(format!("couldn't parse format string at offset {offset}"))
        })
}

fn format_parser() -> impl Parser<char, Vec<FormatNode>, Error = Cheap<char>> {
    let flags = one_of("-0# +").repeated().map(|chars: Vec<char>| {
        let mut flags = PrintFlags::default();

        for c in chars {
            match c {
                '-' => flags.minus = true,
                '0' => flags.zero = true,
                '#' => flags.hash = true,
                ' ' => flags.space = true,
                '+' => flags.plus = true,
                _ => {}
            }
        }

        flags
    });

    let number = filter(|c: &char| c.is_ascii_digit())
        .repeated()
        .at_least(1)
        .collect::<String>()
        .try_map(|digits, span| {
            digits
                .parse::<usize>()
                .map_err(|_| Cheap::expected_input_found(span, None, None))
        });

    let date_attr = one_of(DATE_ATTRIBUTES)
        .then(one_of(DATE_FIELDS).repeated().collect::<String>())
        .map(|(attr, run)| (attr, (!run.is_empty()).then_some(run)));

    let plain_attr = one_of(ATTRIBUTES).map(|attr| (attr, None));

    let spec = flags
        .then(number.clone().or_not())
        .then(just('.').ignore_then(number).or_not())
        .then(date_attr.or(plain_attr))
        .map(|(((flags, width), precision), (attr, date_format))| {
            FormatNode::Attr(AttrNode {
                attr,
                width,
                precision,
                flags,
                date_format,
            })
        });

    let percent = just('%').ignore_then(choice((
        just('%').to(FormatNode::Text("%".to_string())),
        spec,
    )));

    let octal = filter(|c: &char| ('0'..='7').contains(c))
        .repeated()
        .at_least(1)
        .at_most(3)
        .collect::<String>()
        .map(|digits| decode_code(&digits, 8));

    let hex = just('x').ignore_then(
        filter(|c: &char| c.is_ascii_hexdigit())
            .repeated()
            .at_least(1)
            .at_most(2)
            .collect::<String>()
            .map(|digits| decode_code(&digits, 16)),
    );

    let escape = just('\\')
        .ignore_then(choice((
            octal,
            hex,
            just('\\').to('\\'),
            just('a').to('\x07'),
            just('b').to('\x08'),
            just('f').to('\x0C'),
            just('n').to('\n'),
            just('r').to('\r'),
            just('t').to('\t'),
            just('v').to('\x0B'),
            // An unrecognized escape keeps the escaped character.
            any(),
        )))
        .map(|c| FormatNode::Text(c.to_string()));

    let text = filter(|c: &char| *c != '%' && *c != '\\')
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(FormatNode::Text);

    choice((percent, escape, text))
        .repeated()
        .then_ignore(end())
}

fn decode_code(digits: &str, radix: u32) -> char {
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or('\u{FFFD}')
}

fn merge_text(nodes: Vec<FormatNode>) -> Vec<FormatNode> {
    let mut merged: Vec<FormatNode> = Vec::with_capacity(nodes.len());

    for node in nodes {
        match (merged.last_mut(), node) {
            (Some(FormatNode::Text(tail)), FormatNode::Text(text)) => tail.push_str(&text),
            (_, node) => merged.push(node),
        }
    }

    merged
}
