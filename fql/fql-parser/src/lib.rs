//! Parser for FQL, the expression language of the `fql` search tool.
//!
//! Expressions come in two parts: a filter tree that is translated into
//! arguments for the host `find` utility, and an optional parenthesized
//! post-processing tree that is evaluated in-process per found path.

pub mod ast;
pub mod error;
mod lexer;
mod parser;
pub mod span;

use chumsky::Stream;

pub use ast::*;
pub use error::{Error, MessageKind, Reason, SourceLocation, WithErrorInfo};
pub use span::Span;

use lexer::{Token, TokenSpan};

/// Expressions above this length are rejected before lexing.
pub const MAX_EXPRESSION_LENGTH: usize = 512;

/// Build an FQL syntax tree from an expression string.
pub fn parse_expression(source: &str) -> Result<Root, Vec<Error>> {
    log::trace!("parsing expression: {source}");

    if source.len() > MAX_EXPRESSION_LENGTH {
        return Err(vec![Error::new_simple(format!(
            "expression exceeds maximum length of {MAX_EXPRESSION_LENGTH} bytes"
        ))]);
    }

    let mut errors = Vec::new();

    let (tokens, lex_errors) = ::chumsky::Parser::parse_recovery(&lexer::lexer(), source);

    errors.extend(
        lex_errors
            .into_iter()
            .map(|e| error::convert_lexer_error(source, e)),
    );

    let root = if let Some(tokens) = tokens {
        let stream = prepare_stream(tokens, source);

        let (root, parse_errors) = ::chumsky::Parser::parse_recovery(&parser::root(), stream);

        errors.extend(parse_errors.into_iter().map(error::convert_parser_error));

        root
    } else {
        None
    };

    if errors.is_empty() {
        Ok(root.unwrap_or_default())
    } else {
        Err(errors)
    }
}

fn prepare_stream(
    tokens: Vec<TokenSpan>,
    source: &str,
) -> Stream<Token, Span, impl Iterator<Item = (Token, Span)> + Sized> {
    let tokens = tokens.into_iter().map(|TokenSpan(t, s)| {
        (
            t,
            Span {
                start: s.start,
                end: s.end,
            },
        )
    });
    let len = source.chars().count();
    let eoi = Span {
        start: len,
        end: len + 1,
    };
    Stream::from_iter(eoi, tokens)
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(source: &str) -> Root {
        parse_expression(source).unwrap()
    }

    fn first_error(source: &str) -> Error {
        parse_expression(source)
            .unwrap_err()
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn simple_condition() {
        let root = parse("mtime>7d");
        let expr = root.exprs.unwrap();

        assert_eq!(expr.span, Some(Span { start: 0, end: 8 }));

        let ExprKind::Condition(cond) = expr.kind else {
            panic!("expected a condition, got {:?}", expr.kind);
        };
        assert_eq!(cond.prop, Property::Mtime);
        assert_eq!(cond.cmp, CompareOp::Gt);
        assert_eq!(
            cond.value.kind,
            ExprKind::Literal(Literal::Time(7, TimeUnit::Days))
        );
        assert!(root.post_exprs.is_none());
    }

    #[test]
    fn precedence() {
        // `or` binds weaker than `and`.
        let root = parse("size>1k and type==file or empty");
        let expr = root.exprs.unwrap();

        let ExprKind::Binary(or_expr) = expr.kind else {
            panic!("expected a binary node");
        };
        assert_eq!(or_expr.op, BinOp::Or);

        let ExprKind::Binary(and_expr) = or_expr.left.kind else {
            panic!("expected the left child to be the `and` chain");
        };
        assert_eq!(and_expr.op, BinOp::And);
        assert_eq!(
            or_expr.right.kind,
            ExprKind::Literal(Literal::Flag(FileFlag::Empty))
        );
    }

    #[test]
    fn parenthesized_group() {
        let root = parse("type==file and (name==\"*.log\" or name==\"*.txt\")");
        let expr = root.exprs.unwrap();

        let ExprKind::Binary(and_expr) = expr.kind else {
            panic!("expected a binary node");
        };
        assert_eq!(and_expr.op, BinOp::And);

        let ExprKind::Binary(or_expr) = &and_expr.right.kind else {
            panic!("expected the group to parse as an `or` chain");
        };
        assert_eq!(or_expr.op, BinOp::Or);
    }

    #[test]
    fn not_and_ne_sugar() {
        let root = parse("not empty");
        let ExprKind::Not(inner) = root.exprs.unwrap().kind else {
            panic!("expected a not node");
        };
        assert_eq!(
            inner.kind,
            ExprKind::Literal(Literal::Flag(FileFlag::Empty))
        );

        // `!=` parses as a negated equality.
        let root = parse("type!=file");
        let ExprKind::Not(inner) = root.exprs.unwrap().kind else {
            panic!("expected a not node");
        };
        let ExprKind::Condition(cond) = &inner.kind else {
            panic!("expected a condition below the not node");
        };
        assert_eq!(cond.cmp, CompareOp::Eq);
    }

    #[test]
    fn post_expression_group() {
        let root = parse("size>=10M (my_plugin(\"foo\") == true)");

        assert!(matches!(
            root.exprs.as_ref().unwrap().kind,
            ExprKind::Condition(_)
        ));

        let post = root.post_exprs.unwrap();
        let ExprKind::Compare(cmp) = post.kind else {
            panic!("expected a compare node, got {:?}", post.kind);
        };
        assert_eq!(cmp.cmp, CompareOp::Eq);
        assert_eq!(cmp.right.kind, ExprKind::True);

        let ExprKind::FuncCall(call) = &cmp.left.kind else {
            panic!("expected a function call on the left");
        };
        assert_eq!(call.name, "my_plugin");
        assert_eq!(
            call.args[0].kind,
            ExprKind::Literal(Literal::String("foo".to_string()))
        );
    }

    #[test]
    fn bare_func_call_post_expression() {
        let root = parse("size>0 (my_plugin(1, \"x\"))");
        let post = root.post_exprs.unwrap();

        let ExprKind::FuncCall(call) = post.kind else {
            panic!("expected a bare function call, got {:?}", post.kind);
        };
        assert_eq!(call.name, "my_plugin");
        assert_eq!(call.args.len(), 2);
    }

    #[test]
    fn nested_func_args() {
        let root = parse("size>0 (f(1, g(\"x\"), 2) == 3)");
        let post = root.post_exprs.unwrap();

        let ExprKind::Compare(cmp) = post.kind else {
            panic!("expected a compare node");
        };
        let ExprKind::FuncCall(call) = &cmp.left.kind else {
            panic!("expected a function call");
        };
        assert_eq!(call.args.len(), 3);
        assert!(matches!(call.args[1].kind, ExprKind::FuncCall(_)));
    }

    #[test]
    fn span_coverage() {
        fn check_spans(expr: &Expr) {
            let parent = expr.span.expect("every node carries a span");

            let children: Vec<&Expr> = match &expr.kind {
                ExprKind::Binary(b) => vec![&b.left, &b.right],
                ExprKind::Compare(c) => vec![&c.left, &c.right],
                ExprKind::Condition(c) => vec![&c.value],
                ExprKind::Not(inner) => vec![inner],
                ExprKind::FuncCall(f) => f.args.iter().collect(),
                ExprKind::Literal(_) | ExprKind::True => vec![],
            };

            let mut last_start = 0;
            for child in children {
                let span = child.span.expect("every node carries a span");
                assert!(parent.contains(&span), "{parent:?} !⊇ {span:?}");
                assert!(span.start >= last_start, "child spans are monotonic");
                last_start = span.start;
                check_spans(child);
            }
        }

        let root = parse("size>=10M and (type==file or type==directory) and mtime>7d");
        check_spans(root.exprs.as_ref().unwrap());
    }

    #[test]
    fn rejects_overlong_expression() {
        let expr = format!("name==\"{}\"", "x".repeat(600));
        let e = first_error(&expr);

        assert!(e.to_string().contains("maximum length"));
        assert!(e.span.is_none());
    }

    #[test]
    fn unknown_property() {
        let e = first_error("frobnicate>5");
        assert!(e.span.is_some());
    }

    #[test]
    fn syntax_error_reports_span() {
        let e = first_error("size>=");
        assert!(e.span.is_some());

        let message = e.message("size>=");
        assert!(message.starts_with("line: 1, column: "), "{message}");
    }
}
