use chumsky::prelude::*;

use crate::ast::*;
use crate::lexer::Token;
use crate::span::Span;

pub(crate) type PError = Simple<Token, Span>;

fn ctrl(c: char) -> impl Parser<Token, (), Error = PError> + Clone {
    just(Token::Control(c)).ignored()
}

fn keyword(kw: &'static str) -> impl Parser<Token, (), Error = PError> + Clone {
    just(Token::Keyword(kw.to_string())).ignored()
}

fn ident_part() -> impl Parser<Token, String, Error = PError> + Clone {
    select! { Token::Ident(ident) => ident }.map_err(|e: PError| {
        Simple::expected_input_found(
            e.span(),
            [Some(Token::Ident("".to_string()))],
            e.found().cloned(),
        )
    })
}

/// The written comparison operators. `!=` only exists on the surface; it is
/// rewritten into a negated equality while building the tree.
#[derive(Clone, Copy)]
enum CmpSurface {
    Op(CompareOp),
    Ne,
}

fn compare_op() -> impl Parser<Token, CmpSurface, Error = PError> + Clone {
    choice((
        just(Token::Eq).to(CmpSurface::Op(CompareOp::Eq)),
        just(Token::Ne).to(CmpSurface::Ne),
        just(Token::Lte).to(CmpSurface::Op(CompareOp::Le)),
        just(Token::Gte).to(CmpSurface::Op(CompareOp::Ge)),
        just(Token::Control('<')).to(CmpSurface::Op(CompareOp::Lt)),
        just(Token::Control('>')).to(CmpSurface::Op(CompareOp::Gt)),
    ))
}

fn value() -> impl Parser<Token, Expr, Error = PError> + Clone {
    let literal = select! { Token::Literal(lit) => ExprKind::Literal(lit) };

    // A bare identifier names a file type where one exists, and is accepted
    // as a string everywhere else (`user==bob`).
    let ident_value = select! { Token::Ident(name) => name }.map(|name| {
        match name.parse::<FileType>() {
            Ok(file_type) => ExprKind::Literal(Literal::Type(file_type)),
            Err(_) => ExprKind::Literal(Literal::String(name)),
        }
    });

    literal
        .or(ident_value)
        .map_with_span(ExprKind::into_expr)
        .labelled("value")
}

fn func_call() -> impl Parser<Token, Expr, Error = PError> + Clone {
    recursive(|func_call| {
        ident_part()
            .then(
                choice((value(), func_call))
                    .separated_by(ctrl(','))
                    .delimited_by(ctrl('('), ctrl(')')),
            )
            .map(|(name, args)| ExprKind::FuncCall(FuncCall { name, args }))
            .map_with_span(ExprKind::into_expr)
            .labelled("function call")
    })
}

/// A function call, optionally compared against a value, another call or
/// `true`. Only meaningful inside the post expression; the translator rejects
/// these nodes in the find subtree.
fn func_term() -> impl Parser<Token, Expr, Error = PError> + Clone {
    let rhs = choice((
        keyword("true").map_with_span(|_, span| ExprKind::True.into_expr(span)),
        value(),
        func_call(),
    ));

    func_call()
        .then(compare_op().then(rhs).or_not())
        .map_with_span(|(left, tail), span| match tail {
            None => left,
            Some((CmpSurface::Op(op), right)) => ExprKind::Compare(CompareExpr {
                left: Box::new(left),
                cmp: op,
                right: Box::new(right),
            })
            .into_expr(span),
            Some((CmpSurface::Ne, right)) => {
                let inner = ExprKind::Compare(CompareExpr {
                    left: Box::new(left),
                    cmp: CompareOp::Eq,
                    right: Box::new(right),
                })
                .into_expr(span);
                ExprKind::Not(Box::new(inner)).into_expr(span)
            }
        })
}

fn condition() -> impl Parser<Token, Expr, Error = PError> + Clone {
    let property = select! { Token::Ident(name) => name }.try_map(|name, span| {
        name.parse::<Property>()
            .map_err(|_| Simple::custom(span, format!("unknown property `{name}`")))
    });

    property
        .then(compare_op())
        .then(value())
        .map_with_span(|((prop, cmp), value), span| match cmp {
            CmpSurface::Op(op) => ExprKind::Condition(Condition {
                prop,
                cmp: op,
                value: Box::new(value),
            })
            .into_expr(span),
            CmpSurface::Ne => {
                let inner = ExprKind::Condition(Condition {
                    prop,
                    cmp: CompareOp::Eq,
                    value: Box::new(value),
                })
                .into_expr(span);
                ExprKind::Not(Box::new(inner)).into_expr(span)
            }
        })
        .labelled("condition")
}

fn flag() -> impl Parser<Token, Expr, Error = PError> + Clone {
    select! { Token::Ident(name) => name }
        .try_map(|name, span| {
            name.parse::<FileFlag>()
                .map(|flag| ExprKind::Literal(Literal::Flag(flag)))
                .map_err(|_| Simple::custom(span, format!("unexpected identifier `{name}`")))
        })
        .map_with_span(ExprKind::into_expr)
}

fn binary_op_parser<'a, Term, Op>(
    term: Term,
    op: Op,
) -> impl Parser<Token, Expr, Error = PError> + Clone + 'a
where
    Term: Parser<Token, Expr, Error = PError> + Clone + 'a,
    Op: Parser<Token, BinOp, Error = PError> + Clone + 'a,
{
    let term = term.map_with_span(|e, s| (e, s)).boxed();

    term.clone()
        .then(op.then(term).repeated())
        .foldl(|left, (op, right)| {
            let span = Span {
                start: left.1.start,
                end: right.1.end,
            };
            let kind = ExprKind::Binary(BinaryExpr {
                left: Box::new(left.0),
                op,
                right: Box::new(right.0),
            });
            (kind.into_expr(span), span)
        })
        .map(|(e, _)| e)
        .boxed()
}

pub(crate) fn expression() -> impl Parser<Token, Expr, Error = PError> + Clone {
    recursive(|expr| {
        let group = expr.delimited_by(ctrl('('), ctrl(')'));

        let primary = choice((group, func_term(), condition(), flag())).boxed();

        let unary = keyword("not")
            .or_not()
            .then(primary)
            .map_with_span(|(negated, expr), span| match negated {
                Some(()) => ExprKind::Not(Box::new(expr)).into_expr(span),
                None => expr,
            })
            .boxed();

        let conjunction = binary_op_parser(unary, keyword("and").to(BinOp::And));

        binary_op_parser(conjunction, keyword("or").to(BinOp::Or))
    })
}

pub(crate) fn root() -> impl Parser<Token, Root, Error = PError> {
    expression()
        .then(expression().delimited_by(ctrl('('), ctrl(')')).or_not())
        .then_ignore(end())
        .map(|(exprs, post_exprs)| Root {
            exprs: Some(exprs),
            post_exprs,
        })
}
