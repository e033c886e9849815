//! Evaluate the post-processing expression against a single found path.

use fql_parser::ast::*;

/// Upper bound on plugin callback arguments.
pub const FN_STACK_SIZE: usize = 64;

/// Outcome of evaluating a post expression for one path. `Abort` cancels the
/// whole search; see the propagation rules in the search supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalResult {
    True,
    False,
    Abort,
}

/// One argument passed to a plugin callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackArg {
    Integer(i32),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    Ok(i32),
    NotFound,
    InvalidSignature,
}

/// Looks up a named callback, checks the call signature and invokes it.
/// Implemented by the extension manager; tests substitute fakes.
pub trait CallbackDispatcher {
    fn dispatch(&self, name: &str, filename: &str, args: &[CallbackArg]) -> DispatchResult;
}

/// Evaluate a post expression tree for `filename`.
pub fn evaluate(dispatcher: &dyn CallbackDispatcher, node: &Expr, filename: &str) -> EvalResult {
    log::trace!("evaluating post expression for `{filename}`");

    eval_node(dispatcher, node, filename)
}

fn eval_node(dispatcher: &dyn CallbackDispatcher, node: &Expr, filename: &str) -> EvalResult {
    match &node.kind {
        ExprKind::Binary(binary) => eval_binary(dispatcher, binary, filename),
        ExprKind::Compare(cmp) => eval_compare(dispatcher, cmp, filename),
        // A bare call is truth-tested: zero is false, anything else true.
        ExprKind::FuncCall(func) => match eval_func(dispatcher, func, filename) {
            Some(0) => EvalResult::False,
            Some(_) => EvalResult::True,
            None => EvalResult::Abort,
        },
        ExprKind::Not(inner) => match eval_node(dispatcher, inner, filename) {
            EvalResult::True => EvalResult::False,
            EvalResult::False => EvalResult::True,
            EvalResult::Abort => EvalResult::Abort,
        },
        kind => {
            log::error!("unexpected node type in post expression: {kind:?}");
            EvalResult::Abort
        }
    }
}

fn eval_binary(
    dispatcher: &dyn CallbackDispatcher,
    binary: &BinaryExpr,
    filename: &str,
) -> EvalResult {
    let left = eval_node(dispatcher, &binary.left, filename);

    match binary.op {
        BinOp::And if left == EvalResult::True => eval_node(dispatcher, &binary.right, filename),
        BinOp::Or if left == EvalResult::False => eval_node(dispatcher, &binary.right, filename),
        _ => left,
    }
}

fn eval_compare(
    dispatcher: &dyn CallbackDispatcher,
    cmp: &CompareExpr,
    filename: &str,
) -> EvalResult {
    let Some(a) = eval_node_int(dispatcher, &cmp.left, filename) else {
        return EvalResult::Abort;
    };

    // `fn() == true` treats the integer as a boolean.
    if cmp.cmp == CompareOp::Eq && matches!(cmp.right.kind, ExprKind::True) {
        return if a == 0 {
            EvalResult::False
        } else {
            EvalResult::True
        };
    }

    let Some(b) = eval_node_int(dispatcher, &cmp.right, filename) else {
        return EvalResult::Abort;
    };

    let holds = match cmp.cmp {
        CompareOp::Eq => a == b,
        CompareOp::Le => a <= b,
        CompareOp::Lt => a < b,
        CompareOp::Ge => a >= b,
        CompareOp::Gt => a > b,
    };

    if holds {
        EvalResult::True
    } else {
        EvalResult::False
    }
}

fn eval_node_int(
    dispatcher: &dyn CallbackDispatcher,
    node: &Expr,
    filename: &str,
) -> Option<i32> {
    match &node.kind {
        ExprKind::FuncCall(func) => eval_func(dispatcher, func, filename),
        ExprKind::Literal(Literal::Integer(n)) => match i32::try_from(*n) {
            Ok(n) => Some(n),
            Err(_) => {
                eprintln!("number {n} doesn't fit into a callback argument");
                None
            }
        },
        ExprKind::Literal(lit) => {
            eprintln!("a value of type {lit} cannot be cast to an integer");
            None
        }
        kind => {
            log::error!("unexpected node type in comparison: {kind:?}");
            None
        }
    }
}

fn eval_func(dispatcher: &dyn CallbackDispatcher, func: &FuncCall, filename: &str) -> Option<i32> {
    log::trace!("evaluating function `{}`", func.name);

    if func.args.len() > FN_STACK_SIZE {
        eprintln!(
            "stack overflow in function `{}', more than {} arguments are not supported",
            func.name, FN_STACK_SIZE
        );
        return None;
    }

    let mut args = Vec::with_capacity(func.args.len());

    for arg in &func.args {
        match &arg.kind {
            ExprKind::Literal(Literal::Integer(_)) | ExprKind::FuncCall(_) => {
                args.push(CallbackArg::Integer(eval_node_int(dispatcher, arg, filename)?));
            }
            ExprKind::Literal(Literal::String(s)) => {
                args.push(CallbackArg::Str(s.clone()));
            }
            _ => {
                eprintln!("unexpected argument type in function `{}'", func.name);
                return None;
            }
        }
    }

    match dispatcher.dispatch(&func.name, filename, &args) {
        DispatchResult::Ok(result) => Some(result),
        DispatchResult::NotFound => {
            eprintln!("function `{}' not found", func.name);
            None
        }
        DispatchResult::InvalidSignature => {
            eprintln!(
                "function `{}' has a different signature, please check specified arguments",
                func.name
            );
            None
        }
    }
}
