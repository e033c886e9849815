//! Translate an expression tree into arguments for the host `find` utility.

use fql_parser::ast::*;
use fql_parser::error::{Error, WithErrorInfo};
use fql_parser::Span;

/// Knobs that control shell quoting of the translated arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationFlags {
    /// Quote parentheses and string values so the printed argument vector
    /// can be pasted into a shell.
    pub quote: bool,
}

/// Translate the find subtree of a parsed expression into an argument
/// vector. An empty subtree translates into an empty vector.
pub fn translate(root: Option<&Expr>, flags: TranslationFlags) -> Result<Vec<String>, Error> {
    log::trace!("translating expression tree, flags={flags:?}");

    let mut ctx = TranslationCtx {
        argv: Vec::new(),
        flags,
    };

    if let Some(expr) = root {
        ctx.process_node(expr)?;
    }

    Ok(ctx.argv)
}

struct TranslationCtx {
    argv: Vec<String>,
    flags: TranslationFlags,
}

impl TranslationCtx {
    fn lparen(&self) -> &'static str {
        if self.flags.quote {
            "\\("
        } else {
            "("
        }
    }

    fn rparen(&self) -> &'static str {
        if self.flags.quote {
            "\\)"
        } else {
            ")"
        }
    }

    fn push(&mut self, arg: impl Into<String>) {
        self.argv.push(arg.into());
    }

    fn process_node(&mut self, expr: &Expr) -> Result<(), Error> {
        match &expr.kind {
            ExprKind::Binary(binary) => self.process_binary(binary),
            ExprKind::Condition(cond) => self.process_condition(cond, expr.span),
            ExprKind::Literal(Literal::Flag(flag)) => {
                self.push(flag_arg(*flag));
                Ok(())
            }
            ExprKind::Not(inner) => self.process_not(inner),
            ExprKind::FuncCall(_) | ExprKind::Compare(_) | ExprKind::True => {
                Err(Error::new_simple(
                    "function calls can only be used in the post-processing expression",
                )
                .with_span(expr.span))
            }
            ExprKind::Literal(_) => Err(Error::new_simple(
                "a value cannot stand alone in a search expression",
            )
            .with_span(expr.span)),
        }
    }

    /// A parenthesis pair is only needed around an `or` child of an `and`
    /// parent; everything else already binds correctly.
    fn needs_parens(parent_op: BinOp, child: &Expr) -> bool {
        parent_op == BinOp::And
            && matches!(&child.kind, ExprKind::Binary(b) if b.op == BinOp::Or)
    }

    fn process_binary(&mut self, node: &BinaryExpr) -> Result<(), Error> {
        let (lparen, rparen) = (self.lparen(), self.rparen());

        let wrap_left = Self::needs_parens(node.op, &node.left);
        if wrap_left {
            self.push(lparen);
        }
        self.process_node(&node.left)?;
        if wrap_left {
            self.push(rparen);
        }

        self.push(match node.op {
            BinOp::And => "-a",
            BinOp::Or => "-o",
        });

        let wrap_right = Self::needs_parens(node.op, &node.right);
        if wrap_right {
            self.push(lparen);
        }
        self.process_node(&node.right)?;
        if wrap_right {
            self.push(rparen);
        }

        Ok(())
    }

    fn process_not(&mut self, inner: &Expr) -> Result<(), Error> {
        let (lparen, rparen) = (self.lparen(), self.rparen());

        self.push("!");

        let wrap = matches!(inner.kind, ExprKind::Binary(_));
        if wrap {
            self.push(lparen);
        }
        self.process_node(inner)?;
        if wrap {
            self.push(rparen);
        }

        Ok(())
    }

    fn process_condition(&mut self, cond: &Condition, span: Option<Span>) -> Result<(), Error> {
        let ExprKind::Literal(value) = &cond.value.kind else {
            return Err(Error::new_simple("malformed condition").with_span(span));
        };

        match value {
            Literal::Integer(n) => {
                self.check_property(cond, supports_number, "numeric", span)?;

                if supports_time(cond.prop) {
                    self.append_time_cond(cond.prop, cond.cmp, *n, TimeUnit::Minutes, span)
                } else if cond.prop == Property::Size {
                    self.append_size_cond(cond.cmp, *n, SizeUnit::Bytes, span)
                } else {
                    self.append_numeric_cond(property_arg(cond.prop), cond.cmp, *n, "");
                    Ok(())
                }
            }
            Literal::Time(n, unit) => {
                self.check_property(cond, supports_time, "time", span)?;
                self.append_time_cond(cond.prop, cond.cmp, *n, *unit, span)
            }
            Literal::String(s) => {
                self.check_property(cond, supports_string, "string", span)?;
                self.append_string_arg(property_arg(cond.prop), s);
                Ok(())
            }
            Literal::Size(n, unit) => {
                self.check_property(cond, supports_size, "size", span)?;
                self.append_size_cond(cond.cmp, *n, *unit, span)
            }
            Literal::Type(file_type) => {
                self.check_property(cond, supports_type, "filetype", span)?;
                self.push("-type");
                self.push(type_arg(*file_type));
                Ok(())
            }
            Literal::Flag(_) => Err(Error::new_simple(
                "a file flag cannot be compared to a property",
            )
            .with_span(span)),
        }
    }

    fn check_property(
        &self,
        cond: &Condition,
        test_property: fn(Property) -> bool,
        type_desc: &str,
        span: Option<Span>,
    ) -> Result<(), Error> {
        if !test_property(cond.prop) {
            return Err(Error::new_simple(format!(
                "cannot compare a value of type \"{}\" to property \"{}\"",
                type_desc,
                cond.prop.as_str()
            ))
            .with_span(span));
        }

        if cond.cmp != CompareOp::Eq && !supports_numeric_operators(cond.prop) {
            return Err(Error::new_simple(format!(
                "values of type \"{}\" don't support the \"{}\" operator",
                type_desc, cond.cmp
            ))
            .with_span(span));
        }

        Ok(())
    }

    /// The host utility has no `<=`/`>=`; both expand into a grouped
    /// disjunction of the equal and strict forms.
    fn append_numeric_cond(&mut self, arg: &str, cmp: CompareOp, val: i64, suffix: &str) {
        let (lparen, rparen) = (self.lparen(), self.rparen());

        match cmp {
            CompareOp::Le => {
                let args = [
                    lparen.to_string(),
                    arg.to_string(),
                    format!("{val}{suffix}"),
                    "-o".to_string(),
                    arg.to_string(),
                    format!("-{val}{suffix}"),
                    rparen.to_string(),
                ];
                self.argv.extend(args);
            }
            CompareOp::Ge => {
                let args = [
                    lparen.to_string(),
                    arg.to_string(),
                    format!("{val}{suffix}"),
                    "-o".to_string(),
                    arg.to_string(),
                    format!("+{val}{suffix}"),
                    rparen.to_string(),
                ];
                self.argv.extend(args);
            }
            CompareOp::Eq => {
                self.push(arg);
                self.push(format!("{val}{suffix}"));
            }
            CompareOp::Lt => {
                self.push(arg);
                self.push(format!("-{val}{suffix}"));
            }
            CompareOp::Gt => {
                self.push(arg);
                self.push(format!("+{val}{suffix}"));
            }
        }
    }

    fn append_time_cond(
        &mut self,
        prop: Property,
        cmp: CompareOp,
        val: i64,
        unit: TimeUnit,
        span: Option<Span>,
    ) -> Result<(), Error> {
        let (val, unit) = match unit {
            TimeUnit::Hours => {
                let minutes = val.checked_mul(60).ok_or_else(|| {
                    Error::new_simple(format!(
                        "integer overflow, couldn't convert {val} hours to minutes"
                    ))
                    .with_span(span)
                })?;

                (minutes, TimeUnit::Minutes)
            }
            unit => (val, unit),
        };

        self.append_numeric_cond(time_arg(prop, unit), cmp, val, "");

        Ok(())
    }

    fn append_size_cond(
        &mut self,
        cmp: CompareOp,
        val: i64,
        unit: SizeUnit,
        span: Option<Span>,
    ) -> Result<(), Error> {
        let loops = match unit {
            SizeUnit::Bytes => 0,
            SizeUnit::Kb => 1,
            SizeUnit::Mb => 2,
            SizeUnit::Gb => 3,
        };

        let mut bytes = val;

        for _ in 0..loops {
            bytes = bytes.checked_mul(1024).ok_or_else(|| {
                Error::new_simple(format!(
                    "integer overflow, couldn't convert {val}{unit} to bytes"
                ))
                .with_span(span)
            })?;
        }

        self.append_numeric_cond("-size", cmp, bytes, "c");

        Ok(())
    }

    fn append_string_arg(&mut self, propname: &str, val: &str) {
        self.push(propname);

        if self.flags.quote {
            self.push(format!("\"{val}\""));
        } else {
            self.push(val);
        }
    }
}

fn supports_number(prop: Property) -> bool {
    matches!(
        prop,
        Property::Atime
            | Property::Ctime
            | Property::Mtime
            | Property::Size
            | Property::GroupId
            | Property::UserId
    )
}

fn supports_time(prop: Property) -> bool {
    matches!(prop, Property::Atime | Property::Ctime | Property::Mtime)
}

fn supports_string(prop: Property) -> bool {
    matches!(
        prop,
        Property::Name
            | Property::IName
            | Property::Regex
            | Property::IRegex
            | Property::Group
            | Property::User
            | Property::Filesystem
    )
}

fn supports_size(prop: Property) -> bool {
    prop == Property::Size
}

fn supports_type(prop: Property) -> bool {
    prop == Property::Type
}

fn supports_numeric_operators(prop: Property) -> bool {
    matches!(
        prop,
        Property::Atime | Property::Ctime | Property::Mtime | Property::Size
    )
}

fn property_arg(prop: Property) -> &'static str {
    match prop {
        Property::Name => "-name",
        Property::IName => "-iname",
        Property::Regex => "-regex",
        Property::IRegex => "-iregex",
        Property::Atime => "-atime",
        Property::Ctime => "-ctime",
        Property::Mtime => "-mtime",
        Property::Group => "-group",
        Property::GroupId => "-gid",
        Property::User => "-user",
        Property::UserId => "-uid",
        Property::Size => "-size",
        Property::Type => "-type",
        Property::Filesystem => "-fstype",
    }
}

/// Day-granularity comparisons use `-atime`-style flags, everything else the
/// minute-granularity `-amin` family.
fn time_arg(prop: Property, unit: TimeUnit) -> &'static str {
    match (prop, unit) {
        (Property::Atime, TimeUnit::Days) => "-atime",
        (Property::Atime, _) => "-amin",
        (Property::Ctime, TimeUnit::Days) => "-ctime",
        (Property::Ctime, _) => "-cmin",
        (Property::Mtime, TimeUnit::Days) => "-mtime",
        (Property::Mtime, _) => "-mmin",
        _ => property_arg(prop),
    }
}

fn type_arg(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Regular => "f",
        FileType::Directory => "d",
        FileType::Pipe => "p",
        FileType::Socket => "s",
        FileType::Block => "b",
        FileType::Character => "c",
        FileType::Symlink => "l",
    }
}

fn flag_arg(flag: FileFlag) -> &'static str {
    match flag {
        FileFlag::Readable => "-readable",
        FileFlag::Writable => "-writable",
        FileFlag::Executable => "-executable",
        FileFlag::Empty => "-empty",
    }
}

#[cfg(test)]
mod test {
    use similar_asserts::assert_eq;

    use super::*;

    fn argv(expr: &str, quote: bool) -> Vec<String> {
        let root = fql_parser::parse_expression(expr).unwrap();
        translate(root.exprs.as_ref(), TranslationFlags { quote }).unwrap()
    }

    fn error(expr: &str) -> Error {
        let root = fql_parser::parse_expression(expr).unwrap();
        translate(root.exprs.as_ref(), TranslationFlags::default()).unwrap_err()
    }

    #[test]
    fn size_and_type() {
        assert_eq!(
            argv("size>=10M and type==file", false),
            vec!["(", "-size", "10485760c", "-o", "-size", "+10485760c", ")", "-a", "-type", "f"]
        );
    }

    #[test]
    fn time_with_unit() {
        assert_eq!(argv("mtime<7days", false), vec!["-mtime", "-7"]);
        assert_eq!(argv("mtime<7d", false), vec!["-mtime", "-7"]);
    }

    #[test]
    fn hours_convert_to_minutes() {
        assert_eq!(
            argv("atime<=2h", false),
            vec!["(", "-amin", "120", "-o", "-amin", "-120", ")"]
        );
    }

    #[test]
    fn bare_numbers_mean_minutes_and_bytes() {
        assert_eq!(argv("mtime>7", false), vec!["-mmin", "+7"]);
        assert_eq!(argv("size=512", false), vec!["-size", "512c"]);
    }

    #[test]
    fn disjunction_under_conjunction() {
        assert_eq!(
            argv("type==file and (name==\"*.log\" or name==\"*.txt\")", true),
            vec!["-type", "f", "-a", "\\(", "-name", "\"*.log\"", "-o", "-name", "\"*.txt\"", "\\)"]
        );
        assert_eq!(
            argv("type==file and (name==\"*.log\" or name==\"*.txt\")", false),
            vec!["-type", "f", "-a", "(", "-name", "*.log", "-o", "-name", "*.txt", ")"]
        );
    }

    #[test]
    fn or_chain_stays_flat() {
        assert_eq!(
            argv("name==\"a\" or name==\"b\" or name==\"c\"", false),
            vec!["-name", "a", "-o", "-name", "b", "-o", "-name", "c"]
        );
    }

    #[test]
    fn not_wraps_expressions_only() {
        assert_eq!(argv("not type==file", false), vec!["!", "-type", "f"]);
        assert_eq!(
            argv("not (type==file and empty)", false),
            vec!["!", "(", "-type", "f", "-a", "-empty", ")"]
        );
    }

    #[test]
    fn flags_and_ids() {
        assert_eq!(argv("readable and gid=100", false), vec!["-readable", "-a", "-gid", "100"]);
        assert_eq!(argv("uid=1000", false), vec!["-uid", "1000"]);
        assert_eq!(argv("user==bob", false), vec!["-user", "bob"]);
    }

    #[test]
    fn type_mismatch() {
        let e = error("name>5");
        let message = e.to_string();

        assert!(message.contains("numeric"), "{message}");
        assert!(message.contains("\"name\""), "{message}");
        assert!(e.span.is_some());
    }

    #[test]
    fn unsupported_operator() {
        let e = error("name>\"x\"");
        let message = e.to_string();

        assert!(message.contains("don't support"), "{message}");
        assert!(message.contains(">"), "{message}");
    }

    #[test]
    fn size_overflow() {
        let e = error("size>9000000000G");
        assert!(e.to_string().contains("overflow"), "{}", e);
    }

    #[test]
    fn func_call_rejected_in_find_subtree() {
        let root = fql_parser::parse_expression("my_plugin(\"x\") == true").unwrap();

        let e = translate(root.exprs.as_ref(), TranslationFlags::default()).unwrap_err();
        assert!(e.to_string().contains("post-processing"), "{}", e);
    }

    #[test]
    fn empty_subtree_translates_to_nothing() {
        assert!(translate(None, TranslationFlags::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn snapshot_complex_expression() {
        insta::assert_debug_snapshot!(
            argv("size>=10M and (type==file or type==directory) and mtime>7d", false),
            @r###"
        [
            "(",
            "-size",
            "10485760c",
            "-o",
            "-size",
            "+10485760c",
            ")",
            "-a",
            "(",
            "-type",
            "f",
            "-o",
            "-type",
            "d",
            ")",
            "-a",
            "-mtime",
            "+7",
        ]
        "###
        );
    }

    #[test]
    fn translation_is_stable() {
        let expr = "size>=10M and (type==file or type==directory) and mtime>7d";
        assert_eq!(argv(expr, true), argv(expr, true));
    }
}
