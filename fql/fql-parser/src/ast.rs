use serde::Serialize;
use strum::EnumString;

use crate::span::Span;

/// A node of the expression tree. Nodes own their children; the whole tree
/// lives and dies with the [`Root`](crate::Root) returned by the parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr { kind, span: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    /// The constant `true`, used on the right-hand side of post comparisons.
    True,
    Literal(Literal),
    Condition(Condition),
    Binary(BinaryExpr),
    Not(Box<Expr>),
    Compare(CompareExpr),
    FuncCall(FuncCall),
}

impl ExprKind {
    pub fn into_expr(self, span: Span) -> Expr {
        Expr {
            span: Some(span),
            ..Expr::new(self)
        }
    }
}

/// A property/operator/value triple, e.g. `size >= 10M`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub prop: Property,
    pub cmp: CompareOp,
    /// Always an [`ExprKind::Literal`].
    pub value: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub op: BinOp,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    And,
    Or,
}

/// A node-to-node comparison; only meaningful inside the post expression,
/// where the left side is a plugin callback invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareExpr {
    pub left: Box<Expr>,
    pub cmp: CompareOp,
    pub right: Box<Expr>,
}

/// A plugin callback invocation. Arguments keep their written order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuncCall {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Literal {
    Integer(i64),
    String(String),
    Time(i64, TimeUnit),
    Size(i64, SizeUnit),
    /// Produced by the parser when a bare identifier names a file type.
    Type(FileType),
    /// A standalone file flag, e.g. `readable`.
    Flag(FileFlag),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "\"{s}\""),
            Literal::Time(n, unit) => write!(f, "{n}{unit}"),
            Literal::Size(n, unit) => write!(f, "{n}{unit}"),
            Literal::Type(t) => write!(f, "{}", t.as_str()),
            Literal::Flag(flag) => write!(f, "{}", flag.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SizeUnit {
    Bytes,
    Kb,
    Mb,
    Gb,
}

impl std::fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SizeUnit::Bytes => "b",
            SizeUnit::Kb => "K",
            SizeUnit::Mb => "M",
            SizeUnit::Gb => "G",
        })
    }
}

/// Searchable file properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Serialize)]
pub enum Property {
    #[strum(serialize = "name")]
    Name,
    #[strum(serialize = "iname")]
    IName,
    #[strum(serialize = "regex")]
    Regex,
    #[strum(serialize = "iregex")]
    IRegex,
    #[strum(serialize = "atime")]
    Atime,
    #[strum(serialize = "ctime")]
    Ctime,
    #[strum(serialize = "mtime")]
    Mtime,
    #[strum(serialize = "size")]
    Size,
    #[strum(serialize = "group")]
    Group,
    #[strum(serialize = "gid")]
    GroupId,
    #[strum(serialize = "user")]
    User,
    #[strum(serialize = "uid")]
    UserId,
    #[strum(serialize = "type")]
    Type,
    #[strum(serialize = "filesystem")]
    Filesystem,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::Name => "name",
            Property::IName => "iname",
            Property::Regex => "regex",
            Property::IRegex => "iregex",
            Property::Atime => "atime",
            Property::Ctime => "ctime",
            Property::Mtime => "mtime",
            Property::Size => "size",
            Property::Group => "group",
            Property::GroupId => "gid",
            Property::User => "user",
            Property::UserId => "uid",
            Property::Type => "type",
            Property::Filesystem => "filesystem",
        }
    }
}

/// Compare operators. The surface `!=` is sugar for `not (… = …)` and never
/// reaches the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompareOp {
    Eq,
    Le,
    Lt,
    Ge,
    Gt,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Le => "<=",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Serialize)]
pub enum FileType {
    #[strum(serialize = "file")]
    Regular,
    #[strum(serialize = "directory")]
    Directory,
    #[strum(serialize = "pipe")]
    Pipe,
    #[strum(serialize = "socket")]
    Socket,
    #[strum(serialize = "block")]
    Block,
    #[strum(serialize = "character")]
    Character,
    #[strum(serialize = "symlink")]
    Symlink,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Regular => "file",
            FileType::Directory => "directory",
            FileType::Pipe => "pipe",
            FileType::Socket => "socket",
            FileType::Block => "block",
            FileType::Character => "character",
            FileType::Symlink => "symlink",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Serialize)]
pub enum FileFlag {
    #[strum(serialize = "readable")]
    Readable,
    #[strum(serialize = "writable")]
    Writable,
    #[strum(serialize = "executable")]
    Executable,
    #[strum(serialize = "empty")]
    Empty,
}

impl FileFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFlag::Readable => "readable",
            FileFlag::Writable => "writable",
            FileFlag::Executable => "executable",
            FileFlag::Empty => "empty",
        }
    }
}

/// The parse result: the subtree translated into find arguments and the
/// optional subtree interpreted in-process against plugin callbacks.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Root {
    pub exprs: Option<Expr>,
    pub post_exprs: Option<Expr>,
}
