//! FQL core: translate readable search expressions into host `find`
//! invocations, supervise the search, filter results through plugin
//! callbacks and route them through the output pipeline.
//!
//! The typical flow is [`search_files`]: parse and translate the expression,
//! spawn `find`, stream its stdout through the optional post filter and hand
//! surviving paths to the caller, which usually writes them into a
//! [`processor::ProcessorChain`].

pub mod buffer;
pub mod eval;
pub mod extension;
pub mod fileinfo;
pub mod format;
pub mod fs;
pub mod ignorelist;
pub mod processor;
pub mod search;
pub mod translate;

pub use fql_parser::ast;
pub use fql_parser::error::{Error, MessageKind, Reason, SourceLocation, WithErrorInfo};
pub use fql_parser::{parse_expression, Span, MAX_EXPRESSION_LENGTH};

pub use eval::{evaluate, CallbackDispatcher, EvalResult};
pub use search::{search_debug, search_files, SearchOptions};
pub use translate::{translate, TranslationFlags};
