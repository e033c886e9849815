//! The printf-like format engine: parse a format string once, render it per
//! found file.

mod fields;
mod parser;
mod render;

pub use fields::{map_field_name, substitute_field_names};
pub use parser::{parse_format, AttrNode, FormatNode, ParsedFormat, PrintFlags};
pub use render::write_formatted;
