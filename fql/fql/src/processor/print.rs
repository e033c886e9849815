//! Stages that print found paths, plainly or through a format string.

use std::io::Write;

use fql_parser::error::Error;

use crate::fileinfo::FileInfo;
use crate::format::{parse_format, substitute_field_names, write_formatted, ParsedFormat};

use super::{Processor, ProcessorFlags};

/// Writes `path\n` per path and passes the path through.
pub struct PrintProcessor {
    flags: ProcessorFlags,
    pending: Option<(String, String)>,
    out: Box<dyn Write>,
}

impl PrintProcessor {
    pub fn new() -> Self {
        Self::with_output(Box::new(std::io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        PrintProcessor {
            flags: ProcessorFlags::default(),
            pending: None,
            out,
        }
    }
}

impl Default for PrintProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for PrintProcessor {
    fn is_readable(&self) -> bool {
        self.flags.readable
    }

    fn is_closed(&self) -> bool {
        self.flags.closed
    }

    fn read(&mut self) -> Option<(String, String)> {
        self.flags.readable = false;
        self.pending.take()
    }

    fn write(&mut self, dir: &str, path: &str) {
        let _ = writeln!(self.out, "{path}");

        self.flags.readable = true;
        self.pending = Some((dir.to_string(), path.to_string()));
    }

    fn close(&mut self) {
        let _ = self.out.flush();
        self.flags.closed = true;
    }
}

/// Renders a parsed format string per path and passes the path through.
pub struct FormatProcessor {
    flags: ProcessorFlags,
    format: ParsedFormat,
    pending: Option<(String, String)>,
    out: Box<dyn Write>,
}

impl FormatProcessor {
    /// Fails when the format string doesn't parse; the chain build aborts.
    pub fn new(format: &str) -> Result<Self, Error> {
        Self::with_output(format, Box::new(std::io::stdout()))
    }

    pub fn with_output(format: &str, out: Box<dyn Write>) -> Result<Self, Error> {
        let format = parse_format(&substitute_field_names(format))?;

        Ok(FormatProcessor {
            flags: ProcessorFlags::default(),
            format,
            pending: None,
            out,
        })
    }
}

impl Processor for FormatProcessor {
    fn is_readable(&self) -> bool {
        self.flags.readable
    }

    fn is_closed(&self) -> bool {
        self.flags.closed
    }

    fn read(&mut self) -> Option<(String, String)> {
        self.flags.readable = false;
        self.pending.take()
    }

    fn write(&mut self, dir: &str, path: &str) {
        match FileInfo::get(dir, path) {
            Ok(info) => {
                let _ = write_formatted(&self.format, &info, &mut self.out);
            }
            Err(e) => eprintln!("{e}"),
        }

        self.flags.readable = true;
        self.pending = Some((dir.to_string(), path.to_string()));
    }

    fn close(&mut self) {
        let _ = self.out.flush();
        self.flags.closed = true;
    }
}
