//! Exec stage: run a command template per found path.

use std::process::Command;

use super::{Processor, ProcessorFlags};

/// A command template taken from a `--exec … ;` group. Every `{}` in the
/// program or its arguments is replaced with the current path, following the
/// host find convention; nothing is appended implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecArgs {
    pub program: String,
    pub args: Vec<String>,
}

impl ExecArgs {
    pub fn new(program: impl Into<String>) -> Self {
        ExecArgs {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn append(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    pub fn from_argv(argv: &[String]) -> Option<ExecArgs> {
        let (program, args) = argv.split_first()?;

        Some(ExecArgs {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

pub struct ExecProcessor {
    flags: ProcessorFlags,
    template: ExecArgs,
    ignore_errors: bool,
    pending: Option<(String, String)>,
    failed: bool,
}

impl ExecProcessor {
    pub fn new(template: ExecArgs, ignore_errors: bool) -> Self {
        ExecProcessor {
            flags: ProcessorFlags::default(),
            template,
            ignore_errors,
            pending: None,
            failed: false,
        }
    }

    fn run(&mut self, dir: &str, path: &str) -> bool {
        let program = self.template.program.replace("{}", path);
        let args: Vec<String> = self
            .template
            .args
            .iter()
            .map(|arg| arg.replace("{}", path))
            .collect();

        log::debug!("running `{program}` with {args:?} in {dir}");

        // The child's working directory is the search starting-point.
        match Command::new(&program).args(&args).current_dir(dir).status() {
            Ok(status) if status.success() => true,
            Ok(status) => {
                log::warn!("`{program}` exited with {status}");
                false
            }
            Err(e) => {
                eprintln!("couldn't run `{program}': {e}");
                false
            }
        }
    }
}

impl Processor for ExecProcessor {
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
        if !self.run(dir, path) {
            self.failed = true;

            if !self.ignore_errors {
                self.flags.readable = false;
                self.flags.closed = true;
                return;
            }
        }

        self.flags.readable = true;
        self.pending = Some((dir.to_string(), path.to_string()));
    }

    fn close(&mut self) {
        self.flags.closed = true;
    }

    fn failed(&self) -> bool {
        self.failed
    }
}
