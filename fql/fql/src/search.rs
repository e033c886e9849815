//! Run one search: translate the expression, spawn the host `find`, stream
//! its output through the post filter and hand surviving paths downstream.

use std::io::{Read, Write};
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;

use itertools::Itertools;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use fql_parser::ast::Root;
use fql_parser::error::Error;
use fql_parser::parse_expression;

use crate::buffer::LineBuffer;
use crate::eval::{evaluate, EvalResult};
use crate::extension::ExtensionManager;
use crate::translate::{translate, TranslationFlags};

/// Options merged into the spawned `find` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub max_depth: Option<u32>,
    pub follow: bool,
    pub regex_type: Option<String>,
}

/// Parse and translate `expr`, then merge the fixed arguments around the
/// translated ones.
pub fn translate_expression(
    dir: &str,
    expr: &str,
    flags: TranslationFlags,
    opts: &SearchOptions,
) -> Result<(Root, Vec<String>), Vec<Error>> {
    let root = parse_expression(expr)?;
    let argv = translate(root.exprs.as_ref(), flags).map_err(|e| vec![e])?;

    Ok((root, merge_options(argv, dir, opts)))
}

fn merge_options(argv: Vec<String>, dir: &str, opts: &SearchOptions) -> Vec<String> {
    let mut merged = Vec::with_capacity(argv.len() + 8);

    merged.push("find".to_string());

    if opts.follow {
        merged.push("-L".to_string());
    }

    merged.push(dir.to_string());

    if let Some(regex_type) = &opts.regex_type {
        merged.push("-regextype".to_string());
        merged.push(regex_type.clone());
    }

    merged.extend(argv);

    if let Some(max_depth) = opts.max_depth {
        merged.push("-maxdepth".to_string());
        merged.push(max_depth.to_string());
    }

    merged
}

/// Translate only and print the argument vector, one token per argument,
/// space separated. The `-regextype` value is quoted when shell quoting is
/// on. Returns false on parse or translation errors, which go to `err`.
pub fn search_debug(
    out: &mut dyn Write,
    err: &mut dyn Write,
    dir: &str,
    expr: &str,
    flags: TranslationFlags,
    opts: &SearchOptions,
) -> bool {
    match translate_expression(dir, expr, flags, opts) {
        Ok((_root, argv)) => {
            let mut quote_next = false;

            let line = argv
                .iter()
                .map(|arg| {
                    let rendered = if quote_next {
                        format!("\"{arg}\"")
                    } else {
                        arg.clone()
                    };

                    quote_next = flags.quote && arg == "-regextype";
                    rendered
                })
                .join(" ");

            let _ = writeln!(out, "{line}");
            true
        }
        Err(errors) => {
            for e in errors {
                let _ = writeln!(err, "{}", e.message(expr));
            }
            false
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StreamTag {
    Out,
    Err,
}

enum StreamEvent {
    Line(StreamTag, String),
    Notice(String),
}

#[derive(PartialEq, Eq)]
enum State {
    Ok,
    Stop,
    Error,
}

/// Run one search against one starting-point.
///
/// Lines from the child's stdout survive the post filter (if any) and reach
/// `on_path` in emission order; returning true from `on_path` stops the
/// search early. Stderr lines reach `on_error` verbatim. Returns the number
/// of delivered paths, saturated at `i32::MAX`.
pub fn search_files(
    dir: &str,
    expr: &str,
    flags: TranslationFlags,
    opts: &SearchOptions,
    on_path: &mut dyn FnMut(&str) -> bool,
    on_error: &mut dyn FnMut(&str),
) -> Result<i32, Error> {
    let (root, argv) = translate_expression(dir, expr, flags, opts).map_err(first_error)?;

    // Extensions are only needed (and only loaded) for post expressions.
    let extensions = root.post_exprs.as_ref().map(|_| {
        let mut manager = ExtensionManager::new();
        let count = manager.load_default();
        log::debug!("loaded {count} extension module(s)");
        manager
    });

    let exe = locate_executable("find")
        .ok_or_else(|| Error::new_simple("couldn't find `find' executable"))?;

    log::debug!("spawning {} {:?}", exe.display(), &argv[1..]);

    let mut child = Command::new(&exe)
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::new_simple(format!("couldn't spawn `find': {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::new_simple("child stdout is not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::new_simple("child stderr is not piped"))?;

    let (tx, rx) = mpsc::channel();
    let tx_err = tx.clone();

    let stdout_reader = thread::spawn(move || read_stream(stdout, tx, StreamTag::Out));
    let stderr_reader = thread::spawn(move || read_stream(stderr, tx_err, StreamTag::Err));

    let mut state = State::Ok;
    let mut count: i32 = 0;

    for event in rx.iter() {
        match event {
            StreamEvent::Line(StreamTag::Out, line) => {
                if state != State::Ok {
                    // Cancelled already; keep draining so the readers finish.
                    continue;
                }

                match filter_path(extensions.as_ref(), &root, &line) {
                    EvalResult::True => {
                        if on_path(&line) {
                            state = State::Stop;
                            terminate(&mut child);
                        } else {
                            count = count.saturating_add(1);
                        }
                    }
                    EvalResult::False => {}
                    EvalResult::Abort => {
                        on_error("evaluation aborted");
                        state = State::Error;
                        terminate(&mut child);
                    }
                }
            }
            StreamEvent::Line(StreamTag::Err, line) => on_error(&line),
            StreamEvent::Notice(message) => on_error(&message),
        }
    }

    let _ = stdout_reader.join();
    let _ = stderr_reader.join();

    let status = child
        .wait()
        .map_err(|e| Error::new_simple(format!("couldn't reap child process: {e}")))?;

    log::debug!("child exited with {status}, delivered {count} path(s)");

    match state {
        State::Error => Err(Error::new_simple("search aborted")),
        State::Stop => Ok(count),
        State::Ok if status.success() => Ok(count),
        State::Ok => Err(Error::new_simple(format!(
            "`find' exited with status {}",
            status.code().unwrap_or(-1)
        ))),
    }
}

fn first_error(errors: Vec<Error>) -> Error {
    errors
        .into_iter()
        .next()
        .unwrap_or_else(|| Error::new_simple("expression is invalid"))
}

fn filter_path(
    extensions: Option<&ExtensionManager>,
    root: &Root,
    path: &str,
) -> EvalResult {
    match (&root.post_exprs, extensions) {
        (None, _) => EvalResult::True,
        (Some(post), Some(manager)) => {
            let result = evaluate(manager, post, path);

            if result == EvalResult::Abort {
                log::error!("post expression aborted for {path}");
            }

            result
        }
        (Some(_), None) => EvalResult::Abort,
    }
}

/// Read one pipe in 512-byte chunks, chop it into lines and forward them.
/// Any tail without a line break flushes as a final line at EOF.
fn read_stream(mut stream: impl Read, tx: mpsc::Sender<StreamEvent>, tag: StreamTag) {
    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; 512];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if !buffer.fill(&chunk[..n]) {
                    // Drop the oversized line but keep draining the pipe so
                    // the child never blocks.
                    let _ = tx.send(StreamEvent::Notice(
                        "line exceeds maximum buffer size".to_string(),
                    ));
                    buffer.clear();
                }

                while let Some(line) = buffer.read_line() {
                    if tx.send(StreamEvent::Line(tag, line)).is_err() {
                        return;
                    }
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    if let Some(rest) = buffer.flush() {
        let _ = tx.send(StreamEvent::Line(tag, rest));
    }
}

/// Cancel the child: SIGTERM first, SIGKILL when the signal can't be
/// delivered. The caller still reaps.
fn terminate(child: &mut Child) {
    log::debug!("terminating child process {}", child.id());

    let pid = Pid::from_raw(child.id() as i32);

    if signal::kill(pid, Signal::SIGTERM).is_err() {
        let _ = child.kill();
    }
}

/// Search `$PATH` for an executable, like the shell would.
pub fn locate_executable(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;

    for dir in std::env::split_paths(&path) {
        if dir.as_os_str().is_empty() {
            continue;
        }

        let candidate = dir.join(name);

        if let Ok(meta) = candidate.metadata() {
            if meta.is_file() && meta.mode() & 0o111 != 0 {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merge_order() {
        let opts = SearchOptions {
            max_depth: Some(2),
            follow: true,
            regex_type: Some("posix-extended".to_string()),
        };

        let merged = merge_options(
            vec!["-type".to_string(), "f".to_string()],
            "/var/log",
            &opts,
        );

        assert_eq!(
            merged,
            vec![
                "find",
                "-L",
                "/var/log",
                "-regextype",
                "posix-extended",
                "-type",
                "f",
                "-maxdepth",
                "2"
            ]
        );
    }

    #[test]
    fn locate_finds_a_shell() {
        assert!(locate_executable("sh").is_some());
        assert!(locate_executable("definitely-not-a-real-tool").is_none());
    }
}
