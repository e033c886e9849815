use std::io::{BufRead, Write};
use std::path::Path;
use std::process::exit;

use anyhow::{anyhow, bail, Result};
use clap::{ArgAction, Parser};
use itertools::Itertools;
use log::LevelFilter;

use fql::processor::{
    ChainBuilder, ExecArgs, ExecProcessor, FormatProcessor, LimitProcessor, PrintProcessor,
    Processor, ProcessorChain, SkipProcessor, SortProcessor,
};
use fql::search::{search_debug, search_files, SearchOptions};
use fql::translate::TranslationFlags;
use fql::{extension::ExtensionManager, ignorelist::IgnoreList};

use crate::config::{self, Defaults};
use crate::exec_args;

/// Entrypoint called by [`crate::main`]
pub fn main() -> Result<()> {
    let raw: Vec<String> = std::env::args().collect();

    let (argv, exec_templates) = match exec_args::steal(&raw) {
        Ok(split) => split,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("Try 'fql --help' for more information.");
            exit(2);
        }
    };

    let cli = Cli::parse_from(&argv);
    let defaults = Defaults::load();
    let opts = Options::merge(cli, exec_templates, defaults);

    init_logging(opts.log_level, opts.log_color);

    log::info!("fql started successfully");

    if run(&opts).is_err() {
        exit(1);
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "fql",
    about = "Search files with readable expressions, delegating the walk to the host `find`.",
    version,
    disable_version_flag = true
)]
struct Cli {
    /// Expression to evaluate when finding files
    #[arg(short = 'e', long, value_name = "EXPR")]
    expr: Option<String>,

    /// Directory to search (repeatable)
    #[arg(short = 'd', long = "dir", value_name = "PATH")]
    dir: Vec<String>,

    /// Quote special characters in the translated expression
    #[arg(
        short = 'q',
        long,
        value_name = "yes|no",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "yes",
        value_parser = parse_yes_no
    )]
    quote: Option<bool>,

    /// Follow symbolic links
    #[arg(
        short = 'L',
        long,
        value_name = "yes|no",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "yes",
        value_parser = parse_yes_no
    )]
    follow: Option<bool>,

    /// Maximum search depth
    #[arg(long, value_name = "LEVELS")]
    max_depth: Option<u32>,

    /// Number of files to skip before printing
    #[arg(long, value_name = "N")]
    skip: Option<u64>,

    /// Maximum number of files to print
    #[arg(long, value_name = "N")]
    limit: Option<u64>,

    /// Regular expression type understood by the host `find`
    #[arg(long, value_name = "TYPE")]
    regex_type: Option<String>,

    /// Print format applied to each found file
    #[arg(long, value_name = "FORMAT")]
    printf: Option<String>,

    /// Fields to order the search result by
    #[arg(long, value_name = "FIELDS", allow_hyphen_values = true)]
    order_by: Option<String>,

    /// Don't stop when an --exec command exits with a non-zero status
    #[arg(
        long,
        value_name = "yes|no",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "yes",
        value_parser = parse_yes_no
    )]
    exec_ignore_errors: Option<bool>,

    /// Translate the expression and print it instead of searching
    #[arg(short = 'p', long)]
    print: bool,

    /// Print installed extensions and exit
    #[arg(long)]
    print_extensions: bool,

    /// Print the extension ignore list and exit
    #[arg(long)]
    print_ignore_list: bool,

    /// Log verbosity (0-6)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<u8>,

    /// Colorize log messages
    #[arg(
        long,
        value_name = "yes|no",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "yes",
        value_parser = parse_yes_no
    )]
    log_color: Option<bool>,

    /// Print version and exit
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Starting-points, optionally followed by the expression
    #[arg(value_name = "ARGS")]
    args: Vec<String>,
}

fn parse_yes_no(value: &str) -> Result<bool, String> {
    config::parse_bool(value).ok_or_else(|| format!("expected `yes` or `no`, got `{value}`"))
}

#[derive(Debug)]
struct Options {
    expr: Option<String>,
    read_expr_from_stdin: bool,
    dirs: Vec<String>,
    quote: bool,
    follow: bool,
    max_depth: Option<u32>,
    regex_type: Option<String>,
    printf: Option<String>,
    order_by: Option<String>,
    skip: Option<u64>,
    limit: Option<u64>,
    exec: Vec<ExecArgs>,
    exec_ignore_errors: bool,
    print: bool,
    print_extensions: bool,
    print_ignore_list: bool,
    log_level: u8,
    log_color: bool,
}

impl Options {
    fn merge(cli: Cli, exec: Vec<ExecArgs>, defaults: Defaults) -> Options {
        // Leading positionals are starting-points; without -e the last one
        // is the expression, and a single positional is a starting-point.
        let mut dirs = cli.dir;
        let mut positionals = cli.args;
        let mut expr = cli.expr;
        let mut read_expr_from_stdin = expr.is_none();

        if expr.is_none() && positionals.len() >= 2 {
            expr = positionals.pop();
            read_expr_from_stdin = false;
        }

        dirs.extend(positionals);
        let dirs: Vec<String> = dirs.into_iter().unique().collect();

        Options {
            expr,
            read_expr_from_stdin,
            dirs,
            quote: cli.quote.or(defaults.quote).unwrap_or(false),
            follow: cli.follow.or(defaults.follow).unwrap_or(false),
            max_depth: cli.max_depth.or(defaults.max_depth),
            regex_type: cli.regex_type.or(defaults.regex_type),
            printf: cli.printf.or(defaults.printf),
            order_by: cli.order_by.or(defaults.order_by),
            skip: cli.skip,
            limit: cli.limit,
            exec,
            exec_ignore_errors: cli
                .exec_ignore_errors
                .or(defaults.exec_ignore_errors)
                .unwrap_or(false),
            print: cli.print,
            print_extensions: cli.print_extensions,
            print_ignore_list: cli.print_ignore_list,
            log_level: cli.log_level.or(defaults.verbosity).unwrap_or(0).min(6),
            log_color: cli.log_color.or(defaults.color).unwrap_or(true),
        }
    }

    fn translation_flags(&self) -> TranslationFlags {
        TranslationFlags { quote: self.quote }
    }

    fn search_options(&self) -> SearchOptions {
        SearchOptions {
            max_depth: self.max_depth,
            follow: self.follow,
            regex_type: self.regex_type.clone(),
        }
    }
}

/// Errors and warnings go to stderr, informational output to stdout. A
/// single env_logger writes to one target only, so two of them sit behind
/// one dispatching logger.
struct SplitLogger {
    stderr: env_logger::Logger,
    stdout: env_logger::Logger,
}

impl log::Log for SplitLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.stderr.enabled(metadata) || self.stdout.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if record.level() <= log::Level::Warn {
            self.stderr.log(record);
        } else {
            self.stdout.log(record);
        }
    }

    fn flush(&self) {
        self.stderr.flush();
        self.stdout.flush();
    }
}

fn init_logging(level: u8, color: bool) {
    let filter = match level {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let style = if color {
        env_logger::WriteStyle::Auto
    } else {
        env_logger::WriteStyle::Never
    };

    let build = |target| {
        env_logger::Builder::new()
            .filter_level(filter)
            .format_timestamp(None)
            .write_style(style)
            .target(target)
            .build()
    };

    let logger = SplitLogger {
        stderr: build(env_logger::Target::Stderr),
        stdout: build(env_logger::Target::Stdout),
    };

    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(filter);
    }
}

fn run(opts: &Options) -> Result<()> {
    if opts.print_extensions {
        return print_extensions();
    }

    if opts.print_ignore_list {
        return print_ignore_list();
    }

    let expr = resolve_expression(opts)?;
    let dirs = resolve_dirs(opts)?;

    if opts.print {
        return print_expr(opts, &expr, &dirs);
    }

    exec_find(opts, &expr, &dirs)
}

fn print_extensions() -> Result<()> {
    let mut manager = ExtensionManager::new();
    let count = manager.load_default();

    if count > 0 {
        let mut stdout = std::io::stdout();
        manager.export(&mut stdout)?;
    } else {
        println!("No extensions loaded.");
    }

    Ok(())
}

fn print_ignore_list() -> Result<()> {
    let mut list = IgnoreList::new();
    list.load_default();

    for entry in list.iter() {
        println!("{entry}");
    }

    Ok(())
}

fn resolve_expression(opts: &Options) -> Result<String> {
    let expr = match &opts.expr {
        Some(expr) => Some(expr.clone()),
        None if opts.read_expr_from_stdin => {
            log::debug!("no expression specified, reading from standard input");

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Some(line.trim_end_matches(['\n', '\r']).to_string())
        }
        None => None,
    };

    match expr {
        Some(expr) if !expr.is_empty() => Ok(expr),
        _ => {
            eprintln!("Expression cannot be empty.");
            bail!("expression is missing");
        }
    }
}

fn resolve_dirs(opts: &Options) -> Result<Vec<String>> {
    let mut dirs = opts.dirs.clone();

    if dirs.is_empty() {
        log::debug!("no directory specified, falling back to the home directory");

        match std::env::var("HOME") {
            Ok(home) if !home.is_empty() => dirs.push(home),
            _ => {
                eprintln!("Couldn't detect home directory.");
                bail!("no starting-point");
            }
        }
    }

    for dir in &dirs {
        if !Path::new(dir).is_dir() {
            eprintln!("The specified directory is invalid: {dir}");
            bail!("invalid starting-point");
        }
    }

    Ok(dirs)
}

fn print_expr(opts: &Options, expr: &str, dirs: &[String]) -> Result<()> {
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();

    for dir in dirs {
        if !search_debug(
            &mut stdout,
            &mut stderr,
            dir,
            expr,
            opts.translation_flags(),
            &opts.search_options(),
        ) {
            bail!("translation failed");
        }
    }

    Ok(())
}

fn build_chain(opts: &Options) -> Result<ProcessorChain> {
    let mut builder = ChainBuilder::new();

    // Exec stages sit behind the print stage; both are passive sinks.
    for template in &opts.exec {
        builder.append(Box::new(ExecProcessor::new(
            template.clone(),
            opts.exec_ignore_errors,
        )));
    }

    let print: Option<Box<dyn Processor>> = match &opts.printf {
        Some(format) => match FormatProcessor::new(format) {
            Ok(processor) => Some(Box::new(processor)),
            Err(e) => {
                eprintln!("couldn't parse format string: {e}");
                None
            }
        },
        None => Some(Box::new(PrintProcessor::new())),
    };
    builder.try_prepend(print);

    if let Some(limit) = opts.limit {
        builder.try_prepend(Some(Box::new(LimitProcessor::new(limit))));
    }

    if let Some(skip) = opts.skip {
        if skip > 0 {
            builder.try_prepend(Some(Box::new(SkipProcessor::new(skip))));
        }
    }

    // Prepended last so that limit and skip always see ordered output.
    if let Some(order_by) = &opts.order_by {
        match SortProcessor::new(order_by) {
            Ok(processor) => {
                builder.try_prepend(Some(Box::new(processor)));
            }
            Err(e) => {
                eprintln!("{e}");
                builder.fail();
            }
        }
    }

    builder
        .into_chain()
        .ok_or_else(|| anyhow!("couldn't build processor chain"))
}

fn exec_find(opts: &Options, expr: &str, dirs: &[String]) -> Result<()> {
    let mut chain = build_chain(opts)?;

    for dir in dirs {
        let result = search_files(
            dir,
            expr,
            opts.translation_flags(),
            &opts.search_options(),
            &mut |path| chain.write(dir, path),
            &mut |message| eprintln!("{message}"),
        );

        if let Err(e) = result {
            report_error(&e, expr);
            bail!("search failed");
        }
    }

    chain.complete();

    if chain.has_failed() {
        bail!("a processor reported an error");
    }

    Ok(())
}

/// Print the single-line diagnostic, plus an annotated source report when
/// the error points into the expression.
fn report_error(e: &fql::Error, source: &str) {
    eprintln!("{}", e.message(source));

    let Some(span) = e.span else {
        return;
    };

    use ariadne::{Config, Label, Report, ReportKind, Source};

    let mut rendered = Vec::new();

    let report = Report::build(ReportKind::Error, (), span.start)
        .with_config(Config::default().with_color(false))
        .with_label(Label::new(span.start..span.end).with_message(e.reason.to_string()))
        .finish();

    if report.write(Source::from(source), &mut rendered).is_ok() {
        let _ = std::io::stderr().write_all(&rendered);
    }
}
