mod test_runner;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use expander::{ExpandError, ScriptEngine, Session, Settings};
use splice::scanner::SpanKind;

const SUBCOMMANDS: &[&str] = &["expand", "test", "help"];

#[derive(Parser)]
#[command(name = "splice", version, about = "Expand script directives in Markdown documents")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v debug, -vv trace). SPLICE_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a Markdown document
    Expand(ExpandArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct ExpandArgs {
    /// Markdown source file to expand
    file: PathBuf,

    /// Target format identifier (overrides the config file)
    #[arg(short = 't', long = "to")]
    to: Option<String>,

    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the expansion here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit the expansion as JSON segments
    #[arg(long)]
    json: bool,

    /// Dump the scanned spans and exit
    #[arg(long)]
    spans: bool,

    /// Scan only, don't evaluate (exit 0 if every directive is well formed)
    #[arg(long)]
    check: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // If the first positional arg is not a known subcommand, inject "expand"
    // so `splice doc.md` works like `splice expand doc.md`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|i| i + 1)
        && !SUBCOMMANDS.contains(&args[pos].as_str())
    {
        args.insert(pos, "expand".to_string());
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose);

    match cli.command {
        Command::Expand(expand_args) => process::exit(do_expand(expand_args, cli.no_color)),
        Command::Test(test_args) => {
            if test_args.list_categories {
                test_runner::list_categories(&test_args.path);
                return;
            }
            let exit_code = test_runner::run_tests(&test_args.path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("SPLICE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn do_expand(args: ExpandArgs, no_color: bool) -> i32 {
    let mut settings = match &args.config {
        Some(path) => match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("error: {}", e);
                return 1;
            }
        },
        None => Settings::default(),
    };
    if let Some(target) = &args.to {
        settings.target = target.clone();
    }

    if args.spans || args.check {
        return scan_only(&args, no_color);
    }

    let mut session = match Session::new(ScriptEngine::new(), settings) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };
    tracing::debug!(
        file = %args.file.display(),
        format = %session.context().target_format,
        "expanding"
    );

    let expansion = match session.expand_file(&args.file) {
        Ok(expansion) => expansion,
        Err(error) => {
            emit_error(session.files(), &error, no_color);
            return 1;
        }
    };

    let rendered = if args.json {
        match serde_json::to_string_pretty(&expansion) {
            Ok(json) => json + "\n",
            Err(e) => {
                eprintln!("error: cannot serialize expansion: {}", e);
                return 1;
            }
        }
    } else {
        expansion.to_string()
    };

    match write_output(args.output.as_deref(), &rendered) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: cannot write output: {}", e);
            1
        }
    }
}

/// `--spans` and `--check`: run the scanner without evaluating anything.
fn scan_only(args: &ExpandArgs, no_color: bool) -> i32 {
    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file.display(), e);
            return 1;
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.display().to_string(), source.clone());

    let spans = match splice::scan(&source) {
        Ok(spans) => spans,
        Err(e) => {
            let offset = e.offset().min(source.len());
            let error = ExpandError::new(e, offset..offset, file_id);
            emit_error(&files, &error, no_color);
            return 1;
        }
    };

    if args.check {
        let directives = spans.iter().filter(|s| s.directive().is_some()).count();
        eprintln!("ok: {} scanned, {} directive(s)", args.file.display(), directives);
        return 0;
    }

    for span in &spans {
        match &span.kind {
            SpanKind::Directive(d) => {
                println!("{:>6}..{:<6} {} {:?}", span.range.start, span.range.end, d.kind.name(), d.payload)
            }
            SpanKind::Comment => println!("{:>6}..{:<6} comment", span.range.start, span.range.end),
            SpanKind::Literal => {
                println!("{:>6}..{:<6} literal {:?}", span.range.start, span.range.end, span.text(&source))
            }
        }
    }
    0
}

fn write_output(path: Option<&Path>, text: &str) -> std::io::Result<()> {
    match path {
        Some(path) => std::fs::write(path, text),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()
        }
    }
}

fn emit_error(files: &SimpleFiles<String, String>, error: &ExpandError, no_color: bool) {
    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();
    let diagnostic = error.to_diagnostic();
    if term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic).is_err() {
        eprintln!("error: {}", error);
    }
}
