mod fs;

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use html_toc::{TocFilter, TocOptions};
use html_toc_config::{Config, LoadOptions};
use log::{debug, info, LevelFilter};
use rayon::prelude::*;

use crate::fs::atomic_write;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_STALE: i32 = 1;
pub const EXIT_FAILURE: i32 = 2;

const STDIN_PATH: &str = "-";

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    cli.validate()?;

    let mut load = LoadOptions::default();
    if let Some(path) = &cli.config {
        load = load.with_override_path(path);
    }
    let config = Config::load(load)?;
    debug!(
        "configuration resolved from {} layer(s)",
        config.sources.layers.len()
    );

    let filter = TocFilter::new(cli.toc_options(&config));
    let processed = process_inputs(&filter, &cli.files, cli.emit)?;

    if cli.check {
        return report_stale(&processed).context("failed to write check report");
    }

    if cli.in_place {
        for item in &processed {
            if item.output == item.original {
                debug!("{} unchanged", item.path.display());
                continue;
            }
            atomic_write(&item.path, &item.output)
                .with_context(|| format!("failed to write {}", item.path.display()))?;
            info!("updated {}", item.path.display());
        }
        return Ok(EXIT_SUCCESS);
    }

    if let Some(output) = &cli.output {
        let item = &processed[0];
        atomic_write(output, &item.output)
            .with_context(|| format!("failed to write {}", output.display()))?;
        info!("wrote {}", output.display());
        return Ok(EXIT_SUCCESS);
    }

    for item in &processed {
        emit(&item.output)?;
    }
    Ok(EXIT_SUCCESS)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG, when set, overrides the -v derived level.
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .try_init();
}

struct Processed {
    path: PathBuf,
    original: String,
    output: String,
}

fn process_inputs(filter: &TocFilter, files: &[PathBuf], emit: Emit) -> Result<Vec<Processed>> {
    if is_stdin(files) {
        let mut original = String::new();
        io::stdin()
            .lock()
            .read_to_string(&mut original)
            .context("failed to read stdin")?;
        let output = transform(filter, &original, emit)?;
        return Ok(vec![Processed {
            path: PathBuf::from(STDIN_PATH),
            original,
            output,
        }]);
    }

    files
        .par_iter()
        .map(|path| -> Result<Processed> {
            let original = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let output = transform(filter, &original, emit)?;
            debug!("processed {}", path.display());
            Ok(Processed {
                path: path.clone(),
                original,
                output,
            })
        })
        .collect()
}

fn transform(filter: &TocFilter, markup: &str, emit: Emit) -> Result<String> {
    Ok(match emit {
        Emit::Document => filter.apply(markup),
        Emit::Toc => filter.render(markup).unwrap_or_default(),
        Emit::Json => {
            let mut json = serde_json::to_string_pretty(&filter.toc(markup))?;
            json.push('\n');
            json
        }
    })
}

fn report_stale(processed: &[Processed]) -> io::Result<i32> {
    let stale: Vec<&Processed> = processed
        .iter()
        .filter(|item| item.output != item.original)
        .collect();

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for item in &stale {
        match writeln!(handle, "{}: table of contents not applied", item.path.display()) {
            Ok(()) => {}
            Err(err) if should_ignore_pipe_error(&err) => break,
            Err(err) => return Err(err),
        }
    }

    Ok(if stale.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_STALE
    })
}

fn emit(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match handle.write_all(content.as_bytes()) {
        Ok(()) => {}
        Err(err) if should_ignore_pipe_error(&err) => return Ok(()),
        Err(err) => return Err(err).context("failed to write output"),
    }

    match handle.flush() {
        Ok(()) => Ok(()),
        Err(err) if should_ignore_pipe_error(&err) => Ok(()),
        Err(err) => Err(err).context("failed to flush stdout"),
    }
}

fn should_ignore_pipe_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::WouldBlock
    )
}

fn is_stdin(files: &[PathBuf]) -> bool {
    matches!(files, [only] if only == Path::new(STDIN_PATH))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Inject a table of contents into rendered HTML",
    long_about = None
)]
struct Cli {
    /// HTML files to process ('-' reads stdin)
    #[arg(value_name = "FILE", default_value = STDIN_PATH)]
    files: Vec<PathBuf>,

    /// Write the result to PATH instead of stdout
    #[arg(short, long, value_name = "PATH", conflicts_with_all = ["in_place", "check"])]
    output: Option<PathBuf>,

    /// Rewrite each FILE in place
    #[arg(short = 'i', long = "in-place", conflicts_with = "check")]
    in_place: bool,

    /// List files whose placeholders would be replaced; exit 1 if any
    #[arg(long)]
    check: bool,

    /// What to print for each input
    #[arg(long, value_enum, default_value_t = Emit::Document)]
    emit: Emit,

    /// Placeholder token to replace (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    placeholder: Option<String>,

    /// CSS class of the generated container
    #[arg(long = "class", value_name = "NAME")]
    class: Option<String>,

    /// List a lone top-level heading instead of treating it as the title
    #[arg(long = "keep-title")]
    keep_title: bool,

    /// Explicit configuration file (highest precedence)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn toc_options(&self, config: &Config) -> TocOptions {
        let mut options = TocOptions::from(&config.toc);
        if let Some(placeholder) = &self.placeholder {
            options.placeholder = placeholder.clone();
        }
        if let Some(class) = &self.class {
            options.container_class = class.clone();
        }
        if self.keep_title {
            options.skip_title = false;
        }
        options
    }

    fn validate(&self) -> Result<()> {
        let reads_stdin = self.files.iter().any(|path| path == Path::new(STDIN_PATH));
        if reads_stdin && self.files.len() > 1 {
            bail!("'-' (stdin) cannot be combined with other files");
        }
        if reads_stdin && self.in_place {
            bail!("--in-place requires file arguments");
        }
        if self.output.is_some() && self.files.len() > 1 {
            bail!("--output accepts a single input");
        }
        if (self.in_place || self.check) && self.emit != Emit::Document {
            bail!("--in-place and --check only apply to --emit document");
        }
        if self.placeholder.as_deref().is_some_and(|p| p.trim().is_empty()) {
            bail!("--placeholder cannot be empty");
        }
        if self.class.as_deref().is_some_and(|c| c.trim().is_empty()) {
            bail!("--class cannot be empty");
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// The input with every placeholder replaced
    Document,
    /// Only the rendered table of contents
    Toc,
    /// The table of contents tree as JSON
    Json,
}
