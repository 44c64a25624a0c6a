//! fathom - asynchronous directory scanning for file managers.
//!
//! Usage:
//!   ftm list [PATH]          List one directory with a live progress line
//!   ftm sweep <PATHS>...     Scan many directories in parallel
//!   ftm backends             Report scanner backend availability
//!   ftm --help               Show help

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tracing_subscriber::EnvFilter;

use fathom_scan::{
    BackendChoice, BackendKind, BackendRegistry, EngineConfig, ScanEngine, ScanState,
    sort_for_display,
};

#[derive(Parser)]
#[command(
    name = "fathom",
    version,
    about = "Asynchronous directory scanning for file managers",
    long_about = "fathom lists directories through cancellable background scans.\n\n\
                  Use `ftm list` for a single directory with live progress, or \
                  `ftm sweep` to scan a batch of directories in parallel."
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan one directory and list its entries
    List {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Stop after this many entries (0 uses the configured cap)
        #[arg(short = 'F', long, value_name = "N")]
        fast: Option<usize>,

        /// Scanner backend to use
        #[arg(short, long, default_value = "auto")]
        backend: BackendArg,

        /// Output format
        #[arg(short = 'o', long, default_value = "text")]
        format: OutputFormat,

        /// Sort entries directories-first, then by name
        #[arg(short, long)]
        sort: bool,
    },

    /// Scan several directories in parallel
    Sweep {
        /// Directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Worker pool size
        #[arg(short, long)]
        pool: Option<usize>,

        /// Merge all listings into one stream instead of per-path summaries
        #[arg(short, long)]
        merge: bool,

        /// Per-directory timeout in seconds
        #[arg(short, long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Output format
        #[arg(short = 'o', long, default_value = "text")]
        format: OutputFormat,
    },

    /// Report which scanner backends are available
    Backends {
        /// Output format
        #[arg(short = 'o', long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum BackendArg {
    #[default]
    Auto,
    Native,
    InProcess,
}

impl From<BackendArg> for BackendChoice {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendChoice::Auto,
            BackendArg::Native => BackendChoice::Forced(BackendKind::Native),
            BackendArg::InProcess => BackendChoice::Forced(BackendKind::InProcess),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::List {
            path,
            fast,
            backend,
            format,
            sort,
        } => run_list(&path, fast, backend, format, sort),
        Command::Sweep {
            paths,
            pool,
            merge,
            timeout,
            format,
        } => run_sweep(&paths, pool, merge, timeout, format),
        Command::Backends { format } => run_backends(format),
    }
}

/// Logs go to stderr so `--format json` output stays parseable.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

/// Scan a single directory with a live progress line.
fn run_list(
    path: &PathBuf,
    fast: Option<usize>,
    backend: BackendArg,
    format: OutputFormat,
    sort: bool,
) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;

    let mut builder = EngineConfig::builder();
    builder.backend(BackendChoice::from(backend));
    let engine = ScanEngine::new(builder.build()?)?;

    let started = Instant::now();
    eprintln!("Scanning {}...", path.display());

    let handle = match fast {
        Some(cap) => engine.begin_fast(&path, cap)?,
        None => engine.begin(&path)?,
    };

    let outcome = handle.wait_with_progress(Some(engine.config().scan_timeout), |progress| {
        if progress.total > 0 {
            eprint!("\r {}/{} entries", progress.current, progress.total);
        }
    });
    eprintln!();

    let state = match outcome {
        Ok(state) => state,
        Err(err) => {
            handle.cancel();
            return Err(err).context("Scan did not finish");
        }
    };

    match state {
        ScanState::Done => {}
        ScanState::Cancelled => {
            eprintln!("Scan cancelled");
            return Ok(());
        }
        other => {
            let detail = handle
                .failure()
                .map(|err| err.to_string())
                .unwrap_or_else(|| format!("scan ended {other}"));
            return Err(eyre!(detail));
        }
    }

    let mut entries = handle.results()?;
    if sort {
        sort_for_display(&mut entries);
    }

    match format {
        OutputFormat::Text => {
            let dirs = entries.iter().filter(|e| e.is_dir).count();
            let files = entries.len() - dirs;

            println!();
            for entry in &entries {
                let marker = if entry.is_dir {
                    "d"
                } else if entry.executable {
                    "x"
                } else {
                    "-"
                };
                let size = if entry.is_dir {
                    "-".to_string()
                } else {
                    format_size(entry.size)
                };
                let modified = DateTime::<Local>::from(entry.modified).format("%Y-%m-%d %H:%M");
                let name = if entry.is_dir {
                    format!("{}/", entry.name)
                } else {
                    entry.name.to_string()
                };
                println!(" {marker}  {name:<42} {size:>10}  {modified}");
            }
            println!();
            println!(
                " {} entries ({} directories, {} files) via {} in {:.2}s",
                entries.len(),
                dirs,
                files,
                engine.backend_kind(),
                started.elapsed().as_secs_f64()
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}

/// Scan a batch of directories through the worker pool.
fn run_sweep(
    paths: &[PathBuf],
    pool: Option<usize>,
    merge: bool,
    timeout: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let mut builder = EngineConfig::builder();
    if let Some(pool) = pool {
        builder.pool_size(pool);
    }
    if let Some(secs) = timeout {
        builder.scan_timeout(Duration::from_secs(secs));
    }
    let engine = ScanEngine::new(builder.build()?)?;
    let scanner = engine.parallel();

    let started = Instant::now();

    if merge {
        let merged = scanner.scan_all_merged(paths, None);
        match format {
            OutputFormat::Text => {
                for (path, entry) in &merged {
                    let size = if entry.is_dir {
                        "-".to_string()
                    } else {
                        format_size(entry.size)
                    };
                    println!(" {size:>10}  {}", path.join(entry.name.as_str()).display());
                }
                eprintln!(
                    " {} entries from {} directories in {:.2}s",
                    merged.len(),
                    paths.len(),
                    started.elapsed().as_secs_f64()
                );
            }
            OutputFormat::Json => {
                let rows: Vec<_> = merged
                    .iter()
                    .map(|(path, entry)| serde_json::json!({ "path": path, "entry": entry }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
        }
        return Ok(());
    }

    let results = scanner.scan_all_with_progress(paths, |completed, total| {
        eprint!("\r {completed}/{total} directories");
    });
    eprintln!();

    match format {
        OutputFormat::Text => {
            let mut failures = 0usize;
            for result in &results {
                if result.success {
                    println!(
                        " {:<50} {:>6} entries",
                        result.path.display(),
                        result.len()
                    );
                } else {
                    failures += 1;
                    println!(
                        " {:<50} error: {}",
                        result.path.display(),
                        result.error.as_deref().unwrap_or("unknown")
                    );
                }
            }
            println!();
            println!(
                " {} directories scanned, {} failed, in {:.2}s",
                results.len() - failures,
                failures,
                started.elapsed().as_secs_f64()
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

/// Probe and report every registered backend.
fn run_backends(format: OutputFormat) -> Result<()> {
    let statuses = BackendRegistry::new().availability();

    match format {
        OutputFormat::Text => {
            println!(" {:<12} {:<12} {}", "backend", "status", "detail");
            println!(" {}", "─".repeat(50));
            for status in &statuses {
                println!(
                    " {:<12} {:<12} {}",
                    status.kind,
                    if status.available {
                        "available"
                    } else {
                        "unavailable"
                    },
                    status.detail
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
    }

    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
