use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use card_assets::{AssetExtractor, ExtractorConfig};
use clap::Parser;

/// Recover embedded images and sounds from PNG character cards and charx archives.
#[derive(Debug, Parser)]
#[command(name = "card-assets", version, about)]
struct Cli {
    /// Card files to process, one after another.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// JSON configuration file (defaults to `card_assets.config.json` in the working directory).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory receiving `<stem>_assets` folders instead of each input's directory.
    #[arg(long)]
    output_root: Option<PathBuf>,
    /// Number of concurrent write workers (0 = one per core).
    #[arg(long, short = 'j')]
    jobs: Option<usize>,
    /// Log debug details.
    #[arg(long, short)]
    verbose: bool,
    /// Also append log records to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Mirrors log output to stderr and an append-only file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }

    builder.init();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ExtractorConfig> {
    let mut config = match &cli.config {
        Some(path) => ExtractorConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let cwd = std::env::current_dir().context("failed to read working directory")?;
            ExtractorConfig::discover(&cwd)
        }
    };

    if let Some(root) = &cli.output_root {
        config.output_root = Some(root.clone());
    }
    if let Some(jobs) = cli.jobs {
        config.worker_threads = jobs;
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<bool> {
    let extractor = AssetExtractor::new(load_config(cli)?);

    let mut all_ok = true;
    for input in &cli.inputs {
        match extractor.run(input) {
            Ok(summary) => println!(
                "{} -> {} ({} written, {} failed, {} skipped)",
                input.display(),
                summary.output_dir.display(),
                summary.written,
                summary.failed,
                summary.skipped
            ),
            Err(err) => {
                eprintln!("{}: {err}", input.display());
                all_ok = false;
            }
        }
    }
    Ok(all_ok)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
