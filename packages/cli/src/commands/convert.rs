use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use lyx2lyx_common::{Input, Output, RunConfig};
use lyx2lyx_converter::Document;
use lyx2lyx_parser::parse_format;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, Level};

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input file; standard input when absent or `-`
    pub input: Option<String>,

    /// Target file format, e.g. 276 or 2.15
    #[arg(short = 't', long = "to", value_parser = parse_target)]
    pub to: Option<u32>,

    /// Target release, e.g. 1.4.3
    #[arg(short = 'V', long = "final_version")]
    pub final_version: Option<String>,

    /// Output file; standard output when absent or `-`
    #[arg(short, long)]
    pub output: Option<String>,

    /// Encoding CJK-LyX used for files up to format 248
    #[arg(short = 'c', long)]
    pub encoding: Option<String>,

    /// Keep going after recoverable errors
    #[arg(short = 'n', long = "try-hard")]
    pub try_hard: bool,

    /// Write diagnostics to this file instead of standard error
    #[arg(short = 'e', long = "err")]
    pub err: Option<PathBuf>,

    /// Diagnostic detail: 0 errors, 1 warnings, 2 progress, 3 steps, 4 everything
    #[arg(short, long)]
    pub debug: Option<u8>,

    /// Only report errors
    #[arg(short, long, conflicts_with_all = ["debug", "noisy"])]
    pub quiet: bool,

    /// Report every rewrite step
    #[arg(long, conflicts_with = "debug")]
    pub noisy: bool,
}

impl ConvertArgs {
    fn level(&self, config: &Config) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        if self.noisy {
            return Level::DEBUG;
        }
        match self.debug.or(config.debug).unwrap_or(1) {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    fn run_config(&self, config: &Config) -> RunConfig {
        RunConfig {
            try_hard: self.try_hard || config.try_hard,
            end_format: self.to,
            final_version: self.final_version.clone(),
            cjk_encoding: self.encoding.clone().or_else(|| config.cjk_encoding.clone()),
        }
    }
}

fn parse_target(value: &str) -> Result<u32, String> {
    parse_format(value).map_err(|err| err.to_string())
}

fn init_logging(level: Level, err: Option<&Path>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time();

    match err {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot create {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Convert one document and return the process exit status.
pub fn convert(args: ConvertArgs, cwd: &Path) -> Result<i32> {
    let config = Config::load(cwd)?;
    init_logging(args.level(&config), args.err.as_deref())?;

    let input = Input::from_arg(args.input.as_deref());
    let source = input
        .path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "standard input".to_string());

    let mut document = Document::new(args.run_config(&config))?
        .with_input(input)
        .with_output(Output::from_arg(args.output.as_deref()));

    document
        .read()
        .with_context(|| format!("Cannot read {}", source))?;
    document
        .convert()
        .with_context(|| format!("Cannot convert {}", source))?;
    document.write().context("Cannot write the converted document")?;

    info!(
        "Converted {} from format {} to {}",
        source,
        document.start_format(),
        document.end_format()
    );
    Ok(document.status())
}
