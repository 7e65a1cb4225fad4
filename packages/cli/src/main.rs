mod commands;
mod config;

use clap::Parser;
use colored::Colorize;
use commands::{convert, list, ConvertArgs};
use std::path::PathBuf;

/// lyx2lyx - convert LyX documents between file formats
#[derive(Parser, Debug)]
#[command(name = "lyx2lyx")]
#[command(author, version, about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    #[command(flatten)]
    convert: ConvertArgs,

    /// List the supported file formats and the releases that wrote them
    #[arg(short, long)]
    list: bool,

    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    version: Option<bool>,
}

fn main() {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let result = if cli.list {
        list()
    } else {
        convert(cli.convert, &cwd)
    };

    match result {
        Ok(status) => std::process::exit(status),
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            std::process::exit(1);
        }
    }
}
