//! pgspectre - PostgreSQL schema and usage auditor.
//!
//! Scans codebases for table/column references, compares them with the live
//! schema and usage statistics, and reports drift with CI-friendly exit
//! codes.

mod baseline;
mod catalog;
mod cli;
mod config;
mod detectors;
mod models;
mod reporters;
mod scanner;
mod suppress;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    match cli::run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
