// lockscan — lock-ordering deadlock detector
//
// Author : kelexine (https://github.com/kelexine)
// Version: Dynamic (Cargo.toml)
// License: MIT
//
// Reads captured target-state dumps (mutex owners and waiters per process)
// and reports wait-for cycles:
//   • Command table parsed by the in-crate option engine (required,
//     dependent and implied options, typed values, hex ids)
//   • Iterative DFS — no recursion limit on large snapshots
//   • Explicit node capacity; overflow aborts the run instead of truncating
//   • Colored text, JSON and JSONL output

mod cli;
mod commands;
mod config;
mod display;
mod export;

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::Level;

use commands::{DeadlockArgs, Invocation};
use config::GlobalConfig;
use lockscan::deadlock::{Detector, DumpSource, DEFAULT_NODE_CAPACITY};

const EXIT_RUNTIME: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_DEADLOCK: i32 = 3;

fn main() {
    let args = cli::Args::parse();

    // -------- Logging Setup --------
    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(!args.no_color)
        .init();

    let config = match &args.config {
        Some(path) => match GlobalConfig::load_from(path) {
            Ok(c) => c,
            Err(e) => fail(EXIT_RUNTIME, &format!("{:#}", e)),
        },
        None => GlobalConfig::load(),
    };

    if args.no_color || config.color == Some(false) {
        colored::control::set_override(false);
    }

    let invocation = match commands::parse(&args.command) {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            eprintln!("Run 'lockscan help' for the list of commands and options.");
            process::exit(EXIT_USAGE);
        }
    };

    let code = match run(invocation, &config) {
        Ok(code) => code,
        Err(e) => fail(EXIT_RUNTIME, &format!("{:#}", e)),
    };
    process::exit(code);
}

fn fail(code: i32, message: &str) -> ! {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
    process::exit(code);
}

fn run(invocation: Invocation, config: &GlobalConfig) -> Result<i32> {
    match invocation {
        Invocation::Help => {
            println!("{}", commands::usage());
            Ok(0)
        }
        Invocation::Processes { snapshot } => {
            let source = load_source(snapshot, config)?;
            display::display_processes(source.processes());
            Ok(0)
        }
        Invocation::Primitives { snapshot, pid } => {
            let source = load_source(snapshot, config)?;
            let process = source
                .process(pid)
                .with_context(|| format!("Process {:#x} is not in the snapshot", pid))?;
            display::display_primitives(process);
            Ok(0)
        }
        Invocation::Deadlock(args) => run_deadlock(args, config),
    }
}

fn load_source(snapshot: Option<PathBuf>, config: &GlobalConfig) -> Result<DumpSource> {
    let path = snapshot
        .or_else(|| config.snapshot.clone())
        .context("No snapshot given: pass --snapshot FILE or set `snapshot` in config.toml")?;
    tracing::info!(path = %path.display(), "loading snapshot");
    DumpSource::from_path(&path).with_context(|| format!("Cannot load snapshot {}", path.display()))
}

fn run_deadlock(args: DeadlockArgs, config: &GlobalConfig) -> Result<i32> {
    let mut source = load_source(args.snapshot.clone(), config)?;
    let capacity = args
        .capacity
        .or(config.capacity)
        .unwrap_or(DEFAULT_NODE_CAPACITY);
    let detector = Detector::new(capacity);

    let mut reports = Vec::new();
    let mut aborted = false;
    for &pid in &args.pids {
        match detector.run(&mut source, pid) {
            Ok(report) => reports.push(report),
            // Only this process's run is lost; keep checking the others
            Err(e) => {
                eprintln!(
                    "{} process {:#x}: {:#}",
                    "[ERROR]".red().bold(),
                    pid,
                    anyhow::Error::from(e)
                );
                aborted = true;
            }
        }
    }

    if args.json {
        let document = export::json::report_document(&reports)?;
        let text = if args.compact {
            serde_json::to_string(&document)
        } else {
            serde_json::to_string_pretty(&document)
        }
        .context("Failed to serialize JSON")?;
        println!("{}", text);
    } else {
        for report in &reports {
            display::display_report(report, args.detailed, args.show_skipped);
        }
    }

    if let Some(ref output_file) = args.export {
        export::export(&reports, output_file)?;
    }

    let code = if reports.iter().any(|r| r.has_cycle()) {
        EXIT_DEADLOCK
    } else if aborted {
        EXIT_RUNTIME
    } else {
        0
    };
    Ok(code)
}
