// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `warden`: the CLI surface over the control plane (§6 "CLI surface").
//! `run` launches `wardend` in the background, `createcwd` bootstraps a
//! fresh working directory, `submit` queues an analysis, and `getmonitor`
//! unpacks the auxiliary guest binaries bundle. Every subcommand exits 0 on
//! success and non-zero on any startup error.

mod color;
mod exit_error;
mod getmonitor;
mod submit;

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use warden_core::Paths;
use warden_daemon::bootstrap;

const STARTUP_MARKER: &str = "--- wardend: starting";
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const STARTUP_POLL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "warden", styles = color::styles())]
struct Cli {
    /// Working directory; defaults to $WARDEN_CWD or ~/.cuckoocwd
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon in the background
    Run,
    /// Initialize a fresh working directory
    Createcwd,
    /// Submit one or more targets for analysis
    Submit(submit::SubmitArgs),
    /// Unpack an auxiliary binaries bundle into the working directory
    Getmonitor(getmonitor::GetmonitorArgs),
}

fn resolve_cwd(explicit: Option<PathBuf>) -> Result<PathBuf, ExitError> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    if let Ok(dir) = std::env::var("WARDEN_CWD") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir().map(|h| h.join(".cuckoocwd")).ok_or_else(|| ExitError::new(1, "no home directory to default a CWD into"))
}

fn run(paths: &Paths) -> Result<(), ExitError> {
    bootstrap::require_initialized(paths).map_err(|e| ExitError::new(1, e.to_string()))?;

    let log_path = paths.cwd().join("operational").join("logs").join("wardend.log");
    let start_offset = std::fs::metadata(&log_path).map(|m| m.len()).unwrap_or(0);

    let binary = find_wardend_binary();
    Command::new(&binary)
        .env("WARDEN_CWD", paths.cwd())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ExitError::new(1, format!("failed to spawn {}: {e}", binary.display())))?;

    let deadline = std::time::Instant::now() + STARTUP_TIMEOUT;
    while std::time::Instant::now() < deadline {
        std::thread::sleep(STARTUP_POLL);
        let Ok(content) = std::fs::read_to_string(&log_path) else { continue };
        if content.len() <= start_offset as usize {
            continue;
        }
        let new_content = &content[start_offset as usize..];
        if let Some(reason) = parse_startup_error(new_content) {
            return Err(ExitError::new(1, format!("daemon failed to start: {reason}")));
        }
        if new_content.contains(STARTUP_MARKER) {
            println!("warden daemon started");
            return Ok(());
        }
    }
    Err(ExitError::new(1, "timed out waiting for the daemon to report startup"))
}

/// Scans a `wardend.log` excerpt for the last startup marker and, if the line
/// following it (after a blank separator) starts with `ERROR`, returns the
/// failure reason.
fn parse_startup_error(log: &str) -> Option<String> {
    let lines: Vec<&str> = log.lines().collect();
    let marker_idx = lines.iter().rposition(|line| line.contains(STARTUP_MARKER))?;
    lines[marker_idx + 1..].iter().find_map(|line| line.split_once("Failed to start daemon:").map(|(_, reason)| reason.trim().to_string()))
}

fn find_wardend_binary() -> PathBuf {
    if let Some(exe) = std::env::current_exe().ok() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("wardend");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("wardend")
}

fn createcwd(paths: &Paths) -> Result<(), ExitError> {
    bootstrap::createcwd(paths).map_err(|e| ExitError::new(1, e.to_string()))?;
    println!("initialized {}", paths.cwd().display());
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let result = dispatch(cli).await;
    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::ExitCode::from(e.code.clamp(1, 255) as u8)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<(), ExitError> {
    let cwd = resolve_cwd(cli.cwd)?;
    let paths = Paths::new(&cwd);

    match cli.command {
        Commands::Run => run(&paths),
        Commands::Createcwd => createcwd(&paths),
        Commands::Submit(args) => submit::submit(&paths, args).await,
        Commands::Getmonitor(args) => getmonitor::getmonitor(&paths, args),
    }
}
