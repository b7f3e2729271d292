//! Remote Job Runner - Worker Agent
//!
//! The worker fetches a job's metadata from the control server,
//! dispatches to the matching workflow, streams the job's output back
//! in near-real-time, and uploads resulting artifacts.

#![forbid(unsafe_code)]

mod executor;
mod workflows;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rjr_common::{LogConfig, RunnerConfig, init_logging};
use tracing::info;

#[derive(Parser)]
#[command(name = "rjr-wkr")]
#[command(author, version, about = "RJR worker agent - remote job execution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one job to completion
    Run {
        /// Job identifier assigned by the control server
        #[arg(long, env = "RJR_JOB_ID")]
        job_id: String,
    },

    /// Report system info (human-readable)
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    init_logging(&log_config)?;

    match cli.command {
        Commands::Run { job_id } => {
            let config = RunnerConfig::from_env();
            info!(job_id = %job_id, control = %config.control_url, "starting job");
            match executor::JobExecutor::new(config, job_id)?.run().await {
                Ok(()) => Ok(()),
                Err(err) => {
                    tracing::error!(error = %format!("{err:#}"), "job failed");
                    std::process::exit(1);
                }
            }
        }
        Commands::Info => {
            print_system_info();
            Ok(())
        }
    }
}

fn print_system_info() {
    use std::process::Command;

    println!("=== System Info ===");

    if let Ok(output) = Command::new("nproc").output()
        && let Ok(cores) = String::from_utf8_lossy(&output.stdout).trim().parse::<u32>()
    {
        println!("Cores: {}", cores);
    }

    if let Ok(output) = Command::new("free").args(["-h"]).output() {
        let output_str = String::from_utf8_lossy(&output.stdout);
        for line in output_str.lines() {
            if line.starts_with("Mem:") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 2 {
                    println!("Memory: {}", parts[1]);
                }
            }
        }
    }

    // The tools every workflow shells out to.
    println!("\n=== Tools ===");
    for (name, args) in [
        ("git", ["--version"]),
        ("tar", ["--version"]),
        ("zstd", ["--version"]),
    ] {
        if let Ok(output) = Command::new(name).args(args).output() {
            let first_line = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("")
                .to_string();
            println!("{}: {}", name, first_line);
        } else {
            println!("{}: not installed", name);
        }
    }
}
