// caseprep/src/main.rs
use std::process;
use std::{env, fs};

use caseprep_common::config::Config;
use caseprep_common::error::{CaseprepError, Result};
use clap::Parser;
use colored::Colorize;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let config = Config::load()
        .map_err(|e| CaseprepError::Config(format!("Could not load configuration: {e}")))?;

    let level_filter = match cli_args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::INFO);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("CASEPREP_LOG")
        .from_env_lossy();

    let log_dir = cli_args
        .log_dir
        .clone()
        .unwrap_or_else(|| config.logs_dir());
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!(
            "{} Failed to create log directory {}: {}",
            "Warning:".yellow().bold(),
            log_dir.display(),
            e
        );
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
    } else {
        // One log file per run so each provisioning session can be
        // reviewed after the fact.
        let file_name = format!("caseprep-{}.log", chrono::Local::now().format("%Y%m%d-%H%M%S"));
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

        let stderr_writer = std::io::stderr.with_max_level(max_log_level);
        let file_writer = non_blocking_appender.with_max_level(max_log_level);

        // The run log keeps timestamps; each line is [timestamp] [LEVEL] msg.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(stderr_writer.and(file_writer))
            .with_ansi(false)
            .try_init();

        Box::leak(Box::new(guard)); // keep the appender alive for the process lifetime
        debug!("Writing run log to {}", log_dir.display());
    }

    if env::var("CASEPREP_ROOT").is_ok() {
        debug!("Using root override from CASEPREP_ROOT: {}", config.root.display());
    }

    match cli_args.command.run(&config).await {
        Ok(exit_code) => {
            debug!("Command completed with exit code {exit_code}.");
            if exit_code != 0 {
                process::exit(exit_code);
            }
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            process::exit(1);
        }
    }
}
