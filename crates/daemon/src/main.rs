// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `siftd` binary (§6 CLI surface): start the runtime, trigger one
//! job definition to completion, reload config, or dump document
//! store stats. Exit codes follow `DaemonError::exit_code`.

use clap::{Parser, Subcommand};
use sift_daemon::boot::boot;
use sift_daemon::config::DaemonConfig;
use sift_daemon::error::DaemonError;
use sift_storage::{DocumentStore, JobDefinitionStore};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "siftd", about = "Rating platform job execution daemon")]
struct Cli {
    /// Path to the daemon's own TOML config file.
    #[arg(long, global = true, default_value = "siftd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the scheduler and the MCP document server; runs until
    /// interrupted.
    Start,
    /// Enqueue one job definition by name and run it to a terminal
    /// state, then exit.
    RunOnceTrigger { job_name: String },
    /// Re-read job definitions, connectors, and variables from the
    /// config root.
    ReloadConfig,
    /// Print document store stats and the current manager list as JSON.
    DumpStats,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "siftd exiting with error");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<(), DaemonError> {
    let config = DaemonConfig::load(&cli.config)?;

    match cli.command {
        Command::Start => start(config).await,
        Command::RunOnceTrigger { job_name } => run_once_trigger(config, &job_name).await,
        Command::ReloadConfig => reload_config(config).await,
        Command::DumpStats => dump_stats(config).await,
    }
}

async fn start(config: DaemonConfig) -> Result<(), DaemonError> {
    let daemon = boot(&config).await?;
    daemon.scheduler.start()?;

    let mcp_storage = daemon.storage.clone();
    let mcp_task = tokio::spawn(async move {
        use rmcp::ServiceExt;
        let server = sift_mcp::DocumentServer::new(mcp_storage);
        match server.serve(rmcp::transport::stdio()).await {
            Ok(running) => {
                if let Err(e) = running.waiting().await {
                    tracing::warn!(error = %e, "mcp server exited with an error");
                }
            }
            Err(e) => tracing::warn!(error = %e, "mcp server failed to start"),
        }
    });

    tracing::info!("siftd started");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    mcp_task.abort();
    Ok(())
}

async fn run_once_trigger(config: DaemonConfig, job_name: &str) -> Result<(), DaemonError> {
    let daemon = boot(&config).await?;
    let defs = JobDefinitionStore::new(&daemon.storage);
    let def = defs.get_by_name(job_name).ok_or_else(|| sift_core::CoreError::NotFound(format!("job definition {job_name}")))?;
    let manager_id = daemon.manager.enqueue_and_run(&def.id, serde_json::Value::Null).await?;
    let state = daemon.manager.get_manager_state(&manager_id);
    match state {
        Some(state) => println!("{}: {:?}", manager_id, state.status.status),
        None => println!("{manager_id}: state unavailable"),
    }
    Ok(())
}

async fn reload_config(config: DaemonConfig) -> Result<(), DaemonError> {
    boot(&config).await?;
    println!("config reloaded from {}", config.config_root.display());
    Ok(())
}

async fn dump_stats(config: DaemonConfig) -> Result<(), DaemonError> {
    let daemon = boot(&config).await?;
    let docs = DocumentStore::new(&daemon.storage);
    let managers = daemon.manager.list_managers(&Default::default());
    let payload = serde_json::json!({
        "documents": docs.get_stats(),
        "managers": managers.len(),
    });
    println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string()));
    Ok(())
}
