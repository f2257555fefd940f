use clap::{Parser, Subcommand};
use log::*;
use std::{path::PathBuf, process::ExitCode};

use crate::{
    app::{Monitor, RunOutcome},
    config::{RunConfig, Settings},
    poll::{SshExecutor, discover_nodes},
    shutdown::{listen_for_signals, shutdown_channel},
};

pub mod app;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod poll;
pub mod shutdown;
pub mod store;

#[derive(Parser, Debug)]
#[command(about)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = config::DEFAULT_FILE)]
    config: PathBuf,
    /// Process names to monitor (substring match on the command)
    #[arg(short, long, num_args = 1.., value_name = "NAME")]
    processes: Vec<String>,
    /// Polling interval in seconds
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,
    /// Poll these nodes instead of running discovery (repeatable)
    #[arg(short, long = "node", value_name = "ADDR")]
    nodes: Vec<String>,
    /// Directory for the CSV files
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Remote calls in flight at once
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    fan_out: Option<u64>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll until interrupted, then write one CSV per process
    Run,
    /// Print the resolved configuration and the discovered nodes
    Validate,
}

impl Cli {
    fn settings(&self) -> color_eyre::Result<Settings> {
        let mut settings = Settings::load(&self.config)?;
        if let Some(interval) = self.interval {
            settings.interval = interval;
        }
        if !self.nodes.is_empty() {
            settings.nodes = self.nodes.clone();
        }
        if let Some(dir) = self.output_dir.as_ref() {
            settings.output_dir = dir.clone();
        }
        if let Some(fan_out) = self.fan_out {
            settings.fan_out = usize::try_from(fan_out)?;
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let settings = cli.settings()?;
    match &cli.command {
        Some(Commands::Validate) => validate(&settings).await,
        Some(Commands::Run) | None => {
            let run_config = RunConfig::new(cli.processes.clone(), &settings)?;
            logging::init(&settings.log_file, &settings.log_level)?;
            if cli.config.exists() {
                info!(target: "Config", "Loaded {:?}", cli.config);
            }
            run(run_config, &settings).await
        }
    }
}

async fn run(run_config: RunConfig, settings: &Settings) -> color_eyre::Result<ExitCode> {
    let nodes = match discover_nodes(settings).await {
        Ok(nodes) => nodes,
        Err(err) => {
            error!(target: "Discovery", "{}", err);
            println!("Failed to get IPs: {}", err);
            Vec::new()
        }
    };

    let (sender, token) = shutdown_channel();
    tokio::spawn(listen_for_signals(sender));

    let monitor = Monitor::new(run_config, SshExecutor::new(settings.transport.clone()));
    let outcome = monitor.run(nodes, token).await;
    logging::flush();
    let outcome = outcome?;
    if let RunOutcome::Stopped(summary) = &outcome {
        for (process, count) in &summary.totals {
            println!(
                "{}: {} samples over {} cycles",
                process, count, summary.cycles
            );
        }
        info!(target: "App", "Finished after {} cycles", summary.cycles);
        logging::flush();
    }
    Ok(outcome.exit_code())
}

async fn validate(settings: &Settings) -> color_eyre::Result<ExitCode> {
    println!("{}", settings.to_toml()?);
    match discover_nodes(settings).await {
        Ok(nodes) if !nodes.is_empty() => {
            println!("# {} nodes: {}", nodes.len(), nodes.join(" "));
            Ok(ExitCode::SUCCESS)
        }
        Ok(_) => {
            println!("# discovery returned no nodes");
            Ok(RunOutcome::NoNodes.exit_code())
        }
        Err(err) => {
            println!("# discovery failed: {}", err);
            Ok(RunOutcome::NoNodes.exit_code())
        }
    }
}
