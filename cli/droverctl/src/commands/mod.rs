//! CLI commands.

mod config;
mod job;
mod sla;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use drover_id::Cluster;
use drover_sla::Sla;
use drover_tasks::SystemClock;
use tracing::debug;

use crate::client::SchedulerClient;
use crate::config::Config;
use crate::output::OutputFormat;

/// drover - uptime SLA queries and rolling restarts against a scheduler.
#[derive(Debug, Parser)]
#[command(name = "drover")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Scheduler API URL, overriding the configured cluster endpoint.
    #[arg(long, global = true, env = "DROVER_API_URL")]
    pub api_url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug). DROVER_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Query job uptime SLAs and find hosts safe to take down.
    Sla(sla::SlaCommand),

    /// Operate on jobs.
    Job(job::JobCommand),

    /// Show or edit the cluster registry.
    Config(config::ConfigCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;

        let ctx = CommandContext {
            config,
            format: self.format,
            api_url: self.api_url,
        };

        match self.command {
            Commands::Sla(cmd) => cmd.run(ctx).await,
            Commands::Job(cmd) => cmd.run(ctx).await,
            Commands::Config(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("drover {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
    pub api_url: Option<String>,
}

impl CommandContext {
    /// Scheduler API URL for `cluster`, preferring `--api-url`.
    pub fn api_url(&self, cluster: &Cluster) -> Result<&str> {
        match &self.api_url {
            Some(url) => Ok(url.as_str()),
            None => Ok(self.config.clusters.api_url(cluster.as_str())?),
        }
    }

    /// Get a scheduler client for `cluster`.
    pub fn scheduler(&self, cluster: &Cluster) -> Result<SchedulerClient> {
        let url = self.api_url(cluster)?;
        debug!(cluster = %cluster, url, "using scheduler");
        SchedulerClient::new(url)
    }

    /// Get an SLA engine backed by the scheduler of `cluster`.
    pub fn sla(&self, cluster: &Cluster) -> Result<Sla<SchedulerClient>> {
        Ok(Sla::new(self.scheduler(cluster)?, Arc::new(SystemClock)))
    }
}
